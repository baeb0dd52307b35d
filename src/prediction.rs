use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::models::{CyclePrediction, CycleSummary, LogKind, PeriodLog, Regularity};

pub const DEFAULT_CYCLE_LENGTH: u32 = 28;
pub const DEFAULT_PERIOD_LENGTH: u32 = 5;
/// Length assumed for a predicted period, independent of logged durations.
pub const PREDICTED_PERIOD_DAYS: i64 = 5;
pub const LUTEAL_PHASE_DAYS: i64 = 14;
pub const FERTILE_DAYS_BEFORE_OVULATION: i64 = 5;
pub const FERTILE_DAYS_AFTER_OVULATION: i64 = 1;
pub const SHORT_CYCLE_DAYS: u32 = 21;
pub const LONG_CYCLE_DAYS: u32 = 35;
/// Max deviation (days) from the average for a gap to still count as regular.
pub const REGULARITY_TOLERANCE_DAYS: i64 = 2;

const REGULARITY_WINDOW: usize = 3;
/// Gaps at or above this are treated as missed logging in the summary view.
const MAX_SUMMARY_GAP_DAYS: i64 = 60;

/// How records with missing or malformed dates are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePolicy {
    /// Skip the record and carry on with fewer data points.
    #[default]
    Permissive,
    /// Reject the whole collection, naming the offending record.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("period start {id} has no start date")]
    MissingStartDate { id: Uuid },
    #[error("record {id} has an invalid {field} {value:?}, expected yyyy-MM-dd")]
    InvalidDate {
        id: Uuid,
        field: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleInsight {
    ShortCycle,
    LongCycle,
    VeryRegular,
    SomeVariation,
}

impl std::fmt::Display for CycleInsight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            Self::ShortCycle => {
                "Your cycle is shorter than average. Consider consulting a healthcare provider."
            }
            Self::LongCycle => {
                "Your cycle is longer than average. Consider consulting a healthcare provider."
            }
            Self::VeryRegular => {
                "Your cycle is very regular. This is a good sign of reproductive health."
            }
            Self::SomeVariation => {
                "Your cycle shows some variation. This is normal, but monitor for significant changes."
            }
        };
        f.write_str(message)
    }
}

/// Check every date in the collection, failing on the first bad one.
pub fn validate_period_logs(logs: &[PeriodLog]) -> Result<(), ValidationError> {
    for log in logs {
        match (&log.start_date, log.kind) {
            (None, LogKind::PeriodStart) => {
                return Err(ValidationError::MissingStartDate { id: log.id });
            }
            (Some(value), _) if log.parsed_start().is_none() => {
                return Err(ValidationError::InvalidDate {
                    id: log.id,
                    field: "startDate",
                    value: value.clone(),
                });
            }
            _ => {}
        }
        if let Some(value) = &log.end_date {
            if log.parsed_end().is_none() {
                return Err(ValidationError::InvalidDate {
                    id: log.id,
                    field: "endDate",
                    value: value.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Distinct period-start dates, most recent first. Unparsable records are skipped.
pub fn period_starts(logs: &[PeriodLog]) -> Vec<NaiveDate> {
    let mut starts: Vec<NaiveDate> = logs
        .iter()
        .filter(|log| log.is_start())
        .filter_map(|log| {
            let parsed = log.parsed_start();
            if parsed.is_none() {
                debug!(id = %log.id, start_date = ?log.start_date, "skipping period start without a usable date");
            }
            parsed
        })
        .collect();
    starts.sort_unstable_by(|a, b| b.cmp(a));
    starts.dedup();
    starts
}

/// Average cycle length in days, or 28 when there is not enough history.
///
/// The mean is rounded half away from zero; all gaps are positive so this
/// matches rounding half up.
pub fn calculate_cycle_length(logs: &[PeriodLog]) -> u32 {
    cycle_length_from_starts(&period_starts(logs))
}

fn cycle_length_from_starts(starts: &[NaiveDate]) -> u32 {
    if starts.len() < 2 {
        return DEFAULT_CYCLE_LENGTH;
    }

    let gaps: Vec<i64> = starts
        .windows(2)
        .map(|w| (w[0] - w[1]).num_days())
        .filter(|gap| *gap > 0)
        .collect();

    if gaps.is_empty() {
        return DEFAULT_CYCLE_LENGTH;
    }

    let length = mean(&gaps).round() as u32;
    debug!(cycle_length = length, samples = gaps.len(), "computed cycle length");
    length
}

/// Predict the next period, ovulation and fertile window.
///
/// The anchor is the most recent logged period start; with none logged,
/// `today` is used instead.
pub fn predict_next_cycle(logs: &[PeriodLog], today: NaiveDate) -> CyclePrediction {
    let starts = period_starts(logs);
    let cycle_length = cycle_length_from_starts(&starts);
    let anchor = starts.first().copied().unwrap_or(today);
    project_cycle(anchor, cycle_length)
}

fn project_cycle(last_period_start: NaiveDate, cycle_length: u32) -> CyclePrediction {
    let period_start = shift(last_period_start, i64::from(cycle_length));
    let ovulation_date = shift(period_start, -LUTEAL_PHASE_DAYS);

    CyclePrediction {
        period_start,
        period_end: shift(period_start, PREDICTED_PERIOD_DAYS),
        ovulation_date,
        fertile_start: shift(ovulation_date, -FERTILE_DAYS_BEFORE_OVULATION),
        fertile_end: shift(ovulation_date, FERTILE_DAYS_AFTER_OVULATION),
        cycle_length,
        is_prediction: true,
    }
}

/// Calendar-day offset that saturates at chrono's date range instead of panicking.
fn shift(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(days))
        .unwrap_or(if days < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

/// Length warnings first, then a regularity verdict once three starts exist.
pub fn cycle_insights(logs: &[PeriodLog]) -> Vec<CycleInsight> {
    let starts = period_starts(logs);
    let cycle_length = cycle_length_from_starts(&starts);
    let mut insights = Vec::new();

    if cycle_length < SHORT_CYCLE_DAYS {
        insights.push(CycleInsight::ShortCycle);
    } else if cycle_length > LONG_CYCLE_DAYS {
        insights.push(CycleInsight::LongCycle);
    }

    if starts.len() >= REGULARITY_WINDOW {
        let expected = i64::from(cycle_length);
        let regular = starts[..REGULARITY_WINDOW]
            .windows(2)
            .all(|w| ((w[0] - w[1]).num_days() - expected).abs() <= REGULARITY_TOLERANCE_DAYS);
        insights.push(if regular {
            CycleInsight::VeryRegular
        } else {
            CycleInsight::SomeVariation
        });
    }

    insights
}

pub fn insight_messages(logs: &[PeriodLog]) -> Vec<String> {
    cycle_insights(logs).iter().map(ToString::to_string).collect()
}

/// Compute statistics for the summary view.
pub fn cycle_summary(logs: &[PeriodLog]) -> CycleSummary {
    let starts = period_starts(logs);

    if starts.len() < 2 {
        return CycleSummary {
            total_period_starts: starts.len(),
            average_cycle_length: None,
            average_period_length: None,
            shortest_cycle: None,
            longest_cycle: None,
            regularity: Regularity::Unknown,
            last_period_start: starts.first().copied(),
        };
    }

    let cycle_lengths: Vec<i64> = starts
        .windows(2)
        .map(|w| (w[0] - w[1]).num_days())
        .filter(|gap| *gap > 0 && *gap < MAX_SUMMARY_GAP_DAYS)
        .collect();

    let average_cycle_length = if cycle_lengths.is_empty() {
        DEFAULT_CYCLE_LENGTH
    } else {
        mean(&cycle_lengths).round() as u32
    };

    let period_lengths: Vec<i64> = logs
        .iter()
        .filter(|log| log.kind == LogKind::PeriodEnd)
        .filter_map(|log| Some((log.parsed_end()? - log.parsed_start()?).num_days() + 1))
        .filter(|days| *days > 0)
        .collect();

    let average_period_length = if period_lengths.is_empty() {
        DEFAULT_PERIOD_LENGTH
    } else {
        mean(&period_lengths).round() as u32
    };

    CycleSummary {
        total_period_starts: starts.len(),
        average_cycle_length: Some(average_cycle_length),
        average_period_length: Some(average_period_length),
        shortest_cycle: cycle_lengths.iter().copied().min(),
        longest_cycle: cycle_lengths.iter().copied().max(),
        regularity: classify_regularity(&cycle_lengths),
        last_period_start: starts.first().copied(),
    }
}

fn classify_regularity(cycle_lengths: &[i64]) -> Regularity {
    match cycle_lengths.len() {
        0 => Regularity::Unknown,
        1 | 2 => Regularity::NeedsMoreData,
        n => {
            let total: i64 = cycle_lengths
                .windows(2)
                .map(|w| (w[1] - w[0]).abs())
                .sum();
            let average_variation = total as f64 / (n - 1) as f64;
            if average_variation <= 3.0 {
                Regularity::Regular
            } else if average_variation <= 7.0 {
                Regularity::SlightlyIrregular
            } else {
                Regularity::Irregular
            }
        }
    }
}

fn mean(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<i64>() as f64 / values.len() as f64
}

/// Prediction entry point carrying a date policy and a clock.
pub struct Predictor<C: Clock = SystemClock> {
    policy: DatePolicy,
    clock: C,
}

impl Default for Predictor<SystemClock> {
    fn default() -> Self {
        Self::new(DatePolicy::default(), SystemClock)
    }
}

impl<C: Clock> Predictor<C> {
    pub fn new(policy: DatePolicy, clock: C) -> Self {
        Self { policy, clock }
    }

    pub fn policy(&self) -> DatePolicy {
        self.policy
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    fn check(&self, logs: &[PeriodLog]) -> Result<(), ValidationError> {
        if self.policy == DatePolicy::Permissive {
            return Ok(());
        }
        validate_period_logs(logs).inspect_err(|e| warn!(error = %e, "rejecting period logs"))
    }

    pub fn cycle_length(&self, logs: &[PeriodLog]) -> Result<u32, ValidationError> {
        self.check(logs)?;
        Ok(calculate_cycle_length(logs))
    }

    pub fn predict_next(&self, logs: &[PeriodLog]) -> Result<CyclePrediction, ValidationError> {
        self.check(logs)?;
        Ok(predict_next_cycle(logs, self.clock.today()))
    }

    pub fn insights(&self, logs: &[PeriodLog]) -> Result<Vec<CycleInsight>, ValidationError> {
        self.check(logs)?;
        Ok(cycle_insights(logs))
    }

    pub fn summary(&self, logs: &[PeriodLog]) -> Result<CycleSummary, ValidationError> {
        self.check(logs)?;
        Ok(cycle_summary(logs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::DATE_FORMAT;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn start(s: &str) -> PeriodLog {
        PeriodLog::start(date(s))
    }

    fn raw_start(value: Option<&str>) -> PeriodLog {
        let mut log = start("2024-01-01");
        log.start_date = value.map(str::to_string);
        log
    }

    #[test]
    fn defaults_to_28_without_history() {
        assert_eq!(calculate_cycle_length(&[]), 28);
        assert_eq!(calculate_cycle_length(&[start("2024-01-01")]), 28);
    }

    #[test]
    fn two_starts_give_their_gap_in_any_order() {
        let forward = vec![start("2024-01-01"), start("2024-01-29")];
        let reversed = vec![start("2024-01-29"), start("2024-01-01")];
        assert_eq!(calculate_cycle_length(&forward), 28);
        assert_eq!(calculate_cycle_length(&reversed), 28);
    }

    #[test]
    fn averages_across_leap_day() {
        let logs = vec![start("2024-01-03"), start("2024-03-01"), start("2024-02-01")];
        assert_eq!(calculate_cycle_length(&logs), 29);
    }

    #[test]
    fn rounds_half_away_from_zero() {
        // gaps of 28 and 29 average to 28.5
        let logs = vec![start("2024-01-01"), start("2024-01-29"), start("2024-02-27")];
        assert_eq!(calculate_cycle_length(&logs), 29);
    }

    #[test]
    fn duplicate_dates_do_not_skew_average() {
        let logs = vec![
            start("2024-01-01"),
            start("2024-01-29"),
            start("2024-01-29"),
            start("2024-02-26"),
        ];
        assert_eq!(calculate_cycle_length(&logs), 28);
    }

    #[test]
    fn all_duplicates_fall_back_to_default() {
        let logs = vec![start("2024-01-10"), start("2024-01-10")];
        assert_eq!(calculate_cycle_length(&logs), 28);
    }

    #[test]
    fn ignores_period_end_records() {
        let logs = vec![
            start("2024-01-01"),
            PeriodLog::end(date("2024-01-20"), date("2024-01-24")),
            start("2024-01-31"),
        ];
        assert_eq!(calculate_cycle_length(&logs), 30);
    }

    #[test]
    fn skips_unparsable_dates_when_permissive() {
        let logs = vec![
            start("2024-01-01"),
            raw_start(Some("not-a-date")),
            raw_start(None),
            start("2024-01-27"),
        ];
        assert_eq!(calculate_cycle_length(&logs), 26);
    }

    #[test]
    fn predicts_from_single_start() {
        let prediction = predict_next_cycle(&[start("2024-01-01")], date("2030-06-01"));
        assert_eq!(prediction.period_start, date("2024-01-29"));
        assert_eq!(prediction.period_end, date("2024-02-03"));
        assert_eq!(prediction.ovulation_date, date("2024-01-15"));
        assert_eq!(prediction.fertile_start, date("2024-01-10"));
        assert_eq!(prediction.fertile_end, date("2024-01-16"));
        assert_eq!(prediction.cycle_length, 28);
        assert!(prediction.is_prediction);
    }

    #[test]
    fn empty_history_anchors_on_today() {
        let today = date("2024-12-20");
        let prediction = predict_next_cycle(&[], today);
        assert_eq!(prediction.period_start, date("2025-01-17"));
        assert_eq!(prediction.period_end, date("2025-01-22"));
    }

    #[test]
    fn anchors_on_most_recent_start_regardless_of_input_order() {
        let logs = vec![start("2024-01-01"), start("2024-02-28"), start("2024-01-30")];
        let prediction = predict_next_cycle(&logs, date("2030-01-01"));
        assert_eq!(prediction.cycle_length, 29);
        assert_eq!(prediction.period_start, date("2024-03-28"));
    }

    #[test]
    fn short_cycle_insight() {
        let logs = vec![start("2024-01-01"), start("2024-01-19")];
        let insights = cycle_insights(&logs);
        assert_eq!(insights, vec![CycleInsight::ShortCycle]);
        assert!(!insights.contains(&CycleInsight::LongCycle));
    }

    #[test]
    fn long_cycle_insight() {
        let logs = vec![start("2024-01-01"), start("2024-02-10")];
        assert_eq!(cycle_insights(&logs), vec![CycleInsight::LongCycle]);
    }

    #[test]
    fn evenly_spaced_cycles_are_very_regular() {
        let logs = vec![
            start("2024-01-02"),
            start("2024-01-30"),
            start("2024-02-27"),
            start("2024-03-26"),
        ];
        assert_eq!(cycle_insights(&logs), vec![CycleInsight::VeryRegular]);
    }

    #[test]
    fn regularity_only_looks_at_three_most_recent_starts() {
        // gaps of 24, 30, 30 average to 28; only the two newest gaps are judged
        let logs = vec![
            start("2024-01-01"),
            start("2024-01-25"),
            start("2024-02-24"),
            start("2024-03-25"),
        ];
        assert_eq!(calculate_cycle_length(&logs), 28);
        assert_eq!(cycle_insights(&logs), vec![CycleInsight::VeryRegular]);
    }

    #[test]
    fn uneven_cycles_show_variation() {
        // gaps of 28 and 38 days
        let logs = vec![start("2024-01-01"), start("2024-01-29"), start("2024-03-07")];
        let insights = cycle_insights(&logs);
        assert!(insights.contains(&CycleInsight::SomeVariation));
        assert!(!insights.contains(&CycleInsight::VeryRegular));
    }

    #[test]
    fn regularity_needs_three_starts() {
        let logs = vec![start("2024-01-01"), start("2024-01-29")];
        assert!(cycle_insights(&logs).is_empty());
    }

    #[test]
    fn warnings_come_before_regularity() {
        let logs = vec![start("2024-01-01"), start("2024-01-19"), start("2024-02-06")];
        assert_eq!(
            cycle_insights(&logs),
            vec![CycleInsight::ShortCycle, CycleInsight::VeryRegular]
        );
    }

    #[test]
    fn insight_messages_are_user_facing_text() {
        let logs = vec![start("2024-01-01"), start("2024-01-19")];
        let messages = insight_messages(&logs);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Your cycle is shorter than average"));
    }

    #[test]
    fn repeated_calls_are_identical() {
        let logs = vec![start("2024-03-01"), start("2024-02-01"), start("2024-01-03")];
        let today = date("2024-04-01");
        assert_eq!(calculate_cycle_length(&logs), calculate_cycle_length(&logs));
        assert_eq!(predict_next_cycle(&logs, today), predict_next_cycle(&logs, today));
        assert_eq!(cycle_insights(&logs), cycle_insights(&logs));
        assert_eq!(logs[0].start_date.as_deref(), Some("2024-03-01"));
    }

    #[test]
    fn predicted_dates_survive_formatting() {
        let prediction = predict_next_cycle(&[start("2023-12-20")], date("2024-01-01"));
        for day in [
            prediction.period_start,
            prediction.period_end,
            prediction.ovulation_date,
            prediction.fertile_start,
            prediction.fertile_end,
        ] {
            let text = day.format(DATE_FORMAT).to_string();
            assert_eq!(date(&text), day);
        }
        assert_eq!(prediction.period_start, date("2024-01-17"));
    }

    #[test]
    fn strict_policy_names_the_bad_record() {
        let bad = raw_start(Some("2024-13-40"));
        let id = bad.id;
        let predictor = Predictor::new(DatePolicy::Strict, FixedClock(date("2024-01-01")));
        let err = predictor.predict_next(&[start("2024-01-01"), bad]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidDate {
                id,
                field: "startDate",
                value: "2024-13-40".into(),
            }
        );
    }

    #[test]
    fn out_of_range_years_are_not_dates() {
        let logs = vec![raw_start(Some("+262142-12-31"))];
        let prediction = predict_next_cycle(&logs, date("2024-01-01"));
        assert_eq!(prediction.period_start, date("2024-01-29"));
        assert!(matches!(
            validate_period_logs(&logs),
            Err(ValidationError::InvalidDate { field: "startDate", .. })
        ));
    }

    #[test]
    fn padded_dates_fail_strict_validation() {
        let logs = vec![raw_start(Some(" 2024-01-01 "))];
        assert!(validate_period_logs(&logs).is_err());
        assert_eq!(period_starts(&logs), Vec::<NaiveDate>::new());
    }

    #[test]
    fn prediction_saturates_at_calendar_limits() {
        let late = predict_next_cycle(&[], NaiveDate::MAX);
        assert_eq!(late.period_start, NaiveDate::MAX);
        assert_eq!(late.period_end, NaiveDate::MAX);
        assert_eq!(late.ovulation_date, shift(NaiveDate::MAX, -14));

        let predictor = Predictor::new(DatePolicy::Strict, FixedClock(NaiveDate::MAX));
        assert!(predictor.predict_next(&[]).is_ok());
        assert_eq!(shift(NaiveDate::MIN, -5), NaiveDate::MIN);
    }

    #[test]
    fn strict_policy_rejects_missing_start() {
        let bad = raw_start(None);
        let id = bad.id;
        assert_eq!(
            validate_period_logs(&[bad]),
            Err(ValidationError::MissingStartDate { id })
        );
    }

    #[test]
    fn strict_policy_checks_end_dates() {
        let mut end = PeriodLog::end(date("2024-01-01"), date("2024-01-05"));
        end.end_date = Some("soon".into());
        assert!(matches!(
            validate_period_logs(&[end]),
            Err(ValidationError::InvalidDate { field: "endDate", .. })
        ));
    }

    #[test]
    fn permissive_predictor_uses_clock() {
        let predictor = Predictor::new(DatePolicy::Permissive, FixedClock(date("2024-02-01")));
        let logs = vec![raw_start(Some("garbage"))];
        let prediction = predictor.predict_next(&logs).unwrap();
        assert_eq!(prediction.period_start, date("2024-02-29"));
        assert_eq!(predictor.cycle_length(&logs).unwrap(), 28);
    }

    #[test]
    fn summary_without_history() {
        let summary = cycle_summary(&[start("2024-05-01")]);
        assert_eq!(summary.total_period_starts, 1);
        assert_eq!(summary.average_cycle_length, None);
        assert_eq!(summary.regularity, Regularity::Unknown);
        assert_eq!(summary.last_period_start, Some(date("2024-05-01")));
    }

    #[test]
    fn summary_statistics() {
        let logs = vec![
            start("2024-01-01"),
            start("2024-01-29"),
            start("2024-02-27"),
            start("2024-03-26"),
            PeriodLog::end(date("2024-01-01"), date("2024-01-05")),
            PeriodLog::end(date("2024-01-29"), date("2024-02-03")),
        ];
        let summary = cycle_summary(&logs);
        assert_eq!(summary.total_period_starts, 4);
        assert_eq!(summary.average_cycle_length, Some(28));
        assert_eq!(summary.shortest_cycle, Some(28));
        assert_eq!(summary.longest_cycle, Some(29));
        // period lengths 5 and 6 average to 5.5
        assert_eq!(summary.average_period_length, Some(6));
        assert_eq!(summary.regularity, Regularity::Regular);
        assert_eq!(summary.last_period_start, Some(date("2024-03-26")));
    }

    #[test]
    fn summary_drops_implausible_gaps() {
        let logs = vec![start("2024-01-01"), start("2024-01-29"), start("2024-06-01")];
        let summary = cycle_summary(&logs);
        assert_eq!(summary.longest_cycle, Some(28));
        assert_eq!(summary.average_period_length, Some(5));
        assert_eq!(summary.regularity, Regularity::NeedsMoreData);
    }

    #[test]
    fn regularity_classification() {
        assert_eq!(classify_regularity(&[28, 33, 28]), Regularity::SlightlyIrregular);
        assert_eq!(classify_regularity(&[21, 35, 24]), Regularity::Irregular);
        assert_eq!(classify_regularity(&[28, 29, 28, 30]), Regularity::Regular);
    }
}
