use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Calendar date format used by every stored and printed date.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    PeriodStart,
    PeriodEnd,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlowLevel {
    Light,
    Medium,
    Heavy,
}

impl std::str::FromStr for FlowLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "medium" => Ok(Self::Medium),
            "heavy" => Ok(Self::Heavy),
            other => Err(format!("unknown flow {other:?}, expected light, medium or heavy")),
        }
    }
}

/// Optional details recorded alongside a period start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeriodDetails {
    pub flow: Option<FlowLevel>,
    pub symptoms: Vec<String>,
    pub notes: Option<String>,
    pub duration_days: Option<u32>,
}

/// A period log as it sits in the store.
///
/// Dates are kept as the raw `yyyy-MM-dd` strings the store holds; the
/// predictor decides what to do with values that fail to parse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeriodLog {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: LogKind,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub flow: Option<FlowLevel>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub duration_days: Option<u32>,
}

impl PeriodLog {
    pub fn start(date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: LogKind::PeriodStart,
            start_date: Some(date.format(DATE_FORMAT).to_string()),
            end_date: None,
            flow: None,
            symptoms: Vec::new(),
            notes: None,
            duration_days: None,
        }
    }

    pub fn with_details(mut self, details: PeriodDetails) -> Self {
        self.flow = details.flow;
        self.symptoms = details.symptoms;
        self.notes = details.notes.filter(|n| !n.trim().is_empty());
        self.duration_days = details.duration_days;
        self
    }

    pub fn end(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            kind: LogKind::PeriodEnd,
            end_date: Some(end.format(DATE_FORMAT).to_string()),
            ..Self::start(start)
        }
    }

    pub fn is_start(&self) -> bool {
        self.kind == LogKind::PeriodStart
    }

    /// Parsed `startDate`, or `None` when absent or malformed.
    pub fn parsed_start(&self) -> Option<NaiveDate> {
        self.start_date.as_deref().and_then(parse_date)
    }

    pub fn parsed_end(&self) -> Option<NaiveDate> {
        self.end_date.as_deref().and_then(parse_date)
    }
}

/// Parse an exact `yyyy-MM-dd` date. Signed, short, or padded years are rejected.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let bytes = value.as_bytes();
    let shaped = bytes.len() == 10
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| if i == 4 || i == 7 { *b == b'-' } else { b.is_ascii_digit() });
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

/// Next-cycle forecast. Always flagged as a prediction so callers can tell
/// it apart from logged history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CyclePrediction {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub ovulation_date: NaiveDate,
    pub fertile_start: NaiveDate,
    pub fertile_end: NaiveDate,
    pub cycle_length: u32,
    pub is_prediction: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Regularity {
    Regular,
    SlightlyIrregular,
    Irregular,
    NeedsMoreData,
    Unknown,
}

impl std::fmt::Display for Regularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Regular => "Regular",
            Self::SlightlyIrregular => "Slightly Irregular",
            Self::Irregular => "Irregular",
            Self::NeedsMoreData => "Needs More Data",
            Self::Unknown => "N/A",
        };
        f.write_str(label)
    }
}

/// Aggregate statistics for the summary view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CycleSummary {
    pub total_period_starts: usize,
    pub average_cycle_length: Option<u32>,
    pub average_period_length: Option<u32>,
    pub shortest_cycle: Option<i64>,
    pub longest_cycle: Option<i64>,
    pub regularity: Regularity,
    pub last_period_start: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContractionLog {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_secs: i64,
}

impl ContractionLog {
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_time,
            end_time,
            duration_secs: (end_time - start_time).num_seconds().max(0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContractionSummary {
    pub total: usize,
    pub average_duration_secs: i64,
    pub average_interval_secs: Option<i64>,
    pub last_interval_secs: Option<i64>,
}

/// One fetal-movement counting session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KickSession {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kick_count: u32,
}

impl KickSession {
    pub fn new(timestamp: DateTime<Utc>, kick_count: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            kick_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KickSummary {
    pub sessions: usize,
    pub total_kicks: u64,
    pub average_kicks: u32,
    pub latest: Option<KickSession>,
}

/// Everything persisted in the vault.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    #[serde(default)]
    pub period_logs: Vec<PeriodLog>,
    #[serde(default)]
    pub contractions: Vec<ContractionLog>,
    #[serde(default)]
    pub kick_sessions: Vec<KickSession>,
}
