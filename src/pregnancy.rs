use crate::models::{ContractionLog, ContractionSummary, KickSession, KickSummary};

/// Summarise timed contractions: how long they last and how far apart they start.
pub fn contraction_summary(logs: &[ContractionLog]) -> Option<ContractionSummary> {
    if logs.is_empty() {
        return None;
    }

    let total_duration: i64 = logs.iter().map(|c| c.duration_secs).sum();
    let average_duration_secs = rounded_mean(total_duration, logs.len());

    let mut starts: Vec<_> = logs.iter().map(|c| c.start_time).collect();
    starts.sort_unstable();

    let intervals: Vec<i64> = starts
        .windows(2)
        .map(|w| (w[1] - w[0]).num_seconds())
        .collect();

    Some(ContractionSummary {
        total: logs.len(),
        average_duration_secs,
        average_interval_secs: (!intervals.is_empty())
            .then(|| rounded_mean(intervals.iter().sum(), intervals.len())),
        last_interval_secs: intervals.last().copied(),
    })
}

/// Totals over kick-counting sessions; `latest` is the most recent by timestamp.
pub fn kick_summary(sessions: &[KickSession]) -> Option<KickSummary> {
    if sessions.is_empty() {
        return None;
    }
    let total_kicks: u64 = sessions.iter().map(|s| u64::from(s.kick_count)).sum();
    Some(KickSummary {
        sessions: sessions.len(),
        total_kicks,
        average_kicks: (total_kicks as f64 / sessions.len() as f64).round() as u32,
        latest: sessions.iter().max_by_key(|s| s.timestamp).cloned(),
    })
}

fn rounded_mean(total: i64, count: usize) -> i64 {
    (total as f64 / count as f64).round() as i64
}

/// `"4m 05s"` style rendering for the CLI.
pub fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{}m {:02}s", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn contraction(start: &str, secs: i64) -> ContractionLog {
        let start = at(start);
        ContractionLog::new(start, start + Duration::seconds(secs))
    }

    #[test]
    fn no_summary_without_contractions() {
        assert!(contraction_summary(&[]).is_none());
    }

    #[test]
    fn single_contraction_has_no_interval() {
        let summary = contraction_summary(&[contraction("2024-05-01T10:00:00Z", 45)]).unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.average_duration_secs, 45);
        assert_eq!(summary.average_interval_secs, None);
        assert_eq!(summary.last_interval_secs, None);
    }

    #[test]
    fn intervals_use_sorted_start_times() {
        let logs = vec![
            contraction("2024-05-01T10:10:00Z", 60),
            contraction("2024-05-01T10:00:00Z", 40),
            contraction("2024-05-01T10:04:00Z", 50),
        ];
        let summary = contraction_summary(&logs).unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.average_duration_secs, 50);
        // 240s then 360s apart
        assert_eq!(summary.average_interval_secs, Some(300));
        assert_eq!(summary.last_interval_secs, Some(360));
    }

    #[test]
    fn negative_spans_count_as_zero_duration() {
        let start = at("2024-05-01T10:00:00Z");
        let log = ContractionLog::new(start, start - Duration::seconds(5));
        assert_eq!(log.duration_secs, 0);
    }

    #[test]
    fn kick_sessions_are_totalled() {
        assert!(kick_summary(&[]).is_none());
        let sessions = vec![
            KickSession::new(at("2024-05-02T09:00:00Z"), 12),
            KickSession::new(at("2024-05-03T09:00:00Z"), 7),
            KickSession::new(at("2024-05-01T09:00:00Z"), 10),
        ];
        let summary = kick_summary(&sessions).unwrap();
        assert_eq!(summary.sessions, 3);
        assert_eq!(summary.total_kicks, 29);
        assert_eq!(summary.average_kicks, 10);
        assert_eq!(summary.latest.map(|s| s.kick_count), Some(7));
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_duration(245), "4m 05s");
        assert_eq!(format_duration(59), "0m 59s");
    }
}
