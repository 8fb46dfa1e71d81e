//! Weekly history summarisation. Date handling is deliberately
//! lexical-numeric: a strict `YYYY-MM-DD` pattern concatenated into a number,
//! not calendar arithmetic.

use serde::Serialize;

use crate::model::WorkoutSession;

/// Aggregates over the sessions inside a requested window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekSummary {
    pub sessions_count: usize,
    pub total_minutes: u32,
    /// Mean of numeric ratings, rounded to one decimal. Null when no session
    /// in the window carries a rating.
    pub avg_session_rpe: Option<f64>,
}

/// Parse a strict `YYYY-MM-DD` string into its concatenated numeric form,
/// e.g. "2026-01-26" -> 20260126. Anything else is unparseable.
pub fn date_num(date: &str) -> Option<u32> {
    let bytes = date.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let digits = [&bytes[0..4], &bytes[5..7], &bytes[8..10]].concat();
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let mut value: u32 = 0;
    for d in digits {
        value = value * 10 + u32::from(d - b'0');
    }
    Some(value)
}

/// Filter sessions to the inclusive `[start, end]` window and sort them
/// descending by date. Unparseable session dates are excluded; an
/// unparseable bound excludes everything.
pub fn sessions_in_range(all: &[WorkoutSession], start: &str, end: &str) -> Vec<WorkoutSession> {
    let (Some(start), Some(end)) = (date_num(start), date_num(end)) else {
        return Vec::new();
    };
    let mut matched: Vec<(u32, WorkoutSession)> = all
        .iter()
        .filter_map(|s| {
            let d = date_num(&s.date)?;
            (d >= start && d <= end).then(|| (d, s.clone()))
        })
        .collect();
    matched.sort_by(|a, b| b.0.cmp(&a.0));
    matched.into_iter().map(|(_, s)| s).collect()
}

pub fn summarize(sessions: &[WorkoutSession]) -> WeekSummary {
    let total_minutes = sessions.iter().map(|s| s.duration_min).sum();
    let ratings: Vec<f64> = sessions
        .iter()
        .filter_map(|s| s.perceived_exertion_rpe)
        .collect();
    let avg_session_rpe = if ratings.is_empty() {
        None
    } else {
        let mean = ratings.iter().sum::<f64>() / ratings.len() as f64;
        Some((mean * 10.0).round() / 10.0)
    };
    WeekSummary {
        sessions_count: sessions.len(),
        total_minutes,
        avg_session_rpe,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::DemoHistory;
    use crate::providers::HistoryProvider;

    fn unrated(date: &str, duration: u32) -> WorkoutSession {
        WorkoutSession {
            session_id: format!("s_{date}"),
            date: date.to_string(),
            title: "Session".to_string(),
            duration_min: duration,
            perceived_exertion_rpe: None,
        }
    }

    #[test]
    fn date_num_accepts_only_strict_iso_dates() {
        assert_eq!(date_num("2026-01-26"), Some(20260126));
        assert_eq!(date_num("2026-1-26"), None);
        assert_eq!(date_num("2026/01/26"), None);
        assert_eq!(date_num("2026-01-26T00:00"), None);
        assert_eq!(date_num("not-a-date"), None);
    }

    #[test]
    fn range_is_inclusive_and_sorted_descending() {
        let all = DemoHistory.sessions("demo_user");
        let in_range = sessions_in_range(&all, "2026-01-22", "2026-01-26");
        let dates: Vec<&str> = in_range.iter().map(|s| s.date.as_str()).collect();
        assert_eq!(dates, vec!["2026-01-26", "2026-01-24", "2026-01-22"]);

        let narrowed = sessions_in_range(&all, "2026-01-23", "2026-01-25");
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed[0].date, "2026-01-24");
    }

    #[test]
    fn unparseable_bound_matches_nothing() {
        let all = DemoHistory.sessions("demo_user");
        assert!(sessions_in_range(&all, "garbage", "2026-01-26").is_empty());
        assert!(sessions_in_range(&all, "2026-01-22", "garbage").is_empty());
    }

    #[test]
    fn unparseable_session_date_is_excluded() {
        let mut all = DemoHistory.sessions("demo_user");
        all.push(unrated("2026_01_23", 40));
        let in_range = sessions_in_range(&all, "2026-01-01", "2026-01-31");
        assert_eq!(in_range.len(), 3);
    }

    #[test]
    fn summary_matches_demo_fixture_week() {
        let all = DemoHistory.sessions("demo_user");
        let in_range = sessions_in_range(&all, "2026-01-22", "2026-01-26");
        let summary = summarize(&in_range);
        assert_eq!(summary.sessions_count, 3);
        assert_eq!(summary.total_minutes, 175);
        assert_eq!(summary.avg_session_rpe, Some(7.8));
    }

    #[test]
    fn avg_rpe_is_null_without_ratings() {
        let sessions = vec![unrated("2026-02-01", 30), unrated("2026-02-02", 45)];
        let summary = summarize(&sessions);
        assert_eq!(summary.sessions_count, 2);
        assert_eq!(summary.total_minutes, 75);
        assert_eq!(summary.avg_session_rpe, None);
    }
}
