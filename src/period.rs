//! Symbolic publish-date windows ("last day" … "all").
//!
//! A [`PeriodFilter`] carries no timestamp of its own; the lower bound is
//! derived from a reference time on each search.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PeriodFilter {
    LastHour,
    LastDay,
    LastWeek,
    LastMonth,
    #[serde(rename = "last_3_months")]
    Last3Months,
    LastYear,
    #[default]
    All,
}

impl PeriodFilter {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hour" | "last_hour" => Some(Self::LastHour),
            "day" | "last_day" => Some(Self::LastDay),
            "week" | "last_week" => Some(Self::LastWeek),
            "month" | "last_month" => Some(Self::LastMonth),
            "3months" | "last_3_months" => Some(Self::Last3Months),
            "year" | "last_year" => Some(Self::LastYear),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    fn window(&self) -> Option<Duration> {
        match self {
            Self::LastHour => Some(Duration::hours(1)),
            Self::LastDay => Some(Duration::hours(24)),
            Self::LastWeek => Some(Duration::days(7)),
            Self::LastMonth => Some(Duration::days(30)),
            Self::Last3Months => Some(Duration::days(90)),
            Self::LastYear => Some(Duration::days(365)),
            Self::All => None,
        }
    }

    /// Lower publish-time bound relative to `now`; `None` means unbounded.
    pub fn lower_bound(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.window().map(|w| now - w)
    }
}

/// RFC 3339 with a `Z` suffix, as the upstream search APIs expect.
pub fn format_rfc3339(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_last_day_is_24_hours_back() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let bound = PeriodFilter::LastDay.lower_bound(now).unwrap();
        assert_eq!(bound, Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_all_has_no_bound() {
        let now = Utc::now();
        assert_eq!(PeriodFilter::All.lower_bound(now), None);
    }

    #[test]
    fn test_year_window() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        let bound = PeriodFilter::LastYear.lower_bound(now).unwrap();
        assert_eq!((now - bound).num_days(), 365);
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(PeriodFilter::parse("week"), Some(PeriodFilter::LastWeek));
        assert_eq!(PeriodFilter::parse("last_3_months"), Some(PeriodFilter::Last3Months));
        assert_eq!(PeriodFilter::parse("decade"), None);
    }

    #[test]
    fn test_format_rfc3339() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_rfc3339(ts), "2024-01-02T03:04:05Z");
    }
}
