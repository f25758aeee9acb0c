// Calendar truncation used by the chart endpoints. Everything is UTC.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketSize {
    Hour,
    Day,
    Week,
}

impl BucketSize {
    /// Unknown values fall back to `Hour`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "day" => BucketSize::Day,
            "week" => BucketSize::Week,
            _ => BucketSize::Hour,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BucketSize::Hour => "hour",
            BucketSize::Day => "day",
            BucketSize::Week => "week",
        }
    }
}

pub fn bucket_key(ts: DateTime<Utc>, size: BucketSize) -> String {
    match size {
        BucketSize::Hour => format!("{:02}:00", ts.hour()),
        BucketSize::Day => ts.format("%Y-%m-%d").to_string(),
        BucketSize::Week => week_start(ts.date_naive()).format("%Y-%m-%d").to_string(),
    }
}

/// Sunday that opens the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_sunday() as i64)
}

/// Display label for a bucket key: `dd/MM` for days, `Sem N` for weeks.
pub fn formatted_label(key: &str, size: BucketSize) -> Option<String> {
    match size {
        BucketSize::Hour => None,
        BucketSize::Day => NaiveDate::parse_from_str(key, "%Y-%m-%d")
            .ok()
            .map(|date| date.format("%d/%m").to_string()),
        BucketSize::Week => NaiveDate::parse_from_str(key, "%Y-%m-%d")
            .ok()
            .map(|date| format!("Sem {}", week_of_year(date))),
    }
}

/// Week number counted from 1 January with Sunday-start weeks.
pub fn week_of_year(date: NaiveDate) -> i64 {
    let start_of_year = NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date);
    let days_since_start = (date - start_of_year).num_days();
    let offset = start_of_year.weekday().num_days_from_sunday() as i64;
    (days_since_start + offset + 1 + 6) / 7
}

/// Every `YYYY-MM-DD` key from `start` to `end`, both inclusive.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> Vec<String> {
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        days.push(current.format("%Y-%m-%d").to_string());
        current += Duration::days(1);
    }
    days
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_group_by() {
        assert_eq!(BucketSize::parse("day"), BucketSize::Day);
        assert_eq!(BucketSize::parse("WEEK"), BucketSize::Week);
        assert_eq!(BucketSize::parse("hour"), BucketSize::Hour);
        assert_eq!(BucketSize::parse("month"), BucketSize::Hour);
    }

    #[test]
    fn test_bucket_keys() {
        // 2024-03-14 is a Thursday
        let ts = Utc.with_ymd_and_hms(2024, 3, 14, 7, 45, 0).unwrap();
        assert_eq!(bucket_key(ts, BucketSize::Hour), "07:00");
        assert_eq!(bucket_key(ts, BucketSize::Day), "2024-03-14");
        assert_eq!(bucket_key(ts, BucketSize::Week), "2024-03-10");
    }

    #[test]
    fn test_week_start_on_sunday_is_identity() {
        assert_eq!(week_start(date(2024, 3, 10)), date(2024, 3, 10));
        assert_eq!(week_start(date(2024, 3, 16)), date(2024, 3, 10));
    }

    #[test]
    fn test_formatted_labels() {
        assert_eq!(formatted_label("2024-03-14", BucketSize::Day).unwrap(), "14/03");
        assert_eq!(formatted_label("07:00", BucketSize::Hour), None);
        assert_eq!(formatted_label("garbage", BucketSize::Day), None);
    }

    #[test]
    fn test_week_of_year() {
        // 2023-01-01 is a Sunday
        assert_eq!(week_of_year(date(2023, 1, 1)), 1);
        assert_eq!(week_of_year(date(2023, 1, 7)), 1);
        assert_eq!(week_of_year(date(2023, 1, 8)), 2);
        // 2024-01-01 is a Monday, so Saturday the 6th still belongs to week 1
        assert_eq!(week_of_year(date(2024, 1, 6)), 1);
        assert_eq!(week_of_year(date(2024, 1, 7)), 2);
        assert_eq!(formatted_label("2024-01-07", BucketSize::Week).unwrap(), "Sem 2");
    }

    #[test]
    fn test_days_between_is_inclusive() {
        let days = days_between(date(2024, 2, 27), date(2024, 3, 1));
        assert_eq!(days, vec!["2024-02-27", "2024-02-28", "2024-02-29", "2024-03-01"]);
        assert!(days_between(date(2024, 3, 2), date(2024, 3, 1)).is_empty());
    }
}
