// Date range handling shared by every metric endpoint.
// `from` / `to` arrive as query strings and end up as `createdAt` bounds.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use mongodb::bson::{self, doc, Document};
use serde::Deserialize;
use utoipa::IntoParams;

use super::error::AppError;

pub const WEEKLY_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DateRangeQuery {
    /// Lower bound (RFC 3339 or YYYY-MM-DD)
    pub from: Option<String>,
    /// Upper bound (RFC 3339 or YYYY-MM-DD)
    pub to: Option<String>,
}

impl DateRangeQuery {
    pub fn parse(&self) -> Result<DateRange, AppError> {
        Ok(DateRange {
            from: parse_optional(self.from.as_deref())?,
            to: parse_optional(self.to.as_deref())?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn is_filtered(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    /// `{ createdAt: { $gte, $lte } }` with only the bounds that were given.
    pub fn created_at_filter(&self) -> Document {
        if !self.is_filtered() {
            return Document::new();
        }

        let mut bounds = Document::new();
        if let Some(from) = self.from {
            bounds.insert("$gte", to_bson_datetime(from));
        }
        if let Some(to) = self.to {
            bounds.insert("$lte", to_bson_datetime(to));
        }

        doc! { "createdAt": bounds }
    }

    /// Filter behind the "weekly" counters.
    ///
    /// With an active range the weekly figure covers that same range,
    /// otherwise it is the trailing seven days ending at `now`.
    pub fn weekly_filter(&self, now: DateTime<Utc>) -> Document {
        if self.is_filtered() {
            return self.created_at_filter();
        }

        let week_ago = now - Duration::days(WEEKLY_WINDOW_DAYS);
        doc! { "createdAt": { "$gte": to_bson_datetime(week_ago) } }
    }

    /// Resolves open bounds to `[now - default_days, now]`.
    pub fn resolve_or_last_days(
        &self,
        now: DateTime<Utc>,
        default_days: i64,
    ) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.from.unwrap_or(now - Duration::days(default_days));
        let end = self.to.unwrap_or(now);
        (start, end)
    }
}

fn parse_optional(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_date(value).map(Some),
    }
}

/// Accepts RFC 3339 timestamps, naive `YYYY-MM-DDTHH:MM:SS[.fff]` (read as UTC)
/// and bare `YYYY-MM-DD` dates (UTC midnight).
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>, AppError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&midnight));
        }
    }

    Err(AppError::InvalidRequest(format!("Invalid date '{}'", raw)))
}

pub fn to_bson_datetime(dt: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(dt.timestamp_millis())
}

pub fn from_bson_datetime(dt: bson::DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis())
}

/// ISO string with millisecond precision and a `Z` suffix.
pub fn to_iso_string(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn bson_to_iso(dt: Option<bson::DateTime>) -> Option<String> {
    dt.and_then(from_bson_datetime).map(to_iso_string)
}
