// PostHog `$exception` events, reshaped for the monitor page.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

use super::http_client;
use crate::{
    config::PostHogConfig,
    utils::{bucket_key, formatted_label, to_iso_string, AppError, BucketSize, WEEKLY_WINDOW_DAYS},
};

pub const DEFAULT_LIST_LIMIT: u32 = 100;
pub const DEFAULT_TYPES_LIMIT: u32 = 1000;
const MAX_EXAMPLES: usize = 3;
const NO_MESSAGE: &str = "No message";

// ==================== UPSTREAM MODELS ====================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostHogEvent {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsPage {
    #[serde(default)]
    pub results: Vec<PostHogEvent>,
    #[serde(default)]
    pub count: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityClass {
    Error,
    Warning,
    Critical,
}

impl SeverityClass {
    pub fn of(severity: &str) -> Self {
        match severity {
            "critical" | "fatal" => SeverityClass::Critical,
            "warning" | "warn" => SeverityClass::Warning,
            _ => SeverityClass::Error,
        }
    }
}

/// Rank used to keep the most critical severity seen for a type.
fn severity_rank(severity: &str) -> u8 {
    match severity {
        "fatal" => 4,
        "critical" => 3,
        "warning" => 2,
        _ => 1,
    }
}

impl PostHogEvent {
    /// Non-empty string property
    fn prop(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn error_type(&self) -> &str {
        self.prop("$exception_type").unwrap_or("Unknown")
    }

    pub fn declared_types(&self) -> Vec<String> {
        match self.properties.get("$exception_types") {
            Some(Value::Array(types)) => types
                .iter()
                .map(|value| match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// `$exception_types` when present, otherwise the single `$exception_type`.
    pub fn types(&self) -> Vec<String> {
        let declared = self.declared_types();
        if declared.is_empty() {
            vec![self.error_type().to_string()]
        } else {
            declared
        }
    }

    pub fn message(&self) -> &str {
        self.prop("$exception_message").unwrap_or(NO_MESSAGE)
    }

    pub fn severity(&self) -> &str {
        self.prop("$exception_severity").unwrap_or("error")
    }

    pub fn severity_class(&self) -> SeverityClass {
        SeverityClass::of(self.severity())
    }

    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc))
    }
}

// ==================== RESPONSE MODELS ====================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedError {
    pub id: Value,
    pub timestamp: Option<String>,
    pub error_type: String,
    pub error_types: Vec<String>,
    pub error_message: String,
    pub error_stack: String,
    pub url: String,
    pub user_agent: String,
    pub user_id: String,
    pub severity: String,
    pub source: String,
}

impl From<&PostHogEvent> for ProcessedError {
    fn from(event: &PostHogEvent) -> Self {
        let text = |key: &str, default: &str| event.prop(key).unwrap_or(default).to_string();

        ProcessedError {
            id: event.id.clone(),
            timestamp: event.timestamp.clone(),
            error_type: event.error_type().to_string(),
            error_types: event.declared_types(),
            error_message: event.message().to_string(),
            error_stack: text("$exception_stack_trace_raw", ""),
            url: text("$current_url", "Unknown"),
            user_agent: text("$user_agent", "Unknown"),
            user_id: text("distinct_id", "Anonymous"),
            severity: event.severity().to_string(),
            source: text("$exception_source", "javascript"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorsListResponse {
    pub success: bool,
    pub data: Vec<ProcessedError>,
    pub count: usize,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorTypeSummary {
    #[serde(rename = "type")]
    pub error_type: String,
    pub count: u64,
    pub last_occurrence: Option<String>,
    pub severity: String,
    pub examples: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorTypesResponse {
    pub success: bool,
    pub data: Vec<ErrorTypeSummary>,
    pub total: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct HourlyErrors {
    pub time: String,
    pub errors: u64,
    pub warnings: u64,
    pub critical: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStats {
    pub total_errors: u64,
    pub critical_errors: u64,
    pub warnings: u64,
    pub error_types: BTreeMap<String, u64>,
    pub chart_data: Vec<HourlyErrors>,
    pub weekly_count: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorStatsResponse {
    pub success: bool,
    pub data: ErrorStats,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorChartPoint {
    pub time: String,
    pub errors: u64,
    pub warnings: u64,
    pub critical: u64,
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted_time: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EventWindow {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl EventWindow {
    pub fn new(from: Option<&str>, to: Option<&str>) -> Self {
        let clean = |raw: Option<&str>| {
            raw.map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        EventWindow {
            from: clean(from),
            to: clean(to),
        }
    }

    pub fn is_filtered(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    /// `hour` for filtered windows, `day` otherwise.
    pub fn resolve_bucket(&self, group_by: Option<&str>) -> BucketSize {
        match group_by.map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => BucketSize::parse(raw),
            None if self.is_filtered() => BucketSize::Hour,
            None => BucketSize::Day,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorChartResponse {
    pub success: bool,
    pub data: Vec<ErrorChartPoint>,
    pub date_range: EventWindow,
    pub group_by: BucketSize,
}

// ==================== AGGREGATION ====================

pub fn summarize_types(events: &[PostHogEvent]) -> Vec<ErrorTypeSummary> {
    let mut summaries: Vec<ErrorTypeSummary> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for event in events {
        let severity = event.severity();
        let message = event.message();
        let seen_at = event.timestamp_utc();

        for error_type in event.types() {
            let position = *index.entry(error_type.clone()).or_insert_with(|| {
                summaries.push(ErrorTypeSummary {
                    error_type,
                    count: 0,
                    last_occurrence: event.timestamp.clone(),
                    severity: severity.to_string(),
                    examples: Vec::new(),
                });
                summaries.len() - 1
            });
            let summary = &mut summaries[position];

            summary.count += 1;

            let last = summary
                .last_occurrence
                .as_deref()
                .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok());
            if let (Some(seen), Some(last)) = (seen_at, last) {
                if seen > last {
                    summary.last_occurrence = event.timestamp.clone();
                }
            }

            if severity_rank(severity) > severity_rank(&summary.severity) {
                summary.severity = severity.to_string();
            }

            if summary.examples.len() < MAX_EXAMPLES
                && message != NO_MESSAGE
                && !summary.examples.iter().any(|example| example == message)
            {
                summary.examples.push(message.to_string());
            }
        }
    }

    summaries.sort_by(|a, b| b.count.cmp(&a.count));
    summaries
}

/// Totals and per-hour series; every type occurrence counts once.
pub fn compute_stats(events: &[PostHogEvent]) -> ErrorStats {
    let mut stats = ErrorStats::default();
    let mut hourly: BTreeMap<String, HourlyErrors> = BTreeMap::new();

    for event in events {
        let types = event.types();
        let occurrences = types.len() as u64;
        let class = event.severity_class();

        stats.total_errors += occurrences;
        match class {
            SeverityClass::Critical => stats.critical_errors += occurrences,
            SeverityClass::Warning => stats.warnings += occurrences,
            SeverityClass::Error => {}
        }

        for error_type in types {
            *stats.error_types.entry(error_type).or_insert(0) += 1;
        }

        let Some(ts) = event.timestamp_utc() else {
            continue;
        };
        let key = bucket_key(ts, BucketSize::Hour);
        let point = hourly.entry(key.clone()).or_insert_with(|| HourlyErrors {
            time: key,
            ..Default::default()
        });
        match class {
            SeverityClass::Critical => point.critical += occurrences,
            SeverityClass::Warning => point.warnings += occurrences,
            SeverityClass::Error => point.errors += occurrences,
        }
    }

    stats.chart_data = hourly.into_values().collect();
    stats
}

/// One count per event, bucketed by `size`, in chronological order.
pub fn bucket_events(events: &[PostHogEvent], size: BucketSize) -> Vec<ErrorChartPoint> {
    let mut buckets: BTreeMap<String, ErrorChartPoint> = BTreeMap::new();

    for event in events {
        let Some(ts) = event.timestamp_utc() else {
            log::debug!("Skipping PostHog event without a valid timestamp");
            continue;
        };
        let key = bucket_key(ts, size);
        let point = buckets.entry(key.clone()).or_insert_with(|| ErrorChartPoint {
            formatted_time: formatted_label(&key, size),
            time: key,
            ..Default::default()
        });

        match event.severity_class() {
            SeverityClass::Critical => point.critical += 1,
            SeverityClass::Warning => point.warnings += 1,
            SeverityClass::Error => point.errors += 1,
        }
        point.total += 1;
    }

    buckets.into_values().collect()
}

// ==================== UPSTREAM CALLS ====================

fn credentials(config: &PostHogConfig) -> Result<(&str, &str), AppError> {
    config
        .credentials()
        .ok_or_else(|| AppError::ConfigError("PostHog configuration missing".to_string()))
}

pub fn events_url(
    host: &str,
    project_id: &str,
    after: Option<&str>,
    before: Option<&str>,
    limit: Option<u32>,
) -> String {
    let mut url = format!(
        "{}/api/projects/{}/events/?event=%24exception",
        host.trim_end_matches('/'),
        urlencoding::encode(project_id)
    );
    if let Some(after) = after {
        url.push_str("&after=");
        url.push_str(&urlencoding::encode(after));
    }
    if let Some(before) = before {
        url.push_str("&before=");
        url.push_str(&urlencoding::encode(before));
    }
    if let Some(limit) = limit {
        url.push_str(&format!("&limit={}", limit));
    }
    url
}

pub async fn fetch_events(
    config: &PostHogConfig,
    after: Option<&str>,
    before: Option<&str>,
    limit: Option<u32>,
) -> Result<EventsPage, AppError> {
    let (api_key, project_id) = credentials(config)?;
    let url = events_url(&config.host, project_id, after, before, limit);

    log::debug!("🔎 PostHog events: {}", url);

    let response = http_client()
        .get(&url)
        .bearer_auth(api_key)
        .header("Content-Type", "application/json")
        .timeout(std::time::Duration::from_secs(30))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::HttpClientError(format!(
            "PostHog API error: {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        )));
    }

    Ok(response.json::<EventsPage>().await?)
}

// ==================== SERVICE FUNCTIONS ====================

/// GET /api/posthog/errors
pub async fn list_errors(
    config: &PostHogConfig,
    window: &EventWindow,
    limit: Option<u32>,
) -> Result<ErrorsListResponse, AppError> {
    let page = fetch_events(
        config,
        window.from.as_deref(),
        window.to.as_deref(),
        Some(limit.unwrap_or(DEFAULT_LIST_LIMIT)),
    )
    .await?;

    let data: Vec<ProcessedError> = page.results.iter().map(ProcessedError::from).collect();

    Ok(ErrorsListResponse {
        success: true,
        count: data.len(),
        total: page.count.unwrap_or(0),
        data,
    })
}

/// GET /api/posthog/errors/types
pub async fn error_types(
    config: &PostHogConfig,
    window: &EventWindow,
    limit: Option<u32>,
) -> Result<ErrorTypesResponse, AppError> {
    let page = fetch_events(
        config,
        window.from.as_deref(),
        window.to.as_deref(),
        Some(limit.unwrap_or(DEFAULT_TYPES_LIMIT)),
    )
    .await?;

    let data = summarize_types(&page.results);

    Ok(ErrorTypesResponse {
        success: true,
        total: data.len(),
        data,
    })
}

/// GET /api/posthog/errors/stats
pub async fn error_stats(
    config: &PostHogConfig,
    window: &EventWindow,
    now: DateTime<Utc>,
) -> Result<ErrorStatsResponse, AppError> {
    let page = fetch_events(config, window.from.as_deref(), window.to.as_deref(), None).await?;
    let mut stats = compute_stats(&page.results);

    stats.weekly_count = if window.is_filtered() {
        let week_ago = to_iso_string(now - Duration::days(WEEKLY_WINDOW_DAYS));
        match fetch_events(config, Some(&week_ago), None, None).await {
            Ok(weekly) => weekly.results.len() as u64,
            Err(e) => {
                log::warn!("⚠️  PostHog weekly lookup failed: {}", e);
                0
            }
        }
    } else {
        stats.total_errors
    };

    Ok(ErrorStatsResponse {
        success: true,
        data: stats,
    })
}

/// GET /api/posthog/errors/chart-data
pub async fn error_chart(
    config: &PostHogConfig,
    window: EventWindow,
    group_by: Option<&str>,
) -> Result<ErrorChartResponse, AppError> {
    let size = window.resolve_bucket(group_by);
    let page = fetch_events(config, window.from.as_deref(), window.to.as_deref(), None).await?;

    Ok(ErrorChartResponse {
        success: true,
        data: bucket_events(&page.results, size),
        date_range: window,
        group_by: size,
    })
}
