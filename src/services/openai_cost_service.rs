use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use utoipa::ToSchema;

use super::{exchange_rate_service, http_client};
use crate::utils::AppError;

const OPENAI_COSTS_URL: &str = "https://api.openai.com/v1/organization/costs";

/// Upper bound on `next_page` hops for a single request
const MAX_PAGES: usize = 20;

// ==================== UPSTREAM MODELS ====================

#[derive(Debug, Deserialize)]
pub struct CostAmount {
    #[serde(default)]
    pub value: f64,
}

#[derive(Debug, Deserialize)]
pub struct CostResult {
    pub amount: CostAmount,
    #[serde(default)]
    pub line_item: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CostBucket {
    #[serde(default)]
    pub results: Vec<CostResult>,
}

#[derive(Debug, Deserialize)]
pub struct CostPage {
    #[serde(default)]
    pub data: Vec<CostBucket>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_page: Option<String>,
}

// ==================== RESPONSE MODELS ====================

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ModelCost {
    pub model: String,
    #[serde(rename = "type")]
    pub cost_type: String,
    /// BRL, rounded to 4 decimals
    pub total_cost: f64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CostTotals {
    pub total_cost: f64,
    pub input_cost: f64,
    pub output_cost: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CostsResponse {
    pub success: bool,
    pub data: Vec<ModelCost>,
    pub totals: CostTotals,
    pub currency: String,
    /// USD→BRL rate applied to every line
    pub rate: f64,
}

// ==================== AGGREGATION ====================

pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// `"gpt-4o-mini-2024-07-18, input"` → `("gpt-4o-mini-2024-07-18", "input")`
fn split_line_item(line_item: &str) -> Option<(&str, &str)> {
    let mut parts = line_item.split(", ");
    let model = parts.next()?;
    let cost_type = parts.next()?;
    Some((model, cost_type))
}

/// Sums USD amounts per (model, type), converts to BRL and sorts by model then type.
pub fn aggregate_costs(buckets: &[CostBucket], usd_to_brl: f64) -> Vec<ModelCost> {
    let mut sums: BTreeMap<(String, String), f64> = BTreeMap::new();

    for result in buckets.iter().flat_map(|bucket| bucket.results.iter()) {
        let Some((model, cost_type)) = result.line_item.as_deref().and_then(split_line_item) else {
            continue;
        };
        *sums
            .entry((model.to_string(), cost_type.to_string()))
            .or_insert(0.0) += result.amount.value;
    }

    sums.into_iter()
        .map(|((model, cost_type), usd)| ModelCost {
            model,
            cost_type,
            total_cost: round4(usd * usd_to_brl),
        })
        .collect()
}

/// Input and output sums match on the type name, so "cached input" counts as input.
pub fn compute_totals(costs: &[ModelCost]) -> CostTotals {
    let mut totals = CostTotals::default();

    for cost in costs {
        totals.total_cost += cost.total_cost;
        let cost_type = cost.cost_type.to_lowercase();
        if cost_type.contains("input") {
            totals.input_cost += cost.total_cost;
        } else if cost_type.contains("output") {
            totals.output_cost += cost.total_cost;
        }
    }

    CostTotals {
        total_cost: round4(totals.total_cost),
        input_cost: round4(totals.input_cost),
        output_cost: round4(totals.output_cost),
    }
}

/// `start_time` / `end_time` are required unix seconds.
pub fn parse_time_window(
    start_time: Option<&str>,
    end_time: Option<&str>,
) -> Result<(i64, i64), AppError> {
    let missing = || {
        AppError::InvalidRequest("start_time and end_time parameters are required".to_string())
    };

    let start = start_time.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(missing)?;
    let end = end_time.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(missing)?;

    let parse = |raw: &str, name: &str| {
        raw.parse::<i64>().map_err(|_| {
            AppError::InvalidRequest(format!("{} must be a unix timestamp in seconds", name))
        })
    };

    Ok((parse(start, "start_time")?, parse(end, "end_time")?))
}

// ==================== UPSTREAM CALLS ====================

async fn fetch_cost_page(
    api_key: &str,
    start_time: i64,
    end_time: i64,
    page: Option<&str>,
) -> Result<CostPage, AppError> {
    let mut url = format!(
        "{}?start_time={}&end_time={}&group_by=line_item",
        OPENAI_COSTS_URL, start_time, end_time
    );
    if let Some(page) = page {
        url.push_str("&page=");
        url.push_str(&urlencoding::encode(page));
    }

    let response = http_client()
        .get(&url)
        .bearer_auth(api_key)
        .header("Content-Type", "application/json")
        .timeout(Duration::from_secs(30))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Upstream {
            status: status.as_u16(),
            message: format!("OpenAI API error: {} {}", status.as_u16(), body),
        });
    }

    Ok(response.json::<CostPage>().await?)
}

/// Every cost bucket of the window, following `next_page`.
pub async fn fetch_cost_buckets(
    api_key: &str,
    start_time: i64,
    end_time: i64,
) -> Result<Vec<CostBucket>, AppError> {
    let mut buckets = Vec::new();
    let mut next_page: Option<String> = None;

    for page_number in 1..=MAX_PAGES {
        let page = fetch_cost_page(api_key, start_time, end_time, next_page.as_deref()).await?;
        buckets.extend(page.data);

        next_page = match (page.has_more, page.next_page) {
            (true, Some(cursor)) if !cursor.is_empty() => Some(cursor),
            _ => return Ok(buckets),
        };

        if page_number == MAX_PAGES {
            log::warn!("⚠️  OpenAI costs truncated after {} pages", MAX_PAGES);
        }
    }

    Ok(buckets)
}

/// GET /api/openai/costs
pub async fn get_costs(
    api_key: Option<&str>,
    start_time: i64,
    end_time: i64,
) -> Result<CostsResponse, AppError> {
    let api_key = api_key.ok_or_else(|| {
        AppError::ConfigError("OpenAI API key not configured".to_string())
    })?;

    let (rate, buckets) = tokio::join!(
        exchange_rate_service::usd_to_brl_rate_or_fallback(),
        fetch_cost_buckets(api_key, start_time, end_time),
    );
    let buckets = buckets?;

    let data = aggregate_costs(&buckets, rate);
    let totals = compute_totals(&data);

    log::info!(
        "💰 OpenAI costs: {} lines, total R$ {:.4} (rate {:.4})",
        data.len(),
        totals.total_cost,
        rate
    );

    Ok(CostsResponse {
        success: true,
        data,
        totals,
        currency: "BRL".to_string(),
        rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn buckets() -> Vec<CostBucket> {
        serde_json::from_value(json!([
            {
                "object": "bucket",
                "start_time": 1714521600,
                "end_time": 1714608000,
                "results": [
                    { "object": "organization.costs.result", "amount": { "value": 0.5, "currency": "usd" }, "line_item": "gpt-4o-mini, input" },
                    { "amount": { "value": 0.25, "currency": "usd" }, "line_item": "gpt-4o-mini, output" },
                    { "amount": { "value": 1.0, "currency": "usd" }, "line_item": "whisper-1" },
                ]
            },
            {
                "start_time": 1714608000,
                "end_time": 1714694400,
                "results": [
                    { "amount": { "value": 0.5, "currency": "usd" }, "line_item": "gpt-4o-mini, input" },
                    { "amount": { "value": 0.123456, "currency": "usd" }, "line_item": "dall-e-3, images" },
                    { "amount": { "value": 2.0, "currency": "usd" }, "line_item": null },
                ]
            }
        ]))
        .unwrap()
    }

    #[test]
    fn test_aggregate_sums_per_model_and_type() {
        let costs = aggregate_costs(&buckets(), 5.0);

        assert_eq!(
            costs,
            vec![
                ModelCost { model: "dall-e-3".into(), cost_type: "images".into(), total_cost: 0.6173 },
                ModelCost { model: "gpt-4o-mini".into(), cost_type: "input".into(), total_cost: 5.0 },
                ModelCost { model: "gpt-4o-mini".into(), cost_type: "output".into(), total_cost: 1.25 },
            ]
        );
    }

    #[test]
    fn test_cost_page_keeps_only_amount_and_line_item() {
        let page: CostPage = serde_json::from_value(json!({
            "object": "page",
            "data": [{
                "object": "bucket",
                "start_time": 1714521600,
                "end_time": 1714608000,
                "results": [{
                    "object": "organization.costs.result",
                    "amount": { "value": 0.75, "currency": "usd" },
                    "line_item": "gpt-4o, input",
                    "project_id": "proj_abc"
                }]
            }],
            "has_more": true,
            "next_page": "page_2"
        }))
        .unwrap();

        assert!(page.has_more);
        assert_eq!(page.next_page.as_deref(), Some("page_2"));
        assert_eq!(page.data[0].results[0].amount.value, 0.75);
        assert_eq!(page.data[0].results[0].line_item.as_deref(), Some("gpt-4o, input"));
    }

    #[test]
    fn test_totals_split_input_and_output() {
        let totals = compute_totals(&aggregate_costs(&buckets(), 5.0));
        assert_eq!(
            totals,
            CostTotals { total_cost: 6.8673, input_cost: 5.0, output_cost: 1.25 }
        );
    }

    #[test]
    fn test_model_cost_serializes_type_field() {
        let cost = ModelCost { model: "gpt-4o".into(), cost_type: "output".into(), total_cost: 1.5 };
        assert_eq!(
            serde_json::to_value(cost).unwrap(),
            json!({ "model": "gpt-4o", "type": "output", "total_cost": 1.5 })
        );
    }

    #[test]
    fn test_time_window_validation() {
        assert_eq!(parse_time_window(Some("100"), Some("200")).unwrap(), (100, 200));
        assert!(matches!(parse_time_window(None, Some("200")), Err(AppError::InvalidRequest(_))));
        assert!(matches!(parse_time_window(Some("100"), Some(" ")), Err(AppError::InvalidRequest(_))));
        assert!(matches!(parse_time_window(Some("yesterday"), Some("200")), Err(AppError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_a_config_error() {
        let err = get_costs(None, 0, 1).await.unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
        assert_eq!(err.status_code(), actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
