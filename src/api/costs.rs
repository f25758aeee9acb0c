use actix_web::{web, HttpResponse};
use serde::Deserialize;
use utoipa::IntoParams;

use super::failure;
use crate::{config::AppConfig, services::openai_cost_service};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CostsQuery {
    /// Unix seconds
    pub start_time: Option<String>,
    /// Unix seconds
    pub end_time: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/openai/costs",
    tag = "Costs",
    params(CostsQuery),
    responses(
        (status = 200, description = "OpenAI costs per model and type, in BRL", body = openai_cost_service::CostsResponse),
        (status = 400, description = "Missing start_time/end_time"),
        (status = 500, description = "API key not configured")
    )
)]
pub async fn get_costs(query: web::Query<CostsQuery>, config: web::Data<AppConfig>) -> HttpResponse {
    log::info!(
        "💰 GET /openai/costs - start: {:?}, end: {:?}",
        query.start_time,
        query.end_time
    );

    let (start_time, end_time) =
        match openai_cost_service::parse_time_window(query.start_time.as_deref(), query.end_time.as_deref()) {
            Ok(window) => window,
            Err(e) => return failure(e, "Failed to fetch OpenAI costs"),
        };

    match openai_cost_service::get_costs(config.openai_api_key.as_deref(), start_time, end_time).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => failure(e, "Failed to fetch OpenAI costs"),
    }
}
