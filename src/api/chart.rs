use actix_web::{web, HttpResponse};
use chrono::Utc;

use super::failure;
use crate::{database::MongoDB, services::chart_service, utils::DateRangeQuery};

#[utoipa::path(
    get,
    path = "/api/lucida/chart-data",
    tag = "Charts",
    params(DateRangeQuery),
    responses(
        (status = 200, description = "Daily users, exams, questions and answers (last 30 days by default)"),
        (status = 400, description = "Invalid date or range longer than 366 days"),
        (status = 500, description = "Database error")
    )
)]
pub async fn get_chart_data(query: web::Query<DateRangeQuery>, db: web::Data<MongoDB>) -> HttpResponse {
    log::info!("📈 GET /lucida/chart-data - from: {:?}, to: {:?}", query.from, query.to);

    let range = match query.parse() {
        Ok(range) => range,
        Err(e) => return failure(e, "Failed to fetch chart data"),
    };

    match chart_service::chart_data(&db, range, Utc::now()).await {
        Ok(response) => {
            log::info!("✅ Chart data: {} days", response.data.len());
            HttpResponse::Ok().json(response)
        }
        Err(e) => failure(e, "Failed to fetch chart data"),
    }
}
