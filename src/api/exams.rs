use actix_web::{web, HttpResponse};
use chrono::Utc;

use super::failure;
use crate::{database::MongoDB, services::exam_service, utils::DateRangeQuery};

#[utoipa::path(
    get,
    path = "/api/lucida/exams",
    tag = "Exams",
    params(DateRangeQuery),
    responses(
        (status = 200, description = "Exams, newest first, with weekly count"),
        (status = 400, description = "Invalid date"),
        (status = 500, description = "Database error")
    )
)]
pub async fn get_exams(query: web::Query<DateRangeQuery>, db: web::Data<MongoDB>) -> HttpResponse {
    log::info!("📚 GET /lucida/exams - from: {:?}, to: {:?}", query.from, query.to);

    let range = match query.parse() {
        Ok(range) => range,
        Err(e) => return failure(e, "Failed to fetch exams"),
    };

    match exam_service::exams_overview(&db, range, Utc::now()).await {
        Ok(response) => {
            log::info!("✅ Exams fetched: {} (weekly {})", response.count, response.weekly_count);
            HttpResponse::Ok().json(response)
        }
        Err(e) => failure(e, "Failed to fetch exams"),
    }
}

#[utoipa::path(
    get,
    path = "/api/lucida/questions",
    tag = "Exams",
    params(DateRangeQuery),
    responses(
        (status = 200, description = "Question totals over the exams"),
        (status = 400, description = "Invalid date"),
        (status = 500, description = "Database error")
    )
)]
pub async fn get_questions(query: web::Query<DateRangeQuery>, db: web::Data<MongoDB>) -> HttpResponse {
    log::info!("❓ GET /lucida/questions - from: {:?}, to: {:?}", query.from, query.to);

    let range = match query.parse() {
        Ok(range) => range,
        Err(e) => return failure(e, "Failed to fetch questions"),
    };

    match exam_service::questions_summary(&db, range, Utc::now()).await {
        Ok(response) => {
            log::info!(
                "✅ Questions: {} across {} exams",
                response.data.total_questions,
                response.data.exam_count
            );
            HttpResponse::Ok().json(response)
        }
        Err(e) => failure(e, "Failed to fetch questions"),
    }
}
