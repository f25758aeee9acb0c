use actix_web::{web, HttpResponse};
use chrono::Utc;

use super::failure;
use crate::{
    database::MongoDB,
    services::{exam_service, result_service},
    utils::DateRangeQuery,
};

#[utoipa::path(
    get,
    path = "/api/lucida/answers",
    tag = "Results",
    params(DateRangeQuery),
    responses(
        (status = 200, description = "Exam results, newest first, with weekly count"),
        (status = 400, description = "Invalid date"),
        (status = 500, description = "Database error")
    )
)]
pub async fn get_answers(query: web::Query<DateRangeQuery>, db: web::Data<MongoDB>) -> HttpResponse {
    log::info!("📝 GET /lucida/answers - from: {:?}, to: {:?}", query.from, query.to);

    let range = match query.parse() {
        Ok(range) => range,
        Err(e) => return failure(e, "Failed to fetch answers"),
    };

    match result_service::answers_overview(&db, range, Utc::now()).await {
        Ok(response) => {
            log::info!("✅ Results fetched: {} (weekly {})", response.count, response.weekly_count);
            HttpResponse::Ok().json(response)
        }
        Err(e) => failure(e, "Failed to fetch answers"),
    }
}

#[utoipa::path(
    get,
    path = "/api/lucida/answers/key",
    tag = "Results",
    responses(
        (status = 200, description = "Correct answer of every question of every exam"),
        (status = 500, description = "Database error")
    )
)]
pub async fn get_answer_key(db: web::Data<MongoDB>) -> HttpResponse {
    log::info!("🔑 GET /lucida/answers/key");

    match exam_service::answer_key(&db).await {
        Ok(response) => {
            log::info!(
                "✅ Answer key: {} answers from {} exams",
                response.summary.total_answers,
                response.summary.total_exams
            );
            HttpResponse::Ok().json(response)
        }
        Err(e) => failure(e, "Failed to fetch answer key"),
    }
}

#[utoipa::path(
    delete,
    path = "/api/lucida/results/{id}",
    tag = "Results",
    params(("id" = String, Path, description = "Result _id (hex)")),
    responses(
        (status = 200, description = "Result deleted"),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "Result not found")
    )
)]
pub async fn delete_result(path: web::Path<String>, db: web::Data<MongoDB>) -> HttpResponse {
    let result_id = path.into_inner();
    log::info!("🗑️  DELETE /lucida/results/{}", result_id);

    match result_service::delete_result(&db, &result_id).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => failure(e, "Failed to delete result"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::offline_db;
    use actix_web::{http::StatusCode, test, App};

    #[actix_web::test]
    async fn test_delete_with_malformed_id() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(offline_db().await))
                .route("/api/lucida/results/{id}", web::delete().to(delete_result)),
        )
        .await;

        let req = test::TestRequest::delete().uri("/api/lucida/results/xyz").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Invalid result id");
    }
}
