use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::database::MongoDB;

const PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` when MongoDB does not answer
    pub status: String,
    pub service: String,
    pub version: String,
    pub database: String,
    pub timestamp: i64,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is up; `status` reports the database state", body = HealthResponse)
    )
)]
pub async fn health_check(db: web::Data<MongoDB>) -> HttpResponse {
    let database_ok = matches!(tokio::time::timeout(PING_TIMEOUT, db.ping()).await, Ok(Ok(())));

    if !database_ok {
        log::warn!("⚠️  Health check: MongoDB ping failed");
    }

    HttpResponse::Ok().json(HealthResponse {
        status: if database_ok { "healthy" } else { "degraded" }.to_string(),
        service: "kintal".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if database_ok { "connected" } else { "unreachable" }.to_string(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::offline_db;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_health_reports_unreachable_database() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(offline_db().await))
                .route("/health", web::get().to(health_check)),
        )
        .await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "degraded");
        assert_eq!(body["service"], "kintal");
        assert_eq!(body["database"], "unreachable");
    }
}
