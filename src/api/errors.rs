use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use utoipa::IntoParams;

use super::failure;
use crate::{
    config::AppConfig,
    services::posthog_service::{self, EventWindow},
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct ErrorsQuery {
    /// Passed to PostHog as `after`
    pub from: Option<String>,
    /// Passed to PostHog as `before`
    pub to: Option<String>,
    pub limit: Option<u32>,
    /// hour, day or week
    pub group_by: Option<String>,
}

impl ErrorsQuery {
    fn window(&self) -> EventWindow {
        EventWindow::new(self.from.as_deref(), self.to.as_deref())
    }
}

#[utoipa::path(
    get,
    path = "/api/posthog/errors",
    tag = "Errors",
    params(ErrorsQuery),
    responses(
        (status = 200, description = "Recent $exception events"),
        (status = 500, description = "PostHog not configured or unreachable")
    )
)]
pub async fn list_errors(query: web::Query<ErrorsQuery>, config: web::Data<AppConfig>) -> HttpResponse {
    log::info!("🐞 GET /posthog/errors - from: {:?}, to: {:?}", query.from, query.to);

    match posthog_service::list_errors(&config.posthog, &query.window(), query.limit).await {
        Ok(response) => {
            log::info!("✅ PostHog errors: {} of {}", response.count, response.total);
            HttpResponse::Ok().json(response)
        }
        Err(e) => failure(e, "Failed to fetch errors from PostHog"),
    }
}

#[utoipa::path(
    get,
    path = "/api/posthog/errors/types",
    tag = "Errors",
    params(ErrorsQuery),
    responses(
        (status = 200, description = "Error types ranked by occurrences"),
        (status = 500, description = "PostHog not configured or unreachable")
    )
)]
pub async fn error_types(query: web::Query<ErrorsQuery>, config: web::Data<AppConfig>) -> HttpResponse {
    log::info!("🐞 GET /posthog/errors/types - from: {:?}, to: {:?}", query.from, query.to);

    match posthog_service::error_types(&config.posthog, &query.window(), query.limit).await {
        Ok(response) => {
            log::info!("✅ PostHog error types: {}", response.total);
            HttpResponse::Ok().json(response)
        }
        Err(e) => failure(e, "Failed to fetch error types from PostHog"),
    }
}

#[utoipa::path(
    get,
    path = "/api/posthog/errors/stats",
    tag = "Errors",
    params(ErrorsQuery),
    responses(
        (status = 200, description = "Totals, per-type counts and hourly series"),
        (status = 500, description = "PostHog not configured or unreachable")
    )
)]
pub async fn error_stats(query: web::Query<ErrorsQuery>, config: web::Data<AppConfig>) -> HttpResponse {
    log::info!("🐞 GET /posthog/errors/stats - from: {:?}, to: {:?}", query.from, query.to);

    match posthog_service::error_stats(&config.posthog, &query.window(), Utc::now()).await {
        Ok(response) => {
            log::info!(
                "✅ PostHog stats: {} errors ({} critical, {} warnings)",
                response.data.total_errors,
                response.data.critical_errors,
                response.data.warnings
            );
            HttpResponse::Ok().json(response)
        }
        Err(e) => failure(e, "Failed to fetch error statistics from PostHog"),
    }
}

#[utoipa::path(
    get,
    path = "/api/posthog/errors/chart-data",
    tag = "Errors",
    params(ErrorsQuery),
    responses(
        (status = 200, description = "Events bucketed by hour, day or week"),
        (status = 500, description = "PostHog not configured or unreachable")
    )
)]
pub async fn error_chart(query: web::Query<ErrorsQuery>, config: web::Data<AppConfig>) -> HttpResponse {
    log::info!(
        "🐞 GET /posthog/errors/chart-data - from: {:?}, to: {:?}, groupBy: {:?}",
        query.from,
        query.to,
        query.group_by
    );

    match posthog_service::error_chart(&config.posthog, query.window(), query.group_by.as_deref()).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => failure(e, "Failed to fetch chart data from PostHog"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PostHogConfig;
    use actix_web::{http::StatusCode, test, App};

    #[actix_web::test]
    async fn test_missing_posthog_configuration() {
        let config = AppConfig {
            host: "127.0.0.1".into(),
            port: 3000,
            database_url: "mongodb://localhost:27017".into(),
            database_name: None,
            dashboard_password: "segredo".into(),
            openai_api_key: None,
            posthog: PostHogConfig {
                host: "https://us.posthog.com".into(),
                api_key: None,
                project_id: Some("1".into()),
            },
            allowed_origins: Vec::new(),
        };

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(config))
                .route("/api/posthog/errors", web::get().to(list_errors))
                .route("/api/posthog/errors/types", web::get().to(error_types))
                .route("/api/posthog/errors/stats", web::get().to(error_stats))
                .route("/api/posthog/errors/chart-data", web::get().to(error_chart)),
        )
        .await;

        for uri in [
            "/api/posthog/errors",
            "/api/posthog/errors/types",
            "/api/posthog/errors/stats",
            "/api/posthog/errors/chart-data?groupBy=day",
        ] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR, "{}", uri);

            let body: serde_json::Value = test::read_body_json(resp).await;
            assert_eq!(body["error"], "PostHog configuration missing");
        }
    }

    #[actix_web::test]
    async fn test_non_numeric_limit_uses_error_envelope() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppConfig {
                    host: "127.0.0.1".into(),
                    port: 3000,
                    database_url: "mongodb://localhost:27017".into(),
                    database_name: None,
                    dashboard_password: "segredo".into(),
                    openai_api_key: None,
                    posthog: PostHogConfig::default(),
                    allowed_origins: Vec::new(),
                }))
                .app_data(crate::api::query_config())
                .route("/api/posthog/errors", web::get().to(list_errors)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/posthog/errors?limit=muitos").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid query string"));
    }
}
