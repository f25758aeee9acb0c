use actix_web::{web, HttpResponse};
use serde::Deserialize;
use utoipa::IntoParams;

use super::failure;
use crate::{database::MongoDB, models::CreateIntegrationRequest, services::integration_service};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteIntegrationQuery {
    /// Mongo `_id` of the integration
    pub id: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/lucida/integrations",
    tag = "Integrations",
    responses(
        (status = 200, description = "All integrations, newest first", body = integration_service::IntegrationsListResponse),
        (status = 500, description = "Database error")
    )
)]
pub async fn list_integrations(db: web::Data<MongoDB>) -> HttpResponse {
    log::info!("🔌 GET /lucida/integrations");

    match integration_service::list_integrations(&db).await {
        Ok(response) => {
            log::info!("✅ Integrations fetched: {}", response.count);
            HttpResponse::Ok().json(response)
        }
        Err(e) => failure(e, "Failed to fetch integrations"),
    }
}

#[utoipa::path(
    post,
    path = "/api/lucida/integrations",
    tag = "Integrations",
    request_body = CreateIntegrationRequest,
    responses(
        (status = 201, description = "Integration created", body = integration_service::IntegrationCreatedResponse),
        (status = 400, description = "Missing integrationName"),
        (status = 409, description = "Duplicate integrationId")
    )
)]
pub async fn create_integration(
    body: web::Json<CreateIntegrationRequest>,
    db: web::Data<MongoDB>,
) -> HttpResponse {
    log::info!("🔌 POST /lucida/integrations - {:?}", body.integration_name);

    match integration_service::create_integration(&db, body.integration_name.as_deref()).await {
        Ok(response) => HttpResponse::Created().json(response),
        Err(e) => failure(e, "Failed to create integration"),
    }
}

#[utoipa::path(
    delete,
    path = "/api/lucida/integrations",
    tag = "Integrations",
    params(DeleteIntegrationQuery),
    responses(
        (status = 200, description = "Integration deleted", body = integration_service::IntegrationDeletedResponse),
        (status = 400, description = "Missing or malformed id"),
        (status = 404, description = "Integration not found")
    )
)]
pub async fn delete_integration(
    query: web::Query<DeleteIntegrationQuery>,
    db: web::Data<MongoDB>,
) -> HttpResponse {
    log::info!("🔌 DELETE /lucida/integrations - id: {:?}", query.id);

    match integration_service::delete_integration(&db, query.id.as_deref()).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => failure(e, "Failed to delete integration"),
    }
}
