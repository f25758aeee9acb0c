use mongodb::bson::{doc, oid::ObjectId};
use serde::Serialize;
use utoipa::ToSchema;

use super::collect_documents;
use crate::{
    database::{MongoDB, INTEGRATIONS},
    models::{Integration, IntegrationResponse},
    utils::{is_duplicate_key, AppError},
};

#[derive(Debug, Serialize, ToSchema)]
pub struct IntegrationsListResponse {
    pub success: bool,
    pub data: Vec<IntegrationResponse>,
    pub count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IntegrationCreatedResponse {
    pub success: bool,
    pub data: IntegrationResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IntegrationDeletedResponse {
    pub success: bool,
    pub message: String,
    pub data: IntegrationResponse,
}

pub async fn list_integrations(db: &MongoDB) -> Result<IntegrationsListResponse, AppError> {
    let cursor = db
        .collection::<Integration>(INTEGRATIONS)
        .find(doc! {})
        .sort(doc! { "createdAt": -1 })
        .await?;

    let data: Vec<IntegrationResponse> = collect_documents(cursor, "integration")
        .await?
        .into_iter()
        .map(IntegrationResponse::from)
        .collect();

    Ok(IntegrationsListResponse {
        success: true,
        count: data.len(),
        data,
    })
}

pub async fn create_integration(
    db: &MongoDB,
    integration_name: Option<&str>,
) -> Result<IntegrationCreatedResponse, AppError> {
    let name = integration_name.unwrap_or_default().trim();
    if name.is_empty() {
        return Err(AppError::InvalidRequest("integrationName is required".to_string()));
    }

    let mut integration = Integration::new(name.to_string());

    let inserted = db
        .collection::<Integration>(INTEGRATIONS)
        .insert_one(&integration)
        .await
        .map_err(|e| {
            if is_duplicate_key(&e) {
                AppError::Conflict("Integration already exists (duplicate integrationId)".to_string())
            } else {
                AppError::from(e)
            }
        })?;

    integration.object_id = inserted.inserted_id.as_object_id();
    log::info!(
        "✅ Integration '{}' created ({})",
        integration.integration_name,
        integration.integration_id
    );

    Ok(IntegrationCreatedResponse {
        success: true,
        data: IntegrationResponse::from(integration),
    })
}

/// Deletes by Mongo `_id` (hex).
pub async fn delete_integration(
    db: &MongoDB,
    id: Option<&str>,
) -> Result<IntegrationDeletedResponse, AppError> {
    let id = id.map(str::trim).filter(|id| !id.is_empty()).ok_or_else(|| {
        AppError::InvalidRequest("Integration id is required".to_string())
    })?;

    let object_id = ObjectId::parse_str(id)
        .map_err(|_| AppError::InvalidRequest("Invalid integration id".to_string()))?;

    let deleted = db
        .collection::<Integration>(INTEGRATIONS)
        .find_one_and_delete(doc! { "_id": object_id })
        .await?
        .ok_or_else(|| AppError::NotFound("Integration not found".to_string()))?;

    log::info!("🗑️  Integration {} deleted", id);

    Ok(IntegrationDeletedResponse {
        success: true,
        message: "Integration deleted successfully".to_string(),
        data: IntegrationResponse::from(deleted),
    })
}
