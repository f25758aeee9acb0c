use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::utils::bson_to_iso;

/// Documento da collection "integrations"
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none", default)]
    pub object_id: Option<ObjectId>,

    /// UUID v4 generated on creation (unique index)
    pub integration_id: String,

    pub integration_name: String,

    #[serde(default)]
    pub created_at: Option<DateTime>,

    #[serde(default)]
    pub updated_at: Option<DateTime>,
}

impl Integration {
    pub fn new(integration_name: String) -> Self {
        let now = DateTime::now();
        Integration {
            object_id: None,
            integration_id: uuid::Uuid::new_v4().to_string(),
            integration_name,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntegrationRequest {
    pub integration_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationResponse {
    #[serde(rename = "_id")]
    pub object_id: String,
    pub integration_id: String,
    pub integration_name: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<Integration> for IntegrationResponse {
    fn from(integration: Integration) -> Self {
        IntegrationResponse {
            object_id: integration.object_id.map(|id| id.to_hex()).unwrap_or_default(),
            integration_id: integration.integration_id,
            integration_name: integration.integration_name,
            created_at: bson_to_iso(integration.created_at),
            updated_at: bson_to_iso(integration.updated_at),
        }
    }
}
