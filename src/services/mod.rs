pub mod chart_service;
pub mod exam_service;
pub mod exchange_rate_service;
pub mod integration_service;
pub mod openai_cost_service;
pub mod posthog_service;
pub mod result_service;
pub mod user_service;

use futures::stream::StreamExt;
use lazy_static::lazy_static;
use mongodb::error::ErrorKind;
use mongodb::Cursor;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::utils::AppError;

lazy_static! {
    static ref HTTP_CLIENT: reqwest::Client = reqwest::Client::builder()
        .user_agent(concat!("kintal/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());
}

/// Shared outbound client (OpenAI, PostHog, ExchangeRate-API)
pub(crate) fn http_client() -> &'static reqwest::Client {
    &HTTP_CLIENT
}

/// Drains a cursor, skipping documents that do not match the model.
pub(crate) async fn collect_documents<T>(
    mut cursor: Cursor<T>,
    label: &str,
) -> Result<Vec<T>, AppError>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let mut items = Vec::new();

    while let Some(result) = cursor.next().await {
        match result {
            Ok(item) => items.push(item),
            Err(e) if matches!(e.kind.as_ref(), ErrorKind::BsonDeserialization(_)) => {
                log::warn!("⚠️  Skipping malformed {} document: {}", label, e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(items)
}
