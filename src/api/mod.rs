pub mod answers;
pub mod chart;
pub mod costs;
pub mod errors;
pub mod exams;
pub mod health;
pub mod integrations;
pub mod metrics;
pub mod pages;
pub mod swagger;
pub mod users;

use actix_web::{error::InternalError, web, HttpResponse};

use crate::utils::AppError;

/// Logs a failed request and renders the error envelope.
///
/// Client mistakes are logged as warnings, everything else as errors.
pub(crate) fn failure(err: AppError, context: &str) -> HttpResponse {
    if err.status_code().is_client_error() {
        log::warn!("⚠️  {}: {}", context, err);
    } else {
        log::error!("❌ {}: {}", context, err);
    }
    err.to_response(context)
}

fn rejected_input(err: impl std::fmt::Display, kind: &str) -> HttpResponse {
    let err = AppError::InvalidRequest(format!("Invalid {}: {}", kind, err));
    log::warn!("⚠️  Request rejected: {}", err);
    err.to_response("Invalid request")
}

/// JSON bodies that fail to parse answer with the error envelope.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let response = rejected_input(&err, "JSON body");
        InternalError::from_response(err, response).into()
    })
}

/// Query strings that fail to parse answer with the error envelope.
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        let response = rejected_input(&err, "query string");
        InternalError::from_response(err, response).into()
    })
}
