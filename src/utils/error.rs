use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use mongodb::error::{ErrorKind, WriteFailure};
use std::fmt;

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug)]
pub enum AppError {
    DatabaseError(String),
    NotFound(String),
    InvalidRequest(String),
    Conflict(String),
    Upstream { status: u16, message: String },
    HttpClientError(String),
    ConfigError(String),
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Builds the JSON envelope for this error.
    ///
    /// Client errors carry their own message in `error`. Server-side failures
    /// report `context` as `error` and the underlying cause as `message`.
    pub fn to_response(&self, context: &str) -> HttpResponse {
        let status = self.status_code();

        let body = match self {
            AppError::InvalidRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::ConfigError(msg) => serde_json::json!({
                "success": false,
                "error": msg
            }),
            AppError::Upstream { message, .. } => serde_json::json!({
                "success": false,
                "error": message
            }),
            other => serde_json::json!({
                "success": false,
                "error": context,
                "message": other.detail()
            }),
        };

        HttpResponse::build(status).json(body)
    }

    fn detail(&self) -> &str {
        match self {
            AppError::DatabaseError(msg)
            | AppError::NotFound(msg)
            | AppError::InvalidRequest(msg)
            | AppError::Conflict(msg)
            | AppError::HttpClientError(msg)
            | AppError::ConfigError(msg)
            | AppError::Internal(msg) => msg,
            AppError::Upstream { message, .. } => message,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Upstream { status, message } => {
                write!(f, "Upstream error ({}): {}", status, message)
            }
            AppError::HttpClientError(msg) => write!(f, "HTTP client error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        self.to_response("Internal server error")
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        if is_duplicate_key(&err) {
            return AppError::Conflict(err.to_string());
        }
        AppError::DatabaseError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::HttpClientError(err.to_string())
    }
}

impl From<askama::Error> for AppError {
    fn from(err: askama::Error) -> Self {
        AppError::Internal(format!("Template rendering failed: {}", err))
    }
}

pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}
