use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("remote store unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("remote write timed out")]
    RemoteTimeout,

    #[error("failed to seed questions: {0}")]
    SeedFailure(String),

    #[error("failed to save question: {0}")]
    PersistFailure(String),

    #[error("local storage corrupt: {0}")]
    StorageCorrupt(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bussiness error: {0}")]
    BusinessError(String),

    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("export error: {0}")]
    ExportError(#[from] zip::result::ZipError),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::BusinessError(_) => StatusCode::BAD_REQUEST,
            Error::RemoteUnavailable(_) | Error::RemoteTimeout => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
