use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::error;
use mongodb::error::{ErrorKind, WriteFailure};
use thiserror::Error;

use crate::envelope::Envelope;

/// Every failure a handler can report. Rendered as `{success: false, message}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Schema violation; the message is shown to the user verbatim.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Not authorized")]
    Unauthorized,
    #[error("Access denied")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
    #[error("bson encode error: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),
    #[error("bson decode error: {0}")]
    Decode(#[from] mongodb::bson::de::Error),
    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Server code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

impl ApiError {
    /// A unique index violation becomes `Conflict(message)`; anything else
    /// stays a database error.
    pub fn duplicate_as(message: &str) -> impl FnOnce(mongodb::error::Error) -> ApiError + '_ {
        move |err| {
            if is_duplicate_key(&err) {
                ApiError::Conflict(message.to_string())
            } else {
                ApiError::Database(err)
            }
        }
    }

    /// Message that reaches the client. Internal details stay in the log.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Database(_)
            | ApiError::Encode(_)
            | ApiError::Decode(_)
            | ApiError::Internal(_) => "Server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(_)
            | ApiError::Encode(_)
            | ApiError::Decode(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{}", self);
        }
        HttpResponse::build(status).json(Envelope::<()>::failure(self.public_message()))
    }
}
