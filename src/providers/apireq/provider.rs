//! Conversions between request errors and provider error types

use reqwest::StatusCode;

use crate::providers::apireq::{ApiError, TransportError};
use crate::providers::{Error, ErrorKind};

impl From<TransportError> for Error {
    fn from(value: TransportError) -> Self {
        Error::from_source(value.provider_kind(), Box::new(value))
    }
}

/// Category of an unsuccessful HTTP status. Anthropic reports overload as 529.
pub(crate) fn status_kind(status: StatusCode) -> ErrorKind {
    match status.as_u16() {
        401 | 403 => ErrorKind::Authentication,
        404 => ErrorKind::NotFound,
        408 => ErrorKind::TimedOut,
        429 => ErrorKind::ExcessUsage,
        503 | 529 => ErrorKind::ApiOverloaded,
        400..=499 => ErrorKind::BadRequest,
        500..=599 => ErrorKind::InternalError,
        _ => ErrorKind::UnexpectedResponse,
    }
}

impl From<ApiError> for Error {
    fn from(value: ApiError) -> Self {
        let kind = match &value {
            ApiError::InvalidApiBase(..) => ErrorKind::Configuration,
            ApiError::InvalidEndpoint(_) => ErrorKind::BadRequest,
            ApiError::Status { status, .. } => status_kind(*status),
            ApiError::EmptyCompletion => ErrorKind::UnexpectedResponse,
            ApiError::RequestFailed(_) => ErrorKind::UnspecifiedError,
        };

        match value {
            ApiError::RequestFailed(err) => err.into(),
            value => Error::from_source(kind, Box::new(value)),
        }
    }
}
