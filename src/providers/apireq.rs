//! A utility module with helpers for making and parsing API requests.

mod error;
mod provider;

use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

pub(crate) use error::TransportError;
pub(crate) use reqwest::Url;

#[derive(thiserror::Error, Debug)]
pub(crate) enum ApiError {
    /// The API base is not a URL that can be used in a network request
    #[error("invalid api base \"{0}\"")]
    InvalidApiBase(String, #[source] url::ParseError),

    /// Endpoint URL is invalid
    #[error("invalid endpoint")]
    InvalidEndpoint(
        #[from]
        #[source]
        url::ParseError,
    ),

    /// Some issue with the request
    #[error("{}", .0)]
    RequestFailed(
        #[from]
        #[source]
        TransportError,
    ),

    /// The API answered with a non-success status
    #[error("{status}: {message}")]
    Status { status: StatusCode, message: String },

    /// The API answered successfully but the reply held no text
    #[error("the response did not contain any generated text")]
    EmptyCompletion,
}

/// Parses an API base, making sure relative endpoints are joined below its path.
pub(crate) fn parse_api_base(raw: &str) -> Result<Url, ApiError> {
    let mut api_base =
        Url::parse(raw.trim()).map_err(|e| ApiError::InvalidApiBase(raw.to_string(), e))?;

    if !api_base.path().ends_with('/') {
        let path = format!("{}/", api_base.path());
        api_base.set_path(&path);
    }

    Ok(api_base)
}

/// Joins a relative endpoint such as `v1/models` onto an API base.
pub(crate) fn endpoint(api_base: &Url, path: &str) -> Result<Url, ApiError> {
    Ok(api_base.join(path.trim_start_matches('/'))?)
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client, ApiError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ApiError::RequestFailed(e.into()))
}

/// Passes successful responses through. Otherwise the body is read and `message`
/// extracts the vendor's error text from it.
pub(crate) async fn check_status(
    res: Response,
    message: fn(&str) -> Option<String>,
) -> Result<Response, ApiError> {
    let status = res.status();

    if status.is_success() {
        return Ok(res);
    }

    let body = res.text().await.unwrap_or_default();

    let message = message(&body).unwrap_or_else(|| {
        let body = body.trim();

        if body.is_empty() {
            status.canonical_reason().unwrap_or("unknown status").to_string()
        } else {
            body.to_string()
        }
    });

    Err(ApiError::Status { status, message })
}
