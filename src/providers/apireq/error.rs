//! Failures of a request that never produced an HTTP status.
//!
//! reqwest folds very different problems into one error type. They are sorted by the
//! stage of the exchange which broke, and the stage decides the provider error kind.
//! The URL is kept for the message with its query and credentials removed.

use std::error::Error as StdError;
use std::fmt;

use reqwest::Url;

use crate::providers::ErrorKind;

/// The part of the exchange with the provider that went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// The request was rejected locally, e.g. an API key that is not a valid header.
    Build,
    Connect,
    Send,
    Redirect,
    ReadBody,
    Decode,
}

impl Stage {
    fn of(err: &reqwest::Error) -> Stage {
        if err.is_builder() {
            Stage::Build
        } else if err.is_connect() {
            Stage::Connect
        } else if err.is_redirect() {
            Stage::Redirect
        } else if err.is_decode() {
            Stage::Decode
        } else if err.is_body() {
            Stage::ReadBody
        } else {
            Stage::Send
        }
    }

    fn activity(self) -> &'static str {
        match self {
            Stage::Build => "building the request",
            Stage::Connect => "connecting",
            Stage::Send => "sending the request",
            Stage::Redirect => "following redirects",
            Stage::ReadBody => "reading the response",
            Stage::Decode => "decoding the response",
        }
    }
}

#[derive(Debug)]
pub(crate) struct TransportError {
    stage: Stage,
    timed_out: bool,
    endpoint: Option<String>,
    source: reqwest::Error,
}

/// The URL without its query string and user info, which may carry credentials.
fn redact(url: &Url) -> String {
    let mut url = url.clone();

    url.set_query(None);
    url.set_fragment(None);
    let _ = url.set_username("");
    let _ = url.set_password(None);

    url.to_string()
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError {
            stage: Stage::of(&err),
            timed_out: err.is_timeout(),
            endpoint: err.url().map(redact),
            source: err.without_url(),
        }
    }
}

impl TransportError {
    /// How the registry should treat the failure.
    pub(crate) fn provider_kind(&self) -> ErrorKind {
        if self.timed_out {
            return ErrorKind::TimedOut;
        }

        match self.stage {
            Stage::Build => ErrorKind::Configuration,
            Stage::Connect | Stage::Send => ErrorKind::Connection,
            Stage::Redirect | Stage::ReadBody | Stage::Decode => ErrorKind::UnexpectedResponse,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.timed_out {
            write!(f, "timed out while {}", self.stage.activity())?;
        } else {
            write!(f, "failed while {}", self.stage.activity())?;
        }

        if let Some(endpoint) = &self.endpoint {
            write!(f, " ({})", endpoint)?;
        }

        Ok(())
    }
}

impl StdError for TransportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected_locally(url: &str) -> TransportError {
        reqwest::Client::new().get(url).build().unwrap_err().into()
    }

    #[test]
    fn credentials_are_stripped_from_urls() {
        let url = Url::parse("https://user:pw@api.example.com/v1beta/models?key=secret#x")
            .unwrap();

        assert_eq!(redact(&url), "https://api.example.com/v1beta/models");
    }

    #[test]
    fn locally_rejected_requests_are_configuration_errors() {
        let err = rejected_locally("file:///v1/models?key=secret");

        assert_eq!(err.stage, Stage::Build);
        assert_eq!(err.provider_kind(), ErrorKind::Configuration);
        assert_eq!(
            err.to_string(),
            "failed while building the request (file:///v1/models)"
        );
        assert!(err.source().is_some());
    }

    #[tokio::test]
    async fn refused_connections_are_connection_errors() {
        // Nothing listens on port 1 of the loopback interface.
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let err: TransportError = client
            .get("http://127.0.0.1:1/v1/models?key=secret")
            .send()
            .await
            .unwrap_err()
            .into();

        assert_eq!(err.stage, Stage::Connect);
        assert_eq!(err.provider_kind(), ErrorKind::Connection);
        assert_eq!(
            err.to_string(),
            "failed while connecting (http://127.0.0.1:1/v1/models)"
        );
        assert!(!err.to_string().contains("secret"));
    }
}
