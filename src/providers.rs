//! Traits and type definitions for provider clients and the models they serve.
//!
//! The interface for every upstream vendor is the [`ProviderClient`] trait. A provider
//! client is constructed once per process and owned by the registry. It supports four
//! operations:
//! - Listing: enumerate the models the vendor currently serves as [`ModelDescriptor`]s.
//! - Health: a cheap, bounded liveness probe. Any failure is reported as `false`.
//! - Generation: turn a prompt and a set of [`GenerationOptions`] into plain text.
//! - Cost estimation: reserved for cost-aware routing, unknown by default.
//!
//! ## Error Handling
//!
//! Each API has its own bespoke error system. The vendor modules translate their
//! errors into [`Error`], and the [`ErrorKind`] enum indicates the category of error
//! that was raised. The registry never lets one of these errors escape a fan-out: a
//! failing provider simply contributes nothing to the aggregate.

mod anthropic;
mod apireq;
mod google;
mod mistral;
mod openai;

pub(crate) mod providers;

use async_trait::async_trait;
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use self::providers::ProviderIdentifier;

/// Upper bound on a catalog or generation request unless the client is configured otherwise.
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on a health probe.
pub(crate) const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// This is a list specifying general categories of errors that
/// can be returned by a [`ProviderClient`]. This list may be updated
/// as providers are added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// The provider could not be constructed: the credential is
    /// missing or the API base is not a usable URL.
    Configuration,
    /// Failed to connect to the underlying API service.
    /// This could be due to network issues like DNS
    /// resolution, connectivity issues, or routing problems.
    Connection,
    /// A request timed out.
    TimedOut,
    /// An API key was not accepted or service-specific
    /// permissions are needed.
    Authentication,
    /// A rate limit was reached or a quota was exceeded.
    ExcessUsage,
    /// The servers are overloaded. This is non-fatal
    /// and indicates that a retry may be needed later.
    ApiOverloaded,
    /// The requested resource was not found. This likely means that
    /// the model requested by the user was not found.
    NotFound,
    /// The request was malformed or is otherwise improper. This
    /// often corresponds to errors with HTTP status codes in
    /// the 400s.
    BadRequest,
    /// The server encountered an error. This often corresponds to
    /// errors with HTTP status codes in the 500s.
    InternalError,
    /// An API response was unable to be deserialized, malformed,
    /// or otherwise violated the assumptions of the client.
    UnexpectedResponse,
    /// An error that does not fit into any of the other categories.
    UnspecifiedError,
}

#[derive(Debug)]
pub(crate) struct Error {
    kind: ErrorKind,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub(crate) fn from_kind(kind: ErrorKind) -> Error {
        Error { kind, source: None }
    }

    pub(crate) fn from_source(kind: ErrorKind, source: Box<dyn StdError + Send + Sync>) -> Error {
        Error {
            kind,
            source: Some(source),
        }
    }

    /// A configuration error carrying a human readable explanation.
    pub(crate) fn configuration<S: Into<String>>(reason: S) -> Error {
        let reason: String = reason.into();

        Error::from_source(ErrorKind::Configuration, reason.into())
    }

    pub(crate) fn kind(&self) -> ErrorKind {
        self.kind
    }

    fn message(&self) -> &'static str {
        match self.kind {
            ErrorKind::Configuration => "the provider is misconfigured",
            ErrorKind::Connection => "failed to connect to the API service",
            ErrorKind::TimedOut => "request timed out",
            ErrorKind::Authentication => "authentication failed or not provided",
            ErrorKind::ExcessUsage => "rate limit exceeded or quota crossed",
            ErrorKind::ApiOverloaded => "API server(s) are currently overloaded",
            ErrorKind::NotFound => "the requested resource was not found",
            ErrorKind::BadRequest => "the request was bad or malformed",
            ErrorKind::InternalError => "the server encountered an internal error",
            ErrorKind::UnexpectedResponse => "API response was unexpected or malformed",
            ErrorKind::UnspecifiedError => "an unspecified error occurred",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.message(), source),
            None => write!(f, "{}", self.message()),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| &**e as _)
    }
}

/// A kind of content a model accepts or produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub(crate) enum Modality {
    Text,
    Image,
    Audio,
    Video,
}

/// Price of a model in USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

/// One model offered by one provider.
///
/// The identifier and the provider are fixed at construction. Everything else is
/// descriptive metadata that providers fill in when their catalog endpoint reports it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ModelDescriptor {
    id: String,
    display_name: String,
    provider: ProviderIdentifier,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    context_window: Option<u64>,
    is_default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_modalities: Option<Vec<Modality>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_modalities: Option<Vec<Modality>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pricing: Option<Pricing>,
}

impl ModelDescriptor {
    pub(crate) fn new<S: Into<String>>(id: S, provider: ProviderIdentifier) -> ModelDescriptor {
        let id = id.into();

        ModelDescriptor {
            display_name: id.clone(),
            id,
            provider,
            description: None,
            context_window: None,
            is_default: false,
            input_modalities: None,
            output_modalities: None,
            pricing: None,
        }
    }

    pub(crate) fn with_display_name<S: Into<String>>(mut self, display_name: S) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub(crate) fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.trim().is_empty());
        self
    }

    pub(crate) fn with_context_window(mut self, context_window: Option<u64>) -> Self {
        self.context_window = context_window;
        self
    }

    pub(crate) fn with_modalities(mut self, input: Vec<Modality>, output: Vec<Modality>) -> Self {
        self.input_modalities = Some(input);
        self.output_modalities = Some(output);
        self
    }

    pub(crate) fn with_pricing(mut self, pricing: Option<Pricing>) -> Self {
        self.pricing = pricing;
        self
    }

    pub(crate) fn marked_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn display_name(&self) -> &str {
        &self.display_name
    }

    pub(crate) fn provider(&self) -> ProviderIdentifier {
        self.provider
    }

    pub(crate) fn context_window(&self) -> Option<u64> {
        self.context_window
    }

    pub(crate) fn is_default(&self) -> bool {
        self.is_default
    }

}

#[cfg(test)]
impl ModelDescriptor {
    pub(crate) fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub(crate) fn input_modalities(&self) -> Option<&[Modality]> {
        self.input_modalities.as_deref()
    }
}

/// Knobs a caller may set on a single generation request.
#[derive(Debug, Clone, Default)]
pub(crate) struct GenerationOptions {
    /// An authoritative instruction placed ahead of the prompt.
    pub system: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// The context usage metadata.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TokenUsage {
    /// The number of tokens in the prompt.
    pub prompt_tokens: Option<usize>,
    /// The number of tokens in the response.
    pub completion_tokens: Option<usize>,
}

/// A trait implemented by all provider clients.
#[async_trait]
pub(crate) trait ProviderClient: Send + Sync {
    /// Returns the provider identifier.
    fn id(&self) -> ProviderIdentifier;

    /// The longest the registry waits on [`ProviderClient::list_models`].
    fn timeout(&self) -> Duration {
        DEFAULT_REQUEST_TIMEOUT
    }

    /// The longest the registry waits on [`ProviderClient::check_health`].
    fn health_timeout(&self) -> Duration {
        DEFAULT_HEALTH_TIMEOUT
    }

    /// Returns the models the provider currently serves.
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, Error>;

    /// Returns true if the provider answered a cheap request successfully.
    async fn check_health(&self) -> bool;

    /// Generates a reply to `prompt` with the model `model`.
    ///
    /// `model`: The upstream id of the model.
    /// `prompt`: The user message.
    /// `options`: Per-request generation settings.
    async fn generate_text(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, Error>;

    /// Estimated price in USD of a request with the given usage, if known.
    fn estimate_cost(&self, _model: &str, _usage: &TokenUsage) -> Option<f64> {
        None
    }
}
