//! Concrete types for providers, along with the settings used to construct them

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::{Error, ProviderClient};

/// The `ProviderIdentifier` is a unique per-provider identifier. It is used to
/// differentiate providers at runtime in code which is generic over different
/// providers.
///
/// The `to_string` and `FromStr` are part of the CLI and the config file and should
/// remain stable. Declaration order is registration order, which decides which
/// provider keeps a model id offered by more than one vendor.
#[derive(
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Clone,
    Copy,
    Serialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub(crate) enum ProviderIdentifier {
    OpenAI,
    Anthropic,
    Google,
    Mistral,
}

impl ProviderIdentifier {
    /// The environment variable consulted when the config file holds no API key.
    pub(crate) fn credential_var(self) -> &'static str {
        match self {
            ProviderIdentifier::OpenAI => "OPENAI_API_KEY",
            ProviderIdentifier::Anthropic => "ANTHROPIC_API_KEY",
            ProviderIdentifier::Google => "GEMINI_API_KEY",
            ProviderIdentifier::Mistral => "MISTRAL_API_KEY",
        }
    }
}

pub(crate) use super::anthropic::AnthropicProvider;
pub(crate) use super::google::GoogleProvider;
pub(crate) use super::openai::OpenAIProvider;

/// Everything needed to construct one provider client.
#[derive(Debug, Clone)]
pub(crate) struct ProviderSettings {
    pub id: ProviderIdentifier,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub default_model: Option<String>,
    pub timeout: Option<Duration>,
}

impl ProviderSettings {
    pub(crate) fn new(id: ProviderIdentifier) -> ProviderSettings {
        ProviderSettings {
            id,
            api_key: None,
            api_base: None,
            default_model: None,
            timeout: None,
        }
    }

    /// The API key, if one is present and not blank.
    pub(crate) fn credential(&self) -> Result<&str, Error> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(Error::configuration(format!(
                "no API key for \"{}\", set it in the config or define {}",
                self.id,
                self.id.credential_var()
            ))),
        }
    }
}

/// Constructs the client for `settings.id`.
///
/// Fails with [`super::ErrorKind::Configuration`] when the credential is absent, so a
/// provider without a key is never registered in a broken state.
pub(crate) fn connect(settings: &ProviderSettings) -> Result<Arc<dyn ProviderClient>, Error> {
    let client: Arc<dyn ProviderClient> = match settings.id {
        ProviderIdentifier::OpenAI => Arc::new(OpenAIProvider::openai(settings)?),
        ProviderIdentifier::Mistral => Arc::new(OpenAIProvider::mistral(settings)?),
        ProviderIdentifier::Anthropic => Arc::new(AnthropicProvider::new(settings)?),
        ProviderIdentifier::Google => Arc::new(GoogleProvider::new(settings)?),
    };

    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ErrorKind;
    use std::str::FromStr;

    #[test]
    fn identifiers_round_trip_through_strings() {
        assert_eq!(ProviderIdentifier::OpenAI.to_string(), "openai");
        assert_eq!(
            ProviderIdentifier::from_str("anthropic").ok(),
            Some(ProviderIdentifier::Anthropic)
        );
        assert!(ProviderIdentifier::from_str("ollama").is_err());
    }

    #[test]
    fn blank_credential_is_a_configuration_error() {
        let mut settings = ProviderSettings::new(ProviderIdentifier::Google);
        settings.api_key = Some("  ".to_string());

        let err = settings.credential().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn connect_without_credential_fails() {
        for id in [
            ProviderIdentifier::OpenAI,
            ProviderIdentifier::Anthropic,
            ProviderIdentifier::Google,
            ProviderIdentifier::Mistral,
        ] {
            let result = connect(&ProviderSettings::new(id));

            assert!(matches!(result, Err(ref e) if e.kind() == ErrorKind::Configuration));
        }
    }

    #[test]
    fn connect_builds_the_requested_provider() {
        let mut settings = ProviderSettings::new(ProviderIdentifier::Mistral);
        settings.api_key = Some("sk-test".to_string());

        let client = connect(&settings).expect("a keyed provider should connect");

        assert_eq!(client.id(), ProviderIdentifier::Mistral);
    }

    #[test]
    fn connect_rejects_unparsable_api_base() {
        let mut settings = ProviderSettings::new(ProviderIdentifier::OpenAI);
        settings.api_key = Some("sk-test".to_string());
        settings.api_base = Some("not a url".to_string());

        let result = connect(&settings);

        assert!(matches!(result, Err(ref e) if e.kind() == ErrorKind::Configuration));
    }
}
