use std::env::VarError;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tokio::task::JoinHandle;

use super::catalog::Catalog;
use super::registry::{CacheSettings, ProviderRegistry};
use crate::config::{self, Config, RequestedProviderEnabled};
use crate::providers::providers::{ProviderIdentifier, ProviderSettings};

fn env_api_key(var: &str) -> Option<String> {
    match std::env::var(var) {
        Ok(api_key) => Some(api_key),
        Err(err) => match err {
            VarError::NotUnicode(_) => {
                tracing::warn!(var, "ignoring credential which is not valid unicode");
                None
            }
            VarError::NotPresent => None,
        },
    }
}

/// Settings for every provider which should be registered, in registration order.
///
/// The config file's key takes precedence over the environment. A provider with
/// `enabled = "auto"` is skipped when neither holds a key; `enabled = "yes"` turns
/// that into an error.
pub(crate) fn provider_settings_with<E>(
    config: &Config,
    mut lookup: E,
) -> Result<Vec<ProviderSettings>, config::Error>
where
    E: FnMut(&str) -> Option<String>,
{
    let mut settings = Vec::new();

    for id in ProviderIdentifier::iter() {
        let provider = config.providers.get(id);

        if provider.enabled == RequestedProviderEnabled::No {
            tracing::debug!(provider = %id, "provider disabled in config");
            continue;
        }

        let api_key = provider
            .api_key
            .clone()
            .or_else(|| lookup(id.credential_var()))
            .filter(|key| !key.trim().is_empty());

        if api_key.is_none() {
            if provider.enabled == RequestedProviderEnabled::Yes {
                return Err(config::Error::MissingCredential(id, id.credential_var()));
            }

            continue;
        }

        settings.push(ProviderSettings {
            api_key,
            api_base: provider.api_base.clone(),
            default_model: provider.default_model.clone(),
            timeout: provider.timeout(),
            ..ProviderSettings::new(id)
        });
    }

    Ok(settings)
}

pub(crate) fn provider_settings(config: &Config) -> Result<Vec<ProviderSettings>, config::Error> {
    provider_settings_with(config, env_api_key)
}

/// Populate a registry with the available providers
pub(crate) fn populated_registry(config: &Config) -> Result<Arc<ProviderRegistry>, config::Error> {
    let settings = provider_settings(config)?;

    let registry = ProviderRegistry::initialize(&settings, CacheSettings::from(&config.cache));

    if registry.is_empty() {
        tracing::warn!("no provider has a credential, the catalog will be empty");
    }

    Ok(Arc::new(registry))
}

/// Primes the catalog in the background.
///
/// Failures are absorbed by the registry, so the handle only reports what was
/// loaded. Callers that need the catalog before continuing await it.
pub(crate) fn prime(registry: &Arc<ProviderRegistry>) -> JoinHandle<Arc<Catalog>> {
    let registry = Arc::clone(registry);

    tokio::spawn(async move { registry.load_models(true).await })
}

/// Builds the registry from `config` and starts loading the catalog.
pub(crate) fn bootstrap(
    config: &Config,
) -> Result<(Arc<ProviderRegistry>, JoinHandle<Arc<Catalog>>), config::Error> {
    let registry = populated_registry(config)?;
    let priming = prime(&registry);

    Ok((registry, priming))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderClient;
    use crate::registry::testing::MockProvider;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl FnMut(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        move |var| vars.get(var).cloned()
    }

    #[test]
    fn providers_without_credentials_are_omitted() {
        let config = Config::default();

        let settings =
            provider_settings_with(&config, env(&[("ANTHROPIC_API_KEY", "sk-ant")])).unwrap();

        assert_eq!(settings.len(), 1);
        assert_eq!(settings[0].id, ProviderIdentifier::Anthropic);
        assert_eq!(settings[0].api_key.as_deref(), Some("sk-ant"));
    }

    #[test]
    fn config_key_takes_precedence_over_environment() {
        let mut config = Config::default();
        config.providers.openai.api_key = Some("from-config".to_string());
        config.providers.openai.api_base = Some("http://localhost:4000".to_string());

        let settings =
            provider_settings_with(&config, env(&[("OPENAI_API_KEY", "from-env")])).unwrap();

        assert_eq!(settings[0].api_key.as_deref(), Some("from-config"));
        assert_eq!(settings[0].api_base.as_deref(), Some("http://localhost:4000"));
    }

    #[test]
    fn settings_follow_registration_order() {
        let vars = [
            ("MISTRAL_API_KEY", "m"),
            ("GEMINI_API_KEY", "g"),
            ("OPENAI_API_KEY", "o"),
        ];

        let ids: Vec<ProviderIdentifier> = provider_settings_with(&Config::default(), env(&vars))
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();

        assert_eq!(
            ids,
            [
                ProviderIdentifier::OpenAI,
                ProviderIdentifier::Google,
                ProviderIdentifier::Mistral
            ]
        );
    }

    #[test]
    fn disabled_providers_are_skipped_even_with_a_key() {
        let mut config = Config::default();
        config.providers.google.enabled = RequestedProviderEnabled::No;

        let settings = provider_settings_with(&config, env(&[("GEMINI_API_KEY", "g")])).unwrap();

        assert!(settings.is_empty());
    }

    #[test]
    fn required_provider_without_credential_fails() {
        let mut config = Config::default();
        config.providers.mistral.enabled = RequestedProviderEnabled::Yes;
        config.providers.mistral.api_key = Some("   ".to_string());

        let result = provider_settings_with(&config, env(&[]));

        assert!(matches!(
            result,
            Err(config::Error::MissingCredential(ProviderIdentifier::Mistral, "MISTRAL_API_KEY"))
        ));
    }

    #[tokio::test]
    async fn priming_loads_the_catalog() {
        let client = Arc::new(MockProvider::serving(ProviderIdentifier::Google, &["g1"]));
        let registry = Arc::new(ProviderRegistry::with_providers(
            [Arc::clone(&client) as Arc<dyn ProviderClient>],
            CacheSettings::default(),
        ));

        let catalog = prime(&registry).await.unwrap();

        assert!(catalog.get("g1").is_some());
        assert_eq!(client.list_calls(), 1);
        assert!(Arc::ptr_eq(&catalog, &registry.list_available_models()));
    }
}
