use async_trait::async_trait;
use std::time::Duration;

use super::api;
use crate::providers::apireq::ApiError;
use crate::providers::providers::{ProviderIdentifier, ProviderSettings};
use crate::providers::{
    Error, GenerationOptions, Modality, ModelDescriptor, ProviderClient, DEFAULT_REQUEST_TIMEOUT,
};

const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";

// The messages API requires an explicit output budget.
const DEFAULT_MAX_TOKENS: u32 = 1024;

// Every model currently served through the Messages API shares this window.
const CONTEXT_WINDOW: u64 = 200_000;

impl From<api::ModelInfo> for ModelDescriptor {
    fn from(value: api::ModelInfo) -> Self {
        let display_name = value.display_name.unwrap_or_else(|| value.id.clone());

        ModelDescriptor::new(value.id, ProviderIdentifier::Anthropic)
            .with_display_name(display_name)
            .with_context_window(Some(CONTEXT_WINDOW))
            .with_modalities(vec![Modality::Text, Modality::Image], vec![Modality::Text])
    }
}

pub(crate) struct AnthropicProvider {
    api: api::AnthropicApi,
    default_model: String,
    timeout: Duration,
}

impl AnthropicProvider {
    pub(crate) fn new(settings: &ProviderSettings) -> Result<AnthropicProvider, Error> {
        let api_key = settings.credential()?;
        let timeout = settings.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let api_base = settings.api_base.as_deref().unwrap_or(api::DEFAULT_API_BASE);

        Ok(AnthropicProvider {
            api: api::AnthropicApi::new(api_key, api_base, timeout)?,
            default_model: settings
                .default_model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout,
        })
    }
}

#[async_trait]
impl ProviderClient for AnthropicProvider {
    fn id(&self) -> ProviderIdentifier {
        ProviderIdentifier::Anthropic
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, Error> {
        let infos = self.api.models().await?;

        // The "-latest" aliases are accepted by the API but never listed, so the
        // built-in default only matches when the user configured a listed id.
        let models = infos
            .into_iter()
            .map(|info| {
                let is_default = info.id == self.default_model;
                ModelDescriptor::from(info).marked_default(is_default)
            })
            .collect();

        Ok(models)
    }

    async fn check_health(&self) -> bool {
        self.api.probe(self.health_timeout()).await.is_ok()
    }

    async fn generate_text(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, Error> {
        let messages = [api::Message {
            role: api::Role::User,
            content: prompt,
        }];

        let res = self
            .api
            .messages(
                model,
                &messages,
                options.system.as_deref(),
                options.temperature,
                options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            )
            .await?;

        if let Some(usage) = &res.usage {
            tracing::debug!(
                provider = %ProviderIdentifier::Anthropic,
                model,
                prompt_tokens = usage.input_tokens,
                completion_tokens = usage.output_tokens,
                stop_reason = res.stop_reason.as_deref().unwrap_or("unknown"),
                "message finished"
            );
        }

        res.text().ok_or_else(|| ApiError::EmptyCompletion.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listed_models_get_the_shared_window() {
        let info = api::ModelInfo {
            id: "claude-3-opus-20240229".to_string(),
            display_name: Some("Claude Opus 3".to_string()),
        };

        let model = ModelDescriptor::from(info);

        assert_eq!(model.provider(), ProviderIdentifier::Anthropic);
        assert_eq!(model.display_name(), "Claude Opus 3");
        assert_eq!(model.context_window(), Some(CONTEXT_WINDOW));
    }

    #[test]
    fn missing_key_is_rejected() {
        let settings = ProviderSettings::new(ProviderIdentifier::Anthropic);

        assert!(AnthropicProvider::new(&settings).is_err());
    }
}
