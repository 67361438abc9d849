use async_trait::async_trait;
use std::time::Duration;

use crate::providers::apireq::ApiError;
use crate::providers::openai::{api, models};
use crate::providers::providers::{ProviderIdentifier, ProviderSettings};
use crate::providers::{
    Error, GenerationOptions, ModelDescriptor, ProviderClient, DEFAULT_REQUEST_TIMEOUT,
};

/// The parts of an OpenAI compatible API that differ between vendors.
pub(crate) struct Dialect {
    pub id: ProviderIdentifier,
    pub api_base: &'static str,
    pub default_model: &'static str,
    /// Converts a listed model, returning `None` for models that cannot chat.
    pub describe: fn(api::ModelObject) -> Option<ModelDescriptor>,
}

const OPENAI: Dialect = Dialect {
    id: ProviderIdentifier::OpenAI,
    api_base: models::DEFAULT_API_BASE,
    default_model: models::DEFAULT_MODEL,
    describe: models::describe,
};

pub(crate) struct OpenAIProvider {
    api: api::OpenAIApi,
    dialect: Dialect,
    default_model: String,
    timeout: Duration,
}

impl OpenAIProvider {
    pub(crate) fn with_dialect(
        dialect: Dialect,
        settings: &ProviderSettings,
    ) -> Result<OpenAIProvider, Error> {
        let api_key = settings.credential()?;
        let timeout = settings.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let api_base = settings.api_base.as_deref().unwrap_or(dialect.api_base);

        Ok(OpenAIProvider {
            api: api::OpenAIApi::new(api_key, api_base, timeout)?,
            default_model: settings
                .default_model
                .clone()
                .unwrap_or_else(|| dialect.default_model.to_string()),
            dialect,
            timeout,
        })
    }

    pub(crate) fn openai(settings: &ProviderSettings) -> Result<OpenAIProvider, Error> {
        Self::with_dialect(OPENAI, settings)
    }
}

#[async_trait]
impl ProviderClient for OpenAIProvider {
    fn id(&self) -> ProviderIdentifier {
        self.dialect.id
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, Error> {
        let objects = self.api.models().await?;

        let models = objects
            .into_iter()
            .filter_map(self.dialect.describe)
            .map(|model| {
                let is_default = model.id() == self.default_model;
                model.marked_default(is_default)
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
        let mut messages = Vec::with_capacity(2);

        if let Some(system) = options.system.as_deref() {
            messages.push(api::ChatMessage {
                role: api::Role::System,
                content: system,
            });
        }

        messages.push(api::ChatMessage {
            role: api::Role::User,
            content: prompt,
        });

        let completion = self
            .api
            .chat_completion(model, &messages, options.temperature, options.max_tokens)
            .await?;

        let finish_reason = completion
            .choices
            .first()
            .and_then(|choice| choice.finish_reason.as_deref());

        if let Some(usage) = &completion.usage {
            tracing::debug!(
                provider = %self.dialect.id,
                model,
                finish_reason,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion finished"
            );
        }

        completion
            .into_text()
            .ok_or_else(|| ApiError::EmptyCompletion.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(default_model: Option<&str>) -> ProviderSettings {
        let mut settings = ProviderSettings::new(ProviderIdentifier::OpenAI);
        settings.api_key = Some("sk-test".to_string());
        settings.default_model = default_model.map(str::to_string);
        settings
    }

    #[test]
    fn configured_default_overrides_builtin() {
        let provider = OpenAIProvider::openai(&settings(Some("gpt-4o"))).unwrap();

        assert_eq!(provider.default_model, "gpt-4o");
        assert_eq!(provider.id(), ProviderIdentifier::OpenAI);
    }

    #[test]
    fn builtin_default_and_timeout_apply() {
        let provider = OpenAIProvider::openai(&settings(None)).unwrap();

        assert_eq!(provider.default_model, models::DEFAULT_MODEL);
        assert_eq!(provider.timeout(), DEFAULT_REQUEST_TIMEOUT);
    }
}
