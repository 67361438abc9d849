use async_trait::async_trait;
use std::time::Duration;

use super::api;
use crate::providers::apireq::ApiError;
use crate::providers::providers::{ProviderIdentifier, ProviderSettings};
use crate::providers::{
    Error, GenerationOptions, Modality, ModelDescriptor, ProviderClient, DEFAULT_REQUEST_TIMEOUT,
};

const DEFAULT_MODEL: &str = "gemini-2.0-flash";

impl From<api::Model> for ModelDescriptor {
    fn from(value: api::Model) -> Self {
        let id = value.id().to_string();
        let display_name = value.display_name.unwrap_or_else(|| id.clone());

        ModelDescriptor::new(id, ProviderIdentifier::Google)
            .with_display_name(display_name)
            .with_description(value.description)
            .with_context_window(value.input_token_limit)
            .with_modalities(
                vec![
                    Modality::Text,
                    Modality::Image,
                    Modality::Audio,
                    Modality::Video,
                ],
                vec![Modality::Text],
            )
    }
}

pub(crate) struct GoogleProvider {
    api: api::GoogleApi,
    default_model: String,
    timeout: Duration,
}

impl GoogleProvider {
    pub(crate) fn new(settings: &ProviderSettings) -> Result<GoogleProvider, Error> {
        let api_key = settings.credential()?;
        let timeout = settings.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let api_base = settings.api_base.as_deref().unwrap_or(api::DEFAULT_API_BASE);

        Ok(GoogleProvider {
            api: api::GoogleApi::new(api_key, api_base, timeout)?,
            default_model: settings
                .default_model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout,
        })
    }
}

#[async_trait]
impl ProviderClient for GoogleProvider {
    fn id(&self) -> ProviderIdentifier {
        ProviderIdentifier::Google
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, Error> {
        let models = self
            .api
            .models()
            .await?
            .into_iter()
            .filter(api::Model::can_generate)
            .map(|model| {
                let is_default = model.id() == self.default_model;
                ModelDescriptor::from(model).marked_default(is_default)
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
        let contents = [api::Content {
            role: Some("user"),
            parts: vec![api::Part { text: prompt }],
        }];

        let system = options.system.as_deref().map(|text| api::Content {
            role: None,
            parts: vec![api::Part { text }],
        });

        let config = api::GenerationConfig {
            temperature: options.temperature,
            max_output_tokens: options.max_tokens,
        };

        let res = self
            .api
            .generate_content(model, &contents, system.as_ref(), &config)
            .await?;

        if let Some(usage) = &res.usage_metadata {
            tracing::debug!(
                provider = %ProviderIdentifier::Google,
                model,
                prompt_tokens = usage.prompt_token_count,
                completion_tokens = usage.candidates_token_count,
                finish_reason = res
                    .candidates
                    .first()
                    .and_then(|c| c.finish_reason.as_deref())
                    .unwrap_or("unknown"),
                "generation finished"
            );
        }

        res.text().ok_or_else(|| ApiError::EmptyCompletion.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listed_models_drop_resource_prefix() {
        let model = api::Model {
            name: "models/gemini-1.5-pro".to_string(),
            display_name: Some("Gemini 1.5 Pro".to_string()),
            description: Some("Mid-size multimodal model".to_string()),
            input_token_limit: Some(2_000_000),
            supported_generation_methods: vec!["generateContent".to_string()],
        };

        let descriptor = ModelDescriptor::from(model);

        assert_eq!(descriptor.id(), "gemini-1.5-pro");
        assert_eq!(descriptor.provider(), ProviderIdentifier::Google);
        assert_eq!(descriptor.context_window(), Some(2_000_000));
    }

    #[test]
    fn custom_api_base_is_accepted() {
        let mut settings = ProviderSettings::new(ProviderIdentifier::Google);
        settings.api_key = Some("key".to_string());
        settings.api_base = Some("http://localhost:8080/gemini".to_string());
        settings.timeout = Some(Duration::from_secs(3));

        let provider = GoogleProvider::new(&settings).unwrap();

        assert_eq!(provider.timeout(), Duration::from_secs(3));
        assert_eq!(provider.default_model, DEFAULT_MODEL);
    }
}
