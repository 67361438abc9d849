//! Mistral speaks the OpenAI chat completions protocol. Only its model listing differs.

use super::openai::api::ModelObject;
use super::openai::{Dialect, OpenAIProvider};
use super::providers::{ProviderIdentifier, ProviderSettings};
use super::{Error, Modality, ModelDescriptor};

const MISTRAL: Dialect = Dialect {
    id: ProviderIdentifier::Mistral,
    api_base: "https://api.mistral.ai",
    default_model: "mistral-small-latest",
    describe,
};

/// Mistral reports capabilities and context length itself. Models without
/// chat completion support (embeddings, moderation, OCR) are dropped.
fn describe(model: ModelObject) -> Option<ModelDescriptor> {
    let capabilities = model.capabilities.unwrap_or_default();

    if model.capabilities.is_some() && !capabilities.completion_chat {
        return None;
    }

    let input = if capabilities.vision {
        vec![Modality::Text, Modality::Image]
    } else {
        vec![Modality::Text]
    };

    let display_name = model.name.clone().unwrap_or_else(|| model.id.clone());

    Some(
        ModelDescriptor::new(model.id, ProviderIdentifier::Mistral)
            .with_display_name(display_name)
            .with_description(model.description)
            .with_context_window(model.max_context_length)
            .with_modalities(input, vec![Modality::Text]),
    )
}

impl OpenAIProvider {
    pub(crate) fn mistral(settings: &ProviderSettings) -> Result<OpenAIProvider, Error> {
        Self::with_dialect(MISTRAL, settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::openai::api::Capabilities;

    fn object(id: &str, capabilities: Option<Capabilities>) -> ModelObject {
        ModelObject {
            id: id.to_string(),
            name: Some(format!("{id}-2503")),
            description: Some("A model".to_string()),
            max_context_length: Some(32_768),
            capabilities,
        }
    }

    #[test]
    fn embedding_models_are_dropped() {
        let caps = Capabilities {
            completion_chat: false,
            vision: false,
        };

        assert!(describe(object("mistral-embed", Some(caps))).is_none());
    }

    #[test]
    fn chat_models_carry_reported_metadata() {
        let caps = Capabilities {
            completion_chat: true,
            vision: true,
        };

        let model = describe(object("pixtral-large-latest", Some(caps))).unwrap();

        assert_eq!(model.provider(), ProviderIdentifier::Mistral);
        assert_eq!(model.display_name(), "pixtral-large-latest-2503");
        assert_eq!(model.context_window(), Some(32_768));
        assert_eq!(model.description(), Some("A model"));
        assert_eq!(model.input_modalities(), Some(&[Modality::Text, Modality::Image][..]));
    }

    #[test]
    fn models_without_capabilities_are_assumed_to_chat() {
        assert!(describe(object("open-mistral-7b", None)).is_some());
    }
}
