use crate::providers::openai::api::ModelObject;
use crate::providers::{providers::ProviderIdentifier, Modality, ModelDescriptor, Pricing};

pub(super) const DEFAULT_API_BASE: &str = "https://api.openai.com";

// This should default to the cheapest flagship model.
pub(super) const DEFAULT_MODEL: &str = "gpt-4o-mini";

struct KnownModel {
    prefix: &'static str,
    display_name: &'static str,
    context_window: u64,
    vision: bool,
    pricing: Pricing,
}

const fn per_million(input: f64, output: f64) -> Pricing {
    Pricing {
        input_per_million: input,
        output_per_million: output,
    }
}

// The OpenAI model listing only reports ids. Context lengths and list prices are filled
// in from this table, which needs to be updated whenever a model family is added or the
// context length or price of a family changes. Longest prefix wins, so dated snapshots
// inherit from their family.
const KNOWN_MODELS: &[KnownModel] = &[
    KnownModel {
        prefix: "gpt-4.1",
        display_name: "GPT-4.1",
        context_window: 1_047_576,
        vision: true,
        pricing: per_million(2.0, 8.0),
    },
    KnownModel {
        prefix: "gpt-4o-mini",
        display_name: "GPT-4o mini",
        context_window: 128_000,
        vision: true,
        pricing: per_million(0.15, 0.6),
    },
    KnownModel {
        prefix: "gpt-4o",
        display_name: "GPT-4o",
        context_window: 128_000,
        vision: true,
        pricing: per_million(2.5, 10.0),
    },
    KnownModel {
        prefix: "chatgpt-4o",
        display_name: "ChatGPT-4o",
        context_window: 128_000,
        vision: true,
        pricing: per_million(5.0, 15.0),
    },
    KnownModel {
        prefix: "gpt-4-turbo",
        display_name: "GPT-4 Turbo",
        context_window: 128_000,
        vision: true,
        pricing: per_million(10.0, 30.0),
    },
    KnownModel {
        prefix: "gpt-4",
        display_name: "GPT-4",
        context_window: 8_192,
        vision: false,
        pricing: per_million(30.0, 60.0),
    },
    KnownModel {
        prefix: "gpt-3.5-turbo",
        display_name: "GPT-3.5 Turbo",
        context_window: 16_385,
        vision: false,
        pricing: per_million(0.5, 1.5),
    },
    KnownModel {
        prefix: "o1",
        display_name: "o1",
        context_window: 200_000,
        vision: true,
        pricing: per_million(15.0, 60.0),
    },
    KnownModel {
        prefix: "o3-mini",
        display_name: "o3-mini",
        context_window: 200_000,
        vision: false,
        pricing: per_million(1.1, 4.4),
    },
    KnownModel {
        prefix: "o3",
        display_name: "o3",
        context_window: 200_000,
        vision: true,
        pricing: per_million(2.0, 8.0),
    },
    KnownModel {
        prefix: "o4-mini",
        display_name: "o4-mini",
        context_window: 200_000,
        vision: true,
        pricing: per_million(1.1, 4.4),
    },
];

const CHAT_PREFIXES: [&str; 5] = ["gpt-", "chatgpt-", "o1", "o3", "o4"];

// Model families served under chat-looking ids that do not accept plain chat requests.
const NON_CHAT_MARKERS: [&str; 8] = [
    "audio",
    "realtime",
    "transcribe",
    "tts",
    "search",
    "image",
    "instruct",
    "embedding",
];

fn known_model(id: &str) -> Option<&'static KnownModel> {
    KNOWN_MODELS
        .iter()
        .filter(|known| id.starts_with(known.prefix))
        .max_by_key(|known| known.prefix.len())
}

fn is_chat_model(id: &str) -> bool {
    CHAT_PREFIXES.iter().any(|prefix| id.starts_with(prefix))
        && !NON_CHAT_MARKERS.iter().any(|marker| id.contains(marker))
}

/// Turns an entry of the OpenAI model listing into a descriptor, skipping models
/// that cannot serve chat completions.
pub(super) fn describe(model: ModelObject) -> Option<ModelDescriptor> {
    if !is_chat_model(&model.id) {
        return None;
    }

    let descriptor = ModelDescriptor::new(model.id.as_str(), ProviderIdentifier::OpenAI);

    let descriptor = match known_model(&model.id) {
        Some(known) => {
            let display_name = if known.prefix == model.id {
                known.display_name.to_string()
            } else {
                format!("{} ({})", known.display_name, model.id)
            };

            let input = if known.vision {
                vec![Modality::Text, Modality::Image]
            } else {
                vec![Modality::Text]
            };

            descriptor
                .with_display_name(display_name)
                .with_context_window(Some(known.context_window))
                .with_modalities(input, vec![Modality::Text])
                .with_pricing(Some(known.pricing))
        }
        None => descriptor,
    };

    Some(descriptor)
}
