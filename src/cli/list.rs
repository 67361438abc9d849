use strum::IntoEnumIterator;
use table::Table;
pub(crate) mod table;

use super::{format_output, registry_or_die};
use crate::{
    config::Config,
    providers::{providers::ProviderIdentifier, ModelDescriptor},
    registry::registry::ProviderRegistry,
    ListArgs, ListObject,
};

fn context_cell(context: Option<u64>) -> String {
    match context {
        Some(context) => context.to_string(),
        None => "unknown".to_string(),
    }
}

impl From<Vec<ModelDescriptor>> for Table {
    fn from(value: Vec<ModelDescriptor>) -> Self {
        let mut tab = Table::new();

        tab.set_header(vec!["MODEL", "PROVIDER", "CONTEXT", "DEFAULT", "NAME"]);

        for model in value {
            tab.add_row(vec![
                model.id().to_string(),
                model.provider().to_string(),
                context_cell(model.context_window()),
                if model.is_default() { "yes" } else { "no" }.to_string(),
                model.display_name().to_string(),
            ]);
        }

        tab
    }
}

#[derive(serde::Serialize)]
struct Provider {
    provider: ProviderIdentifier,
    registered: bool,
}

impl From<Vec<Provider>> for Table {
    fn from(value: Vec<Provider>) -> Self {
        let mut tab = Table::new();

        tab.set_header(vec!["PROVIDER", "STATUS"]);

        for provider in value {
            tab.add_row(vec![
                provider.provider.to_string(),
                if provider.registered {
                    "registered".to_string()
                } else {
                    "unregistered".to_string()
                },
            ]);
        }

        tab
    }
}

fn get_providers(registry: &ProviderRegistry) -> Vec<Provider> {
    ProviderIdentifier::iter()
        .map(|id| Provider {
            provider: id,
            registered: registry.provider(id).is_some(),
        })
        .collect()
}

async fn get_models(
    registry: &ProviderRegistry,
    provider: Option<ProviderIdentifier>,
) -> Vec<ModelDescriptor> {
    let catalog = registry.load_models(false).await;

    match provider {
        Some(id) => {
            if registry.provider(id).is_none() {
                crate::warn!("provider \"{}\" is not registered", id);
            }

            registry.models_for(id)
        }
        None => catalog.iter().cloned().collect(),
    }
}

pub(crate) async fn list_cmd(config: &Config, args: &ListArgs) {
    let format = args.format;

    let registry = registry_or_die(config);

    match &args.object {
        ListObject::Models(args) => {
            let models = get_models(&registry, args.provider).await;

            if models.is_empty() && registry.is_empty() {
                crate::warn!("no providers are registered, define an API key to enable one");
            }

            format_output(models, format);
        }
        ListObject::Providers => {
            let providers = get_providers(&registry);
            format_output(providers, format);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderClient;
    use crate::registry::registry::CacheSettings;
    use crate::registry::testing::MockProvider;
    use std::sync::Arc;

    fn registry() -> ProviderRegistry {
        let clients: [Arc<dyn ProviderClient>; 2] = [
            Arc::new(MockProvider::serving(ProviderIdentifier::OpenAI, &["gpt-4o"])),
            Arc::new(
                MockProvider::serving(ProviderIdentifier::Mistral, &["codestral", "gpt-4o"])
                    .with_default("codestral"),
            ),
        ];

        ProviderRegistry::with_providers(clients, CacheSettings::default())
    }

    #[tokio::test]
    async fn lists_merged_models() {
        let registry = registry();

        let all = get_models(&registry, None).await;
        let mistral = get_models(&registry, Some(ProviderIdentifier::Mistral)).await;

        let ids: Vec<&str> = all.iter().map(ModelDescriptor::id).collect();
        assert_eq!(ids, ["gpt-4o", "codestral"]);
        assert_eq!(mistral.len(), 1);

        let tab = Table::from(mistral).to_string();
        assert!(tab.starts_with("MODEL"));
        assert!(tab.contains("codestral  mistral   unknown  yes      codestral"));
    }

    #[test]
    fn model_table_shows_display_names() {
        let models = vec![
            ModelDescriptor::new("claude-3-opus-20240229", ProviderIdentifier::Anthropic)
                .with_display_name("Claude Opus 3")
                .with_context_window(Some(200_000)),
        ];

        assert_eq!(
            Table::from(models).to_string(),
            "MODEL                   PROVIDER   CONTEXT  DEFAULT  NAME\n\
             claude-3-opus-20240229  anthropic  200000   no       Claude Opus 3\n"
        );
    }

    #[test]
    fn lists_every_known_provider() {
        let providers = get_providers(&registry());

        let registered: Vec<ProviderIdentifier> = providers
            .iter()
            .filter(|p| p.registered)
            .map(|p| p.provider)
            .collect();

        assert_eq!(providers.len(), 4);
        assert_eq!(
            registered,
            [ProviderIdentifier::OpenAI, ProviderIdentifier::Mistral]
        );
    }
}
