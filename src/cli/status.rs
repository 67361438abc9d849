use std::collections::BTreeMap;

use super::list::table::Table;
use super::{format_output, registry_or_die};
use crate::color::{MaybePaint, HEALTHY, LABEL, UNHEALTHY};
use crate::config::Config;
use crate::die;
use crate::providers::providers::ProviderIdentifier;
use crate::registry::registry::ResolvedModel;
use crate::{HealthArgs, ResolveArgs};

#[derive(serde::Serialize)]
struct Health {
    provider: ProviderIdentifier,
    healthy: bool,
}

impl From<Vec<Health>> for Table {
    fn from(value: Vec<Health>) -> Self {
        let mut tab = Table::new();

        tab.set_header(vec!["PROVIDER", "STATUS"]);

        for health in value {
            let status = if health.healthy {
                HEALTHY.maybe_paint("up").to_string()
            } else {
                UNHEALTHY.maybe_paint("down").to_string()
            };

            tab.add_row(vec![health.provider.to_string(), status]);
        }

        tab
    }
}

fn health_report(health: BTreeMap<ProviderIdentifier, bool>) -> Vec<Health> {
    health
        .into_iter()
        .map(|(provider, healthy)| Health { provider, healthy })
        .collect()
}

fn describe_resolution(resolved: &ResolvedModel) -> String {
    format!(
        "{}/{} ({})",
        LABEL.maybe_paint(resolved.provider.id().to_string()),
        resolved.model_id,
        resolved.method
    )
}

pub(crate) async fn resolve_cmd(config: &Config, args: &ResolveArgs) {
    let registry = registry_or_die(config);

    registry.load_models(false).await;

    match registry.resolve_model(&args.model) {
        Some(resolved) => println!("{}", describe_resolution(&resolved)),
        None => die!(
            "model \"{}\" is not served by any of the available providers",
            args.model
        ),
    }
}

pub(crate) async fn health_cmd(config: &Config, args: &HealthArgs) {
    let registry = registry_or_die(config);

    if registry.is_empty() {
        crate::warn!("no providers are registered, define an API key to enable one");
    }

    let report = health_report(registry.check_all_health().await);
    let all_healthy = report.iter().all(|health| health.healthy);

    format_output(report, args.format);

    if !all_healthy {
        std::process::exit(crate::utils::errors::DEFAULT_EXIT_CODE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ColorMode;
    use crate::color::configure_color;
    use crate::providers::ProviderClient;
    use crate::registry::registry::{CacheSettings, ProviderRegistry};
    use crate::registry::testing::MockProvider;
    use std::sync::Arc;

    #[test]
    fn resolutions_name_provider_and_method() {
        configure_color(ColorMode::Off);

        let clients: [Arc<dyn ProviderClient>; 1] = [Arc::new(MockProvider::serving(
            ProviderIdentifier::Anthropic,
            &[],
        ))];
        let registry = ProviderRegistry::with_providers(clients, CacheSettings::default());

        let resolved = registry.resolve_model("claude-3-opus").unwrap();

        assert_eq!(
            describe_resolution(&resolved),
            "anthropic/claude-3-opus (inferred)"
        );
    }

    #[test]
    fn health_table_lists_each_provider() {
        configure_color(ColorMode::Off);

        let report = health_report(BTreeMap::from([
            (ProviderIdentifier::Google, false),
            (ProviderIdentifier::OpenAI, true),
        ]));

        assert_eq!(
            Table::from(report).to_string(),
            "PROVIDER  STATUS\nopenai    up\ngoogle    down\n"
        );
    }
}
