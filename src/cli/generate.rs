use std::io::{self, IsTerminal, Read};

use crate::config::Config;
use crate::die;
use crate::providers::GenerationOptions;
use crate::registry::populate::bootstrap;
use crate::GenerateArgs;

/// The prompt, either from the positional argument or from standard input.
fn read_prompt(args: &GenerateArgs) -> String {
    let in_terminal = io::stdin().is_terminal();

    if let Some(prompt) = &args.prompt {
        if !in_terminal {
            die!("it appears that a prompt is being provided both through standard input and the prompt argument");
        }

        return prompt.clone();
    }

    if in_terminal {
        die!("no prompt was provided, pass one as an argument or through standard input");
    }

    let mut buf = String::new();

    if let Err(err) = io::stdin().read_to_string(&mut buf) {
        die!("failed to read the prompt from standard input: {}", err);
    }

    buf
}

fn generation_options(args: &GenerateArgs) -> GenerationOptions {
    GenerationOptions {
        system: args.system.clone(),
        temperature: args.temperature,
        max_tokens: args.max_tokens,
    }
}

pub(crate) async fn generate_cmd(config: &Config, args: &GenerateArgs) {
    let (registry, priming) = match bootstrap(config) {
        Ok(bootstrapped) => bootstrapped,
        Err(err) => die!("{}", err),
    };

    if registry.is_empty() {
        die!("none of the providers are registered, at least one needs an API key to generate text");
    }

    // The catalog loads while standard input is drained.
    let prompt = read_prompt(args);

    if prompt.trim().is_empty() {
        die!("the prompt is empty");
    }

    if let Err(err) = priming.await {
        tracing::warn!(error = %err, "failed to prime the model catalog");
    }

    let resolved = match registry.require(args.model.as_deref()) {
        Ok(resolved) => resolved,
        Err(err) => die!("failed to resolve model: {}", err),
    };

    tracing::info!(
        provider = %resolved.provider.id(),
        model = %resolved.model_id,
        method = %resolved.method,
        "resolved model"
    );

    let options = generation_options(args);

    match resolved
        .provider
        .generate_text(&resolved.model_id, &prompt, &options)
        .await
    {
        Ok(text) => println!("{}", text.trim_end()),
        Err(err) => die!("{} failed to generate text: {}", resolved.provider.id(), err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{providers::ProviderIdentifier, ProviderClient};
    use crate::registry::registry::{CacheSettings, ProviderRegistry};
    use crate::registry::testing::MockProvider;
    use std::sync::Arc;

    #[test]
    fn options_carry_the_flags() {
        let args = GenerateArgs {
            system: Some("be terse".to_string()),
            temperature: Some(0.2),
            max_tokens: Some(64),
            ..Default::default()
        };

        let options = generation_options(&args);

        assert_eq!(options.system.as_deref(), Some("be terse"));
        assert_eq!(options.temperature, Some(0.2));
        assert_eq!(options.max_tokens, Some(64));
    }

    #[tokio::test]
    async fn the_resolved_client_generates() {
        let clients: [Arc<dyn ProviderClient>; 1] = [Arc::new(MockProvider::serving(
            ProviderIdentifier::Google,
            &["gemini-2.0-flash"],
        ))];
        let registry = ProviderRegistry::with_providers(clients, CacheSettings::default());

        registry.load_models(false).await;

        let resolved = registry.require(None).unwrap();
        let text = resolved
            .provider
            .generate_text(&resolved.model_id, "hi", &GenerationOptions::default())
            .await
            .unwrap();

        assert_eq!(text, "google:gemini-2.0-flash:hi");
    }
}
