//! Guessing a provider from the shape of a model id.
//!
//! This is consulted only when an id is missing from the catalog: the cache is still
//! cold, or the caller names a model released after the last refresh. It is a
//! heuristic, so the rules live in one ordered table where the ambiguity is visible.

use crate::providers::providers::ProviderIdentifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pattern {
    Prefix(&'static str),
    Contains(&'static str),
}

impl Pattern {
    fn matches(self, model_id: &str) -> bool {
        match self {
            Pattern::Prefix(prefix) => model_id.starts_with(prefix),
            Pattern::Contains(needle) => model_id.contains(needle),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FallbackRule {
    pub pattern: Pattern,
    pub provider: ProviderIdentifier,
}

const fn rule(pattern: Pattern, provider: ProviderIdentifier) -> FallbackRule {
    FallbackRule { pattern, provider }
}

/// Evaluated top to bottom; the first match decides. Prefixes come before substring
/// rules so that e.g. `gpt-4o-mistral-distill` is still attributed to OpenAI.
pub(crate) const FALLBACK_RULES: &[FallbackRule] = &[
    rule(Pattern::Prefix("gpt-"), ProviderIdentifier::OpenAI),
    rule(Pattern::Prefix("chatgpt-"), ProviderIdentifier::OpenAI),
    rule(Pattern::Prefix("o1"), ProviderIdentifier::OpenAI),
    rule(Pattern::Prefix("o3"), ProviderIdentifier::OpenAI),
    rule(Pattern::Prefix("o4"), ProviderIdentifier::OpenAI),
    rule(Pattern::Prefix("claude-"), ProviderIdentifier::Anthropic),
    rule(Pattern::Prefix("gemini-"), ProviderIdentifier::Google),
    rule(Pattern::Prefix("gemma-"), ProviderIdentifier::Google),
    rule(Pattern::Prefix("mistral-"), ProviderIdentifier::Mistral),
    rule(Pattern::Prefix("open-mistral"), ProviderIdentifier::Mistral),
    rule(Pattern::Prefix("open-mixtral"), ProviderIdentifier::Mistral),
    rule(Pattern::Prefix("codestral"), ProviderIdentifier::Mistral),
    rule(Pattern::Prefix("ministral"), ProviderIdentifier::Mistral),
    rule(Pattern::Prefix("pixtral"), ProviderIdentifier::Mistral),
    rule(Pattern::Prefix("magistral"), ProviderIdentifier::Mistral),
    rule(Pattern::Contains("claude"), ProviderIdentifier::Anthropic),
    rule(Pattern::Contains("gemini"), ProviderIdentifier::Google),
    rule(Pattern::Contains("mistral"), ProviderIdentifier::Mistral),
    rule(Pattern::Contains("mixtral"), ProviderIdentifier::Mistral),
];

/// The provider named by the first rule matching `model_id`, if any.
pub(crate) fn infer_provider(rules: &[FallbackRule], model_id: &str) -> Option<ProviderIdentifier> {
    let model_id = model_id.to_ascii_lowercase();

    rules
        .iter()
        .find(|rule| rule.pattern.matches(&model_id))
        .map(|rule| rule.provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infer(model_id: &str) -> Option<ProviderIdentifier> {
        infer_provider(FALLBACK_RULES, model_id)
    }

    #[test]
    fn vendor_prefixes_are_recognised() {
        assert_eq!(infer("gpt-4.5-preview"), Some(ProviderIdentifier::OpenAI));
        assert_eq!(infer("o3-pro"), Some(ProviderIdentifier::OpenAI));
        assert_eq!(infer("claude-opus-4-20250514"), Some(ProviderIdentifier::Anthropic));
        assert_eq!(infer("gemini-2.5-pro"), Some(ProviderIdentifier::Google));
        assert_eq!(infer("codestral-2501"), Some(ProviderIdentifier::Mistral));
    }

    #[test]
    fn matching_ignores_case() {
        assert_eq!(infer("Claude-3-Opus"), Some(ProviderIdentifier::Anthropic));
    }

    #[test]
    fn substrings_are_tried_after_prefixes() {
        assert_eq!(infer("gpt-4o-mistral-distill"), Some(ProviderIdentifier::OpenAI));
        assert_eq!(infer("my-finetuned-mixtral"), Some(ProviderIdentifier::Mistral));
        assert_eq!(infer("vertex-gemini-proxy"), Some(ProviderIdentifier::Google));
    }

    #[test]
    fn unknown_ids_do_not_match() {
        assert_eq!(infer("unknown-id"), None);
        assert_eq!(infer("llama3"), None);
        assert_eq!(infer(""), None);
    }

    #[test]
    fn rule_order_decides_ties() {
        let rules = [
            rule(Pattern::Contains("x"), ProviderIdentifier::Google),
            rule(Pattern::Prefix("x"), ProviderIdentifier::OpenAI),
        ];

        assert_eq!(infer_provider(&rules, "xyz"), Some(ProviderIdentifier::Google));
    }
}
