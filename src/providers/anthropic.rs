//! An umbrella module for the Anthropic provider

mod api;
mod provider;

pub(crate) use self::provider::AnthropicProvider;
