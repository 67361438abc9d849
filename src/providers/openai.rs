//! An umbrella module for OpenAI and OpenAI compatible providers

pub(super) mod api;
mod models;
mod provider;

pub(crate) use self::provider::{Dialect, OpenAIProvider};
