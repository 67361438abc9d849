//! An umbrella module for the Google Gemini provider

mod api;
mod provider;

pub(crate) use self::provider::GoogleProvider;
