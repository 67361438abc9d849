use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use toml;

use crate::providers::providers::ProviderIdentifier;
use crate::registry::registry::{CacheSettings, StalePolicy, DEFAULT_CACHE_TTL};

#[derive(Error, Debug)]
pub(crate) enum Error {
    #[error("failed to read config \"{0}\": {1}")]
    Read(PathBuf, #[source] io::Error),
    #[error("failed to parse config \"{0}\": {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("failed to reserialize config: {0}")]
    Reserialize(#[from] toml::ser::Error),
    #[error("the \"{0}\" provider is enabled but the API key is not defined, either add it to the config or define {1}")]
    MissingCredential(ProviderIdentifier, &'static str),
}

#[derive(Deserialize, Serialize, Default, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum RequestedProviderEnabled {
    /// Register the provider when a credential can be found
    #[default]
    Auto,
    /// Register the provider, failing when there is no credential
    Yes,
    No,
}

#[derive(Deserialize, Serialize, Default, Clone, Debug)]
pub(crate) struct Provider {
    #[serde(default)]
    pub enabled: RequestedProviderEnabled,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub default_model: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Provider {
    pub(crate) fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Deserialize, Serialize, Default, Debug)]
pub(crate) struct Providers {
    #[serde(default)]
    pub openai: Provider,
    #[serde(default)]
    pub anthropic: Provider,
    #[serde(default)]
    pub google: Provider,
    #[serde(default)]
    pub mistral: Provider,
}

impl Providers {
    pub(crate) fn get(&self, id: ProviderIdentifier) -> &Provider {
        match id {
            ProviderIdentifier::OpenAI => &self.openai,
            ProviderIdentifier::Anthropic => &self.anthropic,
            ProviderIdentifier::Google => &self.google,
            ProviderIdentifier::Mistral => &self.mistral,
        }
    }
}

fn default_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL.as_secs()
}

#[derive(Deserialize, Serialize, Debug)]
pub(crate) struct Cache {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default)]
    pub stale_policy: StalePolicy,
}

impl Default for Cache {
    fn default() -> Self {
        Cache {
            ttl_secs: default_ttl_secs(),
            stale_policy: StalePolicy::default(),
        }
    }
}

impl From<&Cache> for CacheSettings {
    fn from(cache: &Cache) -> Self {
        CacheSettings {
            ttl: Duration::from_secs(cache.ttl_secs),
            stale_policy: cache.stale_policy,
        }
    }
}

#[derive(Deserialize, Serialize, Default, Debug)]
pub(crate) struct Config {
    #[serde(default)]
    pub cache: Cache,
    #[serde(default)]
    pub providers: Providers,
}

fn get_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME");

    if let Some(home) = home {
        let home = PathBuf::from(home);

        const USER_PATHS: [&str; 2] = [".config/switchboard/config.toml", ".switchboard.toml"];

        for &path in USER_PATHS.iter() {
            let fullpath = home.join(path);

            if fullpath.exists() {
                return Some(fullpath);
            }
        }
    }

    let system_config = PathBuf::from("/etc/switchboard.toml");

    if system_config.exists() {
        Some(system_config)
    } else {
        None
    }
}

fn parse_config<S: serde::de::DeserializeOwned>(path: &Path, config: &str) -> Result<S, Error> {
    toml::de::from_str(config).map_err(|err| Error::Parse(path.to_path_buf(), err))
}

fn extra_fields_helper<'a>(
    path: &mut Vec<&'a str>,
    user_config: &'a toml::Table,
    config: &'a toml::Table,
    extra: &mut Vec<String>,
) {
    for (user_key, user_value) in user_config {
        path.push(user_key);

        match (user_value, config.get(user_key)) {
            (toml::Value::Table(user_value), Some(toml::Value::Table(config_value))) => {
                extra_fields_helper(path, user_value, config_value, extra)
            }
            (_, Some(_)) => {}
            (_, None) => extra.push(path.join(".")),
        }

        path.pop();
    }
}

/// Dotted paths of keys present in the raw config but unknown to [`Config`].
fn extra_fields(path: &Path, config: &Config, raw_config: &str) -> Result<Vec<String>, Error> {
    let user_config: toml::Table = parse_config(path, raw_config)?;

    let config: toml::Table = {
        let seralized_config = toml::ser::to_string(config)?;

        parse_config(path, &seralized_config)?
    };

    let mut extra = Vec::new();

    extra_fields_helper(&mut Vec::new(), &user_config, &config, &mut extra);

    Ok(extra)
}

pub(crate) fn parse_config_file(path: &Path) -> Result<Config, Error> {
    let raw_config =
        std::fs::read_to_string(path).map_err(|err| Error::Read(path.to_path_buf(), err))?;

    let config: Config = parse_config(path, &raw_config)?;

    for key in extra_fields(path, &config, &raw_config)? {
        tracing::warn!(key = %key, config = %path.display(), "config contains extraneous key, ignoring");
    }

    Ok(config)
}

/// Reads the config at `config`, or the first one found in the usual places.
/// No config file at all is not an error.
pub(crate) fn read_config(config: Option<PathBuf>) -> Result<Config, Error> {
    match config.or_else(get_config_path) {
        Some(path) => {
            tracing::debug!(config = %path.display(), "reading config");

            parse_config_file(&path)
        }
        None => Ok(Config::default()),
    }
}
