use core::fmt;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use super::cache::CacheStore;
use super::catalog::Catalog;
use super::fallback::{self, FallbackRule, FALLBACK_RULES};
use crate::providers::{
    self,
    providers::{ProviderIdentifier, ProviderSettings},
    ErrorKind, ModelDescriptor, ProviderClient,
};

/// The cache key the merged catalog is stored under.
pub(crate) const CATALOG_KEY: &str = "catalog";

pub(crate) const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Error, Debug)]
pub(crate) enum Error {
    /// Nothing in the catalog, the qualified form or the fallback rules matched
    #[error("model \"{0}\" is not served by any of the available providers")]
    ModelNotFound(String),
    /// The catalog is empty and no model was requested
    #[error("none of the available providers offer a default model")]
    DefaultModelUnset,
}

/// What `load_models` does with a cached catalog whose TTL has elapsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum StalePolicy {
    /// Return the stale catalog as is; refreshing is left to an explicit forced load.
    #[default]
    Serve,
    /// Treat a stale catalog like a missing one and fetch again.
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CacheSettings {
    pub ttl: Duration,
    pub stale_policy: StalePolicy,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            ttl: DEFAULT_CACHE_TTL,
            stale_policy: StalePolicy::default(),
        }
    }
}

/// A model identifier, optionally qualified with the provider serving it.
///
/// ```text
/// <model spec> := <model identifier> | <provider identifier> "/" <model identifier>
/// ```
///
/// A prefix which is not a known provider is part of the model identifier, so ids
/// such as `meta-llama/Llama-3-8B` parse as unqualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ModelSpec {
    pub provider: Option<ProviderIdentifier>,
    pub model: String,
}

impl ModelSpec {
    pub(crate) fn parse(spec: &str) -> ModelSpec {
        if let Some((provider, model)) = spec.split_once('/') {
            if let Ok(id) = ProviderIdentifier::from_str(provider) {
                if !model.is_empty() {
                    return ModelSpec {
                        provider: Some(id),
                        model: model.to_string(),
                    };
                }
            }
        }

        ModelSpec {
            provider: None,
            model: spec.to_string(),
        }
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(provider) = self.provider {
            write!(f, "{}/", provider)?;
        }

        write!(f, "{}", self.model)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub(crate) enum ResolutionMethod {
    /// The id was present in the merged catalog.
    Catalog,
    /// The model spec named its provider explicitly.
    Qualified,
    /// The provider was guessed from the shape of the id.
    Inferred,
}

/// The outcome of a successful resolution.
#[derive(Clone)]
pub(crate) struct ResolvedModel {
    pub provider: Arc<dyn ProviderClient>,
    pub model_id: String,
    pub method: ResolutionMethod,
}

impl fmt::Debug for ResolvedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedModel")
            .field("provider", &self.provider.id())
            .field("model_id", &self.model_id)
            .field("method", &self.method)
            .finish()
    }
}

struct ProviderRegistration {
    id: ProviderIdentifier,
    client: Arc<dyn ProviderClient>,
}

/// Owns every registered provider client and the merged model catalog.
///
/// The provider set is fixed at construction. The catalog is replaced wholesale by
/// each successful refresh, so readers holding an `Arc<Catalog>` never observe a
/// partially merged state.
pub(crate) struct ProviderRegistry {
    registrations: Vec<ProviderRegistration>,
    catalog: RwLock<Arc<Catalog>>,
    cache: CacheStore<Catalog>,
    cache_settings: CacheSettings,
    fallback_rules: &'static [FallbackRule],
    refresh: Mutex<()>,
}

impl ProviderRegistry {
    /// Registers a client for every provider whose credential is present.
    ///
    /// A missing credential means the provider is simply not registered. A client which
    /// fails to construct for any other reason is logged and skipped. No network calls
    /// are made.
    pub(crate) fn initialize<'s, I>(settings: I, cache_settings: CacheSettings) -> ProviderRegistry
    where
        I: IntoIterator<Item = &'s ProviderSettings>,
    {
        Self::initialize_with(settings, cache_settings, providers::providers::connect)
    }

    pub(crate) fn initialize_with<'s, I, F>(
        settings: I,
        cache_settings: CacheSettings,
        mut connect: F,
    ) -> ProviderRegistry
    where
        I: IntoIterator<Item = &'s ProviderSettings>,
        F: FnMut(&ProviderSettings) -> Result<Arc<dyn ProviderClient>, providers::Error>,
    {
        let mut clients = Vec::new();

        for settings in settings {
            if settings.credential().is_err() {
                tracing::debug!(provider = %settings.id, "no credential, provider not registered");
                continue;
            }

            match connect(settings) {
                Ok(client) => clients.push(client),
                Err(err) => {
                    tracing::warn!(provider = %settings.id, error = %err, "failed to construct provider")
                }
            }
        }

        Self::with_providers(clients, cache_settings)
    }

    /// Builds a registry from already constructed clients, kept in the given order.
    pub(crate) fn with_providers<I>(clients: I, cache_settings: CacheSettings) -> ProviderRegistry
    where
        I: IntoIterator<Item = Arc<dyn ProviderClient>>,
    {
        let mut registrations: Vec<ProviderRegistration> = Vec::new();

        for client in clients {
            let id = client.id();

            if registrations.iter().any(|r| r.id == id) {
                tracing::warn!(provider = %id, "provider registered twice, keeping the first");
                continue;
            }

            tracing::info!(provider = %id, "registered provider");
            registrations.push(ProviderRegistration { id, client });
        }

        ProviderRegistry {
            registrations,
            catalog: RwLock::new(Arc::new(Catalog::empty())),
            cache: CacheStore::new(),
            cache_settings,
            fallback_rules: FALLBACK_RULES,
            refresh: Mutex::new(()),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Registered provider ids in registration order.
    pub(crate) fn providers(&self) -> impl Iterator<Item = ProviderIdentifier> + '_ {
        self.registrations.iter().map(|r| r.id)
    }

    pub(crate) fn provider(&self, id: ProviderIdentifier) -> Option<Arc<dyn ProviderClient>> {
        self.registrations
            .iter()
            .find(|r| r.id == id)
            .map(|r| Arc::clone(&r.client))
    }

    /// Returns the merged catalog, fetching it from every provider when needed.
    ///
    /// Unless `force_refresh` is set, a cached catalog is returned without any network
    /// activity: always when fresh, and also when stale under [`StalePolicy::Serve`].
    /// Otherwise every provider is listed concurrently, each bounded by its own timeout.
    /// Providers which fail or time out contribute nothing. If all of them fail, or the
    /// listings merge to nothing, a previously loaded catalog is kept and returned.
    ///
    /// Refreshes are single-flight: a caller arriving while one is in progress waits for
    /// it and, unless it forced a refresh, reuses its result.
    pub(crate) async fn load_models(&self, force_refresh: bool) -> Arc<Catalog> {
        if !force_refresh {
            if let Some(catalog) = self.cached() {
                return catalog;
            }
        }

        let _refresh = self.refresh.lock().await;

        if !force_refresh {
            if let Some(catalog) = self.cached() {
                return catalog;
            }
        }

        let listings = self.list_all().await;
        let succeeded = listings.iter().filter(|(_, l)| l.is_some()).count();

        if succeeded == 0 && !self.registrations.is_empty() {
            tracing::warn!("every provider failed to list models, keeping the previous catalog");

            return self.list_available_models();
        }

        let catalog = Arc::new(Catalog::merge(
            listings
                .into_iter()
                .filter_map(|(id, models)| models.map(|models| (id, models))),
        ));

        if catalog.is_empty() {
            let previous = self.list_available_models();

            if !previous.is_empty() {
                tracing::warn!(
                    providers = succeeded,
                    "providers listed no models, keeping the previous catalog"
                );

                return previous;
            }
        }

        self.store(Arc::clone(&catalog));

        tracing::info!(
            models = catalog.len(),
            providers = succeeded,
            "model catalog refreshed"
        );

        catalog
    }

    /// The current catalog. Never touches the network.
    pub(crate) fn list_available_models(&self) -> Arc<Catalog> {
        let current = Arc::clone(&self.catalog.read().unwrap_or_else(PoisonError::into_inner));

        if !current.is_empty() {
            return current;
        }

        match self.cache.get(CATALOG_KEY) {
            Some(entry) => Arc::clone(entry.value()),
            None => current,
        }
    }

    /// The first model flagged as a default, else the first model in the catalog.
    pub(crate) fn default_model(&self) -> Option<ModelDescriptor> {
        self.list_available_models().default_model().cloned()
    }

    pub(crate) fn models_for(&self, provider: ProviderIdentifier) -> Vec<ModelDescriptor> {
        self.list_available_models()
            .for_provider(provider)
            .cloned()
            .collect()
    }

    /// The client serving `model_id`, if any.
    pub(crate) fn resolve(&self, model_id: &str) -> Option<Arc<dyn ProviderClient>> {
        self.resolve_model(model_id).map(|resolved| resolved.provider)
    }

    /// Resolves a model spec to a client and the id to send it.
    ///
    /// The catalog is consulted first. Failing that, an explicit `provider/model` spec
    /// is honoured if the provider is registered. Last, the fallback rules guess the
    /// provider from the id; the first matching rule decides, and if its provider is
    /// not registered the model is not found.
    pub(crate) fn resolve_model(&self, spec: &str) -> Option<ResolvedModel> {
        let spec = spec.trim();

        if spec.is_empty() {
            return None;
        }

        let catalog = self.list_available_models();

        if let Some(model) = catalog.get(spec) {
            if let Some(provider) = self.provider(model.provider()) {
                return Some(ResolvedModel {
                    provider,
                    model_id: spec.to_string(),
                    method: ResolutionMethod::Catalog,
                });
            }
        }

        let ModelSpec { provider, model } = ModelSpec::parse(spec);

        if let Some(id) = provider {
            if let Some(provider) = self.provider(id) {
                return Some(ResolvedModel {
                    provider,
                    model_id: model,
                    method: ResolutionMethod::Qualified,
                });
            }
        }

        let id = fallback::infer_provider(self.fallback_rules, spec)?;

        match self.provider(id) {
            Some(provider) => Some(ResolvedModel {
                provider,
                model_id: spec.to_string(),
                method: ResolutionMethod::Inferred,
            }),
            None => {
                tracing::debug!(model = spec, provider = %id, "inferred provider is not registered");
                None
            }
        }
    }

    /// Resolves `spec`, or the catalog's default model when no spec is given.
    pub(crate) fn require(&self, spec: Option<&str>) -> Result<ResolvedModel, Error> {
        match spec {
            Some(spec) => self
                .resolve_model(spec)
                .ok_or_else(|| Error::ModelNotFound(spec.to_string())),
            None => {
                let model = self.default_model().ok_or(Error::DefaultModelUnset)?;

                self.resolve_model(model.id())
                    .ok_or_else(|| Error::ModelNotFound(model.id().to_string()))
            }
        }
    }

    /// Probes every registered provider concurrently.
    ///
    /// A probe which errors, panics or outlives the provider's health timeout reports
    /// `false`. The result has exactly one entry per registered provider.
    pub(crate) async fn check_all_health(&self) -> BTreeMap<ProviderIdentifier, bool> {
        let probes = self.registrations.iter().map(|registration| {
            let client = Arc::clone(&registration.client);

            tokio::spawn(async move {
                let limit = client.health_timeout();

                tokio::time::timeout(limit, client.check_health())
                    .await
                    .unwrap_or(false)
            })
        });

        let results = join_all(probes).await;

        self.registrations
            .iter()
            .zip(results)
            .map(|(registration, result)| {
                let healthy = result.unwrap_or_else(|err| {
                    tracing::warn!(provider = %registration.id, error = %err, "health probe aborted");
                    false
                });

                if !healthy {
                    tracing::info!(provider = %registration.id, "provider is unhealthy");
                }

                (registration.id, healthy)
            })
            .collect()
    }

    /// The cached catalog, if it may be served without a refresh.
    fn cached(&self) -> Option<Arc<Catalog>> {
        let entry = self.cache.get(CATALOG_KEY)?;

        if entry.is_fresh() {
            return Some(Arc::clone(entry.value()));
        }

        tracing::debug!(
            age = ?entry.created_at().elapsed(),
            ttl = ?entry.ttl(),
            policy = ?self.cache_settings.stale_policy,
            "cached catalog is stale"
        );

        match self.cache_settings.stale_policy {
            StalePolicy::Serve => Some(Arc::clone(entry.value())),
            StalePolicy::Refresh => None,
        }
    }

    fn store(&self, catalog: Arc<Catalog>) {
        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&catalog);

        self.cache
            .set(CATALOG_KEY, catalog, self.cache_settings.ttl);
    }

    /// Lists every provider concurrently, in registration order. A provider which
    /// failed has `None` in place of its models.
    async fn list_all(&self) -> Vec<(ProviderIdentifier, Option<Vec<ModelDescriptor>>)> {
        let tasks = self.registrations.iter().map(|registration| {
            let client = Arc::clone(&registration.client);

            tokio::spawn(async move {
                let limit = client.timeout();

                match tokio::time::timeout(limit, client.list_models()).await {
                    Ok(result) => result,
                    Err(_) => Err(providers::Error::from_kind(ErrorKind::TimedOut)),
                }
            })
        });

        let results = join_all(tasks).await;

        self.registrations
            .iter()
            .zip(results)
            .map(|(registration, result)| {
                let id = registration.id;

                let models = match result {
                    Ok(Ok(models)) => {
                        tracing::debug!(provider = %id, models = models.len(), "listed models");
                        Some(models)
                    }
                    Ok(Err(err)) => {
                        tracing::warn!(
                            provider = %id,
                            kind = ?err.kind(),
                            error = %err,
                            "failed to list models"
                        );
                        None
                    }
                    Err(err) => {
                        tracing::warn!(provider = %id, error = %err, "model listing aborted");
                        None
                    }
                };

                (id, models)
            })
            .collect()
    }
}
