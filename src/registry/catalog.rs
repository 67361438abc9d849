//! The merged, deduplicated list of models across all providers.

use serde::{Serialize, Serializer};
use std::collections::HashMap;

use crate::providers::{providers::ProviderIdentifier, ModelDescriptor};

/// An ordered set of models keyed by id.
///
/// Insertion order is kept for display. A catalog is only ever built whole, from
/// the per-provider listings of one refresh, and is never patched afterwards.
#[derive(Debug, Clone, Default)]
pub(crate) struct Catalog {
    models: Vec<ModelDescriptor>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub(crate) fn empty() -> Catalog {
        Catalog::default()
    }

    /// Merges provider listings, keeping the first descriptor seen for each id.
    ///
    /// `listings` must be in registration order: the position of a provider in this
    /// sequence is the only tie-break between providers offering the same id.
    pub(crate) fn merge<I>(listings: I) -> Catalog
    where
        I: IntoIterator<Item = (ProviderIdentifier, Vec<ModelDescriptor>)>,
    {
        let mut catalog = Catalog::empty();

        for (provider, models) in listings {
            for model in models {
                if model.provider() != provider {
                    tracing::warn!(
                        provider = %provider,
                        model = model.id(),
                        claimed = %model.provider(),
                        "dropping model attributed to another provider"
                    );
                    continue;
                }

                if catalog.index.contains_key(model.id()) {
                    tracing::debug!(
                        provider = %provider,
                        model = model.id(),
                        "model already provided by an earlier provider"
                    );
                    continue;
                }

                catalog
                    .index
                    .insert(model.id().to_string(), catalog.models.len());
                catalog.models.push(model);
            }
        }

        catalog
    }

    pub(crate) fn get(&self, id: &str) -> Option<&ModelDescriptor> {
        self.index.get(id).map(|&i| &self.models[i])
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.models.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// The first model flagged as a default, else the first model.
    pub(crate) fn default_model(&self) -> Option<&ModelDescriptor> {
        self.models
            .iter()
            .find(|model| model.is_default())
            .or_else(|| self.models.first())
    }

    pub(crate) fn for_provider(
        &self,
        provider: ProviderIdentifier,
    ) -> impl Iterator<Item = &ModelDescriptor> {
        self.models
            .iter()
            .filter(move |model| model.provider() == provider)
    }
}

impl Serialize for Catalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.models.serialize(serializer)
    }
}
