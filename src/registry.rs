//! The registry owns the provider clients and routes model ids to them.
//!
//! It is built once at startup from the providers which have a credential. The models
//! they serve are fetched concurrently and merged into a single catalog, which is cached
//! with a TTL. When the user chooses a model, it is specified using a "model spec":
//! ```text
//! <model spec> := <model identifier> | <provider identifier> "/" <model identifier>
//! ```
//!
//! Resolution tries, in order:
//! 1. The catalog. If several providers serve the same id, the one registered first
//!    owns it.
//! 2. The provider named by a qualified spec, e.g. "anthropic/claude-3-5-haiku-latest".
//! 3. A table of id patterns, e.g. "claude-" to anthropic. This covers a cold cache or
//!    a model released after the last refresh.
//!
//! Errors from individual providers never escape a refresh or a health check: a provider
//! that fails simply contributes nothing.

mod cache;
mod catalog;
mod fallback;
pub(crate) mod populate;
pub(crate) mod registry;

#[cfg(test)]
pub(crate) mod testing;
