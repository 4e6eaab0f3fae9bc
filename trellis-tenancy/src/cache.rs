//! Compiled Model Cache
//!
//! Process-wide cache of customized models keyed by base model identity
//! plus the shell's schema discriminator.

use crate::TenantError;
use crate::model::{CompiledModel, ModelIdentity};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use trellis_log::{debug, info};

/// Cache key for a compiled model.
///
/// Keys are equal only when both the base identity and the schema
/// discriminator are equal; `None` never equals a named schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelCacheKey {
    base: ModelIdentity,
    schema: Option<String>,
}

impl ModelCacheKey {
    /// Create a key
    pub fn new(base: ModelIdentity, schema: Option<String>) -> Self {
        Self { base, schema }
    }

    /// Base model identity
    pub fn base(&self) -> &ModelIdentity {
        &self.base
    }

    /// Schema discriminator
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }
}

impl fmt::Display for ModelCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}[{}]", self.base, schema),
            None => write!(f, "{}[-]", self.base),
        }
    }
}

/// Shared cache of compiled models
///
/// Inject one instance (behind an `Arc`) into every factory that should
/// share models. Entries live until [`invalidate`](Self::invalidate).
#[derive(Debug, Default)]
pub struct ModelCache {
    entries: RwLock<HashMap<ModelCacheKey, Arc<CompiledModel>>>,
}

impl ModelCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a compiled model
    pub fn get(&self, key: &ModelCacheKey) -> Option<Arc<CompiledModel>> {
        self.entries.read().get(key).cloned()
    }

    /// Return the cached model for `key`, building it on a miss.
    ///
    /// `build` runs without holding the lock. When two callers race on the
    /// same key both may build, but only the first stored model is kept and
    /// every caller receives that same instance. A failed build stores
    /// nothing.
    pub fn get_or_build<F>(&self, key: ModelCacheKey, build: F) -> Result<Arc<CompiledModel>, TenantError>
    where
        F: FnOnce() -> Result<CompiledModel, TenantError>,
    {
        if let Some(model) = self.get(&key) {
            debug!(key = %key, "model cache hit");
            return Ok(model);
        }

        debug!(key = %key, "model cache miss, building");
        let built = Arc::new(build()?);

        let mut entries = self.entries.write();
        let stored = entries.entry(key).or_insert_with(|| Arc::clone(&built));
        if !Arc::ptr_eq(stored, &built) {
            debug!("discarding duplicate model build");
        }
        Ok(Arc::clone(stored))
    }

    /// Whether a model is cached for `key`
    pub fn contains(&self, key: &ModelCacheKey) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Drop every cached model
    pub fn invalidate(&self) {
        let mut entries = self.entries.write();
        let dropped = entries.len();
        entries.clear();
        info!(dropped, "model cache invalidated");
    }

    /// Number of cached models
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
