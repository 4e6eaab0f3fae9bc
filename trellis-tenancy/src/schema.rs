//! Schema Per Shell
//!
//! Tenant-aware model customization. A [`ModelCustomization`] derives the
//! cache key for a shell and rewrites the model for it; the factory composes
//! one in rather than subclassing anything.

use crate::cache::ModelCacheKey;
use crate::model::{ModelBuilder, ModelIdentity};
use crate::shell::ShellSettings;
use trellis_log::trace;

/// Shell-aware customization of a base model
///
/// `derive_key` and `customize` must agree: two shells mapping to the same
/// key must produce the same customized model.
pub trait ModelCustomization: Send + Sync {
    /// Cache key for `base` as seen by `shell`
    fn derive_key(&self, base: &ModelIdentity, shell: &ShellSettings) -> ModelCacheKey;

    /// Rewrite the model for `shell`
    fn customize(&self, model: &mut ModelBuilder, shell: &ShellSettings);
}

/// Places every entity type in a schema named after the shell's table prefix
///
/// Shells without a prefix share the unmodified model.
#[derive(Debug, Clone, Copy, Default)]
pub struct TablePrefixSchema;

impl TablePrefixSchema {
    /// Create the strategy
    pub fn new() -> Self {
        Self
    }
}

impl ModelCustomization for TablePrefixSchema {
    fn derive_key(&self, base: &ModelIdentity, shell: &ShellSettings) -> ModelCacheKey {
        ModelCacheKey::new(base.clone(), shell.table_prefix().map(str::to_string))
    }

    fn customize(&self, model: &mut ModelBuilder, shell: &ShellSettings) {
        let Some(prefix) = shell.table_prefix() else {
            return;
        };

        trace!(schema = prefix, entities = model.entities().len(), "applying shell schema");
        model.set_schema(prefix);
    }
}
