// Trellis - multi-tenant data access for modular CMS hosts
//
// Gives every shell (tenant) a schema-isolated view of a shared database over
// one process-wide compiled-model cache, and reconciles each shell's feature
// modules into ordered lifecycle transitions.

// Re-export the workspace crates
pub use trellis_config;
pub use trellis_features;
pub use trellis_log;
pub use trellis_tenancy;

pub use trellis_config::{ConfigError, DataOptions};
pub use trellis_features::{
    FeatureDescriptor, FeatureError, FeatureLifecycleSink, FeatureStateDiffer, Reconciliation,
    ShellFeatureManager, ShellState, ShellStateStore, Transition, TransitionKind,
};
pub use trellis_tenancy::{
    ConnectionResolver, DataContext, DataContextFactory, EntityType, ModelCache, ModelCacheKey,
    ShellSettings, TenantError,
};

/// Prelude for common imports.
///
/// # Example
///
/// ```
/// use trellis::prelude::*;
///
/// let shell = ShellSettings::new("acme").with_table_prefix("acme");
/// let differ = FeatureStateDiffer::new();
/// let state = ShellState::new(1);
/// # let _ = (shell, differ, state);
/// ```
pub mod prelude {
    pub use trellis_config::{DataOptions, Validate};
    pub use trellis_features::prelude::*;
    pub use trellis_log::{debug, error, info, trace, warn};
    pub use trellis_tenancy::prelude::*;
}
