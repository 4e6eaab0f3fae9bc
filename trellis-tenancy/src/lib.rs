//! Tenant-Isolated Data Access for Trellis
//!
//! Every shell (tenant) gets a schema-qualified view of a shared database,
//! while shells with the same schema share one compiled model.
//!
//! # Features
//!
//! - 🏢 **Shell Settings** - Per-shell provider, connection and table prefix
//! - 🗄️ **Provider Dispatch** - Pluggable providers selected by name
//! - 📊 **Schema Per Shell** - Table prefix becomes the entity schema
//! - 💾 **Shared Model Cache** - One compiled model per (model, schema) pair
//! - 🧩 **Entity Registration** - Idempotent attach plus named configurations
//!
//! # Quick Start
//!
//! ## 1. Register Entity Types
//!
//! ```
//! use std::sync::Arc;
//! use trellis_tenancy::*;
//!
//! let entities = StaticEntityTypeProvider::new()
//!     .with_entity(EntityType::new("Post").with_key("Id"))
//!     .with_entity(EntityType::new("Comment").with_table("Comments"))
//!     .with_configuration("PostMap");
//!
//! let configurations = ConfigurationRegistry::new().with("PostMap", || {
//!     Box::new(|model: &mut ModelBuilder| {
//!         if let Some(post) = model.entity_mut("Post") {
//!             post.table = "Posts".to_string();
//!         }
//!     })
//! });
//! # let _ = (entities, configurations);
//! ```
//!
//! ## 2. Share One Cache Across Factories
//!
//! ```
//! use std::sync::Arc;
//! use trellis_tenancy::*;
//!
//! let cache = Arc::new(ModelCache::new());
//! let entities: Arc<dyn EntityTypeProvider> =
//!     Arc::new(StaticEntityTypeProvider::new().with_entity(EntityType::new("Post")));
//!
//! let factory = DataContextFactory::new("Cms", entities).with_cache(Arc::clone(&cache));
//!
//! let acme = ShellSettings::new("acme")
//!     .with_database_provider("SqlServer")
//!     .with_connection_string("Server=.;Database=cms")
//!     .with_table_prefix("acme");
//!
//! let context = factory.open(Some(&acme)).unwrap();
//! assert_eq!(context.table_name("Post").as_deref(), Some("acme.Post"));
//! assert_eq!(cache.len(), 1);
//! ```
//!
//! ## 3. Resolve Shells By Name
//!
//! ```
//! use std::sync::Arc;
//! use trellis_tenancy::*;
//!
//! let store = Arc::new(InMemoryShellSettingsStore::new());
//! store.insert(ShellSettings::new("fresh")).unwrap();
//!
//! let entities = Arc::new(StaticEntityTypeProvider::new());
//! let factory = DataContextFactory::new("Cms", entities).with_settings_provider(store);
//!
//! // Unconfigured shells open without a connection
//! assert!(!factory.open_by_name("fresh").unwrap().is_configured());
//! assert!(matches!(factory.open_by_name("missing"), Err(TenantError::NotFound(_))));
//! ```

pub mod cache;
pub mod context;
pub mod database;
pub mod error;
pub mod model;
pub mod registration;
pub mod schema;
pub mod shell;
pub mod store;

pub use cache::{ModelCache, ModelCacheKey};
pub use context::{DataContext, DataContextFactory};
pub use database::{
    ConnectionResolver, ContextOptions, ContextOptionsBuilder, DatabaseProvider, MySqlProvider,
    PostgresProvider, ProviderOptions, ProviderRegistry, SqlServerProvider, SqliteProvider,
};
pub use error::TenantError;
pub use model::{CompiledModel, EntityType, ModelBuilder, ModelIdentity};
pub use registration::{
    ConfigurationRegistry, EntityTypeConfiguration, EntityTypeProvider, StaticEntityTypeProvider,
};
pub use schema::{ModelCustomization, TablePrefixSchema};
pub use shell::{DEFAULT_SHELL_NAME, DefaultShellSettings, ShellSettings};
pub use store::{InMemoryShellSettingsStore, ShellSettingsProvider};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cache::{ModelCache, ModelCacheKey};
    pub use crate::context::{DataContext, DataContextFactory};
    pub use crate::database::{ConnectionResolver, DatabaseProvider, ProviderRegistry};
    pub use crate::error::TenantError;
    pub use crate::model::{CompiledModel, EntityType, ModelBuilder};
    pub use crate::registration::{
        ConfigurationRegistry, EntityTypeConfiguration, EntityTypeProvider,
        StaticEntityTypeProvider,
    };
    pub use crate::schema::{ModelCustomization, TablePrefixSchema};
    pub use crate::shell::ShellSettings;
    pub use crate::store::{InMemoryShellSettingsStore, ShellSettingsProvider};
}
