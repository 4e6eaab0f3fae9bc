//! Shell Data Context
//!
//! [`DataContextFactory`] turns shell settings into a [`DataContext`]: it
//! resolves the default shell, configures the connection, and obtains the
//! customized model from the shared cache.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use trellis_tenancy::{DataContextFactory, EntityType, ShellSettings, StaticEntityTypeProvider};
//!
//! let entities = StaticEntityTypeProvider::new().with_entity(EntityType::new("Post"));
//! let factory = DataContextFactory::new("Cms", Arc::new(entities));
//!
//! let shell = ShellSettings::new("acme")
//!     .with_database_provider("SqlServer")
//!     .with_connection_string("Server=.;Database=cms")
//!     .with_table_prefix("acme");
//!
//! let context = factory.open(Some(&shell)).unwrap();
//! assert_eq!(context.table_name("Post").as_deref(), Some("acme.Post"));
//! ```

use crate::TenantError;
use crate::cache::ModelCache;
use crate::database::{ConnectionResolver, ContextOptions, ContextOptionsBuilder};
use crate::model::{CompiledModel, EntityType, ModelBuilder, ModelIdentity};
use crate::registration::{ConfigurationRegistry, EntityTypeProvider};
use crate::schema::{ModelCustomization, TablePrefixSchema};
use crate::shell::{DefaultShellSettings, ShellSettings};
use crate::store::ShellSettingsProvider;
use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::Arc;
use trellis_config::DataOptions;
use trellis_log::{debug, trace};

/// Data access handle for one unit of work in one shell
///
/// Not `Sync`: open one per unit of work instead of sharing it.
#[derive(Debug)]
pub struct DataContext {
    shell: ShellSettings,
    model: Arc<CompiledModel>,
    options: ContextOptions,
    _unit_of_work: PhantomData<Cell<()>>,
}

impl DataContext {
    fn new(shell: ShellSettings, model: Arc<CompiledModel>, options: ContextOptions) -> Self {
        Self {
            shell,
            model,
            options,
            _unit_of_work: PhantomData,
        }
    }

    /// Effective shell settings
    pub fn shell(&self) -> &ShellSettings {
        &self.shell
    }

    /// Shared compiled model
    pub fn model(&self) -> &Arc<CompiledModel> {
        &self.model
    }

    /// Connection options
    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    /// Whether the connection has been configured
    ///
    /// `false` means the shell has no provider yet and setup is pending.
    pub fn is_configured(&self) -> bool {
        self.options.is_configured()
    }

    /// Storage name of an entity's table, schema-qualified when the shell has one
    pub fn table_name(&self, entity: &str) -> Option<String> {
        self.model.find(entity).map(EntityType::qualified_table)
    }
}

/// Builds shell-scoped data contexts over a shared model cache
pub struct DataContextFactory {
    name: String,
    entities: Arc<dyn EntityTypeProvider>,
    configurations: Arc<ConfigurationRegistry>,
    customization: Arc<dyn ModelCustomization>,
    cache: Arc<ModelCache>,
    resolver: Arc<ConnectionResolver>,
    defaults: Arc<DefaultShellSettings>,
    options: DataOptions,
    settings: Option<Arc<dyn ShellSettingsProvider>>,
}

impl DataContextFactory {
    /// Create a factory for the context `name`
    ///
    /// Starts with an empty configuration registry, table-prefix schemas,
    /// a private model cache and the built-in providers.
    pub fn new(name: impl Into<String>, entities: Arc<dyn EntityTypeProvider>) -> Self {
        Self {
            name: name.into(),
            entities,
            configurations: Arc::new(ConfigurationRegistry::new()),
            customization: Arc::new(TablePrefixSchema),
            cache: Arc::new(ModelCache::new()),
            resolver: Arc::new(ConnectionResolver::with_defaults()),
            defaults: Arc::new(DefaultShellSettings::new()),
            options: DataOptions::default(),
            settings: None,
        }
    }

    /// Use a configuration registry
    pub fn with_configurations(mut self, configurations: Arc<ConfigurationRegistry>) -> Self {
        self.configurations = configurations;
        self
    }

    /// Use a customization strategy
    pub fn with_customization(mut self, customization: Arc<dyn ModelCustomization>) -> Self {
        self.customization = customization;
        self
    }

    /// Share a model cache
    pub fn with_cache(mut self, cache: Arc<ModelCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Use a connection resolver
    pub fn with_resolver(mut self, resolver: Arc<ConnectionResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Share the default-shell record
    pub fn with_default_shell(mut self, defaults: Arc<DefaultShellSettings>) -> Self {
        self.defaults = defaults;
        self
    }

    /// Global data options
    pub fn with_options(mut self, options: DataOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve shells by name through `settings`
    pub fn with_settings_provider(mut self, settings: Arc<dyn ShellSettingsProvider>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Context name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Model cache in use
    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    /// Open a data context for `shell`.
    ///
    /// Either every step succeeds and a context is returned, or the first
    /// error is returned unchanged and no context exists.
    ///
    /// # Errors
    ///
    /// - [`TenantError::Configuration`] when `shell` is `None` or invalid
    /// - [`TenantError::UnsupportedProvider`] for an unknown provider
    /// - [`TenantError::UnknownConfiguration`] for an unregistered configuration
    pub fn open(&self, shell: Option<&ShellSettings>) -> Result<DataContext, TenantError> {
        let shell = shell.ok_or_else(|| {
            TenantError::Configuration("Shell settings are required to open a data context".to_string())
        })?;
        shell.validate()?;

        let shell = self.defaults.resolve(shell, &self.options);
        debug!(context = %self.name, shell = %shell.name, "opening data context");

        let mut builder = ContextOptionsBuilder::new();
        let assembly = self.options.migrations_assembly.as_deref();
        if !self.resolver.configure(&mut builder, Some(&shell), assembly)? {
            debug!(shell = %shell.name, "data context opened without a connection");
        }

        let entities = self.entities.entity_types();
        let configurations = self.entities.entity_type_configurations();
        let base = ModelIdentity::fingerprint(&self.name, &entities, &configurations);
        let key = self.customization.derive_key(&base, &shell);

        let model = self
            .cache
            .get_or_build(key, || self.build_model(base, entities, &configurations, &shell))?;

        Ok(DataContext::new(shell, model, builder.build()))
    }

    /// Open a data context for the shell stored under `name`
    ///
    /// # Errors
    ///
    /// [`TenantError::NotFound`] when the shell does not exist, plus every
    /// error of [`open`](Self::open).
    pub fn open_by_name(&self, name: &str) -> Result<DataContext, TenantError> {
        let settings = self.settings.as_ref().ok_or_else(|| {
            TenantError::Configuration("No shell settings provider is configured".to_string())
        })?;

        let shell = settings
            .find(name)?
            .ok_or_else(|| TenantError::NotFound(name.to_string()))?;

        self.open(Some(&shell))
    }

    fn build_model(
        &self,
        identity: ModelIdentity,
        entities: Vec<EntityType>,
        configurations: &[String],
        shell: &ShellSettings,
    ) -> Result<CompiledModel, TenantError> {
        let mut model = ModelBuilder::new();
        for entity in entities {
            let name = entity.name.clone();
            if !model.attach(entity) {
                trace!(entity = %name, "entity type already attached");
            }
        }

        for id in configurations {
            self.configurations.create(id)?.configure(&mut model);
            model.record_configuration(id.clone());
        }

        self.customization.customize(&mut model, shell);
        Ok(model.build(identity))
    }
}

impl std::fmt::Debug for DataContextFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataContextFactory")
            .field("name", &self.name)
            .field("configurations", &self.configurations)
            .field("cache", &self.cache)
            .field("resolver", &self.resolver)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::StaticEntityTypeProvider;
    use crate::store::InMemoryShellSettingsStore;

    fn entities() -> Arc<dyn EntityTypeProvider> {
        Arc::new(
            StaticEntityTypeProvider::new()
                .with_entity(EntityType::new("Post").with_key("Id"))
                .with_entity(EntityType::new("Comment").with_table("Comments"))
                .with_entity(EntityType::new("Post")),
        )
    }

    fn shell(name: &str, prefix: &str) -> ShellSettings {
        ShellSettings::new(name)
            .with_database_provider("SqlServer")
            .with_connection_string("Server=.;Database=cms")
            .with_table_prefix(prefix)
    }

    #[test]
    fn test_open_requires_shell() {
        let factory = DataContextFactory::new("Cms", entities());
        assert!(matches!(factory.open(None), Err(TenantError::Configuration(_))));
    }

    #[test]
    fn test_open_scopes_tables_to_shell() {
        let factory = DataContextFactory::new("Cms", entities());
        let context = factory.open(Some(&shell("acme", "acme"))).unwrap();

        assert!(context.is_configured());
        assert_eq!(context.table_name("Comment").as_deref(), Some("acme.Comments"));
        assert_eq!(context.table_name("Missing"), None);
        assert_eq!(context.model().entities().len(), 2);
        assert_eq!(
            context.options().migrations_history_table(),
            Some("acme__EFMigrationsHistory")
        );
    }

    #[test]
    fn test_shells_with_same_prefix_share_model() {
        let factory = DataContextFactory::new("Cms", entities());
        let a = factory.open(Some(&shell("one", "shared"))).unwrap();
        let b = factory.open(Some(&shell("two", "shared"))).unwrap();
        let c = factory.open(Some(&shell("three", "other"))).unwrap();

        assert!(Arc::ptr_eq(a.model(), b.model()));
        assert!(!Arc::ptr_eq(a.model(), c.model()));
        assert_eq!(factory.cache().len(), 2);
    }

    #[test]
    fn test_unconfigured_shell_opens_without_connection() {
        let factory = DataContextFactory::new("Cms", entities());
        let context = factory.open(Some(&ShellSettings::new("fresh"))).unwrap();

        assert!(!context.is_configured());
        assert_eq!(context.table_name("Post").as_deref(), Some("Post"));
    }

    #[test]
    fn test_unsupported_provider_returns_no_context() {
        let factory = DataContextFactory::new("Cms", entities());
        let shell = shell("acme", "acme").with_database_provider("Oracle");

        let result = factory.open(Some(&shell));
        assert!(matches!(result, Err(TenantError::UnsupportedProvider(p)) if p == "Oracle"));
        assert!(factory.cache().is_empty());
    }

    #[test]
    fn test_unknown_configuration_fails_open() {
        let provider = StaticEntityTypeProvider::new()
            .with_entity(EntityType::new("Post"))
            .with_configuration("PostMap");
        let factory = DataContextFactory::new("Cms", Arc::new(provider));

        let result = factory.open(Some(&shell("acme", "acme")));
        assert!(matches!(result, Err(TenantError::UnknownConfiguration(_))));
    }

    #[test]
    fn test_configurations_are_applied() {
        let provider = StaticEntityTypeProvider::new()
            .with_entity(EntityType::new("Post"))
            .with_configuration("PostMap");
        let registry = ConfigurationRegistry::new().with("PostMap", || {
            Box::new(|model: &mut ModelBuilder| {
                if let Some(post) = model.entity_mut("Post") {
                    post.table = "Posts".to_string();
                }
            })
        });
        let factory = DataContextFactory::new("Cms", Arc::new(provider))
            .with_configurations(Arc::new(registry));

        let context = factory.open(Some(&shell("acme", "acme"))).unwrap();
        assert_eq!(context.table_name("Post").as_deref(), Some("acme.Posts"));
        assert_eq!(context.model().configurations(), ["PostMap".to_string()]);
    }

    #[test]
    fn test_default_shell_is_populated_from_options() {
        let options = DataOptions::new()
            .with_table_prefix("main")
            .with_connection_string("Server=.")
            .with_database_provider("Sqlite")
            .with_migrations_assembly("Cms.Migrations");
        let factory = DataContextFactory::new("Cms", entities()).with_options(options);

        let context = factory.open(Some(&ShellSettings::default_shell())).unwrap();
        assert_eq!(context.shell().table_prefix(), Some("main"));
        assert_eq!(context.options().provider(), Some("Sqlite"));
        assert_eq!(context.options().migrations_assembly(), Some("Cms.Migrations"));
    }

    #[test]
    fn test_open_by_name() {
        let store = Arc::new(InMemoryShellSettingsStore::new());
        store.insert(shell("acme", "acme")).unwrap();
        store.insert(ShellSettings::new("fresh")).unwrap();

        let factory = DataContextFactory::new("Cms", entities()).with_settings_provider(store);

        assert!(factory.open_by_name("acme").unwrap().is_configured());
        assert!(!factory.open_by_name("fresh").unwrap().is_configured());
        assert!(matches!(
            factory.open_by_name("globex"),
            Err(TenantError::NotFound(name)) if name == "globex"
        ));
    }

    #[test]
    fn test_open_by_name_without_provider() {
        let factory = DataContextFactory::new("Cms", entities());
        assert!(matches!(
            factory.open_by_name("acme"),
            Err(TenantError::Configuration(_))
        ));
    }
}
