//! Provider Dispatch
//!
//! Resolves a shell's provider name to a [`DatabaseProvider`] and lets it
//! configure the data context's connection options.
//!
//! # Usage
//!
//! ```
//! use trellis_tenancy::{ConnectionResolver, ContextOptionsBuilder, ShellSettings};
//!
//! let resolver = ConnectionResolver::with_defaults();
//! let shell = ShellSettings::new("acme")
//!     .with_database_provider("SqlServer")
//!     .with_connection_string("Server=.;Database=cms")
//!     .with_table_prefix("acme");
//!
//! let mut builder = ContextOptionsBuilder::new();
//! assert!(resolver.configure(&mut builder, Some(&shell), None).unwrap());
//! assert_eq!(builder.migrations_history_table(), Some("acme__EFMigrationsHistory"));
//! ```

use crate::TenantError;
use crate::shell::ShellSettings;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use trellis_log::{debug, error, info};

/// Connection options under construction
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ContextOptionsBuilder {
    provider: Option<String>,
    connection_string: Option<String>,
    migrations_history_table: Option<String>,
    migrations_assembly: Option<String>,
    extensions: BTreeMap<String, String>,
}

impl ContextOptionsBuilder {
    /// Create an unconfigured builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the provider
    pub fn set_provider(&mut self, provider: impl Into<String>) -> &mut Self {
        self.provider = Some(provider.into());
        self
    }

    /// Attach the connection string
    pub fn set_connection_string(&mut self, connection_string: impl Into<String>) -> &mut Self {
        self.connection_string = Some(connection_string.into());
        self
    }

    /// Override the migrations-history table
    pub fn set_migrations_history_table(&mut self, table: impl Into<String>) -> &mut Self {
        self.migrations_history_table = Some(table.into());
        self
    }

    /// Bind migrations to a named unit
    pub fn set_migrations_assembly(&mut self, assembly: impl Into<String>) -> &mut Self {
        self.migrations_assembly = Some(assembly.into());
        self
    }

    /// Set a provider-specific option
    pub fn set_extension(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Selected provider
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// Attached connection string
    pub fn connection_string(&self) -> Option<&str> {
        self.connection_string.as_deref()
    }

    /// Migrations-history table override
    pub fn migrations_history_table(&self) -> Option<&str> {
        self.migrations_history_table.as_deref()
    }

    /// Migrations binding
    pub fn migrations_assembly(&self) -> Option<&str> {
        self.migrations_assembly.as_deref()
    }

    /// Provider-specific option
    pub fn extension(&self, key: &str) -> Option<&str> {
        self.extensions.get(key).map(String::as_str)
    }

    /// Whether a provider has been selected
    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Freeze the options
    pub fn build(self) -> ContextOptions {
        ContextOptions {
            provider: self.provider,
            connection_string: self.connection_string,
            migrations_history_table: self.migrations_history_table,
            migrations_assembly: self.migrations_assembly,
            extensions: self.extensions,
        }
    }
}

/// Frozen connection options of one data context
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ContextOptions {
    provider: Option<String>,
    connection_string: Option<String>,
    migrations_history_table: Option<String>,
    migrations_assembly: Option<String>,
    extensions: BTreeMap<String, String>,
}

impl ContextOptions {
    /// Selected provider
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// Connection string
    pub fn connection_string(&self) -> Option<&str> {
        self.connection_string.as_deref()
    }

    /// Migrations-history table override
    pub fn migrations_history_table(&self) -> Option<&str> {
        self.migrations_history_table.as_deref()
    }

    /// Migrations binding
    pub fn migrations_assembly(&self) -> Option<&str> {
        self.migrations_assembly.as_deref()
    }

    /// Provider-specific option
    pub fn extension(&self, key: &str) -> Option<&str> {
        self.extensions.get(key).map(String::as_str)
    }

    /// Whether a provider was configured
    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }
}

// Connection strings carry credentials.
fn redacted(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "<redacted>")
}

impl fmt::Debug for ContextOptionsBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextOptionsBuilder")
            .field("provider", &self.provider)
            .field("connection_string", &redacted(&self.connection_string))
            .field("migrations_history_table", &self.migrations_history_table)
            .field("migrations_assembly", &self.migrations_assembly)
            .field("extensions", &self.extensions)
            .finish()
    }
}

impl fmt::Debug for ContextOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextOptions")
            .field("provider", &self.provider)
            .field("connection_string", &redacted(&self.connection_string))
            .field("migrations_history_table", &self.migrations_history_table)
            .field("migrations_assembly", &self.migrations_assembly)
            .field("extensions", &self.extensions)
            .finish()
    }
}

/// Values a provider receives for one shell
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderOptions {
    /// Connection string
    pub connection_string: String,

    /// Migrations-history table override
    pub migrations_history_table: Option<String>,

    /// Migrations binding override
    pub migrations_assembly: Option<String>,

    /// Shell schema, when the shell has a table prefix
    pub schema: Option<String>,
}

impl fmt::Debug for ProviderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderOptions")
            .field("connection_string", &"<redacted>")
            .field("migrations_history_table", &self.migrations_history_table)
            .field("migrations_assembly", &self.migrations_assembly)
            .field("schema", &self.schema)
            .finish()
    }
}

/// Pluggable database backend identified by name
///
/// Implement this to add a provider and register it with
/// [`ProviderRegistry::register`].
pub trait DatabaseProvider: Send + Sync {
    /// Provider name as it appears in shell settings
    fn name(&self) -> &str;

    /// Migrations-history table used when no override is given
    fn default_history_table(&self) -> &str;

    /// Configure the builder for this provider
    fn configure(&self, builder: &mut ContextOptionsBuilder, options: &ProviderOptions) -> Result<(), TenantError> {
        apply_common(self.name(), builder, options);
        Ok(())
    }
}

fn apply_common(name: &str, builder: &mut ContextOptionsBuilder, options: &ProviderOptions) {
    builder
        .set_provider(name)
        .set_connection_string(options.connection_string.clone());

    if let Some(table) = &options.migrations_history_table {
        builder.set_migrations_history_table(table.clone());
    }
    if let Some(assembly) = &options.migrations_assembly {
        builder.set_migrations_assembly(assembly.clone());
    }
}

/// Microsoft SQL Server, the primary provider
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerProvider;

impl DatabaseProvider for SqlServerProvider {
    fn name(&self) -> &str {
        "SqlServer"
    }

    fn default_history_table(&self) -> &str {
        "__EFMigrationsHistory"
    }
}

/// PostgreSQL
///
/// Also sets the connection's `search_path` to the shell schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresProvider;

impl DatabaseProvider for PostgresProvider {
    fn name(&self) -> &str {
        "Postgres"
    }

    fn default_history_table(&self) -> &str {
        "__migrations_history"
    }

    fn configure(&self, builder: &mut ContextOptionsBuilder, options: &ProviderOptions) -> Result<(), TenantError> {
        apply_common(self.name(), builder, options);
        if let Some(schema) = &options.schema {
            builder.set_extension("search_path", schema.clone());
        }
        Ok(())
    }
}

/// SQLite
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteProvider;

impl DatabaseProvider for SqliteProvider {
    fn name(&self) -> &str {
        "Sqlite"
    }

    fn default_history_table(&self) -> &str {
        "__migrations_history"
    }
}

/// MySQL
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlProvider;

impl DatabaseProvider for MySqlProvider {
    fn name(&self) -> &str {
        "MySql"
    }

    fn default_history_table(&self) -> &str {
        "__migrations_history"
    }
}

/// Providers keyed by their exact name
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn DatabaseProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in providers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SqlServerProvider));
        registry.register(Arc::new(PostgresProvider));
        registry.register(Arc::new(SqliteProvider));
        registry.register(Arc::new(MySqlProvider));
        registry
    }

    /// Register a provider under its name, replacing any previous one
    pub fn register(&mut self, provider: Arc<dyn DatabaseProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Look up a provider by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn DatabaseProvider>> {
        self.providers.get(name).cloned()
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

/// Configures a context's connection from shell settings
#[derive(Debug, Clone)]
pub struct ConnectionResolver {
    providers: ProviderRegistry,
}

impl ConnectionResolver {
    /// Create a resolver over `providers`
    pub fn new(providers: ProviderRegistry) -> Self {
        Self { providers }
    }

    /// Resolver with the built-in providers
    pub fn with_defaults() -> Self {
        Self::new(ProviderRegistry::with_defaults())
    }

    /// Registered providers
    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Configure `builder` for `shell`.
    ///
    /// Returns `Ok(false)` and leaves the builder untouched when the shell
    /// has no provider yet. On any error the builder is also left untouched.
    ///
    /// # Errors
    ///
    /// - [`TenantError::Configuration`] when `shell` is `None` or a provider
    ///   is set without a connection string
    /// - [`TenantError::UnsupportedProvider`] naming an unknown provider
    pub fn configure(
        &self,
        builder: &mut ContextOptionsBuilder,
        shell: Option<&ShellSettings>,
        migrations_assembly: Option<&str>,
    ) -> Result<bool, TenantError> {
        let shell = shell.ok_or_else(|| {
            TenantError::Configuration("Shell settings are required to configure a connection".to_string())
        })?;

        let Some(provider_name) = shell.database_provider() else {
            debug!(shell = %shell.name, "shell has no database provider yet");
            return Ok(false);
        };

        let provider = self.providers.get(provider_name).ok_or_else(|| {
            error!(shell = %shell.name, provider = provider_name, "unsupported database provider");
            TenantError::UnsupportedProvider(provider_name.to_string())
        })?;

        let connection_string = shell.connection_string().ok_or_else(|| {
            TenantError::Configuration(format!(
                "Shell '{}' selects provider '{}' without a connection string",
                shell.name, provider_name
            ))
        })?;

        let options = ProviderOptions {
            connection_string: connection_string.to_string(),
            migrations_history_table: shell
                .table_prefix()
                .map(|prefix| format!("{}{}", prefix, provider.default_history_table())),
            migrations_assembly: migrations_assembly
                .filter(|a| !a.is_empty())
                .map(str::to_string),
            schema: shell.table_prefix().map(str::to_string),
        };

        let mut staged = builder.clone();
        provider.configure(&mut staged, &options)?;
        *builder = staged;

        info!(
            shell = %shell.name,
            provider = provider.name(),
            history_table = options.migrations_history_table.as_deref().unwrap_or(provider.default_history_table()),
            "configured shell connection"
        );
        Ok(true)
    }
}

impl Default for ConnectionResolver {
    fn default() -> Self {
        Self::with_defaults()
    }
}
