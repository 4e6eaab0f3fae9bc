//! Global data-access defaults.

use crate::{ConfigError, ConfigLoader, ConfigValidator, EnvLoader, Result, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use trellis_log::debug;

/// Environment prefix for [`DataOptions`] overrides.
pub const ENV_PREFIX: &str = "TRELLIS_DATA";

/// Global defaults for tenant data access.
///
/// Used to populate the "Default" shell when it carries no settings of its
/// own, and as the default migrations binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataOptions {
    /// Table prefix / schema name
    pub table_prefix: Option<String>,

    /// Connection string handed to the provider
    pub connection_string: Option<String>,

    /// Provider name, e.g. `SqlServer`
    pub database_provider: Option<String>,

    /// Name of the unit migrations are bound to
    pub migrations_assembly: Option<String>,
}

impl DataOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the table prefix.
    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = Some(prefix.into());
        self
    }

    /// Set the connection string.
    pub fn with_connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = Some(connection_string.into());
        self
    }

    /// Set the provider name.
    pub fn with_database_provider(mut self, provider: impl Into<String>) -> Self {
        self.database_provider = Some(provider.into());
        self
    }

    /// Set the migrations binding.
    pub fn with_migrations_assembly(mut self, assembly: impl Into<String>) -> Self {
        self.migrations_assembly = Some(assembly.into());
        self
    }

    /// Load from a `.json` or `.toml` file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let options: Self = ConfigLoader::auto(path)?.load_file(path)?;
        Ok(options.normalized())
    }

    /// Overlay `TRELLIS_DATA_*` variables read through `env`.
    pub fn apply_env(mut self, env: &EnvLoader) -> Self {
        if let Some(v) = env.load_var("TABLE_PREFIX") {
            self.table_prefix = Some(v);
        }
        if let Some(v) = env.load_var("CONNECTION_STRING") {
            self.connection_string = Some(v);
        }
        if let Some(v) = env.load_var("DATABASE_PROVIDER") {
            self.database_provider = Some(v);
        }
        if let Some(v) = env.load_var("MIGRATIONS_ASSEMBLY") {
            self.migrations_assembly = Some(v);
        }
        self
    }

    /// Load from an optional file, then a `.env` file if present, then the
    /// process environment. The result is validated.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::load_with(file, &EnvLoader::new(ENV_PREFIX))
    }

    /// Load a specific `.env` file before reading the environment.
    pub fn load_dotenv(file: Option<&Path>, dotenv: &Path) -> Result<Self> {
        dotenvy::from_path(dotenv).map_err(|e| ConfigError::LoadError(e.to_string()))?;
        Self::load_with(file, &EnvLoader::new(ENV_PREFIX))
    }

    /// Load from an optional file and the given environment reader.
    pub fn load_with(file: Option<&Path>, env: &EnvLoader) -> Result<Self> {
        let base = match file {
            Some(path) => {
                debug!(path = %path.display(), "loading data options file");
                Self::from_file(path)?
            }
            None => Self::default(),
        };

        let options = base.apply_env(env).normalized();
        options.validate()?;
        Ok(options)
    }

    /// Whether no connection-related value is set.
    pub fn is_unset(&self) -> bool {
        self.table_prefix.is_none()
            && self.connection_string.is_none()
            && self.database_provider.is_none()
    }

    fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            table_prefix: clean(self.table_prefix),
            connection_string: clean(self.connection_string),
            database_provider: clean(self.database_provider),
            migrations_assembly: clean(self.migrations_assembly),
        }
    }
}

impl Validate for DataOptions {
    fn validate(&self) -> Result<()> {
        ConfigValidator::paired(
            &self.connection_string,
            "connection_string",
            &self.database_provider,
            "database_provider",
        )?;

        if let Some(prefix) = &self.table_prefix {
            ConfigValidator::is_identifier(prefix, "table_prefix")?;
        }

        if let Some(provider) = &self.database_provider {
            ConfigValidator::not_empty(provider, "database_provider")?;
        }

        Ok(())
    }
}
