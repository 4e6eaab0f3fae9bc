//! Shell Settings
//!
//! Per-tenant data settings and the one-time population of the "Default"
//! shell from the global [`DataOptions`].

use crate::TenantError;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use trellis_config::DataOptions;
use trellis_log::info;

/// Name of the distinguished default shell.
pub const DEFAULT_SHELL_NAME: &str = "Default";

/// Data settings of one shell (tenant)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellSettings {
    /// Unique shell name
    pub name: String,

    /// Connection string handed to the provider
    pub connection_string: Option<String>,

    /// Provider name; `None` means the shell is not configured yet
    pub database_provider: Option<String>,

    /// Table prefix, used as the shell's schema
    pub table_prefix: Option<String>,
}

impl ShellSettings {
    /// Create unconfigured settings for a shell
    ///
    /// # Examples
    ///
    /// ```
    /// use trellis_tenancy::ShellSettings;
    ///
    /// let shell = ShellSettings::new("acme")
    ///     .with_database_provider("SqlServer")
    ///     .with_connection_string("Server=.;Database=cms")
    ///     .with_table_prefix("acme");
    ///
    /// assert_eq!(shell.table_prefix(), Some("acme"));
    /// ```
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connection_string: None,
            database_provider: None,
            table_prefix: None,
        }
    }

    /// Unconfigured settings for the default shell
    pub fn default_shell() -> Self {
        Self::new(DEFAULT_SHELL_NAME)
    }

    /// Set connection string
    pub fn with_connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = Some(connection_string.into());
        self
    }

    /// Set provider name
    pub fn with_database_provider(mut self, provider: impl Into<String>) -> Self {
        self.database_provider = Some(provider.into());
        self
    }

    /// Set table prefix
    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = Some(prefix.into());
        self
    }

    /// Whether this is the default shell
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_SHELL_NAME
    }

    /// Table prefix, if set and non-empty
    pub fn table_prefix(&self) -> Option<&str> {
        non_empty(&self.table_prefix)
    }

    /// Provider name, if set and non-empty
    pub fn database_provider(&self) -> Option<&str> {
        non_empty(&self.database_provider)
    }

    /// Connection string, if set and non-empty
    pub fn connection_string(&self) -> Option<&str> {
        non_empty(&self.connection_string)
    }

    /// Whether none of prefix, connection string and provider has been set
    pub fn is_unset(&self) -> bool {
        self.table_prefix.is_none()
            && self.connection_string.is_none()
            && self.database_provider.is_none()
    }

    /// Fill the default shell from global options.
    ///
    /// Only applies to the default shell while all three data values are
    /// unset; once any of them is set this is a no-op. Returns whether
    /// anything was written.
    pub fn populate_defaults(&mut self, options: &DataOptions) -> bool {
        if !self.is_default() || !self.is_unset() {
            return false;
        }

        self.table_prefix = options.table_prefix.clone();
        self.connection_string = options.connection_string.clone();
        self.database_provider = options.database_provider.clone();

        !self.is_unset()
    }

    /// Check the shell identity
    pub fn validate(&self) -> Result<(), TenantError> {
        if self.name.trim().is_empty() {
            return Err(TenantError::Configuration(
                "Shell name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Process-wide record of the populated default shell.
///
/// The first resolution that actually populates an unset default shell
/// records the settings; every later resolution returns that record, even
/// when racing or when the global options have changed since. Resolving
/// against empty options records nothing.
#[derive(Debug, Default)]
pub struct DefaultShellSettings {
    recorded: OnceCell<ShellSettings>,
}

impl DefaultShellSettings {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the effective settings for `shell`.
    ///
    /// Non-default shells and default shells carrying their own values are
    /// returned as given.
    pub fn resolve(&self, shell: &ShellSettings, options: &DataOptions) -> ShellSettings {
        if !shell.is_default() || !shell.is_unset() {
            return shell.clone();
        }

        if let Some(recorded) = self.recorded.get() {
            return recorded.clone();
        }

        let mut populated = shell.clone();
        if !populated.populate_defaults(options) {
            return populated;
        }

        self.recorded
            .get_or_init(|| {
                info!(
                    shell = %populated.name,
                    provider = populated.database_provider().unwrap_or(""),
                    prefix = populated.table_prefix().unwrap_or(""),
                    "populated default shell from global options"
                );
                populated
            })
            .clone()
    }

    /// The recorded default shell, if one was resolved
    pub fn recorded(&self) -> Option<&ShellSettings> {
        self.recorded.get()
    }
}
