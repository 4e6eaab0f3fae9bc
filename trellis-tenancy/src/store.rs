//! Shell Settings Provider
//!
//! Resolves a shell name to its [`ShellSettings`]. Hosts plug in their own
//! store; [`InMemoryShellSettingsStore`] serves tests and single-process hosts.

use crate::TenantError;
use crate::shell::ShellSettings;
use std::collections::HashMap;
use trellis_config::DataOptions;

/// Source of shell settings
///
/// `find` returns `None` only when the shell does not exist. A shell that
/// exists but is not configured yet is returned with unset provider and
/// connection fields.
pub trait ShellSettingsProvider: Send + Sync {
    /// Look up a shell by name
    fn find(&self, name: &str) -> Result<Option<ShellSettings>, TenantError>;
}

/// In-memory shell settings store
#[derive(Debug, Default)]
pub struct InMemoryShellSettingsStore {
    shells: parking_lot::RwLock<HashMap<String, ShellSettings>>,
}

impl InMemoryShellSettingsStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a shell, returning the previous record
    pub fn insert(&self, settings: ShellSettings) -> Result<Option<ShellSettings>, TenantError> {
        settings.validate()?;
        Ok(self.shells.write().insert(settings.name.clone(), settings))
    }

    /// Remove a shell
    pub fn remove(&self, name: &str) -> Option<ShellSettings> {
        self.shells.write().remove(name)
    }

    /// Populate the stored default shell from global options.
    ///
    /// Runs under the write lock, so concurrent callers cannot record two
    /// different defaults.
    pub fn populate_defaults(&self, name: &str, options: &DataOptions) -> Result<bool, TenantError> {
        let mut shells = self.shells.write();
        let shell = shells
            .get_mut(name)
            .ok_or_else(|| TenantError::NotFound(name.to_string()))?;
        Ok(shell.populate_defaults(options))
    }

    /// Shell names in sorted order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shells.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of stored shells
    pub fn len(&self) -> usize {
        self.shells.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.shells.read().is_empty()
    }
}

impl ShellSettingsProvider for InMemoryShellSettingsStore {
    fn find(&self, name: &str) -> Result<Option<ShellSettings>, TenantError> {
        Ok(self.shells.read().get(name).cloned())
    }
}
