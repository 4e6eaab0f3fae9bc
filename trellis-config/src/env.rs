// Environment variable loading

use std::collections::HashMap;
use std::env;

/// Prefixed environment variable reader
pub struct EnvLoader {
    prefix: String,
    overrides: Option<HashMap<String, String>>,
}

impl EnvLoader {
    /// Read variables named `{prefix}_{KEY}` from the process environment
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            overrides: None,
        }
    }

    /// Read variables from a fixed map instead of the process environment
    pub fn from_map(prefix: impl Into<String>, vars: HashMap<String, String>) -> Self {
        Self {
            prefix: prefix.into(),
            overrides: Some(vars),
        }
    }

    /// Full variable name for a key
    pub fn var_name(&self, key: &str) -> String {
        format!("{}_{}", self.prefix, key.to_uppercase())
    }

    /// Load a variable, treating empty values as unset
    pub fn load_var(&self, key: &str) -> Option<String> {
        let name = self.var_name(key);
        let value = match &self.overrides {
            Some(vars) => vars.get(&name).cloned(),
            None => env::var(&name).ok(),
        };

        value.filter(|v| !v.trim().is_empty())
    }
}
