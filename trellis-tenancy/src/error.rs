//! Tenant data-access errors.

/// Errors raised while resolving a shell's data access.
///
/// Every variant is terminal for the current unit of work; nothing here is
/// retried.
#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("The specified database provider is not supported: {0}")]
    UnsupportedProvider(String),

    #[error("Shell not found: {0}")]
    NotFound(String),

    #[error("Unknown entity type configuration: {0}")]
    UnknownConfiguration(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl TenantError {
    /// Whether this is a fatal configuration problem to surface to the operator.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::UnsupportedProvider(_) | Self::UnknownConfiguration(_)
        )
    }
}
