//! Feature reconciliation errors.

/// Errors raised while reconciling or applying feature state.
///
/// Reconciliation errors are raised before any transition is produced, so a
/// failed call never yields a partial transition list.
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    #[error("Feature dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("Feature '{feature}' depends on '{dependency}', which is not in the desired set")]
    MissingDependency { feature: String, dependency: String },

    #[error("Feature '{0}' is declared twice with different dependencies")]
    DuplicateFeature(String),

    #[error("Feature '{0}' is not installed")]
    NotInstalled(String),

    #[error("Feature '{0}' must be disabled before it can be uninstalled")]
    StillEnabled(String),

    #[error("Lifecycle hook failed for feature '{feature}': {message}")]
    Lifecycle { feature: String, message: String },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl FeatureError {
    /// Whether this is a fatal configuration problem to surface to the operator.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::DependencyCycle(_) | Self::MissingDependency { .. } | Self::DuplicateFeature(_)
        )
    }
}
