//! Lifecycle Transitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle operation applied to one feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionKind {
    Install,
    Enable,
    Disable,
    Uninstall,
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Install => "Install",
            Self::Enable => "Enable",
            Self::Disable => "Disable",
            Self::Uninstall => "Uninstall",
        };
        f.write_str(name)
    }
}

/// One lifecycle operation for one feature
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transition {
    /// Operation
    pub kind: TransitionKind,

    /// Target feature
    pub feature_id: String,
}

impl Transition {
    /// Create a transition
    pub fn new(kind: TransitionKind, feature_id: impl Into<String>) -> Self {
        Self {
            kind,
            feature_id: feature_id.into(),
        }
    }

    pub fn install(feature_id: impl Into<String>) -> Self {
        Self::new(TransitionKind::Install, feature_id)
    }

    pub fn enable(feature_id: impl Into<String>) -> Self {
        Self::new(TransitionKind::Enable, feature_id)
    }

    pub fn disable(feature_id: impl Into<String>) -> Self {
        Self::new(TransitionKind::Disable, feature_id)
    }

    pub fn uninstall(feature_id: impl Into<String>) -> Self {
        Self::new(TransitionKind::Uninstall, feature_id)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.feature_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Transition::install("Comments").to_string(), "Install(Comments)");
        assert_eq!(Transition::uninstall("Blog").to_string(), "Uninstall(Blog)");
    }
}
