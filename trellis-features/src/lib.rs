//! Shell Feature State for Trellis
//!
//! Tracks which optional feature modules are active in each shell and turns
//! a change of the desired feature set into ordered lifecycle transitions.
//!
//! # Features
//!
//! - 🧭 **Dependency Ordering** - Dependencies enabled first, dependents disabled first
//! - 🔁 **Install vs Enable** - Install only for features never recorded
//! - 🧹 **Explicit Uninstall** - Disabling never uninstalls
//! - 🔒 **Per-Shell Serialization** - One reconciliation per shell at a time
//! - 💾 **Atomic Commit** - State saved only after every hook succeeded
//!
//! # Quick Start
//!
//! ```
//! use trellis_features::*;
//!
//! let previous = ShellState::new(1).with_feature("Blog", true);
//! let desired = [
//!     FeatureDescriptor::new("Blog"),
//!     FeatureDescriptor::new("Comments").with_dependency("Blog"),
//! ];
//!
//! let result = FeatureStateDiffer::new().reconcile(&previous, &desired).unwrap();
//!
//! assert_eq!(
//!     result.transitions,
//!     vec![Transition::install("Comments"), Transition::enable("Comments")]
//! );
//! assert!(result.state.is_enabled("Comments"));
//! ```
//!
//! # Cycles
//!
//! ```
//! use trellis_features::*;
//!
//! let desired = [
//!     FeatureDescriptor::new("F").with_dependency("G"),
//!     FeatureDescriptor::new("G").with_dependency("F"),
//! ];
//!
//! let err = FeatureStateDiffer::new()
//!     .reconcile(&ShellState::new(1), &desired)
//!     .unwrap_err();
//! assert!(err.is_configuration_error());
//! ```

pub mod descriptor;
pub mod differ;
pub mod error;
pub mod lifecycle;
pub mod state;
pub mod transition;

pub use descriptor::FeatureDescriptor;
pub use differ::{FeatureStateDiffer, Reconciliation};
pub use error::FeatureError;
pub use lifecycle::{
    FeatureLifecycleSink, InMemoryShellStateStore, LoggingLifecycleSink, ShellFeatureManager,
    ShellStateStore,
};
pub use state::{FeatureState, ShellState};
pub use transition::{Transition, TransitionKind};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::descriptor::FeatureDescriptor;
    pub use crate::differ::{FeatureStateDiffer, Reconciliation};
    pub use crate::error::FeatureError;
    pub use crate::lifecycle::{FeatureLifecycleSink, ShellFeatureManager, ShellStateStore};
    pub use crate::state::{FeatureState, ShellState};
    pub use crate::transition::{Transition, TransitionKind};
}
