//! Configuration for trellis
//!
//! Loads the global [`DataOptions`] from JSON/TOML files, `.env` files and
//! `TRELLIS_DATA_*` environment variables.

pub mod env;
pub mod error;
pub mod loader;
pub mod options;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use options::{DataOptions, ENV_PREFIX};
pub use validation::{ConfigValidator, Validate};
