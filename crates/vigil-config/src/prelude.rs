//! Common imports for configuration consumers.
//!
//! ```rust
//! use vigil_config::prelude::*;
//! ```

pub use crate::{Config, ConfigError, ConfigResult, ResolvedConfig};
