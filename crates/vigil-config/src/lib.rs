#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Layered configuration for Vigil.
//!
//! # Usage
//!
//! ```rust,no_run
//! use vigil_config::Config;
//!
//! let resolved = Config::load(None).unwrap();
//! println!("audit backend: {}", resolved.config.audit.backend);
//! ```
//!
//! # Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Explicit file** passed on the command line
//! 2. **User** (`~/.vigil/config.toml`)
//! 3. **System** (`/etc/vigil/config.toml`)
//! 4. **Environment variables** (`VIGIL_*`), fallback only
//! 5. **Embedded defaults**
//!
//! This crate depends on no other Vigil crate. Conversion into audit and
//! telemetry settings happens in the binary.

pub mod prelude;

mod env;
mod error;
mod loader;
mod merge;
mod types;
mod validate;

pub use env::{apply_env_fallbacks, collect_env_vars};
pub use error::{ConfigError, ConfigResult};
pub use loader::{ResolvedConfig, SYSTEM_CONFIG_PATH, load, load_file};
pub use merge::{ConfigLayer, FieldSources, deep_merge_tracking};
pub use types::{AuditSection, Config, LoggingSection};
pub use validate::validate;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the
    /// final configuration fails validation.
    pub fn load(explicit: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(explicit, None)
    }

    /// Load configuration with an explicit home directory.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`].
    pub fn load_with_home(
        explicit: Option<&std::path::Path>,
        home_dir: &std::path::Path,
    ) -> ConfigResult<ResolvedConfig> {
        loader::load(explicit, Some(home_dir))
    }
}
