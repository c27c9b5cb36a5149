//! Errors raised while assembling the layered configuration.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::merge::ConfigLayer;

/// Why a configuration could not be produced.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("cannot read {layer} config {}: {source}", .path.display())]
    ReadError {
        /// Layer the file belongs to.
        layer: ConfigLayer,
        /// The file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The file passed with `--config` does not exist.
    #[error("config file {} does not exist", .path.display())]
    MissingFile {
        /// The requested file.
        path: PathBuf,
    },

    /// A config file is over the size limit and was not parsed.
    #[error("{layer} config {} is {size} bytes, over the {limit} byte limit", .path.display())]
    TooLarge {
        /// Layer the file belongs to.
        layer: ConfigLayer,
        /// The file.
        path: PathBuf,
        /// Its size in bytes.
        size: u64,
        /// The limit in bytes.
        limit: u64,
    },

    /// Bad TOML syntax in one layer, or a type mismatch once layers merge.
    #[error("invalid TOML in {origin}: {source}")]
    ParseError {
        /// The file and its layer, `embedded defaults` or `merged config`.
        origin: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A merged value is out of range or not one of the accepted names.
    #[error("invalid value for '{field}': {message}")]
    ValidationError {
        /// Dotted field path, e.g. `audit.page_size`.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// A `VIGIL_*` fallback variable could not be converted.
    #[error("{var_name} cannot fill '{field}': {message}")]
    EnvError {
        /// The variable.
        var_name: String,
        /// Dotted field path it would have set.
        field: String,
        /// What is wrong with its value.
        message: String,
    },

    /// No home directory to look for `~/.vigil/config.toml` in.
    #[error("cannot locate a home directory for the user config layer")]
    NoHomeDir,
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
