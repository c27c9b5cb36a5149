//! Configuration types for Vigil.
//!
//! This module has no dependencies on other Vigil crates. Values stay in
//! their TOML shape (strings, paths, integers) and are converted into domain
//! types at the integration boundary. Every struct implements [`Default`] so
//! that a bare `[section]` header produces a working configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Audit store, key material and record shaping.
    pub audit: AuditSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// AuditSection
// ---------------------------------------------------------------------------

/// Audit trail configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSection {
    /// Store implementation: `"sqlite"` or `"memory"`.
    pub backend: String,
    /// SQLite database file. Omitted means a private in-memory database.
    pub database: Option<PathBuf>,
    /// Ed25519 private key used to sign new records.
    pub private_key: Option<PathBuf>,
    /// Ed25519 public key used to verify records. Derived from the private
    /// key when omitted.
    pub public_key: Option<PathBuf>,
    /// Policy list strategy: `"sequential"` or `"shrink-longest"`.
    pub policy_truncation: String,
    /// Records per search page.
    pub page_size: u32,
    /// Per-column maximum widths, overriding the built-in table.
    pub column_limits: BTreeMap<String, usize>,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_owned(),
            database: None,
            private_key: None,
            public_key: None,
            policy_truncation: "sequential".to_owned(),
            page_size: 15,
            column_limits: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["vigil_audit=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
