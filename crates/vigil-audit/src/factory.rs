//! Building an [`Audit`] from deployment settings.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use vigil_crypto::{KeyPair, PublicKey};

use crate::audit::Audit;
use crate::columns::ColumnConstraints;
use crate::error::{AuditError, AuditResult};
use crate::filter::FilterMap;
use crate::query::SearchOptions;
use crate::storage::{AuditStore, MemoryAuditStore, SqliteAuditStore};
use crate::truncate::ListTruncation;

/// Which store implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// SQLite file, or a private in-memory database when no path is set.
    #[default]
    Sqlite,
    /// Process-local vector; contents are lost on exit.
    Memory,
}

impl FromStr for BackendKind {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sql" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(AuditError::InvalidSettings(format!(
                "unknown audit backend '{other}'"
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        })
    }
}

/// Everything the factory needs to assemble an audit trail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditSettings {
    /// Store implementation.
    pub backend: BackendKind,
    /// Database file for the SQLite backend.
    pub database: Option<PathBuf>,
    /// Private key file; records are unsigned without it.
    pub private_key: Option<PathBuf>,
    /// Public key file; defaults to the private key's public half.
    pub public_key: Option<PathBuf>,
    /// Per-column bound overrides.
    pub column_limits: BTreeMap<String, usize>,
    /// Strategy for the policy list.
    pub policy_truncation: ListTruncation,
    /// Default page size for searches.
    pub page_size: Option<u32>,
}

/// Result of the stateless [`search`] helper.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchSummary {
    /// Records matching the filter, ignoring pagination.
    pub count: u64,
    /// This page's number.
    pub current: u32,
    /// Previous page, if any.
    pub prev: Option<u32>,
    /// Next page, if any.
    pub next: Option<u32>,
    /// Flat JSON objects, one per record on this page.
    pub entries: Vec<serde_json::Value>,
}

/// Open the configured store and load key material.
///
/// # Errors
///
/// Returns an error if the store cannot be opened, a key file cannot be
/// loaded, or the settings are inconsistent.
pub fn get_audit(settings: &AuditSettings) -> AuditResult<Audit> {
    let store: Arc<dyn AuditStore> = match settings.backend {
        BackendKind::Sqlite => match &settings.database {
            Some(path) => Arc::new(SqliteAuditStore::open(path)?),
            None => Arc::new(SqliteAuditStore::in_memory()?),
        },
        BackendKind::Memory => {
            if let Some(path) = &settings.database {
                tracing::warn!(path = %path.display(), "memory audit backend ignores the database path");
            }
            Arc::new(MemoryAuditStore::new())
        },
    };

    let constraints = settings
        .column_limits
        .iter()
        .fold(ColumnConstraints::default(), |table, (name, bound)| {
            table.with_bound(name.clone(), *bound)
        });

    let mut builder = Audit::builder(store)
        .constraints(constraints)
        .list_truncation(settings.policy_truncation);
    if let Some(page_size) = settings.page_size {
        builder = builder.page_size(page_size)?;
    }
    if let Some(path) = &settings.private_key {
        let key = KeyPair::load(path)?;
        tracing::debug!(key_id = %key.key_id_hex(), "loaded audit signing key");
        builder = builder.signing_key(key);
    }
    if let Some(path) = &settings.public_key {
        builder = builder.verifying_key(PublicKey::load(path)?);
    }
    if settings.private_key.is_none() {
        tracing::warn!("no audit signing key configured; records will be written unsigned");
    }

    Ok(builder.build())
}

/// Build an audit from `settings` and return one page of results.
///
/// The audit is dropped on return, so only a SQLite file can hold anything
/// to find.
///
/// # Errors
///
/// Returns [`AuditError::InvalidSettings`] when the settings name no
/// database file; otherwise the same as [`get_audit`] and [`Audit::search`].
pub fn search(settings: &AuditSettings, filters: &FilterMap) -> AuditResult<SearchSummary> {
    if settings.backend != BackendKind::Sqlite || settings.database.is_none() {
        return Err(AuditError::InvalidSettings(format!(
            "stateless search needs a database file; the {} backend without one is always empty",
            settings.backend
        )));
    }
    let page = get_audit(settings)?.search(filters, &SearchOptions::default())?;
    Ok(SearchSummary {
        count: page.total,
        current: page.current,
        prev: page.prev,
        next: page.next,
        entries: page.items.iter().map(|v| v.to_json()).collect(),
    })
}
