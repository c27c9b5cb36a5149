//! Bridge from `vigil_config::Config` to audit and telemetry settings.
//!
//! The config crate has no dependencies on other Vigil crates, so string
//! enums are parsed into their domain types here, once.

use anyhow::{Context, Result};
use vigil_audit::{AuditSettings, BackendKind, ListTruncation};
use vigil_config::Config;
use vigil_telemetry::{LogConfig, LogFormat};

/// Convert config to [`AuditSettings`].
///
/// # Errors
///
/// Returns an error if the backend or truncation strategy is unknown.
pub(crate) fn to_audit_settings(cfg: &Config) -> Result<AuditSettings> {
    let audit = &cfg.audit;
    let backend: BackendKind = audit
        .backend
        .parse()
        .with_context(|| format!("audit.backend = {:?}", audit.backend))?;
    let policy_truncation = match audit.policy_truncation.as_str() {
        "sequential" => ListTruncation::Sequential,
        "shrink-longest" => ListTruncation::ShrinkLongest,
        other => anyhow::bail!("audit.policy_truncation: unknown strategy '{other}'"),
    };

    Ok(AuditSettings {
        backend,
        database: audit.database.clone(),
        private_key: audit.private_key.clone(),
        public_key: audit.public_key.clone(),
        column_limits: audit.column_limits.clone(),
        policy_truncation,
        page_size: Some(audit.page_size),
    })
}

/// Convert config to [`LogConfig`].
pub(crate) fn to_log_config(cfg: &Config) -> LogConfig {
    let format = cfg
        .logging
        .format
        .parse::<LogFormat>()
        .unwrap_or_default();

    cfg.logging
        .directives
        .iter()
        .fold(LogConfig::new(&cfg.logging.level).with_format(format), |lc, d| {
            lc.with_directive(d)
        })
}
