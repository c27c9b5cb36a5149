//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Largest accepted page size.
const MAX_PAGE_SIZE: u32 = 10_000;

/// Validate a fully merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_audit(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_audit(config: &Config) -> ConfigResult<()> {
    let a = &config.audit;

    if !matches!(a.backend.as_str(), "sqlite" | "sql" | "memory") {
        return Err(invalid(
            "audit.backend",
            format!("unsupported backend '{}'; expected one of: sqlite, memory", a.backend),
        ));
    }

    if !matches!(a.policy_truncation.as_str(), "sequential" | "shrink-longest") {
        return Err(invalid(
            "audit.policy_truncation",
            format!(
                "unsupported strategy '{}'; expected one of: sequential, shrink-longest",
                a.policy_truncation
            ),
        ));
    }

    if a.page_size == 0 || a.page_size > MAX_PAGE_SIZE {
        return Err(invalid(
            "audit.page_size",
            format!("page_size must be between 1 and {MAX_PAGE_SIZE}"),
        ));
    }

    for (column, limit) in &a.column_limits {
        if *limit == 0 {
            return Err(invalid(
                &format!("audit.column_limits.{column}"),
                "column limit must be at least 1",
            ));
        }
    }

    for (field, path) in [
        ("audit.database", &a.database),
        ("audit.private_key", &a.private_key),
        ("audit.public_key", &a.public_key),
    ] {
        if path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
            return Err(invalid(field, "path must not be empty"));
        }
    }

    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(invalid(
            "logging.level",
            format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        ));
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn field_of(err: ConfigError) -> String {
        match err {
            ConfigError::ValidationError { field, .. } => field,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_invalid_backend() {
        let mut config = Config::default();
        config.audit.backend = "ldap".to_owned();
        assert_eq!(field_of(validate(&config).unwrap_err()), "audit.backend");
    }

    #[test]
    fn test_invalid_page_size() {
        let mut config = Config::default();
        config.audit.page_size = 0;
        assert_eq!(field_of(validate(&config).unwrap_err()), "audit.page_size");
    }

    #[test]
    fn test_zero_column_limit() {
        let mut config = Config::default();
        config.audit.column_limits.insert("serial".to_owned(), 0);
        assert_eq!(
            field_of(validate(&config).unwrap_err()),
            "audit.column_limits.serial"
        );
    }

    #[test]
    fn test_empty_key_path() {
        let mut config = Config::default();
        config.audit.private_key = Some(PathBuf::new());
        assert_eq!(field_of(validate(&config).unwrap_err()), "audit.private_key");
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_owned();
        assert_eq!(field_of(validate(&config).unwrap_err()), "logging.format");
    }
}
