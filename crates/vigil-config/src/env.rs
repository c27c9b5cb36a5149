//! Environment variable fallbacks.
//!
//! Environment variables are a fallback, not an override: they only fill
//! fields that no config file set. A value coming from the embedded defaults
//! still yields to the environment.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources};

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    kind: ValueKind,
}

#[derive(Clone, Copy)]
enum ValueKind {
    String,
    Integer,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "VIGIL_AUDIT_BACKEND",
        field_path: "audit.backend",
        kind: ValueKind::String,
    },
    EnvMapping {
        var_name: "VIGIL_AUDIT_DATABASE",
        field_path: "audit.database",
        kind: ValueKind::String,
    },
    EnvMapping {
        var_name: "VIGIL_AUDIT_PRIVATE_KEY",
        field_path: "audit.private_key",
        kind: ValueKind::String,
    },
    EnvMapping {
        var_name: "VIGIL_AUDIT_PUBLIC_KEY",
        field_path: "audit.public_key",
        kind: ValueKind::String,
    },
    EnvMapping {
        var_name: "VIGIL_AUDIT_PAGE_SIZE",
        field_path: "audit.page_size",
        kind: ValueKind::Integer,
    },
    EnvMapping {
        var_name: "VIGIL_LOG_LEVEL",
        field_path: "logging.level",
        kind: ValueKind::String,
    },
    EnvMapping {
        var_name: "VIGIL_LOG_FORMAT",
        field_path: "logging.format",
        kind: ValueKind::String,
    },
];

/// Snapshot the `VIGIL_*` variables of the current process.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with("VIGIL_"))
        .collect()
}

/// Apply environment variable fallbacks to fields no config file set.
///
/// Returns the number of variables applied.
///
/// # Errors
///
/// Returns [`ConfigError::EnvError`] if a variable for a numeric field does
/// not parse as an integer.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<usize> {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        let set_by_file = sources
            .get(mapping.field_path)
            .is_some_and(|layer| *layer != ConfigLayer::Defaults);
        if set_by_file {
            continue;
        }

        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };
        let value = match mapping.kind {
            ValueKind::String => toml::Value::String(raw.clone()),
            ValueKind::Integer => {
                let n = raw.trim().parse::<i64>().map_err(|e| ConfigError::EnvError {
                    var_name: mapping.var_name.to_owned(),
                    field: mapping.field_path.to_owned(),
                    message: format!("expected an integer: {e}"),
                })?;
                toml::Value::Integer(n)
            },
        };

        debug!(
            var = mapping.var_name,
            field = mapping.field_path,
            "applying env var fallback"
        );
        set_field(merged, mapping.field_path, value);
        sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
        count = count.saturating_add(1);
    }

    Ok(count)
}

/// Set a dotted-path field, creating intermediate tables as needed.
fn set_field(root: &mut toml::Value, path: &str, value: toml::Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(leaf) = segments.pop() else {
        return;
    };

    let mut current = root;
    for segment in segments {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        current = table
            .entry(segment)
            .or_insert(toml::Value::Table(toml::map::Map::new()));
    }

    if let Some(table) = current.as_table_mut() {
        table.insert(leaf.to_owned(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_env_fills_unset_fields() {
        let mut merged: toml::Value = toml::from_str("[audit]\n").unwrap();
        let mut sources = FieldSources::new();

        let applied = apply_env_fallbacks(
            &mut merged,
            &mut sources,
            &vars(&[("VIGIL_AUDIT_DATABASE", "/tmp/a.db"), ("VIGIL_LOG_LEVEL", "debug")]),
        )
        .unwrap();

        assert_eq!(applied, 2);
        assert_eq!(merged["audit"]["database"].as_str(), Some("/tmp/a.db"));
        assert_eq!(merged["logging"]["level"].as_str(), Some("debug"));
        assert_eq!(sources.get("logging.level"), Some(&ConfigLayer::Environment));
    }

    #[test]
    fn test_env_yields_to_files_but_not_defaults() {
        let mut merged: toml::Value =
            toml::from_str("[audit]\nbackend = \"memory\"\n[logging]\nlevel = \"info\"\n").unwrap();
        let mut sources = FieldSources::new();
        sources.insert("audit.backend".to_owned(), ConfigLayer::User);
        sources.insert("logging.level".to_owned(), ConfigLayer::Defaults);

        apply_env_fallbacks(
            &mut merged,
            &mut sources,
            &vars(&[("VIGIL_AUDIT_BACKEND", "sqlite"), ("VIGIL_LOG_LEVEL", "warn")]),
        )
        .unwrap();

        assert_eq!(merged["audit"]["backend"].as_str(), Some("memory"));
        assert_eq!(merged["logging"]["level"].as_str(), Some("warn"));
    }

    #[test]
    fn test_integer_coercion() {
        let mut merged: toml::Value = toml::from_str("").unwrap();
        let mut sources = FieldSources::new();

        apply_env_fallbacks(
            &mut merged,
            &mut sources,
            &vars(&[("VIGIL_AUDIT_PAGE_SIZE", "40")]),
        )
        .unwrap();
        assert_eq!(merged["audit"]["page_size"].as_integer(), Some(40));

        let err = apply_env_fallbacks(
            &mut merged,
            &mut FieldSources::new(),
            &vars(&[("VIGIL_AUDIT_PAGE_SIZE", "forty")]),
        )
        .unwrap_err();
        assert!(matches!(
            &err,
            ConfigError::EnvError { var_name, field, .. }
                if var_name == "VIGIL_AUDIT_PAGE_SIZE" && field == "audit.page_size"
        ));
        assert!(err.to_string().contains("'audit.page_size'"));
    }
}
