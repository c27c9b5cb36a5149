//! Subcommand implementations and the argument helpers they share.

pub(crate) mod export;
pub(crate) mod keys;
pub(crate) mod log;
pub(crate) mod search;
pub(crate) mod verify;

use vigil_audit::{ColumnKind, FieldValue, FilterMap, column};

/// Parse a `key=value` argument.
pub(crate) fn parse_pair(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Filter map from `key=value` pairs. Later pairs win.
pub(crate) fn filter_map(pairs: &[(String, String)]) -> FilterMap {
    pairs
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect()
}

/// Typed field value for a command-line string: booleans and integers for
/// columns of that kind, text otherwise.
pub(crate) fn field_value(name: &str, raw: &str) -> FieldValue {
    let kind = column(name).map(|c| c.kind);
    match kind {
        Some(ColumnKind::Bool) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => FieldValue::Bool(true),
            "false" | "0" | "no" => FieldValue::Bool(false),
            _ => FieldValue::from(raw),
        },
        Some(ColumnKind::Int) => raw
            .trim()
            .parse::<i64>()
            .map_or_else(|_| FieldValue::from(raw), FieldValue::Int),
        _ => FieldValue::from(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_split_on_the_first_equals() {
        assert_eq!(
            parse_pair("info=a=b").unwrap(),
            ("info".to_string(), "a=b".to_string())
        );
        assert_eq!(parse_pair("user=").unwrap().1, "");
        assert!(parse_pair("user").is_err());
        assert!(parse_pair("=x").is_err());
    }

    #[test]
    fn values_follow_the_column_kind() {
        assert_eq!(field_value("success", "yes"), FieldValue::Bool(true));
        assert_eq!(field_value("loglevel", "20"), FieldValue::Int(20));
        assert_eq!(field_value("loglevel", "high"), FieldValue::from("high"));
        assert_eq!(field_value("serial", "1234"), FieldValue::from("1234"));
        assert_eq!(field_value("custom", "true"), FieldValue::from("true"));
    }

    #[test]
    fn filter_map_keeps_the_last_value() {
        let map = filter_map(&[
            ("user".into(), "hans".into()),
            ("user".into(), "willi".into()),
        ]);
        assert_eq!(map.len(), 1);
        assert_eq!(map["user"], "willi");
    }
}
