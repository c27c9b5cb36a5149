//! Audit record types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of a finalized audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditEntryId(pub Uuid);

impl AuditEntryId {
    /// Create a new random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AuditEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AuditEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AuditEntryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A scalar field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Explicitly empty.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Text, measured and truncated in characters.
    Text(String),
    /// Point in time.
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    /// Borrow the text, if this is a text value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The boolean, if this is a boolean value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer, if this is an integer value.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether this is [`FieldValue::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Convert from loosely typed JSON input.
    ///
    /// Floats and nested structures become their JSON text.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n.as_i64().map_or_else(|| Self::Text(n.to_string()), Self::Int),
            Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }

    /// Plain JSON rendering, without the type tag.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(n) => Value::from(*n),
            Self::Text(s) => Value::String(s.clone()),
            Self::Timestamp(t) => Value::String(format_timestamp(t)),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Timestamp(t) => f.write_str(&format_timestamp(t)),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<u32> for FieldValue {
    fn from(n: u32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Render a timestamp the way records are stored and exported: RFC 3339,
/// UTC, microsecond precision, fixed width.
#[must_use]
pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// One logged action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique record identifier.
    pub id: AuditEntryId,
    /// When the record was finalized (microsecond precision).
    pub timestamp: DateTime<Utc>,
    /// Logged fields, keyed by name.
    pub fields: BTreeMap<String, FieldValue>,
    /// Base64 signature over everything above, once signed.
    ///
    /// Kept as text so that a damaged stored value still reaches the
    /// verifier and reports as a failure.
    pub signature: Option<String>,
}

impl AuditRecord {
    /// Create an unsigned record stamped with the current time.
    #[must_use]
    pub fn new(fields: BTreeMap<String, FieldValue>) -> Self {
        Self {
            id: AuditEntryId::new(),
            timestamp: Utc::now().trunc_subsecs(6),
            fields,
            signature: None,
        }
    }

    /// Replace the timestamp (truncated to microseconds).
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp.trunc_subsecs(6);
        self
    }

    /// Look up a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Look up a text field.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }
}

/// Read-time signature status of a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigCheck {
    /// Signature matches the stored content.
    #[serde(rename = "OK")]
    Ok,
    /// Signature present but does not verify.
    #[serde(rename = "FAIL")]
    Fail,
    /// No signature was stored.
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl SigCheck {
    /// Display label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Fail => "FAIL",
            Self::NotApplicable => "N/A",
        }
    }
}

impl fmt::Display for SigCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored record together with its read-time signature status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedRecord {
    /// The record as read from the store.
    pub record: AuditRecord,
    /// Result of re-deriving the signature.
    pub sig_check: SigCheck,
}

impl VerifiedRecord {
    /// Flat JSON object: every field plus `id`, `date`, `signature` and
    /// `sig_check`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut map: serde_json::Map<String, serde_json::Value> = self
            .record
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        map.insert("id".into(), self.record.id.to_string().into());
        map.insert("date".into(), format_timestamp(&self.record.timestamp).into());
        map.insert(
            "signature".into(),
            self.record
                .signature
                .clone()
                .map_or(serde_json::Value::Null, serde_json::Value::String),
        );
        map.insert("sig_check".into(), self.sig_check.as_str().into());
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_conversions() {
        assert_eq!(FieldValue::from("abc"), FieldValue::Text("abc".into()));
        assert_eq!(FieldValue::from(true), FieldValue::Bool(true));
        assert_eq!(FieldValue::from(7_i32), FieldValue::Int(7));
        assert_eq!(FieldValue::from(None::<&str>), FieldValue::Null);
        assert_eq!(FieldValue::from(Some("x")), FieldValue::Text("x".into()));
    }

    #[test]
    fn test_field_value_from_json() {
        use serde_json::json;
        assert_eq!(FieldValue::from_json(&json!(null)), FieldValue::Null);
        assert_eq!(FieldValue::from_json(&json!(12)), FieldValue::Int(12));
        assert_eq!(FieldValue::from_json(&json!(1.5)), FieldValue::Text("1.5".into()));
        assert_eq!(FieldValue::from_json(&json!(["a"])), FieldValue::Text("[\"a\"]".into()));
    }

    #[test]
    fn test_field_value_serde_is_tagged() {
        let json = serde_json::to_string(&FieldValue::Int(3)).unwrap();
        assert_eq!(json, r#"{"type":"int","value":3}"#);
        let null = serde_json::to_string(&FieldValue::Null).unwrap();
        assert_eq!(null, r#"{"type":"null"}"#);
        let back: FieldValue = serde_json::from_str(&null).unwrap();
        assert!(back.is_null());
    }

    #[test]
    fn test_timestamp_is_truncated_to_micros() {
        let record = AuditRecord::new(BTreeMap::new());
        assert_eq!(record.timestamp.timestamp_subsec_nanos() % 1000, 0);
        assert!(format_timestamp(&record.timestamp).ends_with('Z'));
    }

    #[test]
    fn test_sig_check_labels() {
        assert_eq!(SigCheck::Ok.to_string(), "OK");
        assert_eq!(SigCheck::Fail.to_string(), "FAIL");
        assert_eq!(SigCheck::NotApplicable.to_string(), "N/A");
        assert_eq!(serde_json::to_string(&SigCheck::NotApplicable).unwrap(), "\"N/A\"");
    }

    #[test]
    fn test_verified_record_json_is_flat() {
        let mut fields = BTreeMap::new();
        fields.insert("serial".to_string(), FieldValue::from("OATH0001"));
        fields.insert("success".to_string(), FieldValue::from(true));
        let verified = VerifiedRecord {
            record: AuditRecord::new(fields),
            sig_check: SigCheck::NotApplicable,
        };

        let json = verified.to_json();
        assert_eq!(json["serial"], "OATH0001");
        assert_eq!(json["success"], true);
        assert_eq!(json["sig_check"], "N/A");
        assert!(json["signature"].is_null());
        assert_eq!(json["id"], verified.record.id.to_string());
    }

    #[test]
    fn test_entry_id_parse() {
        let id = AuditEntryId::new();
        assert_eq!(id.to_string().parse::<AuditEntryId>().unwrap(), id);
        assert!("nope".parse::<AuditEntryId>().is_err());
    }
}
