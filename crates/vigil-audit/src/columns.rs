//! Stored columns and their width constraints.
//!
//! [`COLUMNS`] is the fixed schema shared by every store: searchable fields,
//! their value kind and default maximum width in characters. A deployment may
//! tighten or widen bounds through [`ColumnConstraints::with_bound`], but the
//! same table must be used on the write path and the read path.

use std::collections::BTreeMap;

/// Name of the delimited policy list field.
pub const POLICIES: &str = "policies";

/// Global bound on the joined policy list, separators included.
pub const POLICIES_MAX_LEN: usize = 255;

/// Value kind stored in a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Free text.
    Text,
    /// Boolean flag.
    Bool,
    /// Signed integer.
    Int,
}

/// One stored, searchable column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Field name as used in records and filters.
    pub name: &'static str,
    /// What the column holds.
    pub kind: ColumnKind,
    /// Default maximum width in characters (text columns only).
    pub max_len: Option<usize>,
}

impl Column {
    const fn text(name: &'static str, max_len: usize) -> Self {
        Self {
            name,
            kind: ColumnKind::Text,
            max_len: Some(max_len),
        }
    }

    const fn typed(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            max_len: None,
        }
    }
}

/// The audit schema, in export order.
pub const COLUMNS: &[Column] = &[
    Column::text("action", 50),
    Column::typed("success", ColumnKind::Bool),
    Column::text("serial", 40),
    Column::text("token_type", 12),
    Column::text("user", 20),
    Column::text("realm", 20),
    Column::text("administrator", 20),
    Column::text("action_detail", 50),
    Column::text("info", 50),
    Column::text("server", 255),
    Column::text("client", 50),
    Column::typed("loglevel", ColumnKind::Int),
    Column::typed("clearance_level", ColumnKind::Int),
    Column::text(POLICIES, POLICIES_MAX_LEN),
];

/// Look up a schema column by name.
#[must_use]
pub fn column(name: &str) -> Option<&'static Column> {
    COLUMNS.iter().find(|c| c.name == name)
}

/// Names of all searchable columns.
pub fn available_columns() -> impl Iterator<Item = &'static str> {
    COLUMNS.iter().map(|c| c.name)
}

/// Maximum stored width per field name.
///
/// Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnConstraints {
    bounds: BTreeMap<String, usize>,
}

impl ColumnConstraints {
    /// A table with no bounds at all.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            bounds: BTreeMap::new(),
        }
    }

    /// Override (or add) the bound for one field.
    #[must_use]
    pub fn with_bound(mut self, name: impl Into<String>, max_len: usize) -> Self {
        self.bounds.insert(name.into(), max_len);
        self
    }

    /// Maximum width of `name`, or `None` when the field is unbounded.
    #[must_use]
    pub fn max_length(&self, name: &str) -> Option<usize> {
        self.bounds.get(name).copied()
    }

    /// Effective bound for the policy list. Never exceeds [`POLICIES_MAX_LEN`].
    #[must_use]
    pub fn policies_bound(&self) -> usize {
        self.max_length(POLICIES)
            .map_or(POLICIES_MAX_LEN, |n| n.min(POLICIES_MAX_LEN))
    }

    /// Iterate `(field, bound)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.bounds.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl Default for ColumnConstraints {
    fn default() -> Self {
        let bounds = COLUMNS
            .iter()
            .filter_map(|c| c.max_len.map(|n| (c.name.to_string(), n)))
            .collect();
        Self { bounds }
    }
}
