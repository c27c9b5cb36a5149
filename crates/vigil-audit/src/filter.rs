//! Translating loosely typed filter maps into typed search queries.
//!
//! Callers (typically a web UI) pass a flat JSON object. Recognized keys:
//!
//! - any schema column (see [`COLUMNS`](crate::COLUMNS)): exact match, or a
//!   wildcard match when a text value contains `*`
//! - `timelimit`: signed relative duration such as `"1h"`, `"-5m"` or `"7d"`
//!   (units `s m h d y`), or an integer number of seconds; restricts results
//!   to `[now - timelimit, now]`
//! - `sortorder`: `"asc"` or `"desc"` (default) on the record timestamp
//! - `page`, `page_size`: 1-indexed pagination
//!
//! Unknown keys, empty values and values whose type does not fit the column
//! are ignored so that callers can pass extraneous UI state. A `timelimit`
//! that cannot be parsed is rejected with [`AuditError::InvalidTimeLimit`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::columns::{Column, ColumnKind, column};
use crate::error::{AuditError, AuditResult};
use crate::record::{AuditRecord, FieldValue};

/// Raw filter input.
pub type FilterMap = serde_json::Map<String, Value>;

/// Page size used when none is requested.
pub const DEFAULT_PAGE_SIZE: u32 = 15;

// ---------- Field filters ----------

/// A `*` pattern: `x*` prefix, `*x` suffix, `*x*` substring. Case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardPattern(String);

impl WildcardPattern {
    /// Wrap a raw pattern.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    /// The raw pattern.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `value` matches the whole pattern.
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        let mut parts = self.0.split('*');
        let first = parts.next().unwrap_or_default();
        let Some(mut rest) = value.strip_prefix(first) else {
            return false;
        };

        let mut middle: Vec<&str> = parts.collect();
        let Some(last) = middle.pop() else {
            // No `*` at all.
            return rest.is_empty();
        };

        for part in middle {
            match rest.split_once(part) {
                Some((_, after)) => rest = after,
                None => return false,
            }
        }
        rest.ends_with(last)
    }
}

impl fmt::Display for WildcardPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a single column is matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldFilter {
    /// Value equality, including type.
    Exact(FieldValue),
    /// Text pattern.
    Wildcard(WildcardPattern),
}

impl FieldFilter {
    /// Whether a record's value for the column satisfies the filter.
    #[must_use]
    pub fn matches(&self, value: Option<&FieldValue>) -> bool {
        match self {
            Self::Exact(expected) => value == Some(expected),
            Self::Wildcard(pattern) => value
                .and_then(FieldValue::as_str)
                .is_some_and(|s| pattern.matches(s)),
        }
    }
}

/// A filter bound to a schema column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    /// Column name from the schema.
    pub column: &'static str,
    /// The match to apply.
    pub filter: FieldFilter,
}

// ---------- Time window ----------

/// Inclusive timestamp range. Empty when `since > until`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// Earliest timestamp included.
    pub since: DateTime<Utc>,
    /// Latest timestamp included.
    pub until: DateTime<Utc>,
}

impl TimeWindow {
    /// `[now - limit, now]`. A negative `limit` places the lower bound in
    /// the future, which yields an empty window.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidTimeLimit`] if the bound overflows.
    pub fn relative(now: DateTime<Utc>, limit: TimeDelta) -> AuditResult<Self> {
        let since = now
            .checked_sub_signed(limit)
            .ok_or_else(|| AuditError::InvalidTimeLimit {
                value: limit.to_string(),
                reason: "out of range".into(),
            })?;
        Ok(Self { since, until: now })
    }

    /// Whether the window can contain anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.since > self.until
    }

    /// Whether `t` lies within the window.
    #[must_use]
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.since <= t && t <= self.until
    }

    /// The overlap of two windows.
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        Self {
            since: self.since.max(other.since),
            until: self.until.min(other.until),
        }
    }
}

/// Parse a signed relative duration: optional sign, digits, unit.
///
/// Units are `s`, `m`, `h`, `d` and `y` (365 days). Whitespace between the
/// parts is allowed.
///
/// # Errors
///
/// Returns [`AuditError::InvalidTimeLimit`] for anything else.
pub fn parse_time_limit(raw: &str) -> AuditResult<TimeDelta> {
    let invalid = |reason: &str| AuditError::InvalidTimeLimit {
        value: raw.to_string(),
        reason: reason.to_string(),
    };

    let s = raw.trim();
    let (negative, rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let rest = rest.trim_start();
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let (digits, unit) = rest.split_at(digits_end);
    if digits.is_empty() {
        return Err(invalid("expected a number"));
    }

    let amount: i64 = digits.parse().map_err(|_| invalid("number out of range"))?;
    let unit_seconds: i64 = match unit.trim().to_ascii_lowercase().as_str() {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        "y" => 31_536_000,
        "" => return Err(invalid("missing unit (s, m, h, d, y)")),
        _ => return Err(invalid("unknown unit, expected s, m, h, d or y")),
    };

    let seconds = amount
        .checked_mul(unit_seconds)
        .and_then(|n| if negative { n.checked_neg() } else { Some(n) })
        .ok_or_else(|| invalid("out of range"))?;
    TimeDelta::try_seconds(seconds).ok_or_else(|| invalid("out of range"))
}

// ---------- Query ----------

/// Conjunction of column conditions and an optional time window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicate {
    /// All must match.
    pub conditions: Vec<Condition>,
    /// Timestamp restriction.
    pub window: Option<TimeWindow>,
}

impl Predicate {
    /// Add a condition.
    #[must_use]
    pub fn and(mut self, column: &'static str, filter: FieldFilter) -> Self {
        self.conditions.push(Condition { column, filter });
        self
    }

    /// Narrow the time window (intersecting any existing one).
    #[must_use]
    pub fn within(mut self, window: TimeWindow) -> Self {
        self.window = Some(match self.window {
            Some(existing) => existing.intersect(window),
            None => window,
        });
        self
    }

    /// In-process evaluation, used by stores without a query language.
    #[must_use]
    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.window.is_none_or(|w| w.contains(record.timestamp))
            && self
                .conditions
                .iter()
                .all(|c| c.filter.matches(record.get(c.column)))
    }
}

/// Timestamp ordering of results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first.
    Asc,
    /// Newest first.
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("unknown sort order '{other}'")),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        })
    }
}

/// 1-indexed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Page number, starting at 1.
    pub page: u32,
    /// Records per page.
    pub page_size: u32,
}

impl Pagination {
    /// Rows to skip.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)).saturating_mul(u64::from(self.page_size))
    }

    /// Previous page number, if any.
    #[must_use]
    pub fn prev(&self) -> Option<u32> {
        self.page.checked_sub(1).filter(|p| *p >= 1)
    }

    /// Next page number, if more records exist beyond this page.
    #[must_use]
    pub fn next(&self, total: u64) -> Option<u32> {
        let shown = self.offset().saturating_add(u64::from(self.page_size));
        (shown < total).then(|| self.page.saturating_add(1))
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Fully typed search request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    /// Which records match.
    pub predicate: Predicate,
    /// Result ordering.
    pub sort: SortOrder,
    /// Which slice to return.
    pub pagination: Pagination,
}

/// Translate a raw filter map, resolving relative times against `now`.
///
/// # Errors
///
/// Returns [`AuditError::InvalidTimeLimit`] when `timelimit` is present but
/// malformed. Every other malformed entry is ignored.
pub fn translate(filters: &FilterMap, now: DateTime<Utc>) -> AuditResult<SearchQuery> {
    translate_with_page_size(filters, now, DEFAULT_PAGE_SIZE)
}

/// [`translate`] with a deployment-specific page size. It applies unless the
/// filters carry a valid `page_size` of their own.
///
/// # Errors
///
/// Same as [`translate`].
pub fn translate_with_page_size(
    filters: &FilterMap,
    now: DateTime<Utc>,
    default_page_size: u32,
) -> AuditResult<SearchQuery> {
    let mut query = SearchQuery::default();
    query.pagination.page_size = default_page_size.max(1);

    for (key, value) in filters {
        match key.as_str() {
            "page" => match positive_u32(value) {
                Some(page) => query.pagination.page = page,
                None => ignore(key, value),
            },
            "page_size" => match positive_u32(value) {
                Some(size) => query.pagination.page_size = size,
                None => ignore(key, value),
            },
            "sortorder" => match value.as_str().and_then(|s| s.parse().ok()) {
                Some(order) => query.sort = order,
                None => ignore(key, value),
            },
            "timelimit" => {
                if let Some(limit) = time_limit(value)? {
                    query.predicate = query.predicate.within(TimeWindow::relative(now, limit)?);
                }
            },
            _ => match column(key).and_then(|col| field_filter(col, value).map(|f| (col, f))) {
                Some((col, filter)) => query.predicate = query.predicate.and(col.name, filter),
                None => ignore(key, value),
            },
        }
    }
    Ok(query)
}

fn ignore(key: &str, value: &Value) {
    tracing::debug!(key, %value, "ignoring audit filter entry");
}

fn time_limit(value: &Value) -> AuditResult<Option<TimeDelta>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => parse_time_limit(s).map(Some),
        Value::Number(n) => n
            .as_i64()
            .and_then(TimeDelta::try_seconds)
            .map(Some)
            .ok_or_else(|| AuditError::InvalidTimeLimit {
                value: n.to_string(),
                reason: "expected whole seconds".into(),
            }),
        other => Err(AuditError::InvalidTimeLimit {
            value: other.to_string(),
            reason: "expected a duration string".into(),
        }),
    }
}

fn positive_u32(value: &Value) -> Option<u32> {
    let n = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    (n >= 1).then_some(n)
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn field_filter(column: &Column, value: &Value) -> Option<FieldFilter> {
    let exact = |v: FieldValue| Some(FieldFilter::Exact(v));
    match (column.kind, value) {
        (_, Value::String(s)) if s.is_empty() => None,
        (ColumnKind::Text, Value::String(s)) if s.contains('*') => {
            Some(FieldFilter::Wildcard(WildcardPattern::new(s.clone())))
        },
        (ColumnKind::Text, Value::String(s)) => exact(FieldValue::Text(s.clone())),
        (ColumnKind::Text, Value::Number(n)) => exact(FieldValue::Text(n.to_string())),
        (ColumnKind::Bool, Value::Bool(b)) => exact(FieldValue::Bool(*b)),
        (ColumnKind::Bool, Value::String(s)) => parse_flag(s).and_then(|b| exact(FieldValue::Bool(b))),
        (ColumnKind::Bool, Value::Number(n)) => match n.as_i64() {
            Some(0) => exact(FieldValue::Bool(false)),
            Some(1) => exact(FieldValue::Bool(true)),
            _ => None,
        },
        (ColumnKind::Int, Value::Number(n)) => n.as_i64().and_then(|n| exact(FieldValue::Int(n))),
        (ColumnKind::Int, Value::String(s)) => {
            s.trim().parse().ok().and_then(|n| exact(FieldValue::Int(n)))
        },
        _ => None,
    }
}
