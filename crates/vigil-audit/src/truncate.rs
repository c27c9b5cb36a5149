//! Fitting field values into their column bounds.
//!
//! Text is measured and cut in characters, never bytes, so multi-byte
//! characters are never split. Non-text values pass through untouched. The
//! comma-separated policy list is shortened token-wise so that a reader can
//! still tell which names were cut: every shortened token ends in
//! [`TRUNCATION_MARKER`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::columns::{ColumnConstraints, POLICIES};
use crate::record::FieldValue;

/// Appended to a list token that had to be shortened.
pub const TRUNCATION_MARKER: char = '+';

const SEPARATOR: char = ',';

/// How the delimited policy list is brought under its bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListTruncation {
    /// Keep tokens in order while they fit; cut the first overflowing token
    /// to the remaining budget with a marker and drop the rest.
    #[default]
    Sequential,
    /// Repeatedly shorten the longest token by one character (marking it)
    /// until the list fits, keeping as many names as possible.
    ShrinkLongest,
}

/// Applies column bounds to pending record fields.
#[derive(Debug, Clone)]
pub struct Truncator {
    constraints: Arc<ColumnConstraints>,
    list_strategy: ListTruncation,
}

impl Truncator {
    /// Create a truncator over a shared constraints table.
    #[must_use]
    pub fn new(constraints: Arc<ColumnConstraints>, list_strategy: ListTruncation) -> Self {
        Self {
            constraints,
            list_strategy,
        }
    }

    /// The table this truncator enforces.
    #[must_use]
    pub fn constraints(&self) -> &ColumnConstraints {
        &self.constraints
    }

    /// Bring every bounded text field within its limit.
    #[must_use]
    pub fn truncate(&self, mut fields: BTreeMap<String, FieldValue>) -> BTreeMap<String, FieldValue> {
        for (name, value) in &mut fields {
            let FieldValue::Text(text) = value else {
                continue;
            };
            let shortened = if name == POLICIES {
                truncate_list(text, self.constraints.policies_bound(), self.list_strategy)
            } else if let Some(bound) = self.constraints.max_length(name) {
                truncate_chars(text, bound)
            } else {
                continue;
            };
            if let Some(shortened) = shortened {
                tracing::debug!(field = %name, bound = ?self.constraints.max_length(name), "truncated audit field");
                *text = shortened;
            }
        }
        fields
    }
}

impl Default for Truncator {
    fn default() -> Self {
        Self::new(Arc::new(ColumnConstraints::default()), ListTruncation::default())
    }
}

/// Hard right-cut to `max` characters. `None` when `text` already fits.
#[must_use]
pub fn truncate_chars(text: &str, max: usize) -> Option<String> {
    let (cut, _) = text.char_indices().nth(max)?;
    Some(text[..cut].to_string())
}

/// Shorten a comma-separated list to at most `max` characters.
/// `None` when `list` already fits.
#[must_use]
pub fn truncate_list(list: &str, max: usize, strategy: ListTruncation) -> Option<String> {
    if list.chars().count() <= max {
        return None;
    }
    Some(match strategy {
        ListTruncation::Sequential => fill_sequential(list, max),
        ListTruncation::ShrinkLongest => shrink_longest(list, max),
    })
}

fn fill_sequential(list: &str, max: usize) -> String {
    let mut out = String::new();
    let mut used = 0usize;

    for (i, token) in list.split(SEPARATOR).enumerate() {
        let sep = usize::from(i > 0);
        let len = token.chars().count();
        let needed = sep.saturating_add(len);
        let remaining = max.saturating_sub(used);

        if needed <= remaining {
            if sep == 1 {
                out.push(SEPARATOR);
            }
            out.push_str(token);
            used = used.saturating_add(needed);
            continue;
        }

        // Room left for the token body after its separator.
        let room = remaining.saturating_sub(sep);
        if room >= 1 {
            if sep == 1 {
                out.push(SEPARATOR);
            }
            out.extend(token.chars().take(room.saturating_sub(1)));
            out.push(TRUNCATION_MARKER);
        }
        break;
    }
    out
}

fn shrink_longest(list: &str, max: usize) -> String {
    let mut tokens: Vec<Vec<char>> = list.split(SEPARATOR).map(|t| t.chars().collect()).collect();
    let mut total = list.chars().count();

    while total > max {
        // Rev so that ties resolve to the first longest token.
        let Some((idx, longest)) = tokens
            .iter()
            .map(Vec::len)
            .enumerate()
            .rev()
            .max_by_key(|(_, len)| *len)
        else {
            break;
        };

        if longest <= 1 {
            // Nothing left to shorten; drop the tail token and its separator.
            if let Some(dropped) = tokens.pop() {
                let sep = usize::from(!tokens.is_empty());
                total = total.saturating_sub(dropped.len().saturating_add(sep));
            }
            continue;
        }

        let token = &mut tokens[idx];
        token.truncate(longest.saturating_sub(2));
        token.push(TRUNCATION_MARKER);
        total = total.saturating_sub(1);
    }

    tokens
        .iter()
        .map(|t| t.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(",")
}
