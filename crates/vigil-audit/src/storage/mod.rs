//! Audit record stores.
//!
//! The facade depends only on [`AuditStore`]; backends are chosen at
//! construction time.

mod memory;
mod sqlite;

pub use memory::MemoryAuditStore;
pub use sqlite::SqliteAuditStore;

use chrono::{DateTime, Utc};

use crate::error::AuditResult;
use crate::filter::{Predicate, SortOrder};
use crate::record::AuditRecord;

/// A slice of an ordered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    /// Rows to skip.
    pub offset: u64,
    /// Maximum rows to return.
    pub limit: u32,
}

/// Position of a stored record in ascending `(timestamp, seq)` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScanCursor {
    /// Record timestamp.
    pub timestamp: DateTime<Utc>,
    /// Store-assigned insertion sequence, strictly increasing.
    pub seq: u64,
}

/// Forward scan request for streaming readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRange {
    /// Resume strictly after this position; `None` starts at the oldest.
    pub after: Option<ScanCursor>,
    /// Skip records whose sequence is above this mark.
    pub ceiling: u64,
    /// Maximum rows to return.
    pub limit: u32,
}

/// Storage backend for audit records.
///
/// Implementations must be thread-safe and provide:
/// - atomic single-record append
/// - consistent reads for `query` and `count`
/// - ordering by timestamp, ties broken by insertion order
pub trait AuditStore: Send + Sync {
    /// Persist one finalized record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be persisted. Nothing is
    /// stored in that case.
    fn append(&self, record: &AuditRecord) -> AuditResult<()>;

    /// Matching records in `order`, restricted to `range`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn query(
        &self,
        predicate: &Predicate,
        order: SortOrder,
        range: RowRange,
    ) -> AuditResult<Vec<AuditRecord>>;

    /// Number of matching records, without materializing them.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn count(&self, predicate: &Predicate) -> AuditResult<u64>;

    /// Highest sequence number assigned so far, 0 for a store that never
    /// held a record. Readers use it to pin the set of rows they visit.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn high_water(&self) -> AuditResult<u64>;

    /// Matching records oldest first, resuming after `range.after`, each
    /// with its cursor. Never revisits or skips a row between calls, however
    /// many rows are appended meanwhile.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn scan(
        &self,
        predicate: &Predicate,
        range: ScanRange,
    ) -> AuditResult<Vec<(ScanCursor, AuditRecord)>>;

    /// Remove every record.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn clear(&self) -> AuditResult<()>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}
