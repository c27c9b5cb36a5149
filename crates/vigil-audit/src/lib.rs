//! Vigil Audit - Tamper-evident, searchable audit records.
//!
//! This crate provides:
//! - A per-action record buffer with cumulative field and policy appends
//! - Column bounds enforced in characters, with marker-preserving
//!   truncation of the comma-separated policy list
//! - Ed25519 signatures over a canonical record encoding, checked on read
//! - A filter language (exact, `*` wildcard, relative time window,
//!   pagination, sort order) translated into typed store queries
//! - Memory and `SQLite` stores behind one trait
//!
//! # Security Model
//!
//! Every finalized record is signed by the writer's private key. Readers
//! recompute the canonical bytes and report a per-record status: `OK`,
//! `FAIL` (tampered or unverifiable) or `N/A` (never signed). Verification
//! failures never abort a query.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use vigil_audit::{Audit, FilterMap, MemoryAuditStore, SearchOptions, SigCheck};
//! use vigil_crypto::KeyPair;
//!
//! let audit = Audit::builder(Arc::new(MemoryAuditStore::new()))
//!     .signing_key(KeyPair::generate())
//!     .build();
//!
//! let mut session = audit.session();
//! session
//!     .log([("action", "POST /token/init"), ("serial", "OATH0001")])
//!     .log_field("success", true)
//!     .add_policy(["otp-length", "hotp-default"]);
//! session.finalize().unwrap();
//!
//! let mut filters = FilterMap::new();
//! filters.insert("serial".into(), "OATH*".into());
//! let page = audit.search(&filters, &SearchOptions::default()).unwrap();
//!
//! assert_eq!(page.total, 1);
//! assert_eq!(page.items[0].sig_check, SigCheck::Ok);
//! assert_eq!(page.items[0].record.text("policies"), Some("otp-length,hotp-default"));
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod audit;
mod columns;
mod error;
mod factory;
mod filter;
mod query;
mod record;
mod session;
mod signer;
mod storage;
mod truncate;

pub use audit::{Audit, AuditBuilder};
pub use columns::{
    COLUMNS, Column, ColumnConstraints, ColumnKind, POLICIES, POLICIES_MAX_LEN, available_columns,
    column,
};
pub use error::{AuditError, AuditResult};
pub use factory::{AuditSettings, BackendKind, SearchSummary, get_audit, search};
pub use filter::{
    Condition, DEFAULT_PAGE_SIZE, FieldFilter, FilterMap, Pagination, Predicate, SearchQuery,
    SortOrder, TimeWindow, WildcardPattern, parse_time_limit, translate, translate_with_page_size,
};
pub use query::{
    AuditPage, CsvExport, EXPORT_BATCH_SIZE, IntegrityReport, SearchOptions, VerifiedRecords,
    csv_header, csv_line,
};
pub use record::{AuditEntryId, AuditRecord, FieldValue, SigCheck, VerifiedRecord, format_timestamp};
pub use session::{AuditSession, IntoPolicyNames};
pub use signer::{Signer, canonical_bytes, sign_record, verify_record};
pub use storage::{
    AuditStore, MemoryAuditStore, RowRange, ScanCursor, ScanRange, SqliteAuditStore,
};
pub use truncate::{ListTruncation, TRUNCATION_MARKER, Truncator, truncate_chars, truncate_list};
