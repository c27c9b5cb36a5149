//! Prelude module - commonly used types for convenient import.
//!
//! Use `use vigil_audit::prelude::*;` to import all essential types.
//!
//! # Example
//!
//! ```rust
//! use vigil_audit::prelude::*;
//!
//! let audit = Audit::in_memory();
//! audit.session().log_field("action", "login").finalize().unwrap();
//!
//! assert_eq!(audit.get_total(&FilterMap::new()).unwrap(), 1);
//! ```

// Errors
pub use crate::{AuditError, AuditResult};

// Facade and factory
pub use crate::{Audit, AuditBuilder, AuditSettings, BackendKind, get_audit};

// Write path
pub use crate::{AuditSession, ListTruncation};

// Records
pub use crate::{AuditEntryId, AuditRecord, FieldValue, SigCheck, VerifiedRecord};

// Read path
pub use crate::{AuditPage, FilterMap, IntegrityReport, SearchOptions, SortOrder};

// Storage
pub use crate::{AuditStore, MemoryAuditStore, SqliteAuditStore};
