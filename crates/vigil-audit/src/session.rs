//! Per-action record buffer.
//!
//! An [`AuditSession`] collects the fields of one logical action (a request,
//! a token operation) and turns them into one signed record on
//! [`finalize`](AuditSession::finalize). The buffer then starts over empty,
//! so a caller can keep one session for its lifetime and finalize once per
//! action.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::columns::POLICIES;
use crate::error::AuditResult;
use crate::record::{AuditEntryId, AuditRecord, FieldValue};
use crate::signer::Signer;
use crate::storage::AuditStore;
use crate::truncate::Truncator;

/// Anything that names one or more policies.
pub trait IntoPolicyNames {
    /// The names, in order.
    fn into_policy_names(self) -> Vec<String>;
}

impl IntoPolicyNames for &str {
    fn into_policy_names(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoPolicyNames for String {
    fn into_policy_names(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoPolicyNames for Vec<String> {
    fn into_policy_names(self) -> Vec<String> {
        self
    }
}

impl IntoPolicyNames for Vec<&str> {
    fn into_policy_names(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoPolicyNames for &[&str] {
    fn into_policy_names(self) -> Vec<String> {
        self.iter().map(|s| (*s).to_string()).collect()
    }
}

impl IntoPolicyNames for &[String] {
    fn into_policy_names(self) -> Vec<String> {
        self.to_vec()
    }
}

impl<const N: usize> IntoPolicyNames for [&str; N] {
    fn into_policy_names(self) -> Vec<String> {
        self.iter().map(|s| (*s).to_string()).collect()
    }
}

/// Mutable buffer for one logical action at a time.
///
/// Single owner; not shared between actions or threads.
pub struct AuditSession {
    store: Arc<dyn AuditStore>,
    signer: Signer,
    truncator: Truncator,
    pending: BTreeMap<String, FieldValue>,
    policies: Vec<String>,
}

impl AuditSession {
    /// Create an empty session writing to `store`.
    #[must_use]
    pub fn new(store: Arc<dyn AuditStore>, signer: Signer, truncator: Truncator) -> Self {
        Self {
            store,
            signer,
            truncator,
            pending: BTreeMap::new(),
            policies: Vec::new(),
        }
    }

    /// Merge fields into the pending record. Later values overwrite
    /// earlier ones; any key is accepted.
    pub fn log<I, K, V>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        for (key, value) in fields {
            self.pending.insert(key.into(), value.into());
        }
        self
    }

    /// Set a single pending field.
    pub fn log_field(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        self.pending.insert(key.into(), value.into());
        self
    }

    /// Append to existing pending values instead of replacing them.
    ///
    /// Absent (or null) fields are set as given. Present values are
    /// extended as text, joined by `separator` when one is given.
    pub fn add_to_log<I, K, V>(&mut self, fields: I, separator: Option<&str>) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        for (key, value) in fields {
            let value = value.into();
            let key = key.into();
            let merged = match self.pending.remove(&key) {
                None | Some(FieldValue::Null) => value,
                Some(existing) => {
                    let mut text = existing.to_string();
                    text.push_str(separator.unwrap_or_default());
                    text.push_str(&value.to_string());
                    FieldValue::Text(text)
                },
            };
            self.pending.insert(key, merged);
        }
        self
    }

    /// Append one policy name or an ordered list of them. Never
    /// deduplicates or reorders.
    pub fn add_policy(&mut self, policies: impl IntoPolicyNames) -> &mut Self {
        self.policies.extend(policies.into_policy_names());
        self
    }

    /// Pending fields (policies not yet joined in).
    #[must_use]
    pub fn pending(&self) -> &BTreeMap<String, FieldValue> {
        &self.pending
    }

    /// Pending policy names.
    #[must_use]
    pub fn pending_policies(&self) -> &[String] {
        &self.policies
    }

    /// Whether nothing has been logged since the last reset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.policies.is_empty()
    }

    /// Drop pending state without writing anything.
    pub fn discard(&mut self) {
        self.pending.clear();
        self.policies.clear();
    }

    /// Join policies, truncate, sign and persist the pending record, then
    /// reset the buffer.
    ///
    /// The buffer is reset even when the store fails: the aborted record
    /// is gone and the next action starts clean.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the append fails.
    pub fn finalize(&mut self) -> AuditResult<AuditEntryId> {
        let mut fields = std::mem::take(&mut self.pending);
        let policies = std::mem::take(&mut self.policies);
        if !policies.is_empty() {
            fields.insert(POLICIES.to_string(), FieldValue::Text(policies.join(",")));
        }

        let mut record = AuditRecord::new(self.truncator.truncate(fields));
        self.signer.sign(&mut record);

        match self.store.append(&record) {
            Ok(()) => {
                tracing::debug!(
                    record_id = %record.id,
                    fields = record.fields.len(),
                    signed = record.signature.is_some(),
                    backend = self.store.backend_name(),
                    "audit record written"
                );
                Ok(record.id)
            },
            Err(e) => {
                tracing::warn!(record_id = %record.id, error = %e, "audit record could not be written");
                Err(e)
            },
        }
    }
}

impl std::fmt::Debug for AuditSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditSession")
            .field("backend", &self.store.backend_name())
            .field("pending", &self.pending)
            .field("policies", &self.policies)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuditError;
    use crate::filter::{Predicate, SortOrder};
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::storage::{MemoryAuditStore, RowRange, ScanCursor, ScanRange};

    fn session_with(store: Arc<dyn AuditStore>) -> AuditSession {
        AuditSession::new(store, Signer::default(), Truncator::default())
    }

    fn stored(store: &MemoryAuditStore) -> Vec<AuditRecord> {
        store
            .query(
                &Predicate::default(),
                SortOrder::Asc,
                RowRange {
                    offset: 0,
                    limit: 100,
                },
            )
            .unwrap()
    }

    /// Store that rejects the first `failures` writes, then behaves like
    /// the wrapped memory store.
    struct FlakyStore {
        inner: MemoryAuditStore,
        failures: AtomicU32,
    }

    impl FlakyStore {
        fn failing(failures: u32) -> Self {
            Self {
                inner: MemoryAuditStore::new(),
                failures: AtomicU32::new(failures),
            }
        }
    }

    impl AuditStore for FlakyStore {
        fn append(&self, record: &AuditRecord) -> AuditResult<()> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining.saturating_sub(1), Ordering::SeqCst);
                return Err(AuditError::StorageError("disk full".into()));
            }
            self.inner.append(record)
        }
        fn query(&self, p: &Predicate, o: SortOrder, r: RowRange) -> AuditResult<Vec<AuditRecord>> {
            self.inner.query(p, o, r)
        }
        fn count(&self, p: &Predicate) -> AuditResult<u64> {
            self.inner.count(p)
        }
        fn high_water(&self) -> AuditResult<u64> {
            self.inner.high_water()
        }
        fn scan(&self, p: &Predicate, r: ScanRange) -> AuditResult<Vec<(ScanCursor, AuditRecord)>> {
            self.inner.scan(p, r)
        }
        fn clear(&self) -> AuditResult<()> {
            self.inner.clear()
        }
        fn backend_name(&self) -> &'static str {
            "flaky"
        }
    }

    #[test]
    fn test_log_merges_and_overwrites() {
        let mut session = session_with(Arc::new(MemoryAuditStore::new()));
        session.log([("user", "hans"), ("realm", "r1")]);
        session.log([("user", "willi")]);

        assert_eq!(session.pending()["user"], FieldValue::from("willi"));
        assert_eq!(session.pending()["realm"], FieldValue::from("r1"));
    }

    #[test]
    fn test_policies_accumulate_then_reset() {
        let store = Arc::new(MemoryAuditStore::new());
        let mut session = session_with(store.clone());

        session.add_policy(["rule1", "rule2"]).add_policy("rule3");
        session.log_field("action", "/validate/check");
        session.finalize().unwrap();

        session.add_policy(vec!["rule4".to_string(), "rule5".to_string()]);
        session.finalize().unwrap();

        let records = stored(&store);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text(POLICIES), Some("rule1,rule2,rule3"));
        assert_eq!(records[1].text(POLICIES), Some("rule4,rule5"));
        assert!(records[1].get("action").is_none());
    }

    #[test]
    fn test_no_policies_means_no_field() {
        let store = Arc::new(MemoryAuditStore::new());
        let mut session = session_with(store.clone());
        session.log_field("action", "x").finalize().unwrap();

        assert!(stored(&store)[0].get(POLICIES).is_none());
    }

    #[test]
    fn test_add_to_log_appends() {
        let mut session = session_with(Arc::new(MemoryAuditStore::new()));
        session.add_to_log([("info", "first")], None);
        session.add_to_log([("info", "second")], Some(","));
        session.add_to_log([("action_detail", "a")], Some(","));
        session.log_field("loglevel", 20);
        session.add_to_log([("loglevel", "!")], None);

        assert_eq!(session.pending()["info"], FieldValue::from("first,second"));
        assert_eq!(session.pending()["action_detail"], FieldValue::from("a"));
        assert_eq!(session.pending()["loglevel"], FieldValue::from("20!"));
    }

    #[test]
    fn test_finalize_truncates() {
        let store = Arc::new(MemoryAuditStore::new());
        let mut session = session_with(store.clone());
        session
            .log_field("serial", "S".repeat(100))
            .log_field("token_type", "T".repeat(30))
            .log_field("success", true)
            .finalize()
            .unwrap();

        let rec = &stored(&store)[0];
        assert_eq!(rec.text("serial").map(str::len), Some(40));
        assert_eq!(rec.text("token_type").map(str::len), Some(12));
        assert_eq!(rec.get("success"), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn test_store_failure_is_surfaced_and_buffer_reset() {
        let store = Arc::new(FlakyStore::failing(u32::MAX));
        let mut session = session_with(store);
        session.log_field("action", "x").add_policy("p");

        let err = session.finalize().unwrap_err();
        assert!(matches!(err, AuditError::StorageError(_)));
        assert!(session.is_empty());
    }

    #[test]
    fn test_failed_append_does_not_leak_into_next_record() {
        let store = Arc::new(FlakyStore::failing(1));
        let mut session = session_with(store.clone());

        session
            .log([("action", "/token/init"), ("serial", "lost")])
            .add_policy("rule1");
        assert!(session.finalize().is_err());

        session.log_field("action", "/validate/check").add_policy("rule2");
        let id = session.finalize().unwrap();

        let records = stored(&store.inner);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].text("action"), Some("/validate/check"));
        assert!(records[0].get("serial").is_none());
        assert_eq!(records[0].text(POLICIES), Some("rule2"));
    }

    #[test]
    fn test_discard() {
        let mut session = session_with(Arc::new(MemoryAuditStore::new()));
        session.log_field("action", "x").add_policy("p");
        assert!(!session.is_empty());
        session.discard();
        assert!(session.is_empty());
        assert!(session.pending_policies().is_empty());
    }
}
