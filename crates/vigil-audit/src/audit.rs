//! The audit facade: hands out sessions on the write path and answers
//! searches, counts and exports on the read path.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use vigil_crypto::{KeyPair, PublicKey};

use crate::columns::ColumnConstraints;
use crate::error::{AuditError, AuditResult};
use crate::filter::{
    DEFAULT_PAGE_SIZE, FieldFilter, FilterMap, SearchQuery, TimeWindow, translate_with_page_size,
};
use crate::query::{
    AuditPage, CsvExport, EXPORT_BATCH_SIZE, IntegrityReport, SearchOptions, VerifiedRecords,
};
use crate::record::{AuditRecord, FieldValue, SigCheck, VerifiedRecord};
use crate::session::AuditSession;
use crate::signer::Signer;
use crate::storage::{AuditStore, MemoryAuditStore, RowRange};
use crate::truncate::{ListTruncation, Truncator};

/// Shared entry point to one audit trail.
///
/// Cheap to clone; clones share the store and key material.
#[derive(Clone)]
pub struct Audit {
    store: Arc<dyn AuditStore>,
    signer: Signer,
    truncator: Truncator,
    page_size: u32,
}

impl Audit {
    /// Start building an audit over `store`.
    #[must_use]
    pub fn builder(store: Arc<dyn AuditStore>) -> AuditBuilder {
        AuditBuilder::new(store)
    }

    /// Unsigned, in-memory audit.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::builder(Arc::new(MemoryAuditStore::new())).build()
    }

    /// A fresh, empty session writing to this audit's store.
    #[must_use]
    pub fn session(&self) -> AuditSession {
        AuditSession::new(
            Arc::clone(&self.store),
            self.signer.clone(),
            self.truncator.clone(),
        )
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn AuditStore> {
        &self.store
    }

    /// Key material used for signing and verification.
    #[must_use]
    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// Signature status of a record.
    #[must_use]
    pub fn check(&self, record: &AuditRecord) -> SigCheck {
        self.signer.check(record)
    }

    fn translate(&self, filters: &FilterMap, now: DateTime<Utc>) -> AuditResult<SearchQuery> {
        translate_with_page_size(filters, now, self.page_size)
    }

    /// One page of matching records plus the total match count.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed `timelimit` or a store failure.
    pub fn search(&self, filters: &FilterMap, options: &SearchOptions) -> AuditResult<AuditPage> {
        self.search_at(filters, options, Utc::now())
    }

    /// [`search`](Self::search) with an explicit reference time.
    ///
    /// # Errors
    ///
    /// Same as [`search`](Self::search).
    pub fn search_at(
        &self,
        filters: &FilterMap,
        options: &SearchOptions,
        now: DateTime<Utc>,
    ) -> AuditResult<AuditPage> {
        let mut query = self.translate(filters, now)?;
        if let Some(page) = options.page.filter(|p| *p >= 1) {
            query.pagination.page = page;
        }
        if let Some(size) = options.page_size.filter(|s| *s >= 1) {
            query.pagination.page_size = size;
        }
        if let Some(sort) = options.sort {
            query.sort = sort;
        }
        if let Some(limit) = options.timelimit {
            query.predicate = query.predicate.within(TimeWindow::relative(now, limit)?);
        }

        let total = self.store.count(&query.predicate)?;
        let records = self.store.query(
            &query.predicate,
            query.sort,
            RowRange {
                offset: query.pagination.offset(),
                limit: query.pagination.page_size,
            },
        )?;
        let items = records
            .into_iter()
            .map(|record| {
                let sig_check = self.signer.check(&record);
                VerifiedRecord { record, sig_check }
            })
            .collect();

        Ok(AuditPage {
            total,
            current: query.pagination.page,
            page_size: query.pagination.page_size,
            prev: query.pagination.prev(),
            next: query.pagination.next(total),
            items,
        })
    }

    /// Number of matching records. Pagination keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed `timelimit` or a store failure.
    pub fn get_total(&self, filters: &FilterMap) -> AuditResult<u64> {
        let query = self.translate(filters, Utc::now())?;
        self.store.count(&query.predicate)
    }

    /// Number of matching records, further restricted to an exact `success`
    /// value and to the last `time_delta` when given.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed `timelimit` or a store failure.
    pub fn get_count(
        &self,
        filters: &FilterMap,
        success: Option<bool>,
        time_delta: Option<TimeDelta>,
    ) -> AuditResult<u64> {
        self.get_count_at(filters, success, time_delta, Utc::now())
    }

    /// [`get_count`](Self::get_count) with an explicit reference time.
    ///
    /// # Errors
    ///
    /// Same as [`get_count`](Self::get_count).
    pub fn get_count_at(
        &self,
        filters: &FilterMap,
        success: Option<bool>,
        time_delta: Option<TimeDelta>,
        now: DateTime<Utc>,
    ) -> AuditResult<u64> {
        let mut predicate = self.translate(filters, now)?.predicate;
        if let Some(success) = success {
            predicate = predicate.and("success", FieldFilter::Exact(FieldValue::Bool(success)));
        }
        if let Some(delta) = time_delta {
            predicate = predicate.within(TimeWindow::relative(now, delta)?);
        }
        self.store.count(&predicate)
    }

    /// Stream every matching record, oldest first, with its signature
    /// status.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed `timelimit` or when the store cannot
    /// report its current size. Later store failures are yielded by the
    /// iterator.
    pub fn records(&self, filters: &FilterMap) -> AuditResult<VerifiedRecords> {
        let query = self.translate(filters, Utc::now())?;
        VerifiedRecords::new(
            Arc::clone(&self.store),
            self.signer.clone(),
            query.predicate,
            EXPORT_BATCH_SIZE,
        )
    }

    /// Lazy CSV export of every matching record, oldest first.
    ///
    /// # Errors
    ///
    /// Same as [`records`](Self::records).
    pub fn csv_export(&self, filters: &FilterMap) -> AuditResult<CsvExport> {
        self.records(filters).map(CsvExport::new)
    }

    /// Verify every matching record and tally the results.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed `timelimit` or a store failure.
    pub fn integrity_report(&self, filters: &FilterMap) -> AuditResult<IntegrityReport> {
        let mut report = IntegrityReport::default();
        for verified in self.records(filters)? {
            report.tally(&verified?);
        }
        if !report.is_intact() {
            tracing::warn!(failed = report.failed, "audit records failed signature verification");
        }
        Ok(report)
    }

    /// Delete every record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn clear(&self) -> AuditResult<()> {
        tracing::info!(backend = self.store.backend_name(), "clearing audit store");
        self.store.clear()
    }
}

impl std::fmt::Debug for Audit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Audit")
            .field("backend", &self.store.backend_name())
            .field("signer", &self.signer)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Audit`].
pub struct AuditBuilder {
    store: Arc<dyn AuditStore>,
    signing_key: Option<KeyPair>,
    verifying_key: Option<PublicKey>,
    constraints: ColumnConstraints,
    list_truncation: ListTruncation,
    page_size: u32,
}

impl AuditBuilder {
    fn new(store: Arc<dyn AuditStore>) -> Self {
        Self {
            store,
            signing_key: None,
            verifying_key: None,
            constraints: ColumnConstraints::default(),
            list_truncation: ListTruncation::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sign records written through this audit.
    #[must_use]
    pub fn signing_key(mut self, key: KeyPair) -> Self {
        self.signing_key = Some(key);
        self
    }

    /// Verify with this key instead of the signing key's public half.
    #[must_use]
    pub fn verifying_key(mut self, key: PublicKey) -> Self {
        self.verifying_key = Some(key);
        self
    }

    /// Column bounds to enforce.
    #[must_use]
    pub fn constraints(mut self, constraints: ColumnConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Strategy for the policy list.
    #[must_use]
    pub fn list_truncation(mut self, strategy: ListTruncation) -> Self {
        self.list_truncation = strategy;
        self
    }

    /// Page size used when a search does not ask for one.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidSettings`] for zero.
    pub fn page_size(mut self, page_size: u32) -> AuditResult<Self> {
        if page_size == 0 {
            return Err(AuditError::InvalidSettings(
                "page size must be at least 1".into(),
            ));
        }
        self.page_size = page_size;
        Ok(self)
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> Audit {
        if let (Some(private), Some(public)) = (&self.signing_key, &self.verifying_key) {
            if private.export_public_key() != *public {
                tracing::warn!(
                    signing_key = %private.key_id_hex(),
                    verifying_key = %public.key_id_hex(),
                    "audit verifying key does not match signing key; new records will not verify"
                );
            }
        }
        Audit {
            store: self.store,
            signer: Signer::new(self.signing_key.map(Arc::new), self.verifying_key),
            truncator: Truncator::new(Arc::new(self.constraints), self.list_truncation),
            page_size: self.page_size,
        }
    }
}
