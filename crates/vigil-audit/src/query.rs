//! Result shapes returned by the query facade, and the streaming readers
//! behind CSV export and integrity checks.

use std::sync::Arc;

use chrono::TimeDelta;
use serde::Serialize;

use crate::columns::COLUMNS;
use crate::error::AuditResult;
use crate::filter::{Predicate, SortOrder};
use crate::record::{AuditEntryId, AuditRecord, SigCheck, VerifiedRecord, format_timestamp};
use crate::signer::Signer;
use crate::storage::{AuditStore, ScanCursor, ScanRange};

/// Records fetched per store round trip while streaming.
pub const EXPORT_BATCH_SIZE: u32 = 500;

/// Explicit search parameters. Each one that is set overrides the matching
/// filter-map key; `timelimit` narrows any window the filters already set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// 1-indexed page.
    pub page: Option<u32>,
    /// Records per page.
    pub page_size: Option<u32>,
    /// Timestamp ordering.
    pub sort: Option<SortOrder>,
    /// Relative window `[now - timelimit, now]`.
    pub timelimit: Option<TimeDelta>,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditPage {
    /// Records matching the filter, ignoring pagination.
    pub total: u64,
    /// This page's number.
    pub current: u32,
    /// Records per page.
    pub page_size: u32,
    /// Previous page, if any.
    pub prev: Option<u32>,
    /// Next page, if any.
    pub next: Option<u32>,
    /// The records on this page, with their signature status.
    pub items: Vec<VerifiedRecord>,
}

/// Signature status tally over a set of records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// Records whose signature verifies.
    pub ok: u64,
    /// Records whose signature does not verify.
    pub failed: u64,
    /// Records without a signature.
    pub unsigned: u64,
    /// Ids of the failed records.
    pub failed_ids: Vec<AuditEntryId>,
}

impl IntegrityReport {
    /// Records examined.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.ok
            .saturating_add(self.failed)
            .saturating_add(self.unsigned)
    }

    /// No record failed verification.
    #[must_use]
    pub fn is_intact(&self) -> bool {
        self.failed == 0
    }

    pub(crate) fn tally(&mut self, verified: &VerifiedRecord) {
        match verified.sig_check {
            SigCheck::Ok => self.ok = self.ok.saturating_add(1),
            SigCheck::Fail => {
                self.failed = self.failed.saturating_add(1);
                self.failed_ids.push(verified.record.id);
            },
            SigCheck::NotApplicable => self.unsigned = self.unsigned.saturating_add(1),
        }
    }
}

/// Lazily reads matching records oldest first, in batches, verifying each.
///
/// Only records already stored when the reader was created are visited, so
/// the iteration ends even while writers keep appending. Each batch resumes
/// after the last record seen instead of re-counting an offset. Stops after
/// the first store error, which it yields.
pub struct VerifiedRecords {
    store: Arc<dyn AuditStore>,
    signer: Signer,
    predicate: Predicate,
    batch_size: u32,
    ceiling: u64,
    cursor: Option<ScanCursor>,
    buffer: std::vec::IntoIter<(ScanCursor, AuditRecord)>,
    exhausted: bool,
}

impl VerifiedRecords {
    pub(crate) fn new(
        store: Arc<dyn AuditStore>,
        signer: Signer,
        predicate: Predicate,
        batch_size: u32,
    ) -> AuditResult<Self> {
        let ceiling = store.high_water()?;
        Ok(Self {
            store,
            signer,
            predicate,
            batch_size: batch_size.max(1),
            ceiling,
            cursor: None,
            buffer: Vec::new().into_iter(),
            exhausted: false,
        })
    }

    fn refill(&mut self) -> AuditResult<()> {
        let batch = self.store.scan(
            &self.predicate,
            ScanRange {
                after: self.cursor,
                ceiling: self.ceiling,
                limit: self.batch_size,
            },
        )?;
        let full = u32::try_from(batch.len()).is_ok_and(|n| n >= self.batch_size);
        self.exhausted = !full;
        if let Some((cursor, _)) = batch.last() {
            self.cursor = Some(*cursor);
        }
        self.buffer = batch.into_iter();
        Ok(())
    }
}

impl Iterator for VerifiedRecords {
    type Item = AuditResult<VerifiedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((_, record)) = self.buffer.next() {
                let sig_check = self.signer.check(&record);
                return Some(Ok(VerifiedRecord { record, sig_check }));
            }
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.refill() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
    }
}

/// Lazy CSV export: one line per record, no trailing newline.
///
/// Column order matches [`csv_header`].
pub struct CsvExport {
    records: VerifiedRecords,
}

impl CsvExport {
    pub(crate) fn new(records: VerifiedRecords) -> Self {
        Self { records }
    }
}

impl Iterator for CsvExport {
    type Item = AuditResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.records.next().map(|r| r.map(|v| csv_line(&v)))
    }
}

fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}

/// Header line naming the CSV export columns.
#[must_use]
pub fn csv_header() -> String {
    std::iter::once("id")
        .chain(std::iter::once("date"))
        .chain(COLUMNS.iter().map(|c| c.name))
        .chain(std::iter::once("sig_check"))
        .map(quote)
        .collect::<Vec<_>>()
        .join(",")
}

/// One CSV line for a verified record.
#[must_use]
pub fn csv_line(verified: &VerifiedRecord) -> String {
    let record = &verified.record;
    let mut cells = Vec::with_capacity(COLUMNS.len().saturating_add(3));
    cells.push(quote(&record.id.to_string()));
    cells.push(quote(&format_timestamp(&record.timestamp)));
    for col in COLUMNS {
        let value = record.get(col.name).map(ToString::to_string).unwrap_or_default();
        cells.push(quote(&value));
    }
    cells.push(quote(verified.sig_check.as_str()));
    cells.join(",")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::record::FieldValue;
    use crate::storage::MemoryAuditStore;

    fn store_with(n: usize) -> Arc<MemoryAuditStore> {
        let store = Arc::new(MemoryAuditStore::new());
        for i in 0..n {
            let mut fields = BTreeMap::new();
            fields.insert("serial".to_string(), FieldValue::from(format!("s{i}")));
            store.append(&AuditRecord::new(fields)).unwrap();
        }
        store
    }

    #[test]
    fn test_csv_quoting_and_order() {
        let mut fields = BTreeMap::new();
        fields.insert("info".to_string(), FieldValue::from("say \"hi\", nöäscii"));
        fields.insert("success".to_string(), FieldValue::from(false));
        let verified = VerifiedRecord {
            record: AuditRecord::new(fields),
            sig_check: SigCheck::NotApplicable,
        };

        let line = csv_line(&verified);
        assert!(line.contains("\"say \"\"hi\"\", nöäscii\""));
        assert!(line.contains("\"false\""));
        assert!(line.ends_with("\"N/A\""));
        assert!(!line.contains('\n'));

        let header = csv_header();
        assert!(header.starts_with("\"id\",\"date\",\"action\""));
        assert_eq!(header.split(',').count(), COLUMNS.len() + 3);
        assert_eq!(line.matches("\",\"").count(), COLUMNS.len() + 2);
    }

    #[test]
    fn test_verified_records_cross_batches() {
        let store = store_with(7);
        let records =
            VerifiedRecords::new(store, Signer::default(), Predicate::default(), 3).unwrap();

        let serials: Vec<String> = records
            .map(|r| r.unwrap().record.text("serial").unwrap().to_string())
            .collect();
        assert_eq!(serials.len(), 7);
        assert_eq!(serials.first().map(String::as_str), Some("s0"));
    }

    #[test]
    fn test_exact_batch_multiple_terminates() {
        let store = store_with(6);
        let records =
            VerifiedRecords::new(store, Signer::default(), Predicate::default(), 3).unwrap();
        assert_eq!(records.count(), 6);
    }

    #[test]
    fn test_records_appended_mid_stream_are_not_visited() {
        let store = store_with(7);
        let mut records =
            VerifiedRecords::new(store.clone(), Signer::default(), Predicate::default(), 3)
                .unwrap();
        let head: Vec<_> = records.by_ref().take(2).map(Result::unwrap).collect();
        assert_eq!(head.len(), 2);

        for i in 0..50 {
            let mut fields = BTreeMap::new();
            fields.insert("serial".to_string(), FieldValue::from(format!("late{i}")));
            store.append(&AuditRecord::new(fields)).unwrap();
        }

        let rest: Vec<String> = records
            .map(|r| r.unwrap().record.text("serial").unwrap().to_string())
            .collect();
        assert_eq!(rest.len(), 5);
        assert_eq!(rest.last().map(String::as_str), Some("s6"));
        assert!(rest.iter().all(|s| !s.starts_with("late")));
    }

    #[test]
    fn test_integrity_tally() {
        let mut report = IntegrityReport::default();
        let record = AuditRecord::new(BTreeMap::new());
        for sig_check in [SigCheck::Ok, SigCheck::Fail, SigCheck::NotApplicable, SigCheck::Ok] {
            report.tally(&VerifiedRecord {
                record: record.clone(),
                sig_check,
            });
        }
        assert_eq!(report.total(), 4);
        assert_eq!(report.ok, 2);
        assert_eq!(report.failed_ids, vec![record.id]);
        assert!(!report.is_intact());
    }
}
