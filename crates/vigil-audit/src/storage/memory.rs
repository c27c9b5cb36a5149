//! In-process store, mainly for tests and ephemeral deployments.

use std::sync::RwLock;

use crate::error::{AuditError, AuditResult};
use crate::filter::{Predicate, SortOrder};
use crate::record::AuditRecord;

use super::{AuditStore, RowRange, ScanCursor, ScanRange};

#[derive(Debug)]
struct StoredRow {
    seq: u64,
    record: AuditRecord,
}

impl StoredRow {
    fn cursor(&self) -> ScanCursor {
        ScanCursor {
            timestamp: self.record.timestamp,
            seq: self.seq,
        }
    }
}

/// Rows kept sorted by `(timestamp, seq)`.
#[derive(Debug, Default)]
struct Rows {
    rows: Vec<StoredRow>,
    last_seq: u64,
}

impl Rows {
    fn insert(&mut self, row: StoredRow) {
        let at = row.cursor();
        let pos = self.rows.partition_point(|r| r.cursor() < at);
        self.rows.insert(pos, row);
    }

    /// Index of the first row after `cursor`.
    fn start_after(&self, cursor: Option<ScanCursor>) -> usize {
        cursor.map_or(0, |c| self.rows.partition_point(|r| r.cursor() <= c))
    }
}

/// Records kept in memory, ordered by timestamp and insertion.
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    inner: RwLock<Rows>,
}

impl MemoryAuditStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a stored record by id. Returns whether one was found.
    ///
    /// Bypasses signing entirely; useful to simulate tampering.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn overwrite(&self, record: AuditRecord) -> AuditResult<bool> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        let Some(pos) = inner.rows.iter().position(|r| r.record.id == record.id) else {
            return Ok(false);
        };
        let old = inner.rows.remove(pos);
        inner.insert(StoredRow {
            seq: old.seq,
            record,
        });
        Ok(true)
    }
}

fn poisoned<T>(_: T) -> AuditError {
    AuditError::StorageError("audit store lock poisoned".into())
}

fn to_usize<N: TryInto<usize>>(n: N) -> usize {
    n.try_into().unwrap_or(usize::MAX)
}

impl AuditStore for MemoryAuditStore {
    fn append(&self, record: &AuditRecord) -> AuditResult<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        let seq = inner.last_seq.saturating_add(1);
        inner.last_seq = seq;
        inner.insert(StoredRow {
            seq,
            record: record.clone(),
        });
        Ok(())
    }

    fn query(
        &self,
        predicate: &Predicate,
        order: SortOrder,
        range: RowRange,
    ) -> AuditResult<Vec<AuditRecord>> {
        let inner = self.inner.read().map_err(poisoned)?;
        let matching = inner.rows.iter().filter(|r| predicate.matches(&r.record));
        let (skip, take) = (to_usize(range.offset), to_usize(range.limit));
        let page = match order {
            SortOrder::Asc => matching.skip(skip).take(take).map(|r| r.record.clone()).collect(),
            SortOrder::Desc => matching
                .rev()
                .skip(skip)
                .take(take)
                .map(|r| r.record.clone())
                .collect(),
        };
        Ok(page)
    }

    fn count(&self, predicate: &Predicate) -> AuditResult<u64> {
        let inner = self.inner.read().map_err(poisoned)?;
        let n = inner.rows.iter().filter(|r| predicate.matches(&r.record)).count();
        Ok(u64::try_from(n).unwrap_or(u64::MAX))
    }

    fn high_water(&self) -> AuditResult<u64> {
        Ok(self.inner.read().map_err(poisoned)?.last_seq)
    }

    fn scan(
        &self,
        predicate: &Predicate,
        range: ScanRange,
    ) -> AuditResult<Vec<(ScanCursor, AuditRecord)>> {
        let inner = self.inner.read().map_err(poisoned)?;
        let start = inner.start_after(range.after);
        Ok(inner
            .rows
            .get(start..)
            .unwrap_or_default()
            .iter()
            .filter(|r| r.seq <= range.ceiling && predicate.matches(&r.record))
            .take(to_usize(range.limit))
            .map(|r| (r.cursor(), r.record.clone()))
            .collect())
    }

    fn clear(&self) -> AuditResult<()> {
        // Sequence numbers keep increasing so open scans never see new rows.
        self.inner.write().map_err(poisoned)?.rows.clear();
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{TimeDelta, Utc};

    use super::*;
    use crate::filter::{FieldFilter, TimeWindow};
    use crate::record::FieldValue;

    fn record_at(serial: &str, minutes_ago: i64) -> AuditRecord {
        let mut fields = BTreeMap::new();
        fields.insert("serial".to_string(), FieldValue::from(serial));
        AuditRecord::new(fields).with_timestamp(Utc::now() - TimeDelta::minutes(minutes_ago))
    }

    fn all() -> RowRange {
        RowRange {
            offset: 0,
            limit: u32::MAX,
        }
    }

    #[test]
    fn test_query_orders_by_timestamp() {
        let store = MemoryAuditStore::new();
        store.append(&record_at("middle", 5)).unwrap();
        store.append(&record_at("newest", 1)).unwrap();
        store.append(&record_at("oldest", 10)).unwrap();

        let serials = |order| {
            store
                .query(&Predicate::default(), order, all())
                .unwrap()
                .iter()
                .map(|r| r.text("serial").unwrap().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(serials(SortOrder::Asc), ["oldest", "middle", "newest"]);
        assert_eq!(serials(SortOrder::Desc), ["newest", "middle", "oldest"]);
    }

    #[test]
    fn test_query_pages_and_counts() {
        let store = MemoryAuditStore::new();
        for i in 0..5 {
            store.append(&record_at(&format!("s{i}"), 10 - i)).unwrap();
        }
        let page = store
            .query(&Predicate::default(), SortOrder::Asc, RowRange { offset: 3, limit: 10 })
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].text("serial"), Some("s3"));

        let beyond = store
            .query(&Predicate::default(), SortOrder::Asc, RowRange { offset: 50, limit: 10 })
            .unwrap();
        assert!(beyond.is_empty());
        assert_eq!(store.count(&Predicate::default()).unwrap(), 5);
    }

    #[test]
    fn test_count_with_predicate_and_window() {
        let store = MemoryAuditStore::new();
        store.append(&record_at("a", 120)).unwrap();
        store.append(&record_at("a", 1)).unwrap();
        store.append(&record_at("b", 1)).unwrap();

        let only_a = Predicate::default().and("serial", FieldFilter::Exact("a".into()));
        assert_eq!(store.count(&only_a).unwrap(), 2);

        let recent_a = only_a.within(TimeWindow::relative(Utc::now(), TimeDelta::hours(1)).unwrap());
        assert_eq!(store.count(&recent_a).unwrap(), 1);
    }

    #[test]
    fn test_clear_and_overwrite() {
        let store = MemoryAuditStore::new();
        let mut rec = record_at("a", 0);
        store.append(&rec).unwrap();

        rec.fields.insert("serial".into(), "b".into());
        assert!(store.overwrite(rec).unwrap());
        assert!(!store.overwrite(record_at("zzz", 0)).unwrap());

        let stored = store.query(&Predicate::default(), SortOrder::Asc, all()).unwrap();
        assert_eq!(stored[0].text("serial"), Some("b"));

        store.clear().unwrap();
        assert_eq!(store.count(&Predicate::default()).unwrap(), 0);
        assert_eq!(store.high_water().unwrap(), 1);
    }

    #[test]
    fn test_overwrite_with_new_timestamp_keeps_order() {
        let store = MemoryAuditStore::new();
        let first = record_at("first", 10);
        store.append(&first).unwrap();
        store.append(&record_at("second", 5)).unwrap();

        let moved = first.with_timestamp(Utc::now());
        assert!(store.overwrite(moved).unwrap());

        let serials: Vec<String> = store
            .query(&Predicate::default(), SortOrder::Asc, all())
            .unwrap()
            .iter()
            .map(|r| r.text("serial").unwrap().to_string())
            .collect();
        assert_eq!(serials, ["second", "first"]);
    }

    #[test]
    fn test_scan_resumes_after_cursor_in_time_order() {
        let store = MemoryAuditStore::new();
        for (serial, minutes) in [("c", 1), ("a", 30), ("b", 20), ("b2", 20), ("d", 0)] {
            store.append(&record_at(serial, minutes)).unwrap();
        }
        let ceiling = store.high_water().unwrap();
        assert_eq!(ceiling, 5);

        let mut after = None;
        let mut seen = Vec::new();
        loop {
            let batch = store
                .scan(&Predicate::default(), ScanRange { after, ceiling, limit: 2 })
                .unwrap();
            if batch.is_empty() {
                break;
            }
            after = batch.last().map(|(c, _)| *c);
            seen.extend(batch.iter().map(|(_, r)| r.text("serial").unwrap().to_string()));
        }
        assert_eq!(seen, ["a", "b", "b2", "c", "d"]);
    }

    #[test]
    fn test_scan_ignores_rows_above_ceiling() {
        let store = MemoryAuditStore::new();
        store.append(&record_at("old", 5)).unwrap();
        let ceiling = store.high_water().unwrap();
        store.append(&record_at("older but later", 10)).unwrap();
        store.append(&record_at("new", 0)).unwrap();

        let batch = store
            .scan(
                &Predicate::default(),
                ScanRange {
                    after: None,
                    ceiling,
                    limit: 10,
                },
            )
            .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].1.text("serial"), Some("old"));
        assert_eq!(batch[0].0.seq, 1);
    }
}
