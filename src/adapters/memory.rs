use crate::adapters::RecordStore;
use crate::errors::{AppError, AppResult};
use crate::models::{FoodRecord, NewFoodRecord, RecordPatch};
use crate::query::Predicate;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredRecord {
    seq: u64,
    record: FoodRecord,
}

#[derive(Debug, Default)]
struct MemoryState {
    records: BTreeMap<String, StoredRecord>,
    next_seq: u64,
}

/// Deterministic in-memory record store used for tests and local workflows.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    state: Mutex<MemoryState>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Failure injection for writes (insert, update, delete).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Failure injection for reads (select by id, select all).
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|state| state.records.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_writes(&self) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Store("in-memory store rejected write".to_string()));
        }
        Ok(())
    }

    fn check_reads(&self) -> AppResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Store("in-memory store rejected read".to_string()));
        }
        Ok(())
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| AppError::poisoned("in-memory store"))
    }
}

impl RecordStore for InMemoryRecordStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn insert(&self, record: NewFoodRecord) -> AppResult<FoodRecord> {
        self.check_writes()?;
        let mut state = self.lock()?;
        let record = record.into_record(Uuid::new_v4().to_string());
        let seq = state.next_seq;
        state.next_seq += 1;
        state.records.insert(
            record.id.clone(),
            StoredRecord {
                seq,
                record: record.clone(),
            },
        );
        Ok(record)
    }

    fn update_by_id(&self, id: &str, patch: &RecordPatch) -> AppResult<Option<FoodRecord>> {
        self.check_writes()?;
        let mut state = self.lock()?;
        let Some(stored) = state.records.get_mut(id) else {
            return Ok(None);
        };
        patch.apply_to(&mut stored.record);
        Ok(Some(stored.record.clone()))
    }

    fn delete_by_id(&self, id: &str) -> AppResult<bool> {
        self.check_writes()?;
        let mut state = self.lock()?;
        Ok(state.records.remove(id).is_some())
    }

    fn select_by_id(&self, id: &str) -> AppResult<Option<FoodRecord>> {
        self.check_reads()?;
        let state = self.lock()?;
        Ok(state.records.get(id).map(|stored| stored.record.clone()))
    }

    fn select_all(&self, predicate: &Predicate) -> AppResult<Vec<FoodRecord>> {
        self.check_reads()?;
        let state = self.lock()?;
        let mut matched: Vec<&StoredRecord> = state
            .records
            .values()
            .filter(|stored| predicate.matches(&stored.record))
            .collect();
        matched.sort_by(|a, b| {
            b.record
                .created_at
                .cmp(&a.record.created_at)
                .then_with(|| b.seq.cmp(&a.seq))
        });
        Ok(matched.into_iter().map(|stored| stored.record.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryRecordStore;
    use crate::adapters::RecordStore;
    use crate::errors::AppError;
    use crate::models::{NewFoodRecord, RecordPatch};
    use crate::query::Predicate;
    use chrono::Utc;

    fn new_record(title: &str) -> NewFoodRecord {
        NewFoodRecord {
            title: title.to_string(),
            restaurant: Some("サイゼリヤ".to_string()),
            count: 1,
            date: "2024-01-01".to_string(),
            tags: vec!["イタリアン".to_string()],
            rating: 4,
            memo: None,
            image_url: None,
            address: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn patch_leaves_unsupplied_fields() {
        let store = InMemoryRecordStore::new();
        let created = store.insert(new_record("スパゲティ")).expect("insert");
        let updated = store
            .update_by_id(
                &created.id,
                &RecordPatch {
                    memo: Some(Some("x".to_string())),
                    ..RecordPatch::default()
                },
            )
            .expect("update")
            .expect("exists");
        assert_eq!(updated.memo.as_deref(), Some("x"));
        assert_eq!(updated.restaurant, created.restaurant);
        assert_eq!(updated.tags, created.tags);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[test]
    fn same_timestamp_orders_by_insertion() {
        let store = InMemoryRecordStore::new();
        let mut first = new_record("first");
        let mut second = new_record("second");
        let now = Utc::now();
        first.created_at = now;
        second.created_at = now;
        store.insert(first).expect("insert");
        store.insert(second).expect("insert");
        let records = store.select_all(&Predicate::Always).expect("select");
        assert_eq!(records[0].title, "second");
        assert_eq!(records[1].title, "first");
    }

    #[test]
    fn injected_failures_surface_as_store_errors() {
        let store = InMemoryRecordStore::new();
        store.set_fail_writes(true);
        assert!(matches!(store.insert(new_record("x")), Err(AppError::Store(_))));
        assert!(store.is_empty());
        store.set_fail_writes(false);
        store.set_fail_reads(true);
        assert!(matches!(store.select_all(&Predicate::Always), Err(AppError::Store(_))));
    }

    #[test]
    fn delete_reports_whether_anything_was_removed() {
        let store = InMemoryRecordStore::new();
        let created = store.insert(new_record("x")).expect("insert");
        assert!(store.delete_by_id(&created.id).expect("delete"));
        assert!(!store.delete_by_id(&created.id).expect("delete again"));
        assert_eq!(store.len(), 0);
    }
}
