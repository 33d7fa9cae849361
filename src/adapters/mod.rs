pub mod blob;
pub mod memory;

use crate::errors::AppResult;
use crate::models::{FoodRecord, NewFoodRecord, RecordPatch};
use crate::query::Predicate;

/// Persistence contract for food records.
///
/// Implementations assign ids on insert, patch only the fields present in a
/// [`RecordPatch`], and return `select_all` results newest first (insertion
/// order breaks ties).
pub trait RecordStore: Send + Sync {
    fn backend_name(&self) -> &'static str;
    fn insert(&self, record: NewFoodRecord) -> AppResult<FoodRecord>;
    /// `Ok(None)` when no record has `id`.
    fn update_by_id(&self, id: &str, patch: &RecordPatch) -> AppResult<Option<FoodRecord>>;
    /// `Ok(false)` when there was nothing to delete.
    fn delete_by_id(&self, id: &str) -> AppResult<bool>;
    fn select_by_id(&self, id: &str) -> AppResult<Option<FoodRecord>>;
    fn select_all(&self, predicate: &Predicate) -> AppResult<Vec<FoodRecord>>;
}

/// Write-once photo storage that hands back a public URL.
pub trait BlobStore: Send + Sync {
    /// Fails when `path` is already taken; existing blobs are never replaced.
    fn upload(&self, bytes: &[u8], path: &str, content_type: &str) -> AppResult<String>;
}
