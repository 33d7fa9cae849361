use crate::adapters::blob::FsBlobStore;
use crate::adapters::{BlobStore, RecordStore};
use crate::config::{LogbookConfig, LogbookSettings};
use crate::db::Database;
use crate::errors::AppResult;
use crate::invalidation::InvalidationSink;
use crate::models::{DraftRecord, FoodRecord, RecordDraftPatch, TagFilter};
use crate::mutation::{self, MutationContext};
use crate::query;
use crate::tag_index;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Food logbook with its record store, photo store and view invalidation
/// wired together.
#[derive(Clone)]
pub struct FoodLog {
    store: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    invalidation: Arc<dyn InvalidationSink>,
    settings: LogbookSettings,
}

impl FoodLog {
    pub fn new(
        store: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        invalidation: Arc<dyn InvalidationSink>,
        settings: LogbookSettings,
    ) -> Self {
        Self {
            store,
            blobs,
            invalidation,
            settings,
        }
    }

    /// SQLite records and filesystem photos under `config.data_dir`.
    pub fn open(config: &LogbookConfig, invalidation: Arc<dyn InvalidationSink>) -> AppResult<Self> {
        let store = Arc::new(Database::new(&config.db_path())?);
        let blobs = Arc::new(FsBlobStore::new(
            config.photo_dir(),
            config.settings.public_base_url.clone(),
        )?);
        tracing::info!(data_dir = %config.data_dir.display(), "food logbook opened");
        Ok(Self::new(store, blobs, invalidation, config.settings.clone()))
    }

    pub fn settings(&self) -> &LogbookSettings {
        &self.settings
    }

    pub fn search(&self, keyword: &str, tag: &TagFilter) -> Vec<FoodRecord> {
        query::search(self.store.as_ref(), keyword, tag)
    }

    pub fn list_all_tags(&self) -> BTreeSet<String> {
        tag_index::list_all_tags(self.store.as_ref())
    }

    pub fn tag_filter_options(&self) -> Vec<String> {
        tag_index::tag_filter_options(self.store.as_ref())
    }

    pub fn create(&self, draft: DraftRecord) -> AppResult<FoodRecord> {
        mutation::create(&self.context(), draft)
    }

    pub fn update(&self, id: &str, patch: RecordDraftPatch) -> AppResult<FoodRecord> {
        mutation::update(&self.context(), id, patch)
    }

    pub fn delete(&self, id: &str) -> AppResult<()> {
        mutation::delete(&self.context(), id)
    }

    pub fn get_by_id(&self, id: &str) -> AppResult<Option<FoodRecord>> {
        mutation::get_by_id(self.store.as_ref(), id)
    }

    fn context(&self) -> MutationContext<'_> {
        MutationContext {
            store: self.store.as_ref(),
            blobs: self.blobs.as_ref(),
            invalidation: self.invalidation.as_ref(),
            max_photo_bytes: self.settings.max_photo_bytes,
        }
    }
}
