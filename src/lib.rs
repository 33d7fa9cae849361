pub mod adapters;
pub mod config;
pub mod db;
pub mod errors;
pub mod invalidation;
pub mod logbook;
pub mod models;
pub mod mutation;
pub mod query;
pub mod tag_index;
pub mod validation;

pub use crate::config::{LogbookConfig, LogbookSettings};
pub use crate::errors::{AppError, AppResult};
pub use crate::invalidation::{InvalidationBus, InvalidationEvent, InvalidationSink, ViewKey};
pub use crate::logbook::FoodLog;
pub use crate::models::{ActionState, DraftRecord, FoodRecord, PhotoUpload, RecordDraftPatch, TagFilter};

use std::path::Path;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

const SAVED_MESSAGE: &str = "保存しました！";
const UPDATED_MESSAGE: &str = "更新しました";
const DELETED_MESSAGE: &str = "削除しました";

/// Sets up logging under the configured data directory and opens the
/// logbook with an invalidation bus that views can subscribe to. Call once
/// per process; the global subscriber can only be installed once.
pub fn open_logbook(config: &LogbookConfig) -> Result<(FoodLog, InvalidationBus), String> {
    init_tracing(&config.log_dir())?;
    let bus = InvalidationBus::new(config.settings.invalidation_capacity);
    let log = FoodLog::open(config, Arc::new(bus.clone())).map_err(to_client_error)?;
    Ok((log, bus))
}

pub fn food_records_search(log: &FoodLog, keyword: &str, tag: &str) -> Vec<FoodRecord> {
    log.search(keyword, &TagFilter::parse(tag))
}

/// `None` both for unknown ids and for lookups that failed; failures are logged.
pub fn food_record_get(log: &FoodLog, id: &str) -> Option<FoodRecord> {
    match log.get_by_id(id) {
        Ok(record) => record,
        Err(error) => {
            tracing::warn!(record_id = %id, error = %error, "record lookup failed; treating as not found");
            None
        }
    }
}

pub fn food_record_create(log: &FoodLog, draft: DraftRecord) -> ActionState {
    match log.create(draft) {
        Ok(record) => ActionState::success(SAVED_MESSAGE, Some(record.id)),
        Err(error) => ActionState::failure(save_failed(&error)),
    }
}

pub fn food_record_update(log: &FoodLog, id: &str, patch: RecordDraftPatch) -> ActionState {
    match log.update(id, patch) {
        Ok(record) => ActionState::success(UPDATED_MESSAGE, Some(record.id)),
        Err(error) => ActionState::failure(save_failed(&error)),
    }
}

pub fn food_record_delete(log: &FoodLog, id: &str) -> ActionState {
    match log.delete(id) {
        Ok(()) => ActionState::success(DELETED_MESSAGE, Some(id.to_string())),
        Err(error) => ActionState::failure(format!("削除に失敗しました：{}", error.reason())),
    }
}

pub fn food_tags_list(log: &FoodLog) -> Vec<String> {
    log.list_all_tags().into_iter().collect()
}

pub fn food_tag_filter_options(log: &FoodLog) -> Vec<String> {
    log.tag_filter_options()
}

fn save_failed(error: &AppError) -> String {
    format!("保存に失敗しました：{}", error.reason())
}

pub fn init_tracing(log_dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "logbook.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}

fn to_client_error(error: impl std::fmt::Display) -> String {
    error.to_string()
}

#[cfg(test)]
mod tests {
    use super::{food_record_create, food_record_delete, food_record_get, food_record_update, to_client_error};
    use crate::adapters::blob::FsBlobStore;
    use crate::adapters::memory::InMemoryRecordStore;
    use crate::config::LogbookSettings;
    use crate::errors::AppError;
    use crate::invalidation::NoopInvalidation;
    use crate::logbook::FoodLog;
    use crate::models::{DraftRecord, RecordDraftPatch};
    use std::sync::Arc;

    fn memory_log(dir: &std::path::Path) -> (FoodLog, Arc<InMemoryRecordStore>) {
        let store = Arc::new(InMemoryRecordStore::new());
        let blobs = Arc::new(FsBlobStore::new(dir, "/photos").expect("blobs"));
        let log = FoodLog::new(store.clone(), blobs, Arc::new(NoopInvalidation), LogbookSettings::default());
        (log, store)
    }

    #[test]
    fn write_commands_report_user_messages() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (log, _store) = memory_log(dir.path());

        let saved = food_record_create(
            &log,
            DraftRecord {
                title: "ラーメン".to_string(),
                date: "2024-04-01".to_string(),
                ..DraftRecord::default()
            },
        );
        assert!(saved.ok);
        assert_eq!(saved.message, "保存しました！");
        let id = saved.record_id.expect("record id");

        let updated = food_record_update(
            &log,
            &id,
            RecordDraftPatch {
                rating: Some(5),
                ..RecordDraftPatch::default()
            },
        );
        assert_eq!(updated.message, "更新しました");

        let deleted = food_record_delete(&log, &id);
        assert!(deleted.ok);
        assert_eq!(deleted.message, "削除しました");
    }

    #[test]
    fn failures_carry_reason_without_code() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (log, _store) = memory_log(dir.path());

        let rejected = food_record_create(&log, DraftRecord::default());
        assert!(!rejected.ok);
        assert!(rejected.message.starts_with("保存に失敗しました："));
        assert!(!rejected.message.contains("VALIDATION_FAILED"));
        assert!(rejected.record_id.is_none());
    }

    #[test]
    fn get_degrades_read_failures_to_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (log, store) = memory_log(dir.path());
        let created = log
            .create(DraftRecord {
                title: "x".to_string(),
                date: "2024-01-01".to_string(),
                ..DraftRecord::default()
            })
            .expect("create");

        assert!(food_record_get(&log, &created.id).is_some());
        store.set_fail_reads(true);
        assert!(food_record_get(&log, &created.id).is_none());
    }

    #[test]
    fn client_errors_keep_code_prefix() {
        assert_eq!(
            to_client_error(AppError::NotFound("food record 'x' does not exist".to_string())),
            "NOT_FOUND: food record 'x' does not exist"
        );
    }
}
