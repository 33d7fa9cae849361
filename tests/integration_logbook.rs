use food_logbook_lib::adapters::blob::FsBlobStore;
use food_logbook_lib::adapters::memory::InMemoryRecordStore;
use food_logbook_lib::adapters::RecordStore;
use food_logbook_lib::db::Database;
use food_logbook_lib::invalidation::{MutationKind, NoopInvalidation};
use food_logbook_lib::models::CountInput;
use food_logbook_lib::{
    food_record_get, food_records_search, food_tag_filter_options, AppError, DraftRecord, FoodLog, FoodRecord,
    InvalidationBus, LogbookSettings, PhotoUpload, RecordDraftPatch, TagFilter, ViewKey,
};
use std::path::Path;
use std::sync::Arc;

fn sqlite_log(dir: &Path) -> FoodLog {
    let store = Arc::new(Database::new(&dir.join("test.db")).expect("db"));
    with_store(dir, store)
}

fn memory_log(dir: &Path) -> FoodLog {
    with_store(dir, Arc::new(InMemoryRecordStore::new()))
}

fn with_store(dir: &Path, store: Arc<dyn RecordStore>) -> FoodLog {
    let blobs = Arc::new(FsBlobStore::new(dir.join("photos"), "/photos").expect("blobs"));
    FoodLog::new(store, blobs, Arc::new(NoopInvalidation), LogbookSettings::default())
}

fn draft(title: &str, tags: &str, rating: i64, memo: &str) -> DraftRecord {
    DraftRecord {
        title: title.to_string(),
        date: "2024-01-01".to_string(),
        tags: Some(tags.into()),
        rating: Some(rating),
        memo: Some(memo.to_string()),
        ..DraftRecord::default()
    }
}

fn ids(records: &[FoodRecord]) -> Vec<&str> {
    records.iter().map(|record| record.id.as_str()).collect()
}

fn check_search_scenarios(log: &FoodLog) {
    let a = log
        .create(draft("スパゲティ", "イタリアン,スパゲティ", 4, "美味しかった"))
        .expect("create a");
    let b = log
        .create(draft("鰻重", "和食, うなぎ", 3, "とても美味しかった"))
        .expect("create b");

    assert_eq!(ids(&log.search("うなぎ", &TagFilter::All)), vec![b.id.as_str()]);
    assert_eq!(ids(&log.search("", &TagFilter::parse("イタリアン"))), vec![a.id.as_str()]);
    assert_eq!(ids(&log.search("美味", &TagFilter::All)), vec![b.id.as_str(), a.id.as_str()]);
    assert_eq!(ids(&log.search("", &TagFilter::All)), vec![b.id.as_str(), a.id.as_str()]);
    assert!(log.search("", &TagFilter::parse("和")).is_empty());
    assert!(log.search("うなぎ", &TagFilter::parse("イタリアン")).is_empty());

    let from_command = food_records_search(log, "スパゲ", "すべて");
    assert_eq!(ids(&from_command), vec![a.id.as_str()]);
    assert_eq!(
        food_tag_filter_options(log),
        vec!["すべて", "うなぎ", "イタリアン", "スパゲティ", "和食"]
    );
}

fn check_mutation_laws(log: &FoodLog) {
    let mut payload = draft("鰻重", "和食", 3, "美味しかった\nまた来たい");
    payload.restaurant = Some("うな富".to_string());
    payload.address = Some("東京都千代田区".to_string());
    let created = log.create(payload).expect("create");

    let loaded = food_record_get(log, &created.id).expect("record exists");
    assert_eq!(loaded, created);
    assert_eq!(loaded.title, "鰻重");
    assert_eq!(loaded.restaurant.as_deref(), Some("うな富"));
    assert_eq!(loaded.count, 1);
    assert_eq!(loaded.tags, vec!["和食".to_string()]);
    assert_eq!(loaded.memo_lines(), vec!["美味しかった", "また来たい"]);

    let updated = log
        .update(
            &created.id,
            RecordDraftPatch {
                memo: Some(Some("x".to_string())),
                ..RecordDraftPatch::default()
            },
        )
        .expect("update");
    let mut expected = created.clone();
    expected.memo = Some("x".to_string());
    assert_eq!(updated, expected);
    assert_eq!(food_record_get(log, &created.id), Some(expected));

    log.delete(&created.id).expect("delete");
    log.delete(&created.id).expect("second delete");
    assert!(food_record_get(log, &created.id).is_none());

    let missing = log.update(
        &created.id,
        RecordDraftPatch {
            rating: Some(1),
            ..RecordDraftPatch::default()
        },
    );
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

fn check_validation(log: &FoodLog) {
    let empty_title = log.create(draft("", "", 0, ""));
    assert!(matches!(empty_title, Err(AppError::Validation(_))));

    let mut zero_count = draft("x", "", 0, "");
    zero_count.count = Some(CountInput::Number(0));
    assert!(matches!(log.create(zero_count), Err(AppError::Validation(_))));

    let mut bad_date = draft("x", "", 0, "");
    bad_date.date = "2024/01/01".to_string();
    assert!(matches!(log.create(bad_date), Err(AppError::Validation(_))));

    assert!(log.search("", &TagFilter::All).is_empty());
}

#[test]
fn sqlite_store_satisfies_search_scenarios() {
    let dir = tempfile::tempdir().expect("tempdir");
    check_search_scenarios(&sqlite_log(dir.path()));
}

#[test]
fn memory_store_satisfies_search_scenarios() {
    let dir = tempfile::tempdir().expect("tempdir");
    check_search_scenarios(&memory_log(dir.path()));
}

#[test]
fn sqlite_store_satisfies_mutation_laws() {
    let dir = tempfile::tempdir().expect("tempdir");
    check_mutation_laws(&sqlite_log(dir.path()));
}

#[test]
fn memory_store_satisfies_mutation_laws() {
    let dir = tempfile::tempdir().expect("tempdir");
    check_mutation_laws(&memory_log(dir.path()));
}

#[test]
fn invalid_drafts_are_rejected_by_both_stores() {
    let dir = tempfile::tempdir().expect("tempdir");
    check_validation(&sqlite_log(&dir.path().join("sqlite")));
    check_validation(&memory_log(&dir.path().join("memory")));
}

#[test]
fn photo_from_data_url_is_stored_and_linked() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = sqlite_log(dir.path());

    let photo: PhotoUpload = serde_json::from_value(serde_json::json!({
        "file_name": "oyakodon.png",
        "data_url": "data:image/png;base64,aGVsbG8="
    }))
    .expect("photo");
    let mut with_photo = draft("親子丼", "和食", 5, "");
    with_photo.photo = Some(photo);
    let created = log.create(with_photo).expect("create");

    let url = created.image_url.clone().expect("image url");
    let relative = url.strip_prefix("/photos/").expect("public prefix");
    assert_eq!(std::fs::read(dir.path().join("photos").join(relative)).expect("blob"), b"hello");

    let mut not_image = draft("x", "", 0, "");
    not_image.photo = Some(PhotoUpload::new("notes.txt", "text/plain", b"hi".to_vec()));
    assert!(matches!(log.create(not_image), Err(AppError::Validation(_))));

    let cleared = log
        .update(
            &created.id,
            RecordDraftPatch {
                image_url: Some(None),
                ..RecordDraftPatch::default()
            },
        )
        .expect("clear image");
    assert!(cleared.image_url.is_none());
}

#[tokio::test]
async fn subscribers_see_every_write() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bus = InvalidationBus::new(16);
    let mut events = bus.subscribe();
    let store = Arc::new(Database::new(&dir.path().join("test.db")).expect("db"));
    let blobs = Arc::new(FsBlobStore::new(dir.path().join("photos"), "/photos").expect("blobs"));
    let log = FoodLog::new(store, blobs, Arc::new(bus), LogbookSettings::default());

    let created = log.create(draft("ラーメン", "", 0, "")).expect("create");
    log.update(
        &created.id,
        RecordDraftPatch {
            rating: Some(4),
            ..RecordDraftPatch::default()
        },
    )
    .expect("update");
    log.delete(&created.id).expect("delete");

    let mut kinds = Vec::new();
    for _ in 0..3 {
        let event = events.recv().await.expect("event");
        assert_eq!(
            event.views,
            vec![ViewKey::Collection, ViewKey::Record(created.id.clone())]
        );
        kinds.push(event.kind);
    }
    assert_eq!(kinds, vec![MutationKind::Created, MutationKind::Updated, MutationKind::Deleted]);
}
