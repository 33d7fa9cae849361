use crate::adapters::RecordStore;
use crate::models::{FoodRecord, TAG_FILTER_ALL_LABEL};
use crate::query::Predicate;
use std::collections::BTreeSet;

/// Distinct tags across `records`, sorted by code point.
pub fn collect_tags(records: &[FoodRecord]) -> BTreeSet<String> {
    records
        .iter()
        .flat_map(|record| record.tags.iter())
        .filter(|tag| !tag.is_empty())
        .cloned()
        .collect()
}

/// Every tag in use. An unreadable store yields an empty set.
pub fn list_all_tags(store: &dyn RecordStore) -> BTreeSet<String> {
    match store.select_all(&Predicate::Always) {
        Ok(records) => collect_tags(&records),
        Err(error) => {
            tracing::warn!(backend = store.backend_name(), error = %error, "failed to list tags; returning none");
            BTreeSet::new()
        }
    }
}

/// Dropdown entries for the tag filter, the catch-all label first.
pub fn tag_filter_options(store: &dyn RecordStore) -> Vec<String> {
    std::iter::once(TAG_FILTER_ALL_LABEL.to_string())
        .chain(list_all_tags(store))
        .collect()
}
