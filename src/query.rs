//! Keyword + tag search over food records.
//!
//! A search request is turned into a [`Predicate`] tree which the record store
//! evaluates. The tree is plain data, so the SQLite store can compile it into
//! parameterised SQL and the in-memory store can evaluate it with
//! [`Predicate::matches`]; user text never becomes part of a query string.
//!
//! Precedence is fixed: the keyword matches if it appears in *any* searchable
//! field, and that result is AND-ed with the tag filter. A blank keyword or
//! the "ALL" tag contributes no condition at all. A non-blank keyword is
//! matched as given, surrounding whitespace included.

use crate::adapters::RecordStore;
use crate::models::{FoodRecord, TagFilter};

/// Fields a keyword is matched against, in the order they are checked.
pub const KEYWORD_FIELDS: [RecordField; 4] = [
    RecordField::Title,
    RecordField::Restaurant,
    RecordField::Memo,
    RecordField::Tags,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordField {
    Title,
    Restaurant,
    Memo,
    Tags,
}

impl RecordField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Restaurant => "restaurant",
            Self::Memo => "memo",
            Self::Tags => "tags",
        }
    }

    fn values(self, record: &FoodRecord) -> Vec<&str> {
        match self {
            Self::Title => vec![record.title.as_str()],
            Self::Restaurant => record.restaurant.as_deref().into_iter().collect(),
            Self::Memo => record.memo.as_deref().into_iter().collect(),
            Self::Tags => record.tags.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Always,
    /// Case-insensitive substring test.
    Contains(RecordField, String),
    /// Exact membership of a tag in the record's tag list.
    TagIncludes(String),
    Or(Vec<Predicate>),
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn contains(field: RecordField, text: &str) -> Self {
        Self::Contains(field, text.to_lowercase())
    }

    pub fn tag_includes(tag: &str) -> Self {
        Self::TagIncludes(tag.to_string())
    }

    pub fn matches(&self, record: &FoodRecord) -> bool {
        match self {
            Self::Always => true,
            Self::Contains(field, needle) => {
                let needle = needle.to_lowercase();
                field
                    .values(record)
                    .iter()
                    .any(|value| value.to_lowercase().contains(needle.as_str()))
            }
            Self::TagIncludes(tag) => record.tags.iter().any(|candidate| candidate == tag),
            Self::Or(predicates) => predicates.iter().any(|predicate| predicate.matches(record)),
            Self::And(predicates) => predicates.iter().all(|predicate| predicate.matches(record)),
        }
    }
}

/// `None` when the keyword is blank, i.e. every record matches.
pub fn keyword_predicate(keyword: &str) -> Option<Predicate> {
    if keyword.trim().is_empty() {
        return None;
    }
    Some(Predicate::Or(
        KEYWORD_FIELDS
            .iter()
            .map(|field| Predicate::contains(*field, keyword))
            .collect(),
    ))
}

pub fn tag_predicate(tag: &TagFilter) -> Option<Predicate> {
    match tag {
        TagFilter::All => None,
        TagFilter::Tag(tag) => Some(Predicate::tag_includes(tag)),
    }
}

pub fn build_predicate(keyword: &str, tag: &TagFilter) -> Predicate {
    match (keyword_predicate(keyword), tag_predicate(tag)) {
        (None, None) => Predicate::Always,
        (Some(predicate), None) | (None, Some(predicate)) => predicate,
        (Some(keyword), Some(tag)) => Predicate::And(vec![keyword, tag]),
    }
}

/// Records matching `keyword` and `tag`, newest first. A failing store yields
/// an empty result; the failure is logged.
pub fn search(store: &dyn RecordStore, keyword: &str, tag: &TagFilter) -> Vec<FoodRecord> {
    let predicate = build_predicate(keyword, tag);
    match store.select_all(&predicate) {
        Ok(records) => {
            tracing::debug!(
                backend = store.backend_name(),
                keyword = %keyword,
                tag = %tag.label(),
                count = records.len(),
                "food record search completed"
            );
            records
        }
        Err(error) => {
            tracing::warn!(
                backend = store.backend_name(),
                keyword = %keyword,
                tag = %tag.label(),
                error = %error,
                "food record search failed; returning no results"
            );
            Vec::new()
        }
    }
}
