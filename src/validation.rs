//! Field rules applied to drafts and patches before any store or blob I/O.
//!
//! Everything here is pure: the same input always yields the same output and
//! nothing touches the network or disk. `rating` is passed through unclamped
//! and tags are not deduplicated; both mirror how the logbook has always
//! behaved.

use crate::errors::{AppError, AppResult};
use crate::models::{CountInput, DraftRecord, NewFoodRecord, PhotoUpload, RecordDraftPatch, RecordPatch, TagsInput};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static ISO_DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("valid iso date regex"));

const DEFAULT_COUNT: i64 = 1;
const UNRATED: i64 = 0;

pub fn validate_draft(draft: &DraftRecord, created_at: DateTime<Utc>) -> AppResult<NewFoodRecord> {
    let title = normalize_title(&draft.title)?;
    let count = match draft.count.as_ref() {
        Some(count) => normalize_count(count)?,
        None => DEFAULT_COUNT,
    };
    let date = normalize_date(&draft.date)?;

    Ok(NewFoodRecord {
        title,
        restaurant: normalize_optional_text(draft.restaurant.as_deref()),
        count,
        date,
        tags: draft.tags.as_ref().map(parse_tags).unwrap_or_default(),
        rating: draft.rating.unwrap_or(UNRATED),
        memo: normalize_memo(draft.memo.as_deref()),
        image_url: normalize_optional_text(draft.image_url.as_deref()),
        address: normalize_optional_text(draft.address.as_deref()),
        created_at,
    })
}

/// Validates only the fields present in `patch`.
pub fn validate_patch(patch: &RecordDraftPatch) -> AppResult<RecordPatch> {
    Ok(RecordPatch {
        title: patch.title.as_deref().map(normalize_title).transpose()?,
        restaurant: patch
            .restaurant
            .as_ref()
            .map(|value| normalize_optional_text(value.as_deref())),
        count: patch.count.as_ref().map(normalize_count).transpose()?,
        date: patch.date.as_deref().map(normalize_date).transpose()?,
        tags: patch.tags.as_ref().map(parse_tags),
        rating: patch.rating,
        memo: patch.memo.as_ref().map(|value| normalize_memo(value.as_deref())),
        image_url: patch
            .image_url
            .as_ref()
            .map(|value| normalize_optional_text(value.as_deref())),
        address: patch
            .address
            .as_ref()
            .map(|value| normalize_optional_text(value.as_deref())),
    })
}

pub fn normalize_title(raw: &str) -> AppResult<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(AppError::Validation("title must not be empty".to_string()));
    }
    Ok(title.to_string())
}

pub fn normalize_count(input: &CountInput) -> AppResult<i64> {
    let count = match input {
        CountInput::Number(value) => *value,
        CountInput::Text(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| AppError::Validation(format!("count must be a whole number, got '{}'", raw)))?,
    };
    if count < DEFAULT_COUNT {
        return Err(AppError::Validation(format!("count must be at least 1, got {}", count)));
    }
    Ok(count)
}

pub fn normalize_date(raw: &str) -> AppResult<String> {
    let date = raw.trim();
    if date.is_empty() {
        return Err(AppError::Validation("date is required".to_string()));
    }
    if !ISO_DATE_RE.is_match(date) {
        return Err(AppError::Validation(format!("date must be formatted YYYY-MM-DD, got '{}'", raw)));
    }
    Ok(date.to_string())
}

pub fn parse_tags(input: &TagsInput) -> Vec<String> {
    match input {
        TagsInput::Delimited(raw) => split_tags(raw),
        TagsInput::List(items) => items
            .iter()
            .map(|tag| tag.trim())
            .filter(|tag| !tag.is_empty())
            .map(ToString::to_string)
            .collect(),
    }
}

/// Splits comma-delimited tag input. Order is kept and duplicates survive.
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(ToString::to_string)
        .collect()
}

pub fn validate_photo(photo: &PhotoUpload, max_bytes: u64) -> AppResult<()> {
    if !photo.content_type.starts_with("image/") {
        return Err(AppError::Validation(format!(
            "photo must be an image, got content type '{}'",
            photo.content_type
        )));
    }
    if photo.bytes.is_empty() {
        return Err(AppError::Validation("photo is empty".to_string()));
    }
    if photo.bytes.len() as u64 > max_bytes {
        return Err(AppError::Validation(format!(
            "photo is {} bytes, limit is {}",
            photo.bytes.len(),
            max_bytes
        )));
    }
    Ok(())
}

fn normalize_optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

// Line breaks and indentation inside a memo are content.
fn normalize_memo(raw: Option<&str>) -> Option<String> {
    raw.filter(|memo| !memo.trim().is_empty()).map(ToString::to_string)
}
