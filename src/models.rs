use crate::errors::AppError;
use base64::Engine;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Tag-filter sentinel meaning "no tag filtering".
pub const TAG_FILTER_ALL: &str = "ALL";
/// Display label of [`TAG_FILTER_ALL`] in the filter dropdown.
pub const TAG_FILTER_ALL_LABEL: &str = "すべて";

const MAP_SEARCH_BASE: &str = "https://www.google.com/maps/search/?api=1&query=";
const MAX_STARS: i64 = 5;

/// One logged meal or restaurant visit, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FoodRecord {
    pub id: String,
    pub title: String,
    pub restaurant: Option<String>,
    pub count: i64,
    pub date: String,
    pub tags: Vec<String>,
    pub rating: i64,
    pub memo: Option<String>,
    pub image_url: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FoodRecord {
    /// Memo split into display lines; empty when there is no memo.
    pub fn memo_lines(&self) -> Vec<&str> {
        self.memo.as_deref().map(|memo| memo.lines().collect()).unwrap_or_default()
    }

    /// Filled state of each of the five rating stars.
    pub fn star_states(&self) -> [bool; MAX_STARS as usize] {
        let mut stars = [false; MAX_STARS as usize];
        for (index, star) in stars.iter_mut().enumerate() {
            *star = (index as i64) < self.rating;
        }
        stars
    }

    pub fn map_search_url(&self) -> String {
        let query = self.address.as_deref().unwrap_or_default();
        format!("{}{}", MAP_SEARCH_BASE, urlencoding::encode(query))
    }

    pub fn view_path(&self) -> String {
        format!("/view/{}", self.id)
    }
}

/// A validated record that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFoodRecord {
    pub title: String,
    pub restaurant: Option<String>,
    pub count: i64,
    pub date: String,
    pub tags: Vec<String>,
    pub rating: i64,
    pub memo: Option<String>,
    pub image_url: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewFoodRecord {
    pub fn into_record(self, id: String) -> FoodRecord {
        FoodRecord {
            id,
            title: self.title,
            restaurant: self.restaurant,
            count: self.count,
            date: self.date,
            tags: self.tags,
            rating: self.rating,
            memo: self.memo,
            image_url: self.image_url,
            address: self.address,
            created_at: self.created_at,
        }
    }
}

/// Visit count as submitted by a form: a number or numeric text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CountInput {
    Number(i64),
    Text(String),
}

impl From<i64> for CountInput {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

/// Tags as submitted: a comma-delimited string or an already split list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagsInput {
    List(Vec<String>),
    Delimited(String),
}

impl From<&str> for TagsInput {
    fn from(value: &str) -> Self {
        Self::Delimited(value.to_string())
    }
}

impl From<Vec<String>> for TagsInput {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
struct PhotoDataUrl {
    file_name: String,
    data_url: String,
}

/// Photo bytes attached to a draft, uploaded to the blob store on submit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "PhotoDataUrl")]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PhotoUpload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Decodes a `data:<mime>;base64,<payload>` URL as produced by a browser file reader.
    pub fn from_data_url(file_name: &str, data_url: &str) -> Result<Self, AppError> {
        let rest = data_url
            .strip_prefix("data:")
            .ok_or_else(|| AppError::Validation("photo must be a data: URL".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| AppError::Validation("photo data URL has no payload".to_string()))?;
        let content_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| AppError::Validation("photo data URL must be base64 encoded".to_string()))?;
        let bytes = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;
        Ok(Self::new(file_name, content_type, bytes))
    }
}

impl TryFrom<PhotoDataUrl> for PhotoUpload {
    type Error = AppError;

    fn try_from(value: PhotoDataUrl) -> Result<Self, Self::Error> {
        Self::from_data_url(&value.file_name, &value.data_url)
    }
}

/// Registration form state, kept apart from [`FoodRecord`] until submit.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct DraftRecord {
    pub title: String,
    pub restaurant: Option<String>,
    pub count: Option<CountInput>,
    pub date: String,
    pub tags: Option<TagsInput>,
    pub rating: Option<i64>,
    pub memo: Option<String>,
    pub image_url: Option<String>,
    pub address: Option<String>,
    pub photo: Option<PhotoUpload>,
}

impl DraftRecord {
    /// Empty form as the register page opens it: one visit, dated today.
    pub fn new_for_today() -> Self {
        Self {
            count: Some(CountInput::Number(1)),
            date: Local::now().date_naive().format("%Y-%m-%d").to_string(),
            ..Self::default()
        }
    }
}

/// Edit form submission. Absent fields keep their stored value; for optional
/// text fields an explicit `null` clears the value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RecordDraftPatch {
    pub title: Option<String>,
    #[serde(deserialize_with = "deserialize_some")]
    pub restaurant: Option<Option<String>>,
    pub count: Option<CountInput>,
    pub date: Option<String>,
    pub tags: Option<TagsInput>,
    pub rating: Option<i64>,
    #[serde(deserialize_with = "deserialize_some")]
    pub memo: Option<Option<String>>,
    #[serde(deserialize_with = "deserialize_some")]
    pub image_url: Option<Option<String>>,
    #[serde(deserialize_with = "deserialize_some")]
    pub address: Option<Option<String>>,
    pub photo: Option<PhotoUpload>,
}

fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Validated field-level patch handed to the record store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub title: Option<String>,
    pub restaurant: Option<Option<String>>,
    pub count: Option<i64>,
    pub date: Option<String>,
    pub tags: Option<Vec<String>>,
    pub rating: Option<i64>,
    pub memo: Option<Option<String>>,
    pub image_url: Option<Option<String>>,
    pub address: Option<Option<String>>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.restaurant.is_none()
            && self.count.is_none()
            && self.date.is_none()
            && self.tags.is_none()
            && self.rating.is_none()
            && self.memo.is_none()
            && self.image_url.is_none()
            && self.address.is_none()
    }

    pub fn apply_to(&self, record: &mut FoodRecord) {
        if let Some(title) = &self.title {
            record.title = title.clone();
        }
        if let Some(restaurant) = &self.restaurant {
            record.restaurant = restaurant.clone();
        }
        if let Some(count) = self.count {
            record.count = count;
        }
        if let Some(date) = &self.date {
            record.date = date.clone();
        }
        if let Some(tags) = &self.tags {
            record.tags = tags.clone();
        }
        if let Some(rating) = self.rating {
            record.rating = rating;
        }
        if let Some(memo) = &self.memo {
            record.memo = memo.clone();
        }
        if let Some(image_url) = &self.image_url {
            record.image_url = image_url.clone();
        }
        if let Some(address) = &self.address {
            record.address = address.clone();
        }
    }
}

/// Tag dropdown selection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TagFilter {
    #[default]
    All,
    Tag(String),
}

impl TagFilter {
    pub fn parse(raw: &str) -> Self {
        if raw.trim().is_empty() || raw == TAG_FILTER_ALL || raw == TAG_FILTER_ALL_LABEL {
            return Self::All;
        }
        Self::Tag(raw.to_string())
    }

    pub fn label(&self) -> &str {
        match self {
            Self::All => TAG_FILTER_ALL_LABEL,
            Self::Tag(tag) => tag,
        }
    }
}

impl From<&str> for TagFilter {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

/// Outcome of a write command as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionState {
    pub ok: bool,
    pub message: String,
    pub record_id: Option<String>,
}

impl ActionState {
    pub fn success(message: impl Into<String>, record_id: Option<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            record_id,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            record_id: None,
        }
    }
}
