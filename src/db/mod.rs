use crate::adapters::RecordStore;
use crate::errors::{AppError, AppResult};
use crate::models::{FoodRecord, NewFoodRecord, RecordPatch};
use crate::query::{Predicate, RecordField};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("schema.sql");

const RECORD_COLUMNS: &str =
    "id, title, restaurant, count, date, tags_json, rating, memo, image_url, address, created_at";

/// SQLite-backed [`RecordStore`].
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Self::initialize(conn)?;
        tracing::info!(path = %path.display(), "opened food record database");
        Ok(db)
    }

    pub fn open_in_memory() -> AppResult<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> AppResult<Self> {
        register_functions(&conn)?;
        conn.execute_batch(SCHEMA_SQL)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.ensure_schema_extensions()?;
        Ok(db)
    }

    fn ensure_schema_extensions(&self) -> AppResult<()> {
        let conn = self.lock()?;
        if !column_exists(&conn, "food_records", "address")? {
            conn.execute("ALTER TABLE food_records ADD COLUMN address TEXT", [])?;
        }
        Ok(())
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| AppError::poisoned("database"))
    }
}

impl RecordStore for Database {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn insert(&self, record: NewFoodRecord) -> AppResult<FoodRecord> {
        let record = record.into_record(Uuid::new_v4().to_string());
        let tags_json = serde_json::to_string(&record.tags)?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO food_records (
               id, title, restaurant, count, date, tags_json, rating, memo, image_url, address, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.id,
                record.title,
                record.restaurant,
                record.count,
                record.date,
                tags_json,
                record.rating,
                record.memo,
                record.image_url,
                record.address,
                format_time(&record.created_at),
            ],
        )?;
        Ok(record)
    }

    fn update_by_id(&self, id: &str, patch: &RecordPatch) -> AppResult<Option<FoodRecord>> {
        let mut assignments: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(title) = &patch.title {
            assignments.push("title = ?");
            values.push(Value::Text(title.clone()));
        }
        if let Some(restaurant) = &patch.restaurant {
            assignments.push("restaurant = ?");
            values.push(optional_text(restaurant));
        }
        if let Some(count) = patch.count {
            assignments.push("count = ?");
            values.push(Value::Integer(count));
        }
        if let Some(date) = &patch.date {
            assignments.push("date = ?");
            values.push(Value::Text(date.clone()));
        }
        if let Some(tags) = &patch.tags {
            assignments.push("tags_json = ?");
            values.push(Value::Text(serde_json::to_string(tags)?));
        }
        if let Some(rating) = patch.rating {
            assignments.push("rating = ?");
            values.push(Value::Integer(rating));
        }
        if let Some(memo) = &patch.memo {
            assignments.push("memo = ?");
            values.push(optional_text(memo));
        }
        if let Some(image_url) = &patch.image_url {
            assignments.push("image_url = ?");
            values.push(optional_text(image_url));
        }
        if let Some(address) = &patch.address {
            assignments.push("address = ?");
            values.push(optional_text(address));
        }

        let conn = self.lock()?;
        if assignments.is_empty() {
            return select_record(&conn, id);
        }

        let sql = format!("UPDATE food_records SET {} WHERE id = ?", assignments.join(", "));
        values.push(Value::Text(id.to_string()));
        let changed = conn.execute(&sql, rusqlite::params_from_iter(values.iter()))?;
        if changed == 0 {
            return Ok(None);
        }
        select_record(&conn, id)
    }

    fn delete_by_id(&self, id: &str) -> AppResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM food_records WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    fn select_by_id(&self, id: &str) -> AppResult<Option<FoodRecord>> {
        let conn = self.lock()?;
        select_record(&conn, id)
    }

    fn select_all(&self, predicate: &Predicate) -> AppResult<Vec<FoodRecord>> {
        let mut values = Vec::new();
        let condition = compile_predicate(predicate, &mut values);
        let sql = format!(
            "SELECT {} FROM food_records WHERE {} ORDER BY created_at DESC, rowid DESC",
            RECORD_COLUMNS, condition
        );

        let conn = self.lock()?;
        let mut statement = conn.prepare(&sql)?;
        let rows = statement.query_map(rusqlite::params_from_iter(values.iter()), parse_record_row)?;
        let mut result = Vec::new();
        for row in rows {
            match row {
                Ok(record) => result.push(record),
                Err(error) if is_malformed_row(&error) => {
                    tracing::warn!(error = %error, "skipping malformed food record row");
                }
                Err(error) => return Err(error.into()),
            }
        }
        Ok(result)
    }
}

/// Lower-cases text with full Unicode case mapping; SQLite's built-in
/// `lower` only folds ASCII.
fn register_functions(conn: &Connection) -> AppResult<()> {
    conn.create_scalar_function(
        "fold_lower",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let folded = match ctx.get_raw(0) {
                ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).to_lowercase()),
                _ => None,
            };
            Ok(folded)
        },
    )?;
    Ok(())
}

/// Appends bound values to `values` and returns the matching SQL condition.
fn compile_predicate(predicate: &Predicate, values: &mut Vec<Value>) -> String {
    match predicate {
        Predicate::Always => "1 = 1".to_string(),
        Predicate::Contains(RecordField::Tags, needle) => {
            values.push(Value::Text(needle.to_lowercase()));
            "EXISTS (SELECT 1 FROM json_each(food_records.tags_json) WHERE instr(fold_lower(json_each.value), ?) > 0)"
                .to_string()
        }
        Predicate::Contains(field, needle) => {
            values.push(Value::Text(needle.to_lowercase()));
            format!("instr(fold_lower({}), ?) > 0", field.as_str())
        }
        Predicate::TagIncludes(tag) => {
            values.push(Value::Text(tag.clone()));
            "EXISTS (SELECT 1 FROM json_each(food_records.tags_json) WHERE json_each.value = ?)".to_string()
        }
        Predicate::Or(parts) => join_predicates(parts, " OR ", "1 = 0", values),
        Predicate::And(parts) => join_predicates(parts, " AND ", "1 = 1", values),
    }
}

fn join_predicates(parts: &[Predicate], separator: &str, empty: &str, values: &mut Vec<Value>) -> String {
    if parts.is_empty() {
        return empty.to_string();
    }
    let compiled: Vec<String> = parts
        .iter()
        .map(|part| format!("({})", compile_predicate(part, values)))
        .collect();
    compiled.join(separator)
}

fn select_record(conn: &Connection, id: &str) -> AppResult<Option<FoodRecord>> {
    let sql = format!("SELECT {} FROM food_records WHERE id = ?1", RECORD_COLUMNS);
    conn.query_row(&sql, [id], parse_record_row)
        .optional()
        .map_err(AppError::from)
}

fn parse_record_row(row: &Row<'_>) -> rusqlite::Result<FoodRecord> {
    let tags_json: String = row.get(5)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(error))
    })?;
    let created_at: String = row.get(10)?;

    Ok(FoodRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        restaurant: row.get(2)?,
        count: row.get(3)?,
        date: row.get(4)?,
        tags,
        rating: row.get(6)?,
        memo: row.get(7)?,
        image_url: row.get(8)?,
        address: row.get(9)?,
        created_at: parse_time(&created_at)?,
    })
}

fn is_malformed_row(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::FromSqlConversionFailure(..) | rusqlite::Error::InvalidColumnType(..)
    )
}

fn optional_text(value: &Option<String>) -> Value {
    match value {
        Some(text) => Value::Text(text.clone()),
        None => Value::Null,
    }
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> AppResult<bool> {
    let pragma = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&pragma)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Fixed-width UTC timestamps, so lexical order is chronological order.
fn format_time(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                10,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
            )
        })
}
