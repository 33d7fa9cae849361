//! Create, update, delete and single-record lookup.
//!
//! Validation always runs before any blob or store I/O. Write failures are
//! logged and returned; successful writes are followed by a view invalidation
//! that cannot fail the write.

use crate::adapters::blob::new_photo_path;
use crate::adapters::{BlobStore, RecordStore};
use crate::errors::{AppError, AppResult};
use crate::invalidation::{signal, InvalidationSink, MutationKind};
use crate::models::{DraftRecord, FoodRecord, PhotoUpload, RecordDraftPatch};
use crate::validation;
use chrono::{SubsecRound, Utc};

/// Collaborators a mutation needs, injected per call.
#[derive(Clone, Copy)]
pub struct MutationContext<'a> {
    pub store: &'a dyn RecordStore,
    pub blobs: &'a dyn BlobStore,
    pub invalidation: &'a dyn InvalidationSink,
    pub max_photo_bytes: u64,
}

struct UploadedPhoto {
    path: String,
    url: String,
}

pub fn create(ctx: &MutationContext<'_>, draft: DraftRecord) -> AppResult<FoodRecord> {
    // Stored timestamps keep microseconds; truncate so the returned record
    // equals what a later read yields.
    let created_at = Utc::now().trunc_subsecs(6);
    let mut record = validation::validate_draft(&draft, created_at)?;
    if let Some(photo) = draft.photo.as_ref() {
        validation::validate_photo(photo, ctx.max_photo_bytes)?;
    }

    let uploaded = match draft.photo.as_ref() {
        Some(photo) => Some(upload_photo(ctx, photo)?),
        None => None,
    };
    if let Some(photo) = uploaded.as_ref() {
        record.image_url = Some(photo.url.clone());
    }

    match ctx.store.insert(record) {
        Ok(created) => {
            tracing::info!(record_id = %created.id, backend = ctx.store.backend_name(), "food record created");
            signal(ctx.invalidation, MutationKind::Created, &created.id);
            Ok(created)
        }
        Err(error) => {
            tracing::error!(backend = ctx.store.backend_name(), error = %error, "failed to create food record");
            if let Some(photo) = uploaded {
                tracing::warn!(path = %photo.path, "photo blob orphaned by failed create");
            }
            Err(error)
        }
    }
}

pub fn update(ctx: &MutationContext<'_>, id: &str, patch: RecordDraftPatch) -> AppResult<FoodRecord> {
    let mut validated = validation::validate_patch(&patch)?;
    if let Some(photo) = patch.photo.as_ref() {
        validation::validate_photo(photo, ctx.max_photo_bytes)?;
    }

    if validated.is_empty() && patch.photo.is_none() {
        return get_by_id(ctx.store, id)?.ok_or_else(|| not_found(id));
    }

    let uploaded = match patch.photo.as_ref() {
        Some(photo) => {
            // Avoid leaving a blob behind for a record that is already gone.
            if get_by_id(ctx.store, id)?.is_none() {
                return Err(not_found(id));
            }
            Some(upload_photo(ctx, photo)?)
        }
        None => None,
    };
    if let Some(photo) = uploaded.as_ref() {
        validated.image_url = Some(Some(photo.url.clone()));
    }

    let updated = match ctx.store.update_by_id(id, &validated) {
        Ok(updated) => updated,
        Err(error) => {
            tracing::error!(record_id = %id, backend = ctx.store.backend_name(), error = %error, "failed to update food record");
            if let Some(photo) = uploaded {
                tracing::warn!(path = %photo.path, "photo blob orphaned by failed update");
            }
            return Err(error);
        }
    };

    let Some(updated) = updated else {
        if let Some(photo) = uploaded {
            tracing::warn!(path = %photo.path, "photo blob orphaned by update of missing record");
        }
        return Err(not_found(id));
    };

    tracing::info!(record_id = %id, backend = ctx.store.backend_name(), "food record updated");
    signal(ctx.invalidation, MutationKind::Updated, id);
    Ok(updated)
}

/// Deleting an id that does not exist succeeds.
pub fn delete(ctx: &MutationContext<'_>, id: &str) -> AppResult<()> {
    match ctx.store.delete_by_id(id) {
        Ok(true) => {
            tracing::info!(record_id = %id, backend = ctx.store.backend_name(), "food record deleted");
        }
        Ok(false) => {
            tracing::debug!(record_id = %id, backend = ctx.store.backend_name(), "food record already absent");
        }
        Err(error) => {
            tracing::error!(record_id = %id, backend = ctx.store.backend_name(), error = %error, "failed to delete food record");
            return Err(error);
        }
    }
    signal(ctx.invalidation, MutationKind::Deleted, id);
    Ok(())
}

/// `Ok(None)` is the normal answer for a record deleted in the meantime.
pub fn get_by_id(store: &dyn RecordStore, id: &str) -> AppResult<Option<FoodRecord>> {
    store.select_by_id(id).inspect_err(|error| {
        tracing::error!(record_id = %id, backend = store.backend_name(), error = %error, "failed to load food record");
    })
}

fn upload_photo(ctx: &MutationContext<'_>, photo: &PhotoUpload) -> AppResult<UploadedPhoto> {
    let path = new_photo_path(&photo.file_name, &photo.content_type);
    let url = ctx
        .blobs
        .upload(&photo.bytes, &path, &photo.content_type)
        .inspect_err(|error| {
            tracing::error!(path = %path, error = %error, "photo upload failed");
        })?;
    Ok(UploadedPhoto { path, url })
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("food record '{}' does not exist", id))
}
