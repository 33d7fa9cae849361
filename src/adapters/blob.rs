use crate::adapters::BlobStore;
use crate::errors::{AppError, AppResult};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

const PHOTO_PREFIX: &str = "records";

/// Blob store backed by a local directory; blobs are served from `public_base_url`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> AppResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            public_base_url: public_base_url.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), path)
    }

    fn resolve(&self, path: &str) -> AppResult<PathBuf> {
        let relative = Path::new(path);
        let is_plain = !path.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !is_plain {
            return Err(AppError::Store(format!("invalid blob path '{}'", path)));
        }
        Ok(self.root.join(relative))
    }
}

impl BlobStore for FsBlobStore {
    fn upload(&self, bytes: &[u8], path: &str, content_type: &str) -> AppResult<String> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&target) {
            Ok(file) => file,
            Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                return Err(AppError::Store(format!("blob path '{}' already exists", path)));
            }
            Err(error) => return Err(error.into()),
        };
        file.write_all(bytes)?;
        file.sync_all()?;

        tracing::debug!(path = %path, content_type = %content_type, bytes = bytes.len(), "stored photo blob");
        Ok(self.public_url(path))
    }
}

/// Fresh, collision-resistant blob path for an uploaded photo.
pub fn new_photo_path(file_name: &str, content_type: &str) -> String {
    let source = Path::new(file_name);
    let stem = source
        .file_stem()
        .and_then(|value| value.to_str())
        .map(sanitize_component)
        .unwrap_or_else(|| "photo".to_string());
    let extension = source
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| sanitize_component(&value.to_ascii_lowercase()))
        .unwrap_or_else(|| extension_for(content_type).to_string());
    let short = Uuid::new_v4().simple().to_string();
    format!("{}/{}-{}.{}", PHOTO_PREFIX, &short[..12], stem, extension)
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/heic" => "heic",
        _ => "bin",
    }
}

fn sanitize_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    let cleaned = out.trim_matches('_').to_string();
    if cleaned.is_empty() {
        "photo".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::{new_photo_path, FsBlobStore};
    use crate::adapters::BlobStore;
    use crate::errors::AppError;

    #[test]
    fn upload_returns_public_url_and_refuses_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path().join("photos"), "https://cdn.example/photos/").expect("store");

        let url = store
            .upload(b"jpeg", "records/a.jpg", "image/jpeg")
            .expect("upload");
        assert_eq!(url, "https://cdn.example/photos/records/a.jpg");
        assert_eq!(std::fs::read(store.root().join("records/a.jpg")).expect("read"), b"jpeg");

        let collision = store.upload(b"other", "records/a.jpg", "image/jpeg").unwrap_err();
        assert!(matches!(collision, AppError::Store(_)));
        assert_eq!(std::fs::read(store.root().join("records/a.jpg")).expect("read"), b"jpeg");
    }

    #[test]
    fn traversal_paths_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path(), "/photos").expect("store");
        assert!(store.upload(b"x", "../escape.png", "image/png").is_err());
        assert!(store.upload(b"x", "/abs.png", "image/png").is_err());
        assert!(store.upload(b"x", "", "image/png").is_err());
    }

    #[test]
    fn photo_paths_are_sanitized_and_unique() {
        let first = new_photo_path("うな重 (1).JPG", "image/jpeg");
        let second = new_photo_path("うな重 (1).JPG", "image/jpeg");
        assert!(first.starts_with("records/"));
        assert!(first.ends_with("-1.jpg"));
        assert_ne!(first, second);

        let no_extension = new_photo_path("camera", "image/png");
        assert!(no_extension.ends_with("-camera.png"));
    }
}
