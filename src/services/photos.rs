//! Storage for complaint photos.
//!
//! Files are named after the sha256 of their content, so uploading the same
//! picture twice yields the same reference.

use crate::errors::ServiceError;
use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// Accepted file extensions.
pub const SUPPORTED_FORMATS: &[&str] = &["jpg", "jpeg", "png", "webp", "heic"];

/// URL prefix under which stored photos are served.
pub const PUBLIC_PREFIX: &str = "/uploads";

#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Stores the file and returns its reference.
    async fn store(&self, order_id: i32, file_name: &str, data: Bytes) -> Result<String, ServiceError>;

    /// Removes a stored file of the order. Missing files are not an error;
    /// references outside the order's directory are refused.
    async fn remove(&self, order_id: i32, reference: &str) -> Result<(), ServiceError>;

    /// Removes every stored file of the order.
    async fn remove_all(&self, order_id: i32) -> Result<(), ServiceError>;
}

/// Reference prefix shared by every photo of one order.
pub fn order_prefix(order_id: i32) -> String {
    format!("{}/orders/{}/", PUBLIC_PREFIX, order_id)
}

/// True when `reference` names a file directly inside the order's directory.
pub fn belongs_to_order(order_id: i32, reference: &str) -> bool {
    match reference.strip_prefix(&order_prefix(order_id)) {
        Some(name) => {
            !name.is_empty()
                && name != "."
                && name != ".."
                && !name.contains('/')
                && !name.contains('\\')
        }
        None => false,
    }
}

fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Lower-cased extension, if it is one we accept.
pub fn photo_extension(file_name: &str) -> Result<String, ServiceError> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .ok_or_else(|| {
            ServiceError::ValidationError(format!("File {} has no extension", file_name))
        })?;
    if !SUPPORTED_FORMATS.contains(&ext.as_str()) {
        return Err(ServiceError::ValidationError(format!(
            "Unsupported file format '{}'. Supported: {}",
            ext,
            SUPPORTED_FORMATS.join(", ")
        )));
    }
    Ok(ext)
}

/// Photos kept on the local filesystem under `root/orders/{order_id}/`.
#[derive(Debug, Clone)]
pub struct LocalPhotoStore {
    root: PathBuf,
    max_bytes: usize,
}

impl LocalPhotoStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    /// Maps a reference back to a path, refusing anything outside the root.
    fn path_of(&self, reference: &str) -> Option<PathBuf> {
        let relative = reference.strip_prefix(PUBLIC_PREFIX)?.trim_start_matches('/');
        if relative.split('/').any(|part| part.is_empty() || part == "..") {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl PhotoStore for LocalPhotoStore {
    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn store(&self, order_id: i32, file_name: &str, data: Bytes) -> Result<String, ServiceError> {
        if data.is_empty() {
            return Err(ServiceError::ValidationError(format!("File {} is empty", file_name)));
        }
        if data.len() > self.max_bytes {
            return Err(ServiceError::ValidationError(format!(
                "File {} is larger than {} bytes",
                file_name, self.max_bytes
            )));
        }
        let ext = photo_extension(file_name)?;

        let dir = self.root.join("orders").join(order_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;

        let stored_name = format!("{}.{}", content_hash(&data), ext);
        let path = dir.join(&stored_name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(path = %path.display(), "photo already stored");
        } else {
            tokio::fs::write(&path, &data).await?;
        }

        Ok(format!("{}/orders/{}/{}", PUBLIC_PREFIX, order_id, stored_name))
    }

    #[instrument(skip(self))]
    async fn remove(&self, order_id: i32, reference: &str) -> Result<(), ServiceError> {
        let path = belongs_to_order(order_id, reference)
            .then(|| self.path_of(reference))
            .flatten();
        let Some(path) = path else {
            warn!(order_id, "photo reference outside the order directory, nothing removed");
            return Err(ServiceError::ValidationError(format!(
                "Photo {} does not belong to order {}",
                reference, order_id
            )));
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn remove_all(&self, order_id: i32) -> Result<(), ServiceError> {
        let dir = self.root.join("orders").join(order_id.to_string());
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(path = %dir.display(), "order photos removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn stores_by_content_hash_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalPhotoStore::new(dir.path(), 1024);

        let first = store
            .store(12, "IMG_0001.JPG", Bytes::from_static(b"fake jpeg"))
            .await
            .unwrap();
        let second = store
            .store(12, "copy.jpg", Bytes::from_static(b"fake jpeg"))
            .await
            .unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("/uploads/orders/12/"));

        let path = store.path_of(&first).unwrap();
        assert!(path.exists());
        store.remove(12, &first).await.unwrap();
        assert!(!path.exists());
        // second removal is a no-op
        store.remove(12, &first).await.unwrap();
    }

    #[tokio::test]
    async fn removal_stays_inside_the_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalPhotoStore::new(dir.path(), 1024);
        let other = store
            .store(2, "rysa.png", Bytes::from_static(b"png bytes"))
            .await
            .unwrap();

        assert_matches!(
            store.remove(1, &other).await,
            Err(ServiceError::ValidationError(_))
        );
        assert!(store.path_of(&other).unwrap().exists());

        store.remove_all(2).await.unwrap();
        assert!(!store.path_of(&other).unwrap().exists());
        // nothing stored for this order
        store.remove_all(3).await.unwrap();
    }

    #[test]
    fn references_are_scoped_to_their_order() {
        assert!(belongs_to_order(7, "/uploads/orders/7/abc.jpg"));
        assert!(!belongs_to_order(7, "/uploads/orders/70/abc.jpg"));
        assert!(!belongs_to_order(7, "/uploads/orders/8/abc.jpg"));
        assert!(!belongs_to_order(7, "/uploads/orders/7/../8/abc.jpg"));
        assert!(!belongs_to_order(7, "/uploads/orders/7/"));
        assert!(!belongs_to_order(7, "https://example.com/abc.jpg"));
    }

    #[tokio::test]
    async fn rejects_bad_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalPhotoStore::new(dir.path(), 4);
        assert_matches!(
            store.store(1, "a.exe", Bytes::from_static(b"MZ")).await,
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            store.store(1, "a.jpg", Bytes::from_static(b"too large")).await,
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            store.store(1, "a.jpg", Bytes::new()).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn references_cannot_escape_root() {
        let store = LocalPhotoStore::new("/srv/uploads", 10);
        assert!(store.path_of("/uploads/../etc/passwd").is_none());
        assert!(store.path_of("/elsewhere/a.jpg").is_none());
        assert_eq!(
            store.path_of("/uploads/orders/1/a.jpg").unwrap(),
            PathBuf::from("/srv/uploads/orders/1/a.jpg")
        );
    }
}
