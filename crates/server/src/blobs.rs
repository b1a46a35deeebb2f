//! Blob storage for uploaded files (post images, module attachments).

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::StoredBlob;
use crate::store::StoreError;

/// URL prefix under which saved blobs are served.
pub const FILES_ROUTE_PREFIX: &str = "/files/";

/// Blob bytes plus the content type to serve them with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedBlob {
    pub bytes: Bytes,
    pub content_type: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Save `bytes` under a key derived from `name` and the content hash.
    ///
    /// Without a `content_type` one is guessed from the name.
    async fn save(
        &self,
        bytes: Bytes,
        name: &str,
        content_type: Option<&str>,
    ) -> Result<StoredBlob, StoreError>;

    /// Load a blob by key. `None` if it does not exist.
    async fn load(&self, key: &str) -> Result<Option<LoadedBlob>, StoreError>;
}

/// Blob store backed by a flat directory.
///
/// Each blob `<key>` has a `.<key>.meta.json` sidecar holding its
/// [`StoredBlob`] record.
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{}.meta.json", key))
    }

    /// Write through a temp file unique to this call, then rename into place.
    async fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<(), StoreError> {
        let temp_path = self.dir.join(format!(".{}.tmp", Uuid::new_v4()));
        fs::write(&temp_path, data).await?;

        if let Err(e) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            // A concurrent save of the same blob got there first
            if fs::try_exists(path).await.unwrap_or(false) {
                return Ok(());
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn read_meta(&self, key: &str) -> Option<StoredBlob> {
        let data = fs::read(self.meta_path(key)).await.ok()?;
        match serde_json::from_slice(&data) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!("Ignoring unreadable metadata for blob {}: {}", key, e);
                None
            }
        }
    }
}

/// Keep a safe subset of the client file name.
pub fn sanitize_name(name: &str) -> String {
    // Drop any client-side directory components
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned.to_string()
    }
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && !key.contains("..")
        && !key.contains(['/', '\\']);
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

/// Content type guessed from the key's extension, for blobs saved without one.
pub fn content_type_for(key: &str) -> &'static str {
    let ext = key.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" => "text/plain; charset=utf-8",
        "json" => "application/json",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn save(
        &self,
        bytes: Bytes,
        name: &str,
        content_type: Option<&str>,
    ) -> Result<StoredBlob, StoreError> {
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let sha256 = format!("{:x}", hasher.finalize());

        let name = sanitize_name(name);
        let key = format!("{}-{}", &sha256[..16], name);
        let path = self.dir.join(&key);

        // Same content under the same name is already stored
        if !fs::try_exists(&path).await? {
            self.write_atomic(&path, &bytes).await?;
        }

        let content_type = content_type
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .unwrap_or_else(|| content_type_for(&key))
            .to_string();

        let blob = StoredBlob {
            url: format!("{}{}", FILES_ROUTE_PREFIX, key),
            key,
            name,
            size: bytes.len() as u64,
            sha256,
            content_type,
        };
        self.write_atomic(&self.meta_path(&blob.key), &serde_json::to_vec(&blob)?)
            .await?;

        info!("Stored blob {} ({} bytes, {})", blob.key, blob.size, blob.content_type);
        Ok(blob)
    }

    async fn load(&self, key: &str) -> Result<Option<LoadedBlob>, StoreError> {
        validate_key(key)?;
        let bytes = match fs::read(self.dir.join(key)).await {
            Ok(data) => Bytes::from(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let content_type = match self.read_meta(key).await {
            Some(meta) => meta.content_type,
            None => content_type_for(key).to_string(),
        };
        Ok(Some(LoadedBlob { bytes, content_type }))
    }
}
