//! Local file store: blobs under `<root>/blobs/`, records in `<root>/index.json`.
//!
//! Every upload and every conversion output becomes a [`StoredFile`]. Each
//! record carries a random public token used for unauthenticated share
//! links. The token is assigned once and never changes. Files never expire;
//! they are removed only by [`FileStore::delete`], which drops the bytes and
//! the record together.
//!
//! The index is rewritten whole on every change, via a temporary file and a
//! rename, under the same lock that guards the in-memory copy.

use crate::error::DocError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

const INDEX_FILE: &str = "index.json";
const BLOB_DIR: &str = "blobs";

/// A stored document owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: Uuid,
    pub owner: Uuid,
    /// Display name, e.g. `merged.pdf`.
    pub filename: String,
    /// Blob location relative to the store root.
    pub storage_key: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    /// Random token for public share links.
    pub public_token: Uuid,
}

impl StoredFile {
    /// Lower-cased extension of the display name, without the dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }

    pub fn is_zip(&self) -> bool {
        self.extension().as_deref() == Some("zip")
    }
}

/// Strip any directory part from a client-supplied name.
fn display_name(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or("file")
        .to_string()
}

/// Blob key for a new file; only an alphanumeric extension is kept.
fn storage_key(id: Uuid, filename: &str) -> String {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    format!("{BLOB_DIR}/{id}{ext}")
}

/// Directory-backed store of [`StoredFile`]s.
pub struct FileStore {
    root: PathBuf,
    max_upload_bytes: u64,
    index: Mutex<HashMap<Uuid, StoredFile>>,
}

impl FileStore {
    /// Open (or create) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>, max_upload_bytes: u64) -> Result<Self, DocError> {
        let root = root.into();
        fs::create_dir_all(root.join(BLOB_DIR)).await.map_err(|e| {
            DocError::Storage(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        let index_path = root.join(INDEX_FILE);
        let records: Vec<StoredFile> = match fs::read(&index_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                DocError::Storage(format!("Corrupt index {}: {}", index_path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(DocError::Storage(format!(
                    "Failed to read index {}: {}",
                    index_path.display(),
                    e
                )))
            }
        };
        info!("File store at '{}': {} records", root.display(), records.len());

        Ok(Self {
            root,
            max_upload_bytes,
            index: Mutex::new(records.into_iter().map(|f| (f.id, f)).collect()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a stored file's bytes.
    pub fn path_of(&self, file: &StoredFile) -> PathBuf {
        self.root.join(&file.storage_key)
    }

    /// Store uploaded bytes. Rejected before anything is written if over the ceiling.
    pub async fn upload(
        &self,
        owner: Uuid,
        filename: &str,
        data: Vec<u8>,
    ) -> Result<StoredFile, DocError> {
        let size = data.len() as u64;
        if size > self.max_upload_bytes {
            return Err(DocError::UploadTooLarge {
                filename: filename.to_string(),
                size,
                limit: self.max_upload_bytes,
            });
        }

        let id = Uuid::new_v4();
        let key = storage_key(id, filename);
        let path = self.root.join(&key);
        fs::write(&path, &data)
            .await
            .map_err(|e| DocError::OutputWriteFailed { path, source: e })?;

        self.insert(id, owner, display_name(filename), key, size).await
    }

    /// Move a finished operation output into the store and record it.
    pub async fn register_artifact(
        &self,
        owner: Uuid,
        source: &Path,
        filename: &str,
    ) -> Result<StoredFile, DocError> {
        let id = Uuid::new_v4();
        let key = storage_key(id, filename);
        let dest = self.root.join(&key);

        if fs::rename(source, &dest).await.is_err() {
            // Different filesystem: fall back to copy + remove.
            fs::copy(source, &dest)
                .await
                .map_err(|e| DocError::OutputWriteFailed {
                    path: dest.clone(),
                    source: e,
                })?;
            if let Err(e) = fs::remove_file(source).await {
                warn!("Could not remove '{}': {}", source.display(), e);
            }
        }
        let size = fs::metadata(&dest)
            .await
            .map(|m| m.len())
            .map_err(|e| DocError::Storage(format!("Failed to stat {}: {}", dest.display(), e)))?;

        self.insert(id, owner, display_name(filename), key, size).await
    }

    async fn insert(
        &self,
        id: Uuid,
        owner: Uuid,
        filename: String,
        storage_key: String,
        size_bytes: u64,
    ) -> Result<StoredFile, DocError> {
        let mut index = self.index.lock().await;
        let mut public_token = Uuid::new_v4();
        while index.values().any(|f| f.public_token == public_token) {
            public_token = Uuid::new_v4();
        }
        let file = StoredFile {
            id,
            owner,
            filename,
            storage_key,
            size_bytes,
            created_at: Utc::now(),
            public_token,
        };
        index.insert(id, file.clone());
        if let Err(e) = self.persist(&index).await {
            index.remove(&id);
            let _ = fs::remove_file(self.path_of(&file)).await;
            return Err(e);
        }
        debug!(
            id = %file.id,
            owner = %file.owner,
            size_bytes = file.size_bytes,
            "Stored '{}'",
            file.filename
        );
        Ok(file)
    }

    /// A file owned by `owner`.
    pub async fn get(&self, owner: Uuid, id: Uuid) -> Result<StoredFile, DocError> {
        self.index
            .lock()
            .await
            .get(&id)
            .filter(|f| f.owner == owner)
            .cloned()
            .ok_or(DocError::StoredFileNotFound { id })
    }

    /// All files of `owner`, newest first.
    pub async fn list(&self, owner: Uuid) -> Vec<StoredFile> {
        let index = self.index.lock().await;
        let mut files: Vec<StoredFile> =
            index.values().filter(|f| f.owner == owner).cloned().collect();
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        files
    }

    /// Look a file up by its public share token, regardless of owner.
    pub async fn find_by_token(&self, token: Uuid) -> Option<StoredFile> {
        self.index
            .lock()
            .await
            .values()
            .find(|f| f.public_token == token)
            .cloned()
    }

    /// Delete a file's bytes and its record.
    pub async fn delete(&self, owner: Uuid, id: Uuid) -> Result<(), DocError> {
        let mut index = self.index.lock().await;
        let file = index
            .get(&id)
            .filter(|f| f.owner == owner)
            .cloned()
            .ok_or(DocError::StoredFileNotFound { id })?;

        match fs::remove_file(self.path_of(&file)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Blob for {} was already gone", id);
            }
            Err(e) => {
                return Err(DocError::Storage(format!(
                    "Failed to delete {}: {}",
                    file.storage_key, e
                )))
            }
        }
        index.remove(&id);
        self.persist(&index).await?;
        info!(id = %id, "Deleted '{}'", file.filename);
        Ok(())
    }

    async fn persist(&self, index: &HashMap<Uuid, StoredFile>) -> Result<(), DocError> {
        let mut records: Vec<&StoredFile> = index.values().collect();
        records.sort_by_key(|f| (f.created_at, f.id));
        let json = serde_json::to_vec_pretty(&records)
            .map_err(|e| DocError::Storage(format!("Failed to serialise index: {e}")))?;

        let tmp = self.root.join(format!("{INDEX_FILE}.tmp"));
        fs::write(&tmp, json)
            .await
            .map_err(|e| DocError::Storage(format!("Failed to write index: {e}")))?;
        fs::rename(&tmp, self.root.join(INDEX_FILE))
            .await
            .map_err(|e| DocError::Storage(format!("Failed to replace index: {e}")))?;
        Ok(())
    }
}
