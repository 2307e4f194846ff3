//! In-memory blob store addressed by `blob:` URLs.
//!
//! Every artifact and preview a run produces is registered here and referenced
//! from [`crate::state::ProcessingState`] by URL only. A URL stays valid until
//! it is revoked; the orchestrator revokes the URLs of every superseded state,
//! so [`BlobStore::live_count`] returns to zero after a reset.

use crate::error::ToolkitError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

const URL_PREFIX: &str = "blob:pdf-toolkit/";

/// Opaque handle to a blob held by a [`BlobStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlobUrl(String);

impl BlobUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored blob: bytes plus declared MIME type.
#[derive(Debug, Clone)]
pub struct Blob {
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
}

impl Blob {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Save the blob to `path`, creating parent directories.
    ///
    /// Writes a sibling `<path>.part` first and renames it into place, so
    /// `path` never holds a partial artifact.
    pub async fn save(&self, path: &Path) -> Result<(), ToolkitError> {
        let failed = |source| ToolkitError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(failed)?;
        }

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".part");
        let tmp = PathBuf::from(tmp);
        if let Err(e) = tokio::fs::write(&tmp, &self.bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(failed(e));
        }
        tokio::fs::rename(&tmp, path).await.map_err(failed)?;
        debug!("Saved {} bytes to {}", self.len(), path.display());
        Ok(())
    }
}

/// Shared, cloneable registry of live blobs.
#[derive(Debug, Clone, Default)]
pub struct BlobStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: AtomicU64,
    blobs: Mutex<HashMap<BlobUrl, Blob>>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` and return a fresh URL for them.
    pub fn create(&self, bytes: impl Into<Arc<[u8]>>, mime_type: impl Into<String>) -> BlobUrl {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let url = BlobUrl(format!("{URL_PREFIX}{id}"));
        let blob = Blob {
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        };
        debug!("Created {} ({} bytes, {})", url, blob.len(), blob.mime_type);
        self.lock().insert(url.clone(), blob);
        url
    }

    /// Look up a live blob.
    pub fn get(&self, url: &BlobUrl) -> Option<Blob> {
        self.lock().get(url).cloned()
    }

    /// Release a blob. Returns `false` if the URL was unknown or already revoked.
    pub fn revoke(&self, url: &BlobUrl) -> bool {
        let removed = self.lock().remove(url).is_some();
        if removed {
            debug!("Revoked {}", url);
        }
        removed
    }

    /// Release every URL in `urls`.
    pub fn revoke_all<'a>(&self, urls: impl IntoIterator<Item = &'a BlobUrl>) {
        let mut blobs = self.lock();
        for url in urls {
            blobs.remove(url);
        }
    }

    /// Number of blobs not yet revoked.
    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<BlobUrl, Blob>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.inner
            .blobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
