//! Content-addressed, namespaced disk cache with a TTL.
//!
//! ## Layout
//!
//! ```text
//! <root>/
//!   page/<hash>.html               # raw page markup
//!   candidate_list/<hash>.json     # extracted candidates for a page
//!   classification/<hash>.json     # classifier result for an image URL
//!   metadata.json                  # "<namespace>/<hash>" -> identity, timestamp
//! ```
//!
//! `<hash>` is [`compute_hash`] of the entry's identity (a page or image URL).
//! Freshness is decided lazily on read from the index timestamp; stale entries
//! stay on disk until overwritten or cleared.
//!
//! Every failure here degrades to "not cached": reads return `None`/`false`
//! and log, writes return [`AppError::CacheError`] for the caller to log.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::compute_hash;

const METADATA_FILE: &str = "metadata.json";

/// Independent storage partition of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Page,
    CandidateList,
    Classification,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [
        Namespace::Page,
        Namespace::CandidateList,
        Namespace::Classification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Page => "page",
            Namespace::CandidateList => "candidate_list",
            Namespace::Classification => "classification",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            Namespace::Page => "html",
            Namespace::CandidateList | Namespace::Classification => "json",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Index record for one cached payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub identity: String,
    pub timestamp: DateTime<Utc>,
    pub namespace: Namespace,
}

struct CacheInner {
    root: PathBuf,
    ttl: TimeDelta,
    metadata: Mutex<BTreeMap<String, MetadataEntry>>,
}

/// Handle to an on-disk cache. Cheap to clone; clones share the index.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<CacheInner>,
}

impl fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("root", &self.inner.root)
            .field("ttl", &self.inner.ttl)
            .finish()
    }
}

impl CacheStore {
    /// Opens (creating if needed) a cache rooted at `root`.
    ///
    /// An unreadable index is logged and replaced by an empty one.
    pub fn open(root: impl AsRef<Path>, ttl: TimeDelta) -> Result<Self, AppError> {
        let root = root.as_ref().to_path_buf();
        for ns in Namespace::ALL {
            let dir = root.join(ns.as_str());
            fs::create_dir_all(&dir).map_err(|e| {
                AppError::CacheError(format!("Failed to create {}: {e}", dir.display()))
            })?;
        }

        let metadata = load_metadata(&root.join(METADATA_FILE));
        tracing::debug!(root = %root.display(), entries = metadata.len(), "Cache opened");

        Ok(Self {
            inner: Arc::new(CacheInner {
                root,
                ttl,
                metadata: Mutex::new(metadata),
            }),
        })
    }

    /// Stores `payload` for `identity`, stamped with the current time.
    pub fn put(&self, ns: Namespace, identity: &str, payload: &[u8]) -> Result<(), AppError> {
        self.put_at(ns, identity, payload, Utc::now())
    }

    pub(crate) fn put_at(
        &self,
        ns: Namespace,
        identity: &str,
        payload: &[u8],
        timestamp: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let hash = compute_hash(identity);
        atomic_write(&self.entry_path(ns, &hash), payload)?;

        let mut metadata = self.lock_metadata();
        metadata.insert(
            index_key(ns, &hash),
            MetadataEntry {
                identity: identity.to_string(),
                timestamp,
                namespace: ns,
            },
        );
        self.save_metadata(&metadata)?;

        tracing::debug!(namespace = %ns, %identity, "Cached entry");
        Ok(())
    }

    /// Returns the payload if the entry exists and has not expired.
    pub fn get(&self, ns: Namespace, identity: &str) -> Option<Vec<u8>> {
        if !self.is_valid(ns, identity) {
            return None;
        }
        let path = self.entry_path(ns, &compute_hash(identity));
        match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(
                    namespace = %ns,
                    %identity,
                    error = %e,
                    "Failed to read cache entry"
                );
                None
            }
        }
    }

    /// True if the entry is indexed, its payload file exists, and it is
    /// no older than the TTL.
    pub fn is_valid(&self, ns: Namespace, identity: &str) -> bool {
        let hash = compute_hash(identity);
        let timestamp = match self.lock_metadata().get(&index_key(ns, &hash)) {
            Some(entry) => entry.timestamp,
            None => return false,
        };

        if !self.entry_path(ns, &hash).exists() {
            return false;
        }

        if Utc::now() - timestamp > self.inner.ttl {
            tracing::debug!(namespace = %ns, %identity, %timestamp, "Cache entry expired");
            return false;
        }
        true
    }

    /// Index record for an entry, regardless of freshness.
    pub fn metadata(&self, ns: Namespace, identity: &str) -> Option<MetadataEntry> {
        self.lock_metadata()
            .get(&index_key(ns, &compute_hash(identity)))
            .cloned()
    }

    pub fn put_text(&self, ns: Namespace, identity: &str, text: &str) -> Result<(), AppError> {
        self.put(ns, identity, text.as_bytes())
    }

    pub fn get_text(&self, ns: Namespace, identity: &str) -> Option<String> {
        let bytes = self.get(ns, identity)?;
        match String::from_utf8(bytes) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(namespace = %ns, %identity, error = %e, "Cached text is not UTF-8");
                None
            }
        }
    }

    pub fn put_json<T: Serialize>(
        &self,
        ns: Namespace,
        identity: &str,
        value: &T,
    ) -> Result<(), AppError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.put(ns, identity, &bytes)
    }

    pub fn get_json<T: DeserializeOwned>(&self, ns: Namespace, identity: &str) -> Option<T> {
        let bytes = self.get(ns, identity)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(
                    namespace = %ns,
                    %identity,
                    error = %e,
                    "Failed to decode cached JSON"
                );
                None
            }
        }
    }

    /// Removes every entry stored for `identity`, in all namespaces.
    pub fn clear(&self, identity: &str) -> Result<(), AppError> {
        let hash = compute_hash(identity);
        for ns in Namespace::ALL {
            remove_if_exists(&self.entry_path(ns, &hash))?;
        }

        let mut metadata = self.lock_metadata();
        for ns in Namespace::ALL {
            metadata.remove(&index_key(ns, &hash));
        }
        self.save_metadata(&metadata)?;

        tracing::info!(%identity, "Cleared cache entries");
        Ok(())
    }

    /// Removes every cached payload and empties the index.
    pub fn clear_all(&self) -> Result<(), AppError> {
        for ns in Namespace::ALL {
            let dir = self.inner.root.join(ns.as_str());
            let entries = fs::read_dir(&dir).map_err(|e| {
                AppError::CacheError(format!("Failed to list {}: {e}", dir.display()))
            })?;
            for entry in entries.flatten() {
                remove_if_exists(&entry.path())?;
            }
        }

        let mut metadata = self.lock_metadata();
        metadata.clear();
        self.save_metadata(&metadata)?;

        tracing::info!(root = %self.inner.root.display(), "Cleared entire cache");
        Ok(())
    }

    fn entry_path(&self, ns: Namespace, hash: &str) -> PathBuf {
        self.inner
            .root
            .join(ns.as_str())
            .join(format!("{hash}.{}", ns.extension()))
    }

    fn lock_metadata(&self) -> MutexGuard<'_, BTreeMap<String, MetadataEntry>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.inner
            .metadata
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Rewrites the whole index. Callers hold the metadata lock.
    fn save_metadata(&self, metadata: &BTreeMap<String, MetadataEntry>) -> Result<(), AppError> {
        let bytes = serde_json::to_vec_pretty(metadata)?;
        atomic_write(&self.inner.root.join(METADATA_FILE), &bytes).inspect_err(|e| {
            tracing::error!(error = %e, "Failed to save cache metadata");
        })
    }
}

fn index_key(ns: Namespace, hash: &str) -> String {
    format!("{}/{hash}", ns.as_str())
}

fn load_metadata(path: &Path) -> BTreeMap<String, MetadataEntry> {
    if !path.exists() {
        return BTreeMap::new();
    }
    let parsed = fs::read(path)
        .map_err(|e| e.to_string())
        .and_then(|bytes| serde_json::from_slice(&bytes).map_err(|e| e.to_string()));
    match parsed {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to load cache metadata");
            BTreeMap::new()
        }
    }
}

/// Write via a uniquely named temp file + rename so readers never observe a
/// partially written file.
fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    let tmp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
    fs::write(&tmp_path, bytes).map_err(|e| {
        AppError::CacheError(format!("Failed to write {}: {e}", tmp_path.display()))
    })?;

    #[cfg(target_os = "windows")]
    if path.exists() {
        let _ = fs::remove_file(path);
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        AppError::CacheError(format!("Failed to commit {}: {e}", path.display()))
    })
}

fn remove_if_exists(path: &Path) -> Result<(), AppError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AppError::CacheError(format!(
            "Failed to remove {}: {e}",
            path.display()
        ))),
    }
}
