//! Persistent, single-flight response cache.
//!
//! Entries are keyed by the SHA-256 digest of `["ask", identity, prompt]` and
//! stored one JSON file per entry under `<dir>/<first two hex digits>/`. Files
//! are written to a temp path and renamed into place, so readers never see a
//! partial entry.
//!
//! Every key also has an in-memory cell. Concurrent callers for the same key
//! share one computation; later callers in the same process never touch the
//! disk again. Disk failures are logged and otherwise ignored: the cache then
//! behaves as a memory-only cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Whether a value came from the cache or was computed by this caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Miss,
}

/// Identifies one cached answer: the backend identity plus the exact prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    digest: String,
    identity: String,
    prompt: String,
}

impl CacheKey {
    /// Key for an `ask` of `prompt` against the backend named `identity`.
    pub fn for_ask(identity: &str, prompt: &str) -> Self {
        let stable = serde_json::json!(["ask", identity, prompt]).to_string();
        let digest = hex::encode(Sha256::digest(stable.as_bytes()));
        Self {
            digest,
            identity: identity.to_string(),
            prompt: prompt.to_string(),
        }
    }

    /// Lowercase hex SHA-256 digest.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }
}

/// On-disk record. Identity and prompt are stored so a digest collision can
/// be detected instead of served.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    identity: String,
    prompt: String,
    response: String,
    created_at: DateTime<Utc>,
}

/// Response cache shared by every request of one [`Llm`](crate::llm::Llm).
#[derive(Debug, Default)]
pub struct ResponseCache {
    dir: Option<PathBuf>,
    max_age: Option<Duration>,
    cells: Mutex<HashMap<String, Arc<OnceCell<String>>>>,
}

impl ResponseCache {
    /// Cache persisted under `dir`. The directory is created on first store.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Cache under the platform cache directory (`~/.cache/condense` on
    /// Linux). Falls back to memory-only when no cache directory exists.
    pub fn open_default() -> Self {
        match default_dir() {
            Some(dir) => Self::open(dir),
            None => {
                warn!("No platform cache directory; responses will not persist");
                Self::in_memory()
            }
        }
    }

    /// Cache that never touches the disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Treat stored entries older than `max_age` as misses.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Return the cached value for `key`, or run `compute` once and store its
    /// result.
    ///
    /// Concurrent callers with the same key wait for a single computation and
    /// see [`CacheOutcome::Hit`]; only the caller that ran `compute` sees
    /// [`CacheOutcome::Miss`]. A failed computation stores nothing, so the
    /// next caller computes again.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &CacheKey,
        compute: F,
    ) -> Result<(String, CacheOutcome), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        let cell = self.cell_for(key);
        let computed = AtomicBool::new(false);
        let computed_flag = &computed;

        let value = cell
            .get_or_try_init(move || async move {
                if let Some(stored) = self.load(key) {
                    return Ok(stored);
                }
                computed_flag.store(true, Ordering::SeqCst);
                let response = compute().await?;
                self.store(key, &response);
                Ok::<String, E>(response)
            })
            .await?;

        let outcome = if computed.load(Ordering::SeqCst) {
            CacheOutcome::Miss
        } else {
            CacheOutcome::Hit
        };
        Ok((value.clone(), outcome))
    }

    fn cell_for(&self, key: &CacheKey) -> Arc<OnceCell<String>> {
        let mut cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(cells.entry(key.digest.clone()).or_default())
    }

    #[allow(clippy::string_slice)] // hex digest is ASCII
    fn entry_path(&self, key: &CacheKey) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        Some(
            dir.join(&key.digest[..2])
                .join(format!("{}.json", key.digest)),
        )
    }

    fn load(&self, key: &CacheKey) -> Option<String> {
        let path = self.entry_path(key)?;
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Cache read failed for {}: {e}", path.display());
                return None;
            }
        };

        let entry: StoredEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Ignoring corrupt cache entry {}: {e}", path.display());
                return None;
            }
        };

        if entry.identity != key.identity || entry.prompt != key.prompt {
            warn!("Cache digest collision at {}; ignoring entry", path.display());
            return None;
        }

        if let Some(max_age) = self.max_age
            && let Ok(limit) = chrono::Duration::from_std(max_age)
            && Utc::now().signed_duration_since(entry.created_at) > limit
        {
            debug!("Cache entry {} expired", key.digest);
            return None;
        }

        debug!("Cache hit on disk: {}", key.digest);
        Some(entry.response)
    }

    fn store(&self, key: &CacheKey, response: &str) {
        let Some(path) = self.entry_path(key) else {
            return;
        };
        let entry = StoredEntry {
            identity: key.identity.clone(),
            prompt: key.prompt.clone(),
            response: response.to_string(),
            created_at: Utc::now(),
        };
        if let Err(e) = write_atomic(&path, &entry) {
            warn!("Cache write failed for {}: {e}", path.display());
        }
    }
}

/// `<platform cache dir>/condense`, if the platform has one.
pub fn default_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("condense"))
}

fn write_atomic(path: &Path, entry: &StoredEntry) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(entry).map_err(std::io::Error::other)?;
    // Per-process temp name so concurrent writers never share a temp file.
    let tmp = path.with_extension(format!("json.{}.tmp", std::process::id()));
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)
}
