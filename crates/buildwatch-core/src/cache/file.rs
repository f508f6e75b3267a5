// # File Build Cache
//
// File-based implementation of BuildCache with crash recovery.
//
// ## Purpose
//
// Persists the last observed build state across daemon restarts so that a
// restart does not re-announce builds that were already published.
//
// ## Crash Recovery
//
// - Atomic writes: write-then-rename
// - Corruption detection: JSON validation on load
// - Automatic backup: keeps .backup of the last known good state
// - Recovery: falls back to the backup if corruption is detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "masters": {
//     "ci-main": {
//       "deploy": {
//         "last_build_number": 42,
//         "building": false,
//         "observed_at": "2026-08-01T12:00:00Z"
//       }
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::build_cache::{BuildCache, CacheEntry};

/// Cache file format version, for future migration if the format changes
const CACHE_FILE_VERSION: &str = "1.0";

type MasterMap = HashMap<String, HashMap<String, CacheEntry>>;

/// File-based build cache with crash recovery
///
/// Persists entries to a JSON file with atomic writes and automatic
/// corruption recovery.
///
/// # Example
///
/// ```rust,no_run
/// use buildwatch_core::cache::FileBuildCache;
/// use buildwatch_core::traits::BuildCache;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let cache = FileBuildCache::new("/var/lib/buildwatch/cache.json").await?;
///
///     cache.set_entry("ci-main", "deploy", 42, false).await?;
///
///     let entry = cache.get_entry("ci-main", "deploy").await?;
///     assert_eq!(entry.map(|e| e.last_build_number), Some(42));
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileBuildCache {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    masters: MasterMap,
    dirty: bool,
}

/// Serializable cache file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct CacheFileFormat {
    version: String,
    masters: MasterMap,
}

impl FileBuildCache {
    /// Create or load a file build cache
    ///
    /// This will:
    /// 1. Try to load the existing cache file
    /// 2. If corruption is detected, try to load from the backup
    /// 3. If both fail, start with an empty cache
    /// 4. Create parent directories if needed
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "failed to create cache directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let masters = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                masters,
                dirty: false,
            })),
        })
    }

    /// Load the cache file with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try the main cache file
    /// 2. On a JSON parse error, try the backup
    /// 3. If the backup also fails, start with an empty cache
    async fn load_with_recovery(path: &Path) -> Result<MasterMap, Error> {
        match Self::load(path).await {
            Ok(masters) => {
                tracing::debug!("loaded build cache: {} master(s)", masters.len());
                Ok(masters)
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "cache file appears corrupted: {}. attempting recovery from backup",
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("no backup file found, starting with empty cache");
                    return Ok(HashMap::new());
                }

                match Self::load(&backup_path).await {
                    Ok(masters) => {
                        tracing::info!(
                            "recovered build cache from backup: {} master(s)",
                            masters.len()
                        );

                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "failed to restore cache file from backup: {}",
                                restore_err
                            );
                        }

                        Ok(masters)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "backup also corrupted: {}. starting with empty cache",
                            backup_err
                        );
                        Ok(HashMap::new())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Load the cache from a file
    async fn load(path: &Path) -> Result<MasterMap, Error> {
        if !path.exists() {
            tracing::debug!("cache file does not exist: {}", path.display());
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::cache(format!(
                "failed to read cache file {}: {}",
                path.display(),
                e
            ))
        })?;

        let cache_file: CacheFileFormat = serde_json::from_str(&content)?;

        if cache_file.version != CACHE_FILE_VERSION {
            tracing::warn!(
                "cache file version mismatch: expected {}, got {}. attempting to load anyway",
                CACHE_FILE_VERSION,
                cache_file.version
            );
        }

        Ok(cache_file.masters)
    }

    /// Write the cache to disk atomically
    async fn write(&self) -> Result<(), Error> {
        let state_guard = self.state.read().await;

        let cache_file = CacheFileFormat {
            version: CACHE_FILE_VERSION.to_string(),
            masters: state_guard.masters.clone(),
        };

        let json = serde_json::to_string_pretty(&cache_file)?;
        drop(state_guard);

        // Write to a temporary file first
        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::cache(format!(
                    "failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::cache(format!(
                    "failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::cache(format!(
                    "failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        // Back up the current file before replacing it
        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("failed to create cache backup: {}", e);
            }
        }

        // Atomic rename (temp -> actual)
        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::cache(format!(
                "failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        {
            let mut state_guard = self.state.write().await;
            state_guard.dirty = false;
        }

        tracing::trace!("build cache written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl BuildCache for FileBuildCache {
    async fn list_tracked_jobs(&self, master: &str) -> Result<Vec<String>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard
            .masters
            .get(master)
            .map(|jobs| jobs.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_entry(&self, master: &str, job: &str) -> Result<Option<CacheEntry>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard
            .masters
            .get(master)
            .and_then(|jobs| jobs.get(job))
            .cloned())
    }

    async fn set_entry(
        &self,
        master: &str,
        job: &str,
        number: u64,
        building: bool,
    ) -> Result<(), Error> {
        {
            let mut state_guard = self.state.write().await;
            state_guard
                .masters
                .entry(master.to_string())
                .or_default()
                .insert(job.to_string(), CacheEntry::new(number, building));
            state_guard.dirty = true;
        }

        // Immediate write for durability
        self.write().await
    }

    async fn remove_entry(&self, master: &str, job: &str) -> Result<(), Error> {
        {
            let mut state_guard = self.state.write().await;
            if let Some(jobs) = state_guard.masters.get_mut(master) {
                jobs.remove(job);
                if jobs.is_empty() {
                    state_guard.masters.remove(master);
                }
            }
            state_guard.dirty = true;
        }

        // Immediate write for durability
        self.write().await
    }

    async fn flush(&self) -> Result<(), Error> {
        let state_guard = self.state.read().await;
        if state_guard.dirty {
            drop(state_guard);
            self.write().await
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_cache_basic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let cache = FileBuildCache::new(&path).await.unwrap();

        // Initially empty
        let tracked = cache.list_tracked_jobs("ci-main").await.unwrap();
        assert!(tracked.is_empty());

        // Set and get
        cache.set_entry("ci-main", "deploy", 42, false).await.unwrap();

        let entry = cache.get_entry("ci-main", "deploy").await.unwrap().unwrap();
        assert_eq!(entry.last_build_number, 42);

        // Verify the file was written
        assert!(path.exists());

        // Load a new instance and verify persistence
        let cache2 = FileBuildCache::new(&path).await.unwrap();
        let entry2 = cache2.get_entry("ci-main", "deploy").await.unwrap().unwrap();
        assert_eq!(entry2.last_build_number, 42);
        assert!(!entry2.building);
    }

    #[tokio::test]
    async fn test_file_cache_corruption_recovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        // First write, then a second so the backup exists
        let cache = FileBuildCache::new(&path).await.unwrap();
        cache.set_entry("ci-main", "deploy", 1, false).await.unwrap();
        cache.set_entry("ci-main", "deploy", 2, false).await.unwrap();

        let backup_path = FileBuildCache::backup_path(&path);
        assert!(backup_path.exists(), "backup file should exist after write");

        // Corrupt the cache file
        fs::write(&path, b"corrupted json data").await.unwrap();

        // Load should recover from the backup (previous state, before last write)
        let cache2 = FileBuildCache::new(&path).await.unwrap();
        let recovered = cache2.get_entry("ci-main", "deploy").await.unwrap().unwrap();
        assert_eq!(recovered.last_build_number, 1);
    }

    #[tokio::test]
    async fn test_file_cache_remove_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let cache = FileBuildCache::new(&path).await.unwrap();
        cache.set_entry("ci-main", "deploy", 1, false).await.unwrap();
        cache.set_entry("ci-main", "smoke", 3, true).await.unwrap();
        cache.remove_entry("ci-main", "deploy").await.unwrap();

        let cache2 = FileBuildCache::new(&path).await.unwrap();
        assert!(cache2.get_entry("ci-main", "deploy").await.unwrap().is_none());
        assert!(cache2.get_entry("ci-main", "smoke").await.unwrap().is_some());
    }
}
