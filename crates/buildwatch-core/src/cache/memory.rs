// # Memory Build Cache
//
// In-memory implementation of BuildCache.
//
// ## Purpose
//
// Provides a simple, fast cache that doesn't persist across restarts.
// Useful for testing, containerized deployments with restarts, or
// scenarios where persistence isn't critical.
//
// ## Crash Behavior
//
// - All state is lost on restart/crash
// - The first poll after a restart treats every job as "new" and
//   re-announces its latest build once
//
// ## When to Use
//
// - Testing environments
// - Deployments where a one-time re-announcement after restart is harmless

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use async_trait::async_trait;

use crate::Error;
use crate::traits::build_cache::{BuildCache, CacheEntry};

/// In-memory build cache implementation
///
/// Entries are keyed by master, then by job name, in a nested HashMap
/// protected by an RwLock. No persistence across restarts.
///
/// # Example
///
/// ```rust,no_run
/// use buildwatch_core::cache::MemoryBuildCache;
/// use buildwatch_core::traits::BuildCache;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let cache = MemoryBuildCache::new();
///
///     cache.set_entry("ci-main", "deploy", 42, false).await?;
///
///     let entry = cache.get_entry("ci-main", "deploy").await?;
///     assert_eq!(entry.map(|e| e.last_build_number), Some(42));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryBuildCache {
    inner: Arc<RwLock<HashMap<String, HashMap<String, CacheEntry>>>>,
}

impl MemoryBuildCache {
    /// Create a new empty memory cache
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Total number of entries across all masters
    pub async fn len(&self) -> usize {
        self.inner.read().await.values().map(|jobs| jobs.len()).sum()
    }

    /// Check if the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Clear all entries
    pub async fn clear(&self) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.clear();
        Ok(())
    }
}

impl Default for MemoryBuildCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BuildCache for MemoryBuildCache {
    async fn list_tracked_jobs(&self, master: &str) -> Result<Vec<String>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .get(master)
            .map(|jobs| jobs.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_entry(&self, master: &str, job: &str) -> Result<Option<CacheEntry>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(master).and_then(|jobs| jobs.get(job)).cloned())
    }

    async fn set_entry(
        &self,
        master: &str,
        job: &str,
        number: u64,
        building: bool,
    ) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard
            .entry(master.to_string())
            .or_default()
            .insert(job.to_string(), CacheEntry::new(number, building));
        Ok(())
    }

    async fn remove_entry(&self, master: &str, job: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        if let Some(jobs) = guard.get_mut(master) {
            jobs.remove(job);
            if jobs.is_empty() {
                guard.remove(master);
            }
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        // No-op for memory cache (everything is already "persisted")
        Ok(())
    }
}
