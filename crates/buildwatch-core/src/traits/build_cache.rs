// # Build Cache Trait
//
// Defines the interface for the last-observed-build cache.
//
// ## Purpose
//
// The cache is what turns repeated polling into change detection:
// - One entry per (master, job) pair the detector has seen with a build
// - An entry records the last announced build number and building flag
// - An entry is removed exactly when the job vanishes from the live listing
//
// ## Implementations
//
// - In-memory: `MemoryBuildCache` (testing, restart-tolerant deployments)
// - File-based: `FileBuildCache` (JSON with atomic writes and backup recovery)
//
// ## Usage
//
// ```rust,ignore
// use buildwatch_core::BuildCache;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let cache = /* BuildCache implementation */;
//
//     let entry = cache.get_entry("ci-main", "deploy").await?;
//     cache.set_entry("ci-main", "deploy", 42, false).await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Last observed build state for a (master, job) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The last announced build number
    pub last_build_number: u64,
    /// Whether that build was still running when announced
    pub building: bool,
    /// When this entry was last written (bookkeeping only, never compared)
    pub observed_at: chrono::DateTime<chrono::Utc>,
}

impl CacheEntry {
    /// Create a new cache entry stamped with the current time
    ///
    /// # Visibility
    ///
    /// This is `pub(crate)` to keep entry creation inside the detector and
    /// cache implementations; external code only reads entries.
    pub(crate) fn new(last_build_number: u64, building: bool) -> Self {
        Self {
            last_build_number,
            building,
            observed_at: chrono::Utc::now(),
        }
    }

    /// Whether the cached state matches the given (number, building) pair
    ///
    /// Only this pair drives change detection; build results never do.
    pub fn matches(&self, number: u64, building: bool) -> bool {
        self.last_build_number == number && self.building == building
    }
}

/// Trait for build cache implementations
///
/// This trait defines the interface for per-(master, job) state storage.
/// Implementations must be thread-safe and usable across async tasks:
/// slow poll ticks may overlap, so concurrent access to different keys
/// must be safe, and read-modify-write of a single key is only ever done
/// by one logical path per tick.
///
/// # Implementation Guidelines
///
/// - **Async I/O only**: never block the runtime on file access
/// - **Explicit flush**: `flush()` must persist all pending changes
/// - **No business logic**: deciding what to write is owned by the detector
#[async_trait]
pub trait BuildCache: Send + Sync {
    /// List the job names tracked for a master
    async fn list_tracked_jobs(&self, master: &str) -> Result<Vec<String>, crate::Error>;

    /// Get the cache entry for a (master, job) pair
    ///
    /// # Returns
    ///
    /// - `Ok(Some(CacheEntry))`: The last observed state
    /// - `Ok(None)`: The job has never been observed with a build
    /// - `Err(Error)`: Storage error
    async fn get_entry(&self, master: &str, job: &str)
    -> Result<Option<CacheEntry>, crate::Error>;

    /// Create or overwrite the cache entry for a (master, job) pair
    async fn set_entry(
        &self,
        master: &str,
        job: &str,
        number: u64,
        building: bool,
    ) -> Result<(), crate::Error>;

    /// Remove the cache entry for a (master, job) pair
    ///
    /// Removing an entry that does not exist is not an error.
    async fn remove_entry(&self, master: &str, job: &str) -> Result<(), crate::Error>;

    /// Persist any pending changes
    ///
    /// Some implementations may buffer writes. This ensures all changes
    /// are flushed to persistent storage. No-op for in-memory caches.
    async fn flush(&self) -> Result<(), crate::Error>;
}
