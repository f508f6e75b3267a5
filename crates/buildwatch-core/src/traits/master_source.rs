// # Master Source Trait
//
// Defines the interface for reading job and build state from one CI master.
//
// ## Implementations
//
// - Jenkins JSON API: `buildwatch-source-jenkins` crate
// - Future: GitLab, Buildkite, any server exposing job/build listings
//
// ## Usage
//
// ```rust,ignore
// use buildwatch_core::MasterSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* MasterSource implementation */;
//
//     for job in source.list_jobs("ci-main").await? {
//         println!("{}: {:?}", job.name, job.last_build);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One numbered execution of a job, as observed at a point in time.
///
/// Build numbers are strictly increasing per job in creation order, but
/// not necessarily contiguous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSnapshot {
    /// Build number
    pub number: u64,
    /// Whether the build is still running
    pub building: bool,
    /// Build result, absent while the build is in flight (and for some
    /// aborted builds)
    pub result: Option<String>,
}

impl BuildSnapshot {
    /// Create a finished build snapshot with the given result
    pub fn finished(number: u64, result: impl Into<String>) -> Self {
        Self {
            number,
            building: false,
            result: Some(result.into()),
        }
    }

    /// Create a snapshot for a build that is still running
    pub fn in_flight(number: u64) -> Self {
        Self {
            number,
            building: true,
            result: None,
        }
    }
}

/// A named job hosted on a master, with its latest build if one exists.
///
/// A job that has never been built carries `last_build: None` and is
/// skipped by change detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Job name, unique within a master
    pub name: String,
    /// Latest build snapshot, if the job has been built at least once
    pub last_build: Option<BuildSnapshot>,
}

impl Job {
    /// Create a job with a latest-build snapshot
    pub fn new(name: impl Into<String>, last_build: Option<BuildSnapshot>) -> Self {
        Self {
            name: name.into(),
            last_build,
        }
    }
}

/// Trait for master data-source implementations
///
/// The data source is authoritative for job ownership; this core only
/// observes. Both methods are single-shot reads: failures surface as an
/// error for that call only, and the caller decides how to scope them.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Implementation Guidelines
///
/// - No retry logic (the scheduler's next tick is the retry)
/// - No caching of listings (state is owned by `BuildCache`)
/// - Returned builds may be unsorted; the detector sorts them itself
#[async_trait]
pub trait MasterSource: Send + Sync {
    /// List the current jobs on a master
    ///
    /// # Parameters
    ///
    /// - `master`: Master identifier
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<Job>)`: The live job listing
    /// - `Err(Error)`: The master was unreachable or returned bad data
    async fn list_jobs(&self, master: &str) -> Result<Vec<Job>, crate::Error>;

    /// Fetch the full build history of one job
    ///
    /// # Parameters
    ///
    /// - `master`: Master identifier
    /// - `job`: Job name
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<BuildSnapshot>)`: All known builds, in any order
    /// - `Err(Error)`: The fetch failed
    async fn list_builds(&self, master: &str, job: &str)
    -> Result<Vec<BuildSnapshot>, crate::Error>;
}
