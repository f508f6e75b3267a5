//! Change detection for one master, one poll cycle
//!
//! The ChangeDetector is responsible for:
//! - Diffing a master's live job listing against the build cache
//! - Replaying intermediate builds missed between two poll cycles
//! - Mutating the cache (it is the only writer)
//! - Publishing one BuildEvent per detected build-state change
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ MasterSource │─── live jobs / histories ───┐
//! └──────────────┘                             ▼
//!                                     ┌────────────────┐
//!                                     │ ChangeDetector │
//!                                     └────────────────┘
//!                                              │
//!                       ┌──────────────────────┼──────────────────────┐
//!                       ▼                      ▼                      ▼
//!               ┌──────────────┐       ┌──────────────┐       ┌──────────────┐
//!               │  BuildCache  │       │  EventSink   │       │ ChangeRecord │
//!               │  (mutate)    │       │  (publish)   │       │  (return)    │
//!               └──────────────┘       └──────────────┘       └──────────────┘
//! ```
//!
//! ## Detection Flow
//!
//! 1. Removal pass: drop cache entries for jobs gone from the live listing
//! 2. Per-job pass: announce new jobs, diff (number, building) for known ones
//! 3. Changed jobs replay their missed builds in ascending number order
//! 4. Cache mutations are mutate-as-you-go, never batched
//!
//! Event order within one job is chronological; consumers rely on it.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::traits::{BuildCache, BuildEvent, BuildSnapshot, CacheEntry, EventSink, MasterSource};

/// Detected before/after state for one job in one poll cycle
///
/// Produced exactly once per changed job per cycle, never for unchanged
/// jobs, and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    /// Job name
    pub job: String,
    /// Cached state before this cycle; `None` for a newly observed job
    pub previous: Option<CacheEntry>,
    /// Live snapshot that triggered the change
    pub current: BuildSnapshot,
}

/// Per-master change detector
///
/// Owns all cache mutation. One call to [`ChangeDetector::detect`] is one
/// poll cycle for one master; masters are independent and may be detected
/// concurrently.
pub struct ChangeDetector {
    source: Arc<dyn MasterSource>,
    cache: Arc<dyn BuildCache>,
    sink: Arc<dyn EventSink>,
}

impl ChangeDetector {
    /// Create a new change detector
    pub fn new(
        source: Arc<dyn MasterSource>,
        cache: Arc<dyn BuildCache>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            source,
            cache,
            sink,
        }
    }

    /// Run one detection pass for one master
    ///
    /// Lists the master's jobs, removes cache entries for vanished jobs,
    /// announces new and changed builds (replaying intermediate builds the
    /// poller missed), and updates the cache as it goes.
    ///
    /// # Errors
    ///
    /// Fails only when the live job listing itself cannot be obtained.
    /// Everything downstream (history fetches, publishes, per-job cache
    /// writes) is scoped to the smallest unit and logged, never propagated.
    pub async fn detect(&self, master: &str) -> Result<Vec<ChangeRecord>> {
        let jobs = self.source.list_jobs(master).await?;
        let live_names: HashSet<&str> = jobs.iter().map(|job| job.name.as_str()).collect();

        // Removal pass: pure set subtraction, no events
        self.remove_vanished(master, &live_names).await;

        // Per-job pass, in listing order
        let mut records = Vec::new();
        for job in &jobs {
            let Some(current) = &job.last_build else {
                // Never built: nothing to detect yet
                continue;
            };

            let previous = match self.cache.get_entry(master, &job.name).await {
                Ok(previous) => previous,
                Err(e) => {
                    warn!(master, job = %job.name, "cache read failed: {}", e);
                    continue;
                }
            };

            match &previous {
                Some(entry) if entry.matches(current.number, current.building) => {
                    // No change: no event, no mutation, no record
                    continue;
                }
                Some(entry) => {
                    debug!(
                        master,
                        job = %job.name,
                        from = entry.last_build_number,
                        to = current.number,
                        "job changed"
                    );
                    self.replay_missed_builds(master, &job.name, entry, current)
                        .await;
                }
                None => {
                    debug!(master, job = %job.name, number = current.number, "new job");
                }
            }

            // Announce the current state itself (new and changed jobs alike)
            self.publish(master, &job.name, current).await;

            if let Err(e) = self
                .cache
                .set_entry(master, &job.name, current.number, current.building)
                .await
            {
                warn!(master, job = %job.name, "cache write failed: {}", e);
                continue;
            }

            records.push(ChangeRecord {
                job: job.name.clone(),
                previous,
                current: current.clone(),
            });
        }

        Ok(records)
    }

    /// Remove cache entries for jobs absent from the live listing
    async fn remove_vanished(&self, master: &str, live_names: &HashSet<&str>) {
        let tracked = match self.cache.list_tracked_jobs(master).await {
            Ok(tracked) => tracked,
            Err(e) => {
                warn!(master, "failed to list tracked jobs: {}", e);
                return;
            }
        };

        for job in tracked {
            if live_names.contains(job.as_str()) {
                continue;
            }
            debug!(master, job = %job, "job vanished, dropping cache entry");
            if let Err(e) = self.cache.remove_entry(master, &job).await {
                warn!(master, job = %job, "cache remove failed: {}", e);
            }
        }
    }

    /// Replay builds that completed between two poll cycles
    ///
    /// Fetches the job's full history and publishes every build in
    /// `cached.number <= number < current.number`, ascending. The build
    /// equal to the cached number is suppressed when its building flag is
    /// unchanged: it was already announced with no new information.
    ///
    /// Best-effort throughout: a failed history fetch skips the backfill
    /// only, and one build's publish failure never aborts the rest.
    async fn replay_missed_builds(
        &self,
        master: &str,
        job: &str,
        cached: &CacheEntry,
        current: &BuildSnapshot,
    ) {
        let mut history = match self.source.list_builds(master, job).await {
            Ok(history) => history,
            Err(e) => {
                warn!(master, job, "history fetch failed, skipping backfill: {}", e);
                return;
            }
        };

        history.sort_by_key(|build| build.number);

        for build in &history {
            if build.number < cached.last_build_number || build.number >= current.number {
                continue;
            }
            if build.number == cached.last_build_number && build.building == cached.building {
                // Already announced as-is when it was the latest build
                continue;
            }
            self.publish(master, job, build).await;
        }
    }

    /// Publish one event, logging and discarding failures
    async fn publish(&self, master: &str, job: &str, build: &BuildSnapshot) {
        let event = BuildEvent::from_snapshot(master, job, build);
        if let Err(e) = self.sink.publish(&event).await {
            warn!(master, job, number = build.number, "event publish failed: {}", e);
        }
    }
}
