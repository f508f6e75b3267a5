// # Event Sink Trait
//
// Defines the interface for publishing build-change notifications.
//
// ## Delivery Semantics
//
// Delivery is best-effort, fire-and-forget:
// - Callers log publish failures and move on
// - No retries, no acknowledgements, no backpressure
// - Event order within one job is chronological (ascending build number)
//
// ## Implementations
//
// - `LogSink` (in-core): writes each event to the tracing log
// - HTTP webhook: `buildwatch-sink-webhook` crate

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::traits::master_source::BuildSnapshot;

/// Sentinel result for a build that is still running and has no result yet
pub const IN_PROGRESS_RESULT: &str = "IN_PROGRESS";

/// Outbound notification describing one build's state at a point in time
///
/// The `result` field is normalized at construction: a missing result
/// becomes [`IN_PROGRESS_RESULT`] while the build is running, and the
/// empty string once it is not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEvent {
    /// Master identifier
    pub master: String,
    /// Job name
    pub job: String,
    /// Build number
    pub number: u64,
    /// Whether the build was running when observed
    pub building: bool,
    /// Normalized build result
    pub result: String,
}

impl BuildEvent {
    /// Build an event from a snapshot, applying result normalization
    pub fn from_snapshot(master: &str, job: &str, build: &BuildSnapshot) -> Self {
        let result = match &build.result {
            Some(result) => result.clone(),
            None if build.building => IN_PROGRESS_RESULT.to_string(),
            None => String::new(),
        };

        Self {
            master: master.to_string(),
            job: job.to_string(),
            number: build.number,
            building: build.building,
            result,
        }
    }
}

/// Trait for event sink implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Implementation Guidelines
///
/// - One delivery attempt per call; return an error on failure
/// - No retry logic, no queueing (callers discard failures by design)
/// - No state (the cache owns everything that persists)
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publish one build event
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The event was handed to the transport
    /// - `Err(Error)`: Delivery failed; the caller logs and discards
    async fn publish(&self, event: &BuildEvent) -> Result<(), crate::Error>;
}

/// Sink that writes each event to the tracing log
///
/// Default sink for deployments that only need observable output, and a
/// convenient stand-in during development.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

impl LogSink {
    /// Create a new log sink
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventSink for LogSink {
    async fn publish(&self, event: &BuildEvent) -> Result<(), crate::Error> {
        tracing::info!(
            master = %event.master,
            job = %event.job,
            number = event.number,
            building = event.building,
            result = %event.result,
            "build event"
        );
        Ok(())
    }
}
