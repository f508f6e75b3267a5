// # Instance Health Trait
//
// Defines the interface for the fleet-level polling gate.
//
// ## Purpose
//
// When the monitor runs horizontally scaled, an external status source
// reports which instances should be considered "in service". Only those
// instances actively poll; the rest idle with an unknown last-poll
// timestamp so an observer can tell intentionally idle from stalled.
//
// This is a weak substitute for leader election, kept deliberately weak:
// it is a boolean predicate, not a consensus protocol, and multiple
// instances may poll concurrently if the oracle reports all of them up.
//
// ## Failure Policy
//
// The scheduler fails OPEN when the oracle errors or is absent: a
// health-check outage must not silently stop polling fleet-wide. Only an
// explicit `false` stops polling.

use async_trait::async_trait;

/// Trait for instance-health oracle implementations
#[async_trait]
pub trait InstanceHealth: Send + Sync {
    /// Whether this process instance should currently poll
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: In service; poll normally
    /// - `Ok(false)`: Out of service; skip polling entirely
    /// - `Err(Error)`: Oracle unreachable; the scheduler treats this as
    ///   in service (fail open) and logs a warning
    async fn is_in_service(&self) -> Result<bool, crate::Error>;
}

/// Health oracle that always reports a fixed status
///
/// Used as the default (always in service) and for single-instance
/// deployments with no external status source.
#[derive(Debug, Clone, Copy)]
pub struct StaticHealth {
    in_service: bool,
}

impl StaticHealth {
    /// Create a health oracle with a fixed status
    pub fn new(in_service: bool) -> Self {
        Self { in_service }
    }

    /// Oracle that always reports in service
    pub fn in_service() -> Self {
        Self::new(true)
    }

    /// Oracle that always reports out of service
    pub fn out_of_service() -> Self {
        Self::new(false)
    }
}

impl Default for StaticHealth {
    fn default() -> Self {
        Self::in_service()
    }
}

#[async_trait]
impl InstanceHealth for StaticHealth {
    async fn is_in_service(&self) -> Result<bool, crate::Error> {
        Ok(self.in_service)
    }
}
