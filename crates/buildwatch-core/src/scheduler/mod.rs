//! Periodic, fleet-safe polling
//!
//! The PollScheduler drives the ChangeDetector on a fixed interval across
//! all configured masters, gated by the instance-health oracle.
//!
//! ## Tick Flow
//!
//! 1. Query the health oracle. Out of service: clear the last-poll
//!    timestamp and skip the tick entirely (no masters contacted).
//!    Oracle error or absent: fail open, poll anyway.
//! 2. Record the tick start time, then run the detector once per master
//!    concurrently, each inside its own error boundary.
//!
//! ## Timing Model
//!
//! Each tick's work is spawned as its own task, so the timer re-arms when
//! a handler starts rather than when it completes. Slow ticks may overlap;
//! per-(master, job) cache keys are independent, so overlapping ticks are
//! tolerated rather than excluded.
//!
//! ## Failure Signal
//!
//! The last-poll timestamp is the externally observable health signal. It
//! is `None` before the first tick and whenever the oracle reports out of
//! service; a stale value means a stalled poller.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::MonitorConfig;
use crate::detector::{ChangeDetector, ChangeRecord};
use crate::error::Result;
use crate::traits::InstanceHealth;

/// Default poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Periodic poll driver
///
/// ## Lifecycle
///
/// 1. Create with [`PollScheduler::new`]
/// 2. Activate with [`PollScheduler::start`] (first tick fires immediately)
/// 3. Deactivate with [`PollScheduler::stop`] (safe to call at any time)
///
/// Cloning is cheap; all state is shared behind `Arc`.
#[derive(Clone)]
pub struct PollScheduler {
    detector: Arc<ChangeDetector>,
    health: Option<Arc<dyn InstanceHealth>>,
    masters: Arc<Vec<String>>,
    interval: Duration,
    last_poll: Arc<std::sync::RwLock<Option<DateTime<Utc>>>>,
    timer: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PollScheduler {
    /// Create a new scheduler
    ///
    /// # Parameters
    ///
    /// - `detector`: Change detector shared across ticks
    /// - `health`: Instance-health oracle; `None` means always in service
    /// - `masters`: Masters to poll each tick
    /// - `interval`: Poll interval (see [`DEFAULT_POLL_INTERVAL`])
    pub fn new(
        detector: Arc<ChangeDetector>,
        health: Option<Arc<dyn InstanceHealth>>,
        masters: Vec<String>,
        interval: Duration,
    ) -> Self {
        Self {
            detector,
            health,
            masters: Arc::new(masters),
            interval,
            last_poll: Arc::new(std::sync::RwLock::new(None)),
            timer: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a scheduler from a monitor configuration
    ///
    /// Validates the configuration, then polls its enabled masters at the
    /// configured interval.
    pub fn from_config(
        detector: Arc<ChangeDetector>,
        health: Option<Arc<dyn InstanceHealth>>,
        config: &MonitorConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            detector,
            health,
            config.enabled_masters(),
            Duration::from_secs(config.scheduler.interval_secs),
        ))
    }

    /// Start periodic polling
    ///
    /// Spawns the timer task; the first tick fires immediately. Calling
    /// `start` while already running replaces the previous timer.
    pub async fn start(&self) {
        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(scheduler.interval);
            loop {
                timer.tick().await;
                // Spawn the handler so a slow tick never delays the timer
                let tick = scheduler.clone();
                tokio::spawn(async move { tick.run_tick().await });
            }
        });

        let mut timer_guard = self.timer.lock().await;
        if let Some(previous) = timer_guard.replace(handle) {
            previous.abort();
        }
        info!(
            masters = self.masters.len(),
            interval_secs = self.interval.as_secs(),
            "poll scheduler started"
        );
    }

    /// Stop periodic polling
    ///
    /// Cancels the timer; safe to call if never started or already
    /// stopped. In-flight tick work is allowed to run to completion.
    pub async fn stop(&self) {
        let mut timer_guard = self.timer.lock().await;
        if let Some(handle) = timer_guard.take() {
            handle.abort();
            info!("poll scheduler stopped");
        }
    }

    /// Timestamp of the start of the last in-service tick
    ///
    /// `None` before the first tick and whenever the instance is out of
    /// service. Readable at any time by health-check consumers.
    pub fn last_poll(&self) -> Option<DateTime<Utc>> {
        *self
            .last_poll
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Poll a single master on demand, through the same health gate
    ///
    /// Out of service: clears the last-poll timestamp and returns an empty
    /// list without touching the master.
    pub async fn poll_once(&self, master: &str) -> Result<Vec<ChangeRecord>> {
        if !self.gate().await {
            return Ok(Vec::new());
        }
        self.set_last_poll(Some(Utc::now()));
        self.detector.detect(master).await
    }

    /// One scheduled tick: health gate, then per-master fan-out
    async fn run_tick(&self) {
        if !self.gate().await {
            return;
        }
        self.set_last_poll(Some(Utc::now()));

        let mut checks = Vec::with_capacity(self.masters.len());
        for master in self.masters.iter() {
            let detector = Arc::clone(&self.detector);
            let master = master.clone();
            checks.push(tokio::spawn(async move {
                // Per-master error boundary: log and continue; the next
                // tick is the retry
                match detector.detect(&master).await {
                    Ok(records) if !records.is_empty() => {
                        info!(master = %master, changes = records.len(), "poll detected changes");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(master = %master, "poll failed: {}", e);
                    }
                }
            }));
        }

        for check in checks {
            if let Err(e) = check.await {
                error!("poll task panicked: {}", e);
            }
        }
    }

    /// Evaluate the health gate
    ///
    /// Returns `true` when polling should proceed. An oracle error fails
    /// OPEN: a health-check outage must not silently stop the whole fleet.
    /// Only an explicit out-of-service answer stops polling, and that also
    /// clears the last-poll timestamp so observers can tell intentionally
    /// idle from stalled.
    async fn gate(&self) -> bool {
        let Some(health) = &self.health else {
            return true;
        };

        match health.is_in_service().await {
            Ok(true) => true,
            Ok(false) => {
                info!("instance out of service, skipping poll");
                self.set_last_poll(None);
                false
            }
            Err(e) => {
                warn!("health oracle unreachable, failing open: {}", e);
                true
            }
        }
    }

    fn set_last_poll(&self, value: Option<DateTime<Utc>>) {
        let mut guard = self
            .last_poll
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = value;
    }
}
