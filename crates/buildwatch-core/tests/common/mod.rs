//! Test doubles and common utilities for the contract tests
//!
//! Minimal scripted collaborators that record every interaction so the
//! tests can assert exactly what the detector and scheduler touched.

use buildwatch_core::error::Result;
use buildwatch_core::traits::{
    BuildCache, BuildEvent, BuildSnapshot, CacheEntry, EventSink, InstanceHealth, Job,
    MasterSource,
};
use buildwatch_core::{Error, MemoryBuildCache};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A master source whose listings and histories are scripted by the test
#[derive(Default)]
pub struct ScriptedSource {
    jobs: Mutex<HashMap<String, Vec<Job>>>,
    histories: Mutex<HashMap<(String, String), Vec<BuildSnapshot>>>,
    failing_masters: Mutex<HashSet<String>>,
    failing_histories: Mutex<HashSet<(String, String)>>,
    list_jobs_calls: AtomicUsize,
    list_builds_calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the live job listing for a master
    pub fn set_jobs(&self, master: &str, jobs: Vec<Job>) {
        self.jobs.lock().unwrap().insert(master.to_string(), jobs);
    }

    /// Script the build history for one job
    pub fn set_history(&self, master: &str, job: &str, builds: Vec<BuildSnapshot>) {
        self.histories
            .lock()
            .unwrap()
            .insert((master.to_string(), job.to_string()), builds);
    }

    /// Make `list_jobs` fail for a master
    pub fn fail_master(&self, master: &str) {
        self.failing_masters
            .lock()
            .unwrap()
            .insert(master.to_string());
    }

    /// Make `list_builds` fail for one job
    pub fn fail_history(&self, master: &str, job: &str) {
        self.failing_histories
            .lock()
            .unwrap()
            .insert((master.to_string(), job.to_string()));
    }

    pub fn list_jobs_calls(&self) -> usize {
        self.list_jobs_calls.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn list_builds_calls(&self) -> usize {
        self.list_builds_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MasterSource for ScriptedSource {
    async fn list_jobs(&self, master: &str) -> Result<Vec<Job>> {
        self.list_jobs_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_masters.lock().unwrap().contains(master) {
            return Err(Error::master(master, "scripted listing failure"));
        }
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .get(master)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_builds(&self, master: &str, job: &str) -> Result<Vec<BuildSnapshot>> {
        self.list_builds_calls.fetch_add(1, Ordering::SeqCst);
        let key = (master.to_string(), job.to_string());
        if self.failing_histories.lock().unwrap().contains(&key) {
            return Err(Error::source("scripted history failure"));
        }
        Ok(self
            .histories
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }
}

/// An event sink that records every published event
#[derive(Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<BuildEvent>>>,
    fail_all: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish fail (the event is still recorded first, so the
    /// tests can see what the detector attempted)
    pub fn fail_publishes(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<BuildEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Build numbers of recorded events for one job, in publish order
    pub fn numbers_for(&self, job: &str) -> Vec<u64> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.job == job)
            .map(|event| event.number)
            .collect()
    }
}

#[async_trait::async_trait]
impl EventSink for RecordingSink {
    async fn publish(&self, event: &BuildEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(Error::sink("scripted publish failure"));
        }
        Ok(())
    }
}

/// A build cache that counts writes, delegating storage to the memory cache
#[derive(Default)]
pub struct CountingCache {
    inner: MemoryBuildCache,
    set_calls: AtomicUsize,
    remove_calls: AtomicUsize,
}

impl CountingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.set_calls() + self.remove_calls()
    }
}

#[async_trait::async_trait]
impl BuildCache for CountingCache {
    async fn list_tracked_jobs(&self, master: &str) -> Result<Vec<String>> {
        self.inner.list_tracked_jobs(master).await
    }

    async fn get_entry(&self, master: &str, job: &str) -> Result<Option<CacheEntry>> {
        self.inner.get_entry(master, job).await
    }

    async fn set_entry(&self, master: &str, job: &str, number: u64, building: bool) -> Result<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.set_entry(master, job, number, building).await
    }

    async fn remove_entry(&self, master: &str, job: &str) -> Result<()> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.remove_entry(master, job).await
    }

    async fn flush(&self) -> Result<()> {
        self.inner.flush().await
    }
}

/// A health oracle whose call always errors (for fail-open tests)
pub struct BrokenHealth;

#[async_trait::async_trait]
impl InstanceHealth for BrokenHealth {
    async fn is_in_service(&self) -> Result<bool> {
        Err(Error::health("scripted oracle outage"))
    }
}
