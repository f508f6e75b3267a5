//! Core traits for the buildwatch system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`MasterSource`]: List jobs and build histories from a CI master
//! - [`BuildCache`]: Last observed build state per (master, job)
//! - [`EventSink`]: Best-effort publisher for build-change notifications
//! - [`InstanceHealth`]: Fleet-level "should this instance poll" flag

pub mod master_source;
pub mod build_cache;
pub mod event_sink;
pub mod instance_health;

pub use master_source::{MasterSource, Job, BuildSnapshot};
pub use build_cache::{BuildCache, CacheEntry};
pub use event_sink::{EventSink, BuildEvent, LogSink, IN_PROGRESS_RESULT};
pub use instance_health::{InstanceHealth, StaticHealth};
