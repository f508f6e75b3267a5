// # buildwatch-core
//
// Core library for the buildwatch CI change-detection monitor.
//
// ## Architecture Overview
//
// This library provides the core functionality for periodic change
// detection across a fleet of CI masters:
// - **MasterSource**: Trait for listing jobs and build histories
// - **BuildCache**: Trait for the last-observed-build cache
// - **EventSink**: Trait for best-effort build-change notifications
// - **InstanceHealth**: Trait for the fleet-level polling gate
// - **ChangeDetector**: Diff + replay algorithm; the only cache writer
// - **PollScheduler**: Periodic, health-gated invocation across masters
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Plain Iteration**: A poll cycle is an ordered loop with per-item
//    error boundaries, not a stream pipeline
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Smallest-Scope Errors**: One build, one job, one master, never the
//    whole tick

pub mod traits;
pub mod detector;
pub mod scheduler;
pub mod config;
pub mod error;
pub mod cache;

// Re-export core types for convenience
pub use traits::{MasterSource, BuildCache, EventSink, InstanceHealth};
pub use traits::{Job, BuildSnapshot, CacheEntry, BuildEvent, LogSink, StaticHealth};
pub use detector::{ChangeDetector, ChangeRecord};
pub use scheduler::PollScheduler;
pub use config::{MonitorConfig, MasterConfig, CacheConfig, SinkConfig, HealthConfig};
pub use error::{Error, Result};
pub use cache::{MemoryBuildCache, FileBuildCache};
