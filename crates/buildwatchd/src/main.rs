// # buildwatchd - Buildwatch Daemon
//
// The buildwatchd daemon is a THIN integration layer only:
// 1. Reading configuration from environment variables
// 2. Initializing the runtime and tracing
// 3. Wiring the master source, cache, sink, and health oracle
// 4. Starting the poll scheduler
//
// All change-detection logic lives in buildwatch-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Masters
// - `BUILDWATCH_MASTERS`: Comma-separated `name=url` pairs
//   (e.g. `ci-main=https://ci.example.com,ci-edge=https://edge.example.com`)
//
// ### Master Source (Jenkins)
// - `BUILDWATCH_SOURCE_USERNAME`: API username (optional)
// - `BUILDWATCH_SOURCE_API_TOKEN`: API token (optional, required with username)
//
// ### Build Cache
// - `BUILDWATCH_CACHE_TYPE`: Type of cache (file, memory)
// - `BUILDWATCH_CACHE_PATH`: Path to cache file (for file cache)
//
// ### Event Sink
// - `BUILDWATCH_SINK_TYPE`: Type of sink (log, webhook)
// - `BUILDWATCH_SINK_URL`: Webhook URL (for webhook sink)
//
// ### Instance Health
// - `BUILDWATCH_HEALTH_URL`: Status endpoint URL (optional; absent means
//   always in service)
//
// ### Scheduler
// - `BUILDWATCH_POLL_INTERVAL_SECS`: Poll interval in seconds (default 60)
// - `BUILDWATCH_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export BUILDWATCH_MASTERS=ci-main=https://ci.example.com
// export BUILDWATCH_CACHE_TYPE=file
// export BUILDWATCH_CACHE_PATH=/var/lib/buildwatch/cache.json
// export BUILDWATCH_SINK_TYPE=webhook
// export BUILDWATCH_SINK_URL=https://hooks.example.com/builds
//
// buildwatchd
// ```

use std::collections::HashMap;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use buildwatch_core::traits::{BuildCache, EventSink, InstanceHealth, MasterSource};
use buildwatch_core::{ChangeDetector, FileBuildCache, LogSink, MemoryBuildCache, PollScheduler};
use buildwatch_health_http::HttpHealth;
use buildwatch_sink_webhook::WebhookSink;
use buildwatch_source_jenkins::{JenkinsAuth, JenkinsSource};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DaemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    masters: Vec<(String, String)>,
    source_username: Option<String>,
    source_api_token: Option<String>,
    cache_type: String,
    cache_path: Option<String>,
    sink_type: String,
    sink_url: Option<String>,
    health_url: Option<String>,
    poll_interval_secs: u64,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            masters: env::var("BUILDWATCH_MASTERS")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|pair| !pair.is_empty())
                .map(|pair| match pair.split_once('=') {
                    Some((name, url)) => Ok((name.trim().to_string(), url.trim().to_string())),
                    None => Err(anyhow::anyhow!(
                        "BUILDWATCH_MASTERS entry '{}' is not a name=url pair",
                        pair
                    )),
                })
                .collect::<Result<Vec<_>>>()?,
            source_username: env::var("BUILDWATCH_SOURCE_USERNAME").ok(),
            source_api_token: env::var("BUILDWATCH_SOURCE_API_TOKEN").ok(),
            cache_type: env::var("BUILDWATCH_CACHE_TYPE").unwrap_or_else(|_| "memory".to_string()),
            cache_path: env::var("BUILDWATCH_CACHE_PATH").ok(),
            sink_type: env::var("BUILDWATCH_SINK_TYPE").unwrap_or_else(|_| "log".to_string()),
            sink_url: env::var("BUILDWATCH_SINK_URL").ok(),
            health_url: env::var("BUILDWATCH_HEALTH_URL").ok(),
            poll_interval_secs: env::var("BUILDWATCH_POLL_INTERVAL_SECS")
                .ok()
                .map(|s| s.parse().unwrap_or(60))
                .unwrap_or(60),
            log_level: env::var("BUILDWATCH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.masters.is_empty() {
            anyhow::bail!(
                "BUILDWATCH_MASTERS must contain at least one master. \
                Set it via: export BUILDWATCH_MASTERS=ci-main=https://ci.example.com"
            );
        }

        for (name, url) in &self.masters {
            if name.is_empty() {
                anyhow::bail!("BUILDWATCH_MASTERS contains an empty master name");
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!(
                    "Master '{}' URL must use HTTP or HTTPS scheme. Got: {}",
                    name,
                    url
                );
            }
        }

        if self.source_username.is_some() != self.source_api_token.is_some() {
            anyhow::bail!(
                "BUILDWATCH_SOURCE_USERNAME and BUILDWATCH_SOURCE_API_TOKEN \
                must be set together"
            );
        }

        match self.cache_type.as_str() {
            "memory" => {}
            "file" => {
                if self.cache_path.as_ref().is_none_or(|p| p.is_empty()) {
                    anyhow::bail!(
                        "BUILDWATCH_CACHE_PATH is required when BUILDWATCH_CACHE_TYPE=file. \
                        Set it via: export BUILDWATCH_CACHE_PATH=/var/lib/buildwatch/cache.json"
                    );
                }
            }
            other => anyhow::bail!(
                "BUILDWATCH_CACHE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                other
            ),
        }

        match self.sink_type.as_str() {
            "log" => {}
            "webhook" => {
                if self.sink_url.as_ref().is_none_or(|u| u.is_empty()) {
                    anyhow::bail!(
                        "BUILDWATCH_SINK_URL is required when BUILDWATCH_SINK_TYPE=webhook"
                    );
                }
            }
            other => anyhow::bail!(
                "BUILDWATCH_SINK_TYPE '{}' is not supported. \
                Supported types: log, webhook",
                other
            ),
        }

        if !(5..=3600).contains(&self.poll_interval_secs) {
            anyhow::bail!(
                "BUILDWATCH_POLL_INTERVAL_SECS must be between 5 and 3600 seconds. Got: {}",
                self.poll_interval_secs
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => anyhow::bail!(
                "BUILDWATCH_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                other
            ),
        }

        Ok(())
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    info!("Starting buildwatchd daemon");
    info!("Configuration loaded: {} master(s)", config.masters.len());

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DaemonExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {}", e);
            DaemonExitCode::RuntimeError
        } else {
            DaemonExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    // Master source
    let master_urls: HashMap<String, String> = config.masters.iter().cloned().collect();
    let auth = match (&config.source_username, &config.source_api_token) {
        (Some(username), Some(api_token)) => Some(JenkinsAuth {
            username: username.clone(),
            api_token: api_token.clone(),
        }),
        _ => None,
    };
    let source: Arc<dyn MasterSource> = Arc::new(JenkinsSource::new(master_urls, auth)?);

    // Build cache
    let cache: Arc<dyn BuildCache> = match config.cache_type.as_str() {
        "file" => {
            let path = config.cache_path.as_deref().unwrap_or_default();
            info!("Using file build cache: {}", path);
            Arc::new(FileBuildCache::new(path).await?)
        }
        _ => {
            info!("Using in-memory build cache");
            Arc::new(MemoryBuildCache::new())
        }
    };

    // Event sink
    let sink: Arc<dyn EventSink> = match config.sink_type.as_str() {
        "webhook" => {
            let url = config.sink_url.as_deref().unwrap_or_default();
            info!("Publishing build events to webhook: {}", url);
            Arc::new(WebhookSink::new(url)?)
        }
        _ => {
            info!("Publishing build events to the log");
            Arc::new(LogSink::new())
        }
    };

    // Instance-health oracle (absence fails open)
    let health: Option<Arc<dyn InstanceHealth>> = match &config.health_url {
        Some(url) => {
            info!("Gating polls on health endpoint: {}", url);
            Some(Arc::new(HttpHealth::new(url.clone())?))
        }
        None => None,
    };

    for (name, url) in &config.masters {
        info!("Monitoring master: {} ({})", name, url);
    }

    let detector = Arc::new(ChangeDetector::new(source, Arc::clone(&cache), sink));
    let scheduler = PollScheduler::new(
        detector,
        health,
        config.masters.iter().map(|(name, _)| name.clone()).collect(),
        Duration::from_secs(config.poll_interval_secs),
    );

    scheduler.start().await;
    info!("Poll scheduler running");

    let signal_name = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal_name);

    scheduler.stop().await;

    // Flush the cache before exiting
    cache.flush().await?;
    info!("Cache flushed, daemon stopped");

    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(name)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
