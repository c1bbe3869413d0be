// # lighthoused - Lighthouse Daemon
//
// Thin integration layer. All reconciliation logic lives in
// lighthouse-core; this binary only:
// 1. Reads configuration from environment variables
// 2. Initializes logging and the runtime
// 3. Builds the registry client, validators and cache store
// 4. Runs the reconciler until SIGTERM/SIGINT
//
// ## Configuration
//
// ### Registry
// - `LIGHTHOUSE_REGISTRY_URL`: JSON-RPC endpoint (default `http://localhost:5279/lbryapi`)
// - `LIGHTHOUSE_REQUEST_TIMEOUT_SECS`: HTTP timeout per request (default 30)
//
// ### Cache
// - `LIGHTHOUSE_CACHE_PATH`: Cache file (default `~/.lighthouse_cache`)
// - `LIGHTHOUSE_PERSIST_MODE`: `per_entry` (default) or `per_cycle`
// - `LIGHTHOUSE_CLEAR_QUARANTINE`: `true` to release every quarantined txid at startup
//
// ### Reconciler
// - `LIGHTHOUSE_POLL_INTERVAL_SECS`: Seconds between cycles (default 30)
// - `LIGHTHOUSE_CALL_TIMEOUT_SECS`: Budget per registry call (default 30)
//
// ### Logging
// - `LIGHTHOUSE_LOG_LEVEL`: trace, debug, info (default), warn, error
//
// ## Example
//
// ```bash
// export LIGHTHOUSE_REGISTRY_URL=http://localhost:5279/lbryapi
// export LIGHTHOUSE_CACHE_PATH=/var/lib/lighthouse/cache.json
// export LIGHTHOUSE_PERSIST_MODE=per_cycle
//
// lighthoused
// ```

use anyhow::{Context, Result};
use lighthouse_core::{
    CacheConfig, FileStateStore, LighthouseConfig, PersistMode, Reconciler, ReconcilerEvent,
};
use lighthouse_metadata::{SchemaValidator, UriNameValidator};
use lighthouse_registry_jsonrpc::JsonRpcRegistry;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long shutdown waits for an in-flight cycle and the final flush
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(60);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum LighthouseExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<LighthouseExitCode> for ExitCode {
    fn from(code: LighthouseExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Daemon configuration, as read from the environment
struct Config {
    lighthouse: LighthouseConfig,
    clear_quarantine: bool,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`; unset variables take defaults
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut lighthouse = LighthouseConfig::new();

        if let Some(value) = lookup("LIGHTHOUSE_REGISTRY_URL") {
            lighthouse.registry.url = value;
        }
        if let Some(value) = lookup("LIGHTHOUSE_REQUEST_TIMEOUT_SECS") {
            lighthouse.registry.request_timeout_secs =
                parse_var("LIGHTHOUSE_REQUEST_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = lookup("LIGHTHOUSE_POLL_INTERVAL_SECS") {
            lighthouse.reconciler.poll_interval_secs =
                parse_var("LIGHTHOUSE_POLL_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = lookup("LIGHTHOUSE_CALL_TIMEOUT_SECS") {
            lighthouse.reconciler.call_timeout_secs =
                parse_var("LIGHTHOUSE_CALL_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = lookup("LIGHTHOUSE_PERSIST_MODE") {
            lighthouse.reconciler.persist_mode = value
                .parse::<PersistMode>()
                .context("LIGHTHOUSE_PERSIST_MODE")?;
        }

        lighthouse.cache = CacheConfig {
            path: lookup("LIGHTHOUSE_CACHE_PATH").map(PathBuf::from),
        };

        let clear_quarantine = match lookup("LIGHTHOUSE_CLEAR_QUARANTINE") {
            Some(value) => parse_flag("LIGHTHOUSE_CLEAR_QUARANTINE", &value)?,
            None => false,
        };

        Ok(Self {
            lighthouse,
            clear_quarantine,
            log_level: lookup("LIGHTHOUSE_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Field-level checks are delegated to `LighthouseConfig::validate`; this
    /// adds the cross-field and daemon-only rules.
    fn validate(&self) -> Result<()> {
        self.lighthouse.validate()?;

        let reconciler = &self.lighthouse.reconciler;
        if reconciler.call_timeout_secs > reconciler.poll_interval_secs {
            eprintln!(
                "WARNING: LIGHTHOUSE_CALL_TIMEOUT_SECS ({}) exceeds LIGHTHOUSE_POLL_INTERVAL_SECS ({}). \
                Slow cycles will delay the next tick.",
                reconciler.call_timeout_secs, reconciler.poll_interval_secs
            );
        }

        if let Some(parent) = self
            .lighthouse
            .cache
            .path
            .as_deref()
            .and_then(|p| p.parent())
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            anyhow::bail!(
                "LIGHTHOUSE_CACHE_PATH parent directory does not exist: {}. \
                Create it first: mkdir -p {}",
                parent.display(),
                parent.display()
            );
        }

        parse_level(&self.log_level)?;
        Ok(())
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("{} '{}' is not valid: {}", name, value, e))
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => anyhow::bail!("{} '{}' is not a boolean", name, value),
    }
}

fn parse_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "LIGHTHOUSE_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return LighthouseExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return LighthouseExitCode::ConfigError.into();
    }

    let log_level = parse_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return LighthouseExitCode::ConfigError.into();
    }

    info!("Starting lighthoused");

    // One cooperative task owns the reconciler; no worker threads needed
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return LighthouseExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => LighthouseExitCode::CleanShutdown,
            Err(DaemonError::Startup(e)) => {
                error!("Startup failed: {:#}", e);
                LighthouseExitCode::ConfigError
            }
            Err(DaemonError::Runtime(e)) => {
                error!("Daemon error: {:#}", e);
                LighthouseExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Separates failures before the loop starts from failures while running
enum DaemonError {
    Startup(anyhow::Error),
    Runtime(anyhow::Error),
}

/// Run the daemon
async fn run_daemon(config: Config) -> std::result::Result<(), DaemonError> {
    let Config {
        lighthouse,
        clear_quarantine,
        ..
    } = config;

    let (mut reconciler, events) = build_reconciler(&lighthouse)
        .await
        .map_err(DaemonError::Startup)?;

    if clear_quarantine {
        let released = reconciler.clear_quarantine();
        info!("Released {} quarantined txid(s)", released);
        if let Err(e) = reconciler.persist_state().await {
            warn!("Could not persist cleared quarantine yet: {}", e);
        }
    }

    // Register handlers before the loop starts so an early signal is not lost
    let shutdown = ShutdownSignal::install().map_err(DaemonError::Startup)?;

    let event_log = tokio::spawn(log_events(events));
    let handle = reconciler.start();
    info!("Daemon initialized successfully");

    let signal = shutdown.wait().await.map_err(DaemonError::Runtime)?;
    info!("Received shutdown signal: {}", signal);

    let reconciler = match tokio::time::timeout(SHUTDOWN_DRAIN, handle.shutdown()).await {
        Ok(Ok(reconciler)) => reconciler,
        Ok(Err(e)) => return Err(DaemonError::Runtime(e.into())),
        Err(_) => {
            return Err(DaemonError::Runtime(anyhow::anyhow!(
                "Reconciler did not stop within {:?}",
                SHUTDOWN_DRAIN
            )));
        }
    };

    if reconciler.is_dirty() {
        warn!("Exiting with unpersisted changes; they will be rebuilt on the next run");
    }

    // The reconciler owns the event sender; dropping it ends the log task
    drop(reconciler);
    let _ = event_log.await;

    info!("Shutdown complete");
    Ok(())
}

async fn build_reconciler(
    config: &LighthouseConfig,
) -> Result<(Reconciler, mpsc::Receiver<ReconcilerEvent>)> {
    let registry = JsonRpcRegistry::new(&config.registry)?;
    info!("Registry: {}", registry.endpoint());

    let cache_path = config.cache.resolve_path()?;
    let store = FileStateStore::new(&cache_path)
        .await
        .with_context(|| format!("Opening cache {}", cache_path.display()))?;
    info!("Cache: {}", cache_path.display());

    let reconciler = Reconciler::new(
        Box::new(registry),
        Box::new(UriNameValidator::new()),
        Box::new(SchemaValidator::new()),
        Box::new(store),
        config.reconciler.clone(),
    )
    .await?;

    Ok(reconciler)
}

/// Log reconciler events until the channel closes
async fn log_events(mut events: mpsc::Receiver<ReconcilerEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ReconcilerEvent::CycleCompleted(report) => debug!(
                listed = report.listed,
                accepted = report.accepted,
                refreshed = report.refreshed,
                writes = report.writes,
                "cycle report"
            ),
            ReconcilerEvent::PersistFailed { error } => {
                warn!(%error, "cache write failed, will retry")
            }
            other => debug!(event = ?other, "reconciler event"),
        }
    }
}

/// SIGTERM/SIGINT listener
#[cfg(unix)]
struct ShutdownSignal {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignal {
    fn install() -> Result<Self> {
        let sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
        let sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;
        Ok(Self { sigterm, sigint })
    }

    /// Returns the name of the signal received
    async fn wait(mut self) -> Result<&'static str> {
        let received = tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        };
        Ok(received)
    }
}

/// CTRL-C listener for non-Unix platforms
#[cfg(not(unix))]
struct ShutdownSignal;

#[cfg(not(unix))]
impl ShutdownSignal {
    fn install() -> Result<Self> {
        Ok(Self)
    }

    async fn wait(self) -> Result<&'static str> {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
        Ok("SIGINT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.lighthouse.registry.url, "http://localhost:5279/lbryapi");
        assert_eq!(config.lighthouse.reconciler.poll_interval_secs, 30);
        assert_eq!(config.lighthouse.reconciler.persist_mode, PersistMode::PerEntry);
        assert!(config.lighthouse.cache.path.is_none());
        assert!(!config.clear_quarantine);
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn reads_every_variable() {
        let config = config_from(&[
            ("LIGHTHOUSE_REGISTRY_URL", "https://registry.example/api"),
            ("LIGHTHOUSE_REQUEST_TIMEOUT_SECS", "10"),
            ("LIGHTHOUSE_POLL_INTERVAL_SECS", "120"),
            ("LIGHTHOUSE_CALL_TIMEOUT_SECS", "15"),
            ("LIGHTHOUSE_PERSIST_MODE", "per-cycle"),
            ("LIGHTHOUSE_CACHE_PATH", "cache.json"),
            ("LIGHTHOUSE_CLEAR_QUARANTINE", "yes"),
            ("LIGHTHOUSE_LOG_LEVEL", "DEBUG"),
        ])
        .unwrap();

        let lighthouse = &config.lighthouse;
        assert_eq!(lighthouse.registry.url, "https://registry.example/api");
        assert_eq!(lighthouse.registry.request_timeout_secs, 10);
        assert_eq!(lighthouse.reconciler.poll_interval_secs, 120);
        assert_eq!(lighthouse.reconciler.call_timeout_secs, 15);
        assert_eq!(lighthouse.reconciler.persist_mode, PersistMode::PerCycle);
        assert_eq!(lighthouse.cache.path, Some(PathBuf::from("cache.json")));
        assert!(config.clear_quarantine);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn malformed_numbers_are_errors() {
        let err = config_from(&[("LIGHTHOUSE_POLL_INTERVAL_SECS", "soon")])
            .err()
            .unwrap();
        assert!(err.to_string().contains("LIGHTHOUSE_POLL_INTERVAL_SECS"));
    }

    #[test]
    fn unknown_persist_mode_is_an_error() {
        assert!(config_from(&[("LIGHTHOUSE_PERSIST_MODE", "sometimes")]).is_err());
        assert!(config_from(&[("LIGHTHOUSE_CLEAR_QUARANTINE", "maybe")]).is_err());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let zero = config_from(&[("LIGHTHOUSE_POLL_INTERVAL_SECS", "0")]).unwrap();
        assert!(zero.validate().is_err());

        let url = config_from(&[("LIGHTHOUSE_REGISTRY_URL", "localhost:5279")]).unwrap();
        assert!(url.validate().is_err());

        let level = config_from(&[("LIGHTHOUSE_LOG_LEVEL", "loud")]).unwrap();
        assert!(level.validate().is_err());

        let missing_dir =
            config_from(&[("LIGHTHOUSE_CACHE_PATH", "/nonexistent-lighthouse-dir/cache")])
                .unwrap();
        assert!(missing_dir.validate().is_err());
    }
}
