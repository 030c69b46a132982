use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use feedwatch::config::{ConfigOverrides, TrackerConfig};
use feedwatch::kernel::catalog::ArticleCatalog;
use feedwatch::kernel::time::{Clock, ManualClock, SystemClock};
use feedwatch::runtime::{Driver, Pacing, ScriptedSource};
use feedwatch::services::{FileHost, HostChannel, HttpCollector, StdoutHost};
use feedwatch::Tracker;

/// Replays a recorded feed session through the attention tracker
#[derive(Parser, Debug)]
#[command(name = "feedwatch")]
#[command(version)]
#[command(about = "Attention telemetry for a news-feed experiment", long_about = None)]
struct Cli {
    /// JSON-lines signal script ({"atMs": .., "signal": {..}} per line)
    #[arg(short, long)]
    script: PathBuf,

    /// Launch URL or query string carrying the participant id (?pid=...)
    #[arg(long)]
    launch: Option<String>,

    /// Collector endpoint; delivery is disabled without it
    #[arg(long)]
    collector_url: Option<String>,

    /// Batch flush interval in milliseconds
    #[arg(long)]
    batch_interval_ms: Option<u64>,

    /// Retries per failed delivery before it is dropped
    #[arg(long)]
    max_retries: Option<u32>,

    /// Base retry delay in milliseconds (doubles per attempt)
    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Intersection ratio that counts as visible, in (0, 1]
    #[arg(long)]
    visibility_threshold: Option<f64>,

    /// Per-request collector timeout in milliseconds
    #[arg(long)]
    request_timeout_ms: Option<u64>,

    /// Whether clicks and traffic-light hovers bypass the batch queue
    #[arg(long)]
    send_critical_immediately: Option<bool>,

    /// Article catalog JSON (defaults to the built-in catalog)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Write the terminal session log to this file instead of stdout
    #[arg(long, conflicts_with = "no_host")]
    host_file: Option<PathBuf>,

    /// Run without an embedding host
    #[arg(long)]
    no_host: bool,

    /// Replay in real time instead of jumping a simulated clock
    #[arg(long)]
    realtime: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            collector_url: self.collector_url.clone(),
            batch_interval_ms: self.batch_interval_ms,
            max_retries: self.max_retries,
            retry_delay_ms: self.retry_delay_ms,
            visibility_threshold: self.visibility_threshold,
            request_timeout_ms: self.request_timeout_ms,
            send_critical_immediately: self.send_critical_immediately,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let cli = Cli::parse();

    let config = TrackerConfig::from_env().context("invalid tracker configuration")?;
    let config = cli.overrides().apply(config).context("invalid command-line configuration")?;

    let catalog = match &cli.catalog {
        Some(path) => ArticleCatalog::load(path)
            .with_context(|| format!("failed to load catalog {}", path.display()))?,
        None => ArticleCatalog::builtin(),
    };

    let (clock, pacing): (Arc<dyn Clock>, Pacing) = if cli.realtime {
        (Arc::new(SystemClock), Pacing::Realtime)
    } else {
        let manual = Arc::new(ManualClock::new(Utc::now()));
        (manual.clone(), Pacing::Simulated(manual))
    };

    let source = ScriptedSource::load(&cli.script, pacing)
        .with_context(|| format!("failed to load script {}", cli.script.display()))?;
    tracing::info!(signals = source.remaining(), articles = catalog.len(), "feedwatch booting");

    let transport = match &config.collector_url {
        Some(url) => Some(Arc::new(HttpCollector::new(url.clone(), config.request_timeout)?)),
        None => {
            tracing::info!("no collector configured, tracking locally only");
            None
        }
    };

    let tracker = Tracker::new(config, Arc::new(catalog), clock);
    let mut driver = Driver::new(tracker, source);
    if let Some(transport) = transport {
        driver = driver.with_transport(transport);
    }
    if !cli.no_host {
        let host: Arc<dyn HostChannel> = match &cli.host_file {
            Some(path) => Arc::new(FileHost::new(path)),
            None => Arc::new(StdoutHost),
        };
        driver = driver.with_host(host);
    }

    let shutdown = driver.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    driver.init(cli.launch.as_deref());
    let (tracker, stats) = driver.run().await;

    tracing::info!(
        events = tracker.log().len(),
        signals = stats.signals,
        host_posts = stats.host_posts,
        "session complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "feedwatch",
            "--script",
            "session.jsonl",
            "--batch-interval-ms",
            "2000",
            "--send-critical-immediately",
            "false",
        ])
        .unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.batch_interval_ms, Some(2000));
        assert_eq!(overrides.send_critical_immediately, Some(false));
        assert!(overrides.collector_url.is_none());
    }
}
