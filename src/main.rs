//! cloudmetrics Binary Entry Point
//!
//! Runs the scheduler, or a single maintenance command against the
//! configured database. Core functionality is provided by the `cloudmetrics`
//! library crate.

use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use cloudmetrics::{
    App, AppConfig,
    config::parse_duration,
    metric::synthetic::DEFAULT_SYNTHETIC_NAME,
    task::TaskRunner,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// cloudmetrics - Tick-Aligned Metrics Collection
#[derive(Parser, Debug)]
#[command(name = "cloudmetrics", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        default_value = "configs/config.yaml",
        env = "CLOUDMETRICS_CONFIG"
    )]
    config: String,

    /// Database URL (overrides config file)
    #[arg(long, global = true, env = "CLOUDMETRICS_DB_URL")]
    db_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run scheduled collection until interrupted
    Run,

    /// Run one collection pass now
    Collect {
        /// Reference time (RFC 3339 or unix seconds, default: now)
        #[arg(long, value_parser = parse_time)]
        reftime: Option<DateTime<Utc>>,
    },

    /// Send a batch of synthetic daily values to every enabled collector
    AddMetrics {
        /// Metric name
        #[arg(long, default_value = DEFAULT_SYNTHETIC_NAME)]
        name: String,

        /// Number of values
        #[arg(long, default_value_t = 100)]
        count: usize,

        /// First value time (RFC 3339 or unix seconds)
        #[arg(long, value_parser = parse_time, default_value = "2022-01-01T00:00:00Z")]
        start: DateTime<Utc>,
    },

    /// Generate past values of a metric and send them to collectors that accept backfill
    Backfill {
        /// Metric name
        #[arg(long)]
        metric: String,

        /// How far back to generate (e.g. 30d, 12h)
        #[arg(long, value_parser = parse_duration)]
        period: Duration,
    },

    /// Show metric state and collector health
    Status,

    /// Delete stored values past the retention period
    Cleanup,

    /// Delete a metric's stored values and forget its generation state
    Reset {
        /// Metric name
        #[arg(long)]
        metric: String,
    },
}

/// Parse RFC 3339 or unix seconds.
fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| format!("timestamp out of range: {}", secs));
    }
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid time '{}': {}", s, e))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,cloudmetrics=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration from file
    tracing::info!("Loading configuration from: {}", cli.config);
    let mut config = AppConfig::load(&cli.config)?;

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(url) = cli.db_url {
        config.database.url = url;
    }

    tracing::info!(
        "Database: {}, timezone: {}",
        config.database.url,
        config.timezone
    );

    let app = App::build(config).await?;
    let result = dispatch(&app, cli.command).await;
    app.close().await;
    result
}

async fn dispatch(app: &App, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Run => {
            let runner = app.scheduler().await?;
            runner.start().await?;
            for job in runner.list_jobs().await {
                tracing::info!("Scheduled {} ({})", job.name, job.schedule);
            }
            tracing::info!("Press Ctrl+C to shutdown");
            shutdown_signal(runner).await;
            tracing::info!("Shutdown complete");
        }
        Command::Collect { reftime } => {
            let report = app.collect(reftime).await?;
            for sampled in &report.sampled {
                println!(
                    "{}: {} item(s) for ({}, {}]",
                    sampled.name, sampled.items, sampled.window.start, sampled.window.finish
                );
            }
            for failed in &report.failed {
                println!("{}: FAILED {}", failed.name, failed.error);
            }
            print_dispatch(&report.dispatch);
            println!("{} item(s) at {}", report.item_count(), report.now);
        }
        Command::AddMetrics { name, count, start } => {
            let report = app.add_metrics(&name, count, start).await?;
            print_dispatch(&report);
        }
        Command::Backfill { metric, period } => {
            let report = app.backfill(&metric, period, Utc::now()).await?;
            print_dispatch(&report);
        }
        Command::Status => {
            let status = app.status(Utc::now()).await?;
            println!(
                "{:<16} {:<8} {:<6} {:<10} {:<26} {}",
                "METRIC", "ENABLED", "READY", "FREQUENCY", "LAST GENERATED", "LAST VALUE"
            );
            for m in &status.metrics {
                println!(
                    "{:<16} {:<8} {:<6} {:<10} {:<26} {}",
                    m.name,
                    m.enabled,
                    m.ready,
                    m.frequency.to_string(),
                    m.last_generated.map_or("never".to_string(), |t| t.to_rfc3339()),
                    m.last_value.map_or("-".to_string(), |v| v.to_string()),
                );
            }
            println!();
            println!("Collectors: {}", status.health.status);
            for c in &status.health.collectors {
                println!("  [{}] {}", c.status, c.summary);
            }
        }
        Command::Cleanup => {
            let deleted = app.cleanup(Utc::now()).await?;
            println!("Deleted {} expired value(s)", deleted);
        }
        Command::Reset { metric } => {
            let deleted = app.reset(&metric).await?;
            println!("Reset {}: deleted {} stored value(s)", metric, deleted);
        }
    }
    Ok(())
}

fn print_dispatch(report: &cloudmetrics::DispatchReport) {
    for name in &report.delivered {
        println!("delivered to {}", name);
    }
    for (name, error) in &report.failed {
        println!("failed on {}: {}", name, error);
    }
}

/// Wait for Ctrl+C or SIGTERM, then stop the scheduler.
async fn shutdown_signal(runner: TaskRunner) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }

    tracing::info!("Shutting down scheduler...");
    if let Err(e) = runner.shutdown().await {
        tracing::error!("Failed to shutdown scheduler: {}", e);
    }
}
