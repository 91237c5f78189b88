//! Folio Alerts CLI
//!
//! Command-line interface for the Folio Alerts service.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use folio_alerts::alerting::{
    AlertLifecycle, AlertSweeper, DeliveryDispatcher, HttpMetricsSource, WebhookTransport,
};
use folio_alerts::api::HttpServer;
use folio_alerts::config::LoggingConfig;
use folio_alerts::db::Database;
use folio_alerts::Config;

/// Folio Alerts - alert evaluation and notification delivery for portfolios
#[derive(Parser)]
#[command(name = "folio-alerts")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "FOLIO_ALERTS_CONFIG")]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server with background sweep and delivery loops
    Serve {
        /// HTTP API port (overrides `server.http_port`)
        #[arg(long)]
        http_port: Option<u16>,

        /// Do not run the periodic alert sweep
        #[arg(long)]
        no_sweep: bool,
    },

    /// Apply database migrations
    Migrate,

    /// Show system health status
    Health,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.logging, cli.verbose);

    // Execute command
    let result = match cli.command {
        Commands::Serve {
            http_port,
            no_sweep,
        } => run_serve(config, http_port, no_sweep).await,
        Commands::Migrate => run_migrate(config).await,
        Commands::Health => run_health(config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if logging.format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn connect(config: &Config) -> anyhow::Result<Database> {
    let db = Database::connect(&config.database)
        .await
        .with_context(|| format!("connecting to {}", config.database.url))?;
    db.migrate().await.context("applying migrations")?;
    Ok(db)
}

async fn run_serve(config: Config, http_port: Option<u16>, no_sweep: bool) -> anyhow::Result<()> {
    let db = connect(&config).await?;
    let lifecycle = AlertLifecycle::new(db.alerts());

    if config.alerting.sweep_enabled && !no_sweep {
        match HttpMetricsSource::from_config(&config.metrics)? {
            Some(metrics) => {
                let sweeper = AlertSweeper::new(
                    lifecycle.clone(),
                    Arc::new(metrics),
                    config.alerting.sweep_concurrency,
                );
                let every = config.alerting.sweep_interval;
                tokio::spawn(async move { sweeper.start(every).await });
            }
            None => warn!("metrics.base_url is not set; alert sweep disabled"),
        }
    }

    match WebhookTransport::from_config(&config.delivery)? {
        Some(transport) => {
            let dispatcher =
                DeliveryDispatcher::new(lifecycle, Arc::new(transport), config.delivery.batch_size);
            let every = config.delivery.dispatch_interval;
            tokio::spawn(async move { dispatcher.start(every).await });
        }
        None => info!("delivery.webhook_url is not set; notifications stay pending until reported"),
    }

    let port = http_port.unwrap_or(config.server.http_port);
    let addr = format!("{}:{}", config.server.host, port);

    info!("Starting Folio Alerts on {}", addr);

    HttpServer::new(db)
        .serve(&addr, async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down...");
            }
        })
        .await?;

    Ok(())
}

async fn run_migrate(config: Config) -> anyhow::Result<()> {
    connect(&config).await?;
    println!("Migrations applied to {}", config.database.url);
    Ok(())
}

async fn run_health(config: Config) -> anyhow::Result<()> {
    let db = Database::connect(&config.database).await?;
    db.health_check().await.context("database health check")?;
    println!("database: ok ({})", config.database.url);
    Ok(())
}
