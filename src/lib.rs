pub mod api;
pub mod availability;
pub mod catalog;
pub mod cli;
pub mod clients;
pub mod config;
pub mod constants;
pub mod db;
pub mod domain;
pub mod entities;
pub mod magnet;
pub mod media;
pub mod models;
pub mod qbit;
pub mod release;
pub mod resolver;
pub mod runner;
pub mod scheduler;
pub mod specials;
pub mod state;
pub mod strmproxy;
pub mod torznab;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

pub use config::Config;
use state::SharedState;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    run_with_config(config).await
}

pub async fn run_with_config(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    let prometheus_handle = init_prometheus(&config)?;
    let _log_guard = init_logging(&config)?;

    let cli = Cli::parse();
    execute_command(cli, config, prometheus_handle).await
}

fn init_prometheus(
    config: &Config,
) -> anyhow::Result<Option<metrics_exporter_prometheus::PrometheusHandle>> {
    if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Ok(Some(handle))
    } else {
        Ok(None)
    }
}

/// Builds the tracing subscriber (§2.1's ambient logging requirement):
/// pretty or JSON to stdout, an optional daily-rotated file under
/// `GeneralConfig::data_dir/logs`, and an optional Loki sink. The returned
/// guard must be held for the process lifetime or the file writer drops its
/// background flush thread early.
fn init_logging(config: &Config) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));
    let registry = tracing_subscriber::registry().with(env_filter);

    let use_json = config.general.log_format == config::LogFormat::Json || config.observability.loki_enabled;

    let file_appender = tracing_appender::rolling::daily(
        std::path::Path::new(&config.general.data_dir).join("logs"),
        "anibridge.log",
    );
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_ansi(false);

    let stdout_layer = if use_json {
        tracing_subscriber::fmt::layer().json().flatten_event(true).boxed()
    } else {
        tracing_subscriber::fmt::layer().pretty().boxed()
    };

    let registry = registry.with(stdout_layer).with(file_layer);

    if config.observability.loki_enabled {
        let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

        let (loki_layer, task) = tracing_loki::builder()
            .label("app", "anibridge")?
            .extra_field("env", "production")?
            .extra_field("version", env!("CARGO_PKG_VERSION"))?
            .build_url(url)?;

        tokio::spawn(task);
        registry.with(loki_layer).init();
        info!("Loki logging initialized at {}", config.observability.loki_url);
    } else {
        registry.init();
    }

    Ok(Some(guard))
}

async fn execute_command(
    cli: Cli,
    config: Config,
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<()> {
    match cli.command {
        None | Some(Commands::Daemon) => run_server(config, prometheus_handle).await,

        Some(Commands::Check) => run_single_check(config).await,

        Some(Commands::Health) => print_health(config).await,

        Some(Commands::Init) => {
            if Config::create_default_if_missing()? {
                println!("Config file created. Edit config.toml and run again.");
            } else {
                println!("config.toml already exists.");
            }
            Ok(())
        }
    }
}

/// `anibridge check`: reaps dangling jobs left over from a previous run and
/// exits, without serving HTTP.
async fn run_single_check(config: Config) -> anyhow::Result<()> {
    info!("Running single scheduler check...");
    let shared = SharedState::new(config).await?;
    shared.scheduler.start().await?;
    info!("Check complete");
    Ok(())
}

/// `anibridge health`: builds the same report `GET /health` serves, without
/// starting the HTTP server.
async fn print_health(config: Config) -> anyhow::Result<()> {
    let shared = SharedState::new(config).await?;
    let report = api::health::build(&shared, 0).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_server(
    config: Config,
    _prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<()> {
    info!("AniBridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let shared = Arc::new(SharedState::new(config.clone()).await?);
    shared.scheduler.start().await?;

    let app_state = api::AppState::new(Arc::clone(&shared));
    let app = api::router(app_state);

    let port = config.server.port;
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let server_handle = tokio::spawn(async move {
        info!("AniBridge listening on http://{}", addr);
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    });

    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Error listening for shutdown: {}", e),
    }

    server_handle.abort();
    info!("AniBridge stopped");

    Ok(())
}
