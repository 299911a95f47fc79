//! Stockgate CLI and Server Binary
//!
//! Entry point for the gateway: writes, validates and starts from a YAML
//! configuration.

use anyhow::{Context, Result};
use cli::{Cli, Commands, LogFormatArg};
use config::{
    generate_default_config, load_config, save_config, validate_config, GatewayConfig,
    StorageBackend, ValidationReport,
};
use feed::{Feed, QueryLimits};
use observability::{init_logging, init_metrics, FeedMetrics, LogFormat};
use server::health::health_routes;
use server::{CombinedServer, ComponentStatus, HealthState, ServerConfig, ServerExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use storage::Stores;
use tracing::{debug, error, info, warn};

const SERVICE: &str = "stockgate";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Start {
            config,
            http,
            ws,
            log_format,
        } => start_gateway(config, http, ws, log_format).await,
        Commands::Validate { config } => {
            init_logging(SERVICE, LogFormat::Pretty)?;
            info!("Executing 'validate' command");
            validate_command(config)
        }
        Commands::Init { output, force } => {
            init_logging(SERVICE, LogFormat::Pretty)?;
            info!("Executing 'init' command");
            init_command(output, force)
        }
    }
}

async fn start_gateway(
    config_path: PathBuf,
    http_override: Option<u16>,
    ws_override: Option<u16>,
    log_format: Option<LogFormatArg>,
) -> Result<()> {
    let mut config = load_config(&config_path)?;

    let format_name = log_format
        .map(|f| f.as_str().to_string())
        .unwrap_or_else(|| config.observability.log_format.clone());
    init_logging(
        &config.service.name,
        LogFormat::parse(&format_name).unwrap_or_default(),
    )?;
    info!(path = ?config_path, "Stockgate starting...");

    if let Some(port) = http_override {
        debug!(port, "Overriding HTTP port");
        config.server.http_port = port;
    }
    if let Some(port) = ws_override {
        debug!(port, "Overriding WebSocket port");
        config.server.websocket_port = port;
    }

    let report = validate_config(&config);
    for warning in &report.warnings {
        warn!(field = %warning.field, message = %warning.message, "Configuration warning");
    }
    if !report.is_valid() {
        error!(
            error_count = report.errors.len(),
            "Configuration validation failed"
        );
        for err in &report.errors {
            error!("{}", err);
        }
        anyhow::bail!("Cannot start gateway due to configuration errors");
    }

    if let Some(port) = config.observability.metrics_port {
        init_metrics(port).context("Failed to start metrics exporter")?;
    }

    let stores = open_stores(&config).await?;
    let feed = Feed::new(&stores, query_limits(&config), FeedMetrics::new());

    let added = feed
        .directory()
        .seed(
            config
                .symbols
                .iter()
                .map(|s| (s.ticker.as_str(), s.name.as_str(), s.asset_type)),
        )
        .await
        .context("Failed to seed symbols")?;
    info!(added, configured = config.symbols.len(), "Symbols seeded");

    let health = Arc::new(HealthState::new(config.service.name.clone()));
    health
        .set_component(ComponentStatus {
            name: "storage".to_string(),
            healthy: true,
            detail: Some(config.storage.backend.to_string()),
        })
        .await;
    health
        .set_component(ComponentStatus {
            name: "subscriptions".to_string(),
            healthy: true,
            detail: None,
        })
        .await;

    let router = feed.router().merge(health_routes(health));

    let server_config = ServerConfig::new(
        config.server.host.clone(),
        config.server.http_port,
        config.server.websocket_port,
    )
    .with_shutdown_timeout(Duration::from_secs(config.server.shutdown_timeout_secs));

    info!(
        http_port = config.server.http_port,
        ws_port = config.server.websocket_port,
        backend = %config.storage.backend,
        "Starting gateway"
    );

    let server = CombinedServer::new(
        config.service.name.clone(),
        server_config,
        router,
        feed.ws_handler(),
    )
    .with_outbound_buffer(config.broadcast.subscriber_buffer);

    server.validate_ports().await?;
    server.run_with_ctrl_c().await?;

    info!("Stockgate stopped");
    Ok(())
}

fn query_limits(config: &GatewayConfig) -> QueryLimits {
    QueryLimits {
        default_history_limit: config.query.default_history_limit,
        max_history_limit: config.query.max_history_limit,
        default_window_hours: config.query.default_window_hours,
        default_alert_limit: config.query.default_alert_limit,
    }
}

async fn open_stores(config: &GatewayConfig) -> Result<Stores> {
    match config.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; data does not survive a restart");
            Ok(Stores::in_memory())
        }
        StorageBackend::Postgres => open_postgres(config).await,
    }
}

#[cfg(feature = "postgres")]
async fn open_postgres(config: &GatewayConfig) -> Result<Stores> {
    let pg = config
        .storage
        .postgres
        .as_ref()
        .context("storage.postgres is required for the postgres backend")?;

    let store = storage::PostgresStore::connect(&pg.url, pg.max_connections())
        .await
        .context("Failed to connect to PostgreSQL")?;

    if pg.run_migrations {
        store
            .run_migrations()
            .await
            .context("Failed to run database migrations")?;
    }

    info!(max_connections = pg.max_connections(), "PostgreSQL storage ready");
    Ok(Stores::postgres(store))
}

#[cfg(not(feature = "postgres"))]
async fn open_postgres(_config: &GatewayConfig) -> Result<Stores> {
    anyhow::bail!("storage.backend is postgres but stockgate was built without the `postgres` feature")
}

fn validate_command<P: AsRef<Path>>(config_path: P) -> Result<()> {
    info!(path = ?config_path.as_ref(), "Validating configuration");

    let config = match load_config(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "Failed to load configuration");
            return Err(e);
        }
    };

    let report = validate_config(&config);
    print_report(&report);

    if !report.is_valid() {
        anyhow::bail!("Configuration validation failed");
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!("Service: {}", config.service.name);
    println!(
        "Listeners: HTTP {}:{}, WebSocket {}:{}",
        config.server.host,
        config.server.http_port,
        config.server.host,
        config.server.websocket_port
    );
    println!("Storage: {}", config.storage.backend);
    println!("Seed symbols: {}", config.symbols.len());

    Ok(())
}

fn print_report(report: &ValidationReport) {
    println!("\n=== Configuration Validation Report ===\n");

    if !report.defaults_applied.is_empty() {
        println!("Defaults Applied ({}):", report.defaults_applied.len());
        for default in &report.defaults_applied {
            println!("  [info] {} = {}", default.field, default.value);
        }
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
    }
}

fn init_command<P: AsRef<Path>>(output_path: P, force: bool) -> Result<()> {
    let output_path = output_path.as_ref();
    info!(?output_path, "Initializing new configuration file");

    if output_path.exists() && !force {
        anyhow::bail!(
            "{:?} already exists; pass --force to overwrite it",
            output_path
        );
    }

    let config = generate_default_config();
    save_config(&config, output_path)?;

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    println!();
    println!("This configuration includes:");
    println!("  - HTTP and WebSocket listener settings");
    println!("  - In-memory storage (switch to postgres for durability)");
    println!("  - {} seed symbols", config.symbols.len());
    println!();
    println!("Next steps:");
    println!("  1. Edit the configuration file to customize settings");
    println!("  2. Set DATABASE_URL if you use the postgres backend");
    println!(
        "  3. Run 'stockgate validate --config {:?}' to check configuration",
        output_path
    );
    println!(
        "  4. Run 'stockgate start --config {:?}' to start the gateway",
        output_path
    );

    Ok(())
}
