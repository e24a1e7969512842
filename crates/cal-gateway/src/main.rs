//! cal-gateway: Calendar Gateway Main Binary
//!
//! Main entry point for the calendar gateway application.
//!
//! Usage:
//!   cal-gateway           - Start the HTTP API server
//!   cal-gateway --help    - Show help

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use cal_cache::CacheStore;
use cal_core::{Config, ToolManager};
use cal_sync::{CalendarContext, ReconciliationEngine, register_calendar_tools};

/// Run mode
enum RunMode {
    /// Server mode (HTTP API)
    Server,
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match parse_args() {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("cal-gateway {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Server => {}
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    // Load configuration (cal-gateway.toml if present, then environment)
    let config = Config::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting cal-gateway...");
    run_server(config).await
}

/// Parse command line arguments
fn parse_args() -> RunMode {
    let args: Vec<String> = std::env::args().collect();

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => return RunMode::Help,
            "--version" | "-v" => return RunMode::Version,
            _ => {}
        }
    }

    RunMode::Server
}

/// Print help message
fn print_help() {
    println!("cal-gateway - CalDAV calendar gateway");
    println!();
    println!("Usage:");
    println!("  cal-gateway           Start the HTTP API server");
    println!("  cal-gateway --help    Show this help message");
    println!("  cal-gateway --version Show version");
    println!();
    println!("Environment Variables:");
    println!("  CALDAV_BASE_URL      CalDAV server URL (required for sync)");
    println!("  CALDAV_USERNAME      CalDAV username (required for sync)");
    println!("  CALDAV_PASSWORD      CalDAV password (required for sync)");
    println!("  DB_PATH              SQLite cache path (default: data/cal-gateway.db)");
    println!("  API_PORT             HTTP API port (default: 8000)");
    println!("  SYNC_ON_START        Run a sync at startup (default: true)");
}

/// Run server mode (HTTP API)
async fn run_server(config: Config) -> anyhow::Result<()> {
    // Open the cache store
    if let Some(parent) = std::path::Path::new(&config.cache.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let store = CacheStore::new(&config.cache.db_path)
        .map_err(|e| anyhow::anyhow!("Failed to open cache store: {}", e))?;
    let store = Arc::new(Mutex::new(store));

    // Build the calendar context; without credentials the gateway still
    // serves its API but every calendar tool reports "not configured"
    let context = if config.caldav.is_configured() {
        let caldav = config.caldav.clone();
        let client = cal_caldav::CaldavClient::new(
            caldav.base_url.as_deref().unwrap_or_default(),
            caldav.username.as_deref().unwrap_or_default(),
            caldav.password.as_deref().unwrap_or_default(),
        )
        .map_err(|e| anyhow::anyhow!("Failed to create CalDAV client: {}", e))?;

        let engine = ReconciliationEngine::new(Arc::new(client), store);
        Arc::new(CalendarContext::new(engine))
    } else {
        tracing::warn!("CalDAV credentials not configured; calendar tools disabled");
        Arc::new(CalendarContext::disabled())
    };

    // Register the calendar tools
    let mut tool_manager = ToolManager::new();
    register_calendar_tools(&mut tool_manager, context.clone());
    tracing::info!(
        "Registered {} tools: {:?}",
        tool_manager.len(),
        tool_manager.tool_names()
    );
    let tool_manager = Arc::new(tool_manager);

    // Track running services for shutdown
    let mut service_handles = Vec::new();

    // Kick off the initial sync in the background
    if config.sync.on_start && context.is_enabled() {
        let sync_context = context.clone();
        let handle = tokio::spawn(async move {
            match sync_context.engine() {
                Ok(engine) => match engine.sync().await {
                    Ok(report) => {
                        tracing::info!(
                            "Initial sync: {} calendars, {} created, {} updated, {} deleted",
                            report.calendars,
                            report.created,
                            report.updated,
                            report.deleted
                        );
                        for warning in &report.warnings {
                            tracing::warn!("Initial sync warning: {}", warning);
                        }
                    }
                    Err(e) => tracing::error!("Initial sync failed: {}", e),
                },
                Err(e) => tracing::error!("Initial sync skipped: {}", e),
            }
        });
        service_handles.push(handle);
    }

    // Start HTTP API server
    let api_port = config.api.port;
    let api_tools = tool_manager.clone();
    let handle = tokio::spawn(async move {
        if let Err(e) = cal_api::start_server(api_port, api_tools).await {
            tracing::error!("HTTP API error: {}", e);
        }
    });
    service_handles.push(handle);
    tracing::info!("HTTP API server started on port {}", api_port);

    tracing::info!("cal-gateway initialized successfully");
    tracing::info!("Press Ctrl+C to exit");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    for handle in service_handles {
        handle.abort();
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
