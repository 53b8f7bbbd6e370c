//! Gradebook server entry point.
//!
//! Loads configuration, builds the Google clients, and serves the dashboard
//! until a shutdown signal arrives.

mod signals;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gradebook_core::config::AppConfig;
use gradebook_core::google::{OAuthClient, SheetsClient};
use gradebook_core::Gradebook;
use gradebook_web::WebServer;

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// Student gradebook web server.
#[derive(Parser, Debug)]
#[command(
    name = "gradebook-server",
    version,
    about = "Shows students their grades from a Google Spreadsheet after Google sign-in"
)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "gradebook.toml")]
    config: PathBuf,

    /// Override the log level from the config file (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Override the listen address from the config file.
    #[arg(long)]
    listen: Option<String>,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load and resolve configuration
    let mut config =
        AppConfig::load_from_file(&args.config).context("failed to load configuration file")?;
    let missing_env = config
        .resolve_env_vars()
        .context("failed to resolve environment variables in config")?;
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    config
        .validate()
        .context("configuration validation failed")?;

    // Initialize tracing
    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.server.log_level.clone());

    let filter = EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .init();

    // Startup banner
    info!("========================================");
    info!("  Student Gradebook v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!("Config file   : {}", args.config.display());
    info!("Spreadsheet   : {}", config.sheets.spreadsheet_id);
    info!(
        "Worksheet     : {}",
        config.sheets.worksheet.as_deref().unwrap_or("(first)")
    );
    info!("Redirect URI  : {}", config.oauth.redirect_uri);
    info!("Listen        : {}", config.server.listen);
    info!("Log level     : {}", log_level);
    info!("========================================");

    // Resolution ran before the subscriber existed, so report it now.
    for env_name in &missing_env {
        warn!(env_name = %env_name, "referenced environment variable is not set");
    }

    let oauth = OAuthClient::new(&config.oauth).context("failed to initialize OAuth client")?;
    info!("OAuth client initialized");

    let sheets = SheetsClient::from_config(&config.sheets)
        .await
        .context("failed to initialize Sheets client")?;
    info!("Sheets client initialized");

    let listen_addr = config.server.listen.clone();
    let web_server = WebServer::new(config, oauth, Gradebook::new(sheets));

    web_server
        .start(&listen_addr, signals::wait_for_shutdown())
        .await
        .context("web server error")?;

    info!("Student Gradebook stopped.");
    Ok(())
}
