//! ARVI host - command-line entry point

use anyhow::Context;
use tracing::{error, info};

use arvi_core::{IntegrationConfig, LaunchOptions};
use arvi_host::{app::HostApp, cli::Cli, commands::CommandDispatcher, error::Result};

#[tokio::main]
async fn main() -> Result<()> {
    let (cli, platform_flags) = match Cli::parse_with_launch_flags(std::env::args()) {
        Ok(parsed) => parsed,
        Err(e) => e.exit(),
    };

    setup_logging(cli.verbose);

    let config = load_configuration(&cli, &platform_flags)?;

    let app = match HostApp::new(config, cli.simulate) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to start the integration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = CommandDispatcher::execute(cli.command, app).await {
        error!("Command execution failed: {}", e);
        std::process::exit(1);
    }

    info!("ARVI host exited successfully");
    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load configuration from file or use defaults, then apply command-line and platform overrides
fn load_configuration(cli: &Cli, platform_flags: &LaunchOptions) -> Result<IntegrationConfig> {
    let mut config = if let Some(config_path) = &cli.config {
        info!("Loading configuration from: {}", config_path);
        IntegrationConfig::load_from_file(config_path)
            .with_context(|| format!("reading {}", config_path))?
    } else {
        info!("Using default configuration");
        IntegrationConfig::default()
    };

    if let Some(app_key) = &cli.app_key {
        config.app_key = app_key.clone();
    }
    config.launch = config
        .launch
        .merge(&cli.launch_options())
        .merge(platform_flags);
    Ok(config)
}
