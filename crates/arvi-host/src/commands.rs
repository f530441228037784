//! Command handlers for the ARVI host

use std::time::Duration;

use tracing::{info, warn};

use crate::app::HostApp;
use crate::cli::Commands;
use crate::error::{CliError, Result};

/// Polling interval while waiting for a single response
const RESPONSE_POLL: Duration = Duration::from_millis(16);

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(command: Commands, mut app: HostApp) -> Result<()> {
        let result = match command {
            Commands::Info => Self::handle_info_command(&app),
            Commands::Entitlement { timeout_ms } => {
                Self::handle_entitlement_command(&mut app, timeout_ms).await
            }
            Commands::Run {
                ticks,
                tick_ms,
                time_left,
            } => Self::handle_run_command(&mut app, ticks, tick_ms, time_left).await,
        };
        app.shutdown();
        result
    }

    fn handle_info_command(app: &HostApp) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(&app.info())?);
        Ok(())
    }

    async fn handle_entitlement_command(app: &mut HostApp, timeout_ms: u64) -> Result<()> {
        let response = app
            .check_entitlement(Duration::from_millis(timeout_ms), RESPONSE_POLL)
            .await?;
        match response.error() {
            None => {
                info!("Application is entitled");
                Ok(())
            }
            Some(error) => {
                warn!("Entitlement denied: {} ({})", error.message, error.code);
                Err(CliError::Rejected(error.message.clone()))
            }
        }
    }

    async fn handle_run_command(
        app: &mut HostApp,
        ticks: Option<u64>,
        tick_ms: u64,
        time_left: Option<i32>,
    ) -> Result<()> {
        if tick_ms == 0 {
            return Err(CliError::Config("--tick-ms must be positive".to_string()));
        }
        app.install_providers(time_left);
        app.integration().server_started().detach();

        let ran = app.run(ticks, Duration::from_millis(tick_ms)).await?;
        app.integration().game_completed().detach();
        app.integration().tick();
        info!("Stopped after {} ticks", ran);
        Ok(())
    }
}
