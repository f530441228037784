//! Host application around one ARVI integration

use std::time::{Duration, Instant};

use arvi_core::{
    DominantHand, Integration, IntegrationConfig, PlatformBoundary, PlayerPose, Response,
    TickSummary, Vector3,
};
use arvi_harness::{MockPlatform, ScriptedMessage};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::{CliError, Result};

/// Ticks between scripted TIMELEFT queries in simulation
const SIMULATED_TIME_LEFT_EVERY: u64 = 60;
/// Ticks between scripted POSITION queries in simulation
const SIMULATED_POSITION_EVERY: u64 = 150;

// ----------------------------------------------------------------------------
// Platform Selection
// ----------------------------------------------------------------------------

/// Scripted platform used with `--simulate`
#[derive(Debug, Clone)]
pub struct Simulation {
    platform: MockPlatform,
    reported: usize,
}

impl Simulation {
    pub fn new() -> Self {
        let platform = MockPlatform::new();
        platform.set_auto_complete(true);
        platform.set_player_name_value(Some("Simulated Player"));
        platform.set_dominant_hand_value(Some(DominantHand::Right));
        platform.set_player_id(Some("sim-player-1"));
        platform.set_session_id(Some("sim-session"));
        platform.set_session_language(Some("en"));
        platform.set_server_ip(Some("127.0.0.1"));
        platform.set_players_count(Some(1));
        platform.set_session_time(Some(1800));
        Self {
            platform,
            reported: 0,
        }
    }

    pub fn platform(&self) -> &MockPlatform {
        &self.platform
    }

    /// Queue the platform traffic due at `tick`
    pub fn script_tick(&self, tick: u64) {
        if tick % SIMULATED_TIME_LEFT_EVERY == 0 {
            self.platform.queue_message(ScriptedMessage::get("TIMELEFT"));
        }
        if tick % SIMULATED_POSITION_EVERY == 0 {
            self.platform.queue_message(ScriptedMessage::get("POSITION"));
        }
    }

    /// Log replies written since the last call
    pub fn report_responses(&mut self) {
        let written = self.platform.written_responses();
        for response in written.iter().skip(self.reported) {
            info!(
                "Answered {} ({} {}): {}",
                response.name,
                response.status_code,
                response.content_type,
                response.text()
            );
        }
        self.reported = written.len();
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

/// Choose the boundary: the scripted platform, or the native plugin when built with it
fn select_boundary(simulation: Option<&Simulation>) -> Result<Box<dyn PlatformBoundary>> {
    if let Some(simulation) = simulation {
        info!("Using the simulated platform");
        return Ok(Box::new(simulation.platform().clone()));
    }

    cfg_if::cfg_if! {
        if #[cfg(feature = "native")] {
            info!("Using the native platform plugin");
            Ok(Box::new(arvi_core::NativeBoundary))
        } else {
            Err(arvi_core::IntegrationError::plugin_not_found(
                "built without the `native` feature; pass --simulate",
            )
            .into())
        }
    }
}

// ----------------------------------------------------------------------------
// Info Report
// ----------------------------------------------------------------------------

/// Snapshot of platform and session state
#[derive(Debug, Clone, Serialize)]
pub struct InfoReport {
    pub version: String,
    pub player_name: String,
    pub player_id: Option<String>,
    pub dominant_hand: DominantHand,
    pub session_id: Option<String>,
    pub session_language: Option<String>,
    pub session_time: Option<i32>,
    pub server_ip: Option<String>,
    pub players_count: Option<i32>,
    pub play_area_checking_mode: Option<i32>,
    pub play_area_out_of_bounds_mode: Option<i32>,
    pub trial_mode: bool,
    pub track_cord_twisting: bool,
}

// ----------------------------------------------------------------------------
// Host Application
// ----------------------------------------------------------------------------

pub struct HostApp {
    integration: Integration,
    simulation: Option<Simulation>,
}

impl HostApp {
    /// Build and initialize the integration
    pub fn new(config: IntegrationConfig, simulate: bool) -> Result<Self> {
        let simulation = simulate.then(Simulation::new);
        let boundary = select_boundary(simulation.as_ref())?;
        let mut integration = Integration::from_boxed(boundary, config);
        integration.initialize()?;
        Ok(Self {
            integration,
            simulation,
        })
    }

    pub fn integration(&mut self) -> &mut Integration {
        &mut self.integration
    }

    pub fn info(&self) -> InfoReport {
        let integration = &self.integration;
        InfoReport {
            version: integration.version(),
            player_name: integration.player_name().to_string(),
            player_id: integration.try_get_player_id(),
            dominant_hand: integration.dominant_hand(),
            session_id: integration.try_get_session_id(),
            session_language: integration.try_get_session_language(),
            session_time: integration.try_get_session_time(),
            server_ip: integration.try_get_server_ip(),
            players_count: integration.try_get_players_count(),
            play_area_checking_mode: integration.try_get_play_area_checking_mode(),
            play_area_out_of_bounds_mode: integration.try_get_play_area_out_of_bounds_mode(),
            trial_mode: integration.is_application_in_trial_mode(),
            track_cord_twisting: integration.should_application_track_cord_twisting(),
        }
    }

    /// Ask for the entitlement and tick until it is answered
    pub async fn check_entitlement(&mut self, timeout: Duration, tick: Duration) -> Result<Response> {
        let (sender, mut receiver) = oneshot::channel();
        let handle = self
            .integration
            .is_application_entitled()
            .on_complete(move |response| {
                let _ = sender.send(response);
            });
        debug!("Entitlement requested as {}", handle);

        let deadline = Instant::now() + timeout;
        let mut interval = tokio::time::interval(tick);
        loop {
            interval.tick().await;
            self.integration.tick();
            match receiver.try_recv() {
                Ok(response) => return Ok(response),
                Err(oneshot::error::TryRecvError::Closed) => {
                    return Err(CliError::Rejected("entitlement request was abandoned".to_string()))
                }
                Err(oneshot::error::TryRecvError::Empty) if Instant::now() >= deadline => {
                    return Err(CliError::Timeout(format!(
                        "no entitlement response within {} ms",
                        timeout.as_millis()
                    )))
                }
                Err(oneshot::error::TryRecvError::Empty) => {}
            }
        }
    }

    /// Register the reserved-message providers used by `run`
    pub fn install_providers(&mut self, session_seconds: Option<i32>) {
        let started = Instant::now();
        self.integration.on_time_left_request(move || {
            let elapsed = i32::try_from(started.elapsed().as_secs()).unwrap_or(i32::MAX);
            session_seconds.map(|total| total.saturating_sub(elapsed).max(0))
        });
        self.integration.on_player_position_request(|| {
            Some(PlayerPose::new(
                Vector3::new(0.0, 1.7, 0.0),
                Vector3::FORWARD,
                Vector3::UP,
            ))
        });
        self.integration.on_message_received(|message| {
            info!("Platform message {} {}", message.method(), message.name());
            if let Err(e) = message.set_response_text("OK") {
                warn!("Could not answer {}: {}", message.name(), e);
            }
        });
        self.integration
            .on_player_name_changed(|name| info!("Player is now called {}", name));
        self.integration
            .on_player_dominant_hand_changed(|hand| info!("Player dominant hand is now {}", hand));
    }

    /// Run one frame: scripted traffic first, then both dispatch loops
    pub fn tick(&mut self, index: u64) -> TickSummary {
        if let Some(simulation) = &self.simulation {
            simulation.script_tick(index);
        }
        let summary = self.integration.tick();
        if let Some(simulation) = &mut self.simulation {
            simulation.report_responses();
        }
        summary
    }

    /// Drive the tick loop until `ticks` have run or Ctrl-C is pressed
    pub async fn run(&mut self, ticks: Option<u64>, tick: Duration) -> Result<u64> {
        let mut interval = tokio::time::interval(tick);
        let mut index = 0u64;
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        while ticks.map_or(true, |limit| index < limit) {
            tokio::select! {
                _ = interval.tick() => {
                    let summary = self.tick(index);
                    if !summary.is_idle() {
                        debug!(
                            "Tick {}: {} responses, {} messages",
                            index, summary.responses, summary.messages
                        );
                    }
                    index += 1;
                }
                result = &mut shutdown => {
                    result?;
                    info!("Interrupted after {} ticks", index);
                    break;
                }
            }
        }

        let stats = self.integration.message_stats();
        info!(
            "Handled {} messages and {} events ({} unanswered)",
            stats.messages, stats.events, stats.unanswered
        );
        Ok(index)
    }

    pub fn shutdown(&mut self) {
        self.integration.shutdown();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
