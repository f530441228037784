//! Integration context
//!
//! [`Integration`] owns everything one connection to the platform needs: the
//! boundary, the correlation table, both dispatch loops, the inbound router
//! with its cached player identity, and the optional operation limiter. It is
//! an explicit value rather than process-wide state, so independent instances
//! can coexist (one per test, for example).
//!
//! The host application drives it by calling [`Integration::tick`] once per
//! frame.

use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::boundary::{fetch_string, fetch_variable_length, PlatformBoundary};
use crate::config::IntegrationConfig;
use crate::dispatch::{MessageDispatchStats, MessageDispatcher};
use crate::errors::{IntegrationError, Result};
use crate::handlers::{
    query_dominant_hand, query_player_name, InboundRouter, ObserverId, PlayerIdentity,
};
use crate::limits::{OperationClass, OperationLimiter};
use crate::message::PlatformMessage;
use crate::request::{Request, RequestRegistry};
use crate::response::{ResponseDispatchStats, ResponseDispatcher};
use crate::session::{SessionValue, SessionVariable};
use crate::types::{
    AudioChatChannel, CorrelationHandle, DominantHand, PlayerPose, SystemTimeSource, TimeSource,
};

/// Version of this integration layer, appended to the native plugin version
pub const SDK_INTEGRATION_VERSION: u32 = 1;

type BoxedTimeSource = Box<dyn TimeSource + Send>;

// ----------------------------------------------------------------------------
// Lifecycle State
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationState {
    /// Created, or initialization failed
    Uninitialized,
    Initialized,
    /// Shut down; may be initialized again
    ShutDown,
}

/// Work done by one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub responses: usize,
    pub messages: usize,
}

impl TickSummary {
    pub fn is_idle(&self) -> bool {
        self.responses == 0 && self.messages == 0
    }
}

// ----------------------------------------------------------------------------
// Integration
// ----------------------------------------------------------------------------

pub struct Integration {
    boundary: Box<dyn PlatformBoundary>,
    config: IntegrationConfig,
    state: IntegrationState,
    registry: Arc<RequestRegistry>,
    responses: ResponseDispatcher,
    messages: MessageDispatcher,
    router: InboundRouter,
    limiter: Option<OperationLimiter<BoxedTimeSource>>,
}

impl Integration {
    /// Create an uninitialized integration over `boundary`
    pub fn new<B: PlatformBoundary + 'static>(boundary: B, config: IntegrationConfig) -> Self {
        Self::from_boxed(Box::new(boundary), config)
    }

    pub fn from_boxed(boundary: Box<dyn PlatformBoundary>, config: IntegrationConfig) -> Self {
        let limiter = config
            .limits
            .enforce
            .then(|| OperationLimiter::new(Box::new(SystemTimeSource) as BoxedTimeSource));
        Self {
            boundary,
            responses: ResponseDispatcher::new(config.dispatch.response_buffer_size),
            messages: MessageDispatcher::new(config.dispatch.message_buffer_size),
            config,
            state: IntegrationState::Uninitialized,
            registry: Arc::new(RequestRegistry::new()),
            router: InboundRouter::new(),
            limiter,
        }
    }

    /// Use `time_source` for rate windows; no effect when limits are not enforced
    pub fn with_time_source<T: TimeSource + Send + 'static>(mut self, time_source: T) -> Self {
        if self.limiter.is_some() {
            self.limiter = Some(OperationLimiter::new(Box::new(time_source)));
        }
        self
    }

    /// Bring up the platform modules
    ///
    /// On failure the integration stays uninitialized and every operation
    /// fails fast with [`IntegrationError::NotInitialized`].
    pub fn initialize(&mut self) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }

        if let Err(e) = self.try_initialize() {
            error!("ARVI integration failed to initialize: {}", e);
            return Err(e);
        }

        self.state = IntegrationState::Initialized;
        info!(
            "ARVI integration initialized (SDK {}, player {:?})",
            self.version(),
            self.router.identity().name
        );
        Ok(())
    }

    fn try_initialize(&mut self) -> Result<()> {
        self.config.validate()?;
        if self.config.app_key.trim().is_empty() {
            return Err(IntegrationError::EmptyAppKey);
        }

        let boundary = &*self.boundary;
        boundary.requests_initialize();

        if !boundary.messages_initialize() {
            let reason = boundary.messages_error_message();
            boundary.requests_finalize(false);
            return Err(IntegrationError::MessagesNotInitialized { reason });
        }

        if !boundary.session_variables_initialize() {
            let reason = boundary.session_variables_error_message();
            boundary.messages_finalize();
            boundary.requests_finalize(false);
            return Err(IntegrationError::SessionVariablesNotInitialized { reason });
        }

        self.router.set_identity(PlayerIdentity::query(boundary));
        Ok(())
    }

    /// Abandon pending requests and finalize the platform modules
    ///
    /// Pending callbacks are never invoked. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        let wait = self.config.shutdown.wait_for_pending;
        self.shutdown_with(wait);
    }

    pub fn shutdown_with(&mut self, wait_for_pending: bool) {
        if !self.is_initialized() {
            return;
        }

        let abandoned = self.registry.clear();
        self.boundary.requests_finalize(wait_for_pending);
        self.boundary.messages_finalize();
        self.boundary.session_variables_finalize();
        self.state = IntegrationState::ShutDown;
        info!(
            "ARVI integration shut down ({} pending requests abandoned)",
            abandoned
        );
    }

    pub fn state(&self) -> IntegrationState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == IntegrationState::Initialized
    }

    pub fn config(&self) -> &IntegrationConfig {
        &self.config
    }

    /// `"{native plugin version}.{integration version}"`
    pub fn version(&self) -> String {
        format!("{}.{}", self.boundary.sdk_version(), SDK_INTEGRATION_VERSION)
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Run both dispatch loops once
    pub fn tick(&mut self) -> TickSummary {
        TickSummary {
            responses: self.dispatch_responses(),
            messages: self.dispatch_messages(),
        }
    }

    /// Drain completed responses and resolve their requests
    pub fn dispatch_responses(&mut self) -> usize {
        if !self.is_initialized() {
            return 0;
        }
        self.responses.dispatch(&*self.boundary, &self.registry)
    }

    /// Drain inbound messages and events
    pub fn dispatch_messages(&mut self) -> usize {
        if !self.is_initialized() {
            return 0;
        }
        self.messages.dispatch(&*self.boundary, &mut self.router)
    }

    pub fn response_stats(&self) -> &ResponseDispatchStats {
        self.responses.stats()
    }

    pub fn message_stats(&self) -> &MessageDispatchStats {
        self.messages.stats()
    }

    /// Requests registered and still awaiting a response
    pub fn pending_requests(&self) -> usize {
        self.registry.len()
    }

    // ------------------------------------------------------------------------
    // Handler Registration
    // ------------------------------------------------------------------------

    /// Handle application messages other than `TIMELEFT` and `POSITION`
    ///
    /// If the handler panics and has not answered, the message is answered
    /// with an error.
    pub fn on_message_received<F>(&mut self, handler: F)
    where
        F: FnMut(&mut PlatformMessage<'_>) + Send + 'static,
    {
        self.router.set_message_handler(Box::new(handler));
    }

    /// Provide the remaining session time, in seconds, for `TIMELEFT`
    pub fn on_time_left_request<F>(&mut self, provider: F)
    where
        F: FnMut() -> Option<i32> + Send + 'static,
    {
        self.router.set_time_left_provider(Box::new(provider));
    }

    /// Provide the player pose for `POSITION`
    pub fn on_player_position_request<F>(&mut self, provider: F)
    where
        F: FnMut() -> Option<PlayerPose> + Send + 'static,
    {
        self.router.set_position_provider(Box::new(provider));
    }

    pub fn on_player_name_changed<F>(&mut self, observer: F) -> ObserverId
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.router.add_player_name_observer(Box::new(observer))
    }

    pub fn on_player_dominant_hand_changed<F>(&mut self, observer: F) -> ObserverId
    where
        F: FnMut(DominantHand) + Send + 'static,
    {
        self.router.add_dominant_hand_observer(Box::new(observer))
    }

    /// Stop notifying a player name observer
    pub fn remove_player_name_observer(&mut self, id: ObserverId) -> bool {
        self.router.remove_player_name_observer(id)
    }

    /// Stop notifying a dominant hand observer
    pub fn remove_dominant_hand_observer(&mut self, id: ObserverId) -> bool {
        self.router.remove_dominant_hand_observer(id)
    }

    // ------------------------------------------------------------------------
    // Asynchronous Operations
    // ------------------------------------------------------------------------

    fn invalid(&self, err: IntegrationError) -> Request {
        Request::invalid(err.to_string(), Arc::clone(&self.registry))
    }

    /// Issue an operation after the initialization and limit checks
    fn issue<F>(&mut self, class: Option<OperationClass>, arguments: &[&str], call: F) -> Request
    where
        F: FnOnce(&dyn PlatformBoundary) -> CorrelationHandle,
    {
        if !self.is_initialized() {
            return self.invalid(IntegrationError::NotInitialized);
        }
        if let (Some(limiter), Some(class)) = (self.limiter.as_mut(), class) {
            if let Err(e) = limiter.admit(class, arguments) {
                warn!("{:?} rejected before reaching the platform: {}", class, e);
                return self.invalid(e);
            }
        }

        let handle = call(&*self.boundary);
        if handle.is_valid() {
            debug!("Issued request {}", handle);
        } else {
            warn!("Platform did not enqueue the request");
        }
        Request::issued(handle, Arc::clone(&self.registry))
    }

    /// Check whether the application is entitled to run, using the configured key
    pub fn is_application_entitled(&mut self) -> Request {
        let app_key = self.config.app_key.clone();
        self.issue(None, &[], |b| b.is_application_entitled(&app_key))
    }

    pub fn server_started(&mut self) -> Request {
        self.issue(None, &[], |b| b.server_started())
    }

    pub fn game_completed(&mut self) -> Request {
        self.issue(None, &[], |b| b.game_completed())
    }

    pub fn call_operator(&mut self) -> Request {
        self.issue(None, &[], |b| b.call_operator())
    }

    pub fn set_audio_chat_channel(&mut self, channel: AudioChatChannel) -> Request {
        self.issue(None, &[], |b| b.set_audio_chat_channel(channel))
    }

    /// Activate one in-game command (≤128 characters)
    pub fn activate_in_game_command(&mut self, activation_message: &str) -> Request {
        self.issue(
            Some(OperationClass::Command),
            &[activation_message],
            |b| b.activate_in_game_command(activation_message),
        )
    }

    /// Activate several in-game commands, in order (≤2048 characters in total)
    pub fn activate_in_game_commands<S: AsRef<str>>(&mut self, activation_messages: &[S]) -> Request {
        let messages: Vec<&str> = activation_messages.iter().map(AsRef::as_ref).collect();
        self.issue(Some(OperationClass::CommandBatch), &messages, |b| {
            b.activate_in_game_commands(&messages)
        })
    }

    /// Deactivate one in-game command (≤128 characters)
    pub fn deactivate_in_game_command(&mut self, deactivation_message: &str) -> Request {
        self.issue(
            Some(OperationClass::Command),
            &[deactivation_message],
            |b| b.deactivate_in_game_command(deactivation_message),
        )
    }

    /// Deactivate several in-game commands, in order (≤2048 characters in total)
    pub fn deactivate_in_game_commands<S: AsRef<str>>(
        &mut self,
        deactivation_messages: &[S],
    ) -> Request {
        let messages: Vec<&str> = deactivation_messages.iter().map(AsRef::as_ref).collect();
        self.issue(Some(OperationClass::CommandBatch), &messages, |b| {
            b.deactivate_in_game_commands(&messages)
        })
    }

    /// Send a game message (≤2048 characters) in an optional message group
    pub fn send_game_message(&mut self, message: &str, message_group: &str) -> Request {
        self.issue(Some(OperationClass::GameMessage), &[message], |b| {
            b.send_game_message(message, message_group)
        })
    }

    /// Send a log message (≤10240 characters)
    pub fn send_log_message(&mut self, message: &str) -> Request {
        self.issue(Some(OperationClass::LogMessage), &[message], |b| {
            b.send_log_message(message)
        })
    }

    /// Send a warning to the operator (≤2048 characters, at most once per second)
    pub fn send_warning_message(&mut self, message: &str) -> Request {
        self.issue(Some(OperationClass::WarningMessage), &[message], |b| {
            b.send_warning_message(message)
        })
    }

    /// Send a tracking message used for event visualization (≤1024 characters)
    pub fn send_tracking_message(&mut self, message: &str) -> Request {
        self.issue(Some(OperationClass::TrackingMessage), &[message], |b| {
            b.send_tracking_message(message)
        })
    }

    /// Store raw session data under `name` (≤256 characters)
    pub fn set_session_data(&mut self, name: &str, data: &[u8]) -> Request {
        self.issue(Some(OperationClass::SessionData), &[name], |b| {
            b.set_session_data(name, data)
        })
    }

    /// Store a typed session value under `name`
    pub fn set_session_value<T: SessionValue>(&mut self, name: &str, value: &T) -> Request {
        match value.encode() {
            Ok(data) => self.set_session_data(name, &data),
            Err(e) => self.invalid(e.into()),
        }
    }

    /// Rename the player (≤128 characters)
    ///
    /// The cached name is updated immediately when the platform reports a change.
    pub fn set_player_name(&mut self, name: &str) -> Request {
        let mut changed = false;
        let request = self.issue(Some(OperationClass::PlayerName), &[name], |b| {
            b.set_player_name(name, &mut changed)
        });
        if request.is_valid() && changed {
            self.router.set_player_name(name);
        }
        request
    }

    /// Change the player's dominant hand
    ///
    /// The cached hand is updated immediately when the platform reports a change.
    pub fn set_player_dominant_hand(&mut self, hand: DominantHand) -> Request {
        let mut changed = false;
        let request = self.issue(None, &[], |b| {
            b.set_player_dominant_hand(hand.as_raw(), &mut changed)
        });
        if request.is_valid() && changed {
            self.router.set_dominant_hand(hand);
        }
        request
    }

    // ------------------------------------------------------------------------
    // Synchronous Queries
    // ------------------------------------------------------------------------

    fn live(&self) -> Option<&dyn PlatformBoundary> {
        self.is_initialized().then_some(&*self.boundary)
    }

    fn query_int(&self, probe: impl FnOnce(&dyn PlatformBoundary, &mut i32) -> bool) -> Option<i32> {
        let boundary = self.live()?;
        let mut value = 0;
        probe(boundary, &mut value).then_some(value)
    }

    fn query_string(
        &self,
        probe: impl Fn(&dyn PlatformBoundary, &mut [u16], &mut usize) -> bool,
    ) -> Option<String> {
        let boundary = self.live()?;
        fetch_string(|buf, size| probe(boundary, buf, size))
    }

    /// Raw session data stored under `name`
    pub fn try_get_session_data(&self, name: &str) -> Option<SessionVariable> {
        let boundary = self.live()?;
        fetch_variable_length(|buf, size| boundary.try_get_session_data(name, buf, size))
            .map(|data| SessionVariable::new(name, data))
    }

    /// Session data under `name` decoded as `T`; a decode failure is logged and reported as absent
    pub fn try_get_session_value<T: SessionValue>(&self, name: &str) -> Option<T> {
        match self.try_get_session_data(name)?.get::<T>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Session variable {} is not a valid {}: {}", name, T::TYPE_NAME, e);
                None
            }
        }
    }

    /// UI setting configured for the application on the platform
    pub fn try_get_ui_setting(&self, name: &str) -> Option<String> {
        self.query_string(|b, buf, size| b.try_get_ui_settings_data(name, buf, size))
    }

    /// UI setting parsed as `T`
    pub fn try_get_ui_setting_as<T: FromStr>(&self, name: &str) -> Option<T> {
        self.try_get_ui_setting(name)?.trim().parse().ok()
    }

    pub fn try_get_players_count(&self) -> Option<i32> {
        self.query_int(|b, value| b.try_get_players_count(value))
    }

    /// Session duration in seconds
    pub fn try_get_session_time(&self) -> Option<i32> {
        self.query_int(|b, value| b.try_get_session_time(value))
    }

    pub fn try_get_play_area_checking_mode(&self) -> Option<i32> {
        self.query_int(|b, value| b.try_get_play_area_checking_mode(value))
    }

    pub fn try_get_play_area_out_of_bounds_mode(&self) -> Option<i32> {
        self.query_int(|b, value| b.try_get_play_area_out_of_bounds_mode(value))
    }

    pub fn try_get_server_ip(&self) -> Option<String> {
        self.query_string(|b, buf, size| b.try_get_server_ip(buf, size))
    }

    pub fn try_get_session_language(&self) -> Option<String> {
        self.query_string(|b, buf, size| b.try_get_session_language(buf, size))
    }

    pub fn try_get_session_id(&self) -> Option<String> {
        self.query_string(|b, buf, size| b.try_get_session_id(buf, size))
    }

    pub fn try_get_player_id(&self) -> Option<String> {
        self.query_string(|b, buf, size| b.try_get_player_id(buf, size))
    }

    /// Current player name, read from the platform
    pub fn try_get_player_name(&self) -> Option<String> {
        query_player_name(self.live()?)
    }

    /// Current dominant hand, read from the platform
    pub fn try_get_player_dominant_hand(&self) -> Option<DominantHand> {
        query_dominant_hand(self.live()?)
    }

    /// Cached player name, refreshed on name-change events
    pub fn player_name(&self) -> &str {
        &self.router.identity().name
    }

    /// Cached dominant hand, refreshed on hand-change events
    pub fn dominant_hand(&self) -> DominantHand {
        self.router.identity().dominant_hand
    }

    /// Trial mode reported by the platform or forced with `-trial`
    pub fn is_application_in_trial_mode(&self) -> bool {
        self.config.launch.force_trial_mode
            || self
                .live()
                .is_some_and(|b| b.get_is_application_in_trial_mode())
    }

    /// Cord-twist tracking, unless disabled by the platform or `-disablecordtwisttracking`
    pub fn should_application_track_cord_twisting(&self) -> bool {
        !self.config.launch.disable_cord_twist_tracking
            && self
                .live()
                .map_or(true, |b| b.get_should_application_track_cord_twisting())
    }
}

impl Drop for Integration {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl core::fmt::Debug for Integration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Integration")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("pending_requests", &self.registry.len())
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}
