//! Inbound handlers
//!
//! This module provides the trait the message dispatch loop hands drained
//! items to, and the [`InboundRouter`] that implements it for the integration:
//! internal events refresh the cached player identity and notify observers,
//! the reserved `TIMELEFT` and `POSITION` messages are answered from
//! registered providers, and every other message goes to the application's
//! message handler.

use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error, warn};

use crate::boundary::{fetch_string, PlatformBoundary};
use crate::event::PlatformEvent;
use crate::message::{PlatformMessage, CONTENT_TYPE_JSON};
use crate::position::position_json;
use crate::types::{DominantHand, PlatformEventType, PlayerPose};

/// Reserved message answered with the remaining session time in seconds
pub const TIME_LEFT_MESSAGE: &str = "TIMELEFT";
/// Reserved message answered with the player pose as JSON
pub const POSITION_MESSAGE: &str = "POSITION";

pub type MessageCallback = Box<dyn FnMut(&mut PlatformMessage<'_>) + Send>;
pub type TimeLeftProvider = Box<dyn FnMut() -> Option<i32> + Send>;
pub type PositionProvider = Box<dyn FnMut() -> Option<PlayerPose> + Send>;
pub type PlayerNameObserver = Box<dyn FnMut(&str) + Send>;
pub type DominantHandObserver = Box<dyn FnMut(DominantHand) + Send>;

/// Token returned when an observer is registered, used to remove it again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

// ----------------------------------------------------------------------------
// Inbound Handler Trait
// ----------------------------------------------------------------------------

/// Receiver of drained inbound items
pub trait InboundHandler {
    /// Handle an internal event; the boundary is available for re-querying state
    fn handle_event(&mut self, boundary: &dyn PlatformBoundary, event: PlatformEvent);

    /// Handle an application message; a response may be written before returning
    fn handle_message(&mut self, message: &mut PlatformMessage<'_>);
}

/// Run user code, turning a panic into `None`
fn guarded<R>(what: &str, f: impl FnOnce() -> R) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(_) => {
            error!("{} panicked", what);
            None
        }
    }
}

// ----------------------------------------------------------------------------
// Player Identity Cache
// ----------------------------------------------------------------------------

/// Last known player name and dominant hand, last write wins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerIdentity {
    pub name: String,
    pub dominant_hand: DominantHand,
}

impl PlayerIdentity {
    /// Query both fields from the boundary; missing values fall back to defaults
    pub fn query(boundary: &dyn PlatformBoundary) -> Self {
        Self {
            name: query_player_name(boundary).unwrap_or_default(),
            dominant_hand: query_dominant_hand(boundary).unwrap_or_default(),
        }
    }
}

pub(crate) fn query_player_name(boundary: &dyn PlatformBoundary) -> Option<String> {
    fetch_string(|buf, size| boundary.try_get_player_name(buf, size))
}

pub(crate) fn query_dominant_hand(boundary: &dyn PlatformBoundary) -> Option<DominantHand> {
    let mut raw = 0;
    boundary
        .try_get_player_dominant_hand(&mut raw)
        .then(|| DominantHand::from(raw))
}

// ----------------------------------------------------------------------------
// Inbound Router
// ----------------------------------------------------------------------------

/// Routes drained events and messages to built-in and application handlers
#[derive(Default)]
pub struct InboundRouter {
    identity: PlayerIdentity,
    message_handler: Option<MessageCallback>,
    time_left_provider: Option<TimeLeftProvider>,
    position_provider: Option<PositionProvider>,
    name_observers: Vec<(ObserverId, PlayerNameObserver)>,
    hand_observers: Vec<(ObserverId, DominantHandObserver)>,
    next_observer: u64,
}

impl InboundRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity(&self) -> &PlayerIdentity {
        &self.identity
    }

    pub fn set_identity(&mut self, identity: PlayerIdentity) {
        self.identity = identity;
    }

    pub(crate) fn set_player_name(&mut self, name: &str) {
        self.identity.name = name.to_string();
    }

    pub(crate) fn set_dominant_hand(&mut self, hand: DominantHand) {
        self.identity.dominant_hand = hand;
    }

    /// Install the handler for application messages, replacing any previous one
    pub fn set_message_handler(&mut self, handler: MessageCallback) {
        self.message_handler = Some(handler);
    }

    pub fn set_time_left_provider(&mut self, provider: TimeLeftProvider) {
        self.time_left_provider = Some(provider);
    }

    pub fn set_position_provider(&mut self, provider: PositionProvider) {
        self.position_provider = Some(provider);
    }

    fn next_observer_id(&mut self) -> ObserverId {
        self.next_observer += 1;
        ObserverId(self.next_observer)
    }

    pub fn add_player_name_observer(&mut self, observer: PlayerNameObserver) -> ObserverId {
        let id = self.next_observer_id();
        self.name_observers.push((id, observer));
        id
    }

    pub fn add_dominant_hand_observer(&mut self, observer: DominantHandObserver) -> ObserverId {
        let id = self.next_observer_id();
        self.hand_observers.push((id, observer));
        id
    }

    /// Remove a player name observer; returns false if it was not registered
    pub fn remove_player_name_observer(&mut self, id: ObserverId) -> bool {
        let before = self.name_observers.len();
        self.name_observers.retain(|(existing, _)| *existing != id);
        self.name_observers.len() != before
    }

    /// Remove a dominant hand observer; returns false if it was not registered
    pub fn remove_dominant_hand_observer(&mut self, id: ObserverId) -> bool {
        let before = self.hand_observers.len();
        self.hand_observers.retain(|(existing, _)| *existing != id);
        self.hand_observers.len() != before
    }

    fn refresh_player_name(&mut self, boundary: &dyn PlatformBoundary) {
        let Some(name) = query_player_name(boundary) else {
            warn!("Player name changed but could not be read");
            return;
        };
        debug!("Player name changed to {}", name);
        self.identity.name = name;
        for (_, observer) in &mut self.name_observers {
            let name = self.identity.name.as_str();
            guarded("Player name observer", || observer(name));
        }
    }

    fn refresh_dominant_hand(&mut self, boundary: &dyn PlatformBoundary) {
        let Some(hand) = query_dominant_hand(boundary) else {
            warn!("Player dominant hand changed but could not be read");
            return;
        };
        debug!("Player dominant hand changed to {}", hand);
        self.identity.dominant_hand = hand;
        for (_, observer) in &mut self.hand_observers {
            guarded("Dominant hand observer", || observer(hand));
        }
    }

    /// Body of the `TIMELEFT` answer; empty without a provider or value
    fn time_left_body(&mut self) -> String {
        self.time_left_provider
            .as_mut()
            .and_then(|provider| guarded("Time-left provider", provider).flatten())
            .map(|seconds| seconds.to_string())
            .unwrap_or_default()
    }

    /// Body of the `POSITION` answer; empty without a provider or value
    fn position_body(&mut self) -> String {
        let Some(pose) = self
            .position_provider
            .as_mut()
            .and_then(|provider| guarded("Position provider", provider).flatten())
        else {
            return String::new();
        };
        position_json(&pose).unwrap_or_else(|e| {
            warn!("Failed to render position report: {}", e);
            String::new()
        })
    }

    fn forward_to_application(&mut self, message: &mut PlatformMessage<'_>) {
        let Some(handler) = self.message_handler.as_mut() else {
            debug!("No message handler for {}", message.name());
            return;
        };
        if guarded("Message handler", || handler(message)).is_none() && !message.has_response()
        {
            if let Err(e) = message.set_error("Message handler failed") {
                warn!("Could not report handler failure: {}", e);
            }
        }
    }
}

impl InboundHandler for InboundRouter {
    fn handle_event(&mut self, boundary: &dyn PlatformBoundary, event: PlatformEvent) {
        match event.event_type() {
            PlatformEventType::PlayerNameChanged => self.refresh_player_name(boundary),
            PlatformEventType::PlayerDominantHandChanged => self.refresh_dominant_hand(boundary),
            PlatformEventType::Unknown => warn!("Ignoring unknown platform event"),
        }
    }

    fn handle_message(&mut self, message: &mut PlatformMessage<'_>) {
        let name = message.name();
        let result = if name.eq_ignore_ascii_case(TIME_LEFT_MESSAGE) {
            let body = self.time_left_body();
            message.set_response_text(&body)
        } else if name.eq_ignore_ascii_case(POSITION_MESSAGE) {
            let body = self.position_body();
            message.set_response_with_content_type(&body, CONTENT_TYPE_JSON)
        } else {
            self.forward_to_application(message);
            Ok(())
        };

        if let Err(e) = result {
            warn!("Failed to answer {}: {}", message.name(), e);
        }
    }
}

impl core::fmt::Debug for InboundRouter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InboundRouter")
            .field("identity", &self.identity)
            .field("message_handler", &self.message_handler.is_some())
            .field("time_left_provider", &self.time_left_provider.is_some())
            .field("position_provider", &self.position_provider.is_some())
            .field("name_observers", &self.name_observers.len())
            .field("hand_observers", &self.hand_observers.len())
            .finish()
    }
}
