//! In-memory platform plugin
//!
//! `MockPlatform` implements [`PlatformBoundary`] the way the native plugin
//! behaves: operations return increasing correlation handles (or zero when
//! enqueueing is switched off), completed responses and inbound messages are
//! handed out from scripted queues, and every native object it hands out is
//! tracked until freed so tests can assert that nothing leaks and nothing is
//! freed twice.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arvi_core::{
    encode_utf16, AudioChatChannel, CorrelationHandle, DominantHand, EventHandle,
    EventListHandle, MessageHandle, PlatformBoundary, PlatformEventType, ResponseHandle,
};
use hashbrown::HashMap;
use tracing::{debug, trace, warn};

use crate::script::{Inbound, ScriptedMessage, ScriptedResponse};

/// Plugin version reported unless a test overrides it
pub const DEFAULT_SDK_VERSION: &str = "1.0.0";

// ----------------------------------------------------------------------------
// Recorded Traffic
// ----------------------------------------------------------------------------

/// An asynchronous operation as the platform received it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryCall {
    IsApplicationEntitled { app_key: String },
    ServerStarted,
    GameCompleted,
    CallOperator,
    SetAudioChatChannel(AudioChatChannel),
    ActivateInGameCommand(String),
    ActivateInGameCommands(Vec<String>),
    DeactivateInGameCommand(String),
    DeactivateInGameCommands(Vec<String>),
    SendGameMessage { message: String, group: String },
    SendLogMessage(String),
    SendWarningMessage(String),
    SendTrackingMessage(String),
    SetSessionData { name: String, data: Vec<u8> },
    SetPlayerName(String),
    SetPlayerDominantHand(i32),
}

/// Module lifecycle transitions, in call order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleCall {
    RequestsInitialize,
    RequestsFinalize { wait_for_complete: bool },
    MessagesInitialize,
    MessagesFinalize,
    SessionVariablesInitialize,
    SessionVariablesFinalize,
}

/// A reply the game wrote to an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenResponse {
    pub message: MessageHandle,
    /// Name of the message being answered
    pub name: String,
    pub content_type: String,
    pub status_code: i32,
    pub status_text: String,
    pub data: Vec<u8>,
}

impl WrittenResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

// ----------------------------------------------------------------------------
// Mock State
// ----------------------------------------------------------------------------

#[derive(Debug)]
struct MockState {
    next_request: u64,
    next_object: u64,
    fail_enqueue: bool,
    auto_complete: bool,
    reject_message_responses: bool,
    sdk_version: String,

    calls: Vec<(CorrelationHandle, BoundaryCall)>,
    lifecycle: Vec<LifecycleCall>,
    messages_init_error: Option<String>,
    session_variables_init_error: Option<String>,

    pending_responses: VecDeque<ScriptedResponse>,
    live_responses: HashMap<u64, ScriptedResponse>,
    inbound: VecDeque<Inbound>,
    live_messages: HashMap<u64, Inbound>,
    live_event_lists: HashMap<u64, Vec<u64>>,
    live_events: HashMap<u64, i32>,
    written: Vec<WrittenResponse>,

    freed_responses: Vec<ResponseHandle>,
    freed_messages: Vec<MessageHandle>,
    freed_event_lists: Vec<EventListHandle>,
    invalid_frees: usize,

    player_name: Option<String>,
    dominant_hand: Option<i32>,
    player_id: Option<String>,
    server_ip: Option<String>,
    session_language: Option<String>,
    session_id: Option<String>,
    players_count: Option<i32>,
    session_time: Option<i32>,
    play_area_checking_mode: Option<i32>,
    play_area_out_of_bounds_mode: Option<i32>,
    session_data: HashMap<String, Vec<u8>>,
    ui_settings: HashMap<String, String>,
    trial_mode: bool,
    track_cord_twisting: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            next_request: 1,
            next_object: 1000,
            fail_enqueue: false,
            auto_complete: false,
            reject_message_responses: false,
            sdk_version: DEFAULT_SDK_VERSION.to_string(),
            calls: Vec::new(),
            lifecycle: Vec::new(),
            messages_init_error: None,
            session_variables_init_error: None,
            pending_responses: VecDeque::new(),
            live_responses: HashMap::new(),
            inbound: VecDeque::new(),
            live_messages: HashMap::new(),
            live_event_lists: HashMap::new(),
            live_events: HashMap::new(),
            written: Vec::new(),
            freed_responses: Vec::new(),
            freed_messages: Vec::new(),
            freed_event_lists: Vec::new(),
            invalid_frees: 0,
            player_name: None,
            dominant_hand: None,
            player_id: None,
            server_ip: None,
            session_language: None,
            session_id: None,
            players_count: None,
            session_time: None,
            play_area_checking_mode: None,
            play_area_out_of_bounds_mode: None,
            session_data: HashMap::new(),
            ui_settings: HashMap::new(),
            trial_mode: false,
            track_cord_twisting: true,
        }
    }
}

impl MockState {
    fn enqueue(&mut self, call: BoundaryCall) -> CorrelationHandle {
        if self.fail_enqueue {
            debug!("Mock platform refused {:?}", call);
            return CorrelationHandle::INVALID;
        }

        let handle = CorrelationHandle::new(self.next_request);
        self.next_request += 1;
        trace!("Mock platform enqueued {:?} as {}", call, handle);
        self.calls.push((handle, call));
        if self.auto_complete {
            self.pending_responses.push_back(ScriptedResponse::success(handle));
        }
        handle
    }

    fn next_object(&mut self) -> u64 {
        let id = self.next_object;
        self.next_object += 1;
        id
    }

    fn message(&self, handle: MessageHandle) -> Option<&ScriptedMessage> {
        match self.live_messages.get(&handle.as_raw()) {
            Some(Inbound::Message(message)) => Some(message),
            _ => None,
        }
    }

    fn response(&self, handle: ResponseHandle) -> Option<&ScriptedResponse> {
        self.live_responses.get(&handle.as_raw())
    }

    fn invalid_free(&mut self, what: &str, raw: u64) {
        warn!("Mock platform: free of unknown or already freed {} {}", what, raw);
        self.invalid_frees += 1;
    }
}

/// Emulate the plugin's two-call protocol over an optional value
fn probe_units<T: Copy>(value: Option<&[T]>, buffer: &mut [T], size: &mut usize) -> bool {
    match value {
        None => {
            *size = 0;
            false
        }
        Some([]) => {
            *size = 0;
            true
        }
        Some(data) if *size < data.len() || buffer.len() < data.len() => {
            *size = data.len();
            false
        }
        Some(data) => {
            buffer[..data.len()].copy_from_slice(data);
            *size = data.len();
            true
        }
    }
}

/// Strings cross the boundary as NUL-terminated UTF-16
fn probe_string(value: Option<&str>, buffer: &mut [u16], size: &mut usize) -> bool {
    let units = value.map(|text| {
        let mut units = encode_utf16(text);
        units.push(0);
        units
    });
    probe_units(units.as_deref(), buffer, size)
}

fn probe_int(value: Option<i32>, out: &mut i32) -> bool {
    match value {
        Some(v) => {
            *out = v;
            true
        }
        None => false,
    }
}

fn fill<H: Copy>(buffer: &mut [H], count: &mut usize, mut next: impl FnMut() -> Option<H>) -> bool {
    let capacity = (*count).min(buffer.len());
    let mut filled = 0;
    while filled < capacity {
        match next() {
            Some(handle) => {
                buffer[filled] = handle;
                filled += 1;
            }
            None => break,
        }
    }
    *count = filled;
    true
}

// ----------------------------------------------------------------------------
// Mock Platform
// ----------------------------------------------------------------------------

/// Scriptable in-memory stand-in for the platform plugin
///
/// Clones share state, so a test can keep one handle for scripting and
/// assertions while the integration owns another.
#[derive(Debug, Clone, Default)]
pub struct MockPlatform {
    state: Arc<Mutex<MockState>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- behavior switches --------------------------------------------------

    /// Make every asynchronous operation return the zero handle
    pub fn set_fail_enqueue(&self, fail: bool) {
        self.lock().fail_enqueue = fail;
    }

    /// Queue a success response for every operation as it is issued
    pub fn set_auto_complete(&self, auto_complete: bool) {
        self.lock().auto_complete = auto_complete;
    }

    /// Make the plugin refuse message responses
    pub fn set_reject_message_responses(&self, reject: bool) {
        self.lock().reject_message_responses = reject;
    }

    pub fn set_sdk_version(&self, version: &str) {
        self.lock().sdk_version = version.to_string();
    }

    pub fn fail_messages_init(&self, reason: &str) {
        self.lock().messages_init_error = Some(reason.to_string());
    }

    pub fn fail_session_variables_init(&self, reason: &str) {
        self.lock().session_variables_init_error = Some(reason.to_string());
    }

    // --- scripted traffic ---------------------------------------------------

    pub fn queue_response(&self, response: ScriptedResponse) {
        self.lock().pending_responses.push_back(response);
    }

    pub fn queue_message(&self, message: ScriptedMessage) {
        self.lock().inbound.push_back(Inbound::Message(message));
    }

    /// Queue one internal message carrying `events`
    pub fn queue_events(&self, events: &[PlatformEventType]) {
        self.lock().inbound.push_back(Inbound::events(events));
    }

    /// Queue one internal message carrying raw event type values
    pub fn queue_raw_events(&self, events: &[i32]) {
        self.lock().inbound.push_back(Inbound::Events(events.to_vec()));
    }

    pub fn queue_undecodable_internal(&self) {
        self.lock().inbound.push_back(Inbound::UndecodableInternal);
    }

    // --- platform state -----------------------------------------------------

    pub fn set_player_name_value(&self, name: Option<&str>) {
        self.lock().player_name = name.map(str::to_string);
    }

    pub fn set_dominant_hand_value(&self, hand: Option<DominantHand>) {
        self.lock().dominant_hand = hand.map(|h| h.as_raw());
    }

    pub fn set_player_id(&self, id: Option<&str>) {
        self.lock().player_id = id.map(str::to_string);
    }

    pub fn set_server_ip(&self, ip: Option<&str>) {
        self.lock().server_ip = ip.map(str::to_string);
    }

    pub fn set_session_language(&self, language: Option<&str>) {
        self.lock().session_language = language.map(str::to_string);
    }

    pub fn set_session_id(&self, id: Option<&str>) {
        self.lock().session_id = id.map(str::to_string);
    }

    pub fn set_players_count(&self, count: Option<i32>) {
        self.lock().players_count = count;
    }

    pub fn set_session_time(&self, seconds: Option<i32>) {
        self.lock().session_time = seconds;
    }

    pub fn set_play_area_modes(&self, checking: Option<i32>, out_of_bounds: Option<i32>) {
        let mut state = self.lock();
        state.play_area_checking_mode = checking;
        state.play_area_out_of_bounds_mode = out_of_bounds;
    }

    pub fn insert_session_data(&self, name: &str, data: &[u8]) {
        self.lock().session_data.insert(name.to_string(), data.to_vec());
    }

    pub fn insert_ui_setting(&self, name: &str, value: &str) {
        self.lock().ui_settings.insert(name.to_string(), value.to_string());
    }

    pub fn set_trial_mode(&self, trial: bool) {
        self.lock().trial_mode = trial;
    }

    pub fn set_track_cord_twisting(&self, track: bool) {
        self.lock().track_cord_twisting = track;
    }

    // --- inspection ---------------------------------------------------------

    /// Every enqueued operation with the handle it was given
    pub fn calls(&self) -> Vec<(CorrelationHandle, BoundaryCall)> {
        self.lock().calls.clone()
    }

    pub fn last_call(&self) -> Option<BoundaryCall> {
        self.lock().calls.last().map(|(_, call)| call.clone())
    }

    pub fn lifecycle(&self) -> Vec<LifecycleCall> {
        self.lock().lifecycle.clone()
    }

    pub fn written_responses(&self) -> Vec<WrittenResponse> {
        self.lock().written.clone()
    }

    pub fn session_data(&self, name: &str) -> Option<Vec<u8>> {
        self.lock().session_data.get(name).cloned()
    }

    pub fn freed_responses(&self) -> Vec<ResponseHandle> {
        self.lock().freed_responses.clone()
    }

    pub fn freed_messages(&self) -> Vec<MessageHandle> {
        self.lock().freed_messages.clone()
    }

    pub fn freed_event_lists(&self) -> Vec<EventListHandle> {
        self.lock().freed_event_lists.clone()
    }

    /// Frees of objects that were never handed out or were already freed
    pub fn invalid_frees(&self) -> usize {
        self.lock().invalid_frees
    }

    /// Native objects handed out and not yet freed
    pub fn live_objects(&self) -> usize {
        let state = self.lock();
        state.live_responses.len() + state.live_messages.len() + state.live_event_lists.len()
    }

    /// Scripted responses and messages not yet drained
    pub fn queued(&self) -> (usize, usize) {
        let state = self.lock();
        (state.pending_responses.len(), state.inbound.len())
    }
}

// ----------------------------------------------------------------------------
// Platform Boundary Implementation
// ----------------------------------------------------------------------------

impl PlatformBoundary for MockPlatform {
    fn sdk_version(&self) -> String {
        self.lock().sdk_version.clone()
    }

    fn requests_initialize(&self) {
        self.lock().lifecycle.push(LifecycleCall::RequestsInitialize);
    }

    fn requests_finalize(&self, wait_for_complete: bool) {
        self.lock()
            .lifecycle
            .push(LifecycleCall::RequestsFinalize { wait_for_complete });
    }

    fn messages_initialize(&self) -> bool {
        let mut state = self.lock();
        state.lifecycle.push(LifecycleCall::MessagesInitialize);
        state.messages_init_error.is_none()
    }

    fn messages_finalize(&self) {
        self.lock().lifecycle.push(LifecycleCall::MessagesFinalize);
    }

    fn messages_error_message(&self) -> String {
        self.lock().messages_init_error.clone().unwrap_or_default()
    }

    fn session_variables_initialize(&self) -> bool {
        let mut state = self.lock();
        state.lifecycle.push(LifecycleCall::SessionVariablesInitialize);
        state.session_variables_init_error.is_none()
    }

    fn session_variables_finalize(&self) {
        self.lock().lifecycle.push(LifecycleCall::SessionVariablesFinalize);
    }

    fn session_variables_error_message(&self) -> String {
        self.lock()
            .session_variables_init_error
            .clone()
            .unwrap_or_default()
    }

    // --- asynchronous operations --------------------------------------------

    fn is_application_entitled(&self, app_key: &str) -> CorrelationHandle {
        self.lock().enqueue(BoundaryCall::IsApplicationEntitled {
            app_key: app_key.to_string(),
        })
    }

    fn server_started(&self) -> CorrelationHandle {
        self.lock().enqueue(BoundaryCall::ServerStarted)
    }

    fn game_completed(&self) -> CorrelationHandle {
        self.lock().enqueue(BoundaryCall::GameCompleted)
    }

    fn call_operator(&self) -> CorrelationHandle {
        self.lock().enqueue(BoundaryCall::CallOperator)
    }

    fn set_audio_chat_channel(&self, channel: AudioChatChannel) -> CorrelationHandle {
        self.lock().enqueue(BoundaryCall::SetAudioChatChannel(channel))
    }

    fn activate_in_game_command(&self, activation_message: &str) -> CorrelationHandle {
        self.lock()
            .enqueue(BoundaryCall::ActivateInGameCommand(activation_message.to_string()))
    }

    fn activate_in_game_commands(&self, activation_messages: &[&str]) -> CorrelationHandle {
        let messages = activation_messages.iter().map(|m| m.to_string()).collect();
        self.lock().enqueue(BoundaryCall::ActivateInGameCommands(messages))
    }

    fn deactivate_in_game_command(&self, deactivation_message: &str) -> CorrelationHandle {
        self.lock()
            .enqueue(BoundaryCall::DeactivateInGameCommand(deactivation_message.to_string()))
    }

    fn deactivate_in_game_commands(&self, deactivation_messages: &[&str]) -> CorrelationHandle {
        let messages = deactivation_messages.iter().map(|m| m.to_string()).collect();
        self.lock().enqueue(BoundaryCall::DeactivateInGameCommands(messages))
    }

    fn send_game_message(&self, message: &str, message_group: &str) -> CorrelationHandle {
        self.lock().enqueue(BoundaryCall::SendGameMessage {
            message: message.to_string(),
            group: message_group.to_string(),
        })
    }

    fn send_log_message(&self, message: &str) -> CorrelationHandle {
        self.lock().enqueue(BoundaryCall::SendLogMessage(message.to_string()))
    }

    fn send_warning_message(&self, message: &str) -> CorrelationHandle {
        self.lock().enqueue(BoundaryCall::SendWarningMessage(message.to_string()))
    }

    fn send_tracking_message(&self, message: &str) -> CorrelationHandle {
        self.lock().enqueue(BoundaryCall::SendTrackingMessage(message.to_string()))
    }

    fn set_session_data(&self, name: &str, data: &[u8]) -> CorrelationHandle {
        let mut state = self.lock();
        let handle = state.enqueue(BoundaryCall::SetSessionData {
            name: name.to_string(),
            data: data.to_vec(),
        });
        if handle.is_valid() {
            state.session_data.insert(name.to_string(), data.to_vec());
        }
        handle
    }

    fn set_player_name(&self, name: &str, changed: &mut bool) -> CorrelationHandle {
        let mut state = self.lock();
        let handle = state.enqueue(BoundaryCall::SetPlayerName(name.to_string()));
        *changed = handle.is_valid() && state.player_name.as_deref() != Some(name);
        if *changed {
            state.player_name = Some(name.to_string());
        }
        handle
    }

    fn set_player_dominant_hand(&self, hand: i32, changed: &mut bool) -> CorrelationHandle {
        let mut state = self.lock();
        let handle = state.enqueue(BoundaryCall::SetPlayerDominantHand(hand));
        *changed = handle.is_valid() && state.dominant_hand != Some(hand);
        if *changed {
            state.dominant_hand = Some(hand);
        }
        handle
    }

    // --- synchronous probes -------------------------------------------------

    fn try_get_session_data(&self, name: &str, buffer: &mut [u8], size: &mut usize) -> bool {
        let state = self.lock();
        probe_units(state.session_data.get(name).map(Vec::as_slice), buffer, size)
    }

    fn try_get_ui_settings_data(&self, name: &str, buffer: &mut [u16], size: &mut usize) -> bool {
        let state = self.lock();
        probe_string(state.ui_settings.get(name).map(String::as_str), buffer, size)
    }

    fn try_get_server_ip(&self, buffer: &mut [u16], size: &mut usize) -> bool {
        probe_string(self.lock().server_ip.as_deref(), buffer, size)
    }

    fn try_get_session_language(&self, buffer: &mut [u16], size: &mut usize) -> bool {
        probe_string(self.lock().session_language.as_deref(), buffer, size)
    }

    fn try_get_session_id(&self, buffer: &mut [u16], size: &mut usize) -> bool {
        probe_string(self.lock().session_id.as_deref(), buffer, size)
    }

    fn try_get_player_id(&self, buffer: &mut [u16], size: &mut usize) -> bool {
        probe_string(self.lock().player_id.as_deref(), buffer, size)
    }

    fn try_get_player_name(&self, buffer: &mut [u16], size: &mut usize) -> bool {
        probe_string(self.lock().player_name.as_deref(), buffer, size)
    }

    fn try_get_players_count(&self, players_count: &mut i32) -> bool {
        probe_int(self.lock().players_count, players_count)
    }

    fn try_get_session_time(&self, session_time: &mut i32) -> bool {
        probe_int(self.lock().session_time, session_time)
    }

    fn try_get_player_dominant_hand(&self, hand: &mut i32) -> bool {
        probe_int(self.lock().dominant_hand, hand)
    }

    fn try_get_play_area_checking_mode(&self, mode: &mut i32) -> bool {
        probe_int(self.lock().play_area_checking_mode, mode)
    }

    fn try_get_play_area_out_of_bounds_mode(&self, mode: &mut i32) -> bool {
        probe_int(self.lock().play_area_out_of_bounds_mode, mode)
    }

    fn get_is_application_in_trial_mode(&self) -> bool {
        self.lock().trial_mode
    }

    fn get_should_application_track_cord_twisting(&self) -> bool {
        self.lock().track_cord_twisting
    }

    // --- inbound messages and events ----------------------------------------

    fn messages_get(&self, buffer: &mut [MessageHandle], count: &mut usize) -> bool {
        let mut state = self.lock();
        let state = &mut *state;
        fill(buffer, count, || {
            let item = state.inbound.pop_front()?;
            let id = state.next_object();
            state.live_messages.insert(id, item);
            Some(MessageHandle::from_raw(id))
        })
    }

    fn message_is_internal(&self, message: MessageHandle) -> bool {
        self.lock()
            .live_messages
            .get(&message.as_raw())
            .is_some_and(Inbound::is_internal)
    }

    fn message_handle_internal(
        &self,
        message: MessageHandle,
        events: &mut EventListHandle,
    ) -> bool {
        let mut state = self.lock();
        let types = match state.live_messages.get(&message.as_raw()) {
            Some(Inbound::Events(types)) => types.clone(),
            _ => return false,
        };

        let list = state.next_object();
        let mut members = Vec::with_capacity(types.len());
        for event_type in types {
            let id = state.next_object();
            state.live_events.insert(id, event_type);
            members.push(id);
        }
        state.live_event_lists.insert(list, members);
        *events = EventListHandle::from_raw(list);
        true
    }

    fn event_list_count(&self, events: EventListHandle) -> usize {
        self.lock()
            .live_event_lists
            .get(&events.as_raw())
            .map_or(0, Vec::len)
    }

    fn event_list_get(&self, events: EventListHandle, index: usize) -> EventHandle {
        self.lock()
            .live_event_lists
            .get(&events.as_raw())
            .and_then(|members| members.get(index))
            .map_or(EventHandle::NULL, |&id| EventHandle::from_raw(id))
    }

    fn event_list_free(&self, events: EventListHandle) {
        let mut state = self.lock();
        match state.live_event_lists.remove(&events.as_raw()) {
            Some(members) => {
                for id in members {
                    state.live_events.remove(&id);
                }
                state.freed_event_lists.push(events);
            }
            None => state.invalid_free("event list", events.as_raw()),
        }
    }

    fn event_get_type(&self, event: EventHandle) -> i32 {
        self.lock()
            .live_events
            .get(&event.as_raw())
            .copied()
            .unwrap_or(0)
    }

    fn message_method(&self, message: MessageHandle) -> String {
        let state = self.lock();
        state.message(message).map(|m| m.method.clone()).unwrap_or_default()
    }

    fn message_name(&self, message: MessageHandle) -> String {
        let state = self.lock();
        state.message(message).map(|m| m.name.clone()).unwrap_or_default()
    }

    fn message_params_count(&self, message: MessageHandle) -> usize {
        self.lock().message(message).map_or(0, |m| m.params.len())
    }

    fn message_param_name(&self, message: MessageHandle, index: usize) -> String {
        let state = self.lock();
        state
            .message(message)
            .and_then(|m| m.params.get(index))
            .map(|(name, _)| name.clone())
            .unwrap_or_default()
    }

    fn message_param_value(&self, message: MessageHandle, index: usize) -> String {
        let state = self.lock();
        state
            .message(message)
            .and_then(|m| m.params.get(index))
            .map(|(_, value)| value.clone())
            .unwrap_or_default()
    }

    fn message_data_size(&self, message: MessageHandle) -> usize {
        self.lock().message(message).map_or(0, |m| m.data.len())
    }

    fn message_data(&self, message: MessageHandle, buffer: &mut [u8], size: &mut usize) -> bool {
        let state = self.lock();
        let data = state.message(message).map(|m| m.data.as_slice());
        probe_units(data, buffer, size)
    }

    fn message_set_response(
        &self,
        message: MessageHandle,
        content_type: &str,
        status_code: i32,
        status_text: &str,
        data: &[u8],
    ) -> bool {
        let mut state = self.lock();
        if state.reject_message_responses {
            return false;
        }
        let Some(name) = state.message(message).map(|m| m.name.clone()) else {
            warn!("Mock platform: response written to unknown message {}", message.as_raw());
            return false;
        };
        state.written.push(WrittenResponse {
            message,
            name,
            content_type: content_type.to_string(),
            status_code,
            status_text: status_text.to_string(),
            data: data.to_vec(),
        });
        true
    }

    fn message_free(&self, message: MessageHandle) {
        let mut state = self.lock();
        if state.live_messages.remove(&message.as_raw()).is_some() {
            state.freed_messages.push(message);
        } else {
            state.invalid_free("message", message.as_raw());
        }
    }

    // --- completed responses ------------------------------------------------

    fn responses_get(&self, buffer: &mut [ResponseHandle], count: &mut usize) -> bool {
        let mut state = self.lock();
        let state = &mut *state;
        fill(buffer, count, || {
            let response = state.pending_responses.pop_front()?;
            let id = state.next_object();
            state.live_responses.insert(id, response);
            Some(ResponseHandle::from_raw(id))
        })
    }

    fn response_type(&self, response: ResponseHandle) -> i32 {
        self.lock().response(response).map_or(0, |r| r.response_type)
    }

    fn response_request_id(&self, response: ResponseHandle) -> CorrelationHandle {
        self.lock()
            .response(response)
            .map_or(CorrelationHandle::INVALID, |r| r.request_id)
    }

    fn response_error_code(&self, response: ResponseHandle) -> i32 {
        self.lock().response(response).map_or(0, |r| r.error_code)
    }

    fn response_error_message(&self, response: ResponseHandle) -> String {
        let state = self.lock();
        state
            .response(response)
            .map(|r| r.error_message.clone())
            .unwrap_or_default()
    }

    fn response_data_size(&self, response: ResponseHandle) -> usize {
        self.lock().response(response).map_or(0, |r| r.data.len())
    }

    fn response_data(&self, response: ResponseHandle, buffer: &mut [u8], size: &mut usize) -> bool {
        let state = self.lock();
        match state.response(response) {
            Some(r) if r.fail_data_fetch => false,
            Some(r) => probe_units(Some(r.data.as_slice()), buffer, size),
            None => false,
        }
    }

    fn response_free(&self, response: ResponseHandle) {
        let mut state = self.lock();
        if state.live_responses.remove(&response.as_raw()).is_some() {
            state.freed_responses.push(response);
        } else {
            state.invalid_free("response", response.as_raw());
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
