//! Boundary call layer
//!
//! `PlatformBoundary` is the capability contract of the platform plugin. Every
//! call returns immediately: asynchronous operations hand back a
//! [`CorrelationHandle`] (zero when the platform could not enqueue them) whose
//! outcome is delivered later through the response queue, and synchronous
//! probes return a success flag plus an out-value.
//!
//! Variable-length reads follow a two-call protocol: the caller first passes an
//! empty buffer with `size == 0`; the call fails and reports the required size
//! (or leaves it at zero when there is nothing to read). The caller then
//! allocates exactly that many units and calls again. [`fetch_variable_length`]
//! implements the caller side once for every getter.
//!
//! ## Platform limits
//!
//! The platform enforces these limits; see [`crate::limits`] for optional
//! client-side enforcement.
//!
//! | operation | max length | rate |
//! |-----------|-----------:|------|
//! | activate/deactivate command | 128 chars | 10/s, 100/min |
//! | activate/deactivate commands (batch) | 2048 chars | 10/s, 100/min |
//! | game message | 2048 chars | 10/s, 100/min |
//! | log message | 10240 chars | 10/s, 100/min |
//! | warning message | 2048 chars | 1/s, 10/min |
//! | tracking message | 1024 chars | 10/s, 100/min |
//! | session data name | 256 chars | total session data ≤ 100 MB |
//! | player name | 128 chars | |

use crate::types::{
    AudioChatChannel, CorrelationHandle, EventHandle, EventListHandle, MessageHandle,
    ResponseHandle,
};

// ----------------------------------------------------------------------------
// Platform Boundary Trait
// ----------------------------------------------------------------------------

/// Operation catalog of the platform plugin
///
/// Implementations must not block: the plugin queues work and returns.
/// Native resources handed out through `messages_get`, `responses_get` and
/// `message_handle_internal` stay valid until the matching `*_free` call.
pub trait PlatformBoundary: Send + Sync {
    // --- module lifecycle ---------------------------------------------------

    /// Version of the native plugin
    fn sdk_version(&self) -> String;
    fn requests_initialize(&self);
    fn requests_finalize(&self, wait_for_complete: bool);
    fn messages_initialize(&self) -> bool;
    fn messages_finalize(&self);
    fn messages_error_message(&self) -> String;
    fn session_variables_initialize(&self) -> bool;
    fn session_variables_finalize(&self);
    fn session_variables_error_message(&self) -> String;

    // --- asynchronous operations --------------------------------------------

    fn is_application_entitled(&self, app_key: &str) -> CorrelationHandle;
    fn server_started(&self) -> CorrelationHandle;
    fn game_completed(&self) -> CorrelationHandle;
    fn call_operator(&self) -> CorrelationHandle;
    fn set_audio_chat_channel(&self, channel: AudioChatChannel) -> CorrelationHandle;
    fn activate_in_game_command(&self, activation_message: &str) -> CorrelationHandle;
    /// Messages are forwarded to the plugin in the given order
    fn activate_in_game_commands(&self, activation_messages: &[&str]) -> CorrelationHandle;
    fn deactivate_in_game_command(&self, deactivation_message: &str) -> CorrelationHandle;
    /// Messages are forwarded to the plugin in the given order
    fn deactivate_in_game_commands(&self, deactivation_messages: &[&str]) -> CorrelationHandle;
    fn send_game_message(&self, message: &str, message_group: &str) -> CorrelationHandle;
    fn send_log_message(&self, message: &str) -> CorrelationHandle;
    fn send_warning_message(&self, message: &str) -> CorrelationHandle;
    fn send_tracking_message(&self, message: &str) -> CorrelationHandle;
    fn set_session_data(&self, name: &str, data: &[u8]) -> CorrelationHandle;
    /// `changed` reports whether the name differs from the current one
    fn set_player_name(&self, name: &str, changed: &mut bool) -> CorrelationHandle;
    /// `changed` reports whether the hand differs from the current one
    fn set_player_dominant_hand(&self, hand: i32, changed: &mut bool) -> CorrelationHandle;

    // --- synchronous probes -------------------------------------------------

    /// Two-call protocol, byte units
    fn try_get_session_data(&self, name: &str, buffer: &mut [u8], size: &mut usize) -> bool;
    /// Two-call protocol, UTF-16 units
    fn try_get_ui_settings_data(&self, name: &str, buffer: &mut [u16], size: &mut usize)
        -> bool;
    /// Two-call protocol, UTF-16 units
    fn try_get_server_ip(&self, buffer: &mut [u16], size: &mut usize) -> bool;
    /// Two-call protocol, UTF-16 units
    fn try_get_session_language(&self, buffer: &mut [u16], size: &mut usize) -> bool;
    /// Two-call protocol, UTF-16 units
    fn try_get_session_id(&self, buffer: &mut [u16], size: &mut usize) -> bool;
    /// Two-call protocol, UTF-16 units
    fn try_get_player_id(&self, buffer: &mut [u16], size: &mut usize) -> bool;
    /// Two-call protocol, UTF-16 units
    fn try_get_player_name(&self, buffer: &mut [u16], size: &mut usize) -> bool;
    fn try_get_players_count(&self, players_count: &mut i32) -> bool;
    fn try_get_session_time(&self, session_time: &mut i32) -> bool;
    fn try_get_player_dominant_hand(&self, hand: &mut i32) -> bool;
    fn try_get_play_area_checking_mode(&self, mode: &mut i32) -> bool;
    fn try_get_play_area_out_of_bounds_mode(&self, mode: &mut i32) -> bool;
    fn get_is_application_in_trial_mode(&self) -> bool;
    fn get_should_application_track_cord_twisting(&self) -> bool;

    // --- inbound messages and events ----------------------------------------

    /// Dequeue up to `*count` messages into `buffer`; `*count` receives the number dequeued
    fn messages_get(&self, buffer: &mut [MessageHandle], count: &mut usize) -> bool;
    fn message_is_internal(&self, message: MessageHandle) -> bool;
    /// Decode an internal message into a native event list
    fn message_handle_internal(&self, message: MessageHandle, events: &mut EventListHandle)
        -> bool;
    fn event_list_count(&self, events: EventListHandle) -> usize;
    fn event_list_get(&self, events: EventListHandle, index: usize) -> EventHandle;
    fn event_list_free(&self, events: EventListHandle);
    fn event_get_type(&self, event: EventHandle) -> i32;
    fn message_method(&self, message: MessageHandle) -> String;
    fn message_name(&self, message: MessageHandle) -> String;
    fn message_params_count(&self, message: MessageHandle) -> usize;
    fn message_param_name(&self, message: MessageHandle, index: usize) -> String;
    fn message_param_value(&self, message: MessageHandle, index: usize) -> String;
    fn message_data_size(&self, message: MessageHandle) -> usize;
    fn message_data(&self, message: MessageHandle, buffer: &mut [u8], size: &mut usize) -> bool;
    fn message_set_response(
        &self,
        message: MessageHandle,
        content_type: &str,
        status_code: i32,
        status_text: &str,
        data: &[u8],
    ) -> bool;
    fn message_free(&self, message: MessageHandle);

    // --- completed responses ------------------------------------------------

    /// Dequeue up to `*count` responses into `buffer`; `*count` receives the number dequeued
    fn responses_get(&self, buffer: &mut [ResponseHandle], count: &mut usize) -> bool;
    fn response_type(&self, response: ResponseHandle) -> i32;
    fn response_request_id(&self, response: ResponseHandle) -> CorrelationHandle;
    fn response_error_code(&self, response: ResponseHandle) -> i32;
    fn response_error_message(&self, response: ResponseHandle) -> String;
    fn response_data_size(&self, response: ResponseHandle) -> usize;
    fn response_data(&self, response: ResponseHandle, buffer: &mut [u8], size: &mut usize)
        -> bool;
    fn response_free(&self, response: ResponseHandle);
}

// ----------------------------------------------------------------------------
// Two-Call Protocol Helpers
// ----------------------------------------------------------------------------

/// Run the size-probe-then-fetch protocol against a variable-length getter
///
/// Returns `None` when the value is absent or the second call fails, and
/// `Some` with exactly the number of units the getter reported otherwise.
pub fn fetch_variable_length<T, F>(mut probe: F) -> Option<Vec<T>>
where
    T: Copy + Default,
    F: FnMut(&mut [T], &mut usize) -> bool,
{
    let mut required = 0usize;
    if probe(&mut [], &mut required) {
        // Present but empty
        return Some(Vec::new());
    }
    if required == 0 {
        return None;
    }

    let mut buffer = vec![T::default(); required];
    let mut filled = required;
    if !probe(&mut buffer, &mut filled) {
        return None;
    }
    buffer.truncate(filled.min(required));
    Some(buffer)
}

/// Fetch a UTF-16 string through the two-call protocol
///
/// Trailing NUL terminators are stripped; invalid UTF-16 is reported as absent.
pub fn fetch_string<F>(probe: F) -> Option<String>
where
    F: FnMut(&mut [u16], &mut usize) -> bool,
{
    let mut units = fetch_variable_length(probe)?;
    while units.last() == Some(&0) {
        units.pop();
    }
    String::from_utf16(&units).ok()
}

/// Fetch a payload whose size is known up front (message and response data)
pub(crate) fn fetch_sized<F>(size: usize, mut fetch: F) -> Vec<u8>
where
    F: FnMut(&mut [u8], &mut usize) -> bool,
{
    if size == 0 {
        return Vec::new();
    }
    let mut buffer = vec![0u8; size];
    let mut filled = size;
    if fetch(&mut buffer, &mut filled) {
        buffer.truncate(filled.min(size));
        buffer
    } else {
        Vec::new()
    }
}

/// Encode a string the way the plugin expects variable-length text
pub fn encode_utf16(value: &str) -> Vec<u16> {
    value.encode_utf16().collect()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
