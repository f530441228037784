//! Native plugin binding
//!
//! [`NativeBoundary`] implements [`PlatformBoundary`] over the C ABI exported
//! by the platform plugin (`libARVI`). Strings cross the boundary as
//! NUL-terminated UTF-16, sizes as `int`, booleans as 32-bit `BOOL`, and
//! native objects as opaque pointers.

use core::ffi::{c_int, c_void};
use core::ptr;

use crate::boundary::{encode_utf16, PlatformBoundary};
use crate::types::{
    AudioChatChannel, CorrelationHandle, EventHandle, EventListHandle, MessageHandle,
    ResponseHandle,
};

type NativeBool = c_int;
type WideStr = *const u16;
type Object = *mut c_void;

// ----------------------------------------------------------------------------
// C ABI
// ----------------------------------------------------------------------------

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        #[link(name = "libARVI")]
        extern "C" {}
    } else {
        #[link(name = "ARVI")]
        extern "C" {}
    }
}

extern "C" {
    fn GetSDKVersion() -> WideStr;

    fn Requests_Initialize();
    fn Requests_Finalize(wait_for_complete: NativeBool);
    fn Messages_Initialize() -> NativeBool;
    fn Messages_Finalize();
    fn Messages_GetErrorMessage() -> WideStr;
    fn SessionVariables_Initialize() -> NativeBool;
    fn SessionVariables_Finalize();
    fn SessionVariables_GetErrorMessage() -> WideStr;

    fn IsApplicationEntitled(app_key: WideStr) -> u64;
    fn ServerStarted() -> u64;
    fn GameCompleted() -> u64;
    fn CallOperator() -> u64;
    fn SetAudioChatChannel(channel: c_int) -> u64;
    fn ActivateInGameCommand(activation_message: WideStr) -> u64;
    fn ActivateInGameCommands(activation_messages: *const WideStr, count: c_int) -> u64;
    fn DeactivateInGameCommand(deactivation_message: WideStr) -> u64;
    fn DeactivateInGameCommands(deactivation_messages: *const WideStr, count: c_int) -> u64;
    fn SendGameMessage(message: WideStr, message_group: WideStr) -> u64;
    fn SendLogMessage(message: WideStr) -> u64;
    fn SendWarningMessage(message: WideStr) -> u64;
    fn SendTrackingMessage(message: WideStr) -> u64;
    fn SetSessionData(name: WideStr, data: *const u8, size: c_int) -> u64;
    fn SetPlayerName(name: WideStr, changed: *mut NativeBool) -> u64;
    fn SetPlayerDominantHand(hand: c_int, changed: *mut NativeBool) -> u64;

    fn TryGetSessionData(name: WideStr, data: *mut u8, size: *mut c_int) -> NativeBool;
    fn TryGetUISettingsData(name: WideStr, buffer: *mut u16, size: *mut c_int) -> NativeBool;
    fn TryGetServerIP(buffer: *mut u16, size: *mut c_int) -> NativeBool;
    fn TryGetSessionLanguage(buffer: *mut u16, size: *mut c_int) -> NativeBool;
    fn TryGetSessionID(buffer: *mut u16, size: *mut c_int) -> NativeBool;
    fn TryGetPlayerID(buffer: *mut u16, size: *mut c_int) -> NativeBool;
    fn TryGetPlayerName(buffer: *mut u16, size: *mut c_int) -> NativeBool;
    fn TryGetPlayersCount(players_count: *mut c_int) -> NativeBool;
    fn TryGetSessionTime(session_time: *mut c_int) -> NativeBool;
    fn TryGetPlayerDominantHand(hand: *mut c_int) -> NativeBool;
    fn TryGetPlayAreaCheckingMode(mode: *mut c_int) -> NativeBool;
    fn TryGetPlayAreaOutOfBoundsMode(mode: *mut c_int) -> NativeBool;
    fn GetIsApplicationInTrialMode() -> NativeBool;
    fn GetShouldApplicationTrackCordTwisting() -> NativeBool;

    fn Messages_Get(messages: *mut Object, count: *mut c_int) -> NativeBool;
    fn Message_GetIsInternalMessage(message: Object) -> NativeBool;
    fn Message_HandleInternalMessage(message: Object, events: *mut Object) -> NativeBool;
    fn EventList_GetCount(events: Object) -> c_int;
    fn EventList_GetEvent(events: Object, index: c_int) -> Object;
    fn EventList_Free(events: Object);
    fn Event_GetType(event: Object) -> c_int;
    fn Message_GetMethod(message: Object) -> WideStr;
    fn Message_GetName(message: Object) -> WideStr;
    fn Message_GetParamsCount(message: Object) -> c_int;
    fn Message_GetParamName(message: Object, index: c_int) -> WideStr;
    fn Message_GetParamValue(message: Object, index: c_int) -> WideStr;
    fn Message_GetDataSize(message: Object) -> c_int;
    fn Message_GetData(message: Object, data: *mut u8, size: *mut c_int) -> NativeBool;
    fn Message_SetResponse(
        message: Object,
        content_type: WideStr,
        status_code: c_int,
        status_text: WideStr,
        data: *const u8,
        size: c_int,
    ) -> NativeBool;
    fn Message_Free(message: Object);

    fn Responses_Get(responses: *mut Object, count: *mut c_int) -> NativeBool;
    fn Response_GetType(response: Object) -> c_int;
    fn Response_GetRequestID(response: Object) -> u64;
    fn Response_GetErrorCode(response: Object) -> c_int;
    fn Response_GetErrorMessage(response: Object) -> WideStr;
    fn Response_GetDataSize(response: Object) -> c_int;
    fn Response_GetData(response: Object, data: *mut u8, size: *mut c_int) -> NativeBool;
    fn Response_Free(response: Object);
}

// ----------------------------------------------------------------------------
// Marshalling Helpers
// ----------------------------------------------------------------------------

/// NUL-terminated UTF-16 copy of `value`
fn wide(value: &str) -> Vec<u16> {
    let mut units = encode_utf16(value);
    units.push(0);
    units
}

/// Copy a NUL-terminated UTF-16 string owned by the plugin
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated UTF-16 string.
unsafe fn read_wide(ptr: WideStr) -> String {
    if ptr.is_null() {
        return String::new();
    }
    let mut len = 0;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    String::from_utf16_lossy(core::slice::from_raw_parts(ptr, len))
}

fn object(raw: u64) -> Object {
    raw as usize as Object
}

fn to_int(value: usize) -> c_int {
    c_int::try_from(value).unwrap_or(c_int::MAX)
}

fn from_int(value: c_int) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// Call a sized getter with a Rust slice and size
fn with_size<T>(
    buffer: &mut [T],
    size: &mut usize,
    call: impl FnOnce(*mut T, *mut c_int) -> NativeBool,
) -> bool {
    let data = if buffer.is_empty() {
        ptr::null_mut()
    } else {
        buffer.as_mut_ptr()
    };
    let mut native_size = to_int((*size).min(buffer.len()));
    let ok = call(data, &mut native_size) != 0;
    *size = from_int(native_size);
    ok
}

/// Drain a queue of native objects into `buffer`
fn drain(
    buffer_len: usize,
    count: &mut usize,
    call: impl FnOnce(*mut Object, *mut c_int) -> NativeBool,
    mut store: impl FnMut(usize, u64),
) -> bool {
    let capacity = (*count).min(buffer_len);
    let mut objects: Vec<Object> = vec![ptr::null_mut(); capacity];
    let mut native_count = to_int(capacity);
    let ok = call(objects.as_mut_ptr(), &mut native_count) != 0;
    *count = from_int(native_count).min(capacity);
    for (index, object) in objects.iter().take(*count).enumerate() {
        store(index, *object as usize as u64);
    }
    ok
}

// ----------------------------------------------------------------------------
// Native Boundary
// ----------------------------------------------------------------------------

/// Boundary backed by the platform plugin library
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBoundary;

impl NativeBoundary {
    pub fn new() -> Self {
        Self
    }
}

// SAFETY (all blocks below): every pointer handed to the plugin is either null,
// a NUL-terminated buffer that outlives the call, or a slice whose length is
// passed alongside it. Object handles only ever come from the plugin itself.
impl PlatformBoundary for NativeBoundary {
    fn sdk_version(&self) -> String {
        unsafe { read_wide(GetSDKVersion()) }
    }

    fn requests_initialize(&self) {
        unsafe { Requests_Initialize() }
    }

    fn requests_finalize(&self, wait_for_complete: bool) {
        unsafe { Requests_Finalize(NativeBool::from(wait_for_complete)) }
    }

    fn messages_initialize(&self) -> bool {
        unsafe { Messages_Initialize() != 0 }
    }

    fn messages_finalize(&self) {
        unsafe { Messages_Finalize() }
    }

    fn messages_error_message(&self) -> String {
        unsafe { read_wide(Messages_GetErrorMessage()) }
    }

    fn session_variables_initialize(&self) -> bool {
        unsafe { SessionVariables_Initialize() != 0 }
    }

    fn session_variables_finalize(&self) {
        unsafe { SessionVariables_Finalize() }
    }

    fn session_variables_error_message(&self) -> String {
        unsafe { read_wide(SessionVariables_GetErrorMessage()) }
    }

    fn is_application_entitled(&self, app_key: &str) -> CorrelationHandle {
        let app_key = wide(app_key);
        CorrelationHandle::new(unsafe { IsApplicationEntitled(app_key.as_ptr()) })
    }

    fn server_started(&self) -> CorrelationHandle {
        CorrelationHandle::new(unsafe { ServerStarted() })
    }

    fn game_completed(&self) -> CorrelationHandle {
        CorrelationHandle::new(unsafe { GameCompleted() })
    }

    fn call_operator(&self) -> CorrelationHandle {
        CorrelationHandle::new(unsafe { CallOperator() })
    }

    fn set_audio_chat_channel(&self, channel: AudioChatChannel) -> CorrelationHandle {
        CorrelationHandle::new(unsafe { SetAudioChatChannel(channel.number()) })
    }

    fn activate_in_game_command(&self, activation_message: &str) -> CorrelationHandle {
        let message = wide(activation_message);
        CorrelationHandle::new(unsafe { ActivateInGameCommand(message.as_ptr()) })
    }

    fn activate_in_game_commands(&self, activation_messages: &[&str]) -> CorrelationHandle {
        let owned: Vec<Vec<u16>> = activation_messages.iter().map(|m| wide(m)).collect();
        let pointers: Vec<WideStr> = owned.iter().map(|m| m.as_ptr()).collect();
        CorrelationHandle::new(unsafe {
            ActivateInGameCommands(pointers.as_ptr(), to_int(pointers.len()))
        })
    }

    fn deactivate_in_game_command(&self, deactivation_message: &str) -> CorrelationHandle {
        let message = wide(deactivation_message);
        CorrelationHandle::new(unsafe { DeactivateInGameCommand(message.as_ptr()) })
    }

    fn deactivate_in_game_commands(&self, deactivation_messages: &[&str]) -> CorrelationHandle {
        let owned: Vec<Vec<u16>> = deactivation_messages.iter().map(|m| wide(m)).collect();
        let pointers: Vec<WideStr> = owned.iter().map(|m| m.as_ptr()).collect();
        CorrelationHandle::new(unsafe {
            DeactivateInGameCommands(pointers.as_ptr(), to_int(pointers.len()))
        })
    }

    fn send_game_message(&self, message: &str, message_group: &str) -> CorrelationHandle {
        let message = wide(message);
        let group = wide(message_group);
        CorrelationHandle::new(unsafe { SendGameMessage(message.as_ptr(), group.as_ptr()) })
    }

    fn send_log_message(&self, message: &str) -> CorrelationHandle {
        let message = wide(message);
        CorrelationHandle::new(unsafe { SendLogMessage(message.as_ptr()) })
    }

    fn send_warning_message(&self, message: &str) -> CorrelationHandle {
        let message = wide(message);
        CorrelationHandle::new(unsafe { SendWarningMessage(message.as_ptr()) })
    }

    fn send_tracking_message(&self, message: &str) -> CorrelationHandle {
        let message = wide(message);
        CorrelationHandle::new(unsafe { SendTrackingMessage(message.as_ptr()) })
    }

    fn set_session_data(&self, name: &str, data: &[u8]) -> CorrelationHandle {
        let name = wide(name);
        CorrelationHandle::new(unsafe {
            SetSessionData(name.as_ptr(), data.as_ptr(), to_int(data.len()))
        })
    }

    fn set_player_name(&self, name: &str, changed: &mut bool) -> CorrelationHandle {
        let name = wide(name);
        let mut native_changed: NativeBool = 0;
        let handle = unsafe { SetPlayerName(name.as_ptr(), &mut native_changed) };
        *changed = native_changed != 0;
        CorrelationHandle::new(handle)
    }

    fn set_player_dominant_hand(&self, hand: i32, changed: &mut bool) -> CorrelationHandle {
        let mut native_changed: NativeBool = 0;
        let handle = unsafe { SetPlayerDominantHand(hand, &mut native_changed) };
        *changed = native_changed != 0;
        CorrelationHandle::new(handle)
    }

    fn try_get_session_data(&self, name: &str, buffer: &mut [u8], size: &mut usize) -> bool {
        let name = wide(name);
        with_size(buffer, size, |data, native_size| unsafe {
            TryGetSessionData(name.as_ptr(), data, native_size)
        })
    }

    fn try_get_ui_settings_data(
        &self,
        name: &str,
        buffer: &mut [u16],
        size: &mut usize,
    ) -> bool {
        let name = wide(name);
        with_size(buffer, size, |data, native_size| unsafe {
            TryGetUISettingsData(name.as_ptr(), data, native_size)
        })
    }

    fn try_get_server_ip(&self, buffer: &mut [u16], size: &mut usize) -> bool {
        with_size(buffer, size, |data, native_size| unsafe { TryGetServerIP(data, native_size) })
    }

    fn try_get_session_language(&self, buffer: &mut [u16], size: &mut usize) -> bool {
        with_size(buffer, size, |data, native_size| unsafe {
            TryGetSessionLanguage(data, native_size)
        })
    }

    fn try_get_session_id(&self, buffer: &mut [u16], size: &mut usize) -> bool {
        with_size(buffer, size, |data, native_size| unsafe { TryGetSessionID(data, native_size) })
    }

    fn try_get_player_id(&self, buffer: &mut [u16], size: &mut usize) -> bool {
        with_size(buffer, size, |data, native_size| unsafe { TryGetPlayerID(data, native_size) })
    }

    fn try_get_player_name(&self, buffer: &mut [u16], size: &mut usize) -> bool {
        with_size(buffer, size, |data, native_size| unsafe {
            TryGetPlayerName(data, native_size)
        })
    }

    fn try_get_players_count(&self, players_count: &mut i32) -> bool {
        unsafe { TryGetPlayersCount(players_count) != 0 }
    }

    fn try_get_session_time(&self, session_time: &mut i32) -> bool {
        unsafe { TryGetSessionTime(session_time) != 0 }
    }

    fn try_get_player_dominant_hand(&self, hand: &mut i32) -> bool {
        unsafe { TryGetPlayerDominantHand(hand) != 0 }
    }

    fn try_get_play_area_checking_mode(&self, mode: &mut i32) -> bool {
        unsafe { TryGetPlayAreaCheckingMode(mode) != 0 }
    }

    fn try_get_play_area_out_of_bounds_mode(&self, mode: &mut i32) -> bool {
        unsafe { TryGetPlayAreaOutOfBoundsMode(mode) != 0 }
    }

    fn get_is_application_in_trial_mode(&self) -> bool {
        unsafe { GetIsApplicationInTrialMode() != 0 }
    }

    fn get_should_application_track_cord_twisting(&self) -> bool {
        unsafe { GetShouldApplicationTrackCordTwisting() != 0 }
    }

    fn messages_get(&self, buffer: &mut [MessageHandle], count: &mut usize) -> bool {
        let len = buffer.len();
        drain(
            len,
            count,
            |objects, native_count| unsafe { Messages_Get(objects, native_count) },
            |index, raw| buffer[index] = MessageHandle::from_raw(raw),
        )
    }

    fn message_is_internal(&self, message: MessageHandle) -> bool {
        unsafe { Message_GetIsInternalMessage(object(message.as_raw())) != 0 }
    }

    fn message_handle_internal(
        &self,
        message: MessageHandle,
        events: &mut EventListHandle,
    ) -> bool {
        let mut list: Object = ptr::null_mut();
        let ok = unsafe { Message_HandleInternalMessage(object(message.as_raw()), &mut list) != 0 };
        *events = EventListHandle::from_raw(list as usize as u64);
        ok
    }

    fn event_list_count(&self, events: EventListHandle) -> usize {
        from_int(unsafe { EventList_GetCount(object(events.as_raw())) })
    }

    fn event_list_get(&self, events: EventListHandle, index: usize) -> EventHandle {
        let event = unsafe { EventList_GetEvent(object(events.as_raw()), to_int(index)) };
        EventHandle::from_raw(event as usize as u64)
    }

    fn event_list_free(&self, events: EventListHandle) {
        unsafe { EventList_Free(object(events.as_raw())) }
    }

    fn event_get_type(&self, event: EventHandle) -> i32 {
        unsafe { Event_GetType(object(event.as_raw())) }
    }

    fn message_method(&self, message: MessageHandle) -> String {
        unsafe { read_wide(Message_GetMethod(object(message.as_raw()))) }
    }

    fn message_name(&self, message: MessageHandle) -> String {
        unsafe { read_wide(Message_GetName(object(message.as_raw()))) }
    }

    fn message_params_count(&self, message: MessageHandle) -> usize {
        from_int(unsafe { Message_GetParamsCount(object(message.as_raw())) })
    }

    fn message_param_name(&self, message: MessageHandle, index: usize) -> String {
        unsafe { read_wide(Message_GetParamName(object(message.as_raw()), to_int(index))) }
    }

    fn message_param_value(&self, message: MessageHandle, index: usize) -> String {
        unsafe { read_wide(Message_GetParamValue(object(message.as_raw()), to_int(index))) }
    }

    fn message_data_size(&self, message: MessageHandle) -> usize {
        from_int(unsafe { Message_GetDataSize(object(message.as_raw())) })
    }

    fn message_data(&self, message: MessageHandle, buffer: &mut [u8], size: &mut usize) -> bool {
        with_size(buffer, size, |data, native_size| unsafe {
            Message_GetData(object(message.as_raw()), data, native_size)
        })
    }

    fn message_set_response(
        &self,
        message: MessageHandle,
        content_type: &str,
        status_code: i32,
        status_text: &str,
        data: &[u8],
    ) -> bool {
        let content_type = wide(content_type);
        let status_text = wide(status_text);
        unsafe {
            Message_SetResponse(
                object(message.as_raw()),
                content_type.as_ptr(),
                status_code,
                status_text.as_ptr(),
                data.as_ptr(),
                to_int(data.len()),
            ) != 0
        }
    }

    fn message_free(&self, message: MessageHandle) {
        unsafe { Message_Free(object(message.as_raw())) }
    }

    fn responses_get(&self, buffer: &mut [ResponseHandle], count: &mut usize) -> bool {
        let len = buffer.len();
        drain(
            len,
            count,
            |objects, native_count| unsafe { Responses_Get(objects, native_count) },
            |index, raw| buffer[index] = ResponseHandle::from_raw(raw),
        )
    }

    fn response_type(&self, response: ResponseHandle) -> i32 {
        unsafe { Response_GetType(object(response.as_raw())) }
    }

    fn response_request_id(&self, response: ResponseHandle) -> CorrelationHandle {
        CorrelationHandle::new(unsafe { Response_GetRequestID(object(response.as_raw())) })
    }

    fn response_error_code(&self, response: ResponseHandle) -> i32 {
        unsafe { Response_GetErrorCode(object(response.as_raw())) }
    }

    fn response_error_message(&self, response: ResponseHandle) -> String {
        unsafe { read_wide(Response_GetErrorMessage(object(response.as_raw()))) }
    }

    fn response_data_size(&self, response: ResponseHandle) -> usize {
        from_int(unsafe { Response_GetDataSize(object(response.as_raw())) })
    }

    fn response_data(&self, response: ResponseHandle, buffer: &mut [u8], size: &mut usize) -> bool {
        with_size(buffer, size, |data, native_size| unsafe {
            Response_GetData(object(response.as_raw()), data, native_size)
        })
    }

    fn response_free(&self, response: ResponseHandle) {
        unsafe { Response_Free(object(response.as_raw())) }
    }
}
