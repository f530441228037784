//! Scripted platform traffic
//!
//! Values tests enqueue on the mock platform: completed responses, inbound
//! application messages and internal event batches.

use arvi_core::{CorrelationHandle, ErrorCode, PlatformEventType, ResponseType};

// ----------------------------------------------------------------------------
// Scripted Response
// ----------------------------------------------------------------------------

/// A completed response the mock platform will hand out on the next drain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedResponse {
    pub request_id: CorrelationHandle,
    /// Raw response type as the plugin reports it
    pub response_type: i32,
    pub error_code: i32,
    pub error_message: String,
    pub data: Vec<u8>,
    /// Make the second data call fail
    pub fail_data_fetch: bool,
}

impl ScriptedResponse {
    pub fn success(request_id: CorrelationHandle) -> Self {
        Self {
            request_id,
            response_type: 1,
            error_code: 0,
            error_message: String::new(),
            data: Vec::new(),
            fail_data_fetch: false,
        }
    }

    pub fn with_data(request_id: CorrelationHandle, data: Vec<u8>) -> Self {
        Self {
            response_type: 2,
            data,
            ..Self::success(request_id)
        }
    }

    pub fn failure(request_id: CorrelationHandle, code: ErrorCode, message: &str) -> Self {
        Self {
            error_code: code.as_raw(),
            error_message: message.to_string(),
            ..Self::success(request_id)
        }
    }

    pub fn with_failing_data_fetch(mut self) -> Self {
        self.fail_data_fetch = true;
        self
    }

    pub fn response_type(&self) -> ResponseType {
        ResponseType::from(self.response_type)
    }
}

// ----------------------------------------------------------------------------
// Scripted Message
// ----------------------------------------------------------------------------

/// An application message the platform sends to the game
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedMessage {
    pub method: String,
    pub name: String,
    pub params: Vec<(String, String)>,
    pub data: Vec<u8>,
}

impl ScriptedMessage {
    pub fn new(method: &str, name: &str) -> Self {
        Self {
            method: method.to_string(),
            name: name.to_string(),
            params: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn get(name: &str) -> Self {
        Self::new("GET", name)
    }

    pub fn post(name: &str) -> Self {
        Self::new("POST", name)
    }

    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }
}

// ----------------------------------------------------------------------------
// Inbound Item
// ----------------------------------------------------------------------------

/// One entry of the platform's inbound queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Message(ScriptedMessage),
    /// Internal message decoding to these raw event types
    Events(Vec<i32>),
    /// Internal message the plugin fails to decode
    UndecodableInternal,
}

impl Inbound {
    pub fn events(types: &[PlatformEventType]) -> Self {
        Inbound::Events(
            types
                .iter()
                .map(|event_type| match event_type {
                    PlatformEventType::Unknown => 0,
                    PlatformEventType::PlayerNameChanged => 1,
                    PlatformEventType::PlayerDominantHandChanged => 2,
                })
                .collect(),
        )
    }

    pub fn is_internal(&self) -> bool {
        !matches!(self, Inbound::Message(_))
    }
}
