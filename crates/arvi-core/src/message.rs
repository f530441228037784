//! Inbound platform messages
//!
//! A [`PlatformMessage`] is an HTTP-like request sent by the platform to the
//! application: a method, a name, ordered parameters and an optional payload.
//! At most one response may be written back before the dispatch loop releases
//! the native message at the end of the tick.

use smallvec::SmallVec;
use tracing::warn;

use crate::boundary::{fetch_sized, PlatformBoundary};
use crate::errors::{IntegrationError, Result};
use crate::types::{MessageHandle, MessageMethod};

pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";
pub const CONTENT_TYPE_JSON: &str = "application/json";

pub const STATUS_CODE_OK: i32 = 200;
pub const STATUS_TEXT_OK: &str = "OK";
pub const STATUS_CODE_ERROR: i32 = 500;
pub const STATUS_TEXT_ERROR: &str = "Internal Server Error";

/// Ordered message parameters; duplicate names are kept
pub type MessageParams = SmallVec<[(String, String); 4]>;

// ----------------------------------------------------------------------------
// Native Message
// ----------------------------------------------------------------------------

/// Native message object, released exactly once on drop
pub(crate) struct NativeMessage<'a> {
    boundary: &'a dyn PlatformBoundary,
    handle: MessageHandle,
}

impl<'a> NativeMessage<'a> {
    pub(crate) fn new(boundary: &'a dyn PlatformBoundary, handle: MessageHandle) -> Self {
        Self { boundary, handle }
    }

    pub(crate) fn handle(&self) -> MessageHandle {
        self.handle
    }

    pub(crate) fn is_internal(&self) -> bool {
        self.boundary.message_is_internal(self.handle)
    }

    /// Extract the application-level view of this message
    pub(crate) fn read(&self) -> PlatformMessage<'a> {
        PlatformMessage::read(self.boundary, self.handle)
    }
}

impl Drop for NativeMessage<'_> {
    fn drop(&mut self) {
        self.boundary.message_free(self.handle);
    }
}

// ----------------------------------------------------------------------------
// Platform Message
// ----------------------------------------------------------------------------

/// Application message received from the platform
///
/// Borrows the boundary for the duration of the tick, so it cannot outlive
/// the native object it answers.
pub struct PlatformMessage<'a> {
    boundary: &'a dyn PlatformBoundary,
    handle: MessageHandle,
    method: MessageMethod,
    name: String,
    params: MessageParams,
    data: Vec<u8>,
    responded: bool,
}

impl<'a> PlatformMessage<'a> {
    fn read(boundary: &'a dyn PlatformBoundary, handle: MessageHandle) -> Self {
        let method = MessageMethod::parse(&boundary.message_method(handle));
        let name = boundary.message_name(handle);
        let params = (0..boundary.message_params_count(handle))
            .map(|index| {
                (
                    boundary.message_param_name(handle, index),
                    boundary.message_param_value(handle, index),
                )
            })
            .collect();
        let data = fetch_sized(boundary.message_data_size(handle), |buf, size| {
            boundary.message_data(handle, buf, size)
        });

        Self {
            boundary,
            handle,
            method,
            name,
            params,
            data,
            responded: false,
        }
    }

    pub fn method(&self) -> MessageMethod {
        self.method
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameters in the order the platform sent them
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// First value of the parameter called `name`
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Every value of the parameter called `name`, in order
    pub fn param_values<'s>(&'s self, name: &'s str) -> impl Iterator<Item = &'s str> + 's {
        self.params
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload as UTF-8 text, replacing invalid sequences
    pub fn data_as_string(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// Whether a response has been written
    pub fn has_response(&self) -> bool {
        self.responded
    }

    /// Respond with binary data (`application/octet-stream`)
    pub fn set_response_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.write(CONTENT_TYPE_OCTET_STREAM, STATUS_CODE_OK, STATUS_TEXT_OK, data)
    }

    /// Respond with text (`text/plain`)
    pub fn set_response_text(&mut self, text: &str) -> Result<()> {
        self.set_response_with_content_type(text, CONTENT_TYPE_TEXT)
    }

    /// Respond with UTF-8 text under an explicit content type
    pub fn set_response_with_content_type(&mut self, text: &str, content_type: &str) -> Result<()> {
        self.write(content_type, STATUS_CODE_OK, STATUS_TEXT_OK, text.as_bytes())
    }

    /// Respond with an error (status 500, `text/plain`)
    pub fn set_error(&mut self, message: &str) -> Result<()> {
        self.write(
            CONTENT_TYPE_TEXT,
            STATUS_CODE_ERROR,
            STATUS_TEXT_ERROR,
            message.as_bytes(),
        )
    }

    fn write(
        &mut self,
        content_type: &str,
        status_code: i32,
        status_text: &str,
        data: &[u8],
    ) -> Result<()> {
        if self.responded {
            warn!("Second response to message {} rejected", self.name);
            return Err(IntegrationError::ResponseAlreadySet);
        }
        if !self
            .boundary
            .message_set_response(self.handle, content_type, status_code, status_text, data)
        {
            return Err(IntegrationError::ResponseWriteRejected {
                name: self.name.clone(),
            });
        }
        self.responded = true;
        Ok(())
    }
}

impl core::fmt::Debug for PlatformMessage<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PlatformMessage")
            .field("method", &self.method)
            .field("name", &self.name)
            .field("params", &self.params)
            .field("data_len", &self.data.len())
            .field("responded", &self.responded)
            .finish()
    }
}
