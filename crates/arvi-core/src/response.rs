//! Responses and the response dispatch loop
//!
//! Completed operations come back from the platform as native response objects.
//! Each tick the [`ResponseDispatcher`] drains a bounded batch of them, decodes
//! every object into an owned [`Response`], releases the native object, and
//! resolves the matching pending request from the registry.

use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::boundary::{fetch_sized, PlatformBoundary};
use crate::errors::{CodecError, ErrorCode, IntegrationError};
use crate::request::RequestRegistry;
use crate::session::SessionValue;
use crate::types::{CorrelationHandle, ResponseHandle, ResponseType};

// ----------------------------------------------------------------------------
// Response
// ----------------------------------------------------------------------------

/// Failure details of a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: ErrorCode,
    pub message: String,
}

/// Outcome of one asynchronous operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    request_id: CorrelationHandle,
    response_type: ResponseType,
    error: Option<ResponseError>,
    data: Vec<u8>,
}

impl Response {
    /// Successful response without payload
    pub fn success(request_id: CorrelationHandle) -> Self {
        Self {
            request_id,
            response_type: ResponseType::Default,
            error: None,
            data: Vec::new(),
        }
    }

    /// Successful response carrying a payload
    pub fn with_data(request_id: CorrelationHandle, data: Vec<u8>) -> Self {
        Self {
            request_id,
            response_type: ResponseType::Data,
            error: None,
            data,
        }
    }

    /// Failed response
    pub fn failure(
        request_id: CorrelationHandle,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            response_type: ResponseType::Default,
            error: Some(ResponseError {
                code,
                message: message.into(),
            }),
            data: Vec::new(),
        }
    }

    /// Failed response synthesized in-process from an integration error
    pub fn from_error(request_id: CorrelationHandle, err: &IntegrationError) -> Self {
        Self::failure(request_id, ErrorCode::Unknown, err.to_string())
    }

    pub fn request_id(&self) -> CorrelationHandle {
        self.request_id
    }

    pub fn response_type(&self) -> ResponseType {
        self.response_type
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn error(&self) -> Option<&ResponseError> {
        self.error.as_ref()
    }

    /// Payload bytes; empty for responses without data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Decode the payload with the session-variable codec
    pub fn data_as<T: SessionValue>(&self) -> Result<T, CodecError> {
        T::decode(&self.data)
    }

    /// Payload as UTF-8 text, replacing invalid sequences
    pub fn data_as_string(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

// ----------------------------------------------------------------------------
// Native Response
// ----------------------------------------------------------------------------

/// Borrowed native response object, released exactly once on drop
pub(crate) struct NativeResponse<'a> {
    boundary: &'a dyn PlatformBoundary,
    handle: ResponseHandle,
}

impl<'a> NativeResponse<'a> {
    pub(crate) fn new(boundary: &'a dyn PlatformBoundary, handle: ResponseHandle) -> Self {
        Self { boundary, handle }
    }

    /// Extract every field into an owned response
    pub(crate) fn decode(&self) -> Response {
        let boundary = self.boundary;
        let handle = self.handle;

        let response_type = ResponseType::from(boundary.response_type(handle));
        let request_id = boundary.response_request_id(handle);
        let code = boundary.response_error_code(handle);
        let error = (code != 0).then(|| ResponseError {
            code: ErrorCode::from(code),
            message: boundary.response_error_message(handle),
        });
        let data = match response_type {
            ResponseType::Data => fetch_sized(boundary.response_data_size(handle), |buf, size| {
                boundary.response_data(handle, buf, size)
            }),
            _ => Vec::new(),
        };

        Response {
            request_id,
            response_type,
            error,
            data,
        }
    }
}

impl Drop for NativeResponse<'_> {
    fn drop(&mut self) {
        self.boundary.response_free(self.handle);
    }
}

// ----------------------------------------------------------------------------
// Response Dispatcher
// ----------------------------------------------------------------------------

/// Counters kept by the response dispatch loop
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseDispatchStats {
    pub ticks: u64,
    pub drained: u64,
    pub resolved: u64,
    pub unmatched: u64,
    pub callback_panics: u64,
}

/// Drains completed responses and resolves pending requests
#[derive(Debug)]
pub struct ResponseDispatcher {
    buffer: Vec<ResponseHandle>,
    stats: ResponseDispatchStats,
}

impl ResponseDispatcher {
    /// Create a dispatcher draining at most `buffer_size` responses per tick
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer: vec![ResponseHandle::NULL; buffer_size.max(1)],
            stats: ResponseDispatchStats::default(),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> &ResponseDispatchStats {
        &self.stats
    }

    /// Run one drain pass; returns the number of responses drained
    ///
    /// All native objects are decoded and released before any callback runs,
    /// so a callback issuing new operations never observes a half-drained batch.
    pub fn dispatch(
        &mut self,
        boundary: &dyn PlatformBoundary,
        registry: &RequestRegistry,
    ) -> usize {
        self.stats.ticks += 1;

        let mut count = self.buffer.len();
        if !boundary.responses_get(&mut self.buffer, &mut count) || count == 0 {
            return 0;
        }
        let count = count.min(self.buffer.len());

        let responses: Vec<Response> = self.buffer[..count]
            .iter()
            .map(|&handle| NativeResponse::new(boundary, handle).decode())
            .collect();
        self.buffer[..count].fill(ResponseHandle::NULL);
        self.stats.drained += count as u64;
        debug!("Drained {} responses", count);

        for response in responses {
            let Some(pending) = registry.resolve(response.request_id()) else {
                debug!("No pending request for response {}", response.request_id());
                self.stats.unmatched += 1;
                continue;
            };

            let handle = pending.handle();
            self.stats.resolved += 1;
            if panic::catch_unwind(AssertUnwindSafe(|| pending.complete(response))).is_err() {
                error!("Completion callback for request {} panicked", handle);
                self.stats.callback_panics += 1;
            }
        }

        count
    }
}

impl Default for ResponseDispatcher {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_BUFFER_SIZE)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_response_carries_code_and_message() {
        let response = Response::failure(CorrelationHandle::new(3), ErrorCode::ApiKeyError, "bad key");
        assert!(!response.is_success());
        let error = response.error().unwrap();
        assert_eq!(error.code, ErrorCode::ApiKeyError);
        assert_eq!(error.message, "bad key");
        assert!(response.data().is_empty());
    }

    #[test]
    fn test_synthetic_failure_uses_unknown_code() {
        let response = Response::from_error(CorrelationHandle::INVALID, &IntegrationError::NotInitialized);
        assert_eq!(response.error().unwrap().code, ErrorCode::Unknown);
        assert!(response.error().unwrap().message.contains("not initialized"));
    }

    #[test]
    fn test_typed_payload_access() {
        let response = Response::with_data(CorrelationHandle::new(9), 42i32.encode().unwrap());
        assert_eq!(response.response_type(), ResponseType::Data);
        assert_eq!(response.data_as::<i32>(), Ok(42));
        assert!(response.data_as::<i64>().is_err());
    }

    #[test]
    fn test_dispatcher_buffer_never_empty() {
        assert_eq!(ResponseDispatcher::new(0).buffer_size(), 1);
        assert_eq!(ResponseDispatcher::default().buffer_size(), 1024);
    }
}
