//! Request registry
//!
//! An asynchronous operation produces a [`Request`]. Attaching a completion
//! callback either resolves it on the spot (the operation never reached the
//! platform) or parks it in the [`RequestRegistry`] until the response dispatch
//! loop pops it by correlation handle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hashbrown::HashMap;
use tracing::{debug, warn};

use crate::errors::{ErrorCode, IntegrationError};
use crate::response::Response;
use crate::types::CorrelationHandle;

/// Completion callback attached to a request
pub type Callback = Box<dyn FnOnce(Response) + Send + 'static>;

// ----------------------------------------------------------------------------
// Pending Request
// ----------------------------------------------------------------------------

/// A registered request awaiting its response
pub struct PendingRequest {
    handle: CorrelationHandle,
    callback: Callback,
}

impl PendingRequest {
    pub fn new(handle: CorrelationHandle, callback: Callback) -> Self {
        Self { handle, callback }
    }

    pub fn handle(&self) -> CorrelationHandle {
        self.handle
    }

    /// Invoke the callback; consuming `self` guarantees it runs at most once
    pub fn complete(self, response: Response) {
        (self.callback)(response)
    }
}

impl core::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Request Registry
// ----------------------------------------------------------------------------

/// Correlation table from handle to pending request
///
/// Insertions come from the code issuing operations, removals from the
/// response dispatch loop, possibly on different threads. Callbacks are never
/// invoked while the lock is held.
#[derive(Debug, Default)]
pub struct RequestRegistry {
    requests: Mutex<HashMap<CorrelationHandle, PendingRequest>>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CorrelationHandle, PendingRequest>> {
        // A panic elsewhere cannot leave the map half-updated
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a request, replacing any request already holding its handle
    pub fn add(&self, request: PendingRequest) {
        let handle = request.handle();
        if !handle.is_valid() {
            warn!("Refusing to register request with invalid handle");
            return;
        }
        if self.lock().insert(handle, request).is_some() {
            warn!("Request {} registered twice; previous callback dropped", handle);
        }
    }

    /// Pop the request matching `handle`, if any
    pub fn resolve(&self, handle: CorrelationHandle) -> Option<PendingRequest> {
        self.lock().remove(&handle)
    }

    /// Drop every pending request without invoking callbacks
    ///
    /// Returns the number of abandoned requests.
    pub fn clear(&self) -> usize {
        let mut requests = self.lock();
        let abandoned = requests.len();
        requests.clear();
        if abandoned > 0 {
            debug!("Abandoned {} pending requests", abandoned);
        }
        abandoned
    }

    pub fn contains(&self, handle: CorrelationHandle) -> bool {
        self.lock().contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

// ----------------------------------------------------------------------------
// Request
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum RequestState {
    /// Enqueued by the platform; resolves through the registry
    Enqueued,
    /// Never reached the platform; resolves synchronously with this message
    Invalid(String),
}

/// Handle to an issued asynchronous operation
///
/// Nothing is registered until [`Request::on_complete`] is called, so a
/// dropped request simply ignores its response.
#[must_use = "attach a callback with `on_complete` or call `detach`"]
#[derive(Debug)]
pub struct Request {
    handle: CorrelationHandle,
    state: RequestState,
    registry: Arc<RequestRegistry>,
}

impl Request {
    /// Wrap a handle returned by the platform; zero means enqueue failure
    pub(crate) fn issued(handle: CorrelationHandle, registry: Arc<RequestRegistry>) -> Self {
        let state = if handle.is_valid() {
            RequestState::Enqueued
        } else {
            RequestState::Invalid(IntegrationError::EnqueueFailed.to_string())
        };
        Self {
            handle,
            state,
            registry,
        }
    }

    /// A request rejected before reaching the platform
    pub(crate) fn invalid(message: impl Into<String>, registry: Arc<RequestRegistry>) -> Self {
        Self {
            handle: CorrelationHandle::INVALID,
            state: RequestState::Invalid(message.into()),
            registry,
        }
    }

    pub fn handle(&self) -> CorrelationHandle {
        self.handle
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.state, RequestState::Enqueued)
    }

    /// Rejection message of an invalid request
    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            RequestState::Enqueued => None,
            RequestState::Invalid(message) => Some(message),
        }
    }

    /// Attach the completion callback
    ///
    /// A valid request is registered and the callback fires once its response
    /// is dispatched. An invalid request invokes the callback immediately with
    /// a failed [`Response`].
    pub fn on_complete<F>(self, callback: F) -> CorrelationHandle
    where
        F: FnOnce(Response) + Send + 'static,
    {
        match self.state {
            RequestState::Enqueued => {
                self.registry
                    .add(PendingRequest::new(self.handle, Box::new(callback)));
            }
            RequestState::Invalid(message) => {
                callback(Response::failure(self.handle, ErrorCode::Unknown, message));
            }
        }
        self.handle
    }

    /// Give up on the outcome; any response is dropped as unmatched
    pub fn detach(self) -> CorrelationHandle {
        self.handle
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_callback(counter: &Arc<AtomicUsize>) -> Callback {
        let counter = Arc::clone(counter);
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_resolve_pops_exactly_once() {
        let registry = RequestRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = CorrelationHandle::new(5);

        registry.add(PendingRequest::new(handle, counting_callback(&counter)));
        assert!(registry.contains(handle));

        let pending = registry.resolve(handle).unwrap();
        pending.complete(Response::success(handle));
        assert!(registry.resolve(handle).is_none());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_handle_is_never_registered() {
        let registry = RequestRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        registry.add(PendingRequest::new(
            CorrelationHandle::INVALID,
            counting_callback(&counter),
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clear_abandons_without_callbacks() {
        let registry = RequestRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        for raw in 1..=3 {
            registry.add(PendingRequest::new(
                CorrelationHandle::new(raw),
                counting_callback(&counter),
            ));
        }
        assert_eq!(registry.clear(), 3);
        assert!(registry.is_empty());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_concurrent_add_and_resolve_fire_each_callback_once() {
        const THREADS: u64 = 4;
        const PER_THREAD: u64 = 500;

        let registry = Arc::new(RequestRegistry::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let adders: Vec<_> = (0..THREADS)
            .map(|thread| {
                let registry = Arc::clone(&registry);
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        let handle = CorrelationHandle::new(thread * PER_THREAD + i + 1);
                        registry.add(PendingRequest::new(handle, counting_callback(&counter)));
                    }
                })
            })
            .collect();
        for adder in adders {
            adder.join().unwrap();
        }
        assert_eq!(registry.len(), (THREADS * PER_THREAD) as usize);

        // Every resolver walks the full handle range, so each handle is contended
        let resolvers: Vec<_> = (0..THREADS)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for raw in 1..=THREADS * PER_THREAD {
                        let handle = CorrelationHandle::new(raw);
                        if let Some(pending) = registry.resolve(handle) {
                            pending.complete(Response::success(handle));
                        }
                    }
                })
            })
            .collect();
        for resolver in resolvers {
            resolver.join().unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), (THREADS * PER_THREAD) as usize);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_zero_handle_request_resolves_synchronously() {
        let registry = Arc::new(RequestRegistry::new());
        let received = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&received);

        let request = Request::issued(CorrelationHandle::INVALID, Arc::clone(&registry));
        assert!(!request.is_valid());
        request.on_complete(move |response| {
            *sink.lock().unwrap() = Some(response);
        });

        let response = received.lock().unwrap().take().unwrap();
        assert!(!response.is_success());
        assert_eq!(response.error().unwrap().code, ErrorCode::Unknown);
        assert!(registry.is_empty());
    }
}
