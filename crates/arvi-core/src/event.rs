//! Internal platform events
//!
//! Internal messages fan out into a native event list. Events carry only a
//! type tag; handlers re-query the boundary for the current state.

use tracing::trace;

use crate::boundary::PlatformBoundary;
use crate::types::{EventListHandle, MessageHandle, PlatformEventType};

/// Internal state-change notification from the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformEvent {
    event_type: PlatformEventType,
}

impl PlatformEvent {
    pub fn new(event_type: PlatformEventType) -> Self {
        Self { event_type }
    }

    pub fn event_type(&self) -> PlatformEventType {
        self.event_type
    }
}

/// Native event list, released exactly once on drop
struct NativeEventList<'a> {
    boundary: &'a dyn PlatformBoundary,
    handle: EventListHandle,
}

impl Drop for NativeEventList<'_> {
    fn drop(&mut self) {
        self.boundary.event_list_free(self.handle);
    }
}

/// Decode an internal message into its events
///
/// The native list is released before returning. A message the platform
/// cannot decode yields no events.
pub(crate) fn read_internal_events(
    boundary: &dyn PlatformBoundary,
    message: MessageHandle,
) -> Vec<PlatformEvent> {
    let mut handle = EventListHandle::NULL;
    if !boundary.message_handle_internal(message, &mut handle) {
        trace!("Internal message produced no event list");
        return Vec::new();
    }

    let _list = NativeEventList { boundary, handle };
    (0..boundary.event_list_count(handle))
        .map(|index| boundary.event_list_get(handle, index))
        .map(|event| PlatformEvent::new(PlatformEventType::from(boundary.event_get_type(event))))
        .collect()
}
