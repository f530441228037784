//! Inbound message dispatch loop
//!
//! Each tick drains a bounded batch of native messages, classifies each one as
//! internal (events) or application (a [`PlatformMessage`]), hands it to an
//! [`InboundHandler`] and releases the native message afterwards.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::boundary::PlatformBoundary;
use crate::event::read_internal_events;
use crate::handlers::InboundHandler;
use crate::message::NativeMessage;
use crate::types::MessageHandle;

/// Counters kept by the message dispatch loop
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDispatchStats {
    pub ticks: u64,
    pub drained: u64,
    pub events: u64,
    pub messages: u64,
    /// Application messages released without a response
    pub unanswered: u64,
}

/// Drains inbound messages and events once per tick
#[derive(Debug)]
pub struct MessageDispatcher {
    buffer: Vec<MessageHandle>,
    stats: MessageDispatchStats,
}

impl MessageDispatcher {
    /// Create a dispatcher draining at most `buffer_size` messages per tick
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer: vec![MessageHandle::NULL; buffer_size.max(1)],
            stats: MessageDispatchStats::default(),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> &MessageDispatchStats {
        &self.stats
    }

    /// Run one drain pass; returns the number of native messages drained
    pub fn dispatch(
        &mut self,
        boundary: &dyn PlatformBoundary,
        handler: &mut dyn InboundHandler,
    ) -> usize {
        self.stats.ticks += 1;

        let mut count = self.buffer.len();
        if !boundary.messages_get(&mut self.buffer, &mut count) || count == 0 {
            return 0;
        }
        let count = count.min(self.buffer.len());
        self.stats.drained += count as u64;
        debug!("Drained {} platform messages", count);

        for index in 0..count {
            let native = NativeMessage::new(boundary, self.buffer[index]);
            self.buffer[index] = MessageHandle::NULL;

            if native.is_internal() {
                for event in read_internal_events(boundary, native.handle()) {
                    trace!("Platform event {:?}", event.event_type());
                    self.stats.events += 1;
                    handler.handle_event(boundary, event);
                }
            } else {
                let mut message = native.read();
                trace!("Platform message {} {}", message.method(), message.name());
                self.stats.messages += 1;
                handler.handle_message(&mut message);
                if !message.has_response() {
                    debug!("Message {} released unanswered", message.name());
                    self.stats.unanswered += 1;
                }
            }
        }

        count
    }
}

impl Default for MessageDispatcher {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_BUFFER_SIZE)
    }
}
