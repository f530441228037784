//! Core types for the ARVI integration
//!
//! This module defines the identifiers, handles and small value types used
//! throughout the integration, using newtype patterns so that a correlation
//! handle can never be confused with a native resource handle.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::IntegrationError;

// ----------------------------------------------------------------------------
// Correlation Handle
// ----------------------------------------------------------------------------

/// Identifier assigned by the platform to an asynchronous operation
///
/// The value zero means the operation could not be enqueued and is never
/// registered for correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CorrelationHandle(u64);

impl CorrelationHandle {
    /// Handle returned by the platform when enqueueing failed
    pub const INVALID: Self = Self(0);

    /// Create a handle from its raw value
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Whether this handle refers to an enqueued operation
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for CorrelationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Native Resource Handles
// ----------------------------------------------------------------------------

macro_rules! native_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(u64);

        impl $name {
            /// Null handle, used to pre-fill drain buffers
            pub const NULL: Self = Self(0);

            /// Wrap a raw native value (usually a pointer address)
            pub fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// Get the raw native value
            pub fn as_raw(&self) -> u64 {
                self.0
            }

            /// Whether the handle is null
            pub fn is_null(&self) -> bool {
                self.0 == 0
            }
        }
    };
}

native_handle!(
    /// Native completed-response object, owned by the platform plugin until freed
    ResponseHandle
);
native_handle!(
    /// Native inbound message object, owned by the platform plugin until freed
    MessageHandle
);
native_handle!(
    /// Native list of events decoded from an internal message
    EventListHandle
);
native_handle!(
    /// Native event inside an event list; freed together with its list
    EventHandle
);

// ----------------------------------------------------------------------------
// Response Type
// ----------------------------------------------------------------------------

/// Shape of a completed platform response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseType {
    Unknown,
    /// Success or error only
    Default,
    /// Carries a payload next to the success or error outcome
    Data,
}

impl From<i32> for ResponseType {
    fn from(raw: i32) -> Self {
        match raw {
            1 => ResponseType::Default,
            2 => ResponseType::Data,
            _ => ResponseType::Unknown,
        }
    }
}

// ----------------------------------------------------------------------------
// Platform Event Type
// ----------------------------------------------------------------------------

/// Tag of an internal platform event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlatformEventType {
    Unknown,
    PlayerNameChanged,
    PlayerDominantHandChanged,
}

impl From<i32> for PlatformEventType {
    fn from(raw: i32) -> Self {
        match raw {
            1 => PlatformEventType::PlayerNameChanged,
            2 => PlatformEventType::PlayerDominantHandChanged,
            _ => PlatformEventType::Unknown,
        }
    }
}

// ----------------------------------------------------------------------------
// Message Method
// ----------------------------------------------------------------------------

/// HTTP-like method of an inbound platform message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageMethod {
    Unknown,
    Get,
    Post,
}

impl MessageMethod {
    /// Parse a method name, ignoring case
    pub fn parse(method: &str) -> Self {
        if method.eq_ignore_ascii_case("GET") {
            MessageMethod::Get
        } else if method.eq_ignore_ascii_case("POST") {
            MessageMethod::Post
        } else {
            MessageMethod::Unknown
        }
    }
}

impl fmt::Display for MessageMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageMethod::Unknown => write!(f, "Unknown"),
            MessageMethod::Get => write!(f, "GET"),
            MessageMethod::Post => write!(f, "POST"),
        }
    }
}

// ----------------------------------------------------------------------------
// Audio Chat Channel
// ----------------------------------------------------------------------------

/// Voice chat channel a player can join; `Public` is the default channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioChatChannel {
    Public,
    Channel1,
    Channel2,
    Channel3,
    Channel4,
    Channel5,
    Channel6,
    Channel7,
    Channel8,
    Channel9,
    Channel10,
}

impl AudioChatChannel {
    /// Get the channel number (0..=10)
    pub fn number(&self) -> i32 {
        *self as i32
    }
}

impl TryFrom<i32> for AudioChatChannel {
    type Error = IntegrationError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        use AudioChatChannel::*;
        const CHANNELS: [AudioChatChannel; 11] = [
            Public, Channel1, Channel2, Channel3, Channel4, Channel5, Channel6, Channel7,
            Channel8, Channel9, Channel10,
        ];
        usize::try_from(value)
            .ok()
            .and_then(|index| CHANNELS.get(index).copied())
            .ok_or_else(|| {
                IntegrationError::invalid_argument(format!(
                    "audio chat channel must be within 0..=10, got {}",
                    value
                ))
            })
    }
}

// ----------------------------------------------------------------------------
// Dominant Hand
// ----------------------------------------------------------------------------

/// Player's dominant hand as known by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DominantHand {
    #[default]
    Unknown,
    Left,
    Right,
}

impl DominantHand {
    /// Get the raw value used across the boundary
    pub fn as_raw(&self) -> i32 {
        match self {
            DominantHand::Unknown => 0,
            DominantHand::Left => 1,
            DominantHand::Right => 2,
        }
    }
}

impl From<i32> for DominantHand {
    fn from(raw: i32) -> Self {
        match raw {
            1 => DominantHand::Left,
            2 => DominantHand::Right,
            _ => DominantHand::Unknown,
        }
    }
}

impl fmt::Display for DominantHand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ----------------------------------------------------------------------------
// Spatial Types
// ----------------------------------------------------------------------------

/// Simple 3D vector in game-world units
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    /// Construct a vector from components
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const UP: Self = Self::new(0.0, 1.0, 0.0);
    pub const FORWARD: Self = Self::new(0.0, 0.0, 1.0);
}

/// Player position and orientation, as reported to the platform
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerPose {
    pub position: Vector3,
    pub forward: Vector3,
    pub up: Vector3,
}

impl PlayerPose {
    pub fn new(position: Vector3, forward: Vector3, up: Vector3) -> Self {
        Self {
            position,
            forward,
            up,
        }
    }
}

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Millisecond timestamp since Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a new timestamp
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Get current wall-clock timestamp
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as u64)
    }

    /// Get the raw milliseconds
    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

// ----------------------------------------------------------------------------
// Time Source Trait
// ----------------------------------------------------------------------------

/// Source of timestamps, injectable so rate windows can be tested deterministically
pub trait TimeSource {
    /// Get the current timestamp
    fn now(&self) -> Timestamp;
}

/// Standard library implementation of TimeSource
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for Box<T> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_handle_is_invalid() {
        assert!(!CorrelationHandle::INVALID.is_valid());
        assert!(CorrelationHandle::new(7).is_valid());
        assert_eq!(CorrelationHandle::new(7).to_string(), "#7");
    }

    #[test]
    fn test_message_method_parsing_ignores_case() {
        assert_eq!(MessageMethod::parse("get"), MessageMethod::Get);
        assert_eq!(MessageMethod::parse("Post"), MessageMethod::Post);
        assert_eq!(MessageMethod::parse("DELETE"), MessageMethod::Unknown);
        assert_eq!(MessageMethod::parse(""), MessageMethod::Unknown);
    }

    #[test]
    fn test_audio_channel_bounds() {
        assert_eq!(AudioChatChannel::try_from(0).unwrap(), AudioChatChannel::Public);
        assert_eq!(AudioChatChannel::try_from(10).unwrap(), AudioChatChannel::Channel10);
        assert_eq!(AudioChatChannel::Channel7.number(), 7);
        assert!(AudioChatChannel::try_from(11).is_err());
        assert!(AudioChatChannel::try_from(-1).is_err());
    }

    #[test]
    fn test_unknown_raw_values_fall_back() {
        assert_eq!(DominantHand::from(9), DominantHand::Unknown);
        assert_eq!(PlatformEventType::from(3), PlatformEventType::Unknown);
        assert_eq!(ResponseType::from(-5), ResponseType::Unknown);
        assert_eq!(DominantHand::Right.as_raw(), 2);
    }
}
