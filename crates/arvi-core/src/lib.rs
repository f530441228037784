//! ARVI Platform Integration Core
//!
//! This crate connects a game application to the ARVI VR-arcade platform
//! through the platform's plugin. It provides the boundary contract, the
//! correlation of asynchronous requests with their responses, the inbound
//! message and event dispatch loops, and the session-variable codec.
//!
//! ```
//! use arvi_core::{Integration, IntegrationConfig};
//! use arvi_harness::MockPlatform;
//!
//! let config = IntegrationConfig::default().with_app_key("my-key");
//! let mut integration = Integration::new(MockPlatform::new(), config);
//! integration.initialize()?;
//!
//! integration.on_time_left_request(|| Some(600));
//! integration.is_application_entitled().on_complete(|response| {
//!     println!("entitled: {}", response.is_success());
//! });
//!
//! // Once per frame
//! integration.tick();
//! # Ok::<(), arvi_core::IntegrationError>(())
//! ```

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod boundary;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod event;
pub mod handlers;
pub mod integration;
pub mod limits;
pub mod message;
pub mod position;
pub mod request;
pub mod response;
pub mod session;
pub mod types;

cfg_if::cfg_if! {
    if #[cfg(feature = "native")] {
        pub mod native;
        pub use native::NativeBoundary;
    }
}

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use boundary::{encode_utf16, fetch_string, fetch_variable_length, PlatformBoundary};
pub use config::{
    DispatchConfig, IntegrationConfig, LaunchOptions, LimitsConfig, ShutdownConfig,
    DEFAULT_BUFFER_SIZE,
};
pub use dispatch::{MessageDispatchStats, MessageDispatcher};
pub use errors::{CodecError, ErrorCode, IntegrationError, IntegrationResult, Result};
pub use event::PlatformEvent;
pub use handlers::{
    InboundHandler, InboundRouter, ObserverId, PlayerIdentity, POSITION_MESSAGE, TIME_LEFT_MESSAGE,
};
pub use integration::{Integration, IntegrationState, TickSummary, SDK_INTEGRATION_VERSION};
pub use limits::{OperationClass, OperationLimiter, RateWindow};
pub use message::PlatformMessage;
pub use position::position_json;
pub use request::{PendingRequest, Request, RequestRegistry};
pub use response::{Response, ResponseDispatchStats, ResponseDispatcher, ResponseError};
pub use session::{SessionValue, SessionVariable};
pub use types::{
    AudioChatChannel, CorrelationHandle, DominantHand, EventHandle, EventListHandle,
    MessageHandle, MessageMethod, PlatformEventType, PlayerPose, ResponseHandle, ResponseType,
    SystemTimeSource, TimeSource, Timestamp, Vector3,
};
