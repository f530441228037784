#![doc = "ARVI Harness\n\nIn-memory platform plugin and deterministic clock for exercising the\nintegration core without the native library."]

pub mod mock_platform;
pub mod script;
pub mod time;

pub use mock_platform::{
    BoundaryCall, LifecycleCall, MockPlatform, WrittenResponse, DEFAULT_SDK_VERSION,
};
pub use script::{Inbound, ScriptedMessage, ScriptedResponse};
pub use time::MockTimeSource;
