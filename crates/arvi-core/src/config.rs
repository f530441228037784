//! Integration configuration
//!
//! Settings are plain serde structs with sensible defaults, loadable from a
//! TOML file. Every section may be omitted from the file; missing fields take
//! their default values.
//!
//! ```toml
//! app_key = "my-application-key"
//!
//! [dispatch]
//! response_buffer_size = 1024
//! message_buffer_size = 1024
//!
//! [limits]
//! enforce = true
//!
//! [shutdown]
//! wait_for_pending = false
//!
//! [launch]
//! force_trial_mode = false
//! disable_cord_twist_tracking = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{IntegrationError, Result};

/// Default number of items drained per tick by each dispatch loop
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

// ----------------------------------------------------------------------------
// Dispatch Configuration
// ----------------------------------------------------------------------------

/// Bounded drain sizes for the two dispatch loops
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum completed responses drained per tick
    pub response_buffer_size: usize,
    /// Maximum inbound messages drained per tick
    pub message_buffer_size: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            response_buffer_size: DEFAULT_BUFFER_SIZE,
            message_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl DispatchConfig {
    /// Small buffers, useful to exercise multi-tick draining in tests
    pub fn testing() -> Self {
        Self {
            response_buffer_size: 4,
            message_buffer_size: 4,
        }
    }
}

// ----------------------------------------------------------------------------
// Limits Configuration
// ----------------------------------------------------------------------------

/// Client-side enforcement of the platform's documented limits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Reject over-long arguments and over-rate sends before they reach the platform
    pub enforce: bool,
}

impl LimitsConfig {
    pub fn strict() -> Self {
        Self { enforce: true }
    }
}

// ----------------------------------------------------------------------------
// Shutdown Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Ask the platform to finish in-flight requests when finalizing
    pub wait_for_pending: bool,
}

// ----------------------------------------------------------------------------
// Launch Options
// ----------------------------------------------------------------------------

/// Flags the platform passes on the application command line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchOptions {
    /// `-trial`: run in trial mode regardless of what the platform reports
    pub force_trial_mode: bool,
    /// `-disablecordtwisttracking`: never track cord twisting
    pub disable_cord_twist_tracking: bool,
}

impl LaunchOptions {
    pub const TRIAL_FLAG: &'static str = "-trial";
    pub const DISABLE_CORD_TWIST_TRACKING_FLAG: &'static str = "-disablecordtwisttracking";

    /// Whether `arg` is one of the platform launch flags, ignoring case
    pub fn is_launch_flag(arg: &str) -> bool {
        arg.eq_ignore_ascii_case(Self::TRIAL_FLAG)
            || arg.eq_ignore_ascii_case(Self::DISABLE_CORD_TWIST_TRACKING_FLAG)
    }

    /// Parse launch flags from process arguments, ignoring case and unknown arguments
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::default();
        for arg in args {
            let arg = arg.as_ref();
            if arg.eq_ignore_ascii_case(Self::TRIAL_FLAG) {
                options.force_trial_mode = true;
            } else if arg.eq_ignore_ascii_case(Self::DISABLE_CORD_TWIST_TRACKING_FLAG) {
                options.disable_cord_twist_tracking = true;
            }
        }
        options
    }

    /// Combine with another set of options; a flag set in either stays set
    pub fn merge(&self, other: &LaunchOptions) -> Self {
        Self {
            force_trial_mode: self.force_trial_mode || other.force_trial_mode,
            disable_cord_twist_tracking: self.disable_cord_twist_tracking
                || other.disable_cord_twist_tracking,
        }
    }
}

// ----------------------------------------------------------------------------
// Integration Configuration
// ----------------------------------------------------------------------------

/// Complete configuration of an [`Integration`](crate::Integration)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    /// Application key used for the entitlement check
    pub app_key: String,
    pub dispatch: DispatchConfig,
    pub limits: LimitsConfig,
    pub shutdown: ShutdownConfig,
    pub launch: LaunchOptions,
}

impl IntegrationConfig {
    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: IntegrationConfig = toml::from_str(text)
            .map_err(|e| IntegrationError::config_error(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text).map_err(|e| match e {
            IntegrationError::Configuration { reason } => IntegrationError::config_error(format!(
                "{}: {}",
                path.as_ref().display(),
                reason
            )),
            other => other,
        })
    }

    /// Serialize to pretty TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| IntegrationError::config_error(format!("Failed to serialize: {}", e)))
    }

    /// Check the configuration for values the integration cannot run with
    ///
    /// An empty application key is not a configuration error; it is reported
    /// by initialization instead.
    pub fn validate(&self) -> Result<()> {
        if self.dispatch.response_buffer_size == 0 {
            return Err(IntegrationError::config_error(
                "dispatch.response_buffer_size must be greater than 0",
            ));
        }
        if self.dispatch.message_buffer_size == 0 {
            return Err(IntegrationError::config_error(
                "dispatch.message_buffer_size must be greater than 0",
            ));
        }
        Ok(())
    }

    pub fn with_app_key(mut self, app_key: impl Into<String>) -> Self {
        self.app_key = app_key.into();
        self
    }

    pub fn with_launch_options(mut self, launch: LaunchOptions) -> Self {
        self.launch = launch;
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownConfig) -> Self {
        self.shutdown = shutdown;
        self
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
