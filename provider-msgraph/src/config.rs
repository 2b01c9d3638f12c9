//! Backend configuration
//!
//! Construction-time, immutable settings for the Graph adapter, built either
//! programmatically through [`MsGraphConfigBuilder`] or from the flat
//! string→string option map a backup engine hands down.

use std::collections::HashMap;
use std::time::Duration;

use backend_runtime::options::{parse_byte_size, parse_count, parse_duration};
use backend_traits::error::BackendError;

use crate::resolver::DriveAddressing;
use crate::upload::{align_fragment_size, DEFAULT_FRAGMENT_SIZE};

/// Option key for the credential handed to the token collaborator
pub const OPT_AUTH_ID: &str = "auth-id";
/// Option key for the upload fragment size (byte-size literal)
pub const OPT_FRAGMENT_SIZE: &str = "fragment-size";
/// Option key for the per-fragment attempt cap
pub const OPT_FRAGMENT_RETRY_COUNT: &str = "fragment-retry-count";
/// Option key for the base backoff delay (milliseconds or duration literal)
pub const OPT_FRAGMENT_RETRY_DELAY: &str = "fragment-retry-delay";
/// Option key for the control-plane timeout
pub const OPT_SHORT_TIMEOUT: &str = "short-timeout";
/// Option key for the pagination timeout
pub const OPT_LIST_TIMEOUT: &str = "list-timeout";
/// Option key for the idle body-transfer timeout
pub const OPT_READ_WRITE_TIMEOUT: &str = "read-write-timeout";

/// OAuth provider identifier handed to the token collaborator
pub const DEFAULT_PROTOCOL_KEY: &str = "msgraph";

const DEFAULT_FRAGMENT_RETRY_COUNT: u32 = 5;
const DEFAULT_FRAGMENT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Per-call timeouts.
///
/// `short` applies to control-plane calls, `list` to each paginated GET, and
/// `read_write` is the idle timeout wrapped around any body stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub short: Duration,
    pub list: Duration,
    pub read_write: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            short: Duration::from_secs(30),
            list: Duration::from_secs(60),
            read_write: Duration::from_secs(100),
        }
    }
}

/// Immutable adapter configuration.
#[derive(Debug, Clone)]
pub struct MsGraphConfig {
    /// Opaque credential handed to the token collaborator
    pub auth_id: String,

    /// OAuth provider identifier
    pub protocol_key: String,

    /// User-supplied URL encoding the backup root folder path
    pub root_url: String,

    /// Which drive the adapter targets
    pub addressing: DriveAddressing,

    /// Upload fragment size; always a positive multiple of 320 KiB within
    /// [320 KiB, 60 MiB]
    pub fragment_size: u64,

    /// Per-fragment attempt cap (≥ 1)
    pub fragment_retry_count: u32,

    /// Base delay for exponential fragment backoff
    pub fragment_retry_delay: Duration,

    /// Per-call timeouts
    pub timeouts: Timeouts,
}

impl MsGraphConfig {
    pub fn builder(root_url: impl Into<String>) -> MsGraphConfigBuilder {
        MsGraphConfigBuilder::new(root_url)
    }

    /// Build a configuration from the engine's flat option map.
    pub fn from_options(
        root_url: impl Into<String>,
        options: &HashMap<String, String>,
    ) -> Result<Self, BackendError> {
        let mut builder = MsGraphConfigBuilder::new(root_url);

        if let Some(auth_id) = options.get(OPT_AUTH_ID) {
            builder = builder.auth_id(auth_id);
        }

        if let Some(value) = options.get(OPT_FRAGMENT_SIZE) {
            let size = parse_byte_size(OPT_FRAGMENT_SIZE, value).map_err(config_error)?;
            builder = builder.fragment_size(size);
        }

        if let Some(value) = options.get(OPT_FRAGMENT_RETRY_COUNT) {
            let count = parse_count(OPT_FRAGMENT_RETRY_COUNT, value).map_err(config_error)?;
            builder = builder.fragment_retry_count(count);
        }

        if let Some(value) = options.get(OPT_FRAGMENT_RETRY_DELAY) {
            builder = builder.fragment_retry_delay(parse_retry_delay(value)?);
        }

        let mut timeouts = Timeouts::default();
        if let Some(value) = options.get(OPT_SHORT_TIMEOUT) {
            timeouts.short = parse_duration(OPT_SHORT_TIMEOUT, value).map_err(config_error)?;
        }
        if let Some(value) = options.get(OPT_LIST_TIMEOUT) {
            timeouts.list = parse_duration(OPT_LIST_TIMEOUT, value).map_err(config_error)?;
        }
        if let Some(value) = options.get(OPT_READ_WRITE_TIMEOUT) {
            timeouts.read_write =
                parse_duration(OPT_READ_WRITE_TIMEOUT, value).map_err(config_error)?;
        }
        builder = builder.timeouts(timeouts);

        builder.build()
    }
}

fn config_error(e: backend_runtime::error::Error) -> BackendError {
    BackendError::Config(e.to_string())
}

/// The retry delay option is documented as integer milliseconds; duration
/// literals ("2s") are accepted as well.
fn parse_retry_delay(value: &str) -> Result<Duration, BackendError> {
    if let Ok(millis) = value.trim().parse::<u64>() {
        return Ok(Duration::from_millis(millis));
    }
    parse_duration(OPT_FRAGMENT_RETRY_DELAY, value).map_err(config_error)
}

/// Builder for [`MsGraphConfig`].
pub struct MsGraphConfigBuilder {
    root_url: String,
    auth_id: Option<String>,
    protocol_key: String,
    addressing: DriveAddressing,
    fragment_size: u64,
    fragment_retry_count: u32,
    fragment_retry_delay: Duration,
    timeouts: Timeouts,
}

impl MsGraphConfigBuilder {
    fn new(root_url: impl Into<String>) -> Self {
        Self {
            root_url: root_url.into(),
            auth_id: None,
            protocol_key: DEFAULT_PROTOCOL_KEY.to_string(),
            addressing: DriveAddressing::Me,
            fragment_size: DEFAULT_FRAGMENT_SIZE,
            fragment_retry_count: DEFAULT_FRAGMENT_RETRY_COUNT,
            fragment_retry_delay: DEFAULT_FRAGMENT_RETRY_DELAY,
            timeouts: Timeouts::default(),
        }
    }

    /// Sets the credential handed to the token collaborator (required).
    pub fn auth_id(mut self, auth_id: impl Into<String>) -> Self {
        self.auth_id = Some(auth_id.into());
        self
    }

    /// Sets the OAuth provider identifier.
    pub fn protocol_key(mut self, key: impl Into<String>) -> Self {
        self.protocol_key = key.into();
        self
    }

    /// Sets the drive addressing variant.
    pub fn addressing(mut self, addressing: DriveAddressing) -> Self {
        self.addressing = addressing;
        self
    }

    /// Sets the requested fragment size.
    ///
    /// The effective value is clamped to [320 KiB, 60 MiB] and rounded down
    /// to a multiple of 320 KiB at build time.
    pub fn fragment_size(mut self, bytes: u64) -> Self {
        self.fragment_size = bytes;
        self
    }

    /// Sets the per-fragment attempt cap.
    pub fn fragment_retry_count(mut self, count: u32) -> Self {
        self.fragment_retry_count = count;
        self
    }

    /// Sets the base backoff delay.
    pub fn fragment_retry_delay(mut self, delay: Duration) -> Self {
        self.fragment_retry_delay = delay;
        self
    }

    /// Sets all per-call timeouts.
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn build(self) -> Result<MsGraphConfig, BackendError> {
        let auth_id = self.auth_id.ok_or_else(|| {
            BackendError::Config(format!(
                "Option '{}' is required. Use .auth_id() to set it.",
                OPT_AUTH_ID
            ))
        })?;

        if auth_id.is_empty() {
            return Err(BackendError::Config(format!(
                "Option '{}' cannot be empty",
                OPT_AUTH_ID
            )));
        }

        if self.root_url.is_empty() {
            return Err(BackendError::Config(
                "A root URL is required to locate the backup folder".to_string(),
            ));
        }

        if self.fragment_retry_count == 0 {
            return Err(BackendError::Config(format!(
                "Option '{}' must be at least 1",
                OPT_FRAGMENT_RETRY_COUNT
            )));
        }

        Ok(MsGraphConfig {
            auth_id,
            protocol_key: self.protocol_key,
            root_url: self.root_url,
            addressing: self.addressing,
            fragment_size: align_fragment_size(self.fragment_size),
            fragment_retry_count: self.fragment_retry_count,
            fragment_retry_delay: self.fragment_retry_delay,
            timeouts: self.timeouts,
        })
    }
}
