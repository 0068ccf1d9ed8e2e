//! SDK configuration.
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::time::Duration;

/// Snapshot of host device/application facts that ride along on push token registration.
///
/// Collecting these is the host integration's job; the core only forwards them.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Platform identifier, e.g. `android` or `ios`.
    pub platform: String,
    /// Push vendor identifier, e.g. `FCM` or `APNS`.
    pub push_vendor: String,
    /// Whether the user has granted notification permission.
    pub notification_permission: bool,
    /// Whether background data transfer is available to the app.
    pub background_data: bool,
    /// Free-form device metadata (manufacturer, model, OS version, ...).
    pub metadata: BTreeMap<String, String>,
}

impl Default for DeviceInfo {
    fn default() -> DeviceInfo {
        DeviceInfo {
            platform: "android".to_owned(),
            push_vendor: "FCM".to_owned(),
            notification_permission: false,
            background_data: false,
            metadata: BTreeMap::new(),
        }
    }
}

/// Configuration for the Beacon SDK core.
///
/// Create with [`Config::new`] and adjust using the `with_*` methods:
/// ```
/// # use beacon_core::Config;
/// # use std::time::Duration;
/// let config = Config::new("pk_abc123").with_debounce_interval(Duration::from_millis(250));
/// ```
// Not implementing `Copy` as we may add non-copyable fields in the future.
#[derive(Debug, Clone)]
pub struct Config {
    /// Public API key, aka company id.
    pub api_key: String,
    /// Base URL for API calls. Clients should use the default in most cases.
    pub base_url: String,
    /// API revision date sent in the `Revision` header.
    pub api_revision: String,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
    /// Connect/read timeout for one network attempt.
    pub network_timeout: Duration,
    /// Maximum number of send attempts before a rate-limited request is abandoned.
    pub network_max_attempts: u32,
    /// Ceiling for the computed retry interval.
    pub network_max_retry_interval: Duration,
    /// Jitter, in whole seconds, applied to retry intervals.
    pub network_jitter_range: RangeInclusive<u64>,
    /// Floor for the computed retry interval (the queue's regular flush cadence).
    pub network_flush_interval: Duration,
    /// How long rapid profile mutations are coalesced before one sync request is enqueued.
    pub debounce_interval: Duration,
    /// Capacity of the recent-events ring buffer.
    pub recent_event_capacity: usize,
    /// Time-to-live of entries in the windowed event buffer.
    pub event_buffer_ttl: Duration,
    /// Device/application facts forwarded on push token registration.
    pub device: DeviceInfo,
}

impl Config {
    /// Default base URL for API calls.
    pub const DEFAULT_BASE_URL: &'static str = "https://a.beacon-api.com";
    /// Default value for [`Config::api_revision`].
    pub const DEFAULT_API_REVISION: &'static str = "2025-07-15";
    /// Default value for [`Config::network_timeout`].
    pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default value for [`Config::network_max_attempts`].
    pub const DEFAULT_NETWORK_MAX_ATTEMPTS: u32 = 50;
    /// Default value for [`Config::network_max_retry_interval`].
    pub const DEFAULT_NETWORK_MAX_RETRY_INTERVAL: Duration = Duration::from_secs(180);
    /// Default value for [`Config::network_flush_interval`].
    pub const DEFAULT_NETWORK_FLUSH_INTERVAL: Duration = Duration::from_secs(10);
    /// Default value for [`Config::debounce_interval`].
    ///
    /// The debounce only merges chained profile updates into one API call, so it can stay small.
    pub const DEFAULT_DEBOUNCE_INTERVAL: Duration = Duration::from_millis(100);
    /// Default value for [`Config::recent_event_capacity`].
    pub const DEFAULT_RECENT_EVENT_CAPACITY: usize = 10;
    /// Default value for [`Config::event_buffer_ttl`].
    pub const DEFAULT_EVENT_BUFFER_TTL: Duration = Duration::from_secs(10);

    /// Create a configuration with default settings for the given API key.
    pub fn new(api_key: impl Into<String>) -> Config {
        Config {
            api_key: api_key.into(),
            base_url: Config::DEFAULT_BASE_URL.to_owned(),
            api_revision: Config::DEFAULT_API_REVISION.to_owned(),
            user_agent: format!("beacon-core/{}", env!("CARGO_PKG_VERSION")),
            network_timeout: Config::DEFAULT_NETWORK_TIMEOUT,
            network_max_attempts: Config::DEFAULT_NETWORK_MAX_ATTEMPTS,
            network_max_retry_interval: Config::DEFAULT_NETWORK_MAX_RETRY_INTERVAL,
            network_jitter_range: 0..=10,
            network_flush_interval: Config::DEFAULT_NETWORK_FLUSH_INTERVAL,
            debounce_interval: Config::DEFAULT_DEBOUNCE_INTERVAL,
            recent_event_capacity: Config::DEFAULT_RECENT_EVENT_CAPACITY,
            event_buffer_ttl: Config::DEFAULT_EVENT_BUFFER_TTL,
            device: DeviceInfo::default(),
        }
    }

    /// Override base URL for API calls.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Config {
        self.base_url = base_url.into();
        self
    }

    /// Override the API revision date.
    pub fn with_api_revision(mut self, api_revision: impl Into<String>) -> Config {
        self.api_revision = api_revision.into();
        self
    }

    /// Override the `User-Agent` header value.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Config {
        self.user_agent = user_agent.into();
        self
    }

    /// Update the per-attempt network timeout.
    pub fn with_network_timeout(mut self, timeout: Duration) -> Config {
        self.network_timeout = timeout;
        self
    }

    /// Update the maximum number of send attempts.
    pub fn with_network_max_attempts(mut self, max_attempts: u32) -> Config {
        self.network_max_attempts = max_attempts.max(1);
        self
    }

    /// Update the profile sync debounce interval.
    pub fn with_debounce_interval(mut self, interval: Duration) -> Config {
        self.debounce_interval = interval;
        self
    }

    /// Replace the device/application facts.
    pub fn with_device(mut self, device: DeviceInfo) -> Config {
        self.device = device;
        self
    }
}
