//! Configuration types for the event-listener crate
//!
//! `ListenerConfig` holds the timing knobs of the connection state machine
//! and health monitor. `ListenOptions` describes a single `listen()` session.

use std::time::Duration;

use rand::Rng;

use crate::error::{ListenerError, Result};

/// Default time `EventListener::stop` waits for a clean shutdown
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time `EventListener::wait_for_initialized` waits for the initial snapshots
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timing configuration for an `EventListener`
///
/// The defaults match what the EagleApi server expects; tests and demos
/// can shorten them with the `with_*` builders.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Base delay for reconnect backoff
    /// Default: 3 seconds
    pub reconnect_base_delay: Duration,

    /// Upper bound on the backoff delay, before jitter
    /// Default: 30 seconds
    pub reconnect_max_delay: Duration,

    /// Random jitter added on top of each backoff delay, drawn from `[0, jitter)`
    /// Default: 1 second
    pub reconnect_jitter: Duration,

    /// How long to wait for the socket to open
    /// Default: 10 seconds
    pub open_timeout: Duration,

    /// Delay between the socket opening and sending JOIN
    /// Default: 500 milliseconds
    pub join_grace: Duration,

    /// Interval between PING commands when ping/pong is enabled
    /// Default: 30 seconds
    pub ping_interval: Duration,

    /// How long a PING may go unanswered before the socket is closed
    /// Default: 15 seconds
    pub pong_timeout: Duration,

    /// How often the staleness watchdog checks the last message time
    /// Default: 30 seconds
    pub staleness_check_interval: Duration,

    /// Silence after which the connection is considered dead
    /// Default: 2 minutes
    pub staleness_timeout: Duration,

    /// Token age after which it is refreshed before connecting
    /// Default: 55 minutes
    pub token_refresh_threshold: Duration,

    /// Poll interval used by `stop()` while waiting for the loop to exit
    /// Default: 50 milliseconds
    pub stop_poll_interval: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            reconnect_base_delay: Duration::from_secs(3),
            reconnect_max_delay: Duration::from_secs(30),
            reconnect_jitter: Duration::from_secs(1),
            open_timeout: Duration::from_secs(10),
            join_grace: Duration::from_millis(500),
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(15),
            staleness_check_interval: Duration::from_secs(30),
            staleness_timeout: Duration::from_secs(120),
            token_refresh_threshold: Duration::from_secs(55 * 60), // under the 1 hour session limit
            stop_poll_interval: Duration::from_millis(50),
        }
    }
}

impl ListenerConfig {
    /// Create a new ListenerConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ListenerConfig that notices dead connections sooner
    pub fn responsive() -> Self {
        Self {
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(10),
            ping_interval: Duration::from_secs(10),
            pong_timeout: Duration::from_secs(5),
            staleness_check_interval: Duration::from_secs(10),
            staleness_timeout: Duration::from_secs(45),
            ..Default::default()
        }
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.reconnect_base_delay > self.reconnect_max_delay {
            return Err(ListenerError::Configuration(
                "Invalid reconnect delay: base must not exceed max".to_string(),
            ));
        }

        let positive = [
            ("reconnect_base_delay", self.reconnect_base_delay),
            ("open_timeout", self.open_timeout),
            ("ping_interval", self.ping_interval),
            ("pong_timeout", self.pong_timeout),
            ("staleness_check_interval", self.staleness_check_interval),
            ("staleness_timeout", self.staleness_timeout),
            ("token_refresh_threshold", self.token_refresh_threshold),
            ("stop_poll_interval", self.stop_poll_interval),
        ];

        for (name, value) in positive {
            if value == Duration::ZERO {
                return Err(ListenerError::Configuration(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        if self.stop_poll_interval >= Duration::from_millis(100) {
            return Err(ListenerError::Configuration(
                "stop_poll_interval must be below 100ms".to_string(),
            ));
        }

        Ok(())
    }

    /// Backoff delay for the given (already incremented) attempt, without jitter
    ///
    /// `min(base * 2^attempt, max)`
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(31));
        self.reconnect_base_delay
            .saturating_mul(factor)
            .min(self.reconnect_max_delay)
    }

    /// Backoff delay for the given attempt, with random jitter
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let jitter = if self.reconnect_jitter.is_zero() {
            Duration::ZERO
        } else {
            rand::thread_rng().gen_range(Duration::ZERO..self.reconnect_jitter)
        };
        self.base_backoff(attempt) + jitter
    }

    /// Builder pattern methods for fluent configuration

    pub fn with_reconnect_delay(mut self, base: Duration, max: Duration) -> Self {
        self.reconnect_base_delay = base;
        self.reconnect_max_delay = max;
        self
    }

    pub fn with_reconnect_jitter(mut self, jitter: Duration) -> Self {
        self.reconnect_jitter = jitter;
        self
    }

    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    pub fn with_join_grace(mut self, grace: Duration) -> Self {
        self.join_grace = grace;
        self
    }

    pub fn with_ping(mut self, interval: Duration, pong_timeout: Duration) -> Self {
        self.ping_interval = interval;
        self.pong_timeout = pong_timeout;
        self
    }

    pub fn with_staleness(mut self, check_interval: Duration, timeout: Duration) -> Self {
        self.staleness_check_interval = check_interval;
        self.staleness_timeout = timeout;
        self
    }

    pub fn with_token_refresh_threshold(mut self, threshold: Duration) -> Self {
        self.token_refresh_threshold = threshold;
        self
    }
}

/// Options for a single `listen()` session
///
/// Captured once per `listen()` and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenOptions {
    /// Accommodation to subscribe to
    pub accom_id: String,

    /// Snapshot flags to request; their count is the number of snapshots
    /// that make the session initialized
    pub snapshots: Vec<String>,

    /// Ask the server not to echo this client's own writes
    pub ignore_own_changes: bool,

    /// Send PING commands and expect PONGs; not every server supports it
    pub enable_ping_pong: bool,
}

impl ListenOptions {
    pub fn new<I, S>(accom_id: impl Into<String>, snapshots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accom_id: accom_id.into(),
            snapshots: snapshots.into_iter().map(Into::into).collect(),
            ignore_own_changes: false,
            enable_ping_pong: false,
        }
    }

    pub fn ignore_own_changes(mut self, ignore: bool) -> Self {
        self.ignore_own_changes = ignore;
        self
    }

    pub fn enable_ping_pong(mut self, enable: bool) -> Self {
        self.enable_ping_pong = enable;
        self
    }

    /// Number of SNAPSHOT messages after which the session is initialized
    pub fn expected_snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.accom_id.trim().is_empty() {
            return Err(ListenerError::Configuration(
                "accom_id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_config() {
        let config = ListenerConfig::default();
        assert_eq!(config.reconnect_base_delay, Duration::from_secs(3));
        assert_eq!(config.reconnect_max_delay, Duration::from_secs(30));
        assert_eq!(config.staleness_timeout, Duration::from_secs(120));
        assert_eq!(config.token_refresh_threshold, Duration::from_secs(3300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let inverted = ListenerConfig::new()
            .with_reconnect_delay(Duration::from_secs(30), Duration::from_secs(3));
        assert!(inverted.validate().is_err());

        let zero_pong = ListenerConfig::new().with_ping(Duration::from_secs(30), Duration::ZERO);
        assert!(zero_pong.validate().is_err());

        let slow_stop = ListenerConfig {
            stop_poll_interval: Duration::from_millis(250),
            ..Default::default()
        };
        assert!(slow_stop.validate().is_err());
    }

    #[test]
    fn test_config_presets() {
        let responsive = ListenerConfig::responsive();
        assert_eq!(responsive.pong_timeout, Duration::from_secs(5));
        assert!(responsive.validate().is_ok());
    }

    #[rstest]
    #[case(0, 3)]
    #[case(1, 6)]
    #[case(2, 12)]
    #[case(3, 24)]
    #[case(4, 30)]
    #[case(10, 30)]
    #[case(u32::MAX, 30)]
    fn test_base_backoff(#[case] attempt: u32, #[case] expected_secs: u64) {
        let config = ListenerConfig::default();
        assert_eq!(config.base_backoff(attempt), Duration::from_secs(expected_secs));
    }

    #[test]
    fn test_backoff_jitter_bounds() {
        let config = ListenerConfig::default();
        for _ in 0..50 {
            let delay = config.backoff_delay(1);
            assert!(delay >= Duration::from_secs(6));
            assert!(delay < Duration::from_secs(7));
        }

        let no_jitter = ListenerConfig::default().with_reconnect_jitter(Duration::ZERO);
        assert_eq!(no_jitter.backoff_delay(2), Duration::from_secs(12));
    }

    #[test]
    fn test_listen_options() {
        let options = ListenOptions::new("accom-1", ["ALL_ROOMS", "ACTIVATED_ROOM_SALES"])
            .ignore_own_changes(true);

        assert_eq!(options.expected_snapshot_count(), 2);
        assert!(options.ignore_own_changes);
        assert!(!options.enable_ping_pong);
        assert!(options.validate().is_ok());

        let empty = ListenOptions::new("  ", Vec::<String>::new());
        assert!(empty.validate().is_err());
    }
}
