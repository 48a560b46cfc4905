//! Client configuration.

use std::time::Duration;

/// Default change feed URL.
pub const DEFAULT_URL: &str = "ws://127.0.0.1:8080/ws/changes";

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Backoff between reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for the delay; it doubles per failed attempt until here.
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay: max_delay.max(initial_delay),
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(250), Duration::from_secs(10))
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Change feed URL (e.g., "wss://pinzo.example/ws/changes").
    pub url: String,

    /// Session credential, sent as a bearer token.
    pub credential: Option<String>,

    /// Timeout for establishing the connection and receiving the snapshot.
    pub connect_timeout: Duration,

    /// Reconnect backoff used by the live view.
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    /// Create a new client configuration for the given feed URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credential: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Create a configuration for a local server on the default port.
    pub fn localhost() -> Self {
        Self::new(DEFAULT_URL)
    }

    /// Set the session credential.
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the reconnect policy.
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::localhost()
    }
}
