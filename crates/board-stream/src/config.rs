//! Stream client configuration.

use std::time::Duration;

use crate::backoff::BackoffConfig;

/// Configuration for the board event stream.
///
/// Provides sensible defaults and chainable setter methods. The reconnection
/// defaults implement a 1 s → 30 s doubling backoff with a budget of ten
/// scheduled attempts.
#[derive(Clone, Debug)]
pub struct StreamConfig {
    /// SSE endpoint URL.
    pub endpoint: String,
    /// Project identifier scoping the stream; sent as the `projectId` query
    /// parameter.
    pub project_id: String,
    /// Whether the connection is opened at all. When `false` the driver sits
    /// idle in the `disconnected` state until enabled.
    pub enabled: bool,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Initial delay before the first reconnection attempt.
    pub reconnect_initial_delay: Duration,
    /// Maximum delay between reconnection attempts.
    pub reconnect_max_delay: Duration,
    /// Backoff multiplier for reconnection delays.
    pub reconnect_backoff_factor: f64,
    /// Maximum number of scheduled reconnection attempts (None = infinite).
    pub reconnect_max_attempts: Option<u32>,
    /// Random jitter factor (0.0–1.0) for reconnection delays.
    pub reconnect_jitter: f64,
    /// Capacity of the command channel.
    pub command_channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            project_id: String::new(),
            enabled: true,
            connect_timeout: Duration::from_secs(10),
            reconnect_initial_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(30),
            reconnect_backoff_factor: 2.0,
            reconnect_max_attempts: Some(10),
            reconnect_jitter: 0.0,
            command_channel_capacity: 64,
        }
    }
}

impl StreamConfig {
    /// Create a new configuration for the given endpoint and project.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            project_id: project_id.into(),
            ..Default::default()
        }
    }

    /// Set whether the connection starts enabled.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the initial reconnection delay.
    #[must_use]
    pub fn reconnect_initial_delay(mut self, delay: Duration) -> Self {
        self.reconnect_initial_delay = delay;
        self
    }

    /// Set the maximum reconnection delay.
    #[must_use]
    pub fn reconnect_max_delay(mut self, delay: Duration) -> Self {
        self.reconnect_max_delay = delay;
        self
    }

    /// Set the reconnection backoff factor.
    #[must_use]
    pub fn reconnect_backoff_factor(mut self, factor: f64) -> Self {
        self.reconnect_backoff_factor = factor;
        self
    }

    /// Set the maximum reconnection attempts.
    #[must_use]
    pub fn reconnect_max_attempts(mut self, attempts: Option<u32>) -> Self {
        self.reconnect_max_attempts = attempts;
        self
    }

    /// Set the reconnection jitter factor.
    #[must_use]
    pub fn reconnect_jitter(mut self, jitter: f64) -> Self {
        self.reconnect_jitter = jitter;
        self
    }

    /// Set the command channel capacity.
    #[must_use]
    pub fn command_channel_capacity(mut self, capacity: usize) -> Self {
        self.command_channel_capacity = capacity;
        self
    }

    /// The reconnection backoff parameters.
    pub(crate) fn backoff(&self) -> BackoffConfig {
        BackoffConfig {
            initial_delay: self.reconnect_initial_delay,
            max_delay: self.reconnect_max_delay,
            factor: self.reconnect_backoff_factor,
            jitter: self.reconnect_jitter,
        }
    }

    /// The full stream URL, with the `projectId` query parameter appended.
    pub fn stream_url(&self) -> String {
        let mut url = self.endpoint.clone();
        append_query_string(&mut url, &format!("projectId={}", self.project_id));
        url
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error message string if any field has an invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.endpoint.is_empty() {
            return Err("Endpoint URL cannot be empty".to_string());
        }
        if self.project_id.is_empty() {
            return Err("Project id cannot be empty".to_string());
        }
        if self.command_channel_capacity == 0 {
            return Err("Command channel capacity must be > 0".to_string());
        }
        self.backoff().validate()
    }
}

fn append_query_string(url: &mut String, query: &str) {
    let query = query.trim_start_matches('?');
    if query.is_empty() {
        return;
    }

    if url.contains('?') {
        url.push('&');
    } else {
        url.push('?');
    }
    url.push_str(query);
}
