use std::time::Duration;

/// Environment variable holding the stream channel URL.
pub const WS_URL_ENV: &str = "DYAD_WS_URL";
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:3000/ws";
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url: String,
    /// Fixed wait between a close and the next connect attempt. No backoff.
    pub reconnect_delay: Duration,
    pub outbound_queue: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_WS_URL)
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            outbound_queue: 256,
        }
    }

    /// `DYAD_WS_URL`, falling back to the local default.
    pub fn from_env() -> Self {
        match std::env::var(WS_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Self::new(url.trim()),
            _ => Self::default(),
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }
}
