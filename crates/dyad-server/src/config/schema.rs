use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;
use dyad_core::error::{DyadError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DyadConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub settings: SettingsSection,

    #[serde(default)]
    pub stream: StreamSection,
}

impl Default for DyadConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            settings: SettingsSection::default(),
            stream: StreamSection::default(),
        }
    }
}

impl DyadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(DyadError::BadRequest(format!(
                "unsupported config version: {}",
                self.version
            )));
        }

        self.server.validate()?;
        self.stream.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Per-connection outbound queue depth.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            ping_interval_ms: default_ping_interval_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            outbound_queue: default_outbound_queue(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen
            .parse::<SocketAddr>()
            .map_err(|e| DyadError::BadRequest(format!("server.listen is not a socket address: {e}")))?;
        if !(5000..=120000).contains(&self.ping_interval_ms) {
            return Err(DyadError::BadRequest(
                "server.ping_interval_ms must be between 5000 and 120000".into(),
            ));
        }
        if !(10000..=600000).contains(&self.idle_timeout_ms) {
            return Err(DyadError::BadRequest(
                "server.idle_timeout_ms must be between 10000 and 600000".into(),
            ));
        }
        if self.idle_timeout_ms <= self.ping_interval_ms {
            return Err(DyadError::BadRequest(
                "server.idle_timeout_ms must be greater than ping_interval_ms".into(),
            ));
        }
        if self.outbound_queue == 0 {
            return Err(DyadError::BadRequest(
                "server.outbound_queue must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Bind address, with the port replaced by `port_override` when given
    /// (the `PORT` environment variable in the binary).
    pub fn listen_addr(&self, port_override: Option<&str>) -> Result<SocketAddr> {
        let mut addr: SocketAddr = self
            .listen
            .parse()
            .map_err(|e| DyadError::BadRequest(format!("server.listen is not a socket address: {e}")))?;
        if let Some(port) = port_override {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|e| DyadError::BadRequest(format!("PORT is not a valid port: {e}")))?;
            addr.set_port(port);
        }
        Ok(addr)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsSection {
    /// Directory holding `settings.json`. Platform data dir when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamSection {
    #[serde(default = "default_placeholder_reply")]
    pub placeholder_reply: String,

    #[serde(default)]
    pub chunk_delay_ms: u64,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            placeholder_reply: default_placeholder_reply(),
            chunk_delay_ms: 0,
        }
    }
}

impl StreamSection {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_delay_ms > 10000 {
            return Err(DyadError::BadRequest(
                "stream.chunk_delay_ms must be between 0 and 10000".into(),
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:3000".into()
}
fn default_ping_interval_ms() -> u64 {
    20000
}
fn default_idle_timeout_ms() -> u64 {
    60000
}
fn default_outbound_queue() -> usize {
    1024
}
fn default_placeholder_reply() -> String {
    "Sample response".into()
}
