use anyhow::Context;
use serde::Deserialize;
use std::{io::ErrorKind, net::SocketAddr, path::Path};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

#[derive(Debug, Deserialize)]
pub struct RelayConfig {
    /// Delay in milliseconds before recomputing room occupancy after a
    /// disconnect, letting the transport finish its membership teardown.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Memberless rooms untouched for this long get garbage collected.
    #[serde(default = "default_empty_room_ttl_secs")]
    pub empty_room_ttl_secs: u64,
}

fn default_bind() -> SocketAddr {
    "0.0.0.0:5000".parse().unwrap()
}

fn default_settle_delay_ms() -> u64 {
    100
}

fn default_empty_room_ttl_secs() -> u64 {
    600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            empty_room_ttl_secs: default_empty_room_ttl_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub async fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read config file: {}", path.display()));
            }
        };
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:5000".parse().unwrap());
        assert_eq!(config.relay.settle_delay_ms, 100);
        assert_eq!(config.relay.empty_room_ttl_secs, 600);
    }

    #[test]
    fn partial_config_overrides_bind() {
        let config: Config = toml::from_str("[server]\nbind = \"127.0.0.1:8080\"").unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.relay.settle_delay_ms, 100);
    }

    #[test]
    fn relay_section_overrides_delays() {
        let config: Config =
            toml::from_str("[relay]\nsettle_delay_ms = 250\nempty_room_ttl_secs = 60").unwrap();
        assert_eq!(config.relay.settle_delay_ms, 250);
        assert_eq!(config.relay.empty_room_ttl_secs, 60);
    }
}
