//! Server configuration: TOML file + environment / CLI overrides.

use serde::Deserialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use vless_core::{Identifier, VlessError, VlessResult};

/// Identifier used when none is configured.
pub const DEFAULT_UUID: &str = "5efabea4-f6d4-91fd-b8f0-17e004c89c60";

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub tunnel: TunnelSection,
    #[serde(default)]
    pub subscription: SubscriptionSection,
}

/// `[server]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_index_path")]
    pub index: String,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            index: default_index_path(),
            max_sessions: default_max_sessions(),
        }
    }
}

/// `[tunnel]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct TunnelSection {
    #[serde(default = "default_uuid")]
    pub uuid: String,
    /// Outbound connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    /// Seconds an upgraded connection may wait before sending its header.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout: u64,
    /// Relay idle timeout in seconds, 0 disables it.
    #[serde(default)]
    pub idle_timeout: u64,
}

impl Default for TunnelSection {
    fn default() -> Self {
        Self {
            uuid: default_uuid(),
            connect_timeout: default_connect_timeout(),
            handshake_timeout: default_handshake_timeout(),
            idle_timeout: 0,
        }
    }
}

/// `[subscription]` section: what the `/sub` link advertises.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionSection {
    #[serde(default = "default_sub_port")]
    pub port: u16,
    #[serde(default = "default_node_name")]
    pub name: String,
}

impl Default for SubscriptionSection {
    fn default() -> Self {
        Self {
            port: default_sub_port(),
            name: default_node_name(),
        }
    }
}

fn default_port() -> u16 {
    7860
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_index_path() -> String {
    "index.html".to_string()
}
fn default_max_sessions() -> usize {
    1024
}
fn default_uuid() -> String {
    DEFAULT_UUID.to_string()
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_handshake_timeout() -> u64 {
    10
}
fn default_sub_port() -> u16 {
    443
}
fn default_node_name() -> String {
    "HF-Node".to_string()
}

/// Values taken from the command line or environment. `None` keeps the file value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub uuid: Option<String>,
    pub index: Option<String>,
    pub max_sessions: Option<usize>,
    pub connect_timeout: Option<u64>,
    pub handshake_timeout: Option<u64>,
    pub idle_timeout: Option<u64>,
}

/// Resolved server configuration (paths expanded, overrides applied).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub bind: IpAddr,
    pub index_path: PathBuf,
    pub max_sessions: usize,
    pub identifier: Identifier,
    pub connect_timeout: Duration,
    pub handshake_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub subscription_port: u16,
    pub node_name: String,
}

impl ServerConfig {
    /// Load config from a TOML file (if it exists), then apply overrides.
    pub fn load(config_path: Option<&Path>, overrides: Overrides) -> VlessResult<Self> {
        let file_config = match config_path {
            Some(path) => {
                let expanded = expand_tilde(path);
                if expanded.exists() {
                    info!(path = %expanded.display(), "loading config file");
                    let content = std::fs::read_to_string(&expanded)?;
                    parse_config_file(&content)?
                } else {
                    info!(path = %expanded.display(), "config file not found, using defaults");
                    ConfigFile::default()
                }
            }
            None => ConfigFile::default(),
        };

        Self::resolve(file_config, overrides)
    }

    /// Merge overrides into a parsed config file.
    pub fn resolve(file: ConfigFile, overrides: Overrides) -> VlessResult<Self> {
        let port = overrides.port.unwrap_or(file.server.port);
        let bind_str = overrides.bind.unwrap_or(file.server.bind);
        let bind: IpAddr = bind_str
            .parse()
            .map_err(|e| VlessError::Config(format!("invalid bind address {bind_str:?}: {e}")))?;
        let index_str = overrides.index.unwrap_or(file.server.index);
        let max_sessions = overrides.max_sessions.unwrap_or(file.server.max_sessions);

        let uuid = overrides.uuid.unwrap_or(file.tunnel.uuid);
        let identifier: Identifier = uuid.parse()?;
        if identifier.to_string() == DEFAULT_UUID {
            warn!("using the built-in default identifier; set UUID or [tunnel].uuid");
        }

        let connect_secs = overrides
            .connect_timeout
            .unwrap_or(file.tunnel.connect_timeout);
        if connect_secs == 0 {
            return Err(VlessError::Config("connect_timeout must be > 0".into()));
        }
        let handshake_secs = overrides
            .handshake_timeout
            .unwrap_or(file.tunnel.handshake_timeout);
        if handshake_secs == 0 {
            return Err(VlessError::Config("handshake_timeout must be > 0".into()));
        }
        let idle_secs = overrides.idle_timeout.unwrap_or(file.tunnel.idle_timeout);

        Ok(Self {
            port,
            bind,
            index_path: expand_tilde_str(&index_str),
            max_sessions,
            identifier,
            connect_timeout: Duration::from_secs(connect_secs),
            handshake_timeout: Duration::from_secs(handshake_secs),
            idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
            subscription_port: file.subscription.port,
            node_name: file.subscription.name,
        })
    }
}

/// Parse the TOML body of a config file.
pub fn parse_config_file(content: &str) -> VlessResult<ConfigFile> {
    toml::from_str::<ConfigFile>(content)
        .map_err(|e| VlessError::Config(format!("config parse error: {e}")))
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    expand_tilde_str(&s)
}

fn expand_tilde_str(s: &str) -> PathBuf {
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let cfg = ServerConfig::resolve(ConfigFile::default(), Overrides::default()).unwrap();
        assert_eq!(cfg.port, 7860);
        assert_eq!(cfg.bind, "0.0.0.0".parse::<IpAddr>().unwrap());
        assert_eq!(cfg.identifier.to_string(), DEFAULT_UUID);
        assert_eq!(cfg.connect_timeout, Duration::from_secs(10));
        assert_eq!(cfg.handshake_timeout, Duration::from_secs(10));
        assert!(cfg.idle_timeout.is_none());
        assert_eq!(cfg.subscription_port, 443);
        assert_eq!(cfg.node_name, "HF-Node");
    }

    #[test]
    fn file_values_are_used() {
        let file = parse_config_file(
            r#"
            [server]
            port = 9000
            max_sessions = 8

            [tunnel]
            uuid = "00112233-4455-6677-8899-aabbccddeeff"
            handshake_timeout = 3
            idle_timeout = 300

            [subscription]
            name = "edge"
            "#,
        )
        .unwrap();
        let cfg = ServerConfig::resolve(file, Overrides::default()).unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.max_sessions, 8);
        assert_eq!(cfg.identifier.as_bytes()[15], 0xff);
        assert_eq!(cfg.handshake_timeout, Duration::from_secs(3));
        assert_eq!(cfg.idle_timeout, Some(Duration::from_secs(300)));
        assert_eq!(cfg.node_name, "edge");
        assert_eq!(cfg.subscription_port, 443);
    }

    #[test]
    fn overrides_win_over_file() {
        let file = parse_config_file("[server]\nport = 9000\n").unwrap();
        let overrides = Overrides {
            port: Some(8443),
            uuid: Some("ffeeddccbbaa99887766554433221100".into()),
            ..Default::default()
        };
        let cfg = ServerConfig::resolve(file, overrides).unwrap();
        assert_eq!(cfg.port, 8443);
        assert_eq!(cfg.identifier.as_bytes()[0], 0xff);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_uuid = Overrides {
            uuid: Some("not-a-uuid".into()),
            ..Default::default()
        };
        assert!(ServerConfig::resolve(ConfigFile::default(), bad_uuid).is_err());

        let bad_bind = Overrides {
            bind: Some("localhost:80".into()),
            ..Default::default()
        };
        assert!(ServerConfig::resolve(ConfigFile::default(), bad_bind).is_err());

        let zero_timeout = Overrides {
            connect_timeout: Some(0),
            ..Default::default()
        };
        assert!(ServerConfig::resolve(ConfigFile::default(), zero_timeout).is_err());

        let zero_handshake = Overrides {
            handshake_timeout: Some(0),
            ..Default::default()
        };
        assert!(ServerConfig::resolve(ConfigFile::default(), zero_handshake).is_err());

        assert!(parse_config_file("[server]\nport = \"x\"\n").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = Path::new("/nonexistent/vless-relay/config.toml");
        let cfg = ServerConfig::load(Some(path), Overrides::default()).unwrap();
        assert_eq!(cfg.port, 7860);
    }
}
