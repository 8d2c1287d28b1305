use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Unified config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   config.toml:     [server]
//                    port = 9000
//
//   env var:         CHATCAST_SERVER__PORT=9000   (double underscore = nesting)
//
//   (single underscore stays within field names: CHATCAST_SERVER__SEND_QUEUE_CAPACITY)
//
// CLI flags are applied on top of the extracted values by the caller.

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub client: ClientFileConfig,
}

/// Server tuning knobs (lives under `[server]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-session outbound queue length. Frames beyond this are dropped
    /// for that session only.
    #[serde(default = "default_send_queue_capacity")]
    pub send_queue_capacity: usize,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            send_queue_capacity: default_send_queue_capacity(),
        }
    }
}

/// Terminal client knobs (lives under `[client]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientFileConfig {
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl Default for ClientFileConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_send_queue_capacity() -> usize {
    256
}
fn default_reconnect_delay_ms() -> u64 {
    2000
}

/// Build a figment that layers: defaults → config.toml → CHATCAST_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `CHATCAST_SERVER__HOST=0.0.0.0`  →  `server.host = "0.0.0.0"`
///   `CHATCAST_CLIENT__RECONNECT_DELAY_MS=500`  →  `client.reconnect_delay_ms = 500`
pub fn load_config(config_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(config_dir.join("config.toml")))
        .merge(Env::prefixed("CHATCAST_").split("__"))
}

// =============================================================================
// Runtime config structs (derived from FileConfig, used throughout the server)
// =============================================================================

/// Server configuration for runtime behavior.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// WebSocket-related settings
    pub websocket: WebSocketConfig,
}

#[derive(Clone, Debug)]
pub struct WebSocketConfig {
    /// Channel capacity for frames to one client
    pub send_queue_capacity: usize,
}

impl ServerConfig {
    pub fn from_file(fc: &ServerFileConfig) -> Self {
        Self {
            host: fc.host.clone(),
            port: fc.port,
            websocket: WebSocketConfig {
                send_queue_capacity: fc.send_queue_capacity.max(1),
            },
        }
    }

    /// Apply `--host` / `--port` flags.
    pub fn with_overrides(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    /// The host must be an IP literal; IPv6 may be bracketed.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = unbracket(&self.host)
            .parse()
            .with_context(|| format!("Invalid bind host: {}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Base URL a local client should use to reach this server. A wildcard
    /// bind address is not dialable, so it maps to loopback.
    pub fn client_base_url(&self) -> String {
        let host = match unbracket(&self.host).parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) if ip.is_unspecified() => "127.0.0.1".to_string(),
            Ok(IpAddr::V6(ip)) if ip.is_unspecified() => "[::1]".to_string(),
            Ok(IpAddr::V6(ip)) => format!("[{}]", ip),
            _ => self.host.clone(),
        };
        format!("http://{}:{}", host, self.port)
    }
}

fn unbracket(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

/// Terminal client configuration (runtime view).
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub reconnect_delay: Duration,
}

impl ClientConfig {
    pub fn from_file(fc: &ClientFileConfig) -> Self {
        Self {
            reconnect_delay: Duration::from_millis(fc.reconnect_delay_ms),
        }
    }
}

// =============================================================================
// Directory layout, derived from --config-dir rather than figment
// =============================================================================

#[derive(Clone, Debug)]
pub struct ChatcastConfig {
    pub config_dir: PathBuf,
}

impl ChatcastConfig {
    pub fn new(custom_dir: Option<PathBuf>) -> Result<Self> {
        let config_dir = match custom_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not find home directory")?
                .join(".chatcast"),
        };

        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory: {:?}", config_dir))?;

        Ok(Self { config_dir })
    }

    pub fn config_toml_path(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Extract the layered file config for this directory.
    pub fn load(&self) -> Result<FileConfig> {
        load_config(&self.config_dir)
            .extract::<FileConfig>()
            .with_context(|| {
                format!(
                    "Failed to load configuration from {}",
                    self.config_toml_path().display()
                )
            })
    }
}
