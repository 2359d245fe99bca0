use std::path::PathBuf;
use std::time::Duration;

use agui_core::ViolationPolicy;
use agui_server::WsConfig;
use serde::{Deserialize, Serialize};

use crate::error::{CliError, Result};

/// Main configuration structure (`.agui.toml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgUiConfig {
    pub host: String,
    pub port: u16,
    /// Per-connection event buffer, in events.
    pub buffer: usize,
    /// Pause between replayed events, in milliseconds.
    pub replay_delay_ms: u64,
    pub security: SecurityConfig,
    pub sequencer: SequencerConfig,
    pub ws: WsSettings,
}

impl Default for AgUiConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8765,
            buffer: 64,
            replay_delay_ms: 0,
            security: SecurityConfig::default(),
            sequencer: SequencerConfig::default(),
            ws: WsSettings::default(),
        }
    }
}

impl AgUiConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Applies command-line and environment overrides on top of the file.
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(cert_path) = overrides.cert_path {
            self.security.cert_path = cert_path;
        }
        if let Some(key_path) = overrides.key_path {
            self.security.key_path = key_path;
        }
        if overrides.insecure {
            self.security.insecure = true;
        }
        if let Some(policy) = overrides.policy {
            self.sequencer.policy = policy;
        }
        if overrides.binary_frames {
            self.ws.binary_frames = true;
        }
    }
}

/// TLS material for the transport layer. Never inspected by the protocol engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub insecure: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            cert_path: PathBuf::from("cert.pem"),
            key_path: PathBuf::from("key.pem"),
            insecure: false,
        }
    }
}

/// How the transport should be secured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityMode {
    Insecure,
    Tls { cert_path: PathBuf, key_path: PathBuf },
}

impl SecurityConfig {
    /// Decides between TLS and plain transport.
    ///
    /// TLS is the default; serving without it takes an explicit `insecure`.
    pub fn resolve(&self) -> Result<SecurityMode> {
        if self.insecure {
            log::warn!("serving plain HTTP; use this for local development only");
            return Ok(SecurityMode::Insecure);
        }
        if !self.cert_path.exists() || !self.key_path.exists() {
            return Err(CliError::TlsMaterialMissing {
                cert_path: self.cert_path.clone(),
                key_path: self.key_path.clone(),
            });
        }
        Ok(SecurityMode::Tls {
            cert_path: self.cert_path.clone(),
            key_path: self.key_path.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    pub policy: ViolationPolicy,
}

/// WebSocket transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WsSettings {
    pub binary_frames: bool,
    /// Seconds between pings; 0 disables them.
    pub ping_interval_secs: u64,
}

impl Default for WsSettings {
    fn default() -> Self {
        Self {
            binary_frames: false,
            ping_interval_secs: 30,
        }
    }
}

impl WsSettings {
    pub fn to_ws_config(&self) -> WsConfig {
        let config = WsConfig::new().binary_frames(self.binary_frames);
        if self.ping_interval_secs == 0 {
            config.disable_ping()
        } else {
            config.ping_interval(Duration::from_secs(self.ping_interval_secs))
        }
    }
}

/// Values from flags and environment variables that win over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    pub insecure: bool,
    pub policy: Option<ViolationPolicy>,
    pub binary_frames: bool,
}
