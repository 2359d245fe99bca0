pub mod types;

pub use types::{AgUiConfig, ConfigOverrides, SecurityConfig, SecurityMode, WsSettings};

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

const CONFIG_FILE_NAME: &str = ".agui.toml";

/// Get the global config file path (~/.agui.toml)
pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(CONFIG_FILE_NAME))
}

/// Get the local config file path (dir/.agui.toml)
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE_NAME)
}

/// Reads and parses one config file.
pub fn read_config(path: &Path) -> Result<AgUiConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load configuration from file or use defaults.
///
/// An explicit path must exist and parse. Otherwise the local file is tried,
/// then the global one; a file that fails to load is skipped with a warning.
pub fn load_config(explicit: Option<&Path>) -> Result<AgUiConfig, ConfigError> {
    if let Some(path) = explicit {
        return read_config(path);
    }

    let candidates = [Some(local_config_path(Path::new("."))), global_config_path()];
    for path in candidates.into_iter().flatten() {
        if !path.exists() {
            continue;
        }
        match read_config(&path) {
            Ok(config) => {
                log::debug!("loaded configuration from {}", path.display());
                return Ok(config);
            }
            Err(e) => log::warn!("ignoring {e}"),
        }
    }

    Ok(AgUiConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use agui_core::ViolationPolicy;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AgUiConfig::default();
        assert_eq!(config.addr(), "localhost:8765");
        assert_eq!(config.security.cert_path, PathBuf::from("cert.pem"));
        assert_eq!(config.security.key_path, PathBuf::from("key.pem"));
        assert!(!config.security.insecure);
        assert_eq!(config.sequencer.policy, ViolationPolicy::Terminate);
        assert_eq!(config.ws.ping_interval_secs, 30);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = local_config_path(dir.path());
        fs::write(
            &path,
            "port = 9000\n\n[sequencer]\npolicy = \"reject\"\n\n[ws]\nbinary_frames = true\n",
        )
        .unwrap();

        let config = read_config(&path).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.sequencer.policy, ViolationPolicy::Reject);
        assert!(config.ws.binary_frames);
        assert_eq!(config.ws.ping_interval_secs, 30);
    }

    #[test]
    fn test_explicit_path_errors_are_reported() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            load_config(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "port = \"not a number\"").unwrap();
        assert!(matches!(
            load_config(Some(&broken)),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_overrides_win() {
        let mut config = AgUiConfig::default();
        config.apply(ConfigOverrides {
            port: Some(1234),
            cert_path: Some(PathBuf::from("/tls/cert.pem")),
            insecure: true,
            policy: Some(ViolationPolicy::Reject),
            ..Default::default()
        });
        assert_eq!(config.port, 1234);
        assert_eq!(config.security.cert_path, PathBuf::from("/tls/cert.pem"));
        assert_eq!(config.security.key_path, PathBuf::from("key.pem"));
        assert!(config.security.insecure);
        assert_eq!(config.sequencer.policy, ViolationPolicy::Reject);
    }

    #[test]
    fn test_security_resolution() {
        let dir = TempDir::new().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");

        let mut security = SecurityConfig {
            cert_path: cert.clone(),
            key_path: key.clone(),
            insecure: false,
        };
        assert!(matches!(
            security.resolve(),
            Err(CliError::TlsMaterialMissing { .. })
        ));

        fs::write(&cert, "cert").unwrap();
        assert!(security.resolve().is_err());

        fs::write(&key, "key").unwrap();
        assert_eq!(
            security.resolve().unwrap(),
            SecurityMode::Tls {
                cert_path: cert,
                key_path: key
            }
        );

        security.insecure = true;
        assert_eq!(security.resolve().unwrap(), SecurityMode::Insecure);
    }

    #[test]
    fn test_ws_settings() {
        let ws = WsSettings {
            binary_frames: true,
            ping_interval_secs: 5,
        }
        .to_ws_config();
        assert!(ws.binary_frames);
        assert!(ws.enable_ping);
        assert_eq!(ws.ping_interval, Duration::from_secs(5));

        let silent = WsSettings {
            binary_frames: false,
            ping_interval_secs: 0,
        }
        .to_ws_config();
        assert!(!silent.enable_ping);
    }
}
