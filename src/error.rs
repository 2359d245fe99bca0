use std::path::PathBuf;

use agui_core::ProtocolError;
use agui_server::ServerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("{count} protocol violation(s) in {source_name}")]
    Violations { count: usize, source_name: String },

    #[error(
        "cannot start a secure server without TLS certificates ({} / {}); \
         pass --insecure for local development only",
        cert_path.display(),
        key_path.display()
    )]
    TlsMaterialMissing { cert_path: PathBuf, key_path: PathBuf },

    #[error("failed to load TLS material from {}: {source}", cert_path.display())]
    Tls {
        cert_path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, CliError>;
