//! # agui-ctl
//!
//! Command-line tooling for AG-UI agent event streams, built on
//! [`agui_core`] and [`agui_server`].
//!
//! - **validate**: run a recorded stream through the sequencer and print a
//!   run report with every violation.
//! - **encode**: frame the validated stream for SSE or WebSocket.
//! - **serve**: replay the stream to HTTP clients on `/sse` and `/ws`.
//!
//! ## Example
//!
//! ```rust
//! use agui_cli::replay::{sequence_records, split_records};
//! use agui_cli::cli::InputFormat;
//! use agui_core::ViolationPolicy;
//!
//! let text = r#"{"type":"RUN_STARTED","threadId":"t1","runId":"r1"}
//! {"type":"RUN_FINISHED","threadId":"t1","runId":"r1"}"#;
//! let replay = sequence_records(split_records(text, InputFormat::Jsonl), ViolationPolicy::Terminate);
//! assert!(replay.report.is_clean());
//! assert_eq!(replay.forwarded.len(), 2);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod replay;
pub mod server;

pub use config::AgUiConfig;
pub use error::{CliError, Result};
pub use handlers::*;
use cli::Commands;
use config::ConfigOverrides;

/// The current version of the CLI tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runs one subcommand against a loaded configuration.
///
/// A `--policy` flag wins over `[sequencer] policy` from the config file.
pub async fn run_command(command: Commands, mut config: AgUiConfig, json: bool) -> Result<()> {
    match command {
        Commands::Validate {
            file,
            format,
            policy,
        } => {
            let policy = policy.unwrap_or(config.sequencer.policy);
            handlers::handle_validate(file, format, policy, json)
        }
        Commands::Encode {
            file,
            format,
            transport,
            binary,
            output,
            policy,
        } => {
            let policy = policy.unwrap_or(config.sequencer.policy);
            handlers::handle_encode(file, format, transport, binary, output, policy)
        }
        Commands::Serve {
            file,
            format,
            host,
            port,
            cert,
            key,
            insecure,
            policy,
            binary,
        } => {
            config.apply(ConfigOverrides {
                host,
                port,
                cert_path: cert,
                key_path: key,
                insecure,
                policy,
                binary_frames: binary,
            });
            handlers::handle_serve(file, format, config).await
        }
    }
}
