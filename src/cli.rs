use agui_core::ViolationPolicy;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "agui-ctl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validate, encode and replay AG-UI event streams")]
#[command(long_about = "Checks recorded AG-UI agent event streams against the protocol's ordering and state rules, frames them for SSE or WebSocket transports, and replays them to clients over HTTP.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format where applicable
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a recorded event stream and print a run report
    Validate {
        /// Event stream to read (`-` for stdin)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Input format (defaults to sse for *.sse files, jsonl otherwise)
        #[arg(long, value_enum)]
        format: Option<InputFormat>,

        /// What to do with a violating event: terminate or reject
        #[arg(long, value_name = "POLICY")]
        policy: Option<ViolationPolicy>,
    },

    /// Validate a stream and print it framed for a transport
    Encode {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long, value_enum)]
        format: Option<InputFormat>,

        /// Target transport framing
        #[arg(long, value_enum, default_value = "sse")]
        transport: Transport,

        /// Emit length-prefixed binary frames (ws transport only)
        #[arg(long, requires = "output")]
        binary: bool,

        /// Write frames to a file instead of stdout
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,

        #[arg(long, value_name = "POLICY")]
        policy: Option<ViolationPolicy>,
    },

    /// Replay a stream to every client that connects on /sse or /ws
    Serve {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long, value_enum)]
        format: Option<InputFormat>,

        /// Host address to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// TLS certificate path
        #[arg(long, env = "AGUI_CERT", value_name = "PATH")]
        cert: Option<PathBuf>,

        /// TLS private key path
        #[arg(long, env = "AGUI_KEY", value_name = "PATH")]
        key: Option<PathBuf>,

        /// Serve plain HTTP instead of TLS (local development only)
        #[arg(long, env = "AGUI_INSECURE")]
        insecure: bool,

        #[arg(long, value_name = "POLICY")]
        policy: Option<ViolationPolicy>,

        /// Send WebSocket events as binary frames
        #[arg(long)]
        binary: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    /// One JSON event per line
    Jsonl,
    /// A captured text/event-stream body
    Sse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    Sse,
    Ws,
}

impl Cli {
    /// Initialize logging based on verbosity level
    pub fn init_logging(&self) {
        if self.quiet {
            return;
        }

        let level = match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();
    }
}
