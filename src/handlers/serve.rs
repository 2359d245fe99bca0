use std::path::PathBuf;

use crate::cli::InputFormat;
use crate::config::AgUiConfig;
use crate::error::Result;
use crate::replay::{decode_events, read_records};
use crate::server::ReplayServer;

/// Loads a recorded stream and replays it until interrupted.
///
/// Records that do not decode are skipped here; ordering violations are left
/// to each connection's sequencer so every client sees the same validated run.
pub async fn handle_serve(
    file: PathBuf,
    format: Option<InputFormat>,
    config: AgUiConfig,
) -> Result<()> {
    let records = read_records(&file, format)?;
    let events = decode_events(&records);
    log::info!(
        "loaded {} event(s) from {} ({} record(s) skipped)",
        events.len(),
        file.display(),
        records.len() - events.len()
    );

    ReplayServer::new(config, events).run().await
}
