use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use agui_core::machine::RunOutcome;
use agui_core::sequencer::{RunReport, ViolationPolicy};

use crate::cli::InputFormat;
use crate::error::{CliError, Result};
use crate::replay::{read_records, sequence_records};

/// Validates a recorded stream and prints its report.
///
/// Fails with [`CliError::Violations`] when any event was rejected.
pub fn handle_validate(
    file: PathBuf,
    format: Option<InputFormat>,
    policy: ViolationPolicy,
    json: bool,
) -> Result<()> {
    let records = read_records(&file, format)?;
    log::info!("validating {} record(s) from {}", records.len(), file.display());

    let replay = sequence_records(records, policy);
    let report = replay.report;

    if json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::Protocol(e.into()))?;
        println!("{rendered}");
    } else {
        print!("{}", format_report(&file, &report));
    }

    if report.violations.is_empty() {
        Ok(())
    } else {
        Err(CliError::Violations {
            count: report.violations.len(),
            source_name: file.display().to_string(),
        })
    }
}

/// Human-readable rendering of a run report.
pub fn format_report(source: &Path, report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Stream:     {}", source.display());
    let _ = writeln!(out, "Policy:     {}", report.policy);
    let _ = writeln!(out, "Accepted:   {} event(s)", report.accepted);
    let _ = writeln!(out, "Run phase:  {}", report.phase);

    if let Some(transcript) = &report.transcript {
        let outcome = match &transcript.outcome {
            RunOutcome::Finished { outcome, .. } => format!("finished ({outcome})"),
            RunOutcome::Errored { message, code } => match code {
                Some(code) => format!("errored [{code}] {message}"),
                None => format!("errored {message}"),
            },
        };
        let _ = writeln!(out, "Run:        {} / {}", transcript.thread_id, transcript.run_id);
        let _ = writeln!(out, "Outcome:    {outcome}");
        let _ = writeln!(
            out,
            "Entities:   {} message(s), {} tool call(s), {} thinking block(s)",
            transcript.messages.len(),
            transcript.tool_calls.len(),
            transcript.thinking.len()
        );
    }

    if report.violations.is_empty() {
        let _ = writeln!(out, "Violations: none");
    } else {
        let _ = writeln!(out, "Violations: {}", report.violations.len());
        for violation in &report.violations {
            let event_type = violation
                .event_type
                .map(|t| t.as_str())
                .unwrap_or("-");
            let _ = writeln!(
                out,
                "  #{:<4} {:<24} {:<30} {}",
                violation.index, violation.code, event_type, violation.message
            );
        }
    }

    for warning in &report.warnings {
        let _ = writeln!(out, "Warning:    {warning}");
    }
    out
}
