//! Loading recorded streams and running them through the sequencer.

use std::fs;
use std::io::Read;
use std::path::Path;

use agui_core::encoder::SseDecoder;
use agui_core::sequencer::{Accepted, Rejection, RunReport, Sequencer, ViolationPolicy};
use agui_core::Event;

use crate::cli::InputFormat;
use crate::error::Result;

/// The outcome of sequencing a whole recorded stream.
#[derive(Debug)]
pub struct Replay {
    /// Events a transport would carry, synthesized terminals included.
    pub forwarded: Vec<Event>,
    pub report: RunReport,
}

/// Picks the input format from the file extension when none was given.
pub fn detect_format(path: &Path, explicit: Option<InputFormat>) -> InputFormat {
    explicit.unwrap_or_else(|| match path.extension().and_then(|e| e.to_str()) {
        Some("sse") => InputFormat::Sse,
        _ => InputFormat::Jsonl,
    })
}

/// Reads a file (or stdin for `-`) into raw JSON event payloads.
pub fn read_records(path: &Path, format: Option<InputFormat>) -> Result<Vec<String>> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(path)?
    };
    Ok(split_records(&text, detect_format(path, format)))
}

/// Splits stream text into one payload per event.
pub fn split_records(text: &str, format: InputFormat) -> Vec<String> {
    match format {
        InputFormat::Jsonl => text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        InputFormat::Sse => {
            let mut decoder = SseDecoder::new();
            let mut records = decoder.feed_data(text);
            records.extend(decoder.finish_data());
            records
        }
    }
}

/// Validates raw payloads; undecodable ones count as violations.
pub fn sequence_records<I>(records: I, policy: ViolationPolicy) -> Replay
where
    I: IntoIterator<Item = String>,
{
    let mut sequencer = Sequencer::with_policy(policy);
    let mut forwarded = Vec::new();
    for record in records {
        forward(&mut forwarded, sequencer.push_json(&record));
    }
    finish(sequencer, forwarded)
}

/// Validates already decoded events.
pub fn sequence_events<I>(events: I, policy: ViolationPolicy) -> Replay
where
    I: IntoIterator<Item = Event>,
{
    let mut sequencer = Sequencer::with_policy(policy);
    let mut forwarded = Vec::new();
    for event in events {
        forward(&mut forwarded, sequencer.push(event));
    }
    finish(sequencer, forwarded)
}

/// Decodes payloads, dropping the ones that are not events.
pub fn decode_events(records: &[String]) -> Vec<Event> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| match Event::from_json(record) {
            Ok(event) => Some(event),
            Err(e) => {
                log::warn!("skipping record {index}: {e}");
                None
            }
        })
        .collect()
}

fn forward(forwarded: &mut Vec<Event>, outcome: std::result::Result<Accepted, Rejection>) {
    match outcome {
        Ok(accepted) => {
            for diagnostic in &accepted.diagnostics {
                log::info!("{diagnostic}");
            }
            forwarded.push(accepted.event);
        }
        Err(rejection) => forwarded.extend(rejection.terminal),
    }
}

fn finish(mut sequencer: Sequencer, mut forwarded: Vec<Event>) -> Replay {
    forwarded.extend(sequencer.finish());
    Replay {
        forwarded,
        report: sequencer.into_report(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const CLEAN: &str = r#"
{"type":"RUN_STARTED","threadId":"t1","runId":"r1"}
{"type":"TEXT_MESSAGE_START","messageId":"m1","role":"assistant"}
{"type":"TEXT_MESSAGE_CONTENT","messageId":"m1","delta":"Hi"}
{"type":"TEXT_MESSAGE_END","messageId":"m1"}
{"type":"RUN_FINISHED","threadId":"t1","runId":"r1"}
"#;

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(&PathBuf::from("a.sse"), None), InputFormat::Sse);
        assert_eq!(detect_format(&PathBuf::from("a.jsonl"), None), InputFormat::Jsonl);
        assert_eq!(
            detect_format(&PathBuf::from("a.jsonl"), Some(InputFormat::Sse)),
            InputFormat::Sse
        );
    }

    #[test]
    fn test_clean_jsonl_stream() {
        let records = split_records(CLEAN, InputFormat::Jsonl);
        assert_eq!(records.len(), 5);

        let replay = sequence_records(records, ViolationPolicy::Terminate);
        assert!(replay.report.is_clean());
        assert_eq!(replay.forwarded.len(), 5);
    }

    #[test]
    fn test_sse_records_match_jsonl() {
        let sse: String = CLEAN
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| format!("data: {l}\n\n"))
            .collect();
        assert_eq!(
            split_records(&sse, InputFormat::Sse),
            split_records(CLEAN, InputFormat::Jsonl)
        );
    }

    #[test]
    fn test_garbage_line_is_a_violation() {
        let mut records = split_records(CLEAN, InputFormat::Jsonl);
        records.insert(2, "{not json".to_string());

        let replay = sequence_records(records, ViolationPolicy::Reject);
        assert_eq!(replay.report.violations.len(), 1);
        assert_eq!(replay.report.violations[0].index, 2);
        assert_eq!(replay.report.violations[0].code, "MALFORMED_EVENT");
        assert_eq!(replay.forwarded.len(), 5);
    }

    #[test]
    fn test_truncated_stream_gets_terminal() {
        let records: Vec<String> = split_records(CLEAN, InputFormat::Jsonl)
            .into_iter()
            .take(3)
            .collect();
        let replay = sequence_records(records, ViolationPolicy::Terminate);
        let last = replay.forwarded.last().unwrap();
        assert_eq!(last.event_type().as_str(), "RUN_ERROR");
        assert_eq!(replay.report.violations[0].code, "STREAM_TERMINATED_EARLY");
    }

    #[test]
    fn test_decode_events_skips_garbage() {
        let records = vec![
            r#"{"type":"RUN_STARTED","threadId":"t","runId":"r"}"#.to_string(),
            "nope".to_string(),
        ];
        assert_eq!(decode_events(&records).len(), 1);
    }
}
