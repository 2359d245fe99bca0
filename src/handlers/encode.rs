use std::fs;
use std::io::Write;
use std::path::PathBuf;

use agui_core::encoder::{EventEncoder, MessageEncoder, SseEncoder};
use agui_core::sequencer::ViolationPolicy;
use agui_core::Event;

use crate::cli::{InputFormat, Transport};
use crate::error::Result;
use crate::replay::{read_records, sequence_records};

/// Validates a stream and writes the forwarded events in transport framing.
///
/// - `sse`: `data: <json>` records separated by blank lines.
/// - `ws`: one JSON message per line, or with `binary`, each message as a
///   4-byte big-endian length followed by its UTF-8 bytes.
pub fn handle_encode(
    file: PathBuf,
    format: Option<InputFormat>,
    transport: Transport,
    binary: bool,
    output: Option<PathBuf>,
    policy: ViolationPolicy,
) -> Result<()> {
    let replay = sequence_records(read_records(&file, format)?, policy);
    if !replay.report.violations.is_empty() {
        log::warn!(
            "{} violation(s) in {}; encoding the validated stream only",
            replay.report.violations.len(),
            file.display()
        );
    }

    let bytes = encode_stream(&replay.forwarded, transport, binary)?;
    match output {
        Some(path) => {
            fs::write(&path, &bytes)?;
            log::info!(
                "wrote {} frame(s) to {}",
                replay.forwarded.len(),
                path.display()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// Frames every event for the chosen transport.
pub fn encode_stream(events: &[Event], transport: Transport, binary: bool) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for event in events {
        match (transport, binary) {
            (Transport::Sse, _) => out.extend(SseEncoder.encode(event)?.into_bytes()),
            (Transport::Ws, false) => {
                out.extend(MessageEncoder.encode(event)?.into_bytes());
                out.push(b'\n');
            }
            (Transport::Ws, true) => {
                let frame = MessageEncoder.encode_binary(event)?;
                let len = u32::try_from(frame.len()).map_err(|_| {
                    std::io::Error::new(std::io::ErrorKind::InvalidData, "frame exceeds 4 GiB")
                })?;
                out.extend(len.to_be_bytes());
                out.extend(frame);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agui_core::{RunErrorEvent, RunStartedEvent};

    fn events() -> Vec<Event> {
        vec![
            RunStartedEvent::new("t1", "r1").into(),
            RunErrorEvent::new("boom").into(),
        ]
    }

    #[test]
    fn test_sse_framing() {
        let bytes = encode_stream(&events(), Transport::Sse, false).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            "data: {\"type\":\"RUN_STARTED\",\"threadId\":\"t1\",\"runId\":\"r1\"}\n\n\
             data: {\"type\":\"RUN_ERROR\",\"message\":\"boom\"}\n\n"
        );
    }

    #[test]
    fn test_ws_text_framing() {
        let bytes = encode_stream(&events(), Transport::Ws, false).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], r#"{"type":"RUN_ERROR","message":"boom"}"#);
    }

    #[test]
    fn test_ws_binary_framing_is_length_prefixed() {
        let bytes = encode_stream(&events(), Transport::Ws, true).unwrap();
        let first_len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let first = &bytes[4..4 + first_len];
        assert_eq!(first, MessageEncoder.encode_binary(&events()[0]).unwrap().as_slice());

        let rest = &bytes[4 + first_len..];
        let second_len = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        assert_eq!(rest.len(), 4 + second_len);
    }
}
