//! Server-Sent Events (SSE) parsing.
//!
//! OpenAI-compatible servers stream chat completions as SSE `data:` lines.
//! The parser works on any `AsyncBufRead`, so a reqwest body and an
//! in-memory byte slice go through the same code.

use futures_util::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::io::StreamReader;

use crate::AiError;

/// A single SSE event parsed from the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// What the event handler wants the parser to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Parse an SSE stream from a reqwest response.
pub async fn parse_sse_stream(
    response: reqwest::Response,
    on_event: impl FnMut(SseEvent) -> Flow,
) -> Result<(), AiError> {
    let byte_stream = response
        .bytes_stream()
        .map(|result| result.map_err(std::io::Error::other));
    let reader = tokio::io::BufReader::new(StreamReader::new(byte_stream));
    parse_sse_reader(reader, on_event).await
}

/// Parse SSE events from a buffered reader until EOF or [`Flow::Stop`].
pub async fn parse_sse_reader<R>(
    reader: R,
    mut on_event: impl FnMut(SseEvent) -> Flow,
) -> Result<(), AiError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut current_event: Option<String> = None;
    let mut current_data = String::new();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| AiError::NetworkError(e.to_string()))?
    {
        let line = line.strip_suffix('\r').unwrap_or(&line);
        if line.is_empty() {
            if !current_data.is_empty() {
                let event = SseEvent {
                    event: current_event.take(),
                    data: std::mem::take(&mut current_data),
                };
                if on_event(event) == Flow::Stop {
                    return Ok(());
                }
            }
            current_event = None;
            continue;
        }

        if let Some(event_type) = field(line, "event") {
            current_event = Some(event_type.to_string());
        } else if let Some(data) = field(line, "data") {
            if !current_data.is_empty() {
                current_data.push('\n');
            }
            current_data.push_str(data);
        }
        // id:, retry:, and ":" comments are ignored
    }

    if !current_data.is_empty() {
        on_event(SseEvent {
            event: current_event,
            data: current_data,
        });
    }
    Ok(())
}

/// `name: value` or `name:value`.
fn field<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}
