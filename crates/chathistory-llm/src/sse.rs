//! Server-sent event decoding for OpenAI-style chat completion streams.

use serde::Deserialize;
use serde_json::Value;

use chathistory_core::backend::Fragment;
use chathistory_core::errors::BackendError;

/// Finish reasons after which the server sends nothing useful.
const TERMINAL_FINISH_REASONS: [&str; 2] = ["stop", "length"];

/// What one `data:` line contributed to the stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChunkEvent {
    /// Generated text. `finished` is set when the chunk also ended generation.
    Delta { fragment: Fragment, finished: bool },
    /// The `[DONE]` sentinel.
    Done,
}

/// Splits a byte stream into lines, keeping any incomplete tail for later.
///
/// Works on bytes so a multi-byte character split across network chunks is
/// decoded only once complete.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and return every line completed by them, without terminators.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, BackendError> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(decode_line(&line[..line.len() - 1])?);
        }
        Ok(lines)
    }

    /// The unterminated last line, if any.
    pub fn finish(&mut self) -> Result<Option<String>, BackendError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&rest).map(Some)
    }
}

fn decode_line(bytes: &[u8]) -> Result<String, BackendError> {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8(bytes.to_vec())
        .map_err(|e| BackendError::MalformedPayload(format!("invalid UTF-8 in stream: {e}")))
}

/// Interpret one SSE line.
///
/// Blank lines, comments such as `: keep-alive` and non-data fields yield
/// nothing. Chunks without choices (usage reports) yield nothing either.
pub fn parse_line(line: &str) -> Result<Option<ChunkEvent>, BackendError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }

    let Some(data) = line.strip_prefix("data:") else {
        if ["event:", "id:", "retry:"].iter().any(|f| line.starts_with(f)) {
            return Ok(None);
        }
        return Err(BackendError::MalformedPayload(format!("unexpected stream line: {line}")));
    };
    let data = data.trim_start();

    if data == "[DONE]" {
        return Ok(Some(ChunkEvent::Done));
    }

    let chunk: ChatChunk = serde_json::from_str(data)
        .map_err(|e| BackendError::MalformedPayload(format!("{e}: {data}")))?;

    if let Some(error) = chunk.error {
        return Err(BackendError::StreamInterrupted(error_message(&error)));
    }

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(None);
    };
    let finished = choice
        .finish_reason
        .as_deref()
        .is_some_and(|r| TERMINAL_FINISH_REASONS.contains(&r));

    Ok(Some(ChunkEvent::Delta {
        fragment: Fragment {
            content: choice.delta.content,
            aside: choice.delta.reasoning_content,
        },
        finished,
    }))
}

fn error_message(error: &Value) -> String {
    error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

// --- Deserialization types for chat completion chunks ---

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<Value>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    finish_reason: Option<String>,
}

#[derive(Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
    reasoning_content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(line: &str) -> (Fragment, bool) {
        match parse_line(line).unwrap() {
            Some(ChunkEvent::Delta { fragment, finished }) => (fragment, finished),
            other => panic!("expected delta, got {other:?}"),
        }
    }

    #[test]
    fn content_delta() {
        let (fragment, finished) =
            delta(r#"data: {"choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#);
        assert_eq!(fragment, Fragment::content("Hel"));
        assert!(!finished);
    }

    #[test]
    fn reasoning_delta_is_aside() {
        let (fragment, _) =
            delta(r#"data: {"choices":[{"delta":{"reasoning_content":"thinking"}}]}"#);
        assert_eq!(fragment, Fragment::aside("thinking"));
    }

    #[test]
    fn stop_and_length_finish_generation() {
        for reason in ["stop", "length"] {
            let line = format!(r#"data: {{"choices":[{{"delta":{{}},"finish_reason":"{reason}"}}]}}"#);
            let (fragment, finished) = delta(&line);
            assert!(finished, "{reason} should finish");
            assert_eq!(fragment, Fragment::default());
        }
        let (_, finished) = delta(r#"data: {"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#);
        assert!(!finished);
    }

    #[test]
    fn done_sentinel() {
        assert_eq!(parse_line("data: [DONE]").unwrap(), Some(ChunkEvent::Done));
        assert_eq!(parse_line("data:[DONE]").unwrap(), Some(ChunkEvent::Done));
    }

    #[test]
    fn ignorable_lines() {
        for line in ["", "   ", ": keep-alive", ":comment", "event: message", "id: 7", "retry: 100"] {
            assert_eq!(parse_line(line).unwrap(), None, "{line:?}");
        }
        assert_eq!(parse_line(r#"data: {"choices":[],"usage":{"total_tokens":3}}"#).unwrap(), None);
    }

    #[test]
    fn malformed_payloads() {
        assert!(matches!(parse_line("data: {not json"), Err(BackendError::MalformedPayload(_))));
        assert!(matches!(parse_line("hello"), Err(BackendError::MalformedPayload(_))));
    }

    #[test]
    fn in_band_error_interrupts() {
        let err = parse_line(r#"data: {"error":{"message":"model overloaded"}}"#).unwrap_err();
        assert!(matches!(err, BackendError::StreamInterrupted(msg) if msg == "model overloaded"));
    }

    #[test]
    fn line_decoder_splits_and_buffers() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.push(b"data: a\r\ndata: ").unwrap(), vec!["data: a"]);
        assert_eq!(decoder.push(b"b\n\n").unwrap(), vec!["data: b", ""]);
        assert_eq!(decoder.finish().unwrap(), None);
    }

    #[test]
    fn line_decoder_joins_split_utf8() {
        let bytes = "data: é\n".as_bytes();
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(&bytes[..7]).unwrap().is_empty());
        assert_eq!(decoder.push(&bytes[7..]).unwrap(), vec!["data: é"]);
    }

    #[test]
    fn line_decoder_returns_unterminated_tail() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"data: [DONE]").unwrap().is_empty());
        assert_eq!(decoder.finish().unwrap().as_deref(), Some("data: [DONE]"));
    }
}
