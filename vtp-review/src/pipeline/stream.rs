//! Line-oriented decoding of streamed stage output

use crate::pipeline::events::StageEvent;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static PERCENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,3})%").expect("percent pattern is a valid regex"));

/// Splits a byte stream into lines
///
/// Bytes are buffered until a `\n` arrives, so lines and multi-byte UTF-8
/// sequences split across chunks decode intact. Invalid UTF-8 is replaced
/// rather than rejected.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the complete, non-blank lines it finished
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut consumed = 0;
        while let Some(pos) = self.buf[consumed..].iter().position(|b| *b == b'\n') {
            let end = consumed + pos;
            if let Some(line) = decode_line(&self.buf[consumed..end]) {
                lines.push(line);
            }
            consumed = end + 1;
        }
        self.buf.drain(..consumed);
        lines
    }

    /// Flush a trailing line that never got its terminator
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        decode_line(&rest)
    }

    /// Bytes waiting for a terminator
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}

fn decode_line(bytes: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(bytes);
    let line = line.trim();
    (!line.is_empty()).then(|| line.to_string())
}

/// Decode one line into an event
///
/// Malformed JSON and unknown event types are skipped.
pub fn parse_line(line: &str) -> Option<StageEvent> {
    match serde_json::from_str::<StageEvent>(line) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!(error = %e, line, "Skipping undecodable stream line");
            None
        }
    }
}

/// Percentage carried by a log line
///
/// Only the first `NN%` counts; a first match above 100 means no progress.
pub fn parse_progress(line: &str) -> Option<u8> {
    let value = PERCENT.captures(line)?.get(1)?.as_str().parse::<u16>().ok()?;
    u8::try_from(value).ok().filter(|v| *v <= 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_split_across_chunks() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"{\"type\":\"log\",").is_empty());
        let lines = decoder.push(b"\"line\":\"a\"}\n{\"type\"");
        assert_eq!(lines, vec![r#"{"type":"log","line":"a"}"#]);
        assert!(decoder.pending_len() > 0);
        assert_eq!(decoder.push(b":\"x\"}\n\n"), vec![r#"{"type":"x"}"#]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let text = "caf\u{e9} 45%\n".as_bytes();
        let split = text.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(&text[..split]).is_empty());
        assert_eq!(decoder.push(&text[split..]), vec!["caf\u{e9} 45%"]);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = LineDecoder::new();
        decoder.push(b"  tail  ");
        assert_eq!(decoder.finish().as_deref(), Some("tail"));
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_parse_line_skips_garbage() {
        assert!(parse_line("not json").is_none());
        assert!(parse_line(r#"{"type":"mystery"}"#).is_none());
        assert_eq!(
            parse_line(r#"{"type":"log","line":"hi"}"#),
            Some(StageEvent::Log { line: "hi".to_string() })
        );
    }

    #[test]
    fn test_parse_progress() {
        assert_eq!(parse_progress("denoise 45% done"), Some(45));
        assert_eq!(parse_progress("100%"), Some(100));
        assert_eq!(parse_progress("0%|          |"), Some(0));
        assert_eq!(parse_progress("no percentage"), None);
    }

    #[test]
    fn test_only_first_percentage_counts() {
        assert_eq!(parse_progress("pass 2 at 30%, eta 90%"), Some(30));
        assert_eq!(parse_progress("450% then 30%"), None);
    }
}
