//! Incremental decoding of streamed response bodies into text fragments.
//!
//! Bodies starting with an SSE field (`data:`, `event:`, `id:`, `:`) are
//! decoded line by line; anything else is passed through as raw UTF-8 text.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Decoded {
    Text(String),
    Error(String),
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Sse,
    Raw,
}

#[derive(Debug, Default)]
pub(crate) struct BodyDecoder {
    buf: Vec<u8>,
    mode: Option<Mode>,
}

impl BodyDecoder {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<Decoded> {
        self.buf.extend_from_slice(chunk);

        let mode = match self.mode {
            Some(mode) => mode,
            None => match detect_mode(&self.buf) {
                Some(mode) => {
                    self.mode = Some(mode);
                    mode
                }
                None => return Vec::new(),
            },
        };

        match mode {
            Mode::Raw => self.drain_raw(false),
            Mode::Sse => self.drain_lines(),
        }
    }

    /// Flush whatever is left once the body ends.
    pub(crate) fn finish(&mut self) -> Vec<Decoded> {
        match self.mode.unwrap_or(Mode::Raw) {
            Mode::Raw => self.drain_raw(true),
            Mode::Sse => {
                let mut out = self.drain_lines();
                if !self.buf.is_empty() {
                    let line = String::from_utf8_lossy(&self.buf).to_string();
                    self.buf.clear();
                    out.extend(decode_line(&line));
                }
                out
            }
        }
    }

    fn drain_raw(&mut self, at_end: bool) -> Vec<Decoded> {
        let valid = match std::str::from_utf8(&self.buf) {
            Ok(_) => self.buf.len(),
            // Keep an incomplete multi-byte sequence for the next chunk.
            Err(e) if e.error_len().is_none() && !at_end => e.valid_up_to(),
            Err(_) => {
                let text = String::from_utf8_lossy(&self.buf).to_string();
                self.buf.clear();
                return non_empty(text);
            }
        };
        let rest = self.buf.split_off(valid);
        let text = String::from_utf8_lossy(&self.buf).to_string();
        self.buf = rest;
        non_empty(text)
    }

    fn drain_lines(&mut self) -> Vec<Decoded> {
        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            out.extend(decode_line(line.trim_end_matches(['\r', '\n'])));
        }
        out
    }
}

fn non_empty(text: String) -> Vec<Decoded> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![Decoded::Text(text)]
    }
}

fn detect_mode(buf: &[u8]) -> Option<Mode> {
    let start = buf.iter().position(|b| !b.is_ascii_whitespace())?;
    let head = &buf[start..];
    const SSE_PREFIXES: [&[u8]; 4] = [b"data:", b"event:", b"id:", b":"];
    if SSE_PREFIXES.iter().any(|p| head.starts_with(p)) {
        return Some(Mode::Sse);
    }
    // Too short to rule out a split "data:" prefix.
    if head.len() < 6 && SSE_PREFIXES.iter().any(|p| p.starts_with(head)) {
        return None;
    }
    Some(Mode::Raw)
}

fn decode_line(line: &str) -> Option<Decoded> {
    let payload = line.strip_prefix("data:")?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    if payload.trim() == "[DONE]" {
        return Some(Decoded::Done);
    }
    // Only objects and strings are structured chunks; a scalar like `42` is text.
    match serde_json::from_str::<Value>(payload) {
        Ok(v) if v.is_object() || v.is_string() => {
            if let Some(msg) = extract_error(&v) {
                return Some(Decoded::Error(msg));
            }
            extract_delta(&v)
                .filter(|s| !s.is_empty())
                .map(Decoded::Text)
        }
        _ if payload.is_empty() => None,
        _ => Some(Decoded::Text(payload.to_string())),
    }
}

fn extract_error(v: &Value) -> Option<String> {
    let err = v.get("error")?;
    err.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| err.as_str().map(str::to_string))
        .or_else(|| Some(err.to_string()))
}

fn extract_delta(v: &Value) -> Option<String> {
    if let Some(s) = v.as_str() {
        return Some(s.to_string());
    }
    if let Some(s) = v.get("text").and_then(Value::as_str) {
        return Some(s.to_string());
    }
    if let Some(delta) = v.get("delta") {
        if let Some(s) = delta.as_str() {
            return Some(s.to_string());
        }
        if let Some(s) = delta.get("text").and_then(Value::as_str) {
            return Some(s.to_string());
        }
    }
    // OpenAI-ish: { choices: [ { delta: { content: "..." } } ] }
    let choice = v.get("choices").and_then(|c| c.get(0))?;
    choice
        .get("delta")
        .and_then(|d| d.get("content"))
        .or_else(|| choice.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Pull the text out of a single-shot response body.
pub(crate) fn extract_textish(v: &Value) -> Option<String> {
    for key in ["text", "output", "stdout"] {
        if let Some(s) = v.get(key).and_then(Value::as_str) {
            return Some(s.to_string());
        }
    }
    // OpenAI-ish: { choices: [ { message: { content: "..." } } ] }
    v.get("choices")
        .and_then(|x| x.get(0))
        .and_then(|x| x.get("message"))
        .and_then(|x| x.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(items: Vec<Decoded>) -> Vec<String> {
        items
            .into_iter()
            .filter_map(|d| match d {
                Decoded::Text(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn sse_lines_split_across_chunks() {
        let mut dec = BodyDecoder::default();
        let mut out = dec.push(b"data: {\"text\": \"Hel");
        out.extend(dec.push(b"lo\"}\n\nevent: ping\ndata: {\"delta\": {\"text\": \" world\"}}\n"));
        out.extend(dec.push(b"data: [DONE]\n"));
        out.extend(dec.finish());
        assert_eq!(
            out,
            vec![
                Decoded::Text("Hello".to_string()),
                Decoded::Text(" world".to_string()),
                Decoded::Done,
            ]
        );
    }

    #[test]
    fn openai_style_chunks() {
        let mut dec = BodyDecoder::default();
        let out = dec.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n");
        assert_eq!(texts(out), vec!["hi"]);
    }

    #[test]
    fn json_scalars_in_raw_data_lines_stay_text() {
        let mut dec = BodyDecoder::default();
        let out = dec.push(b"data: The answer is \ndata: 42\ndata: true\ndata: null\ndata: !\n");
        assert_eq!(texts(out).concat(), "The answer is 42truenull!");
    }

    #[test]
    fn error_payload_is_surfaced() {
        let mut dec = BodyDecoder::default();
        let out = dec.push(b"data: {\"error\": {\"message\": \"503 overloaded\"}}\n");
        assert_eq!(out, vec![Decoded::Error("503 overloaded".to_string())]);
    }

    #[test]
    fn raw_body_passes_through_and_keeps_split_utf8() {
        let mut dec = BodyDecoder::default();
        let bytes = "plain é text".as_bytes();
        // Split inside the two-byte 'é'.
        let cut = bytes.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let mut out = dec.push(&bytes[..cut]);
        out.extend(dec.push(&bytes[cut..]));
        out.extend(dec.finish());
        assert_eq!(texts(out).concat(), "plain é text");
    }

    #[test]
    fn short_prefix_waits_for_more_bytes() {
        let mut dec = BodyDecoder::default();
        assert!(dec.push(b"da").is_empty());
        let out = dec.push(b"ta: chunk\n");
        assert_eq!(texts(out), vec!["chunk"]);
    }

    #[test]
    fn trailing_line_without_newline_is_flushed() {
        let mut dec = BodyDecoder::default();
        assert!(dec.push(b"data: {\"text\": \"end\"}").is_empty());
        assert_eq!(texts(dec.finish()), vec!["end"]);
    }

    #[test]
    fn textish_extraction() {
        let v: Value = serde_json::json!({"choices": [{"message": {"content": "x"}}]});
        assert_eq!(extract_textish(&v).as_deref(), Some("x"));
        let v: Value = serde_json::json!({"text": "y"});
        assert_eq!(extract_textish(&v).as_deref(), Some("y"));
        assert!(extract_textish(&serde_json::json!({"n": 1})).is_none());
    }
}
