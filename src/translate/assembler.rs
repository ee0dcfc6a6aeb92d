//! Incremental assembly of a streamed chat completion.
//!
//! [`SseAssembler`] is fed raw body chunks exactly as they come off the wire and
//! accumulates the `choices[0].delta.content` fragments of every `data:` event.
//! Chunk boundaries can fall anywhere, including inside a line or inside a
//! multi-byte UTF-8 sequence; the result is the same as feeding the whole body
//! at once.
//!
//! Usage:
//!   let mut assembler = SseAssembler::new();
//!   for chunk in body_chunks {
//!       assembler.push(&chunk);
//!   }
//!   let text = assembler.finish();

use serde_json::Value;

const DATA_PREFIX: &str = "data: ";
const DONE_LINE: &str = "data: [DONE]";

#[derive(Debug, Default)]
pub struct SseAssembler {
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
    /// Decoded text after the last newline.
    line_buffer: String,
    text: String,
    events: usize,
    skipped: usize,
    saw_done: bool,
}

impl SseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one body chunk.
    pub fn push(&mut self, chunk: &[u8]) {
        self.decode(chunk);

        let Some(last_newline) = self.line_buffer.rfind('\n') else {
            return;
        };
        let rest = self.line_buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.line_buffer, rest);
        for line in complete.split('\n') {
            self.process_line(line);
        }
    }

    /// Text assembled so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of `data:` events seen, not counting `[DONE]`.
    pub fn events(&self) -> usize {
        self.events
    }

    /// Number of `data:` lines dropped because they were not valid JSON.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn saw_done(&self) -> bool {
        self.saw_done
    }

    /// End of input. An unterminated last line is dropped unprocessed.
    pub fn finish(self) -> String {
        if !self.line_buffer.trim().is_empty() || !self.pending.is_empty() {
            tracing::debug!(
                leftover = self.line_buffer.len() + self.pending.len(),
                "Discarding unterminated trailing line"
            );
        }
        self.text
    }

    fn decode(&mut self, chunk: &[u8]) {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(chunk);

        let mut start = 0;
        while start < input.len() {
            match std::str::from_utf8(&input[start..]) {
                Ok(valid) => {
                    self.line_buffer.push_str(valid);
                    return;
                }
                Err(e) => {
                    let valid_end = start + e.valid_up_to();
                    self.line_buffer
                        .push_str(&String::from_utf8_lossy(&input[start..valid_end]));
                    match e.error_len() {
                        Some(bad) => {
                            self.line_buffer.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + bad;
                        }
                        None => {
                            // Sequence continues in the next chunk
                            self.pending = input[valid_end..].to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }

    fn process_line(&mut self, line: &str) {
        let line = line.trim();
        let Some(data) = line.strip_prefix(DATA_PREFIX) else {
            return;
        };
        if line == DONE_LINE {
            self.saw_done = true;
            return;
        }

        self.events += 1;
        match serde_json::from_str::<Value>(data) {
            Ok(chunk) => {
                if let Some(text) = delta_text(&chunk) {
                    self.text.push_str(text);
                }
            }
            Err(e) => {
                self.skipped += 1;
                tracing::trace!(error = %e, "Skipping unparseable event");
            }
        }
    }
}

/// `choices[0].delta.content` when it is a string. The rest of the event is
/// not looked at.
fn delta_text(chunk: &Value) -> Option<&str> {
    chunk
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
}
