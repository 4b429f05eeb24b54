//! Incremental decoder for `text/event-stream` bodies.

use crate::errors::AdapterError;

/// Longest line the decoder buffers before giving up on the stream.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// One dispatched server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

/// Splits a byte stream into [`SseFrame`]s.
///
/// Chunks may end anywhere, including inside a line or a UTF-8 sequence.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    max_line: usize,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line,
            event: None,
            data: Vec::new(),
            id: None,
        }
    }

    /// Feeds one network chunk and returns every frame it completed.
    ///
    /// # Errors
    /// Fails once a line grows past the configured limit without a newline.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>, AdapterError> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&byte| byte == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let text = String::from_utf8_lossy(&raw[..newline]);
            let line = text.strip_suffix('\r').unwrap_or(&text);
            if let Some(frame) = self.process_line(line) {
                frames.push(frame);
            }
        }

        if self.buffer.len() > self.max_line {
            let buffered = self.buffer.len();
            self.buffer.clear();
            return Err(AdapterError::Decode(format!(
                "event stream line exceeds {} bytes ({buffered} buffered)",
                self.max_line
            )));
        }
        Ok(frames)
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        let id = self.id.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data, id })
    }
}
