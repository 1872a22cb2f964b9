//! Incremental Server-Sent-Events decoder.
//!
//! Bytes arrive in arbitrary chunks; complete lines are drained from the
//! buffer and folded into events. Only the `data` field matters here, so
//! `event`, `id`, `retry` and comment lines are ignored.

#[derive(Debug, Default)]
pub struct SseDecoder {
    line_buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes. Returns the data payloads of every event
    /// completed by this chunk, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.line_buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(newline_index) = self.line_buffer.iter().position(|byte| *byte == b'\n') {
            let mut line = self.line_buffer.drain(..=newline_index).collect::<Vec<_>>();
            line.pop();
            if matches!(line.last(), Some(b'\r')) {
                line.pop();
            }
            if let Some(event) = self.accept_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }
        events
    }

    /// Flush at end of stream: a trailing unterminated line and any pending
    /// data lines form one last event.
    pub fn finish(&mut self) -> Option<String> {
        if !self.line_buffer.is_empty() {
            let line = std::mem::take(&mut self.line_buffer);
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.accept_line(line.trim_end_matches('\r')) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn accept_line(&mut self, line: &str) -> Option<String> {
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
        if field == "data" {
            self.data.push(value.to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.data).join("\n"))
    }
}

#[cfg(test)]
#[path = "sse_test.rs"]
mod tests;
