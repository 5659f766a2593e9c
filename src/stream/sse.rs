//! Incremental SSE wire-format parser
//!
//! Transport chunks carry arbitrary fragments of the event stream, so the
//! parser buffers partial lines across [`SseParser::feed`] calls and emits
//! only fully-dispatched events (terminated by a blank line).

/// Default event name when the stream omits an `event:` field
const DEFAULT_EVENT: &str = "message";

/// A single dispatched server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name (`connected`, `heartbeat`, `audio`, ...)
    pub name: String,
    /// Event payload; multiple `data:` lines are joined with `\n`
    pub data: String,
}

/// Incremental parser for the SSE wire format
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event_name: Option<String>,
    data_lines: Vec<String>,
}

impl SseParser {
    /// Create a parser with empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a transport chunk, returning every event completed by it
    ///
    /// Buffering is byte-level; decoding happens per complete line, so a
    /// multi-byte character split across chunk boundaries stays intact.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Handle one complete line; a blank line dispatches the pending event
    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Comment lines keep the connection alive but carry no data
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event_name = Some(value.to_string()),
            "data" => self.data_lines.push(value.to_string()),
            // `id` and `retry` are legal fields the player has no use for
            _ => {}
        }
        None
    }

    /// Emit the buffered event, if any field was seen since the last dispatch
    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.event_name.is_none() && self.data_lines.is_empty() {
            return None;
        }

        let name = self
            .event_name
            .take()
            .unwrap_or_else(|| DEFAULT_EVENT.to_string());
        let data = std::mem::take(&mut self.data_lines).join("\n");
        Some(SseEvent { name, data })
    }
}
