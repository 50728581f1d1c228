//! Server-Sent Events parser for streamed MCP responses.
//!
//! Lines can span several network chunks, and so can multi-byte UTF-8
//! sequences, so raw bytes are buffered until a full line is available.

use std::fmt;

/// One dispatched SSE event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    /// `event:` field, if any
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
    pub id: Option<String>,
    /// Reconnection delay in milliseconds
    pub retry: Option<u64>,
}

impl SseEvent {
    /// Whether this event carries a JSON-RPC message. Untyped events default
    /// to `message`.
    pub fn is_message(&self) -> bool {
        matches!(self.event.as_deref(), None | Some("message"))
    }
}

/// Fields collected since the last blank line.
#[derive(Debug, Default)]
struct Pending {
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
    retry: Option<u64>,
}

impl Pending {
    /// Consume the pending fields. Events without data are dropped.
    fn dispatch(&mut self) -> Option<SseEvent> {
        let pending = std::mem::take(self);
        if pending.data.is_empty() {
            return None;
        }
        Some(SseEvent {
            event: pending.event,
            data: pending.data.join("\n"),
            id: pending.id,
            retry: pending.retry,
        })
    }
}

/// Incremental SSE parser.
#[derive(Default)]
pub struct SseParser {
    /// Bytes not yet terminated by a newline
    buffer: Vec<u8>,
    pending: Pending,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the events it completes.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut dispatched = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let text = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            let text = text.strip_suffix('\r').unwrap_or(&text);

            if text.is_empty() {
                dispatched.extend(self.pending.dispatch());
            } else {
                self.apply_line(text);
            }
        }

        dispatched
    }

    /// Flush the pending event at end of stream, even without a trailing
    /// blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        let text = String::from_utf8_lossy(&rest);
        let text = text.strip_suffix('\r').unwrap_or(&text);
        if !text.is_empty() {
            self.apply_line(text);
        }
        self.pending.dispatch()
    }

    fn apply_line(&mut self, line: &str) {
        let (field, value) = match line.split_once(':') {
            // Comment
            Some(("", _)) => return,
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.pending.event = Some(value.to_string()),
            "data" => self.pending.data.push(value.to_string()),
            "id" => self.pending.id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse() {
                    self.pending.retry = Some(ms);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Debug for SseParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SseParser")
            .field("buffered", &self.buffer.len())
            .field("pending", &self.pending)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jsonrpc_message_event() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1}\n\n");

        assert_eq!(events.len(), 1);
        assert!(events[0].is_message());
        assert_eq!(events[0].data, r#"{"jsonrpc":"2.0","id":1}"#);
    }

    #[test]
    fn test_event_types() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: {}\n\nevent: endpoint\ndata: /messages\n\n");

        assert_eq!(events.len(), 2);
        assert!(events[0].is_message());
        assert_eq!(events[1].event.as_deref(), Some("endpoint"));
        assert!(!events[1].is_message());
    }

    #[test]
    fn test_data_lines_are_joined() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: {\"a\":\ndata: 1}\n\n");

        assert_eq!(events[0].data, "{\"a\":\n1}");
        assert!(serde_json::from_str::<serde_json::Value>(&events[0].data).is_ok());
    }

    #[test]
    fn test_event_spanning_chunks() {
        let mut parser = SseParser::new();

        assert!(parser.feed(b"data: {\"result\":").is_empty());
        assert!(parser.feed(b" {}}\n").is_empty());
        let events = parser.feed(b"\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, r#"{"result": {}}"#);
    }

    #[test]
    fn test_utf8_split_between_chunks() {
        let mut parser = SseParser::new();
        let bytes = "data: Nestlé\n\n".as_bytes();
        // Cut inside the two-byte 'é'
        let cut = bytes.len() - 3;

        assert!(parser.feed(&bytes[..cut]).is_empty());
        assert_eq!(parser.feed(&bytes[cut..])[0].data, "Nestlé");
    }

    #[test]
    fn test_keepalive_comment_and_crlf() {
        let mut parser = SseParser::new();
        let events = parser.feed(b": ping\r\n\r\ndata: ok\r\n\r\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "ok");
    }

    #[test]
    fn test_id_and_retry_fields() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"id: evt-7\nretry: 2500\nretry: soon\ndata: x\n\n");

        assert_eq!(events[0].id.as_deref(), Some("evt-7"));
        assert_eq!(events[0].retry, Some(2500));
    }

    #[test]
    fn test_fields_without_data_are_discarded() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"event: message\nid: 4\n\n").is_empty());

        // The discarded id must not leak into the next event
        let events = parser.feed(b"data: next\n\n");
        assert_eq!(events[0].id, None);
        assert_eq!(events[0].event, None);
    }

    #[test]
    fn test_finish_flushes_unterminated_event() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data: tail").is_empty());

        let event = parser.finish().unwrap();
        assert_eq!(event.data, "tail");
        assert!(parser.finish().is_none());
    }
}
