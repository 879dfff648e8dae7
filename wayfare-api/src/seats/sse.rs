//! Incremental `text/event-stream` decoding.

/// One dispatched server-sent event
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
    pub retry: Option<u64>,
}

/// Turns arbitrary byte chunks into events. Chunks may split lines and
/// multi-byte characters anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    data: Vec<String>,
    event: Option<String>,
    last_id: Option<String>,
    retry: Option<u64>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
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

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
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
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse() {
                    self.retry = Some(ms);
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        Some(SseEvent {
            event,
            data: std::mem::take(&mut self.data).join("\n"),
            id: self.last_id.clone(),
            retry: self.retry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: {\"a\":1}\n\n");
        assert_eq!(events, vec![SseEvent { data: "{\"a\":1}".into(), ..Default::default() }]);
    }

    #[test]
    fn test_split_chunks_and_crlf() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: seat\r\nda").is_empty());
        assert!(decoder.feed(b"ta: hel").is_empty());
        let events = decoder.feed(b"lo\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("seat"));
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn test_multiline_data_comments_and_fields() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b": keep-alive\nid: 7\nretry: 3000\ndata: one\ndata:two\n\ndata: three\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "one\ntwo");
        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(events[0].retry, Some(3000));
        // Last event id carries over
        assert_eq!(events[1].id.as_deref(), Some("7"));
    }

    #[test]
    fn test_blank_lines_without_data_dispatch_nothing() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: ping\n\n\n").is_empty());
        // The event name does not leak into the next event
        let events = decoder.feed(b"data: x\n\n");
        assert_eq!(events[0].event, None);
    }

    #[test]
    fn test_multibyte_split() {
        let mut decoder = SseDecoder::new();
        let bytes = "data: caf\u{e9}\n\n".as_bytes();
        let (head, tail) = bytes.split_at(bytes.len() - 3);
        assert!(decoder.feed(head).is_empty());
        assert_eq!(decoder.feed(tail)[0].data, "caf\u{e9}");
    }
}
