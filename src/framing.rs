//! Wire framing for `text/event-stream`.
//!
//! [`FrameDecoder`] is incremental: feed it arbitrary byte chunks as they
//! arrive off the transport and it yields completed events. Framing rules:
//!
//! - lines end with `\n`, `\r\n`, or a lone `\r`
//! - `field: value`, with one optional leading space stripped from the value
//! - lines starting with `:` are comments (keep-alives) and are skipped
//! - `data:` lines accumulate; multiple lines join with `\n`
//! - a blank line terminates the event; events without any `data:` line are
//!   not emitted
//! - `id:` and `retry:` are reconnection hints and are ignored here
//! - an event left unterminated when the stream ends is discarded

/// A completed wire event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventFrame {
    /// Event type; `None` means the default `message` type.
    pub event: Option<String>,

    /// Joined payload of the `data:` lines.
    pub data: String,
}

impl EventFrame {
    /// True when this frame would fire a plain `message` listener.
    pub fn is_message(&self) -> bool {
        matches!(self.event.as_deref(), None | Some("message"))
    }
}

/// Incremental event-stream decoder.
#[derive(Default)]
pub struct FrameDecoder {
    line: Vec<u8>,
    /// The previous byte was `\r`; a following `\n` belongs to it.
    pending_cr: bool,
    event: Option<String>,
    data: Vec<String>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of transport bytes, returning any events it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<EventFrame> {
        let mut out = Vec::new();
        for &byte in chunk {
            if self.pending_cr {
                self.pending_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\n' => self.end_line(&mut out),
                b'\r' => {
                    self.pending_cr = true;
                    self.end_line(&mut out);
                }
                _ => self.line.push(byte),
            }
        }
        out
    }

    fn end_line(&mut self, out: &mut Vec<EventFrame>) {
        let raw = std::mem::take(&mut self.line);
        let line = String::from_utf8_lossy(&raw);
        if let Some(frame) = self.feed_line(&line) {
            out.push(frame);
        }
    }

    fn feed_line(&mut self, line: &str) -> Option<EventFrame> {
        // Blank line: event boundary. The type buffer resets either way.
        if line.is_empty() {
            let event = self.event.take();
            if self.data.is_empty() {
                return None;
            }
            return Some(EventFrame {
                event,
                data: std::mem::take(&mut self.data).join("\n"),
            });
        }

        if line.starts_with(':') {
            return None;
        }

        let mut split = line.splitn(2, ':');
        let field = split.next().unwrap_or_default();
        let mut value = split.next().unwrap_or_default();
        if let Some(stripped) = value.strip_prefix(' ') {
            value = stripped;
        }

        match field {
            "event" => self.event = Some(value.to_owned()),
            "data" => self.data.push(value.to_owned()),
            "id" | "retry" => {}
            _ => {}
        }
        None
    }
}
