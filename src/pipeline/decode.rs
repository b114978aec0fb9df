//! Streaming decoder (text lines -> StreamEvent)
//!
//! Handles the SSE framing used by OpenAI-compatible servers: every relevant line is
//! `data: <json>`, and the stream ends with `data: [DONE]`.

use futures::{stream, StreamExt};
use std::collections::VecDeque;
use tracing::warn;

use crate::pipeline::event_map;
use crate::protocol::ChatCompletionChunk;
use crate::types::events::StreamEvent;
use crate::BoxStream;

/// Default SSE data field marker.
pub const DATA_PREFIX: &str = "data:";

/// Default end-of-stream sentinel payload.
pub const DONE_SIGNAL: &str = "[DONE]";

/// Incremental SSE line decoder for a single exchange.
///
/// - lines without the `data:` marker are ignored
/// - `[DONE]` yields [`StreamEvent::Done`] and ends decoding
/// - payloads that fail to parse are logged and skipped
#[derive(Debug, Clone)]
pub struct SseDecoder {
    prefix: String,
    done_signal: String,
    max_consecutive_malformed: Option<usize>,
    malformed_run: usize,
    finished: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self {
            prefix: DATA_PREFIX.to_string(),
            done_signal: DONE_SIGNAL.to_string(),
            max_consecutive_malformed: None,
            malformed_run: 0,
            finished: false,
        }
    }

    /// Give up with a [`StreamEvent::ProtocolError`] once more than `limit`
    /// consecutive payloads fail to parse. `None` keeps skipping forever.
    pub fn with_max_consecutive_malformed(mut self, limit: Option<usize>) -> Self {
        self.max_consecutive_malformed = limit;
        self
    }

    /// True once `[DONE]` or a protocol error has been decoded.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Decode one line. Returns the events it produced, in order.
    pub fn decode_line(&mut self, line: &str) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }

        let Some(payload) = self.payload(line) else {
            return Vec::new();
        };
        if payload.is_empty() {
            return Vec::new();
        }

        if payload == self.done_signal {
            self.finished = true;
            return vec![StreamEvent::Done];
        }

        match serde_json::from_str::<ChatCompletionChunk>(payload) {
            Ok(chunk) => {
                self.malformed_run = 0;
                let events = event_map::map_chunk(chunk);
                if events.iter().any(StreamEvent::is_terminal) {
                    self.finished = true;
                }
                events
            }
            Err(e) => {
                self.malformed_run += 1;
                warn!(
                    error = %e,
                    consecutive = self.malformed_run,
                    payload_len = payload.len(),
                    "skipping malformed stream chunk"
                );
                match self.max_consecutive_malformed {
                    Some(limit) if self.malformed_run > limit => {
                        self.finished = true;
                        vec![StreamEvent::ProtocolError {
                            message: format!(
                                "{} consecutive stream chunks could not be parsed",
                                self.malformed_run
                            ),
                        }]
                    }
                    _ => Vec::new(),
                }
            }
        }
    }

    fn payload<'a>(&self, line: &'a str) -> Option<&'a str> {
        let rest = line.strip_prefix(self.prefix.as_str())?;
        // SSE allows exactly one optional space after the colon.
        let rest = rest.strip_prefix(' ').unwrap_or(rest);
        Some(rest.trim_end())
    }

    /// Decode a line stream lazily. The returned stream ends right after the
    /// terminal event, and transport errors are passed through in place.
    pub fn decode_stream(self, lines: BoxStream<'static, String>) -> BoxStream<'static, StreamEvent> {
        let stream = stream::unfold(
            (self, lines, VecDeque::new()),
            |(mut decoder, mut lines, mut queue)| async move {
                loop {
                    if let Some(event) = queue.pop_front() {
                        return Some((Ok(event), (decoder, lines, queue)));
                    }
                    if decoder.is_finished() {
                        return None;
                    }
                    match lines.next().await {
                        Some(Ok(line)) => queue.extend(decoder.decode_line(&line)),
                        Some(Err(e)) => return Some((Err(e), (decoder, lines, queue))),
                        None => return None,
                    }
                }
            },
        );
        Box::pin(stream)
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}
