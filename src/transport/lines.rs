//! Byte stream to line stream framing.

use bytes::Bytes;
use futures::{stream, Stream, StreamExt};
use std::time::Duration;
use tokio::time::timeout;

use crate::{BoxStream, Error, ErrorContext, Result};

/// Longest line accepted before the stream is failed.
pub const MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// Split a body into `\n`-terminated lines.
///
/// A trailing `\r` is stripped. Bytes are buffered until the newline arrives, so a
/// multi-byte character split across two chunks comes out whole. An unterminated
/// last line is emitted at end of input. The first read error ends the stream.
pub fn into_lines<S>(bytes: S) -> BoxStream<'static, String>
where
    S: Stream<Item = Result<Bytes>> + Send + 'static,
{
    into_lines_with_limit(bytes, MAX_LINE_BYTES)
}

/// [`into_lines`] with an explicit line length cap.
///
/// A line growing past `max_line_bytes` without a newline ends the stream with an
/// error.
pub fn into_lines_with_limit<S>(bytes: S, max_line_bytes: usize) -> BoxStream<'static, String>
where
    S: Stream<Item = Result<Bytes>> + Send + 'static,
{
    // `scanned`: prefix of `buf` already known to hold no newline.
    let stream = stream::unfold(
        (Box::pin(bytes), Vec::<u8>::new(), 0usize, false),
        move |(mut bytes, mut buf, mut scanned, mut eof)| async move {
            loop {
                if let Some(rel) = buf[scanned..].iter().position(|b| *b == b'\n') {
                    let mut line: Vec<u8> = buf.drain(..=scanned + rel).collect();
                    line.pop();
                    return Some((Ok(decode(line)), (bytes, buf, 0, eof)));
                }
                scanned = buf.len();
                if buf.len() > max_line_bytes {
                    buf.clear();
                    return Some((Err(line_too_long(max_line_bytes)), (bytes, buf, 0, true)));
                }
                if eof {
                    if buf.is_empty() {
                        return None;
                    }
                    let line = std::mem::take(&mut buf);
                    return Some((Ok(decode(line)), (bytes, buf, 0, eof)));
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => buf.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        buf.clear();
                        return Some((Err(e), (bytes, buf, 0, true)));
                    }
                    None => eof = true,
                }
            }
        },
    );
    Box::pin(stream)
}

/// Fail the stream with [`Error::Timeout`] when no line arrives within `per_read`.
///
/// Every line counts, including SSE comments and blank keep-alives, so a quiet but
/// live connection is not cut off.
pub fn with_read_timeout(
    lines: BoxStream<'static, String>,
    per_read: Duration,
) -> BoxStream<'static, String> {
    let stream = stream::unfold((lines, false), move |(mut lines, failed)| async move {
        if failed {
            return None;
        }
        match timeout(per_read, lines.next()).await {
            Ok(Some(item)) => Some((item, (lines, false))),
            Ok(None) => None,
            Err(_) => Some((
                Err(Error::Timeout {
                    after_ms: per_read.as_millis() as u64,
                }),
                (lines, true),
            )),
        }
    });
    Box::pin(stream)
}

fn line_too_long(max_line_bytes: usize) -> Error {
    Error::runtime_with_context(
        "stream line too long",
        ErrorContext::new()
            .with_details(format!("no newline within {} bytes", max_line_bytes))
            .with_source("line_framing"),
    )
}

fn decode(mut line: Vec<u8>) -> String {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    String::from_utf8(line).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}
