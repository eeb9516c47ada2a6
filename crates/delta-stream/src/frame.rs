//! Line framing for `data: <json>` event streams.
//!
//! Bytes are buffered until a `\n` arrives and only complete lines are
//! decoded, so a UTF-8 sequence or a record split across reads is rebuilt
//! before it is looked at.

use std::collections::VecDeque;

use futures::{Stream, StreamExt as _, stream};

use crate::errors::TransportError;
use crate::transport::ByteStream;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// One complete, non-empty line of the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Payload with the framing prefix removed and whitespace trimmed.
    Data(String),
    /// The `[DONE]` terminator.
    Done,
}

/// Incremental decoder from raw chunks to `Record`s. One instance per stream.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    /// Prefix of `buf` already known to hold no `\n`.
    scanned: usize,
    done: bool,
}

impl FrameDecoder {
    /// Feeds one chunk and returns the records completed by it.
    ///
    /// Once `Record::Done` has been returned every later byte is discarded.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<Record> {
        if self.done {
            return Vec::new();
        }
        self.buf.extend_from_slice(chunk);

        let mut records = Vec::new();
        let mut line_start = 0;
        let mut search_from = self.scanned;
        while let Some(pos) = self.buf[search_from..].iter().position(|b| *b == b'\n') {
            let line_end = search_from + pos;
            let record = parse_line(&String::from_utf8_lossy(&self.buf[line_start..line_end]));
            line_start = line_end + 1;
            search_from = line_start;

            if let Some(record) = record {
                let done = record == Record::Done;
                records.push(record);
                if done {
                    self.done = true;
                    self.buf.clear();
                    self.scanned = 0;
                    return records;
                }
            }
        }

        self.buf.drain(..line_start);
        self.scanned = self.buf.len();
        records
    }

    /// Flushes a trailing line that never received its newline.
    ///
    /// Call once the transport has ended.
    pub fn finish(&mut self) -> Option<Record> {
        if self.done || self.buf.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buf);
        self.scanned = 0;
        self.decode_line(&line)
    }

    /// Whether the terminator has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn decode_line(&mut self, line: &[u8]) -> Option<Record> {
        let record = parse_line(&String::from_utf8_lossy(line))?;
        if record == Record::Done {
            self.done = true;
        }
        Some(record)
    }
}

/// Strips the `data:` prefix and trims; `None` for lines with no payload.
pub fn parse_line(line: &str) -> Option<Record> {
    let trimmed = line.trim();
    let payload = trimmed
        .strip_prefix(DATA_PREFIX)
        .map(str::trim)
        .unwrap_or(trimmed);
    match payload {
        "" => None,
        DONE_SENTINEL => Some(Record::Done),
        other => Some(Record::Data(other.to_string())),
    }
}

/// Lazily turns a body stream into records.
///
/// The stream keeps reading after `Record::Done` until the body ends, but
/// yields nothing more.
pub fn records(bytes: ByteStream) -> impl Stream<Item = Result<Record, TransportError>> + Send {
    struct State {
        bytes: ByteStream,
        decoder: FrameDecoder,
        pending: VecDeque<Record>,
        ended: bool,
    }

    stream::try_unfold(
        State {
            bytes,
            decoder: FrameDecoder::default(),
            pending: VecDeque::new(),
            ended: false,
        },
        |mut state| async move {
            loop {
                if let Some(record) = state.pending.pop_front() {
                    return Ok(Some((record, state)));
                }
                if state.ended {
                    return Ok(None);
                }

                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        state.pending.extend(state.decoder.push_chunk(&chunk));
                    }
                    Some(Err(err)) => return Err(err),
                    None => {
                        state.ended = true;
                        state.pending.extend(state.decoder.finish());
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{StreamExt as _, TryStreamExt as _};

    fn data(s: &str) -> Record {
        Record::Data(s.to_string())
    }

    #[test]
    fn holds_back_incomplete_lines() {
        let mut decoder = FrameDecoder::default();
        assert!(decoder.push_chunk(b"data: {\"a\":").is_empty());
        assert_eq!(decoder.push_chunk(b"1}\n\ndata: {\"b\""), vec![data("{\"a\":1}")]);
        assert_eq!(decoder.push_chunk(b":2}\n\n"), vec![data("{\"b\":2}")]);
    }

    #[test]
    fn reassembles_multibyte_characters_split_across_chunks() {
        let bytes = "data: 안녕\n\n".as_bytes();
        // "안" is three bytes; split inside it.
        let split = "data: ".len() + 1;
        let mut decoder = FrameDecoder::default();
        assert!(decoder.push_chunk(&bytes[..split]).is_empty());
        assert_eq!(decoder.push_chunk(&bytes[split..]), vec![data("안녕")]);
    }

    #[test]
    fn drops_empty_lines_and_handles_crlf() {
        let mut decoder = FrameDecoder::default();
        let records = decoder.push_chunk(b"\r\n\r\ndata: x\r\n\r\ndata:\r\n");
        assert_eq!(records, vec![data("x")]);
    }

    #[test]
    fn done_stops_emission() {
        let mut decoder = FrameDecoder::default();
        let records = decoder.push_chunk(b"data: a\n\ndata: [DONE]\n\ndata: b\n\n");
        assert_eq!(records, vec![data("a"), Record::Done]);
        assert!(decoder.is_done());
        assert!(decoder.push_chunk(b"data: c\n").is_empty());
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn long_line_fed_bytewise_is_scanned_once() {
        let payload = "x".repeat(16 * 1024);
        let line = format!("data: {payload}\n\ndata: [DONE]\n");
        let mut decoder = FrameDecoder::default();
        let mut records = Vec::new();
        for byte in line.as_bytes() {
            records.extend(decoder.push_chunk(std::slice::from_ref(byte)));
            assert_eq!(decoder.scanned, decoder.buf.len());
        }
        assert_eq!(records, vec![data(&payload), Record::Done]);
        assert!(decoder.buf.is_empty());
    }

    #[test]
    fn several_lines_in_one_chunk_keep_the_tail() {
        let mut decoder = FrameDecoder::default();
        let records = decoder.push_chunk(b"data: a\ndata: b\n\ndata: c");
        assert_eq!(records, vec![data("a"), data("b")]);
        assert_eq!(decoder.buf, b"data: c");
        assert_eq!(decoder.push_chunk(b"d\n"), vec![data("cd")]);
        assert!(decoder.buf.is_empty());
    }

    #[test]
    fn finish_flushes_unterminated_tail() {
        let mut decoder = FrameDecoder::default();
        assert!(decoder.push_chunk(b"data: tail").is_empty());
        assert_eq!(decoder.finish(), Some(data("tail")));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn parse_line_accepts_prefix_without_space() {
        assert_eq!(parse_line("data:{}"), Some(data("{}")));
        assert_eq!(parse_line("  {}  "), Some(data("{}")));
        assert_eq!(parse_line("data: [DONE]"), Some(Record::Done));
        assert_eq!(parse_line("data:   "), None);
    }

    #[tokio::test]
    async fn records_stream_drains_body_after_done() {
        let chunks: Vec<Result<bytes::Bytes, TransportError>> = vec![
            Ok(bytes::Bytes::from_static(b"data: one\n\ndata: [DO")),
            Ok(bytes::Bytes::from_static(b"NE]\n\n")),
            Ok(bytes::Bytes::from_static(b"data: ignored\n\n")),
        ];
        let body: ByteStream = Box::pin(futures::stream::iter(chunks));
        let out: Vec<Record> = records(body).try_collect().await.expect("records");
        assert_eq!(out, vec![data("one"), Record::Done]);
    }

    #[tokio::test]
    async fn records_stream_surfaces_read_errors() {
        let chunks: Vec<Result<bytes::Bytes, TransportError>> = vec![
            Ok(bytes::Bytes::from_static(b"data: one\n")),
            Err(TransportError::read("connection reset")),
        ];
        let body: ByteStream = Box::pin(futures::stream::iter(chunks));
        let mut stream = Box::pin(records(body));
        assert_eq!(stream.next().await, Some(Ok(data("one"))));
        assert_eq!(
            stream.next().await,
            Some(Err(TransportError::read("connection reset")))
        );
    }
}
