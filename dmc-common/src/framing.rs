//! # Delimiter Framing
//!
//! Purpose: Recover message boundaries from an unstructured byte stream by
//! accumulating reads until a caller-chosen delimiter appears.
//!
//! ## Design Principles
//! 1. **Byte-Domain Search**: The delimiter is matched on raw bytes before any
//!    decoding, so multi-byte characters split across reads stay intact.
//! 2. **Incremental Scan**: Each read only rescans the new bytes plus a tail of
//!    `delimiter.len() - 1` bytes; earlier bytes are known delimiter-free.
//! 3. **Buffer Reuse**: The accumulator and the chunk buffer live on the
//!    reader and are reused across messages.
//! 4. **Fail Fast**: End of stream before a delimiter is a `Truncated` error,
//!    never a retry loop.
//!
//! ## Remainder Handling
//!
//! ```text
//! accumulated: | payload | DELIM | tail |
//!
//! Discard: returns payload before the LAST delimiter, drops DELIM + tail
//! Retain:  returns payload before the FIRST delimiter, keeps tail buffered
//! ```

use std::io::{ErrorKind, Read};

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{ChannelError, ChannelResult};

/// Initial accumulator capacity.
const INITIAL_CAPACITY: usize = 1024;

/// What happens to bytes read past the delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemainderPolicy {
    /// Split at the last delimiter in the accumulated bytes and drop anything
    /// after it. Bytes of a following message read in the same chunk are lost.
    #[default]
    Discard,
    /// Split at the first delimiter and keep the following bytes for the next
    /// frame.
    Retain,
}

/// Reusable delimiter-framing state for one byte stream.
#[derive(Debug)]
pub struct FrameReader {
    buffer: BytesMut,
    chunk: Vec<u8>,
    policy: RemainderPolicy,
    max_message_size: Option<usize>,
}

impl Default for FrameReader {
    fn default() -> Self {
        FrameReader::new(RemainderPolicy::default())
    }
}

impl FrameReader {
    /// Creates a frame reader with the given remainder policy and no size cap.
    pub fn new(policy: RemainderPolicy) -> Self {
        FrameReader {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
            chunk: Vec::new(),
            policy,
            max_message_size: None,
        }
    }

    /// Caps the payload size of every frame.
    pub fn with_max_message_size(mut self, limit: Option<usize>) -> Self {
        self.max_message_size = limit;
        self
    }

    pub fn policy(&self) -> RemainderPolicy {
        self.policy
    }

    /// Bytes currently held in the accumulator.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drops any buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Reads from `reader` in chunks of at most `buffer_size` bytes until
    /// `delimiter` is found, returning the bytes before it.
    ///
    /// `unit` is the code-unit width of the text encoding; matches are only
    /// accepted at offsets that are a multiple of it.
    ///
    /// # Errors
    ///
    /// - `InvalidBufferSize` / `EmptyDelimiter` for bad arguments.
    /// - `Truncated` when the stream ends first; buffered bytes are dropped.
    /// - `MessageTooLarge` when the payload outgrows the configured cap, whether
    ///   or not its delimiter has arrived. An over-cap frame is consumed.
    /// - `Io` for any read failure other than `Interrupted`, which is retried.
    ///   Buffered bytes are kept so a later call can resume after a timeout.
    pub fn read_frame<R: Read>(
        &mut self,
        reader: &mut R,
        buffer_size: usize,
        delimiter: &[u8],
        unit: usize,
    ) -> ChannelResult<Bytes> {
        if buffer_size == 0 {
            return Err(ChannelError::InvalidBufferSize);
        }
        if delimiter.is_empty() {
            return Err(ChannelError::EmptyDelimiter);
        }
        let unit = unit.max(1);
        if self.chunk.len() < buffer_size {
            self.chunk.resize(buffer_size, 0);
        }

        // Leftover bytes from a previous frame have never been scanned
        // against this delimiter.
        let mut scanned: usize = 0;
        loop {
            let start = align_down(scanned.saturating_sub(delimiter.len() - 1), unit);
            if let Some(pos) = self.locate(start, delimiter, unit) {
                let payload = self.take_frame(pos, delimiter.len());
                if let Some(limit) = self.max_message_size {
                    if payload.len() > limit {
                        return Err(ChannelError::MessageTooLarge { limit });
                    }
                }
                return Ok(payload);
            }

            if let Some(limit) = self.max_message_size {
                // No delimiter can end inside the buffer, so the payload
                // already exceeds `limit`.
                if self.buffer.len() >= limit.saturating_add(delimiter.len()) {
                    self.buffer.clear();
                    return Err(ChannelError::MessageTooLarge { limit });
                }
            }

            scanned = self.buffer.len();
            let bytes = self.fill(reader, buffer_size)?;
            if bytes == 0 {
                let received = self.buffer.len();
                self.buffer.clear();
                return Err(ChannelError::Truncated { received });
            }
        }
    }

    fn fill<R: Read>(&mut self, reader: &mut R, buffer_size: usize) -> ChannelResult<usize> {
        let chunk = &mut self.chunk[..buffer_size];
        loop {
            match reader.read(chunk) {
                Ok(bytes) => {
                    self.buffer.extend_from_slice(&chunk[..bytes]);
                    return Ok(bytes);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn locate(&self, start: usize, delimiter: &[u8], unit: usize) -> Option<usize> {
        match self.policy {
            RemainderPolicy::Discard => rfind_aligned(&self.buffer, delimiter, start, unit),
            RemainderPolicy::Retain => find_aligned(&self.buffer, delimiter, start, unit),
        }
    }

    fn take_frame(&mut self, pos: usize, delimiter_len: usize) -> Bytes {
        let payload = self.buffer.split_to(pos).freeze();
        match self.policy {
            RemainderPolicy::Discard => self.buffer.clear(),
            RemainderPolicy::Retain => self.buffer.advance(delimiter_len),
        }
        payload
    }
}

fn align_down(offset: usize, unit: usize) -> usize {
    offset - offset % unit
}

/// Candidate match offsets: `start`, `start + unit`, ... up to the last
/// position where `needle` still fits. `start` must already be aligned.
fn candidates(
    haystack: &[u8],
    needle: &[u8],
    start: usize,
    unit: usize,
) -> std::iter::StepBy<std::ops::Range<usize>> {
    let end = (haystack.len() + 1).saturating_sub(needle.len());
    (start.min(end)..end).step_by(unit)
}

fn find_aligned(haystack: &[u8], needle: &[u8], start: usize, unit: usize) -> Option<usize> {
    candidates(haystack, needle, start, unit).find(|&i| &haystack[i..i + needle.len()] == needle)
}

fn rfind_aligned(haystack: &[u8], needle: &[u8], start: usize, unit: usize) -> Option<usize> {
    candidates(haystack, needle, start, unit)
        .rev()
        .find(|&i| &haystack[i..i + needle.len()] == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    /// Reader that hands out scripted chunks, never more than one per call.
    struct ScriptedReader {
        chunks: VecDeque<io::Result<Vec<u8>>>,
        reads: usize,
    }

    impl ScriptedReader {
        fn new(chunks: &[&[u8]]) -> Self {
            ScriptedReader {
                chunks: chunks.iter().map(|c| Ok(c.to_vec())).collect(),
                reads: 0,
            }
        }

        fn push_err(&mut self, kind: io::ErrorKind) {
            self.chunks.push_back(Err(kind.into()));
        }
    }

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads += 1;
            match self.chunks.pop_front() {
                None => Ok(0),
                Some(Err(err)) => Err(err),
                Some(Ok(mut chunk)) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.chunks.push_front(Ok(chunk.split_off(n)));
                    }
                    Ok(n)
                }
            }
        }
    }

    fn read_one(reader: &mut ScriptedReader, buffer_size: usize, delimiter: &[u8]) -> ChannelResult<Bytes> {
        FrameReader::default().read_frame(reader, buffer_size, delimiter, 1)
    }

    #[test]
    fn assembles_message_across_chunks() {
        let mut reader = ScriptedReader::new(&[b"hel", b"lo<<END>>"]);
        let frame = read_one(&mut reader, 4, b"<<END>>").unwrap();
        assert_eq!(&frame[..], b"hello");
    }

    #[test]
    fn delimiter_split_across_chunks_is_found() {
        let mut reader = ScriptedReader::new(&[b"abc<<E", b"N", b"D>>"]);
        let frame = read_one(&mut reader, 64, b"<<END>>").unwrap();
        assert_eq!(&frame[..], b"abc");
    }

    #[test]
    fn single_byte_chunks_match_large_chunks() {
        let stream: &[u8] = b"payload with spaces\r\n";
        let mut small = ScriptedReader::new(&[stream]);
        let mut large = ScriptedReader::new(&[stream]);

        let a = read_one(&mut small, 1, b"\r\n").unwrap();
        let b = read_one(&mut large, stream.len(), b"\r\n").unwrap();
        assert_eq!(a, b);
        assert_eq!(&a[..], b"payload with spaces");
        assert_eq!(small.reads, stream.len());
    }

    #[test]
    fn discard_splits_at_last_delimiter_and_drops_tail() {
        let mut reader = ScriptedReader::new(&[b"one|two|three", b"|four"]);
        let mut frames = FrameReader::new(RemainderPolicy::Discard);

        let first = frames.read_frame(&mut reader, 64, b"|", 1).unwrap();
        assert_eq!(&first[..], b"one|two");
        assert_eq!(frames.buffered(), 0);

        let next = frames.read_frame(&mut reader, 64, b"|", 1).unwrap();
        assert_eq!(&next[..], b"");
    }

    #[test]
    fn retain_yields_every_message_in_a_burst() {
        let mut reader = ScriptedReader::new(&[b"one|two|thr", b"ee|"]);
        let mut frames = FrameReader::new(RemainderPolicy::Retain);

        let mut out = Vec::new();
        for _ in 0..3 {
            out.push(frames.read_frame(&mut reader, 64, b"|", 1).unwrap());
        }
        assert_eq!(out, vec![&b"one"[..], &b"two"[..], &b"three"[..]]);
        assert_eq!(frames.buffered(), 0);
    }

    #[test]
    fn end_of_stream_without_delimiter_is_truncated() {
        let mut reader = ScriptedReader::new(&[b"partial"]);
        let mut frames = FrameReader::default();
        let err = frames.read_frame(&mut reader, 16, b"<<END>>", 1).unwrap_err();
        assert!(matches!(err, ChannelError::Truncated { received: 7 }));
        assert_eq!(frames.buffered(), 0);
    }

    #[test]
    fn empty_stream_is_truncated() {
        let mut reader = ScriptedReader::new(&[]);
        let err = read_one(&mut reader, 16, b"\n").unwrap_err();
        assert!(matches!(err, ChannelError::Truncated { received: 0 }));
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let mut reader = ScriptedReader::new(&[]);
        reader.push_err(io::ErrorKind::Interrupted);
        reader.chunks.push_back(Ok(b"ok\n".to_vec()));
        let frame = read_one(&mut reader, 8, b"\n").unwrap();
        assert_eq!(&frame[..], b"ok");
    }

    #[test]
    fn io_errors_surface_and_keep_buffered_bytes() {
        let mut reader = ScriptedReader::new(&[b"half"]);
        reader.push_err(io::ErrorKind::TimedOut);
        reader.chunks.push_back(Ok(b" done\n".to_vec()));

        let mut frames = FrameReader::default();
        let err = frames.read_frame(&mut reader, 8, b"\n", 1).unwrap_err();
        assert!(matches!(err, ChannelError::Io(ref e) if e.kind() == io::ErrorKind::TimedOut));
        assert_eq!(frames.buffered(), 4);

        let frame = frames.read_frame(&mut reader, 8, b"\n", 1).unwrap();
        assert_eq!(&frame[..], b"half done");
    }

    #[test]
    fn rejects_invalid_arguments() {
        let mut reader = ScriptedReader::new(&[b"x\n"]);
        assert!(matches!(
            read_one(&mut reader, 0, b"\n"),
            Err(ChannelError::InvalidBufferSize)
        ));
        assert!(matches!(
            read_one(&mut reader, 4, b""),
            Err(ChannelError::EmptyDelimiter)
        ));
        assert_eq!(reader.reads, 0);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let mut reader = ScriptedReader::new(&[b"0123456789", b"abcdef<END>"]);
        let mut frames = FrameReader::default().with_max_message_size(Some(8));
        let err = frames.read_frame(&mut reader, 4, b"<END>", 1).unwrap_err();
        assert!(matches!(err, ChannelError::MessageTooLarge { limit: 8 }));
    }

    #[test]
    fn oversized_payload_in_one_chunk_is_rejected() {
        let mut reader = ScriptedReader::new(&[b"0123456789abcdef<END>", b"ok<END>"]);
        let mut frames = FrameReader::default().with_max_message_size(Some(8));
        let err = frames.read_frame(&mut reader, 64, b"<END>", 1).unwrap_err();
        assert!(matches!(err, ChannelError::MessageTooLarge { limit: 8 }));
        assert_eq!(frames.buffered(), 0);

        let next = frames.read_frame(&mut reader, 64, b"<END>", 1).unwrap();
        assert_eq!(&next[..], b"ok");
    }

    #[test]
    fn payload_at_limit_is_accepted() {
        let mut reader = ScriptedReader::new(&[b"12345678<EN", b"D>"]);
        let mut frames = FrameReader::default().with_max_message_size(Some(8));
        let frame = frames.read_frame(&mut reader, 64, b"<END>", 1).unwrap();
        assert_eq!(&frame[..], b"12345678");
    }

    #[test]
    fn multibyte_character_split_across_chunks_survives() {
        // "é" is 0xC3 0xA9 in UTF-8.
        let mut reader = ScriptedReader::new(&[b"caf\xC3", b"\xA9;"]);
        let frame = read_one(&mut reader, 4, b";").unwrap();
        assert_eq!(std::str::from_utf8(&frame).unwrap(), "caf\u{e9}");
    }

    #[test]
    fn wide_units_only_match_on_aligned_offsets() {
        // UTF-16LE units 0x0A00, 0x4100, '\n'. Bytes 1..3 read 0A 00, which
        // straddles two units and must not count as the "\n" delimiter.
        let stream = [0x00, 0x0A, 0x00, 0x41, 0x0A, 0x00];
        let mut reader = ScriptedReader::new(&[&stream[..]]);
        let frame = FrameReader::default()
            .read_frame(&mut reader, 2, &[0x0A, 0x00], 2)
            .unwrap();
        assert_eq!(&frame[..], &[0x00, 0x0A, 0x00, 0x41]);
    }

    #[test]
    fn search_helpers_respect_start_offset() {
        assert_eq!(find_aligned(b"a|b|c", b"|", 2, 1), Some(3));
        assert_eq!(rfind_aligned(b"a|b|c", b"|", 0, 1), Some(3));
        assert_eq!(rfind_aligned(b"a|b", b"|", 2, 1), None);
        assert_eq!(find_aligned(b"ab", b"abc", 0, 1), None);
    }
}
