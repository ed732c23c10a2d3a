//! # Frame Encoder
//!
//! Chunks an encoded payload into a marker-bracketed frame sequence.
//!
//! The sending side turns one payload into `ceil(len / max_chunk)` data
//! frames bracketed by the begin and end transfer markers. Payload bytes are
//! base64-encoded before chunking so arbitrary binary content can never be
//! misread as a reserved literal.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;

use super::command::{BEGIN_TRANSFER, END_TRANSFER};

/// Encode raw payload bytes into the text-safe wire representation
///
/// # Arguments
///
/// * `raw` - Arbitrary payload bytes (e.g. a JPEG capture)
///
/// # Returns
///
/// * `Vec<u8>` - Base64 text, safe to chunk and frame
pub fn encode_payload(raw: &[u8]) -> Vec<u8> {
    BASE64.encode(raw).into_bytes()
}

/// Number of data chunks a payload of `len` bytes produces
///
/// Ceiling division: a zero-length payload produces zero chunks, and an
/// exact multiple of `max_chunk` produces no empty trailing chunk.
pub fn chunk_count(len: usize, max_chunk: usize) -> usize {
    len.div_ceil(max_chunk)
}

/// Lazy iterator over the frames of one transfer.
///
/// Yields, in order: the begin marker, each data chunk (every one at most
/// `max_chunk` bytes), the end marker. The sequence is finite and consumed
/// once; a fresh transfer derives a fresh encoder from the payload.
#[derive(Debug)]
pub struct FrameEncoder {
    encoded: Bytes,
    max_chunk: usize,
    state: EncoderState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EncoderState {
    Begin,
    Chunk(usize),
    End,
    Done,
}

impl FrameEncoder {
    /// Create an encoder over an already text-safe payload
    ///
    /// # Arguments
    ///
    /// * `encoded` - Text-safe payload bytes (see [`encode_payload`])
    /// * `max_chunk` - Maximum data bytes per frame; must be non-zero
    ///
    /// # Panics
    ///
    /// Panics if `max_chunk` is zero. Chunk size comes from validated
    /// configuration, so this is a programming error, not a runtime one.
    pub fn new(encoded: impl Into<Bytes>, max_chunk: usize) -> Self {
        assert!(max_chunk > 0, "max_chunk must be non-zero");
        Self {
            encoded: encoded.into(),
            max_chunk,
            state: EncoderState::Begin,
        }
    }

    /// Create an encoder from raw payload bytes, encoding them first
    pub fn from_raw(raw: &[u8], max_chunk: usize) -> Self {
        Self::new(encode_payload(raw), max_chunk)
    }

    /// Total number of frames this encoder will yield (markers included)
    pub fn frame_count(&self) -> usize {
        2 + chunk_count(self.encoded.len(), self.max_chunk)
    }
}

impl Iterator for FrameEncoder {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        match self.state {
            EncoderState::Begin => {
                self.state = if self.encoded.is_empty() {
                    EncoderState::End
                } else {
                    EncoderState::Chunk(0)
                };
                Some(Bytes::from_static(BEGIN_TRANSFER))
            }
            EncoderState::Chunk(index) => {
                let start = index * self.max_chunk;
                let end = (start + self.max_chunk).min(self.encoded.len());
                self.state = if end == self.encoded.len() {
                    EncoderState::End
                } else {
                    EncoderState::Chunk(index + 1)
                };
                Some(self.encoded.slice(start..end))
            }
            EncoderState::End => {
                self.state = EncoderState::Done;
                Some(Bytes::from_static(END_TRANSFER))
            }
            EncoderState::Done => None,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.state {
            EncoderState::Begin => self.frame_count(),
            EncoderState::Chunk(index) => {
                1 + chunk_count(self.encoded.len(), self.max_chunk) - index
            }
            EncoderState::End => 1,
            EncoderState::Done => 0,
        };
        (remaining, Some(remaining))
    }
}
