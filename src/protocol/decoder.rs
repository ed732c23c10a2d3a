//! # Frame Decoder / Reassembler
//!
//! Accumulates payload bytes between a begin and an end transfer marker and
//! decodes the result back to raw bytes.
//!
//! The reassembler is deliberately tolerant of the link's failure modes: a
//! begin marker mid-transfer aborts the stale session and immediately starts
//! a fresh one, and a timeout (driven by the session machine) discards any
//! partial buffer so the next transfer starts clean.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::SessionError;
use super::command::{BEGIN_TRANSFER, END_TRANSFER};

/// Default cap on the accumulated (still encoded) transfer size
pub const DEFAULT_MAX_TRANSFER_BYTES: usize = 1024 * 1024;

/// Progress of an in-flight reassembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReassemblyEvent {
    /// A begin marker opened a new transfer
    Started,

    /// A data chunk was appended
    Progress,

    /// An end marker closed the transfer and the payload decoded cleanly
    Completed(Vec<u8>),

    /// The transfer failed; any partial buffer has been discarded
    Failed(SessionError),
}

#[derive(Debug)]
enum ReassemblyState {
    Idle,
    Accumulating(Vec<u8>),
}

/// Stateful frame-bounded reassembler.
///
/// Owns a dynamically sized buffer with an explicit capacity limit; an
/// append that would exceed the limit fails the session instead of silently
/// truncating.
#[derive(Debug)]
pub struct Reassembler {
    state: ReassemblyState,
    max_transfer_bytes: usize,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TRANSFER_BYTES)
    }
}

impl Reassembler {
    /// Create a reassembler with the given accumulated-size limit
    pub fn new(max_transfer_bytes: usize) -> Self {
        Self {
            state: ReassemblyState::Idle,
            max_transfer_bytes,
        }
    }

    /// Whether a transfer is currently being accumulated
    pub fn is_accumulating(&self) -> bool {
        matches!(self.state, ReassemblyState::Accumulating(_))
    }

    /// Bytes accumulated so far in the active transfer
    pub fn bytes_received(&self) -> usize {
        match &self.state {
            ReassemblyState::Idle => 0,
            ReassemblyState::Accumulating(buffer) => buffer.len(),
        }
    }

    /// Discard any in-progress transfer and return to idle
    ///
    /// Called by the session machine on deadline expiry so the next transfer
    /// starts from an empty buffer.
    pub fn reset(&mut self) {
        self.state = ReassemblyState::Idle;
    }

    /// Feed one received frame into the reassembler
    ///
    /// # Arguments
    ///
    /// * `frame` - Raw frame bytes as delivered by the link
    ///
    /// # Returns
    ///
    /// * `Option<ReassemblyEvent>` - The resulting event, or `None` if the
    ///   frame is not part of a transfer (a candidate for command
    ///   classification instead)
    ///
    /// A begin marker received mid-transfer yields
    /// `Failed(UnexpectedMarker)` and atomically opens a fresh session, so
    /// the chunks that follow it accumulate into the new transfer.
    pub fn on_frame(&mut self, frame: &[u8]) -> Option<ReassemblyEvent> {
        match (&mut self.state, frame) {
            (ReassemblyState::Idle, BEGIN_TRANSFER) => {
                self.state = ReassemblyState::Accumulating(Vec::new());
                Some(ReassemblyEvent::Started)
            }
            (ReassemblyState::Idle, _) => None,
            (ReassemblyState::Accumulating(_), BEGIN_TRANSFER) => {
                self.state = ReassemblyState::Accumulating(Vec::new());
                Some(ReassemblyEvent::Failed(SessionError::UnexpectedMarker))
            }
            (ReassemblyState::Accumulating(buffer), END_TRANSFER) => {
                let encoded = std::mem::take(buffer);
                self.state = ReassemblyState::Idle;
                match BASE64.decode(&encoded) {
                    Ok(raw) => Some(ReassemblyEvent::Completed(raw)),
                    Err(e) => Some(ReassemblyEvent::Failed(SessionError::EncodingError(
                        e.to_string(),
                    ))),
                }
            }
            (ReassemblyState::Accumulating(buffer), chunk) => {
                if buffer.len() + chunk.len() > self.max_transfer_bytes {
                    let limit = self.max_transfer_bytes;
                    self.state = ReassemblyState::Idle;
                    return Some(ReassemblyEvent::Failed(SessionError::BufferExceeded {
                        limit,
                    }));
                }
                buffer.extend_from_slice(chunk);
                Some(ReassemblyEvent::Progress)
            }
        }
    }
}
