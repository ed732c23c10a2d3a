//! # Wire Commands
//!
//! Reserved wire literals and command classification.
//!
//! Every frame on the link is either one of six reserved literals or an
//! opaque data chunk. The literals live in a namespace disjoint from chunk
//! content: chunks carry base64 text, and the transfer markers start with
//! `--`, so neither can shadow the other.

use bytes::Bytes;

/// Controller requests image capture and transfer
pub const REQUEST_PICTURE: &[u8] = b"REQ_PIC";

/// Controller requests a liveness check
pub const REQUEST_PING: &[u8] = b"REQ_PING";

/// Remote acknowledges a picture request, transfer follows
pub const PICTURE_READY: &[u8] = b"PIC_BACK";

/// Remote liveness reply
pub const PING_REPLY: &[u8] = b"PING_BACK";

/// Start-of-transfer marker
pub const BEGIN_TRANSFER: &[u8] = b"--BEGIN IMAGE--";

/// End-of-transfer marker
pub const END_TRANSFER: &[u8] = b"--END IMAGE--";

/// One received frame, classified.
///
/// `Unknown` is not an error: a frame that matches no reserved literal while
/// no transfer is active is simply ignored by both endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    RequestPicture,
    RequestPing,
    PictureReady,
    PingReply,
    BeginTransfer,
    EndTransfer,
    Unknown(Bytes),
}

impl Command {
    /// Classify a received frame by exact byte-string match
    ///
    /// # Arguments
    ///
    /// * `frame` - Raw frame bytes as delivered by the link
    ///
    /// # Returns
    ///
    /// * `Command` - Matching reserved command, or `Unknown` with the
    ///   original bytes
    ///
    /// # Examples
    ///
    /// ```
    /// use hab_link::protocol::command::Command;
    ///
    /// assert_eq!(Command::classify(b"REQ_PING"), Command::RequestPing);
    /// assert!(matches!(Command::classify(b"garbage"), Command::Unknown(_)));
    /// ```
    pub fn classify(frame: &[u8]) -> Command {
        match frame {
            REQUEST_PICTURE => Command::RequestPicture,
            REQUEST_PING => Command::RequestPing,
            PICTURE_READY => Command::PictureReady,
            PING_REPLY => Command::PingReply,
            BEGIN_TRANSFER => Command::BeginTransfer,
            END_TRANSFER => Command::EndTransfer,
            other => Command::Unknown(Bytes::copy_from_slice(other)),
        }
    }

    /// Wire bytes for a reserved command
    ///
    /// # Returns
    ///
    /// * `Option<&'static [u8]>` - The reserved literal, or `None` for
    ///   `Unknown`
    pub fn wire_bytes(&self) -> Option<&'static [u8]> {
        match self {
            Command::RequestPicture => Some(REQUEST_PICTURE),
            Command::RequestPing => Some(REQUEST_PING),
            Command::PictureReady => Some(PICTURE_READY),
            Command::PingReply => Some(PING_REPLY),
            Command::BeginTransfer => Some(BEGIN_TRANSFER),
            Command::EndTransfer => Some(END_TRANSFER),
            Command::Unknown(_) => None,
        }
    }
}
