//! # Session State Machine
//!
//! Controller-side orchestration of one request/response exchange.
//!
//! The machine owns the radio link for the duration of an exchange and
//! enforces the half-duplex turn-taking discipline: after transmitting a
//! request it only listens, until either the exchange resolves or the
//! deadline fires. Terminal outcomes reset the machine to idle, so one
//! instance serves any number of sequential requests.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};
use crate::link::RadioLink;
use super::command::{Command, REQUEST_PICTURE, REQUEST_PING};
use super::decoder::{Reassembler, ReassemblyEvent};

/// Default reply deadline, applied uniformly to the awaiting-reply and
/// accumulating phases
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(3000);

/// Protocol phase of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No exchange in flight
    Idle,

    /// A request has been transmitted; listening for the reply
    AwaitingReply,

    /// A framed transfer is in progress
    Accumulating,
}

/// How one exchange ended.
///
/// Both variants are terminal; the machine has already reset to idle when
/// the outcome is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The exchange completed; for picture requests this carries the
    /// reassembled payload, for pings it is empty
    Completed(Vec<u8>),

    /// The exchange failed; any partial buffer was discarded
    Failed(SessionError),
}

/// Session tuning knobs
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Deadline for each protocol phase
    pub reply_timeout: Duration,

    /// Cap on the accumulated (still encoded) transfer size
    pub max_transfer_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            max_transfer_bytes: super::decoder::DEFAULT_MAX_TRANSFER_BYTES,
        }
    }
}

/// Controller-side protocol state machine.
///
/// Owns the link handle and all mutable session state; at most one transfer
/// is ever active because the strictly sequential request/response flow
/// never overlaps exchanges.
#[derive(Debug)]
pub struct SessionStateMachine<L: RadioLink> {
    link: L,
    config: SessionConfig,
    reassembler: Reassembler,
    phase: Phase,
}

impl<L: RadioLink> SessionStateMachine<L> {
    /// Create a machine over an opened link
    pub fn new(link: L, config: SessionConfig) -> Self {
        let max_transfer_bytes = config.max_transfer_bytes;
        Self {
            link,
            config,
            reassembler: Reassembler::new(max_transfer_bytes),
            phase: Phase::Idle,
        }
    }

    /// Current protocol phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Give the link back, consuming the machine
    pub fn into_link(self) -> L {
        self.link
    }

    /// Request a liveness check
    ///
    /// Sends `REQ_PING` and waits for `PING_BACK` within the configured
    /// deadline.
    ///
    /// # Returns
    ///
    /// * `Result<SessionOutcome>` - `Completed(empty)` on a ping reply,
    ///   `Failed(LinkTimeout)` on expiry; `Err` only for link I/O failures
    pub async fn request_ping(&mut self) -> Result<SessionOutcome> {
        info!("Requesting ping");
        self.link.send_and_confirm(REQUEST_PING).await?;
        self.phase = Phase::AwaitingReply;

        let outcome = self.await_outcome().await?;
        self.reset();
        Ok(outcome)
    }

    /// Request an image capture and transfer
    ///
    /// Sends `REQ_PIC`, then drives the reply/transfer loop to completion or
    /// failure. A `PIC_BACK` acknowledgment renews the deadline once, since
    /// the remote captures the image between the ack and the transfer.
    ///
    /// # Returns
    ///
    /// * `Result<SessionOutcome>` - `Completed(bytes)` carries the decoded
    ///   image; `Err` only for link I/O failures
    pub async fn request_picture(&mut self) -> Result<SessionOutcome> {
        info!("Requesting picture");
        self.link.send_and_confirm(REQUEST_PICTURE).await?;
        self.phase = Phase::AwaitingReply;

        let outcome = self.await_outcome().await?;
        self.reset();
        Ok(outcome)
    }

    /// Listen until the in-flight exchange resolves.
    ///
    /// One deadline per phase entry, never renewed per chunk: the remaining
    /// time is recomputed at each suspension point, so a slow multi-chunk
    /// transfer must fit inside a single deadline window.
    async fn await_outcome(&mut self) -> Result<SessionOutcome> {
        let mut deadline = Instant::now() + self.config.reply_timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!("Deadline expired in phase {:?}", self.phase);
                return Ok(SessionOutcome::Failed(SessionError::LinkTimeout));
            }

            let frame = match self.link.receive_with_timeout(remaining).await? {
                Some(frame) => frame,
                None => {
                    warn!("Deadline expired in phase {:?}", self.phase);
                    return Ok(SessionOutcome::Failed(SessionError::LinkTimeout));
                }
            };

            // Transfer framing first; anything else is a command candidate
            if let Some(event) = self.reassembler.on_frame(&frame) {
                match event {
                    ReassemblyEvent::Started => {
                        debug!("Transfer started");
                        self.phase = Phase::Accumulating;
                        deadline = Instant::now() + self.config.reply_timeout;
                    }
                    ReassemblyEvent::Progress => {
                        debug!("Transfer progress: {} bytes", self.reassembler.bytes_received());
                    }
                    ReassemblyEvent::Completed(payload) => {
                        info!("Transfer completed: {} bytes", payload.len());
                        return Ok(SessionOutcome::Completed(payload));
                    }
                    ReassemblyEvent::Failed(SessionError::UnexpectedMarker) => {
                        // The reassembler has already opened a fresh session;
                        // treat it like a new transfer start
                        warn!("Stale transfer aborted mid-stream, restarting");
                        deadline = Instant::now() + self.config.reply_timeout;
                    }
                    ReassemblyEvent::Failed(error) => {
                        warn!("Transfer failed: {}", error);
                        return Ok(SessionOutcome::Failed(error));
                    }
                }
                continue;
            }

            match Command::classify(&frame) {
                Command::PingReply => {
                    info!("Ping reply received");
                    return Ok(SessionOutcome::Completed(Vec::new()));
                }
                Command::PictureReady => {
                    // The remote is capturing; give it a fresh window
                    debug!("Picture acknowledged, transfer follows");
                    deadline = Instant::now() + self.config.reply_timeout;
                }
                Command::Unknown(bytes) => {
                    debug!("Ignoring unknown frame ({} bytes)", bytes.len());
                }
                other => {
                    debug!("Ignoring out-of-place command {:?}", other);
                }
            }
        }
    }

    /// Reset to idle for the next exchange, discarding any partial state
    fn reset(&mut self) {
        self.reassembler.reset();
        self.phase = Phase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::radio_trait::mocks::ScriptedRadioLink;
    use crate::protocol::command::{BEGIN_TRANSFER, END_TRANSFER, PICTURE_READY, PING_REPLY};
    use crate::protocol::encoder::encode_payload;

    fn machine(incoming: Vec<Option<&[u8]>>) -> SessionStateMachine<ScriptedRadioLink> {
        let config = SessionConfig {
            reply_timeout: Duration::from_millis(200),
            ..SessionConfig::default()
        };
        SessionStateMachine::new(ScriptedRadioLink::new(incoming), config)
    }

    #[tokio::test]
    async fn test_ping_round_trip() {
        let mut machine = machine(vec![Some(PING_REPLY)]);

        let outcome = machine.request_ping().await.unwrap();
        assert_eq!(outcome, SessionOutcome::Completed(Vec::new()));
        assert_eq!(machine.phase(), Phase::Idle);

        // Exactly one frame on the wire, no transfer markers
        let sent = machine.into_link().sent();
        assert_eq!(sent, vec![b"REQ_PING".to_vec()]);
    }

    #[tokio::test]
    async fn test_ping_timeout() {
        let mut machine = machine(vec![None]);

        let outcome = machine.request_ping().await.unwrap();
        assert_eq!(outcome, SessionOutcome::Failed(SessionError::LinkTimeout));
        assert_eq!(machine.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_picture_transfer_completes() {
        let image = b"jpeg bytes here".to_vec();
        let encoded = encode_payload(&image);

        let mut machine = machine(vec![
            Some(PICTURE_READY),
            Some(BEGIN_TRANSFER),
            Some(&encoded),
            Some(END_TRANSFER),
        ]);

        let outcome = machine.request_picture().await.unwrap();
        assert_eq!(outcome, SessionOutcome::Completed(image));
        assert_eq!(machine.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_picture_transfer_without_ack_still_completes() {
        // A lost PIC_BACK does not break the exchange
        let image = vec![0xAAu8; 600];
        let encoded = encode_payload(&image);
        let chunks: Vec<&[u8]> = encoded.chunks(250).collect();

        let mut incoming: Vec<Option<&[u8]>> = vec![Some(BEGIN_TRANSFER)];
        incoming.extend(chunks.iter().map(|c| Some(*c)));
        incoming.push(Some(END_TRANSFER));

        let mut machine = machine(incoming);
        let outcome = machine.request_picture().await.unwrap();
        assert_eq!(outcome, SessionOutcome::Completed(image));
    }

    #[tokio::test]
    async fn test_timeout_while_accumulating_discards_buffer() {
        // Begin and one chunk arrive, then the link goes silent
        let encoded = encode_payload(b"partial");
        let mut machine = machine(vec![
            Some(BEGIN_TRANSFER),
            Some(&encoded),
            None,
        ]);

        let outcome = machine.request_picture().await.unwrap();
        assert_eq!(outcome, SessionOutcome::Failed(SessionError::LinkTimeout));
        assert_eq!(machine.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_recovery_after_timeout_starts_from_empty_state() {
        let stale = encode_payload(b"stale");
        let fresh_image = b"fresh image".to_vec();
        let fresh = encode_payload(&fresh_image);

        let mut machine = machine(vec![
            // First exchange: partial transfer then silence
            Some(BEGIN_TRANSFER),
            Some(&stale),
            None,
            // Second exchange: clean transfer
            Some(BEGIN_TRANSFER),
            Some(&fresh),
            Some(END_TRANSFER),
        ]);

        let first = machine.request_picture().await.unwrap();
        assert_eq!(first, SessionOutcome::Failed(SessionError::LinkTimeout));

        let second = machine.request_picture().await.unwrap();
        assert_eq!(second, SessionOutcome::Completed(fresh_image));
    }

    #[tokio::test]
    async fn test_begin_mid_transfer_restarts_the_session() {
        // [Begin, chunk1, Begin, chunk2, End]: the stale transfer aborts
        // and the exchange completes from chunk2 alone
        let stale = encode_payload(b"stale");
        let fresh_image = b"fresh".to_vec();
        let fresh = encode_payload(&fresh_image);

        let mut machine = machine(vec![
            Some(BEGIN_TRANSFER),
            Some(&stale),
            Some(BEGIN_TRANSFER),
            Some(&fresh),
            Some(END_TRANSFER),
        ]);

        let outcome = machine.request_picture().await.unwrap();
        assert_eq!(outcome, SessionOutcome::Completed(fresh_image));
    }

    #[tokio::test]
    async fn test_corrupt_transfer_fails_with_encoding_error() {
        let mut machine = machine(vec![
            Some(BEGIN_TRANSFER),
            Some(b"!!!not base64!!!"),
            Some(END_TRANSFER),
        ]);

        let outcome = machine.request_picture().await.unwrap();
        assert!(matches!(
            outcome,
            SessionOutcome::Failed(SessionError::EncodingError(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_frames_are_ignored_while_awaiting() {
        let mut machine = machine(vec![
            Some(b"telemetry noise"),
            Some(PING_REPLY),
        ]);

        let outcome = machine.request_ping().await.unwrap();
        assert_eq!(outcome, SessionOutcome::Completed(Vec::new()));
    }

    #[tokio::test]
    async fn test_turn_taking_sends_exactly_one_request() {
        let mut machine = machine(vec![
            Some(PICTURE_READY),
            Some(BEGIN_TRANSFER),
            Some(END_TRANSFER),
        ]);

        machine.request_picture().await.unwrap();

        // No transmissions after the initial request until resolution
        let sent = machine.into_link().sent();
        assert_eq!(sent, vec![b"REQ_PIC".to_vec()]);
    }
}
