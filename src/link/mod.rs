//! # Radio Link Module
//!
//! Handles communication with the LoRa modem attached over a serial port.
//!
//! This module handles:
//! - Opening the modem serial port (8N1, configurable baud)
//! - Newline-terminated framing over the serial byte stream
//! - Timeout-bounded frame reception
//! - Enforcing the link's maximum packet size on transmit
//!
//! The terminator is the out-of-band byte that motivates the protocol's
//! chunk size of `max_packet_size - 1`: chunks are base64 text and command
//! literals are terminator-free, so a newline can never appear inside a
//! frame.

pub mod radio_trait;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::config::{LinkConfig, RadioConfig};
use crate::error::{HabLinkError, Result};
pub use radio_trait::RadioLink;

/// Frame terminator on the serial byte stream
const FRAME_TERMINATOR: u8 = b'\n';

/// Default modem device paths to try (in order of preference)
const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyUSB0", // USB-to-serial adapters (most common for LoRa modems)
    "/dev/ttyACM0", // USB CDC devices
];

/// Newline-framed radio link over any async byte stream.
///
/// Generic over the underlying stream so tests can drive it with an
/// in-memory duplex; production code uses the serial port via
/// [`SerialRadioLink`].
pub struct FramedLink<T> {
    stream: T,
    read_buffer: BytesMut,
    max_packet_size: usize,
}

/// Radio link over the modem serial port
pub type SerialRadioLink = FramedLink<tokio_serial::SerialStream>;

impl<T> std::fmt::Debug for FramedLink<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedLink")
            .field("max_packet_size", &self.max_packet_size)
            .field("buffered", &self.read_buffer.len())
            .finish_non_exhaustive()
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> FramedLink<T> {
    /// Wrap a byte stream in newline framing
    ///
    /// # Arguments
    ///
    /// * `stream` - Underlying byte stream (serial port, test duplex)
    /// * `max_packet_size` - Link maximum including the terminator byte
    pub fn new(stream: T, max_packet_size: usize) -> Self {
        Self {
            stream,
            read_buffer: BytesMut::with_capacity(max_packet_size),
            max_packet_size,
        }
    }

    /// Largest frame the link accepts (terminator excluded)
    pub fn max_frame_len(&self) -> usize {
        self.max_packet_size - 1
    }

    fn check_outgoing(&self, frame: &[u8]) -> Result<()> {
        if frame.len() > self.max_frame_len() {
            return Err(HabLinkError::Link(format!(
                "frame of {} bytes exceeds link maximum of {}",
                frame.len(),
                self.max_frame_len()
            )));
        }
        if frame.contains(&FRAME_TERMINATOR) {
            return Err(HabLinkError::Link(
                "frame contains the terminator byte".to_string(),
            ));
        }
        Ok(())
    }

    /// Pop one complete frame out of the read buffer, if present.
    ///
    /// Empty frames (consecutive terminators) are skipped.
    fn take_buffered_frame(&mut self) -> Option<Bytes> {
        while let Some(pos) = self
            .read_buffer
            .iter()
            .position(|b| *b == FRAME_TERMINATOR)
        {
            let frame = self.read_buffer.split_to(pos + 1);
            if pos > 0 {
                return Some(frame.freeze().slice(..pos));
            }
        }
        None
    }
}

#[async_trait]
impl<T: AsyncRead + AsyncWrite + Unpin + Send> RadioLink for FramedLink<T> {
    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.check_outgoing(frame)?;

        self.stream
            .write_all(frame)
            .await
            .map_err(|e| HabLinkError::Link(format!("failed to write frame: {}", e)))?;
        self.stream
            .write_all(&[FRAME_TERMINATOR])
            .await
            .map_err(|e| HabLinkError::Link(format!("failed to write terminator: {}", e)))?;

        debug!("Queued frame ({} bytes)", frame.len());
        Ok(())
    }

    async fn send_and_confirm(&mut self, frame: &[u8]) -> Result<()> {
        self.send(frame).await?;

        // Local confirmation only: the bytes left our transmit buffer
        self.stream
            .flush()
            .await
            .map_err(|e| HabLinkError::Link(format!("failed to flush link: {}", e)))?;

        debug!("Confirmed frame ({} bytes)", frame.len());
        Ok(())
    }

    async fn receive_with_timeout(&mut self, timeout: Duration) -> Result<Option<Bytes>> {
        // One deadline for the whole call, recomputed at each suspension
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(frame) = self.take_buffered_frame() {
                debug!("Received frame ({} bytes)", frame.len());
                return Ok(Some(frame));
            }

            if self.read_buffer.len() > self.max_packet_size {
                return Err(HabLinkError::Link(format!(
                    "unterminated frame exceeds link maximum of {} bytes",
                    self.max_packet_size
                )));
            }

            let mut scratch = [0u8; 256];
            let read = match tokio::time::timeout_at(deadline, self.stream.read(&mut scratch)).await
            {
                Err(_) => return Ok(None),
                Ok(result) => result
                    .map_err(|e| HabLinkError::Link(format!("failed to read frame: {}", e)))?,
            };

            if read == 0 {
                return Err(HabLinkError::Link("link closed".to_string()));
            }
            self.read_buffer.extend_from_slice(&scratch[..read]);
        }
    }
}

impl SerialRadioLink {
    /// Open the modem serial port named in the configuration
    ///
    /// Falls back to the common device paths if the configured port cannot
    /// be opened. Logs the radio physical parameters the modem was brought
    /// up with; applying them is the modem's concern, not the protocol's.
    ///
    /// # Errors
    ///
    /// Returns [`HabLinkError::PortNotFound`] if no candidate port opens.
    pub fn open(link: &LinkConfig, radio: &RadioConfig) -> Result<Self> {
        let mut candidates: Vec<&str> = vec![&link.port];
        candidates.extend(
            DEFAULT_DEVICE_PATHS
                .iter()
                .filter(|path| **path != link.port),
        );

        for path in &candidates {
            debug!("Trying to open modem port: {}", path);

            match Self::open_port(path, link.baud_rate) {
                Ok(port) => {
                    info!("Opened modem at {} ({} baud)", path, link.baud_rate);
                    info!(
                        "Radio: {} MHz, {} Hz bandwidth, SF{}, CR4/{}, {} dBm",
                        radio.frequency_mhz,
                        radio.bandwidth_hz,
                        radio.spreading_factor,
                        radio.coding_rate,
                        radio.tx_power_dbm,
                    );
                    return Ok(FramedLink::new(port, link.max_packet_size));
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(HabLinkError::PortNotFound(candidates.join(", ")))
    }

    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| HabLinkError::Link(format!("failed to open {}: {}", path, e)))?;

        Ok(port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MAX_PACKET: usize = 64;

    fn pair() -> (FramedLink<tokio::io::DuplexStream>, tokio::io::DuplexStream) {
        let (near, far) = tokio::io::duplex(1024);
        (FramedLink::new(near, TEST_MAX_PACKET), far)
    }

    #[tokio::test]
    async fn test_send_appends_terminator() {
        let (mut link, mut far) = pair();
        link.send_and_confirm(b"REQ_PIC").await.unwrap();

        let mut received = [0u8; 8];
        far.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"REQ_PIC\n");
    }

    #[tokio::test]
    async fn test_receive_splits_frames_on_terminator() {
        let (mut link, mut far) = pair();
        far.write_all(b"PIC_BACK\n--BEGIN IMAGE--\n").await.unwrap();

        let first = link
            .receive_with_timeout(Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(first.as_deref(), Some(&b"PIC_BACK"[..]));

        let second = link
            .receive_with_timeout(Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(second.as_deref(), Some(&b"--BEGIN IMAGE--"[..]));
    }

    #[tokio::test]
    async fn test_receive_waits_for_complete_frame() {
        let (mut link, mut far) = pair();
        far.write_all(b"PING_").await.unwrap();

        // Partial frame only: the call expires
        let result = link
            .receive_with_timeout(Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(result, None);

        far.write_all(b"BACK\n").await.unwrap();
        let result = link
            .receive_with_timeout(Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(result.as_deref(), Some(&b"PING_BACK"[..]));
    }

    #[tokio::test]
    async fn test_receive_timeout_returns_none() {
        let (mut link, _far) = pair();
        let result = link
            .receive_with_timeout(Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_empty_frames_are_skipped() {
        let (mut link, mut far) = pair();
        far.write_all(b"\n\nREQ_PING\n").await.unwrap();

        let result = link
            .receive_with_timeout(Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(result.as_deref(), Some(&b"REQ_PING"[..]));
    }

    #[tokio::test]
    async fn test_oversized_outgoing_frame_is_rejected() {
        let (mut link, _far) = pair();
        let oversized = vec![b'A'; TEST_MAX_PACKET];

        let result = link.send(&oversized).await;
        assert!(matches!(result, Err(HabLinkError::Link(_))));
    }

    #[tokio::test]
    async fn test_max_frame_len_fits() {
        let (mut link, mut far) = pair();
        let frame = vec![b'A'; link.max_frame_len()];
        link.send_and_confirm(&frame).await.unwrap();

        let mut received = vec![0u8; TEST_MAX_PACKET];
        far.read_exact(&mut received).await.unwrap();
        assert_eq!(&received[..TEST_MAX_PACKET - 1], &frame[..]);
        assert_eq!(received[TEST_MAX_PACKET - 1], b'\n');
    }

    #[tokio::test]
    async fn test_frame_with_embedded_terminator_is_rejected() {
        let (mut link, _far) = pair();
        let result = link.send(b"bad\nframe").await;
        assert!(matches!(result, Err(HabLinkError::Link(_))));
    }

    #[tokio::test]
    async fn test_closed_link_is_an_error() {
        let (mut link, far) = pair();
        drop(far);

        let result = link.receive_with_timeout(Duration::from_millis(100)).await;
        assert!(matches!(result, Err(HabLinkError::Link(_))));
    }

    #[tokio::test]
    async fn test_unterminated_oversized_incoming_is_an_error() {
        let (mut link, mut far) = pair();
        far.write_all(&vec![b'A'; TEST_MAX_PACKET + 8]).await.unwrap();

        let result = link.receive_with_timeout(Duration::from_millis(100)).await;
        assert!(matches!(result, Err(HabLinkError::Link(_))));
    }
}
