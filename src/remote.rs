//! # Remote Payload Service
//!
//! The airborne side of the protocol: listens for controller requests,
//! captures images, and streams them back chunk by chunk.
//!
//! The service is single-threaded and strictly turn-taking: it only ever
//! transmits in direct response to a received request, and it confirms each
//! frame left the local transmit buffer before sending the next so the
//! half-duplex modem is never overrun.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::capture::ImageSource;
use crate::error::Result;
use crate::link::RadioLink;
use crate::protocol::command::{Command, PICTURE_READY, PING_REPLY};
use crate::protocol::encoder::FrameEncoder;
use crate::storage::ImageStore;

/// How long one `serve_once` call listens before giving up the turn
const POLL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Remote-side request dispatcher
pub struct RemoteService<L, C, S> {
    link: L,
    camera: C,
    store: S,
    max_chunk: usize,
    capture_counter: u32,
}

impl<L, C, S> RemoteService<L, C, S>
where
    L: RadioLink,
    C: ImageSource,
    S: ImageStore,
{
    /// Create a service over opened collaborators
    ///
    /// # Arguments
    ///
    /// * `max_chunk` - Largest data chunk per frame (link maximum minus the
    ///   terminator byte)
    pub fn new(link: L, camera: C, store: S, max_chunk: usize) -> Self {
        Self {
            link,
            camera,
            store,
            max_chunk,
            capture_counter: 0,
        }
    }

    /// Give the collaborators back, consuming the service
    pub fn into_parts(self) -> (L, C, S) {
        (self.link, self.camera, self.store)
    }

    /// Handle at most one request
    ///
    /// Listens for up to the poll window, classifies the frame, and
    /// dispatches. Unknown frames are ignored; a silent window is not an
    /// error.
    ///
    /// # Returns
    ///
    /// * `Result<Option<Command>>` - The command that was served, if any
    pub async fn serve_once(&mut self) -> Result<Option<Command>> {
        let frame = match self.link.receive_with_timeout(POLL_TIMEOUT).await? {
            Some(frame) => frame,
            None => return Ok(None),
        };

        let command = Command::classify(&frame);
        match &command {
            Command::RequestPing => {
                info!("Ping requested");
                self.link.send_and_confirm(PING_REPLY).await?;
            }
            Command::RequestPicture => {
                info!("Picture requested");
                self.send_picture().await?;
            }
            Command::Unknown(bytes) => {
                debug!("Ignoring unknown frame ({} bytes)", bytes.len());
                return Ok(None);
            }
            other => {
                // Reply literals and transfer markers are controller-bound;
                // seeing one here means the link echoed or the peer is
                // confused. Ignore it.
                warn!("Ignoring out-of-place command {:?}", other);
                return Ok(None);
            }
        }

        Ok(Some(command))
    }

    /// Serve requests until the task is cancelled
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.serve_once().await?;
        }
    }

    /// Acknowledge, capture, persist a copy, and stream the framed transfer
    async fn send_picture(&mut self) -> Result<()> {
        self.link.send_and_confirm(PICTURE_READY).await?;

        let image = self.camera.capture_image().await?;
        info!("Captured image ({} bytes)", image.len());

        // Keep a local copy; the link offers no retransmission
        let name = format!("{}.jpg", self.capture_counter);
        self.capture_counter += 1;
        self.store.persist(&image, &name).await?;

        let encoder = FrameEncoder::from_raw(&image, self.max_chunk);
        let frame_count = encoder.frame_count();
        for frame in encoder {
            self.link.send_and_confirm(&frame).await?;
        }

        info!("Transfer sent ({} frames)", frame_count);
        Ok(())
    }
}
