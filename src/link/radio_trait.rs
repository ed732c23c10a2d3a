//! Trait abstraction for radio link operations to enable testing

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::error::Result;

/// One endpoint's view of the half-duplex radio link.
///
/// The link delivers a complete frame or nothing; retries, corruption
/// detection, and physical-layer parameters are the modem's concern.
#[async_trait]
pub trait RadioLink: Send {
    /// Queue one frame for transmission
    async fn send(&mut self, frame: &[u8]) -> Result<()>;

    /// Transmit one frame and wait for the local transmit buffer to drain
    ///
    /// This is a local confirmation only, not a remote acknowledgment.
    async fn send_and_confirm(&mut self, frame: &[u8]) -> Result<()>;

    /// Wait up to `timeout` for one complete frame
    ///
    /// Returns `Ok(None)` on expiry.
    async fn receive_with_timeout(&mut self, timeout: Duration) -> Result<Option<Bytes>>;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Scripted radio link for session tests.
    ///
    /// Replies are served in order; `None` entries simulate a silent link
    /// (the receive call reports a timeout).
    #[derive(Clone)]
    pub struct ScriptedRadioLink {
        pub sent_frames: Arc<Mutex<Vec<Vec<u8>>>>,
        pub incoming: Arc<Mutex<VecDeque<Option<Bytes>>>>,
    }

    impl ScriptedRadioLink {
        pub fn new(incoming: Vec<Option<&[u8]>>) -> Self {
            Self {
                sent_frames: Arc::new(Mutex::new(Vec::new())),
                incoming: Arc::new(Mutex::new(
                    incoming
                        .into_iter()
                        .map(|frame| frame.map(Bytes::copy_from_slice))
                        .collect(),
                )),
            }
        }

        pub fn sent(&self) -> Vec<Vec<u8>> {
            self.sent_frames.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RadioLink for ScriptedRadioLink {
        async fn send(&mut self, frame: &[u8]) -> Result<()> {
            self.sent_frames.lock().unwrap().push(frame.to_vec());
            Ok(())
        }

        async fn send_and_confirm(&mut self, frame: &[u8]) -> Result<()> {
            self.send(frame).await
        }

        async fn receive_with_timeout(&mut self, _timeout: Duration) -> Result<Option<Bytes>> {
            Ok(self.incoming.lock().unwrap().pop_front().flatten())
        }
    }
}
