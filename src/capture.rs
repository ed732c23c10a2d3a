//! # Image Capture
//!
//! Collaborator boundary for the remote unit's image sensor.
//!
//! The protocol core never talks to camera hardware; it asks an
//! [`ImageSource`] for one captured frame of bytes. The host-side
//! implementation reads from a file, standing in for the sensor.

use async_trait::async_trait;

use crate::error::{HabLinkError, Result};

/// One-shot image capture
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageSource: Send {
    /// Capture a single image and return its raw bytes
    async fn capture_image(&mut self) -> Result<Vec<u8>>;
}

/// Image source backed by a file on disk
#[derive(Debug)]
pub struct FileImageSource {
    path: std::path::PathBuf,
}

impl FileImageSource {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ImageSource for FileImageSource {
    async fn capture_image(&mut self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| HabLinkError::Capture(format!("{}: {}", self.path.display(), e)))
    }
}
