//! Seams to the outside world.
//!
//! The loop only needs four device operations and one recognition call. The
//! runner provides `adb` and Tesseract implementations; tests script fakes.
use async_trait::async_trait;
use image::RgbaImage;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::geometry::Point;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no device available: {0}")]
    NotFound(String),
    #[error("`{command}` failed: {detail}")]
    Command { command: String, detail: String },
    #[error("screenshot blank or unreadable after {attempts} attempts")]
    BlankScreen { attempts: u32 },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum RecognizeError {
    #[error("recognition engine failed: {0}")]
    Engine(String),
    #[error("failed to encode region: {0}")]
    Encode(#[from] image::ImageError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("artifact task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Something that can look at and touch the game screen.
#[async_trait]
pub trait Device: Send {
    /// Re-validate the connection, reconnecting or reselecting if needed.
    async fn ensure_connected(&mut self) -> Result<(), DeviceError>;

    /// Write a fresh PNG screenshot to `path`.
    async fn capture_screen(&mut self, path: &Path) -> Result<(), DeviceError>;

    async fn tap(&mut self, at: Point) -> Result<(), DeviceError>;

    async fn tap_and_hold(&mut self, at: Point, duration: Duration) -> Result<(), DeviceError>;
}

/// Text recognition over a cropped screen region.
#[async_trait]
pub trait TextReader: Send + Sync {
    async fn read_text(&self, region: &RgbaImage) -> Result<Vec<String>, RecognizeError>;
}

/// Debug output produced alongside each screenshot.
#[async_trait]
pub trait Artifacts: Send {
    /// Annotate the screenshot with every region and tap target.
    async fn render_overlay(&mut self, screen: &Path) -> Result<(), ArtifactError>;

    /// Keep a copy of the screenshot for later inspection.
    async fn archive(&mut self, screen: &Path) -> Result<(), ArtifactError>;
}

/// Artifact sink that writes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoArtifacts;

#[async_trait]
impl Artifacts for NoArtifacts {
    async fn render_overlay(&mut self, _screen: &Path) -> Result<(), ArtifactError> {
        Ok(())
    }

    async fn archive(&mut self, _screen: &Path) -> Result<(), ArtifactError> {
        Ok(())
    }
}
