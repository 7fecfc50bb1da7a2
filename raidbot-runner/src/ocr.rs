//! Tesseract adapter for the loot regions.
use async_trait::async_trait;
use image::{ImageFormat, RgbaImage};
use raidbot_engine::{RecognizeError, TextReader};
use std::io::Cursor;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Single text line, digits and thousands separators only.
pub const TESSERACT_ARGS: [&str; 6] = [
    "stdin",
    "stdout",
    "--psm",
    "7",
    "-c",
    "tessedit_char_whitelist=0123456789,",
];

#[derive(Debug, Clone)]
pub struct TesseractReader {
    binary: PathBuf,
}

impl TesseractReader {
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

/// Non-empty trimmed lines of engine output.
#[must_use]
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl TextReader for TesseractReader {
    async fn read_text(&self, region: &RgbaImage) -> Result<Vec<String>, RecognizeError> {
        let mut png = Vec::new();
        region.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        let mut child = Command::new(&self.binary)
            .args(TESSERACT_ARGS)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&png).await?;
        }
        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(RecognizeError::Engine(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(split_lines(&String::from_utf8_lossy(&output.stdout)))
    }
}
