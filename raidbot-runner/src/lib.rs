//! Raidbot Runner
//!
//! Concrete collaborators for the raidbot engine: the `adb` device transport,
//! the Tesseract text reader, per-run artifacts, the click watcher, the hero
//! prompt and the session reports used by the `raidbot` binary.

pub mod adb;
pub mod artifacts;
pub mod ocr;
pub mod prompt;
pub mod reports;
pub mod watcher;

pub use adb::{AdbDevice, requested_serial};
pub use artifacts::{ArtifactWriter, RunPaths, run_tag};
pub use ocr::TesseractReader;
