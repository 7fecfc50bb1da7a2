//! `adb` transport: device selection, screenshots and input events.
use async_trait::async_trait;
use image::DynamicImage;
use log::{debug, info, warn};
use raidbot_engine::{Device, DeviceError, Point};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;

const CAPTURE_ATTEMPTS: u32 = 3;
/// Wait after every screencap so the PNG is fully flushed.
const CAPTURE_SETTLE: Duration = Duration::from_millis(400);
const CAPTURE_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Serial pinned by flag, `ANDROID_SERIAL` or `ADB_SERIAL`, in that order.
#[must_use]
pub fn requested_serial(flag: Option<String>) -> Option<String> {
    pick_serial(
        flag,
        std::env::var("ANDROID_SERIAL").ok(),
        std::env::var("ADB_SERIAL").ok(),
    )
}

fn pick_serial(
    flag: Option<String>,
    android: Option<String>,
    adb: Option<String>,
) -> Option<String> {
    [flag, android, adb]
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

/// `host:port` serials are TCP devices that need `adb connect`.
#[must_use]
pub fn is_network_serial(serial: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\d{1,3}(\.\d{1,3}){3}:\d{1,5}$").expect("static regex"))
        .is_match(serial)
}

/// Serials from `adb devices` output that are in state `device`.
#[must_use]
pub fn parse_devices(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter(|line| !line.starts_with("List of devices") && !line.starts_with('*'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some(serial), Some("device")) => Some(serial.to_string()),
                _ => None,
            }
        })
        .collect()
}

/// True when every channel of every pixel is 0, or every one is 255.
#[must_use]
pub fn is_blank(screen: &DynamicImage) -> bool {
    let rgb = screen.to_rgb8();
    let raw = rgb.as_raw();
    raw.is_empty() || raw.iter().all(|&c| c == 0) || raw.iter().all(|&c| c == u8::MAX)
}

async fn adb(binary: &Path, args: &[&str]) -> Result<Vec<u8>, DeviceError> {
    debug!("adb {}", args.join(" "));
    let output = Command::new(binary).args(args).output().await?;
    if !output.status.success() {
        return Err(DeviceError::Command {
            command: format!("adb {}", args.join(" ")),
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

async fn list_devices(binary: &Path) -> Result<Vec<String>, DeviceError> {
    let stdout = adb(binary, &["devices"]).await?;
    Ok(parse_devices(&String::from_utf8_lossy(&stdout)))
}

async fn select_device(binary: &Path, requested: Option<&str>) -> Result<String, DeviceError> {
    let listed = list_devices(binary).await?;
    let Some(serial) = requested else {
        return listed.into_iter().next().ok_or_else(|| {
            DeviceError::NotFound("`adb devices` lists no device in state `device`".to_string())
        });
    };

    if listed.iter().any(|s| s == serial) {
        return Ok(serial.to_string());
    }
    if is_network_serial(serial) {
        info!("Connecting to {serial}...");
        if let Err(err) = adb(binary, &["connect", serial]).await {
            warn!("adb connect {serial} failed: {err}");
        }
        if list_devices(binary).await?.iter().any(|s| s == serial) {
            return Ok(serial.to_string());
        }
    }
    Err(DeviceError::NotFound(format!("{serial} is not attached")))
}

/// A device reached through the `adb` command-line client.
#[derive(Debug, Clone)]
pub struct AdbDevice {
    binary: PathBuf,
    serial: String,
    requested: Option<String>,
}

impl AdbDevice {
    /// Resolve the device to drive, connecting TCP serials first.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] when `adb` cannot be run or no matching device is attached.
    pub async fn connect(
        binary: impl Into<PathBuf>,
        requested: Option<String>,
    ) -> Result<Self, DeviceError> {
        let binary = binary.into();
        let serial = select_device(&binary, requested.as_deref()).await?;
        info!("Using device {serial}");
        Ok(Self {
            binary,
            serial,
            requested,
        })
    }

    #[must_use]
    pub fn serial(&self) -> &str {
        &self.serial
    }

    async fn shell(&self, args: &[&str]) -> Result<(), DeviceError> {
        let mut full = vec!["-s", self.serial.as_str(), "shell"];
        full.extend_from_slice(args);
        adb(&self.binary, &full).await.map(drop)
    }

    async fn capture_once(&self, path: &Path) -> Result<(), String> {
        let png = adb(
            &self.binary,
            &["-s", &self.serial, "exec-out", "screencap", "-p"],
        )
        .await
        .map_err(|err| err.to_string())?;
        tokio::fs::write(path, &png)
            .await
            .map_err(|err| format!("cannot write {}: {err}", path.display()))?;
        let screen = image::load_from_memory(&png).map_err(|err| format!("undecodable: {err}"))?;
        if is_blank(&screen) {
            return Err("blank screenshot".to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl Device for AdbDevice {
    async fn ensure_connected(&mut self) -> Result<(), DeviceError> {
        if list_devices(&self.binary).await?.contains(&self.serial) {
            return Ok(());
        }
        warn!("Device {} dropped off `adb devices`; reconnecting...", self.serial);
        let serial = match select_device(&self.binary, Some(&self.serial)).await {
            Ok(serial) => serial,
            Err(err) if self.requested.is_some() => return Err(err),
            Err(_) => select_device(&self.binary, None).await?,
        };
        if serial != self.serial {
            info!("Switched to device {serial}");
        }
        self.serial = serial;
        Ok(())
    }

    async fn capture_screen(&mut self, path: &Path) -> Result<(), DeviceError> {
        for attempt in 1..=CAPTURE_ATTEMPTS {
            let result = self.capture_once(path).await;
            tokio::time::sleep(CAPTURE_SETTLE).await;
            match result {
                Ok(()) => return Ok(()),
                Err(reason) => warn!(
                    "[{}] Screenshot attempt {attempt}/{CAPTURE_ATTEMPTS} failed: {reason}",
                    self.serial
                ),
            }
            if attempt < CAPTURE_ATTEMPTS {
                tokio::time::sleep(CAPTURE_RETRY_DELAY).await;
            }
        }
        Err(DeviceError::BlankScreen {
            attempts: CAPTURE_ATTEMPTS,
        })
    }

    async fn tap(&mut self, at: Point) -> Result<(), DeviceError> {
        let (x, y) = (at.x.to_string(), at.y.to_string());
        self.shell(&["input", "tap", &x, &y]).await
    }

    async fn tap_and_hold(&mut self, at: Point, duration: Duration) -> Result<(), DeviceError> {
        let (x, y) = (at.x.to_string(), at.y.to_string());
        let ms = duration.as_millis().to_string();
        self.shell(&["input", "swipe", &x, &y, &x, &y, &ms]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn parses_only_ready_devices() {
        let listing = "List of devices attached\n\
                       emulator-5554\tdevice\n\
                       127.0.0.1:5555\toffline\n\
                       R58M123ABC\tunauthorized\n\
                       192.168.1.20:5555\tdevice\n\n";
        assert_eq!(
            parse_devices(listing),
            vec!["emulator-5554".to_string(), "192.168.1.20:5555".to_string()]
        );
    }

    #[test]
    fn daemon_banner_is_ignored() {
        let listing = "* daemon not running; starting now at tcp:5037\n\
                       * daemon started successfully\n\
                       List of devices attached\n";
        assert!(parse_devices(listing).is_empty());
    }

    #[test]
    fn network_serials_need_host_and_port() {
        assert!(is_network_serial("127.0.0.1:5555"));
        assert!(is_network_serial("192.168.0.12:37001"));
        assert!(!is_network_serial("emulator-5554"));
        assert!(!is_network_serial("127.0.0.1"));
        assert!(!is_network_serial("localhost:5555"));
    }

    #[test]
    fn flag_beats_environment() {
        assert_eq!(
            pick_serial(
                Some("flag".into()),
                Some("android".into()),
                Some("adb".into())
            ),
            Some("flag".to_string())
        );
        assert_eq!(
            pick_serial(None, Some("  ".into()), Some("adb".into())),
            Some("adb".to_string())
        );
        assert_eq!(pick_serial(None, None, None), None);
    }

    #[test]
    fn uniform_black_or_white_is_blank() {
        let black = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])));
        let mut game = RgbImage::new(4, 4);
        game.put_pixel(1, 1, Rgb([30, 200, 60]));
        assert!(is_blank(&black));
        assert!(is_blank(&white));
        assert!(!is_blank(&DynamicImage::ImageRgb8(game)));
    }
}
