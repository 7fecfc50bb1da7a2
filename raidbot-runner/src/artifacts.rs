//! Per-run files: the working screenshot, the debug overlay, and the loot dataset.
//!
//! Several bots can share one working directory; every path carries the run
//! tag so instances never overwrite each other.
use async_trait::async_trait;
use chrono::Local;
use image::{Rgba, RgbaImage};
use raidbot_engine::{ArtifactError, Artifacts, BotConfig, Point, Region};
use tokio::fs;
use std::path::{Path, PathBuf};

const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
const YELLOW: Rgba<u8> = Rgba([255, 255, 0, 255]);
const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const PURPLE: Rgba<u8> = Rgba([160, 32, 240, 255]);

const SLOT_RADIUS: u32 = 12;
const TARGET_RADIUS: u32 = 12;
const STROKE: u32 = 2;

/// `RUN_TAG`, then `--run-tag`, then the serial with `:` made path-safe.
#[must_use]
pub fn run_tag(env_tag: Option<String>, flag: Option<&str>, serial: &str) -> String {
    env_tag
        .filter(|tag| !tag.trim().is_empty())
        .or_else(|| flag.map(str::to_string))
        .unwrap_or_else(|| serial.to_string())
        .replace(':', "_")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub screen: PathBuf,
    pub overlay: PathBuf,
    pub dataset: PathBuf,
}

impl RunPaths {
    #[must_use]
    pub fn new(work_dir: &Path, tag: &str) -> Self {
        Self {
            screen: work_dir.join(format!("screen_{tag}.png")),
            overlay: work_dir.join(format!("debug_full_overlay_{tag}.png")),
            dataset: work_dir.join("loot_dataset").join(tag),
        }
    }
}

/// Everything the overlay marks on a screenshot.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayMarks {
    pub regions: Vec<Region>,
    pub slots: Vec<Point>,
    pub deploy: Vec<Point>,
    pub returns: Vec<Point>,
    pub next: Point,
}

impl OverlayMarks {
    #[must_use]
    pub fn from_config(config: &BotConfig) -> Self {
        let layout = &config.layout;
        Self {
            regions: config
                .regions
                .labelled()
                .into_iter()
                .map(|(_, region)| region)
                .collect(),
            slots: layout.slots().collect(),
            deploy: vec![layout.deploy_primary, layout.deploy_secondary],
            returns: layout.return_taps.clone(),
            next: layout.next_button,
        }
    }
}

/// Draw every mark onto `image`; shapes running off the edge are clipped.
pub fn draw_overlay(image: &mut RgbaImage, marks: &OverlayMarks) {
    for region in &marks.regions {
        draw_rect(image, *region, GREEN);
    }
    for &slot in &marks.slots {
        draw_ring(image, slot, SLOT_RADIUS, BLUE);
    }
    for &point in &marks.deploy {
        draw_ring(image, point, TARGET_RADIUS, YELLOW);
    }
    for &point in &marks.returns {
        draw_ring(image, point, TARGET_RADIUS, RED);
    }
    draw_ring(image, marks.next, TARGET_RADIUS, PURPLE);
}

fn put(image: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
        return;
    };
    if x < image.width() && y < image.height() {
        image.put_pixel(x, y, color);
    }
}

fn draw_rect(image: &mut RgbaImage, region: Region, color: Rgba<u8>) {
    if region.is_empty() {
        return;
    }
    let (x1, y1) = (i64::from(region.x1), i64::from(region.y1));
    let (x2, y2) = (i64::from(region.x2) - 1, i64::from(region.y2) - 1);
    for t in 0..i64::from(STROKE) {
        for x in x1..=x2 {
            put(image, x, y1 + t, color);
            put(image, x, y2 - t, color);
        }
        for y in y1..=y2 {
            put(image, x1 + t, y, color);
            put(image, x2 - t, y, color);
        }
    }
}

fn draw_ring(image: &mut RgbaImage, center: Point, radius: u32, color: Rgba<u8>) {
    let r = i64::from(radius);
    let inner = (r - i64::from(STROKE)).max(0);
    let (cx, cy) = (i64::from(center.x), i64::from(center.y));
    for dy in -r..=r {
        for dx in -r..=r {
            let d2 = dx * dx + dy * dy;
            if d2 <= r * r && d2 > inner * inner {
                put(image, cx + dx, cy + dy, color);
            }
        }
    }
}

/// Writes the overlay and the dataset copy next to each screenshot.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    paths: RunPaths,
    marks: OverlayMarks,
}

impl ArtifactWriter {
    #[must_use]
    pub fn new(paths: RunPaths, config: &BotConfig) -> Self {
        Self {
            paths,
            marks: OverlayMarks::from_config(config),
        }
    }
}

#[async_trait]
impl Artifacts for ArtifactWriter {
    async fn render_overlay(&mut self, screen: &Path) -> Result<(), ArtifactError> {
        let (screen, overlay, marks) = (
            screen.to_path_buf(),
            self.paths.overlay.clone(),
            self.marks.clone(),
        );
        tokio::task::spawn_blocking(move || -> Result<(), ArtifactError> {
            let mut image = image::open(screen)?.to_rgba8();
            draw_overlay(&mut image, &marks);
            image.save(overlay)?;
            Ok(())
        })
        .await?
    }

    async fn archive(&mut self, screen: &Path) -> Result<(), ArtifactError> {
        fs::create_dir_all(&self.paths.dataset).await?;
        let name = format!("loot_{}.png", Local::now().format("%Y%m%d_%H%M%S"));
        fs::copy(screen, self.paths.dataset.join(name)).await?;
        Ok(())
    }
}
