//! The attack-decision loop.
//!
//! Each cycle captures the scouting screen, reads the three loot numbers, and
//! either attacks or taps Next. Every wait and every tap is a suspension point
//! where a raised [`InterruptToken`] unwinds the cycle with [`Interrupted`].
use image::imageops;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::BotConfig;
use crate::counter::FailureCounter;
use crate::decision::{Decision, LootPolicy, ThresholdPolicy};
use crate::device::{ArtifactError, Artifacts, Device, DeviceError, NoArtifacts, TextReader};
use crate::geometry::Point;
use crate::interrupt::{InterruptToken, Interrupted, Step};
use crate::jitter::Jitter;
use crate::reading::{Reading, parse_amount};
use crate::stats::{DecisionRecord, SessionOutcome, SessionStats};

pub struct Bot<D, R, A = NoArtifacts> {
    pub(crate) device: D,
    reader: R,
    artifacts: A,
    policy: Box<dyn LootPolicy>,
    pub(crate) config: BotConfig,
    pub(crate) token: InterruptToken,
    pub(crate) jitter: Jitter,
    counter: FailureCounter,
    pub(crate) stats: SessionStats,
    screen_path: PathBuf,
    pub(crate) tag: String,
}

impl<D: Device, R: TextReader> Bot<D, R, NoArtifacts> {
    #[must_use]
    pub fn new(device: D, reader: R, config: BotConfig, screen_path: impl Into<PathBuf>) -> Self {
        let policy = Box::new(ThresholdPolicy::new(config.thresholds.clone()));
        Self {
            device,
            reader,
            artifacts: NoArtifacts,
            policy,
            counter: FailureCounter::new(&config.failure),
            config,
            token: InterruptToken::new(),
            jitter: Jitter::from_entropy(),
            stats: SessionStats::new("bot"),
            screen_path: screen_path.into(),
            tag: "bot".to_string(),
        }
    }
}

impl<D: Device, R: TextReader, A: Artifacts> Bot<D, R, A> {
    #[must_use]
    pub fn with_artifacts<B: Artifacts>(self, artifacts: B) -> Bot<D, R, B> {
        Bot {
            device: self.device,
            reader: self.reader,
            artifacts,
            policy: self.policy,
            config: self.config,
            token: self.token,
            jitter: self.jitter,
            counter: self.counter,
            stats: self.stats,
            screen_path: self.screen_path,
            tag: self.tag,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: InterruptToken) -> Self {
        self.token = token;
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: Box<dyn LootPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Prefix for every log line; usually the device serial.
    #[must_use]
    pub fn with_run_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self.stats.run_tag.clone_from(&self.tag);
        self
    }

    /// Run until the session budget (or cycle limit) is exhausted.
    pub async fn run(mut self) -> SessionStats {
        info!(
            "[{}] Starting loop with policy {} | budget {:?} | heroes {}",
            self.tag,
            self.policy.name(),
            self.config.session.budget,
            self.config.heroes
        );
        let loop_started = Instant::now();
        let mut session_started = Instant::now();

        let outcome = loop {
            if self.token.is_raised() {
                self.handle_interrupt().await;
                session_started = Instant::now();
                self.counter.reset();
                continue;
            }

            if let Some(limit) = self.config.session.max_cycles
                && self.stats.cycles >= limit
            {
                info!("[{}] Cycle limit {limit} reached. Stopping.", self.tag);
                break SessionOutcome::CycleLimit;
            }

            if session_started.elapsed() >= self.config.session.budget {
                if !self.config.session.keepalive {
                    info!("[{}] Timeout reached. Stopping.", self.tag);
                    break SessionOutcome::Timeout;
                }
                self.keep_alive().await;
                session_started = Instant::now();
                self.counter.reset();
                continue;
            }

            self.stats.cycles += 1;
            let cycle = self.stats.cycles;
            if let Err(Interrupted) = self.cycle(cycle, loop_started).await {
                info!("[{}] Restarting loop due to user interaction...", self.tag);
            }
        };

        self.stats.outcome = Some(outcome);
        self.stats.elapsed = loop_started.elapsed();
        self.stats
    }

    async fn cycle(&mut self, cycle: u64, loop_started: Instant) -> Step {
        info!("[{}] ========== cycle {cycle} ==========", self.tag);
        if let Err(err) = self.device.ensure_connected().await {
            self.transport_failed("ensure connection", &err);
        }

        let reading = self.acquire_reading().await?;
        let zero = reading.is_zero();
        let recover = self.counter.record(zero);
        if zero {
            self.stats.zero_readings += 1;
            warn!(
                "[{}] Consecutive zero loot count: {}",
                self.tag,
                self.counter.count()
            );
        }

        if recover {
            warn!(
                "[{}] {} consecutive zero loot results. Performing recovery taps...",
                self.tag,
                self.counter.count()
            );
            self.stats.recoveries += 1;
            let taps = self.config.layout.recovery_taps.clone();
            self.tap_sequence(&taps).await?;
            self.counter.recovered();
            return Ok(());
        }

        let verdict = self.policy.judge(&reading);
        self.stats.record_decision(DecisionRecord {
            cycle,
            reading,
            decision: verdict.decision,
            rationale: verdict.rationale.to_string(),
            at: loop_started.elapsed(),
        });

        match verdict.decision {
            Decision::Attack => {
                self.stats.attacks += 1;
                info!(
                    "[{}] Loot is sufficient ({}). Attacking base...",
                    self.tag, verdict.rationale
                );
                self.deploy_troops().await?;

                let wait = self.config.timing.post_attack_wait;
                info!("[{}] Waiting {wait:?}...", self.tag);
                self.pause(wait).await?;

                info!("[{}] Performing extra post-attack taps...", self.tag);
                let extra = self.config.layout.extra_post_attack_taps.clone();
                self.tap_sequence(&extra).await?;

                info!("[{}] Returning to base...", self.tag);
                let back = self.config.layout.return_taps.clone();
                self.tap_sequence(&back).await?;
            }
            Decision::Skip => {
                self.stats.skips += 1;
                info!(
                    "[{}] {} ({reading}). Tapping 'Next'...",
                    self.tag, verdict.rationale
                );
                self.tap(self.config.layout.next_button).await?;
                self.pause(self.config.timing.skip_wait).await?;
            }
        }
        Ok(())
    }

    /// Read the screen, re-capturing up to `zero_retries` times while nothing is recognized.
    async fn acquire_reading(&mut self) -> Step<Reading> {
        let mut reading = self.capture_and_read().await?;
        let mut attempt = 0;
        while reading.is_zero() && attempt < self.config.failure.zero_retries {
            attempt += 1;
            self.stats.ocr_retries += 1;
            warn!(
                "[{}] Loot 0,0,0 detected. Retrying OCR attempt {attempt}...",
                self.tag
            );
            self.pause(self.config.timing.zero_retry_delay).await?;
            reading = self.capture_and_read().await?;
        }
        Ok(reading)
    }

    async fn capture_and_read(&mut self) -> Step<Reading> {
        self.token.checkpoint()?;
        info!("[{}] Taking screenshot...", self.tag);
        if let Err(err) = self.device.capture_screen(&self.screen_path).await {
            self.transport_failed("screenshot", &err);
        }
        let overlay = self.artifacts.render_overlay(&self.screen_path).await;
        self.artifact_result("debug overlay", overlay);

        self.pause(self.config.timing.settle).await?;

        let archived = self.artifacts.archive(&self.screen_path).await;
        self.artifact_result("loot dataset", archived);

        Ok(self.read_loot().await)
    }

    async fn read_loot(&mut self) -> Reading {
        let path = self.screen_path.clone();
        let decoded =
            tokio::task::spawn_blocking(move || image::open(path).map(|image| image.to_rgba8()))
                .await;
        let screen = match decoded {
            Ok(Ok(screen)) => screen,
            Ok(Err(err)) => {
                warn!("[{}] Could not load screenshot: {err}", self.tag);
                return Reading::ZERO;
            }
            Err(err) => {
                warn!("[{}] Screenshot decode task failed: {err}", self.tag);
                return Reading::ZERO;
            }
        };

        let mut amounts = [0_u64; 3];
        for (amount, (label, region)) in amounts.iter_mut().zip(self.config.regions.labelled()) {
            let Some(area) = region.clamp_to(screen.width(), screen.height()) else {
                warn!("[{}] {label} region {region} is outside the screenshot", self.tag);
                continue;
            };
            let crop =
                imageops::crop_imm(&screen, area.x1, area.y1, area.width(), area.height())
                    .to_image();
            match self.reader.read_text(&crop).await {
                Ok(fragments) => *amount = parse_amount(&fragments),
                Err(err) => {
                    self.stats.recognition_errors += 1;
                    warn!("[{}] OCR failed for {label}: {err}", self.tag);
                }
            }
        }

        let reading = Reading::new(amounts[0], amounts[1], amounts[2]);
        info!("[OCR-{}] {reading}", self.tag);
        reading
    }

    /// The 2-minute break after a user click. Not interruptible itself.
    async fn handle_interrupt(&mut self) {
        self.stats.interrupts += 1;
        let pause = self.config.timing.interrupt_pause;
        info!(
            "[watch-{}] Detected system-wide click. Pausing for {pause:?}...",
            self.tag
        );
        tokio::time::sleep(pause).await;

        info!("[watch-{}] Performing user-interrupt recovery taps...", self.tag);
        let taps = self.config.layout.interrupt_taps.clone();
        for at in taps {
            if let Err(err) = self.device.tap(at).await {
                self.transport_failed("tap", &err);
            }
            tokio::time::sleep(self.config.timing.interrupt_gap).await;
        }
        self.token.clear();
        info!("[watch-{}] Resuming main loop.", self.tag);
    }

    /// Tap an anti-sleep point every couple of minutes until the user clicks.
    async fn keep_alive(&mut self) {
        info!(
            "[keepalive-{}] Timeout reached. Entering keep-alive mode (prevent sleep).",
            self.tag
        );
        loop {
            if self.token.is_raised() {
                info!("[keepalive-{}] User click detected.", self.tag);
                self.handle_interrupt().await;
                return;
            }

            let timing = &self.config.timing;
            let wait = self
                .jitter
                .around(timing.keepalive_interval, timing.keepalive_jitter);
            if self.token.sleep(wait).await.is_err() {
                continue;
            }

            let layout = &self.config.layout;
            let at = self
                .jitter
                .spread(layout.keepalive_tap, layout.keepalive_spread);
            info!("[keepalive-{}] Anti-sleep tap at {at}", self.tag);
            if let Err(err) = self.device.tap(at).await {
                self.transport_failed("tap", &err);
            }
            self.stats.keepalive_taps += 1;
        }
    }

    pub(crate) async fn pause(&self, duration: Duration) -> Step {
        self.token.sleep(duration).await
    }

    pub(crate) async fn tap(&mut self, at: Point) -> Step {
        self.token.checkpoint()?;
        debug!("[{}] tap {at}", self.tag);
        if let Err(err) = self.device.tap(at).await {
            self.transport_failed("tap", &err);
        }
        Ok(())
    }

    pub(crate) async fn hold(&mut self, at: Point, duration: Duration) -> Step {
        self.token.checkpoint()?;
        debug!("[{}] hold {at} for {duration:?}", self.tag);
        if let Err(err) = self.device.tap_and_hold(at, duration).await {
            self.transport_failed("tap and hold", &err);
        }
        Ok(())
    }

    /// Fixed taps, each followed by the sequence gap.
    async fn tap_sequence(&mut self, taps: &[Point]) -> Step {
        let gap = self.config.timing.sequence_gap;
        for &at in taps {
            self.tap(at).await?;
            self.pause(gap).await?;
        }
        Ok(())
    }

    fn transport_failed(&mut self, action: &str, err: &DeviceError) {
        self.stats.transport_errors += 1;
        warn!("[{}] {action} failed: {err}", self.tag);
    }

    fn artifact_result(&mut self, what: &str, result: Result<(), ArtifactError>) {
        if let Err(err) = result {
            self.stats.artifact_errors += 1;
            warn!("[{}] {what} not written: {err}", self.tag);
        }
    }
}
