use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use raidbot_engine::{
    Bot, BotConfig, CounterAfterRecovery, Decision, Device, DeviceError, HumanDelays,
    InterruptToken, Jitter, LootPolicy, Point, Reading, RecognizeError, SessionOutcome,
    TextReader, Verdict,
};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Action {
    Capture,
    Tap(Point),
    Hold(Point),
}

#[derive(Debug, Clone, Copy)]
struct Event {
    at: Duration,
    action: Action,
}

type Log = Arc<Mutex<Vec<Event>>>;

/// Records every call and writes a plain screenshot to the capture path.
struct ScriptedDevice {
    started: Instant,
    log: Log,
    taps: usize,
    raise_on_tap: Option<(usize, InterruptToken)>,
    offline: bool,
}

impl ScriptedDevice {
    fn new() -> (Self, Log) {
        let log = Log::default();
        let device = Self {
            started: Instant::now(),
            log: Arc::clone(&log),
            taps: 0,
            raise_on_tap: None,
            offline: false,
        };
        (device, log)
    }

    fn raising_on_tap(mut self, nth: usize, token: InterruptToken) -> Self {
        self.raise_on_tap = Some((nth, token));
        self
    }

    /// Every capture and tap fails after being logged.
    fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    fn unreachable(&self, command: &str) -> Result<(), DeviceError> {
        if self.offline {
            return Err(DeviceError::Command {
                command: command.to_string(),
                detail: "device offline".to_string(),
            });
        }
        Ok(())
    }

    fn push(&self, action: Action) {
        self.log.lock().expect("log lock").push(Event {
            at: self.started.elapsed(),
            action,
        });
    }
}

#[async_trait]
impl Device for ScriptedDevice {
    async fn ensure_connected(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    async fn capture_screen(&mut self, path: &Path) -> Result<(), DeviceError> {
        self.push(Action::Capture);
        self.unreachable("screencap")?;
        RgbaImage::from_pixel(320, 240, Rgba([40, 40, 40, 255]))
            .save(path)
            .map_err(|err| DeviceError::Command {
                command: "save".to_string(),
                detail: err.to_string(),
            })
    }

    async fn tap(&mut self, at: Point) -> Result<(), DeviceError> {
        self.push(Action::Tap(at));
        self.taps += 1;
        if let Some((nth, token)) = &self.raise_on_tap
            && *nth == self.taps
        {
            token.raise();
        }
        self.unreachable("input tap")
    }

    async fn tap_and_hold(&mut self, at: Point, _duration: Duration) -> Result<(), DeviceError> {
        self.push(Action::Hold(at));
        Ok(())
    }
}

/// Hands out one queued line per region; an empty queue reads as nothing.
/// A `None` entry is an engine failure.
#[derive(Default)]
struct ScriptedReader {
    lines: Mutex<VecDeque<Option<String>>>,
}

impl ScriptedReader {
    fn reading(self, gold: u64, elixir: u64, dark: u64) -> Self {
        {
            let mut lines = self.lines.lock().expect("reader lock");
            for value in [gold, elixir, dark] {
                lines.push_back(Some(value.to_string()));
            }
        }
        self
    }

    /// Captures that recognize nothing.
    fn blank(self, captures: usize) -> Self {
        {
            let mut lines = self.lines.lock().expect("reader lock");
            for _ in 0..captures * 3 {
                lines.push_back(Some(String::new()));
            }
        }
        self
    }

    fn line(self, text: &str) -> Self {
        self.lines
            .lock()
            .expect("reader lock")
            .push_back(Some(text.to_string()));
        self
    }

    fn engine_failure(self) -> Self {
        self.lines.lock().expect("reader lock").push_back(None);
        self
    }
}

#[async_trait]
impl TextReader for ScriptedReader {
    async fn read_text(&self, _region: &RgbaImage) -> Result<Vec<String>, RecognizeError> {
        let next = self.lines.lock().expect("reader lock").pop_front();
        match next {
            Some(Some(line)) => Ok(vec![line]),
            Some(None) => Err(RecognizeError::Engine("tesseract exited with 1".to_string())),
            None => Ok(vec![String::new()]),
        }
    }
}

fn temp_path(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "raidbot-loop-{label}-{}.png",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

fn config(max_cycles: u64) -> BotConfig {
    let mut config = BotConfig::default();
    config.timing.human = HumanDelays::none();
    config.session.max_cycles = Some(max_cycles);
    config
}

fn bot(
    device: ScriptedDevice,
    reader: ScriptedReader,
    config: BotConfig,
    label: &str,
) -> Bot<ScriptedDevice, ScriptedReader> {
    Bot::new(device, reader, config, temp_path(label)).with_jitter(Jitter::seeded(9))
}

fn taps(log: &Log) -> Vec<Point> {
    log.lock()
        .expect("log lock")
        .iter()
        .filter_map(|event| match event.action {
            Action::Tap(at) => Some(at),
            _ => None,
        })
        .collect()
}

fn count(log: &Log, wanted: fn(&Action) -> bool) -> usize {
    log.lock()
        .expect("log lock")
        .iter()
        .filter(|event| wanted(&event.action))
        .count()
}

#[tokio::test(start_paused = true)]
async fn low_loot_taps_next() {
    let (device, log) = ScriptedDevice::new();
    let reader = ScriptedReader::default().reading(300_000, 250_000, 1_000);
    let cfg = config(1);
    let next = cfg.layout.next_button;

    let stats = bot(device, reader, cfg, "skip").run().await;

    assert_eq!(taps(&log), vec![next]);
    assert_eq!(stats.skips, 1);
    assert_eq!(stats.attacks, 0);
    assert_eq!(stats.outcome, Some(SessionOutcome::CycleLimit));
    assert_eq!(stats.decisions[0].decision, Decision::Skip);
    assert!(stats.elapsed >= Duration::from_millis(6500));
}

#[tokio::test(start_paused = true)]
async fn rich_base_is_attacked_then_bot_returns_home() {
    let (device, log) = ScriptedDevice::new();
    let reader = ScriptedReader::default().reading(900_000, 850_000, 10);
    let cfg = config(1);
    let extra = cfg.layout.extra_post_attack_taps.clone();
    let home = cfg.layout.return_taps.clone();

    let stats = bot(device, reader, cfg, "attack").run().await;

    let taps = taps(&log);
    // toolbar + drops with no heroes, then the fixed post-attack taps
    assert_eq!(taps.len(), 11 + extra.len() + home.len());
    let tail: Vec<Point> = extra.iter().chain(home.iter()).copied().collect();
    assert_eq!(&taps[taps.len() - tail.len()..], tail.as_slice());
    assert_eq!(count(&log, |a| matches!(a, Action::Hold(_))), 1);
    assert_eq!(stats.attacks, 1);
    assert_eq!(stats.decisions[0].rationale, "all minimums met");
    assert!(stats.elapsed >= Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn heroes_take_their_slots_before_spells() {
    let (device, log) = ScriptedDevice::new();
    let reader = ScriptedReader::default().reading(1_300_000, 0, 0);
    let mut cfg = config(1);
    cfg.heroes = 2;
    let spells_slot = cfg.layout.slot(5).expect("slot 5");
    let first_hero = cfg.layout.slot(3).expect("slot 3");

    let stats = bot(device, reader, cfg, "heroes").run().await;

    let taps = taps(&log);
    assert_eq!(stats.decisions[0].rationale, "gold override");
    // first hero slot is tapped twice: deploy, then ability
    assert_eq!(taps.iter().filter(|&&p| p == first_hero).count(), 2);
    assert!(taps.contains(&spells_slot));
}

#[tokio::test(start_paused = true)]
async fn zero_reading_retries_capture_before_giving_up() {
    let (device, log) = ScriptedDevice::new();
    let reader = ScriptedReader::default().blank(1).reading(100, 100, 0);
    let stats = bot(device, reader, config(1), "retry").run().await;

    assert_eq!(count(&log, |a| matches!(a, Action::Capture)), 2);
    assert_eq!(stats.ocr_retries, 1);
    assert_eq!(stats.zero_readings, 0);
    assert_eq!(stats.decisions[0].reading.gold, 100);
}

#[tokio::test(start_paused = true)]
async fn recovery_fires_once_per_threshold_crossing() {
    let (device, log) = ScriptedDevice::new();
    let cfg = config(14);
    let recovery = cfg.layout.recovery_taps.clone();
    let next = cfg.layout.next_button;

    let stats = bot(device, ScriptedReader::default(), cfg, "recover").run().await;

    assert_eq!(stats.zero_readings, 14);
    assert_eq!(stats.ocr_retries, 28);
    assert_eq!(stats.recoveries, 2);
    assert_eq!(stats.skips, 12);
    assert_eq!(count(&log, |a| matches!(a, Action::Capture)), 42);

    let taps = taps(&log);
    let mut expected = Vec::new();
    for _ in 0..2 {
        expected.extend(std::iter::repeat_n(next, 6));
        expected.extend(recovery.iter().copied());
    }
    assert_eq!(taps, expected);
}

#[tokio::test(start_paused = true)]
async fn kept_counter_recovers_every_cycle_past_threshold() {
    let (device, _log) = ScriptedDevice::new();
    let mut cfg = config(9);
    cfg.failure.after_recovery = CounterAfterRecovery::Keep;

    let stats = bot(device, ScriptedReader::default(), cfg, "keep").run().await;

    assert_eq!(stats.recoveries, 3);
    assert_eq!(stats.skips, 6);
}

#[tokio::test(start_paused = true)]
async fn good_reading_resets_zero_streak() {
    let (device, _log) = ScriptedDevice::new();
    // six zero cycles, one readable base, six more zero cycles
    let reader = ScriptedReader::default()
        .blank(18)
        .reading(10, 10, 0)
        .blank(18);

    let stats = bot(device, reader, config(13), "streak").run().await;

    assert_eq!(stats.zero_readings, 12);
    assert_eq!(stats.recoveries, 0);
    assert_eq!(stats.skips, 13);
}

#[tokio::test(start_paused = true)]
async fn click_aborts_deploy_and_pauses_before_interrupt_taps() {
    let token = InterruptToken::new();
    let (device, log) = ScriptedDevice::new();
    // third tap selects the heavy troop; the hold never happens
    let device = device.raising_on_tap(3, token.clone());
    let reader = ScriptedReader::default().reading(900_000, 900_000, 0);
    let cfg = config(1);
    let interrupt_taps = cfg.layout.interrupt_taps.clone();

    let stats = Bot::new(device, reader, cfg, temp_path("interrupt"))
        .with_jitter(Jitter::seeded(3))
        .with_token(token.clone())
        .run()
        .await;

    let events = log.lock().expect("log lock").clone();
    let taps: Vec<Event> = events
        .iter()
        .filter(|e| matches!(e.action, Action::Tap(_)))
        .copied()
        .collect();
    assert_eq!(taps.len(), 3 + interrupt_taps.len());
    assert!(!events.iter().any(|e| matches!(e.action, Action::Hold(_))));

    let raised_at = taps[2].at;
    let first_recovery = taps[3];
    assert_eq!(first_recovery.action, Action::Tap(interrupt_taps[0]));
    assert!(first_recovery.at >= raised_at + Duration::from_secs(120));
    assert!(taps[4].at >= first_recovery.at + Duration::from_millis(750));

    assert_eq!(stats.interrupts, 1);
    assert_eq!(stats.attacks, 1);
    assert!(!token.is_raised());
}

#[tokio::test(start_paused = true)]
async fn session_times_out_within_one_cycle() {
    let (device, _log) = ScriptedDevice::new();
    let reader = ScriptedReader::default()
        .reading(1, 1, 1)
        .reading(1, 1, 1)
        .reading(1, 1, 1)
        .reading(1, 1, 1)
        .reading(1, 1, 1);
    let mut cfg = config(0);
    cfg.session.max_cycles = None;
    cfg.session.budget = Duration::from_secs(30);

    let stats = bot(device, reader, cfg, "timeout").run().await;

    // each skip cycle is 1.5 s settle plus 5 s wait
    assert_eq!(stats.outcome, Some(SessionOutcome::Timeout));
    assert_eq!(stats.cycles, 5);
    assert!(stats.elapsed >= Duration::from_secs(30));
    assert!(stats.elapsed <= Duration::from_millis(36_500));
}

#[tokio::test(start_paused = true)]
async fn keepalive_taps_until_user_clicks() {
    let token = InterruptToken::new();
    let (device, log) = ScriptedDevice::new();
    let reader = ScriptedReader::default()
        .reading(1, 1, 1)
        .reading(1, 1, 1)
        .reading(1, 1, 1);
    let mut cfg = config(3);
    cfg.session.budget = Duration::from_secs(10);
    cfg.session.keepalive = true;
    let anchor = cfg.layout.keepalive_tap;

    let clicker = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(413)).await;
        clicker.raise();
    });

    let stats = bot(device, reader, cfg, "keepalive")
        .with_token(token)
        .run()
        .await;

    assert_eq!(stats.keepalive_taps, 3);
    assert_eq!(stats.interrupts, 1);
    assert_eq!(stats.cycles, 3);
    assert_eq!(stats.outcome, Some(SessionOutcome::CycleLimit));

    let near_anchor = taps(&log)
        .into_iter()
        .filter(|p| (p.x - anchor.x).abs() <= 8 && (p.y - anchor.y).abs() <= 8)
        .count();
    assert_eq!(near_anchor, 3);
}

#[tokio::test(start_paused = true)]
async fn offline_device_is_logged_and_loop_keeps_cycling() {
    let (device, log) = ScriptedDevice::new();
    let stats = bot(device.offline(), ScriptedReader::default(), config(3), "offline")
        .run()
        .await;

    assert_eq!(stats.cycles, 3);
    assert_eq!(stats.outcome, Some(SessionOutcome::CycleLimit));
    // three failed captures per cycle (first try plus two retries) and one failed Next tap
    assert_eq!(count(&log, |a| matches!(a, Action::Capture)), 9);
    assert_eq!(stats.transport_errors, 12);
    assert_eq!(stats.zero_readings, 3);
    assert_eq!(stats.skips, 3);
    assert_eq!(stats.recognition_errors, 0);
}

#[tokio::test(start_paused = true)]
async fn failed_recognition_counts_as_zero_for_that_region() {
    let (device, log) = ScriptedDevice::new();
    let reader = ScriptedReader::default()
        .line("900,000")
        .engine_failure()
        .line("10");
    let cfg = config(1);
    let next = cfg.layout.next_button;

    let stats = bot(device, reader, cfg, "ocr-fail").run().await;

    assert_eq!(stats.recognition_errors, 1);
    assert_eq!(stats.ocr_retries, 0);
    assert_eq!(stats.decisions[0].reading, Reading::new(900_000, 0, 10));
    assert_eq!(stats.decisions[0].decision, Decision::Skip);
    assert_eq!(taps(&log), vec![next]);
    assert_eq!(stats.transport_errors, 0);
}

struct AttackEverything;

impl LootPolicy for AttackEverything {
    fn name(&self) -> &'static str {
        "attack-everything"
    }

    fn judge(&self, _reading: &Reading) -> Verdict {
        Verdict {
            decision: Decision::Attack,
            rationale: "always",
        }
    }
}

#[tokio::test(start_paused = true)]
async fn custom_policy_overrides_thresholds() {
    let (device, log) = ScriptedDevice::new();
    let reader = ScriptedReader::default().reading(10, 10, 0);
    let cfg = config(1);
    let next = cfg.layout.next_button;

    let stats = bot(device, reader, cfg, "policy")
        .with_policy(Box::new(AttackEverything))
        .run()
        .await;

    assert_eq!(stats.attacks, 1);
    assert_eq!(stats.decisions[0].rationale, "always");
    assert!(!taps(&log).contains(&next));
}
