//! Immutable bot configuration.
//!
//! Every pixel coordinate, threshold and delay the loop uses lives here. The
//! defaults reproduce the farming layout for a 1600x960 emulator screen; a JSON
//! file can override any section (missing fields fall back to the defaults).
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::constants;
use crate::geometry::{Point, Region};

/// Errors raised when configuration invariants are violated.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{field} region is empty ({region})")]
    EmptyRegion { field: &'static str, region: Region },
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: u64,
        value: u64,
    },
    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },
    #[error("{field} delay range invalid (min {min:?} > max {max:?})")]
    DelayRange {
        field: &'static str,
        min: Duration,
        max: Duration,
    },
    #[error("hero count must be between 0 and {max} (got {value})")]
    HeroCount { max: u8, value: u8 },
    #[error("{field} must not be empty")]
    EmptySequence { field: &'static str },
}

/// What the consecutive-failure counter does once the recovery taps ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterAfterRecovery {
    /// Start counting from zero again: recovery fires once per threshold crossing.
    #[default]
    Reset,
    /// Leave the counter alone: recovery repeats every cycle until a non-zero reading.
    Keep,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub regions: LootRegions,
    pub thresholds: LootThresholds,
    pub layout: TapLayout,
    pub timing: Timing,
    pub failure: FailurePolicy,
    pub session: SessionConfig,
    /// Heroes available for deployment (0-5).
    pub heroes: u8,
}

/// Screen rectangles holding the three loot numbers of the scouted base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LootRegions {
    pub gold: Region,
    pub elixir: Region,
    pub dark: Region,
}

impl Default for LootRegions {
    fn default() -> Self {
        Self {
            gold: Region::new(65, 113, 205, 142),
            elixir: Region::new(65, 158, 205, 185),
            dark: Region::new(65, 198, 180, 228),
        }
    }
}

impl LootRegions {
    #[must_use]
    pub fn labelled(&self) -> [(&'static str, Region); 3] {
        [
            ("gold", self.gold),
            ("elixir", self.elixir),
            ("dark", self.dark),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LootThresholds {
    pub min_gold: u64,
    pub min_elixir: u64,
    pub min_dark: u64,
    /// Gold or elixir at or above this value is attacked regardless of the minimums.
    pub override_amount: u64,
}

impl Default for LootThresholds {
    fn default() -> Self {
        Self {
            min_gold: 800_000,
            min_elixir: 800_000,
            min_dark: 0,
            override_amount: 1_200_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapLayout {
    /// Leftmost toolbar slot; the others follow at `slot_spacing` to the right.
    pub first_slot: Point,
    pub slot_spacing: i32,
    pub slot_count: usize,
    pub deploy_primary: Point,
    pub deploy_secondary: Point,
    pub siege_drop: Point,
    pub spell_drops: Vec<Point>,
    pub next_button: Point,
    pub extra_post_attack_taps: Vec<Point>,
    pub return_taps: Vec<Point>,
    pub recovery_taps: Vec<Point>,
    pub interrupt_taps: Vec<Point>,
    pub keepalive_tap: Point,
    pub troop_radius: u32,
    pub spell_radius: u32,
    pub keepalive_spread: i32,
}

impl Default for TapLayout {
    fn default() -> Self {
        Self {
            first_slot: Point::new(220, 930),
            slot_spacing: 100,
            slot_count: 10,
            deploy_primary: Point::new(1526, 450),
            deploy_secondary: Point::new(180, 480),
            siege_drop: Point::new(1526, 450),
            spell_drops: vec![
                Point::new(900, 350),
                Point::new(700, 480),
                Point::new(900, 600),
                Point::new(830, 480),
                Point::new(900, 480),
            ],
            next_button: Point::new(1470, 760),
            extra_post_attack_taps: vec![Point::new(110, 790), Point::new(960, 623)],
            return_taps: vec![
                Point::new(800, 850),
                Point::new(97, 900),
                Point::new(250, 700),
            ],
            recovery_taps: vec![
                Point::new(800, 850),
                Point::new(97, 900),
                Point::new(250, 700),
            ],
            interrupt_taps: vec![Point::new(100, 900), Point::new(250, 700)],
            keepalive_tap: Point::new(1200, 900),
            troop_radius: 5,
            spell_radius: 15,
            keepalive_spread: 8,
        }
    }
}

impl TapLayout {
    /// Toolbar slot `index`, or `None` past the last slot.
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<Point> {
        if index >= self.slot_count {
            return None;
        }
        let step = i32::try_from(index).ok()?.checked_mul(self.slot_spacing)?;
        Some(self.first_slot.offset(step, 0))
    }

    pub fn slots(&self) -> impl Iterator<Item = Point> + '_ {
        (0..self.slot_count).filter_map(|i| self.slot(i))
    }
}

/// Inclusive random delay range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    #[serde(with = "duration_ms")]
    pub min: Duration,
    #[serde(with = "duration_ms")]
    pub max: Duration,
}

impl DelayRange {
    #[must_use]
    pub const fn millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    #[must_use]
    pub const fn fixed(value: Duration) -> Self {
        Self {
            min: value,
            max: value,
        }
    }
}

/// Random pauses inserted between the taps of the deploy sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HumanDelays {
    /// After selecting a toolbar slot.
    pub select: DelayRange,
    pub first_troop: DelayRange,
    pub heavy_troop: DelayRange,
    pub hero_ability: DelayRange,
    pub extra_hero: DelayRange,
    pub spell: DelayRange,
}

impl Default for HumanDelays {
    fn default() -> Self {
        Self {
            select: DelayRange::millis(150, 400),
            first_troop: DelayRange::millis(300, 600),
            heavy_troop: DelayRange::millis(500, 1000),
            hero_ability: DelayRange::millis(900, 1400),
            extra_hero: DelayRange::millis(300, 500),
            spell: DelayRange::millis(200, 400),
        }
    }
}

impl HumanDelays {
    /// All delays zero; handy for dry runs and tests.
    #[must_use]
    pub const fn none() -> Self {
        let zero = DelayRange::fixed(Duration::ZERO);
        Self {
            select: zero,
            first_troop: zero,
            heavy_troop: zero,
            hero_ability: zero,
            extra_hero: zero,
            spell: zero,
        }
    }

    fn labelled(&self) -> [(&'static str, DelayRange); 6] {
        [
            ("timing.human.select", self.select),
            ("timing.human.first_troop", self.first_troop),
            ("timing.human.heavy_troop", self.heavy_troop),
            ("timing.human.hero_ability", self.hero_ability),
            ("timing.human.extra_hero", self.extra_hero),
            ("timing.human.spell", self.spell),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Wait after a screenshot before reading it.
    #[serde(with = "duration_ms")]
    pub settle: Duration,
    /// Wait before re-capturing after a zero reading.
    #[serde(with = "duration_ms")]
    pub zero_retry_delay: Duration,
    #[serde(with = "duration_ms")]
    pub post_attack_wait: Duration,
    /// Gap after each tap of the return, extra and recovery sequences.
    #[serde(with = "duration_ms")]
    pub sequence_gap: Duration,
    #[serde(with = "duration_ms")]
    pub skip_wait: Duration,
    #[serde(with = "duration_ms")]
    pub hold: Duration,
    #[serde(with = "duration_ms")]
    pub hero_ability_wait: Duration,
    #[serde(with = "duration_ms")]
    pub interrupt_pause: Duration,
    #[serde(with = "duration_ms")]
    pub interrupt_gap: Duration,
    #[serde(with = "duration_ms")]
    pub keepalive_interval: Duration,
    #[serde(with = "duration_ms")]
    pub keepalive_jitter: Duration,
    pub human: HumanDelays,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(1500),
            zero_retry_delay: Duration::from_secs(2),
            post_attack_wait: Duration::from_secs(60),
            sequence_gap: Duration::from_secs(2),
            skip_wait: Duration::from_secs(5),
            hold: Duration::from_millis(2500),
            hero_ability_wait: Duration::from_secs(4),
            interrupt_pause: Duration::from_secs(120),
            interrupt_gap: Duration::from_millis(750),
            keepalive_interval: Duration::from_secs(120),
            keepalive_jitter: Duration::from_secs(7),
            human: HumanDelays::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailurePolicy {
    /// Extra capture attempts after a (0,0,0) reading.
    pub zero_retries: u32,
    /// Consecutive zero readings that trigger the recovery taps.
    pub recovery_threshold: u32,
    pub after_recovery: CounterAfterRecovery,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            zero_retries: constants::ZERO_READING_RETRIES,
            recovery_threshold: constants::RECOVERY_THRESHOLD,
            after_recovery: CounterAfterRecovery::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Wall-clock budget of one farming session.
    #[serde(with = "duration_ms")]
    pub budget: Duration,
    /// Tap an anti-sleep point instead of exiting when the budget runs out.
    pub keepalive: bool,
    /// Stop after this many cycles (dry runs).
    pub max_cycles: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            budget: constants::SESSION_BUDGET,
            keepalive: false,
            max_cycles: None,
        }
    }
}

impl BotConfig {
    /// Load a JSON config file; absent fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// # Errors
    ///
    /// Returns an error if the text is not a valid config document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (label, region) in self.regions.labelled() {
            if region.is_empty() {
                return Err(ConfigError::EmptyRegion {
                    field: label,
                    region,
                });
            }
        }
        if self.failure.recovery_threshold == 0 {
            return Err(ConfigError::MinViolation {
                field: "failure.recovery_threshold",
                min: 1,
                value: 0,
            });
        }
        if self.layout.slot_count == 0 {
            return Err(ConfigError::MinViolation {
                field: "layout.slot_count",
                min: 1,
                value: 0,
            });
        }
        let max_jitter = i64::from(constants::MAX_TAP_JITTER);
        for (field, value) in [
            ("layout.troop_radius", i64::from(self.layout.troop_radius)),
            ("layout.spell_radius", i64::from(self.layout.spell_radius)),
            ("layout.keepalive_spread", i64::from(self.layout.keepalive_spread)),
        ] {
            if !(0..=max_jitter).contains(&value) {
                return Err(ConfigError::OutOfRange {
                    field,
                    min: 0,
                    max: max_jitter,
                    value,
                });
            }
        }
        if self.heroes > constants::MAX_HEROES {
            return Err(ConfigError::HeroCount {
                max: constants::MAX_HEROES,
                value: self.heroes,
            });
        }
        if self.layout.interrupt_taps.is_empty() {
            return Err(ConfigError::EmptySequence {
                field: "layout.interrupt_taps",
            });
        }
        for (field, range) in self.timing.human.labelled() {
            if range.min > range.max {
                return Err(ConfigError::DelayRange {
                    field,
                    min: range.min,
                    max: range.max,
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        BotConfig::default().validate().expect("default config");
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config = BotConfig::from_json(
            r#"{
                "thresholds": { "min_gold": 500000 },
                "timing": { "skip_wait": 3000 },
                "failure": { "after_recovery": "keep" },
                "heroes": 2
            }"#,
        )
        .expect("parse");
        assert_eq!(config.thresholds.min_gold, 500_000);
        assert_eq!(config.thresholds.min_elixir, 800_000);
        assert_eq!(config.timing.skip_wait, Duration::from_secs(3));
        assert_eq!(config.timing.settle, Duration::from_millis(1500));
        assert_eq!(config.failure.after_recovery, CounterAfterRecovery::Keep);
        assert_eq!(config.failure.recovery_threshold, 7);
        assert_eq!(config.heroes, 2);
    }

    #[test]
    fn json_round_trip_preserves_config() {
        let mut config = BotConfig::default();
        config.session.max_cycles = Some(12);
        let parsed = BotConfig::from_json(&config.to_pretty_json()).expect("parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn validate_rejects_broken_values() {
        let mut config = BotConfig::default();
        config.failure.recovery_threshold = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MinViolation { field, .. }) if field == "failure.recovery_threshold"
        ));

        let mut config = BotConfig::default();
        config.heroes = 6;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::HeroCount { value: 6, .. })
        ));

        let mut config = BotConfig::default();
        config.regions.dark = Region::new(10, 10, 10, 40);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyRegion { field: "dark", .. })
        ));

        let mut config = BotConfig::default();
        config.timing.human.spell = DelayRange::millis(500, 100);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DelayRange { field: "timing.human.spell", .. })
        ));
    }

    #[test]
    fn validate_bounds_tap_jitter() {
        let config =
            BotConfig::from_json(r#"{"layout":{"troop_radius":4294967295}}"#).expect("parse");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "layout.troop_radius", value: 4_294_967_295, .. })
        ));

        let config =
            BotConfig::from_json(r#"{"layout":{"keepalive_spread":-2147483648}}"#).expect("parse");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "layout.keepalive_spread", min: 0, .. })
        ));

        let mut config = BotConfig::default();
        config.layout.spell_radius = constants::MAX_TAP_JITTER;
        config.validate().expect("radius at the bound is allowed");
    }

    #[test]
    fn toolbar_slots_follow_spacing() {
        let layout = TapLayout::default();
        assert_eq!(layout.slot(0), Some(Point::new(220, 930)));
        assert_eq!(layout.slot(9), Some(Point::new(1120, 930)));
        assert_eq!(layout.slot(10), None);
        assert_eq!(layout.slots().count(), 10);
    }
}
