//! Raidbot Engine
//!
//! Device-agnostic core of the raid farming loop: reading loot off a scouting
//! screen, deciding whether to attack, deploying the army, and recovering from
//! stuck screens and user interruptions.
//! Screen capture, taps and text recognition come in through the [`Device`]
//! and [`TextReader`] traits.

pub mod bot;
pub mod config;
pub mod constants;
pub mod counter;
pub mod decision;
mod deploy;
pub mod device;
pub mod geometry;
pub mod interrupt;
pub mod jitter;
pub mod reading;
pub mod stats;

// Re-export commonly used types
pub use bot::Bot;
pub use config::{
    BotConfig, ConfigError, CounterAfterRecovery, DelayRange, FailurePolicy, HumanDelays,
    LootRegions, LootThresholds, SessionConfig, TapLayout, Timing,
};
pub use counter::FailureCounter;
pub use decision::{Decision, LootPolicy, ThresholdPolicy, Verdict};
pub use device::{
    ArtifactError, Artifacts, Device, DeviceError, NoArtifacts, RecognizeError, TextReader,
};
pub use geometry::{Point, Region};
pub use interrupt::{InterruptToken, Interrupted, Step};
pub use jitter::Jitter;
pub use reading::{Reading, parse_amount};
pub use stats::{DecisionRecord, SessionOutcome, SessionStats};
