use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::LootThresholds;
use crate::reading::Reading;

/// What the loop does with the scouted base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Attack,
    Skip,
}

impl Decision {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Decision::Attack => "attack",
            Decision::Skip => "skip",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Decision returned by a [`LootPolicy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub decision: Decision,
    pub rationale: &'static str,
}

impl Verdict {
    #[must_use]
    pub const fn attack(rationale: &'static str) -> Self {
        Self {
            decision: Decision::Attack,
            rationale,
        }
    }

    #[must_use]
    pub const fn skip(rationale: &'static str) -> Self {
        Self {
            decision: Decision::Skip,
            rationale,
        }
    }
}

/// Policy interface deciding whether a reading is worth attacking.
pub trait LootPolicy: Send {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    fn judge(&self, reading: &Reading) -> Verdict;
}

/// All three minimums met, or gold/elixir at the override amount.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdPolicy {
    thresholds: LootThresholds,
}

impl ThresholdPolicy {
    #[must_use]
    pub fn new(thresholds: LootThresholds) -> Self {
        Self { thresholds }
    }
}

impl LootPolicy for ThresholdPolicy {
    fn name(&self) -> &'static str {
        "Threshold"
    }

    fn judge(&self, reading: &Reading) -> Verdict {
        let t = &self.thresholds;
        if reading.gold >= t.min_gold && reading.elixir >= t.min_elixir && reading.dark >= t.min_dark
        {
            return Verdict::attack("all minimums met");
        }
        if reading.gold >= t.override_amount {
            return Verdict::attack("gold override");
        }
        if reading.elixir >= t.override_amount {
            return Verdict::attack("elixir override");
        }
        Verdict::skip("loot too low")
    }
}
