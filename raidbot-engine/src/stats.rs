use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::duration_ms;
use crate::constants::MAX_DECISION_RECORDS;
use crate::decision::Decision;
use crate::reading::Reading;

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Timeout,
    CycleLimit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub cycle: u64,
    pub reading: Reading,
    pub decision: Decision,
    pub rationale: String,
    /// Time since the loop started.
    #[serde(with = "duration_ms")]
    pub at: Duration,
}

/// Counters collected over one run of the loop.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub run_tag: String,
    pub cycles: u64,
    pub attacks: u64,
    pub skips: u64,
    pub zero_readings: u64,
    pub ocr_retries: u64,
    pub recoveries: u64,
    pub interrupts: u64,
    pub keepalive_taps: u64,
    pub transport_errors: u64,
    pub recognition_errors: u64,
    pub artifact_errors: u64,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
    pub outcome: Option<SessionOutcome>,
    /// The most recent judged bases, oldest first.
    pub decisions: Vec<DecisionRecord>,
}

impl SessionStats {
    #[must_use]
    pub fn new(run_tag: impl Into<String>) -> Self {
        Self {
            run_tag: run_tag.into(),
            ..Self::default()
        }
    }

    /// Append to the history, dropping the oldest record once it is full.
    pub fn record_decision(&mut self, record: DecisionRecord) {
        if self.decisions.len() >= MAX_DECISION_RECORDS {
            let excess = self.decisions.len() + 1 - MAX_DECISION_RECORDS;
            self.decisions.drain(..excess);
        }
        self.decisions.push(record);
    }

    /// Share of judged bases that were attacked, in percent.
    #[must_use]
    pub fn attack_rate(&self) -> f64 {
        let judged = self.attacks + self.skips;
        if judged == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.attacks as f64 / judged as f64 * 100.0;
        rate
    }

    /// Highest gold among the retained decisions.
    #[must_use]
    pub fn best_gold(&self) -> Option<u64> {
        self.decisions.iter().map(|d| d.reading.gold).max()
    }
}
