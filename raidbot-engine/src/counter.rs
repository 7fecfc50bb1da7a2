use crate::config::{CounterAfterRecovery, FailurePolicy};

/// Counts consecutive (0,0,0) readings and says when to run the recovery taps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureCounter {
    count: u32,
    threshold: u32,
    after_recovery: CounterAfterRecovery,
}

impl FailureCounter {
    #[must_use]
    pub fn new(policy: &FailurePolicy) -> Self {
        Self {
            count: 0,
            threshold: policy.recovery_threshold.max(1),
            after_recovery: policy.after_recovery,
        }
    }

    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Record the outcome of one cycle. Returns `true` when recovery is due.
    pub fn record(&mut self, zero: bool) -> bool {
        if zero {
            self.count = self.count.saturating_add(1);
        } else {
            self.count = 0;
        }
        self.count >= self.threshold
    }

    /// Called once the recovery taps ran.
    pub fn recovered(&mut self) {
        if self.after_recovery == CounterAfterRecovery::Reset {
            self.count = 0;
        }
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}
