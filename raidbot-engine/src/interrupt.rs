//! User interruption channel.
//!
//! A watcher thread raises the token on any system-wide click; the loop checks
//! it at its suspension points and unwinds the current sequence with
//! [`Interrupted`]. The flag is plain atomic state with a single writer and a
//! single reader, so a late read only delays the pause by one checkpoint.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;

/// The in-progress sequence was abandoned because the user took over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("interrupted by user input")]
pub struct Interrupted;

/// Result of a step that may be cut short by the user.
pub type Step<T = ()> = Result<T, Interrupted>;

#[derive(Debug, Default)]
struct Shared {
    raised: AtomicBool,
    notify: Notify,
}

#[derive(Debug, Clone, Default)]
pub struct InterruptToken {
    shared: Arc<Shared>,
}

impl InterruptToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Safe to call from any thread, including ones outside the runtime.
    pub fn raise(&self) {
        self.shared.raised.store(true, Ordering::SeqCst);
        self.shared.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.shared.raised.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.shared.raised.store(false, Ordering::SeqCst);
    }

    /// `Err(Interrupted)` when the flag is up.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] if the token has been raised and not cleared.
    pub fn checkpoint(&self) -> Step {
        if self.is_raised() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }

    /// Resolves once the flag is up.
    pub async fn raised(&self) {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_raised() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep for `duration` unless the user interrupts first.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] if the token is raised before or during the wait.
    pub async fn sleep(&self, duration: Duration) -> Step {
        self.checkpoint()?;
        if duration.is_zero() {
            return Ok(());
        }
        tokio::select! {
            () = tokio::time::sleep(duration) => {}
            () = self.raised() => {}
        }
        self.checkpoint()
    }
}
