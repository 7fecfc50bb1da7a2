//! Fixed tuning values of the farming loop.
//!
//! Screen coordinates live in [`crate::config`]; these are the counts and
//! budgets that are not tied to a particular screen layout.

use std::time::Duration;

// Failure handling ---------------------------------------------------------
/// Extra capture attempts after a (0,0,0) reading before accepting it.
pub const ZERO_READING_RETRIES: u32 = 2;
/// Consecutive zero readings that trigger the recovery tap sequence.
pub const RECOVERY_THRESHOLD: u32 = 7;

// Session ------------------------------------------------------------------
pub const SESSION_BUDGET: Duration = Duration::from_secs(40 * 60);

// Jitter -------------------------------------------------------------------
/// Upper bound for drop radii and tap spread, in pixels.
pub const MAX_TAP_JITTER: u32 = 200;

// Reporting ----------------------------------------------------------------
/// Judged bases kept in the session history; older records are dropped.
pub const MAX_DECISION_RECORDS: usize = 1000;

// Army ---------------------------------------------------------------------
pub const MAX_HEROES: u8 = 5;
/// Toolbar slot of the first hero; slots before it hold troops and siege.
pub const FIRST_HERO_SLOT: usize = 3;
