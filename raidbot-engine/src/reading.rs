//! Loot readings recognized from the scouting screen
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// The three loot amounts shown for the scouted base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reading {
    pub gold: u64,
    pub elixir: u64,
    pub dark: u64,
}

impl Reading {
    pub const ZERO: Self = Self::new(0, 0, 0);

    #[must_use]
    pub const fn new(gold: u64, elixir: u64, dark: u64) -> Self {
        Self { gold, elixir, dark }
    }

    /// A (0,0,0) reading means nothing was recognized.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.gold == 0 && self.elixir == 0 && self.dark == 0
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Gold={} Elixir={} Dark={}",
            self.gold, self.elixir, self.dark
        )
    }
}

fn non_digits() -> &'static Regex {
    static NON_DIGITS: OnceLock<Regex> = OnceLock::new();
    NON_DIGITS.get_or_init(|| Regex::new(r"\D").expect("static regex"))
}

/// Join the recognized fragments of one region and keep only the digits.
///
/// Anything that does not leave a parseable number (no digits, or an amount
/// too large for `u64`) counts as zero.
#[must_use]
pub fn parse_amount<S: AsRef<str>>(fragments: &[S]) -> u64 {
    let joined: String = fragments.iter().map(AsRef::as_ref).collect();
    let digits = non_digits().replace_all(&joined, "");
    digits.parse().unwrap_or(0)
}
