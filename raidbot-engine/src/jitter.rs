use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::f64::consts::TAU;
use std::time::Duration;

use crate::config::DelayRange;
use crate::geometry::Point;

/// Randomness for tap positions and pauses, seedable for reproducible runs.
#[derive(Debug, Clone)]
pub struct Jitter {
    rng: ChaCha20Rng,
}

impl Jitter {
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    /// Uniform point inside the circle of `radius` around `center`.
    pub fn point_in_circle(&mut self, center: Point, radius: u32) -> Point {
        if radius == 0 {
            return center;
        }
        let theta = self.rng.gen_range(0.0..TAU);
        let r = f64::from(radius) * self.rng.gen_range(0.0..1.0_f64).sqrt();
        // float-to-int casts saturate; offset saturates too
        #[allow(clippy::cast_possible_truncation)]
        let (dx, dy) = ((r * theta.cos()) as i32, (r * theta.sin()) as i32);
        center.offset(dx, dy)
    }

    /// Shift both coordinates independently by up to `spread` pixels.
    pub fn spread(&mut self, center: Point, spread: i32) -> Point {
        let spread = i32::try_from(spread.unsigned_abs()).unwrap_or(i32::MAX);
        center.offset(
            self.rng.gen_range(-spread..=spread),
            self.rng.gen_range(-spread..=spread),
        )
    }

    pub fn delay(&mut self, range: DelayRange) -> Duration {
        let min = millis(range.min);
        let max = millis(range.max).max(min);
        Duration::from_millis(self.rng.gen_range(min..=max))
    }

    /// `base` plus or minus up to `jitter`.
    pub fn around(&mut self, base: Duration, jitter: Duration) -> Duration {
        let offset = self.rng.gen_range(0..=millis(jitter).saturating_mul(2));
        (base + Duration::from_millis(offset)).saturating_sub(jitter)
    }

    pub fn pick(&mut self, options: &[Point]) -> Option<Point> {
        options.choose(&mut self.rng).copied()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
