//! Simulated work delays.
//!
//! Production, treatment and loop pacing all go through a [`Pacer`] so tests
//! can swap the sleeping implementation for [`NoDelay`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Blocking delay representing time spent working.
pub trait Pacer: Send + Sync {
    /// Block the calling thread for the simulated duration.
    fn pause(&self);
}

/// Pacer that returns immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl Pacer for NoDelay {
    fn pause(&self) {}
}

/// Pacer that counts pauses and never sleeps.
#[derive(Debug, Default)]
pub struct CountingPacer {
    pauses: AtomicU64,
}

impl CountingPacer {
    /// Create a pacer with a zero count.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pauses taken so far.
    #[must_use]
    pub fn pauses(&self) -> u64 {
        self.pauses.load(Ordering::Relaxed)
    }
}

impl Pacer for CountingPacer {
    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::Relaxed);
    }
}

/// Pacer that sleeps for a uniformly random duration in `[min, max]`.
///
/// Every agent shares one generator, so a seeded pacer replays the same
/// sequence of delays. Which agent draws which delay still depends on the
/// scheduler.
#[derive(Debug)]
pub struct RandomPacer {
    min: Duration,
    max: Duration,
    rng: Mutex<StdRng>,
}

impl RandomPacer {
    /// Create a pacer seeded from entropy. The bounds are swapped if given
    /// in the wrong order.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self::with_rng(min, max, StdRng::from_entropy())
    }

    /// Create a pacer whose delays are drawn from a fixed seed.
    #[must_use]
    pub fn seeded(min: Duration, max: Duration, seed: u64) -> Self {
        Self::with_rng(min, max, StdRng::seed_from_u64(seed))
    }

    fn with_rng(min: Duration, max: Duration, rng: StdRng) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min,
            max,
            rng: Mutex::new(rng),
        }
    }

    /// Lower bound.
    #[must_use]
    pub const fn min(&self) -> Duration {
        self.min
    }

    /// Upper bound.
    #[must_use]
    pub const fn max(&self) -> Duration {
        self.max
    }

    /// Draw one delay.
    #[must_use]
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        self.rng.lock().gen_range(self.min..=self.max)
    }
}

impl Pacer for RandomPacer {
    fn pause(&self) {
        thread::sleep(self.sample());
    }
}

/// Pacing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Whether agents sleep at all.
    pub enabled: bool,
    /// Shortest simulated delay.
    pub min_delay: Duration,
    /// Longest simulated delay.
    pub max_delay: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(200),
        }
    }
}

impl PacingConfig {
    /// Settings that never sleep.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Build the pacer these settings describe, seeded when `seed` is set.
    #[must_use]
    pub fn build(&self, seed: Option<u64>) -> Arc<dyn Pacer> {
        if !self.enabled || self.max_delay.is_zero() {
            return Arc::new(NoDelay);
        }
        match seed {
            Some(seed) => Arc::new(RandomPacer::seeded(self.min_delay, self.max_delay, seed)),
            None => Arc::new(RandomPacer::new(self.min_delay, self.max_delay)),
        }
    }
}
