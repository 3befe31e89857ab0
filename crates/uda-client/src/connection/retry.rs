//! Bounded, jittered connect retries.

use std::thread;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use uda_config::Config;

/// Pauses the calling thread between attempts.
pub trait Sleeper: Send {
    /// Blocks for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// How many times to try one host and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    retries: u32,
    max_delay: Duration,
}

impl RetryPolicy {
    /// `retries` attempts follow the first; each waits up to `max_delay`.
    #[must_use]
    pub const fn new(retries: u32, max_delay: Duration) -> Self {
        Self { retries, max_delay }
    }

    /// Policy from `max_socket_attempts` and `max_socket_delay`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_socket_attempts(), config.max_socket_delay())
    }

    /// Attempts made against one host before giving up.
    #[must_use]
    pub const fn total_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Upper bound of the pause between attempts.
    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        self.max_delay
    }
}

/// Source of retry delays, seeded per process so clients started together
/// spread their retries.
#[derive(Debug, Clone)]
pub struct Jitter {
    rng: ChaCha8Rng,
}

impl Jitter {
    /// Generator seeded from the process id.
    #[must_use]
    pub fn from_process() -> Self {
        Self::seeded(u64::from(std::process::id()))
    }

    /// Generator with a fixed seed.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// A delay drawn uniformly from `[0, max)` at millisecond resolution.
    pub fn next_delay(&mut self, max: Duration) -> Duration {
        let ceiling = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.rng.random_range(0..ceiling))
    }
}

impl Default for Jitter {
    fn default() -> Self {
        Self::from_process()
    }
}
