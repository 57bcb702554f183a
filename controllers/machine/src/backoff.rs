//! # Exponential Backoff
//!
//! Provides a jittered exponential backoff for bounded retry loops.
//!
//! The default schedule starts at 1s and doubles on every step with ±10% jitter,
//! each delay capped at 5 minutes, for at most 10 attempts.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff calculator
///
/// Each call to [`ExponentialBackoff::next_delay`] returns the current delay
/// (with jitter applied) and multiplies the base delay by `factor`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Current base delay before jitter
    current: Duration,
    /// Multiplier applied after every step
    factor: f64,
    /// Relative jitter, 0.1 means ±10%
    jitter: f64,
    /// Upper bound for a single delay
    cap: Duration,
    /// Maximum number of attempts
    steps: u32,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 2.0, 0.1, Duration::from_secs(300), 10)
    }
}

impl ExponentialBackoff {
    /// Create a new exponential backoff
    ///
    /// # Arguments
    ///
    /// * `initial` - First delay
    /// * `factor` - Growth factor per step (typically 2.0)
    /// * `jitter` - Relative jitter applied symmetrically (typically 0.1)
    /// * `cap` - Maximum single delay
    /// * `steps` - Maximum number of attempts the caller should make
    #[must_use]
    pub fn new(initial: Duration, factor: f64, jitter: f64, cap: Duration, steps: u32) -> Self {
        Self {
            current: initial,
            factor,
            jitter,
            cap,
            steps,
        }
    }

    /// Maximum number of attempts
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Get the next delay and advance the sequence
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current.min(self.cap);
        self.current = self.current.mul_f64(self.factor).min(self.cap);

        if self.jitter <= 0.0 {
            return base;
        }
        let spread: f64 = rand::rng().random_range(-self.jitter..=self.jitter);
        base.mul_f64(1.0 + spread).min(self.cap)
    }
}
