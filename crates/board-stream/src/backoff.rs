//! Exponential backoff for reconnection scheduling.

use std::time::Duration;

use rand::Rng;

/// Backoff parameters for reconnection delays.
#[derive(Clone, Copy, Debug)]
pub struct BackoffConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Ceiling on the delay between attempts.
    pub max_delay: Duration,
    /// Multiplier applied per failed attempt.
    pub factor: f64,
    /// Random jitter fraction (0.0–1.0) blended into the delay.
    pub jitter: f64,
}

impl BackoffConfig {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.initial_delay.is_zero() {
            return Err("Initial reconnect delay must be > 0".to_string());
        }
        if self.max_delay.is_zero() {
            return Err("Max reconnect delay must be > 0".to_string());
        }
        if self.max_delay < self.initial_delay {
            return Err("Max reconnect delay must be >= initial reconnect delay".to_string());
        }
        if self.factor < 1.0 || !self.factor.is_finite() {
            return Err("Backoff factor must be >= 1.0".to_string());
        }
        if !(0.0..=1.0).contains(&self.jitter) || !self.jitter.is_finite() {
            return Err("Jitter must be between 0.0 and 1.0".to_string());
        }
        Ok(())
    }
}

/// Compute the delay before the next reconnection attempt.
///
/// `attempt` counts the reconnect sleeps already completed since the last
/// successful open, so the first scheduled attempt (`attempt == 0`) waits
/// the initial delay and each subsequent one multiplies by `factor`, capped
/// at `max_delay`.
pub fn calculate_backoff(config: BackoffConfig, attempt: u32) -> Duration {
    let initial = config.initial_delay.as_secs_f64();
    let max = config.max_delay.as_secs_f64();
    let exponent = config.factor.powf(f64::from(attempt));
    let base = (initial * exponent).min(max);

    if config.jitter == 0.0 {
        return Duration::from_secs_f64(base);
    }

    let mut rng = rand::rng();
    let randomized = rng.random_range(0.0..=base);
    let blended = base * (1.0 - config.jitter) + randomized * config.jitter;
    Duration::from_secs_f64(blended)
}
