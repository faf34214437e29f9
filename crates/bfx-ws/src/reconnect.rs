//! Reconnect pacing
//!
//! [`ReconnectConfig`] holds the knobs a client is built with. Each outage of
//! a session gets its own [`Backoff`], which counts dials, spaces them out on
//! a doubling schedule and remembers why the last one failed, so the final
//! `ReconnectFailed` event can say what went wrong.

use rand::Rng;
use std::fmt;
use std::time::Duration;

/// How a dropped session paces its dials
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Pause before the first dial of an outage
    pub initial_delay: Duration,
    /// Ceiling for any single pause
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Fraction of each pause that is randomized, in `0.0..=1.0`
    pub jitter: f64,
    /// Dials per outage; `None` keeps dialing until closed
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.2,
            max_attempts: Some(10),
        }
    }
}

impl ReconnectConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Growth per dial; values below 1.0 are raised to 1.0
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = Some(max);
        self
    }

    /// Keep dialing until the endpoint comes back or the client closes
    pub fn unlimited(mut self) -> Self {
        self.max_attempts = None;
        self
    }

    /// Start pacing a new outage
    pub fn backoff(&self) -> Backoff {
        Backoff {
            config: self.clone(),
            attempts: 0,
            last_error: None,
        }
    }

    /// Pause before dial number `attempt` (1-based), without jitter
    fn scheduled_delay(&self, attempt: u32) -> Duration {
        let steps = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(steps);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

/// Dial bookkeeping for one outage of one session
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    attempts: u32,
    last_error: Option<String>,
}

impl Backoff {
    /// Dials counted so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.config
            .max_attempts
            .is_some_and(|max| self.attempts >= max)
    }

    /// Count another dial and return how long to wait before it
    ///
    /// Returns `None` once the attempt budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts += 1;
        Some(self.spread(self.config.scheduled_delay(self.attempts)))
    }

    /// Remember why the current dial did not produce a usable link
    pub fn record_failure(&mut self, error: impl fmt::Display) {
        self.last_error = Some(error.to_string());
    }

    pub fn last_error(&self) -> &str {
        self.last_error.as_deref().unwrap_or("no attempt made")
    }

    fn spread(&self, delay: Duration) -> Duration {
        let width = delay.as_secs_f64() * self.config.jitter;
        if width <= 0.0 {
            return delay;
        }
        let offset = rand::thread_rng().gen_range(-width..=width);
        Duration::from_secs_f64((delay.as_secs_f64() + offset).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steady(initial_ms: u64) -> ReconnectConfig {
        ReconnectConfig::new()
            .with_initial_delay(Duration::from_millis(initial_ms))
            .with_max_delay(Duration::from_secs(1))
            .with_jitter(0.0)
    }

    #[test]
    fn test_schedule_doubles_up_to_ceiling() {
        let mut backoff = steady(100).unlimited().backoff();
        let delays: Vec<_> = (0..6).filter_map(|_| backoff.next_delay()).collect();
        assert_eq!(
            delays,
            [100, 200, 400, 800, 1000, 1000].map(Duration::from_millis)
        );
        assert_eq!(backoff.attempts(), 6);
    }

    #[test]
    fn test_huge_attempt_counts_stay_at_ceiling() {
        let config = steady(100);
        assert_eq!(config.scheduled_delay(u32::MAX), Duration::from_secs(1));
        assert_eq!(config.scheduled_delay(0), Duration::from_millis(100));
    }

    #[test]
    fn test_budget_runs_out() {
        let mut backoff = steady(10).with_max_attempts(2).backoff();
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.is_exhausted());
        assert_eq!(backoff.next_delay(), None);
        assert_eq!(backoff.attempts(), 2);

        let mut never = steady(10).with_max_attempts(0).backoff();
        assert_eq!(never.next_delay(), None);
    }

    #[test]
    fn test_each_outage_starts_fresh() {
        let config = steady(50).with_max_attempts(1);
        let mut first = config.backoff();
        first.next_delay();
        assert!(first.is_exhausted());
        assert_eq!(config.backoff().next_delay(), Some(Duration::from_millis(50)));
    }

    #[test]
    fn test_last_error_is_kept() {
        let mut backoff = ReconnectConfig::new().backoff();
        assert_eq!(backoff.last_error(), "no attempt made");
        backoff.record_failure("refused");
        backoff.record_failure(format_args!("timed out after {}ms", 10));
        assert_eq!(backoff.last_error(), "timed out after 10ms");
    }

    #[test]
    fn test_jitter_stays_within_spread() {
        let mut backoff = ReconnectConfig::new()
            .with_initial_delay(Duration::from_secs(1))
            .with_multiplier(1.0)
            .with_jitter(0.25)
            .unlimited()
            .backoff();
        for _ in 0..200 {
            let delay = backoff.next_delay().unwrap();
            assert!(delay >= Duration::from_millis(750), "{delay:?}");
            assert!(delay <= Duration::from_millis(1250), "{delay:?}");
        }
    }
}
