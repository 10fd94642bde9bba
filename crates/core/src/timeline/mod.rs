use std::time::Duration;

use crate::config::DisplayConfig;

/// Presentation callbacks driven by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    Animation,
    Text,
}

/// Fixed-period timer measured against a monotonic clock offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicTimer {
    period: Duration,
    next_due: Duration,
}

impl PeriodicTimer {
    /// First fire happens one period after the clock origin.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_due: period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn next_due(&self) -> Duration {
        self.next_due
    }

    /// Returns `true` at most once per call when `now` has reached the next
    /// deadline. Deadlines missed entirely are skipped rather than replayed.
    pub fn poll(&mut self, now: Duration) -> bool {
        if now < self.next_due {
            return false;
        }
        if self.period.is_zero() {
            self.next_due = now;
            return true;
        }
        while self.next_due <= now {
            self.next_due += self.period;
        }
        true
    }
}

/// Owns the animation and text timers.
#[derive(Debug, Clone)]
pub struct Scheduler {
    animation: PeriodicTimer,
    text: PeriodicTimer,
}

impl Scheduler {
    pub fn new(animation: Duration, text: Duration) -> Self {
        Self {
            animation: PeriodicTimer::new(animation),
            text: PeriodicTimer::new(text),
        }
    }

    pub fn from_config(config: &DisplayConfig) -> Self {
        Self::new(config.anim_interval(), config.text_interval())
    }

    /// Ticks due at `now`, animation first.
    pub fn due(&mut self, now: Duration) -> Vec<TickKind> {
        let mut ticks = Vec::with_capacity(2);
        if self.animation.poll(now) {
            ticks.push(TickKind::Animation);
        }
        if self.text.poll(now) {
            ticks.push(TickKind::Text);
        }
        ticks
    }

    /// Earliest upcoming deadline.
    pub fn next_deadline(&self) -> Duration {
        self.animation.next_due().min(self.text.next_due())
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::from_config(&DisplayConfig::default())
    }
}
