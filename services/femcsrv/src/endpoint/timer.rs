//! Cooperative asynchronous timers
//!
//! A timer is started, then queried on later requests; nothing sleeps. Time
//! comes from a [`Clock`] so tests can drive it by hand.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Monotonic wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    NotRunning,
    Running,
    Expired,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("Timer already running")]
    AlreadyRunning,
}

/// Single-shot, retriggerable timer
#[derive(Debug, Clone, Copy, Default)]
pub struct AsyncTimer {
    started: Option<(Instant, Duration)>,
}

impl AsyncTimer {
    /// Start the timer; a running timer is only restarted when `reload` is set
    pub fn start(&mut self, now: Instant, duration: Duration, reload: bool) -> Result<(), TimerError> {
        if self.started.is_some() && !reload {
            return Err(TimerError::AlreadyRunning);
        }
        self.started = Some((now, duration));
        Ok(())
    }

    /// Current state; reporting `Expired` stops the timer
    pub fn query(&mut self, now: Instant) -> TimerState {
        match self.started {
            None => TimerState::NotRunning,
            Some((start, duration)) if now.saturating_duration_since(start) < duration => {
                TimerState::Running
            },
            Some(_) => {
                self.stop();
                TimerState::Expired
            },
        }
    }

    pub fn stop(&mut self) {
        self.started = None;
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_timer_lifecycle() {
        let clock = ManualClock::new();
        let mut timer = AsyncTimer::default();
        assert_eq!(timer.query(clock.now()), TimerState::NotRunning);

        timer.start(clock.now(), Duration::from_millis(100), false).unwrap();
        clock.advance(Duration::from_millis(99));
        assert_eq!(timer.query(clock.now()), TimerState::Running);

        clock.advance(Duration::from_millis(1));
        assert_eq!(timer.query(clock.now()), TimerState::Expired);
        assert_eq!(timer.query(clock.now()), TimerState::NotRunning);
    }

    #[test]
    fn test_start_while_running() {
        let clock = ManualClock::new();
        let mut timer = AsyncTimer::default();
        timer.start(clock.now(), Duration::from_secs(1), false).unwrap();
        assert_eq!(
            timer.start(clock.now(), Duration::from_secs(1), false),
            Err(TimerError::AlreadyRunning)
        );

        clock.advance(Duration::from_millis(900));
        timer.start(clock.now(), Duration::from_secs(1), true).unwrap();
        clock.advance(Duration::from_millis(900));
        assert_eq!(timer.query(clock.now()), TimerState::Running);
    }

    #[test]
    fn test_stop() {
        let mut timer = AsyncTimer::default();
        let now = SystemClock.now();
        timer.start(now, Duration::from_secs(60), false).unwrap();
        timer.stop();
        assert_eq!(timer.query(now), TimerState::NotRunning);
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let other = clock.clone();
        let before = clock.now();
        other.advance(Duration::from_secs(5));
        assert_eq!(clock.now() - before, Duration::from_secs(5));
    }
}
