//! Clock Module
//! Monotonic time references and the count-up timers that accumulate
//! unrivaled wall-time for presumptive successors

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// A monotonic clock measured from an arbitrary epoch.
///
/// The chain samples one reference for all of its timers; values from
/// different references are not comparable.
pub trait TimeReference: Send + Sync {
    /// Elapsed time since the reference epoch
    fn now(&self) -> Duration;
}

/// Wall-clock reference backed by `Instant`
pub struct RealTimeReference {
    started: Instant,
}

impl RealTimeReference {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            started: Instant::now(),
        })
    }
}

impl TimeReference for RealTimeReference {
    fn now(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Manually advanceable reference for tests
pub struct ArtificialTimeReference {
    elapsed: RwLock<Duration>,
}

impl ArtificialTimeReference {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            elapsed: RwLock::new(Duration::ZERO),
        })
    }

    /// Move the clock forward by `delta`
    pub fn advance(&self, delta: Duration) {
        *self.elapsed.write() += delta;
    }
}

impl TimeReference for ArtificialTimeReference {
    fn now(&self) -> Duration {
        *self.elapsed.read()
    }
}

/// Accumulates elapsed time between `start` and `stop` calls.
///
/// The value is sampled from the owning time reference, never integrated, so
/// an artificial reference advanced while the timer runs is reflected on the
/// next read.
pub struct CountUpTimer {
    time_ref: Arc<dyn TimeReference>,
    accumulated: Duration,
    started_at: Option<Duration>,
}

impl CountUpTimer {
    /// A stopped timer at zero
    pub fn new(time_ref: Arc<dyn TimeReference>) -> Self {
        Self {
            time_ref,
            accumulated: Duration::ZERO,
            started_at: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Begin accumulating; idempotent while running
    pub fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(self.time_ref.now());
        }
    }

    /// Stop accumulating, folding the open interval into the total
    pub fn stop(&mut self) {
        if let Some(started_at) = self.started_at.take() {
            self.accumulated += self.time_ref.now().saturating_sub(started_at);
        }
    }

    /// Overwrite the accumulated total, preserving the running state
    pub fn set(&mut self, total: Duration) {
        self.accumulated = total;
        if self.started_at.is_some() {
            self.started_at = Some(self.time_ref.now());
        }
    }

    /// Add to the accumulated total
    pub fn add(&mut self, delta: Duration) {
        self.accumulated += delta;
    }

    /// Current total, including the open interval if running
    pub fn get(&self) -> Duration {
        match self.started_at {
            Some(started_at) => {
                self.accumulated + self.time_ref.now().saturating_sub(started_at)
            }
            None => self.accumulated,
        }
    }
}

impl Clone for CountUpTimer {
    /// Cloned timers are independent and stopped, carrying the elapsed total
    fn clone(&self) -> Self {
        Self {
            time_ref: Arc::clone(&self.time_ref),
            accumulated: self.get(),
            started_at: None,
        }
    }
}

impl std::fmt::Debug for CountUpTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountUpTimer")
            .field("total", &self.get())
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_accumulates_while_running() {
        let clock = ArtificialTimeReference::new();
        let mut timer = CountUpTimer::new(clock.clone());
        timer.start();
        clock.advance(Duration::from_secs(5));
        assert_eq!(timer.get(), Duration::from_secs(5));
        clock.advance(Duration::from_secs(2));
        assert_eq!(timer.get(), Duration::from_secs(7));
    }

    #[test]
    fn test_stopped_timer_holds_total() {
        let clock = ArtificialTimeReference::new();
        let mut timer = CountUpTimer::new(clock.clone());
        timer.start();
        clock.advance(Duration::from_secs(3));
        timer.stop();
        clock.advance(Duration::from_secs(10));
        assert_eq!(timer.get(), Duration::from_secs(3));
        assert!(!timer.is_running());
    }

    #[test]
    fn test_restart_resumes_accumulation() {
        let clock = ArtificialTimeReference::new();
        let mut timer = CountUpTimer::new(clock.clone());
        timer.start();
        clock.advance(Duration::from_secs(1));
        timer.stop();
        timer.start();
        clock.advance(Duration::from_secs(4));
        assert_eq!(timer.get(), Duration::from_secs(5));
    }

    #[test]
    fn test_set_and_add() {
        let clock = ArtificialTimeReference::new();
        let mut timer = CountUpTimer::new(clock.clone());
        timer.set(Duration::from_secs(9));
        timer.add(Duration::from_secs(1));
        assert_eq!(timer.get(), Duration::from_secs(10));

        // Setting while running restarts the open interval.
        timer.start();
        clock.advance(Duration::from_secs(2));
        timer.set(Duration::from_secs(1));
        clock.advance(Duration::from_secs(2));
        assert_eq!(timer.get(), Duration::from_secs(3));
    }

    #[test]
    fn test_clone_is_stopped_and_independent() {
        let clock = ArtificialTimeReference::new();
        let mut timer = CountUpTimer::new(clock.clone());
        timer.start();
        clock.advance(Duration::from_secs(6));
        let cloned = timer.clone();
        assert!(!cloned.is_running());
        assert_eq!(cloned.get(), Duration::from_secs(6));

        clock.advance(Duration::from_secs(4));
        assert_eq!(timer.get(), Duration::from_secs(10));
        assert_eq!(cloned.get(), Duration::from_secs(6));
    }
}
