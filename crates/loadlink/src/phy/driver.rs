//! Transmit-side PHY: phase-locked CPU load generation

use std::time::{Duration, Instant};

use super::pool::SpinPool;
use super::PhyTransmit;
use crate::LinkConfig;

/// Drives the PHY by occupying or releasing the shared core(s)
///
/// The deadline is a long-lived field advanced by exactly one duration
/// per [`drive`](PhyTransmit::drive) call, never recomputed from the
/// call's entry time. A late wakeup therefore shortens the *next*
/// interval instead of shifting every following chip, and the chip
/// clock stays locked to the receiver's sample clock over arbitrarily
/// long transmissions.
///
/// With more than one effective worker the load is raised on every
/// core through a persistent spin pool; with exactly one, the calling
/// thread spins inline, which keeps the load on the core the process
/// is pinned to.
#[derive(Debug)]
pub struct PhyDriver {
    deadline: Instant,
    pool: Option<SpinPool>,
}

impl PhyDriver {
    /// New driver; the deadline starts at the current instant
    pub fn new(config: &LinkConfig) -> Self {
        let threads = config.effective_threads();
        Self {
            deadline: Instant::now(),
            pool: (threads > 1).then(|| SpinPool::new(threads)),
        }
    }

    #[cfg(test)]
    pub(crate) fn deadline(&self) -> Instant {
        self.deadline
    }
}

impl PhyTransmit for PhyDriver {
    fn drive(&mut self, level: bool, duration: Duration) {
        self.deadline += duration;
        if level {
            match &self.pool {
                Some(pool) => {
                    pool.run_until(self.deadline);
                }
                None => {
                    let mut scratch = 0u64;
                    while Instant::now() < self.deadline {
                        // dummy work between clock reads
                        for _ in 0..1024 {
                            scratch = std::hint::black_box(scratch.wrapping_add(1));
                        }
                    }
                }
            }
        } else {
            std::thread::sleep(self.deadline.saturating_duration_since(Instant::now()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_thread_config() -> LinkConfig {
        let mut config = LinkConfig::default();
        config.with_max_threads(1);
        config
    }

    #[test]
    fn test_deadline_is_phase_locked() {
        // The deadline advances by exactly M * d over M calls,
        // independent of how late each sleep returns.
        let mut driver = PhyDriver::new(&single_thread_config());
        let origin = driver.deadline();

        let step = Duration::from_micros(500);
        for _ in 0..5 {
            driver.drive(false, step);
        }
        assert_eq!(driver.deadline(), origin + step * 5);
    }

    #[test]
    fn test_high_level_spins_past_deadline() {
        let mut driver = PhyDriver::new(&single_thread_config());
        let begin = Instant::now();
        driver.drive(true, Duration::from_millis(2));
        assert!(driver.deadline() <= Instant::now());
        assert!(begin.elapsed() >= Duration::from_millis(1));
    }

    #[test]
    fn test_pooled_drive() {
        let mut config = LinkConfig::default();
        config.with_max_threads(2);
        let mut driver = PhyDriver::new(&config);
        driver.drive(true, Duration::from_millis(2));
        driver.drive(false, Duration::from_millis(1));
        assert!(driver.deadline() <= Instant::now() + Duration::from_millis(3));
    }

    #[test]
    fn test_missed_deadline_does_not_accumulate() {
        let mut driver = PhyDriver::new(&single_thread_config());
        let origin = driver.deadline();

        // Fall far behind, then observe the schedule is unchanged.
        std::thread::sleep(Duration::from_millis(3));
        driver.drive(false, Duration::from_micros(100));
        driver.drive(false, Duration::from_micros(100));
        assert_eq!(driver.deadline(), origin + Duration::from_micros(200));
    }
}
