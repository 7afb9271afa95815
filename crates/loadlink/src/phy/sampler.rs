//! Receive-side PHY: tick-rate sampling and thresholding

use std::time::{Duration, Instant};

use super::pool::SpinPool;
use crate::LinkConfig;

/// Samples the PHY level once per sample window
///
/// [`read`](PhySampler::read) blocks for exactly one sample duration
/// (`chip_period / oversampling`, phase-locked like the driver) while
/// counting tight-loop iterations, then compares the achieved tick
/// rate against a slow single-pole average of itself. A rate *below*
/// the average means the transmitter is consuming the core: PHY high.
///
/// The average is seeded from the first observed rate so the threshold
/// never has to settle up from zero, and it keeps adapting afterwards,
/// which makes the detector immune to slow DC drift in the host's
/// background load.
///
/// `PhySampler` is an infinite `Iterator<Item = bool>`, which is the
/// form the [`LinkReceiver`](crate::LinkReceiver) consumes.
#[derive(Debug)]
pub struct PhySampler {
    deadline: Instant,
    sample_duration: Duration,
    pool: Option<SpinPool>,
    reference: RateAverage,
}

impl PhySampler {
    /// New sampler; the deadline starts at the current instant
    pub fn new(config: &LinkConfig) -> Self {
        let threads = config.effective_threads();
        Self {
            deadline: Instant::now(),
            sample_duration: config.sample_duration(),
            // a single counter runs inline for core-affinity locality
            pool: (threads > 1).then(|| SpinPool::new(threads)),
            reference: RateAverage::new(config.averaging_factor()),
        }
    }

    /// Block for one sample window and return the inferred PHY level
    pub fn read(&mut self) -> bool {
        self.deadline += self.sample_duration;

        let (ticks, elapsed) = match &self.pool {
            Some(pool) => pool.run_until(self.deadline),
            None => count_inline(self.deadline),
        };

        let nanos = (elapsed.as_nanos() as f64).max(1.0);
        let rate = ticks as f64 / nanos;
        rate < self.reference.track(rate)
    }

    #[cfg(test)]
    pub(crate) fn deadline(&self) -> Instant {
        self.deadline
    }
}

impl Iterator for PhySampler {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        Some(self.read())
    }
}

fn count_inline(deadline: Instant) -> (u64, Duration) {
    let started = Instant::now();
    let mut ticks = 0u64;
    while Instant::now() < deadline {
        ticks = ticks.wrapping_add(1);
    }
    (ticks, started.elapsed())
}

/// Single-pole running average of the tick rate
///
/// `level += (rate - level) / factor` per sample, seeded with the
/// first observation. Acts as the DC reference the binary decision is
/// made against.
#[derive(Clone, Debug)]
struct RateAverage {
    factor: f64,
    level: Option<f64>,
}

impl RateAverage {
    fn new(factor: f64) -> Self {
        Self {
            factor,
            level: None,
        }
    }

    /// Fold in one rate observation and return the updated average
    fn track(&mut self, rate: f64) -> f64 {
        let level = self.level.get_or_insert(rate);
        *level += (rate - *level) / self.factor;
        *level
    }
}
