//! Link configuration
//!
//! [`LinkConfig`] gathers everything the transmitter and receiver are
//! built from. The defaults come from [`params`](crate::params) and are
//! the values both sides must share; the `with_*` methods exist for
//! experimentation, and any override must be applied identically to the
//! transmitting and receiving process.

use std::sync::Arc;
use std::time::Duration;

use crate::params;

/// Parameters for one end of the link
///
/// ```
/// use loadlink::LinkConfig;
///
/// let config = LinkConfig::default();
/// assert_eq!(config.code().len(), 1023);
/// assert_eq!(config.oversampling(), 3);
/// ```
///
/// The spread code, chip period, and oversampling factor define the
/// waveform; the remaining fields are empirical receiver tunables whose
/// defaults match the shipped constants.
#[derive(Clone, Debug)]
pub struct LinkConfig {
    code: Arc<[bool]>,
    chip_period: Duration,
    oversampling: usize,
    averaging_factor: f64,
    weight_exponent: i32,
    lock_threshold: f32,
    delimiter_bits: usize,
    max_threads: usize,
}

impl LinkConfig {
    /// Configuration with the shipped shared constants
    pub fn new() -> Self {
        Self {
            code: Arc::from(params::CDMA_CODE.as_slice()),
            chip_period: params::CHIP_PERIOD,
            oversampling: params::OVERSAMPLING,
            averaging_factor: params::AVERAGING_FACTOR,
            weight_exponent: params::WEIGHT_EXPONENT,
            lock_threshold: params::LOCK_THRESHOLD,
            delimiter_bits: params::DELIMITER_BITS,
            max_threads: params::MAX_CONCURRENCY,
        }
    }

    /// Replace the spread code
    ///
    /// Both sides must use the same code. Short codes lower the
    /// processing gain and are mainly useful for testing.
    pub fn with_code(&mut self, code: &[bool]) -> &mut Self {
        assert!(!code.is_empty(), "spread code must not be empty");
        self.code = Arc::from(code);
        self
    }

    /// Replace the chip period
    pub fn with_chip_period(&mut self, period: Duration) -> &mut Self {
        self.chip_period = period;
        self
    }

    /// Replace the receiver oversampling factor (samples per chip)
    pub fn with_oversampling(&mut self, oversampling: usize) -> &mut Self {
        self.oversampling = oversampling.max(1);
        self
    }

    /// Replace the sampler's tick-rate averaging factor
    pub fn with_averaging_factor(&mut self, factor: f64) -> &mut Self {
        self.averaging_factor = factor.max(1.0);
        self
    }

    /// Replace the correlation weight exponent
    pub fn with_weight_exponent(&mut self, exponent: i32) -> &mut Self {
        self.weight_exponent = exponent.max(1);
        self
    }

    /// Replace the code-phase lock heuristic threshold
    pub fn with_lock_threshold(&mut self, stdev_multiple: f32) -> &mut Self {
        self.lock_threshold = stdev_multiple;
        self
    }

    /// Replace the transmitted delimiter length, in zero bits
    ///
    /// Must be at least nine bits for the receiver to recognize it;
    /// longer delimiters give the correlator bank more time to acquire
    /// the code phase.
    pub fn with_delimiter_bits(&mut self, bits: usize) -> &mut Self {
        self.delimiter_bits = bits.max(9);
        self
    }

    /// Cap the PHY worker thread count
    ///
    /// The effective count is `min(cap, available_parallelism)`. A cap
    /// of 1 selects the inline single-core path; pair it with
    /// [`pin_to_core`](crate::affinity::pin_to_core).
    pub fn with_max_threads(&mut self, cap: usize) -> &mut Self {
        self.max_threads = cap.max(1);
        self
    }

    /// The shared spread code
    pub fn code(&self) -> &Arc<[bool]> {
        &self.code
    }

    /// Chip period on the PHY
    pub fn chip_period(&self) -> Duration {
        self.chip_period
    }

    /// Receiver samples per chip
    pub fn oversampling(&self) -> usize {
        self.oversampling
    }

    /// Receiver sample duration: `chip_period / oversampling`
    pub fn sample_duration(&self) -> Duration {
        self.chip_period / self.oversampling as u32
    }

    /// Sampler tick-rate averaging factor
    pub fn averaging_factor(&self) -> f64 {
        self.averaging_factor
    }

    /// Correlation weight exponent
    pub fn weight_exponent(&self) -> i32 {
        self.weight_exponent
    }

    /// Lock heuristic threshold, in standard deviations
    pub fn lock_threshold(&self) -> f32 {
        self.lock_threshold
    }

    /// Transmitted delimiter length, in zero bits
    pub fn delimiter_bits(&self) -> usize {
        self.delimiter_bits
    }

    /// PHY worker thread cap
    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Effective PHY worker thread count on this host
    pub fn effective_threads(&self) -> usize {
        self.max_threads.min(crate::affinity::hardware_concurrency())
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::new()
    }
}
