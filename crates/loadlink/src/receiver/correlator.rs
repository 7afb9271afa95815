//! Phase-offset correlator bank
//!
//! The receiver never knows where a code period begins, so it runs one
//! correlation channel per possible sample phase (`N = code length ×
//! oversampling` channels) and feeds every PHY sample to all of them.
//! The channel whose phase happens to match the transmitter
//! accumulates a correlation near 1.0; everything else hovers near the
//! code's off-peak autocorrelation floor. Raising each channel's
//! correlation to the fourth power before weighting makes the locked
//! channel dominate the bank's soft outputs without any hard channel
//! selection, which also makes slow code-phase drift a non-event: the
//! lock simply slides to the neighboring channel.
//!
//! The bit clock comes along for free. Within one code period the
//! second half is defined as the clock's high phase, so the locked
//! channel produces a clean rising edge at mid-period. The data value
//! that edge labels is the one latched at the *previous* period
//! close-out; the decoder therefore runs one code period behind the
//! air, which the framing layers never notice.

use std::sync::Arc;

/// Combined soft outputs of the bank for one PHY sample
///
/// Sign carries the logical value, magnitude the confidence. Both
/// magnitudes are bounded by the number of channels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BankOutput {
    /// Soft data estimate
    pub data: f32,
    /// Soft recovered bit clock, active high
    pub clock: f32,
}

/// One phase offset of the oversampled reference code
#[derive(Clone, Debug)]
pub(crate) struct CorrelationChannel {
    reference: Arc<[bool]>,
    offset: usize,
    position: usize,
    match_hi: u32,
    match_lo: u32,
    correlation: f32,
    data_state: bool,
}

/// Per-channel outputs for one sample
#[derive(Clone, Copy, Debug)]
pub(crate) struct ChannelOutput {
    pub correlation: f32,
    pub data: bool,
    pub clock: bool,
}

impl CorrelationChannel {
    fn new(reference: Arc<[bool]>, offset: usize) -> Self {
        debug_assert!(offset < reference.len());
        Self {
            reference,
            offset,
            position: offset,
            match_hi: 0,
            match_lo: 0,
            correlation: 0.0,
            data_state: false,
        }
    }

    /// Reset to initial conditions at this channel's phase offset
    pub(crate) fn reset(&mut self) {
        self.position = self.offset;
        self.match_hi = 0;
        self.match_lo = 0;
        self.correlation = 0.0;
        self.data_state = false;
    }

    /// Classify one sample against the reference at the current phase
    ///
    /// Closes out the running period first when the position has
    /// wrapped: the correlation magnitude is `|hi − lo| / period` and
    /// the data decision is the majority side.
    pub(crate) fn feed(&mut self, sample: bool) -> ChannelOutput {
        let len = self.reference.len();
        if self.position >= len {
            let top = self.match_hi.max(self.match_lo);
            let bot = self.match_hi.min(self.match_lo);
            self.correlation = (top - bot) as f32 / self.position as f32;
            self.data_state = self.match_hi > self.match_lo;
            self.position = 0;
            self.match_hi = 0;
            self.match_lo = 0;
        }

        if sample == self.reference[self.position] {
            self.match_hi += 1;
        } else {
            self.match_lo += 1;
        }
        self.position += 1;

        ChannelOutput {
            correlation: self.correlation,
            data: self.data_state,
            clock: self.position > len / 2,
        }
    }

    /// Correlation of the last full period (diagnostic)
    pub(crate) fn correlation(&self) -> f32 {
        self.correlation
    }
}

/// The bank of all `N` phase-offset channels
///
/// Channels are created once at construction and live for the whole
/// session; construction is the only place the oversampled reference
/// is expanded.
#[derive(Clone, Debug)]
pub struct CorrelatorBank {
    channels: Vec<CorrelationChannel>,
    weight_exponent: i32,
}

impl CorrelatorBank {
    /// Build the bank from a spread code
    ///
    /// The reference is the code with each chip repeated `oversampling`
    /// times; one channel is created per phase offset of that
    /// reference.
    pub fn new(code: &[bool], oversampling: usize, weight_exponent: i32) -> Self {
        assert!(!code.is_empty());
        assert!(oversampling >= 1);

        let reference: Arc<[bool]> = code
            .iter()
            .flat_map(|&chip| std::iter::repeat(chip).take(oversampling))
            .collect();
        let channels = (0..reference.len())
            .map(|offset| CorrelationChannel::new(Arc::clone(&reference), offset))
            .collect();

        Self {
            channels,
            weight_exponent,
        }
    }

    /// Number of channels (`code length × oversampling`)
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Always false; the bank is never empty
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Feed one PHY sample to every channel
    ///
    /// Each channel's vote is weighted by its correlation raised to
    /// the configured exponent, so unsynchronized channels contribute
    /// almost nothing.
    pub fn feed(&mut self, sample: bool) -> BankOutput {
        let mut out = BankOutput::default();
        for channel in &mut self.channels {
            let vote = channel.feed(sample);
            let weight = vote.correlation.powi(self.weight_exponent);
            out.data += if vote.data { weight } else { -weight };
            out.clock += if vote.clock { weight } else { -weight };
        }
        out
    }

    /// Last-period correlation of every channel (diagnostic)
    pub fn correlations(&self) -> Vec<f32> {
        self.channels.iter().map(|c| c.correlation()).collect()
    }

    /// Reset every channel to its initial phase offset
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
    }

    /// Heuristic code-phase lock assessment
    ///
    /// True when the best channel stands `stdev_multiple` standard
    /// deviations above the mean of the correlation vector. Unreliable;
    /// use it for logging, never to gate bit output.
    pub fn is_locked(&self, stdev_multiple: f32) -> bool {
        let cvec = self.correlations();
        let (mean, stdev) = mean_stdev(&cvec);
        let max = cvec.iter().cloned().fold(0.0f32, f32::max);
        (max - mean) > stdev * stdev_multiple
    }

    #[cfg(test)]
    pub(crate) fn positions(&self) -> Vec<usize> {
        self.channels.iter().map(|c| c.position).collect()
    }
}

/// Mean and standard deviation of a correlation vector
pub(crate) fn mean_stdev(values: &[f32]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_approx_eq::assert_approx_eq;

    use crate::testutil::msequence31;

    /// Repeat the reference (or its complement) for `periods` periods
    fn reference_stream(code: &[bool], oversampling: usize, periods: usize) -> Vec<bool> {
        let mut out = Vec::new();
        for _ in 0..periods {
            for &chip in code {
                out.extend(std::iter::repeat(chip).take(oversampling));
            }
        }
        out
    }

    #[test]
    fn test_channel_counts_balance() {
        // A zero-offset channel satisfies hi + lo == position from the
        // first sample; an offset channel only after its partial first
        // period closes out.
        let code = msequence31();
        let reference: Arc<[bool]> = Arc::from(code.as_slice());

        for offset in [0usize, 7] {
            let mut channel = CorrelationChannel::new(Arc::clone(&reference), offset);
            let first_close = code.len() - offset;

            let mut state = 0x9E3779B9u32;
            for step in 0..200 {
                state = state.wrapping_mul(1664525).wrapping_add(1013904223);
                channel.feed(state & 1 == 1);
                if offset == 0 || step >= first_close {
                    assert_eq!(
                        (channel.match_hi + channel.match_lo) as usize,
                        channel.position
                    );
                }
                assert!(channel.position >= 1 && channel.position <= code.len());
                assert!(channel.correlation >= 0.0 && channel.correlation <= 1.0);
            }
        }
    }

    #[test]
    fn test_aligned_channel_locks_to_one() {
        let code = msequence31();
        let mut bank = CorrelatorBank::new(&code, 1, 4);
        for sample in reference_stream(&code, 1, 3) {
            bank.feed(sample);
        }

        let cvec = bank.correlations();
        assert_approx_eq!(cvec[0], 1.0);
        // every other phase sits at the m-sequence autocorrelation floor
        for &c in cvec.iter().skip(1) {
            assert_approx_eq!(c, 1.0 / 31.0, 1e-6);
        }
        assert!(bank.is_locked(5.0));
    }

    #[test]
    fn test_complement_latches_zero_data() {
        let code = msequence31();
        let mut bank = CorrelatorBank::new(&code, 1, 4);
        let complement: Vec<bool> = code.iter().map(|&c| !c).collect();
        let mut last = BankOutput::default();
        for sample in reference_stream(&complement, 1, 3) {
            last = bank.feed(sample);
        }

        // a complemented input correlates perfectly with inverted data
        let cvec = bank.correlations();
        assert_approx_eq!(cvec[0], 1.0);
        assert!(last.data < 0.0);
    }

    #[test]
    fn test_phase_offset_permutation() {
        let code = msequence31();
        let n = code.len() * 3;
        let mut bank = CorrelatorBank::new(&code, 3, 4);
        assert_eq!(bank.len(), n);

        for (step, sample) in reference_stream(&code, 3, 2).into_iter().enumerate() {
            bank.feed(sample);
            let mut positions = bank.positions();
            positions.sort_unstable();
            // after each sample exactly one channel sits at each phase
            assert!(
                positions.iter().enumerate().all(|(i, &p)| p == i + 1),
                "positions not a permutation after sample {}",
                step
            );
        }
    }

    #[test]
    fn test_soft_magnitudes_bounded() {
        let code = msequence31();
        let n = (code.len()) as f32;
        let mut bank = CorrelatorBank::new(&code, 1, 4);
        let mut out = BankOutput::default();
        for sample in reference_stream(&code, 1, 4) {
            out = bank.feed(sample);
            assert!(out.data.abs() <= n);
            assert!(out.clock.abs() <= n);
        }
        // and the locked bank's data estimate is confidently positive
        assert!(out.data > 0.5);
    }

    #[test]
    fn test_clock_edge_at_mid_period() {
        let code = msequence31();
        let mut bank = CorrelatorBank::new(&code, 1, 4);
        // two warm-up periods so channel weights are established
        for sample in reference_stream(&code, 1, 2) {
            bank.feed(sample);
        }

        let mut edges = 0;
        let mut last_clock = -1.0f32;
        for sample in reference_stream(&code, 1, 2) {
            let out = bank.feed(sample);
            if last_clock <= 0.0 && out.clock > 0.0 {
                edges += 1;
            }
            last_clock = out.clock;
        }
        assert_eq!(edges, 2, "one rising clock edge per code period");
    }

    #[test]
    fn test_mean_stdev() {
        let (mean, stdev) = mean_stdev(&[1.0, 1.0, 1.0, 1.0]);
        assert_approx_eq!(mean, 1.0);
        assert_approx_eq!(stdev, 0.0);

        let (mean, stdev) = mean_stdev(&[0.0, 2.0]);
        assert_approx_eq!(mean, 1.0);
        assert_approx_eq!(stdev, 1.0);
    }

    #[test]
    fn test_unlocked_on_noise() {
        let code = msequence31();
        let mut bank = CorrelatorBank::new(&code, 1, 4);
        let mut state = 0xDEADBEEFu32;
        for _ in 0..code.len() * 4 {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            bank.feed(state & 0x8000_0000 != 0);
        }
        // correlations stay bounded by 1.0, so no channel can stand
        // eight empirical deviations proud of the mean on noise alone
        assert!(!bank.is_locked(8.0));
    }
}
