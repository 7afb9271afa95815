//! # loadlink: a data link over CPU contention
//!
//! This crate moves bytes between two processes on the same host that
//! share **no** explicit I/O channel: no socket, no pipe, no file. The
//! only shared medium is the CPU itself: the transmitter modulates how
//! much of the core it consumes, and the receiver infers that load by
//! timing how many tight-loop iterations it can complete in a fixed
//! wall-clock window.
//!
//! That binary "physical layer" is extremely noisy and has no framing
//! of its own, so the link stacks a classic receive chain on top of it:
//!
//! 1. **CDMA spreading.** Each data bit is expanded to a 1023-chip
//!    Gold code sequence (or its complement), giving the receiver
//!    processing gain and, courtesy of a bank of phase-offset
//!    correlators, a recovered bit clock with no separate
//!    synchronization channel.
//! 2. **Byte framing.** Every byte is introduced by a single high
//!    start bit and sent MSB-first; frames are delimited by long runs
//!    of zero bits.
//! 3. **Packets.** Payloads carry a trailing CRC-16-CCITT; anything
//!    that fails verification is dropped silently. A high decode error
//!    rate is the accepted price of operating over a side channel.
//!
//! ## Example
//!
//! Transmit (in one process):
//!
//! ```no_run
//! use loadlink::{LinkConfig, PhyDriver, Transmitter};
//!
//! let config = LinkConfig::default();
//! let mut tx = Transmitter::new(PhyDriver::new(&config), &config);
//! tx.send_packet(b"Hi");
//! ```
//!
//! Receive (in another process, sharing only the CPU):
//!
//! ```no_run
//! use loadlink::{LinkConfig, LinkReceiver, PhySampler};
//!
//! let config = LinkConfig::default();
//! let sampler = PhySampler::new(&config);
//! let mut rx = LinkReceiver::new(&config);
//! for payload in rx.iter_packets(sampler) {
//!     println!("received {} bytes", payload.len());
//! }
//! ```
//!
//! Both sides must be built from identical [`LinkConfig`] parameters;
//! there is no negotiation. Expect a bit rate measured in seconds per
//! bit. The point of this link is covertness, not throughput.
//!
//! ## Caveats
//!
//! The channel only exists while transmitter and receiver contend for
//! the same core(s). Virtualized hosts with aggressive scheduler
//! indirection may map the two processes to disjoint physical cores;
//! loading every core (the default) usually traverses that
//! indirection, at the cost of stealth. The link is one-directional,
//! unauthenticated, and unencrypted by design.

pub mod affinity;
pub mod crc16;
pub mod params;

mod config;
mod phy;
mod receiver;
mod transmit;

pub use config::LinkConfig;
pub use phy::{PhyDriver, PhySampler, PhyTransmit};
pub use receiver::{BankOutput, CorrelatorBank, FrameError, LinkEvent, LinkReceiver, Symbol};
pub use transmit::Transmitter;

#[cfg(test)]
pub(crate) mod testutil {
    //! Shared fixtures for offline loopback testing

    use std::time::Duration;

    use crate::phy::PhyTransmit;

    /// PHY stand-in that records the transmitted chip stream
    #[derive(Debug, Default)]
    pub(crate) struct RecordingPhy {
        pub chips: Vec<bool>,
        pub chip_period: Option<Duration>,
    }

    impl PhyTransmit for RecordingPhy {
        fn drive(&mut self, level: bool, duration: Duration) {
            match self.chip_period {
                None => self.chip_period = Some(duration),
                Some(period) => assert_eq!(period, duration, "uneven chip timing"),
            }
            self.chips.push(level);
        }
    }

    /// A 31-chip m-sequence (x^5 + x^3 + 1), short enough for fast
    /// loopback tests but with the same two-level autocorrelation the
    /// full-length Gold code relies on
    pub(crate) fn msequence31() -> Vec<bool> {
        let mut seq = vec![true; 5];
        for n in 5..31 {
            let bit = seq[n - 2] ^ seq[n - 5];
            seq.push(bit);
        }
        seq
    }

    /// Expand a chip stream to `factor` receiver samples per chip
    pub(crate) fn oversample(chips: &[bool], factor: usize) -> Vec<bool> {
        chips
            .iter()
            .flat_map(|&chip| std::iter::repeat(chip).take(factor))
            .collect()
    }

    #[test]
    fn test_msequence_has_two_level_autocorrelation() {
        let seq = msequence31();
        assert_eq!(seq.len(), 31);
        assert_eq!(seq.iter().filter(|&&b| b).count(), 16);

        for shift in 1..31 {
            let agreements = (0..31)
                .filter(|&i| seq[i] == seq[(i + shift) % 31])
                .count() as i32;
            // agreements − disagreements == −1 at every nonzero shift
            assert_eq!(agreements * 2 - 31, -1, "shift {}", shift);
        }
    }
}
