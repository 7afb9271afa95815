//! The CPU-contention physical layer
//!
//! The two processes share no file, socket, or pipe: only the CPU. The
//! transmitting side modulates how much of the core it consumes; the
//! receiving side infers that load by counting how many tight-loop
//! iterations it can complete in a fixed wall-clock window. Fewer
//! iterations mean the other process is spinning (PHY high); more mean
//! the core is idle (PHY low).
//!
//! Three pieces live here:
//!
//! * [`PhyDriver`] raises and releases CPU load with phase-locked
//!   timing (transmit side).
//! * [`PhySampler`] measures the achievable tick rate once per sample
//!   window and thresholds it against a slow-moving reference (receive
//!   side).
//! * A shared spin-worker pool. Loading a core and counting ticks are
//!   the same loop, so both sides fan out to the same kind of worker;
//!   the driver simply ignores the counts. On virtualized hosts the
//!   logical core the receiver observes may map to a different physical
//!   core than the one the transmitter runs on, and loading *all* cores
//!   traverses that indirection.
//!
//! Timing discipline matters more than anything else in this module:
//! each side carries a monotonic deadline that advances by exactly one
//! period per call, so scheduling overshoot is absorbed instead of
//! accumulating as code-phase error.

mod driver;
mod pool;
mod sampler;

pub use driver::PhyDriver;
pub use sampler::PhySampler;

use std::time::Duration;

/// Contract of the transmit-side PHY
///
/// `drive` occupies the shared core for `duration` when `level` is
/// high, or leaves it idle for `duration` when low. Implementations
/// must keep a persistent deadline so that consecutive calls stay
/// phase-locked to the chip clock; phase error attenuates the signal at
/// the receiver's correlators.
///
/// The emitter chain is generic over this trait so tests can capture
/// the chip stream instead of spinning a core.
pub trait PhyTransmit {
    /// Hold the PHY at `level` for `duration`
    fn drive(&mut self, level: bool, duration: Duration);
}
