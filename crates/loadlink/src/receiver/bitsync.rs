//! Bit recovery from the bank's soft outputs

use super::correlator::BankOutput;

/// Rising-edge bit latch
///
/// Watches the sign of the soft recovered clock. On a rising edge
/// (unlatched, clock goes positive) it latches and emits the hard
/// decision on the soft data; on a falling edge (latched, clock goes
/// negative) it re-arms. The sign crossing of the *weighted* clock sum
/// provides the hysteresis; an exactly-zero clock changes nothing.
#[derive(Clone, Debug, Default)]
pub(crate) struct BitSync {
    latched: bool,
}

impl BitSync {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reset to the unlatched state
    pub(crate) fn reset(&mut self) {
        self.latched = false;
    }

    /// Feed one bank output; returns a data bit on each rising edge
    pub(crate) fn feed(&mut self, soft: &BankOutput) -> Option<bool> {
        if !self.latched && soft.clock > 0.0 {
            self.latched = true;
            return Some(soft.data > 0.0);
        }
        if self.latched && soft.clock < 0.0 {
            self.latched = false;
        }
        None
    }
}
