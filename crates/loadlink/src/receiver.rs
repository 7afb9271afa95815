//! Full receive chain

mod bitsync;
mod correlator;
mod framing;
mod packet;

pub use correlator::{BankOutput, CorrelatorBank};
pub use framing::Symbol;
pub use packet::FrameError;

#[cfg(not(test))]
use log::{debug, info, warn};

#[cfg(test)]
use std::{println as debug, println as info, println as warn};

use std::collections::VecDeque;

use crate::LinkConfig;

use self::bitsync::BitSync;
use self::framing::SymbolDecoder;
use self::packet::PacketAssembler;

/// A complete receive chain for the CPU-contention link
///
/// The receiver consumes binary PHY samples and performs, in order:
///
/// 1. Correlation against every phase offset of the oversampled
///    spread code, producing soft data and clock estimates per sample.
/// 2. Bit recovery on the rising edges of the soft clock.
/// 3. Symbol recovery: start-bit framed bytes vs. delimiters.
/// 4. Packet assembly with CRC-16-CCITT verification.
///
/// There is no explicit "no carrier" state. While unsynchronized the
/// bit layer produces garbage, which the start-bit rule and the CRC
/// silently absorb; the only user-visible notification of trouble is
/// a logged CRC error. The code-phase lock heuristic is tracked and
/// reported as an event, but it never gates the data path.
///
/// Bind an input with [`iter_events()`](LinkReceiver::iter_events) or
/// [`iter_packets()`](LinkReceiver::iter_packets). The input is any
/// `IntoIterator<Item = bool>`: a live
/// [`PhySampler`](crate::PhySampler), which blocks one sample window
/// per item, or a recorded sample vector in tests.
///
/// ```
/// use loadlink::{LinkConfig, LinkReceiver};
///
/// let config = LinkConfig::default();
/// let mut rx = LinkReceiver::new(&config);
/// // no samples, no packets
/// assert_eq!(rx.iter_packets(std::iter::empty()).next(), None);
/// ```
#[derive(Clone, Debug)]
pub struct LinkReceiver {
    bank: CorrelatorBank,
    bitsync: BitSync,
    symbols: SymbolDecoder,
    assembler: PacketAssembler,
    lock_threshold: f32,
    locked: bool,
    sample_counter: u64,
    bit_counter: u64,
    event_queue: VecDeque<LinkEvent>,
}

/// Receiver state changes, in the order they occur
#[derive(Clone, Debug, PartialEq)]
pub enum LinkEvent {
    /// The code-phase lock heuristic changed (diagnostic only)
    Lock(bool),
    /// A symbol was decoded
    Symbol(Symbol),
    /// A delimiter closed a frame: the payload, or why it was dropped
    Packet(Result<Vec<u8>, FrameError>),
}

impl LinkEvent {
    /// The payload, if this event is a verified packet
    pub fn into_packet_ok(self) -> Option<Vec<u8>> {
        match self {
            LinkEvent::Packet(Ok(payload)) => Some(payload),
            _ => None,
        }
    }
}

impl std::fmt::Display for LinkEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkEvent::Lock(true) => write!(f, "signal acquired"),
            LinkEvent::Lock(false) => write!(f, "carrier lost"),
            LinkEvent::Symbol(sym) => write!(f, "{}", sym),
            LinkEvent::Packet(Ok(payload)) => write!(f, "packet: {} bytes", payload.len()),
            LinkEvent::Packet(Err(err)) => write!(f, "{}", err),
        }
    }
}

impl LinkReceiver {
    /// New receiver for the given link parameters
    pub fn new(config: &LinkConfig) -> Self {
        Self::from(config)
    }

    /// Decode events from a source of PHY samples
    ///
    /// Consumes as many samples as needed to produce the next event;
    /// the iterator ends when the input is exhausted. With a live
    /// [`PhySampler`](crate::PhySampler) the input never ends and the
    /// iterator blocks in real time.
    #[must_use = "iterators are lazy and do nothing unless consumed"]
    pub fn iter_events<'rx, I>(&'rx mut self, input: I) -> impl Iterator<Item = LinkEvent> + 'rx
    where
        I: IntoIterator<Item = bool> + 'rx,
    {
        LinkReceiverIter {
            receiver: self,
            source: input.into_iter(),
        }
    }

    /// Decode CRC-verified payloads from a source of PHY samples
    ///
    /// Like [`iter_events()`](LinkReceiver::iter_events) but reports
    /// only packets that passed verification. CRC failures and lock
    /// transitions are still logged.
    #[must_use = "iterators are lazy and do nothing unless consumed"]
    pub fn iter_packets<'rx, I>(&'rx mut self, input: I) -> impl Iterator<Item = Vec<u8>> + 'rx
    where
        I: IntoIterator<Item = bool> + 'rx,
    {
        self.iter_events(input)
            .filter_map(|evt| evt.into_packet_ok())
    }

    /// Lifetime count of PHY samples consumed
    pub fn sample_counter(&self) -> u64 {
        self.sample_counter
    }

    /// Lifetime count of recovered bits
    pub fn bit_counter(&self) -> u64 {
        self.bit_counter
    }

    /// Clear all decoder state back to initial conditions
    pub fn reset(&mut self) {
        self.bank.reset();
        self.bitsync.reset();
        self.symbols.reset();
        self.assembler.reset();
        self.locked = false;
        self.sample_counter = 0;
        self.bit_counter = 0;
        self.event_queue.clear();
    }

    /// Run samples through the chain until an event emerges
    #[inline]
    fn process<I>(&mut self, samples: &mut I) -> Option<LinkEvent>
    where
        I: Iterator<Item = bool>,
    {
        if let Some(evt) = self.event_queue.pop_front() {
            return Some(evt);
        }

        for sample in samples {
            let soft = self.bank.feed(sample);
            self.sample_counter = self.sample_counter.wrapping_add(1);

            let Some(bit) = self.bitsync.feed(&soft) else {
                continue;
            };
            self.bit_counter = self.bit_counter.wrapping_add(1);
            self.log_bit(bit, &soft);

            // lock heuristic: reported, never gating
            let locked = self.bank.is_locked(self.lock_threshold);
            if locked != self.locked {
                self.locked = locked;
                info!(
                    "[{:<10}] {}",
                    self.bit_counter,
                    if locked { "signal acquired" } else { "carrier lost" }
                );
                self.event_queue.push_back(LinkEvent::Lock(locked));
            }

            if let Some(symbol) = self.symbols.feed(bit) {
                self.event_queue.push_back(LinkEvent::Symbol(symbol));
                if let Some(result) = self.assembler.feed(symbol) {
                    match &result {
                        Ok(payload) => {
                            info!("[{:<10}] packet: {} bytes", self.bit_counter, payload.len())
                        }
                        Err(err) => warn!("[{:<10}] {}", self.bit_counter, err),
                    }
                    self.event_queue.push_back(LinkEvent::Packet(result));
                }
            }

            if let Some(evt) = self.event_queue.pop_front() {
                return Some(evt);
            }
        }

        None
    }

    // Per-bit correlation diagnostics: summary statistics plus a
    // per-channel heatmap. One hex digit per channel above the noise
    // floor, blank otherwise.
    fn log_bit(&self, bit: bool, soft: &BankOutput) {
        let cvec = self.bank.correlations();
        let (mean, stdev) = correlator::mean_stdev(&cvec);
        let max = cvec.iter().cloned().fold(0.0f32, f32::max);

        let mut heat = String::with_capacity(cvec.len());
        for &c in &cvec {
            if c > 0.2 {
                let digit = ((c * 16.0) as u32).min(15);
                heat.push(char::from_digit(digit, 16).unwrap_or('f'));
            } else {
                heat.push(' ');
            }
        }

        debug!(
            "bit {} (data {:+.1}): corr mean={:.2} max={:.2} stdev={:.2} | {}",
            bit as u8,
            soft.data,
            mean,
            max,
            stdev,
            heat.trim_end()
        );
    }
}

impl From<&LinkConfig> for LinkReceiver {
    fn from(config: &LinkConfig) -> Self {
        Self {
            bank: CorrelatorBank::new(
                config.code(),
                config.oversampling(),
                config.weight_exponent(),
            ),
            bitsync: BitSync::new(),
            symbols: SymbolDecoder::new(),
            assembler: PacketAssembler::new(),
            lock_threshold: config.lock_threshold(),
            locked: false,
            sample_counter: 0,
            bit_counter: 0,
            event_queue: VecDeque::with_capacity(2),
        }
    }
}

#[derive(Debug)]
struct LinkReceiverIter<'rx, I>
where
    I: Iterator<Item = bool>,
{
    receiver: &'rx mut LinkReceiver,
    source: I,
}

impl<'rx, I> Iterator for LinkReceiverIter<'rx, I>
where
    I: Iterator<Item = bool>,
{
    type Item = LinkEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let evt = self.receiver.process(&mut self.source)?;
        debug!("{}", &evt);
        Some(evt)
    }
}
