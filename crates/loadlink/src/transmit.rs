//! Transmit pipeline: packets → bytes → bits → chips → CPU load
//!
//! Each data bit is spread over the whole code sequence: a 1 bit sends
//! the code as-is, a 0 bit sends its complement, one chip per
//! [`chip period`](crate::LinkConfig::chip_period). Framing is a single
//! high start bit before each byte's eight MSB-first data bits, a run
//! of zero bits as the frame delimiter, and a trailing big-endian
//! CRC-16-CCITT over the payload.

#[cfg(not(test))]
use log::debug;

#[cfg(test)]
use std::println as debug;

use std::sync::Arc;
use std::time::Duration;

use crate::crc16::Crc16;
use crate::phy::PhyTransmit;
use crate::LinkConfig;

/// The whole transmit chain over any [`PhyTransmit`]
///
/// In production the PHY is a [`PhyDriver`](crate::PhyDriver); tests
/// substitute a recording sink and check the chip stream.
///
/// Transmission is synchronous: [`send_packet`](Transmitter::send_packet)
/// returns once the deadline of the final chip has passed.
#[derive(Debug)]
pub struct Transmitter<P> {
    phy: P,
    code: Arc<[bool]>,
    chip_period: Duration,
    delimiter_bits: usize,
}

impl<P: PhyTransmit> Transmitter<P> {
    /// New transmitter over `phy`
    pub fn new(phy: P, config: &LinkConfig) -> Self {
        Self {
            phy,
            code: Arc::clone(config.code()),
            chip_period: config.chip_period(),
            delimiter_bits: config.delimiter_bits(),
        }
    }

    /// Transmit one framed packet
    ///
    /// Emits delimiter, payload bytes, the payload's CRC high byte then
    /// low byte, and a closing delimiter. Blocks until the last chip's
    /// deadline has passed.
    pub fn send_packet(&mut self, payload: &[u8]) {
        self.send_delimiter();

        let mut crc = Crc16::new();
        for &byte in payload {
            self.send_byte(byte);
            crc.update(byte);
        }

        let crc = crc.value();
        self.send_byte((crc >> 8) as u8);
        self.send_byte(crc as u8);

        self.send_delimiter();
    }

    /// Consume the transmitter, returning the PHY
    pub fn into_phy(self) -> P {
        self.phy
    }

    fn send_delimiter(&mut self) {
        debug!("delimiter ({} bits)", self.delimiter_bits);
        for _ in 0..self.delimiter_bits {
            self.send_bit(false);
        }
    }

    fn send_byte(&mut self, byte: u8) {
        debug!("byte {:#04x}", byte);
        self.send_bit(true); // start bit
        for shift in (0..8).rev() {
            self.send_bit(byte & (1 << shift) != 0);
        }
    }

    /// Spread one data bit over the full code sequence
    fn send_bit(&mut self, bit: bool) {
        let code = Arc::clone(&self.code);
        for &chip in code.iter() {
            // pass the code through for a 1 bit, inverted for a 0 bit
            self.phy.drive(chip == bit, self.chip_period);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testutil::RecordingPhy;

    const TEST_CODE: &[bool] = &[true, true, false, true, false];
    const TEST_PERIOD: Duration = Duration::from_millis(16);

    fn test_transmitter() -> Transmitter<RecordingPhy> {
        let mut config = LinkConfig::default();
        config.with_code(TEST_CODE).with_chip_period(TEST_PERIOD);
        Transmitter::new(RecordingPhy::default(), &config)
    }

    fn spread(bit: bool) -> Vec<bool> {
        TEST_CODE.iter().map(|&chip| chip == bit).collect()
    }

    #[test]
    fn test_bit_spreading() {
        let mut tx = test_transmitter();
        tx.send_bit(true);
        tx.send_bit(false);

        let phy = tx.into_phy();
        assert_eq!(phy.chip_period, Some(TEST_PERIOD));
        let chips = phy.chips;
        assert_eq!(&chips[..TEST_CODE.len()], TEST_CODE);
        let complement: Vec<bool> = TEST_CODE.iter().map(|&c| !c).collect();
        assert_eq!(&chips[TEST_CODE.len()..], complement.as_slice());
    }

    #[test]
    fn test_byte_framing() {
        let mut tx = test_transmitter();
        tx.send_byte(0xA3);

        let mut expect = spread(true); // start bit
        for bit in [true, false, true, false, false, false, true, true] {
            expect.extend(spread(bit)); // 0xA3 MSB-first
        }
        assert_eq!(tx.into_phy().chips, expect);
    }

    #[test]
    fn test_delimiter_is_all_zero_bits() {
        let mut tx = test_transmitter();
        tx.send_delimiter();

        let chips = tx.into_phy().chips;
        assert_eq!(chips.len(), crate::params::DELIMITER_BITS * TEST_CODE.len());
        let zero = spread(false);
        for run in chips.chunks(TEST_CODE.len()) {
            assert_eq!(run, zero.as_slice());
        }
    }

    #[test]
    fn test_packet_layout() {
        let mut tx = test_transmitter();
        tx.send_packet(b"Hi");

        // delimiter + 4 framed bytes (payload + CRC 0x64E5) + delimiter
        let bits_per_byte = 9;
        let delim = crate::params::DELIMITER_BITS;
        let expect_bits = delim + 4 * bits_per_byte + delim;
        let chips = tx.into_phy().chips;
        assert_eq!(chips.len(), expect_bits * TEST_CODE.len());

        // the first framed byte starts right after the delimiter
        let byte_at = |bit_index: usize| -> &[bool] {
            &chips[bit_index * TEST_CODE.len()..(bit_index + 1) * TEST_CODE.len()]
        };
        assert_eq!(byte_at(delim), spread(true).as_slice(), "start bit");

        // CRC 0x64E5 transmitted high byte first
        let crc_hi_start = delim + 2 * bits_per_byte;
        let mut expect_crc = Vec::new();
        for byte in [0x64u8, 0xE5] {
            expect_crc.extend(spread(true));
            for shift in (0..8).rev() {
                expect_crc.extend(spread(byte & (1 << shift) != 0));
            }
        }
        let crc_chips =
            &chips[crc_hi_start * TEST_CODE.len()..(crc_hi_start + 18) * TEST_CODE.len()];
        assert_eq!(crc_chips, expect_crc.as_slice());
    }

    #[test]
    fn test_empty_payload_sends_crc_only() {
        let mut tx = test_transmitter();
        tx.send_packet(&[]);

        // delimiter, 0xFF, 0xFF (CRC of nothing), delimiter
        let delim = crate::params::DELIMITER_BITS;
        let chips = tx.into_phy().chips;
        assert_eq!(chips.len(), (2 * delim + 2 * 9) * TEST_CODE.len());

        let mut expect = Vec::new();
        for _ in 0..2 {
            expect.extend(spread(true));
            for _ in 0..8 {
                expect.extend(spread(true));
            }
        }
        let body = &chips[delim * TEST_CODE.len()..(delim + 18) * TEST_CODE.len()];
        assert_eq!(body, expect.as_slice());
    }
}
