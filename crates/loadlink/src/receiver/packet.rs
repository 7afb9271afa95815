//! Packet assembly and CRC verification

use thiserror::Error;

use super::framing::Symbol;
use crate::crc16::Crc16;

/// A frame that arrived but failed verification
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum FrameError {
    /// CRC residue over `payload ∥ CRC` was nonzero
    #[error("crc error: residue {residue:#06x} over {length} byte frame")]
    CrcMismatch {
        /// Leftover CRC register value (zero means intact)
        residue: u16,
        /// Total frame length including the two CRC bytes
        length: usize,
    },
}

/// Collects bytes between delimiters and verifies the trailing CRC
///
/// Bytes accumulate until a delimiter closes the frame. A frame of at
/// least two bytes is CRC-checked: zero residue pops the two CRC bytes
/// and yields the payload, nonzero residue reports
/// [`FrameError::CrcMismatch`]. Anything shorter, including the empty
/// "frames" a long delimiter produces, is discarded without comment,
/// which is what makes the tail of an over-long delimiter harmless.
#[derive(Clone, Debug, Default)]
pub(crate) struct PacketAssembler {
    buffer: Vec<u8>,
}

impl PacketAssembler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Discard any partially assembled frame
    pub(crate) fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Feed one symbol; a delimiter may complete a frame
    pub(crate) fn feed(&mut self, symbol: Symbol) -> Option<Result<Vec<u8>, FrameError>> {
        match symbol {
            Symbol::Byte(byte) => {
                self.buffer.push(byte);
                None
            }
            Symbol::Delimiter => {
                if self.buffer.len() < 2 {
                    self.buffer.clear();
                    return None;
                }

                let mut crc = Crc16::new();
                crc.update_all(&self.buffer);
                let residue = crc.value();

                let mut frame = std::mem::take(&mut self.buffer);
                if residue == 0 {
                    frame.truncate(frame.len() - 2);
                    Some(Ok(frame))
                } else {
                    Some(Err(FrameError::CrcMismatch {
                        residue,
                        length: frame.len(),
                    }))
                }
            }
        }
    }
}

/// Frame a payload the way the transmitter does (payload ∥ CRC-BE)
#[cfg(test)]
pub(crate) fn framed(payload: &[u8]) -> Vec<u8> {
    let mut bytes = payload.to_vec();
    bytes.extend_from_slice(&crate::crc16::checksum(payload).to_be_bytes());
    bytes
}
