use crate::error::{Result, TelemetryError};
use crate::gf256::{antilog, log, modnn, LOG_ZERO};
use crate::{RS_DATA_BYTES, RS_ECC_BYTES};

/// Index-form coefficients G0..G16 of the CCSDS (255,223) generator.
/// The polynomial is palindromic, G[i] == G[32 - i], so only half is stored.
const GENERATOR: [u8; RS_ECC_BYTES / 2 + 1] = [
    0, 249, 59, 66, 4, 43, 126, 251, 97, 30, 3, 213, 50, 66, 170, 5, 24,
];

/// First consecutive root exponent of the generator
pub const FIRST_ROOT: usize = 112;

/// Step between generator root exponents
pub const ROOT_STEP: usize = 11;

/// Systematic Reed-Solomon encoder for one codeword
///
/// Information bytes are folded into a 32-byte parity shift register one at
/// a time. Once every information byte has been fed, [`FecEncoder::parity`]
/// holds the parity symbols in transmission order. Fewer than 223 bytes
/// yields a shortened codeword (implicit leading zeros).
///
/// The register starts zeroed; call [`FecEncoder::reset`] before reusing the
/// encoder for a new codeword.
#[derive(Debug, Clone)]
pub struct FecEncoder {
    parity: [u8; RS_ECC_BYTES],
    count: usize,
}

impl FecEncoder {
    pub fn new() -> Self {
        Self {
            parity: [0u8; RS_ECC_BYTES],
            count: 0,
        }
    }

    /// Zero the parity register for a new codeword
    pub fn reset(&mut self) {
        self.parity = [0u8; RS_ECC_BYTES];
        self.count = 0;
    }

    /// Fold one information byte into the parity register
    pub fn update(&mut self, byte: u8) -> Result<()> {
        if self.count >= RS_DATA_BYTES {
            return Err(TelemetryError::CodewordOverflow(self.count));
        }
        self.count += 1;

        let feedback = log(byte ^ self.parity[0]);
        if feedback != LOG_ZERO {
            let fb = feedback as usize;
            // G1..G15 mirror G17..G31
            for j in 1..RS_ECC_BYTES / 2 {
                let t = antilog(modnn(fb + GENERATOR[j] as usize) as u8);
                self.parity[j] ^= t;
                self.parity[RS_ECC_BYTES - j] ^= t;
            }
            let mid = RS_ECC_BYTES / 2;
            self.parity[mid] ^= antilog(modnn(fb + GENERATOR[mid] as usize) as u8);
        }

        self.parity.copy_within(1.., 0);
        // G0 is alpha^0, so the feedback term needs no multiply
        self.parity[RS_ECC_BYTES - 1] = antilog(feedback);
        Ok(())
    }

    /// Fold a run of information bytes
    pub fn update_all(&mut self, bytes: &[u8]) -> Result<()> {
        for &byte in bytes {
            self.update(byte)?;
        }
        Ok(())
    }

    /// Parity symbols accumulated so far, index 0 transmitted first
    pub fn parity(&self) -> &[u8; RS_ECC_BYTES] {
        &self.parity
    }

    /// Number of information bytes folded since the last reset
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Encode a whole block from a fresh register and return its parity
    pub fn encode(data: &[u8]) -> Result<[u8; RS_ECC_BYTES]> {
        let mut encoder = Self::new();
        encoder.update_all(data)?;
        Ok(encoder.parity)
    }
}

impl Default for FecEncoder {
    fn default() -> Self {
        Self::new()
    }
}
