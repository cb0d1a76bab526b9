//! 8b10b line code
//!
//! Standard Widmer–Franaszek encoding: the low five bits (EDCBA) map to a
//! 6-bit sub-block `abcdei`, the high three bits (HGF) to a 4-bit sub-block
//! `fghj`. Each symbol is returned right-justified in a `u16` with `a` in
//! bit 9, so bits are transmitted from bit 9 down to bit 0.
//!
//! The running disparity lives in [`LineEncoder`] for the whole transmission
//! session. It is never reset between frames.

use crate::error::{Result, TelemetryError};

/// Number of bits in one line-coded symbol
pub const SYMBOL_BITS: usize = 10;

/// K.28.5 as sent with negative running disparity
pub const K28_5_NEG: u16 = 0b001111_1010;

/// K.28.5 as sent with positive running disparity
pub const K28_5_POS: u16 = 0b110000_0101;

/// 5b/6b sub-blocks indexed by EDCBA: (RD- form, RD+ form)
const SUB_BLOCK_6: [(u8, u8); 32] = [
    (0b100111, 0b011000), // D.00
    (0b011101, 0b100010), // D.01
    (0b101101, 0b010010), // D.02
    (0b110001, 0b110001), // D.03
    (0b110101, 0b001010), // D.04
    (0b101001, 0b101001), // D.05
    (0b011001, 0b011001), // D.06
    (0b111000, 0b000111), // D.07
    (0b111001, 0b000110), // D.08
    (0b100101, 0b100101), // D.09
    (0b010101, 0b010101), // D.10
    (0b110100, 0b110100), // D.11
    (0b001101, 0b001101), // D.12
    (0b101100, 0b101100), // D.13
    (0b011100, 0b011100), // D.14
    (0b010111, 0b101000), // D.15
    (0b011011, 0b100100), // D.16
    (0b100011, 0b100011), // D.17
    (0b010011, 0b010011), // D.18
    (0b110010, 0b110010), // D.19
    (0b001011, 0b001011), // D.20
    (0b101010, 0b101010), // D.21
    (0b011010, 0b011010), // D.22
    (0b111010, 0b000101), // D.23
    (0b110011, 0b001100), // D.24
    (0b100110, 0b100110), // D.25
    (0b010110, 0b010110), // D.26
    (0b110110, 0b001001), // D.27
    (0b001110, 0b001110), // D.28
    (0b101110, 0b010001), // D.29
    (0b011110, 0b100001), // D.30
    (0b101011, 0b010100), // D.31
];

/// 3b/4b sub-blocks indexed by HGF: (RD- form, RD+ form); index 7 is the primary D.x.P7
const SUB_BLOCK_4: [(u8, u8); 8] = [
    (0b1011, 0b0100), // D.x.0
    (0b1001, 0b1001), // D.x.1
    (0b0101, 0b0101), // D.x.2
    (0b1100, 0b0011), // D.x.3
    (0b1101, 0b0010), // D.x.4
    (0b1010, 0b1010), // D.x.5
    (0b0110, 0b0110), // D.x.6
    (0b1110, 0b0001), // D.x.P7
];

/// Alternate D.x.A7, used where P7 would extend a run past five bits
const SUB_BLOCK_4_A7: (u8, u8) = (0b0111, 0b1000);

/// Running disparity of the transmitted bit stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disparity {
    /// More zeros than ones sent so far (RD-)
    #[default]
    Negative,
    /// More ones than zeros sent so far (RD+)
    Positive,
}

impl Disparity {
    fn select(self, forms: (u8, u8)) -> u8 {
        match self {
            Disparity::Negative => forms.0,
            Disparity::Positive => forms.1,
        }
    }

    /// Disparity after a sub-block of `width` bits with `ones` set
    fn after(self, ones: u32, width: u32) -> Self {
        match (2 * ones).cmp(&width) {
            std::cmp::Ordering::Greater => Disparity::Positive,
            std::cmp::Ordering::Less => Disparity::Negative,
            std::cmp::Ordering::Equal => self,
        }
    }
}

/// One value to push through the line encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineInput {
    Data(u8),
    /// Inter-frame flag, sent as K.28.5
    EndOfFrame,
}

impl TryFrom<i32> for LineInput {
    type Error = TelemetryError;

    /// -1 is the end-of-frame marker; 0..=255 are data bytes
    fn try_from(value: i32) -> Result<Self> {
        match value {
            -1 => Ok(LineInput::EndOfFrame),
            0..=255 => Ok(LineInput::Data(value as u8)),
            _ => Err(TelemetryError::InvalidArgument(format!(
                "8b10b input {} is neither a byte nor the end-of-frame marker",
                value
            ))),
        }
    }
}

/// Session-scoped 8b10b encoder
#[derive(Debug, Clone, Default)]
pub struct LineEncoder {
    disparity: Disparity,
}

impl LineEncoder {
    /// Start a session at negative running disparity
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_disparity(disparity: Disparity) -> Self {
        Self { disparity }
    }

    pub fn disparity(&self) -> Disparity {
        self.disparity
    }

    /// Encode one value and advance the running disparity
    pub fn encode(&mut self, input: LineInput) -> u16 {
        let (symbol, next) = match input {
            LineInput::Data(byte) => encode_data(self.disparity, byte),
            LineInput::EndOfFrame => match self.disparity {
                Disparity::Negative => (K28_5_NEG, Disparity::Positive),
                Disparity::Positive => (K28_5_POS, Disparity::Negative),
            },
        };
        self.disparity = next;
        symbol
    }

    /// Encode a raw value where -1 selects the end-of-frame flag
    pub fn encode_value(&mut self, value: i32) -> Result<u16> {
        let input = LineInput::try_from(value)?;
        Ok(self.encode(input))
    }
}

/// Pure lookup: symbol and resulting disparity for `byte` sent at `rd`
pub fn encode_data(rd: Disparity, byte: u8) -> (u16, Disparity) {
    let x = (byte & 0x1f) as usize;
    let y = (byte >> 5) as usize;

    let six = rd.select(SUB_BLOCK_6[x]);
    let rd = rd.after(six.count_ones(), 6);

    let use_alternate = y == 7
        && match rd {
            Disparity::Negative => matches!(x, 17 | 18 | 20),
            Disparity::Positive => matches!(x, 11 | 13 | 14),
        };
    let four = if use_alternate {
        rd.select(SUB_BLOCK_4_A7)
    } else {
        rd.select(SUB_BLOCK_4[y])
    };
    let rd = rd.after(four.count_ones(), 4);

    (((six as u16) << 4) | four as u16, rd)
}
