/// Frame synchronization word, sent raw (not line coded) before every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWord {
    pub value: u32,
    pub bits: usize,
}

/// K.28.5 at negative disparity, the flag in front of FSK frames
pub const FSK_SYNC: SyncWord = SyncWord {
    value: 0x0FA,
    bits: 10,
};

/// 31-bit pseudo-noise flag used in front of BPSK frames
pub const BPSK_SYNC: SyncWord = SyncWord {
    value: 0x47CD_215D,
    bits: 31,
};

impl SyncWord {
    pub fn new(value: u32, bits: usize) -> Self {
        Self { value, bits }
    }

    /// Bits of the word, most significant first
    pub fn bits_msb_first(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.bits).rev().map(move |i| (self.value >> i) & 1 == 1)
    }
}

/// Bits of a 10-bit line symbol, most significant first
pub fn symbol_bits(symbol: u16) -> impl Iterator<Item = bool> {
    (0..crate::line_code::SYMBOL_BITS)
        .rev()
        .map(move |i| (symbol >> i) & 1 == 1)
}
