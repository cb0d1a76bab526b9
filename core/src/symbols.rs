use crate::interleave::InterleavedFrame;
use crate::line_code::{LineEncoder, LineInput};

/// Collects line-coded symbols for one frame through the session encoder
pub struct SymbolStreamBuilder<'a> {
    line: &'a mut LineEncoder,
    symbols: Vec<u16>,
}

impl<'a> SymbolStreamBuilder<'a> {
    pub fn new(line: &'a mut LineEncoder) -> Self {
        Self {
            line,
            symbols: Vec::new(),
        }
    }

    pub fn with_capacity(line: &'a mut LineEncoder, capacity: usize) -> Self {
        Self {
            line,
            symbols: Vec::with_capacity(capacity),
        }
    }

    pub fn push_byte(&mut self, byte: u8) -> &mut Self {
        let symbol = self.line.encode(LineInput::Data(byte));
        self.symbols.push(symbol);
        self
    }

    pub fn push_bytes<I: IntoIterator<Item = u8>>(&mut self, bytes: I) -> &mut Self {
        for byte in bytes {
            self.push_byte(byte);
        }
        self
    }

    /// Append the K.28.5 inter-frame flag
    pub fn push_end_of_frame(&mut self) -> &mut Self {
        let symbol = self.line.encode(LineInput::EndOfFrame);
        self.symbols.push(symbol);
        self
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn finish(self) -> Vec<u16> {
        self.symbols
    }
}

/// Line-code a frame: written bytes, then parity grouped by parity index
/// across sub-frames, then the optional end-of-frame flag
pub fn build_symbols(line: &mut LineEncoder, frame: &InterleavedFrame, end_of_frame: bool) -> Vec<u16> {
    let capacity = frame.written.len() + frame.parity.len() * crate::RS_ECC_BYTES + 1;
    let mut builder = SymbolStreamBuilder::with_capacity(line, capacity);
    builder
        .push_bytes(frame.written.iter().copied())
        .push_bytes(frame.parity_interleaved());
    if end_of_frame {
        builder.push_end_of_frame();
    }
    builder.finish()
}
