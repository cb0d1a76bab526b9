use std::time::Duration;

use log::debug;

use crate::error::{Result, TelemetryError};
use crate::framing::{FrameEncoder, FrameHeader, FrameLayout};
use crate::interleave::{interleave, InterleavedFrame};
use crate::line_code::{LineEncoder, SYMBOL_BITS};
use crate::modulator::{Modulation, Modulator, ModulatorConfig};
use crate::symbols::build_symbols;
use crate::sync::{SyncWord, BPSK_SYNC, FSK_SYNC};

/// Header mode id sent in FSK frames
pub const FSK_MODE_ID: u8 = 7;
/// Header mode id sent in BPSK frames
pub const BPSK_MODE_ID: u8 = 0;

/// Everything that fixes the on-air shape of a frame
#[derive(Debug, Clone, PartialEq)]
pub struct TransmitProfile {
    pub layout: FrameLayout,
    pub sync: SyncWord,
    pub modulator: ModulatorConfig,
    pub mode_id: u8,
}

impl TransmitProfile {
    pub fn fsk() -> Self {
        Self {
            layout: FrameLayout::fsk(),
            sync: FSK_SYNC,
            modulator: ModulatorConfig::fsk(),
            mode_id: FSK_MODE_ID,
        }
    }

    pub fn bpsk() -> Self {
        Self {
            layout: FrameLayout::bpsk(),
            sync: BPSK_SYNC,
            modulator: ModulatorConfig::bpsk(),
            mode_id: BPSK_MODE_ID,
        }
    }

    pub fn for_modulation(modulation: Modulation) -> Self {
        match modulation {
            Modulation::Fsk => Self::fsk(),
            Modulation::Bpsk => Self::bpsk(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.layout.validate()?;
        self.modulator.validate()?;
        if self.sync.bits == 0 || self.sync.bits > 32 {
            return Err(TelemetryError::InvalidArgument(format!(
                "sync word of {} bits",
                self.sync.bits
            )));
        }
        if self.mode_id > 0x07 {
            return Err(TelemetryError::InvalidArgument(format!(
                "mode id {} does not fit in 3 bits",
                self.mode_id
            )));
        }
        Ok(())
    }

    /// Bits on air per frame, sync included
    pub fn frame_bits(&self) -> usize {
        self.sync.bits + self.layout.symbol_count() * SYMBOL_BITS
    }

    pub fn frame_samples(&self) -> usize {
        self.frame_bits() * self.modulator.samples_per_bit()
    }

    /// Air time of one frame
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_samples() as f64 / self.modulator.sample_rate as f64)
    }
}

/// Intermediate products of one encoded frame
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub header: Vec<u8>,
    pub frame: InterleavedFrame,
    pub symbols: Vec<u16>,
}

/// Transmission session encoder
///
/// Owns the running disparity and the modulator state, so consecutive frames
/// continue the same bit stream. Create one per transmission session.
pub struct Encoder {
    profile: TransmitProfile,
    line: LineEncoder,
    modulator: Modulator,
    frames: u64,
}

impl Encoder {
    pub fn new(profile: TransmitProfile) -> Result<Self> {
        profile.validate()?;
        Ok(Self {
            modulator: Modulator::new(profile.modulator.clone())?,
            line: LineEncoder::new(),
            profile,
            frames: 0,
        })
    }

    pub fn profile(&self) -> &TransmitProfile {
        &self.profile
    }

    pub fn line_encoder(&self) -> &LineEncoder {
        &self.line
    }

    pub fn modulator(&self) -> &Modulator {
        &self.modulator
    }

    /// Frames encoded since the session started
    pub fn frames_encoded(&self) -> u64 {
        self.frames
    }

    /// Header, interleave and line-code one frame without modulating it
    pub fn build_frame(&mut self, header: &FrameHeader, payload: &[u8]) -> Result<EncodedFrame> {
        let layout = &self.profile.layout;
        let header_bytes = FrameEncoder::encode_header(header, layout)?;
        let frame = interleave(layout, &header_bytes, payload)?;
        let symbols = build_symbols(&mut self.line, &frame, layout.end_of_frame_flag);

        Ok(EncodedFrame {
            header: header_bytes,
            frame,
            symbols,
        })
    }

    /// Encode one frame and append its samples to `out`
    pub fn encode_frame_into(
        &mut self,
        header: &FrameHeader,
        payload: &[u8],
        out: &mut Vec<i16>,
    ) -> Result<EncodedFrame> {
        let encoded = self.build_frame(header, payload)?;
        self.modulator
            .modulate_frame(&self.profile.sync, &encoded.symbols, out);
        self.frames += 1;

        debug!(
            "Frame {}: {} symbols, {} samples buffered, {} phase reversals",
            self.frames,
            encoded.symbols.len(),
            out.len(),
            self.modulator.reversals()
        );
        Ok(encoded)
    }

    /// Encode one frame into a fresh sample buffer
    pub fn encode_frame(&mut self, header: &FrameHeader, payload: &[u8]) -> Result<Vec<i16>> {
        let mut out = Vec::with_capacity(self.profile.frame_samples());
        self.encode_frame_into(header, payload, &mut out)?;
        Ok(out)
    }
}
