//! Bit-to-sample waveform modulator
//!
//! Every bit becomes `samples_per_bit` signed 16-bit samples. FSK switches a
//! baseband level by bit value; BPSK keeps a continuous carrier and reverses
//! its phase on every 0 bit, softening the reversal by attenuating the
//! samples around it.

use std::f64::consts::PI;

use log::trace;

use crate::error::{Result, TelemetryError};
use crate::sync::{symbol_bits, SyncWord};
use crate::SAMPLE_RATE;

/// Carrier used by BPSK and for sizing the edge ramps
pub const CARRIER_HZ: f32 = 3000.0;

pub const FSK_BIT_RATE: u32 = 200;
pub const BPSK_BIT_RATE: u32 = 1200;

pub const FSK_AMPLITUDE: f32 = 32767.0 / 3.0;
pub const BPSK_AMPLITUDE: f32 = 32767.0;

/// FSK level as a fraction of the amplitude
const FSK_LEVEL: f32 = 0.25;

/// Gain applied next to a BPSK phase reversal
const REVERSAL_GAIN: f32 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modulation {
    Fsk,
    Bpsk,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModulatorConfig {
    pub modulation: Modulation,
    pub sample_rate: u32,
    pub bit_rate: u32,
    pub carrier_hz: f32,
    pub amplitude: f32,
}

impl ModulatorConfig {
    pub fn fsk() -> Self {
        Self {
            modulation: Modulation::Fsk,
            sample_rate: SAMPLE_RATE,
            bit_rate: FSK_BIT_RATE,
            carrier_hz: CARRIER_HZ,
            amplitude: FSK_AMPLITUDE,
        }
    }

    pub fn bpsk() -> Self {
        Self {
            modulation: Modulation::Bpsk,
            sample_rate: SAMPLE_RATE,
            bit_rate: BPSK_BIT_RATE,
            carrier_hz: CARRIER_HZ,
            amplitude: BPSK_AMPLITUDE,
        }
    }

    pub fn samples_per_bit(&self) -> usize {
        (self.sample_rate / self.bit_rate) as usize
    }

    /// Length of the edge ramps: half a carrier period in samples
    pub fn smaller(&self) -> usize {
        (self.sample_rate as f32 / (2.0 * self.carrier_hz)) as usize
    }

    pub fn validate(&self) -> Result<()> {
        if self.bit_rate == 0 || self.sample_rate % self.bit_rate != 0 {
            return Err(TelemetryError::InvalidArgument(format!(
                "bit rate {} must divide sample rate {}",
                self.bit_rate, self.sample_rate
            )));
        }
        if !(self.carrier_hz > 0.0 && self.carrier_hz < self.sample_rate as f32 / 2.0) {
            return Err(TelemetryError::InvalidArgument(format!(
                "carrier {} Hz outside (0, {}) Hz",
                self.carrier_hz,
                self.sample_rate / 2
            )));
        }
        if self.smaller() == 0 {
            return Err(TelemetryError::InvalidArgument(
                "carrier too high for an edge ramp".to_string(),
            ));
        }
        if !(self.amplitude > 0.0 && self.amplitude <= i16::MAX as f32) {
            return Err(TelemetryError::InvalidArgument(format!(
                "amplitude {} outside (0, {}]",
                self.amplitude,
                i16::MAX
            )));
        }
        Ok(())
    }
}

/// Session-scoped modulator
///
/// The BPSK phase, the carrier clock and the reversal counter persist across
/// frames and cycles. Ramp bookkeeping restarts whenever the output buffer
/// is empty or shorter than the last reversal position.
pub struct Modulator {
    config: ModulatorConfig,
    samples_per_bit: usize,
    smaller: usize,
    phase: f32,
    clock: u64,
    flip_at: usize,
    reversals: u64,
}

impl Modulator {
    pub fn new(config: ModulatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            samples_per_bit: config.samples_per_bit(),
            smaller: config.smaller(),
            config,
            phase: 1.0,
            clock: 0,
            flip_at: 0,
            reversals: 0,
        })
    }

    pub fn config(&self) -> &ModulatorConfig {
        &self.config
    }

    /// Current phase (BPSK) or level sign (FSK): +1 or -1
    pub fn phase(&self) -> i8 {
        if self.phase >= 0.0 {
            1
        } else {
            -1
        }
    }

    /// Phase reversals emitted since the session started
    pub fn reversals(&self) -> u64 {
        self.reversals
    }

    pub fn samples_per_bit(&self) -> usize {
        self.samples_per_bit
    }

    /// Modulate the sync word followed by every symbol's ten bits
    pub fn modulate_frame(&mut self, sync: &SyncWord, symbols: &[u16], out: &mut Vec<i16>) {
        let bits = sync.bits + symbols.len() * crate::line_code::SYMBOL_BITS;
        out.reserve(bits * self.samples_per_bit);

        for bit in sync.bits_msb_first() {
            self.push_bit(bit, out);
        }
        for &symbol in symbols {
            for bit in symbol_bits(symbol) {
                self.push_bit(bit, out);
            }
        }
        trace!("Modulated {} bits, {} reversals so far", bits, self.reversals);
    }

    /// Apply the bit's transition, then write its samples
    pub fn push_bit(&mut self, bit: bool, out: &mut Vec<i16>) {
        if out.len() < self.flip_at {
            self.flip_at = out.len();
        }

        match self.config.modulation {
            Modulation::Fsk => {
                self.phase = if bit { 1.0 } else { -1.0 };
            }
            Modulation::Bpsk => {
                if !bit {
                    self.reverse_phase(out);
                }
            }
        }

        for _ in 0..self.samples_per_bit {
            let sample = self.next_sample(out.len());
            out.push(sample);
        }
    }

    fn reverse_phase(&mut self, out: &mut [i16]) {
        self.phase = -self.phase;
        self.reversals += 1;

        let n = out.len();
        if n > self.smaller {
            // Fade toward zero approaching the reversal
            for j in 1..=self.smaller {
                let gain = REVERSAL_GAIN * (j - 1) as f32 / self.smaller as f32;
                out[n - j] = (out[n - j] as f32 * gain) as i16;
            }
        }
        self.flip_at = n;
    }

    fn next_sample(&mut self, position: usize) -> i16 {
        let since_flip = position.saturating_sub(self.flip_at);
        let amplitude = self.config.amplitude;

        let value = match self.config.modulation {
            Modulation::Fsk => {
                let level = FSK_LEVEL * amplitude * self.phase;
                if since_flip < self.smaller {
                    level * since_flip as f32 / self.smaller as f32
                } else {
                    level
                }
            }
            Modulation::Bpsk => {
                let t = self.clock as f64 * self.config.carrier_hz as f64 / self.config.sample_rate as f64;
                let carrier = (2.0 * PI * t.fract()).sin() as f32;
                let gain = if since_flip < self.smaller {
                    REVERSAL_GAIN
                } else {
                    1.0
                };
                amplitude * gain * self.phase * carrier
            }
        };
        self.clock += 1;

        value.clamp(i16::MIN as f32, i16::MAX as f32) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_bits(sync: &SyncWord, symbols: &[u16]) -> u64 {
        let sync_zeros = sync.bits_msb_first().filter(|b| !b).count();
        let symbol_zeros: usize = symbols
            .iter()
            .map(|&s| symbol_bits(s).filter(|b| !b).count())
            .sum();
        (sync_zeros + symbol_zeros) as u64
    }

    #[test]
    fn test_config_derived_values() {
        let fsk = ModulatorConfig::fsk();
        assert_eq!(fsk.samples_per_bit(), 240);
        assert_eq!(fsk.smaller(), 8);
        let bpsk = ModulatorConfig::bpsk();
        assert_eq!(bpsk.samples_per_bit(), 40);
        assert_eq!(bpsk.smaller(), 8);
    }

    #[test]
    fn test_config_validation() {
        let mut config = ModulatorConfig::bpsk();
        config.bit_rate = 7;
        assert!(config.validate().is_err());

        let mut config = ModulatorConfig::bpsk();
        config.carrier_hz = 30_000.0;
        assert!(Modulator::new(config).is_err());

        let mut config = ModulatorConfig::fsk();
        config.amplitude = 40_000.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sample_count() {
        let mut modulator = Modulator::new(ModulatorConfig::fsk()).unwrap();
        let sync = SyncWord::new(0x0FA, 10);
        let symbols = [0x155u16; 4];
        let mut out = Vec::new();
        modulator.modulate_frame(&sync, &symbols, &mut out);
        assert_eq!(out.len(), (10 + 40) * 240);
    }

    #[test]
    fn test_fsk_level_follows_bit() {
        let mut modulator = Modulator::new(ModulatorConfig::fsk()).unwrap();
        let mut out = Vec::new();
        let bits = [true, false, false, true];
        for &bit in &bits {
            modulator.push_bit(bit, &mut out);
        }
        let level = (FSK_LEVEL * FSK_AMPLITUDE) as i16;
        for (i, &bit) in bits.iter().enumerate() {
            // Sample past the ramp-in, in the middle of the bit
            let s = out[i * 240 + 120];
            assert_eq!(s, if bit { level } else { -level }, "bit {}", i);
        }
        assert_eq!(modulator.reversals(), 0);
    }

    #[test]
    fn test_fsk_ramp_in_at_buffer_start() {
        let mut modulator = Modulator::new(ModulatorConfig::fsk()).unwrap();
        let mut out = Vec::new();
        modulator.push_bit(true, &mut out);
        assert_eq!(out[0], 0);
        assert!(out[1..8].windows(2).all(|w| w[0] <= w[1]));
        assert!(out[7] < out[8]);
    }

    #[test]
    fn test_bpsk_reversal_count_matches_zero_bits() {
        let mut modulator = Modulator::new(ModulatorConfig::bpsk()).unwrap();
        let sync = SyncWord::new(0x47CD_215D, 31);
        let symbols = [0x0FAu16, 0x305, 0x2AA, 0x274];
        let mut out = Vec::new();
        modulator.modulate_frame(&sync, &symbols, &mut out);
        assert_eq!(modulator.reversals(), zero_bits(&sync, &symbols));
    }

    #[test]
    fn test_bpsk_all_ones_keeps_phase() {
        let mut modulator = Modulator::new(ModulatorConfig::bpsk()).unwrap();
        let sync = SyncWord::new(0x3FF, 10);
        let symbols = [0x3FFu16; 3];
        let mut out = Vec::new();
        modulator.modulate_frame(&sync, &symbols, &mut out);
        assert_eq!(modulator.reversals(), 0);
        assert_eq!(modulator.phase(), 1);
    }

    #[test]
    fn test_bpsk_phase_persists_across_frames() {
        let mut modulator = Modulator::new(ModulatorConfig::bpsk()).unwrap();
        let mut out = Vec::new();
        modulator.push_bit(false, &mut out);
        assert_eq!(modulator.phase(), -1);

        let mut next = Vec::new();
        modulator.push_bit(true, &mut next);
        assert_eq!(modulator.phase(), -1);
        assert_eq!(modulator.reversals(), 1);
    }

    #[test]
    fn test_bpsk_reversal_is_attenuated() {
        let mut modulator = Modulator::new(ModulatorConfig::bpsk()).unwrap();
        let mut out = Vec::new();
        modulator.push_bit(true, &mut out);
        modulator.push_bit(true, &mut out);
        modulator.push_bit(false, &mut out);

        let smaller = 8;
        let flip = 80;
        let limit = (REVERSAL_GAIN * BPSK_AMPLITUDE) as i16 + 1;
        for i in flip - smaller..flip + smaller {
            assert!(out[i].abs() <= limit, "sample {} = {}", i, out[i]);
        }
        // Sample right before the reversal is faded to silence
        assert_eq!(out[flip - 1], 0);
        // Full amplitude resumes once past the ramp
        let peak = out[flip + smaller..flip + 40].iter().map(|s| s.abs()).max().unwrap();
        assert!(peak > limit);
    }

    #[test]
    fn test_bpsk_two_frames_share_buffer() {
        let mut modulator = Modulator::new(ModulatorConfig::bpsk()).unwrap();
        // Leading 0 bit puts a reversal right at the seam
        let sync = SyncWord::new(0x0FA, 10);
        let symbols = [0x2AAu16, 0x274];
        let mut out = Vec::new();
        modulator.modulate_frame(&sync, &symbols, &mut out);
        let seam = out.len();
        modulator.modulate_frame(&sync, &symbols, &mut out);

        assert_eq!(out.len(), 2 * seam);
        assert_eq!(modulator.reversals(), 2 * zero_bits(&sync, &symbols));

        let smaller = 8;
        let limit = (REVERSAL_GAIN * BPSK_AMPLITUDE) as i16 + 1;
        assert_eq!(out[seam - 1], 0);
        for i in seam - smaller..seam + smaller {
            assert!(out[i].abs() <= limit, "sample {} = {}", i, out[i]);
        }
    }

    #[test]
    fn test_short_prefilled_buffer_after_frame() {
        let mut modulator = Modulator::new(ModulatorConfig::bpsk()).unwrap();
        let sync = SyncWord::new(0x47CD_215D, 31);
        let symbols = [0x0FAu16, 0x274];
        let mut first = Vec::new();
        modulator.modulate_frame(&sync, &symbols, &mut first);

        let mut out = vec![0i16; 10];
        modulator.modulate_frame(&sync, &symbols, &mut out);
        assert_eq!(out.len(), 10 + first.len());
        assert_eq!(modulator.reversals(), 2 * zero_bits(&sync, &symbols));
        // Ramp restarts at the end of the caller's samples
        let limit = (REVERSAL_GAIN * BPSK_AMPLITUDE) as i16 + 1;
        assert!(out[10..18].iter().all(|s| s.abs() <= limit));
    }
}
