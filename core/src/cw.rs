//! Morse code identification
//!
//! On-off keyed tone. Timing follows the PARIS convention: a dit is one unit,
//! a dah three, with one unit between elements, three between letters and
//! seven between words.

use std::f64::consts::PI;

use log::debug;

use crate::error::{Result, TelemetryError};
use crate::SAMPLE_RATE;

pub const CW_WPM: u32 = 20;
pub const CW_TONE_HZ: f64 = 800.0;

/// Key-down/key-up ramp length
const EDGE_SECONDS: f64 = 0.005;

/// Morse pattern of a character, `.` for dit and `-` for dah
pub fn morse_code(c: char) -> Option<&'static str> {
    let code = match c.to_ascii_uppercase() {
        'A' => ".-",
        'B' => "-...",
        'C' => "-.-.",
        'D' => "-..",
        'E' => ".",
        'F' => "..-.",
        'G' => "--.",
        'H' => "....",
        'I' => "..",
        'J' => ".---",
        'K' => "-.-",
        'L' => ".-..",
        'M' => "--",
        'N' => "-.",
        'O' => "---",
        'P' => ".--.",
        'Q' => "--.-",
        'R' => ".-.",
        'S' => "...",
        'T' => "-",
        'U' => "..-",
        'V' => "...-",
        'W' => ".--",
        'X' => "-..-",
        'Y' => "-.--",
        'Z' => "--..",
        '0' => "-----",
        '1' => ".----",
        '2' => "..---",
        '3' => "...--",
        '4' => "....-",
        '5' => ".....",
        '6' => "-....",
        '7' => "--...",
        '8' => "---..",
        '9' => "----.",
        '/' => "-..-.",
        '?' => "..--..",
        '.' => ".-.-.-",
        ',' => "--..--",
        '=' => "-...-",
        _ => return None,
    };
    Some(code)
}

/// Key state for a number of dit units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRun {
    pub down: bool,
    pub units: usize,
}

/// Key-down and key-up runs spelling `text`; unknown characters are skipped
pub fn key_runs(text: &str) -> Vec<KeyRun> {
    let mut runs: Vec<KeyRun> = Vec::new();
    let mut push = |down: bool, units: usize| {
        if let Some(last) = runs.last_mut() {
            if last.down == down && !down {
                last.units = last.units.max(units);
                return;
            }
        }
        runs.push(KeyRun { down, units });
    };

    for word in text.split_whitespace() {
        push(false, 7);
        for c in word.chars() {
            let Some(code) = morse_code(c) else {
                debug!("No Morse pattern for {:?}", c);
                continue;
            };
            push(false, 3);
            for element in code.chars() {
                push(false, 1);
                push(true, if element == '-' { 3 } else { 1 });
            }
        }
    }
    // Drop leading silence
    if runs.first().map_or(false, |r| !r.down) {
        runs.remove(0);
    }
    runs
}

pub struct MorseKeyer {
    sample_rate: u32,
    wpm: u32,
    tone_hz: f64,
    amplitude: f64,
}

impl MorseKeyer {
    pub fn new(wpm: u32, tone_hz: f64, amplitude: f64) -> Result<Self> {
        if wpm == 0 || !(tone_hz > 0.0 && tone_hz < SAMPLE_RATE as f64 / 2.0) {
            return Err(TelemetryError::InvalidArgument(format!(
                "Morse keyer needs a positive speed and an audible tone, got {} WPM at {} Hz",
                wpm, tone_hz
            )));
        }
        Ok(Self {
            sample_rate: SAMPLE_RATE,
            wpm,
            tone_hz,
            amplitude: amplitude.clamp(0.0, i16::MAX as f64),
        })
    }

    /// Samples in one dit
    pub fn unit_samples(&self) -> usize {
        (self.sample_rate as f64 * 1.2 / self.wpm as f64) as usize
    }

    /// Key `text` into a sample buffer
    pub fn key(&self, text: &str) -> Vec<i16> {
        let unit = self.unit_samples();
        let edge = ((self.sample_rate as f64 * EDGE_SECONDS) as usize).min(unit / 2).max(1);
        let omega = 2.0 * PI * self.tone_hz / self.sample_rate as f64;

        let runs = key_runs(text);
        let total: usize = runs.iter().map(|r| r.units * unit).sum();
        let mut out = Vec::with_capacity(total);

        for run in runs {
            let len = run.units * unit;
            if !run.down {
                out.resize(out.len() + len, 0);
                continue;
            }
            for k in 0..len {
                let envelope = if k < edge {
                    k as f64 / edge as f64
                } else if len - k <= edge {
                    (len - k - 1) as f64 / edge as f64
                } else {
                    1.0
                };
                let n = out.len() as f64;
                out.push((self.amplitude * envelope * (omega * n).sin()) as i16);
            }
        }
        out
    }
}

impl Default for MorseKeyer {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            wpm: CW_WPM,
            tone_hz: CW_TONE_HZ,
            amplitude: i16::MAX as f64 / 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns() {
        assert_eq!(morse_code('s'), Some("..."));
        assert_eq!(morse_code('O'), Some("---"));
        assert_eq!(morse_code('0'), Some("-----"));
        assert_eq!(morse_code('#'), None);
    }

    #[test]
    fn test_key_runs_for_letter_spacing() {
        let runs = key_runs("ET");
        assert_eq!(
            runs,
            vec![
                KeyRun { down: true, units: 1 },
                KeyRun { down: false, units: 3 },
                KeyRun { down: true, units: 3 },
            ]
        );
    }

    #[test]
    fn test_key_runs_word_gap() {
        let runs = key_runs("E E");
        assert_eq!(runs[1], KeyRun { down: false, units: 7 });
        assert_eq!(runs.len(), 3);
    }

    #[test]
    fn test_paris_is_fifty_units() {
        // PARIS plus its trailing word gap is the 50-unit reference word
        let units: usize = key_runs("PARIS").iter().map(|r| r.units).sum();
        assert_eq!(units + 7, 50);
    }

    #[test]
    fn test_unit_length_at_twenty_wpm() {
        let keyer = MorseKeyer::default();
        assert_eq!(keyer.unit_samples(), 2880);
    }

    #[test]
    fn test_keyed_buffer_shape() {
        let keyer = MorseKeyer::new(CW_WPM, CW_TONE_HZ, 10_000.0).unwrap();
        let samples = keyer.key("E E");
        let unit = keyer.unit_samples();
        assert_eq!(samples.len(), 9 * unit);
        assert!(samples[..unit].iter().any(|&s| s.abs() > 9_000));
        assert!(samples[unit..8 * unit].iter().all(|&s| s == 0));
        // Key-down starts from silence
        assert_eq!(samples[0], 0);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(MorseKeyer::new(0, CW_TONE_HZ, 1000.0).is_err());
        assert!(MorseKeyer::new(20, 30_000.0, 1000.0).is_err());
    }
}
