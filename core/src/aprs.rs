//! Text telemetry for the AFSK and CW modes
//!
//! Six channels of four two-digit values, sent as `CUU` groups (channel,
//! upper digit, lower digit). AFSK packets lead with an APRS position report,
//! CW messages with a plain `hi hi`.

use log::error;
use rand::Rng;

use crate::telemetry::{Channel, ChannelMap, Readings};

pub const TEXT_CHANNELS: usize = 6;
pub const VALUES_PER_CHANNEL: usize = 4;

/// Two-digit values per channel, A to D
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextTelemetry {
    pub channels: [[i32; VALUES_PER_CHANNEL]; TEXT_CHANNELS],
}

impl TextTelemetry {
    /// Scale readings into the two-digit channel values
    pub fn from_readings<R: Rng>(
        readings: &Readings,
        map: &ChannelMap,
        cpu_temp: f32,
        rng: &mut R,
    ) -> Self {
        let v = |c| readings.voltage_of(map, c) as f64;
        let i = |c| readings.current_of(map, c) as f64;
        let panel = |c| (99.5 - i(c) / 10.0) as i32 % 100;

        let mut ch = [[0i32; VALUES_PER_CHANNEL]; TEXT_CHANNELS];
        ch[0] = [
            (v(Channel::Bus) / 15.0 + 0.5) as i32 % 100,
            panel(Channel::PlusX),
            panel(Channel::MinusX),
            panel(Channel::PlusY),
        ];
        ch[1] = [
            panel(Channel::MinusY),
            panel(Channel::PlusZ),
            panel(Channel::MinusZ),
            (50.5 + i(Channel::Battery) / 10.0) as i32 % 100,
        ];
        ch[2][0] = ((v(Channel::Battery) * 10.0 - 65.5) as i32 % 100).abs();
        ch[2][1] = (v(Channel::Bus) * 10.0) as i32 % 100;
        ch[3][1] = ((95.8 - cpu_temp as f64) / 1.48 + 0.5) as i32 % 100;
        ch[5][3] = 49 + rng.gen_range(0..3);

        Self { channels: ch }
    }

    /// `CUU CUU CUU CUU ` for each channel, channels numbered from 1
    pub fn groups(&self) -> String {
        let mut out = String::with_capacity(TEXT_CHANNELS * VALUES_PER_CHANNEL * 4);
        for (k, values) in self.channels.iter().enumerate() {
            for &value in values {
                let value = value.clamp(0, 99);
                out.push_str(&format!(
                    "{}{}{} ",
                    k + 1,
                    upper_digit(value),
                    lower_digit(value)
                ));
            }
        }
        out
    }
}

/// Tens digit of a value in 0..100, zero otherwise
pub fn upper_digit(number: i32) -> i32 {
    if (0..100).contains(&number) {
        number / 10
    } else {
        error!("Not a digit in upper_digit: {}", number);
        0
    }
}

/// Units digit of a value in 0..100, zero otherwise
pub fn lower_digit(number: i32) -> i32 {
    if (0..100).contains(&number) {
        number - (number / 10) * 10
    } else {
        error!("Not a digit in lower_digit: {}", number);
        0
    }
}

/// APRS uncompressed position, `DDMM.mmN\\DDDMM.mmW`
///
/// Degrees are written as if decimal degrees were degree-minutes, the way the
/// station has always reported them. The symbol table separator is doubled for
/// the shell quoting of the packet generator input.
pub fn aprs_position(latitude: f64, longitude: f64) -> String {
    let lat = if latitude > 0.0 {
        format!("{:7.2}N", latitude * 100.0)
    } else {
        format!("{:7.2}S", latitude * -100.0)
    };
    let long = if longitude > 0.0 {
        format!("{:08.2}E", longitude * 100.0)
    } else {
        format!("{:08.2}W", longitude * -100.0)
    };
    format!("{}\\\\{}", lat, long)
}

/// AFSK packet text: position report, telemetry groups, payload answer
pub fn afsk_text(
    callsign: &str,
    latitude: f64,
    longitude: f64,
    telemetry: &TextTelemetry,
    payload: Option<&str>,
) -> String {
    let mut text = format!(
        "{}>CQ:={}Shi hi {}",
        callsign,
        aprs_position(latitude, longitude),
        telemetry.groups()
    );
    if let Some(p) = payload {
        text.push_str(p.trim_end_matches(['\r', '\n']));
    }
    text
}

/// Short beacon packet sent after each telemetry packet
pub fn beacon_text(callsign: &str) -> String {
    format!("{}>CQ:010101/hi hi ", callsign)
}

/// CW message text: greeting and telemetry groups
pub fn cw_text(telemetry: &TextTelemetry) -> String {
    format!("hi hi {}", telemetry.groups())
}
