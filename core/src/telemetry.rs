//! Spacecraft telemetry model and its packing into frame payloads
//!
//! Readings arrive indexed by sensor-board position. A [`ChannelMap`] turns a
//! logical panel/bus channel into that position, so the same payload code
//! serves every board revision.

use crate::framing::{encode_a, encode_b};
use crate::modulator::Modulation;

pub const POWER_CHANNELS: usize = 8;
pub const PAYLOAD_SENSORS: usize = 17;
pub const OTHER_VALUES: usize = 3;

/// Battery voltage below which the spacecraft reports safe mode
pub const SAFE_MODE_VOLTS: f32 = 3.5;

/// Indices into [`Readings::sensor`]
pub mod sensor {
    pub const TEMP: usize = 2;
    pub const PRES: usize = 3;
    pub const ALT: usize = 4;
    pub const HUMI: usize = 5;
    pub const GYRO_X: usize = 7;
    pub const GYRO_Y: usize = 8;
    pub const GYRO_Z: usize = 9;
    pub const ACCEL_X: usize = 10;
    pub const ACCEL_Y: usize = 11;
    pub const ACCEL_Z: usize = 12;
    pub const XS1: usize = 14;
    pub const XS2: usize = 15;
    pub const XS3: usize = 16;
}

/// Indices into [`Readings::other`]
pub mod other {
    pub const RSSI: usize = 0;
    pub const SPIN: usize = 1;
    pub const IHU_TEMP: usize = 2;
}

/// Logical power channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    PlusX = 0,
    PlusY = 1,
    Battery = 2,
    Bus = 3,
    MinusX = 4,
    MinusY = 5,
    PlusZ = 6,
    MinusZ = 7,
}

impl Channel {
    pub const ALL: [Channel; POWER_CHANNELS] = [
        Channel::PlusX,
        Channel::PlusY,
        Channel::Battery,
        Channel::Bus,
        Channel::MinusX,
        Channel::MinusY,
        Channel::PlusZ,
        Channel::MinusZ,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Logical channel to sensor-board position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMap([usize; POWER_CHANNELS]);

impl ChannelMap {
    pub fn identity() -> Self {
        Self([0, 1, 2, 3, 4, 5, 6, 7])
    }

    pub fn get(&self, channel: Channel) -> usize {
        self.0[channel.index()]
    }

    pub fn set(&mut self, channel: Channel, position: usize) {
        self.0[channel.index()] = position % POWER_CHANNELS;
    }
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self::identity()
    }
}

/// Sensor board revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Board {
    #[default]
    Standard,
    VB4,
    VB5,
}

/// Board-dependent wiring and safety threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardConfig {
    pub board: Board,
    pub map: ChannelMap,
    pub battery_threshold: f32,
}

impl BoardConfig {
    pub fn new(board: Board) -> Self {
        let mut map = ChannelMap::identity();
        let battery_threshold = match board {
            Board::VB4 => {
                map.set(Channel::Battery, Channel::Bus.index());
                map.set(Channel::Bus, Channel::Battery.index());
                3.0
            }
            Board::VB5 => {
                map.set(Channel::MinusX, Channel::MinusY.index());
                map.set(Channel::PlusZ, Channel::MinusX.index());
                map.set(Channel::MinusY, Channel::PlusZ.index());
                3.0
            }
            Board::Standard => {
                map.set(Channel::Bus, Channel::MinusZ.index());
                map.set(Channel::Battery, Channel::Bus.index());
                map.set(Channel::PlusZ, Channel::Battery.index());
                map.set(Channel::MinusZ, Channel::PlusZ.index());
                8.0
            }
        };
        Self {
            board,
            map,
            battery_threshold,
        }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self::new(Board::Standard)
    }
}

/// One poll of every telemetry source
#[derive(Debug, Clone, PartialEq)]
pub struct Readings {
    pub voltage: [f32; POWER_CHANNELS],
    pub current: [f32; POWER_CHANNELS],
    pub sensor: [f32; PAYLOAD_SENSORS],
    pub other: [f32; OTHER_VALUES],
    /// The payload board answered with a valid response this poll
    pub payload_valid: bool,
    pub safe_mode: bool,
}

impl Default for Readings {
    fn default() -> Self {
        Self {
            voltage: [0.0; POWER_CHANNELS],
            current: [0.0; POWER_CHANNELS],
            sensor: [0.0; PAYLOAD_SENSORS],
            other: [0.0; OTHER_VALUES],
            payload_valid: false,
            safe_mode: false,
        }
    }
}

impl Readings {
    pub fn voltage_of(&self, map: &ChannelMap, channel: Channel) -> f32 {
        self.voltage[map.get(channel)]
    }

    pub fn current_of(&self, map: &ChannelMap, channel: Channel) -> f32 {
        self.current[map.get(channel)]
    }

    pub fn battery_voltage(&self, map: &ChannelMap) -> f32 {
        self.voltage_of(map, Channel::Battery)
    }
}

const STAT_MIN_INIT: f32 = 1000.0;
const STAT_MAX_INIT: f32 = -1000.0;

/// Running minimum and maximum of every reading since the session started
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryStats {
    pub voltage_min: [f32; POWER_CHANNELS],
    pub voltage_max: [f32; POWER_CHANNELS],
    pub current_min: [f32; POWER_CHANNELS],
    pub current_max: [f32; POWER_CHANNELS],
    pub sensor_min: [f32; PAYLOAD_SENSORS],
    pub sensor_max: [f32; PAYLOAD_SENSORS],
    pub other_min: [f32; OTHER_VALUES],
    pub other_max: [f32; OTHER_VALUES],
}

impl Default for TelemetryStats {
    fn default() -> Self {
        Self::new()
    }
}

fn fold_min_max(min: &mut [f32], max: &mut [f32], values: &[f32]) {
    for ((lo, hi), &v) in min.iter_mut().zip(max.iter_mut()).zip(values) {
        if v < *lo {
            *lo = v;
        }
        if v > *hi {
            *hi = v;
        }
    }
}

impl TelemetryStats {
    pub fn new() -> Self {
        Self {
            voltage_min: [STAT_MIN_INIT; POWER_CHANNELS],
            voltage_max: [STAT_MAX_INIT; POWER_CHANNELS],
            current_min: [STAT_MIN_INIT; POWER_CHANNELS],
            current_max: [STAT_MAX_INIT; POWER_CHANNELS],
            sensor_min: [STAT_MIN_INIT; PAYLOAD_SENSORS],
            sensor_max: [STAT_MAX_INIT; PAYLOAD_SENSORS],
            other_min: [STAT_MIN_INIT; OTHER_VALUES],
            other_max: [STAT_MAX_INIT; OTHER_VALUES],
        }
    }

    /// Fold a poll into the statistics; payload sensors count only when the
    /// payload response was valid
    pub fn update(&mut self, readings: &Readings) {
        fold_min_max(&mut self.voltage_min, &mut self.voltage_max, &readings.voltage);
        fold_min_max(&mut self.current_min, &mut self.current_max, &readings.current);
        if readings.payload_valid {
            fold_min_max(&mut self.sensor_min, &mut self.sensor_max, &readings.sensor);
        }
        fold_min_max(&mut self.other_min, &mut self.other_max, &readings.other);
    }

    /// `readings` with every value replaced by its minimum; payload sensors
    /// that were never seen keep their current value
    pub fn min_frame(&self, readings: &Readings) -> Readings {
        let mut out = readings.clone();
        out.voltage = self.voltage_min;
        out.current = self.current_min;
        out.other = self.other_min;
        for (s, &m) in out.sensor.iter_mut().zip(&self.sensor_min) {
            if m != STAT_MIN_INIT {
                *s = m;
            }
        }
        out
    }

    /// `readings` with every value replaced by its maximum
    pub fn max_frame(&self, readings: &Readings) -> Readings {
        let mut out = readings.clone();
        out.voltage = self.voltage_max;
        out.current = self.current_max;
        out.other = self.other_max;
        for (s, &m) in out.sensor.iter_mut().zip(&self.sensor_max) {
            if m != STAT_MAX_INIT {
                *s = m;
            }
        }
        out
    }
}

/// Frame type tag carried in the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Realtime = 1,
    Max = 2,
    Min = 3,
}

impl FrameType {
    /// Type of the `frame`-th frame (1-based) of a session
    ///
    /// FSK sessions send a MIN frame every eighth frame and a MAX frame four
    /// frames later; BPSK frames are always realtime.
    pub fn for_frame(modulation: Modulation, frame: u64) -> Self {
        match modulation {
            Modulation::Bpsk => FrameType::Realtime,
            Modulation::Fsk => {
                if frame % 8 == 0 {
                    FrameType::Min
                } else if (frame + 4) % 8 == 0 {
                    FrameType::Max
                } else {
                    FrameType::Realtime
                }
            }
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Health flags packed into the status field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFlags {
    pub stem_board_failure: bool,
    pub normal_mode_failure: bool,
    pub payload_failure_1: bool,
    pub payload_failure_2: bool,
    pub i2c_bus0_off: bool,
    pub i2c_bus1_off: bool,
    pub i2c_bus3_off: bool,
    pub camera_off: bool,
    pub ground_commands: u8,
}

impl Default for StatusFlags {
    fn default() -> Self {
        Self {
            stem_board_failure: true,
            normal_mode_failure: false,
            payload_failure_1: false,
            payload_failure_2: false,
            i2c_bus0_off: true,
            i2c_bus1_off: true,
            i2c_bus3_off: true,
            camera_off: true,
            ground_commands: 0,
        }
    }
}

impl StatusFlags {
    pub fn word(&self) -> i32 {
        self.stem_board_failure as i32
            | (self.normal_mode_failure as i32) << 1
            | (self.payload_failure_1 as i32) << 2
            | (self.payload_failure_2 as i32) << 3
            | (self.i2c_bus0_off as i32) << 4
            | (self.i2c_bus1_off as i32) << 5
            | (self.i2c_bus3_off as i32) << 6
            | (self.camera_off as i32) << 7
            | ((self.ground_commands & 0x0f) as i32) << 8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Antennas {
    pub rx_deployed: bool,
    pub tx_deployed: bool,
}

impl Antennas {
    pub fn field(&self) -> i32 {
        self.rx_deployed as i32 + 2 * self.tx_deployed as i32
    }
}

fn centivolts(v: f32) -> i32 {
    (v * 100.0) as i32
}

fn offset_current(i: f32) -> i32 {
    (i + 0.5) as i32 + 2048
}

/// Pack the telemetry fields into a `data_len`-byte payload
///
/// Solar panel voltages and currents are ordered per panel pair in FSK
/// frames and per sign in BPSK frames. BPSK frames also carry two
/// whole-orbit marker fields.
pub fn encode_payload(
    modulation: Modulation,
    readings: &Readings,
    map: &ChannelMap,
    status: &StatusFlags,
    antennas: &Antennas,
    data_len: usize,
) -> Vec<u8> {
    let mut b = vec![0u8; data_len.max(54)];
    let v = |c| readings.voltage_of(map, c);
    let i = |c| readings.current_of(map, c);
    let s = &readings.sensor;
    let o = &readings.other;

    // Battery cells A and B are not instrumented
    encode_a(&mut b, 0, 0);
    encode_b(&mut b, 1, 0);
    encode_a(&mut b, 3, centivolts(v(Channel::Battery)));

    encode_b(&mut b, 4, (s[sensor::ACCEL_X] * 100.0 + 0.5) as i32 + 2048);
    encode_a(&mut b, 6, (s[sensor::ACCEL_Y] * 100.0 + 0.5) as i32 + 2048);
    encode_b(&mut b, 7, (s[sensor::ACCEL_Z] * 100.0 + 0.5) as i32 + 2048);

    encode_a(&mut b, 9, offset_current(i(Channel::Battery)));
    encode_b(&mut b, 10, (s[sensor::TEMP] * 10.0 + 0.5) as i32);

    let panels = match modulation {
        Modulation::Fsk => [
            Channel::PlusX,
            Channel::MinusX,
            Channel::PlusY,
            Channel::MinusY,
            Channel::PlusZ,
            Channel::MinusZ,
        ],
        Modulation::Bpsk => [
            Channel::PlusX,
            Channel::PlusY,
            Channel::PlusZ,
            Channel::MinusX,
            Channel::MinusY,
            Channel::MinusZ,
        ],
    };
    encode_panel_fields(&mut b, 12, panels.iter().map(|&c| centivolts(v(c))));
    encode_panel_fields(&mut b, 21, panels.iter().map(|&c| offset_current(i(c))));

    encode_a(&mut b, 30, centivolts(v(Channel::Bus)));
    encode_b(&mut b, 31, (o[other::SPIN] * 10.0) as i32 + 2048);

    encode_a(&mut b, 33, (s[sensor::PRES] + 0.5) as i32);
    encode_b(&mut b, 34, (s[sensor::ALT] * 10.0 + 0.5) as i32);

    // Reset count travels in the header
    encode_a(&mut b, 36, 0);
    encode_b(&mut b, 37, (o[other::RSSI] + 0.5) as i32 + 2048);
    encode_a(&mut b, 39, (o[other::IHU_TEMP] * 10.0 + 0.5) as i32);

    encode_b(&mut b, 40, (s[sensor::GYRO_X] + 0.5) as i32 + 2048);
    encode_a(&mut b, 42, (s[sensor::GYRO_Y] + 0.5) as i32 + 2048);
    encode_b(&mut b, 43, (s[sensor::GYRO_Z] + 0.5) as i32 + 2048);

    encode_a(&mut b, 45, (s[sensor::HUMI] + 0.5) as i32);
    encode_b(&mut b, 46, offset_current(i(Channel::Bus)));

    encode_a(&mut b, 48, s[sensor::XS2] as i32 + 2048);
    encode_b(&mut b, 49, (s[sensor::XS3] * 100.0 + 0.5) as i32 + 2048);

    encode_a(&mut b, 51, status.word());
    encode_b(&mut b, 52, antennas.field());

    if modulation == Modulation::Bpsk && b.len() >= 76 {
        encode_a(&mut b, 63, 0xff);
        encode_b(&mut b, 74, 0xff);
    }

    b.truncate(data_len);
    b
}

/// Six fields alternating A/B forms, three bytes per pair
fn encode_panel_fields<I: Iterator<Item = i32>>(b: &mut [u8], start: usize, values: I) {
    for (k, value) in values.enumerate() {
        let index = start + (k / 2) * 3 + (k % 2);
        if k % 2 == 0 {
            encode_a(b, index, value);
        } else {
            encode_b(b, index, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::{decode_a, decode_b};

    fn sample_readings() -> Readings {
        let mut r = Readings::default();
        for k in 0..POWER_CHANNELS {
            r.voltage[k] = 1.0 + k as f32;
            r.current[k] = 10.0 * (k as f32 + 1.0);
        }
        r.sensor[sensor::TEMP] = 21.5;
        r.sensor[sensor::PRES] = 1013.2;
        r.sensor[sensor::ACCEL_X] = -0.5;
        r.other[other::IHU_TEMP] = 45.0;
        r.other[other::SPIN] = 1.5;
        r.payload_valid = true;
        r
    }

    #[test]
    fn test_standard_board_map() {
        let board = BoardConfig::new(Board::Standard);
        assert_eq!(board.map.get(Channel::Bus), 7);
        assert_eq!(board.map.get(Channel::Battery), 3);
        assert_eq!(board.map.get(Channel::PlusZ), 2);
        assert_eq!(board.map.get(Channel::MinusZ), 6);
        assert_eq!(board.map.get(Channel::PlusX), 0);
        assert_eq!(board.battery_threshold, 8.0);
    }

    #[test]
    fn test_revision_boards_map() {
        let vb4 = BoardConfig::new(Board::VB4);
        assert_eq!(vb4.map.get(Channel::Battery), 3);
        assert_eq!(vb4.map.get(Channel::Bus), 2);
        assert_eq!(vb4.battery_threshold, 3.0);

        let vb5 = BoardConfig::new(Board::VB5);
        assert_eq!(vb5.map.get(Channel::MinusX), 5);
        assert_eq!(vb5.map.get(Channel::PlusZ), 4);
        assert_eq!(vb5.map.get(Channel::MinusY), 6);
    }

    #[test]
    fn test_frame_type_cycle() {
        let types: Vec<u8> = (1..=16)
            .map(|k| FrameType::for_frame(Modulation::Fsk, k).code())
            .collect();
        assert_eq!(types, vec![1, 1, 1, 2, 1, 1, 1, 3, 1, 1, 1, 2, 1, 1, 1, 3]);
        assert!((1..=16).all(|k| FrameType::for_frame(Modulation::Bpsk, k) == FrameType::Realtime));
    }

    #[test]
    fn test_stats_track_extremes() {
        let mut stats = TelemetryStats::new();
        let mut r = sample_readings();
        stats.update(&r);
        r.voltage[0] = 0.25;
        r.voltage[1] = 9.0;
        stats.update(&r);

        assert_eq!(stats.voltage_min[0], 0.25);
        assert_eq!(stats.voltage_max[0], 1.0);
        assert_eq!(stats.voltage_max[1], 9.0);

        let min = stats.min_frame(&r);
        assert_eq!(min.voltage[0], 0.25);
        let max = stats.max_frame(&r);
        assert_eq!(max.voltage[1], 9.0);
    }

    #[test]
    fn test_sensor_stats_need_valid_payload() {
        let mut stats = TelemetryStats::new();
        let mut r = sample_readings();
        r.payload_valid = false;
        stats.update(&r);
        assert_eq!(stats.sensor_min[sensor::TEMP], 1000.0);

        // Unseen sensors keep the live value in MIN/MAX frames
        let min = stats.min_frame(&r);
        assert_eq!(min.sensor[sensor::TEMP], 21.5);

        r.payload_valid = true;
        stats.update(&r);
        r.sensor[sensor::TEMP] = 30.0;
        assert_eq!(stats.min_frame(&r).sensor[sensor::TEMP], 21.5);
    }

    #[test]
    fn test_status_word() {
        let mut status = StatusFlags::default();
        assert_eq!(status.word(), 1 | 16 | 32 | 64 | 128);
        status.stem_board_failure = false;
        status.normal_mode_failure = true;
        status.ground_commands = 2;
        assert_eq!(status.word(), 2 | 16 | 32 | 64 | 128 | 512);
    }

    #[test]
    fn test_fsk_payload_fields() {
        let r = sample_readings();
        let map = ChannelMap::identity();
        let b = encode_payload(
            Modulation::Fsk,
            &r,
            &map,
            &StatusFlags::default(),
            &Antennas { rx_deployed: false, tx_deployed: true },
            58,
        );
        assert_eq!(b.len(), 58);
        // Battery voltage is channel 2: 3.0 V
        assert_eq!(decode_a(&b, 3), 300);
        // Battery current 30 mA, offset by 2048
        assert_eq!(decode_a(&b, 9), 30 + 2048);
        assert_eq!(decode_b(&b, 10), 215);
        // -0.5 g truncates toward zero: -49
        assert_eq!(decode_b(&b, 4), 2048 - 49);
        // FSK pairs +X then -X
        assert_eq!(decode_a(&b, 12), 100);
        assert_eq!(decode_b(&b, 13), 500);
        assert_eq!(decode_a(&b, 21), 10 + 2048);
        assert_eq!(decode_b(&b, 22), 50 + 2048);
        assert_eq!(decode_a(&b, 30), 400);
        assert_eq!(decode_b(&b, 31), 15 + 2048);
        assert_eq!(decode_a(&b, 33), 1013);
        assert_eq!(decode_a(&b, 39), 450);
        assert_eq!(decode_a(&b, 51), StatusFlags::default().word() as u16);
        assert_eq!(decode_b(&b, 52), 2);
    }

    #[test]
    fn test_bpsk_payload_orders_by_sign() {
        let r = sample_readings();
        let map = ChannelMap::identity();
        let b = encode_payload(
            Modulation::Bpsk,
            &r,
            &map,
            &StatusFlags::default(),
            &Antennas::default(),
            78,
        );
        assert_eq!(b.len(), 78);
        // +X, +Y, +Z then -X
        assert_eq!(decode_a(&b, 12), 100);
        assert_eq!(decode_b(&b, 13), 200);
        assert_eq!(decode_a(&b, 15), 700);
        assert_eq!(decode_b(&b, 16), 500);
        assert_eq!(decode_a(&b, 63), 0xff);
        assert_eq!(decode_b(&b, 74), 0xff);
    }

    #[test]
    fn test_payload_uses_channel_map() {
        let r = sample_readings();
        let board = BoardConfig::new(Board::Standard);
        let b = encode_payload(
            Modulation::Fsk,
            &r,
            &board.map,
            &StatusFlags::default(),
            &Antennas::default(),
            58,
        );
        // Battery reads sensor position 3 on the standard board
        assert_eq!(decode_a(&b, 3), 400);
        assert_eq!(r.battery_voltage(&board.map), 4.0);
    }
}
