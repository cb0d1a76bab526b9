//! Per-cycle transmission loop
//!
//! A [`TelemetrySession`] polls its sensor source, tracks statistics and
//! status, builds the payload for the selected mode, and hands the resulting
//! samples to the transport. Sensor and transport faults are logged and the
//! cycle carries on; a low battery ends the session.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::aprs::{afsk_text, beacon_text, cw_text, TextTelemetry};
use crate::config::SimConfig;
use crate::cw::MorseKeyer;
use crate::encoder::{Encoder, TransmitProfile};
use crate::error::{Result, TelemetryError};
use crate::framing::FrameHeader;
use crate::modulator::Modulation;
use crate::sensors::{read_uptime, SensorSource, DEFAULT_UPTIME_PATH};
use crate::status::{check_battery, StatusIndicator};
use crate::telemetry::{
    encode_payload, other, sensor, Antennas, BoardConfig, FrameType, Readings, StatusFlags,
    TelemetryStats,
};
use crate::transport::TransportSink;

/// Transmission mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Fsk,
    Bpsk,
    Afsk,
    Cw,
}

impl Mode {
    /// Mode from its selector letter (`f`, `b`, `a`, `c`); anything else is FSK
    pub fn from_selector(selector: &str) -> Self {
        match selector.chars().next() {
            Some('b') => Mode::Bpsk,
            Some('a') => Mode::Afsk,
            Some('c') => Mode::Cw,
            _ => Mode::Fsk,
        }
    }

    /// Binary-frame modulation, if this mode sends frames
    pub fn modulation(self) -> Option<Modulation> {
        match self {
            Mode::Fsk => Some(Modulation::Fsk),
            Mode::Bpsk => Some(Modulation::Bpsk),
            Mode::Afsk | Mode::Cw => None,
        }
    }

    /// Time to let the RF chain drain queued samples after `loops` cycles
    pub fn drain_time(self, loops: u64) -> Duration {
        match self {
            Mode::Bpsk => Duration::from_secs(loops * 5),
            Mode::Fsk => Duration::from_secs(loops),
            Mode::Afsk | Mode::Cw => Duration::ZERO,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Fsk => "FSK",
            Mode::Bpsk => "BPSK",
            Mode::Afsk => "AFSK",
            Mode::Cw => "CW",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub mode: Mode,
    pub board: BoardConfig,
    pub station: SimConfig,
    pub frames_per_cycle: usize,
    /// Send a Morse identification before the first cycle
    pub cw_id: bool,
    /// Enforce the battery threshold; off for simulated telemetry
    pub battery_check: bool,
    pub blink: Duration,
    /// `/proc/uptime` style file for the header uptime; session time when unset
    pub uptime_path: Option<PathBuf>,
}

impl SessionOptions {
    pub fn new(mode: Mode, station: SimConfig) -> Self {
        Self {
            mode,
            board: BoardConfig::default(),
            station,
            frames_per_cycle: 1,
            cw_id: true,
            battery_check: true,
            blink: Duration::from_secs(1),
            uptime_path: Some(PathBuf::from(DEFAULT_UPTIME_PATH)),
        }
    }
}

/// What one cycle produced
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub cycle: u64,
    pub headers: Vec<FrameHeader>,
    /// Text packets, for the AFSK and CW modes
    pub packets: Vec<String>,
    pub samples: Vec<i16>,
    pub battery_volts: f32,
    /// The transport accepted the samples
    pub delivered: bool,
}

pub struct TelemetrySession {
    options: SessionOptions,
    encoder: Option<Encoder>,
    keyer: MorseKeyer,
    source: Box<dyn SensorSource>,
    sink: Box<dyn TransportSink>,
    indicator: Box<dyn StatusIndicator>,
    stats: TelemetryStats,
    status: StatusFlags,
    antennas: Antennas,
    last: Readings,
    rng: StdRng,
    start: Instant,
    cycles: u64,
}

impl TelemetrySession {
    pub fn new(
        options: SessionOptions,
        source: Box<dyn SensorSource>,
        sink: Box<dyn TransportSink>,
        indicator: Box<dyn StatusIndicator>,
    ) -> Result<Self> {
        if options.frames_per_cycle == 0 {
            return Err(TelemetryError::InvalidArgument(
                "a cycle needs at least one frame".to_string(),
            ));
        }
        let encoder = match options.mode.modulation() {
            Some(m) => Some(Encoder::new(TransmitProfile::for_modulation(m))?),
            None => None,
        };
        info!(
            "Mode {} for {} with reset count {}",
            options.mode, options.station.callsign, options.station.reset_count
        );
        Ok(Self {
            options,
            encoder,
            keyer: MorseKeyer::default(),
            source,
            sink,
            indicator,
            stats: TelemetryStats::new(),
            status: StatusFlags::default(),
            antennas: Antennas::default(),
            last: Readings::default(),
            rng: StdRng::from_entropy(),
            start: Instant::now(),
            cycles: 0,
        })
    }

    /// Fix the random source used by text telemetry
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn stats(&self) -> &TelemetryStats {
        &self.stats
    }

    pub fn status(&self) -> &StatusFlags {
        &self.status
    }

    pub fn antennas(&self) -> &Antennas {
        &self.antennas
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Binary frames encoded so far
    pub fn frames_sent(&self) -> u64 {
        self.encoder.as_ref().map_or(0, Encoder::frames_encoded)
    }

    /// Air time of one binary frame, if the mode sends frames
    pub fn frame_duration(&self) -> Option<Duration> {
        self.encoder.as_ref().map(|e| e.profile().frame_duration())
    }

    /// Key the callsign in Morse and send it, when identification is enabled
    pub fn identify(&mut self) -> Option<Vec<i16>> {
        if !self.options.cw_id {
            return None;
        }
        let text = format!("de {}", self.options.station.callsign);
        info!("CW ID: {}", text);
        let samples = self.keyer.key(&text);
        self.deliver(&samples);
        Some(samples)
    }

    fn poll(&mut self) -> Readings {
        match self.source.poll() {
            Ok(readings) => {
                self.last = readings.clone();
                readings
            }
            Err(e) => {
                warn!("Telemetry poll failed, reusing last readings: {}", e);
                self.last.clone()
            }
        }
    }

    fn uptime(&self) -> u32 {
        if let Some(path) = &self.options.uptime_path {
            match read_uptime(path) {
                Ok(secs) => return secs,
                Err(e) => debug!("Uptime file unavailable, using session time: {}", e),
            }
        }
        self.start.elapsed().as_secs() as u32
    }

    fn check_battery(&mut self, readings: &Readings) -> Result<f32> {
        let volts = readings.battery_voltage(&self.options.board.map);
        if self.options.battery_check {
            check_battery(
                volts,
                self.options.board.battery_threshold,
                self.indicator.as_mut(),
                self.options.blink,
            )?;
        }
        Ok(volts)
    }

    fn deliver(&mut self, samples: &[i16]) -> bool {
        if samples.is_empty() {
            return false;
        }
        self.indicator.set_transmit(true);
        let delivered = match self.sink.send(samples) {
            Ok(()) => true,
            Err(e) => {
                warn!("Samples not delivered: {}", e);
                false
            }
        };
        self.indicator.set_transmit(false);
        delivered
    }

    /// Run one transmission cycle
    ///
    /// Fails only on encoder errors and on a low battery.
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        self.cycles += 1;
        let mut report = CycleReport {
            cycle: self.cycles,
            ..CycleReport::default()
        };

        for _ in 0..self.options.frames_per_cycle {
            let readings = self.poll();
            report.battery_volts = self.check_battery(&readings)?;
            self.stats.update(&readings);

            self.status.normal_mode_failure = readings.safe_mode;
            self.status.stem_board_failure = !readings.payload_valid;
            if readings.safe_mode {
                info!("Safe mode");
            }

            match self.options.mode.modulation() {
                Some(modulation) => {
                    let header = self.send_frame(modulation, &readings, &mut report.samples)?;
                    report.headers.push(header);
                }
                None => self.send_text(&readings, &mut report),
            }
        }

        if self.options.mode == Mode::Cw {
            let text = report.packets.join(" ");
            report.samples = self.keyer.key(&text);
        }
        report.delivered = self.deliver(&report.samples);
        debug!(
            "Cycle {}: {} frames, {} packets, {} samples",
            report.cycle,
            report.headers.len(),
            report.packets.len(),
            report.samples.len()
        );
        Ok(report)
    }

    fn send_frame(
        &mut self,
        modulation: Modulation,
        readings: &Readings,
        out: &mut Vec<i16>,
    ) -> Result<FrameHeader> {
        let frame_number = self.frames_sent() + 1;
        let frame_type = FrameType::for_frame(modulation, frame_number);
        let readings = match frame_type {
            FrameType::Min => {
                info!("Sending MIN frame");
                self.stats.min_frame(readings)
            }
            FrameType::Max => {
                info!("Sending MAX frame");
                self.stats.max_frame(readings)
            }
            FrameType::Realtime => readings.clone(),
        };

        let uptime = self.uptime();
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| TelemetryError::InvalidArgument("mode sends no frames".to_string()))?;
        let header = FrameHeader {
            mode_id: encoder.profile().mode_id,
            reset_count: self.options.station.reset_count,
            uptime,
            frame_type: frame_type.code(),
        };
        let payload = encode_payload(
            modulation,
            &readings,
            &self.options.board.map,
            &self.status,
            &self.antennas,
            encoder.profile().layout.data_len,
        );
        encoder.encode_frame_into(&header, &payload, out)?;

        if !self.antennas.tx_deployed {
            self.antennas.tx_deployed = true;
            info!("TX antenna deployed");
        }
        Ok(header)
    }

    fn send_text(&mut self, readings: &Readings, report: &mut CycleReport) {
        let telemetry = TextTelemetry::from_readings(
            readings,
            &self.options.board.map,
            readings.other[other::IHU_TEMP],
            &mut self.rng,
        );
        let station = &self.options.station;
        match self.options.mode {
            Mode::Cw => report.packets.push(cw_text(&telemetry)),
            _ => {
                let (latitude, longitude) = station.position();
                let payload = payload_text(readings);
                report.packets.push(afsk_text(
                    &station.callsign,
                    latitude,
                    longitude,
                    &telemetry,
                    payload.as_deref(),
                ));
                report.packets.push(beacon_text(&station.callsign));
            }
        }
    }
}

/// Payload board values as appended to text packets
fn payload_text(readings: &Readings) -> Option<String> {
    if !readings.payload_valid {
        return None;
    }
    let s = &readings.sensor;
    Some(format!(
        "OK {:.1} {:.1} {:.1} {:.0} {:.1} {:.1} {:.1} {:.2} {:.2} {:.2}",
        s[sensor::TEMP],
        s[sensor::PRES],
        s[sensor::ALT],
        s[sensor::HUMI],
        s[sensor::GYRO_X],
        s[sensor::GYRO_Y],
        s[sensor::GYRO_Z],
        s[sensor::ACCEL_X],
        s[sensor::ACCEL_Y],
        s[sensor::ACCEL_Z],
    ))
}
