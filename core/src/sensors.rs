//! Telemetry sources
//!
//! Hardware access stays outside the crate: power readings come from an
//! external command printing `v i v i ...`, payload readings from a command
//! answering `OK v v v ...`, CPU temperature and uptime from procfs/sysfs
//! style text files.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, warn};

use crate::error::{Result, TelemetryError};
use crate::telemetry::{
    other, BoardConfig, Readings, OTHER_VALUES, PAYLOAD_SENSORS, POWER_CHANNELS, SAFE_MODE_VOLTS,
};

pub const DEFAULT_CPU_TEMP_PATH: &str = "/sys/class/thermal/thermal_zone0/temp";
pub const DEFAULT_UPTIME_PATH: &str = "/proc/uptime";

/// Anything that can produce one set of readings per transmission cycle
pub trait SensorSource {
    fn poll(&mut self) -> Result<Readings>;
}

/// Parse `v0 i0 v1 i1 ...` into voltage and current arrays
///
/// Missing or malformed values read as zero. Small negative currents
/// (above -0.5) are sensor noise around zero and are flipped positive.
pub fn parse_power_line(line: &str) -> ([f32; POWER_CHANNELS], [f32; POWER_CHANNELS]) {
    let mut voltage = [0.0f32; POWER_CHANNELS];
    let mut current = [0.0f32; POWER_CHANNELS];
    let mut tokens = line.split_whitespace().map(parse_number);

    for k in 0..POWER_CHANNELS {
        match tokens.next() {
            Some(v) => voltage[k] = v,
            None => break,
        }
        match tokens.next() {
            Some(i) => {
                current[k] = if i < 0.0 && i > -0.5 { -i } else { i };
            }
            None => break,
        }
    }
    (voltage, current)
}

/// Parse a payload board answer; only `OK`-prefixed responses count
pub fn parse_payload_response(line: &str) -> Option<[f32; PAYLOAD_SENSORS]> {
    if !line.starts_with("OK") {
        return None;
    }
    let mut sensor = [0.0f32; PAYLOAD_SENSORS];
    for (slot, token) in sensor.iter_mut().zip(line.split_whitespace()) {
        *slot = parse_number(token);
    }
    Some(sensor)
}

/// Numeric prefix of a token, zero when there is none
fn parse_number(token: &str) -> f32 {
    if let Ok(v) = token.parse::<f32>() {
        return v;
    }
    let end = token
        .char_indices()
        .take_while(|&(i, c)| c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    token[..end].parse::<f32>().unwrap_or(0.0)
}

/// CPU temperature in degrees C from a millidegree file
pub fn read_cpu_temp(path: &Path) -> Result<f32> {
    let text = fs::read_to_string(path)?;
    let milli: f64 = text
        .trim()
        .parse()
        .map_err(|_| TelemetryError::Sensor(format!("bad temperature in {}", path.display())))?;
    Ok((milli / 1000.0) as f32)
}

/// Whole seconds since boot from a `/proc/uptime` style file
pub fn read_uptime(path: &Path) -> Result<u32> {
    let text = fs::read_to_string(path)?;
    let secs: f64 = text
        .split_whitespace()
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| TelemetryError::Sensor(format!("bad uptime in {}", path.display())))?;
    Ok(secs as u32)
}

fn run_line(program: &str, args: &[String]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| TelemetryError::Sensor(format!("failed to run {}: {}", program, e)))?;
    if !output.status.success() {
        return Err(TelemetryError::Sensor(format!(
            "{} exited with {}",
            program, output.status
        )));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or("").to_string())
}

/// Command line of an external reader: program and arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ReaderCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Split a shell-like string on whitespace
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?.to_string();
        Some(Self {
            program,
            args: parts.map(str::to_string).collect(),
        })
    }

    fn run(&self) -> Result<String> {
        run_line(&self.program, &self.args)
    }
}

/// Readings gathered from external commands and system files
pub struct CommandSource {
    board: BoardConfig,
    power: ReaderCommand,
    payload: Option<ReaderCommand>,
    cpu_temp_path: PathBuf,
}

impl CommandSource {
    pub fn new(board: BoardConfig, power: ReaderCommand) -> Self {
        Self {
            board,
            power,
            payload: None,
            cpu_temp_path: PathBuf::from(DEFAULT_CPU_TEMP_PATH),
        }
    }

    pub fn with_payload(mut self, payload: ReaderCommand) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_cpu_temp_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cpu_temp_path = path.into();
        self
    }
}

impl SensorSource for CommandSource {
    fn poll(&mut self) -> Result<Readings> {
        let line = self.power.run()?;
        debug!("Power reader: {}", line);
        let (voltage, current) = parse_power_line(&line);

        let mut readings = Readings {
            voltage,
            current,
            other: [0.0; OTHER_VALUES],
            ..Readings::default()
        };
        readings.safe_mode = readings.battery_voltage(&self.board.map) < SAFE_MODE_VOLTS;

        match read_cpu_temp(&self.cpu_temp_path) {
            Ok(t) => readings.other[other::IHU_TEMP] = t,
            Err(e) => warn!("CPU temperature unavailable: {}", e),
        }

        if let Some(payload) = &self.payload {
            match payload.run() {
                Ok(answer) => {
                    debug!("Payload answer: {}", answer);
                    if let Some(sensor) = parse_payload_response(&answer) {
                        readings.sensor = sensor;
                        readings.payload_valid = true;
                    }
                }
                Err(e) => warn!("Payload query failed: {}", e),
            }
        }
        Ok(readings)
    }
}
