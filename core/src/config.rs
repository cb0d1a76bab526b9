//! Persisted station state (`sim.cfg`)
//!
//! Two formats are read: the positional `callsign resets latitude longitude`
//! line, and `key=value` lines (`callsign`, `num_resets`, `latitude`,
//! `longitude`) with `#` comments. The positional form is written back.

use std::fmt;
use std::fs;
use std::path::Path;

use log::{info, warn};

use crate::error::{Result, TelemetryError};

pub const CONFIG_FILE_NAME: &str = "sim.cfg";
pub const DEFAULT_CALLSIGN: &str = "NOCALL";
pub const DEFAULT_RESET_COUNT: u16 = 100;
pub const DEFAULT_LATITUDE: f64 = 41.462399;
pub const DEFAULT_LONGITUDE: f64 = -87.038309;

/// Reset counter wraps here
const RESET_MODULUS: u32 = 0xffff;

#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub callsign: String,
    pub reset_count: u16,
    /// Latitude as stored, possibly unset (0) or invalid
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            callsign: DEFAULT_CALLSIGN.to_string(),
            reset_count: DEFAULT_RESET_COUNT,
            latitude: DEFAULT_LATITUDE,
            longitude: DEFAULT_LONGITUDE,
        }
    }
}

fn parse_reset(value: &str) -> Result<u16> {
    let n: u32 = value
        .trim()
        .parse()
        .map_err(|_| TelemetryError::Config(format!("invalid reset count '{}'", value.trim())))?;
    Ok((n % RESET_MODULUS) as u16)
}

fn parse_coordinate(name: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse()
        .map_err(|_| TelemetryError::Config(format!("invalid {} '{}'", name, value.trim())))
}

/// Keep a parsed field, or in lossy mode log the failure and use `fallback`
fn field<T: fmt::Display>(parsed: Result<T>, fallback: T, lossy: bool) -> Result<T> {
    match parsed {
        Ok(value) => Ok(value),
        Err(e) if lossy => {
            warn!("{}, using {}", e, fallback);
            Ok(fallback)
        }
        Err(e) => Err(e),
    }
}

impl SimConfig {
    /// Strict parse: any malformed field is an error
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_with(text, false)
    }

    /// Parse what can be read, defaulting malformed fields
    ///
    /// A bad reset count becomes 0 and bad coordinates become 0.0, which
    /// [`SimConfig::position`] replaces with the default station position.
    /// An empty file yields the defaults.
    pub fn parse_lossy(text: &str) -> Self {
        match Self::parse_with(text, true) {
            Ok(config) => config,
            Err(e) => {
                warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    fn parse_with(text: &str, lossy: bool) -> Result<Self> {
        let keyed = text
            .lines()
            .any(|l| !l.trim_start().starts_with('#') && l.contains('='));
        if keyed {
            Self::parse_keyed(text, lossy)
        } else {
            Self::parse_positional(text, lossy)
        }
    }

    fn parse_positional(text: &str, lossy: bool) -> Result<Self> {
        let mut tokens = text.split_whitespace();
        let callsign = tokens
            .next()
            .ok_or_else(|| TelemetryError::Config("empty configuration".to_string()))?
            .to_string();
        let reset_count = match tokens.next() {
            Some(t) => field(parse_reset(t), 0, lossy)?,
            None => 0,
        };
        let latitude = match tokens.next() {
            Some(t) => field(parse_coordinate("latitude", t), 0.0, lossy)?,
            None => 0.0,
        };
        let longitude = match tokens.next() {
            Some(t) => field(parse_coordinate("longitude", t), 0.0, lossy)?,
            None => 0.0,
        };
        Ok(Self {
            callsign,
            reset_count,
            latitude,
            longitude,
        })
    }

    fn parse_keyed(text: &str, lossy: bool) -> Result<Self> {
        let mut config = Self {
            callsign: DEFAULT_CALLSIGN.to_string(),
            reset_count: 0,
            latitude: 0.0,
            longitude: 0.0,
        };
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                warn!("Ignoring config line without '=': {}", line);
                continue;
            };
            match key.trim() {
                "callsign" => {
                    config.callsign = value.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
                }
                "num_resets" => config.reset_count = field(parse_reset(value), 0, lossy)?,
                "latitude" => {
                    config.latitude = field(parse_coordinate("latitude", value), 0.0, lossy)?
                }
                "longitude" => {
                    config.longitude = field(parse_coordinate("longitude", value), 0.0, lossy)?
                }
                other => warn!("Unknown config key '{}'", other),
            }
        }
        if config.callsign.is_empty() {
            config.callsign = DEFAULT_CALLSIGN.to_string();
        }
        Ok(config)
    }

    /// Read the file, creating it with defaults when it does not exist
    ///
    /// Malformed contents never fail the load; see [`SimConfig::parse_lossy`].
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Creating config file {}", path.display());
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }
        let text = fs::read_to_string(path)?;
        Ok(Self::parse_lossy(&text))
    }

    /// Count a new start: load, bump the reset counter, write back
    pub fn record_reset(path: &Path) -> Result<Self> {
        let mut config = Self::load_or_create(path)?;
        config.increment_reset();
        config.save(path)?;
        info!(
            "Config {} holds {} reset {} position {:.4} {:.4}",
            path.display(),
            config.callsign,
            config.reset_count,
            config.latitude,
            config.longitude
        );
        Ok(config)
    }

    pub fn increment_reset(&mut self) {
        self.reset_count = ((self.reset_count as u32 + 1) % RESET_MODULUS) as u16;
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_string())?;
        Ok(())
    }

    pub fn has_valid_position(&self) -> bool {
        let lat = self.latitude.abs();
        let long = self.longitude.abs();
        lat > 0.0 && lat < 90.0 && long > 0.0 && long < 180.0
    }

    /// Stored position when valid, otherwise the default station position
    pub fn position(&self) -> (f64, f64) {
        if self.has_valid_position() {
            (self.latitude, self.longitude)
        } else {
            (DEFAULT_LATITUDE, DEFAULT_LONGITUDE)
        }
    }
}

impl fmt::Display for SimConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {:8.4} {:8.4}",
            self.callsign, self.reset_count, self.latitude, self.longitude
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("telemwave-config-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir.join(CONFIG_FILE_NAME)
    }

    #[test]
    fn test_parse_positional() {
        let config = SimConfig::parse("KB1ABC 42  40.0379 -75.3433\n").unwrap();
        assert_eq!(config.callsign, "KB1ABC");
        assert_eq!(config.reset_count, 42);
        assert_eq!(config.latitude, 40.0379);
        assert_eq!(config.longitude, -75.3433);
        assert!(config.has_valid_position());
    }

    #[test]
    fn test_parse_keyed_with_comments() {
        let text = "# station\ncallsign=KB1-ABC\nnum_resets=7\nlatitude=-33.9\nlongitude=151.2\n";
        let config = SimConfig::parse(text).unwrap();
        assert_eq!(config.callsign, "KB1ABC");
        assert_eq!(config.reset_count, 7);
        assert_eq!(config.position(), (-33.9, 151.2));
    }

    #[test]
    fn test_missing_position_falls_back() {
        let config = SimConfig::parse("KB1ABC 3").unwrap();
        assert!(!config.has_valid_position());
        assert_eq!(config.position(), (DEFAULT_LATITUDE, DEFAULT_LONGITUDE));

        let config = SimConfig::parse("KB1ABC 3 95.0 10.0").unwrap();
        assert_eq!(config.position(), (DEFAULT_LATITUDE, DEFAULT_LONGITUDE));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(SimConfig::parse(""), Err(TelemetryError::Config(_))));
        assert!(matches!(SimConfig::parse("KB1ABC many"), Err(TelemetryError::Config(_))));
        assert!(SimConfig::parse("num_resets=x").is_err());
    }

    #[test]
    fn test_reset_increment_wraps() {
        let mut config = SimConfig {
            reset_count: 0xfffe,
            ..SimConfig::default()
        };
        config.increment_reset();
        assert_eq!(config.reset_count, 0);
        config.increment_reset();
        assert_eq!(config.reset_count, 1);
    }

    #[test]
    fn test_display_format() {
        let config = SimConfig {
            callsign: "KB1ABC".to_string(),
            reset_count: 5,
            latitude: 41.462399,
            longitude: -87.038309,
        };
        assert_eq!(config.to_string(), "KB1ABC 5  41.4624 -87.0383");
    }

    #[test]
    fn test_record_reset_creates_and_increments() {
        let path = temp_path("record");
        fs::remove_file(&path).ok();

        let first = SimConfig::record_reset(&path).unwrap();
        assert_eq!(first.reset_count, DEFAULT_RESET_COUNT + 1);
        let second = SimConfig::record_reset(&path).unwrap();
        assert_eq!(second.reset_count, DEFAULT_RESET_COUNT + 2);
        assert_eq!(second.callsign, DEFAULT_CALLSIGN);

        let reread = SimConfig::load_or_create(&path).unwrap();
        assert_eq!(reread, SimConfig::parse(&fs::read_to_string(&path).unwrap()).unwrap());
        assert_eq!(reread.reset_count, second.reset_count);

        fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_lossy_parse_defaults_bad_fields() {
        let config = SimConfig::parse_lossy("KB1ABC 7 north -75.0");
        assert_eq!(config.callsign, "KB1ABC");
        assert_eq!(config.reset_count, 7);
        assert_eq!(config.latitude, 0.0);
        assert_eq!(config.position(), (DEFAULT_LATITUDE, DEFAULT_LONGITUDE));

        let config = SimConfig::parse_lossy("callsign=KB1ABC\nnum_resets=x\nlatitude=40.5\n");
        assert_eq!(config.reset_count, 0);
        assert_eq!(config.latitude, 40.5);

        assert_eq!(SimConfig::parse_lossy("  \n"), SimConfig::default());
    }

    #[test]
    fn test_record_reset_recovers_malformed_file() {
        let path = temp_path("malformed");
        fs::write(&path, "KB1ABC many 40.0 -75.0\n").unwrap();

        let config = SimConfig::record_reset(&path).unwrap();
        assert_eq!(config.callsign, "KB1ABC");
        assert_eq!(config.reset_count, 1);
        assert_eq!(config.position(), (40.0, -75.0));

        let saved = fs::read_to_string(&path).unwrap();
        assert!(saved.starts_with("KB1ABC 1 "), "{}", saved);
        assert_eq!(SimConfig::parse(&saved).unwrap(), config);

        fs::remove_dir_all(path.parent().unwrap()).ok();
    }
}
