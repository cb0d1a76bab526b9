use std::thread;
use std::time::Duration;

use log::{debug, error};

use crate::error::{Result, TelemetryError};

/// Below this a battery channel reads as "not connected" rather than flat
pub const BATTERY_PRESENT_VOLTS: f32 = 1.0;

/// Power and transmit lamps of the spacecraft
pub trait StatusIndicator {
    fn set_power(&mut self, on: bool);
    fn set_transmit(&mut self, on: bool);
}

/// Indicator that only logs lamp changes
#[derive(Debug, Default)]
pub struct LogIndicator;

impl StatusIndicator for LogIndicator {
    fn set_power(&mut self, on: bool) {
        debug!("Power LED {}", if on { "on" } else { "off" });
    }

    fn set_transmit(&mut self, on: bool) {
        debug!("Tx LED {}", if on { "on" } else { "off" });
    }
}

/// Stop with [`TelemetryError::BatteryLow`] when a connected battery is under
/// `threshold`, after blinking the power lamp as a shutdown signal
pub fn check_battery(
    volts: f32,
    threshold: f32,
    indicator: &mut dyn StatusIndicator,
    blink: Duration,
) -> Result<()> {
    if !(volts > BATTERY_PRESENT_VOLTS && volts < threshold) {
        return Ok(());
    }

    error!(
        "Battery voltage too low: {:.2} V (threshold {:.2} V), shutting down",
        volts, threshold
    );
    indicator.set_transmit(false);
    for on in [false, true, false, true] {
        indicator.set_power(on);
        thread::sleep(blink);
    }
    indicator.set_power(false);

    Err(TelemetryError::BatteryLow { volts, threshold })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<(&'static str, bool)>,
    }

    impl StatusIndicator for Recorder {
        fn set_power(&mut self, on: bool) {
            self.events.push(("power", on));
        }

        fn set_transmit(&mut self, on: bool) {
            self.events.push(("tx", on));
        }
    }

    #[test]
    fn test_healthy_or_absent_battery_passes() {
        let mut rec = Recorder::default();
        for volts in [0.0, 0.5, 1.0, 8.0, 8.4] {
            check_battery(volts, 8.0, &mut rec, Duration::ZERO).unwrap();
        }
        assert!(rec.events.is_empty());
    }

    #[test]
    fn test_low_battery_blinks_then_fails() {
        let mut rec = Recorder::default();
        let err = check_battery(2.9, 3.0, &mut rec, Duration::ZERO).unwrap_err();
        match err {
            TelemetryError::BatteryLow { volts, threshold } => {
                assert_eq!(volts, 2.9);
                assert_eq!(threshold, 3.0);
            }
            other => panic!("expected BatteryLow, got {:?}", other),
        }
        assert_eq!(
            rec.events,
            vec![
                ("tx", false),
                ("power", false),
                ("power", true),
                ("power", false),
                ("power", true),
                ("power", false),
            ]
        );
    }
}
