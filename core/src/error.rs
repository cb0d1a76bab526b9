use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Codeword already holds {0} information bytes")]
    CodewordOverflow(usize),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid frame layout: {0}")]
    InvalidLayout(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Sensor read failed: {0}")]
    Sensor(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Battery voltage too low: {volts:.2} V (threshold {threshold:.2} V)")]
    BatteryLow { volts: f32, threshold: f32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
