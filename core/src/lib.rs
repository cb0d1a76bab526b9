//! Spacecraft telemetry encoder
//!
//! Packs telemetry into frames protected by CCSDS Reed-Solomon codewords,
//! line-codes them with 8b10b and modulates the bit stream as FSK level
//! switching or BPSK phase reversal at 48 kHz

pub mod error;
pub mod gf256;
pub mod fec;
pub mod line_code;
pub mod framing;
pub mod interleave;
pub mod symbols;
pub mod sync;
pub mod modulator;
pub mod encoder;
pub mod telemetry;
pub mod sensors;
pub mod sim;
pub mod config;
pub mod transport;
pub mod status;
pub mod cw;
pub mod aprs;
pub mod session;

pub use config::SimConfig;
pub use encoder::{EncodedFrame, Encoder, TransmitProfile};
pub use error::{Result, TelemetryError};
pub use fec::FecEncoder;
pub use framing::{FrameDecoder, FrameEncoder, FrameHeader, FrameLayout};
pub use line_code::LineEncoder;
pub use modulator::{Modulation, Modulator, ModulatorConfig};
pub use session::{CycleReport, Mode, SessionOptions, TelemetrySession};

// Audio configuration
pub const SAMPLE_RATE: u32 = 48000;

// FEC configuration
pub const RS_DATA_BYTES: usize = 223;
pub const RS_TOTAL_BYTES: usize = 255;
pub const RS_ECC_BYTES: usize = RS_TOTAL_BYTES - RS_DATA_BYTES; // 32
