use std::io::Write;
use std::net::TcpStream;

use log::{debug, info, warn};

use crate::error::{Result, TelemetryError};

/// Where the RF pipeline listens for PCM by default
pub const DEFAULT_TRANSPORT_ADDR: &str = "127.0.0.1:8080";

/// Receiver of one cycle's sample buffer
pub trait TransportSink {
    fn send(&mut self, samples: &[i16]) -> Result<()>;
}

/// Serialize samples as signed 16-bit little-endian PCM
pub fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes
}

/// PCM over a TCP connection, reconnecting on the next send after a failure
pub struct TcpSink {
    addr: String,
    stream: Option<TcpStream>,
}

impl TcpSink {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            stream: None,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn connect(&mut self) -> Result<&mut TcpStream> {
        if self.stream.is_none() {
            info!("Opening socket to {}", self.addr);
            let stream = TcpStream::connect(&self.addr)
                .map_err(|e| TelemetryError::Transport(format!("connect {}: {}", self.addr, e)))?;
            stream.set_nodelay(true).ok();
            self.stream = Some(stream);
        }
        self.stream
            .as_mut()
            .ok_or_else(|| TelemetryError::Transport("socket not open".to_string()))
    }
}

impl Default for TcpSink {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSPORT_ADDR)
    }
}

impl TransportSink for TcpSink {
    fn send(&mut self, samples: &[i16]) -> Result<()> {
        let bytes = pcm_bytes(samples);
        let addr = self.addr.clone();
        let result = self.connect().and_then(|stream| {
            stream
                .write_all(&bytes)
                .and_then(|_| stream.flush())
                .map_err(|e| TelemetryError::Transport(format!("send to {}: {}", addr, e)))
        });

        match result {
            Ok(()) => {
                debug!("Sent {} bytes to {}", bytes.len(), self.addr);
                Ok(())
            }
            Err(e) => {
                warn!("{}; dropping socket", e);
                self.stream = None;
                Err(e)
            }
        }
    }
}
