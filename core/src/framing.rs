use crate::error::{Result, TelemetryError};
use crate::RS_DATA_BYTES;

/// Bytes occupied by the packed header fields
pub const PACKED_HEADER_BYTES: usize = 6;

/// Width of the uptime field in bits
const UPTIME_BITS: u32 = 25;

/// Frame metadata carried in the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// 3-bit spacecraft/mode id
    pub mode_id: u8,
    pub reset_count: u16,
    /// Seconds since reset; wraps at 2^25
    pub uptime: u32,
    /// 4-bit frame type (realtime, max, min ...)
    pub frame_type: u8,
}

/// How one logical frame is split over the parallel RS codewords
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    /// Header bytes, including any bytes past the packed fields
    pub header_len: usize,
    /// Bytes in one copy of the telemetry payload
    pub data_len: usize,
    /// How many times the payload is repeated to fill the codewords
    pub payload_copies: usize,
    /// Parallel RS sub-frames
    pub rs_frames: usize,
    /// Information bytes (columns) per sub-frame
    pub rs_frame_len: usize,
    /// (column, sub-frame) slot left empty in a shortened frame
    pub skipped_slot: Option<(usize, usize)>,
    /// Fixed byte placed after the packed header fields
    pub header_marker: Option<(usize, u8)>,
    /// Close the symbol stream with a K.28.5 flag
    pub end_of_frame_flag: bool,
}

impl FrameLayout {
    /// Single 64-byte codeword: 6 header bytes and 58 payload bytes
    pub fn fsk() -> Self {
        Self {
            header_len: 6,
            data_len: 58,
            payload_copies: 1,
            rs_frames: 1,
            rs_frame_len: 64,
            skipped_slot: None,
            header_marker: None,
            end_of_frame_flag: false,
        }
    }

    /// Three interleaved 159-byte codewords carrying 8 header bytes and six
    /// payload copies; the last column of the third codeword stays empty
    pub fn bpsk() -> Self {
        Self {
            header_len: 8,
            data_len: 78,
            payload_copies: 6,
            rs_frames: 3,
            rs_frame_len: 159,
            skipped_slot: Some((158, 2)),
            header_marker: Some((6, 99)),
            end_of_frame_flag: false,
        }
    }

    /// Logical bytes written into the codewords
    pub fn logical_len(&self) -> usize {
        self.header_len + self.data_len * self.payload_copies
    }

    /// Parity bytes appended after the logical bytes
    pub fn parity_len(&self) -> usize {
        self.rs_frames * crate::RS_ECC_BYTES
    }

    /// Line symbols in one frame, excluding the sync word
    pub fn symbol_count(&self) -> usize {
        self.logical_len() + self.parity_len() + usize::from(self.end_of_frame_flag)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rs_frames == 0 || self.rs_frame_len == 0 {
            return Err(TelemetryError::InvalidLayout(
                "at least one non-empty sub-frame is required".to_string(),
            ));
        }
        if self.rs_frame_len > RS_DATA_BYTES {
            return Err(TelemetryError::InvalidLayout(format!(
                "sub-frame length {} exceeds {} information bytes",
                self.rs_frame_len, RS_DATA_BYTES
            )));
        }
        if self.header_len < PACKED_HEADER_BYTES {
            return Err(TelemetryError::InvalidLayout(format!(
                "header needs at least {} bytes",
                PACKED_HEADER_BYTES
            )));
        }
        if self.data_len == 0 && self.payload_copies > 0 {
            return Err(TelemetryError::InvalidLayout("payload copies of an empty payload".to_string()));
        }
        if let Some((column, sub_frame)) = self.skipped_slot {
            if column >= self.rs_frame_len || sub_frame >= self.rs_frames {
                return Err(TelemetryError::InvalidLayout(format!(
                    "skipped slot ({}, {}) outside {}x{} grid",
                    column, sub_frame, self.rs_frame_len, self.rs_frames
                )));
            }
        }
        if let Some((index, _)) = self.header_marker {
            if index < PACKED_HEADER_BYTES || index >= self.header_len {
                return Err(TelemetryError::InvalidLayout(format!(
                    "header marker index {} overlaps packed fields or exceeds header",
                    index
                )));
            }
        }

        let slots = self.rs_frames * self.rs_frame_len - usize::from(self.skipped_slot.is_some());
        if slots != self.logical_len() {
            return Err(TelemetryError::InvalidLayout(format!(
                "{} codeword slots for {} logical bytes",
                slots,
                self.logical_len()
            )));
        }
        Ok(())
    }
}

pub struct FrameEncoder;
pub struct FrameDecoder;

impl FrameEncoder {
    /// Pack the header fields into `layout.header_len` bytes
    ///
    /// Bit layout (LSB first within each byte):
    /// - byte 0: mode id (3) | reset count bits 0..5
    /// - byte 1: reset count bits 5..13
    /// - byte 2: reset count bits 13..16 | uptime bits 0..5
    /// - bytes 3, 4: uptime bits 5..21
    /// - byte 5: uptime bits 21..25 | frame type (4)
    pub fn encode_header(header: &FrameHeader, layout: &FrameLayout) -> Result<Vec<u8>> {
        if header.mode_id > 0x07 {
            return Err(TelemetryError::InvalidArgument(format!(
                "mode id {} does not fit in 3 bits",
                header.mode_id
            )));
        }
        if header.frame_type > 0x0f {
            return Err(TelemetryError::InvalidArgument(format!(
                "frame type {} does not fit in 4 bits",
                header.frame_type
            )));
        }

        let reset = header.reset_count as u32;
        let uptime = header.uptime & ((1 << UPTIME_BITS) - 1);

        let mut h = vec![0u8; layout.header_len.max(PACKED_HEADER_BYTES)];
        h[0] = (header.mode_id & 0x07) | (((reset & 0x1f) as u8) << 3);
        h[1] = ((reset >> 5) & 0xff) as u8;
        h[2] = ((reset >> 13) & 0x07) as u8 | (((uptime & 0x1f) as u8) << 3);
        h[3] = ((uptime >> 5) & 0xff) as u8;
        h[4] = ((uptime >> 13) & 0xff) as u8;
        h[5] = ((uptime >> 21) & 0x0f) as u8 | (header.frame_type << 4);

        if let Some((index, value)) = layout.header_marker {
            if let Some(slot) = h.get_mut(index) {
                *slot = value;
            }
        }
        Ok(h)
    }
}

impl FrameDecoder {
    /// Recover header fields from packed header bytes
    pub fn decode_header(data: &[u8]) -> Result<FrameHeader> {
        if data.len() < PACKED_HEADER_BYTES {
            return Err(TelemetryError::InvalidArgument(format!(
                "header needs {} bytes, got {}",
                PACKED_HEADER_BYTES,
                data.len()
            )));
        }

        let mode_id = data[0] & 0x07;
        let reset_count = ((data[0] >> 3) as u16)
            | ((data[1] as u16) << 5)
            | (((data[2] & 0x07) as u16) << 13);
        let uptime = ((data[2] >> 3) as u32)
            | ((data[3] as u32) << 5)
            | ((data[4] as u32) << 13)
            | (((data[5] & 0x0f) as u32) << 21);
        let frame_type = data[5] >> 4;

        Ok(FrameHeader {
            mode_id,
            reset_count,
            uptime,
            frame_type,
        })
    }
}

/// Write a 12-bit value as "A" form: bits 0..8 fill `b[index]`, bits 8..12
/// fill the low nibble of `b[index + 1]`
pub fn encode_a(b: &mut [u8], index: usize, value: i32) {
    b[index] = (value & 0xff) as u8;
    b[index + 1] = (b[index + 1] & 0xf0) | ((value >> 8) & 0x0f) as u8;
}

/// Write a 12-bit value as "B" form: bits 0..4 fill the high nibble of
/// `b[index]`, bits 4..12 fill `b[index + 1]`
pub fn encode_b(b: &mut [u8], index: usize, value: i32) {
    b[index] = (b[index] & 0x0f) | ((value << 4) & 0xf0) as u8;
    b[index + 1] = ((value >> 4) & 0xff) as u8;
}

/// Read back an "A" field as an unsigned 12-bit value
pub fn decode_a(b: &[u8], index: usize) -> u16 {
    b[index] as u16 | (((b[index + 1] & 0x0f) as u16) << 8)
}

/// Read back a "B" field as an unsigned 12-bit value
pub fn decode_b(b: &[u8], index: usize) -> u16 {
    ((b[index] >> 4) as u16) | ((b[index + 1] as u16) << 4)
}

/// Interpret a 12-bit field as two's complement
pub fn twos_to_int(value: u16, bits: u32) -> i32 {
    let value = value as i32;
    if value & (1 << (bits - 1)) != 0 {
        value - (1 << bits)
    } else {
        value
    }
}
