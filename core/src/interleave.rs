//! Column-major distribution of a logical frame over parallel RS codewords
//!
//! Logical bytes fill column 0 of every sub-frame, then column 1, and so on.
//! The header goes first; the payload follows and is repeated (wrapping on
//! its length) until every slot except the layout's skipped slot is used.

use log::debug;

use crate::error::{Result, TelemetryError};
use crate::fec::FecEncoder;
use crate::framing::FrameLayout;
use crate::RS_ECC_BYTES;

/// One frame after interleaving: the bytes in the order they were written
/// plus the parity of every sub-frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterleavedFrame {
    pub written: Vec<u8>,
    pub parity: Vec<[u8; RS_ECC_BYTES]>,
}

impl InterleavedFrame {
    /// Parity bytes grouped by parity index across sub-frames
    pub fn parity_interleaved(&self) -> impl Iterator<Item = u8> + '_ {
        (0..RS_ECC_BYTES).flat_map(move |i| self.parity.iter().map(move |p| p[i]))
    }
}

/// (column, sub-frame) of every logical byte, in write order
pub fn slot_order(layout: &FrameLayout) -> Vec<(usize, usize)> {
    let mut slots = Vec::with_capacity(layout.rs_frames * layout.rs_frame_len);
    for column in 0..layout.rs_frame_len {
        for sub_frame in 0..layout.rs_frames {
            if layout.skipped_slot == Some((column, sub_frame)) {
                continue;
            }
            slots.push((column, sub_frame));
        }
    }
    slots
}

/// Distribute `header` and `payload` over the layout's sub-frames, feeding
/// each byte to its sub-frame's RS encoder as it is placed
pub fn interleave(layout: &FrameLayout, header: &[u8], payload: &[u8]) -> Result<InterleavedFrame> {
    layout.validate()?;
    if header.len() != layout.header_len {
        return Err(TelemetryError::InvalidArgument(format!(
            "header is {} bytes, layout expects {}",
            header.len(),
            layout.header_len
        )));
    }
    if payload.len() != layout.data_len {
        return Err(TelemetryError::InvalidArgument(format!(
            "payload is {} bytes, layout expects {}",
            payload.len(),
            layout.data_len
        )));
    }

    let mut encoders = vec![FecEncoder::new(); layout.rs_frames];
    let mut written = Vec::with_capacity(layout.logical_len());
    let mut payload_index = 0usize;

    for (index, (_, sub_frame)) in slot_order(layout).into_iter().enumerate() {
        let byte = if index < layout.header_len {
            header[index]
        } else {
            let b = payload[payload_index % layout.data_len];
            payload_index += 1;
            b
        };
        encoders[sub_frame].update(byte)?;
        written.push(byte);
    }

    debug!(
        "Interleaved {} bytes over {} sub-frame(s) of {} columns",
        written.len(),
        layout.rs_frames,
        layout.rs_frame_len
    );

    Ok(InterleavedFrame {
        written,
        parity: encoders.iter().map(|e| *e.parity()).collect(),
    })
}
