//! Bucket frame codec.
//!
//! A frame is a little-endian `u32` body length followed by the JSON body of
//! one [`GestureRecord`]. A bucket is a plain concatenation of frames.

use crate::core::GestureRecord;
use crate::error::{CollectorError, Result};

pub const HEADER_SIZE: usize = 4;

pub fn encode_frame(record: &GestureRecord) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(record)
        .map_err(|e| CollectorError::schema(format!("Failed to serialize gesture record: {}", e)))?;
    let len = u32::try_from(body.len())
        .map_err(|_| CollectorError::schema(format!("Record of {} bytes is too large for a frame", body.len())))?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + body.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decode frames in order until the data runs out.
///
/// An incomplete trailing frame ends the sequence. A complete frame that is
/// not a valid record fails the whole read.
pub fn decode_frames(bytes: &[u8]) -> Result<Vec<GestureRecord>> {
    let mut records = Vec::new();
    let mut rest = bytes;

    while !rest.is_empty() {
        if rest.len() < HEADER_SIZE {
            log::debug!("Ignoring {} trailing bytes of a truncated frame header", rest.len());
            break;
        }
        let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        let body_end = match HEADER_SIZE.checked_add(len) {
            Some(end) if end <= rest.len() => end,
            _ => {
                log::debug!(
                    "Ignoring truncated frame: header announces {} bytes, {} available",
                    len,
                    rest.len() - HEADER_SIZE
                );
                break;
            }
        };

        let record: GestureRecord = serde_json::from_slice(&rest[HEADER_SIZE..body_end])
            .map_err(|e| CollectorError::schema(format!("Frame {}: {}", records.len(), e)))?;
        records.push(record);
        rest = &rest[body_end..];
    }

    Ok(records)
}

/// Length of the leading run of complete frames, judged by headers alone.
///
/// Anything past this offset is a torn tail left by an interrupted write.
pub fn complete_len(bytes: &[u8]) -> usize {
    let mut offset = 0;
    while bytes.len() - offset >= HEADER_SIZE {
        let h = &bytes[offset..offset + HEADER_SIZE];
        let len = u32::from_le_bytes([h[0], h[1], h[2], h[3]]) as usize;
        match (offset + HEADER_SIZE).checked_add(len) {
            Some(end) if end <= bytes.len() => offset = end,
            _ => break,
        }
    }
    offset
}
