// Record framing - the self-delimiting unit stored in every tier
//
// Frame format (binary):
// [tag: 2 bytes] [length: i32 BE] [payload bytes]
//
// `length` is the total frame length, header included. The tag bytes
// belong to the producer and are carried through untouched. Records are
// always handled header-inclusive: what goes into the buffer is exactly
// what comes back out, whichever tier it was fetched from.

use crate::{Error, Result};

/// Size of the fixed frame header
pub const HEADER_LEN: usize = 6;

/// Offset of the big-endian length field inside the header
pub const LENGTH_OFFSET: usize = 2;

/// Largest frame the length field can describe.
///
/// Admission is bounded by the memory budget, and readers never trust a
/// length beyond the bytes actually present.
pub const MAX_FRAME_LEN: usize = i32::MAX as usize;

/// Build a frame from a producer tag and a payload.
pub fn encode(tag: [u8; 2], payload: &[u8]) -> Result<Vec<u8>> {
    let total = HEADER_LEN + payload.len();
    if total > MAX_FRAME_LEN {
        return Err(Error::Corrupt(format!(
            "frame of {} bytes exceeds the {} byte limit",
            total, MAX_FRAME_LEN
        )));
    }

    let mut frame = Vec::with_capacity(total);
    frame.extend_from_slice(&tag);
    frame.extend_from_slice(&(total as i32).to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Decode the total frame length from a header.
///
/// Only the first [`HEADER_LEN`] bytes are inspected.
pub fn decode_len(header: &[u8]) -> Result<usize> {
    if header.len() < HEADER_LEN {
        return Err(Error::Corrupt(format!(
            "incomplete header: {} of {} bytes",
            header.len(),
            HEADER_LEN
        )));
    }

    let raw = i32::from_be_bytes([
        header[LENGTH_OFFSET],
        header[LENGTH_OFFSET + 1],
        header[LENGTH_OFFSET + 2],
        header[LENGTH_OFFSET + 3],
    ]);

    if raw < HEADER_LEN as i32 {
        return Err(Error::Corrupt(format!("length field {} is below header size", raw)));
    }

    Ok(raw as usize)
}

/// Check that `record` is exactly one well-formed frame.
pub fn validate(record: &[u8]) -> Result<()> {
    let len = decode_len(record)?;
    if len != record.len() {
        return Err(Error::Corrupt(format!(
            "length field says {} bytes, record has {}",
            len,
            record.len()
        )));
    }
    Ok(())
}

/// Borrow the frame starting at `offset` inside a buffer of concatenated frames.
///
/// Returns `Ok(None)` when `offset` sits exactly at the end of the buffer.
pub fn frame_at(buf: &[u8], offset: usize) -> Result<Option<&[u8]>> {
    if offset >= buf.len() {
        return Ok(None);
    }

    let rest = &buf[offset..];
    let len = decode_len(rest)?;
    if rest.len() < len {
        return Err(Error::Corrupt(format!(
            "frame at offset {} needs {} bytes, {} remain",
            offset,
            len,
            rest.len()
        )));
    }

    Ok(Some(&rest[..len]))
}

/// Producer tag of a frame.
pub fn tag(record: &[u8]) -> Option<[u8; 2]> {
    if record.len() < HEADER_LEN {
        return None;
    }
    Some([record[0], record[1]])
}

/// Payload of a frame, header stripped.
pub fn payload(record: &[u8]) -> Option<&[u8]> {
    record.get(HEADER_LEN..)
}
