//! Fixed-width little-endian field writes.
//!
//! Every numeric field of a ZIP record lives at a fixed offset inside the
//! record. An off-by-one here silently corrupts the archive for most
//! readers, so writes check both the value range and the buffer bounds
//! instead of truncating or panicking.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::FieldError;

/// Largest value representable in a field of `width` bytes.
pub const fn max_value(width: usize) -> u64 {
    if width >= 8 {
        u64::MAX
    } else {
        (1u64 << (8 * width)) - 1
    }
}

/// Write `value` as an unsigned `width`-byte little-endian integer at `offset`.
///
/// # Errors
///
/// - [`FieldError::UnsupportedWidth`] if `width` is not in `1..=8`
/// - [`FieldError::ValueTooLarge`] if `value` does not fit in `width` bytes
/// - [`FieldError::OutOfBounds`] if `offset + width` exceeds `buf.len()`
pub fn write_le(buf: &mut [u8], offset: usize, width: usize, value: u64) -> Result<(), FieldError> {
    if !(1..=8).contains(&width) {
        return Err(FieldError::UnsupportedWidth(width));
    }
    if value > max_value(width) {
        return Err(FieldError::ValueTooLarge { value, width });
    }

    let len = buf.len();
    let field = offset
        .checked_add(width)
        .and_then(|end| buf.get_mut(offset..end))
        .ok_or(FieldError::OutOfBounds { offset, width, len })?;

    LittleEndian::write_uint(field, value, width);
    Ok(())
}

pub fn write_u16(buf: &mut [u8], offset: usize, value: u16) -> Result<(), FieldError> {
    write_le(buf, offset, 2, u64::from(value))
}

pub fn write_u32(buf: &mut [u8], offset: usize, value: u32) -> Result<(), FieldError> {
    write_le(buf, offset, 4, u64::from(value))
}

/// Copy raw bytes (names, payloads) into `buf` at `offset`.
pub fn write_bytes(buf: &mut [u8], offset: usize, bytes: &[u8]) -> Result<(), FieldError> {
    let len = buf.len();
    let width = bytes.len();
    let target = offset
        .checked_add(width)
        .and_then(|end| buf.get_mut(offset..end))
        .ok_or(FieldError::OutOfBounds { offset, width, len })?;

    target.copy_from_slice(bytes);
    Ok(())
}
