//! Width-agnostic access to integer-like and floating point fields.
//!
//! Every function takes the bytes starting at the field and the field's width
//! in bytes. Values are stored in host byte order.

use crate::{ErrorKind, Result};

fn field(bytes: &[u8], width: usize) -> Result<&[u8]> {
    bytes.get(..width).ok_or_else(|| ErrorKind::InternalError.into())
}

fn field_mut(bytes: &mut [u8], width: usize) -> Result<&mut [u8]> {
    bytes
        .get_mut(..width)
        .ok_or_else(|| ErrorKind::InternalError.into())
}

/// Read a signed integer of `width` bytes, sign-extending it.
pub fn read_int(bytes: &[u8], width: usize) -> Result<i64> {
    let bytes = field(bytes, check_width(width)?)?;
    Ok(match width {
        1 => i8::from_ne_bytes([bytes[0]]) as i64,
        2 => i16::from_ne_bytes([bytes[0], bytes[1]]) as i64,
        4 => i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64,
        _ => i64::from_ne_bytes(array8(bytes)),
    })
}

/// Read an unsigned integer of `width` bytes.
pub fn read_uint(bytes: &[u8], width: usize) -> Result<u64> {
    let bytes = field(bytes, check_width(width)?)?;
    Ok(match width {
        1 => bytes[0] as u64,
        2 => u16::from_ne_bytes([bytes[0], bytes[1]]) as u64,
        4 => u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64,
        _ => u64::from_ne_bytes(array8(bytes)),
    })
}

/// Write a signed integer, failing if it does not fit in `width` bytes.
pub fn write_int(bytes: &mut [u8], width: usize, value: i64) -> Result<()> {
    let width = check_width(width)?;
    if !int_fits(value, width) {
        return Err(ErrorKind::InvalidValue.into());
    }
    let out = field_mut(bytes, width)?;
    match width {
        1 => out.copy_from_slice(&(value as i8).to_ne_bytes()),
        2 => out.copy_from_slice(&(value as i16).to_ne_bytes()),
        4 => out.copy_from_slice(&(value as i32).to_ne_bytes()),
        _ => out.copy_from_slice(&value.to_ne_bytes()),
    }
    Ok(())
}

/// Write an unsigned integer, failing if it does not fit in `width` bytes.
pub fn write_uint(bytes: &mut [u8], width: usize, value: u64) -> Result<()> {
    let width = check_width(width)?;
    if !uint_fits(value, width) {
        return Err(ErrorKind::InvalidValue.into());
    }
    let out = field_mut(bytes, width)?;
    match width {
        1 => out.copy_from_slice(&(value as u8).to_ne_bytes()),
        2 => out.copy_from_slice(&(value as u16).to_ne_bytes()),
        4 => out.copy_from_slice(&(value as u32).to_ne_bytes()),
        _ => out.copy_from_slice(&value.to_ne_bytes()),
    }
    Ok(())
}

/// Read a 4 or 8 byte float, widened to `f64`.
pub fn read_float(bytes: &[u8], width: usize) -> Result<f64> {
    match width {
        4 => {
            let b = field(bytes, 4)?;
            Ok(f32::from_ne_bytes([b[0], b[1], b[2], b[3]]) as f64)
        }
        8 => Ok(f64::from_ne_bytes(array8(field(bytes, 8)?))),
        _ => Err(ErrorKind::InvalidDataSize.into()),
    }
}

/// Write a 4 or 8 byte float. Narrowing to `f32` rounds.
pub fn write_float(bytes: &mut [u8], width: usize, value: f64) -> Result<()> {
    match width {
        4 => field_mut(bytes, 4)?.copy_from_slice(&(value as f32).to_ne_bytes()),
        8 => field_mut(bytes, 8)?.copy_from_slice(&value.to_ne_bytes()),
        _ => return Err(ErrorKind::InvalidDataSize.into()),
    }
    Ok(())
}

/// Extract `bit_count` bits starting at `bit_offset` (bit 0 is the least
/// significant bit of the value read as unsigned).
pub fn read_bitfield(bytes: &[u8], width: usize, bit_offset: u32, bit_count: u32) -> Result<u64> {
    check_bits(width, bit_offset, bit_count)?;
    let value = read_uint(bytes, width)?;
    Ok((value >> bit_offset) & bit_mask(bit_count))
}

/// Replace `bit_count` bits starting at `bit_offset` with `value`.
pub fn write_bitfield(
    bytes: &mut [u8],
    width: usize,
    bit_offset: u32,
    bit_count: u32,
    value: u64,
) -> Result<()> {
    check_bits(width, bit_offset, bit_count)?;
    let mask = bit_mask(bit_count);
    if value & !mask != 0 {
        return Err(ErrorKind::InvalidValue.into());
    }
    let current = read_uint(bytes, width)?;
    let updated = (current & !(mask << bit_offset)) | (value << bit_offset);
    write_uint(bytes, width, updated)
}

/// Whether `value` is representable in a two's complement field of `width` bytes.
pub fn int_fits(value: i64, width: usize) -> bool {
    match width {
        1 => i8::try_from(value).is_ok(),
        2 => i16::try_from(value).is_ok(),
        4 => i32::try_from(value).is_ok(),
        8 => true,
        _ => false,
    }
}

/// Whether `value` is representable in an unsigned field of `width` bytes.
pub fn uint_fits(value: u64, width: usize) -> bool {
    match width {
        1 => u8::try_from(value).is_ok(),
        2 => u16::try_from(value).is_ok(),
        4 => u32::try_from(value).is_ok(),
        8 => true,
        _ => false,
    }
}

pub(crate) fn bit_mask(bit_count: u32) -> u64 {
    if bit_count >= 64 {
        u64::MAX
    } else {
        (1_u64 << bit_count) - 1
    }
}

fn check_width(width: usize) -> Result<usize> {
    match width {
        1 | 2 | 4 | 8 => Ok(width),
        _ => Err(ErrorKind::InvalidDataSize.into()),
    }
}

fn check_bits(width: usize, bit_offset: u32, bit_count: u32) -> Result<()> {
    let width = check_width(width)?;
    if bit_count == 0 || bit_offset as u64 + bit_count as u64 > width as u64 * 8 {
        return Err(ErrorKind::BadBitvalInSchema.into());
    }
    Ok(())
}

fn array8(bytes: &[u8]) -> [u8; 8] {
    let mut out = [0; 8];
    out.copy_from_slice(&bytes[..8]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_reads_sign_extend() {
        let mut buf = [0_u8; 8];
        write_int(&mut buf, 1, -2).unwrap();
        assert_eq!(read_int(&buf, 1).unwrap(), -2);
        assert_eq!(read_uint(&buf, 1).unwrap(), 0xfe);

        write_int(&mut buf, 4, i32::MIN as i64).unwrap();
        assert_eq!(read_int(&buf, 4).unwrap(), i32::MIN as i64);
    }

    #[test]
    fn writes_reject_values_that_do_not_fit() {
        let mut buf = [0_u8; 8];
        let err = write_int(&mut buf, 1, 128).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        let err = write_uint(&mut buf, 2, 65536).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        write_uint(&mut buf, 2, 65535).unwrap();
        assert_eq!(read_uint(&buf, 2).unwrap(), 65535);
    }

    #[test]
    fn odd_widths_are_rejected() {
        let mut buf = [0_u8; 8];
        assert_eq!(
            read_int(&buf, 3).unwrap_err().kind(),
            ErrorKind::InvalidDataSize
        );
        assert_eq!(
            write_uint(&mut buf, 0, 0).unwrap_err().kind(),
            ErrorKind::InvalidDataSize
        );
        assert_eq!(
            write_float(&mut buf, 2, 1.0).unwrap_err().kind(),
            ErrorKind::InvalidDataSize
        );
    }

    #[test]
    fn short_buffers_do_not_panic() {
        let buf = [0_u8; 2];
        assert_eq!(
            read_uint(&buf, 4).unwrap_err().kind(),
            ErrorKind::InternalError
        );
    }

    #[test]
    fn floats() {
        let mut buf = [0_u8; 8];
        write_float(&mut buf, 4, 2.75).unwrap();
        assert_eq!(read_float(&buf, 4).unwrap(), 2.75);
        write_float(&mut buf, 8, -0.5).unwrap();
        assert_eq!(read_float(&buf, 8).unwrap(), -0.5);
    }

    #[test]
    fn bitfields() {
        let mut buf = [0_u8; 2];
        write_bitfield(&mut buf, 2, 3, 4, 0b1011).unwrap();
        write_bitfield(&mut buf, 2, 0, 3, 0b101).unwrap();
        assert_eq!(read_uint(&buf, 2).unwrap(), 0b101_1101);
        assert_eq!(read_bitfield(&buf, 2, 3, 4).unwrap(), 0b1011);
        assert_eq!(read_bitfield(&buf, 2, 0, 3).unwrap(), 0b101);

        let err = write_bitfield(&mut buf, 2, 0, 3, 8).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        let err = read_bitfield(&buf, 2, 14, 4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadBitvalInSchema);
    }

    #[test]
    fn full_width_bitfield() {
        let mut buf = [0_u8; 8];
        write_bitfield(&mut buf, 8, 0, 64, u64::MAX).unwrap();
        assert_eq!(read_bitfield(&buf, 8, 0, 64).unwrap(), u64::MAX);
    }
}
