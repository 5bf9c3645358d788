//! Value-level access helpers over an [`AddressSpace`].
//!
//! Multi-byte values are assembled in the space's native order, optionally
//! byte-swapped. Addresses are checked against the space's mask before the
//! host is asked to touch memory.

use crate::api::{AddressSpace, Endianness, Location, SpaceInfo};
use crate::fault::AccessError;

/// Widest operand handled by the engine, in bytes.
pub const MAX_VALUE_BYTES: u32 = 4;

/// Mask covering an operand of `bytes` bytes (clamped to 1..=4).
#[must_use]
pub const fn width_mask(bytes: u32) -> u32 {
    match bytes {
        0 | 1 => 0xFF,
        2 => 0xFFFF,
        3 => 0x00FF_FFFF,
        _ => u32::MAX,
    }
}

/// Sign-extends the low `bytes` bytes of `value`.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub const fn sign_extend(value: u32, bytes: u32) -> i64 {
    let bits = clamp_bytes(bytes) * 8;
    let shift = 32 - bits;
    (((value << shift) as i32) >> shift) as i64
}

const fn clamp_bytes(bytes: u32) -> u32 {
    if bytes == 0 {
        1
    } else if bytes > MAX_VALUE_BYTES {
        MAX_VALUE_BYTES
    } else {
        bytes
    }
}

/// Checks that every byte of an operand lies inside the space.
///
/// # Errors
///
/// Returns [`AccessError::OutOfRange`] when the first or last byte is beyond
/// the space's address mask.
pub const fn validate_address(
    info: &SpaceInfo,
    location: Location,
    address: u32,
    bytes: u32,
) -> Result<(), AccessError> {
    let Some(last) = address.checked_add(clamp_bytes(bytes) - 1) else {
        return Err(AccessError::OutOfRange { location, address });
    };
    if info.contains(address) && info.contains(last) {
        Ok(())
    } else {
        Err(AccessError::OutOfRange { location, address })
    }
}

/// Returns true when values must be assembled most significant byte first.
#[must_use]
pub fn big_endian_order(info: &SpaceInfo, swap: bool) -> bool {
    (info.endianness == Endianness::Big) ^ swap
}

/// Assembles a value from raw bytes in the given order.
#[must_use]
pub fn assemble(bytes: &[u8], big_endian: bool) -> u32 {
    let fold = |acc: u32, byte: &u8| (acc << 8) | u32::from(*byte);
    if big_endian {
        bytes.iter().fold(0, fold)
    } else {
        bytes.iter().rev().fold(0, fold)
    }
}

/// Splits `value` into `out.len()` bytes in the given order.
#[allow(clippy::cast_possible_truncation)]
pub fn split(value: u32, big_endian: bool, out: &mut [u8]) {
    let len = out.len();
    for (i, byte) in out.iter_mut().enumerate() {
        let shift = if big_endian { len - 1 - i } else { i } * 8;
        *byte = (value >> shift) as u8;
    }
}

/// Reads a `bytes`-wide value.
///
/// # Errors
///
/// Returns an [`AccessError`] when the location is unknown, the address is
/// out of range, or the host rejects the read.
pub fn read_value<S: AddressSpace + ?Sized>(
    space: &mut S,
    location: Location,
    address: u32,
    bytes: u32,
    swap: bool,
) -> Result<u32, AccessError> {
    let info = space
        .info(location)
        .ok_or(AccessError::UnknownLocation(location))?;
    let bytes = clamp_bytes(bytes);
    validate_address(&info, location, address, bytes)?;
    let mut buf = [0u8; MAX_VALUE_BYTES as usize];
    let buf = &mut buf[..bytes as usize];
    space.read_bytes(location, address, buf)?;
    Ok(assemble(buf, big_endian_order(&info, swap)))
}

/// Writes the low `bytes` bytes of `value`.
///
/// # Errors
///
/// Returns an [`AccessError`] when the location is unknown, the address is
/// out of range, or the host rejects the write.
pub fn write_value<S: AddressSpace + ?Sized>(
    space: &mut S,
    location: Location,
    address: u32,
    bytes: u32,
    swap: bool,
    value: u32,
) -> Result<(), AccessError> {
    let info = space
        .info(location)
        .ok_or(AccessError::UnknownLocation(location))?;
    let bytes = clamp_bytes(bytes);
    validate_address(&info, location, address, bytes)?;
    let mut buf = [0u8; MAX_VALUE_BYTES as usize];
    let buf = &mut buf[..bytes as usize];
    split(value, big_endian_order(&info, swap), buf);
    space.write_bytes(location, address, buf)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{assemble, sign_extend, split, validate_address, width_mask};
    use crate::api::{Endianness, Location, SpaceInfo};
    use crate::fault::AccessError;

    #[rstest]
    #[case(1, 0xFF)]
    #[case(2, 0xFFFF)]
    #[case(3, 0x00FF_FFFF)]
    #[case(4, u32::MAX)]
    fn width_masks(#[case] bytes: u32, #[case] mask: u32) {
        assert_eq!(width_mask(bytes), mask);
    }

    #[rstest]
    #[case(0x80, 1, -128)]
    #[case(0x7F, 1, 127)]
    #[case(0xFFFE, 2, -2)]
    #[case(0x80_0000, 3, -0x80_0000)]
    #[case(0xFFFF_FFFF, 4, -1)]
    fn sign_extension(#[case] value: u32, #[case] bytes: u32, #[case] expected: i64) {
        assert_eq!(sign_extend(value, bytes), expected);
    }

    #[test]
    fn byte_order_assembly() {
        assert_eq!(assemble(&[0x12, 0x34], true), 0x1234);
        assert_eq!(assemble(&[0x12, 0x34], false), 0x3412);
        let mut out = [0u8; 3];
        split(0x00AB_CDEF, false, &mut out);
        assert_eq!(out, [0xEF, 0xCD, 0xAB]);
        split(0x00AB_CDEF, true, &mut out);
        assert_eq!(out, [0xAB, 0xCD, 0xEF]);
    }

    #[test]
    fn last_byte_must_fit() {
        let info = SpaceInfo::bytes(0xFF, Endianness::Little);
        let location = Location::cpu(0);
        assert!(validate_address(&info, location, 0xFE, 2).is_ok());
        assert_eq!(
            validate_address(&info, location, 0xFF, 2),
            Err(AccessError::OutOfRange {
                location,
                address: 0xFF
            })
        );
        assert!(validate_address(&info, location, u32::MAX, 2).is_err());
    }
}
