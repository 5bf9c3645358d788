//! Memory access helpers and the byte-backed reference address space.

/// Value-level read/write helpers with endianness and range checks.
pub mod access;
/// Byte-vector backed [`AddressSpace`](crate::AddressSpace) implementation.
pub mod map;

pub use access::{
    assemble, big_endian_order, read_value, sign_extend, split, validate_address, width_mask,
    write_value, MAX_VALUE_BYTES,
};
pub use map::{MappedSpace, MemoryMap};
