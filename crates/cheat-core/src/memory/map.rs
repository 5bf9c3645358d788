//! In-crate reference [`AddressSpace`] backed by plain byte vectors.

use crate::api::{AddressSpace, Endianness, Location, SpaceInfo};
use crate::fault::AccessError;

/// One mapped space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedSpace {
    /// Location served by this space.
    pub location: Location,
    /// Reported metadata.
    pub info: SpaceInfo,
    /// Backing bytes, indexed by byte address.
    pub bytes: Vec<u8>,
    /// Cleared to model absent memory (unplugged EEPROM and the like).
    pub present: bool,
}

/// Collection of byte-backed spaces plus a simple key state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryMap {
    spaces: Vec<MappedSpace>,
    held_keys: Vec<u32>,
    fresh_keys: Vec<u32>,
}

impl MemoryMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a zero-filled space of `size` bytes.
    ///
    /// The reported address mask is the next power of two minus one, so the
    /// tail between `size` and the mask is addressable but unbacked.
    #[must_use]
    pub fn with_space(mut self, location: Location, size: usize, endianness: Endianness) -> Self {
        self.add_space(location, size, endianness);
        self
    }

    /// Adds (or replaces) a zero-filled space of `size` bytes.
    pub fn add_space(&mut self, location: Location, size: usize, endianness: Endianness) {
        let mask = u32::try_from(size.max(1).next_power_of_two() - 1).unwrap_or(u32::MAX);
        let space = MappedSpace {
            location,
            info: SpaceInfo::bytes(mask, endianness),
            bytes: vec![0; size],
            present: true,
        };
        self.spaces.retain(|s| s.location != location);
        self.spaces.push(space);
    }

    /// Looks up a space.
    #[must_use]
    pub fn space(&self, location: Location) -> Option<&MappedSpace> {
        self.spaces.iter().find(|s| s.location == location)
    }

    /// Looks up a space for mutation.
    pub fn space_mut(&mut self, location: Location) -> Option<&mut MappedSpace> {
        self.spaces.iter_mut().find(|s| s.location == location)
    }

    /// Marks a space present or absent.
    pub fn set_present(&mut self, location: Location, present: bool) {
        if let Some(space) = self.space_mut(location) {
            space.present = present;
        }
    }

    /// Reads one byte without any access checks.
    #[must_use]
    pub fn peek(&self, location: Location, address: u32) -> Option<u8> {
        let space = self.space(location)?;
        space.bytes.get(usize::try_from(address).ok()?).copied()
    }

    /// Stores bytes starting at `address` without any access checks.
    ///
    /// # Errors
    ///
    /// Returns an [`AccessError`] when the location is unknown or the bytes do
    /// not fit in the backing store.
    pub fn poke(&mut self, location: Location, address: u32, bytes: &[u8]) -> Result<(), AccessError> {
        let space = self
            .space_mut(location)
            .ok_or(AccessError::UnknownLocation(location))?;
        let range = backing_range(space, address, bytes.len())?;
        space.bytes[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Registers a key press for the current frame.
    pub fn press_key(&mut self, key: u32) {
        if !self.held_keys.contains(&key) {
            self.held_keys.push(key);
            self.fresh_keys.push(key);
        }
    }

    /// Releases a held key.
    pub fn release_key(&mut self, key: u32) {
        self.held_keys.retain(|k| *k != key);
        self.fresh_keys.retain(|k| *k != key);
    }

    /// Ends the frame: fresh presses become plain held keys.
    pub fn end_frame(&mut self) {
        self.fresh_keys.clear();
    }
}

fn backing_range(
    space: &MappedSpace,
    address: u32,
    len: usize,
) -> Result<std::ops::Range<usize>, AccessError> {
    let out_of_range = AccessError::OutOfRange {
        location: space.location,
        address,
    };
    let start = usize::try_from(address).map_err(|_| out_of_range)?;
    let end = start.checked_add(len).ok_or(out_of_range)?;
    if end > space.bytes.len() {
        return Err(out_of_range);
    }
    Ok(start..end)
}

fn present_space(spaces: &mut [MappedSpace], location: Location) -> Result<&mut MappedSpace, AccessError> {
    let space = spaces
        .iter_mut()
        .find(|s| s.location == location)
        .ok_or(AccessError::UnknownLocation(location))?;
    if space.present {
        Ok(space)
    } else {
        Err(AccessError::NotPresent(location))
    }
}

impl AddressSpace for MemoryMap {
    fn info(&self, location: Location) -> Option<SpaceInfo> {
        self.space(location).map(|s| s.info)
    }

    fn read_bytes(
        &mut self,
        location: Location,
        address: u32,
        buf: &mut [u8],
    ) -> Result<(), AccessError> {
        let space = present_space(&mut self.spaces, location)?;
        let range = backing_range(space, address, buf.len())?;
        buf.copy_from_slice(&space.bytes[range]);
        Ok(())
    }

    fn write_bytes(
        &mut self,
        location: Location,
        address: u32,
        bytes: &[u8],
    ) -> Result<(), AccessError> {
        let space = present_space(&mut self.spaces, location)?;
        let range = backing_range(space, address, bytes.len())?;
        space.bytes[range].copy_from_slice(bytes);
        Ok(())
    }

    fn key_pressed(&self, key: u32, repeat: bool) -> bool {
        if repeat {
            self.held_keys.contains(&key)
        } else {
            self.fresh_keys.contains(&key)
        }
    }
}
