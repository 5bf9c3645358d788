use crate::api::{Endianness, Location};
use crate::fault::EngineError;

/// The five per-offset buffers of an enabled region.
///
/// They are allocated and freed together; a region either owns all five at
/// the region length or none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionBuffers {
    /// Bytes at session start.
    pub first: Vec<u8>,
    /// Bytes at the previous comparison.
    pub last: Vec<u8>,
    /// Per-offset validity.
    pub status: Vec<u8>,
    /// `last` saved by the most recent backup.
    pub backup_last: Vec<u8>,
    /// `status` saved by the most recent backup.
    pub backup_status: Vec<u8>,
}

fn zeroed(len: usize) -> Result<Vec<u8>, EngineError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| EngineError::Allocation { requested: len })?;
    buf.resize(len, 0);
    Ok(buf)
}

impl RegionBuffers {
    /// Allocates zeroed buffers of `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Allocation`] when any buffer cannot be
    /// allocated; nothing is kept in that case.
    pub fn allocate(len: usize) -> Result<Self, EngineError> {
        Ok(Self {
            first: zeroed(len)?,
            last: zeroed(len)?,
            status: zeroed(len)?,
            backup_last: zeroed(len)?,
            backup_status: zeroed(len)?,
        })
    }

    /// Buffer length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.status.len()
    }

    /// True for a zero-length region.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_empty()
    }
}

/// An address window of one space, snapshotted for searching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRegion {
    /// Space.
    pub location: Location,
    /// First byte address.
    pub address: u32,
    /// Length in bytes.
    pub length: u32,
    /// Display name.
    pub name: String,
    /// Byte order used to assemble multi-byte values.
    pub endianness: Endianness,
    pub(crate) enabled: bool,
    pub(crate) buffers: Option<RegionBuffers>,
    pub(crate) results: usize,
    pub(crate) backup_results: usize,
}

impl SearchRegion {
    /// Enabled region without buffers.
    #[must_use]
    pub fn new(location: Location, address: u32, length: u32, name: impl Into<String>) -> Self {
        Self {
            location,
            address,
            length,
            name: name.into(),
            endianness: Endianness::Little,
            enabled: true,
            buffers: None,
            results: 0,
            backup_results: 0,
        }
    }

    /// Sets the byte order.
    #[must_use]
    pub const fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    /// True when the region takes part in searches.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Buffers, present only while enabled and allocated.
    #[must_use]
    pub const fn buffers(&self) -> Option<&RegionBuffers> {
        self.buffers.as_ref()
    }

    /// Valid offsets after the last init or compare.
    #[must_use]
    pub const fn results(&self) -> usize {
        self.results
    }

    /// Length as a buffer size.
    #[must_use]
    pub fn len(&self) -> usize {
        usize::try_from(self.length).unwrap_or(usize::MAX)
    }

    /// True for a zero-length region.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Byte address of `offset`.
    #[must_use]
    pub fn address_of(&self, offset: usize) -> u32 {
        u32::try_from(offset).map_or(u32::MAX, |offset| self.address.wrapping_add(offset))
    }

    pub(crate) fn release(&mut self) {
        self.buffers = None;
        self.results = 0;
        self.backup_results = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::{RegionBuffers, SearchRegion};
    use crate::api::Location;

    #[test]
    fn buffers_share_one_length() {
        let buffers = RegionBuffers::allocate(12).expect("alloc");
        assert_eq!(buffers.len(), 12);
        assert_eq!(buffers.first.len(), 12);
        assert_eq!(buffers.backup_status.len(), 12);
        assert!(buffers.status.iter().all(|b| *b == 0));
    }

    #[test]
    fn release_drops_buffers_and_counts() {
        let mut region = SearchRegion::new(Location::cpu(0), 0x100, 4, "ram");
        region.buffers = Some(RegionBuffers::allocate(4).expect("alloc"));
        region.results = 4;
        region.release();
        assert!(region.buffers().is_none());
        assert_eq!(region.results(), 0);
        assert_eq!(region.address_of(3), 0x103);
    }
}
