//! Memory search: snapshot regions, narrow a per-offset validity mask under a
//! comparison, and undo the last narrowing.

mod compare;
mod region;

pub use compare::{bit_keep_mask, compare_values, Comparison, Operand, SearchWidth};
pub use region::{RegionBuffers, SearchRegion};

use crate::api::{AddressSpace, Endianness, EntryId, Location, SpaceInfo, WatchInfo};
use crate::encoding::CodeType;
use crate::fault::EngineError;
use crate::memory::{assemble, width_mask};
use crate::model::{CheatAction, CheatEntry};
use crate::word::{Field, InstructionWord};

/// Status byte of a valid offset in value mode.
pub const STATUS_VALID: u8 = 0xFF;

/// Default cap on the length of a single region.
pub const DEFAULT_MAX_REGION_LENGTH: u32 = 0x0100_0000;

/// Comparison applied by [`SearchSession::compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SearchConfig {
    /// Left operand.
    pub lhs: Operand,
    /// Right operand.
    pub rhs: Operand,
    /// Element width.
    pub width: SearchWidth,
    /// Compare sign-extended values.
    pub signed: bool,
    /// Assemble values in the opposite byte order.
    pub swap: bool,
    /// Operator.
    pub op: Comparison,
    /// Literal for [`Operand::Value`] and the increment of
    /// [`Comparison::IncreasedBy`].
    pub value: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            lhs: Operand::Current,
            rhs: Operand::Value,
            width: SearchWidth::Bits8,
            signed: false,
            swap: false,
            op: Comparison::Equal,
            value: 0,
        }
    }
}

/// Size limits for region buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SearchLimits {
    /// Longest region accepted by [`SearchSession::set_regions`].
    pub max_region_length: u32,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_region_length: DEFAULT_MAX_REGION_LENGTH,
        }
    }
}

/// Outcome of [`SearchSession::restore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestoreOutcome {
    /// The last backup was put back.
    Restored,
    /// No backup was pending.
    NothingToRestore,
}

/// One surviving offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SearchResult {
    /// Index of the region in the session.
    pub region: usize,
    /// Space of the region.
    pub location: Location,
    /// Offset inside the region.
    pub offset: usize,
    /// Byte address.
    pub address: u32,
    /// Value at the last comparison.
    pub current: u32,
    /// Value before the last comparison, while an undo is pending.
    pub previous: Option<u32>,
    /// Value at session start.
    pub first: u32,
    /// Status byte; per-bit validity in bit mode.
    pub status: u8,
}

/// Ordered regions under one comparison configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSession {
    /// Display name.
    pub name: String,
    /// Comparison configuration.
    pub config: SearchConfig,
    /// Buffer size limits.
    pub limits: SearchLimits,
    regions: Vec<SearchRegion>,
    results: usize,
    backup_results: usize,
    backup_valid: bool,
}

impl SearchSession {
    /// Empty session.
    #[must_use]
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Session with regions covering a whole space in chunks of at most
    /// `max_len` bytes.
    #[must_use]
    pub fn for_space(location: Location, info: &SpaceInfo, max_len: u32) -> Self {
        let bytes = (u64::from(info.address_mask) + 1) << info.address_shift;
        let chunk = u64::from(max_len.max(1));
        let mut regions = Vec::new();
        let mut start = 0u64;
        while start < bytes {
            let len = chunk.min(bytes - start);
            let (Ok(address), Ok(length)) = (u32::try_from(start), u32::try_from(len)) else {
                break;
            };
            let name = format!("{location} {address:08X}");
            regions.push(
                SearchRegion::new(location, address, length, name)
                    .with_endianness(info.endianness),
            );
            start += len;
        }
        Self {
            name: location.to_string(),
            limits: SearchLimits {
                max_region_length: max_len.max(1),
            },
            regions,
            ..Self::default()
        }
    }

    /// Regions in order.
    #[must_use]
    pub fn regions(&self) -> &[SearchRegion] {
        &self.regions
    }

    /// Valid offsets across enabled regions.
    #[must_use]
    pub const fn result_count(&self) -> usize {
        self.results
    }

    /// True while [`SearchSession::restore`] has something to undo.
    #[must_use]
    pub const fn backup_valid(&self) -> bool {
        self.backup_valid
    }

    /// Replaces every region, allocating buffers for the enabled ones.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvariantViolation`] for a region longer than
    /// [`SearchLimits::max_region_length`] and [`EngineError::Allocation`]
    /// when buffers cannot be allocated. The previous regions are kept on
    /// error.
    pub fn set_regions(&mut self, mut regions: Vec<SearchRegion>) -> Result<(), EngineError> {
        if regions
            .iter()
            .any(|r| r.length > self.limits.max_region_length)
        {
            return Err(EngineError::InvariantViolation("region exceeds length limit"));
        }
        for region in &mut regions {
            region.release();
            if region.enabled {
                region.buffers = Some(RegionBuffers::allocate(region.len())?);
            }
        }
        self.regions = regions;
        self.results = 0;
        self.backup_results = 0;
        self.backup_valid = false;
        Ok(())
    }

    /// Enables or disables region `index`.
    ///
    /// Disabling frees the region's buffers; enabling allocates fresh ones,
    /// so nothing survives the transition. Either way the pending undo is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvariantViolation`] for an unknown index and
    /// [`EngineError::Allocation`] when buffers cannot be allocated; the
    /// region is left disabled in that case.
    pub fn set_region_enabled(&mut self, index: usize, enabled: bool) -> Result<(), EngineError> {
        let region = self
            .regions
            .get_mut(index)
            .ok_or(EngineError::InvariantViolation("no such search region"))?;
        if region.enabled == enabled {
            return Ok(());
        }
        region.release();
        region.enabled = false;
        self.backup_valid = false;
        if enabled {
            region.buffers = Some(RegionBuffers::allocate(region.len())?);
            region.enabled = true;
        }
        self.recount();
        Ok(())
    }

    /// Allocates missing buffers for enabled regions and frees them for
    /// disabled ones.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Allocation`]; regions allocated before the
    /// failure keep their new buffers.
    pub fn allocate(&mut self) -> Result<(), EngineError> {
        for region in &mut self.regions {
            match (region.enabled, region.buffers.is_some()) {
                (true, false) => region.buffers = Some(RegionBuffers::allocate(region.len())?),
                (false, true) => region.release(),
                _ => {}
            }
        }
        Ok(())
    }

    /// Snapshots every enabled region into `first` and `last` and marks each
    /// offset on the width grid valid.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Allocation`] when buffers cannot be allocated.
    pub fn init<S: AddressSpace + ?Sized>(&mut self, host: &mut S) -> Result<(), EngineError> {
        self.allocate()?;
        let width = self.config.width;
        for region in &mut self.regions {
            let (location, address) = (region.location, region.address);
            if let Some(info) = host.info(location) {
                region.endianness = info.endianness;
            }
            let Some(buffers) = region.buffers.as_mut() else {
                continue;
            };
            let readable = host.read_bytes(location, address, &mut buffers.last).is_ok();
            if readable {
                buffers.first.copy_from_slice(&buffers.last);
                mark_grid(&mut buffers.status, width);
            } else {
                log::debug!("search region {} unreadable", region.name);
                buffers.status.fill(0);
            }
            region.results = count_valid(&buffers.status, width);
        }
        self.backup_valid = false;
        self.recount();
        Ok(())
    }

    /// Re-snapshots `last` without touching validity.
    pub fn refresh<S: AddressSpace + ?Sized>(&mut self, host: &mut S) {
        for region in &mut self.regions {
            let (location, address) = (region.location, region.address);
            if let Some(buffers) = region.buffers.as_mut() {
                if host.read_bytes(location, address, &mut buffers.last).is_err() {
                    log::debug!("search region {} unreadable", region.name);
                }
            }
        }
    }

    /// Narrows every enabled region under the configured comparison.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Allocation`] when the live snapshot cannot be
    /// allocated.
    pub fn compare<S: AddressSpace + ?Sized>(&mut self, host: &mut S) -> Result<(), EngineError> {
        let config = self.config;
        let before = self.results;
        for region in &mut self.regions {
            let Some(buffers) = region.buffers.as_mut() else {
                continue;
            };
            let mut current = Vec::new();
            current
                .try_reserve_exact(buffers.len())
                .map_err(|_| EngineError::Allocation {
                    requested: buffers.len(),
                })?;
            current.resize(buffers.len(), 0);
            if host.read_bytes(region.location, region.address, &mut current).is_err() {
                log::debug!("search region {} unreadable; left as is", region.name);
                continue;
            }
            let big_endian = (region.endianness == Endianness::Big) ^ config.swap;
            narrow(buffers, &current, &config, big_endian);
            buffers.last.copy_from_slice(&current);
            region.results = count_valid(&buffers.status, config.width);
        }
        self.recount();
        log::debug!("search narrowed {before} -> {} results", self.results);
        Ok(())
    }

    /// Saves `last`, `status` and the result counts for one level of undo.
    pub fn backup(&mut self) {
        for region in &mut self.regions {
            if let Some(buffers) = region.buffers.as_mut() {
                buffers.backup_last.copy_from_slice(&buffers.last);
                buffers.backup_status.copy_from_slice(&buffers.status);
                region.backup_results = region.results;
            }
        }
        self.backup_results = self.results;
        self.backup_valid = true;
    }

    /// Puts back the state saved by [`SearchSession::backup`].
    pub fn restore(&mut self) -> RestoreOutcome {
        if !self.backup_valid {
            return RestoreOutcome::NothingToRestore;
        }
        for region in &mut self.regions {
            if let Some(buffers) = region.buffers.as_mut() {
                buffers.last.copy_from_slice(&buffers.backup_last);
                buffers.status.copy_from_slice(&buffers.backup_status);
                region.results = region.backup_results;
            }
        }
        self.results = self.backup_results;
        self.backup_valid = false;
        RestoreOutcome::Restored
    }

    /// Surviving offsets in region and offset order.
    pub fn results(&self) -> impl Iterator<Item = SearchResult> + '_ {
        let width = self.config.width;
        let swap = self.config.swap;
        let backup_valid = self.backup_valid;
        self.regions
            .iter()
            .enumerate()
            .filter_map(|(index, region)| region.buffers().map(|b| (index, region, b)))
            .flat_map(move |(index, region, buffers)| {
                let big_endian = (region.endianness == Endianness::Big) ^ swap;
                let step = width.bytes();
                (0..buffers.len())
                    .step_by(step)
                    .filter(move |offset| {
                        offset + step <= buffers.len() && buffers.status[*offset] != 0
                    })
                    .map(move |offset| {
                        let span = offset..offset + step;
                        SearchResult {
                            region: index,
                            location: region.location,
                            offset,
                            address: region.address_of(offset),
                            current: assemble(&buffers.last[span.clone()], big_endian),
                            previous: backup_valid
                                .then(|| assemble(&buffers.backup_last[span.clone()], big_endian)),
                            first: assemble(&buffers.first[span], big_endian),
                            status: buffers.status[offset],
                        }
                    })
            })
    }

    /// First `limit` results.
    #[must_use]
    pub fn collect_results(&self, limit: usize) -> Vec<SearchResult> {
        self.results().take(limit).collect()
    }

    /// Watch over a result, at the session's element width.
    #[must_use]
    pub fn watch_result(&self, result: &SearchResult) -> WatchInfo {
        WatchInfo {
            owner: None,
            location: result.location,
            address: result.address,
            element_bytes: self.element_bytes(),
            count: 1,
            label: format!("{:08X}", result.address),
            swap: self.config.swap,
        }
    }

    /// Entry writing the result's current value back every frame.
    ///
    /// # Errors
    ///
    /// Propagates [`CheatEntry::with_actions`] errors.
    pub fn cheat_from_result(
        &self,
        result: &SearchResult,
        id: EntryId,
    ) -> Result<CheatEntry, EngineError> {
        let bytes = self.element_bytes();
        let word = InstructionWord::new(CodeType::Write)
            .with_address_bytes(bytes)
            .with(Field::Endian, u32::from(self.config.swap));
        let action = CheatAction::new(word, result.location, result.address, result.current)
            .with_extend(width_mask(bytes));
        CheatEntry::with_actions(id, format!("{:08X}", result.address), vec![action])
    }

    fn element_bytes(&self) -> u32 {
        u32::try_from(self.config.width.bytes()).unwrap_or(1)
    }

    fn recount(&mut self) {
        self.results = self
            .regions
            .iter()
            .filter(|r| r.buffers.is_some())
            .map(SearchRegion::results)
            .sum();
    }
}

/// Marks offsets on the width grid valid and clears the rest, so a later
/// change of width can only drop offsets.
fn mark_grid(status: &mut [u8], width: SearchWidth) {
    let step = width.bytes();
    let len = status.len();
    for (offset, byte) in status.iter_mut().enumerate() {
        *byte = if offset % step == 0 && offset + step <= len {
            STATUS_VALID
        } else {
            0
        };
    }
}

/// Offsets on the width grid that fit inside the buffer and are still valid.
fn count_valid(status: &[u8], width: SearchWidth) -> usize {
    let step = width.bytes();
    (0..status.len())
        .step_by(step)
        .filter(|offset| offset + step <= status.len() && status[*offset] != 0)
        .count()
}

fn narrow(buffers: &mut RegionBuffers, current: &[u8], config: &SearchConfig, big_endian: bool) {
    let step = config.width.bytes();
    let bytes = u32::try_from(step).unwrap_or(4);
    let len = buffers.len();
    let literal = config.value & width_mask(bytes);

    for offset in 0..len {
        if buffers.status[offset] == 0 {
            continue;
        }
        if offset % step != 0 || offset + step > len {
            buffers.status[offset] = 0;
            continue;
        }
        let span = offset..offset + step;
        let pick = |operand: Operand| match operand {
            Operand::Current => assemble(&current[span.clone()], big_endian),
            Operand::Previous => assemble(&buffers.last[span.clone()], big_endian),
            Operand::First => assemble(&buffers.first[span.clone()], big_endian),
            Operand::Value => literal,
        };
        let (lhs, rhs) = (pick(config.lhs), pick(config.rhs));

        if config.width.is_bit() {
            #[allow(clippy::cast_possible_truncation)]
            let keep = bit_keep_mask(config.op, lhs as u8, rhs as u8);
            buffers.status[offset] &= keep;
        } else if !compare_values(config.op, lhs, rhs, config.value, bytes, config.signed) {
            buffers.status[offset] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Comparison, Operand, RestoreOutcome, SearchConfig, SearchRegion, SearchSession, SearchWidth,
    };
    use crate::api::{AddressSpace, Endianness, Location};
    use crate::memory::MemoryMap;

    const CPU: Location = Location::cpu(0);

    fn host(bytes: &[u8]) -> MemoryMap {
        let mut map = MemoryMap::new().with_space(CPU, 0x100, Endianness::Little);
        map.poke(CPU, 0x40, bytes).expect("poke");
        map
    }

    fn session(len: u32, config: SearchConfig) -> SearchSession {
        let mut session = SearchSession::new(config);
        session
            .set_regions(vec![SearchRegion::new(CPU, 0x40, len, "ram")])
            .expect("regions");
        session
    }

    #[test]
    fn equal_to_literal() {
        let mut host = host(&[10, 20, 10, 30]);
        let mut session = session(
            4,
            SearchConfig {
                value: 10,
                ..SearchConfig::default()
            },
        );
        session.init(&mut host).expect("init");
        assert_eq!(session.result_count(), 4);
        session.compare(&mut host).expect("compare");
        let offsets: Vec<_> = session.results().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![0, 2]);
        assert_eq!(session.result_count(), 2);
    }

    #[test]
    fn previous_means_the_last_comparison() {
        let mut host = host(&[1, 1, 1, 1]);
        let mut session = session(
            4,
            SearchConfig {
                lhs: Operand::Current,
                rhs: Operand::Previous,
                op: Comparison::Greater,
                ..SearchConfig::default()
            },
        );
        session.init(&mut host).expect("init");
        host.poke(CPU, 0x40, &[2, 1, 2, 0]).expect("poke");
        session.compare(&mut host).expect("compare");
        assert_eq!(session.result_count(), 2);
        host.poke(CPU, 0x42, &[3]).expect("poke");
        session.compare(&mut host).expect("compare");
        let results = session.collect_results(10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].offset, 2);
        assert_eq!(results[0].current, 3);
        assert_eq!(results[0].first, 1);
    }

    #[test]
    fn wide_values_drop_offsets_that_do_not_fit() {
        let mut host = host(&[0x34, 0x12, 0x00, 0x00, 0x34]);
        let mut session = session(
            5,
            SearchConfig {
                width: SearchWidth::Bits16,
                value: 0x1234,
                ..SearchConfig::default()
            },
        );
        session.init(&mut host).expect("init");
        assert_eq!(session.result_count(), 2);
        session.compare(&mut host).expect("compare");
        assert_eq!(session.result_count(), 1);
        let status = &session.regions()[0].buffers().expect("buffers").status;
        assert_eq!(status, &vec![0xFF, 0, 0, 0, 0]);
    }

    #[test]
    fn narrowing_the_width_never_adds_results() {
        let mut host = host(&[1, 2, 3, 4]);
        let mut session = session(
            4,
            SearchConfig {
                width: SearchWidth::Bits16,
                ..SearchConfig::default()
            },
        );
        session.init(&mut host).expect("init");
        assert_eq!(session.result_count(), 2);
        let status = &session.regions()[0].buffers().expect("buffers").status;
        assert_eq!(status, &vec![0xFF, 0, 0xFF, 0]);

        session.config.width = SearchWidth::Bits8;
        session.config.op = Comparison::NotEqual;
        session.config.value = 0xAAAA;
        session.compare(&mut host).expect("compare");
        assert_eq!(session.result_count(), 2);
        let offsets: Vec<_> = session.results().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![0, 2]);
    }

    #[test]
    fn bit_mode_isolates_a_flag() {
        let mut host = host(&[0b0000_0001]);
        let mut session = session(
            1,
            SearchConfig {
                lhs: Operand::Current,
                rhs: Operand::Previous,
                width: SearchWidth::Bit,
                op: Comparison::NotEqual,
                ..SearchConfig::default()
            },
        );
        session.init(&mut host).expect("init");
        host.poke(CPU, 0x40, &[0b0000_0101]).expect("poke");
        session.compare(&mut host).expect("compare");
        let status = session.regions()[0].buffers().expect("buffers").status[0];
        assert_eq!(status, 0b0000_0100);
    }

    #[test]
    fn undo_restores_and_second_undo_is_a_no_op() {
        let mut host = host(&[5, 6, 5, 6]);
        let mut session = session(
            4,
            SearchConfig {
                value: 5,
                ..SearchConfig::default()
            },
        );
        session.init(&mut host).expect("init");
        session.backup();
        session.compare(&mut host).expect("compare");
        assert_eq!(session.result_count(), 2);
        assert_eq!(session.restore(), RestoreOutcome::Restored);
        assert_eq!(session.result_count(), 4);
        assert_eq!(session.restore(), RestoreOutcome::NothingToRestore);
    }

    #[test]
    fn disabling_frees_and_reenabling_starts_clean() {
        let mut host = host(&[1, 2]);
        let mut session = session(2, SearchConfig::default());
        session.init(&mut host).expect("init");
        session.backup();
        session.set_region_enabled(0, false).expect("disable");
        assert!(session.regions()[0].buffers().is_none());
        assert!(!session.backup_valid());
        session.set_region_enabled(0, true).expect("enable");
        let buffers = session.regions()[0].buffers().expect("buffers");
        assert!(buffers.status.iter().all(|b| *b == 0));
        assert_eq!(session.result_count(), 0);
        assert!(session.set_region_enabled(3, true).is_err());
    }

    #[test]
    fn oversized_regions_are_rejected() {
        let mut session = session(2, SearchConfig::default());
        session.limits.max_region_length = 4;
        let err = session.set_regions(vec![SearchRegion::new(CPU, 0, 8, "big")]);
        assert!(err.is_err());
        assert_eq!(session.regions().len(), 1);
    }

    #[test]
    fn space_is_split_into_chunks() {
        let map = MemoryMap::new().with_space(CPU, 0x300, Endianness::Big);
        let info = map.info(CPU).expect("info");
        let session = SearchSession::for_space(CPU, &info, 0x180);
        let lengths: Vec<_> = session.regions().iter().map(|r| r.length).collect();
        assert_eq!(lengths, vec![0x180, 0x180, 0x100]);
        assert_eq!(session.regions()[2].address, 0x300);
        assert_eq!(session.regions()[0].endianness, Endianness::Big);
    }

    #[test]
    fn results_become_watches_and_cheats() {
        let mut host = host(&[7]);
        let mut session = session(
            1,
            SearchConfig {
                value: 7,
                ..SearchConfig::default()
            },
        );
        session.init(&mut host).expect("init");
        session.compare(&mut host).expect("compare");
        let result = session.results().next().expect("one result");
        let watch = session.watch_result(&result);
        assert_eq!(watch.address, 0x40);
        assert_eq!(watch.element_bytes, 1);

        let entry = session.cheat_from_result(&result, 9).expect("entry");
        assert_eq!(entry.actions()[0].data, 7);
        assert_eq!(entry.actions()[0].address, 0x40);
    }
}
