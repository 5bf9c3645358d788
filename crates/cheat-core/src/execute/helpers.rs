use crate::api::{variable_slot, AddressSpace, Location, VARIABLE_SLOT_COUNT};
use crate::decoder::ExecutableView;
use crate::encoding::{AddressRead, BackupKind, CodeType, DataRead, LinkLevel, WriteMode};
use crate::fault::EngineError;
use crate::memory::{read_value, width_mask, write_value};
use crate::model::{Backup, BackupValues};
use crate::word::Field;

/// Variable slot array shared by every entry.
pub type Variables = [u32; VARIABLE_SLOT_COUNT];

/// Resolved operand location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Memory at a byte address.
    Memory {
        /// Space.
        location: Location,
        /// Byte address.
        address: u32,
    },
    /// A variable slot.
    Variable(usize),
}

impl Target {
    /// Target `index` steps of `step` bytes (or slots) after `self`.
    pub fn offset(self, index: u32, step: u32) -> Option<Self> {
        let delta = index.checked_mul(step)?;
        match self {
            Self::Memory { location, address } => Some(Self::Memory {
                location,
                address: address.checked_add(delta)?,
            }),
            Self::Variable(slot) => {
                let slot = slot.checked_add(usize::try_from(delta).ok()?)?;
                (slot < VARIABLE_SLOT_COUNT).then_some(Self::Variable(slot))
            }
        }
    }
}

/// Resolves the address operand, without pointer indirection.
pub fn resolve_target(view: &ExecutableView, variables: &Variables) -> Option<Target> {
    match view.word.address_read()? {
        AddressRead::Literal => Some(Target::Memory {
            location: view.location,
            address: view.address,
        }),
        AddressRead::IndirectVariable => {
            let slot = variable_slot(view.address)?;
            Some(Target::Memory {
                location: view.location,
                address: variables[slot],
            })
        }
        AddressRead::VariableValue => variable_slot(view.address).map(Target::Variable),
    }
}

/// Resolves the operand an opcode stores to, following the pointer of
/// indexed writes.
pub fn primary_target<S: AddressSpace + ?Sized>(
    view: &ExecutableView,
    variables: &Variables,
    host: &mut S,
) -> Option<Target> {
    let base = resolve_target(view, variables)?;
    if view.op() != Some(CodeType::IndexedWrite) {
        return Some(base);
    }
    let pointer = read_target(host, variables, base, view.word.index_bytes(), view.word.swapped())?;
    #[allow(clippy::cast_possible_wrap)]
    let offset = view.extend_data as i32;
    match base {
        Target::Memory { location, .. } => Some(Target::Memory {
            location,
            address: pointer.wrapping_add_signed(offset),
        }),
        Target::Variable(_) => None,
    }
}

/// Reads a target.
pub fn read_target<S: AddressSpace + ?Sized>(
    host: &mut S,
    variables: &Variables,
    target: Target,
    bytes: u32,
    swap: bool,
) -> Option<u32> {
    match target {
        Target::Memory { location, address } => {
            match read_value(host, location, address, bytes, swap) {
                Ok(value) => Some(value),
                Err(error) => {
                    log::trace!("read skipped: {error}");
                    None
                }
            }
        }
        Target::Variable(slot) => variables.get(slot).map(|v| v & width_mask(bytes)),
    }
}

/// Writes a target; returns false when the write did not happen.
pub fn write_target<S: AddressSpace + ?Sized>(
    host: &mut S,
    variables: &mut Variables,
    target: Target,
    bytes: u32,
    swap: bool,
    value: u32,
) -> bool {
    match target {
        Target::Memory { location, address } => {
            match write_value(host, location, address, bytes, swap, value) {
                Ok(()) => true,
                Err(error) => {
                    log::trace!("write skipped: {error}");
                    false
                }
            }
        }
        Target::Variable(slot) => variables.get_mut(slot).is_some_and(|v| {
            *v = value & width_mask(bytes);
            true
        }),
    }
}

/// Data operand, honoring copy links and variable reads.
pub fn operand_data(view: &ExecutableView, variables: &Variables, copied: Option<u32>) -> Option<u32> {
    if view.word.link() == LinkLevel::CopyLink {
        if let Some(value) = copied {
            return Some(value);
        }
    }
    match view.word.data_read() {
        DataRead::Literal => Some(view.data),
        DataRead::Variable => variable_slot(view.data).map(|slot| variables[slot]),
    }
}

/// Combines the old value with `data` under `mode`.
#[must_use]
pub const fn apply_write_mode(mode: WriteMode, old: u32, data: u32, mask: u32) -> u32 {
    match mode {
        WriteMode::Merge => (old & !mask) | (data & mask),
        WriteMode::SetBits => old | data,
        WriteMode::ClearBits => old & !data,
    }
}

/// Packs `value` as binary-coded decimal.
#[must_use]
pub const fn to_bcd(mut value: u32) -> u32 {
    let mut result = 0u32;
    let mut shift = 0;
    while value > 0 && shift < 32 {
        result |= (value % 10) << shift;
        value /= 10;
        shift += 4;
    }
    result
}

/// Value written for the entry's user choice, after range and flag handling.
#[must_use]
pub fn user_select_value(user_value: u32, view: &ExecutableView) -> u32 {
    let (min, max) = view.user_range();
    let mut value = user_value.clamp(min, max.max(min));
    if view.word.is_set(Field::ValueSelectBcd) {
        value = to_bcd(value);
    }
    if view.word.is_set(Field::ValueSelectNegative) {
        value = value.wrapping_neg();
    }
    value & width_mask(view.bytes())
}

/// `(count, step)` of memory touched by an opcode, beyond the first operand.
pub fn target_span(view: &ExecutableView, limit: usize) -> (u32, u32) {
    let Some(code) = view.op() else {
        return (0, 0);
    };
    match code.backup_kind() {
        BackupKind::None => (0, 0),
        BackupKind::Single => (1, 0),
        BackupKind::Paired => (2, view.bytes()),
        BackupKind::Repeated => {
            let (count, stride) = view.repeat_shape();
            let limit = u32::try_from(limit).unwrap_or(u32::MAX);
            (count.min(limit), stride)
        }
    }
}

/// Reads the values a deactivation may later restore, with the address
/// they came from.
///
/// Unreadable memory yields no backup rather than an error.
///
/// # Errors
///
/// Returns [`EngineError::Allocation`] when a repeat backup cannot be
/// allocated.
pub fn capture_backup<S: AddressSpace + ?Sized>(
    view: &ExecutableView,
    variables: &Variables,
    host: &mut S,
    limit: usize,
) -> Result<Option<Backup>, EngineError> {
    let Some(code) = view.op() else {
        return Ok(None);
    };
    let (count, step) = target_span(view, limit);
    if count == 0 {
        return Ok(None);
    }
    let Some(base @ Target::Memory { location, address }) = primary_target(view, variables, host)
    else {
        return Ok(None);
    };

    let len = usize::try_from(count).unwrap_or(usize::MAX);
    let mut values = Vec::new();
    values
        .try_reserve_exact(len)
        .map_err(|_| EngineError::Allocation { requested: len })?;
    for index in 0..count {
        let value = base
            .offset(index, step)
            .and_then(|t| read_target(host, variables, t, view.bytes(), view.word.swapped()));
        match value {
            Some(value) => values.push(value),
            None => return Ok(None),
        }
    }

    let values = match (code.backup_kind(), values.as_slice()) {
        (BackupKind::Single, [value]) => BackupValues::Single(*value),
        (BackupKind::Paired, [first, second]) => BackupValues::Paired([*first, *second]),
        (BackupKind::Repeated, _) => BackupValues::Repeated(values.into_boxed_slice()),
        _ => return Ok(None),
    };
    Ok(Some(Backup {
        location,
        address,
        values,
    }))
}

/// Writes a backup back to the addresses it was captured from.
pub fn restore_backup<S: AddressSpace + ?Sized>(
    view: &ExecutableView,
    variables: &mut Variables,
    host: &mut S,
    backup: Option<&Backup>,
) {
    let Some(backup) = backup else {
        return;
    };
    let (_, step) = target_span(view, usize::MAX);
    let base = Target::Memory {
        location: backup.location,
        address: backup.address,
    };
    for (index, value) in (0u32..).zip(backup.values()) {
        if let Some(target) = base.offset(index, step) {
            write_target(host, variables, target, view.bytes(), view.word.swapped(), *value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        apply_write_mode, capture_backup, operand_data, primary_target, restore_backup, to_bcd,
        user_select_value, Target, Variables,
    };
    use crate::api::{Endianness, Location};
    use crate::encoding::{AddressRead, CodeType, LinkLevel, WriteMode};
    use crate::memory::MemoryMap;
    use crate::model::{BackupValues, CheatAction};
    use crate::word::{Field, InstructionWord};

    fn host() -> MemoryMap {
        let mut map = MemoryMap::new().with_space(Location::cpu(0), 0x100, Endianness::Little);
        map.poke(Location::cpu(0), 0x10, &[1, 2, 3, 4, 5, 6, 7, 8]).expect("poke");
        map
    }

    #[test]
    fn write_modes() {
        assert_eq!(apply_write_mode(WriteMode::Merge, 0xAB, 0x0F, 0x0F), 0xAF);
        assert_eq!(apply_write_mode(WriteMode::SetBits, 0x10, 0x01, 0), 0x11);
        assert_eq!(apply_write_mode(WriteMode::ClearBits, 0x11, 0x01, 0), 0x10);
    }

    #[test]
    fn bcd_packing() {
        assert_eq!(to_bcd(0), 0);
        assert_eq!(to_bcd(99), 0x99);
        assert_eq!(to_bcd(1234), 0x1234);
    }

    #[test]
    fn user_value_is_clamped_then_encoded() {
        let word = InstructionWord::new(CodeType::VariableWrite)
            .with_flag(Field::ValueSelectMinimumOne, true)
            .with_flag(Field::ValueSelectBcd, true);
        let view = CheatAction::new(word, Location::cpu(0), 0, 0)
            .with_extend(0x0000_0063)
            .view();
        assert_eq!(user_select_value(0, &view), 0x01);
        assert_eq!(user_select_value(150, &view), 0x99);
        let negative = CheatAction::new(
            InstructionWord::new(CodeType::VariableWrite).with_flag(Field::ValueSelectNegative, true),
            Location::cpu(0),
            0,
            0,
        )
        .with_extend(10)
        .view();
        assert_eq!(user_select_value(1, &negative), 0xFF);
    }

    #[test]
    fn copy_links_take_the_previous_value() {
        let word = InstructionWord::new(CodeType::Write).with_link(LinkLevel::CopyLink);
        let view = CheatAction::new(word, Location::cpu(0), 0, 5).view();
        let vars: Variables = [0; 8];
        assert_eq!(operand_data(&view, &vars, Some(9)), Some(9));
        assert_eq!(operand_data(&view, &vars, None), Some(5));
        let var_word = InstructionWord::new(CodeType::Write).with(Field::DataRead, 1);
        let view = CheatAction::new(var_word, Location::cpu(0), 0, 2).view();
        let vars: Variables = [0, 0, 77, 0, 0, 0, 0, 0];
        assert_eq!(operand_data(&view, &vars, None), Some(77));
    }

    #[test]
    fn indexed_targets_follow_the_pointer() {
        let mut host = host();
        let word = InstructionWord::new(CodeType::IndexedWrite);
        let view = CheatAction::new(word, Location::cpu(0), 0x10, 0)
            .with_extend(0xFFFF_FFFF)
            .view();
        let target = primary_target(&view, &[0; 8], &mut host);
        assert_eq!(
            target,
            Some(Target::Memory {
                location: Location::cpu(0),
                address: 0
            })
        );
    }

    #[test]
    fn indirect_targets_use_variables() {
        let mut host = host();
        let word =
            InstructionWord::new(CodeType::Write).with_address_read(AddressRead::IndirectVariable);
        let view = CheatAction::new(word, Location::cpu(0), 3, 0).view();
        let vars: Variables = [0, 0, 0, 0x12, 0, 0, 0, 0];
        assert_eq!(
            primary_target(&view, &vars, &mut host),
            Some(Target::Memory {
                location: Location::cpu(0),
                address: 0x12
            })
        );
    }

    #[test]
    fn repeat_backups_capture_and_restore_each_step() {
        let mut host = host();
        let word = InstructionWord::new(CodeType::RepeatWrite);
        let view = CheatAction::new(word, Location::cpu(0), 0x10, 0)
            .with_extend(0x0003_0002)
            .view();
        let mut vars: Variables = [0; 8];
        let backup = capture_backup(&view, &vars, &mut host, 16)
            .expect("alloc")
            .expect("readable");
        assert_eq!(backup.address, 0x10);
        assert_eq!(backup.values, BackupValues::Repeated(vec![1, 3, 5].into_boxed_slice()));

        host.poke(Location::cpu(0), 0x10, &[0; 6]).expect("poke");
        restore_backup(&view, &mut vars, &mut host, Some(&backup));
        assert_eq!(host.peek(Location::cpu(0), 0x12), Some(3));
        assert_eq!(host.peek(Location::cpu(0), 0x13), Some(0));

        let capped = capture_backup(&view, &vars, &mut host, 2)
            .expect("alloc")
            .expect("readable");
        assert_eq!(capped.values().len(), 2);
    }

    #[test]
    fn unreadable_memory_leaves_backup_invalid() {
        let mut host = host();
        let view = CheatAction::new(
            InstructionWord::new(CodeType::PairedWrite),
            Location::cpu(0),
            0xFF,
            0,
        )
        .view();
        let backup = capture_backup(&view, &[0; 8], &mut host, 16).expect("alloc");
        assert_eq!(backup, None);
    }
}
