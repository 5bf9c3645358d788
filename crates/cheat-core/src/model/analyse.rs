//! Structural validation of actions and entries.

use bitflags::bitflags;

use crate::api::{variable_slot, AddressSpace, VARIABLE_SLOT_COUNT};
use crate::decoder::{ActionCode, ExecutableView};
use crate::encoding::{AddressRead, CodeType, CustomCode, DataRead, LinkLevel, Prefill, WriteMode};
use crate::legacy::legacy_to_current;
use crate::memory::width_mask;
use crate::model::entry::{CheatEntry, EntryFlags};
use crate::word::Field;

bitflags! {
    /// Every structural problem found in an action.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
    pub struct ErrorFlags: u32 {
        /// `CodeType` is reserved.
        const INVALID_CODE_TYPE = 1 << 0;
        /// Custom code is reserved.
        const INVALID_CUSTOM_CODE = 1 << 1;
        /// Condition is reserved.
        const INVALID_CONDITION = 1 << 2;
        /// Address-read mode is reserved.
        const INVALID_ADDRESS_READ = 1 << 3;
        /// Write mode is reserved.
        const INVALID_WRITE_MODE = 1 << 4;
        /// Reserved top bit is set.
        const RESERVED_BIT_SET = 1 << 5;
        /// Value-select and label-select in one entry.
        const CONFLICTING_SELECT = 1 << 6;
        /// Label-select below the master.
        const SELECT_ON_LINKED = 1 << 7;
        /// Master carries a follower link level.
        const LINK_ON_MASTER = 1 << 8;
        /// Follower carries the master link level.
        const MASTER_LINK_ON_CHILD = 1 << 9;
        /// User value range is empty.
        const RANGE_MINIMUM_NOT_BELOW_MAXIMUM = 1 << 10;
        /// Repeat write with zero count.
        const REPEAT_COUNT_ZERO = 1 << 11;
        /// Repeat write with zero stride.
        const REPEAT_STRIDE_ZERO = 1 << 12;
        /// Host has no such CPU space or region.
        const INVALID_LOCATION = 1 << 13;
        /// Operand lies beyond the space.
        const ADDRESS_OUT_OF_RANGE = 1 << 14;
        /// Variable slot beyond the slot array.
        const VARIABLE_INDEX_OUT_OF_RANGE = 1 << 15;
        /// Pointer wider than the space's addresses.
        const INDEX_SIZE_EXCEEDS_ADDRESS = 1 << 16;
        /// Write mask selects no bit.
        const WRITE_MASK_EMPTY = 1 << 17;
        /// Set or clear mask covers the whole operand.
        const WRITE_MASK_FULL = 1 << 18;
        /// Literal data wider than the operand.
        const DATA_EXCEEDS_SIZE = 1 << 19;
        /// Branch target past the end of the entry.
        const BRANCH_TARGET_OUT_OF_RANGE = 1 << 20;
        /// Loop target past the end of the entry.
        const LOOP_TARGET_OUT_OF_RANGE = 1 << 21;
        /// Prefill on an opcode that does not write memory.
        const PREFILL_ON_NON_WRITE = 1 << 22;
        /// Legacy code with no conversion.
        const LEGACY_UNKNOWN = 1 << 23;
        /// Label-select entry with fewer than two labels.
        const MALFORMED_LABELS = 1 << 24;
    }
}

/// Runs every per-action check on `entry.actions()[index]`.
///
/// Location and address checks run only when `space` is given. An index
/// past the end yields no flags.
#[must_use]
pub fn analyse(entry: &CheatEntry, index: usize, space: Option<&dyn AddressSpace>) -> ErrorFlags {
    let Some(action) = entry.actions().get(index) else {
        return ErrorFlags::empty();
    };
    let view = action.view();
    let word = view.word;
    let mut flags = ErrorFlags::empty();

    match view.code {
        ActionCode::Invalid => {
            if action
                .legacy
                .is_some_and(|l| legacy_to_current(l.code, l.cpu).is_none())
            {
                flags |= ErrorFlags::LEGACY_UNKNOWN;
            } else if word.is_custom() {
                flags |= ErrorFlags::INVALID_CUSTOM_CODE;
            } else {
                flags |= ErrorFlags::INVALID_CODE_TYPE;
            }
        }
        ActionCode::Custom(CustomCode::LabelSelect) if index > 0 => {
            flags |= ErrorFlags::SELECT_ON_LINKED;
        }
        ActionCode::Custom(_) | ActionCode::Op(_) => {}
    }

    if word.is_set(Field::Reserved) {
        flags |= ErrorFlags::RESERVED_BIT_SET;
    }
    if word.address_read().is_none() {
        flags |= ErrorFlags::INVALID_ADDRESS_READ;
    }

    match (index, word.link()) {
        (0, LinkLevel::Master) => {}
        (0, _) => flags |= ErrorFlags::LINK_ON_MASTER,
        (_, LinkLevel::Master) => flags |= ErrorFlags::MASTER_LINK_ON_CHILD,
        _ => {}
    }

    if word.prefill() != Prefill::None && !view.op().is_some_and(CodeType::is_write) {
        flags |= ErrorFlags::PREFILL_ON_NON_WRITE;
    }

    if let Some(code) = view.op() {
        flags |= check_operation(entry, code, &view);
    }

    if let Some(space) = space {
        flags |= check_location(space, &view);
    }

    flags
}

fn check_operation(entry: &CheatEntry, code: CodeType, view: &ExecutableView) -> ErrorFlags {
    let word = view.word;
    let mask = width_mask(view.bytes());
    let mut flags = ErrorFlags::empty();

    if code.uses_condition() && word.condition().is_none() {
        flags |= ErrorFlags::INVALID_CONDITION;
    }

    let user_select = code.is_user_select()
        || (code != CodeType::Popup && word.is_set(Field::ValueSelectEnable));
    if user_select && entry.flags().contains(EntryFlags::SELECT) {
        flags |= ErrorFlags::CONFLICTING_SELECT;
    }

    if code.is_user_select() {
        let (min, max) = view.user_range();
        if min >= max {
            flags |= ErrorFlags::RANGE_MINIMUM_NOT_BELOW_MAXIMUM;
        }
    }

    if code.is_repeat() {
        let (count, stride) = view.repeat_shape();
        if count == 0 {
            flags |= ErrorFlags::REPEAT_COUNT_ZERO;
        }
        if stride == 0 {
            flags |= ErrorFlags::REPEAT_STRIDE_ZERO;
        }
    }

    let bad_parameter =
        code.uses_variable_parameter() && word.variable_index() >= VARIABLE_SLOT_COUNT;
    let bad_data = word.data_read() == DataRead::Variable && variable_slot(view.data).is_none();
    let bad_address = matches!(
        word.address_read(),
        Some(AddressRead::IndirectVariable | AddressRead::VariableValue)
    ) && variable_slot(view.address).is_none();
    if bad_parameter || bad_data || bad_address {
        flags |= ErrorFlags::VARIABLE_INDEX_OUT_OF_RANGE;
    }

    if code.uses_write_mode() {
        match word.write_mode() {
            None => flags |= ErrorFlags::INVALID_WRITE_MODE,
            Some(WriteMode::Merge) => {
                if code == CodeType::Write && view.extend_data & mask == 0 {
                    flags |= ErrorFlags::WRITE_MASK_EMPTY;
                }
            }
            Some(WriteMode::SetBits | WriteMode::ClearBits) => {
                if word.data_read() == DataRead::Literal {
                    if view.data & mask == 0 {
                        flags |= ErrorFlags::WRITE_MASK_EMPTY;
                    } else if view.data & mask == mask {
                        flags |= ErrorFlags::WRITE_MASK_FULL;
                    }
                }
            }
        }
    }

    let literal_data = word.data_read() == DataRead::Literal;
    let data_is_value = matches!(
        code,
        CodeType::Write
            | CodeType::IndexedWrite
            | CodeType::RepeatWrite
            | CodeType::ConditionalWrite
            | CodeType::PairedWrite
    );
    let paired_overflow = code == CodeType::PairedWrite && view.extend_data > mask;
    if (literal_data && data_is_value && view.data > mask) || paired_overflow {
        flags |= ErrorFlags::DATA_EXCEEDS_SIZE;
    }

    let len = entry.actions().len();
    let target_out = usize::try_from(view.extend_data).map_or(true, |t| t >= len);
    match code {
        CodeType::Branch if target_out => flags |= ErrorFlags::BRANCH_TARGET_OUT_OF_RANGE,
        CodeType::Loop if target_out => flags |= ErrorFlags::LOOP_TARGET_OUT_OF_RANGE,
        _ => {}
    }

    flags
}

fn check_location(space: &dyn AddressSpace, view: &ExecutableView) -> ErrorFlags {
    let Some(code) = view.op() else {
        return ErrorFlags::empty();
    };
    let Some(info) = space.info(view.location) else {
        return ErrorFlags::INVALID_LOCATION;
    };

    let mut flags = ErrorFlags::empty();
    let literal = view.word.address_read() == Some(AddressRead::Literal);
    if literal {
        let bytes = if code == CodeType::IndexedWrite {
            view.word.index_bytes()
        } else {
            view.bytes()
        };
        let span = if code == CodeType::PairedWrite {
            bytes * 2
        } else {
            bytes
        };
        let fits = view
            .address
            .checked_add(span - 1)
            .is_some_and(|last| info.contains(view.address) && info.contains(last));
        if !fits {
            flags |= ErrorFlags::ADDRESS_OUT_OF_RANGE;
        }
    }
    if code == CodeType::IndexedWrite && view.word.index_bytes() > u32::from(info.address_width) {
        flags |= ErrorFlags::INDEX_SIZE_EXCEEDS_ADDRESS;
    }
    flags
}

/// ORs the flags of every action and checks the label structure.
#[must_use]
pub fn analyse_entry(entry: &CheatEntry, space: Option<&dyn AddressSpace>) -> ErrorFlags {
    let mut flags = (0..entry.actions().len())
        .map(|index| analyse(entry, index, space))
        .fold(ErrorFlags::empty(), |acc, f| acc | f);
    if entry.flags().contains(EntryFlags::SELECT) && entry.label_count() < 2 {
        flags |= ErrorFlags::MALFORMED_LABELS;
    }
    flags
}
