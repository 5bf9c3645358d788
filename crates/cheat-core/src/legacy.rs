//! Conversion table from legacy numeric cheat codes to instruction words.
//!
//! Legacy records carry a small decimal code that bundles the opcode and its
//! timing policy. Each known code maps to a current [`InstructionWord`] plus
//! a set of [`LegacyAdjust`] operations applied to the record's operands.
//! Codes `500..=899` are the linked variant of `code - 500`.

use bitflags::bitflags;

use crate::api::{bytes_for_mask, Location};
use crate::encoding::{CodeType, CustomCode, LinkLevel, Prefill, WriteMode};
use crate::memory::width_mask;
use crate::word::{Field, InstructionWord};

bitflags! {
    /// Operand adjustments applied when a legacy record is executed or saved.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
    pub struct LegacyAdjust: u8 {
        /// Data is one larger than the stored value.
        const DATA_MINUS_ONE = 1 << 0;
        /// Data is a mask of bits to set.
        const DATA_AS_SET_MASK = 1 << 1;
        /// Data is a mask of bits to clear.
        const DATA_AS_CLEAR_MASK = 1 << 2;
        /// The record's mask field is the second operand.
        const MASK_FROM_RECORD = 1 << 3;
    }
}

/// Offset between a legacy code and its linked variant.
pub const LEGACY_LINK_OFFSET: u32 = 500;

/// Highest legacy code that can appear in a record.
pub const LEGACY_CODE_MAX: u32 = 999;

/// Legacy record layout an action was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum LegacyGrammar {
    /// Single-digit CPU, byte-wide data, no mask.
    Short,
    /// Two-digit CPU, 32-bit data and write mask.
    Extended,
}

/// Raw legacy fields retained on an old-format action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct LegacyCode {
    /// Decimal legacy code.
    pub code: u32,
    /// CPU index from the record.
    pub cpu: u8,
    /// Write mask (extended grammar only, zero otherwise).
    pub mask: u32,
    /// Layout the record used.
    pub grammar: LegacyGrammar,
}

/// Result of looking a legacy code up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LegacyConversion {
    /// Current encoding, operand width not yet applied.
    pub word: InstructionWord,
    /// Operand adjustments.
    pub adjust: LegacyAdjust,
    /// Space the record targets.
    pub location: Location,
}

/// Operands after a legacy record has been converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedOperands {
    /// Final instruction word.
    pub word: InstructionWord,
    /// Final data operand.
    pub data: u32,
    /// Final second operand.
    pub extend_data: u32,
}

struct LegacyRow {
    code: u32,
    word: InstructionWord,
    adjust: LegacyAdjust,
}

const fn row(code: u32, word: InstructionWord, adjust: LegacyAdjust) -> LegacyRow {
    LegacyRow { code, word, adjust }
}

const W: InstructionWord = InstructionWord::new(CodeType::Write);
const VS: InstructionWord =
    InstructionWord::new(CodeType::VariableWrite).with_flag(Field::ValueSelectEnable, true);
const CW: InstructionWord = InstructionWord::new(CodeType::ConditionalWrite);
const NONE: LegacyAdjust = LegacyAdjust::empty();
const SET: LegacyAdjust = LegacyAdjust::DATA_AS_SET_MASK;
const CLEAR: LegacyAdjust = LegacyAdjust::DATA_AS_CLEAR_MASK;
const MINUS: LegacyAdjust = LegacyAdjust::DATA_MINUS_ONE;
const FROM_MASK: LegacyAdjust = LegacyAdjust::MASK_FROM_RECORD;

const fn once(word: InstructionWord) -> InstructionWord {
    word.with_flag(Field::OneShot, true)
}

const fn restore(word: InstructionWord) -> InstructionWord {
    word.with_flag(Field::RestoreValue, true)
}

const fn delay(word: InstructionWord, seconds: u32) -> InstructionWord {
    word.with_flag(Field::DelayEnable, true)
        .with(Field::DelayTime, seconds)
}

const fn min_one(word: InstructionWord) -> InstructionWord {
    word.with_flag(Field::ValueSelectMinimumOne, true)
}

const fn bcd(word: InstructionWord) -> InstructionWord {
    word.with_flag(Field::ValueSelectBcd, true)
}

const LEGACY_TABLE: &[LegacyRow] = &[
    row(0, W, NONE),
    row(1, once(W), NONE),
    row(2, delay(W, 1), NONE),
    row(3, delay(W, 2), NONE),
    row(4, delay(W, 5), NONE),
    row(5, delay(restore(once(W)), 1), NONE),
    row(6, delay(restore(once(W)), 2), NONE),
    row(7, delay(restore(once(W)), 5), NONE),
    row(8, once(W.with_prefill(Prefill::AllOnes)), NONE),
    row(9, once(W.with_prefill(Prefill::Zero)), NONE),
    row(10, restore(W), NONE),
    row(11, delay(restore(W), 1), NONE),
    row(12, delay(restore(W), 2), NONE),
    row(13, delay(restore(W), 5), NONE),
    row(14, restore(once(W)), NONE),
    row(15, W.with_prefill(Prefill::AllOnes), NONE),
    row(16, W.with_prefill(Prefill::Zero), NONE),
    row(17, W.with_prefill(Prefill::One), NONE),
    row(18, restore(W.with_prefill(Prefill::AllOnes)), NONE),
    row(19, restore(W.with_prefill(Prefill::Zero)), NONE),
    row(20, W, SET),
    row(21, once(W), SET),
    row(22, delay(W, 1), SET),
    row(23, delay(W, 2), SET),
    row(24, delay(W, 5), SET),
    row(40, W, CLEAR),
    row(41, once(W), CLEAR),
    row(42, delay(W, 1), CLEAR),
    row(43, delay(W, 2), CLEAR),
    row(44, delay(W, 5), CLEAR),
    row(60, VS, NONE),
    row(61, min_one(VS), MINUS),
    row(62, bcd(VS), NONE),
    row(63, bcd(min_one(VS)), MINUS),
    row(64, VS.with_flag(Field::ValueSelectNegative, true), NONE),
    row(65, restore(min_one(VS)), MINUS),
    row(70, once(VS), NONE),
    row(71, once(min_one(VS)), MINUS),
    row(72, once(bcd(VS)), NONE),
    row(73, once(bcd(min_one(VS))), MINUS),
    row(74, once(VS.with_flag(Field::ValueSelectNegative, true)), NONE),
    row(75, restore(once(min_one(VS))), MINUS),
    row(80, CW, FROM_MASK),
    row(81, once(CW), FROM_MASK),
    row(82, delay(CW, 1), FROM_MASK),
    row(83, delay(CW, 2), FROM_MASK),
    row(84, delay(CW, 5), FROM_MASK),
    row(998, InstructionWord::new(CodeType::Watch), NONE),
    row(999, InstructionWord::custom(CustomCode::Comment), NONE),
];

/// Number of base codes in the conversion table.
#[must_use]
pub const fn legacy_table_len() -> usize {
    LEGACY_TABLE.len()
}

/// Looks up a legacy code for `cpu`.
///
/// Returns `None` for unknown codes; callers skip such records.
#[must_use]
pub fn legacy_to_current(code: u32, cpu: u8) -> Option<LegacyConversion> {
    let (base, link) = if (LEGACY_LINK_OFFSET..LEGACY_LINK_OFFSET + 400).contains(&code) {
        (code - LEGACY_LINK_OFFSET, LinkLevel::Linked)
    } else {
        (code, LinkLevel::Master)
    };
    let row = LEGACY_TABLE.iter().find(|r| r.code == base)?;
    let mut word = row.word.with_link(link);
    if row.adjust.contains(LegacyAdjust::DATA_AS_SET_MASK) {
        word = word.with_write_mode(WriteMode::SetBits);
    } else if row.adjust.contains(LegacyAdjust::DATA_AS_CLEAR_MASK) {
        word = word.with_write_mode(WriteMode::ClearBits);
    }
    Some(LegacyConversion {
        word,
        adjust: row.adjust,
        location: Location::cpu(cpu),
    })
}

impl LegacyConversion {
    /// Applies the operand width and adjustments to a record's raw operands.
    #[must_use]
    pub fn resolve(&self, legacy: &LegacyCode, data: u32) -> ResolvedOperands {
        let bytes = match legacy.grammar {
            LegacyGrammar::Short => 1,
            LegacyGrammar::Extended if self.adjust.contains(LegacyAdjust::MASK_FROM_RECORD) => {
                u32::from(bytes_for_mask(data | legacy.mask))
            }
            LegacyGrammar::Extended => u32::from(bytes_for_mask(data)),
        };
        let mask = width_mask(bytes);
        let word = self.word.with_address_bytes(bytes);

        let mut data = data & mask;
        if self.adjust.contains(LegacyAdjust::DATA_MINUS_ONE) {
            data = data.saturating_sub(1);
        }

        let extend_data = if self.adjust.contains(LegacyAdjust::MASK_FROM_RECORD) {
            legacy.mask & mask
        } else {
            match word.code_type() {
                Some(CodeType::VariableWrite) => data,
                Some(CodeType::Write) if word.write_mode() == Some(WriteMode::Merge) => {
                    if legacy.mask == 0 {
                        mask
                    } else {
                        legacy.mask & mask
                    }
                }
                _ => 0,
            }
        };

        ResolvedOperands {
            word,
            data,
            extend_data,
        }
    }
}
