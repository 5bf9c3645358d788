//! Packed 32-bit instruction word and its named field table.
//!
//! Every field is a `(shift, width)` pair. Top-level fields partition the
//! word exactly; sub-fields sit strictly inside a parent. Both properties are
//! checked at compile time by [`assert_field_layout`].

use crate::encoding::{
    AddressRead, CodeType, Condition, CustomCode, DataRead, LinkLevel, PopupLayout, Prefill,
    WriteMode,
};

/// Bit range of a named field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldSpec {
    /// Least significant bit.
    pub shift: u32,
    /// Number of bits.
    pub width: u32,
}

impl FieldSpec {
    /// Mask of the field's bits within the word.
    #[must_use]
    pub const fn mask(self) -> u32 {
        (((1u64 << self.width) - 1) as u32) << self.shift
    }

    /// Largest value the field can hold.
    #[must_use]
    pub const fn max_value(self) -> u32 {
        ((1u64 << self.width) - 1) as u32
    }
}

/// Named fields of an [`InstructionWord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Field {
    OneShot,
    DelayEnable,
    Prefill,
    RestoreValue,
    DataRead,
    AddressRead,
    Parameter,
    DelayTime,
    Endian,
    AddressSize,
    IndexSize,
    Select,
    CodeType,
    Link,
    Custom,
    Reserved,
    Condition,
    WriteMode,
    VariableIndex,
    ValueSelectEnable,
    ValueSelectMinimumOne,
    ValueSelectBcd,
    ValueSelectNegative,
    PopupLayout,
}

impl Field {
    /// Returns the bit range of this field.
    #[must_use]
    pub const fn spec(self) -> FieldSpec {
        let (shift, width) = match self {
            Self::OneShot => (0, 1),
            Self::DelayEnable => (1, 1),
            Self::Prefill => (2, 2),
            Self::RestoreValue => (4, 1),
            Self::DataRead => (5, 1),
            Self::AddressRead => (6, 2),
            Self::Parameter => (8, 4),
            Self::DelayTime => (12, 3),
            Self::Endian => (15, 1),
            Self::AddressSize => (16, 2),
            Self::IndexSize => (18, 2),
            Self::Select => (20, 4),
            Self::CodeType => (24, 4),
            Self::Link => (28, 2),
            Self::Custom => (30, 1),
            Self::Reserved => (31, 1),
            Self::Condition | Self::VariableIndex => (8, 4),
            Self::WriteMode => (8, 2),
            Self::ValueSelectEnable => (20, 1),
            Self::ValueSelectMinimumOne => (21, 1),
            Self::ValueSelectBcd => (22, 1),
            Self::ValueSelectNegative => (23, 1),
            Self::PopupLayout => (20, 2),
        };
        FieldSpec { shift, width }
    }

    /// Parent field for sub-fields, `None` for top-level fields.
    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::Condition | Self::WriteMode | Self::VariableIndex => Some(Self::Parameter),
            Self::ValueSelectEnable
            | Self::ValueSelectMinimumOne
            | Self::ValueSelectBcd
            | Self::ValueSelectNegative
            | Self::PopupLayout => Some(Self::Select),
            _ => None,
        }
    }
}

/// Fields that together cover all 32 bits without overlap.
pub const TOP_LEVEL_FIELDS: [Field; 16] = [
    Field::OneShot,
    Field::DelayEnable,
    Field::Prefill,
    Field::RestoreValue,
    Field::DataRead,
    Field::AddressRead,
    Field::Parameter,
    Field::DelayTime,
    Field::Endian,
    Field::AddressSize,
    Field::IndexSize,
    Field::Select,
    Field::CodeType,
    Field::Link,
    Field::Custom,
    Field::Reserved,
];

/// Per-opcode views into a parent field.
pub const SUB_FIELDS: [Field; 8] = [
    Field::Condition,
    Field::WriteMode,
    Field::VariableIndex,
    Field::ValueSelectEnable,
    Field::ValueSelectMinimumOne,
    Field::ValueSelectBcd,
    Field::ValueSelectNegative,
    Field::PopupLayout,
];

/// Checks the field table: top-level fields are disjoint and cover the word,
/// every sub-field is contained in its parent.
pub const fn assert_field_layout() {
    let mut covered = 0u32;
    let mut i = 0;
    while i < TOP_LEVEL_FIELDS.len() {
        let field = TOP_LEVEL_FIELDS[i];
        let spec = field.spec();
        assert!(spec.width > 0, "field has zero width");
        assert!(spec.shift + spec.width <= 32, "field crosses bit 31");
        assert!(field.parent().is_none(), "top-level field has a parent");
        assert!(covered & spec.mask() == 0, "top-level fields overlap");
        covered |= spec.mask();
        i += 1;
    }
    assert!(covered == u32::MAX, "top-level fields leave bits unassigned");

    let mut j = 0;
    while j < SUB_FIELDS.len() {
        let field = SUB_FIELDS[j];
        let spec = field.spec();
        let Some(parent) = field.parent() else {
            panic!("sub-field without parent");
        };
        let parent_mask = parent.spec().mask();
        assert!(spec.width > 0, "sub-field has zero width");
        assert!(spec.mask() & !parent_mask == 0, "sub-field escapes its parent");
        j += 1;
    }
}

const _: () = assert_field_layout();

/// Reads `field` from `word`.
#[must_use]
pub const fn extract(word: InstructionWord, field: Field) -> u32 {
    let spec = field.spec();
    (word.0 >> spec.shift) & spec.max_value()
}

/// Returns a copy of `word` with `field` replaced by `value` truncated to the
/// field's width.
#[must_use]
pub const fn insert(word: InstructionWord, field: Field, value: u32) -> InstructionWord {
    let spec = field.spec();
    let mask = spec.mask();
    InstructionWord((word.0 & !mask) | ((value << spec.shift) & mask))
}

/// Returns true when any bit of `field` is set.
#[must_use]
pub const fn test(word: InstructionWord, field: Field) -> bool {
    extract(word, field) != 0
}

/// Opaque packed instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct InstructionWord(u32);

#[allow(clippy::cast_possible_truncation)]
impl InstructionWord {
    /// Wraps a raw value as read from a database record.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw value as written to a database record.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Plain one-byte instruction for `code`.
    #[must_use]
    pub const fn new(code: CodeType) -> Self {
        insert(Self(0), Field::CodeType, code as u32)
    }

    /// Custom pseudo-op word.
    #[must_use]
    pub const fn custom(code: CustomCode) -> Self {
        insert(insert(Self(0), Field::Custom, 1), Field::CodeType, code as u32)
    }

    /// See [`extract`].
    #[must_use]
    pub const fn get(self, field: Field) -> u32 {
        extract(self, field)
    }

    /// See [`insert`].
    #[must_use]
    pub const fn with(self, field: Field, value: u32) -> Self {
        insert(self, field, value)
    }

    /// See [`test`].
    #[must_use]
    pub const fn is_set(self, field: Field) -> bool {
        test(self, field)
    }

    /// True when the `CodeType` field names a custom pseudo-op.
    #[must_use]
    pub const fn is_custom(self) -> bool {
        test(self, Field::Custom)
    }

    /// Decoded opcode; `None` for custom words and reserved values.
    #[must_use]
    pub const fn code_type(self) -> Option<CodeType> {
        if self.is_custom() {
            return None;
        }
        CodeType::from_u4(extract(self, Field::CodeType) as u8)
    }

    /// Decoded custom code; `None` for opcode words and reserved values.
    #[must_use]
    pub const fn custom_code(self) -> Option<CustomCode> {
        if !self.is_custom() {
            return None;
        }
        CustomCode::from_u4(extract(self, Field::CodeType) as u8)
    }

    /// Condition sub-field.
    #[must_use]
    pub const fn condition(self) -> Option<Condition> {
        Condition::from_u4(extract(self, Field::Condition) as u8)
    }

    /// Write-mode sub-field.
    #[must_use]
    pub const fn write_mode(self) -> Option<WriteMode> {
        WriteMode::from_u2(extract(self, Field::WriteMode) as u8)
    }

    /// Variable slot named by the parameter field.
    #[must_use]
    pub const fn variable_index(self) -> usize {
        extract(self, Field::VariableIndex) as usize
    }

    /// Link level.
    #[must_use]
    pub const fn link(self) -> LinkLevel {
        LinkLevel::from_u2(extract(self, Field::Link) as u8)
    }

    /// Operand width in bytes (1..=4).
    #[must_use]
    pub const fn address_bytes(self) -> u32 {
        extract(self, Field::AddressSize) + 1
    }

    /// Pointer width in bytes for indexed writes (1..=4).
    #[must_use]
    pub const fn index_bytes(self) -> u32 {
        extract(self, Field::IndexSize) + 1
    }

    /// Prefill constant selector.
    #[must_use]
    pub const fn prefill(self) -> Prefill {
        Prefill::from_u2(extract(self, Field::Prefill) as u8)
    }

    /// Address interpretation; `None` for the reserved value.
    #[must_use]
    pub const fn address_read(self) -> Option<AddressRead> {
        AddressRead::from_u2(extract(self, Field::AddressRead) as u8)
    }

    /// Data interpretation.
    #[must_use]
    pub const fn data_read(self) -> DataRead {
        DataRead::from_u1(extract(self, Field::DataRead) as u8)
    }

    /// Popup text layout.
    #[must_use]
    pub const fn popup_layout(self) -> PopupLayout {
        PopupLayout::from_u2(extract(self, Field::PopupLayout) as u8)
    }

    /// Delay threshold in seconds.
    #[must_use]
    pub const fn delay_seconds(self) -> u32 {
        extract(self, Field::DelayTime)
    }

    /// True when the operand is byte-swapped relative to the space.
    #[must_use]
    pub const fn swapped(self) -> bool {
        test(self, Field::Endian)
    }

    /// Sets the operand width in bytes, clamped to 1..=4.
    #[must_use]
    pub const fn with_address_bytes(self, bytes: u32) -> Self {
        let bytes = if bytes == 0 {
            1
        } else if bytes > 4 {
            4
        } else {
            bytes
        };
        insert(self, Field::AddressSize, bytes - 1)
    }

    /// Sets the link level.
    #[must_use]
    pub const fn with_link(self, link: LinkLevel) -> Self {
        insert(self, Field::Link, link as u32)
    }

    /// Sets the condition sub-field.
    #[must_use]
    pub const fn with_condition(self, condition: Condition) -> Self {
        insert(self, Field::Condition, condition as u32)
    }

    /// Sets the write-mode sub-field.
    #[must_use]
    pub const fn with_write_mode(self, mode: WriteMode) -> Self {
        insert(self, Field::WriteMode, mode as u32)
    }

    /// Sets the prefill selector.
    #[must_use]
    pub const fn with_prefill(self, prefill: Prefill) -> Self {
        insert(self, Field::Prefill, prefill as u32)
    }

    /// Sets the address interpretation.
    #[must_use]
    pub const fn with_address_read(self, mode: AddressRead) -> Self {
        insert(self, Field::AddressRead, mode as u32)
    }

    /// Sets or clears a one-bit flag field.
    #[must_use]
    pub const fn with_flag(self, field: Field, on: bool) -> Self {
        insert(self, field, on as u32)
    }
}
