/// Executable opcodes carried in the `CodeType` field (bits 27..24).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum CodeType {
    Write = 0x0,
    IndexedWrite = 0x1,
    RepeatWrite = 0x2,
    ConditionalWrite = 0x3,
    VariableWrite = 0x4,
    RepeatVariableWrite = 0x5,
    PairedWrite = 0x6,
    Move = 0x7,
    Branch = 0x8,
    Loop = 0x9,
    Popup = 0xA,
    Watch = 0xB,
}

/// How many backup slots an opcode captures on activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackupKind {
    /// Nothing in memory is modified, nothing to restore.
    None,
    /// One value at the target address.
    Single,
    /// Two consecutive values (paired writes).
    Paired,
    /// One value per repeat step.
    Repeated,
}

impl CodeType {
    /// Converts a 4-bit `CodeType` value into an assigned opcode.
    #[must_use]
    pub const fn from_u4(bits: u8) -> Option<Self> {
        match bits {
            0x0 => Some(Self::Write),
            0x1 => Some(Self::IndexedWrite),
            0x2 => Some(Self::RepeatWrite),
            0x3 => Some(Self::ConditionalWrite),
            0x4 => Some(Self::VariableWrite),
            0x5 => Some(Self::RepeatVariableWrite),
            0x6 => Some(Self::PairedWrite),
            0x7 => Some(Self::Move),
            0x8 => Some(Self::Branch),
            0x9 => Some(Self::Loop),
            0xA => Some(Self::Popup),
            0xB => Some(Self::Watch),
            _ => None,
        }
    }

    /// Returns true for opcodes that store into memory.
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(
            self,
            Self::Write
                | Self::IndexedWrite
                | Self::RepeatWrite
                | Self::ConditionalWrite
                | Self::VariableWrite
                | Self::RepeatVariableWrite
                | Self::PairedWrite
        )
    }

    /// Returns true for opcodes whose `Parameter` field is a [`Condition`].
    #[must_use]
    pub const fn uses_condition(self) -> bool {
        matches!(self, Self::ConditionalWrite | Self::Branch | Self::Popup)
    }

    /// Returns true for opcodes whose `Parameter` field is a [`WriteMode`].
    #[must_use]
    pub const fn uses_write_mode(self) -> bool {
        matches!(
            self,
            Self::Write | Self::IndexedWrite | Self::RepeatWrite | Self::PairedWrite
        )
    }

    /// Returns true for opcodes whose `Parameter` field names a variable slot.
    #[must_use]
    pub const fn uses_variable_parameter(self) -> bool {
        matches!(self, Self::Move | Self::Loop)
    }

    /// Returns true for opcodes whose `extend_data` packs `count << 16 | stride`.
    #[must_use]
    pub const fn is_repeat(self) -> bool {
        matches!(self, Self::RepeatWrite | Self::RepeatVariableWrite)
    }

    /// Returns true for opcodes that write a user-chosen value.
    #[must_use]
    pub const fn is_user_select(self) -> bool {
        matches!(self, Self::VariableWrite | Self::RepeatVariableWrite)
    }

    /// Returns true for opcodes that transfer control inside the action list.
    #[must_use]
    pub const fn is_control_transfer(self) -> bool {
        matches!(self, Self::Branch | Self::Loop)
    }

    /// Number of memory values captured as backup on activation.
    #[must_use]
    pub const fn backup_kind(self) -> BackupKind {
        match self {
            Self::Write
            | Self::IndexedWrite
            | Self::ConditionalWrite
            | Self::VariableWrite => BackupKind::Single,
            Self::PairedWrite => BackupKind::Paired,
            Self::RepeatWrite | Self::RepeatVariableWrite => BackupKind::Repeated,
            Self::Move | Self::Branch | Self::Loop | Self::Popup | Self::Watch => BackupKind::None,
        }
    }

    /// Short mnemonic used by listings and log lines.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        CODE_TYPE_TABLE
            .iter()
            .find_map(|(_, code, name)| (*code == self).then_some(*name))
            .unwrap_or("?")
    }
}

/// Single source-of-truth opcode table: `(bits, opcode, mnemonic)`.
///
/// Any `CodeType` value not present here is invalid by definition.
pub const CODE_TYPE_TABLE: &[(u8, CodeType, &str)] = &[
    (0x0, CodeType::Write, "write"),
    (0x1, CodeType::IndexedWrite, "iwrite"),
    (0x2, CodeType::RepeatWrite, "rwrite"),
    (0x3, CodeType::ConditionalWrite, "cwrite"),
    (0x4, CodeType::VariableWrite, "vwrite"),
    (0x5, CodeType::RepeatVariableWrite, "rvwrite"),
    (0x6, CodeType::PairedWrite, "pwrite"),
    (0x7, CodeType::Move, "move"),
    (0x8, CodeType::Branch, "branch"),
    (0x9, CodeType::Loop, "loop"),
    (0xA, CodeType::Popup, "popup"),
    (0xB, CodeType::Watch, "watch"),
];

/// Returns the assigned opcode for a `CodeType` field value.
///
/// `None` means the value is reserved.
#[must_use]
pub fn classify_code_type(bits: u8) -> Option<CodeType> {
    if bits > 0xF {
        return None;
    }

    CODE_TYPE_TABLE
        .iter()
        .find_map(|(entry_bits, code, _)| (*entry_bits == bits).then_some(*code))
}

/// Pseudo-ops carried in the `CodeType` field when the `Custom` flag is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum CustomCode {
    /// Text-only line, never executed.
    Comment = 0x0,
    /// Menu separator.
    Separator = 0x1,
    /// Master of a multiple-choice entry.
    LabelSelect = 0x2,
    /// Menu layer marker; `data` holds the layer number.
    Layer = 0x3,
}

impl CustomCode {
    /// Converts a 4-bit value into a custom code.
    #[must_use]
    pub const fn from_u4(bits: u8) -> Option<Self> {
        match bits {
            0x0 => Some(Self::Comment),
            0x1 => Some(Self::Separator),
            0x2 => Some(Self::LabelSelect),
            0x3 => Some(Self::Layer),
            _ => None,
        }
    }
}

/// Conditions evaluated by conditional writes, branches and popups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Condition {
    Equal = 0x0,
    NotEqual = 0x1,
    Less = 0x2,
    LessOrEqual = 0x3,
    Greater = 0x4,
    GreaterOrEqual = 0x5,
    BitSet = 0x6,
    BitClear = 0x7,
    ChangedSinceLast = 0x8,
    KeyPressedOnce = 0x9,
    KeyPressedRepeat = 0xA,
    Always = 0xB,
}

impl Condition {
    /// Converts a 4-bit value into a condition.
    #[must_use]
    pub const fn from_u4(bits: u8) -> Option<Self> {
        match bits {
            0x0 => Some(Self::Equal),
            0x1 => Some(Self::NotEqual),
            0x2 => Some(Self::Less),
            0x3 => Some(Self::LessOrEqual),
            0x4 => Some(Self::Greater),
            0x5 => Some(Self::GreaterOrEqual),
            0x6 => Some(Self::BitSet),
            0x7 => Some(Self::BitClear),
            0x8 => Some(Self::ChangedSinceLast),
            0x9 => Some(Self::KeyPressedOnce),
            0xA => Some(Self::KeyPressedRepeat),
            0xB => Some(Self::Always),
            _ => None,
        }
    }

    /// Returns true when evaluation needs the live memory value.
    #[must_use]
    pub const fn reads_memory(self) -> bool {
        !matches!(
            self,
            Self::KeyPressedOnce | Self::KeyPressedRepeat | Self::Always
        )
    }
}

/// Position of an action inside its entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum LinkLevel {
    /// First action of an entry.
    #[default]
    Master = 0,
    /// Ordinary follower; in a label-select entry it starts a label.
    Linked = 1,
    /// Continuation of the preceding label.
    SubLink = 2,
    /// Follower that takes its data from the previous action's value.
    CopyLink = 3,
}

impl LinkLevel {
    /// Converts the 2-bit `Link` field.
    #[must_use]
    pub const fn from_u2(bits: u8) -> Self {
        match bits & 0x3 {
            0 => Self::Master,
            1 => Self::Linked,
            2 => Self::SubLink,
            _ => Self::CopyLink,
        }
    }
}

/// Constant written before the real patch is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum Prefill {
    /// No prefill.
    #[default]
    None = 0,
    /// Every bit of the operand set.
    AllOnes = 1,
    /// Zero.
    Zero = 2,
    /// The value one.
    One = 3,
}

impl Prefill {
    /// Converts the 2-bit `Prefill` field.
    #[must_use]
    pub const fn from_u2(bits: u8) -> Self {
        match bits & 0x3 {
            0 => Self::None,
            1 => Self::AllOnes,
            2 => Self::Zero,
            _ => Self::One,
        }
    }
}

/// How the action's `address` is turned into a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum AddressRead {
    /// `address` is the memory address.
    #[default]
    Literal = 0,
    /// `address` names a variable slot that holds the memory address.
    IndirectVariable = 1,
    /// `address` names a variable slot that is itself the operand.
    VariableValue = 2,
}

impl AddressRead {
    /// Converts the 2-bit `AddressRead` field; `3` is reserved.
    #[must_use]
    pub const fn from_u2(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Literal),
            1 => Some(Self::IndirectVariable),
            2 => Some(Self::VariableValue),
            _ => None,
        }
    }
}

/// Where the action's `data` operand comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum DataRead {
    /// `data` is the value.
    #[default]
    Literal = 0,
    /// `data` names a variable slot.
    Variable = 1,
}

impl DataRead {
    /// Converts the 1-bit `DataRead` field.
    #[must_use]
    pub const fn from_u1(bits: u8) -> Self {
        if bits & 1 == 0 {
            Self::Literal
        } else {
            Self::Variable
        }
    }
}

/// Store policy for plain, indexed, repeat and paired writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum WriteMode {
    /// `(old & !mask) | (data & mask)`; only `Write` carries a mask.
    #[default]
    Merge = 0,
    /// `old | data`.
    SetBits = 1,
    /// `old & !data`.
    ClearBits = 2,
}

impl WriteMode {
    /// Converts the 2-bit write-mode sub-field; `3` is reserved.
    #[must_use]
    pub const fn from_u2(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Merge),
            1 => Some(Self::SetBits),
            2 => Some(Self::ClearBits),
            _ => None,
        }
    }
}

/// Text layout requested by a popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum PopupLayout {
    /// Action or entry name only.
    #[default]
    Label = 0,
    /// Live value only.
    Value = 1,
    /// Name followed by the live value.
    LabelAndValue = 2,
    /// Live value rendered as characters.
    ValueAsText = 3,
}

impl PopupLayout {
    /// Converts the 2-bit popup layout sub-field.
    #[must_use]
    pub const fn from_u2(bits: u8) -> Self {
        match bits & 0x3 {
            0 => Self::Label,
            1 => Self::Value,
            2 => Self::LabelAndValue,
            _ => Self::ValueAsText,
        }
    }
}
