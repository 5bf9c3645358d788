use bitflags::bitflags;

use crate::api::Location;
use crate::decoder::{decode_for_execution, ActionCode, ExecutableView};
use crate::encoding::{CustomCode, LinkLevel};
use crate::legacy::LegacyCode;
use crate::word::InstructionWord;

bitflags! {
    /// Runtime state of one action, reset on activation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
    pub struct ActionState: u8 {
        /// Prefill constant has been written.
        const PREFILL_WRITTEN = 1 << 0;
        /// The live value moved off the prefill constant.
        const PREFILL_DONE = 1 << 1;
        /// One-shot operation has run.
        const OPERATION_DONE = 1 << 2;
        /// Action heads a label of a label-select entry.
        const IS_LABEL = 1 << 3;
        /// One-shot hold is counting down.
        const FIRST_HALF = 1 << 4;
    }
}

/// Values captured from memory on activation, sized by opcode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BackupValues {
    /// No valid backup.
    #[default]
    None,
    /// One value.
    Single(u32),
    /// Both halves of a paired write.
    Paired([u32; 2]),
    /// One value per repeat step.
    Repeated(Box<[u32]>),
}

impl BackupValues {
    /// True when a backup was captured.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Captured values in address order.
    #[must_use]
    pub fn values(&self) -> &[u32] {
        match self {
            Self::None => &[],
            Self::Single(value) => std::slice::from_ref(value),
            Self::Paired(values) => values,
            Self::Repeated(values) => values,
        }
    }
}

/// Activation-time snapshot of an action's target.
///
/// Restoring writes to the captured address, whatever the variables or
/// pointers used to resolve it hold by then.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Backup {
    /// Space the values were read from.
    pub location: Location,
    /// Address of the first value.
    pub address: u32,
    /// Captured values.
    pub values: BackupValues,
}

impl Backup {
    /// Captured values in address order.
    #[must_use]
    pub fn values(&self) -> &[u32] {
        self.values.values()
    }
}

/// One instruction plus its operands and runtime state.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CheatAction {
    /// Current-format word; ignored for execution when `legacy` is set.
    pub word: InstructionWord,
    /// Raw legacy fields for old-format actions.
    pub legacy: Option<LegacyCode>,
    /// Target space.
    pub location: Location,
    /// Editable address.
    pub address: u32,
    /// Address as loaded.
    pub original_address: u32,
    /// Editable data operand.
    pub data: u32,
    /// Data as loaded.
    pub original_data: u32,
    /// Opcode-specific second operand.
    pub extend_data: u32,
    /// Delay and hold counter.
    pub frame_timer: u32,
    /// Activation-time snapshot of the target.
    pub backup: Option<Backup>,
    /// Runtime state.
    pub state: ActionState,
    /// Last value seen by a changed-since-last condition.
    pub prev_observed: Option<u32>,
    /// Display name.
    pub name: String,
}

impl Default for CheatAction {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl CheatAction {
    /// Current-format action.
    #[must_use]
    pub const fn new(word: InstructionWord, location: Location, address: u32, data: u32) -> Self {
        Self {
            word,
            legacy: None,
            location,
            address,
            original_address: address,
            data,
            original_data: data,
            extend_data: 0,
            frame_timer: 0,
            backup: None,
            state: ActionState::empty(),
            prev_observed: None,
            name: String::new(),
        }
    }

    /// Empty comment used when lists grow.
    #[must_use]
    pub const fn placeholder() -> Self {
        Self::new(
            InstructionWord::custom(CustomCode::Comment),
            Location::cpu(0),
            0,
            0,
        )
    }

    /// Old-format action; operands are converted when executed.
    #[must_use]
    pub const fn from_legacy(legacy: LegacyCode, address: u32, data: u32) -> Self {
        let mut action = Self::new(InstructionWord::from_raw(0), Location::cpu(legacy.cpu), address, data);
        action.extend_data = legacy.mask;
        action.legacy = Some(legacy);
        action
    }

    /// Sets the second operand.
    #[must_use]
    pub const fn with_extend(mut self, extend_data: u32) -> Self {
        self.extend_data = extend_data;
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Current-format view used by the engine.
    #[must_use]
    pub fn view(&self) -> ExecutableView {
        decode_for_execution(self)
    }

    /// Link level after legacy conversion.
    #[must_use]
    pub fn link(&self) -> LinkLevel {
        self.view().word.link()
    }

    /// True for actions loaded from a legacy record.
    #[must_use]
    pub const fn is_old_format(&self) -> bool {
        self.legacy.is_some()
    }

    /// True for comments, separators, label-select and layer markers.
    #[must_use]
    pub fn is_custom(&self) -> bool {
        matches!(self.view().code, ActionCode::Custom(_))
    }

    /// Drops the backup.
    pub fn release_backup(&mut self) {
        self.backup = None;
    }

    /// Clears timers and per-activation state; keeps the label marker.
    pub fn reset_runtime(&mut self) {
        self.frame_timer = 0;
        self.state &= ActionState::IS_LABEL;
        self.prev_observed = None;
    }
}
