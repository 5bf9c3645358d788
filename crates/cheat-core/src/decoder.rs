//! Pure decode of a stored action into the operands the engine executes.

use crate::api::Location;
use crate::encoding::{CodeType, CustomCode};
use crate::legacy::legacy_to_current;
use crate::model::CheatAction;
use crate::word::{Field, InstructionWord};

/// What an action does once decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionCode {
    /// Executable opcode.
    Op(CodeType),
    /// Custom pseudo-op, never executed.
    Custom(CustomCode),
    /// Reserved opcode or custom code, or an unknown legacy code.
    Invalid,
}

/// Operands of an action in current encoding.
///
/// Old-format actions are converted on the fly; the stored action is never
/// touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutableView {
    /// Current-format instruction word.
    pub word: InstructionWord,
    /// Decoded operation.
    pub code: ActionCode,
    /// Target space.
    pub location: Location,
    /// Address operand.
    pub address: u32,
    /// Data operand.
    pub data: u32,
    /// Opcode-specific second operand.
    pub extend_data: u32,
    /// Action came from a legacy record.
    pub legacy: bool,
}

impl ExecutableView {
    /// Opcode, when the action is executable.
    #[must_use]
    pub const fn op(&self) -> Option<CodeType> {
        match self.code {
            ActionCode::Op(code) => Some(code),
            ActionCode::Custom(_) | ActionCode::Invalid => None,
        }
    }

    /// Operand width in bytes.
    #[must_use]
    pub const fn bytes(&self) -> u32 {
        self.word.address_bytes()
    }

    /// `(count, stride)` of a repeat write.
    #[must_use]
    pub const fn repeat_shape(&self) -> (u32, u32) {
        (self.extend_data >> 16, self.extend_data & 0xFFFF)
    }

    /// `(minimum, maximum)` of a user-chosen value.
    ///
    /// Variable writes keep the range in `extend_data`; repeat variable writes
    /// need `extend_data` for the repeat shape and keep it in `data`.
    #[must_use]
    pub const fn user_range(&self) -> (u32, u32) {
        let packed = match self.code {
            ActionCode::Op(CodeType::RepeatVariableWrite) => self.data,
            _ => self.extend_data,
        };
        let min = packed >> 16;
        let max = packed & 0xFFFF;
        if self.word.is_set(Field::ValueSelectMinimumOne) && min == 0 {
            (1, max)
        } else {
            (min, max)
        }
    }
}

const fn classify(word: InstructionWord) -> ActionCode {
    if word.is_custom() {
        match word.custom_code() {
            Some(code) => ActionCode::Custom(code),
            None => ActionCode::Invalid,
        }
    } else {
        match word.code_type() {
            Some(code) => ActionCode::Op(code),
            None => ActionCode::Invalid,
        }
    }
}

/// Decodes `action` into current-format operands.
#[must_use]
pub fn decode_for_execution(action: &CheatAction) -> ExecutableView {
    let Some(legacy) = action.legacy else {
        return ExecutableView {
            word: action.word,
            code: classify(action.word),
            location: action.location,
            address: action.address,
            data: action.data,
            extend_data: action.extend_data,
            legacy: false,
        };
    };

    match legacy_to_current(legacy.code, legacy.cpu) {
        Some(conversion) => {
            let operands = conversion.resolve(&legacy, action.data);
            ExecutableView {
                word: operands.word,
                code: classify(operands.word),
                location: conversion.location,
                address: action.address,
                data: operands.data,
                extend_data: operands.extend_data,
                legacy: true,
            }
        }
        None => ExecutableView {
            word: action.word,
            code: ActionCode::Invalid,
            location: action.location,
            address: action.address,
            data: action.data,
            extend_data: action.extend_data,
            legacy: true,
        },
    }
}
