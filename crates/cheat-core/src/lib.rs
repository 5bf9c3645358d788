//! Live-memory cheat engine: packed instruction words, per-frame execution,
//! memory search, and the cheat database codec.

/// Host-facing contracts: address spaces, configuration, and outputs.
pub mod api;
pub use api::{
    bytes_for_mask, variable_slot, AddressSpace, EngineConfig, Endianness, EntryId, Location,
    PopupMessage, SpaceInfo, SpaceKind, StepOutcome, WatchInfo, DEFAULT_MAX_REPEAT_BACKUP,
    DEFAULT_POPUP_QUEUE_CAPACITY, VARIABLE_SLOT_COUNT,
};

/// Opcode, custom code and sub-field enumerations with their tables.
pub mod encoding;
pub use encoding::{
    classify_code_type, AddressRead, BackupKind, CodeType, Condition, CustomCode, DataRead,
    LinkLevel, PopupLayout, Prefill, WriteMode, CODE_TYPE_TABLE,
};

/// Packed 32-bit instruction word and its field table.
pub mod word;
pub use word::{extract, insert, Field, FieldSpec, InstructionWord, SUB_FIELDS, TOP_LEVEL_FIELDS};

/// Error taxonomy for access, format and engine failures.
pub mod fault;
pub use fault::{AccessError, EngineError, ErrorClass, FormatError};

/// Frame timing and prefill constants.
pub mod timing;
pub use timing::{delay_threshold, prefill_value, DEFAULT_FRAMES_PER_SECOND, DELAY_SECONDS_MAX};

/// Value access over address spaces and the in-memory reference space.
pub mod memory;
pub use memory::{read_value, write_value, MemoryMap};

/// Load diagnostics with saturating counters.
pub mod diag;
pub use diag::{LineDiagnostic, LoadReport};

/// Legacy opcode conversion table.
pub mod legacy;
pub use legacy::{legacy_to_current, LegacyAdjust, LegacyCode, LegacyConversion, LegacyGrammar};

/// Pure decode of stored actions into executable operands.
pub mod decoder;
pub use decoder::{decode_for_execution, ActionCode, ExecutableView};

/// Actions, entries, the entry list and structural analysis.
pub mod model;
pub use model::{
    analyse, analyse_entry, ActionState, Backup, BackupValues, CheatAction, CheatEntry, CheatList,
    EntryFlags, ErrorFlags,
};

/// Per-frame execution engine.
pub mod execute;
pub use execute::Engine;

/// Memory search sessions.
pub mod search;
pub use search::{
    Comparison, Operand, RestoreOutcome, SearchConfig, SearchLimits, SearchRegion, SearchResult,
    SearchSession, SearchWidth,
};

/// Text database codec.
pub mod database;
pub use database::{decode_line, decode_line_checked, encode_entry, encode_region, CheatDatabase, Record};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tempfile as _;
