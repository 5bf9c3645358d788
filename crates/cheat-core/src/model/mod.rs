//! Actions, entries, the owning entry list, and structural validation.

/// One instruction occurrence with operands and backup state.
pub mod action;
/// Structural checks over actions and entries.
pub mod analyse;
/// Ordered, never-empty action groups.
pub mod entry;
/// Owning container of entries.
pub mod list;

pub use action::{ActionState, Backup, BackupValues, CheatAction};
pub use analyse::{analyse, analyse_entry, ErrorFlags};
pub use entry::{CheatEntry, EntryFlags};
pub use list::CheatList;
