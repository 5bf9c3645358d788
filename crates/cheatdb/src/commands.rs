use std::path::PathBuf;

use cheat_core::database::FILE_LIST_SEPARATOR;
use cheat_core::{analyse_entry, CheatDatabase, EngineError, EntryFlags, LoadReport};

use crate::report::{entry_kind, EntryProblem};

/// Outcome of checking a set of database files.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    /// What loading accepted and skipped.
    pub report: LoadReport,
    /// Entries with structural problems.
    pub problems: Vec<EntryProblem>,
    /// Entries loaded.
    pub entries: usize,
}

impl CheckOutcome {
    /// True when no line was skipped and no entry has problems.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.report.is_clean() && self.problems.is_empty()
    }
}

/// Database rewritten in the current grammar.
#[derive(Debug, Clone)]
pub struct ConvertOutcome {
    /// Converted text.
    pub text: String,
    /// What loading accepted and skipped.
    pub report: LoadReport,
}

/// Joins input paths into a database file list.
#[must_use]
pub fn file_list(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(&FILE_LIST_SEPARATOR.to_string())
}

/// Loads every input, keeping only `driver` when given.
///
/// # Errors
///
/// Returns [`EngineError::Allocation`] when the database cannot grow.
pub fn load(inputs: &[PathBuf], driver: Option<&str>) -> Result<CheatDatabase, EngineError> {
    let mut db = CheatDatabase::new();
    db.load_files(&file_list(inputs), driver)?;
    log::debug!(
        "loaded {} entries from {} file(s)",
        db.entries.len(),
        inputs.len()
    );
    Ok(db)
}

/// Loads the inputs and runs structural analysis over every entry.
///
/// # Errors
///
/// Propagates [`load`] errors.
pub fn check(inputs: &[PathBuf], driver: Option<&str>) -> Result<CheckOutcome, EngineError> {
    let db = load(inputs, driver)?;
    let problems = db
        .entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let flags = analyse_entry(entry, None);
            (!flags.is_empty()).then(|| EntryProblem {
                index,
                name: entry.name.clone(),
                flags,
            })
        })
        .collect();
    Ok(CheckOutcome {
        entries: db.entries.len(),
        report: db.report,
        problems,
    })
}

/// Loads the inputs for `driver` and writes them back in the current
/// grammar, legacy records included.
///
/// # Errors
///
/// Propagates [`load`] errors.
pub fn convert(inputs: &[PathBuf], driver: &str) -> Result<ConvertOutcome, EngineError> {
    let db = load(inputs, Some(driver))?;
    Ok(ConvertOutcome {
        text: db.to_text(driver),
        report: db.report,
    })
}

/// One listing line per entry: index, kind, action count and name.
///
/// Entries loaded from legacy records are marked with `*`.
///
/// # Errors
///
/// Propagates [`load`] errors.
pub fn list(inputs: &[PathBuf], driver: Option<&str>) -> Result<Vec<String>, EngineError> {
    let db = load(inputs, driver)?;
    Ok(db
        .entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let legacy = if entry.flags().contains(EntryFlags::OLD_FORMAT) {
                '*'
            } else {
                ' '
            };
            format!(
                "{index:>4}{legacy} {:<9} {:>3}  {}",
                entry_kind(entry.flags()),
                entry.actions().len(),
                entry.name
            )
        })
        .collect())
}
