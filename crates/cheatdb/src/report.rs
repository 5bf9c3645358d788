use std::fmt;

use cheat_core::{EntryFlags, ErrorFlags, LineDiagnostic, LoadReport};

/// Structural problems found in one loaded entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryProblem {
    /// Position in the loaded list.
    pub index: usize,
    /// Entry name.
    pub name: String,
    /// Every flag raised for the entry's actions.
    pub flags: ErrorFlags,
}

impl fmt::Display for EntryProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entry {} ({}): {}",
            self.index,
            self.name,
            flag_names(self.flags)
        )
    }
}

/// Comma-separated names of the raised flags.
#[must_use]
pub fn flag_names(flags: ErrorFlags) -> String {
    flags
        .iter_names()
        .map(|(name, _)| name.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `file:line: error` for a skipped line.
#[must_use]
pub fn format_diagnostic(diagnostic: &LineDiagnostic) -> String {
    format!(
        "{}:{}: {}",
        diagnostic.file.as_deref().unwrap_or("<input>"),
        diagnostic.line,
        diagnostic.error
    )
}

/// One-line summary of what a load accepted and skipped.
#[must_use]
pub fn summary(report: &LoadReport) -> String {
    format!(
        "{} entries, {} actions, {} regions; {} malformed, {} orphaned, {} filtered, {} unreadable",
        report.entries_loaded,
        report.actions_loaded,
        report.regions_loaded,
        report.format_errors,
        report.orphan_links,
        report.filtered_out,
        report.unreadable_files,
    )
}

/// Short label for what kind of entry this is.
#[must_use]
pub fn entry_kind(flags: EntryFlags) -> &'static str {
    if flags.contains(EntryFlags::SEPARATOR) {
        "separator"
    } else if flags.contains(EntryFlags::LAYER_MARKER) {
        "layer"
    } else if flags.contains(EntryFlags::SELECT) {
        "select"
    } else if flags.contains(EntryFlags::NULL) {
        "comment"
    } else if flags.contains(EntryFlags::USER_SELECT) {
        "value"
    } else if flags.contains(EntryFlags::ONE_SHOT) {
        "one-shot"
    } else {
        "cheat"
    }
}
