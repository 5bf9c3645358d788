//! Load diagnostics for database files.

use crate::fault::{ErrorClass, FormatError};

/// One rejected database line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDiagnostic {
    /// File the line came from, when loading from disk.
    pub file: Option<String>,
    /// One-based line number.
    pub line: usize,
    /// Why the line was skipped.
    pub error: FormatError,
}

/// Saturating counters collected while loading a database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Lines seen, including blanks and comments.
    pub lines_total: u32,
    /// Cheat records turned into actions.
    pub actions_loaded: u32,
    /// Entries created from master records.
    pub entries_loaded: u32,
    /// Search region records accepted.
    pub regions_loaded: u32,
    /// Blank or `#` lines.
    pub lines_ignored: u32,
    /// Lines skipped for a format problem.
    pub format_errors: u32,
    /// Subset of `format_errors` caused by unknown legacy codes.
    pub unknown_legacy_codes: u32,
    /// Linked records with no preceding master.
    pub orphan_links: u32,
    /// Records for another driver.
    pub filtered_out: u32,
    /// Files in the list that could not be read.
    pub unreadable_files: u32,
    /// Per-line details for every format error.
    pub diagnostics: Vec<LineDiagnostic>,
}

impl LoadReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a skipped line.
    pub fn record_format_error(&mut self, file: Option<&str>, line: usize, error: FormatError) {
        self.format_errors = self.format_errors.saturating_add(1);
        if matches!(error, FormatError::UnknownLegacyCode(_)) {
            self.unknown_legacy_codes = self.unknown_legacy_codes.saturating_add(1);
        }
        self.diagnostics.push(LineDiagnostic {
            file: file.map(str::to_owned),
            line,
            error,
        });
    }

    /// Counts a line seen.
    #[allow(clippy::missing_const_for_fn)]
    pub fn record_line(&mut self) {
        self.lines_total = self.lines_total.saturating_add(1);
    }

    /// Counts a blank or comment line.
    #[allow(clippy::missing_const_for_fn)]
    pub fn record_ignored(&mut self) {
        self.lines_ignored = self.lines_ignored.saturating_add(1);
    }

    /// Counts an accepted action, and an entry when it starts one.
    #[allow(clippy::missing_const_for_fn)]
    pub fn record_action(&mut self, starts_entry: bool) {
        self.actions_loaded = self.actions_loaded.saturating_add(1);
        if starts_entry {
            self.entries_loaded = self.entries_loaded.saturating_add(1);
        }
    }

    /// Counts an accepted search region.
    #[allow(clippy::missing_const_for_fn)]
    pub fn record_region(&mut self) {
        self.regions_loaded = self.regions_loaded.saturating_add(1);
    }

    /// Counts a linked record without a master.
    #[allow(clippy::missing_const_for_fn)]
    pub fn record_orphan(&mut self) {
        self.orphan_links = self.orphan_links.saturating_add(1);
    }

    /// Counts a record for another driver.
    #[allow(clippy::missing_const_for_fn)]
    pub fn record_filtered(&mut self) {
        self.filtered_out = self.filtered_out.saturating_add(1);
    }

    /// Counts a file that could not be read.
    #[allow(clippy::missing_const_for_fn)]
    pub fn record_unreadable_file(&mut self) {
        self.unreadable_files = self.unreadable_files.saturating_add(1);
    }

    /// Problems that made part of the input inert, by class.
    #[must_use]
    pub fn count_by_class(&self, class: ErrorClass) -> u32 {
        match class {
            ErrorClass::Format => self.format_errors,
            ErrorClass::Structural => self.orphan_links,
            ErrorClass::Resource => self.unreadable_files,
            ErrorClass::Resolution => 0,
        }
    }

    /// True when nothing was skipped.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.format_errors == 0 && self.orphan_links == 0 && self.unreadable_files == 0
    }

    /// Resets all counters and drops the diagnostics.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
