//! Text database: decoding records into entries and search regions, and
//! writing them back in the current grammar.

/// Record encoder.
pub mod encode;
/// Line grammars and record decoding.
pub mod grammar;

pub use encode::{encode_action, encode_entry, encode_region, sanitize_field};
pub use grammar::{decode_line, decode_line_checked, CheatRecord, Grammar, Record, RegionRecord};

use std::path::Path;

use crate::diag::LoadReport;
use crate::encoding::LinkLevel;
use crate::fault::EngineError;
use crate::model::{CheatEntry, CheatList};
use crate::search::{SearchRegion, SearchSession};

/// Separator of a database file list.
pub const FILE_LIST_SEPARATOR: char = ';';

/// Reads one database file.
///
/// # Errors
///
/// Returns [`EngineError::Io`] when the file cannot be read.
pub fn read_database_file(path: &Path) -> Result<String, EngineError> {
    std::fs::read_to_string(path).map_err(|source| EngineError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Entries and search regions loaded from one or more database files.
#[derive(Debug, Clone, Default)]
pub struct CheatDatabase {
    /// Loaded entries.
    pub entries: CheatList,
    /// Search regions found in the database.
    pub search: SearchSession,
    /// What loading skipped and why.
    pub report: LoadReport,
}

impl CheatDatabase {
    /// Empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads records from `text`, keeping only `driver` when given.
    ///
    /// Malformed lines are skipped and counted in [`CheatDatabase::report`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Allocation`] when the entry list or search
    /// buffers cannot grow.
    pub fn load_str(&mut self, text: &str, driver: Option<&str>) -> Result<(), EngineError> {
        self.load_text(text, driver, None)
    }

    /// Loads every file of a `;`-separated list; unreadable files are
    /// counted and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Allocation`] when the entry list or search
    /// buffers cannot grow.
    pub fn load_files(&mut self, list: &str, driver: Option<&str>) -> Result<(), EngineError> {
        for path in list
            .split(FILE_LIST_SEPARATOR)
            .map(str::trim)
            .filter(|p| !p.is_empty())
        {
            match read_database_file(Path::new(path)) {
                Ok(text) => self.load_text(&text, driver, Some(path))?,
                Err(error) => {
                    log::warn!("skipping database: {error}");
                    self.report.record_unreadable_file();
                }
            }
        }
        Ok(())
    }

    /// Writes every entry and region for `driver` in the current grammar.
    #[must_use]
    pub fn to_text(&self, driver: &str) -> String {
        let mut text = String::new();
        for entry in &self.entries {
            text.push_str(&encode_entry(entry, driver));
        }
        for region in self.search.regions() {
            text.push_str(&encode_region(region, driver));
        }
        text
    }

    fn load_text(
        &mut self,
        text: &str,
        driver: Option<&str>,
        file: Option<&str>,
    ) -> Result<(), EngineError> {
        let mut pending: Option<CheatEntry> = None;
        let mut regions = Vec::new();

        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            self.report.record_line();
            let record = match decode_line_checked(line) {
                Ok(Some(record)) => record,
                Ok(None) => {
                    self.report.record_ignored();
                    continue;
                }
                Err(error) => {
                    log::warn!("{}:{line_no}: skipped: {error}", file.unwrap_or("<text>"));
                    self.report.record_format_error(file, line_no, error);
                    continue;
                }
            };

            match record {
                Record::Region(record) => {
                    if driver.is_some_and(|d| d != record.driver) {
                        self.report.record_filtered();
                        continue;
                    }
                    self.report.record_region();
                    regions.push(record.region);
                }
                Record::Cheat(record) => {
                    if driver.is_some_and(|d| d != record.driver) {
                        self.report.record_filtered();
                        continue;
                    }
                    let starts_entry = record.action.link() == LinkLevel::Master;
                    if starts_entry {
                        self.flush(pending.take())?;
                        let mut entry =
                            CheatEntry::with_actions(0, record.action.name.clone(), vec![record.action])?;
                        entry.comment = record.comment.unwrap_or_default();
                        pending = Some(entry);
                    } else if let Some(entry) = pending.as_mut() {
                        entry.actions.push(record.action);
                    } else {
                        log::warn!(
                            "{}:{line_no}: linked record without a master",
                            file.unwrap_or("<text>")
                        );
                        self.report.record_orphan();
                        continue;
                    }
                    self.report.record_action(starts_entry);
                }
            }
        }
        self.flush(pending)?;
        self.add_regions(regions)
    }

    fn flush(&mut self, entry: Option<CheatEntry>) -> Result<(), EngineError> {
        if let Some(mut entry) = entry {
            entry.update_derived_flags();
            self.entries.push(entry)?;
        }
        Ok(())
    }

    fn add_regions(&mut self, regions: Vec<SearchRegion>) -> Result<(), EngineError> {
        if regions.is_empty() {
            return Ok(());
        }
        let mut all = self.search.regions().to_vec();
        all.extend(regions);
        self.search.set_regions(all)
    }
}
