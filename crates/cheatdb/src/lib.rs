//! Checker and converter for cheat database files.

use env_logger as _;

/// Database-level operations behind each CLI command.
pub mod commands;
/// Text rendering of load reports and entry analysis.
pub mod report;
