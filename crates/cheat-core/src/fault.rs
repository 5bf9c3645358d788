use thiserror::Error;

use crate::api::Location;

/// Error classes used for load reports and policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ErrorClass {
    /// Malformed instruction combination or entry shape.
    Structural,
    /// Address, region or CPU that could not be resolved at run time.
    Resolution,
    /// Buffer allocation failure.
    Resource,
    /// Unparseable database line or unknown legacy code.
    Format,
}

/// Memory access failures reported by an [`AddressSpace`](crate::AddressSpace).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AccessError {
    /// The host has no space for this location.
    #[error("unknown location {0}")]
    UnknownLocation(Location),
    /// The address lies beyond the space's mask or backing store.
    #[error("address {address:#x} out of range for {location}")]
    OutOfRange {
        /// Space that rejected the access.
        location: Location,
        /// Offending byte address.
        address: u32,
    },
    /// The space exists but has no backing memory right now.
    #[error("{0} has no backing memory")]
    NotPresent(Location),
}

/// Problems found while decoding one database line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum FormatError {
    /// No grammar accepts this many `:`-separated fields.
    #[error("unexpected field count {0}")]
    FieldCount(usize),
    /// A fixed-width field has the wrong number of digits.
    #[error("field {field} has width {actual}, expected {expected}")]
    FieldWidth {
        /// Zero-based field position.
        field: usize,
        /// Digits required by the grammar.
        expected: &'static str,
        /// Digits present.
        actual: usize,
    },
    /// A numeric field does not parse.
    #[error("field {field} is not a valid number: {text:?}")]
    BadNumber {
        /// Zero-based field position.
        field: usize,
        /// Offending text.
        text: String,
    },
    /// The legacy opcode is not in the conversion table.
    #[error("unknown legacy code {0}")]
    UnknownLegacyCode(u32),
    /// The location field names no known space kind.
    #[error("unknown location code {0:#06x}")]
    UnknownLocation(u32),
}

/// Errors surfaced by model, search and database operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Requested change would break an ownership or ordering invariant.
    #[error("invariant violation: {0}")]
    InvariantViolation(&'static str),
    /// Label-select entry has fewer than two labels.
    #[error("label-select entry has {labels} label(s), at least 2 required")]
    MalformedLabels {
        /// Labels that were found.
        labels: usize,
    },
    /// A buffer could not be grown; previous state is kept.
    #[error("allocation of {requested} elements failed")]
    Allocation {
        /// Number of elements requested.
        requested: usize,
    },
    /// Memory access failed.
    #[error(transparent)]
    Access(#[from] AccessError),
    /// Database line could not be decoded.
    #[error("line {line}: {source}")]
    Format {
        /// One-based line number.
        line: usize,
        /// Underlying format problem.
        source: FormatError,
    },
    /// Reading a database file failed.
    #[error("{path}: {source}")]
    Io {
        /// File that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl EngineError {
    /// Returns the handling class of this error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::InvariantViolation(_) | Self::MalformedLabels { .. } => ErrorClass::Structural,
            Self::Access(_) => ErrorClass::Resolution,
            Self::Allocation { .. } | Self::Io { .. } => ErrorClass::Resource,
            Self::Format { .. } => ErrorClass::Format,
        }
    }
}

impl From<std::collections::TryReserveError> for EngineError {
    fn from(_: std::collections::TryReserveError) -> Self {
        Self::Allocation { requested: 0 }
    }
}
