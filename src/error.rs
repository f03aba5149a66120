//! Structured error types for xlcards.
//!
//! Loading errors and deck validation errors are kept apart: a load failure
//! ends one load attempt, a validation failure rejects one "start study"
//! request and leaves the running session untouched.

use serde::{Deserialize, Serialize};

/// All errors that can occur while loading a workbook or building a deck.
#[derive(Debug, thiserror::Error)]
pub enum XlcardsError {
    /// XML parsing error from quick-xml.
    #[error("XML parsing: {0}")]
    Xml(#[from] quick_xml::Error),

    /// ZIP archive error.
    #[error("ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A sheet index or name that the workbook does not contain.
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// The requested deck violates a row or column constraint.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, XlcardsError>;

/// Coarse category of a rejected deck request, for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationReason {
    InvalidRowRange,
    InvalidColumnSelection,
    NoAnswerColumns,
}

/// A deck request that cannot be honoured. Messages name the exact bound.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("No answer columns selected")]
    NoAnswerColumns,

    #[error("Row numbers must be at least 2 (row 1 contains headers), got {start_row}..{end_row}")]
    HeaderRow { start_row: u32, end_row: u32 },

    #[error("Start row {start_row} cannot be greater than end row {end_row}")]
    StartAfterEnd { start_row: u32, end_row: u32 },

    #[error("Row {row} exceeds {max_row} (total rows in sheet)")]
    RowOutOfBounds { row: u32, max_row: u32 },

    #[error("Column {column} is outside 1..={max_column}")]
    ColumnOutOfBounds { column: u32, max_column: u32 },

    #[error("Answer column {column} is selected more than once")]
    DuplicateAnswerColumn { column: u32 },

    #[error("Sheet has no data")]
    EmptySheet,
}

impl ValidationError {
    /// The category reported to the presentation layer.
    #[must_use]
    pub fn reason(&self) -> ValidationReason {
        match self {
            Self::NoAnswerColumns => ValidationReason::NoAnswerColumns,
            Self::HeaderRow { .. }
            | Self::StartAfterEnd { .. }
            | Self::RowOutOfBounds { .. }
            | Self::EmptySheet => ValidationReason::InvalidRowRange,
            Self::ColumnOutOfBounds { .. } | Self::DuplicateAnswerColumn { .. } => {
                ValidationReason::InvalidColumnSelection
            }
        }
    }
}
