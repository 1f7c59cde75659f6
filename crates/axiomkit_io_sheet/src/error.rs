//! Write pipeline error taxonomy.

use thiserror::Error;

use crate::handler::EnumHandlerHook;
use crate::spec::EnumValueType;

/// Source fault raised by converters and handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Every failure surfaced by a write session. None of them is recoverable
/// for the batch that raised it.
#[derive(Error, Debug)]
pub enum SheetWriteError {
    /// No converter is registered for the runtime type of a value.
    #[error(
        "Can not find converter for value type `{value_type}` (data: {value}) at row {row_idx}, column {col_idx}."
    )]
    UnsupportedType {
        value_type: EnumValueType,
        value: String,
        row_idx: usize,
        col_idx: usize,
    },

    /// The converter itself failed.
    #[error("Convert data `{value}` error at row {row_idx}, column {col_idx}: {source}")]
    ConversionFailed {
        value: String,
        row_idx: usize,
        col_idx: usize,
        #[source]
        source: BoxError,
    },

    /// The converter returned no cell value or an empty one.
    #[error("Convert data `{value}` returned no cell value at row {row_idx}, column {col_idx}.")]
    InvalidConversionResult {
        value: String,
        row_idx: usize,
        col_idx: usize,
    },

    /// A lifecycle handler failed.
    #[error("Handler `{hook}` failed at row {row_idx} (column {col_idx:?}): {source}")]
    HandlerFault {
        hook: EnumHandlerHook,
        row_idx: usize,
        col_idx: Option<usize>,
        #[source]
        source: BoxError,
    },

    /// A declared column type has no converter in the target's registry.
    #[error(
        "Column {col_idx} (`{name}`) declares type `{value_type}` but no converter is registered for it."
    )]
    UnregisteredDeclaredType {
        col_idx: usize,
        name: String,
        value_type: EnumValueType,
    },

    #[error("Column index {0} is declared more than once.")]
    DuplicateColumn(usize),

    #[error("Column index {0} has no declared head.")]
    UnknownColumn(usize),

    #[error(
        "Invalid merge range: rows {first_row}..={last_row}, columns {first_col}..={last_col}."
    )]
    InvalidMergeRange {
        first_row: usize,
        last_row: usize,
        first_col: usize,
        last_col: usize,
    },

    #[error("{axis} index overflow: {value}")]
    IndexOverflow { axis: &'static str, value: usize },

    #[error("No sheet selected; call add_content() first.")]
    NoCurrentSheet,

    #[error("Cannot write after finish().")]
    SessionClosed,

    /// Sheet/workbook collaborator failure.
    #[error("{0}")]
    Backend(String),

    /// DataFrame decoding failure.
    #[error("{0}")]
    Frame(String),
}

impl From<rust_xlsxwriter::XlsxError> for SheetWriteError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Self::Backend(format!("xlsx write error: {err}"))
    }
}

impl From<polars::prelude::PolarsError> for SheetWriteError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        Self::Frame(format!("polars error: {err}"))
    }
}
