//! `axiomkit_io_sheet` v1:
//! Rust-side record-to-sheet write kernel.
//!
//! Modules:
//! - `conf`      : constants and default presets
//! - `spec`      : record values, head mappings, write targets, reports
//! - `error`     : write error taxonomy
//! - `util`      : pure helper functions
//! - `converter` : value converters and the converter registry
//! - `mapper`    : record shapes and column resolution
//! - `handler`   : row/cell lifecycle handlers
//! - `sheet`     : sheet/workbook collaborator contracts, in-memory backend
//! - `context`   : per-session cursor and resolved configuration
//! - `writer`    : write pipeline session
//! - `xlsx`      : `rust_xlsxwriter` backend
//! - `frame`     : Polars DataFrame record source
pub mod conf;
pub mod context;
pub mod converter;
pub mod error;
pub mod frame;
pub mod handler;
pub mod mapper;
pub mod sheet;
pub mod spec;
pub mod util;
pub mod writer;
pub mod xlsx;

pub use conf::{
    C_FMT_DATE_DEFAULT, C_FMT_DATETIME_DEFAULT, N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX,
    N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL, derive_default_converter_registry,
    derive_default_converters, derive_default_write_workbook,
};
pub use converter::{CellConverter, ConverterRegistry, FnConverter, convert_record_value};
pub use error::{BoxError, SheetWriteError};
pub use frame::{
    derive_dataframe_from_ipc_bytes, derive_head_mapping_from_dataframe,
    derive_records_from_dataframe,
};
pub use handler::{
    CellWriteHandler, EnumHandlerHook, EnumWriteHandler, HandlerChain, RowCellWriteHandler,
    RowWriteHandler, SpecCellWriteContext, SpecRowWriteContext, WriteObserver,
};
pub use mapper::{EnumRecord, NamedFieldSource, SpecResolvedCell, resolve_record_cells};
pub use sheet::{MemorySheet, MemoryWorkbook, SheetSink, SpecMergedRegion, WorkbookBackend};
pub use spec::{
    EnumCellData, EnumRecordValue, EnumValueType, SpecCellHandle, SpecColumnHead,
    SpecContentProperty, SpecFieldMetadata, SpecHeadMapping, SpecRowHandle, SpecSheetWriteReport,
    SpecWriteSheet, SpecWriteTable, SpecWriteWorkbook,
};
pub use writer::SheetWriteSession;
pub use xlsx::{XlsxSheet, XlsxWorkbook};
