//! Shared record/sheet specification models.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use crate::converter::CellConverter;
use crate::error::SheetWriteError;
use crate::handler::{EnumWriteHandler, WriteObserver};

////////////////////////////////////////////////////////////////////////////////
// #region RecordValues

/// Stable runtime type key of a record value, used for converter dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EnumValueType {
    /// `true` / `false`.
    Boolean,
    /// Signed 64-bit integer.
    Integer,
    /// 64-bit float.
    Float,
    /// UTF-8 text.
    String,
    /// Calendar date without time.
    Date,
    /// Date and time without timezone.
    DateTime,
    /// Caller-defined semantic type, e.g. `"uuid"`.
    Custom(String),
}

impl fmt::Display for EnumValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => write!(f, "boolean"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::String => write!(f, "string"),
            Self::Date => write!(f, "date"),
            Self::DateTime => write!(f, "datetime"),
            Self::Custom(type_key) => write!(f, "{type_key}"),
        }
    }
}

/// One raw value inside a record.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumRecordValue {
    /// Missing value. Never written.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// Integer value.
    Integer(i64),
    /// Floating-point value.
    Float(f64),
    /// Text value.
    String(String),
    /// Date value.
    Date(NaiveDate),
    /// Datetime value.
    DateTime(NaiveDateTime),
    /// Value of a caller-defined type, carried as its text form.
    Custom {
        /// Converter dispatch key.
        type_key: String,
        /// Text payload handed to the converter.
        text: String,
    },
}

impl EnumRecordValue {
    /// Runtime type key, or `None` for [`EnumRecordValue::Null`].
    pub fn value_type(&self) -> Option<EnumValueType> {
        match self {
            Self::Null => None,
            Self::Boolean(_) => Some(EnumValueType::Boolean),
            Self::Integer(_) => Some(EnumValueType::Integer),
            Self::Float(_) => Some(EnumValueType::Float),
            Self::String(_) => Some(EnumValueType::String),
            Self::Date(_) => Some(EnumValueType::Date),
            Self::DateTime(_) => Some(EnumValueType::DateTime),
            Self::Custom { type_key, .. } => Some(EnumValueType::Custom(type_key.clone())),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for EnumRecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(val) => write!(f, "{val}"),
            Self::Integer(val) => write!(f, "{val}"),
            Self::Float(val) => write!(f, "{val}"),
            Self::String(val) => write!(f, "{val}"),
            Self::Date(val) => write!(f, "{val}"),
            Self::DateTime(val) => write!(f, "{val}"),
            Self::Custom { type_key, text } => write!(f, "{type_key}({text})"),
        }
    }
}

impl From<bool> for EnumRecordValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i32> for EnumRecordValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<i64> for EnumRecordValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for EnumRecordValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for EnumRecordValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for EnumRecordValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<NaiveDate> for EnumRecordValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<NaiveDateTime> for EnumRecordValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl<T: Into<EnumRecordValue>> From<Option<T>> for EnumRecordValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellData

/// Typed cell value produced by a converter.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellData {
    /// Written with the sheet's text setter.
    Text(String),
    /// Written with the sheet's boolean setter.
    Boolean(bool),
    /// Written with the sheet's number setter.
    Number(f64),
    /// No recognizable kind; rejected by the pipeline.
    Empty,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region HeadMapping

/// One declared column of a write target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecColumnHead {
    /// Zero-based destination column index.
    pub col_idx: usize,
    /// Column name; also the field name matched on named records.
    pub name: String,
    /// Declared value type, checked against the registry up front.
    pub value_type: Option<EnumValueType>,
    /// Optional format pattern consumed by converters (e.g. date patterns).
    pub format: Option<String>,
}

impl SpecColumnHead {
    pub fn new(col_idx: usize, name: impl Into<String>) -> Self {
        Self {
            col_idx,
            name: name.into(),
            value_type: None,
            format: None,
        }
    }

    pub fn with_value_type(mut self, value_type: EnumValueType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// Ordered column layout (column index -> head) of a write target.
///
/// Iteration is always in ascending column-index order.
#[derive(Debug, Clone, Default)]
pub struct SpecHeadMapping {
    dict_heads: BTreeMap<usize, SpecColumnHead>,
    dict_converter_overrides: BTreeMap<usize, Arc<dyn CellConverter>>,
}

impl SpecHeadMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare contiguous columns `0..n` from names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dict_heads = names
            .into_iter()
            .enumerate()
            .map(|(col_idx, name)| (col_idx, SpecColumnHead::new(col_idx, name)))
            .collect();
        Self {
            dict_heads,
            dict_converter_overrides: BTreeMap::new(),
        }
    }

    /// Declare one column. Each index may be declared once.
    pub fn insert(&mut self, head: SpecColumnHead) -> Result<(), SheetWriteError> {
        if self.dict_heads.contains_key(&head.col_idx) {
            return Err(SheetWriteError::DuplicateColumn(head.col_idx));
        }
        self.dict_heads.insert(head.col_idx, head);
        Ok(())
    }

    /// Builder form of [`Self::insert`].
    pub fn with_column(mut self, head: SpecColumnHead) -> Result<Self, SheetWriteError> {
        self.insert(head)?;
        Ok(self)
    }

    /// Pin a converter to one declared column, bypassing runtime-type dispatch.
    pub fn set_converter_override(
        &mut self,
        col_idx: usize,
        converter: Arc<dyn CellConverter>,
    ) -> Result<(), SheetWriteError> {
        if !self.dict_heads.contains_key(&col_idx) {
            return Err(SheetWriteError::UnknownColumn(col_idx));
        }
        self.dict_converter_overrides.insert(col_idx, converter);
        Ok(())
    }

    pub fn get(&self, col_idx: usize) -> Option<&SpecColumnHead> {
        self.dict_heads.get(&col_idx)
    }

    pub fn converter_override(&self, col_idx: usize) -> Option<&Arc<dyn CellConverter>> {
        self.dict_converter_overrides.get(&col_idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpecColumnHead> {
        self.dict_heads.values()
    }

    pub fn len(&self) -> usize {
        self.dict_heads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict_heads.is_empty()
    }

    /// Highest declared column index.
    pub fn last_col_idx(&self) -> Option<usize> {
        self.dict_heads.keys().next_back().copied()
    }

    /// Build content properties in column order.
    pub fn derive_content_properties(&self) -> Vec<SpecContentProperty> {
        self.dict_heads
            .values()
            .map(|head| SpecContentProperty {
                col_idx: head.col_idx,
                field_name: head.name.clone(),
                converter_override: self.dict_converter_overrides.get(&head.col_idx).cloned(),
            })
            .collect()
    }
}

/// Binding of a named field to a destination column.
#[derive(Debug, Clone)]
pub struct SpecContentProperty {
    /// Destination column index.
    pub col_idx: usize,
    /// Field looked up on named records.
    pub field_name: String,
    /// Converter that wins over runtime-type dispatch.
    pub converter_override: Option<Arc<dyn CellConverter>>,
}

/// Field metadata handed to converters.
#[derive(Debug, Clone, Copy)]
pub struct SpecFieldMetadata<'a> {
    /// Declared head; `None` for overflow columns.
    pub head: Option<&'a SpecColumnHead>,
    /// Absolute row index being written.
    pub row_idx: usize,
    /// Resolved column index.
    pub col_idx: usize,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WriteTargets

/// Workbook-level write configuration; sheets and tables inherit from it.
#[derive(Debug, Clone)]
pub struct SpecWriteWorkbook {
    /// Fallback head mapping when neither sheet nor table declares one.
    pub head: Option<SpecHeadMapping>,
    /// Register the built-in converters before `converters`.
    pub if_use_default_converters: bool,
    /// Extra converters; replace defaults with the same value type.
    pub converters: Vec<Arc<dyn CellConverter>>,
    /// Handlers run first in every chain.
    pub handlers: Vec<EnumWriteHandler>,
    /// Convenience sink notified after every realized row/cell.
    pub observer: Option<Arc<dyn WriteObserver>>,
    /// Rows skipped before the first batch on a fresh sheet/table.
    pub relative_head_row_index: usize,
}

impl Default for SpecWriteWorkbook {
    fn default() -> Self {
        Self {
            head: None,
            if_use_default_converters: true,
            converters: Vec::new(),
            handlers: Vec::new(),
            observer: None,
            relative_head_row_index: 0,
        }
    }
}

/// Sheet selector and sheet-level overrides.
#[derive(Debug, Clone, Default)]
pub struct SpecWriteSheet {
    /// Zero-based sheet number; the identity of the sheet within a session.
    pub sheet_no: usize,
    /// Display name; defaults to `Sheet{sheet_no + 1}`.
    pub sheet_name: Option<String>,
    /// Sheet head mapping.
    pub head: Option<SpecHeadMapping>,
    /// Overrides the workbook head-row offset.
    pub relative_head_row_index: Option<usize>,
    /// Converters layered over the workbook registry.
    pub converters: Vec<Arc<dyn CellConverter>>,
    /// Handlers appended after workbook handlers.
    pub handlers: Vec<EnumWriteHandler>,
}

impl SpecWriteSheet {
    pub fn new(sheet_no: usize) -> Self {
        Self {
            sheet_no,
            ..Default::default()
        }
    }

    pub fn with_name(mut self, sheet_name: impl Into<String>) -> Self {
        self.sheet_name = Some(sheet_name.into());
        self
    }

    pub fn with_head(mut self, head: SpecHeadMapping) -> Self {
        self.head = Some(head);
        self
    }

    pub fn with_relative_head_row_index(mut self, n_rows: usize) -> Self {
        self.relative_head_row_index = Some(n_rows);
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn CellConverter>) -> Self {
        self.converters.push(converter);
        self
    }

    pub fn with_handler(mut self, handler: EnumWriteHandler) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Effective sheet name.
    pub fn derive_sheet_name(&self) -> String {
        self.sheet_name
            .clone()
            .unwrap_or_else(|| format!("Sheet{}", self.sheet_no + 1))
    }
}

/// Table selector inside a sheet, with table-level overrides.
#[derive(Debug, Clone, Default)]
pub struct SpecWriteTable {
    /// Table number; unique within its sheet.
    pub table_no: usize,
    /// Table head mapping; wins over the sheet head.
    pub head: Option<SpecHeadMapping>,
    /// Overrides the sheet head-row offset.
    pub relative_head_row_index: Option<usize>,
    /// Converters layered over the sheet registry.
    pub converters: Vec<Arc<dyn CellConverter>>,
    /// Handlers appended after sheet handlers.
    pub handlers: Vec<EnumWriteHandler>,
}

impl SpecWriteTable {
    pub fn new(table_no: usize) -> Self {
        Self {
            table_no,
            ..Default::default()
        }
    }

    pub fn with_head(mut self, head: SpecHeadMapping) -> Self {
        self.head = Some(head);
        self
    }

    pub fn with_relative_head_row_index(mut self, n_rows: usize) -> Self {
        self.relative_head_row_index = Some(n_rows);
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn CellConverter>) -> Self {
        self.converters.push(converter);
        self
    }

    pub fn with_handler(mut self, handler: EnumWriteHandler) -> Self {
        self.handlers.push(handler);
        self
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Handles

/// Row realized by a sheet collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecRowHandle {
    pub row_idx: usize,
}

/// Cell realized by a sheet collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecCellHandle {
    pub row_idx: usize,
    pub col_idx: usize,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// Per `add_content` call report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecSheetWriteReport {
    /// Target sheet number.
    pub sheet_no: usize,
    /// Target sheet name.
    pub sheet_name: String,
    /// Target table, if any.
    pub table_no: Option<usize>,
    /// First row written by the batch.
    pub row_idx_start: usize,
    /// Rows created.
    pub cnt_rows: u64,
    /// Cells committed.
    pub cnt_cells: u64,
    /// Null values skipped.
    pub cnt_cells_null: u64,
    /// Cells committed to overflow columns.
    pub cnt_cells_overflow: u64,
}

impl SpecSheetWriteReport {
    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let c_table = self
            .table_no
            .map_or_else(|| "-".to_string(), |n| n.to_string());
        format!(
            "{prefix} sheet={} table={c_table} row_start={} rows={} cells={} nulls={} overflow={}",
            self.sheet_name,
            self.row_idx_start,
            self.cnt_rows,
            self.cnt_cells,
            self.cnt_cells_null,
            self.cnt_cells_overflow
        )
    }
}

impl fmt::Display for SpecSheetWriteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[SHEET]"))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
