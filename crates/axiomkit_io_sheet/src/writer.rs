//! Record write pipeline: places batches of records onto a sheet through the
//! handler chain and converter registry.

use std::sync::Arc;

use tracing::{debug, info};

use crate::context::{SpecWriteSelection, WriteContext};
use crate::converter::convert_record_value;
use crate::error::SheetWriteError;
use crate::handler::{SpecCellWriteContext, SpecRowWriteContext, WriteObserver};
use crate::mapper::{EnumRecord, resolve_record_cells};
use crate::sheet::{SheetSink, WorkbookBackend};
use crate::spec::{
    EnumCellData, SpecCellHandle, SpecFieldMetadata, SpecSheetWriteReport, SpecWriteSheet,
    SpecWriteTable, SpecWriteWorkbook,
};
use crate::util::{derive_row_idx_start, validate_merge_range};

/// Stateful write session over one workbook backend.
///
/// Nothing is persisted until [`Self::finish`] is called.
pub struct SheetWriteSession<B: WorkbookBackend> {
    context: WriteContext<B>,
    l_reports: Vec<SpecSheetWriteReport>,
    if_closed: bool,
}

impl<B: WorkbookBackend> SheetWriteSession<B> {
    /// Create a session; fails when a workbook-level declared column type has
    /// no converter.
    pub fn new(backend: B, workbook: SpecWriteWorkbook) -> Result<Self, SheetWriteError> {
        Ok(Self {
            context: WriteContext::new(backend, workbook)?,
            l_reports: Vec::new(),
            if_closed: false,
        })
    }

    /// Append `records` to `sheet`.
    pub fn add_content(
        &mut self,
        records: &[EnumRecord],
        sheet: &SpecWriteSheet,
    ) -> Result<(), SheetWriteError> {
        self.add_content_with_table(records, sheet, None)
    }

    /// Append `records` to `table` of `sheet` (or to the sheet itself when
    /// `table` is `None`).
    ///
    /// A failed call leaves the sheet populated up to the failing cell; its
    /// report still records what was committed.
    pub fn add_content_with_table(
        &mut self,
        records: &[EnumRecord],
        sheet: &SpecWriteSheet,
        table: Option<&SpecWriteTable>,
    ) -> Result<(), SheetWriteError> {
        self.validate_open()?;
        self.context.select_sheet(sheet)?;
        self.context.select_table(table)?;

        if records.is_empty() {
            debug!(sheet_no = sheet.sheet_no, "skipped empty batch");
            return Ok(());
        }

        let selection = self.context.take_selection()?;
        let observer = self.context.observer().cloned();
        let sink = self.context.current_sheet_mut()?;
        let n_row_start = derive_row_idx_start(
            sink.last_row_index(),
            selection.config.relative_head_row_index,
            selection.if_new,
        );

        debug!(
            sheet_name = %selection.sheet_name,
            table_no = ?selection.table_no,
            row_start = n_row_start,
            n_records = records.len(),
            "writing batch"
        );

        let mut report = SpecSheetWriteReport {
            sheet_no: selection.sheet_no,
            sheet_name: selection.sheet_name.clone(),
            table_no: selection.table_no,
            row_idx_start: n_row_start,
            ..Default::default()
        };
        let result = write_records(
            sink,
            &selection,
            observer.as_ref(),
            records,
            n_row_start,
            &mut report,
        );
        self.l_reports.push(report);
        result
    }

    /// Merge a rectangular range on the current sheet. Cell contents are left
    /// untouched.
    pub fn merge(
        &mut self,
        first_row: usize,
        last_row: usize,
        first_col: usize,
        last_col: usize,
    ) -> Result<(), SheetWriteError> {
        self.validate_open()?;
        validate_merge_range(first_row, last_row, first_col, last_col)?;
        self.context
            .current_sheet_mut()?
            .add_merged_region(first_row, last_row, first_col, last_col)
    }

    /// Hand every sheet to the backend. Idempotent once it succeeds; a failed
    /// finish leaves the session open with every sheet intact.
    pub fn finish(&mut self) -> Result<(), SheetWriteError> {
        if self.if_closed {
            return Ok(());
        }
        self.context.finish()?;
        self.if_closed = true;
        info!(n_batches = self.l_reports.len(), "sheet write session finished");
        Ok(())
    }

    /// Return immutable snapshot of per-batch write reports.
    pub fn report(&self) -> Vec<SpecSheetWriteReport> {
        self.l_reports.clone()
    }

    /// Sheet collaborator by number; `None` after finish.
    pub fn sheet(&self, sheet_no: usize) -> Option<&B::Sheet> {
        self.context.sheet(sheet_no)
    }

    pub fn backend(&self) -> &B {
        self.context.backend()
    }

    pub fn is_closed(&self) -> bool {
        self.if_closed
    }

    fn validate_open(&self) -> Result<(), SheetWriteError> {
        if self.if_closed {
            return Err(SheetWriteError::SessionClosed);
        }
        Ok(())
    }
}

fn write_records<S: SheetSink>(
    sink: &mut S,
    selection: &SpecWriteSelection,
    observer: Option<&Arc<dyn WriteObserver>>,
    records: &[EnumRecord],
    n_row_start: usize,
    report: &mut SpecSheetWriteReport,
) -> Result<(), SheetWriteError> {
    let config = selection.config.as_ref();

    for (n_idx_record, record) in records.iter().enumerate() {
        let row_idx = n_row_start + n_idx_record;
        let ctx_row = SpecRowWriteContext {
            sheet_no: selection.sheet_no,
            sheet_name: &selection.sheet_name,
            table_no: selection.table_no,
            row_idx,
            relative_row_idx: n_idx_record,
            is_head: false,
            row: None,
        };
        config.chain.invoke_before_row_create(&ctx_row)?;
        let row = sink.create_row(row_idx)?;
        report.cnt_rows += 1;
        if let Some(observer) = observer {
            observer.row(row_idx, &row);
        }
        config.chain.invoke_after_row_create(&SpecRowWriteContext {
            row: Some(row),
            ..ctx_row
        })?;

        for cell in resolve_record_cells(record, &config.head, &config.l_content_properties) {
            if cell.value.is_null() {
                report.cnt_cells_null += 1;
                continue;
            }
            let ctx_cell = SpecCellWriteContext {
                sheet_no: selection.sheet_no,
                sheet_name: &selection.sheet_name,
                table_no: selection.table_no,
                row_idx,
                relative_row_idx: n_idx_record,
                col_idx: cell.col_idx,
                head: cell.head,
                is_head: false,
                cell: None,
                cell_data: None,
            };
            config.chain.invoke_before_cell_create(&ctx_cell)?;

            let field = SpecFieldMetadata {
                head: cell.head,
                row_idx,
                col_idx: cell.col_idx,
            };
            let cell_data =
                convert_record_value(&config.registry, cell.content_property, &cell.value, &field)?;

            let handle = sink.create_cell(&row, cell.col_idx)?;
            apply_cell_data(sink, &handle, &cell_data)?;
            report.cnt_cells += 1;
            if cell.if_overflow {
                report.cnt_cells_overflow += 1;
            }
            if let Some(observer) = observer {
                observer.cell(row_idx, &handle);
            }
            config.chain.invoke_after_cell_create(&SpecCellWriteContext {
                cell: Some(handle),
                cell_data: Some(&cell_data),
                ..ctx_cell
            })?;
        }
    }
    Ok(())
}

fn apply_cell_data<S: SheetSink>(
    sink: &mut S,
    cell: &SpecCellHandle,
    cell_data: &EnumCellData,
) -> Result<(), SheetWriteError> {
    match cell_data {
        EnumCellData::Text(val) => sink.set_text(cell, val),
        EnumCellData::Boolean(val) => sink.set_boolean(cell, *val),
        EnumCellData::Number(val) => sink.set_number(cell, *val),
        // The created cell stays blank.
        EnumCellData::Empty => Ok(()),
    }
}
