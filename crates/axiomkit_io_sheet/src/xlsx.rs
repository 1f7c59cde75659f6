//! XLSX workbook backend built on `rust_xlsxwriter`.
//!
//! Sheets are buffered in memory and written to disk once, in
//! [`WorkbookBackend::finish`]. Merged ranges are applied before cell values
//! so that the anchor cell of a merge keeps the value written to it.

use std::collections::BTreeSet;
use std::path::PathBuf;

use rust_xlsxwriter::{Format, Workbook, Worksheet};
use tracing::{debug, warn};

use crate::error::SheetWriteError;
use crate::sheet::{MemorySheet, SheetSink, SpecMergedRegion, WorkbookBackend};
use crate::spec::{EnumCellData, SpecCellHandle, SpecRowHandle};
use crate::util::{cast_col_num, cast_row_num, derive_unique_sheet_name, sanitize_sheet_name};

////////////////////////////////////////////////////////////////////////////////
// #region XlsxSheet

/// Buffered worksheet; validated against Excel limits as cells are created.
#[derive(Debug, Clone)]
pub struct XlsxSheet {
    grid: MemorySheet,
}

impl XlsxSheet {
    fn new(sheet_no: usize, sheet_name: String) -> Self {
        Self {
            grid: MemorySheet::new(sheet_no, sheet_name),
        }
    }

    pub fn sheet_name(&self) -> &str {
        self.grid.sheet_name()
    }

    /// Buffered cell contents.
    pub fn grid(&self) -> &MemorySheet {
        &self.grid
    }

    fn derive_worksheet(&self) -> Result<Worksheet, SheetWriteError> {
        let mut worksheet = Worksheet::new();
        worksheet.set_name(self.grid.sheet_name())?;

        let fmt_merge = Format::new();
        for region in self.grid.merged_regions() {
            if region.is_single_cell() {
                warn!(
                    sheet_name = self.grid.sheet_name(),
                    row = region.first_row,
                    col = region.first_col,
                    "skipped single-cell merge"
                );
                continue;
            }
            worksheet.merge_range(
                cast_row_num(region.first_row)?,
                cast_col_num(region.first_col)?,
                cast_row_num(region.last_row)?,
                cast_col_num(region.last_col)?,
                "",
                &fmt_merge,
            )?;
        }

        for row_idx in self.grid.rows() {
            let n_row = cast_row_num(row_idx)?;
            for (col_idx, cell_data) in self.grid.row_cells(row_idx) {
                let n_col = cast_col_num(col_idx)?;
                match cell_data {
                    EnumCellData::Text(val) => {
                        worksheet.write_string(n_row, n_col, val)?;
                    }
                    EnumCellData::Boolean(val) => {
                        worksheet.write_boolean(n_row, n_col, *val)?;
                    }
                    EnumCellData::Number(val) => {
                        worksheet.write_number(n_row, n_col, *val)?;
                    }
                    EnumCellData::Empty => {}
                }
            }
        }
        Ok(worksheet)
    }
}

impl SheetSink for XlsxSheet {
    fn create_row(&mut self, row_idx: usize) -> Result<SpecRowHandle, SheetWriteError> {
        cast_row_num(row_idx)?;
        self.grid.create_row(row_idx)
    }

    fn create_cell(
        &mut self,
        row: &SpecRowHandle,
        col_idx: usize,
    ) -> Result<SpecCellHandle, SheetWriteError> {
        cast_col_num(col_idx)?;
        self.grid.create_cell(row, col_idx)
    }

    fn set_text(&mut self, cell: &SpecCellHandle, value: &str) -> Result<(), SheetWriteError> {
        self.grid.set_text(cell, value)
    }

    fn set_boolean(&mut self, cell: &SpecCellHandle, value: bool) -> Result<(), SheetWriteError> {
        self.grid.set_boolean(cell, value)
    }

    fn set_number(&mut self, cell: &SpecCellHandle, value: f64) -> Result<(), SheetWriteError> {
        self.grid.set_number(cell, value)
    }

    /// Overlapping ranges are rejected here rather than at save time.
    fn add_merged_region(
        &mut self,
        first_row: usize,
        last_row: usize,
        first_col: usize,
        last_col: usize,
    ) -> Result<(), SheetWriteError> {
        cast_row_num(last_row)?;
        cast_col_num(last_col)?;
        let region = SpecMergedRegion {
            first_row,
            last_row,
            first_col,
            last_col,
        };
        if let Some(existing) = self
            .grid
            .merged_regions()
            .iter()
            .find(|existing| existing.overlaps(&region))
        {
            return Err(SheetWriteError::Backend(format!(
                "Merge range {region:?} overlaps existing merge {existing:?}."
            )));
        }
        self.grid
            .add_merged_region(first_row, last_row, first_col, last_col)
    }

    fn last_row_index(&self) -> Option<usize> {
        self.grid.last_row_index()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region XlsxWorkbook

/// Workbook persisted to one `.xlsx` file.
#[derive(Debug)]
pub struct XlsxWorkbook {
    path_file_out: PathBuf,
    set_sheet_names_existing: BTreeSet<String>,
    if_closed: bool,
}

impl XlsxWorkbook {
    pub fn new(path_file_out: impl Into<PathBuf>) -> Self {
        Self {
            path_file_out: path_file_out.into(),
            set_sheet_names_existing: BTreeSet::new(),
            if_closed: false,
        }
    }

    /// Return output file path as string.
    pub fn file_out(&self) -> String {
        self.path_file_out.to_string_lossy().to_string()
    }

    pub fn is_closed(&self) -> bool {
        self.if_closed
    }
}

impl WorkbookBackend for XlsxWorkbook {
    type Sheet = XlsxSheet;

    fn create_sheet(
        &mut self,
        sheet_no: usize,
        sheet_name: &str,
    ) -> Result<XlsxSheet, SheetWriteError> {
        if self.if_closed {
            return Err(SheetWriteError::SessionClosed);
        }
        let sheet_name_unique = derive_unique_sheet_name(
            &mut self.set_sheet_names_existing,
            &sanitize_sheet_name(sheet_name, "_"),
        );
        Ok(XlsxSheet::new(sheet_no, sheet_name_unique))
    }

    fn finish(&mut self, l_sheets: &[&XlsxSheet]) -> Result<(), SheetWriteError> {
        if self.if_closed {
            return Ok(());
        }
        let mut workbook = Workbook::new();
        for sheet in l_sheets {
            workbook.push_worksheet(sheet.derive_worksheet()?);
        }
        workbook.save(&self.path_file_out)?;
        self.if_closed = true;
        debug!(
            file_out = %self.file_out(),
            n_sheets = l_sheets.len(),
            "saved workbook"
        );
        Ok(())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;
    use crate::mapper::EnumRecord;
    use crate::spec::{EnumRecordValue, SpecHeadMapping, SpecWriteSheet, SpecWriteWorkbook};
    use crate::writer::SheetWriteSession;

    struct TestDir {
        path: PathBuf,
    }

    impl TestDir {
        fn new() -> Self {
            let n = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos();
            let path = std::env::temp_dir().join(format!("axiomkit_sheet_test_{n}"));
            std::fs::create_dir_all(&path).expect("create test dir");
            Self { path }
        }

        fn path(&self) -> &Path {
            &self.path
        }
    }

    impl Drop for TestDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn session_writes_xlsx_file_on_finish() {
        let dir = TestDir::new();
        let path_file_out = dir.path().join("out.xlsx");
        let mut session = SheetWriteSession::new(
            XlsxWorkbook::new(&path_file_out),
            SpecWriteWorkbook::default(),
        )
        .expect("session");

        let sheet = SpecWriteSheet::new(0)
            .with_name("data")
            .with_head(SpecHeadMapping::from_names(["id", "name"]))
            .with_relative_head_row_index(1);
        session
            .add_content(
                &[
                    EnumRecord::from_pairs([
                        ("id", EnumRecordValue::Integer(1)),
                        ("name", "a".into()),
                    ]),
                    EnumRecord::from_pairs([
                        ("id", EnumRecordValue::Integer(2)),
                        ("flag", true.into()),
                    ]),
                ],
                &sheet,
            )
            .expect("write");
        session.merge(0, 0, 0, 1).expect("merge");
        session.merge(5, 5, 5, 5).expect("single-cell merge is accepted");
        assert!(!path_file_out.exists());

        session.finish().expect("finish");
        assert!(path_file_out.exists());
        let v_bytes = std::fs::read(&path_file_out).expect("read");
        assert_eq!(&v_bytes[..2], b"PK");
        assert!(session.backend().is_closed());
    }

    #[test]
    fn failed_save_keeps_sheets_for_retry() {
        let dir = TestDir::new();
        let dir_out = dir.path().join("missing");
        let path_file_out = dir_out.join("out.xlsx");
        let mut session = SheetWriteSession::new(
            XlsxWorkbook::new(&path_file_out),
            SpecWriteWorkbook::default(),
        )
        .expect("session");
        session
            .add_content(
                &[EnumRecord::positional([EnumRecordValue::String("keep me".into())])],
                &SpecWriteSheet::new(0),
            )
            .expect("write");

        assert!(session.finish().is_err());
        assert!(!session.is_closed());
        assert!(!session.backend().is_closed());
        let sheet = session.sheet(0).expect("sheet survives failed save");
        assert_eq!(
            sheet.grid().cell(0, 0),
            Some(&EnumCellData::Text("keep me".to_string()))
        );

        std::fs::create_dir_all(&dir_out).expect("create output dir");
        session.finish().expect("retry");
        assert!(session.is_closed());
        assert!(session.sheet(0).is_none());
        let v_bytes = std::fs::read(&path_file_out).expect("read");
        assert_eq!(&v_bytes[..2], b"PK");
    }

    #[test]
    fn sheet_names_are_sanitized_and_unique() {
        let mut workbook = XlsxWorkbook::new("unused.xlsx");
        let first = workbook.create_sheet(0, "a/b").expect("sheet");
        let second = workbook.create_sheet(1, "a:b").expect("sheet");
        assert_eq!(first.sheet_name(), "a_b");
        assert_eq!(second.sheet_name(), "a_b__2");
    }

    #[test]
    fn overlapping_merge_is_rejected() {
        let mut workbook = XlsxWorkbook::new("unused.xlsx");
        let mut sheet = workbook.create_sheet(0, "Sheet1").expect("sheet");
        sheet.add_merged_region(0, 1, 0, 1).expect("merge");
        assert!(matches!(
            sheet.add_merged_region(1, 2, 1, 2),
            Err(SheetWriteError::Backend(_))
        ));
        sheet.add_merged_region(2, 2, 0, 1).expect("disjoint merge");
        assert_eq!(sheet.grid().merged_regions().len(), 2);
    }

    #[test]
    fn cell_beyond_excel_width_overflows() {
        let mut workbook = XlsxWorkbook::new("unused.xlsx");
        let mut sheet = workbook.create_sheet(0, "Sheet1").expect("sheet");
        let row = sheet.create_row(0).expect("row");
        assert!(matches!(
            sheet.create_cell(&row, 16_384),
            Err(SheetWriteError::IndexOverflow { axis: "column", .. })
        ));
    }
}
