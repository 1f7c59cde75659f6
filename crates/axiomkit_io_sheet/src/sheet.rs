//! Sheet/workbook collaborator contracts and the in-memory implementation.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::SheetWriteError;
use crate::spec::{EnumCellData, SpecCellHandle, SpecRowHandle};
use crate::util::derive_unique_sheet_name;

////////////////////////////////////////////////////////////////////////////////
// #region Contracts

/// One worksheet the pipeline writes through. The pipeline never reads cell
/// contents back.
pub trait SheetSink {
    fn create_row(&mut self, row_idx: usize) -> Result<SpecRowHandle, SheetWriteError>;

    fn create_cell(
        &mut self,
        row: &SpecRowHandle,
        col_idx: usize,
    ) -> Result<SpecCellHandle, SheetWriteError>;

    fn set_text(&mut self, cell: &SpecCellHandle, value: &str) -> Result<(), SheetWriteError>;

    fn set_boolean(&mut self, cell: &SpecCellHandle, value: bool) -> Result<(), SheetWriteError>;

    fn set_number(&mut self, cell: &SpecCellHandle, value: f64) -> Result<(), SheetWriteError>;

    /// Mark a rectangular range as merged without touching cell contents.
    fn add_merged_region(
        &mut self,
        first_row: usize,
        last_row: usize,
        first_col: usize,
        last_col: usize,
    ) -> Result<(), SheetWriteError>;

    /// Highest row index created so far; `None` for an empty sheet.
    fn last_row_index(&self) -> Option<usize>;
}

/// Workbook lifecycle: creates sheets and persists them on finish.
pub trait WorkbookBackend {
    type Sheet: SheetSink;

    fn create_sheet(
        &mut self,
        sheet_no: usize,
        sheet_name: &str,
    ) -> Result<Self::Sheet, SheetWriteError>;

    /// Flush every sheet, in sheet-number order. The caller keeps ownership
    /// until this succeeds.
    fn finish(&mut self, l_sheets: &[&Self::Sheet]) -> Result<(), SheetWriteError>;
}

/// Inclusive rectangular cell range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecMergedRegion {
    pub first_row: usize,
    pub last_row: usize,
    pub first_col: usize,
    pub last_col: usize,
}

impl SpecMergedRegion {
    pub fn overlaps(&self, other: &SpecMergedRegion) -> bool {
        self.first_row <= other.last_row
            && other.first_row <= self.last_row
            && self.first_col <= other.last_col
            && other.first_col <= self.last_col
    }

    pub fn is_single_cell(&self) -> bool {
        self.first_row == self.last_row && self.first_col == self.last_col
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region MemoryBackend

/// Grid-backed sheet kept entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySheet {
    sheet_no: usize,
    sheet_name: String,
    set_rows: BTreeSet<usize>,
    dict_cells: BTreeMap<(usize, usize), EnumCellData>,
    l_merged_regions: Vec<SpecMergedRegion>,
}

impl MemorySheet {
    pub fn new(sheet_no: usize, sheet_name: impl Into<String>) -> Self {
        Self {
            sheet_no,
            sheet_name: sheet_name.into(),
            ..Default::default()
        }
    }

    pub fn sheet_no(&self) -> usize {
        self.sheet_no
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Value at `(row_idx, col_idx)`; `Empty` for created-but-unset cells.
    pub fn cell(&self, row_idx: usize, col_idx: usize) -> Option<&EnumCellData> {
        self.dict_cells.get(&(row_idx, col_idx))
    }

    /// Cells of one row, ordered by column.
    pub fn row_cells(&self, row_idx: usize) -> Vec<(usize, &EnumCellData)> {
        self.dict_cells
            .range((row_idx, 0)..=(row_idx, usize::MAX))
            .map(|((_, col_idx), value)| (*col_idx, value))
            .collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.set_rows.iter().copied()
    }

    pub fn cell_count(&self) -> usize {
        self.dict_cells.len()
    }

    pub fn merged_regions(&self) -> &[SpecMergedRegion] {
        &self.l_merged_regions
    }

    fn set_value(&mut self, cell: &SpecCellHandle, value: EnumCellData) -> Result<(), SheetWriteError> {
        let Some(slot) = self.dict_cells.get_mut(&(cell.row_idx, cell.col_idx)) else {
            return Err(SheetWriteError::Backend(format!(
                "Cell ({}, {}) was not created.",
                cell.row_idx, cell.col_idx
            )));
        };
        *slot = value;
        Ok(())
    }
}

impl SheetSink for MemorySheet {
    fn create_row(&mut self, row_idx: usize) -> Result<SpecRowHandle, SheetWriteError> {
        self.set_rows.insert(row_idx);
        Ok(SpecRowHandle { row_idx })
    }

    fn create_cell(
        &mut self,
        row: &SpecRowHandle,
        col_idx: usize,
    ) -> Result<SpecCellHandle, SheetWriteError> {
        if !self.set_rows.contains(&row.row_idx) {
            return Err(SheetWriteError::Backend(format!(
                "Row {} was not created.",
                row.row_idx
            )));
        }
        self.dict_cells
            .insert((row.row_idx, col_idx), EnumCellData::Empty);
        Ok(SpecCellHandle {
            row_idx: row.row_idx,
            col_idx,
        })
    }

    fn set_text(&mut self, cell: &SpecCellHandle, value: &str) -> Result<(), SheetWriteError> {
        self.set_value(cell, EnumCellData::Text(value.to_string()))
    }

    fn set_boolean(&mut self, cell: &SpecCellHandle, value: bool) -> Result<(), SheetWriteError> {
        self.set_value(cell, EnumCellData::Boolean(value))
    }

    fn set_number(&mut self, cell: &SpecCellHandle, value: f64) -> Result<(), SheetWriteError> {
        self.set_value(cell, EnumCellData::Number(value))
    }

    fn add_merged_region(
        &mut self,
        first_row: usize,
        last_row: usize,
        first_col: usize,
        last_col: usize,
    ) -> Result<(), SheetWriteError> {
        self.l_merged_regions.push(SpecMergedRegion {
            first_row,
            last_row,
            first_col,
            last_col,
        });
        Ok(())
    }

    fn last_row_index(&self) -> Option<usize> {
        self.set_rows.last().copied()
    }
}

/// Workbook that keeps finished sheets for inspection.
#[derive(Debug, Default)]
pub struct MemoryWorkbook {
    set_sheet_names_existing: BTreeSet<String>,
    l_sheets: Vec<MemorySheet>,
    if_finished: bool,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sheets handed over by `finish`, in sheet-number order.
    pub fn sheets(&self) -> &[MemorySheet] {
        &self.l_sheets
    }

    pub fn is_finished(&self) -> bool {
        self.if_finished
    }
}

impl WorkbookBackend for MemoryWorkbook {
    type Sheet = MemorySheet;

    fn create_sheet(
        &mut self,
        sheet_no: usize,
        sheet_name: &str,
    ) -> Result<MemorySheet, SheetWriteError> {
        let sheet_name_unique = derive_unique_sheet_name(&mut self.set_sheet_names_existing, sheet_name);
        Ok(MemorySheet::new(sheet_no, sheet_name_unique))
    }

    fn finish(&mut self, l_sheets: &[&MemorySheet]) -> Result<(), SheetWriteError> {
        self.l_sheets.extend(l_sheets.iter().map(|sheet| (*sheet).clone()));
        self.if_finished = true;
        Ok(())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sheet_tracks_last_row_and_cells() {
        let mut sheet = MemorySheet::new(0, "Sheet1");
        assert_eq!(sheet.last_row_index(), None);

        let row = sheet.create_row(3).expect("row");
        let cell = sheet.create_cell(&row, 2).expect("cell");
        sheet.set_number(&cell, 1.5).expect("set");
        sheet.create_row(1).expect("row");

        assert_eq!(sheet.last_row_index(), Some(3));
        assert_eq!(sheet.cell(3, 2), Some(&EnumCellData::Number(1.5)));
        assert_eq!(sheet.row_cells(3).len(), 1);
    }

    #[test]
    fn memory_sheet_rejects_cell_on_missing_row() {
        let mut sheet = MemorySheet::new(0, "Sheet1");
        let err = sheet
            .create_cell(&SpecRowHandle { row_idx: 0 }, 0)
            .expect_err("must fail");
        assert!(matches!(err, SheetWriteError::Backend(_)));
    }

    #[test]
    fn merged_region_overlap() {
        let a = SpecMergedRegion {
            first_row: 0,
            last_row: 1,
            first_col: 0,
            last_col: 2,
        };
        let b = SpecMergedRegion {
            first_row: 1,
            last_row: 3,
            first_col: 2,
            last_col: 4,
        };
        let c = SpecMergedRegion {
            first_row: 2,
            last_row: 2,
            first_col: 0,
            last_col: 0,
        };
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(c.is_single_cell());
    }
}
