//! Stateless helper utilities used by the write pipeline and collaborators.

use std::collections::BTreeSet;

use crate::conf::{
    N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL,
};
use crate::error::SheetWriteError;

////////////////////////////////////////////////////////////////////////////////
// #region RowColumnArithmetic

/// First overflow column: one past the last declared column, or `0` when no
/// column is declared.
pub fn derive_overflow_col_start(col_idx_last_declared: Option<usize>) -> usize {
    col_idx_last_declared.map_or(0, |n| n + 1)
}

/// First row of a batch.
///
/// Appends after the last existing row; the head-row offset is added only
/// when the sheet/table pairing is still fresh.
pub fn derive_row_idx_start(
    row_idx_last: Option<usize>,
    relative_head_row_index: usize,
    if_new: bool,
) -> usize {
    let n_row_next = row_idx_last.map_or(0, |n| n + 1);
    if if_new {
        n_row_next + relative_head_row_index
    } else {
        n_row_next
    }
}

/// Reject inverted merge ranges.
pub fn validate_merge_range(
    first_row: usize,
    last_row: usize,
    first_col: usize,
    last_col: usize,
) -> Result<(), SheetWriteError> {
    if first_row > last_row || first_col > last_col {
        return Err(SheetWriteError::InvalidMergeRange {
            first_row,
            last_row,
            first_col,
            last_col,
        });
    }
    Ok(())
}

/// Cast a row index to the Excel row type, enforcing the sheet height.
pub fn cast_row_num(value: usize) -> Result<u32, SheetWriteError> {
    if value >= N_NROWS_EXCEL_MAX {
        return Err(SheetWriteError::IndexOverflow { axis: "row", value });
    }
    u32::try_from(value).map_err(|_| SheetWriteError::IndexOverflow { axis: "row", value })
}

/// Cast a column index to the Excel column type, enforcing the sheet width.
pub fn cast_col_num(value: usize) -> Result<u16, SheetWriteError> {
    if value >= N_NCOLS_EXCEL_MAX {
        return Err(SheetWriteError::IndexOverflow {
            axis: "column",
            value,
        });
    }
    u16::try_from(value).map_err(|_| SheetWriteError::IndexOverflow {
        axis: "column",
        value,
    })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNames

/// Replace illegal characters and clip to Excel's sheet name length.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Return `name` or the first free `name__N` variant, and reserve it.
pub fn derive_unique_sheet_name(set_names_existing: &mut BTreeSet<String>, name: &str) -> String {
    if !set_names_existing.contains(name) {
        set_names_existing.insert(name.to_string());
        return name.to_string();
    }

    let base_name: String = name
        .chars()
        .take(usize::max(1, N_LEN_EXCEL_SHEET_NAME_MAX - 3))
        .collect();

    let mut n_idx = 2usize;
    loop {
        let candidate: String = format!("{base_name}__{n_idx}")
            .chars()
            .take(N_LEN_EXCEL_SHEET_NAME_MAX)
            .collect();
        if !set_names_existing.contains(&candidate) {
            set_names_existing.insert(candidate.clone());
            return candidate;
        }
        n_idx += 1;
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_overflow_col_start() {
        assert_eq!(derive_overflow_col_start(None), 0);
        assert_eq!(derive_overflow_col_start(Some(0)), 1);
        assert_eq!(derive_overflow_col_start(Some(7)), 8);
    }

    #[test]
    fn test_derive_row_idx_start_applies_offset_only_when_new() {
        assert_eq!(derive_row_idx_start(None, 2, true), 2);
        assert_eq!(derive_row_idx_start(None, 2, false), 0);
        assert_eq!(derive_row_idx_start(Some(4), 2, true), 7);
        assert_eq!(derive_row_idx_start(Some(4), 2, false), 5);
    }

    #[test]
    fn test_validate_merge_range() {
        assert!(validate_merge_range(0, 1, 0, 2).is_ok());
        assert!(validate_merge_range(3, 3, 1, 1).is_ok());
        assert!(matches!(
            validate_merge_range(2, 1, 0, 0),
            Err(SheetWriteError::InvalidMergeRange { .. })
        ));
    }

    #[test]
    fn test_cast_limits() {
        assert_eq!(cast_row_num(N_NROWS_EXCEL_MAX - 1).expect("row"), 1_048_575);
        assert!(cast_row_num(N_NROWS_EXCEL_MAX).is_err());
        assert_eq!(cast_col_num(0).expect("col"), 0);
        assert!(cast_col_num(N_NCOLS_EXCEL_MAX).is_err());
    }

    #[test]
    fn test_sanitize_and_uniquify_sheet_names() {
        assert_eq!(sanitize_sheet_name(" a/b:c ", "_"), "a_b_c");
        assert_eq!(sanitize_sheet_name("[]", ""), "Sheet");

        let mut set_names = BTreeSet::new();
        assert_eq!(derive_unique_sheet_name(&mut set_names, "data"), "data");
        assert_eq!(derive_unique_sheet_name(&mut set_names, "data"), "data__2");
        assert_eq!(derive_unique_sheet_name(&mut set_names, "data"), "data__3");
    }
}
