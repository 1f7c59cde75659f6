//! Row/cell lifecycle handlers and the ordered handler chain.

use std::fmt;
use std::sync::Arc;

use crate::error::{BoxError, SheetWriteError};
use crate::spec::{EnumCellData, SpecCellHandle, SpecColumnHead, SpecRowHandle};

////////////////////////////////////////////////////////////////////////////////
// #region HookContexts

/// Extension point identifier, carried by [`SheetWriteError::HandlerFault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumHandlerHook {
    BeforeRowCreate,
    AfterRowCreate,
    BeforeCellCreate,
    AfterCellCreate,
}

impl fmt::Display for EnumHandlerHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeRowCreate => write!(f, "before_row_create"),
            Self::AfterRowCreate => write!(f, "after_row_create"),
            Self::BeforeCellCreate => write!(f, "before_cell_create"),
            Self::AfterCellCreate => write!(f, "after_cell_create"),
        }
    }
}

/// Arguments of the row hooks.
#[derive(Debug, Clone, Copy)]
pub struct SpecRowWriteContext<'a> {
    pub sheet_no: usize,
    pub sheet_name: &'a str,
    pub table_no: Option<usize>,
    /// Absolute row index in the sheet.
    pub row_idx: usize,
    /// Index of the record within the current batch.
    pub relative_row_idx: usize,
    /// Always `false` for content rows.
    pub is_head: bool,
    /// Realized row; `None` before creation.
    pub row: Option<SpecRowHandle>,
}

/// Arguments of the cell hooks.
#[derive(Debug, Clone, Copy)]
pub struct SpecCellWriteContext<'a> {
    pub sheet_no: usize,
    pub sheet_name: &'a str,
    pub table_no: Option<usize>,
    pub row_idx: usize,
    pub relative_row_idx: usize,
    /// Resolved destination column.
    pub col_idx: usize,
    /// Declared head; `None` for overflow columns.
    pub head: Option<&'a SpecColumnHead>,
    pub is_head: bool,
    /// Realized cell; `None` before creation.
    pub cell: Option<SpecCellHandle>,
    /// Committed value; `None` before creation.
    pub cell_data: Option<&'a EnumCellData>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region HandlerContracts

/// Observer of row creation.
pub trait RowWriteHandler: Send + Sync {
    fn before_row_create(&self, _ctx: &SpecRowWriteContext<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    fn after_row_create(&self, _ctx: &SpecRowWriteContext<'_>) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Observer of cell creation.
pub trait CellWriteHandler: Send + Sync {
    fn before_cell_create(&self, _ctx: &SpecCellWriteContext<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    fn after_cell_create(&self, _ctx: &SpecCellWriteContext<'_>) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Observer of both rows and cells.
pub trait RowCellWriteHandler: RowWriteHandler + CellWriteHandler {}

impl<T: RowWriteHandler + CellWriteHandler> RowCellWriteHandler for T {}

/// One chain entry, tagged with its capability.
#[derive(Clone)]
pub enum EnumWriteHandler {
    Row(Arc<dyn RowWriteHandler>),
    Cell(Arc<dyn CellWriteHandler>),
    Both(Arc<dyn RowCellWriteHandler>),
}

impl EnumWriteHandler {
    pub fn row<H: RowWriteHandler + 'static>(handler: H) -> Self {
        Self::Row(Arc::new(handler))
    }

    pub fn cell<H: CellWriteHandler + 'static>(handler: H) -> Self {
        Self::Cell(Arc::new(handler))
    }

    pub fn both<H: RowWriteHandler + CellWriteHandler + 'static>(handler: H) -> Self {
        Self::Both(Arc::new(handler))
    }

    fn as_row(&self) -> Option<&dyn RowWriteHandler> {
        match self {
            Self::Row(handler) => Some(handler.as_ref()),
            Self::Both(handler) => Some(handler.as_ref()),
            Self::Cell(_) => None,
        }
    }

    fn as_cell(&self) -> Option<&dyn CellWriteHandler> {
        match self {
            Self::Cell(handler) => Some(handler.as_ref()),
            Self::Both(handler) => Some(handler.as_ref()),
            Self::Row(_) => None,
        }
    }
}

impl fmt::Debug for EnumWriteHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Row(_) => write!(f, "EnumWriteHandler::Row"),
            Self::Cell(_) => write!(f, "EnumWriteHandler::Cell"),
            Self::Both(_) => write!(f, "EnumWriteHandler::Both"),
        }
    }
}

/// Bookkeeping sink notified after each realized row/cell.
///
/// Not part of the chain: it cannot fail and fires even when the chain is
/// empty.
pub trait WriteObserver: Send + Sync {
    fn row(&self, _row_idx: usize, _row: &SpecRowHandle) {}

    fn cell(&self, _row_idx: usize, _cell: &SpecCellHandle) {}
}

impl fmt::Debug for dyn WriteObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WriteObserver")
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region HandlerChain

/// Ordered handlers, invoked in declaration order without short-circuiting.
#[derive(Debug, Clone, Default)]
pub struct HandlerChain {
    l_handlers: Vec<EnumWriteHandler>,
}

impl HandlerChain {
    pub fn new(l_handlers: Vec<EnumWriteHandler>) -> Self {
        Self { l_handlers }
    }

    pub fn len(&self) -> usize {
        self.l_handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.l_handlers.is_empty()
    }

    pub fn invoke_before_row_create(
        &self,
        ctx: &SpecRowWriteContext<'_>,
    ) -> Result<(), SheetWriteError> {
        for handler in self.l_handlers.iter().filter_map(EnumWriteHandler::as_row) {
            handler
                .before_row_create(ctx)
                .map_err(|source| derive_row_fault(EnumHandlerHook::BeforeRowCreate, ctx, source))?;
        }
        Ok(())
    }

    pub fn invoke_after_row_create(
        &self,
        ctx: &SpecRowWriteContext<'_>,
    ) -> Result<(), SheetWriteError> {
        for handler in self.l_handlers.iter().filter_map(EnumWriteHandler::as_row) {
            handler
                .after_row_create(ctx)
                .map_err(|source| derive_row_fault(EnumHandlerHook::AfterRowCreate, ctx, source))?;
        }
        Ok(())
    }

    pub fn invoke_before_cell_create(
        &self,
        ctx: &SpecCellWriteContext<'_>,
    ) -> Result<(), SheetWriteError> {
        for handler in self.l_handlers.iter().filter_map(EnumWriteHandler::as_cell) {
            handler.before_cell_create(ctx).map_err(|source| {
                derive_cell_fault(EnumHandlerHook::BeforeCellCreate, ctx, source)
            })?;
        }
        Ok(())
    }

    pub fn invoke_after_cell_create(
        &self,
        ctx: &SpecCellWriteContext<'_>,
    ) -> Result<(), SheetWriteError> {
        for handler in self.l_handlers.iter().filter_map(EnumWriteHandler::as_cell) {
            handler.after_cell_create(ctx).map_err(|source| {
                derive_cell_fault(EnumHandlerHook::AfterCellCreate, ctx, source)
            })?;
        }
        Ok(())
    }
}

fn derive_row_fault(
    hook: EnumHandlerHook,
    ctx: &SpecRowWriteContext<'_>,
    source: BoxError,
) -> SheetWriteError {
    SheetWriteError::HandlerFault {
        hook,
        row_idx: ctx.row_idx,
        col_idx: None,
        source,
    }
}

fn derive_cell_fault(
    hook: EnumHandlerHook,
    ctx: &SpecCellWriteContext<'_>,
    source: BoxError,
) -> SheetWriteError {
    SheetWriteError::HandlerFault {
        hook,
        row_idx: ctx.row_idx,
        col_idx: Some(ctx.col_idx),
        source,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
