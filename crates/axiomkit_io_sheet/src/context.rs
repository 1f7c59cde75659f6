//! Write context: per-session cursor over sheets/tables and their resolved
//! configuration.
//!
//! Configuration is inherited workbook -> sheet -> table and resolved once,
//! when a sheet or table is first selected. Later selections of the same
//! sheet/table reuse that resolution.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::conf::derive_default_converters;
use crate::converter::{CellConverter, ConverterRegistry};
use crate::error::SheetWriteError;
use crate::handler::{EnumWriteHandler, HandlerChain, WriteObserver};
use crate::sheet::WorkbookBackend;
use crate::spec::{
    SpecContentProperty, SpecHeadMapping, SpecWriteSheet, SpecWriteTable, SpecWriteWorkbook,
};

////////////////////////////////////////////////////////////////////////////////
// #region ResolvedConfiguration

/// Read-only configuration shared by every batch written to one sheet/table.
#[derive(Debug, Clone)]
pub struct SpecWriteConfiguration {
    pub head: SpecHeadMapping,
    /// Column-ordered bindings derived from `head`.
    pub l_content_properties: Vec<SpecContentProperty>,
    pub registry: ConverterRegistry,
    pub chain: HandlerChain,
    pub relative_head_row_index: usize,
}

impl SpecWriteConfiguration {
    fn resolve(
        registry: ConverterRegistry,
        l_handlers: Vec<EnumWriteHandler>,
        head: SpecHeadMapping,
        relative_head_row_index: usize,
    ) -> Result<Self, SheetWriteError> {
        registry.validate_head(&head)?;
        Ok(Self {
            l_content_properties: head.derive_content_properties(),
            head,
            registry,
            chain: HandlerChain::new(l_handlers),
            relative_head_row_index,
        })
    }

    fn derive_child(
        &self,
        converters: &[Arc<dyn CellConverter>],
        handlers: &[EnumWriteHandler],
        head: Option<&SpecHeadMapping>,
        relative_head_row_index: Option<usize>,
        l_handlers_parent: &[EnumWriteHandler],
    ) -> Result<Self, SheetWriteError> {
        let mut registry = self.registry.clone();
        registry.extend(converters);

        let mut l_handlers = l_handlers_parent.to_vec();
        l_handlers.extend(handlers.iter().cloned());

        Self::resolve(
            registry,
            l_handlers,
            head.cloned().unwrap_or_else(|| self.head.clone()),
            relative_head_row_index.unwrap_or(self.relative_head_row_index),
        )
    }
}

/// Snapshot of the current target handed to the pipeline for one batch.
#[derive(Debug, Clone)]
pub struct SpecWriteSelection {
    pub sheet_no: usize,
    pub sheet_name: String,
    pub table_no: Option<usize>,
    pub config: Arc<SpecWriteConfiguration>,
    /// First batch on a freshly created sheet/table pairing.
    pub if_new: bool,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Holders

#[derive(Debug)]
struct TableHolder {
    config: Arc<SpecWriteConfiguration>,
    if_new: bool,
}

#[derive(Debug)]
struct SheetHolder<S> {
    sheet_name: String,
    sheet: S,
    config: Arc<SpecWriteConfiguration>,
    l_handlers: Vec<EnumWriteHandler>,
    if_new: bool,
    dict_tables: BTreeMap<usize, TableHolder>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WriteContext

/// Mutable cursor state of one write session.
pub struct WriteContext<B: WorkbookBackend> {
    backend: B,
    config_workbook: SpecWriteConfiguration,
    l_handlers_workbook: Vec<EnumWriteHandler>,
    observer: Option<Arc<dyn WriteObserver>>,
    dict_sheets: BTreeMap<usize, SheetHolder<B::Sheet>>,
    sheet_no_current: Option<usize>,
    table_no_current: Option<usize>,
}

impl<B: WorkbookBackend> WriteContext<B> {
    pub fn new(backend: B, workbook: SpecWriteWorkbook) -> Result<Self, SheetWriteError> {
        let mut registry = ConverterRegistry::new();
        if workbook.if_use_default_converters {
            registry.extend(&derive_default_converters());
        }
        registry.extend(&workbook.converters);

        let config_workbook = SpecWriteConfiguration::resolve(
            registry,
            workbook.handlers.clone(),
            workbook.head.unwrap_or_default(),
            workbook.relative_head_row_index,
        )?;

        Ok(Self {
            backend,
            config_workbook,
            l_handlers_workbook: workbook.handlers,
            observer: workbook.observer,
            dict_sheets: BTreeMap::new(),
            sheet_no_current: None,
            table_no_current: None,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn observer(&self) -> Option<&Arc<dyn WriteObserver>> {
        self.observer.as_ref()
    }

    /// Switch to `sheet`, creating it on first use.
    pub fn select_sheet(&mut self, sheet: &SpecWriteSheet) -> Result<(), SheetWriteError> {
        if !self.dict_sheets.contains_key(&sheet.sheet_no) {
            let config = self.config_workbook.derive_child(
                &sheet.converters,
                &sheet.handlers,
                sheet.head.as_ref(),
                sheet.relative_head_row_index,
                &self.l_handlers_workbook,
            )?;
            let sheet_name = sheet.derive_sheet_name();
            let sink = self.backend.create_sheet(sheet.sheet_no, &sheet_name)?;

            let mut l_handlers = self.l_handlers_workbook.clone();
            l_handlers.extend(sheet.handlers.iter().cloned());

            debug!(
                sheet_no = sheet.sheet_no,
                sheet_name = %sheet_name,
                n_cols = config.head.len(),
                n_handlers = config.chain.len(),
                "created sheet"
            );
            self.dict_sheets.insert(
                sheet.sheet_no,
                SheetHolder {
                    sheet_name,
                    sheet: sink,
                    config: Arc::new(config),
                    l_handlers,
                    if_new: true,
                    dict_tables: BTreeMap::new(),
                },
            );
        }
        self.sheet_no_current = Some(sheet.sheet_no);
        self.table_no_current = None;
        Ok(())
    }

    /// Switch to `table` inside the current sheet; `None` writes to the sheet
    /// itself.
    pub fn select_table(&mut self, table: Option<&SpecWriteTable>) -> Result<(), SheetWriteError> {
        let Some(table) = table else {
            self.table_no_current = None;
            return Ok(());
        };
        let holder = self.current_holder_mut()?;
        if !holder.dict_tables.contains_key(&table.table_no) {
            let config = holder.config.derive_child(
                &table.converters,
                &table.handlers,
                table.head.as_ref(),
                table.relative_head_row_index,
                &holder.l_handlers,
            )?;
            debug!(
                sheet_name = %holder.sheet_name,
                table_no = table.table_no,
                n_cols = config.head.len(),
                n_handlers = config.chain.len(),
                "created table"
            );
            holder.dict_tables.insert(
                table.table_no,
                TableHolder {
                    config: Arc::new(config),
                    if_new: true,
                },
            );
        }
        self.table_no_current = Some(table.table_no);
        Ok(())
    }

    /// Snapshot the current target and consume its freshness.
    ///
    /// Callers invoke this once per non-empty batch, so the head-row offset
    /// is applied to the first batch only.
    pub fn take_selection(&mut self) -> Result<SpecWriteSelection, SheetWriteError> {
        let table_no = self.table_no_current;
        let sheet_no = self.sheet_no_current.ok_or(SheetWriteError::NoCurrentSheet)?;
        let holder = self.current_holder_mut()?;
        let (config, if_new) = match table_no {
            Some(table_no) => {
                let Some(table_holder) = holder.dict_tables.get_mut(&table_no) else {
                    return Err(SheetWriteError::Backend(format!(
                        "Table {table_no} is not initialized."
                    )));
                };
                let if_new = std::mem::replace(&mut table_holder.if_new, false);
                (Arc::clone(&table_holder.config), if_new)
            }
            None => {
                let if_new = std::mem::replace(&mut holder.if_new, false);
                (Arc::clone(&holder.config), if_new)
            }
        };
        Ok(SpecWriteSelection {
            sheet_no,
            sheet_name: holder.sheet_name.clone(),
            table_no,
            config,
            if_new,
        })
    }

    /// Sheet collaborator of the current sheet.
    pub fn current_sheet_mut(&mut self) -> Result<&mut B::Sheet, SheetWriteError> {
        Ok(&mut self.current_holder_mut()?.sheet)
    }

    /// Sheet collaborator by number.
    pub fn sheet(&self, sheet_no: usize) -> Option<&B::Sheet> {
        self.dict_sheets.get(&sheet_no).map(|holder| &holder.sheet)
    }

    /// Hand every sheet to the backend, then release them and reset the
    /// cursor. A failed flush keeps all sheets for a retry.
    pub fn finish(&mut self) -> Result<(), SheetWriteError> {
        let l_sheets = self
            .dict_sheets
            .values()
            .map(|holder| &holder.sheet)
            .collect::<Vec<_>>();
        self.backend.finish(&l_sheets)?;

        self.dict_sheets.clear();
        self.sheet_no_current = None;
        self.table_no_current = None;
        Ok(())
    }

    fn current_holder_mut(&mut self) -> Result<&mut SheetHolder<B::Sheet>, SheetWriteError> {
        let sheet_no = self.sheet_no_current.ok_or(SheetWriteError::NoCurrentSheet)?;
        self.dict_sheets
            .get_mut(&sheet_no)
            .ok_or(SheetWriteError::NoCurrentSheet)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::RowWriteHandler;
    use crate::sheet::MemoryWorkbook;
    use crate::spec::{EnumValueType, SpecColumnHead};

    struct Noop;

    impl RowWriteHandler for Noop {}

    fn context() -> WriteContext<MemoryWorkbook> {
        WriteContext::new(MemoryWorkbook::new(), SpecWriteWorkbook::default()).expect("context")
    }

    #[test]
    fn freshness_is_consumed_once_per_pairing() {
        let mut ctx = context();
        ctx.select_sheet(&SpecWriteSheet::new(0)).expect("sheet");
        assert!(ctx.take_selection().expect("selection").if_new);
        assert!(!ctx.take_selection().expect("selection").if_new);

        ctx.select_table(Some(&SpecWriteTable::new(1))).expect("table");
        let selection = ctx.take_selection().expect("selection");
        assert!(selection.if_new);
        assert_eq!(selection.table_no, Some(1));

        ctx.select_sheet(&SpecWriteSheet::new(0)).expect("sheet");
        ctx.select_table(Some(&SpecWriteTable::new(1))).expect("table");
        assert!(!ctx.take_selection().expect("selection").if_new);
    }

    #[test]
    fn table_head_and_offset_override_sheet() {
        let mut ctx = context();
        let sheet = SpecWriteSheet::new(0)
            .with_head(SpecHeadMapping::from_names(["a", "b"]))
            .with_relative_head_row_index(1);
        ctx.select_sheet(&sheet).expect("sheet");
        ctx.select_table(Some(
            &SpecWriteTable::new(0)
                .with_head(SpecHeadMapping::from_names(["x"]))
                .with_relative_head_row_index(3),
        ))
        .expect("table");

        let selection = ctx.take_selection().expect("selection");
        assert_eq!(selection.config.head.len(), 1);
        assert_eq!(selection.config.relative_head_row_index, 3);

        ctx.select_table(Some(&SpecWriteTable::new(7))).expect("table");
        let selection = ctx.take_selection().expect("selection");
        assert_eq!(selection.config.head.len(), 2);
        assert_eq!(selection.config.relative_head_row_index, 1);
    }

    #[test]
    fn table_chain_extends_sheet_chain() {
        let mut ctx = context();
        ctx.select_sheet(&SpecWriteSheet::new(0)).expect("sheet");
        assert!(ctx.take_selection().expect("selection").config.chain.is_empty());

        ctx.select_sheet(&SpecWriteSheet::new(1).with_handler(EnumWriteHandler::row(Noop)))
            .expect("sheet");
        assert_eq!(ctx.take_selection().expect("selection").config.chain.len(), 1);

        ctx.select_table(Some(
            &SpecWriteTable::new(0).with_handler(EnumWriteHandler::row(Noop)),
        ))
        .expect("table");
        assert_eq!(ctx.take_selection().expect("selection").config.chain.len(), 2);
    }

    #[test]
    fn declared_type_without_converter_fails_on_select() {
        let mut ctx = context();
        let head = SpecHeadMapping::new()
            .with_column(
                SpecColumnHead::new(0, "ref").with_value_type(EnumValueType::Custom("uuid".into())),
            )
            .expect("head");

        let err = ctx
            .select_sheet(&SpecWriteSheet::new(0).with_head(head))
            .expect_err("must fail");
        assert!(matches!(err, SheetWriteError::UnregisteredDeclaredType { .. }));
        assert!(ctx.sheet(0).is_none());
    }

    #[test]
    fn selection_without_sheet_is_an_error() {
        let mut ctx = context();
        assert!(matches!(
            ctx.take_selection(),
            Err(SheetWriteError::NoCurrentSheet)
        ));
    }
}
