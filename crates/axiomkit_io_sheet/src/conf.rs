//! Sheet constants and default preset factories.

use std::sync::Arc;

use crate::converter::{
    BooleanConverter, CellConverter, ConverterRegistry, DateConverter, DateTimeConverter,
    FloatConverter, IntegerConverter, StringConverter,
};
use crate::spec::SpecWriteWorkbook;

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Default `strftime` pattern for date cells.
pub const C_FMT_DATE_DEFAULT: &str = "%Y-%m-%d";
/// Default `strftime` pattern for datetime cells.
pub const C_FMT_DATETIME_DEFAULT: &str = "%Y-%m-%d %H:%M:%S";

/// Build the built-in converters, one per primitive value type.
pub fn derive_default_converters() -> Vec<Arc<dyn CellConverter>> {
    vec![
        Arc::new(BooleanConverter),
        Arc::new(IntegerConverter),
        Arc::new(FloatConverter),
        Arc::new(StringConverter),
        Arc::new(DateConverter),
        Arc::new(DateTimeConverter),
    ]
}

/// Build a registry pre-filled with [`derive_default_converters`].
pub fn derive_default_converter_registry() -> ConverterRegistry {
    let mut registry = ConverterRegistry::new();
    for converter in derive_default_converters() {
        registry.register(converter);
    }
    registry
}

/// Build default workbook-level write configuration.
pub fn derive_default_write_workbook() -> SpecWriteWorkbook {
    SpecWriteWorkbook::default()
}
