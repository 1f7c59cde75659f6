//! Value converters and the type-keyed converter registry.
//!
//! Dispatch is by the runtime type of the value being written
//! ([`EnumRecordValue::value_type`]); a converter pinned to a column through
//! [`SpecContentProperty::converter_override`] always wins.

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use crate::conf::{C_FMT_DATE_DEFAULT, C_FMT_DATETIME_DEFAULT};
use crate::error::{BoxError, SheetWriteError};
use crate::spec::{
    EnumCellData, EnumRecordValue, EnumValueType, SpecContentProperty, SpecFieldMetadata,
    SpecHeadMapping,
};

////////////////////////////////////////////////////////////////////////////////
// #region ConverterContract

/// Turns one record value into a typed cell value.
///
/// Returning `Ok(None)` or `Ok(Some(EnumCellData::Empty))` is treated as an
/// invalid result by the pipeline.
pub trait CellConverter: Send + Sync {
    /// Value type served by this converter.
    fn value_type(&self) -> EnumValueType;

    fn convert(
        &self,
        value: &EnumRecordValue,
        field: &SpecFieldMetadata<'_>,
    ) -> Result<Option<EnumCellData>, BoxError>;
}

impl fmt::Debug for dyn CellConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CellConverter<{}>", self.value_type())
    }
}

/// Closure-backed converter for caller-defined value types.
pub struct FnConverter<F> {
    value_type: EnumValueType,
    func: F,
}

impl<F> FnConverter<F>
where
    F: Fn(&EnumRecordValue, &SpecFieldMetadata<'_>) -> Result<Option<EnumCellData>, BoxError>
        + Send
        + Sync,
{
    pub fn new(value_type: EnumValueType, func: F) -> Self {
        Self { value_type, func }
    }
}

impl<F> CellConverter for FnConverter<F>
where
    F: Fn(&EnumRecordValue, &SpecFieldMetadata<'_>) -> Result<Option<EnumCellData>, BoxError>
        + Send
        + Sync,
{
    fn value_type(&self) -> EnumValueType {
        self.value_type.clone()
    }

    fn convert(
        &self,
        value: &EnumRecordValue,
        field: &SpecFieldMetadata<'_>,
    ) -> Result<Option<EnumCellData>, BoxError> {
        (self.func)(value, field)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region BuiltinConverters

/// `Boolean` -> boolean cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanConverter;

impl CellConverter for BooleanConverter {
    fn value_type(&self) -> EnumValueType {
        EnumValueType::Boolean
    }

    fn convert(
        &self,
        value: &EnumRecordValue,
        _field: &SpecFieldMetadata<'_>,
    ) -> Result<Option<EnumCellData>, BoxError> {
        match value {
            EnumRecordValue::Boolean(val) => Ok(Some(EnumCellData::Boolean(*val))),
            other => Err(derive_type_mismatch_error(&self.value_type(), other)),
        }
    }
}

/// `Integer` -> number cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerConverter;

impl CellConverter for IntegerConverter {
    fn value_type(&self) -> EnumValueType {
        EnumValueType::Integer
    }

    fn convert(
        &self,
        value: &EnumRecordValue,
        _field: &SpecFieldMetadata<'_>,
    ) -> Result<Option<EnumCellData>, BoxError> {
        match value {
            EnumRecordValue::Integer(val) => Ok(Some(EnumCellData::Number(*val as f64))),
            other => Err(derive_type_mismatch_error(&self.value_type(), other)),
        }
    }
}

/// `Float` -> number cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatConverter;

impl CellConverter for FloatConverter {
    fn value_type(&self) -> EnumValueType {
        EnumValueType::Float
    }

    fn convert(
        &self,
        value: &EnumRecordValue,
        _field: &SpecFieldMetadata<'_>,
    ) -> Result<Option<EnumCellData>, BoxError> {
        match value {
            EnumRecordValue::Float(val) => Ok(Some(EnumCellData::Number(*val))),
            other => Err(derive_type_mismatch_error(&self.value_type(), other)),
        }
    }
}

/// `String` -> text cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringConverter;

impl CellConverter for StringConverter {
    fn value_type(&self) -> EnumValueType {
        EnumValueType::String
    }

    fn convert(
        &self,
        value: &EnumRecordValue,
        _field: &SpecFieldMetadata<'_>,
    ) -> Result<Option<EnumCellData>, BoxError> {
        match value {
            EnumRecordValue::String(val) => Ok(Some(EnumCellData::Text(val.clone()))),
            other => Err(derive_type_mismatch_error(&self.value_type(), other)),
        }
    }
}

/// `Date` -> text cell, formatted with the head's pattern or `%Y-%m-%d`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateConverter;

impl CellConverter for DateConverter {
    fn value_type(&self) -> EnumValueType {
        EnumValueType::Date
    }

    fn convert(
        &self,
        value: &EnumRecordValue,
        field: &SpecFieldMetadata<'_>,
    ) -> Result<Option<EnumCellData>, BoxError> {
        let EnumRecordValue::Date(val) = value else {
            return Err(derive_type_mismatch_error(&self.value_type(), value));
        };
        let c_pattern = derive_format_pattern(field, C_FMT_DATE_DEFAULT);
        let mut c_text = String::new();
        write!(c_text, "{}", val.format(c_pattern))
            .map_err(|_| format!("Invalid date format pattern: {c_pattern}"))?;
        Ok(Some(EnumCellData::Text(c_text)))
    }
}

/// `DateTime` -> text cell, formatted with the head's pattern or
/// `%Y-%m-%d %H:%M:%S`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeConverter;

impl CellConverter for DateTimeConverter {
    fn value_type(&self) -> EnumValueType {
        EnumValueType::DateTime
    }

    fn convert(
        &self,
        value: &EnumRecordValue,
        field: &SpecFieldMetadata<'_>,
    ) -> Result<Option<EnumCellData>, BoxError> {
        let EnumRecordValue::DateTime(val) = value else {
            return Err(derive_type_mismatch_error(&self.value_type(), value));
        };
        let c_pattern = derive_format_pattern(field, C_FMT_DATETIME_DEFAULT);
        let mut c_text = String::new();
        write!(c_text, "{}", val.format(c_pattern))
            .map_err(|_| format!("Invalid datetime format pattern: {c_pattern}"))?;
        Ok(Some(EnumCellData::Text(c_text)))
    }
}

fn derive_format_pattern<'a>(field: &'a SpecFieldMetadata<'_>, default: &'a str) -> &'a str {
    field
        .head
        .and_then(|head| head.format.as_deref())
        .unwrap_or(default)
}

fn derive_type_mismatch_error(expected: &EnumValueType, value: &EnumRecordValue) -> BoxError {
    let c_actual = value
        .value_type()
        .map_or_else(|| "null".to_string(), |t| t.to_string());
    format!("expected `{expected}` value, got `{c_actual}`").into()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Registry

/// Mapping from value type key to converter.
#[derive(Debug, Clone, Default)]
pub struct ConverterRegistry {
    dict_converters: HashMap<EnumValueType, Arc<dyn CellConverter>>,
}

impl ConverterRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `converter` under its value type, returning the one it replaced.
    pub fn register(
        &mut self,
        converter: Arc<dyn CellConverter>,
    ) -> Option<Arc<dyn CellConverter>> {
        self.dict_converters
            .insert(converter.value_type(), converter)
    }

    pub fn lookup(&self, value_type: &EnumValueType) -> Option<Arc<dyn CellConverter>> {
        self.dict_converters.get(value_type).cloned()
    }

    pub fn contains(&self, value_type: &EnumValueType) -> bool {
        self.dict_converters.contains_key(value_type)
    }

    /// Overlay converters; later entries replace earlier ones of the same type.
    pub fn extend<'a, I>(&mut self, converters: I)
    where
        I: IntoIterator<Item = &'a Arc<dyn CellConverter>>,
    {
        for converter in converters {
            self.register(Arc::clone(converter));
        }
    }

    /// Check that every declared column type can be converted.
    ///
    /// Columns with a converter override are exempt.
    pub fn validate_head(&self, head: &SpecHeadMapping) -> Result<(), SheetWriteError> {
        for col_head in head.iter() {
            if head.converter_override(col_head.col_idx).is_some() {
                continue;
            }
            let Some(value_type) = &col_head.value_type else {
                continue;
            };
            if !self.contains(value_type) {
                return Err(SheetWriteError::UnregisteredDeclaredType {
                    col_idx: col_head.col_idx,
                    name: col_head.name.clone(),
                    value_type: value_type.clone(),
                });
            }
        }
        Ok(())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Conversion

/// Convert one value for one resolved cell.
///
/// Nulls are skipped by the pipeline before conversion; passing one here
/// yields `InvalidConversionResult`. Every other outcome is either a
/// writable typed value or a fatal error.
pub fn convert_record_value(
    registry: &ConverterRegistry,
    content_property: Option<&SpecContentProperty>,
    value: &EnumRecordValue,
    field: &SpecFieldMetadata<'_>,
) -> Result<EnumCellData, SheetWriteError> {
    let Some(value_type) = value.value_type() else {
        return Err(SheetWriteError::InvalidConversionResult {
            value: value.to_string(),
            row_idx: field.row_idx,
            col_idx: field.col_idx,
        });
    };

    let converter = match content_property.and_then(|p| p.converter_override.as_ref()) {
        Some(converter) => Arc::clone(converter),
        None => {
            registry
                .lookup(&value_type)
                .ok_or_else(|| SheetWriteError::UnsupportedType {
                    value_type: value_type.clone(),
                    value: value.to_string(),
                    row_idx: field.row_idx,
                    col_idx: field.col_idx,
                })?
        }
    };

    let cell_data =
        converter
            .convert(value, field)
            .map_err(|source| SheetWriteError::ConversionFailed {
                value: value.to_string(),
                row_idx: field.row_idx,
                col_idx: field.col_idx,
                source,
            })?;

    match cell_data {
        Some(EnumCellData::Empty) | None => Err(SheetWriteError::InvalidConversionResult {
            value: value.to_string(),
            row_idx: field.row_idx,
            col_idx: field.col_idx,
        }),
        Some(cell_data) => Ok(cell_data),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
