//! DataFrame record source: turns Polars frames (or their IPC bytes) into
//! named records plus a matching head mapping.

use std::io::Cursor;

use indexmap::IndexMap;
use polars::prelude::{AnyValue, DataFrame, DataType, IpcReader, SerReader};

use crate::error::SheetWriteError;
use crate::mapper::EnumRecord;
use crate::spec::{EnumRecordValue, EnumValueType, SpecColumnHead, SpecHeadMapping};

/// Decode one IPC-serialized DataFrame payload.
pub fn derive_dataframe_from_ipc_bytes(v_ipc_df: &[u8]) -> Result<DataFrame, SheetWriteError> {
    IpcReader::new(Cursor::new(v_ipc_df))
        .finish()
        .map_err(|err| SheetWriteError::Frame(format!("Failed to read IPC DataFrame bytes: {err}")))
}

/// One declared column per frame column, typed from the column dtype.
pub fn derive_head_mapping_from_dataframe(
    df: &DataFrame,
) -> Result<SpecHeadMapping, SheetWriteError> {
    let mut head = SpecHeadMapping::new();
    for (col_idx, col) in df.get_columns().iter().enumerate() {
        let mut col_head = SpecColumnHead::new(col_idx, col.name().to_string());
        if let Some(value_type) = derive_value_type_from_dtype(col.dtype()) {
            col_head = col_head.with_value_type(value_type);
        }
        head.insert(col_head)?;
    }
    Ok(head)
}

/// Row-wise named records, keyed by column name in frame order.
pub fn derive_records_from_dataframe(df: &DataFrame) -> Result<Vec<EnumRecord>, SheetWriteError> {
    let l_cols = df.get_columns();
    let l_names: Vec<String> = l_cols.iter().map(|col| col.name().to_string()).collect();

    let mut l_records = Vec::with_capacity(df.height());
    for n_row in 0..df.height() {
        let mut dict_fields: IndexMap<String, EnumRecordValue> = IndexMap::with_capacity(l_cols.len());
        for (col, name) in l_cols.iter().zip(&l_names) {
            let value = col.get(n_row)?;
            dict_fields.insert(name.clone(), derive_record_value_from_any_value(value));
        }
        l_records.push(EnumRecord::named(dict_fields));
    }
    Ok(l_records)
}

fn derive_value_type_from_dtype(dtype: &DataType) -> Option<EnumValueType> {
    if dtype.is_integer() {
        Some(EnumValueType::Integer)
    } else if dtype.is_float() {
        Some(EnumValueType::Float)
    } else {
        match dtype {
            DataType::Boolean => Some(EnumValueType::Boolean),
            DataType::String => Some(EnumValueType::String),
            _ => None,
        }
    }
}

fn derive_record_value_from_any_value(value: AnyValue<'_>) -> EnumRecordValue {
    match value {
        AnyValue::Null => EnumRecordValue::Null,
        AnyValue::Boolean(val) => EnumRecordValue::Boolean(val),
        AnyValue::String(val) => EnumRecordValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumRecordValue::String(val.to_string()),
        AnyValue::UInt8(val) => EnumRecordValue::Integer(i64::from(val)),
        AnyValue::UInt16(val) => EnumRecordValue::Integer(i64::from(val)),
        AnyValue::UInt32(val) => EnumRecordValue::Integer(i64::from(val)),
        AnyValue::UInt64(val) => i64::try_from(val)
            .map_or(EnumRecordValue::Float(val as f64), EnumRecordValue::Integer),
        AnyValue::Int8(val) => EnumRecordValue::Integer(i64::from(val)),
        AnyValue::Int16(val) => EnumRecordValue::Integer(i64::from(val)),
        AnyValue::Int32(val) => EnumRecordValue::Integer(i64::from(val)),
        AnyValue::Int64(val) => EnumRecordValue::Integer(val),
        AnyValue::Int128(val) => i64::try_from(val)
            .map_or(EnumRecordValue::Float(val as f64), EnumRecordValue::Integer),
        AnyValue::Float32(val) => EnumRecordValue::Float(f64::from(val)),
        AnyValue::Float64(val) => EnumRecordValue::Float(val),
        _ => EnumRecordValue::String(value.to_string()),
    }
}
