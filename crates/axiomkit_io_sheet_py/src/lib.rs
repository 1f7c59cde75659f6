use std::sync::Arc;

use axiomkit_io_sheet::conf::derive_default_write_workbook;
use axiomkit_io_sheet::converter::CellConverter;
use axiomkit_io_sheet::error::{BoxError, SheetWriteError};
use axiomkit_io_sheet::frame::{
    derive_dataframe_from_ipc_bytes, derive_head_mapping_from_dataframe,
    derive_records_from_dataframe,
};
use axiomkit_io_sheet::mapper::EnumRecord;
use axiomkit_io_sheet::spec::{
    EnumCellData, EnumRecordValue, EnumValueType, SpecColumnHead, SpecFieldMetadata,
    SpecHeadMapping, SpecSheetWriteReport, SpecWriteSheet, SpecWriteTable,
};
use axiomkit_io_sheet::writer::SheetWriteSession;
use axiomkit_io_sheet::xlsx::XlsxWorkbook;
use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use pyo3::exceptions::{PyRuntimeError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyAny, PyBool, PyBytes, PyDict, PyFloat, PyInt, PyList, PyString, PyTuple};

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "axiomkit.sheet.writer.v1";
const C_BRIDGE_TRANSPORT: &str = "ipc_bytes";

#[pyclass(name = "SheetWriter")]
struct PySheetWriter {
    #[pyo3(get)]
    file_out: String,
    inner: SheetWriteSession<XlsxWorkbook>,
}

#[pymethods]
impl PySheetWriter {
    #[new]
    #[pyo3(signature = (file_out, relative_head_row_index = 0, converters = None))]
    fn new(
        file_out: String,
        relative_head_row_index: usize,
        converters: Option<&Bound<'_, PyDict>>,
    ) -> PyResult<Self> {
        let mut cfg_workbook = derive_default_write_workbook();
        cfg_workbook.relative_head_row_index = relative_head_row_index;
        cfg_workbook.converters = parse_converters(converters)?;

        let inner = SheetWriteSession::new(XlsxWorkbook::new(&file_out), cfg_workbook)
            .map_err(map_sheet_write_error)?;
        Ok(Self { file_out, inner })
    }

    fn __enter__(slf: PyRefMut<'_, Self>) -> PyRefMut<'_, Self> {
        slf
    }

    #[pyo3(signature = (_exc_type=None, _exc=None, _tb=None))]
    fn __exit__(
        &mut self,
        py: Python<'_>,
        _exc_type: Option<&Bound<'_, PyAny>>,
        _exc: Option<&Bound<'_, PyAny>>,
        _tb: Option<&Bound<'_, PyAny>>,
    ) -> PyResult<()> {
        self.finish(py)
    }

    /// Append records (sequences or mappings) to a sheet, or to a table of it.
    #[pyo3(signature = (
        records,
        sheet_no = 0,
        sheet_name = None,
        head = None,
        relative_head_row_index = None,
        table_no = None,
        table_head = None,
        table_relative_head_row_index = None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn add_content<'py>(
        mut slf: PyRefMut<'py, Self>,
        records: &Bound<'py, PyAny>,
        sheet_no: usize,
        sheet_name: Option<String>,
        head: Option<&Bound<'py, PyAny>>,
        relative_head_row_index: Option<usize>,
        table_no: Option<usize>,
        table_head: Option<&Bound<'py, PyAny>>,
        table_relative_head_row_index: Option<usize>,
    ) -> PyResult<PyRefMut<'py, Self>> {
        let l_records = records
            .try_iter()?
            .map(|obj| derive_record(&obj?))
            .collect::<PyResult<Vec<_>>>()?;

        let cfg_sheet = derive_write_sheet(
            sheet_no,
            sheet_name,
            parse_head_mapping(head)?,
            relative_head_row_index,
        );
        let cfg_table = match table_no {
            Some(n_table) => Some(derive_write_table(
                n_table,
                parse_head_mapping(table_head)?,
                table_relative_head_row_index,
            )),
            None => None,
        };

        slf.inner
            .add_content_with_table(&l_records, &cfg_sheet, cfg_table.as_ref())
            .map_err(map_sheet_write_error)?;
        Ok(slf)
    }

    /// Append the rows of a DataFrame; its columns become the head mapping of
    /// a newly created sheet (or table).
    #[pyo3(signature = (
        df,
        sheet_no = 0,
        sheet_name = None,
        relative_head_row_index = None,
        table_no = None
    ))]
    fn add_dataframe<'py>(
        mut slf: PyRefMut<'py, Self>,
        py: Python<'py>,
        df: &Bound<'py, PyAny>,
        sheet_no: usize,
        sheet_name: Option<String>,
        relative_head_row_index: Option<usize>,
        table_no: Option<usize>,
    ) -> PyResult<PyRefMut<'py, Self>> {
        let v_ipc_df = derive_ipc_bytes_from_any_dataframe(py, df)?;
        let df_data = derive_dataframe_from_ipc_bytes(&v_ipc_df).map_err(map_sheet_write_error)?;
        let head = derive_head_mapping_from_dataframe(&df_data).map_err(map_sheet_write_error)?;
        let l_records = derive_records_from_dataframe(&df_data).map_err(map_sheet_write_error)?;

        let (cfg_sheet, cfg_table) = match table_no {
            Some(n_table) => (
                derive_write_sheet(sheet_no, sheet_name, None, None),
                Some(derive_write_table(
                    n_table,
                    Some(head),
                    relative_head_row_index,
                )),
            ),
            None => (
                derive_write_sheet(sheet_no, sheet_name, Some(head), relative_head_row_index),
                None,
            ),
        };

        slf.inner
            .add_content_with_table(&l_records, &cfg_sheet, cfg_table.as_ref())
            .map_err(map_sheet_write_error)?;
        Ok(slf)
    }

    /// Merge an inclusive cell range on the current sheet.
    fn merge(
        &mut self,
        first_row: usize,
        last_row: usize,
        first_col: usize,
        last_col: usize,
    ) -> PyResult<()> {
        self.inner
            .merge(first_row, last_row, first_col, last_col)
            .map_err(map_sheet_write_error)
    }

    fn finish(&mut self, py: Python<'_>) -> PyResult<()> {
        let inner = &mut self.inner;
        py.allow_threads(|| inner.finish())
            .map_err(map_sheet_write_error)
    }

    fn close(&mut self, py: Python<'_>) -> PyResult<()> {
        self.finish(py)
    }

    #[getter]
    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn report(&self, py: Python<'_>) -> PyResult<Py<PyAny>> {
        let l_report_obj = self
            .inner
            .report()
            .iter()
            .map(|report| create_report_object(py, report))
            .collect::<PyResult<Vec<_>>>()?;
        let tup_report = PyTuple::new(py, l_report_obj)?;
        Ok(tup_report.into_any().unbind())
    }
}

/// Converter for one caller-defined type key, backed by a Python callable
/// that receives the value's text form.
struct PyCellConverter {
    type_key: String,
    func: Py<PyAny>,
}

impl CellConverter for PyCellConverter {
    fn value_type(&self) -> EnumValueType {
        EnumValueType::Custom(self.type_key.clone())
    }

    fn convert(
        &self,
        value: &EnumRecordValue,
        _field: &SpecFieldMetadata<'_>,
    ) -> Result<Option<EnumCellData>, BoxError> {
        let c_text = match value {
            EnumRecordValue::Custom { text, .. } => text.clone(),
            other => other.to_string(),
        };
        Python::with_gil(|py| {
            let obj_out = self.func.bind(py).call1((c_text,))?;
            derive_cell_data(&obj_out)
        })
        .map_err(BoxError::from)
    }
}

fn parse_converters(
    converters: Option<&Bound<'_, PyDict>>,
) -> PyResult<Vec<Arc<dyn CellConverter>>> {
    let Some(converters) = converters else {
        return Ok(Vec::new());
    };
    let mut l_converters: Vec<Arc<dyn CellConverter>> = Vec::with_capacity(converters.len());
    for (key, func) in converters.iter() {
        if !func.is_callable() {
            return Err(PyTypeError::new_err(format!(
                "Converter for `{key}` must be callable."
            )));
        }
        l_converters.push(Arc::new(PyCellConverter {
            type_key: key.extract::<String>()?,
            func: func.unbind(),
        }));
    }
    Ok(l_converters)
}

fn derive_cell_data(obj: &Bound<'_, PyAny>) -> PyResult<Option<EnumCellData>> {
    if obj.is_none() {
        return Ok(None);
    }
    if obj.is_instance_of::<PyBool>() {
        return Ok(Some(EnumCellData::Boolean(obj.extract::<bool>()?)));
    }
    if obj.is_instance_of::<PyInt>() || obj.is_instance_of::<PyFloat>() {
        return Ok(Some(EnumCellData::Number(obj.extract::<f64>()?)));
    }
    if obj.is_instance_of::<PyString>() {
        return Ok(Some(EnumCellData::Text(obj.extract::<String>()?)));
    }
    Err(PyValueError::new_err(format!(
        "Converter must return str, bool, int, float, or None; got {}.",
        obj.get_type().name()?
    )))
}

fn derive_record(obj: &Bound<'_, PyAny>) -> PyResult<EnumRecord> {
    if let Ok(dict_obj) = obj.downcast::<PyDict>() {
        return derive_named_record(dict_obj);
    }
    if obj.is_instance_of::<PyList>() || obj.is_instance_of::<PyTuple>() {
        let l_values = obj
            .try_iter()?
            .map(|val| derive_record_value(&val?))
            .collect::<PyResult<Vec<_>>>()?;
        return Ok(EnumRecord::Positional(l_values));
    }
    if obj.hasattr("__dict__")? {
        let dict_obj = obj.getattr("__dict__")?;
        return derive_named_record(dict_obj.downcast::<PyDict>()?);
    }
    Err(PyTypeError::new_err(
        "Record must be a list, tuple, dict, or an object with __dict__.",
    ))
}

fn derive_named_record(dict_obj: &Bound<'_, PyDict>) -> PyResult<EnumRecord> {
    let mut dict_fields: IndexMap<String, EnumRecordValue> = IndexMap::with_capacity(dict_obj.len());
    for (key, val) in dict_obj.iter() {
        dict_fields.insert(key.str()?.to_string(), derive_record_value(&val)?);
    }
    Ok(EnumRecord::named(dict_fields))
}

fn derive_record_value(obj: &Bound<'_, PyAny>) -> PyResult<EnumRecordValue> {
    if obj.is_none() {
        return Ok(EnumRecordValue::Null);
    }
    // `bool` is a subclass of `int`.
    if obj.is_instance_of::<PyBool>() {
        return Ok(EnumRecordValue::Boolean(obj.extract::<bool>()?));
    }
    if obj.is_instance_of::<PyInt>() {
        return match obj.extract::<i64>() {
            Ok(val) => Ok(EnumRecordValue::Integer(val)),
            Err(_) => Ok(EnumRecordValue::Float(obj.extract::<f64>()?)),
        };
    }
    if obj.is_instance_of::<PyFloat>() {
        return Ok(EnumRecordValue::Float(obj.extract::<f64>()?));
    }
    if obj.is_instance_of::<PyString>() {
        return Ok(EnumRecordValue::String(obj.extract::<String>()?));
    }
    // `datetime` is a subclass of `date`.
    if let Ok(val) = obj.extract::<NaiveDateTime>() {
        return Ok(EnumRecordValue::DateTime(val));
    }
    if let Ok(val) = obj.extract::<NaiveDate>() {
        return Ok(EnumRecordValue::Date(val));
    }
    Ok(EnumRecordValue::Custom {
        type_key: obj.get_type().name()?.to_string(),
        text: obj.str()?.to_string(),
    })
}

fn parse_head_mapping(head: Option<&Bound<'_, PyAny>>) -> PyResult<Option<SpecHeadMapping>> {
    let Some(head) = head else {
        return Ok(None);
    };
    if head.is_none() {
        return Ok(None);
    }

    if let Ok(dict_head) = head.downcast::<PyDict>() {
        let mut head_mapping = SpecHeadMapping::new();
        for (key, val) in dict_head.iter() {
            let col_head = SpecColumnHead::new(key.extract::<usize>()?, val.extract::<String>()?);
            head_mapping.insert(col_head).map_err(map_sheet_write_error)?;
        }
        return Ok(Some(head_mapping));
    }
    if let Ok(l_names) = head.extract::<Vec<String>>() {
        return Ok(Some(SpecHeadMapping::from_names(l_names)));
    }

    Err(PyValueError::new_err(
        "Head must be sequence[str], dict[int, str], or None.",
    ))
}

fn derive_write_sheet(
    sheet_no: usize,
    sheet_name: Option<String>,
    head: Option<SpecHeadMapping>,
    relative_head_row_index: Option<usize>,
) -> SpecWriteSheet {
    SpecWriteSheet {
        sheet_no,
        sheet_name,
        head,
        relative_head_row_index,
        ..SpecWriteSheet::default()
    }
}

fn derive_write_table(
    table_no: usize,
    head: Option<SpecHeadMapping>,
    relative_head_row_index: Option<usize>,
) -> SpecWriteTable {
    SpecWriteTable {
        table_no,
        head,
        relative_head_row_index,
        ..SpecWriteTable::default()
    }
}

fn derive_ipc_bytes_from_any_dataframe(
    py: Python<'_>,
    df: &Bound<'_, PyAny>,
) -> PyResult<Vec<u8>> {
    let module_polars = py.import("polars")?;
    let cls_dataframe = module_polars.getattr("DataFrame")?;
    let df_polars = if df.is_instance(&cls_dataframe)? {
        df.clone()
    } else {
        cls_dataframe.call1((df,))?
    };

    let obj_buffer = df_polars.call_method1("write_ipc", (py.None(),))?;
    let obj_bytes = obj_buffer.call_method0("getvalue")?;
    Ok(obj_bytes.downcast::<PyBytes>()?.as_bytes().to_vec())
}

fn create_report_object(py: Python<'_>, report: &SpecSheetWriteReport) -> PyResult<Py<PyAny>> {
    let dict_report = PyDict::new(py);
    dict_report.set_item("sheet_no", report.sheet_no)?;
    dict_report.set_item("sheet_name", &report.sheet_name)?;
    dict_report.set_item("table_no", report.table_no)?;
    dict_report.set_item("row_idx_start", report.row_idx_start)?;
    dict_report.set_item("cnt_rows", report.cnt_rows)?;
    dict_report.set_item("cnt_cells", report.cnt_cells)?;
    dict_report.set_item("cnt_cells_null", report.cnt_cells_null)?;
    dict_report.set_item("cnt_cells_overflow", report.cnt_cells_overflow)?;
    Ok(dict_report.into_any().unbind())
}

fn map_sheet_write_error(err: SheetWriteError) -> PyErr {
    match err {
        SheetWriteError::SessionClosed
        | SheetWriteError::NoCurrentSheet
        | SheetWriteError::Backend(_) => PyRuntimeError::new_err(err.to_string()),
        _ => PyValueError::new_err(err.to_string()),
    }
}

#[pymodule]
fn _axiomkit_io_sheet_rs(_py: Python<'_>, module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PySheetWriter>()?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}
