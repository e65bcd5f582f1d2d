//! Python bindings, enabled with the `python` feature

use crate::core::resolver::LutManager;
use crate::io::rsr::JsonRsrProvider;
use crate::types::{
    AttrValue, LutConfig, LutError, LutId, LutMetadata, SensorLutOptions, DEFAULT_LUT_PARAMETERS,
};
use numpy::ToPyArray;
use pyo3::exceptions::{PyFileNotFoundError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

fn to_py_err(e: LutError) -> PyErr {
    match e {
        LutError::NotFound(_) => PyFileNotFoundError::new_err(e.to_string()),
        LutError::InvalidInput(_) => PyValueError::new_err(e.to_string()),
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

fn metadata_to_dict<'py>(py: Python<'py>, meta: &LutMetadata) -> PyResult<&'py PyDict> {
    let dict = PyDict::new(py);
    for (key, value) in &meta.attributes {
        match value {
            AttrValue::Text(items) => dict.set_item(key, items.clone())?,
            AttrValue::Integer(v) => dict.set_item(key, *v)?,
            AttrValue::Number(v) => dict.set_item(key, *v)?,
            AttrValue::Numbers(v) => dict.set_item(key, v.clone())?,
        }
    }
    dict.set_item("par", meta.par.clone())?;
    if !meta.wave.is_empty() {
        dict.set_item("wave", meta.wave.to_pyarray(py))?;
    }
    Ok(dict)
}

fn default_parameters() -> Option<Vec<String>> {
    SensorLutOptions::with_default_parameters().parameters
}

/// Python wrapper for LutManager
#[pyclass(name = "LutManager")]
struct PyLutManager {
    inner: LutManager,
}

#[pymethods]
impl PyLutManager {
    #[new]
    #[pyo3(signature = (lut_dir, rsr_dir, remote_base = None))]
    fn new(lut_dir: String, rsr_dir: String, remote_base: Option<String>) -> PyResult<Self> {
        let mut config = LutConfig::with_lut_dir(lut_dir);
        config.remote_base = remote_base;
        let inner = LutManager::new(config, JsonRsrProvider::new(rsr_dir)).map_err(to_py_err)?;
        Ok(PyLutManager { inner })
    }

    /// Returns (lut, meta)
    /// `parameters=None` keeps every stored parameter
    #[pyo3(signature = (lutid, parameters = default_parameters()))]
    fn load_generic(
        &self,
        py: Python,
        lutid: &str,
        parameters: Option<Vec<String>>,
    ) -> PyResult<(PyObject, PyObject)> {
        let lut = self
            .inner
            .load_generic(&LutId::new(lutid), parameters.as_deref())
            .map_err(to_py_err)?;

        let data = lut.data.to_pyarray(py);
        let meta = metadata_to_dict(py, &lut.meta)?;
        Ok((data.into(), meta.into()))
    }

    /// Returns ({band: lut}, meta)
    #[pyo3(signature = (lutid, sensor, parameters = default_parameters(), override_lut = false, get_remote = true))]
    fn load_for_sensor(
        &self,
        py: Python,
        lutid: &str,
        sensor: &str,
        parameters: Option<Vec<String>>,
        override_lut: bool,
        get_remote: bool,
    ) -> PyResult<(PyObject, PyObject)> {
        let options = SensorLutOptions {
            parameters,
            override_cache: override_lut,
            fetch_remote: get_remote,
        };
        let lut = self
            .inner
            .load_for_sensor(&LutId::new(lutid), sensor, &options)
            .map_err(to_py_err)?;

        let bands = PyDict::new(py);
        for band in &lut.bands {
            if let Some(data) = lut.band(band) {
                bands.set_item(band, data.to_pyarray(py))?;
            }
        }
        let meta = metadata_to_dict(py, &lut.meta)?;
        Ok((bands.into(), meta.into()))
    }

    fn __repr__(&self) -> String {
        let remote = match &self.inner.config().remote_base {
            Some(base) => format!("'{}'", base),
            None => "None".to_string(),
        };
        format!(
            "LutManager(lut_dir='{}', remote_base={})",
            self.inner.lut_dir().display(),
            remote
        )
    }
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyLutManager>()?;
    m.add("DEFAULT_LUT_PARAMETERS", DEFAULT_LUT_PARAMETERS.to_vec())?;
    Ok(())
}
