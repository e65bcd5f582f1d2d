//! Binary LUT container shared by the local cache and the remote archive.
//!
//! A file is an 8 byte magic followed by a `bincode` encoded record holding
//! string/numeric attributes, named dimensions and named `f32` variables.
//! List valued metadata (the parameter names) is flattened to a comma joined
//! string here and nowhere else.

use crate::types::{
    AttrValue, GenericLut, LutError, LutMetadata, LutResult, SensorLut, GENERIC_AXES,
    GENERIC_NDIM, SENSOR_AXES, SENSOR_NDIM,
};
use bincode::Options;
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// File extension of uncompressed LUT files
pub const LUT_EXTENSION: &str = "lut";

/// Name of the data variable in a generic LUT file
pub const GENERIC_VARIABLE: &str = "lut";

const MAGIC: &[u8; 8] = b"AERLUT\0\x01";
const SIZE_LIMIT: u64 = 8 << 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum StoredAttr {
    Text(String),
    Integer(i64),
    Float(f64),
    Floats(Vec<f64>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Dimension {
    name: String,
    len: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Variable {
    name: String,
    dims: Vec<String>,
    values: Vec<f32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LutContainer {
    attributes: BTreeMap<String, StoredAttr>,
    dimensions: Vec<Dimension>,
    variables: Vec<Variable>,
}

impl LutContainer {
    fn dimension_len(&self, name: &str) -> Option<usize> {
        self.dimensions
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.len as usize)
    }

    fn variable_shape(&self, var: &Variable) -> Result<Vec<usize>, String> {
        var.dims
            .iter()
            .map(|d| {
                self.dimension_len(d)
                    .ok_or_else(|| format!("variable {} uses undeclared dimension {}", var.name, d))
            })
            .collect()
    }

    fn variable_array(&self, var: &Variable) -> Result<ArrayD<f32>, String> {
        let shape = self.variable_shape(var)?;
        ArrayD::from_shape_vec(IxDyn(&shape), var.values.clone())
            .map_err(|e| format!("variable {} does not match its dimensions: {}", var.name, e))
    }
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new().with_limit(SIZE_LIMIT)
}

fn metadata_to_attributes(meta: &LutMetadata) -> BTreeMap<String, StoredAttr> {
    let mut attributes = BTreeMap::new();

    for (key, value) in &meta.attributes {
        if key == "par" || key == "wave" {
            continue;
        }
        let stored = match value {
            AttrValue::Text(items) => StoredAttr::Text(items.join(",")),
            AttrValue::Integer(v) => StoredAttr::Integer(*v),
            AttrValue::Number(v) => StoredAttr::Float(*v),
            AttrValue::Numbers(v) => StoredAttr::Floats(v.clone()),
        };
        attributes.insert(key.clone(), stored);
    }

    attributes.insert("par".to_string(), StoredAttr::Text(meta.par.join(",")));
    if !meta.wave.is_empty() {
        attributes.insert("wave".to_string(), StoredAttr::Floats(meta.wave.clone()));
    }
    attributes
}

fn split_text(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split(',').map(str::to_string).collect()
}

fn attributes_to_metadata(attributes: &BTreeMap<String, StoredAttr>) -> LutMetadata {
    let mut meta = LutMetadata::default();

    for (key, stored) in attributes {
        let value = match stored {
            StoredAttr::Text(text) => AttrValue::Text(split_text(text)),
            StoredAttr::Integer(v) => AttrValue::Integer(*v),
            StoredAttr::Float(v) => AttrValue::Number(*v),
            StoredAttr::Floats(v) => AttrValue::Numbers(v.clone()),
        };

        match (key.as_str(), value) {
            ("par", AttrValue::Text(par)) => meta.par = par,
            ("wave", AttrValue::Numbers(wave)) => meta.wave = wave,
            ("wave", AttrValue::Number(wave)) => meta.wave = vec![wave],
            (_, value) => {
                meta.attributes.insert(key.clone(), value);
            }
        }
    }
    meta
}

fn encode<W: Write>(writer: W, container: &LutContainer) -> Result<(), String> {
    let mut writer = BufWriter::new(writer);
    writer.write_all(MAGIC).map_err(|e| e.to_string())?;
    codec()
        .serialize_into(&mut writer, container)
        .map_err(|e| e.to_string())?;
    writer.flush().map_err(|e| e.to_string())
}

fn generic_container(lut: &GenericLut) -> LutResult<LutContainer> {
    let shape = lut.data.shape();
    if shape.len() != GENERIC_NDIM {
        return Err(LutError::InvalidInput(format!(
            "generic LUT must have {} axes, got {}",
            GENERIC_NDIM,
            shape.len()
        )));
    }
    if shape[0] != lut.meta.par.len() || shape[1] != lut.meta.wave.len() {
        return Err(LutError::InvalidInput(format!(
            "generic LUT shape {:?} does not match {} parameters and {} wavelengths",
            shape,
            lut.meta.par.len(),
            lut.meta.wave.len()
        )));
    }

    Ok(LutContainer {
        attributes: metadata_to_attributes(&lut.meta),
        dimensions: GENERIC_AXES
            .iter()
            .zip(shape)
            .map(|(name, &len)| Dimension {
                name: name.to_string(),
                len: len as u64,
            })
            .collect(),
        variables: vec![Variable {
            name: GENERIC_VARIABLE.to_string(),
            dims: GENERIC_AXES.iter().map(|d| d.to_string()).collect(),
            values: lut.data.iter().copied().collect(),
        }],
    })
}

fn sensor_container(lut: &SensorLut) -> LutResult<LutContainer> {
    let first = lut
        .bands
        .first()
        .ok_or_else(|| LutError::InvalidInput("sensor LUT has no bands".to_string()))?;
    let shape = lut
        .data
        .get(first)
        .ok_or_else(|| LutError::InvalidInput(format!("missing data for band {}", first)))?
        .shape()
        .to_vec();

    if shape.len() != SENSOR_NDIM || shape[0] != lut.meta.par.len() {
        return Err(LutError::InvalidInput(format!(
            "sensor LUT shape {:?} does not match {} parameters",
            shape,
            lut.meta.par.len()
        )));
    }

    let mut variables = Vec::with_capacity(lut.bands.len());
    for band in &lut.bands {
        let data = lut
            .data
            .get(band)
            .ok_or_else(|| LutError::InvalidInput(format!("missing data for band {}", band)))?;
        if data.shape() != shape.as_slice() {
            return Err(LutError::InvalidInput(format!(
                "band {} has shape {:?}, expected {:?}",
                band,
                data.shape(),
                shape
            )));
        }
        variables.push(Variable {
            name: band.clone(),
            dims: SENSOR_AXES.iter().map(|d| d.to_string()).collect(),
            values: data.iter().copied().collect(),
        });
    }

    Ok(LutContainer {
        attributes: metadata_to_attributes(&lut.meta.without_wave()),
        dimensions: SENSOR_AXES
            .iter()
            .zip(&shape)
            .map(|(name, &len)| Dimension {
                name: name.to_string(),
                len: len as u64,
            })
            .collect(),
        variables,
    })
}

/// Write `container` next to `path` under a temporary name, then rename it
/// into place. Nothing is left behind when any step fails.
fn save_atomic(path: &Path, container: &LutContainer) -> LutResult<()> {
    let write_failed = |reason: String| LutError::WriteFailed {
        path: path.to_path_buf(),
        reason,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| write_failed(e.to_string()))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| write_failed(e.to_string()))?;
    encode(tmp.as_file_mut(), container).map_err(write_failed)?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| write_failed(e.to_string()))?;
    tmp.persist(path)
        .map_err(|e| write_failed(e.error.to_string()))?;

    log::debug!("Wrote LUT file {}", path.display());
    Ok(())
}

fn read_container(path: &Path) -> LutResult<LutContainer> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(LutError::NotFound(path.display().to_string()))
        }
        Err(e) => return Err(LutError::Io(e)),
    };
    let corrupt = |reason: String| LutError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = BufReader::new(file);
    let mut magic = [0u8; 8];
    reader
        .read_exact(&mut magic)
        .map_err(|e| corrupt(format!("cannot read header: {}", e)))?;
    if &magic != MAGIC {
        return Err(corrupt("not a LUT container".to_string()));
    }

    codec()
        .deserialize_from(&mut reader)
        .map_err(|e| corrupt(e.to_string()))
}

/// Persist a generic LUT
pub fn write_generic_lut(path: &Path, lut: &GenericLut) -> LutResult<()> {
    let container = generic_container(lut)?;
    save_atomic(path, &container)
}

/// Persist a band resampled LUT; bands are stored in `lut.bands` order
pub fn write_sensor_lut(path: &Path, lut: &SensorLut) -> LutResult<()> {
    let container = sensor_container(lut)?;
    save_atomic(path, &container)
}

/// Read a generic LUT file in full. NaNs are kept as stored.
pub fn read_generic_lut(path: &Path) -> LutResult<GenericLut> {
    let container = read_container(path)?;
    let corrupt = |reason: String| LutError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    let var = container
        .variables
        .iter()
        .find(|v| v.name == GENERIC_VARIABLE)
        .ok_or_else(|| corrupt(format!("no '{}' variable", GENERIC_VARIABLE)))?;
    let data = container.variable_array(var).map_err(corrupt)?;
    if data.ndim() != GENERIC_NDIM {
        return Err(corrupt(format!(
            "expected {} axes, found {}",
            GENERIC_NDIM,
            data.ndim()
        )));
    }

    let meta = attributes_to_metadata(&container.attributes);
    if data.shape()[0] != meta.par.len() {
        return Err(corrupt(format!(
            "{} parameter rows but {} parameter names",
            data.shape()[0],
            meta.par.len()
        )));
    }

    Ok(GenericLut { data, meta })
}

/// Read every band of a sensor LUT file
pub fn read_sensor_lut(path: &Path) -> LutResult<SensorLut> {
    let container = read_container(path)?;
    let corrupt = |reason: String| LutError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    if container.variables.is_empty() {
        return Err(corrupt("no band variables".to_string()));
    }

    let meta = attributes_to_metadata(&container.attributes);
    let mut bands = Vec::with_capacity(container.variables.len());
    let mut data = HashMap::with_capacity(container.variables.len());
    let mut expected_shape: Option<Vec<usize>> = None;

    for var in &container.variables {
        let array = container.variable_array(var).map_err(corrupt)?;
        if array.ndim() != SENSOR_NDIM {
            return Err(corrupt(format!(
                "band {} has {} axes, expected {}",
                var.name,
                array.ndim(),
                SENSOR_NDIM
            )));
        }
        match &expected_shape {
            Some(shape) if shape.as_slice() != array.shape() => {
                return Err(corrupt(format!("band {} has a different shape", var.name)));
            }
            None => expected_shape = Some(array.shape().to_vec()),
            _ => {}
        }
        bands.push(var.name.clone());
        data.insert(var.name.clone(), array);
    }

    if let Some(shape) = &expected_shape {
        if shape[0] != meta.par.len() {
            return Err(corrupt(format!(
                "{} parameter rows but {} parameter names",
                shape[0],
                meta.par.len()
            )));
        }
    }

    Ok(SensorLut { bands, data, meta })
}

/// Check that `path` decodes as a sensor LUT without keeping the data
pub fn validate_sensor_lut(path: &Path) -> LutResult<()> {
    read_sensor_lut(path).map(|_| ())
}
