use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

/// Number of axes of a generic LUT: par, wave, azi, thv, ths, wnd, tau
pub const GENERIC_NDIM: usize = 7;

/// Number of axes of a band resampled LUT (wavelength removed)
pub const SENSOR_NDIM: usize = 6;

/// Axis names of a generic LUT, in storage order
pub const GENERIC_AXES: [&str; GENERIC_NDIM] = ["par", "wave", "azi", "thv", "ths", "wnd", "tau"];

/// Axis names of a sensor LUT band, in storage order
pub const SENSOR_AXES: [&str; SENSOR_NDIM] = ["par", "azi", "thv", "ths", "wnd", "tau"];

/// Index of the wavelength axis in a generic LUT
pub const WAVE_AXIS: usize = 1;

/// Parameters the correction code normally asks for
pub const DEFAULT_LUT_PARAMETERS: [&str; 5] = ["utott", "dtott", "astot", "ttot", "romix"];

/// LUT identifier, e.g. `ACOLITE-LUT-202110-MOD1-1013mb`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LutId(String);

impl LutId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First three dash separated tokens, used as the remote directory
    pub fn model_prefix(&self) -> String {
        self.0.split('-').take(3).collect::<Vec<_>>().join("-")
    }

    /// Cache stem of the sensor specific table: `<lutid>_<sensor>`
    pub fn sensor_stem(&self, sensor: &str) -> String {
        format!("{}_{}", self.0, sensor)
    }
}

impl std::fmt::Display for LutId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LutId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for LutId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Free-form metadata attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    /// String attribute, split on commas when read from disk
    Text(Vec<String>),
    Integer(i64),
    Number(f64),
    Numbers(Vec<f64>),
}

/// Metadata shared by generic and sensor LUTs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LutMetadata {
    /// Ordered parameter names, one per row of the leading axis
    pub par: Vec<String>,
    /// Wavelength grid in micron (empty once resampled to bands)
    pub wave: Vec<f64>,
    pub attributes: BTreeMap<String, AttrValue>,
}

impl LutMetadata {
    /// Position of a parameter in the leading axis
    pub fn parameter_index(&self, name: &str) -> Option<usize> {
        self.par.iter().position(|p| p == name)
    }

    /// Copy of this record without the wavelength grid
    pub fn without_wave(&self) -> Self {
        Self {
            par: self.par.clone(),
            wave: Vec::new(),
            attributes: self.attributes.clone(),
        }
    }
}

/// Wavelength resolved LUT
#[derive(Debug, Clone)]
pub struct GenericLut {
    /// [par, wave, azi, thv, ths, wnd, tau]
    pub data: ArrayD<f32>,
    pub meta: LutMetadata,
}

/// LUT resampled to the bands of one sensor
#[derive(Debug, Clone)]
pub struct SensorLut {
    /// Band names in the order declared by the RSR provider
    pub bands: Vec<String>,
    /// Per band [par, azi, thv, ths, wnd, tau]
    pub data: HashMap<String, ArrayD<f32>>,
    pub meta: LutMetadata,
}

impl SensorLut {
    pub fn band(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.data.get(name)
    }
}

/// Relative spectral response of one band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsrCurve {
    /// Wavelength in micron, ascending
    pub wave: Vec<f64>,
    pub response: Vec<f64>,
}

/// All band responses of one sensor
#[derive(Debug, Clone)]
pub struct SensorRsr {
    pub sensor: String,
    pub bands: Vec<String>,
    pub curves: HashMap<String, RsrCurve>,
}

/// Cache and remote settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LutConfig {
    /// Root of the LUT cache
    pub lut_dir: PathBuf,
    /// Archive of pre-resampled sensor LUTs in this crate's container
    /// format; `None` skips the remote tier
    pub remote_base: Option<String>,
    /// Overrides the HTTP client's default timeout
    pub remote_timeout: Option<Duration>,
    /// Guard cache population with a `.lock` file
    pub use_lock: bool,
    /// Longest wait for another builder before building without the lock
    pub lock_timeout: Duration,
    pub lock_poll_interval: Duration,
    /// Lock files older than this are considered abandoned
    pub stale_lock_age: Duration,
}

impl Default for LutConfig {
    fn default() -> Self {
        let lut_dir = dirs::cache_dir()
            .map(|dir| dir.join("aerlut").join("luts"))
            .unwrap_or_else(|| PathBuf::from("luts"));

        Self {
            lut_dir,
            remote_base: None,
            remote_timeout: None,
            use_lock: true,
            lock_timeout: Duration::from_secs(120),
            lock_poll_interval: Duration::from_millis(250),
            stale_lock_age: Duration::from_secs(60),
        }
    }
}

impl LutConfig {
    pub fn with_lut_dir(lut_dir: impl Into<PathBuf>) -> Self {
        Self {
            lut_dir: lut_dir.into(),
            ..Self::default()
        }
    }
}

/// Per request options for sensor LUT resolution
#[derive(Debug, Clone)]
pub struct SensorLutOptions {
    /// Parameters to keep; `None` keeps all stored parameters
    pub parameters: Option<Vec<String>>,
    /// Delete and rebuild an existing cache file
    pub override_cache: bool,
    /// Try the remote archive before resampling locally
    pub fetch_remote: bool,
}

impl Default for SensorLutOptions {
    fn default() -> Self {
        Self {
            parameters: None,
            override_cache: false,
            fetch_remote: true,
        }
    }
}

impl SensorLutOptions {
    pub fn with_default_parameters() -> Self {
        Self {
            parameters: Some(DEFAULT_LUT_PARAMETERS.iter().map(|p| p.to_string()).collect()),
            ..Self::default()
        }
    }
}

/// Error types for LUT handling
#[derive(Debug, thiserror::Error)]
pub enum LutError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("LUT not found: {0}")]
    NotFound(String),

    #[error("Corrupt LUT file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Remote LUT unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Failed to write LUT file {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("Resampling error: {0}")]
    Resample(String),

    #[error("RSR error: {0}")]
    Rsr(String),

    #[error("Timed out waiting for lock {0}")]
    LockTimeout(PathBuf),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl LutError {
    /// True when the error means no usable table exists
    pub fn is_absent(&self) -> bool {
        matches!(self, LutError::NotFound(_) | LutError::Corrupt { .. })
    }
}

/// Result type for LUT operations
pub type LutResult<T> = Result<T, LutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters() {
        let options = SensorLutOptions::with_default_parameters();
        assert_eq!(
            options.parameters.unwrap(),
            vec!["utott", "dtott", "astot", "ttot", "romix"]
        );
        assert!(options.fetch_remote);
        assert!(!options.override_cache);
    }

    #[test]
    fn test_default_config() {
        let config = LutConfig::with_lut_dir("/tmp/luts");
        assert_eq!(config.lut_dir, PathBuf::from("/tmp/luts"));
        assert!(config.remote_base.is_none());
        assert!(config.stale_lock_age <= config.lock_timeout);
    }

    #[test]
    fn test_lutid_parts() {
        let lutid = LutId::new("ACOLITE-LUT-202110-MOD1-1013mb");
        assert_eq!(lutid.model_prefix(), "ACOLITE-LUT-202110");
        assert_eq!(lutid.sensor_stem("S2A_MSI"), "ACOLITE-LUT-202110-MOD1-1013mb_S2A_MSI");
    }
}
