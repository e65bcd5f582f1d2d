//! aerlut: aerosol look-up table cache for atmospheric correction
//!
//! Loads wavelength resolved radiative transfer LUTs from a local cache
//! (plain or bzip2/gzip archived), and produces LUTs resampled to the
//! spectral bands of a sensor, either downloaded from a remote archive or
//! convolved locally with the sensor's relative spectral response.

pub mod types;
pub mod io;
pub mod core;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use crate::types::{
    AttrValue, GenericLut, LutConfig, LutError, LutId, LutMetadata, LutResult, RsrCurve,
    SensorLut, SensorLutOptions, SensorRsr, DEFAULT_LUT_PARAMETERS,
};

pub use crate::io::{GenericLutReader, HttpFetcher, JsonRsrProvider, RsrProvider, StaticRsrProvider};
pub use crate::core::{LoadedLut, LutManager};
