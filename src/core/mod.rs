//! Core LUT processing modules

pub mod convolve;
pub mod resolver;
pub mod subset;

// Re-export main types
pub use convolve::{convolve_axis, resample_to_sensor};
pub use resolver::{LoadedLut, LutManager};
pub use subset::{parameter_indices, select_parameters};
