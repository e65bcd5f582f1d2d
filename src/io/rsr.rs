use crate::types::{LutError, LutResult, RsrCurve, SensorRsr};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Supplies the relative spectral response of a sensor's bands
pub trait RsrProvider: Send + Sync {
    fn rsr(&self, sensor: &str) -> LutResult<SensorRsr>;
}

impl RsrCurve {
    pub fn new(wave: Vec<f64>, response: Vec<f64>) -> Self {
        Self { wave, response }
    }

    /// Equal lengths, at least two points, ascending wavelength
    pub fn validate(&self) -> LutResult<()> {
        if self.wave.len() != self.response.len() {
            return Err(LutError::Rsr(format!(
                "{} wavelengths but {} response values",
                self.wave.len(),
                self.response.len()
            )));
        }
        if self.wave.len() < 2 {
            return Err(LutError::Rsr("response curve needs at least two points".to_string()));
        }
        if self.wave.windows(2).any(|w| w[1] <= w[0]) {
            return Err(LutError::Rsr("wavelengths must be strictly ascending".to_string()));
        }
        Ok(())
    }
}

impl SensorRsr {
    /// Build from `(band, curve)` pairs, keeping their order
    pub fn new(sensor: impl Into<String>, curves: Vec<(String, RsrCurve)>) -> LutResult<Self> {
        let sensor = sensor.into();
        let mut bands = Vec::with_capacity(curves.len());
        let mut map = HashMap::with_capacity(curves.len());

        for (band, curve) in curves {
            curve
                .validate()
                .map_err(|e| LutError::Rsr(format!("{} band {}: {}", sensor, band, e)))?;
            if map.insert(band.clone(), curve).is_some() {
                return Err(LutError::Rsr(format!("{} band {} declared twice", sensor, band)));
            }
            bands.push(band);
        }

        if bands.is_empty() {
            return Err(LutError::Rsr(format!("{} has no bands", sensor)));
        }

        Ok(Self {
            sensor,
            bands,
            curves: map,
        })
    }

    pub fn curve(&self, band: &str) -> LutResult<&RsrCurve> {
        self.curves
            .get(band)
            .ok_or_else(|| LutError::Rsr(format!("{} has no response for band {}", self.sensor, band)))
    }
}

/// In-memory RSR tables keyed by sensor name
#[derive(Debug, Default, Clone)]
pub struct StaticRsrProvider {
    sensors: HashMap<String, SensorRsr>,
}

impl StaticRsrProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rsr: SensorRsr) {
        self.sensors.insert(rsr.sensor.clone(), rsr);
    }

    pub fn with_sensor(mut self, rsr: SensorRsr) -> Self {
        self.insert(rsr);
        self
    }
}

impl RsrProvider for StaticRsrProvider {
    fn rsr(&self, sensor: &str) -> LutResult<SensorRsr> {
        self.sensors
            .get(sensor)
            .cloned()
            .ok_or_else(|| LutError::Rsr(format!("no RSR registered for sensor {}", sensor)))
    }
}

#[derive(Debug, Deserialize)]
struct RsrFile {
    bands: Vec<String>,
    rsr: HashMap<String, RsrCurve>,
}

/// Reads `<dir>/<sensor>.json`:
/// `{"bands": ["1", ...], "rsr": {"1": {"wave": [...], "response": [...]}}}`
#[derive(Debug, Clone)]
pub struct JsonRsrProvider {
    dir: PathBuf,
}

impl JsonRsrProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl RsrProvider for JsonRsrProvider {
    fn rsr(&self, sensor: &str) -> LutResult<SensorRsr> {
        let path = self.dir.join(format!("{}.json", sensor));
        log::debug!("Reading RSR file: {}", path.display());

        let text = std::fs::read_to_string(&path)
            .map_err(|e| LutError::Rsr(format!("cannot read {}: {}", path.display(), e)))?;
        let mut file: RsrFile = serde_json::from_str(&text)
            .map_err(|e| LutError::Rsr(format!("cannot parse {}: {}", path.display(), e)))?;

        let curves = file
            .bands
            .iter()
            .map(|band| {
                file.rsr
                    .remove(band)
                    .map(|curve| (band.clone(), curve))
                    .ok_or_else(|| {
                        LutError::Rsr(format!("{} lists band {} without a response", sensor, band))
                    })
            })
            .collect::<LutResult<Vec<_>>>()?;

        SensorRsr::new(sensor, curves)
    }
}
