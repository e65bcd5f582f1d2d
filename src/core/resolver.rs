use crate::core::convolve::resample_to_sensor;
use crate::core::subset::{parameter_indices, select_parameters};
use crate::io::archive::{ArchiveDecompressor, Decompressor};
use crate::io::container::{read_sensor_lut, validate_sensor_lut, write_sensor_lut, LUT_EXTENSION};
use crate::io::generic::GenericLutReader;
use crate::io::lock::CacheLock;
use crate::io::remote::{remote_lut_url, HttpFetcher, RemoteFetcher};
use crate::io::rsr::RsrProvider;
use crate::types::{
    GenericLut, LutConfig, LutError, LutId, LutResult, SensorLut, SensorLutOptions,
};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Result of [`LutManager::load`]
#[derive(Debug, Clone)]
pub enum LoadedLut {
    Generic(GenericLut),
    Sensor(SensorLut),
}

/// Cache front end for generic and sensor specific LUTs.
///
/// Sensor LUTs are resolved in order: existing cache file, remote archive,
/// local resampling of the generic LUT. Whatever produced the file, the
/// result is always read back from disk.
pub struct LutManager {
    config: LutConfig,
    fetcher: Box<dyn RemoteFetcher>,
    rsr: Box<dyn RsrProvider>,
    decompressor: Box<dyn Decompressor>,
}

impl LutManager {
    /// Manager using HTTP downloads and bzip2/gzip archives
    pub fn new(config: LutConfig, rsr: impl RsrProvider + 'static) -> LutResult<Self> {
        let fetcher = HttpFetcher::new(config.remote_timeout)?;
        Ok(Self::with_collaborators(
            config,
            Box::new(fetcher),
            Box::new(rsr),
            Box::new(ArchiveDecompressor),
        ))
    }

    pub fn with_collaborators(
        config: LutConfig,
        fetcher: Box<dyn RemoteFetcher>,
        rsr: Box<dyn RsrProvider>,
        decompressor: Box<dyn Decompressor>,
    ) -> Self {
        Self {
            config,
            fetcher,
            rsr,
            decompressor,
        }
    }

    pub fn config(&self) -> &LutConfig {
        &self.config
    }

    pub fn lut_dir(&self) -> &Path {
        &self.config.lut_dir
    }

    /// `<lut_dir>/<sensor>/<lutid>_<sensor>.lut`
    pub fn sensor_lut_path(&self, lutid: &LutId, sensor: &str) -> PathBuf {
        self.config
            .lut_dir
            .join(sensor)
            .join(format!("{}.{}", lutid.sensor_stem(sensor), LUT_EXTENSION))
    }

    /// Generic LUT, optionally reduced to `parameters`
    pub fn load_generic<S: AsRef<str>>(
        &self,
        lutid: &LutId,
        parameters: Option<&[S]>,
    ) -> LutResult<GenericLut> {
        GenericLutReader::load(lutid, &self.config.lut_dir, parameters, self.decompressor.as_ref())
    }

    /// Generic LUT when `sensor` is `None`, sensor LUT otherwise
    pub fn load(
        &self,
        lutid: &LutId,
        sensor: Option<&str>,
        options: &SensorLutOptions,
    ) -> LutResult<LoadedLut> {
        match sensor {
            None => self
                .load_generic(lutid, options.parameters.as_deref())
                .map(LoadedLut::Generic),
            Some(sensor) => self
                .load_for_sensor(lutid, sensor, options)
                .map(LoadedLut::Sensor),
        }
    }

    /// LUT resampled to the bands of `sensor`
    pub fn load_for_sensor(
        &self,
        lutid: &LutId,
        sensor: &str,
        options: &SensorLutOptions,
    ) -> LutResult<SensorLut> {
        if sensor.is_empty() {
            return Err(LutError::InvalidInput("empty sensor name".to_string()));
        }

        let path = self.sensor_lut_path(lutid, sensor);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if options.override_cache && path.is_file() {
            log::info!("Removing cached LUT {} for rebuild", path.display());
            std::fs::remove_file(&path)?;
        }

        if !path.is_file() {
            let _lock = if self.config.use_lock {
                self.lock_cache(&path)?
            } else {
                None
            };

            // Another process may have built it while we waited
            if !path.is_file() {
                self.populate(lutid, sensor, &path, options)?;
            }
        }

        let mut lut = read_sensor_lut(&path).map_err(|e| {
            log::error!("Failed to open LUT data for {} ({}): {}", lutid, sensor, e);
            e
        })?;

        if let Some(parameters) = &options.parameters {
            let (indices, kept) = parameter_indices(&lut.meta.par, parameters);
            for array in lut.data.values_mut() {
                *array = select_parameters(array, &indices);
            }
            lut.meta.par = kept;
        }

        log::info!(
            "Loaded {} LUT {} with {} bands",
            sensor,
            lutid,
            lut.bands.len()
        );
        Ok(lut)
    }

    /// Take the build lock for `path`. A lock still held after
    /// `lock_timeout` is ignored; the rename into place keeps the file whole.
    fn lock_cache(&self, path: &Path) -> LutResult<Option<CacheLock>> {
        match CacheLock::acquire(
            path,
            self.config.lock_timeout,
            self.config.lock_poll_interval,
            self.config.stale_lock_age,
        ) {
            Ok(lock) => Ok(Some(lock)),
            Err(LutError::LockTimeout(lock_path)) => {
                log::warn!(
                    "Lock {} still held after {:?}, building without it",
                    lock_path.display(),
                    self.config.lock_timeout
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn populate(
        &self,
        lutid: &LutId,
        sensor: &str,
        path: &Path,
        options: &SensorLutOptions,
    ) -> LutResult<()> {
        match (options.fetch_remote, &self.config.remote_base) {
            (true, Some(base)) => match self.fetch_remote(base, lutid, sensor, path) {
                Ok(url) => log::info!("Downloaded remote LUT {} to {}", url, path.display()),
                Err(e) => log::warn!("Could not download remote LUT for {} ({}): {}", lutid, sensor, e),
            },
            (true, None) => log::debug!("No remote LUT archive configured"),
            (false, _) => {}
        }

        if !path.is_file() {
            self.resample_local(lutid, sensor, path)?;
        }
        Ok(())
    }

    /// Download into a temporary file, check it decodes, then move it into
    /// place. Returns the URL used.
    fn fetch_remote(
        &self,
        base: &str,
        lutid: &LutId,
        sensor: &str,
        path: &Path,
    ) -> LutResult<String> {
        let url = remote_lut_url(base, lutid, sensor);
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let tmp = NamedTempFile::new_in(parent)?;

        log::info!("Attempting download from: {}", url);
        self.fetcher.fetch(&url, tmp.path())?;

        validate_sensor_lut(tmp.path()).map_err(|e| {
            LutError::RemoteUnavailable(format!("{} did not yield a sensor LUT: {}", url, e))
        })?;

        tmp.persist(path).map_err(|e| LutError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.error.to_string(),
        })?;
        Ok(url)
    }

    fn resample_local(&self, lutid: &LutId, sensor: &str, path: &Path) -> LutResult<()> {
        log::info!("Resampling LUT {} to sensor {}", lutid, sensor);

        let rsr = self.rsr.rsr(sensor).map_err(|e| {
            log::error!("No RSR available for {}: {}", sensor, e);
            e
        })?;
        let generic = self.load_generic::<&str>(lutid, None)?;
        let sensor_lut = resample_to_sensor(&generic, &rsr)?;

        write_sensor_lut(path, &sensor_lut).map_err(|e| {
            log::error!("Failed to write LUT data for {}: {}", lutid, e);
            e
        })?;
        log::info!("Wrote {} band LUT to {}", sensor_lut.bands.len(), path.display());
        Ok(())
    }
}
