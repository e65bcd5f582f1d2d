use crate::core::subset::{parameter_indices, select_parameters, zero_nans};
use crate::io::archive::{ArchiveKind, Decompressor};
use crate::io::container::{read_generic_lut, LUT_EXTENSION};
use crate::types::{GenericLut, LutError, LutId, LutResult};
use std::path::{Path, PathBuf};

/// Reader for wavelength resolved LUTs stored under a cache root
pub struct GenericLutReader;

impl GenericLutReader {
    /// `<dir>/<lutid>.lut`
    pub fn lut_path(dir: &Path, lutid: &LutId) -> PathBuf {
        dir.join(format!("{}.{}", lutid, LUT_EXTENSION))
    }

    /// Load a generic LUT, expanding an archived copy if needed.
    ///
    /// With `parameters` only the named rows are kept, in request order;
    /// unknown names are ignored. NaNs are replaced by zero.
    pub fn load<S: AsRef<str>>(
        lutid: &LutId,
        dir: &Path,
        parameters: Option<&[S]>,
        decompressor: &dyn Decompressor,
    ) -> LutResult<GenericLut> {
        let mut lut = match Self::read_any(lutid, dir, decompressor) {
            Ok(lut) => lut,
            Err(e) => {
                log::error!("Could not import LUT {} from {}: {}", lutid, dir.display(), e);
                return Err(e);
            }
        };

        if let Some(parameters) = parameters {
            let (indices, kept) = parameter_indices(&lut.meta.par, parameters);
            lut.data = select_parameters(&lut.data, &indices);
            lut.meta.par = kept;
        }

        let replaced = zero_nans(&mut lut.data);
        if replaced > 0 {
            log::debug!("Replaced {} NaN values in LUT {}", replaced, lutid);
        }

        log::info!("Loaded LUT {} with shape {:?}", lutid, lut.data.shape());
        Ok(lut)
    }

    fn read_any(lutid: &LutId, dir: &Path, decompressor: &dyn Decompressor) -> LutResult<GenericLut> {
        let path = Self::lut_path(dir, lutid);
        if path.is_file() {
            log::debug!("Reading LUT file: {}", path.display());
            return read_generic_lut(&path);
        }

        for kind in ArchiveKind::ALL {
            let archive = kind.archive_path(&path);
            if archive.is_file() {
                return Self::read_archived(&archive, dir, lutid, decompressor);
            }
        }

        Err(LutError::NotFound(format!(
            "{} (no {} or archived copy)",
            lutid,
            path.display()
        )))
    }

    /// Expand `archive` into a uniquely named temporary file beside it,
    /// read it, and remove the temporary file. The archive is kept.
    fn read_archived(
        archive: &Path,
        dir: &Path,
        lutid: &LutId,
        decompressor: &dyn Decompressor,
    ) -> LutResult<GenericLut> {
        log::info!("Extracting archived LUT {}", archive.display());

        let tmp = tempfile::Builder::new()
            .prefix(&format!(".{}.", lutid))
            .suffix(&format!(".{}", LUT_EXTENSION))
            .tempfile_in(dir)?;

        let result = decompressor
            .decompress(archive, tmp.path())
            .and_then(|_| read_generic_lut(tmp.path()));

        if let Err(e) = tmp.close() {
            log::warn!("Failed to remove extracted LUT for {}: {}", lutid, e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::archive::{compress_file, ArchiveDecompressor};
    use crate::io::container::write_generic_lut;
    use crate::types::LutMetadata;
    use ndarray::{Array, IxDyn};
    use tempfile::TempDir;

    fn write_sample(dir: &Path, lutid: &LutId) -> PathBuf {
        let shape = [3, 2, 1, 1, 1, 1, 2];
        let data = Array::from_shape_fn(IxDyn(&shape), |idx| {
            if idx[0] == 2 && idx[6] == 0 {
                f32::NAN
            } else {
                (idx[0] * 100 + idx[1] * 10 + idx[6]) as f32
            }
        });
        let lut = GenericLut {
            data,
            meta: LutMetadata {
                par: vec!["p1".to_string(), "p2".to_string(), "p3".to_string()],
                wave: vec![0.44, 0.56],
                ..Default::default()
            },
        };
        let path = GenericLutReader::lut_path(dir, lutid);
        write_generic_lut(&path, &lut).unwrap();
        path
    }

    #[test]
    fn test_load_all_parameters() {
        let dir = TempDir::new().unwrap();
        let lutid = LutId::new("TEST-LUT-1-MOD1");
        write_sample(dir.path(), &lutid);

        let lut = GenericLutReader::load::<&str>(&lutid, dir.path(), None, &ArchiveDecompressor)
            .unwrap();
        assert_eq!(lut.meta.par, vec!["p1", "p2", "p3"]);
        assert_eq!(lut.data.shape(), &[3, 2, 1, 1, 1, 1, 2]);
        assert!(lut.data.iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_load_subset() {
        let dir = TempDir::new().unwrap();
        let lutid = LutId::new("TEST-LUT-1-MOD1");
        write_sample(dir.path(), &lutid);

        let lut = GenericLutReader::load(
            &lutid,
            dir.path(),
            Some(&["p3", "missing", "p1"][..]),
            &ArchiveDecompressor,
        )
        .unwrap();
        assert_eq!(lut.meta.par, vec!["p3", "p1"]);
        assert_eq!(lut.data.shape()[0], 2);
        // p3 row with NaN at tau 0 is zeroed
        assert_eq!(lut.data[&[0usize, 0, 0, 0, 0, 0, 0][..]], 0.0);
        assert_eq!(lut.data[&[0usize, 1, 0, 0, 0, 0, 1][..]], 211.0);
        assert_eq!(lut.data[&[1usize, 1, 0, 0, 0, 0, 1][..]], 11.0);
    }

    #[test]
    fn test_missing_lut() {
        let dir = TempDir::new().unwrap();
        let result = GenericLutReader::load::<&str>(
            &LutId::new("NOPE"),
            dir.path(),
            None,
            &ArchiveDecompressor,
        );
        assert!(matches!(result, Err(LutError::NotFound(_))));
    }

    #[test]
    fn test_gzip_archive_is_used() {
        let dir = TempDir::new().unwrap();
        let lutid = LutId::new("TEST-LUT-1-MOD2");
        let path = write_sample(dir.path(), &lutid);
        let archive = compress_file(&path, ArchiveKind::Gzip).unwrap();
        std::fs::remove_file(&path).unwrap();

        let lut = GenericLutReader::load::<&str>(&lutid, dir.path(), None, &ArchiveDecompressor)
            .unwrap();
        assert_eq!(lut.meta.par.len(), 3);
        assert!(archive.exists());
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
