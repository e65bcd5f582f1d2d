use aerlut::io::archive::{compress_file, ArchiveDecompressor, ArchiveKind};
use aerlut::io::container::write_generic_lut;
use aerlut::{GenericLut, GenericLutReader, LutError, LutId, LutMetadata};
use ndarray::{ArrayD, IxDyn};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const LUTID: &str = "ACOLITE-LUT-202110-MOD2-1013mb";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Three parameters, NaNs sprinkled through the last one
fn write_lut(dir: &Path) -> (PathBuf, GenericLut) {
    let shape = [3, 4, 2, 2, 1, 2, 3];
    let n: usize = shape.iter().product();
    let values: Vec<f32> = (0..n)
        .map(|i| if i % 7 == 3 { f32::NAN } else { i as f32 * 0.5 })
        .collect();
    let lut = GenericLut {
        data: ArrayD::from_shape_vec(IxDyn(&shape), values).unwrap(),
        meta: LutMetadata {
            par: vec!["p1".to_string(), "p2".to_string(), "p3".to_string()],
            wave: vec![0.44, 0.56, 0.86, 2.2],
            ..Default::default()
        },
    };
    let path = GenericLutReader::lut_path(dir, &LutId::new(LUTID));
    write_generic_lut(&path, &lut).unwrap();
    (path, lut)
}

#[test]
fn test_nans_are_zeroed() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let (_, stored) = write_lut(dir.path());
    assert!(stored.data.iter().any(|v| v.is_nan()));

    let lut = GenericLutReader::load::<&str>(&LutId::new(LUTID), dir.path(), None, &ArchiveDecompressor)
        .unwrap();

    assert_eq!(lut.data.iter().filter(|v| v.is_nan()).count(), 0);
    for (loaded, original) in lut.data.iter().zip(stored.data.iter()) {
        if original.is_nan() {
            assert_eq!(*loaded, 0.0);
        } else {
            assert_eq!(loaded, original);
        }
    }
}

#[test]
fn test_subset_order_and_rows() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let (_, stored) = write_lut(dir.path());

    let lut = GenericLutReader::load(
        &LutId::new(LUTID),
        dir.path(),
        Some(&["p2", "p1"][..]),
        &ArchiveDecompressor,
    )
    .unwrap();

    assert_eq!(lut.meta.par, vec!["p2", "p1"]);
    assert_eq!(lut.data.shape()[0], 2);
    assert_eq!(lut.data.shape()[1..], stored.data.shape()[1..]);

    let clean = |v: f32| if v.is_nan() { 0.0 } else { v };
    for (row, stored_row) in [(0usize, 1usize), (1, 0)] {
        let loaded = lut.data.index_axis(ndarray::Axis(0), row);
        let original = stored.data.index_axis(ndarray::Axis(0), stored_row);
        for (a, b) in loaded.iter().zip(original.iter()) {
            assert_eq!(*a, clean(*b));
        }
    }
}

#[test]
fn test_absent_parameter_is_omitted() {
    let dir = TempDir::new().unwrap();
    write_lut(dir.path());

    let lut = GenericLutReader::load(
        &LutId::new(LUTID),
        dir.path(),
        Some(&["romix", "p3"][..]),
        &ArchiveDecompressor,
    )
    .unwrap();

    assert_eq!(lut.meta.par, vec!["p3"]);
    assert_eq!(lut.data.shape()[0], 1);
}

#[test]
fn test_bz2_archive_cleanup() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let (path, _) = write_lut(dir.path());
    let archive = compress_file(&path, ArchiveKind::Bzip2).unwrap();
    std::fs::remove_file(&path).unwrap();

    let lut = GenericLutReader::load::<&str>(&LutId::new(LUTID), dir.path(), None, &ArchiveDecompressor)
        .unwrap();
    assert_eq!(lut.meta.par.len(), 3);

    assert!(!path.exists(), "uncompressed copy left behind");
    assert!(archive.exists(), "archive was removed");
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p != &archive)
        .collect();
    assert!(leftovers.is_empty(), "unexpected files: {:?}", leftovers);
}

#[test]
fn test_corrupt_archive_reports_absence() {
    let dir = TempDir::new().unwrap();
    let path = GenericLutReader::lut_path(dir.path(), &LutId::new(LUTID));
    let archive = ArchiveKind::Bzip2.archive_path(&path);
    std::fs::write(&archive, b"BZh9 broken").unwrap();

    let err = GenericLutReader::load::<&str>(&LutId::new(LUTID), dir.path(), None, &ArchiveDecompressor)
        .unwrap_err();
    assert!(err.is_absent());
    assert!(archive.exists());
    assert!(!path.exists());
}

#[test]
fn test_corrupt_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = GenericLutReader::lut_path(dir.path(), &LutId::new(LUTID));
    std::fs::write(&path, b"garbage").unwrap();

    let result = GenericLutReader::load::<&str>(&LutId::new(LUTID), dir.path(), None, &ArchiveDecompressor);
    assert!(matches!(result, Err(LutError::Corrupt { .. })));
    assert!(result.ok().is_none());
}
