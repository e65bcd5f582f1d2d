use crate::types::{LutError, LutResult};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Compression formats accepted for archived generic LUTs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Bzip2,
    Gzip,
}

impl ArchiveKind {
    /// Lookup order when the uncompressed file is missing
    pub const ALL: [ArchiveKind; 2] = [ArchiveKind::Bzip2, ArchiveKind::Gzip];

    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveKind::Bzip2 => "bz2",
            ArchiveKind::Gzip => "gz",
        }
    }

    /// `path` with the archive extension appended (`x.lut` -> `x.lut.bz2`)
    pub fn archive_path(&self, path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".");
        name.push(self.extension());
        PathBuf::from(name)
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bz2") => Some(ArchiveKind::Bzip2),
            Some("gz") => Some(ArchiveKind::Gzip),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Expands an archive into a plain file
pub trait Decompressor: Send + Sync {
    fn decompress(&self, source: &Path, destination: &Path) -> LutResult<()>;
}

/// Decompressor choosing bzip2 or gzip from the source extension
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveDecompressor;

impl Decompressor for ArchiveDecompressor {
    fn decompress(&self, source: &Path, destination: &Path) -> LutResult<()> {
        let kind = ArchiveKind::from_path(source).ok_or_else(|| {
            LutError::InvalidInput(format!("unknown archive type: {}", source.display()))
        })?;
        log::debug!("Decompressing {} archive {}", kind, source.display());

        let input = BufReader::new(File::open(source)?);
        let mut output = BufWriter::new(File::create(destination)?);

        let copied = match kind {
            ArchiveKind::Bzip2 => {
                let mut decoder = bzip2::read::BzDecoder::new(input);
                std::io::copy(&mut decoder, &mut output)
            }
            ArchiveKind::Gzip => {
                let mut decoder = flate2::read::GzDecoder::new(input);
                std::io::copy(&mut decoder, &mut output)
            }
        }
        .map_err(|e| LutError::Corrupt {
            path: source.to_path_buf(),
            reason: format!("failed to decompress: {}", e),
        })?;

        output.flush()?;
        log::debug!("Decompressed {} bytes to {}", copied, destination.display());
        Ok(())
    }
}

/// Compress `source` into `source.<ext>`, keeping the source file.
/// Returns the archive path.
pub fn compress_file(source: &Path, kind: ArchiveKind) -> LutResult<PathBuf> {
    let target = kind.archive_path(source);
    let mut input = BufReader::new(File::open(source)?);
    let output = BufWriter::new(File::create(&target)?);

    match kind {
        ArchiveKind::Bzip2 => {
            let mut encoder = bzip2::write::BzEncoder::new(output, bzip2::Compression::best());
            std::io::copy(&mut input, &mut encoder)?;
            encoder.finish()?.flush()?;
        }
        ArchiveKind::Gzip => {
            let mut encoder =
                flate2::write::GzEncoder::new(output, flate2::Compression::default());
            std::io::copy(&mut input, &mut encoder)?;
            encoder.finish()?.flush()?;
        }
    }

    log::info!("Archived {} to {}", source.display(), target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_archive_path() {
        let path = Path::new("/luts/ACOLITE-LUT-202110-MOD1.lut");
        assert_eq!(
            ArchiveKind::Bzip2.archive_path(path),
            PathBuf::from("/luts/ACOLITE-LUT-202110-MOD1.lut.bz2")
        );
        assert_eq!(
            ArchiveKind::from_path(&ArchiveKind::Gzip.archive_path(path)),
            Some(ArchiveKind::Gzip)
        );
        assert_eq!(ArchiveKind::from_path(path), None);
    }

    #[test]
    fn test_compress_then_decompress() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("data.lut");
        let payload: Vec<u8> = (0..4096u32).flat_map(|v| v.to_le_bytes()).collect();
        std::fs::write(&source, &payload).unwrap();

        for kind in ArchiveKind::ALL {
            let archive = compress_file(&source, kind).unwrap();
            assert!(archive.exists());

            let restored = dir.path().join(format!("restored_{}", kind));
            ArchiveDecompressor.decompress(&archive, &restored).unwrap();
            assert_eq!(std::fs::read(&restored).unwrap(), payload);
        }
    }

    #[test]
    fn test_garbage_archive_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("broken.lut.bz2");
        std::fs::write(&archive, b"definitely not bzip2").unwrap();

        let result = ArchiveDecompressor.decompress(&archive, &dir.path().join("out.lut"));
        assert!(matches!(result, Err(LutError::Corrupt { .. })));
    }
}
