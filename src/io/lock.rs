use crate::types::{LutError, LutResult};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

/// Advisory lock file guarding the construction of one cache file.
/// Released when dropped.
#[derive(Debug)]
pub struct CacheLock {
    path: PathBuf,
}

impl CacheLock {
    /// `<target>.lock`
    pub fn lock_path(target: &Path) -> PathBuf {
        let mut name = target.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Wait until the lock for `target` can be taken
    pub fn acquire(
        target: &Path,
        timeout: Duration,
        poll_interval: Duration,
        stale_age: Duration,
    ) -> LutResult<Self> {
        let path = Self::lock_path(target);
        let started = Instant::now();

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    // Owner pid is informational only
                    let _ = writeln!(file, "{}", std::process::id());
                    log::debug!("Acquired lock {}", path.display());
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Self::is_stale(&path, stale_age) {
                        log::warn!("Removing stale lock {}", path.display());
                        let _ = std::fs::remove_file(&path);
                        continue;
                    }
                    if started.elapsed() >= timeout {
                        return Err(LutError::LockTimeout(path));
                    }
                    std::thread::sleep(poll_interval);
                }
                Err(e) => return Err(LutError::Io(e)),
            }
        }
    }

    fn is_stale(path: &Path, stale_age: Duration) -> bool {
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .map(|age| age > stale_age)
            .unwrap_or(false)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!("Failed to release lock {}: {}", self.path.display(), e);
        } else {
            log::debug!("Released lock {}", self.path.display());
        }
    }
}
