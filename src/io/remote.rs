use crate::io::container::LUT_EXTENSION;
use crate::types::{LutError, LutId, LutResult};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

/// Downloads a remote file to a local path
pub trait RemoteFetcher: Send + Sync {
    fn fetch(&self, url: &str, destination: &Path) -> LutResult<()>;
}

/// Remote location of a pre-resampled sensor LUT:
/// `<base>/<model-prefix>/<sensor>/<lutid>_<sensor>.lut`
pub fn remote_lut_url(remote_base: &str, lutid: &LutId, sensor: &str) -> String {
    format!(
        "{}/{}/{}/{}.{}",
        remote_base.trim_end_matches('/'),
        lutid.model_prefix(),
        sensor,
        lutid.sensor_stem(sensor),
        LUT_EXTENSION
    )
}

/// Blocking HTTP(S) fetcher
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// `timeout` of `None` keeps the client's default
    pub fn new(timeout: Option<Duration>) -> LutResult<Self> {
        let mut builder = reqwest::blocking::Client::builder()
            .user_agent(concat!("aerlut/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            LutError::RemoteUnavailable(format!("Failed to create HTTP client: {}", e))
        })?;
        Ok(Self { client })
    }
}

impl RemoteFetcher for HttpFetcher {
    fn fetch(&self, url: &str, destination: &Path) -> LutResult<()> {
        log::debug!("Downloading from: {}", url);

        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| LutError::RemoteUnavailable(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(LutError::RemoteUnavailable(format!(
                "HTTP {} {}: {}",
                response.status().as_u16(),
                response.status().canonical_reason().unwrap_or(""),
                url
            )));
        }

        let mut output = BufWriter::new(File::create(destination)?);
        let bytes = response
            .copy_to(&mut output)
            .map_err(|e| LutError::RemoteUnavailable(format!("Failed to read response body: {}", e)))?;
        output.flush()?;

        log::debug!("Downloaded {} bytes to {}", bytes, destination.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_url_layout() {
        let lutid = LutId::new("ACOLITE-LUT-202110-MOD2-1013mb");
        let url = remote_lut_url("https://example.org/luts/", &lutid, "S2A_MSI");
        assert_eq!(
            url,
            "https://example.org/luts/ACOLITE-LUT-202110/S2A_MSI/ACOLITE-LUT-202110-MOD2-1013mb_S2A_MSI.lut"
        );
    }

    #[test]
    fn test_short_identifier_prefix() {
        let lutid = LutId::new("LUT-MOD1");
        assert_eq!(lutid.model_prefix(), "LUT-MOD1");
        assert_eq!(
            remote_lut_url("http://host", &lutid, "L8_OLI"),
            "http://host/LUT-MOD1/L8_OLI/LUT-MOD1_L8_OLI.lut"
        );
    }

    #[test]
    fn test_unreachable_host_is_remote_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let fetcher = HttpFetcher::new(Some(Duration::from_secs(5))).unwrap();
        let dest = dir.path().join("out.lut");

        let result = fetcher.fetch("http://127.0.0.1:9/missing.lut", &dest);
        assert!(matches!(result, Err(LutError::RemoteUnavailable(_))));
    }
}
