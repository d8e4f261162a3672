use reqwest::blocking::Client;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::error::SyncError;
use crate::sources::config::{ForgeConfig, NetworkConfig};
use crate::sources::forge::build_client;

/// Retrieves a snapshot archive into a local file.
pub trait ArchiveFetcher {
    fn download(&self, url: &str, dest: &Path) -> Result<u64, SyncError>;
}

pub struct HttpFetcher {
    client: Client,
    token: Option<String>,
    retries: usize,
}

impl HttpFetcher {
    pub fn new(forge: &ForgeConfig, network: &NetworkConfig) -> Result<Self, SyncError> {
        let client = build_client(forge, network).map_err(|err| {
            SyncError::InvalidConfig(format!("failed to build http client: {err}"))
        })?;
        Ok(Self {
            client,
            token: forge.token.clone(),
            retries: network.retries,
        })
    }

    fn download_once(&self, url: &str, dest: &Path) -> Result<u64, String> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let mut response = request.send().map_err(|err| err.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }

        let mut file = fs::File::create(dest)
            .map_err(|err| format!("failed to create {}: {err}", dest.display()))?;
        response
            .copy_to(&mut file)
            .map_err(|err| format!("failed to read response body: {err}"))
    }
}

impl ArchiveFetcher for HttpFetcher {
    fn download(&self, url: &str, dest: &Path) -> Result<u64, SyncError> {
        let mut last_reason = String::new();
        for attempt in 0..=self.retries {
            match self.download_once(url, dest) {
                Ok(bytes) => return Ok(bytes),
                Err(reason) => last_reason = reason,
            }
            if last_reason.starts_with("HTTP 4") {
                break;
            }
            if attempt < self.retries {
                tracing::debug!(url, attempt, reason = %last_reason, "retrying archive download");
                thread::sleep(Duration::from_millis(250 * (attempt as u64 + 1)));
            }
        }
        let _ = fs::remove_file(dest);
        Err(SyncError::DownloadFailure {
            url: url.to_string(),
            reason: last_reason,
        })
    }
}

/// Downloads the archive for `alias` into `downloads_dir` and returns its path.
pub fn download_archive(
    fetcher: &dyn ArchiveFetcher,
    url: &str,
    downloads_dir: &Path,
    alias: &str,
) -> Result<PathBuf, SyncError> {
    fs::create_dir_all(downloads_dir).map_err(|err| SyncError::DownloadFailure {
        url: url.to_string(),
        reason: format!("failed to create {}: {err}", downloads_dir.display()),
    })?;
    let dest = downloads_dir.join(format!("{alias}.tar.gz"));
    let bytes = fetcher.download(url, &dest)?;
    tracing::info!(alias, url, bytes, "archive downloaded");
    Ok(dest)
}
