//! # Disk Cache Policy

use anyhow::{Context, bail};
use burn::config::Config;
use reqwest::blocking::Client;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default root cache key; ``~/.cache/bvmm``.
pub const DEFAULT_ROOT_CACHE_KEY: &str = "bvmm";

/// Download timeout.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Cache Policy
#[derive(Config, Debug)]
pub struct DiskCacheConfig {
    /// Key for the root cache directory.
    #[config(default = "DEFAULT_ROOT_CACHE_KEY.to_string()")]
    pub root_cache_key: String,

    /// Override the parent of the root cache directory.
    ///
    /// Defaults to ``~/.cache``.
    #[config(default = "None")]
    pub cache_home: Option<PathBuf>,
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskCacheConfig {
    /// Fetch the base cache directory.
    ///
    /// If the cache directory does not exist, does not create it.
    pub fn base_cache_dir(&self) -> anyhow::Result<PathBuf> {
        let cache_home = match &self.cache_home {
            Some(path) => path.clone(),
            None => dirs::home_dir()
                .context("unable to locate the home directory")?
                .join(".cache"),
        };
        Ok(cache_home.join(&self.root_cache_key))
    }

    /// Map a resource key to a cache path.
    ///
    /// Does not ensure that the path (or any of the parents) exist.
    pub fn resource_to_path(
        &self,
        resource_key: &[String],
    ) -> anyhow::Result<PathBuf> {
        let path = self.base_cache_dir()?;
        Ok(resource_key.iter().fold(path, |acc, s| acc.join(s)))
    }

    /// Map a resource key to a cache path and ensure the parent directory exists.
    pub fn ensure_resource_parent_dir(
        &self,
        resource_key: &[String],
    ) -> anyhow::Result<PathBuf> {
        let path = self.resource_to_path(resource_key)?;
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating cache dir {}", parent.display()))?;
            }
        }
        Ok(path)
    }

    /// Fetch a Resource to the Cache.
    #[tracing::instrument(skip(self))]
    pub fn fetch_resource(
        &self,
        url: &str,
        resource: &[String],
    ) -> anyhow::Result<PathBuf> {
        let cache_file_path = self.ensure_resource_parent_dir(resource)?;
        try_cache_download_to_path(url, cache_file_path)
    }
}

/// Download a URL to memory.
///
/// Connection failures and non-success HTTP statuses are errors.
pub fn download_bytes(url: &str) -> anyhow::Result<Vec<u8>> {
    let client = Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .user_agent(concat!("bvmm/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building http client")?;

    let response = client
        .get(url)
        .send()
        .with_context(|| format!("requesting {url}"))?
        .error_for_status()
        .with_context(|| format!("downloading {url}"))?;

    let bytes = response
        .bytes()
        .with_context(|| format!("reading body of {url}"))?;
    if bytes.is_empty() {
        bail!("empty download from {url}");
    }
    Ok(bytes.to_vec())
}

/// Download a URL resource to a given path.
///
/// If the path already exists, does nothing.
/// The download is staged to a ``.part`` sibling, and renamed into place;
/// a failed download leaves nothing at the cache path.
///
/// # Returns
///
/// The cache path.
pub fn try_cache_download_to_path(
    url: &str,
    cache_file_path: PathBuf,
) -> anyhow::Result<PathBuf> {
    if cache_file_path.exists() {
        tracing::debug!(path = %cache_file_path.display(), "cache hit");
        return Ok(cache_file_path);
    }
    if cache_file_path.file_name().is_none() {
        bail!("cache path has no file name: {}", cache_file_path.display());
    }

    tracing::info!(url, path = %cache_file_path.display(), "downloading");
    let bytes = download_bytes(url)?;

    let staging = staging_path(&cache_file_path);
    fs::write(&staging, &bytes)
        .with_context(|| format!("writing {}", staging.display()))?;
    if let Err(err) = fs::rename(&staging, &cache_file_path) {
        let _ = fs::remove_file(&staging);
        return Err(err).with_context(|| format!("renaming into {}", cache_file_path.display()));
    }

    Ok(cache_file_path)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
