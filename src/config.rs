//! Run configuration.
//!
//! Built from the command line (see [crate::cli::Download]) or directly by
//! library users through [Config::new], which fills in the defaults.
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::cli;
use crate::error::Error;
use crate::period::Period;
use crate::retry::RetryPolicy;

pub const DEFAULT_MANIFEST_BASE_URL: &str = "https://data.commoncrawl.org/crawl-data/CC-NEWS/";
pub const DEFAULT_DATA_BASE_URL: &str = "https://data.commoncrawl.org/";
/// Downloads go to `<DEFAULT_DOWNLOAD_ROOT>/<YYYY-MM>` unless overridden.
pub const DEFAULT_DOWNLOAD_ROOT: &str = "news";
pub const DEFAULT_CONCURRENCY: usize = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub period: Period,
    pub download_folder: PathBuf,
    /// Manifests are at `<manifest_base_url><YYYY/MM>/warc.paths.gz`.
    pub manifest_base_url: Url,
    /// Manifest entries are relative to this url.
    pub data_base_url: Url,
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub max_files: Option<usize>,
    pub timeout: Option<Duration>,
    pub report: Option<PathBuf>,
}

impl Config {
    pub fn new(period: Period) -> Result<Self, Error> {
        let download_folder = PathBuf::from(DEFAULT_DOWNLOAD_ROOT).join(period.folder_name());
        Ok(Self {
            period,
            download_folder,
            manifest_base_url: base_url(DEFAULT_MANIFEST_BASE_URL)?,
            data_base_url: base_url(DEFAULT_DATA_BASE_URL)?,
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            max_files: None,
            timeout: None,
            report: None,
        })
    }
}

/// Parse a base url, adding a trailing `/` so that relative paths are joined under it.
pub fn base_url(s: &str) -> Result<Url, Error> {
    let mut s = s.to_string();
    if !s.ends_with('/') {
        s.push('/');
    }
    Ok(Url::parse(&s)?)
}

impl TryFrom<cli::Download> for Config {
    type Error = Error;

    fn try_from(d: cli::Download) -> Result<Self, Self::Error> {
        let period: Period = d.period.parse()?;
        let mut config = Config::new(period)?;

        if d.concurrency == 0 {
            return Err(Error::InvalidInput(
                "concurrency must be at least 1".to_string(),
            ));
        }
        config.concurrency = d.concurrency;
        config.retry = RetryPolicy::new(d.max_attempts, Duration::from_secs(d.backoff))?;
        config.max_files = d.max_files;
        config.timeout = d.timeout.map(Duration::from_secs);
        config.report = d.report;

        if let Some(folder) = d.download_folder {
            config.download_folder = folder;
        }
        if let Some(url) = d.manifest_base_url {
            config.manifest_base_url = base_url(&url)?;
        }
        if let Some(url) = d.data_base_url {
            config.data_base_url = base_url(&url)?;
        }

        Ok(config)
    }
}
