//! # ccnews
//!
//! Downloads a month of [CommonCrawl News](https://commoncrawl.org/news-crawl)
//! WARC files into a local folder.
//!
//! The month's manifest (`warc.paths.gz`) is fetched first, then every listed
//! file is downloaded concurrently. Transient failures are retried with an
//! exponential backoff and files already present locally are skipped, so an
//! interrupted run can simply be started again.
//!
//! ```no_run
//! use ccnews::{config::Config, job::Job};
//!
//! # async fn run() -> Result<(), ccnews::error::Error> {
//! let mut config = Config::new("2023/09".parse()?)?;
//! config.max_files = Some(1);
//! let report = Job::new(config)?.run().await?;
//! println!("{} files fetched", report.succeeded());
//! # Ok(())
//! # }
//! ```
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod job;
pub mod manifest;
pub mod period;
pub mod retry;
