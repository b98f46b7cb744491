//! Download job for one period.
//!
//! 1. create the download folder
//! 2. fetch and parse the manifest (fatal on failure)
//! 3. optionally keep only the first `max_files` entries (0 keeps them all)
//! 4. download every entry concurrently
//! 5. remove the manifest, log a summary and optionally write a JSON report
use std::fs::File;
use std::io::{BufWriter, Write};

use log::{debug, error, info};

use crate::config::Config;
use crate::download::{Downloader, Outcome, Report};
use crate::error::Error;
use crate::manifest;

pub struct Job {
    config: Config,
    downloader: Downloader,
}

impl Job {
    pub fn new(config: Config) -> Result<Self, Error> {
        let downloader = Downloader::from_config(&config)?;
        Ok(Self { config, downloader })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the job. Per-file failures are part of the returned [Report],
    /// errors are only returned for failures that stop the whole job.
    pub async fn run(&self) -> Result<Report, Error> {
        let c = &self.config;
        debug!("running with {:#?}", c);

        std::fs::create_dir_all(&c.download_folder)?;

        let mut manifest = manifest::fetch_manifest(
            &self.downloader,
            &c.manifest_base_url,
            &c.period,
            &c.download_folder,
        )
        .await?;

        // 0 means no limit
        if let Some(max) = c.max_files.filter(|&max| max > 0) {
            manifest.truncate(max);
            info!("limited to first {} WARC files", max);
        }

        info!(
            "starting download of {} WARC files into {:?}",
            manifest.paths().len(),
            c.download_folder
        );
        let report = self
            .downloader
            .fetch_batch(manifest.paths(), &c.download_folder)
            .await;

        info!("download process complete, cleaning up temporary files");
        manifest.remove()?;

        for task in report.failures() {
            if let Outcome::Failed { attempts, error } = &task.outcome {
                error!(
                    "could not download {} ({} attempts): {}",
                    task.remote_path, attempts, error
                );
            }
        }
        info!(
            "{} fetched, {} skipped, {} failed",
            report.succeeded(),
            report.skipped(),
            report.failed()
        );

        if let Some(path) = &c.report {
            let mut out = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(&mut out, &report)?;
            out.flush()?;
            info!("report written to {:?}", path);
        }

        Ok(report)
    }
}
