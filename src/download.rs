//! Concurrent download of remote objects into a local folder.
//!
//! Each remote path is saved under its basename in the destination folder.
//! Files that are already there are never downloaded again, so running the
//! same batch twice only fetches what is still missing.
//!
//! Bodies are streamed into `<basename>.part` and moved onto the final name
//! once complete. An existing destination file is thus always a complete one.
//!
//! A destination is written by at most one task at a time: when two manifest
//! entries share a basename, the one that comes second is skipped.
use std::collections::HashSet;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, error, info};
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use tokio::io::{AsyncWriteExt, BufWriter};
use url::Url;

use crate::config::Config;
use crate::error::Error;
use crate::retry::{self, RetryPolicy};

/// Size of the write buffer sitting between the http body and the file.
const CHUNK_SIZE: usize = 8 * 1024;

const PART_EXTENSION: &str = "part";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Pending,
    /// Destination already present, no request was made.
    Skipped,
    Fetched { attempts: u32, bytes: u64 },
    Failed { attempts: u32, error: String },
}

impl Outcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Outcome::Pending | Outcome::Skipped => 0,
            Outcome::Fetched { attempts, .. } | Outcome::Failed { attempts, .. } => *attempts,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Outcome::Pending => "pending",
            Outcome::Skipped => "skipped",
            Outcome::Fetched { .. } => "fetched",
            Outcome::Failed { .. } => "failed",
        }
    }
}

/// One manifest entry and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchTask {
    pub remote_path: String,
    /// `None` when no usable file name can be derived from `remote_path`.
    pub destination: Option<PathBuf>,
    pub outcome: Outcome,
}

impl FetchTask {
    fn new(remote_path: &str, dst_dir: &Path) -> Self {
        Self {
            remote_path: remote_path.to_string(),
            destination: destination_for(remote_path, dst_dir),
            outcome: Outcome::Pending,
        }
    }

    fn failed(mut self, attempts: u32, error: &Error) -> Self {
        self.outcome = Outcome::Failed {
            attempts,
            error: error.to_string(),
        };
        self
    }
}

/// Tasks of a batch, in manifest order.
#[derive(Debug, Default, Clone)]
pub struct Report {
    pub tasks: Vec<FetchTask>,
}

impl Report {
    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.tasks.iter().filter(|t| pred(&t.outcome)).count()
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped))
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Fetched { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = &FetchTask> {
        self.tasks
            .iter()
            .filter(|t| matches!(t.outcome, Outcome::Failed { .. }))
    }
}

/// Counts first, then every task.
impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Report", 4)?;
        s.serialize_field("succeeded", &self.succeeded())?;
        s.serialize_field("skipped", &self.skipped())?;
        s.serialize_field("failed", &self.failed())?;
        s.serialize_field("tasks", &self.tasks)?;
        s.end()
    }
}

/// Local destination of `remote_path`: `dst_dir/<basename>`.
///
/// Returns `None` if the basename is empty, `.` or `..`.
pub fn destination_for(remote_path: &str, dst_dir: &Path) -> Option<PathBuf> {
    let basename = remote_path.trim_end().rsplit('/').next()?;
    match basename {
        "" | "." | ".." => None,
        name => Some(dst_dir.join(name)),
    }
}

/// `foo.warc.gz` -> `foo.warc.gz.part`
fn part_path(dst: &Path) -> PathBuf {
    let mut name = dst.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(PART_EXTENSION);
    dst.with_file_name(name)
}

/// Compare the announced body length (if any) with what was actually written.
fn check_length(expected: Option<u64>, received: u64) -> Result<u64, Error> {
    match expected {
        Some(expected) if expected != received => Err(Error::Truncated { expected, received }),
        _ => Ok(received),
    }
}

/// Destination reserved by a task, released on drop.
struct Claim<'a> {
    in_flight: &'a Mutex<HashSet<PathBuf>>,
    dst: PathBuf,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.dst);
    }
}

/// holds the http client, the base url objects are resolved against
/// and the retry/concurrency settings shared by every task.
pub struct Downloader {
    client: reqwest::Client,
    data_base_url: Url,
    retry: RetryPolicy,
    concurrency: usize,
    /// destinations currently being downloaded
    in_flight: Mutex<HashSet<PathBuf>>,
}

impl Downloader {
    pub fn new(
        client: reqwest::Client,
        data_base_url: Url,
        retry: RetryPolicy,
        concurrency: usize,
    ) -> Self {
        Self {
            client,
            data_base_url,
            retry,
            concurrency: concurrency.max(1),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Build a downloader (and its http client) from a run configuration.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self::new(
            client,
            config.data_base_url.clone(),
            config.retry.clone(),
            config.concurrency,
        ))
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Reserve `dst` for the calling task. `None` if another task holds it.
    fn claim(&self, dst: &Path) -> Option<Claim<'_>> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if in_flight.insert(dst.to_path_buf()) {
            Some(Claim {
                in_flight: &self.in_flight,
                dst: dst.to_path_buf(),
            })
        } else {
            None
        }
    }

    /// Single attempt: stream `url` into the part file of `dst`, then move it to `dst`.
    /// The part file is removed on failure.
    pub async fn save_to(&self, url: &Url, dst: &Path) -> Result<u64, Error> {
        let part = part_path(dst);
        let saved = match self.stream_to(url, &part).await {
            Ok(bytes) => tokio::fs::rename(&part, dst)
                .await
                .map(|_| bytes)
                .map_err(Error::from),
            Err(e) => Err(e),
        };

        if saved.is_err() {
            if let Err(e) = tokio::fs::remove_file(&part).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!("could not remove {:?}: {}", part, e);
                }
            }
        }
        saved
    }

    async fn stream_to(&self, url: &Url, path: &Path) -> Result<u64, Error> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?;
        let expected = resp.content_length();

        let file = tokio::fs::File::create(path).await?;
        let mut out = BufWriter::with_capacity(CHUNK_SIZE, file);
        let mut body = resp.bytes_stream();
        let mut received: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            out.write_all(&chunk).await?;
            received += chunk.len() as u64;
        }
        out.flush().await?;
        out.into_inner().sync_all().await?;

        check_length(expected, received)
    }

    /// Download `url` to `local_path`, retrying according to the retry policy.
    ///
    /// Before each retry `local_path` is checked again: if it appeared in the
    /// meantime the download stops and [Outcome::Skipped] is returned.
    pub async fn fetch_with_retries(&self, url: &Url, local_path: &Path) -> Outcome {
        let res = retry::with_retries(&self.retry, url.as_str(), |attempt| async move {
            if attempt > 1 && local_path.exists() {
                return Ok(None);
            }
            self.save_to(url, local_path).await.map(Some)
        })
        .await;

        match res {
            Ok((Some(bytes), attempts)) => {
                info!("downloaded {:?} ({} bytes)", local_path, bytes);
                Outcome::Fetched { attempts, bytes }
            }
            Ok((None, _)) => {
                info!("file appeared while retrying, skipping: {:?}", local_path);
                Outcome::Skipped
            }
            Err(exhausted) => Outcome::Failed {
                attempts: exhausted.attempts,
                error: exhausted.last_error.to_string(),
            },
        }
    }

    /// Materialize `remote_path` into `dst_dir`. Never fails: errors end up in the task outcome.
    pub async fn fetch_one(&self, remote_path: &str, dst_dir: &Path) -> FetchTask {
        let mut task = FetchTask::new(remote_path, dst_dir);
        let dst = match &task.destination {
            Some(dst) => dst.clone(),
            None => {
                let e = Error::InvalidInput(format!("no file name in {:?}", remote_path));
                error!("{}", e);
                return task.failed(0, &e);
            }
        };

        // claim before checking existence, so that a task finishing in between
        // has already renamed its file when we look.
        let _claim = match self.claim(&dst) {
            Some(claim) => claim,
            None => {
                info!("file already being downloaded, skipping: {:?}", dst);
                task.outcome = Outcome::Skipped;
                return task;
            }
        };

        if dst.exists() {
            info!("file already exists, skipping: {:?}", dst);
            task.outcome = Outcome::Skipped;
            return task;
        }

        let url = match self.data_base_url.join(remote_path) {
            Ok(url) => url,
            Err(e) => {
                let e = Error::from(e);
                error!("could not build url for {:?}: {}", remote_path, e);
                return task.failed(0, &e);
            }
        };

        debug!("{} -> {:?}", url, dst);
        task.outcome = self.fetch_with_retries(&url, &dst).await;
        task
    }

    /// Fetch every path of `remote_paths` into `dst_dir`, with at most
    /// `concurrency` downloads in flight. Completion order is unspecified,
    /// the report follows `remote_paths` order.
    pub async fn fetch_batch(&self, remote_paths: &[String], dst_dir: &Path) -> Report {
        let total = remote_paths.len();
        let progress = &progress_bar(total as u64);

        let mut tasks: Vec<(usize, FetchTask)> = stream::iter(remote_paths.iter().enumerate())
            .map(|(idx, remote_path)| async move {
                let task = self.fetch_one(remote_path, dst_dir).await;
                progress.inc(1);
                debug!(
                    "[{}/{}] {} {}",
                    progress.position(),
                    total,
                    task.outcome.label(),
                    remote_path
                );
                (idx, task)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        progress.finish();
        tasks.sort_unstable_by_key(|(idx, _)| *idx);
        Report {
            tasks: tasks.into_iter().map(|(_, task)| task).collect(),
        }
    }
}

/// Progress bar over `len` downloads, drawn on stderr only when it is a terminal.
fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>5}/{len:5} WARC files ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    if !std::io::stderr().is_terminal() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    pb
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use super::*;

    #[test]
    fn destination_uses_basename() {
        let dst = destination_for(
            "crawl-data/CC-NEWS/2023/09/CC-NEWS-20230901001229-00959.warc.gz",
            Path::new("news/2023-09"),
        );
        assert_eq!(
            dst,
            Some(PathBuf::from(
                "news/2023-09/CC-NEWS-20230901001229-00959.warc.gz"
            ))
        );
    }

    #[test]
    fn destination_rejects_unusable_names() {
        for p in ["", "a/", "a/..", ".", "foo/./"] {
            assert_eq!(destination_for(p, Path::new("d")), None, "{:?}", p);
        }
    }

    #[test]
    fn basename_collision() {
        let d = Path::new("d");
        assert_eq!(destination_for("x/1.warc.gz", d), destination_for("y/1.warc.gz", d));
    }

    #[test]
    fn part_file_name() {
        assert_eq!(
            part_path(Path::new("d/1.warc.gz")),
            PathBuf::from("d/1.warc.gz.part")
        );
    }

    #[test]
    fn length_check() {
        assert_eq!(check_length(None, 12).unwrap(), 12);
        assert_eq!(check_length(Some(12), 12).unwrap(), 12);
        assert!(matches!(
            check_length(Some(100), 10),
            Err(Error::Truncated {
                expected: 100,
                received: 10
            })
        ));
    }

    #[test]
    fn destination_claimed_once() {
        let dl = Downloader::new(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:9/").unwrap(),
            RetryPolicy::default(),
            2,
        );
        let dst = Path::new("d/1.warc.gz");
        let claim = dl.claim(dst);
        assert!(claim.is_some());
        assert!(dl.claim(dst).is_none());
        assert!(dl.claim(Path::new("d/2.warc.gz")).is_some());

        drop(claim);
        assert!(dl.claim(dst).is_some());
    }

    #[test]
    fn report_counts() {
        let task = |outcome| FetchTask {
            remote_path: "a".to_string(),
            destination: None,
            outcome,
        };
        let report = Report {
            tasks: vec![
                task(Outcome::Skipped),
                task(Outcome::Fetched {
                    attempts: 2,
                    bytes: 10,
                }),
                task(Outcome::Failed {
                    attempts: 5,
                    error: "boom".to_string(),
                }),
                task(Outcome::Skipped),
            ],
        };
        assert_eq!(report.skipped(), 2);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures().next().unwrap().outcome.attempts(), 5);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["skipped"], 2);
        assert_eq!(json["succeeded"], 1);
        assert_eq!(json["failed"], 1);
        assert_eq!(json["tasks"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn skip_existing_without_request() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1.warc.gz"), b"").unwrap();

        // nothing listens on port 9, any request would fail
        let dl = Downloader::new(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:9/").unwrap(),
            RetryPolicy::new(1, Duration::ZERO).unwrap(),
            1,
        );
        let task = dl.fetch_one("a/1.warc.gz", dir.path()).await;
        assert_eq!(task.outcome, Outcome::Skipped);
    }

    #[tokio::test]
    async fn unusable_entry_fails_without_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let dl = Downloader::new(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:9/").unwrap(),
            RetryPolicy::default(),
            1,
        );
        let task = dl.fetch_one("a/", dir.path()).await;
        assert!(matches!(task.outcome, Outcome::Failed { attempts: 0, .. }));
    }
}
