//! CC-NEWS manifests (`warc.paths.gz`).
//!
//! A manifest is a gzipped, newline separated list of paths relative to the
//! data base url, one per WARC file of the month.
//! It is downloaded next to the WARC files and removed once the batch is over.
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use log::{debug, info};
use url::Url;

use crate::download::Downloader;
use crate::error::Error;
use crate::period::Period;
use crate::retry;

pub const MANIFEST_FILE: &str = "warc.paths.gz";

/// Parsed manifest and the location of its local copy.
#[derive(Debug)]
pub struct Manifest {
    local: PathBuf,
    paths: Vec<String>,
}

impl Manifest {
    /// Read a gzipped manifest from disk.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let f = File::open(path)?;
        let paths = read_paths(f)?;
        debug!("{} paths read from {:?}", paths.len(), path);
        Ok(Self {
            local: path.to_path_buf(),
            paths,
        })
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn local_path(&self) -> &Path {
        &self.local
    }

    /// Keep the first `max` paths, in order.
    pub fn truncate(&mut self, max: usize) {
        self.paths.truncate(max);
    }

    /// Delete the local copy.
    pub fn remove(self) -> Result<(), Error> {
        match std::fs::remove_file(&self.local) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Decompress a (possibly multi-member) gzip stream and return its non-empty lines, trimmed.
pub fn read_paths<R: Read>(reader: R) -> Result<Vec<String>, Error> {
    let gzd = MultiGzDecoder::new(reader);
    let mut paths = Vec::new();
    for line in BufReader::new(gzd).lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            paths.push(line.to_string());
        }
    }
    Ok(paths)
}

/// Download the manifest of `period` into `dst_dir` and parse it.
///
/// Fails with [Error::ManifestUnavailable] once every attempt of the downloader's
/// retry policy has failed.
pub async fn fetch_manifest(
    downloader: &Downloader,
    manifest_base_url: &Url,
    period: &Period,
    dst_dir: &Path,
) -> Result<Manifest, Error> {
    let url = manifest_base_url.join(&period.manifest_path())?;
    let local = dst_dir.join(MANIFEST_FILE);

    debug!("fetching manifest {} into {:?}", url, local);
    retry::with_retries(downloader.retry_policy(), url.as_str(), |_| {
        downloader.save_to(&url, &local)
    })
    .await
    .map_err(|exhausted| Error::ManifestUnavailable {
        url: url.to_string(),
        attempts: exhausted.attempts,
    })?;

    info!("extracting WARC file paths from {:?}", local);
    Manifest::from_path(&local).map_err(|e| {
        if let Err(rm) = std::fs::remove_file(&local) {
            debug!("could not remove {:?}: {}", local, rm);
        }
        e
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::{write::GzEncoder, Compression};

    use super::*;

    fn gz(content: &str) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(content.as_bytes()).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn lines_are_trimmed() {
        let data = gz("a/1.warc.gz\r\n\n  a/2.warc.gz  \n\n");
        let paths = read_paths(&data[..]).unwrap();
        assert_eq!(paths, vec!["a/1.warc.gz", "a/2.warc.gz"]);
    }

    #[test]
    fn multi_member() {
        let mut data = gz("a/1.warc.gz\n");
        data.extend(gz("a/2.warc.gz\n"));
        let paths = read_paths(&data[..]).unwrap();
        assert_eq!(paths, vec!["a/1.warc.gz", "a/2.warc.gz"]);
    }

    #[test]
    fn not_gzip() {
        assert!(read_paths(&b"a/1.warc.gz\n"[..]).is_err());
    }

    #[test]
    fn truncate_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        std::fs::write(&path, gz("c\nb\na\nd\n")).unwrap();

        let mut m = Manifest::from_path(&path).unwrap();
        m.truncate(2);
        assert_eq!(m.paths(), &["c".to_string(), "b".to_string()]);

        // larger than the manifest: no-op
        m.truncate(10);
        assert_eq!(m.paths().len(), 2);

        m.remove().unwrap();
        assert!(!path.exists());
    }
}
