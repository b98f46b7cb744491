//! Period identifiers.
//!
//! CC-NEWS publishes one manifest per month, addressed as `YYYY/MM`
//! (e.g. `2023/09`). The same key names the local download folder, with the
//! slash replaced by a hyphen (`2023-09`).
use std::{fmt, str::FromStr};

use crate::error::Error;

/// A validated `YYYY/MM` period.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Period(String);

impl Period {
    /// Path of the manifest relative to the manifest base url.
    pub fn manifest_path(&self) -> String {
        format!("{}/warc.paths.gz", self.0)
    }

    /// Folder name used under the default download root.
    pub fn folder_name(&self) -> String {
        self.0.replace('/', "-")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Period {
    type Err = Error;

    /// Only the shape is checked: 7 bytes with a `/` at index 4.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 7 || bytes[4] != b'/' {
            return Err(Error::InvalidInput(format!(
                "invalid period {:?}, please use YYYY/MM",
                s
            )));
        }
        Ok(Period(s.to_string()))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
