//! Error enum
use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// Malformed user input (period identifier, option values).
    InvalidInput(String),
    Io(std::io::Error),
    /// Connection, status, timeout or body errors raised by the http client.
    Http(reqwest::Error),
    Url(url::ParseError),
    Json(serde_json::Error),
    /// Body length differs from the announced `Content-Length`.
    Truncated { expected: u64, received: u64 },
    /// The manifest could not be fetched after every allowed attempt.
    ManifestUnavailable { url: String, attempts: u32 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            Error::Io(e) => write!(f, "io error: {}", e),
            Error::Http(e) => write!(f, "http error: {}", e),
            Error::Url(e) => write!(f, "invalid url: {}", e),
            Error::Json(e) => write!(f, "json error: {}", e),
            Error::Truncated { expected, received } => write!(
                f,
                "body length mismatch: expected {} bytes, received {}",
                expected, received
            ),
            Error::ManifestUnavailable { url, attempts } => write!(
                f,
                "manifest {} unavailable after {} attempts",
                url, attempts
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Http(e) => Some(e),
            Error::Url(e) => Some(e),
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::Io(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Error {
        Error::Http(e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Error {
        Error::Url(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::Json(e)
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn display_manifest_unavailable() {
        let e = Error::ManifestUnavailable {
            url: "https://example.com/warc.paths.gz".to_string(),
            attempts: 5,
        };
        assert_eq!(
            e.to_string(),
            "manifest https://example.com/warc.paths.gz unavailable after 5 attempts"
        );
    }

    #[test]
    fn io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e: Error = io.into();
        assert!(matches!(e, Error::Io(_)));
    }
}
