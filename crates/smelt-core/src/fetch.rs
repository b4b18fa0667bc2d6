//! Source reference resolution
//!
//! A source reference is derived from a URI-like string by prefix
//! inspection: `http` (which also covers `https`), `ftp`, and `tftp`
//! prefixes all route to one network retrieval path; anything else is a
//! local filesystem read. No retries are performed; a transport or
//! filesystem failure surfaces immediately. Persisting fetched bytes
//! anywhere is the caller's concern.

use crate::error::{Error, Result};
use camino::Utf8PathBuf;
use tracing::debug;

/// Recognized network retrieval schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Ftp,
    Tftp,
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scheme::Http => write!(f, "http"),
            Scheme::Ftp => write!(f, "ftp"),
            Scheme::Tftp => write!(f, "tftp"),
        }
    }
}

/// A source reference: network location or local path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceReference {
    /// Retrieved over the network with a GET-style request
    Network { scheme: Scheme, location: String },
    /// Read from the local filesystem
    Local(Utf8PathBuf),
}

impl SourceReference {
    /// Classify a raw reference string by prefix inspection.
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("http") {
            Self::Network {
                scheme: Scheme::Http,
                location: raw.to_string(),
            }
        } else if raw.starts_with("tftp") {
            Self::Network {
                scheme: Scheme::Tftp,
                location: raw.to_string(),
            }
        } else if raw.starts_with("ftp") {
            Self::Network {
                scheme: Scheme::Ftp,
                location: raw.to_string(),
            }
        } else {
            Self::Local(Utf8PathBuf::from(raw))
        }
    }

    /// The raw location string
    pub fn location(&self) -> &str {
        match self {
            Self::Network { location, .. } => location,
            Self::Local(path) => path.as_str(),
        }
    }
}

impl std::fmt::Display for SourceReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.location())
    }
}

/// Resolves source references to raw bytes.
#[derive(Debug, Clone, Default)]
pub struct SourceFetcher {
    client: reqwest::Client,
}

impl SourceFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a source reference to raw bytes.
    ///
    /// All network schemes go through the same GET-style client; a scheme
    /// the transport cannot serve fails loudly rather than silently doing
    /// nothing.
    pub async fn fetch(&self, reference: &SourceReference) -> Result<Vec<u8>> {
        match reference {
            SourceReference::Network { scheme, location } => {
                debug!("Downloading from {} ({} scheme)", location, scheme);
                let response = self
                    .client
                    .get(location.as_str())
                    .send()
                    .await
                    .map_err(|e| Error::fetch(location, e))?;

                if !response.status().is_success() {
                    return Err(Error::fetch(
                        location,
                        format!("server returned {}", response.status()),
                    ));
                }

                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| Error::fetch(location, e))?;
                Ok(bytes.to_vec())
            }
            SourceReference::Local(path) => {
                debug!("Copying from local path {}", path);
                tokio::fs::read(path)
                    .await
                    .map_err(|e| Error::fetch(path.as_str(), e))
            }
        }
    }

    /// Parse and fetch a raw reference string in one call.
    pub async fn fetch_raw(&self, raw: &str) -> Result<Vec<u8>> {
        self.fetch(&SourceReference::parse(raw)).await
    }
}
