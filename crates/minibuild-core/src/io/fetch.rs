//! Checksum-verified downloads into the local artifact cache.
//!
//! Every resource is fetched together with its `.sha1` side-car. Both land in
//! temporaries next to the destination and are only renamed into place once
//! the digest matches, so a corrupt transfer never leaves an installed file.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use reqwest::blocking::{Client, Response};
use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::config::BuildConfig;
use crate::paths::filename_from_url;

/// Errors from [`Fetcher::fetch_verified`].
#[derive(Error, Debug)]
pub enum FetchError {
    /// A fetch was attempted in offline mode.
    #[error("Offline: refusing to fetch {url}")]
    Offline {
        /// Requested URL.
        url: String,
    },

    /// Connection or protocol failure.
    #[error("HTTP error fetching {url}: {source}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("HTTP {status} fetching {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },

    /// The downloaded bytes do not match the side-car digest.
    #[error("Checksum mismatch for {url}: expected {expected}, got {actual}")]
    Integrity {
        /// Requested URL.
        url: String,
        /// Digest from the `.sha1` side-car.
        expected: String,
        /// Digest of the received bytes.
        actual: String,
    },

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Client(#[source] reqwest::Error),

    /// Local filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl FetchError {
    /// Integrity and offline failures are never worth retrying elsewhere.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Integrity { .. } | Self::Offline { .. } | Self::Io(_))
    }
}

/// Blocking HTTP client that installs verified files into the local cache.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    offline: bool,
}

impl Fetcher {
    /// Build a fetcher honouring the offline flag and request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the TLS backend cannot be initialised.
    pub fn new(config: &BuildConfig) -> Result<Self, FetchError> {
        let mut builder = Client::builder().user_agent(crate::USER_AGENT);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build().map_err(FetchError::Client)?,
            offline: config.offline,
        })
    }

    /// Download `url` and `url.sha1` into `dir`, verify, then install both.
    ///
    /// The installed file is named `file_name`, or the last URL segment when
    /// `None`. Returns the installed path.
    ///
    /// # Errors
    ///
    /// [`FetchError::Offline`] in offline mode, [`FetchError::Transport`] or
    /// [`FetchError::Status`] on network failure, [`FetchError::Integrity`] if
    /// the digests differ. Nothing is installed on error.
    pub fn fetch_verified(
        &self,
        url: &str,
        dir: &Path,
        file_name: Option<&str>,
    ) -> Result<PathBuf, FetchError> {
        if self.offline {
            return Err(FetchError::Offline {
                url: url.to_string(),
            });
        }

        let name = file_name.unwrap_or_else(|| filename_from_url(url));
        let dest = dir.join(name);
        let sha_dest = dir.join(format!("{name}.sha1"));
        let sha_tmp = dir.join(format!("{name}.sha1.new"));
        let tmp = dir.join(format!("{name}.new"));

        fs::create_dir_all(dir)?;

        let size = match self.stage(url, &sha_tmp, &tmp) {
            Ok(size) => size,
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                let _ = fs::remove_file(&sha_tmp);
                return Err(e);
            }
        };

        install(&sha_tmp, &sha_dest)?;
        install(&tmp, &dest)?;
        tracing::debug!("Installed {} ({size} bytes)", dest.display());
        Ok(dest)
    }

    /// Write the side-car to `sha_tmp` and stream the body to `tmp`, hashing
    /// as it goes. Returns the body size once the digest matches.
    fn stage(&self, url: &str, sha_tmp: &Path, tmp: &Path) -> Result<u64, FetchError> {
        let sidecar_url = format!("{url}.sha1");
        let sidecar = self
            .get(&sidecar_url)?
            .bytes()
            .map_err(|source| FetchError::Transport {
                url: sidecar_url,
                source,
            })?;
        fs::write(sha_tmp, &sidecar)?;

        let mut response = self.get(url)?;
        let mut writer = HashingWriter {
            file: File::create(tmp)?,
            hasher: Sha1::new(),
        };
        let size = response
            .copy_to(&mut writer)
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
        writer.flush()?;

        verify(url, &writer.hasher.finalize(), &sidecar)?;
        Ok(size)
    }

    fn get(&self, url: &str) -> Result<Response, FetchError> {
        tracing::debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

/// File writer that hashes everything written through it.
struct HashingWriter {
    file: File,
    hasher: Sha1,
}

impl Write for HashingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.file.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Compare a SHA-1 `digest` against the hex digest in `sidecar`.
///
/// The side-car may carry a trailing file name (`<hex>  file.jar`); only the
/// first token is used.
fn verify(url: &str, digest: &[u8], sidecar: &[u8]) -> Result<(), FetchError> {
    let expected = String::from_utf8_lossy(sidecar)
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    let matches = hex::decode(&expected).is_ok_and(|bytes| bytes == digest);
    if matches {
        Ok(())
    } else {
        Err(FetchError::Integrity {
            url: url.to_string(),
            expected,
            actual: hex::encode(digest),
        })
    }
}

/// Rename a verified temporary into place.
///
/// Windows cannot rename over an existing file, so the old one is removed
/// first there. A crash in between loses the cached copy, which can always be
/// fetched again.
pub fn install(tmp: &Path, dest: &Path) -> io::Result<()> {
    if cfg!(windows) && dest.exists() {
        fs::remove_file(dest)?;
    }
    fs::rename(tmp, dest)
}
