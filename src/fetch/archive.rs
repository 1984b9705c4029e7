// src/fetch/archive.rs

use anyhow::{anyhow, bail, Context, Result};
use futures::StreamExt;
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::{
    fs,
    io::{AsyncWriteExt, BufWriter},
    time::{timeout, Instant},
};
use tracing::{debug, info, instrument};
use url::Url;

use super::retry::RetryPolicy;
use super::transport::{RemoteBody, Transport};

/// How a fetch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The archive was already on disk; nothing was requested.
    Cached { path: PathBuf },
    Downloaded {
        path: PathBuf,
        bytes: u64,
        attempts: u32,
    },
    Failed { attempts: u32, error: String },
}

impl FetchOutcome {
    pub fn path(&self) -> Option<&Path> {
        match self {
            FetchOutcome::Cached { path } | FetchOutcome::Downloaded { path, .. } => Some(path),
            FetchOutcome::Failed { .. } => None,
        }
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Cached { path } => {
                write!(f, "{} already exists, skipping download", file_label(path))
            }
            FetchOutcome::Downloaded { path, bytes, .. } => {
                write!(f, "downloaded {} ({} bytes)", file_label(path), bytes)
            }
            FetchOutcome::Failed { error, .. } => write!(f, "download failed: {}", error),
        }
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Downloads archives into a cache directory, one file per URL.
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    archive_dir: PathBuf,
    chunk_size: usize,
    read_timeout: Duration,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        archive_dir: impl Into<PathBuf>,
        chunk_size: usize,
        read_timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            archive_dir: archive_dir.into(),
            chunk_size: chunk_size.max(1),
            read_timeout,
            retry,
        }
    }

    /// Cache path for `url`: the archive dir joined with the last path segment.
    pub fn archive_path(&self, url: &str) -> Result<PathBuf> {
        let parsed = Url::parse(url).with_context(|| format!("parsing URL {}", url))?;
        let filename = parsed
            .path_segments()
            .and_then(|segments| segments.last())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| anyhow!("URL {} has no file name", url))?;
        Ok(self.archive_dir.join(filename))
    }

    /// Make sure the archive for `url` is on disk, downloading it if needed.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let dest = match self.archive_path(url) {
            Ok(p) => p,
            Err(e) => {
                return FetchOutcome::Failed {
                    attempts: 0,
                    error: format!("{:#}", e),
                }
            }
        };

        if fs::try_exists(&dest).await.unwrap_or(false) {
            info!(path = %dest.display(), "already cached");
            return FetchOutcome::Cached { path: dest };
        }

        let start = Instant::now();
        let target: &Path = &dest;
        let result = self
            .retry
            .run(url, move |_| self.download_once(url, target))
            .await;
        match result {
            Ok((bytes, attempts)) => {
                info!(bytes, attempts, elapsed = ?start.elapsed(), "downloaded");
                FetchOutcome::Downloaded {
                    path: dest,
                    bytes,
                    attempts,
                }
            }
            Err(e) => FetchOutcome::Failed {
                attempts: e.attempts,
                error: format!("{:#}", e.last),
            },
        }
    }

    /// One attempt: stream into a hidden `.part` file next to `dest` and only
    /// rename it into place once the whole body has arrived. Dropping the temp
    /// file on any error removes it.
    async fn download_once(&self, url: &str, dest: &Path) -> Result<u64> {
        let RemoteBody { total, mut chunks } = timeout(self.read_timeout, self.transport.get(url))
            .await
            .map_err(|_| anyhow!("timed out after {:?} waiting for {}", self.read_timeout, url))??;

        fs::create_dir_all(&self.archive_dir)
            .await
            .with_context(|| format!("creating {}", self.archive_dir.display()))?;
        let name = file_label(dest);
        let part = tempfile::Builder::new()
            .prefix(&format!(".{}.", name))
            .suffix(".part")
            .tempfile_in(&self.archive_dir)
            .with_context(|| format!("creating temp file in {}", self.archive_dir.display()))?;
        let handle = part.as_file().try_clone().context("cloning temp file handle")?;
        let mut out = BufWriter::with_capacity(self.chunk_size, fs::File::from_std(handle));

        let step = self.chunk_size as u64;
        let mut written = 0u64;
        let mut next_report = step;
        loop {
            let next = timeout(self.read_timeout, chunks.next())
                .await
                .map_err(|_| anyhow!("no data from {} for {:?}", url, self.read_timeout))?;
            let Some(chunk) = next else { break };
            let chunk = chunk?;
            out.write_all(&chunk)
                .await
                .with_context(|| format!("writing {}", part.path().display()))?;
            written += chunk.len() as u64;
            if written >= next_report {
                match total {
                    Some(t) => debug!(file = %name, written, total = t, "progress"),
                    None => debug!(file = %name, written, "progress"),
                }
                next_report = written - written % step + step;
            }
        }
        out.flush().await?;
        out.into_inner().sync_all().await?;

        if let Some(expected) = total {
            if written != expected {
                bail!("body was {} bytes, expected {}", written, expected);
            }
        }

        part.persist(dest)
            .with_context(|| format!("moving download into {}", dest.display()))?;
        Ok(written)
    }
}
