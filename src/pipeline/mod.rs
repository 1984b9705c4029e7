// src/pipeline/mod.rs

mod pool;
mod result;

pub use result::{FetchStatus, Outcome, PipelineResult, Stage, Summary};

use std::sync::Arc;
use tokio::task;
use tracing::{error, info};

use crate::config::Config;
use crate::extract::Extractor;
use crate::fetch::{FetchOutcome, Fetcher, Transport};
use crate::verify::verify_entries;

/// Fetch → verify → extract, once per URL, across a fixed pool of workers.
pub struct Pipeline {
    fetcher: Fetcher,
    extractor: Extractor,
    workers: usize,
}

impl Pipeline {
    pub fn new(fetcher: Fetcher, extractor: Extractor, workers: usize) -> Self {
        Self {
            fetcher,
            extractor,
            workers: workers.max(1),
        }
    }

    pub fn from_config(cfg: &Config, transport: Arc<dyn Transport>) -> Self {
        let fetcher = Fetcher::new(
            transport,
            &cfg.archive_dir,
            cfg.chunk_size,
            cfg.timeout(),
            cfg.retry_policy(),
        );
        Self::new(fetcher, cfg.extractor(), cfg.max_workers)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every stage for `url`, stopping at the first one that fails.
    /// Always produces exactly one result.
    pub async fn process(&self, url: &str) -> PipelineResult {
        let fetched = self.fetcher.fetch(url).await;
        info!(status = %fetched, "fetch finished");

        let archive = match &fetched {
            FetchOutcome::Cached { path } | FetchOutcome::Downloaded { path, .. } => path.clone(),
            FetchOutcome::Failed { attempts, error } => {
                error!(%url, attempts, "download failed, skipping");
                let outcome = Outcome::DownloadFailed {
                    attempts: *attempts,
                    error: error.clone(),
                };
                return PipelineResult::new(url, &fetched, outcome);
            }
        };

        // zip reads are blocking; keep them off the async workers
        let to_check = archive.clone();
        match task::spawn_blocking(move || verify_entries(&to_check)).await {
            Ok(Ok(entries)) => info!(entries, "verified"),
            Ok(Err(error)) => {
                return PipelineResult::new(url, &fetched, Outcome::IntegrityFailed { error });
            }
            Err(e) => {
                let error = format!("integrity check aborted: {}", e);
                error!(zip = %archive.display(), %error);
                return PipelineResult::new(url, &fetched, Outcome::IntegrityFailed { error });
            }
        }

        let extractor = self.extractor.clone();
        let to_extract = archive.clone();
        let outcome = match task::spawn_blocking(move || extractor.extract(&to_extract)).await {
            Ok(Ok(report)) => Outcome::Extracted {
                tabular: report.tabular,
                auxiliary: report.auxiliary,
            },
            Ok(Err(e)) => {
                let error = format!("{:#}", e);
                error!(zip = %archive.display(), %error, "extraction failed");
                Outcome::ExtractionFailed { error }
            }
            Err(e) => {
                let error = format!("extraction aborted: {}", e);
                error!(zip = %archive.display(), %error);
                Outcome::ExtractionFailed { error }
            }
        };
        PipelineResult::new(url, &fetched, outcome)
    }
}
