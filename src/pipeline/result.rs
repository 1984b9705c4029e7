// src/pipeline/result.rs

use std::{fmt, path::PathBuf};

use crate::fetch::FetchOutcome;

/// Last stage a URL reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Fetch,
    Verify,
    Extract,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Verify => "verify",
            Stage::Extract => "extract",
        }
    }
}

/// How the archive got onto disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStatus {
    Cached,
    Downloaded,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Outcome {
    Extracted { tabular: usize, auxiliary: usize },
    DownloadFailed { attempts: u32, error: String },
    IntegrityFailed { error: String },
    ExtractionFailed { error: String },
    /// The worker running this URL died before reporting.
    Aborted { error: String },
}

/// Terminal result for one URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineResult {
    pub url: String,
    pub archive: Option<PathBuf>,
    pub fetch: Option<FetchStatus>,
    pub outcome: Outcome,
}

impl PipelineResult {
    pub(crate) fn new(url: &str, fetched: &FetchOutcome, outcome: Outcome) -> Self {
        let fetch = match fetched {
            FetchOutcome::Cached { .. } => Some(FetchStatus::Cached),
            FetchOutcome::Downloaded { .. } => Some(FetchStatus::Downloaded),
            FetchOutcome::Failed { .. } => None,
        };
        Self {
            url: url.to_string(),
            archive: fetched.path().map(PathBuf::from),
            fetch,
            outcome,
        }
    }

    pub(crate) fn aborted(url: &str, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            archive: None,
            fetch: None,
            outcome: Outcome::Aborted {
                error: error.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Extracted { .. })
    }

    pub fn stage(&self) -> Stage {
        match self.outcome {
            Outcome::DownloadFailed { .. } | Outcome::Aborted { .. } => Stage::Fetch,
            Outcome::IntegrityFailed { .. } => Stage::Verify,
            Outcome::Extracted { .. } | Outcome::ExtractionFailed { .. } => Stage::Extract,
        }
    }

    fn archive_label(&self) -> String {
        self.archive
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.url.clone())
    }
}

impl fmt::Display for PipelineResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match self.fetch {
            Some(FetchStatus::Cached) => " (cached)",
            Some(FetchStatus::Downloaded) => " (downloaded)",
            None => "",
        };
        match &self.outcome {
            Outcome::Extracted { tabular, auxiliary } => write!(
                f,
                "extracted {}{}: {} tabular, {} auxiliary",
                self.archive_label(),
                source,
                tabular,
                auxiliary
            ),
            Outcome::DownloadFailed { attempts, error } => write!(
                f,
                "skipped {}: download failed after {} attempt(s): {}",
                self.url, attempts, error
            ),
            Outcome::IntegrityFailed { error } => write!(
                f,
                "skipped {}: corrupt archive {}: {}",
                self.url,
                self.archive_label(),
                error
            ),
            Outcome::ExtractionFailed { error } => write!(
                f,
                "failed to extract {}{}: {}",
                self.archive_label(),
                source,
                error
            ),
            Outcome::Aborted { error } => write!(f, "aborted {}: {}", self.url, error),
        }
    }
}

/// Per-outcome counts for a finished run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub extracted: usize,
    pub cached: usize,
    pub downloaded: usize,
    pub download_failed: usize,
    pub integrity_failed: usize,
    pub extraction_failed: usize,
    pub aborted: usize,
}

impl Summary {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a PipelineResult>) -> Self {
        let mut s = Summary::default();
        for r in results {
            s.total += 1;
            match r.fetch {
                Some(FetchStatus::Cached) => s.cached += 1,
                Some(FetchStatus::Downloaded) => s.downloaded += 1,
                None => {}
            }
            match r.outcome {
                Outcome::Extracted { .. } => s.extracted += 1,
                Outcome::DownloadFailed { .. } => s.download_failed += 1,
                Outcome::IntegrityFailed { .. } => s.integrity_failed += 1,
                Outcome::ExtractionFailed { .. } => s.extraction_failed += 1,
                Outcome::Aborted { .. } => s.aborted += 1,
            }
        }
        s
    }

    pub fn failed(&self) -> usize {
        self.total - self.extracted
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} archive(s): {} extracted ({} cached, {} downloaded), {} download failures, {} corrupt, {} extraction failures",
            self.total,
            self.extracted,
            self.cached,
            self.downloaded,
            self.download_failed,
            self.integrity_failed,
            self.extraction_failed
        )?;
        if self.aborted > 0 {
            write!(f, ", {} aborted", self.aborted)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(fetch: Option<FetchStatus>, outcome: Outcome) -> PipelineResult {
        PipelineResult {
            url: "https://host/censo_2001.zip".into(),
            archive: fetch.map(|_| PathBuf::from("zips/censo_2001.zip")),
            fetch,
            outcome,
        }
    }

    #[test]
    fn stages_and_lines() {
        let ok = result(
            Some(FetchStatus::Cached),
            Outcome::Extracted {
                tabular: 2,
                auxiliary: 5,
            },
        );
        assert!(ok.is_success());
        assert_eq!(ok.stage(), Stage::Extract);
        assert_eq!(
            ok.to_string(),
            "extracted censo_2001.zip (cached): 2 tabular, 5 auxiliary"
        );

        let dl = result(
            None,
            Outcome::DownloadFailed {
                attempts: 3,
                error: "HTTP 404".into(),
            },
        );
        assert_eq!(dl.stage(), Stage::Fetch);
        assert!(dl.to_string().starts_with("skipped https://host/censo_2001.zip"));

        let bad = result(
            Some(FetchStatus::Downloaded),
            Outcome::IntegrityFailed {
                error: "corrupt entry x.csv".into(),
            },
        );
        assert_eq!(bad.stage(), Stage::Verify);
        assert!(bad.to_string().contains("x.csv"));
        assert_eq!(bad.stage().as_str(), "verify");
    }

    #[test]
    fn stage_names_outlive_the_result() {
        let names: Vec<&'static str> = [Outcome::Aborted {
            error: "worker panicked".into(),
        }]
        .into_iter()
        .map(|o| result(None, o).stage().as_str())
        .collect();
        assert_eq!(names, vec!["fetch"]);
        assert_eq!(Stage::Extract.as_str(), "extract");
    }

    #[test]
    fn summary_counts_every_result() {
        let results = vec![
            result(
                Some(FetchStatus::Cached),
                Outcome::Extracted {
                    tabular: 1,
                    auxiliary: 0,
                },
            ),
            result(
                Some(FetchStatus::Downloaded),
                Outcome::ExtractionFailed {
                    error: "disk full".into(),
                },
            ),
            result(
                None,
                Outcome::DownloadFailed {
                    attempts: 3,
                    error: "timeout".into(),
                },
            ),
        ];
        let s = Summary::from_results(&results);
        assert_eq!(s.total, 3);
        assert_eq!(s.extracted, 1);
        assert_eq!(s.cached, 1);
        assert_eq!(s.downloaded, 1);
        assert_eq!(s.extraction_failed, 1);
        assert_eq!(s.download_failed, 1);
        assert_eq!(s.failed(), 2);
        assert!(!s.to_string().contains("aborted"));
    }
}
