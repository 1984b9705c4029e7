// src/config.rs

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{fs, path::Path, path::PathBuf, time::Duration};

use crate::extract::Extractor;
use crate::fetch::{urls::yearly_urls, RetryPolicy};

pub const DEFAULT_URL_TEMPLATE: &str =
    "https://download.inep.gov.br/dados_abertos/microdados_censo_escolar_{year}.zip";

/// Runtime settings for one batch run. Every field has a default, so a YAML
/// file only needs the keys it wants to change.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// URL pattern; `{year}` is replaced by each year in the range.
    pub url_template: String,
    pub first_year: u16,
    pub last_year: u16,

    /// Destination for `*.csv` entries.
    pub raw_dir: PathBuf,
    /// Destination for everything else.
    pub aux_dir: PathBuf,
    /// Downloaded archives, keyed by the URL's file name.
    pub archive_dir: PathBuf,
    /// Root under which each extraction gets its own scratch directory.
    pub staging_dir: PathBuf,

    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub max_workers: usize,
    pub chunk_size: usize,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            first_year: 1995,
            last_year: 2024,
            raw_dir: PathBuf::from("data/raw"),
            aux_dir: PathBuf::from(".dev/aux_files"),
            archive_dir: PathBuf::from(".dev/zips"),
            staging_dir: PathBuf::from(".tmp_extract"),
            max_retries: 3,
            retry_delay_secs: 5,
            max_workers: 4,
            chunk_size: 1024 * 1024,
            timeout_secs: 90,
        }
    }
}

impl Config {
    /// Parse a YAML document and validate the result.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(text).context("parsing YAML config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and parse the YAML config at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("loading config {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            bail!("max_workers must be at least 1");
        }
        if self.max_retries == 0 {
            bail!("max_retries must be at least 1");
        }
        if self.chunk_size == 0 {
            bail!("chunk_size must be greater than 0");
        }
        if self.first_year > self.last_year {
            bail!(
                "first_year ({}) is after last_year ({})",
                self.first_year,
                self.last_year
            );
        }
        if !self.url_template.contains("{year}") {
            bail!("url_template {:?} has no {{year}} placeholder", self.url_template);
        }
        Ok(())
    }

    pub fn urls(&self) -> Vec<String> {
        yearly_urls(&self.url_template, self.first_year, self.last_year)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs(self.retry_delay_secs))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn extractor(&self) -> Extractor {
        Extractor::new(&self.raw_dir, &self.aux_dir, &self.staging_dir)
    }

    /// Every directory the run writes into.
    pub fn dirs(&self) -> [&Path; 4] {
        [
            self.raw_dir.as_path(),
            self.aux_dir.as_path(),
            self.archive_dir.as_path(),
            self.staging_dir.as_path(),
        ]
    }
}
