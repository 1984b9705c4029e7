// src/extract.rs

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};
use zip::ZipArchive;

static TABULAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^.*\.csv$").expect("tabular pattern should compile"));

/// Which output area an entry belongs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Tabular,
    Auxiliary,
}

/// Classify a base filename: `*.csv` in any case is tabular, everything else
/// is auxiliary.
pub fn classify(base_name: &str) -> Destination {
    if TABULAR.is_match(base_name) {
        Destination::Tabular
    } else {
        Destination::Auxiliary
    }
}

/// Last component of a zip entry name, accepting either separator.
fn base_name(entry_name: &str) -> &str {
    entry_name.rsplit(['/', '\\']).next().unwrap_or("")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractReport {
    pub archive: String,
    pub tabular: usize,
    pub auxiliary: usize,
    /// Directory markers and entries with no file name.
    pub skipped: usize,
}

/// Moves archive entries into the tabular or auxiliary directory by name.
#[derive(Debug, Clone)]
pub struct Extractor {
    tabular_dir: PathBuf,
    auxiliary_dir: PathBuf,
    staging_root: PathBuf,
}

impl Extractor {
    pub fn new(
        tabular_dir: impl Into<PathBuf>,
        auxiliary_dir: impl Into<PathBuf>,
        staging_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tabular_dir: tabular_dir.into(),
            auxiliary_dir: auxiliary_dir.into(),
            staging_root: staging_root.into(),
        }
    }

    pub fn dir_for(&self, dest: Destination) -> &Path {
        match dest {
            Destination::Tabular => &self.tabular_dir,
            Destination::Auxiliary => &self.auxiliary_dir,
        }
    }

    /// Extract every file entry of `zip_path`, flattening directories.
    ///
    /// Each entry is written into a scratch directory private to this call,
    /// then moved over any same-named file at its destination. The first
    /// failure aborts the archive; entries already moved stay where they are.
    #[instrument(level = "info", skip(self, zip_path), fields(zip = %zip_path.as_ref().display()))]
    pub fn extract<P: AsRef<Path>>(&self, zip_path: P) -> Result<ExtractReport> {
        let zip_path = zip_path.as_ref();
        let archive_name = zip_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| zip_path.display().to_string());
        let stem = zip_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archive".to_string());

        let file = File::open(zip_path)
            .with_context(|| format!("Failed to open ZIP file: {:?}", zip_path))?;
        let mut archive = ZipArchive::new(file)
            .with_context(|| format!("Failed to read ZIP archive: {:?}", zip_path))?;

        fs::create_dir_all(&self.staging_root)
            .with_context(|| format!("creating {}", self.staging_root.display()))?;
        let staging = tempfile::Builder::new()
            .prefix(&format!("{}-", stem))
            .tempdir_in(&self.staging_root)
            .with_context(|| format!("creating staging dir in {}", self.staging_root.display()))?;

        let mut report = ExtractReport {
            archive: archive_name,
            tabular: 0,
            auxiliary: 0,
            skipped: 0,
        };

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .with_context(|| format!("Failed to access ZIP entry #{} in {:?}", i, zip_path))?;
            let name = entry.name().to_string();
            if name.ends_with('/') || entry.is_dir() {
                report.skipped += 1;
                continue;
            }
            let base = base_name(&name);
            if base.is_empty() || base == "." || base == ".." {
                report.skipped += 1;
                continue;
            }

            let staged = staging.path().join(base);
            {
                let out = File::create(&staged)
                    .with_context(|| format!("creating {}", staged.display()))?;
                let mut out = BufWriter::new(out);
                io::copy(&mut entry, &mut out).with_context(|| format!("extracting {}", name))?;
                out.flush()
                    .with_context(|| format!("writing {}", staged.display()))?;
            }

            let kind = classify(base);
            let dest_dir = self.dir_for(kind);
            fs::create_dir_all(dest_dir)
                .with_context(|| format!("creating {}", dest_dir.display()))?;
            let dest = dest_dir.join(base);
            move_file(&staged, &dest)?;
            debug!(entry = %name, dest = %dest.display(), "moved");

            match kind {
                Destination::Tabular => report.tabular += 1,
                Destination::Auxiliary => report.auxiliary += 1,
            }
        }

        let staging_path = staging.path().to_path_buf();
        staging
            .close()
            .with_context(|| format!("removing staging dir {}", staging_path.display()))?;

        info!(
            tabular = report.tabular,
            auxiliary = report.auxiliary,
            skipped = report.skipped,
            "extracted"
        );
        Ok(report)
    }
}

/// Rename `from` over `to`, falling back to copy-and-delete when the two
/// paths are on different filesystems.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)
        .with_context(|| format!("moving {} to {}", from.display(), to.display()))?;
    fs::remove_file(from).with_context(|| format!("removing {}", from.display()))?;
    Ok(())
}
