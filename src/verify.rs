// src/verify.rs

use anyhow::{Context, Result};
use std::{fs::File, io, path::Path};
use tracing::{debug, instrument, warn};
use zip::ZipArchive;

/// Read every file entry of the zip at `path` through its decompressor and
/// CRC check, discarding the bytes. Returns how many entries were checked;
/// the error names the first entry that failed.
#[instrument(level = "debug", skip(path), fields(zip = %path.as_ref().display()))]
pub fn check_archive<P: AsRef<Path>>(path: P) -> Result<usize> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open ZIP file: {:?}", path))?;
    let mut archive =
        ZipArchive::new(file).with_context(|| format!("Failed to read ZIP archive: {:?}", path))?;

    let mut checked = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to access ZIP entry #{} in {:?}", i, path))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        io::copy(&mut entry, &mut io::sink())
            .with_context(|| format!("corrupt entry {}", name))?;
        checked += 1;
    }
    debug!(checked, "archive ok");
    Ok(checked)
}

/// `true` when the archive opens and every entry reads back cleanly.
/// Failures are logged, never returned.
pub fn verify<P: AsRef<Path>>(path: P) -> bool {
    verify_entries(path).is_ok()
}

/// [`verify`], keeping the entry count on success and the rendered error
/// (already logged) on failure.
pub fn verify_entries<P: AsRef<Path>>(path: P) -> std::result::Result<usize, String> {
    check_archive(&path).map_err(|e| {
        let error = format!("{:#}", e);
        warn!(zip = %path.as_ref().display(), %error, "corrupt ZIP");
        error
    })
}
