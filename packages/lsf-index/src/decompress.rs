//! Transparent decompression of gzip-wrapped logs and schemas.
//!
//! `Data.lsf.gz` is expanded once to `Data.lsf` beside it; later opens reuse
//! the expanded file. Loggers that rotate by appending a new gzip member
//! produce multi-member streams, which are read to the end.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;

use crate::error::Result;

/// Suffix of compressed files.
pub const GZ_SUFFIX: &str = ".gz";

/// Path of the expanded sibling of `gz_path` (the `.gz` suffix removed).
/// `None` if the name does not end in `.gz`.
pub fn expanded_path(gz_path: &Path) -> Option<PathBuf> {
    let name = gz_path.file_name()?.to_str()?;
    let stem = name.strip_suffix(GZ_SUFFIX).filter(|s| !s.is_empty())?;
    Some(gz_path.with_file_name(stem))
}

/// Expand `gz_path` to its sibling unless the sibling already exists.
/// Returns the sibling path.
pub fn decompress_to_sibling(gz_path: &Path) -> Result<PathBuf> {
    let target = expanded_path(gz_path).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a .gz file", gz_path.display()),
        )
    })?;

    if target.exists() {
        tracing::debug!(
            "{} already expanded to {}",
            gz_path.display(),
            target.display()
        );
        return Ok(target);
    }

    let mut part = target.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);

    let written = match expand(gz_path, &part) {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&part);
            return Err(e);
        }
    };
    fs::rename(&part, &target)?;

    tracing::info!(
        "expanded {} to {} ({} bytes)",
        gz_path.display(),
        target.display(),
        written
    );
    Ok(target)
}

fn expand(gz_path: &Path, out: &Path) -> Result<u64> {
    let mut decoder = MultiGzDecoder::new(BufReader::new(File::open(gz_path)?));
    let mut writer = BufWriter::new(File::create(out)?);
    let written = io::copy(&mut decoder, &mut writer)?;
    writer.flush()?;
    Ok(written)
}
