// File selection: explicit operands, or the largest file in a directory

use std::path::{Path, PathBuf};

use crate::downloader::errors::AcquireError;
use crate::downloader::models::MediaFile;

/// Pick the files to process.
///
/// With explicit paths, every path gets its own slot in input order, so one unreadable
/// operand does not stop the others. Without any, the largest regular file in `dir` is
/// picked (first in listing order on ties).
pub async fn select_targets(
    explicit_paths: &[PathBuf],
    dir: &Path,
) -> Vec<Result<MediaFile, AcquireError>> {
    if explicit_paths.is_empty() {
        return vec![largest_in_dir(dir).await];
    }

    let mut targets = Vec::with_capacity(explicit_paths.len());
    for path in explicit_paths {
        targets.push(stat(path).await);
    }
    targets
}

async fn stat(path: &Path) -> Result<MediaFile, AcquireError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| AcquireError::io(path, e))?;

    if meta.is_dir() {
        return Err(AcquireError::Io {
            path: path.display().to_string(),
            message: "is a directory".to_string(),
        });
    }

    Ok(MediaFile {
        path: path.to_path_buf(),
        size_bytes: meta.len(),
    })
}

async fn largest_in_dir(dir: &Path) -> Result<MediaFile, AcquireError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| AcquireError::io(dir, e))?;

    let mut best: Option<MediaFile> = None;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AcquireError::io(dir, e))?
    {
        let path = entry.path();
        // Follows symlinks, so a linked movie counts with its target's size
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) => {
                log::warn!("[Selector] Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        if !meta.is_file() {
            continue;
        }

        // Strictly greater keeps the earlier entry on ties
        if best.as_ref().map_or(true, |b| meta.len() > b.size_bytes) {
            best = Some(MediaFile {
                path,
                size_bytes: meta.len(),
            });
        }
    }

    match best {
        Some(file) => {
            log::info!(
                "[Selector] Picked {} ({} bytes)",
                file.path.display(),
                file.size_bytes
            );
            Ok(file)
        }
        None => Err(AcquireError::NotFound(format!(
            "no files in {}",
            dir.display()
        ))),
    }
}
