// Identity resolution: movie-name guessing and OSDB content hashing

use std::io::SeekFrom;

use regex::Regex;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::downloader::errors::AcquireError;
use crate::downloader::models::{Fingerprint, MediaFile, MovieIdentity};

/// Bytes hashed from each end of the file
pub const HASH_CHUNK_SIZE: u64 = 64 * 1024;

lazy_static::lazy_static! {
    // Three digits in a row usually start a year (2019) or a resolution tag (1080p).
    // Any Unicode digit counts, matching the alphanumeric filter below.
    static ref DIGIT_RUN: Regex = Regex::new(r"\d{3}").unwrap();
}

/// Guess a human-readable movie name from a file name.
///
/// Keeps the last path segment without its extension, cuts everything from the first
/// run of three digits, and turns any character that is not a letter, digit or space
/// into a space. The result is a search label, not an authoritative title:
/// `The.Matrix.1999.1080p.mkv` gives `The Matrix`, but a name without separators or
/// with a numeric title gives a poor guess.
pub fn guess_name(filename: &str) -> String {
    let segment = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename);

    let stem = match segment.rfind('.') {
        Some(idx) if idx > 0 => &segment[..idx],
        _ => segment,
    };

    let truncated = match DIGIT_RUN.find(stem) {
        Some(m) => &stem[..m.start()],
        None => stem,
    };

    truncated
        .chars()
        .map(|c| if c.is_alphanumeric() || c == ' ' { c } else { ' ' })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Compute the OSDB hash of a file: its size plus the sum of the little-endian u64
/// words in the first and last 64 KiB, all modulo 2^64.
///
/// Only the two windows are read. Files shorter than 128 KiB are hashed from whatever
/// the (possibly overlapping) windows cover; that fingerprint is flagged as degraded
/// because providers computing the strict algorithm would reject such a file.
pub async fn compute_fingerprint(file: &MediaFile) -> Result<Fingerprint, AcquireError> {
    let io_err = |e: std::io::Error| AcquireError::io(&file.path, e);

    let mut handle = File::open(&file.path).await.map_err(io_err)?;
    let size = handle.metadata().await.map_err(io_err)?.len();
    let window = size.min(HASH_CHUNK_SIZE);

    let mut head = vec![0u8; window as usize];
    handle.read_exact(&mut head).await.map_err(io_err)?;

    let mut tail = vec![0u8; window as usize];
    handle
        .seek(SeekFrom::Start(size - window))
        .await
        .map_err(io_err)?;
    handle.read_exact(&mut tail).await.map_err(io_err)?;

    let degraded = size < 2 * HASH_CHUNK_SIZE;
    if degraded {
        log::warn!(
            "[Identity] {} is only {} bytes; fingerprint is degraded",
            file.path.display(),
            size
        );
    }

    Ok(Fingerprint {
        value: osdb_hash(size, &head, &tail),
        degraded,
    })
}

/// Fold the size and both windows into the hash value
pub fn osdb_hash(size: u64, head: &[u8], tail: &[u8]) -> u64 {
    size.wrapping_add(sum_words(head))
        .wrapping_add(sum_words(tail))
}

fn sum_words(bytes: &[u8]) -> u64 {
    bytes.chunks(8).fold(0u64, |acc, chunk| {
        let mut word = [0u8; 8];
        word[..chunk.len()].copy_from_slice(chunk);
        acc.wrapping_add(u64::from_le_bytes(word))
    })
}

/// Derive name and fingerprint for a selected file
pub async fn identify(file: &MediaFile) -> Result<MovieIdentity, AcquireError> {
    let guessed_name = guess_name(&file.file_name());
    let fingerprint = compute_fingerprint(file).await?;
    log::debug!(
        "[Identity] {} -> '{}' ({})",
        file.path.display(),
        guessed_name,
        fingerprint
    );
    Ok(MovieIdentity {
        guessed_name,
        fingerprint,
    })
}
