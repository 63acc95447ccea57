// Common data models for the acquisition pipeline

use std::fmt;
use std::path::{Path, PathBuf};

use super::errors::AcquireError;

/// A video file picked for processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl MediaFile {
    /// Directory artifacts are written into (the file's own directory)
    pub fn directory(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// File name without its final extension
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// OSDB-style content hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub value: u64,
    /// Computed from fewer bytes than the full 2 x 64 KiB window
    pub degraded: bool,
}

impl Fingerprint {
    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.value)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Best-guess identity of a movie file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieIdentity {
    pub guessed_name: String,
    pub fingerprint: Fingerprint,
}

/// Authenticated subtitle provider session, shared read-only by a whole run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub api_key: String,
    /// Absent when running without login credentials
    pub token: Option<String>,
}

/// Search parameters sent to the subtitle provider
#[derive(Debug, Clone, Default)]
pub struct SubtitleQuery {
    pub fingerprint: Option<String>,
    pub name: Option<String>,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleCandidate {
    pub id: String,
    /// Provider file id used to resolve a download link
    pub download_ref: u64,
    pub language: String,
    pub file_name: Option<String>,
}

/// Raw subtitle body as served, before any decoding
#[derive(Debug, Clone)]
pub struct SubtitlePayload {
    pub bytes: Vec<u8>,
    pub content_encoding: Option<String>,
    pub content_type: Option<String>,
}

/// Canonical metadata match for a guessed name
#[derive(Debug, Clone, PartialEq)]
pub struct MovieRecord {
    pub id: u64,
    pub title: String,
    pub release_date: Option<String>,
    pub popularity: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailerCandidate {
    pub id: String,
    pub title: String,
    pub playback_url: String,
}

/// Stream metadata reported by the video retrieval backend before downloading
#[derive(Debug, Clone)]
pub struct VideoProbe {
    pub title: String,
    pub ext: String,
    pub filesize: Option<u64>,
    pub duration_seconds: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Subtitle,
    Trailer,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subtitle => write!(f, "subtitle"),
            Self::Trailer => write!(f, "trailer"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactOutcome {
    /// Fetched and written during this run
    Downloaded,
    /// A file already sat at the target path; nothing was fetched
    AlreadyPresent,
}

/// A file persisted (or found persisted) on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredArtifact {
    pub local_path: PathBuf,
    pub kind: ArtifactKind,
    pub outcome: ArtifactOutcome,
}

impl AcquiredArtifact {
    pub fn downloaded(local_path: impl AsRef<Path>, kind: ArtifactKind) -> Self {
        Self {
            local_path: local_path.as_ref().to_path_buf(),
            kind,
            outcome: ArtifactOutcome::Downloaded,
        }
    }

    pub fn already_present(local_path: impl AsRef<Path>, kind: ArtifactKind) -> Self {
        Self {
            local_path: local_path.as_ref().to_path_buf(),
            kind,
            outcome: ArtifactOutcome::AlreadyPresent,
        }
    }

    pub fn is_already_present(&self) -> bool {
        self.outcome == ArtifactOutcome::AlreadyPresent
    }
}

/// Network configuration shared by the HTTP clients and yt-dlp
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Proxy URL (e.g., "socks5://127.0.0.1:1080")
    pub proxy: Option<String>,

    /// Timeout in seconds
    pub timeout: Option<u32>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout: Some(30),
        }
    }
}

/// Which branches a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InclusionFlags {
    pub subtitles: bool,
    pub trailer: bool,
}

impl InclusionFlags {
    /// `subtitles_only` and `trailer_only` are not exclusive: giving both (or neither)
    /// runs both branches.
    pub fn from_cli(subtitles_only: bool, trailer_only: bool) -> Self {
        match (subtitles_only, trailer_only) {
            (true, false) => Self {
                subtitles: true,
                trailer: false,
            },
            (false, true) => Self {
                subtitles: false,
                trailer: true,
            },
            _ => Self::default(),
        }
    }
}

impl Default for InclusionFlags {
    fn default() -> Self {
        Self {
            subtitles: true,
            trailer: true,
        }
    }
}

/// Overall status, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    Success,
    NotFound,
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "ok"),
            Self::NotFound => write!(f, "not found"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Terminal state of one fan-out branch
#[derive(Debug, Clone)]
pub enum BranchStatus {
    /// Excluded by the run's inclusion flags
    Skipped,
    /// Ran to completion; individual artifacts may still have failed
    Done {
        artifacts: Vec<AcquiredArtifact>,
        failures: Vec<AcquireError>,
    },
    NotFound(String),
    Failed(AcquireError),
}

impl BranchStatus {
    pub fn from_error(err: AcquireError) -> Self {
        match err {
            AcquireError::NotFound(msg) => Self::NotFound(msg),
            other => Self::Failed(other),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Skipped => Status::Success,
            Self::Done { failures, .. } if failures.is_empty() => Status::Success,
            Self::Done { .. } => Status::Failed,
            Self::NotFound(_) => Status::NotFound,
            Self::Failed(_) => Status::Failed,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Self::Skipped => "skipped".to_string(),
            Self::Done {
                artifacts,
                failures,
            } => {
                let fetched = artifacts
                    .iter()
                    .filter(|a| a.outcome == ArtifactOutcome::Downloaded)
                    .count();
                let present = artifacts.len() - fetched;
                if failures.is_empty() {
                    format!("{} downloaded, {} already present", fetched, present)
                } else {
                    format!(
                        "{} downloaded, {} already present, {} failed",
                        fetched,
                        present,
                        failures.len()
                    )
                }
            }
            Self::NotFound(msg) => format!("not found ({})", msg),
            Self::Failed(err) => format!("failed ({})", err),
        }
    }
}

/// Outcome of one file's pipeline
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub movie_name: Option<String>,
    pub subtitles: BranchStatus,
    pub trailer: BranchStatus,
}

impl FileReport {
    /// Worst of the two branch statuses
    pub fn status(&self) -> Status {
        self.subtitles.status().max(self.trailer.status())
    }
}
