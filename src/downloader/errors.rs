// Error taxonomy shared by every acquisition stage

use std::path::Path;

use thiserror::Error;

/// Everything that can go wrong while identifying a file or acquiring its artifacts.
///
/// Errors carry rendered messages rather than source errors so that a single outcome
/// (for example a failed login) can be cloned out to every file pipeline waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquireError {
    /// Filesystem access failed (stat, read, write, directory listing)
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    /// Authentication or transport failure talking to a dependency
    #[error("Provider error: {0}")]
    Provider(String),

    /// The provider answered, but had nothing for us. Expected, not a failure of the run.
    #[error("Not found: {0}")]
    NotFound(String),

    /// One specific artifact transfer failed
    #[error("Download failed: {0}")]
    Download(String),
}

impl AcquireError {
    pub fn io(path: &Path, err: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Short label for console reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::Provider(_) => "provider",
            Self::NotFound(_) => "not-found",
            Self::Download(_) => "download",
        }
    }
}

impl From<reqwest::Error> for AcquireError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::Provider(format!("HTTP {}: {}", status, err));
        }
        if err.is_timeout() {
            return Self::Provider(format!("Network timeout: {}", err));
        }
        Self::Provider(err.to_string())
    }
}

impl From<serde_json::Error> for AcquireError {
    fn from(err: serde_json::Error) -> Self {
        Self::Provider(format!("Invalid JSON: {}", err))
    }
}
