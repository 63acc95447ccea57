// Provider trait definitions

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::errors::AcquireError;
use super::models::{
    MovieRecord, Session, SubtitleCandidate, SubtitlePayload, SubtitleQuery, TrailerCandidate,
    VideoProbe,
};

/// Subtitle search service (OpenSubtitles in production)
#[async_trait]
pub trait SubtitleProvider: Send + Sync {
    /// Name of the provider (for logging)
    fn name(&self) -> &'static str;

    /// Log in once per run and hand back the session to pass into every later call
    async fn authenticate(&self) -> Result<Session, AcquireError>;

    /// Candidates in provider relevance order
    async fn search(
        &self,
        session: &Session,
        query: &SubtitleQuery,
    ) -> Result<Vec<SubtitleCandidate>, AcquireError>;

    /// Resolve a short-lived signed download link for a candidate
    async fn resolve_link(
        &self,
        session: &Session,
        candidate: &SubtitleCandidate,
    ) -> Result<String, AcquireError>;

    /// Fetch the body behind a resolved link
    async fn fetch(&self, link: &str) -> Result<SubtitlePayload, AcquireError>;
}

/// Movie metadata service (TMDB in production)
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Movies matching a free-text name, adult content excluded, most popular first
    async fn search_movies(&self, name: &str) -> Result<Vec<MovieRecord>, AcquireError>;

    /// Promotional videos attached to a movie, in provider order
    async fn list_videos(&self, movie: &MovieRecord) -> Result<Vec<TrailerCandidate>, AcquireError>;
}

/// Video retrieval backend (yt-dlp in production)
#[async_trait]
pub trait VideoFetcher: Send + Sync {
    fn name(&self) -> &'static str;

    /// Look up title/size/container without downloading
    async fn probe(&self, url: &str) -> Result<VideoProbe, AcquireError>;

    /// Stream `url` into `dest_dir/<file_stem>.<ext>` and return the written path
    async fn fetch_to(
        &self,
        url: &str,
        dest_dir: &Path,
        file_stem: &str,
    ) -> Result<PathBuf, AcquireError>;
}
