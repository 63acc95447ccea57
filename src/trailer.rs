// Trailer acquisition: metadata lookup, ranking, and streaming through the video backend

use std::path::Path;
use std::sync::Arc;

use crate::downloader::errors::AcquireError;
use crate::downloader::models::{
    AcquiredArtifact, ArtifactKind, MediaFile, MovieIdentity, MovieRecord, TrailerCandidate,
};
use crate::downloader::traits::{MetadataProvider, VideoFetcher};
use crate::downloader::utils;

/// File stem of the trailer written next to the movie
pub const TRAILER_STEM: &str = "_trailer";

/// Pick the candidate most likely to be the real trailer.
///
/// First title containing "official trailer", else the first containing "trailer",
/// else whatever came first. Case-insensitive.
pub fn select_best_trailer(candidates: &[TrailerCandidate]) -> Result<&TrailerCandidate, AcquireError> {
    let titled = |needle: &str| {
        candidates
            .iter()
            .find(|c| c.title.to_lowercase().contains(needle))
    };

    titled("official trailer")
        .or_else(|| titled("trailer"))
        .or_else(|| candidates.first())
        .ok_or_else(|| AcquireError::NotFound("no videos for this movie".to_string()))
}

async fn existing_trailer(dir: &Path) -> Result<Option<AcquiredArtifact>, AcquireError> {
    let found = utils::find_by_stem(dir, TRAILER_STEM)
        .await
        .map_err(|e| AcquireError::io(dir, e))?;
    Ok(found.map(|path| {
        log::debug!("Trailer already present: {}", path.display());
        AcquiredArtifact::already_present(path, ArtifactKind::Trailer)
    }))
}

pub struct TrailerAcquirer {
    metadata: Arc<dyn MetadataProvider>,
    fetcher: Arc<dyn VideoFetcher>,
}

impl TrailerAcquirer {
    pub fn new(metadata: Arc<dyn MetadataProvider>, fetcher: Arc<dyn VideoFetcher>) -> Self {
        Self { metadata, fetcher }
    }

    /// Most popular non-adult match for the guessed name
    pub async fn find_movie(&self, guessed_name: &str) -> Result<MovieRecord, AcquireError> {
        if guessed_name.trim().is_empty() {
            return Err(AcquireError::NotFound(
                "no usable movie name in file name".to_string(),
            ));
        }

        self.metadata
            .search_movies(guessed_name)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                AcquireError::NotFound(format!("no {} match for '{}'", self.metadata.name(), guessed_name))
            })
    }

    pub async fn list_videos(&self, movie: &MovieRecord) -> Result<Vec<TrailerCandidate>, AcquireError> {
        self.metadata.list_videos(movie).await
    }

    /// Stream `candidate` to `<destination_dir>/_trailer.<ext>`, unless some
    /// `_trailer.*` is already there.
    pub async fn store(
        &self,
        candidate: &TrailerCandidate,
        destination_dir: &Path,
    ) -> Result<AcquiredArtifact, AcquireError> {
        if let Some(existing) = existing_trailer(destination_dir).await? {
            return Ok(existing);
        }

        // Metadata is informational only; the download decides success
        match self.fetcher.probe(&candidate.playback_url).await {
            Ok(probe) => log::info!(
                "[{}] Fetching '{}' ({}, {})",
                self.fetcher.name(),
                probe.title,
                probe.ext,
                probe
                    .filesize
                    .map(|b| format!("{:.1} MiB", b as f64 / (1024.0 * 1024.0)))
                    .unwrap_or_else(|| "size unknown".to_string())
            ),
            Err(e) => log::warn!(
                "[{}] Could not read metadata for {}, downloading anyway: {}",
                self.fetcher.name(),
                candidate.playback_url,
                e
            ),
        }

        let path = self
            .fetcher
            .fetch_to(&candidate.playback_url, destination_dir, TRAILER_STEM)
            .await?;
        Ok(AcquiredArtifact::downloaded(path, ArtifactKind::Trailer))
    }

    /// Whole branch for one file: movie lookup, video listing, ranking, storing
    pub async fn acquire(
        &self,
        identity: &MovieIdentity,
        file: &MediaFile,
    ) -> Result<AcquiredArtifact, AcquireError> {
        // Skip the metadata lookups too when the directory already has its trailer
        let dir = file.directory();
        if let Some(existing) = existing_trailer(&dir).await? {
            return Ok(existing);
        }

        let movie = self.find_movie(&identity.guessed_name).await?;
        log::debug!(
            "[{}] Matched '{}' (id {}, released {})",
            self.metadata.name(),
            movie.title,
            movie.id,
            movie.release_date.as_deref().unwrap_or("unknown")
        );

        let videos = self.list_videos(&movie).await?;
        let best = select_best_trailer(&videos)?;
        self.store(best, &dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::{ArtifactOutcome, Fingerprint, VideoProbe};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn video(title: &str) -> TrailerCandidate {
        TrailerCandidate {
            id: title.to_string(),
            title: title.to_string(),
            playback_url: format!("https://www.youtube.com/watch?v={}", title.len()),
        }
    }

    struct FakeMetadata {
        movies: Vec<MovieRecord>,
        videos: Vec<TrailerCandidate>,
    }

    #[async_trait]
    impl MetadataProvider for FakeMetadata {
        fn name(&self) -> &'static str {
            "FakeMeta"
        }

        async fn search_movies(&self, _name: &str) -> Result<Vec<MovieRecord>, AcquireError> {
            Ok(self.movies.clone())
        }

        async fn list_videos(&self, _movie: &MovieRecord) -> Result<Vec<TrailerCandidate>, AcquireError> {
            Ok(self.videos.clone())
        }
    }

    #[derive(Default)]
    struct FakeFetcher {
        probes: AtomicUsize,
        fetches: AtomicUsize,
        probe_fails: bool,
    }

    #[async_trait]
    impl VideoFetcher for FakeFetcher {
        fn name(&self) -> &'static str {
            "fake-dl"
        }

        async fn probe(&self, _url: &str) -> Result<VideoProbe, AcquireError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.probe_fails {
                return Err(AcquireError::Download("Sign in to confirm your age".into()));
            }
            Ok(VideoProbe {
                title: "Official Trailer".into(),
                ext: "mp4".into(),
                filesize: Some(2 * 1024 * 1024),
                duration_seconds: Some(120),
            })
        }

        async fn fetch_to(
            &self,
            _url: &str,
            dest_dir: &Path,
            file_stem: &str,
        ) -> Result<PathBuf, AcquireError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let path = dest_dir.join(format!("{}.mp4", file_stem));
            std::fs::write(&path, b"video").unwrap();
            Ok(path)
        }
    }

    fn movie() -> MovieRecord {
        MovieRecord {
            id: 603,
            title: "The Matrix".into(),
            release_date: Some("1999-03-30".into()),
            popularity: 80.0,
        }
    }

    fn identity(name: &str) -> MovieIdentity {
        MovieIdentity {
            guessed_name: name.into(),
            fingerprint: Fingerprint {
                value: 0,
                degraded: true,
            },
        }
    }

    #[test]
    fn test_official_trailer_wins() {
        let videos = vec![video("Clip 1"), video("Official Trailer"), video("Trailer #2")];
        assert_eq!(select_best_trailer(&videos).unwrap().title, "Official Trailer");
    }

    #[test]
    fn test_any_trailer_before_first() {
        let videos = vec![video("Clip"), video("Final TRAILER"), video("Teaser Trailer")];
        assert_eq!(select_best_trailer(&videos).unwrap().title, "Final TRAILER");
    }

    #[test]
    fn test_falls_back_to_first() {
        let videos = vec![video("Teaser"), video("Behind the Scenes")];
        assert_eq!(select_best_trailer(&videos).unwrap().title, "Teaser");
        assert!(select_best_trailer(&[]).unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_no_movie_is_not_found() {
        let acquirer = TrailerAcquirer::new(
            Arc::new(FakeMetadata {
                movies: vec![],
                videos: vec![],
            }),
            Arc::new(FakeFetcher::default()),
        );
        assert!(acquirer.find_movie("Nothing").await.unwrap_err().is_not_found());
        assert!(acquirer.find_movie("  ").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_acquire_then_skip_existing() {
        let dir = tempfile::tempdir().unwrap();
        let file = MediaFile {
            path: dir.path().join("The.Matrix.1999.mkv"),
            size_bytes: 1,
        };
        let fetcher = Arc::new(FakeFetcher::default());
        let acquirer = TrailerAcquirer::new(
            Arc::new(FakeMetadata {
                movies: vec![movie()],
                videos: vec![video("Clip"), video("Official Trailer")],
            }),
            fetcher.clone(),
        );

        let first = acquirer.acquire(&identity("The Matrix"), &file).await.unwrap();
        assert_eq!(first.outcome, ArtifactOutcome::Downloaded);
        assert_eq!(first.local_path, dir.path().join("_trailer.mp4"));

        let second = acquirer.acquire(&identity("The Matrix"), &file).await.unwrap();
        assert_eq!(second.outcome, ArtifactOutcome::AlreadyPresent);
        assert_eq!(fetcher.probes.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_existing_trailer_of_other_container_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("_trailer.webm"), b"old").unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        let acquirer = TrailerAcquirer::new(
            Arc::new(FakeMetadata {
                movies: vec![movie()],
                videos: vec![video("Trailer")],
            }),
            fetcher.clone(),
        );

        let stored = acquirer.store(&video("Trailer"), dir.path()).await.unwrap();
        assert_eq!(stored.outcome, ArtifactOutcome::AlreadyPresent);
        assert_eq!(stored.local_path, dir.path().join("_trailer.webm"));
        assert_eq!(fetcher.probes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_metadata_failure_still_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher {
            probe_fails: true,
            ..Default::default()
        });
        let acquirer = TrailerAcquirer::new(
            Arc::new(FakeMetadata {
                movies: vec![movie()],
                videos: vec![video("Trailer")],
            }),
            fetcher.clone(),
        );

        let stored = acquirer.store(&video("Trailer"), dir.path()).await.unwrap();
        assert_eq!(stored.outcome, ArtifactOutcome::Downloaded);
        assert_eq!(stored.local_path, dir.path().join("_trailer.mp4"));
        assert_eq!(fetcher.probes.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
    }
}
