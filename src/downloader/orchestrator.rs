// Pipeline coordinator: identify each file, then fan out to the subtitle and trailer branches

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tokio::sync::{Mutex as AsyncMutex, OnceCell};

use super::errors::AcquireError;
use super::models::{BranchStatus, FileReport, InclusionFlags, MediaFile, MovieIdentity, Session, Status};
use crate::identity::identify;
use crate::subtitles::SubtitleAcquirer;
use crate::trailer::TrailerAcquirer;

/// Correlation tag used on every per-movie log line
fn tag(name: &str) -> String {
    format!("[ {} ]", name)
}

pub struct Pipeline {
    flags: InclusionFlags,
    subtitles: Option<SubtitleAcquirer>,
    trailer: Option<TrailerAcquirer>,
    /// Login outcome, success or failure, shared by every file of the run
    session: OnceCell<Result<Session, AcquireError>>,
    /// One `_trailer.*` slot per directory; files sharing a directory take turns
    trailer_slots: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl Pipeline {
    pub fn new(flags: InclusionFlags) -> Self {
        Self {
            flags,
            subtitles: None,
            trailer: None,
            session: OnceCell::new(),
            trailer_slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_subtitles(mut self, acquirer: SubtitleAcquirer) -> Self {
        self.subtitles = Some(acquirer);
        self
    }

    pub fn with_trailer(mut self, acquirer: TrailerAcquirer) -> Self {
        self.trailer = Some(acquirer);
        self
    }

    /// Run every selected file concurrently; one report per selection slot, in order
    pub async fn run(
        &self,
        targets: Vec<Result<MediaFile, AcquireError>>,
        dir: &Path,
    ) -> Vec<FileReport> {
        let pipelines = targets.into_iter().map(|target| async move {
            match target {
                Ok(file) => self.process_file(file).await,
                Err(err) => self.selection_failed(err, dir),
            }
        });
        join_all(pipelines).await
    }

    pub async fn process_file(&self, file: MediaFile) -> FileReport {
        let identity = match identify(&file).await {
            Ok(identity) => identity,
            Err(err) => {
                log::error!("{} Could not read file: {}", tag(&file.file_name()), err);
                return self.failed_report(file.path.clone(), err);
            }
        };

        let label = if identity.guessed_name.is_empty() {
            file.file_name()
        } else {
            identity.guessed_name.clone()
        };
        log::info!("{} Processing {}", tag(&label), file.file_name());

        let (subtitles, trailer) = tokio::join!(
            self.run_subtitles(&identity, &file, &label),
            self.run_trailer(&identity, &file, &label),
        );

        FileReport {
            path: file.path,
            movie_name: Some(identity.guessed_name),
            subtitles,
            trailer,
        }
    }

    async fn session(&self, acquirer: &SubtitleAcquirer) -> Result<Session, AcquireError> {
        self.session
            .get_or_init(|| async { acquirer.provider().authenticate().await })
            .await
            .clone()
    }

    fn trailer_slot(&self, dir: PathBuf) -> Arc<AsyncMutex<()>> {
        let mut slots = self
            .trailer_slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.entry(dir).or_default().clone()
    }

    async fn run_subtitles(
        &self,
        identity: &MovieIdentity,
        file: &MediaFile,
        label: &str,
    ) -> BranchStatus {
        if !self.flags.subtitles {
            return BranchStatus::Skipped;
        }
        let Some(acquirer) = &self.subtitles else {
            return BranchStatus::Failed(AcquireError::Provider(
                "subtitle provider not configured".to_string(),
            ));
        };

        let session = match self.session(acquirer).await {
            Ok(session) => session,
            Err(err) => {
                log::error!("{} Subtitle login failed: {}", tag(label), err);
                return BranchStatus::Failed(err);
            }
        };

        let candidates = match acquirer.search_subtitles(&session, identity, file).await {
            Ok(candidates) => candidates,
            Err(err) => {
                log_branch_error(label, "Subtitle", &err);
                return BranchStatus::from_error(err);
            }
        };
        log::info!(
            "{} -- Subtitle found -- ({} candidates)",
            tag(label),
            candidates.len()
        );

        let mut artifacts = Vec::new();
        let mut failures = Vec::new();
        for result in acquirer.acquire(&session, &candidates, file).await {
            match result {
                Ok(artifact) => {
                    log::info!(
                        "{} Subtitles {}: {}",
                        tag(label),
                        if artifact.is_already_present() { "already present" } else { "downloaded" },
                        artifact.local_path.display()
                    );
                    artifacts.push(artifact);
                }
                Err(err) => {
                    log::error!("{} Subtitle download failed: {}", tag(label), err);
                    failures.push(err);
                }
            }
        }

        BranchStatus::Done { artifacts, failures }
    }

    async fn run_trailer(
        &self,
        identity: &MovieIdentity,
        file: &MediaFile,
        label: &str,
    ) -> BranchStatus {
        if !self.flags.trailer {
            return BranchStatus::Skipped;
        }
        let Some(acquirer) = &self.trailer else {
            return BranchStatus::Failed(AcquireError::Provider(
                "metadata provider not configured".to_string(),
            ));
        };

        let slot = self.trailer_slot(file.directory());
        let outcome = {
            let _turn = slot.lock().await;
            acquirer.acquire(identity, file).await
        };

        match outcome {
            Ok(artifact) => {
                log::info!(
                    "{} Trailer {}: {}",
                    tag(label),
                    if artifact.is_already_present() { "already present" } else { "downloaded" },
                    artifact.local_path.display()
                );
                BranchStatus::Done {
                    artifacts: vec![artifact],
                    failures: Vec::new(),
                }
            }
            Err(err) => {
                log_branch_error(label, "Trailer", &err);
                BranchStatus::from_error(err)
            }
        }
    }

    /// Report for a slot whose file could not even be selected
    fn selection_failed(&self, err: AcquireError, dir: &Path) -> FileReport {
        let path = match &err {
            AcquireError::Io { path, .. } => PathBuf::from(path),
            _ => dir.to_path_buf(),
        };
        log::error!("{} {}", tag(&path.display().to_string()), err);
        self.failed_report(path, err)
    }

    fn failed_report(&self, path: PathBuf, err: AcquireError) -> FileReport {
        let branch = |enabled: bool| {
            if enabled {
                BranchStatus::from_error(err.clone())
            } else {
                BranchStatus::Skipped
            }
        };
        FileReport {
            path,
            movie_name: None,
            subtitles: branch(self.flags.subtitles),
            trailer: branch(self.flags.trailer),
        }
    }
}

fn log_branch_error(label: &str, branch: &str, err: &AcquireError) {
    if err.is_not_found() {
        log::warn!("{} {} not found: {}", tag(label), branch, err);
    } else {
        log::error!("{} {} failed: {}", tag(label), branch, err);
    }
}

/// One line per file, then a tally
pub fn log_summary(reports: &[FileReport]) {
    for report in reports {
        let name = report
            .movie_name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| report.path.display().to_string());
        log::info!(
            "{} {}: subtitles {}; trailer {}",
            tag(&name),
            report.status(),
            report.subtitles.summary(),
            report.trailer.summary()
        );
    }

    let ok = reports.iter().filter(|r| r.status() == Status::Success).count();
    log::info!("Done: {}/{} files fully processed", ok, reports.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::{
        MovieRecord, SubtitleCandidate, SubtitlePayload, SubtitleQuery, TrailerCandidate, VideoProbe,
    };
    use crate::downloader::traits::{MetadataProvider, SubtitleProvider, VideoFetcher};
    use crate::downloader::models::ArtifactOutcome;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Subs {
        logins: AtomicUsize,
        reject_login: bool,
    }

    #[async_trait]
    impl SubtitleProvider for Subs {
        fn name(&self) -> &'static str {
            "Subs"
        }

        async fn authenticate(&self) -> Result<Session, AcquireError> {
            self.logins.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.reject_login {
                return Err(AcquireError::Provider("login rejected (401)".into()));
            }
            Ok(Session {
                api_key: "k".into(),
                token: Some("t".into()),
            })
        }

        async fn search(
            &self,
            _session: &Session,
            _query: &SubtitleQuery,
        ) -> Result<Vec<SubtitleCandidate>, AcquireError> {
            Ok(vec![SubtitleCandidate {
                id: "1".into(),
                download_ref: 1,
                language: "en".into(),
                file_name: None,
            }])
        }

        async fn resolve_link(
            &self,
            _session: &Session,
            _candidate: &SubtitleCandidate,
        ) -> Result<String, AcquireError> {
            Ok("link".into())
        }

        async fn fetch(&self, _link: &str) -> Result<SubtitlePayload, AcquireError> {
            Ok(SubtitlePayload {
                bytes: b"1\n00:00:01,000 --> 00:00:02,000\nhi\n".to_vec(),
                content_encoding: None,
                content_type: None,
            })
        }
    }

    /// Knows no movies at all
    struct NoMovies;

    #[async_trait]
    impl MetadataProvider for NoMovies {
        fn name(&self) -> &'static str {
            "NoMovies"
        }

        async fn search_movies(&self, _name: &str) -> Result<Vec<MovieRecord>, AcquireError> {
            Ok(vec![])
        }

        async fn list_videos(&self, _movie: &MovieRecord) -> Result<Vec<TrailerCandidate>, AcquireError> {
            Ok(vec![])
        }
    }

    struct NeverFetch;

    #[async_trait]
    impl VideoFetcher for NeverFetch {
        fn name(&self) -> &'static str {
            "never"
        }

        async fn probe(&self, _url: &str) -> Result<VideoProbe, AcquireError> {
            unreachable!("no movie, no probe")
        }

        async fn fetch_to(&self, _url: &str, _dir: &Path, _stem: &str) -> Result<PathBuf, AcquireError> {
            unreachable!("no movie, no fetch")
        }
    }

    /// Every name matches one movie with a single official trailer
    struct OneMovie;

    #[async_trait]
    impl MetadataProvider for OneMovie {
        fn name(&self) -> &'static str {
            "OneMovie"
        }

        async fn search_movies(&self, _name: &str) -> Result<Vec<MovieRecord>, AcquireError> {
            Ok(vec![MovieRecord {
                id: 1,
                title: "Film".into(),
                release_date: None,
                popularity: 1.0,
            }])
        }

        async fn list_videos(&self, _movie: &MovieRecord) -> Result<Vec<TrailerCandidate>, AcquireError> {
            Ok(vec![TrailerCandidate {
                id: "v1".into(),
                title: "Official Trailer".into(),
                playback_url: "https://www.youtube.com/watch?v=v1".into(),
            }])
        }
    }

    /// Slow downloader that records how many writes overlap
    #[derive(Default)]
    struct SlowFetch {
        fetches: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    #[async_trait]
    impl VideoFetcher for SlowFetch {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn probe(&self, _url: &str) -> Result<VideoProbe, AcquireError> {
            Ok(VideoProbe {
                title: "Official Trailer".into(),
                ext: "mp4".into(),
                filesize: None,
                duration_seconds: None,
            })
        }

        async fn fetch_to(&self, _url: &str, dir: &Path, stem: &str) -> Result<PathBuf, AcquireError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            let path = dir.join(format!("{}.mp4", stem));
            std::fs::write(&path, b"video").unwrap();
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(path)
        }
    }

    fn pipeline(flags: InclusionFlags, subs: Arc<Subs>) -> Pipeline {
        Pipeline::new(flags)
            .with_subtitles(SubtitleAcquirer::new(subs, "en").with_stagger(Duration::ZERO))
            .with_trailer(TrailerAcquirer::new(Arc::new(NoMovies), Arc::new(NeverFetch)))
    }

    fn movie_file(dir: &Path, name: &str) -> MediaFile {
        let path = dir.join(name);
        std::fs::write(&path, vec![7u8; 4096]).unwrap();
        MediaFile {
            path,
            size_bytes: 4096,
        }
    }

    #[tokio::test]
    async fn test_trailer_not_found_does_not_stop_subtitles() {
        let dir = tempfile::tempdir().unwrap();
        let file = movie_file(dir.path(), "Some.Movie.2021.mkv");
        let subs = Arc::new(Subs::default());

        let report = pipeline(InclusionFlags::default(), subs)
            .process_file(file)
            .await;

        assert_eq!(report.movie_name.as_deref(), Some("Some Movie"));
        assert_eq!(report.subtitles.status(), Status::Success);
        assert!(matches!(report.trailer, BranchStatus::NotFound(_)));
        assert_eq!(report.status(), Status::NotFound);
        assert!(dir.path().join("Some.Movie.2021.srt").exists());
    }

    #[tokio::test]
    async fn test_login_happens_once_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let targets = vec![
            Ok(movie_file(dir.path(), "a.mkv")),
            Ok(movie_file(dir.path(), "b.mkv")),
            Ok(movie_file(dir.path(), "c.mkv")),
        ];
        let subs = Arc::new(Subs::default());
        let flags = InclusionFlags::from_cli(true, false);

        let reports = pipeline(flags, subs.clone()).run(targets, dir.path()).await;

        assert_eq!(reports.len(), 3);
        assert_eq!(subs.logins.load(Ordering::SeqCst), 1);
        assert!(reports.iter().all(|r| r.status() == Status::Success));
        assert!(reports.iter().all(|r| matches!(r.trailer, BranchStatus::Skipped)));
    }

    #[tokio::test]
    async fn test_failed_login_is_shared_and_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let targets = vec![
            Ok(movie_file(dir.path(), "a.mkv")),
            Ok(movie_file(dir.path(), "b.mkv")),
        ];
        let subs = Arc::new(Subs {
            reject_login: true,
            ..Default::default()
        });
        let flags = InclusionFlags::from_cli(true, false);

        let reports = pipeline(flags, subs.clone()).run(targets, dir.path()).await;

        assert_eq!(subs.logins.load(Ordering::SeqCst), 1);
        assert!(reports.iter().all(|r| r.status() == Status::Failed));
    }

    #[tokio::test]
    async fn test_selection_error_gets_its_own_report() {
        let dir = tempfile::tempdir().unwrap();
        let targets = vec![
            Err(AcquireError::Io {
                path: "/nope.mkv".into(),
                message: "No such file or directory".into(),
            }),
            Ok(movie_file(dir.path(), "Fine.Film.mkv")),
        ];
        let flags = InclusionFlags::from_cli(true, false);

        let reports = pipeline(flags, Arc::new(Subs::default()))
            .run(targets, dir.path())
            .await;

        assert_eq!(reports[0].path, PathBuf::from("/nope.mkv"));
        assert_eq!(reports[0].status(), Status::Failed);
        assert_eq!(reports[1].status(), Status::Success);
    }

    #[tokio::test]
    async fn test_files_in_one_directory_share_one_trailer() {
        let dir = tempfile::tempdir().unwrap();
        let targets = vec![
            Ok(movie_file(dir.path(), "Alpha.2001.mkv")),
            Ok(movie_file(dir.path(), "Beta.2002.mkv")),
        ];
        let fetcher = Arc::new(SlowFetch::default());
        let trailer_only = Pipeline::new(InclusionFlags::from_cli(false, true))
            .with_trailer(TrailerAcquirer::new(Arc::new(OneMovie), fetcher.clone()));

        let reports = trailer_only.run(targets, dir.path()).await;

        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.max_active.load(Ordering::SeqCst), 1);
        let mut outcomes: Vec<ArtifactOutcome> = reports
            .iter()
            .map(|r| match &r.trailer {
                BranchStatus::Done { artifacts, .. } => artifacts[0].outcome,
                other => panic!("unexpected trailer status: {:?}", other),
            })
            .collect();
        outcomes.sort_by_key(|o| *o == ArtifactOutcome::AlreadyPresent);
        assert_eq!(outcomes, vec![ArtifactOutcome::Downloaded, ArtifactOutcome::AlreadyPresent]);
        assert!(reports.iter().all(|r| r.status() == Status::Success));
    }
}
