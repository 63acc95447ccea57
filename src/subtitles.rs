// Subtitle acquisition: search, cap, then staggered idempotent downloads

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use flate2::read::GzDecoder;
use futures::future::join_all;

use crate::downloader::errors::AcquireError;
use crate::downloader::models::{
    AcquiredArtifact, ArtifactKind, MediaFile, MovieIdentity, Session, SubtitleCandidate,
    SubtitlePayload, SubtitleQuery,
};
use crate::downloader::traits::SubtitleProvider;

/// At most this many subtitles are written per file
pub const MAX_SUBTITLES: usize = 5;

/// Gap between the start of consecutive downloads in a batch
pub const DEFAULT_STAGGER: Duration = Duration::from_secs(1);

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// `<stem>.srt` for the first subtitle, `<stem>.v-<i+2>.srt` for the rest
pub fn subtitle_path(dir: &Path, stem: &str, index: usize) -> PathBuf {
    if index == 0 {
        dir.join(format!("{}.srt", stem))
    } else {
        dir.join(format!("{}.v-{}.srt", stem, index + 2))
    }
}

fn declares_gzip(payload: &SubtitlePayload) -> bool {
    let encoding = payload
        .content_encoding
        .as_deref()
        .map_or(false, |e| e.eq_ignore_ascii_case("gzip"));
    let content_type = payload
        .content_type
        .as_deref()
        .map(|t| t.to_ascii_lowercase())
        .map_or(false, |t| t.contains("gzip"));
    encoding || content_type
}

/// Gunzip when the body is declared (or sniffed) as gzip, otherwise pass it through
pub fn decode_payload(payload: SubtitlePayload) -> Result<Vec<u8>, AcquireError> {
    if !declares_gzip(&payload) && !payload.bytes.starts_with(&GZIP_MAGIC) {
        return Ok(payload.bytes);
    }

    let mut decoded = Vec::new();
    GzDecoder::new(payload.bytes.as_slice())
        .read_to_end(&mut decoded)
        .map_err(|e| AcquireError::Download(format!("Failed to decompress subtitle: {}", e)))?;
    Ok(decoded)
}

pub struct SubtitleAcquirer {
    provider: Arc<dyn SubtitleProvider>,
    language: String,
    stagger: Duration,
}

impl SubtitleAcquirer {
    pub fn new(provider: Arc<dyn SubtitleProvider>, language: impl Into<String>) -> Self {
        Self {
            provider,
            language: language.into(),
            stagger: DEFAULT_STAGGER,
        }
    }

    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    pub fn provider(&self) -> &Arc<dyn SubtitleProvider> {
        &self.provider
    }

    /// Search by fingerprint, falling back to the guessed name. An empty result is
    /// `NotFound`; transport and auth failures come back as `Provider`.
    pub async fn search_subtitles(
        &self,
        session: &Session,
        identity: &MovieIdentity,
        file: &MediaFile,
    ) -> Result<Vec<SubtitleCandidate>, AcquireError> {
        let query = SubtitleQuery {
            fingerprint: Some(identity.fingerprint.to_hex()),
            name: Some(identity.guessed_name.clone()).filter(|n| !n.is_empty()),
            language: self.language.clone(),
        };
        log::debug!(
            "[{}] Searching {} (hash {}, language {})",
            self.provider.name(),
            file.file_name(),
            identity.fingerprint,
            self.language
        );

        let candidates = self.provider.search(session, &query).await?;
        if candidates.is_empty() {
            return Err(AcquireError::NotFound(format!(
                "no {} subtitles for '{}'",
                self.language, identity.guessed_name
            )));
        }
        Ok(candidates)
    }

    /// Download up to [`MAX_SUBTITLES`] candidates next to `file`, one result per
    /// candidate in order. Existing targets are left alone and reported as already present.
    pub async fn acquire(
        &self,
        session: &Session,
        candidates: &[SubtitleCandidate],
        file: &MediaFile,
    ) -> Vec<Result<AcquiredArtifact, AcquireError>> {
        let dir = file.directory();
        let stem = file.stem();

        let downloads = candidates
            .iter()
            .take(MAX_SUBTITLES)
            .enumerate()
            .map(|(index, candidate)| {
                let target = subtitle_path(&dir, &stem, index);
                let delay = self.stagger * index as u32;
                async move {
                    match tokio::fs::try_exists(&target).await {
                        Ok(true) => {
                            log::debug!("Subtitle already present: {}", target.display());
                            return Ok(AcquiredArtifact::already_present(
                                &target,
                                ArtifactKind::Subtitle,
                            ));
                        }
                        Ok(false) => {}
                        Err(e) => return Err(AcquireError::io(&target, e)),
                    }
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    self.download_one(session, candidate, &target).await
                }
            });

        join_all(downloads).await
    }

    async fn download_one(
        &self,
        session: &Session,
        candidate: &SubtitleCandidate,
        target: &Path,
    ) -> Result<AcquiredArtifact, AcquireError> {
        let link = self.provider.resolve_link(session, candidate).await?;
        let payload = self.provider.fetch(&link).await?;
        let body = decode_payload(payload)?;

        tokio::fs::write(target, &body)
            .await
            .map_err(|e| AcquireError::io(target, e))?;

        Ok(AcquiredArtifact::downloaded(target, ArtifactKind::Subtitle))
    }
}
