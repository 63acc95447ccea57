use async_trait::async_trait;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::downloader::errors::AcquireError;
use crate::downloader::models::{Session, SubtitleCandidate, SubtitlePayload, SubtitleQuery};
use crate::downloader::traits::SubtitleProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.opensubtitles.com/api/v1";

/// Credentials for the OpenSubtitles REST API
#[derive(Debug, Clone)]
pub struct OpenSubtitlesCredentials {
    pub api_key: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Client for the OpenSubtitles REST API.
///
/// Holds no session state of its own: `authenticate` returns a [`Session`] that callers
/// pass back into every search and download.
pub struct OpenSubtitlesClient {
    base_url: String,
    credentials: OpenSubtitlesCredentials,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct SubtitleSearchResponse {
    #[serde(default)]
    data: Vec<SubtitleResult>,
}

#[derive(Debug, Deserialize)]
struct SubtitleResult {
    id: String,
    attributes: SubtitleAttributes,
}

#[derive(Debug, Deserialize)]
struct SubtitleAttributes {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    files: Vec<SubtitleFile>,
}

#[derive(Debug, Deserialize)]
struct SubtitleFile {
    file_id: u64,
    #[serde(default)]
    file_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct DownloadRequest {
    file_id: u64,
}

#[derive(Debug, Deserialize)]
struct DownloadResponse {
    link: String,
}

impl OpenSubtitlesClient {
    pub fn with_base_url(
        base_url: &str,
        credentials: OpenSubtitlesCredentials,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn search_once(
        &self,
        session: &Session,
        params: &[(&str, &str)],
    ) -> Result<Vec<SubtitleCandidate>, AcquireError> {
        let response = self
            .client
            .get(self.url("/subtitles"))
            .header("Api-Key", &session.api_key)
            .query(params)
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        let parsed: SubtitleSearchResponse = serde_json::from_str(&body)?;

        Ok(parsed
            .data
            .into_iter()
            .filter_map(|result| {
                let language = result.attributes.language.unwrap_or_default();
                let file = result.attributes.files.into_iter().next()?;
                Some(SubtitleCandidate {
                    id: result.id,
                    download_ref: file.file_id,
                    language,
                    file_name: file.file_name,
                })
            })
            .collect())
    }
}

#[async_trait]
impl SubtitleProvider for OpenSubtitlesClient {
    fn name(&self) -> &'static str {
        "OpenSubtitles"
    }

    async fn authenticate(&self) -> Result<Session, AcquireError> {
        let (username, password) = match (
            self.credentials.username.as_deref(),
            self.credentials.password.as_deref(),
        ) {
            (Some(user), Some(pass)) => (user, pass),
            _ => {
                log::warn!(
                    "[OpenSubtitles] No login credentials provided - using API key only (limited downloads)"
                );
                return Ok(Session {
                    api_key: self.credentials.api_key.clone(),
                    token: None,
                });
            }
        };

        let response = self
            .client
            .post(self.url("/login"))
            .header("Api-Key", &self.credentials.api_key)
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(|e| AcquireError::Provider(format!("login failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AcquireError::Provider(format!(
                "login rejected ({}): {}",
                status, body
            )));
        }

        let login: LoginResponse = response.json().await?;
        log::info!("[OpenSubtitles] ✓ Successfully authenticated");

        Ok(Session {
            api_key: self.credentials.api_key.clone(),
            token: Some(login.token),
        })
    }

    async fn search(
        &self,
        session: &Session,
        query: &SubtitleQuery,
    ) -> Result<Vec<SubtitleCandidate>, AcquireError> {
        if let Some(hash) = query.fingerprint.as_deref() {
            let found = self
                .search_once(
                    session,
                    &[("moviehash", hash), ("languages", query.language.as_str())],
                )
                .await?;
            if !found.is_empty() {
                log::debug!("[OpenSubtitles] {} results by hash {}", found.len(), hash);
                return Ok(found);
            }
        }

        match query.name.as_deref() {
            Some(name) if !name.is_empty() => {
                let found = self
                    .search_once(session, &[("query", name), ("languages", query.language.as_str())])
                    .await?;
                log::debug!("[OpenSubtitles] {} results by name '{}'", found.len(), name);
                Ok(found)
            }
            _ => Ok(Vec::new()),
        }
    }

    async fn resolve_link(
        &self,
        session: &Session,
        candidate: &SubtitleCandidate,
    ) -> Result<String, AcquireError> {
        let mut request = self
            .client
            .post(self.url("/download"))
            .header("Api-Key", &session.api_key);

        if let Some(token) = &session.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .json(&DownloadRequest {
                file_id: candidate.download_ref,
            })
            .send()
            .await
            .map_err(|e| AcquireError::Download(format!("link request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AcquireError::Download(format!(
                "link for file {} refused ({}): {}",
                candidate.download_ref, status, body
            )));
        }

        let download: DownloadResponse = response
            .json()
            .await
            .map_err(|e| AcquireError::Download(format!("bad link response: {}", e)))?;
        Ok(download.link)
    }

    async fn fetch(&self, link: &str) -> Result<SubtitlePayload, AcquireError> {
        let response = self
            .client
            .get(link)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AcquireError::Download(e.to_string()))?;

        let header = |name: reqwest::header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };
        let content_encoding = header(CONTENT_ENCODING);
        let content_type = header(CONTENT_TYPE);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AcquireError::Download(e.to_string()))?;

        Ok(SubtitlePayload {
            bytes: bytes.to_vec(),
            content_encoding,
            content_type,
        })
    }
}
