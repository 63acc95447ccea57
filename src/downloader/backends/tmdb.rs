use async_trait::async_trait;
use serde::Deserialize;

use crate::downloader::errors::AcquireError;
use crate::downloader::models::{MovieRecord, TrailerCandidate};
use crate::downloader::traits::MetadataProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

/// TMDB v3 client. Accepts either a v3 API key (sent as `api_key` query parameter) or a
/// read access token (a JWT, sent as a bearer header).
pub struct TmdbClient {
    base_url: String,
    credential: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<TmdbMovie>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovie {
    id: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    original_title: Option<String>,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    popularity: Option<f64>,
    #[serde(default)]
    adult: bool,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    results: Vec<TmdbVideo>,
}

#[derive(Debug, Deserialize)]
struct TmdbVideo {
    id: String,
    key: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    site: String,
}

/// Check if the credential is a read access token rather than an API key
fn is_access_token(credential: &str) -> bool {
    credential.starts_with("eyJ")
}

/// Watch URL for a video hosted on a site we can stream from
fn playback_url(site: &str, key: &str) -> Option<String> {
    match site.to_lowercase().as_str() {
        "youtube" => Some(format!("https://www.youtube.com/watch?v={}", key)),
        "vimeo" => Some(format!("https://vimeo.com/{}", key)),
        _ => None,
    }
}

impl TmdbClient {
    pub fn with_base_url(base_url: &str, credential: String, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credential,
            client,
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, AcquireError> {
        let mut request = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(params);

        if is_access_token(&self.credential) {
            request = request.bearer_auth(&self.credential);
        } else {
            request = request.query(&[("api_key", self.credential.as_str())]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AcquireError::Provider(format!(
                "TMDB error ({}): {}",
                status, body
            )));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl MetadataProvider for TmdbClient {
    fn name(&self) -> &'static str {
        "TMDB"
    }

    async fn search_movies(&self, name: &str) -> Result<Vec<MovieRecord>, AcquireError> {
        let response: SearchResponse = self
            .get(
                "/search/movie",
                &[("query", name), ("include_adult", "false")],
            )
            .await?;

        let mut movies: Vec<MovieRecord> = response
            .results
            .into_iter()
            .filter(|m| !m.adult)
            .map(|m| MovieRecord {
                id: m.id,
                title: m.title.or(m.original_title).unwrap_or_default(),
                release_date: m.release_date.filter(|d| !d.is_empty()),
                popularity: m.popularity.unwrap_or(0.0),
            })
            .collect();

        // The search endpoint ranks by relevance; re-rank by popularity, stable on ties
        movies.sort_by(|a, b| {
            b.popularity
                .partial_cmp(&a.popularity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(movies)
    }

    async fn list_videos(
        &self,
        movie: &MovieRecord,
    ) -> Result<Vec<TrailerCandidate>, AcquireError> {
        let path = format!("/movie/{}/videos", movie.id);
        let response: VideosResponse = self.get(&path, &[]).await?;

        Ok(response
            .results
            .into_iter()
            .filter_map(|video| {
                let url = playback_url(&video.site, &video.key);
                if url.is_none() {
                    log::debug!(
                        "[TMDB] Skipping video '{}' hosted on unsupported site '{}'",
                        video.name,
                        video.site
                    );
                }
                Some(TrailerCandidate {
                    id: video.id,
                    title: video.name,
                    playback_url: url?,
                })
            })
            .collect())
    }
}
