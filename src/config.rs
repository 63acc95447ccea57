// Runtime configuration from the environment (after an optional .env) and CLI flags

use anyhow::{anyhow, Result};

use crate::cli::Args;
use crate::downloader::backends::{opensubtitles, tmdb, OpenSubtitlesCredentials};
use crate::downloader::models::{InclusionFlags, NetworkConfig};

pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone)]
pub struct Config {
    pub flags: InclusionFlags,
    pub language: String,
    pub user_agent: String,
    /// Present whenever subtitles are enabled
    pub opensubtitles: Option<OpenSubtitlesCredentials>,
    pub opensubtitles_base_url: String,
    /// TMDB API key or read access token; present whenever the trailer is enabled
    pub tmdb_credential: Option<String>,
    pub tmdb_base_url: String,
    pub ytdlp_path: Option<String>,
    pub network: NetworkConfig,
}

fn default_user_agent() -> String {
    format!("subtrailer v{}", env!("CARGO_PKG_VERSION"))
}

impl Config {
    /// Load `.env` (if any) and read the process environment
    pub fn from_env(args: &Args) -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(args, |name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(args: &Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let flags = args.inclusion();

        let opensubtitles = match var("OPENSUBTITLES_API_KEY") {
            Some(api_key) => Some(OpenSubtitlesCredentials {
                api_key,
                username: var("OPENSUBTITLES_USERNAME"),
                password: var("OPENSUBTITLES_PASSWORD"),
            }),
            None if flags.subtitles => {
                return Err(anyhow!(
                    "OPENSUBTITLES_API_KEY environment variable not set (needed for subtitles; use --trailer-only to skip them)"
                ))
            }
            None => None,
        };

        let tmdb_credential = match var("TMDB_API_KEY") {
            Some(key) => Some(key),
            None if flags.trailer => {
                return Err(anyhow!(
                    "TMDB_API_KEY environment variable not set (needed for trailers; use --subtitles-only to skip them)"
                ))
            }
            None => None,
        };

        let language = args
            .language
            .clone()
            .or_else(|| var("SUBTITLE_LANGUAGE"))
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        Ok(Self {
            flags,
            language,
            user_agent: var("OPENSUBTITLES_USER_AGENT").unwrap_or_else(default_user_agent),
            opensubtitles,
            opensubtitles_base_url: var("OPENSUBTITLES_BASE_URL")
                .unwrap_or_else(|| opensubtitles::DEFAULT_BASE_URL.to_string()),
            tmdb_credential,
            tmdb_base_url: var("TMDB_BASE_URL").unwrap_or_else(|| tmdb::DEFAULT_BASE_URL.to_string()),
            ytdlp_path: var("YTDLP_PATH"),
            network: NetworkConfig {
                proxy: var("SUBTRAILER_PROXY"),
                ..NetworkConfig::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(
            &Args::default(),
            lookup(&[("OPENSUBTITLES_API_KEY", "os-key"), ("TMDB_API_KEY", "tmdb-key")]),
        )
        .unwrap();
        assert_eq!(config.language, "en");
        assert!(config.user_agent.starts_with("subtrailer v"));
        assert_eq!(config.opensubtitles_base_url, opensubtitles::DEFAULT_BASE_URL);
        let creds = config.opensubtitles.unwrap();
        assert_eq!(creds.username, None);
        assert_eq!(config.network.proxy, None);
    }

    #[test]
    fn test_missing_credentials_for_enabled_branch() {
        let err = Config::from_lookup(&Args::default(), lookup(&[("TMDB_API_KEY", "k")]))
            .unwrap_err();
        assert!(err.to_string().contains("OPENSUBTITLES_API_KEY"));

        let err = Config::from_lookup(
            &Args::default(),
            lookup(&[("OPENSUBTITLES_API_KEY", "k"), ("TMDB_API_KEY", "  ")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("TMDB_API_KEY"));
    }

    #[test]
    fn test_disabled_branch_needs_no_credentials() {
        let args = Args {
            trailer_only: true,
            ..Args::default()
        };
        let config = Config::from_lookup(&args, lookup(&[("TMDB_API_KEY", "k")])).unwrap();
        assert!(config.opensubtitles.is_none());
        assert!(!config.flags.subtitles);
    }

    #[test]
    fn test_cli_language_beats_env() {
        let args = Args {
            language: Some("de".into()),
            subtitles_only: true,
            ..Args::default()
        };
        let config = Config::from_lookup(
            &args,
            lookup(&[("OPENSUBTITLES_API_KEY", "k"), ("SUBTITLE_LANGUAGE", "fr")]),
        )
        .unwrap();
        assert_eq!(config.language, "de");
    }
}
