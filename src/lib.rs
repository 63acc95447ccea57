pub mod cli;
pub mod config;
pub mod downloader;
pub mod identity;
pub mod selector;
pub mod subtitles;
pub mod trailer;
pub mod ytdlp;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use cli::Args;
use config::Config;
use downloader::backends::{OpenSubtitlesClient, TmdbClient};
use downloader::models::FileReport;
use downloader::orchestrator::{log_summary, Pipeline};
use downloader::tools::ToolManager;
use downloader::utils::build_http_client;
use subtitles::SubtitleAcquirer;
use trailer::TrailerAcquirer;
use ytdlp::YtDlpFetcher;

/// Install the env_logger backend. `RUST_LOG` wins over `--verbose`.
pub fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "info,subtrailer=debug,subtrailer_lib=debug"
    } else {
        "info"
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_target(false)
        .try_init();
}

/// Wire the providers selected by `config` into a pipeline
pub fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let http = build_http_client(&config.network, &config.user_agent)
        .context("Failed to build HTTP client")?;

    let mut pipeline = Pipeline::new(config.flags);

    if let Some(credentials) = config.opensubtitles.clone().filter(|_| config.flags.subtitles) {
        let client =
            OpenSubtitlesClient::with_base_url(&config.opensubtitles_base_url, credentials, http.clone());
        pipeline = pipeline.with_subtitles(SubtitleAcquirer::new(Arc::new(client), &config.language));
    }

    if let Some(credential) = config.tmdb_credential.clone().filter(|_| config.flags.trailer) {
        let tools = ToolManager::new(config.ytdlp_path.clone());
        let fetcher = YtDlpFetcher::new(tools.report(), config.network.clone());
        let metadata = TmdbClient::with_base_url(&config.tmdb_base_url, credential, http);
        pipeline = pipeline.with_trailer(TrailerAcquirer::new(Arc::new(metadata), Arc::new(fetcher)));
    }

    Ok(pipeline)
}

/// Select, identify and acquire for every target under `dir`
pub async fn run_in(args: &Args, config: &Config, dir: &Path) -> Result<Vec<FileReport>> {
    let pipeline = build_pipeline(config)?;
    let targets = selector::select_targets(&args.files, dir).await;
    let reports = pipeline.run(targets, dir).await;
    log_summary(&reports);
    Ok(reports)
}

/// CLI entry. Per-file failures are reported, not returned; only startup problems are errors.
pub async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose);
    let config = Config::from_env(&args)?;
    run_in(&args, &config, Path::new(".")).await?;
    Ok(())
}
