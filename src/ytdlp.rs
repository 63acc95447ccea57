use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use crate::downloader::diagnostics::describe_failure;
use crate::downloader::errors::AcquireError;
use crate::downloader::models::{NetworkConfig, VideoProbe};
use crate::downloader::traits::VideoFetcher;
use crate::downloader::utils::{self, run_output_with_timeout};

/// Metadata probes are short; downloads are not time-limited
const PROBE_TIMEOUT_SECS: u64 = 30;

/// Best video plus best audio, falling back to the best single stream
const FORMAT_ARG: &str = "bv*+ba/best";

/// Parse yt-dlp progress line like:
/// [download]   6.2% of ~ 343.72MiB at  420.30KiB/s ETA 12:32 (frag 29/454)
/// Returns (percent, status_string)
fn parse_ytdlp_progress(line: &str) -> Option<(f32, String)> {
    lazy_static::lazy_static! {
        static ref PROGRESS_RE: Regex = Regex::new(
            r"\[download\]\s+(\d+\.?\d*)%\s+of\s+~?\s*(\d+\.?\d*\s*\w+)\s+at\s+(\d+\.?\d*\s*\w+/s)(?:\s+ETA\s+(\S+))?(?:\s+\(frag\s+(\d+)/(\d+)\))?"
        ).unwrap();
        static ref DEST_RE: Regex = Regex::new(r"\[download\]\s+Destination:\s+(.+)").unwrap();
        static ref MERGE_RE: Regex = Regex::new(r"\[Merger?\]\s+Merging").unwrap();
        static ref ALREADY_RE: Regex = Regex::new(r"has already been downloaded").unwrap();
    }

    if let Some(caps) = PROGRESS_RE.captures(line) {
        let percent: f32 = caps.get(1)?.as_str().parse().ok()?;
        let size = caps.get(2).map(|m| m.as_str()).unwrap_or("?");
        let speed = caps.get(3).map(|m| m.as_str()).unwrap_or("?");
        let eta = caps.get(4).map(|m| m.as_str()).unwrap_or("");

        let status = if eta.is_empty() {
            format!("{:.1}% of {} @ {}", percent, size, speed)
        } else {
            format!("{:.1}% of {} @ {} ETA {}", percent, size, speed, eta)
        };
        return Some((percent, status));
    }

    if let Some(caps) = DEST_RE.captures(line) {
        let filename = caps.get(1).map(|m| m.as_str()).unwrap_or("file");
        let short_name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
        return Some((0.0, format!("Starting: {}", short_name)));
    }

    if MERGE_RE.is_match(line) {
        return Some((99.0, "Merging video and audio".to_string()));
    }

    if ALREADY_RE.is_match(line) {
        return Some((100.0, "File already downloaded".to_string()));
    }

    None
}

/// Pull the fields we log out of a `--dump-json` document
fn parse_probe(stdout: &[u8]) -> Result<VideoProbe, AcquireError> {
    let json: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| AcquireError::Download(format!("Failed to parse yt-dlp JSON: {}", e)))?;

    let filesize = json["filesize"]
        .as_u64()
        .or_else(|| json["filesize_approx"].as_u64())
        .or_else(|| json["filesize_approx"].as_f64().map(|f| f as u64));

    Ok(VideoProbe {
        title: json["title"].as_str().unwrap_or("Unknown").to_string(),
        ext: json["ext"].as_str().unwrap_or("mp4").to_string(),
        filesize,
        duration_seconds: json["duration"].as_f64().map(|d| d as u64),
    })
}

fn is_youtube(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.contains("youtube.com") || lower.contains("youtu.be")
}

/// Streams trailers to disk through the yt-dlp binary
pub struct YtDlpFetcher {
    binary: Option<String>,
    network: NetworkConfig,
}

impl YtDlpFetcher {
    /// `binary` is `None` when no yt-dlp could be found; every call then fails cleanly
    pub fn new(binary: Option<String>, network: NetworkConfig) -> Self {
        Self { binary, network }
    }

    fn binary(&self) -> Result<&str, AcquireError> {
        self.binary.as_deref().ok_or_else(|| {
            AcquireError::Download("yt-dlp is not installed (set YTDLP_PATH)".to_string())
        })
    }

    fn network_args(&self) -> Vec<String> {
        let mut args = utils::get_proxy_args(&self.network);
        args.extend(utils::get_timeout_args(&self.network));
        args
    }

    fn download_args(&self, url: &str, dest_dir: &Path, file_stem: &str) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            FORMAT_ARG.to_string(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "--no-playlist".to_string(),
            "--newline".to_string(),
            "--no-update".to_string(),
            "--retries".to_string(),
            "5".to_string(),
            "--fragment-retries".to_string(),
            "50".to_string(),
            "-P".to_string(),
            dest_dir.display().to_string(),
            "-o".to_string(),
            format!("{}.%(ext)s", file_stem),
        ];
        if is_youtube(url) {
            // Helps when IPv6 ranges are throttled by the CDN
            args.push("--force-ipv4".to_string());
        }
        args.extend(self.network_args());
        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl VideoFetcher for YtDlpFetcher {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn probe(&self, url: &str) -> Result<VideoProbe, AcquireError> {
        let binary = self.binary()?;

        // Multi-client first for YouTube; plain extraction as fallback
        let mut clients: Vec<Option<&str>> = Vec::new();
        if is_youtube(url) {
            clients.push(Some("web,web_safari,ios"));
        }
        clients.push(None);

        let mut last_error = String::new();
        for client in clients {
            let mut args = vec![
                "--dump-json".to_string(),
                "--no-playlist".to_string(),
                "--no-warnings".to_string(),
                "-f".to_string(),
                FORMAT_ARG.to_string(),
            ];
            if let Some(client) = client {
                args.push("--extractor-args".to_string());
                args.push(format!("youtube:player_client={}", client));
            }
            args.extend(self.network_args());
            args.push(url.to_string());

            match run_output_with_timeout(binary, args, PROBE_TIMEOUT_SECS).await {
                Ok(output) if output.status.success() => {
                    log::debug!(
                        "[yt-dlp] Info fetched with client: {}",
                        client.unwrap_or("default")
                    );
                    return parse_probe(&output.stdout);
                }
                Ok(output) => last_error = String::from_utf8_lossy(&output.stderr).to_string(),
                Err(e) => last_error = e,
            }
        }

        Err(AcquireError::Download(describe_failure(&last_error)))
    }

    async fn fetch_to(
        &self,
        url: &str,
        dest_dir: &Path,
        file_stem: &str,
    ) -> Result<PathBuf, AcquireError> {
        let binary = self.binary()?;
        let args = self.download_args(url, dest_dir, file_stem);
        log::debug!("[yt-dlp] {} {}", binary, args.join(" "));

        let mut child = Command::new(binary)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AcquireError::Download(format!("Failed to start yt-dlp: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AcquireError::Download("Failed to capture stdout".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| AcquireError::Download("Failed to capture stderr".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some((_, status)) = parse_ytdlp_progress(&line) {
                log::debug!("[yt-dlp] {}", status);
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| AcquireError::Download(format!("Process error: {}", e)))?;
        let stderr_output = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(AcquireError::Download(describe_failure(&stderr_output)));
        }

        utils::find_by_stem(dest_dir, file_stem)
            .await
            .map_err(|e| AcquireError::io(dest_dir, e))?
            .ok_or_else(|| {
                AcquireError::Download(format!(
                    "yt-dlp reported success but no {}.* file exists in {}",
                    file_stem,
                    dest_dir.display()
                ))
            })
    }
}
