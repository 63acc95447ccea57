// Helper functions for backend implementations

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

use crate::downloader::models::NetworkConfig;

/// Extensions of transfers still in flight; never count as a finished artifact
const PARTIAL_EXTENSIONS: &[&str] = &["part", "ytdl", "temp", "tmp"];

/// Run command with timeout (shared utility)
pub async fn run_output_with_timeout(
    program: &str,
    args: Vec<String>,
    timeout_secs: u64,
) -> Result<std::process::Output, String> {
    let mut child = TokioCommand::new(program)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("Failed to start {}: {}", program, e))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| format!("Failed to capture stdout from {}", program))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| format!("Failed to capture stderr from {}", program))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe
            .read_to_end(&mut buf)
            .await
            .map_err(|e| format!("Failed to read stdout: {}", e))?;
        Ok::<Vec<u8>, String>(buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe
            .read_to_end(&mut buf)
            .await
            .map_err(|e| format!("Failed to read stderr: {}", e))?;
        Ok::<Vec<u8>, String>(buf)
    });

    let waited = timeout(Duration::from_secs(timeout_secs), child.wait()).await;
    match waited {
        Ok(status_res) => {
            let status = status_res.map_err(|e| format!("Failed to wait for {}: {}", program, e))?;
            let stdout = stdout_task
                .await
                .map_err(|e| format!("stdout task failed: {}", e))??;
            let stderr = stderr_task
                .await
                .map_err(|e| format!("stderr task failed: {}", e))??;
            Ok(std::process::Output { status, stdout, stderr })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(format!("Timed out after {}s", timeout_secs))
        }
    }
}

/// Build proxy arguments for yt-dlp
pub fn get_proxy_args(config: &NetworkConfig) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(proxy) = &config.proxy {
        args.push("--proxy".to_string());
        args.push(proxy.clone());
    }

    args
}

/// Build timeout arguments for yt-dlp
pub fn get_timeout_args(config: &NetworkConfig) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(timeout) = config.timeout {
        args.push("--socket-timeout".to_string());
        args.push(timeout.to_string());
    }

    args
}

/// Build the shared HTTP client, routed through the configured proxy if any
pub fn build_http_client(
    config: &NetworkConfig,
    user_agent: &str,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder().user_agent(user_agent);

    if let Some(timeout) = config.timeout {
        builder = builder.connect_timeout(Duration::from_secs(timeout as u64));
    }
    if let Some(proxy_url) = config.proxy.as_deref() {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
    }

    builder.build()
}

/// Find a finished file named `<stem>.<any ext>` in `dir`
pub async fn find_by_stem(dir: &Path, stem: &str) -> std::io::Result<Option<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches_stem = path.file_stem().map_or(false, |s| s == stem);
        let partial = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| PARTIAL_EXTENSIONS.contains(&e));
        if matches_stem && !partial && entry.file_type().await?.is_file() {
            return Ok(Some(path));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_args() {
        let config = NetworkConfig {
            proxy: Some("socks5h://127.0.0.1:1080".to_string()),
            timeout: Some(15),
        };
        assert_eq!(
            get_proxy_args(&config),
            vec!["--proxy".to_string(), "socks5h://127.0.0.1:1080".to_string()]
        );
        assert_eq!(
            get_timeout_args(&config),
            vec!["--socket-timeout".to_string(), "15".to_string()]
        );
        assert!(get_proxy_args(&NetworkConfig::default()).is_empty());
    }

    #[tokio::test]
    async fn test_find_by_stem_ignores_partial_and_intermediate_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("_trailer.mp4.part"), b"x").unwrap();
        std::fs::write(dir.path().join("_trailer.f137.mp4"), b"x").unwrap();
        std::fs::write(dir.path().join("_trailer.part"), b"x").unwrap();
        assert_eq!(find_by_stem(dir.path(), "_trailer").await.unwrap(), None);

        std::fs::write(dir.path().join("_trailer.webm"), b"x").unwrap();
        assert_eq!(
            find_by_stem(dir.path(), "_trailer").await.unwrap(),
            Some(dir.path().join("_trailer.webm"))
        );
    }

    #[tokio::test]
    async fn test_find_by_stem_missing_dir_is_none() {
        let found = find_by_stem(Path::new("/no/such/dir/here"), "_trailer")
            .await
            .unwrap();
        assert!(found.is_none());
    }
}
