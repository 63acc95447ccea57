use std::path::Path;
use std::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "--version",
            ToolType::Ffmpeg => "-version", // ffmpeg takes a single dash
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<String>,
    pub is_available: bool,
}

/// Locates the external binaries the trailer branch shells out to
pub struct ToolManager {
    ytdlp_override: Option<String>,
}

impl ToolManager {
    pub fn new(ytdlp_override: Option<String>) -> Self {
        Self { ytdlp_override }
    }

    pub fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let (path, version) = self.detect_tool(tool_type);

        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            is_available: path.is_some(),
            version,
            path,
        }
    }

    pub fn get_all_tools(&self) -> Vec<ToolInfo> {
        vec![
            self.get_tool_info(ToolType::YtDlp),
            self.get_tool_info(ToolType::Ffmpeg),
        ]
    }

    /// Log what was found. A missing yt-dlp is reported later by the trailer branch itself.
    pub fn report(&self) -> Option<String> {
        let mut ytdlp_path = None;
        for tool in self.get_all_tools() {
            match (&tool.path, tool.tool_type) {
                (Some(path), ToolType::YtDlp) => {
                    log::info!(
                        "[Tools] yt-dlp {} at {}",
                        tool.version.as_deref().unwrap_or("(unknown version)"),
                        path
                    );
                    ytdlp_path = Some(path.clone());
                }
                (Some(path), ToolType::Ffmpeg) => {
                    log::debug!("[Tools] ffmpeg at {}", path);
                }
                (None, ToolType::YtDlp) => {
                    log::warn!("[Tools] yt-dlp not found; trailer downloads will fail");
                }
                (None, ToolType::Ffmpeg) => {
                    log::warn!("[Tools] ffmpeg not found; merging audio and video may fail");
                }
            }
        }
        ytdlp_path
    }

    fn detect_tool(&self, tool_type: ToolType) -> (Option<String>, Option<String>) {
        let binary_name = tool_type.as_str();

        // 0. Explicit override
        if tool_type == ToolType::YtDlp {
            if let Some(path) = self.ytdlp_override.as_deref() {
                let version = get_version(path, tool_type);
                return (Some(path.to_string()), version);
            }
        }

        // 1. Try common paths first
        let common_paths = [
            format!("/opt/homebrew/bin/{}", binary_name),
            format!("/usr/local/bin/{}", binary_name),
            format!("/usr/bin/{}", binary_name),
        ];

        for path in common_paths {
            if Path::new(&path).exists() {
                let version = get_version(&path, tool_type);
                return (Some(path), version);
            }
        }

        // 2. Try PATH
        if let Ok(output) = Command::new("which").arg(binary_name).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    let version = get_version(&path, tool_type);
                    return (Some(path), version);
                }
            }
        }

        (None, None)
    }
}

fn get_version(path: &str, tool_type: ToolType) -> Option<String> {
    match Command::new(path).arg(tool_type.version_arg()).output() {
        Ok(output) if output.status.success() => {
            parse_version(&String::from_utf8_lossy(&output.stdout))
        }
        _ => None,
    }
}

/// First non-empty line; ffmpeg prints a banner after it
fn parse_version(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|l| l.to_string())
}
