// Stream failure diagnostics - classifies yt-dlp error output
//
// A failed trailer transfer only gives us stderr text. Turning it into a reason lets the
// report say "video unavailable" instead of dumping a traceback.

/// Why a video host refused or broke a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// HTTP 403 Forbidden - general access denied
    Http403Forbidden,

    /// Rate limiting (429 or similar)
    RateLimited,

    /// Geographic restriction
    GeoBlocked,

    /// Age-restricted content requiring login
    AgeRestricted,

    /// Private video requiring authorization
    PrivateVideo,

    /// Video deleted or unavailable
    VideoUnavailable,

    /// Bot detection triggered
    BotDetection,

    /// Network timeout or refused connection
    NetworkTimeout,

    /// Audio and video were fetched but could not be merged (usually no ffmpeg)
    MergeFailed,

    /// Generic/unknown failure
    Unknown,
}

impl FailureReason {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Http403Forbidden => "Access denied (HTTP 403)",
            Self::RateLimited => "Rate limited by video host",
            Self::GeoBlocked => "Geographic restriction",
            Self::AgeRestricted => "Age-restricted content",
            Self::PrivateVideo => "Private video",
            Self::VideoUnavailable => "Video unavailable",
            Self::BotDetection => "Bot detection triggered",
            Self::NetworkTimeout => "Network timeout",
            Self::MergeFailed => "Could not merge audio and video (is ffmpeg installed?)",
            Self::Unknown => "Unknown failure",
        }
    }
}

/// Analyze error output and return the failure reason
pub fn diagnose_error(error: &str) -> Option<FailureReason> {
    let lower = error.to_lowercase();

    // Check patterns in order of specificity

    if (lower.contains("ffmpeg") && (lower.contains("not installed") || lower.contains("not found")))
        || (lower.contains("merging") && lower.contains("error"))
    {
        return Some(FailureReason::MergeFailed);
    }

    if lower.contains("age-restricted")
        || lower.contains("sign in to confirm your age")
        || lower.contains("age_verification")
    {
        return Some(FailureReason::AgeRestricted);
    }

    if lower.contains("private video")
        || lower.contains("video is private")
        || lower.contains("sign in if you've been granted access")
    {
        return Some(FailureReason::PrivateVideo);
    }

    if lower.contains("video unavailable")
        || lower.contains("video has been removed")
        || lower.contains("this video is no longer available")
        || lower.contains("video is unavailable")
    {
        return Some(FailureReason::VideoUnavailable);
    }

    if lower.contains("available in your country")
        || lower.contains("blocked in your country")
        || lower.contains("geo restriction")
        || lower.contains("geo-restricted")
    {
        return Some(FailureReason::GeoBlocked);
    }

    if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests") {
        return Some(FailureReason::RateLimited);
    }

    if lower.contains("not a bot")
        || lower.contains("captcha")
        || lower.contains("unusual traffic")
    {
        return Some(FailureReason::BotDetection);
    }

    if lower.contains("403") || lower.contains("forbidden") {
        return Some(FailureReason::Http403Forbidden);
    }

    if lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("connection refused")
        || lower.contains("network unreachable")
    {
        return Some(FailureReason::NetworkTimeout);
    }

    if !error.trim().is_empty() {
        return Some(FailureReason::Unknown);
    }

    None
}

/// First line that looks like the actual error, for compact reporting
pub fn error_context(error: &str) -> Option<String> {
    error
        .lines()
        .map(str::trim)
        .find(|line| line.to_lowercase().starts_with("error:"))
        .or_else(|| error.lines().map(str::trim).rfind(|line| !line.is_empty()))
        .map(|s| s.to_string())
}

/// Render stderr as a one-line failure message
pub fn describe_failure(stderr: &str) -> String {
    let reason = diagnose_error(stderr).unwrap_or(FailureReason::Unknown);
    match error_context(stderr) {
        Some(context) => format!("{}: {}", reason.description(), context),
        None => reason.description().to_string(),
    }
}
