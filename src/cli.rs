use std::path::PathBuf;

use clap::Parser;

use crate::downloader::models::InclusionFlags;

/// Download subtitles for a movie file. Can also download its trailer.
///
/// Without file operands, the largest file in the current directory is used.
#[derive(Parser, Debug, Clone, Default)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Movie files to process
    pub files: Vec<PathBuf>,

    /// Only fetch subtitles
    #[arg(short, long)]
    pub subtitles_only: bool,

    /// Only fetch the trailer
    #[arg(short, long)]
    pub trailer_only: bool,

    /// Subtitle language code (overrides SUBTITLE_LANGUAGE)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Debug logging, including yt-dlp progress
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn inclusion(&self) -> InclusionFlags {
        InclusionFlags::from_cli(self.subtitles_only, self.trailer_only)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags_and_operands() {
        let args = Args::parse_from(["subtrailer", "-t", "-l", "fr", "a.mkv", "b.avi"]);
        assert_eq!(args.files, vec![PathBuf::from("a.mkv"), PathBuf::from("b.avi")]);
        assert_eq!(args.language.as_deref(), Some("fr"));
        assert!(!args.inclusion().subtitles);
        assert!(args.inclusion().trailer);
    }

    #[test]
    fn test_both_only_flags_run_both_branches() {
        let args = Args::parse_from(["subtrailer", "--subtitles-only", "--trailer-only"]);
        assert!(args.files.is_empty());
        assert_eq!(args.inclusion(), InclusionFlags::default());
    }
}
