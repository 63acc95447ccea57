// Provider backends

pub mod opensubtitles;
pub mod tmdb;

pub use opensubtitles::{OpenSubtitlesClient, OpenSubtitlesCredentials};
pub use tmdb::TmdbClient;
