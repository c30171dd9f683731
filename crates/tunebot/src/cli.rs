use clap::{Parser, Subcommand};
use tunecore::download::identifier::is_youtube_link;

#[derive(Parser)]
#[command(name = "tunebot")]
#[command(
    author,
    version,
    about = "Fetch songs and videos through the tune bot media pipeline",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Acquire a song as mp3 (or its cached Telegram file id)
    Song {
        /// YouTube link or video id
        link: String,
    },

    /// Acquire a video file
    Video {
        /// YouTube link or video id
        link: String,
    },

    /// Print a local file for the video, or a direct stream URL
    Stream {
        /// YouTube link or video id
        link: String,
    },

    /// List video ids of a playlist
    Playlist {
        /// Playlist link
        #[arg(value_parser = youtube_link)]
        link: String,

        /// Maximum number of entries
        #[arg(short, long, default_value_t = 25)]
        limit: usize,
    },

    /// List downloadable formats
    Formats {
        /// YouTube link or video id
        link: String,
    },

    /// Sum of the reported sizes of every format
    Size {
        /// YouTube link or video id
        link: String,
    },

    /// Show track details
    Info {
        /// YouTube link or video id
        link: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Playlists can only be listed from YouTube.
fn youtube_link(link: &str) -> Result<String, String> {
    if is_youtube_link(link) {
        Ok(link.to_string())
    } else {
        Err(format!("not a YouTube link: {}", link))
    }
}
