use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "player", version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Path to a TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Playlist store file (JSON)
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Decode in real time without opening an output device
    #[arg(long)]
    pub no_audio: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the player and resume the last session (default)
    Run {
        /// Activate this playlist before starting
        #[arg(long)]
        playlist: Option<String>,
        /// Do not resume the last session
        #[arg(long)]
        fresh: bool,
    },

    /// Add files to a playlist and start playing the first one
    Play {
        /// Audio files to play
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Playlist to add the files to
        #[arg(long, default_value = "Now Playing")]
        playlist: String,
    },

    /// Manage playlists without starting playback
    Playlist {
        #[command(subcommand)]
        action: PlaylistAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum PlaylistAction {
    /// Show all playlists and their tracks
    List,
    /// Create a playlist (named "Playlist N" when no name is given)
    Create { name: Option<String> },
    /// Rename the playlist at INDEX
    Rename { index: usize, name: String },
    /// Delete the playlist at INDEX
    Delete { index: usize },
    /// Append files to the named playlist
    Add { playlist: String, paths: Vec<PathBuf> },
    /// Remove the track at INDEX from the named playlist
    Remove { playlist: String, index: usize },
}
