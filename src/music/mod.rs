//! Music domain
//!
//! The dispatcher only talks to [`MusicDomain`]; [`FolderPlayer`] is the
//! implementation playing MP3 folders from disk.

mod player;
mod playlists;

pub use player::FolderPlayer;
pub use playlists::{PlaylistMatch, best_playlist_match};

use crate::Result;

/// Music player operations the assistant issues
pub trait MusicDomain: Send + Sync {
    /// Start playback, or resume if paused
    ///
    /// # Errors
    ///
    /// Returns error if there is nothing to play
    fn play(&self) -> Result<()>;

    fn pause(&self);

    fn resume(&self);

    /// # Errors
    ///
    /// Returns error if there is nothing to play
    fn next(&self) -> Result<()>;

    /// # Errors
    ///
    /// Returns error if there is nothing to play
    fn previous(&self) -> Result<()>;

    /// Volume in percent
    fn volume(&self) -> u8;

    /// Set volume, clamped to `0..=100`; returns the stored value
    fn set_volume(&self, percent: i64) -> u8;

    /// Flip single-track repeat; returns the new state
    fn toggle_repeat(&self) -> bool;

    /// Whether audio is currently audible (playing and not paused)
    fn is_playing(&self) -> bool;

    /// Switch to the playlist best matching `name`; returns the chosen playlist
    ///
    /// # Errors
    ///
    /// Returns error if no playlist matches
    fn switch_playlist(&self, name: &str) -> Result<String>;

    /// # Errors
    ///
    /// Returns error if the playlist cannot be created
    fn create_playlist(&self, name: &str) -> Result<()>;
}
