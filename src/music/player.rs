//! Folder-based music player
//!
//! Each playlist is a directory of `.mp3` files under the playlists root.
//! Tracks play one after another on a dedicated thread; transport changes
//! (pause, volume, skip) go through the shared [`Transport`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use rand::seq::SliceRandom;

use super::{MusicDomain, best_playlist_match};
use crate::voice::{AudioPlayback, PlaybackEnd, Transport};
use crate::{Error, Result};

/// Initial volume in percent
const DEFAULT_VOLUME: u8 = 50;

#[derive(Debug, Default)]
struct Queue {
    playlist: String,
    tracks: Vec<PathBuf>,
    index: usize,
    repeat: bool,
    playing: bool,
}

impl Queue {
    fn step(&mut self, forward: bool) {
        let len = self.tracks.len();
        if len == 0 {
            return;
        }
        self.index = if forward {
            (self.index + 1) % len
        } else {
            (self.index + len - 1) % len
        };
    }

    fn current(&self) -> Option<PathBuf> {
        self.tracks.get(self.index).cloned()
    }
}

struct Shared {
    queue: Mutex<Queue>,
    transport: Arc<Transport>,
    stopping: AtomicBool,
}

impl Shared {
    /// Move to the neighbouring track and cut the current one short
    fn request_skip(&self, forward: bool) -> Result<()> {
        let mut queue = self.queue.lock();
        if queue.tracks.is_empty() {
            return Err(Error::Music(format!("playlist {} is empty", queue.playlist)));
        }
        queue.step(forward);
        queue.playing = true;
        self.transport.set_paused(false);
        self.transport.interrupt();
        Ok(())
    }

    /// The current track ran to its end
    ///
    /// A skip that arrived as the track ended has already moved the index;
    /// its interrupt is consumed instead of advancing again.
    fn track_finished(&self) {
        let mut queue = self.queue.lock();
        if self.transport.take_interrupt() || queue.repeat {
            return;
        }
        queue.step(true);
    }

    /// The current track could not be played; `false` once every track failed
    fn track_failed(&self, failures: usize) -> bool {
        let mut queue = self.queue.lock();
        if failures >= queue.tracks.len() {
            tracing::error!(playlist = %queue.playlist, "no playable tracks");
            return false;
        }
        if !self.transport.take_interrupt() {
            queue.step(true);
        }
        true
    }
}

/// Plays playlists stored as directories of MP3 files
pub struct FolderPlayer {
    root: PathBuf,
    default_playlist: String,
    shuffle: bool,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for FolderPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderPlayer")
            .field("root", &self.root)
            .field("default_playlist", &self.default_playlist)
            .finish_non_exhaustive()
    }
}

impl FolderPlayer {
    /// Create a player and load the default playlist (missing folders just mean no tracks)
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, default_playlist: impl Into<String>, shuffle: bool) -> Self {
        let player = Self {
            root: root.into(),
            default_playlist: default_playlist.into(),
            shuffle,
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue::default()),
                transport: Arc::new(Transport::new(DEFAULT_VOLUME)),
                stopping: AtomicBool::new(false),
            }),
            worker: Mutex::new(None),
        };

        match player.load_tracks(&player.default_playlist) {
            Ok(tracks) => {
                let mut queue = player.shared.queue.lock();
                queue.playlist.clone_from(&player.default_playlist);
                queue.tracks = tracks;
            }
            Err(e) => tracing::warn!(error = %e, "default playlist unavailable"),
        }
        player
    }

    /// Directory names under the playlists root, sorted
    ///
    /// # Errors
    ///
    /// Returns error if the root cannot be read
    pub fn playlists(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Name of the loaded playlist
    #[must_use]
    pub fn current_playlist(&self) -> String {
        self.shared.queue.lock().playlist.clone()
    }

    /// Number of tracks in the loaded playlist
    #[must_use]
    pub fn track_count(&self) -> usize {
        self.shared.queue.lock().tracks.len()
    }

    fn load_tracks(&self, playlist: &str) -> Result<Vec<PathBuf>> {
        let dir = self.root.join(playlist);
        let mut tracks = mp3_files(&dir)?;
        if self.shuffle {
            tracks.shuffle(&mut rand::thread_rng());
        } else {
            tracks.sort();
        }
        tracing::info!(playlist, tracks = tracks.len(), "playlist loaded");
        Ok(tracks)
    }

    /// Make sure the playback thread is running
    fn ensure_worker(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(());
        }
        if let Some(old) = worker.take() {
            let _ = old.join();
        }

        self.shared.stopping.store(false, Ordering::SeqCst);
        self.shared.transport.take_interrupt();
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("music-player".into())
            .spawn(move || playback_loop(&shared))?;
        *worker = Some(handle);
        Ok(())
    }

    /// Stop playback and wait for the thread
    pub fn stop(&self) {
        self.shared.stopping.store(true, Ordering::SeqCst);
        self.shared.transport.interrupt();
        self.shared.transport.set_paused(false);
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                tracing::warn!("music thread panicked");
            }
        }
        self.shared.queue.lock().playing = false;
    }

    fn skip(&self, forward: bool) -> Result<()> {
        self.shared.request_skip(forward)?;
        self.ensure_worker()
    }
}

impl MusicDomain for FolderPlayer {
    fn play(&self) -> Result<()> {
        if self.shared.transport.is_paused() {
            self.resume();
            return Ok(());
        }
        {
            let mut queue = self.shared.queue.lock();
            if queue.tracks.is_empty() {
                return Err(Error::Music(format!("playlist {} is empty", queue.playlist)));
            }
            queue.playing = true;
        }
        self.ensure_worker()
    }

    fn pause(&self) {
        if self.shared.queue.lock().playing {
            self.shared.transport.set_paused(true);
            tracing::info!("music paused");
        }
    }

    fn resume(&self) {
        if self.shared.transport.is_paused() {
            self.shared.transport.set_paused(false);
            tracing::info!("music resumed");
        }
    }

    fn next(&self) -> Result<()> {
        self.skip(true)
    }

    fn previous(&self) -> Result<()> {
        self.skip(false)
    }

    fn volume(&self) -> u8 {
        self.shared.transport.volume()
    }

    fn set_volume(&self, percent: i64) -> u8 {
        let value = u8::try_from(percent.clamp(0, 100)).unwrap_or(100);
        self.shared.transport.set_volume(value);
        tracing::info!(volume = value, "volume set");
        value
    }

    fn toggle_repeat(&self) -> bool {
        let mut queue = self.shared.queue.lock();
        queue.repeat = !queue.repeat;
        tracing::info!(repeat = queue.repeat, "repeat toggled");
        queue.repeat
    }

    fn is_playing(&self) -> bool {
        self.shared.queue.lock().playing && !self.shared.transport.is_paused()
    }

    fn switch_playlist(&self, name: &str) -> Result<String> {
        let chosen = if name.trim().to_lowercase() == self.default_playlist.to_lowercase() {
            self.default_playlist.clone()
        } else {
            let available = self.playlists()?;
            best_playlist_match(name, &available)
                .map(|m| {
                    tracing::debug!(requested = name, chosen = %m.name, score = m.score, "playlist matched");
                    m.name
                })
                .ok_or_else(|| Error::Music(format!("no playlist matches {name}")))?
        };

        let tracks = self.load_tracks(&chosen)?;
        self.stop();
        {
            let mut queue = self.shared.queue.lock();
            queue.playlist.clone_from(&chosen);
            queue.tracks = tracks;
            queue.index = 0;
        }
        self.play()?;
        Ok(chosen)
    }

    fn create_playlist(&self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(Error::Music(format!("invalid playlist name: {name:?}")));
        }
        std::fs::create_dir_all(self.root.join(name))?;
        tracing::info!(playlist = name, "playlist created");
        Ok(())
    }
}

impl Drop for FolderPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn mp3_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut tracks = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_mp3 = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"));
        if is_mp3 && path.is_file() {
            tracks.push(path);
        }
    }
    Ok(tracks)
}

fn playback_loop(shared: &Shared) {
    let mut failures = 0usize;

    loop {
        if shared.stopping.load(Ordering::SeqCst) {
            break;
        }
        let Some(track) = shared.queue.lock().current() else {
            break;
        };

        tracing::info!(track = %track.display(), "playing");
        match AudioPlayback::play_file(&track, &shared.transport) {
            Ok(PlaybackEnd::Finished) => {
                failures = 0;
                shared.track_finished();
            }
            Ok(PlaybackEnd::Interrupted) => failures = 0,
            Err(e) => {
                tracing::warn!(track = %track.display(), error = %e, "track failed");
                failures += 1;
                if !shared.track_failed(failures) {
                    break;
                }
            }
        }
    }

    shared.queue.lock().playing = false;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (playlist, tracks) in [("всякое", 3), ("рок", 2), ("джаз", 0)] {
            let folder = dir.path().join(playlist);
            std::fs::create_dir_all(&folder).unwrap();
            for i in 0..tracks {
                std::fs::write(folder.join(format!("{i}.mp3")), b"").unwrap();
            }
            std::fs::write(folder.join("cover.jpg"), b"").unwrap();
        }
        dir
    }

    #[test]
    fn test_loads_default_playlist() {
        let dir = library();
        let player = FolderPlayer::new(dir.path(), "всякое", true);
        assert_eq!(player.current_playlist(), "всякое");
        assert_eq!(player.track_count(), 3);
        assert_eq!(player.playlists().unwrap(), ["всякое", "джаз", "рок"]);
    }

    #[test]
    fn test_volume_clamped() {
        let dir = library();
        let player = FolderPlayer::new(dir.path(), "всякое", false);
        assert_eq!(player.volume(), DEFAULT_VOLUME);
        assert_eq!(player.set_volume(130), 100);
        assert_eq!(player.set_volume(-4), 0);
        assert_eq!(player.volume(), 0);
    }

    #[test]
    fn test_repeat_toggles() {
        let dir = library();
        let player = FolderPlayer::new(dir.path(), "всякое", false);
        assert!(player.toggle_repeat());
        assert!(!player.toggle_repeat());
    }

    #[test]
    fn test_empty_playlist_cannot_play() {
        let dir = library();
        let player = FolderPlayer::new(dir.path(), "джаз", false);
        assert!(player.play().is_err());
        assert!(player.next().is_err());
        assert!(!player.is_playing());
    }

    #[test]
    fn test_create_playlist() {
        let dir = library();
        let player = FolderPlayer::new(dir.path(), "всякое", false);
        player.create_playlist("для бега").unwrap();
        assert!(dir.path().join("для бега").is_dir());
        assert!(player.create_playlist("../x").is_err());
        assert!(player.create_playlist("  ").is_err());
    }

    fn shared_with(tracks: usize) -> Shared {
        Shared {
            queue: Mutex::new(Queue {
                tracks: (0..tracks).map(|i| PathBuf::from(format!("{i}.mp3"))).collect(),
                ..Queue::default()
            }),
            transport: Arc::new(Transport::new(DEFAULT_VOLUME)),
            stopping: AtomicBool::new(false),
        }
    }

    #[test]
    fn test_track_end_advances() {
        let shared = shared_with(3);
        shared.track_finished();
        assert_eq!(shared.queue.lock().index, 1);

        shared.queue.lock().repeat = true;
        shared.track_finished();
        assert_eq!(shared.queue.lock().index, 1);
    }

    #[test]
    fn test_skip_as_track_ends_advances_once() {
        let shared = shared_with(3);
        shared.request_skip(true).unwrap();
        shared.track_finished();
        assert_eq!(shared.queue.lock().index, 1);
        assert!(!shared.transport.take_interrupt());

        shared.request_skip(false).unwrap();
        assert!(shared.track_failed(1));
        assert_eq!(shared.queue.lock().index, 0);
        assert!(!shared.track_failed(3));
    }

    #[test]
    fn test_queue_wraps() {
        let mut queue = Queue {
            tracks: vec!["a".into(), "b".into(), "c".into()],
            ..Queue::default()
        };
        queue.step(false);
        assert_eq!(queue.index, 2);
        queue.step(true);
        assert_eq!(queue.index, 0);
    }
}
