//! Audio and voice plumbing
//!
//! Microphone loudness for the music-reactive light, MP3 playback for the
//! music player, and the wake-word filter applied to transcripts.

mod capture;
mod playback;
mod wake_word;

pub use capture::{AmplitudeMeter, AmplitudeWindow, SAMPLE_RATE};
pub use playback::{AudioPlayback, DecodedTrack, PlaybackEnd, Transport, decode_mp3};
pub use wake_word::{DEFAULT_THRESHOLD, WakeWordFilter};
