//! Spoken replies
//!
//! [`Speaker`] is the output side of the assistant. [`Ducked`] lowers the
//! music while a reply is spoken and restores it afterwards.

use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::music::MusicDomain;
use crate::{Error, Result};

/// Replies used when an action succeeded and has nothing specific to say
pub const POSITIVE_REPLIES: &[&str] = &["хорошо", "сделано", "готово"];

/// Volume used while speaking over loud music
pub const DEFAULT_DUCK_VOLUME: u8 = 10;

/// Says a reply out loud; blocks until done
pub trait Speaker: Send + Sync {
    /// # Errors
    ///
    /// Returns error if the speech backend failed
    fn speak(&self, text: &str) -> Result<()>;
}

/// Writes replies to the log only
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn speak(&self, text: &str) -> Result<()> {
        tracing::info!(reply = text, "speaking");
        Ok(())
    }
}

/// Pipes each reply to the stdin of an external TTS program
#[derive(Debug, Clone)]
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
}

impl CommandSpeaker {
    /// Build from an argv list; `None` if it is empty
    #[must_use]
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl Speaker for CommandSpeaker {
    fn speak(&self, text: &str) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Speech(format!("failed to spawn {}: {e}", self.program)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .map_err(|e| Error::Speech(format!("failed to write to tts stdin: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Error::Speech(format!("tts failed: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Speech(format!("tts exited with {}: {stderr}", output.status)));
        }
        Ok(())
    }
}

/// Lowers music volume for the duration of each reply
pub struct Ducked<S> {
    inner: S,
    music: Arc<dyn MusicDomain>,
    duck_volume: u8,
}

impl<S: Speaker> Ducked<S> {
    pub fn new(inner: S, music: Arc<dyn MusicDomain>, duck_volume: u8) -> Self {
        Self {
            inner,
            music,
            duck_volume,
        }
    }

    /// Volume to use while speaking over music at `volume`
    #[must_use]
    pub fn ducked_volume(&self, volume: u8) -> u8 {
        if volume <= self.duck_volume {
            (volume / 5).max(1)
        } else {
            self.duck_volume
        }
    }
}

impl<S: Speaker> Speaker for Ducked<S> {
    fn speak(&self, text: &str) -> Result<()> {
        if !self.music.is_playing() {
            return self.inner.speak(text);
        }

        let original = self.music.volume();
        let lowered = self.ducked_volume(original);
        tracing::debug!(original, lowered, "ducking music");
        self.music.set_volume(i64::from(lowered));
        let result = self.inner.speak(text);
        self.music.set_volume(i64::from(original));
        result
    }
}

/// Pool of short positive replies
#[derive(Debug, Clone)]
pub struct Responses {
    positive: Vec<String>,
}

impl Default for Responses {
    fn default() -> Self {
        Self {
            positive: POSITIVE_REPLIES.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Responses {
    /// Use a custom pool; an empty list falls back to the defaults
    #[must_use]
    pub fn new(positive: Vec<String>) -> Self {
        if positive.is_empty() {
            Self::default()
        } else {
            Self { positive }
        }
    }

    /// A random positive reply
    #[must_use]
    pub fn positive(&self) -> &str {
        self.positive
            .choose(&mut rand::thread_rng())
            .map_or(POSITIVE_REPLIES[0], String::as_str)
    }
}
