//! Daemon - the main assistant service
//!
//! Wires the lexicon, resolver, light controller, music player and system
//! actions together, then turns utterances into dispatched commands.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::dispatch::{Dispatcher, HomeContext, Steps};
use crate::extract::extract;
use crate::lexicon::{CommandKey, Lexicon, normalize_text};
use crate::light::{
    AmplitudeSource, EffectSources, LightController, ScreenColorSource, SerialChannel,
    SerialPortOpener,
};
use crate::music::{FolderPlayer, MusicDomain};
use crate::resolver::Resolver;
use crate::screen::PpmCommandSource;
use crate::speech::{CommandSpeaker, Ducked, LogSpeaker, Responses, Speaker};
use crate::system::{Desktop, SystemDomain};
use crate::voice::{AmplitudeMeter, WakeWordFilter};
use crate::{Config, Error, Result};

/// Identical utterances closer together than this are ignored
pub const REPEAT_WINDOW: Duration = Duration::from_secs(2);

/// Reply to a bare wake word
const LISTENING_REPLY: &str = "слушаю";

/// Drops an utterance identical to the previous one within a short window
///
/// Speech recognition sometimes delivers the same phrase twice; acting on
/// both would toggle repeat back off or skip two tracks.
#[derive(Debug)]
pub struct RepeatGuard {
    last: Option<(String, Instant)>,
    window: Duration,
}

impl Default for RepeatGuard {
    fn default() -> Self {
        Self::new(REPEAT_WINDOW)
    }
}

impl RepeatGuard {
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self { last: None, window }
    }

    /// Returns `true` if `utterance` repeats the previous one within the window;
    /// otherwise records it and returns `false`
    pub fn is_repeat(&mut self, utterance: &str) -> bool {
        self.is_repeat_at(utterance, Instant::now())
    }

    fn is_repeat_at(&mut self, utterance: &str, now: Instant) -> bool {
        if let Some((last, at)) = &self.last {
            if last == utterance && now.duration_since(*at) < self.window {
                return true;
            }
        }
        self.last = Some((utterance.to_string(), now));
        false
    }
}

/// Collaborators the daemon drives
pub struct Components {
    pub lexicon: Arc<Lexicon>,
    pub light: Arc<LightController>,
    pub music: Arc<dyn MusicDomain>,
    pub system: Arc<dyn SystemDomain>,
    /// Speaks replies, already wrapped for ducking
    pub speaker: Arc<dyn Speaker>,
}

/// The assistant daemon
pub struct Daemon {
    lexicon: Arc<Lexicon>,
    resolver: Resolver,
    wake: WakeWordFilter,
    wake_required: bool,
    light: Arc<LightController>,
    speaker: Arc<dyn Speaker>,
    dispatcher: Dispatcher,
    guard: Mutex<RepeatGuard>,
}

impl Daemon {
    /// Build the daemon and its hardware-backed collaborators from config
    ///
    /// # Errors
    ///
    /// Returns error if the lexicon cannot be loaded
    pub async fn new(config: Config) -> Result<Self> {
        let lexicon = match &config.lexicon_path {
            Some(path) => Lexicon::load(path)?,
            None => Lexicon::embedded()?,
        };
        let summary = lexicon.summary();
        tracing::info!(
            actions = summary.actions,
            direct = summary.direct_commands,
            colors = summary.colors,
            palettes = summary.palettes,
            "lexicon loaded"
        );

        let opener = SerialPortOpener::new(config.serial.port.clone(), config.serial.baud)
            .with_timeout(config.serial.timeout)
            .with_settle(config.serial.settle);
        let channel = SerialChannel::new(opener, config.light.channel)?;

        let amplitude: Arc<dyn AmplitudeSource> = Arc::new(AmplitudeMeter::new());
        let screen = PpmCommandSource::from_argv(&config.screen_command)
            .map(|source| Arc::new(source) as Arc<dyn ScreenColorSource>);
        if screen.is_none() {
            tracing::info!("no screen command configured, ambient monitor will idle");
        }
        let sources = EffectSources {
            amplitude: Some(amplitude),
            screen,
        };
        let light = Arc::new(LightController::new(channel, sources, config.light.effects));

        let music_config = config.music.clone();
        let player = tokio::task::spawn_blocking(move || {
            FolderPlayer::new(
                music_config.playlists_dir,
                music_config.default_playlist,
                music_config.shuffle,
            )
        })
        .await
        .map_err(|e| Error::Music(format!("player setup panicked: {e}")))?;
        let music: Arc<dyn MusicDomain> = Arc::new(player);

        let system: Arc<dyn SystemDomain> = Arc::new(Desktop::new(
            config.system.home_url.clone(),
            config.system.search_url.clone(),
            config.system.allow_shutdown,
        ));

        let duck = config.speech.duck_volume;
        let speaker: Arc<dyn Speaker> = match CommandSpeaker::from_argv(&config.speech.command) {
            Some(tts) => Arc::new(Ducked::new(tts, Arc::clone(&music), duck)),
            None => {
                tracing::info!("no speech command configured, replies are logged only");
                Arc::new(Ducked::new(LogSpeaker, Arc::clone(&music), duck))
            }
        };

        let components = Components {
            lexicon: Arc::new(lexicon),
            light,
            music,
            system,
            speaker,
        };
        Ok(Self::from_components(&config, components))
    }

    /// Build the daemon around existing collaborators; must be called inside a tokio runtime
    #[must_use]
    pub fn from_components(config: &Config, components: Components) -> Self {
        let Components {
            lexicon,
            light,
            music,
            system,
            speaker,
        } = components;

        let ctx = HomeContext {
            lexicon: Arc::clone(&lexicon),
            light: Arc::clone(&light),
            music,
            system,
            speaker: Arc::clone(&speaker),
            responses: Responses::new(config.speech.replies.clone()),
            steps: Steps {
                volume: config.music.volume_step,
                brightness: config.light.brightness_step,
            },
            default_playlist: config.music.default_playlist.clone(),
        };

        Self {
            lexicon,
            resolver: Resolver::new(config.resolver),
            wake: WakeWordFilter::new(config.wake.names.clone(), config.wake.threshold),
            wake_required: config.wake.required,
            light,
            speaker,
            dispatcher: Dispatcher::spawn(ctx, config.queue_capacity),
            guard: Mutex::new(RepeatGuard::default()),
        }
    }

    #[must_use]
    pub const fn light(&self) -> &Arc<LightController> {
        &self.light
    }

    /// Handle a raw transcript, honouring the wake word
    ///
    /// Returns the dispatched command, if any.
    pub async fn hear(&self, transcript: &str) -> Option<CommandKey> {
        let command = match self.wake.strip(transcript) {
            Some(command) if command.is_empty() => {
                self.acknowledge().await;
                return None;
            }
            Some(command) => command,
            None if self.wake_required => {
                tracing::debug!(transcript, "not addressed to us");
                return None;
            }
            None => transcript.to_string(),
        };
        self.handle_utterance(&command).await
    }

    /// Resolve an utterance and dispatch the command it names
    ///
    /// Returns the dispatched command, if any.
    pub async fn handle_utterance(&self, utterance: &str) -> Option<CommandKey> {
        let text = normalize_text(utterance);
        if text.is_empty() {
            return None;
        }
        if self.guard.lock().is_repeat(&text) {
            tracing::debug!(utterance = %text, "repeated utterance ignored");
            return None;
        }

        let resolution = self.resolver.resolve(&text, &self.lexicon);
        let Some(command) = resolution.command else {
            tracing::info!(utterance = %text, "no command recognized");
            return None;
        };
        let params = extract(&text, &command, &self.lexicon);
        tracing::info!(
            utterance = %text,
            command = %command,
            confidence = resolution.confidence,
            tier = ?resolution.tier,
            "command recognized"
        );

        self.dispatcher
            .dispatch(command.clone(), params)
            .await
            .then_some(command)
    }

    async fn acknowledge(&self) {
        let speaker = Arc::clone(&self.speaker);
        match tokio::task::spawn_blocking(move || speaker.speak(LISTENING_REPLY)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to acknowledge wake word"),
            Err(e) => tracing::warn!(error = %e, "speaker panicked"),
        }
    }

    /// Read utterances from stdin, one per line, until EOF or Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns error if stdin cannot be read
    pub async fn run(self) -> Result<()> {
        tracing::info!(
            wake_words = ?self.wake.names(),
            wake_required = self.wake_required,
            "assistant listening on stdin"
        );

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let result = loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutdown requested");
                    break Ok(());
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        self.hear(&line).await;
                    }
                    Ok(None) => {
                        tracing::info!("input closed");
                        break Ok(());
                    }
                    Err(e) => break Err(Error::Io(e)),
                }
            }
        };

        self.shutdown().await;
        result
    }

    /// Finish queued commands, stop effects and switch the lights off
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await;
        self.light.shutdown().await;
        tracing::info!("assistant stopped");
    }
}
