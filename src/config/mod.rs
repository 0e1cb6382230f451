//! Configuration management for the assistant
//!
//! Values are layered env > TOML file > defaults.

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::light::{ChannelSettings, LightSettings};
use crate::resolver::ResolverSettings;
use crate::speech::DEFAULT_DUCK_VOLUME;
use crate::system::{DEFAULT_HOME_URL, DEFAULT_SEARCH_URL};
use crate::voice::DEFAULT_THRESHOLD;
use crate::{Error, Result};

use file::DomovoyConfigFile;

/// Assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// LED controller connection
    pub serial: SerialConfig,

    /// Light control tuning
    pub light: LightConfig,

    /// Fuzzy matching thresholds
    pub resolver: ResolverSettings,

    /// Lexicon file overriding the embedded one
    pub lexicon_path: Option<PathBuf>,

    pub music: MusicConfig,

    pub system: SystemConfig,

    pub speech: SpeechConfig,

    pub wake: WakeConfig,

    /// Capacity of each per-domain command queue
    pub queue_capacity: usize,

    /// Screenshot command for the ambient monitor (empty disables it)
    pub screen_command: Vec<String>,
}

/// Serial connection configuration
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub port: String,
    pub baud: u32,
    pub timeout: Duration,
    pub settle: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port().to_string(),
            baud: crate::light::serial::DEFAULT_BAUD,
            timeout: crate::light::serial::DEFAULT_TIMEOUT,
            settle: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LightConfig {
    /// Brightness change per "ярче"/"тусклее"
    pub brightness_step: i64,
    pub channel: ChannelSettings,
    pub effects: LightSettings,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            brightness_step: 10,
            channel: ChannelSettings::default(),
            effects: LightSettings::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MusicConfig {
    pub playlists_dir: PathBuf,
    pub default_playlist: String,
    pub volume_step: i64,
    pub shuffle: bool,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            playlists_dir: default_playlists_dir(),
            default_playlist: "всякое".to_string(),
            volume_step: 10,
            shuffle: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SystemConfig {
    pub home_url: String,
    pub search_url: String,
    pub allow_shutdown: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            home_url: DEFAULT_HOME_URL.to_string(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            allow_shutdown: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// External TTS argv; empty means replies are only logged
    pub command: Vec<String>,
    pub duck_volume: u8,
    pub replies: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            duck_volume: DEFAULT_DUCK_VOLUME,
            replies: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WakeConfig {
    pub names: Vec<String>,
    pub threshold: u8,
    pub required: bool,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            names: vec!["геля".to_string(), "ангелина".to_string()],
            threshold: DEFAULT_THRESHOLD,
            required: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            light: LightConfig::default(),
            resolver: ResolverSettings::default(),
            lexicon_path: None,
            music: MusicConfig::default(),
            system: SystemConfig::default(),
            speech: SpeechConfig::default(),
            wake: WakeConfig::default(),
            queue_capacity: 16,
            screen_command: Vec::new(),
        }
    }
}

#[cfg(target_os = "windows")]
const fn default_serial_port() -> &'static str {
    "COM3"
}

#[cfg(target_os = "macos")]
const fn default_serial_port() -> &'static str {
    "/dev/cu.usbserial-0001"
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const fn default_serial_port() -> &'static str {
    "/dev/ttyUSB0"
}

/// Default playlists root: `~/.local/share/domovoy/playlists`
fn default_playlists_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("playlists"),
        |d| d.data_dir().join("domovoy").join("playlists"),
    )
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

impl Config {
    /// Load configuration from the standard file location and environment
    ///
    /// # Errors
    ///
    /// Returns error if an environment override is malformed
    pub fn load() -> Result<Self> {
        Self::load_with_options(None)
    }

    /// Load configuration, optionally from an explicit file
    ///
    /// An explicit file must exist and parse; the standard location falls
    /// back to defaults with a warning.
    ///
    /// # Errors
    ///
    /// Returns error if the explicit file cannot be loaded or an environment
    /// override is malformed
    pub fn load_with_options(path: Option<&Path>) -> Result<Self> {
        let fc = match path {
            Some(path) => file::read_config_file(path)
                .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?,
            None => file::load_config_file(),
        };
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Merge a parsed file with environment overrides supplied by `env`
    ///
    /// # Errors
    ///
    /// Returns error if an environment override is malformed
    pub fn from_sources(fc: DomovoyConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        // Serial (env > toml > default)
        let baud = match env("DOMOVOY_SERIAL_BAUD") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("DOMOVOY_SERIAL_BAUD is not a number: {raw}")))?,
            None => fc.serial.baud.unwrap_or(defaults.serial.baud),
        };
        let serial = SerialConfig {
            port: env("DOMOVOY_SERIAL_PORT")
                .or(fc.serial.port)
                .unwrap_or(defaults.serial.port),
            baud,
            timeout: fc
                .serial
                .timeout_ms
                .map_or(defaults.serial.timeout, Duration::from_millis),
            settle: fc
                .serial
                .settle_ms
                .map_or(defaults.serial.settle, Duration::from_millis),
        };

        let light = LightConfig {
            brightness_step: fc
                .light
                .brightness_step
                .unwrap_or(defaults.light.brightness_step),
            channel: ChannelSettings {
                off_repeats: fc
                    .light
                    .force_off_repeats
                    .unwrap_or(defaults.light.channel.off_repeats),
                off_spacing: fc
                    .light
                    .force_off_spacing_ms
                    .map_or(defaults.light.channel.off_spacing, Duration::from_millis),
            },
            effects: LightSettings {
                amplitude_ceiling: fc
                    .audio
                    .amplitude_ceiling
                    .filter(|c| *c > 0.0)
                    .unwrap_or(defaults.light.effects.amplitude_ceiling),
                ..defaults.light.effects
            },
        };

        let lexicon_path = env("DOMOVOY_LEXICON")
            .or(fc.lexicon.path)
            .map(PathBuf::from);

        let music = MusicConfig {
            playlists_dir: env("DOMOVOY_PLAYLISTS_DIR")
                .or(fc.music.playlists_dir)
                .map_or(defaults.music.playlists_dir, PathBuf::from),
            default_playlist: fc
                .music
                .default_playlist
                .unwrap_or(defaults.music.default_playlist),
            volume_step: fc.music.volume_step.unwrap_or(defaults.music.volume_step),
            shuffle: fc.music.shuffle.unwrap_or(defaults.music.shuffle),
        };

        let system = SystemConfig {
            home_url: fc.system.home_url.unwrap_or(defaults.system.home_url),
            search_url: fc.system.search_url.unwrap_or(defaults.system.search_url),
            allow_shutdown: env("DOMOVOY_ALLOW_SHUTDOWN")
                .map(|v| parse_flag(&v))
                .or(fc.system.allow_shutdown)
                .unwrap_or(defaults.system.allow_shutdown),
        };

        let speech = SpeechConfig {
            command: fc.speech.command.unwrap_or_default(),
            duck_volume: fc
                .speech
                .duck_volume
                .map_or(defaults.speech.duck_volume, |v| v.clamp(1, 100)),
            replies: fc.speech.replies.unwrap_or_default(),
        };

        let wake = WakeConfig {
            names: fc
                .wake
                .names
                .filter(|names| !names.is_empty())
                .unwrap_or(defaults.wake.names),
            threshold: fc.wake.threshold.unwrap_or(defaults.wake.threshold),
            required: fc.wake.required.unwrap_or(defaults.wake.required),
        };

        let queue_capacity = fc
            .dispatch
            .queue_capacity
            .filter(|c| *c > 0)
            .unwrap_or(defaults.queue_capacity);

        Ok(Self {
            serial,
            light,
            resolver: fc.resolver.unwrap_or_default(),
            lexicon_path,
            music,
            system,
            speech,
            wake,
            queue_capacity,
            screen_command: fc.screen.command.unwrap_or_default(),
        })
    }
}
