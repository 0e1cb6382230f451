//! TOML configuration file loading
//!
//! Supports `~/.config/domovoy/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;
use crate::resolver::ResolverSettings;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct DomovoyConfigFile {
    #[serde(default)]
    pub serial: SerialFileConfig,

    #[serde(default)]
    pub light: LightFileConfig,

    /// Fuzzy matching thresholds
    #[serde(default)]
    pub resolver: Option<ResolverSettings>,

    #[serde(default)]
    pub lexicon: LexiconFileConfig,

    #[serde(default)]
    pub music: MusicFileConfig,

    #[serde(default)]
    pub system: SystemFileConfig,

    #[serde(default)]
    pub speech: SpeechFileConfig,

    #[serde(default)]
    pub wake: WakeFileConfig,

    #[serde(default)]
    pub dispatch: DispatchFileConfig,

    #[serde(default)]
    pub audio: AudioFileConfig,

    #[serde(default)]
    pub screen: ScreenFileConfig,
}

/// LED controller connection
#[derive(Debug, Default, Deserialize)]
pub struct SerialFileConfig {
    /// Device path (e.g. "/dev/ttyUSB0", "COM3")
    pub port: Option<String>,
    pub baud: Option<u32>,
    pub timeout_ms: Option<u64>,
    /// Wait after opening for boards that reset on connect
    pub settle_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LightFileConfig {
    /// Brightness change for "ярче"/"тусклее"
    pub brightness_step: Option<i64>,
    pub force_off_repeats: Option<u32>,
    pub force_off_spacing_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LexiconFileConfig {
    /// JSON lexicon replacing the embedded one
    pub path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MusicFileConfig {
    /// Directory whose subdirectories are playlists
    pub playlists_dir: Option<String>,
    pub default_playlist: Option<String>,
    pub volume_step: Option<i64>,
    pub shuffle: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SystemFileConfig {
    pub home_url: Option<String>,
    pub search_url: Option<String>,
    /// Whether "выключи компьютер" really powers off
    pub allow_shutdown: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SpeechFileConfig {
    /// TTS program and arguments; replies are written to its stdin
    pub command: Option<Vec<String>>,
    pub duck_volume: Option<u8>,
    /// Replacement pool of positive replies
    pub replies: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WakeFileConfig {
    pub names: Option<Vec<String>>,
    pub threshold: Option<u8>,
    /// Ignore input that does not start with a wake word
    pub required: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DispatchFileConfig {
    pub queue_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Amplitude mapped to full brightness in music mode
    pub amplitude_ceiling: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScreenFileConfig {
    /// Screenshot program writing a P6 PPM to stdout
    pub command: Option<Vec<String>>,
}

/// Parse a config file
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read_config_file(path: &Path) -> Result<DomovoyConfigFile> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Load the TOML config file from the standard path
///
/// Returns `DomovoyConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> DomovoyConfigFile {
    let Some(path) = config_file_path() else {
        return DomovoyConfigFile::default();
    };

    if !path.exists() {
        return DomovoyConfigFile::default();
    }

    match read_config_file(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            DomovoyConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/domovoy/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("domovoy").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file() {
        let fc: DomovoyConfigFile = toml::from_str(
            r#"
            [serial]
            port = "/dev/ttyACM0"

            [resolver]
            fallback = 65

            [wake]
            names = ["домовой"]
            "#,
        )
        .unwrap();
        assert_eq!(fc.serial.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(fc.serial.baud, None);
        let resolver = fc.resolver.unwrap();
        assert_eq!(resolver.fallback, 65);
        assert_eq!(resolver.typo, 80);
        assert_eq!(fc.wake.names.unwrap(), ["домовой"]);
    }

    #[test]
    fn test_read_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[serial\nport = 1").unwrap();
        assert!(read_config_file(&path).is_err());
        assert!(read_config_file(&dir.path().join("missing.toml")).is_err());
    }
}
