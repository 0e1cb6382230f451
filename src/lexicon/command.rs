//! Canonical command keys

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Device domain a command belongs to; one dispatcher worker per domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Music,
    Light,
    System,
}

impl Domain {
    pub const ALL: [Self; 3] = [Self::Music, Self::Light, Self::System];
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Music => "music",
            Self::Light => "light",
            Self::System => "system",
        })
    }
}

/// Every action the assistant can perform
///
/// Colors and palettes carry the identifier that follows `set_color_` /
/// `set_palette_` in the key string (e.g. `set_color_red` → `SetColor("red")`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandKey {
    Play,
    Pause,
    Resume,
    Next,
    Previous,
    VolumeUp,
    VolumeDown,
    SetVolume,
    Repeat,
    CreatePlaylist,
    SwitchPlaylist,
    Browser,
    Search,
    Shutdown,
    LightOn,
    LightOff,
    BrightnessUp,
    BrightnessDown,
    SetBrightness,
    MusicMode,
    WaveEffect,
    BreathingEffect,
    MonitorMode,
    StaticMode,
    SetColor(String),
    SetPalette(String),
}

const COLOR_PREFIX: &str = "set_color_";
const PALETTE_PREFIX: &str = "set_palette_";

const SIMPLE: &[(&str, CommandKey)] = &[
    ("play", CommandKey::Play),
    ("pause", CommandKey::Pause),
    ("resume", CommandKey::Resume),
    ("next", CommandKey::Next),
    ("previous", CommandKey::Previous),
    ("volume_up", CommandKey::VolumeUp),
    ("volume_down", CommandKey::VolumeDown),
    ("set_volume", CommandKey::SetVolume),
    ("repeat", CommandKey::Repeat),
    ("create_playlist", CommandKey::CreatePlaylist),
    ("switch_playlist", CommandKey::SwitchPlaylist),
    ("browser", CommandKey::Browser),
    ("search", CommandKey::Search),
    ("shutdown", CommandKey::Shutdown),
    ("light_on", CommandKey::LightOn),
    ("light_off", CommandKey::LightOff),
    ("brightness_up", CommandKey::BrightnessUp),
    ("brightness_down", CommandKey::BrightnessDown),
    ("set_brightness", CommandKey::SetBrightness),
    ("music_mode", CommandKey::MusicMode),
    ("wave_effect", CommandKey::WaveEffect),
    ("breathing_effect", CommandKey::BreathingEffect),
    ("monitor_mode", CommandKey::MonitorMode),
    ("static_mode", CommandKey::StaticMode),
];

impl CommandKey {
    #[must_use]
    pub const fn domain(&self) -> Domain {
        match self {
            Self::Play
            | Self::Pause
            | Self::Resume
            | Self::Next
            | Self::Previous
            | Self::VolumeUp
            | Self::VolumeDown
            | Self::SetVolume
            | Self::Repeat
            | Self::CreatePlaylist
            | Self::SwitchPlaylist => Domain::Music,
            Self::Browser | Self::Search | Self::Shutdown => Domain::System,
            Self::LightOn
            | Self::LightOff
            | Self::BrightnessUp
            | Self::BrightnessDown
            | Self::SetBrightness
            | Self::MusicMode
            | Self::WaveEffect
            | Self::BreathingEffect
            | Self::MonitorMode
            | Self::StaticMode
            | Self::SetColor(_)
            | Self::SetPalette(_) => Domain::Light,
        }
    }

    /// Whether a numeric value normally follows the phrase
    #[must_use]
    pub const fn takes_value(&self) -> bool {
        matches!(
            self,
            Self::SetVolume
                | Self::SetBrightness
                | Self::VolumeUp
                | Self::VolumeDown
                | Self::BrightnessUp
                | Self::BrightnessDown
        )
    }
}

impl fmt::Display for CommandKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetColor(id) => write!(f, "{COLOR_PREFIX}{id}"),
            Self::SetPalette(id) => write!(f, "{PALETTE_PREFIX}{id}"),
            simple => {
                let name = SIMPLE
                    .iter()
                    .find(|(_, key)| key == simple)
                    .map_or("unknown", |(name, _)| name);
                f.write_str(name)
            }
        }
    }
}

/// Key string that names no command
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command key: {0}")]
pub struct UnknownCommand(pub String);

impl FromStr for CommandKey {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((_, key)) = SIMPLE.iter().find(|(name, _)| *name == s) {
            return Ok(key.clone());
        }
        let valid_id = |id: &str| {
            !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        };
        if let Some(id) = s.strip_prefix(COLOR_PREFIX).filter(|id| valid_id(id)) {
            return Ok(Self::SetColor(id.to_string()));
        }
        if let Some(id) = s.strip_prefix(PALETTE_PREFIX).filter(|id| valid_id(id)) {
            return Ok(Self::SetPalette(id.to_string()));
        }
        Err(UnknownCommand(s.to_string()))
    }
}

impl Serialize for CommandKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CommandKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_roundtrip() {
        for (name, key) in SIMPLE {
            assert_eq!(name.parse::<CommandKey>().unwrap(), *key);
            assert_eq!(key.to_string(), *name);
        }
    }

    #[test]
    fn test_parse_color_and_palette() {
        assert_eq!(
            "set_color_red".parse::<CommandKey>().unwrap(),
            CommandKey::SetColor("red".into())
        );
        assert_eq!(
            "set_palette_cold".parse::<CommandKey>().unwrap(),
            CommandKey::SetPalette("cold".into())
        );
        assert_eq!(CommandKey::SetColor("mint".into()).to_string(), "set_color_mint");
    }

    #[test]
    fn test_parse_unknown() {
        assert!("dance".parse::<CommandKey>().is_err());
        assert!("set_color_".parse::<CommandKey>().is_err());
        assert!("set_palette_тёплая".parse::<CommandKey>().is_err());
    }

    #[test]
    fn test_domains() {
        assert_eq!(CommandKey::Play.domain(), Domain::Music);
        assert_eq!(CommandKey::SetColor("red".into()).domain(), Domain::Light);
        assert_eq!(CommandKey::Search.domain(), Domain::System);
        assert_eq!(CommandKey::Shutdown.domain(), Domain::System);
    }
}
