//! Parameter extraction
//!
//! Pulls the arguments of a command out of the utterance that named it:
//! a number ("громкость 73", "яркость семьдесят три"), free text after a
//! trigger phrase ("найди котиков"), or a color for effect commands.
//! Values are returned as heard; domains clamp them.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::lexicon::{CommandKey, Lexicon, normalize_text};
use crate::light::Rgb;

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+").expect("valid regex"));

const NUMBER_WORDS: &[(&str, i64)] = &[
    ("ноль", 0),
    ("один", 1),
    ("одна", 1),
    ("два", 2),
    ("две", 2),
    ("три", 3),
    ("четыре", 4),
    ("пять", 5),
    ("шесть", 6),
    ("семь", 7),
    ("восемь", 8),
    ("девять", 9),
    ("десять", 10),
    ("одиннадцать", 11),
    ("двенадцать", 12),
    ("тринадцать", 13),
    ("четырнадцать", 14),
    ("пятнадцать", 15),
    ("шестнадцать", 16),
    ("семнадцать", 17),
    ("восемнадцать", 18),
    ("девятнадцать", 19),
    ("двадцать", 20),
    ("тридцать", 30),
    ("сорок", 40),
    ("пятьдесят", 50),
    ("шестьдесят", 60),
    ("семьдесят", 70),
    ("восемьдесят", 80),
    ("девяносто", 90),
    ("сто", 100),
];

/// Triggers preceding a search query
pub const SEARCH_TRIGGERS: &[&str] = &["найди", "поиск", "найти"];

/// Triggers preceding the name of a playlist to create
pub const CREATE_PLAYLIST_TRIGGERS: &[&str] = &["создай плейлист", "создай плэй лист", "плейлист"];

/// Triggers preceding the name of a playlist to switch to
pub const SWITCH_PLAYLIST_TRIGGERS: &[&str] = &["включи плейлист", "включи плэй лист", "плейлист"];

/// Arguments found in an utterance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Parameters {
    /// Numeric argument, unclamped
    pub value: Option<i64>,
    /// Search query
    pub query: Option<String>,
    /// Playlist name
    pub playlist: Option<String>,
    /// Color named alongside an effect command
    pub color: Option<Rgb>,
}

impl Parameters {
    #[must_use]
    pub const fn with_value(value: i64) -> Self {
        Self {
            value: Some(value),
            query: None,
            playlist: None,
            color: None,
        }
    }
}

/// Extract what `command` needs from `utterance`
#[must_use]
pub fn extract(utterance: &str, command: &CommandKey, lexicon: &Lexicon) -> Parameters {
    let text = normalize_text(utterance);
    let mut params = Parameters {
        value: number(&text),
        ..Parameters::default()
    };

    match command {
        CommandKey::Search => params.query = text_after(&text, SEARCH_TRIGGERS),
        CommandKey::CreatePlaylist => params.playlist = text_after(&text, CREATE_PLAYLIST_TRIGGERS),
        CommandKey::SwitchPlaylist => params.playlist = text_after(&text, SWITCH_PLAYLIST_TRIGGERS),
        CommandKey::WaveEffect
        | CommandKey::BreathingEffect
        | CommandKey::StaticMode
        | CommandKey::LightOn => params.color = lexicon.color_in(&text).map(|c| c.rgb),
        _ => {}
    }
    params
}

/// First run of digits, else the sum of the number words present
///
/// A digit run too long for `i64` counts as no number.
#[must_use]
pub fn number(text: &str) -> Option<i64> {
    if let Some(digits) = DIGITS.find(text) {
        return digits.as_str().parse().ok();
    }

    let text = text.to_lowercase();
    let mut found = false;
    let mut total = 0i64;
    for word in text.split_whitespace() {
        if let Some((_, value)) = NUMBER_WORDS.iter().find(|(w, _)| *w == word) {
            found = true;
            total += value;
        }
    }
    found.then_some(total)
}

/// Text after the first trigger found (triggers are tried in order), trimmed
#[must_use]
pub fn text_after(text: &str, triggers: &[&str]) -> Option<String> {
    triggers.iter().find_map(|trigger| {
        let start = text.find(trigger)? + trigger.len();
        let rest = text[start..].trim();
        (!rest.is_empty()).then(|| rest.to_string())
    })
}
