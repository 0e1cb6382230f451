//! Lexicon store
//!
//! The fixed vocabulary mapping Russian phrases to [`CommandKey`]s. Five
//! categories are kept in declaration order, which the resolver uses to
//! break ties:
//!
//! - `action_patterns`: action phrase → object phrase → key ("включи" → "свет" → `light_on`)
//! - `parameter_commands`: phrase followed by a number ("громкость" → `set_volume`)
//! - `direct_commands`: whole-word phrases ("пауза" → `pause`)
//! - `colors`: name → `set_color_*` key and RGB
//! - `palettes`: name → `set_palette_*` key and RGB list

mod command;

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use command::{CommandKey, Domain, UnknownCommand};

use crate::light::Rgb;
use crate::{Error, Result};

/// Vocabulary compiled into the binary
const EMBEDDED_LEXICON: &str = include_str!("../../lexicon/default.json");

/// Phrase bound to a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phrase {
    pub text: String,
    pub command: CommandKey,
}

/// Action verb and the objects it combines with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPattern {
    pub action: String,
    pub objects: Vec<Phrase>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedColor {
    pub name: String,
    pub command: CommandKey,
    pub rgb: Rgb,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub name: String,
    pub command: CommandKey,
    pub colors: Vec<Rgb>,
}

/// On-disk lexicon schema
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LexiconFile {
    #[serde(default)]
    pub action_patterns: IndexMap<String, IndexMap<String, String>>,
    #[serde(default)]
    pub parameter_commands: IndexMap<String, String>,
    #[serde(default)]
    pub direct_commands: IndexMap<String, String>,
    #[serde(default)]
    pub colors: IndexMap<String, ColorEntry>,
    #[serde(default)]
    pub palettes: IndexMap<String, PaletteEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ColorEntry {
    pub command: String,
    pub rgb: Rgb,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PaletteEntry {
    pub command: String,
    pub colors: Vec<Rgb>,
}

/// Entry counts per category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LexiconSummary {
    pub actions: usize,
    pub action_objects: usize,
    pub parameter_commands: usize,
    pub direct_commands: usize,
    pub colors: usize,
    pub palettes: usize,
}

/// Immutable phrase vocabulary
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    action_patterns: Vec<ActionPattern>,
    parameter_commands: Vec<Phrase>,
    direct_commands: Vec<Phrase>,
    colors: Vec<NamedColor>,
    palettes: Vec<Palette>,
}

impl Lexicon {
    /// The built-in Russian vocabulary
    ///
    /// # Errors
    ///
    /// Returns error if the embedded file is corrupt
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_LEXICON)
    }

    /// Load a lexicon file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let lexicon = Self::from_json(&content)?;
        tracing::info!(path = %path.display(), "loaded lexicon");
        Ok(lexicon)
    }

    /// Parse and validate a lexicon document
    ///
    /// Entries with unknown command keys, or referencing colors and palettes
    /// that are not defined, are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed or no usable entry remains
    pub fn from_json(json: &str) -> Result<Self> {
        let file: LexiconFile = serde_json::from_str(json)?;
        Self::from_file(file)
    }

    /// Build from an already parsed document
    ///
    /// # Errors
    ///
    /// Returns error if no usable entry remains
    pub fn from_file(file: LexiconFile) -> Result<Self> {
        let mut lexicon = Self::default();

        for (name, entry) in file.colors {
            let Some(name) = normalize(&name) else { continue };
            match parse_key(&name, &entry.command) {
                Some(command @ CommandKey::SetColor(_)) => lexicon.colors.push(NamedColor {
                    name,
                    command,
                    rgb: entry.rgb,
                }),
                Some(other) => {
                    tracing::warn!(color = %name, command = %other, "color entry must use a set_color key");
                }
                None => {}
            }
        }

        for (name, entry) in file.palettes {
            let Some(name) = normalize(&name) else { continue };
            if entry.colors.is_empty() {
                tracing::warn!(palette = %name, "palette without colors skipped");
                continue;
            }
            match parse_key(&name, &entry.command) {
                Some(command @ CommandKey::SetPalette(_)) => lexicon.palettes.push(Palette {
                    name,
                    command,
                    colors: entry.colors,
                }),
                Some(other) => {
                    tracing::warn!(palette = %name, command = %other, "palette entry must use a set_palette key");
                }
                None => {}
            }
        }

        for (action, objects) in file.action_patterns {
            let Some(action) = normalize(&action) else { continue };
            let objects = lexicon.phrases(objects);
            if !objects.is_empty() {
                lexicon.action_patterns.push(ActionPattern { action, objects });
            }
        }
        lexicon.parameter_commands = lexicon.phrases(file.parameter_commands);
        lexicon.direct_commands = lexicon.phrases(file.direct_commands);

        if lexicon.is_empty() {
            return Err(Error::Lexicon("no usable entries".to_string()));
        }
        Ok(lexicon)
    }

    fn phrases(&self, raw: IndexMap<String, String>) -> Vec<Phrase> {
        raw.into_iter()
            .filter_map(|(text, key)| {
                let text = normalize(&text)?;
                let command = parse_key(&text, &key)?;
                if self.is_defined(&command) {
                    Some(Phrase { text, command })
                } else {
                    tracing::warn!(phrase = %text, command = %command, "phrase references an undefined color or palette");
                    None
                }
            })
            .collect()
    }

    /// Whether a key can be executed with this lexicon's data
    #[must_use]
    pub fn is_defined(&self, command: &CommandKey) -> bool {
        match command {
            CommandKey::SetColor(_) => self.color(command).is_some(),
            CommandKey::SetPalette(_) => self.palette(command).is_some(),
            _ => true,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.action_patterns.is_empty()
            && self.parameter_commands.is_empty()
            && self.direct_commands.is_empty()
            && self.colors.is_empty()
            && self.palettes.is_empty()
    }

    #[must_use]
    pub fn action_patterns(&self) -> &[ActionPattern] {
        &self.action_patterns
    }

    #[must_use]
    pub fn parameter_commands(&self) -> &[Phrase] {
        &self.parameter_commands
    }

    #[must_use]
    pub fn direct_commands(&self) -> &[Phrase] {
        &self.direct_commands
    }

    #[must_use]
    pub fn colors(&self) -> &[NamedColor] {
        &self.colors
    }

    #[must_use]
    pub fn palettes(&self) -> &[Palette] {
        &self.palettes
    }

    /// Color bound to a `set_color_*` key
    #[must_use]
    pub fn color(&self, command: &CommandKey) -> Option<&NamedColor> {
        self.colors.iter().find(|c| &c.command == command)
    }

    /// Palette bound to a `set_palette_*` key
    #[must_use]
    pub fn palette(&self, command: &CommandKey) -> Option<&Palette> {
        self.palettes.iter().find(|p| &p.command == command)
    }

    /// First color whose name occurs in the (lowercased) text
    #[must_use]
    pub fn color_in(&self, text: &str) -> Option<&NamedColor> {
        self.colors.iter().find(|c| text.contains(c.name.as_str()))
    }

    #[must_use]
    pub fn summary(&self) -> LexiconSummary {
        LexiconSummary {
            actions: self.action_patterns.len(),
            action_objects: self.action_patterns.iter().map(|a| a.objects.len()).sum(),
            parameter_commands: self.parameter_commands.len(),
            direct_commands: self.direct_commands.len(),
            colors: self.colors.len(),
            palettes: self.palettes.len(),
        }
    }

    /// Back to the file schema, e.g. for dumping
    #[must_use]
    pub fn to_file(&self) -> LexiconFile {
        let phrases = |list: &[Phrase]| {
            list.iter()
                .map(|p| (p.text.clone(), p.command.to_string()))
                .collect::<IndexMap<_, _>>()
        };
        LexiconFile {
            action_patterns: self
                .action_patterns
                .iter()
                .map(|a| (a.action.clone(), phrases(&a.objects)))
                .collect(),
            parameter_commands: phrases(&self.parameter_commands),
            direct_commands: phrases(&self.direct_commands),
            colors: self
                .colors
                .iter()
                .map(|c| {
                    let entry = ColorEntry {
                        command: c.command.to_string(),
                        rgb: c.rgb,
                    };
                    (c.name.clone(), entry)
                })
                .collect(),
            palettes: self
                .palettes
                .iter()
                .map(|p| {
                    let entry = PaletteEntry {
                        command: p.command.to_string(),
                        colors: p.colors.clone(),
                    };
                    (p.name.clone(), entry)
                })
                .collect(),
        }
    }
}

/// Canonical form used for both phrases and utterances
///
/// Lowercases, folds "ё" into "е", turns sentence punctuation into spaces
/// and collapses whitespace.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let folded: String = text
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'ё' => 'е',
            ',' | '.' | '!' | '?' | ';' | ':' | '"' | '«' | '»' => ' ',
            other => other,
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize(phrase: &str) -> Option<String> {
    let phrase = normalize_text(phrase);
    if phrase.is_empty() {
        tracing::warn!("empty lexicon phrase skipped");
        None
    } else {
        Some(phrase)
    }
}

fn parse_key(phrase: &str, key: &str) -> Option<CommandKey> {
    match key.parse() {
        Ok(command) => Some(command),
        Err(e) => {
            tracing::warn!(phrase, error = %e, "lexicon entry skipped");
            None
        }
    }
}
