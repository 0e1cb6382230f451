//! Command resolver
//!
//! Maps a free-form utterance onto a [`CommandKey`] through a fixed series of
//! tiers. Each tier returns on its first hit:
//!
//! 1. action pattern ("включи" + "свет")
//! 2. parameter phrase ("громкость")
//! 3. direct phrase, as a whole word
//! 4. color name
//! 5. palette name
//! 6. fuzzy fallback over every phrase and composition
//! 7. typo correction for single-word utterances
//!
//! Fuzzy scores outside the action tier are aligned to whole words, so a
//! short phrase cannot claim a fragment of a longer word. Resolution is a
//! pure function of the utterance and the lexicon.

pub mod fuzzy;

use serde::{Deserialize, Serialize};

use crate::lexicon::{CommandKey, Lexicon, normalize_text};

use fuzzy::{partial_ratio, ratio, shared_words, token_set_ratio, word_ratio};

/// Thresholds and weights of the fuzzy tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Minimum partial score for an action object
    pub action_fuzzy: u8,
    /// Minimum word-aligned score for a color name
    pub color_fuzzy: u8,
    /// Minimum word-aligned score for a palette name
    pub palette_fuzzy: u8,
    /// Minimum score accepted by the global fallback
    pub fallback: u8,
    /// Minimum whole-word score for typo correction
    pub typo: u8,
    /// Bonus per whole word shared with a candidate
    pub word_bonus: u8,
    /// Token-set scoring applies when both sides have at most this many words
    pub token_set_max_words: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            action_fuzzy: 80,
            color_fuzzy: 75,
            palette_fuzzy: 75,
            fallback: 70,
            typo: 80,
            word_bonus: 10,
            token_set_max_words: 3,
        }
    }
}

/// Tier that produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    ActionPattern,
    Parameter,
    Direct,
    Color,
    Palette,
    Fuzzy,
    Typo,
}

/// Outcome of resolving one utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub command: Option<CommandKey>,
    /// `0..=100`; exact hits score 100
    pub confidence: u8,
    pub matched_phrase: String,
    pub tier: Option<Tier>,
}

impl Resolution {
    #[must_use]
    pub const fn none() -> Self {
        Self {
            command: None,
            confidence: 0,
            matched_phrase: String::new(),
            tier: None,
        }
    }

    fn hit(command: &CommandKey, confidence: u8, phrase: impl Into<String>, tier: Tier) -> Self {
        Self {
            command: Some(command.clone()),
            confidence,
            matched_phrase: phrase.into(),
            tier: Some(tier),
        }
    }

    #[must_use]
    pub const fn is_match(&self) -> bool {
        self.command.is_some()
    }
}

/// Resolve with the default thresholds
#[must_use]
pub fn resolve(utterance: &str, lexicon: &Lexicon) -> Resolution {
    Resolver::default().resolve(utterance, lexicon)
}

/// Tiered resolver with configurable thresholds
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver {
    settings: ResolverSettings,
}

impl Resolver {
    #[must_use]
    pub const fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub const fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    #[must_use]
    pub fn resolve(&self, utterance: &str, lexicon: &Lexicon) -> Resolution {
        let text = normalize_text(utterance);
        if text.is_empty() {
            return Resolution::none();
        }

        let resolution = self
            .action_pattern(&text, lexicon)
            .or_else(|| parameter(&text, lexicon))
            .or_else(|| direct(&text, lexicon))
            .or_else(|| self.color(&text, lexicon))
            .or_else(|| self.palette(&text, lexicon))
            .or_else(|| self.fallback(&text, lexicon))
            .or_else(|| self.typo(&text, lexicon));

        match resolution {
            Some(resolution) => {
                tracing::debug!(
                    utterance = %text,
                    command = ?resolution.command.as_ref().map(ToString::to_string),
                    tier = ?resolution.tier,
                    confidence = resolution.confidence,
                    "utterance resolved"
                );
                resolution
            }
            None => Resolution::none(),
        }
    }

    fn action_pattern(&self, text: &str, lexicon: &Lexicon) -> Option<Resolution> {
        for pattern in lexicon.action_patterns() {
            if !text.contains(pattern.action.as_str()) {
                continue;
            }
            for object in &pattern.objects {
                let phrase = format!("{} {}", pattern.action, object.text);
                if text.contains(object.text.as_str()) {
                    return Some(Resolution::hit(&object.command, 100, phrase, Tier::ActionPattern));
                }
                let score = partial_ratio(&object.text, text);
                if score >= self.settings.action_fuzzy {
                    return Some(Resolution::hit(&object.command, score, phrase, Tier::ActionPattern));
                }
            }
        }
        None
    }

    fn color(&self, text: &str, lexicon: &Lexicon) -> Option<Resolution> {
        let names = lexicon.colors().iter().map(|c| (c.name.as_str(), &c.command));
        named_hit(text, names, self.settings.color_fuzzy, Tier::Color)
    }

    fn palette(&self, text: &str, lexicon: &Lexicon) -> Option<Resolution> {
        let names = lexicon.palettes().iter().map(|p| (p.name.as_str(), &p.command));
        named_hit(text, names, self.settings.palette_fuzzy, Tier::Palette)
    }

    fn fallback(&self, text: &str, lexicon: &Lexicon) -> Option<Resolution> {
        let text_words = text.split_whitespace().count();
        let mut best: Option<(u8, String, &CommandKey)> = None;

        for (candidate, command) in fallback_candidates(lexicon) {
            let score = self.fallback_score(text, text_words, &candidate);
            if best.as_ref().is_none_or(|(top, _, _)| score > *top) {
                best = Some((score, candidate, command));
            }
        }

        let (score, phrase, command) = best?;
        (score >= self.settings.fallback).then(|| Resolution::hit(command, score, phrase, Tier::Fuzzy))
    }

    fn fallback_score(&self, text: &str, text_words: usize, candidate: &str) -> u8 {
        let max_words = self.settings.token_set_max_words;
        let mut score = word_ratio(candidate, text);
        if text_words <= max_words && candidate.split_whitespace().count() <= max_words {
            score = score.max(token_set_ratio(candidate, text));
        }
        let bonus = shared_words(candidate, text).saturating_mul(usize::from(self.settings.word_bonus));
        let total = usize::from(score).saturating_add(bonus).min(100);
        u8::try_from(total).unwrap_or(100)
    }

    fn typo(&self, text: &str, lexicon: &Lexicon) -> Option<Resolution> {
        if text.contains(' ') {
            return None;
        }

        let single_words = lexicon
            .direct_commands()
            .iter()
            .filter(|p| !p.text.contains(' '))
            .map(|p| (p.text.as_str(), &p.command))
            .chain(lexicon.colors().iter().map(|c| (c.name.as_str(), &c.command)))
            .chain(lexicon.palettes().iter().map(|p| (p.name.as_str(), &p.command)));

        let mut best: Option<(u8, &str, &CommandKey)> = None;
        for (word, command) in single_words {
            let score = ratio(text, word);
            if score >= self.settings.typo && best.is_none_or(|(top, _, _)| score > top) {
                best = Some((score, word, command));
            }
        }
        best.map(|(score, word, command)| Resolution::hit(command, score, word, Tier::Typo))
    }
}

fn parameter(text: &str, lexicon: &Lexicon) -> Option<Resolution> {
    lexicon
        .parameter_commands()
        .iter()
        .find(|p| text.contains(p.text.as_str()))
        .map(|p| Resolution::hit(&p.command, 100, p.text.clone(), Tier::Parameter))
}

/// Whole utterance or whole-word run; "повтори" must not match inside "повторить"
fn direct(text: &str, lexicon: &Lexicon) -> Option<Resolution> {
    let padded = format!(" {text} ");
    lexicon
        .direct_commands()
        .iter()
        .find(|p| p.text == text || padded.contains(&format!(" {} ", p.text)))
        .map(|p| Resolution::hit(&p.command, 100, p.text.clone(), Tier::Direct))
}

/// First name contained in the text, else the best word-aligned score
fn named_hit<'a>(
    text: &str,
    names: impl Iterator<Item = (&'a str, &'a CommandKey)> + Clone,
    threshold: u8,
    tier: Tier,
) -> Option<Resolution> {
    if let Some((name, command)) = names.clone().find(|(name, _)| text.contains(name)) {
        return Some(Resolution::hit(command, 100, name, tier));
    }

    let mut best: Option<(u8, &str, &CommandKey)> = None;
    for (name, command) in names {
        let score = word_ratio(name, text);
        if score >= threshold && best.is_none_or(|(top, _, _)| score > top) {
            best = Some((score, name, command));
        }
    }
    best.map(|(score, name, command)| Resolution::hit(command, score, name, tier))
}

/// Every phrase the fallback compares against, in declaration order
fn fallback_candidates(lexicon: &Lexicon) -> Vec<(String, &CommandKey)> {
    let mut candidates = Vec::new();

    for pattern in lexicon.action_patterns() {
        for object in &pattern.objects {
            candidates.push((format!("{} {}", pattern.action, object.text), &object.command));
            candidates.push((object.text.clone(), &object.command));
        }
    }
    for phrase in lexicon.direct_commands() {
        candidates.push((phrase.text.clone(), &phrase.command));
    }
    for phrase in lexicon.parameter_commands() {
        candidates.push((phrase.text.clone(), &phrase.command));
    }
    for color in lexicon.colors() {
        candidates.push((format!("включи {}", color.name), &color.command));
        candidates.push((format!("сделай {}", color.name), &color.command));
        candidates.push((color.name.clone(), &color.command));
    }
    for palette in lexicon.palettes() {
        candidates.push((format!("палитра {}", palette.name), &palette.command));
        candidates.push((format!("включи палитру {}", palette.name), &palette.command));
        candidates.push((palette.name.clone(), &palette.command));
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexicon() -> Lexicon {
        Lexicon::from_json(
            r#"{
                "action_patterns": {"включи": {"свет": "light_on", "волну": "wave_effect"}},
                "parameter_commands": {"громкость": "set_volume"},
                "direct_commands": {"повтори": "repeat", "свет": "light_on", "пауза": "pause"},
                "colors": {"красный": {"command": "set_color_red", "rgb": [255, 0, 0]}},
                "palettes": {"холодная": {"command": "set_palette_cold", "colors": [[200, 230, 255]]}}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_empty_input() {
        let lexicon = lexicon();
        assert_eq!(resolve("", &lexicon), Resolution::none());
        assert_eq!(resolve("   ", &lexicon), Resolution::none());
        assert_eq!(resolve(" ?! ", &lexicon), Resolution::none());
    }

    #[test]
    fn test_action_pattern_beats_direct() {
        let r = resolve("Включи свет", &lexicon());
        assert_eq!(r.command, Some(CommandKey::LightOn));
        assert_eq!(r.tier, Some(Tier::ActionPattern));
        assert_eq!(r.matched_phrase, "включи свет");
        assert_eq!(r.confidence, 100);
    }

    #[test]
    fn test_action_object_fuzzy() {
        let r = resolve("включи волна", &lexicon());
        assert_eq!(r.command, Some(CommandKey::WaveEffect));
        assert_eq!(r.tier, Some(Tier::ActionPattern));
        assert_eq!(r.confidence, 80);
    }

    #[test]
    fn test_direct_requires_whole_word() {
        let lexicon = lexicon();
        let r = resolve("пожалуйста повтори", &lexicon);
        assert_eq!(r.tier, Some(Tier::Direct));
        assert_eq!(r.command, Some(CommandKey::Repeat));

        let r = resolve("повторить", &lexicon);
        assert_ne!(r.tier, Some(Tier::Direct));
    }

    #[test]
    fn test_parameter_tier() {
        let r = resolve("громкость на 40", &lexicon());
        assert_eq!(r.command, Some(CommandKey::SetVolume));
        assert_eq!(r.tier, Some(Tier::Parameter));
    }

    #[test]
    fn test_palette_substring() {
        let r = resolve("холодная палитра", &lexicon());
        assert_eq!(r.command, Some(CommandKey::SetPalette("cold".into())));
        assert_eq!(r.tier, Some(Tier::Palette));
    }

    #[test]
    fn test_fallback_strict_greater_keeps_first() {
        let lexicon = Lexicon::from_json(
            r#"{"direct_commands": {"альфа": "play", "гамма": "pause"}}"#,
        )
        .unwrap();
        let r = Resolver::default().fallback("альфа гамма", &lexicon).unwrap();
        // both candidates score 100
        assert_eq!(r.matched_phrase, "альфа");
        assert_eq!(r.confidence, 100);
        assert_eq!(r.command, Some(CommandKey::Play));
    }

    fn white_and_yellow() -> Lexicon {
        Lexicon::from_json(
            r#"{"colors": {
                "белый": {"command": "set_color_white", "rgb": [255, 255, 255]},
                "желтый": {"command": "set_color_yellow", "rgb": [255, 255, 0]}
            }}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_color_tier_takes_best_score() {
        // "белый" scores 80 and comes first, "желтый" scores 91
        let r = resolve("желый", &white_and_yellow());
        assert_eq!(r.command, Some(CommandKey::SetColor("yellow".into())));
        assert_eq!(r.tier, Some(Tier::Color));
        assert_eq!(r.confidence, 91);
    }

    #[test]
    fn test_typo_tier_takes_best_score() {
        let resolver = Resolver::new(ResolverSettings {
            color_fuzzy: 101,
            fallback: 101,
            ..ResolverSettings::default()
        });
        let r = resolver.resolve("желый", &white_and_yellow());
        assert_eq!(r.tier, Some(Tier::Typo));
        assert_eq!(r.matched_phrase, "желтый");
    }

    #[test]
    fn test_unrelated_text_is_no_match() {
        let r = resolve("абракадабра", &lexicon());
        assert!(!r.is_match());
        assert_eq!(r.confidence, 0);
    }

    #[test]
    fn test_thresholds_are_configurable() {
        let strict = Resolver::new(ResolverSettings {
            action_fuzzy: 95,
            fallback: 95,
            ..ResolverSettings::default()
        });
        let r = strict.resolve("включи волна", &lexicon());
        assert_ne!(r.tier, Some(Tier::ActionPattern));
    }
}
