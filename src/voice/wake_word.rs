//! Wake word filter
//!
//! Transcripts addressed to the assistant start with its name ("Геля,
//! включи свет"). Speech recognition often mangles the name, so the first
//! word is compared fuzzily rather than exactly.

use crate::lexicon::normalize_text;
use crate::resolver::fuzzy::ratio;

/// Similarity the first word must exceed to count as the name
pub const DEFAULT_THRESHOLD: u8 = 45;

/// Strips a leading wake word from transcripts
#[derive(Debug, Clone)]
pub struct WakeWordFilter {
    names: Vec<String>,
    threshold: u8,
}

impl WakeWordFilter {
    /// Create a filter for the given names
    ///
    /// # Arguments
    ///
    /// * `names` - Names the assistant answers to (e.g. "геля")
    /// * `threshold` - First-word similarity must be strictly above this
    #[must_use]
    pub fn new(names: Vec<String>, threshold: u8) -> Self {
        let names: Vec<String> = names
            .iter()
            .map(|n| normalize_text(n))
            .filter(|n| !n.is_empty())
            .collect();
        tracing::debug!(wake_words = ?names, threshold, "wake word filter initialized");
        Self { names, threshold }
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Command following the wake word, or `None` if the transcript is not addressed to us
    ///
    /// A bare wake word yields `Some("")`.
    #[must_use]
    pub fn strip(&self, transcript: &str) -> Option<String> {
        let text = normalize_text(transcript);
        let mut words = text.split(' ');
        let first = words.next().filter(|w| !w.is_empty())?;

        let matched = self.names.iter().any(|name| ratio(first, name) > self.threshold);
        if !matched {
            tracing::trace!(first, "no wake word");
            return None;
        }

        let command = words.collect::<Vec<_>>().join(" ");
        tracing::debug!(wake_word = first, command = %command, "wake word detected");
        Some(command)
    }
}

impl Default for WakeWordFilter {
    fn default() -> Self {
        Self::new(vec!["геля".to_string(), "ангелина".to_string()], DEFAULT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_exact_name() {
        let filter = WakeWordFilter::default();
        assert_eq!(filter.strip("Геля, включи свет").as_deref(), Some("включи свет"));
        assert_eq!(filter.strip("Ангелина пауза").as_deref(), Some("пауза"));
    }

    #[test]
    fn test_strip_misheard_name() {
        let filter = WakeWordFilter::default();
        assert_eq!(filter.strip("гела громче").as_deref(), Some("громче"));
        assert_eq!(filter.strip("ангелине тише").as_deref(), Some("тише"));
    }

    #[test]
    fn test_not_addressed() {
        let filter = WakeWordFilter::default();
        assert_eq!(filter.strip("включи свет"), None);
        assert_eq!(filter.strip(""), None);
        assert_eq!(filter.strip("   "), None);
    }

    #[test]
    fn test_bare_wake_word() {
        let filter = WakeWordFilter::default();
        assert_eq!(filter.strip("Геля!").as_deref(), Some(""));
    }

    #[test]
    fn test_names_normalized() {
        let filter = WakeWordFilter::new(vec!["  Домовой ".into(), String::new()], 45);
        assert_eq!(filter.names(), ["домовой"]);
    }
}
