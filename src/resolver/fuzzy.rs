//! String similarity scores in `0..=100`
//!
//! All scores work on Unicode scalar values, so Cyrillic letters count as
//! one unit each. `ratio` is the indel-normalised similarity
//! `2·LCS / (|a| + |b|)`; the other scores are built from it.

use std::collections::BTreeSet;

fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut row = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            row[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                row[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[b.len()]
}

fn ratio_chars(a: &[char], b: &[char]) -> u8 {
    let total = a.len() + b.len();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let score = (200 * lcs_len(a, b) + total / 2) / total;
    u8::try_from(score.min(100)).unwrap_or(100)
}

/// Whole-string similarity
#[must_use]
pub fn ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_chars(&a, &b)
}

/// Best [`ratio`] of the shorter string against any equally long window of the longer
#[must_use]
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return 0;
    }

    let mut best = 0;
    for window in long.windows(short.len()) {
        best = best.max(ratio_chars(&short, window));
        if best == 100 {
            break;
        }
    }
    best
}

/// Best [`ratio`] of `phrase` against runs of whole words in `text`
///
/// Runs are one word shorter to one word longer than the phrase, which
/// tolerates a word split or merged by the recogniser. Unlike
/// [`partial_ratio`], a short phrase never matches a fragment of a longer
/// word: "свет" scores 53 against "светомузыку", not 100.
#[must_use]
pub fn word_ratio(phrase: &str, text: &str) -> u8 {
    let phrase_len = phrase.split_whitespace().count();
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= phrase_len {
        return ratio(phrase, text);
    }

    let phrase: Vec<char> = phrase.chars().collect();
    let mut best = 0;
    for run in phrase_len.saturating_sub(1).max(1)..=phrase_len + 1 {
        for window in words.windows(run) {
            let candidate: Vec<char> = window.join(" ").chars().collect();
            best = best.max(ratio_chars(&phrase, &candidate));
            if best == 100 {
                return best;
            }
        }
    }
    best
}

/// Similarity of the word sets, insensitive to order and repetition
///
/// The shared words are compared against each side's full word set, so a
/// phrase contained word-for-word in a longer one scores 100.
#[must_use]
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    let words_a: BTreeSet<&str> = a.split_whitespace().collect();
    let words_b: BTreeSet<&str> = b.split_whitespace().collect();
    if words_a.is_empty() || words_b.is_empty() {
        return 0;
    }

    let join = |words: Vec<&str>| words.join(" ");
    let shared = join(words_a.intersection(&words_b).copied().collect());
    let only_a = join(words_a.difference(&words_b).copied().collect());
    let only_b = join(words_b.difference(&words_a).copied().collect());

    let combined_a = format!("{shared} {only_a}").trim().to_string();
    let combined_b = format!("{shared} {only_b}").trim().to_string();

    ratio(&shared, &combined_a)
        .max(ratio(&shared, &combined_b))
        .max(ratio(&combined_a, &combined_b))
}

/// Number of distinct words present in both strings
#[must_use]
pub fn shared_words(a: &str, b: &str) -> usize {
    let words_a: BTreeSet<&str> = a.split_whitespace().collect();
    b.split_whitespace()
        .collect::<BTreeSet<_>>()
        .intersection(&words_a)
        .count()
}
