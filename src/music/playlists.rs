//! Playlist name matching

use crate::resolver::fuzzy::ratio;

/// Minimum fuzzy score for a loose match
const MIN_FUZZY: u8 = 50;

/// Candidate playlist with its score
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistMatch {
    pub name: String,
    pub score: u8,
}

/// Pick the playlist that best matches a spoken name
///
/// Exact name scores 100, the request contained in a name 90, a name
/// contained in the request 85, otherwise the fuzzy ratio if at least 50.
/// Equal scores keep the earlier playlist.
#[must_use]
pub fn best_playlist_match<S: AsRef<str>>(requested: &str, available: &[S]) -> Option<PlaylistMatch> {
    let requested = requested.trim().to_lowercase();
    if requested.is_empty() {
        return None;
    }

    let mut best: Option<PlaylistMatch> = None;
    for name in available {
        let name = name.as_ref();
        let lower = name.to_lowercase();
        let score = if lower == requested {
            100
        } else if lower.contains(&requested) {
            90
        } else if requested.contains(&lower) {
            85
        } else {
            let score = ratio(&requested, &lower);
            if score < MIN_FUZZY {
                continue;
            }
            score
        };

        if best.as_ref().is_none_or(|b| score > b.score) {
            best = Some(PlaylistMatch {
                name: name.to_string(),
                score,
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYLISTS: &[&str] = &["всякое", "Рок", "рок на кухне", "джаз", "для бега"];

    #[test]
    fn test_exact_beats_partial() {
        let m = best_playlist_match("рок", PLAYLISTS).unwrap();
        assert_eq!(m.name, "Рок");
        assert_eq!(m.score, 100);
    }

    #[test]
    fn test_request_inside_name() {
        let m = best_playlist_match("кухне", PLAYLISTS).unwrap();
        assert_eq!(m.name, "рок на кухне");
        assert_eq!(m.score, 90);
    }

    #[test]
    fn test_name_inside_request() {
        let m = best_playlist_match("плейлист для бега пожалуйста", PLAYLISTS).unwrap();
        assert_eq!(m.name, "для бега");
        assert_eq!(m.score, 85);
    }

    #[test]
    fn test_fuzzy_and_no_match() {
        let m = best_playlist_match("джас", PLAYLISTS).unwrap();
        assert_eq!(m.name, "джаз");
        assert_eq!(m.score, 75);

        assert_eq!(best_playlist_match("классика", PLAYLISTS), None);
        assert_eq!(best_playlist_match("  ", PLAYLISTS), None);
    }
}
