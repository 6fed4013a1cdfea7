// Player display names recovered from play descriptions.
//
// The play feed only carries athlete ids. Descriptions start with the
// acting player's name ("Jalen Brooks makes two point layup"), so the words
// before the first action verb are taken as the name.

use std::collections::BTreeMap;

use crate::play::Play;

/// Fallback when no description yielded a name.
pub const UNKNOWN_PLAYER: &str = "Player";

/// Descriptions that start with something other than a player name.
const SKIP_FRAGMENTS: &[&str] = &["Timeout", "Team Rebound", "Official", "End of"];
const SKIP_PREFIX: &str = "Foul on";

/// Lower-cased words that end the name.
const STOP_WORDS: &[&str] = &[
    "makes",
    "misses",
    "with",
    "turnover",
    "bad",
    "subbing",
    "defensive",
    "offensive",
    "block.",
    "steal.",
    "rebound.",
];

/// Name at the head of a description, if it looks like one (two words or
/// more before an action word).
pub fn name_from_text(text: &str) -> Option<String> {
    if SKIP_FRAGMENTS.iter().any(|f| text.contains(f)) || text.starts_with(SKIP_PREFIX) {
        return None;
    }

    let words: Vec<&str> = text
        .split_whitespace()
        .take_while(|w| !STOP_WORDS.contains(&w.to_lowercase().as_str()))
        .collect();
    if words.len() < 2 {
        return None;
    }

    let name = words.join(" ");
    Some(name.trim_end_matches('.').to_string())
}

/// Display name for every primary participant whose descriptions yield one.
/// Later plays overwrite earlier ones.
pub fn extract_player_names(plays: &[Play]) -> BTreeMap<String, String> {
    let mut names = BTreeMap::new();
    for play in plays {
        let Some(player_id) = play.primary_participant() else {
            continue;
        };
        if let Some(name) = name_from_text(&play.text) {
            names.insert(player_id.to_string(), name);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::play::fixtures::play;

    #[test]
    fn name_stops_at_action_word() {
        assert_eq!(
            name_from_text("Jalen Brooks makes two point layup").as_deref(),
            Some("Jalen Brooks")
        );
        assert_eq!(
            name_from_text("Tre' Mitchell Defensive Rebound.").as_deref(),
            Some("Tre' Mitchell")
        );
        assert_eq!(
            name_from_text("Marcus Lee Jr. with a turnover").as_deref(),
            Some("Marcus Lee Jr")
        );
    }

    #[test]
    fn skips_non_player_descriptions() {
        assert_eq!(name_from_text("Foul on Jalen Brooks."), None);
        assert_eq!(name_from_text("Duke Timeout"), None);
        assert_eq!(name_from_text("End of 1st half"), None);
        assert_eq!(name_from_text("UNC Team Rebound"), None);
        assert_eq!(name_from_text("Official TV Timeout"), None);
    }

    #[test]
    fn single_word_is_not_a_name() {
        assert_eq!(name_from_text("Brooks makes layup"), None);
        assert_eq!(name_from_text(""), None);
    }

    #[test]
    fn later_plays_overwrite() {
        let plays = vec![
            play(1, "JumpShot", "J. Brooks makes jumper", "p1", "t1"),
            play(2, "JumpShot", "Jalen Brooks misses jumper", "p1", "t1"),
            play(3, "ShortTimeOut", "Duke Timeout", "p2", "t2"),
        ];
        let names = extract_player_names(&plays);
        assert_eq!(names.get("p1").map(String::as_str), Some("Jalen Brooks"));
        assert!(!names.contains_key("p2"));
    }
}
