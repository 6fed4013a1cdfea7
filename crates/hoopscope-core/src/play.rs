// Normalized play-by-play event.

use serde::{Deserialize, Serialize};

/// Shot location in feed court units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

/// One recorded game event.
///
/// Plays within a game are ordered by `sequence_number` (non-decreasing).
/// The first participant is the primary actor; a second participant is
/// present only for plays that credit another player (assists, blocks).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Play {
    pub id: String,
    pub sequence_number: u64,
    #[serde(rename = "type")]
    pub type_label: String,
    pub text: String,
    pub period: u32,
    pub clock: String,
    pub home_score: u32,
    pub away_score: u32,
    pub scoring_play: bool,
    pub score_value: u32,
    pub shooting_play: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<String>,
}

impl Play {
    /// The player a play is attributed to.
    pub fn primary_participant(&self) -> Option<&str> {
        self.participants.first().map(String::as_str)
    }

    pub fn secondary_participant(&self) -> Option<&str> {
        self.participants.get(1).map(String::as_str)
    }

    /// The coordinate of a shooting play. `None` for non-shooting plays and
    /// for shots the feed did not locate.
    pub fn shot_location(&self) -> Option<Coordinate> {
        if self.shooting_play {
            self.coordinate
        } else {
            None
        }
    }

    /// "P<period> <clock>" label used on insights.
    pub fn game_clock(&self) -> String {
        format!("P{} {}", self.period, self.clock)
    }
}
