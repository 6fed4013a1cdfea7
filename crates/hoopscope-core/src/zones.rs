// Court-zone classification and per-player zone shooting splits.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::play::Play;
use crate::stats::{check_line, percentage, StatsError};

// ---------------------------------------------------------------------------
// Zones
// ---------------------------------------------------------------------------

/// Named shooting regions of the court.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Zone {
    #[serde(rename = "left_corner_3")]
    LeftCornerThree,
    #[serde(rename = "right_corner_3")]
    RightCornerThree,
    #[serde(rename = "left_wing_3")]
    LeftWingThree,
    #[serde(rename = "right_wing_3")]
    RightWingThree,
    #[serde(rename = "top_key_3")]
    TopOfKeyThree,
    #[serde(rename = "paint")]
    Paint,
    #[serde(rename = "mid_range")]
    MidRange,
}

impl Zone {
    pub const ALL: [Zone; 7] = [
        Zone::LeftCornerThree,
        Zone::RightCornerThree,
        Zone::LeftWingThree,
        Zone::RightWingThree,
        Zone::TopOfKeyThree,
        Zone::Paint,
        Zone::MidRange,
    ];

    /// Storage key, identical to the serde name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::LeftCornerThree => "left_corner_3",
            Zone::RightCornerThree => "right_corner_3",
            Zone::LeftWingThree => "left_wing_3",
            Zone::RightWingThree => "right_wing_3",
            Zone::TopOfKeyThree => "top_key_3",
            Zone::Paint => "paint",
            Zone::MidRange => "mid_range",
        }
    }

    /// Human-readable name used in insight messages.
    pub fn label(&self) -> &'static str {
        match self {
            Zone::LeftCornerThree => "the left corner",
            Zone::RightCornerThree => "the right corner",
            Zone::LeftWingThree => "the left wing",
            Zone::RightWingThree => "the right wing",
            Zone::TopOfKeyThree => "the top of the key",
            Zone::Paint => "the paint",
            Zone::MidRange => "mid-range",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a shot coordinate to its zone.
///
/// Rectangles are tested in order and the first hit wins, so the later,
/// wider regions only catch what the earlier ones leave. Every point lands
/// somewhere; `MidRange` is the fallback.
pub fn classify(x: f64, y: f64) -> Zone {
    if x < 10.0 && y < 10.0 {
        Zone::LeftCornerThree
    } else if x > 40.0 && y < 10.0 {
        Zone::RightCornerThree
    } else if x < 20.0 && y > 10.0 && y < 24.0 {
        Zone::LeftWingThree
    } else if x > 30.0 && y > 10.0 && y < 24.0 {
        Zone::RightWingThree
    } else if (20.0..=30.0).contains(&x) && y > 20.0 {
        Zone::TopOfKeyThree
    } else if (15.0..=35.0).contains(&x) && y < 10.0 {
        Zone::Paint
    } else {
        Zone::MidRange
    }
}

// ---------------------------------------------------------------------------
// Zone stats
// ---------------------------------------------------------------------------

/// Makes and attempts from one zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneLine {
    pub makes: u32,
    pub attempts: u32,
    pub pct: f64,
}

impl ZoneLine {
    fn record(&mut self, made: bool) {
        self.attempts += 1;
        if made {
            self.makes += 1;
        }
    }

    pub fn check(&self, zone: Zone) -> Result<(), StatsError> {
        check_line(zone.as_str(), self.makes, self.attempts, self.pct)
    }
}

/// One player's zone splits for a game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerZoneStats {
    pub player_id: String,
    pub team_id: String,
    pub zones: BTreeMap<Zone, ZoneLine>,
}

impl PlayerZoneStats {
    pub fn finalize(&mut self) {
        for line in self.zones.values_mut() {
            line.pct = percentage(line.makes, line.attempts);
        }
    }
}

/// Fold located shooting plays into per-player zone splits.
///
/// Only plays with the shooting flag, a coordinate and a participant are
/// counted; everything else is ignored. A make is any scoring play, so
/// free throws with a coordinate count like field goals.
pub fn zone_stats(plays: &[Play]) -> BTreeMap<String, PlayerZoneStats> {
    let mut stats: BTreeMap<String, PlayerZoneStats> = BTreeMap::new();
    let mut unlocated = 0usize;

    for play in plays {
        if !play.shooting_play {
            continue;
        }
        let Some(location) = play.shot_location() else {
            unlocated += 1;
            continue;
        };
        let Some(player_id) = play.primary_participant() else {
            continue;
        };

        let entry = stats
            .entry(player_id.to_string())
            .or_insert_with(|| PlayerZoneStats {
                player_id: player_id.to_string(),
                team_id: play.team_id.clone().unwrap_or_default(),
                zones: BTreeMap::new(),
            });
        entry
            .zones
            .entry(classify(location.x, location.y))
            .or_default()
            .record(play.scoring_play);
    }

    for entry in stats.values_mut() {
        entry.finalize();
    }

    debug!(players = stats.len(), unlocated, "computed zone stats");
    stats
}
