// One-shot analysis of a game's full play list.
//
// Every call recomputes all aggregates from scratch: O(plays) work per
// invocation and no state carried between calls. Re-running on the same
// plays with the same timestamp gives identical output.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::insights::{generate, Insight, InsightThresholds};
use crate::play::Play;
use crate::stats::{aggregate, PlayerGameStats};
use crate::zones::{zone_stats, PlayerZoneStats};

/// Everything derived from one game's plays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameAnalysis {
    pub game_id: String,
    pub player_stats: BTreeMap<String, PlayerGameStats>,
    pub zone_stats: BTreeMap<String, PlayerZoneStats>,
    pub insights: Vec<Insight>,
}

/// Run the aggregator, the zone classifier and the rule engine over `plays`.
///
/// `plays` must be in sequence order; the momentum rule reads the tail of
/// the slice as the most recent plays.
pub fn analyze_game(
    game_id: &str,
    plays: &[Play],
    thresholds: &InsightThresholds,
    generated_at: DateTime<Utc>,
) -> GameAnalysis {
    let player_stats = aggregate(plays);
    let zone_stats = zone_stats(plays);
    let insights = generate(game_id, plays, &player_stats, &zone_stats, thresholds, generated_at);

    debug!(
        game_id,
        plays = plays.len(),
        players = player_stats.len(),
        zone_players = zone_stats.len(),
        insights = insights.len(),
        "analyzed game"
    );

    GameAnalysis {
        game_id: game_id.to_string(),
        player_stats,
        zone_stats,
        insights,
    }
}
