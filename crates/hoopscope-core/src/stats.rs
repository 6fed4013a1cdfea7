// Box-score aggregation: folds a game's plays into per-player counters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::keywords::{categorize, is_made, is_three, mentions_assist, StatCategory};
use crate::play::Play;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// An aggregate record that violates the makes/attempts invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    #[error("{category}: {makes} makes exceeds {attempts} attempts")]
    MakesExceedAttempts {
        category: String,
        makes: u32,
        attempts: u32,
    },

    #[error("{category}: percentage {value} is outside 0..=100")]
    InvalidPercentage { category: String, value: f64 },
}

/// Make percentage on the 0..=100 scale; 0 when there were no attempts.
pub fn percentage(makes: u32, attempts: u32) -> f64 {
    if attempts == 0 {
        return 0.0;
    }
    f64::from(makes) / f64::from(attempts) * 100.0
}

/// Check one makes/attempts/percentage triple.
pub(crate) fn check_line(category: &str, makes: u32, attempts: u32, pct: f64) -> Result<(), StatsError> {
    if makes > attempts {
        return Err(StatsError::MakesExceedAttempts {
            category: category.to_string(),
            makes,
            attempts,
        });
    }
    if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
        return Err(StatsError::InvalidPercentage {
            category: category.to_string(),
            value: pct,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// PlayerGameStats
// ---------------------------------------------------------------------------

/// One player's box score for one game. Percentages are stored unrounded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerGameStats {
    pub player_id: String,
    /// Empty when no play attributed to the player named a team.
    pub team_id: String,
    pub points: u32,
    pub fgm: u32,
    pub fga: u32,
    pub fg_pct: f64,
    pub three_pm: u32,
    pub three_pa: u32,
    pub three_pct: f64,
    pub ftm: u32,
    pub fta: u32,
    pub ft_pct: f64,
    pub rebounds: u32,
    pub assists: u32,
    pub steals: u32,
    pub blocks: u32,
    pub turnovers: u32,
    pub fouls: u32,
}

impl PlayerGameStats {
    pub fn new(player_id: &str, team_id: Option<&str>) -> Self {
        Self {
            player_id: player_id.to_string(),
            team_id: team_id.unwrap_or_default().to_string(),
            ..Self::default()
        }
    }

    /// Recompute the three percentages from the counters.
    pub fn finalize(&mut self) {
        self.fg_pct = percentage(self.fgm, self.fga);
        self.three_pct = percentage(self.three_pm, self.three_pa);
        self.ft_pct = percentage(self.ftm, self.fta);
    }

    /// Verify the record is internally consistent before rules read it.
    pub fn check(&self) -> Result<(), StatsError> {
        check_line("field goals", self.fgm, self.fga, self.fg_pct)?;
        check_line("three pointers", self.three_pm, self.three_pa, self.three_pct)?;
        check_line("free throws", self.ftm, self.fta, self.ft_pct)?;
        if self.three_pa > self.fga {
            return Err(StatsError::MakesExceedAttempts {
                category: "three-point attempts within field goals".to_string(),
                makes: self.three_pa,
                attempts: self.fga,
            });
        }
        Ok(())
    }

    fn record_field_goal(&mut self, play: &Play) {
        let three = is_three(&play.text);
        if is_made(&play.text) {
            self.fgm += 1;
            self.points += play.score_value;
            if three {
                self.three_pm += 1;
            }
        }
        self.fga += 1;
        if three {
            self.three_pa += 1;
        }
    }

    fn record_free_throw(&mut self, play: &Play) {
        if is_made(&play.text) {
            self.ftm += 1;
            self.points += 1;
        }
        self.fta += 1;
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

fn line_for<'a>(
    stats: &'a mut BTreeMap<String, PlayerGameStats>,
    player_id: &str,
    play: &Play,
) -> &'a mut PlayerGameStats {
    let line = stats
        .entry(player_id.to_string())
        .or_insert_with(|| PlayerGameStats::new(player_id, play.team_id.as_deref()));
    if line.team_id.is_empty() {
        if let Some(team) = &play.team_id {
            line.team_id.clone_from(team);
        }
    }
    line
}

/// Fold a game's plays into one `PlayerGameStats` per player, keyed by
/// player id.
///
/// Plays without participants are skipped. Each play counts toward at most
/// one category of its primary participant (see `keywords::PLAY_RULES`).
///
/// Assists are checked on every play, after the category dispatch. On a shot
/// the assist goes to the second participant (the passer); a shot with no
/// second participant has an unattributable assist, which is dropped. Any
/// other play mentioning an assist credits its primary participant.
pub fn aggregate(plays: &[Play]) -> BTreeMap<String, PlayerGameStats> {
    let mut stats: BTreeMap<String, PlayerGameStats> = BTreeMap::new();
    let mut unattributed = 0usize;
    let mut uncategorized = 0usize;
    let mut unattributed_assists = 0usize;

    for play in plays {
        let Some(player_id) = play.primary_participant() else {
            unattributed += 1;
            continue;
        };

        let category = categorize(&play.type_label);
        let line = line_for(&mut stats, player_id, play);
        match category {
            Some(StatCategory::FieldGoal) => line.record_field_goal(play),
            Some(StatCategory::FreeThrow) => line.record_free_throw(play),
            Some(StatCategory::Rebound) => line.rebounds += 1,
            Some(StatCategory::Steal) => line.steals += 1,
            Some(StatCategory::Block) => line.blocks += 1,
            Some(StatCategory::Turnover) => line.turnovers += 1,
            Some(StatCategory::Foul) => line.fouls += 1,
            None => uncategorized += 1,
        }

        if mentions_assist(&play.text) {
            let credited = match category {
                Some(c) if c.is_shot() => play.secondary_participant(),
                _ => Some(player_id),
            };
            match credited {
                Some(id) => line_for(&mut stats, id, play).assists += 1,
                None => unattributed_assists += 1,
            }
        }
    }

    for line in stats.values_mut() {
        line.finalize();
    }

    debug!(
        plays = plays.len(),
        players = stats.len(),
        unattributed,
        uncategorized,
        unattributed_assists,
        "aggregated player stats"
    );
    stats
}
