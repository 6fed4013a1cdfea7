// Insight rule engine: threshold rules over the aggregates and recent plays.
//
// Rules run in a fixed group order (hot/cold players, zones, momentum,
// struggling players). Within a group, players, zones and teams are visited
// in sorted key order, so a given input always yields the same list.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::names::{extract_player_names, UNKNOWN_PLAYER};
use crate::play::Play;
use crate::stats::PlayerGameStats;
use crate::zones::{PlayerZoneStats, Zone, ZoneLine};

// ---------------------------------------------------------------------------
// Insight records
// ---------------------------------------------------------------------------

/// Rule that produced an insight. Serialized as the stored type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    PlayerHot,
    PlayerCold,
    ThreePointHot,
    ZoneCold,
    ZoneHot,
    MomentumRun,
    TurnoverTrouble,
    FoulTrouble,
}

impl InsightKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightKind::PlayerHot => "player_hot",
            InsightKind::PlayerCold => "player_cold",
            InsightKind::ThreePointHot => "three_point_hot",
            InsightKind::ZoneCold => "zone_cold",
            InsightKind::ZoneHot => "zone_hot",
            InsightKind::MomentumRun => "momentum_run",
            InsightKind::TurnoverTrouble => "turnover_trouble",
            InsightKind::FoulTrouble => "foul_trouble",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "player_hot" => Some(InsightKind::PlayerHot),
            "player_cold" => Some(InsightKind::PlayerCold),
            "three_point_hot" => Some(InsightKind::ThreePointHot),
            "zone_cold" => Some(InsightKind::ZoneCold),
            "zone_hot" => Some(InsightKind::ZoneHot),
            "momentum_run" => Some(InsightKind::MomentumRun),
            "turnover_trouble" => Some(InsightKind::TurnoverTrouble),
            "foul_trouble" => Some(InsightKind::FoulTrouble),
            _ => None,
        }
    }

    pub fn category(&self) -> InsightCategory {
        match self {
            InsightKind::PlayerHot | InsightKind::PlayerCold | InsightKind::ThreePointHot => {
                InsightCategory::Shooting
            }
            InsightKind::ZoneCold | InsightKind::ZoneHot => InsightCategory::ZoneShooting,
            InsightKind::MomentumRun => InsightCategory::Momentum,
            InsightKind::TurnoverTrouble => InsightCategory::Turnovers,
            InsightKind::FoulTrouble => InsightCategory::Fouls,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            InsightKind::PlayerCold | InsightKind::ZoneCold | InsightKind::TurnoverTrouble => {
                Severity::Medium
            }
            InsightKind::PlayerHot
            | InsightKind::ThreePointHot
            | InsightKind::ZoneHot
            | InsightKind::MomentumRun
            | InsightKind::FoulTrouble => Severity::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    Shooting,
    ZoneShooting,
    Momentum,
    Turnovers,
    Fouls,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }
}

/// The numbers that triggered an insight. Untagged, so each variant
/// serializes to a flat object with the stored field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InsightEvidence {
    FieldGoals { fgm: u32, fga: u32, fg_pct: f64 },
    ThreePoint { three_pm: u32, three_pa: u32, three_pct: f64 },
    Zone { makes: u32, attempts: u32, pct: f64 },
    Run { points: u32, play_count: usize },
    Turnovers { turnovers: u32 },
    Fouls { fouls: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<Zone>,
    pub stats: InsightEvidence,
}

/// A rule-triggered alert about one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub game_id: String,
    pub timestamp: DateTime<Utc>,
    /// Period and clock of the latest play when the insight was generated.
    pub game_clock: String,
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub category: InsightCategory,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub context: InsightContext,
}

impl Insight {
    /// Key for order-insensitive comparisons of insight lists.
    pub fn sort_key(&self) -> (InsightKind, Option<&str>, Option<&str>, Option<Zone>) {
        (
            self.kind,
            self.context.player_id.as_deref(),
            self.context.team_id.as_deref(),
            self.context.zone,
        )
    }
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum ThresholdError {
    #[error("threshold `{field}` must be greater than 0")]
    Zero { field: &'static str },

    #[error("threshold `{field}` must be between 0 and 100, got {value}")]
    PercentOutOfRange { field: &'static str, value: f64 },

    #[error("momentum window ({window}) must not be smaller than the minimum play count ({min_plays})")]
    WindowTooSmall { window: usize, min_plays: usize },
}

/// Numeric triggers for every rule. Percentages are on the 0..=100 scale
/// and comparisons are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightThresholds {
    pub hot_min_attempts: u32,
    pub hot_min_pct: f64,
    pub cold_min_attempts: u32,
    pub cold_max_pct: f64,
    pub three_min_attempts: u32,
    pub three_min_pct: f64,
    pub zone_min_attempts: u32,
    pub zone_hot_min_pct: f64,
    /// Momentum is not evaluated for games with fewer plays than this.
    pub momentum_min_plays: usize,
    /// Number of trailing plays scanned for a scoring run.
    pub momentum_window: usize,
    pub momentum_min_points: u32,
    pub turnover_limit: u32,
    pub foul_limit: u32,
}

impl Default for InsightThresholds {
    fn default() -> Self {
        Self {
            hot_min_attempts: 5,
            hot_min_pct: 60.0,
            cold_min_attempts: 8,
            cold_max_pct: 30.0,
            three_min_attempts: 4,
            three_min_pct: 50.0,
            zone_min_attempts: 3,
            zone_hot_min_pct: 60.0,
            momentum_min_plays: 10,
            momentum_window: 20,
            momentum_min_points: 10,
            turnover_limit: 4,
            foul_limit: 4,
        }
    }
}

impl InsightThresholds {
    pub fn validate(&self) -> Result<(), ThresholdError> {
        let counts: &[(&'static str, usize)] = &[
            ("hot_min_attempts", self.hot_min_attempts as usize),
            ("cold_min_attempts", self.cold_min_attempts as usize),
            ("three_min_attempts", self.three_min_attempts as usize),
            ("zone_min_attempts", self.zone_min_attempts as usize),
            ("momentum_min_plays", self.momentum_min_plays),
            ("momentum_window", self.momentum_window),
            ("momentum_min_points", self.momentum_min_points as usize),
            ("turnover_limit", self.turnover_limit as usize),
            ("foul_limit", self.foul_limit as usize),
        ];
        for (field, value) in counts {
            if *value == 0 {
                return Err(ThresholdError::Zero { field });
            }
        }

        let percents: &[(&'static str, f64)] = &[
            ("hot_min_pct", self.hot_min_pct),
            ("cold_max_pct", self.cold_max_pct),
            ("three_min_pct", self.three_min_pct),
            ("zone_hot_min_pct", self.zone_hot_min_pct),
        ];
        for (field, value) in percents {
            if !(0.0..=100.0).contains(value) {
                return Err(ThresholdError::PercentOutOfRange {
                    field,
                    value: *value,
                });
            }
        }

        if self.momentum_window < self.momentum_min_plays {
            return Err(ThresholdError::WindowTooSmall {
                window: self.momentum_window,
                min_plays: self.momentum_min_plays,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Evaluates every rule for one game. Reads the aggregates, never mutates
/// them.
pub struct InsightGenerator<'a> {
    game_id: &'a str,
    plays: &'a [Play],
    player_stats: &'a BTreeMap<String, PlayerGameStats>,
    zone_stats: &'a BTreeMap<String, PlayerZoneStats>,
    thresholds: &'a InsightThresholds,
    names: BTreeMap<String, String>,
    generated_at: DateTime<Utc>,
    game_clock: String,
}

impl<'a> InsightGenerator<'a> {
    pub fn new(
        game_id: &'a str,
        plays: &'a [Play],
        player_stats: &'a BTreeMap<String, PlayerGameStats>,
        zone_stats: &'a BTreeMap<String, PlayerZoneStats>,
        thresholds: &'a InsightThresholds,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            game_id,
            plays,
            player_stats,
            zone_stats,
            thresholds,
            names: extract_player_names(plays),
            generated_at,
            game_clock: plays.last().map(Play::game_clock).unwrap_or_default(),
        }
    }

    /// Run every rule group in order.
    pub fn generate(&self) -> Vec<Insight> {
        let players = self.checked_players();
        let mut insights = Vec::new();
        insights.extend(self.detect_hot_cold_players(&players));
        insights.extend(self.detect_zone_performance());
        insights.extend(self.detect_momentum());
        insights.extend(self.detect_struggling(&players));
        debug!(
            game_id = self.game_id,
            count = insights.len(),
            "generated insights"
        );
        insights
    }

    fn player_name(&self, player_id: &str) -> &str {
        self.names
            .get(player_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_PLAYER)
    }

    fn insight(&self, kind: InsightKind, title: String, message: String, context: InsightContext) -> Insight {
        Insight {
            game_id: self.game_id.to_string(),
            timestamp: self.generated_at,
            game_clock: self.game_clock.clone(),
            kind,
            category: kind.category(),
            severity: kind.severity(),
            title,
            message,
            context,
        }
    }

    /// Player lines that pass the consistency check, in player id order.
    /// Bad lines are logged and left out so the remaining players are still
    /// evaluated.
    fn checked_players(&self) -> Vec<(&'a str, &'a PlayerGameStats)> {
        self.player_stats
            .iter()
            .filter(|(player_id, stats)| match stats.check() {
                Ok(()) => true,
                Err(e) => {
                    warn!(game_id = self.game_id, player_id = %player_id, "skipping player stats: {}", e);
                    false
                }
            })
            .map(|(player_id, stats)| (player_id.as_str(), stats))
            .collect()
    }

    fn player_context(player_id: &str, team_id: &str, stats: InsightEvidence) -> InsightContext {
        InsightContext {
            team_id: (!team_id.is_empty()).then(|| team_id.to_string()),
            player_id: Some(player_id.to_string()),
            zone: None,
            stats,
        }
    }

    fn detect_hot_cold_players(&self, players: &[(&str, &PlayerGameStats)]) -> Vec<Insight> {
        let t = self.thresholds;
        let mut insights = Vec::new();

        for &(player_id, s) in players {
            let name = self.player_name(player_id);
            let field_goals = || InsightEvidence::FieldGoals {
                fgm: s.fgm,
                fga: s.fga,
                fg_pct: s.fg_pct,
            };
            let fg_line = format!(
                "{name} shooting {}-{} ({:.0}%) from the field",
                s.fgm, s.fga, s.fg_pct
            );

            if s.fga >= t.hot_min_attempts && s.fg_pct >= t.hot_min_pct {
                insights.push(self.insight(
                    InsightKind::PlayerHot,
                    format!("{name} on Fire"),
                    fg_line.clone(),
                    Self::player_context(player_id, &s.team_id, field_goals()),
                ));
            }

            if s.fga >= t.cold_min_attempts && s.fg_pct <= t.cold_max_pct {
                insights.push(self.insight(
                    InsightKind::PlayerCold,
                    format!("{name} Struggling"),
                    fg_line,
                    Self::player_context(player_id, &s.team_id, field_goals()),
                ));
            }

            if s.three_pa >= t.three_min_attempts && s.three_pct >= t.three_min_pct {
                insights.push(self.insight(
                    InsightKind::ThreePointHot,
                    format!("{name} Lights Out from Three"),
                    format!(
                        "{name} shooting {}-{} ({:.0}%) from beyond the arc",
                        s.three_pm, s.three_pa, s.three_pct
                    ),
                    Self::player_context(
                        player_id,
                        &s.team_id,
                        InsightEvidence::ThreePoint {
                            three_pm: s.three_pm,
                            three_pa: s.three_pa,
                            three_pct: s.three_pct,
                        },
                    ),
                ));
            }
        }

        insights
    }

    fn zone_context(player_id: &str, team_id: &str, zone: Zone, line: &ZoneLine) -> InsightContext {
        InsightContext {
            zone: Some(zone),
            ..Self::player_context(
                player_id,
                team_id,
                InsightEvidence::Zone {
                    makes: line.makes,
                    attempts: line.attempts,
                    pct: line.pct,
                },
            )
        }
    }

    fn detect_zone_performance(&self) -> Vec<Insight> {
        let t = self.thresholds;
        let mut insights = Vec::new();

        for (player_id, zones) in self.zone_stats {
            let name = self.player_name(player_id);

            for (&zone, line) in &zones.zones {
                if let Err(e) = line.check(zone) {
                    warn!(game_id = self.game_id, player_id = %player_id, "skipping zone line: {}", e);
                    continue;
                }
                if line.attempts < t.zone_min_attempts {
                    continue;
                }

                if line.makes == 0 {
                    insights.push(self.insight(
                        InsightKind::ZoneCold,
                        "Zone Ice Cold".to_string(),
                        format!("{name} 0-{} from {}", line.attempts, zone.label()),
                        Self::zone_context(player_id, &zones.team_id, zone, line),
                    ));
                }

                if line.pct >= t.zone_hot_min_pct {
                    insights.push(self.insight(
                        InsightKind::ZoneHot,
                        "Zone Dominant".to_string(),
                        format!(
                            "{name} {}-{} ({:.0}%) from {}",
                            line.makes,
                            line.attempts,
                            line.pct,
                            zone.label()
                        ),
                        Self::zone_context(player_id, &zones.team_id, zone, line),
                    ));
                }
            }
        }

        insights
    }

    fn detect_momentum(&self) -> Vec<Insight> {
        let t = self.thresholds;
        if self.plays.len() < t.momentum_min_plays {
            return Vec::new();
        }

        let window = &self.plays[self.plays.len().saturating_sub(t.momentum_window)..];
        let mut team_points: BTreeMap<&str, u32> = BTreeMap::new();
        for play in window {
            if !play.scoring_play {
                continue;
            }
            if let Some(team_id) = play.team_id.as_deref() {
                *team_points.entry(team_id).or_default() += play.score_value;
            }
        }

        team_points
            .into_iter()
            .filter(|(_, points)| *points >= t.momentum_min_points)
            .map(|(team_id, points)| {
                self.insight(
                    InsightKind::MomentumRun,
                    "Scoring Run".to_string(),
                    format!(
                        "Team on a run with {points} points in last {} plays",
                        window.len()
                    ),
                    InsightContext {
                        team_id: Some(team_id.to_string()),
                        player_id: None,
                        zone: None,
                        stats: InsightEvidence::Run {
                            points,
                            play_count: window.len(),
                        },
                    },
                )
            })
            .collect()
    }

    fn detect_struggling(&self, players: &[(&str, &PlayerGameStats)]) -> Vec<Insight> {
        let t = self.thresholds;
        let mut insights = Vec::new();

        for &(player_id, s) in players {
            let name = self.player_name(player_id);

            if s.turnovers >= t.turnover_limit {
                insights.push(self.insight(
                    InsightKind::TurnoverTrouble,
                    format!("{name} Turnover Issues"),
                    format!("{name} with {} turnovers", s.turnovers),
                    Self::player_context(
                        player_id,
                        &s.team_id,
                        InsightEvidence::Turnovers {
                            turnovers: s.turnovers,
                        },
                    ),
                ));
            }

            if s.fouls >= t.foul_limit {
                insights.push(self.insight(
                    InsightKind::FoulTrouble,
                    format!("{name} in Foul Trouble"),
                    format!("{name} with {} fouls", s.fouls),
                    Self::player_context(
                        player_id,
                        &s.team_id,
                        InsightEvidence::Fouls { fouls: s.fouls },
                    ),
                ));
            }
        }

        insights
    }
}

/// Evaluate every rule for `game_id`. See [`InsightGenerator`].
pub fn generate(
    game_id: &str,
    plays: &[Play],
    player_stats: &BTreeMap<String, PlayerGameStats>,
    zone_stats: &BTreeMap<String, PlayerZoneStats>,
    thresholds: &InsightThresholds,
    generated_at: DateTime<Utc>,
) -> Vec<Insight> {
    InsightGenerator::new(game_id, plays, player_stats, zone_stats, thresholds, generated_at)
        .generate()
}
