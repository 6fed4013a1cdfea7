// ESPN scoreboard/summary client and wire-model conversion.
//
// The site API serves a day's scoreboard and a per-game summary whose
// `plays` array is the play-by-play. Only the fields the analysis needs are
// modelled; everything is defaulted so partial payloads still decode.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use hoopscope_core::{Coordinate, Play};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Coordinates beyond this magnitude are the feed's "not located" sentinel
/// (it sends values like -214748340) and are dropped.
const MAX_COORDINATE: f64 = 1_000.0;

/// Scoreboard state of a game in progress.
pub const STATE_LIVE: &str = "in";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Scoreboard wire model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoreboardResponse {
    #[serde(default)]
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default)]
    pub competitions: Vec<Competition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStatus {
    #[serde(default, rename = "type")]
    pub kind: StatusType,
    #[serde(default)]
    pub period: u32,
    #[serde(default)]
    pub display_clock: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusType {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Competition {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub competitors: Vec<Competitor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Competitor {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub team: Team,
    #[serde(default)]
    pub home_away: String,
    #[serde(default)]
    pub score: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub abbreviation: String,
}

// ---------------------------------------------------------------------------
// Summary wire model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GameSummary {
    #[serde(default)]
    pub plays: Vec<WirePlay>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePlay {
    pub id: String,
    #[serde(default)]
    pub sequence_number: String,
    #[serde(default, rename = "type")]
    pub kind: WirePlayType,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub away_score: u32,
    #[serde(default)]
    pub home_score: u32,
    #[serde(default)]
    pub period: WirePeriod,
    #[serde(default)]
    pub clock: WireClock,
    #[serde(default)]
    pub scoring_play: bool,
    #[serde(default)]
    pub score_value: u32,
    #[serde(default)]
    pub shooting_play: bool,
    #[serde(default)]
    pub coordinate: Option<WireCoordinate>,
    #[serde(default)]
    pub team: Option<WireTeamRef>,
    #[serde(default)]
    pub participants: Vec<WireParticipant>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WirePlayType {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePeriod {
    #[serde(default)]
    pub number: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireClock {
    #[serde(default)]
    pub display_value: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WireCoordinate {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireTeamRef {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireParticipant {
    #[serde(default)]
    pub athlete: WireAthlete,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireAthlete {
    #[serde(default)]
    pub id: String,
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// One game as stored in the `games` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: String,
    pub date: String,
    pub name: String,
    pub home_team_id: String,
    pub home_team_name: String,
    pub away_team_id: String,
    pub away_team_name: String,
    pub status: String,
    pub current_period: u32,
    pub current_clock: String,
    pub home_score: u32,
    pub away_score: u32,
    pub last_updated: DateTime<Utc>,
}

impl GameRecord {
    pub fn is_live(&self) -> bool {
        self.status == STATE_LIVE
    }

    /// `YYYY-MM-DD` part of the start time ("2025-01-18T21:00Z"), or the
    /// whole string when it is shorter.
    pub fn day(&self) -> &str {
        self.date.get(..10).unwrap_or(&self.date)
    }
}

impl Event {
    /// Flatten the event and its first competition into a `GameRecord`.
    /// Returns `None` for events without a competition.
    pub fn to_game_record(&self, now: DateTime<Utc>) -> Option<GameRecord> {
        let competition = self.competitions.first()?;
        let mut game = GameRecord {
            id: self.id.clone(),
            date: self.date.clone(),
            name: self.name.clone(),
            home_team_id: String::new(),
            home_team_name: String::new(),
            away_team_id: String::new(),
            away_team_name: String::new(),
            status: self.status.kind.state.clone(),
            current_period: self.status.period,
            current_clock: self.status.display_clock.clone(),
            home_score: 0,
            away_score: 0,
            last_updated: now,
        };

        for competitor in &competition.competitors {
            let score = competitor.score.trim().parse().unwrap_or(0);
            if competitor.home_away == "home" {
                game.home_team_id.clone_from(&competitor.team.id);
                game.home_team_name.clone_from(&competitor.team.display_name);
                game.home_score = score;
            } else {
                game.away_team_id.clone_from(&competitor.team.id);
                game.away_team_name.clone_from(&competitor.team.display_name);
                game.away_score = score;
            }
        }

        Some(game)
    }
}

impl ScoreboardResponse {
    pub fn games(&self, now: DateTime<Utc>) -> Vec<GameRecord> {
        self.events
            .iter()
            .filter_map(|event| event.to_game_record(now))
            .collect()
    }
}

impl WirePlay {
    pub fn to_play(&self) -> Play {
        let sequence_number = self.sequence_number.trim().parse().unwrap_or_else(|_| {
            warn!(
                play_id = %self.id,
                sequence_number = %self.sequence_number,
                "unparseable sequence number, using 0"
            );
            0
        });

        let coordinate = self
            .coordinate
            .filter(|c| c.x.abs() <= MAX_COORDINATE && c.y.abs() <= MAX_COORDINATE)
            .map(|c| Coordinate { x: c.x, y: c.y });

        Play {
            id: self.id.clone(),
            sequence_number,
            type_label: self.kind.text.clone(),
            text: self.text.clone(),
            period: self.period.number,
            clock: self.clock.display_value.clone(),
            home_score: self.home_score,
            away_score: self.away_score,
            scoring_play: self.scoring_play,
            score_value: self.score_value,
            shooting_play: self.shooting_play,
            coordinate,
            team_id: self
                .team
                .as_ref()
                .map(|t| t.id.clone())
                .filter(|id| !id.is_empty()),
            // Position is meaningful (actor first, then passer), so a blank
            // id ends the list rather than shifting later athletes forward.
            participants: self
                .participants
                .iter()
                .map(|p| p.athlete.id.clone())
                .take_while(|id| !id.is_empty())
                .collect(),
        }
    }
}

impl GameSummary {
    /// Normalized plays in sequence order.
    pub fn plays(&self) -> Vec<Play> {
        let mut plays: Vec<Play> = self.plays.iter().map(WirePlay::to_play).collect();
        plays.sort_by_key(|p| p.sequence_number);
        plays
    }
}

/// Decode a scoreboard payload. `null` decodes as an empty scoreboard.
pub fn parse_scoreboard_json(raw: &str) -> Result<ScoreboardResponse, serde_json::Error> {
    Ok(serde_json::from_str::<Option<ScoreboardResponse>>(raw)?.unwrap_or_default())
}

/// Decode a game summary payload. `null` decodes as a summary with no plays.
pub fn parse_summary_json(raw: &str) -> Result<GameSummary, serde_json::Error> {
    Ok(serde_json::from_str::<Option<GameSummary>>(raw)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Source of scoreboards and play-by-play. Implemented by `EspnClient`;
/// tests substitute canned payloads.
#[async_trait]
pub trait GameFeed: Send + Sync {
    async fn scoreboard(&self, date: NaiveDate) -> Result<ScoreboardResponse, FeedError>;
    async fn summary(&self, game_id: &str) -> Result<GameSummary, FeedError>;
}

/// HTTP client for the ESPN site API.
pub struct EspnClient {
    http: reqwest::Client,
    base_url: String,
    league_path: String,
}

impl EspnClient {
    pub fn new(base_url: &str, league_path: &str, timeout: Duration) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Http {
                url: base_url.to_string(),
                source: e,
            })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            league_path: league_path.trim_matches('/').to_string(),
        })
    }

    pub fn scoreboard_url(&self, date: NaiveDate) -> String {
        format!(
            "{}/{}/scoreboard?dates={}&limit=500",
            self.base_url,
            self.league_path,
            date.format("%Y%m%d")
        )
    }

    pub fn summary_url(&self, game_id: &str) -> String {
        format!("{}/{}/summary?event={}", self.base_url, self.league_path, game_id)
    }

    async fn get_text(&self, url: &str) -> Result<String, FeedError> {
        let response = self.http.get(url).send().await.map_err(|e| FeedError::Http {
            url: url.to_string(),
            source: e,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| FeedError::Http {
            url: url.to_string(),
            source: e,
        })
    }
}

#[async_trait]
impl GameFeed for EspnClient {
    async fn scoreboard(&self, date: NaiveDate) -> Result<ScoreboardResponse, FeedError> {
        let url = self.scoreboard_url(date);
        let body = self.get_text(&url).await?;
        let scoreboard = parse_scoreboard_json(&body).map_err(|e| FeedError::Decode {
            url: url.clone(),
            source: e,
        })?;
        debug!(%url, events = scoreboard.events.len(), "fetched scoreboard");
        Ok(scoreboard)
    }

    async fn summary(&self, game_id: &str) -> Result<GameSummary, FeedError> {
        let url = self.summary_url(game_id);
        let body = self.get_text(&url).await?;
        let summary = parse_summary_json(&body).map_err(|e| FeedError::Decode {
            url: url.clone(),
            source: e,
        })?;
        debug!(%url, plays = summary.plays.len(), "fetched game summary");
        Ok(summary)
    }
}
