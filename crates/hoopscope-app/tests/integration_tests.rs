// Integration tests for the poller: canned ESPN payloads in, stored
// aggregates and insights out.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use hoopscope_app::api::{create_router, ApiState};
use hoopscope_app::db::{Database, InsightFilter};
use hoopscope_app::espn::{
    parse_scoreboard_json, parse_summary_json, FeedError, GameFeed, GameSummary,
    ScoreboardResponse,
};
use hoopscope_app::poller::{PollReport, Poller};
use hoopscope_core::insights::{InsightEvidence, InsightKind, InsightThresholds, Severity};
use hoopscope_core::zones::Zone;
use serde_json::Value;
use tower::ServiceExt;

// ===========================================================================
// Test helpers
// ===========================================================================

const LIVE_GAME: &str = "401720001";

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn game_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 18).unwrap()
}

fn poll_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 18, 21, 40, 0).unwrap()
}

/// Serves fixture payloads by date / game id and records summary requests.
struct FixtureFeed {
    scoreboards: HashMap<NaiveDate, String>,
    summaries: HashMap<String, String>,
    fail_dates: Vec<NaiveDate>,
    summary_requests: Mutex<Vec<String>>,
}

impl FixtureFeed {
    fn game_day() -> Self {
        Self {
            scoreboards: HashMap::from([(game_day(), read_fixture("scoreboard.json"))]),
            summaries: HashMap::from([(
                LIVE_GAME.to_string(),
                read_fixture("summary_401720001.json"),
            )]),
            fail_dates: Vec::new(),
            summary_requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl GameFeed for FixtureFeed {
    async fn scoreboard(&self, date: NaiveDate) -> Result<ScoreboardResponse, FeedError> {
        let url = format!("fixture://scoreboard/{date}");
        if self.fail_dates.contains(&date) {
            return Err(FeedError::Status { url, status: 503 });
        }
        match self.scoreboards.get(&date) {
            Some(raw) => {
                parse_scoreboard_json(raw).map_err(|source| FeedError::Decode { url, source })
            }
            None => Ok(ScoreboardResponse::default()),
        }
    }

    async fn summary(&self, game_id: &str) -> Result<GameSummary, FeedError> {
        self.summary_requests.lock().unwrap().push(game_id.to_string());
        let url = format!("fixture://summary/{game_id}");
        match self.summaries.get(game_id) {
            Some(raw) => {
                parse_summary_json(raw).map_err(|source| FeedError::Decode { url, source })
            }
            None => Err(FeedError::Status { url, status: 404 }),
        }
    }
}

fn poller(feed: FixtureFeed) -> Poller<FixtureFeed> {
    let db = Database::open(":memory:").expect("in-memory database should open");
    Poller::new(feed, Arc::new(db), InsightThresholds::default(), 1)
}

// ===========================================================================
// Fixture parsing
// ===========================================================================

#[test]
fn scoreboard_fixture_parses_into_games() {
    let scoreboard = parse_scoreboard_json(&read_fixture("scoreboard.json")).unwrap();
    let games = scoreboard.games(poll_time());
    assert_eq!(games.len(), 3);

    let live = &games[0];
    assert_eq!(live.id, LIVE_GAME);
    assert!(live.is_live());
    assert_eq!(live.home_team_id, "150");
    assert_eq!(live.away_team_name, "North Carolina Tar Heels");
    assert_eq!((live.home_score, live.away_score), (11, 0));
    assert_eq!(live.current_clock, "12:05");

    assert!(!games[1].is_live());
    assert_eq!((games[1].home_score, games[1].away_score), (81, 77));
}

#[test]
fn summary_fixture_parses_into_plays() {
    let plays = parse_summary_json(&read_fixture("summary_401720001.json"))
        .unwrap()
        .plays();
    assert_eq!(plays.len(), 15);
    assert!(plays.windows(2).all(|w| w[0].sequence_number <= w[1].sequence_number));

    // The free throw carries the feed's "not located" sentinel.
    let free_throw = &plays[5];
    assert!(free_throw.shooting_play);
    assert_eq!(free_throw.coordinate, None);

    let timeout = &plays[12];
    assert!(timeout.participants.is_empty());
    assert_eq!(timeout.team_id.as_deref(), Some("150"));
}

// ===========================================================================
// Poll cycle
// ===========================================================================

#[tokio::test]
async fn poll_once_analyzes_live_game() {
    let poller = poller(FixtureFeed::game_day());
    let report = poller.poll_once(poll_time()).await;

    assert_eq!(
        report,
        PollReport {
            games_seen: 3,
            live_games: 1,
            plays_stored: 15,
            insights_written: 3,
            errors: 0,
        }
    );
    assert_eq!(poller_summary_requests(&poller), vec![LIVE_GAME.to_string()]);

    let db = poller.db();
    assert!(db.load_game("401720002").unwrap().is_some());
    assert!(db.load_game("401720003").unwrap().is_some());
    assert_eq!(db.load_plays(LIVE_GAME).unwrap().len(), 15);
    assert!(db.load_plays("401720002").unwrap().is_empty());
}

fn poller_summary_requests(poller: &Poller<FixtureFeed>) -> Vec<String> {
    poller.feed().summary_requests.lock().unwrap().clone()
}

#[tokio::test]
async fn stored_box_score_matches_fixture() {
    let poller = poller(FixtureFeed::game_day());
    poller.poll_once(poll_time()).await;

    let stats = poller.db().load_player_stats(LIVE_GAME).unwrap();
    let ids: Vec<&str> = stats.iter().map(|s| s.player_id.as_str()).collect();
    assert_eq!(ids, vec!["5001", "5002", "6001"]);

    let brooks = &stats[0];
    assert_eq!((brooks.fgm, brooks.fga), (4, 5));
    assert_eq!((brooks.three_pm, brooks.three_pa), (2, 2));
    assert_eq!((brooks.ftm, brooks.fta), (1, 2));
    assert_eq!(brooks.points, 11);
    assert_eq!(brooks.rebounds, 1);
    assert_eq!(brooks.team_id, "150");

    let ortiz = &stats[1];
    assert_eq!(ortiz.assists, 1);
    assert_eq!(ortiz.fga, 0);

    let lee = &stats[2];
    assert_eq!((lee.fgm, lee.fga), (0, 4));
    assert_eq!((lee.fouls, lee.turnovers), (1, 1));
    assert_eq!(lee.fg_pct, 0.0);
}

#[tokio::test]
async fn stored_zones_match_fixture() {
    let poller = poller(FixtureFeed::game_day());
    poller.poll_once(poll_time()).await;

    let zones = poller.db().load_zone_stats(LIVE_GAME).unwrap();
    assert_eq!(zones.len(), 2);

    let brooks = &zones[0];
    assert_eq!(brooks.player_id, "5001");
    assert_eq!(brooks.zones[&Zone::LeftCornerThree].makes, 2);
    assert_eq!(brooks.zones[&Zone::Paint].attempts, 2);
    assert_eq!(brooks.zones[&Zone::MidRange].makes, 0);
    // Free throws without a usable coordinate are not zoned.
    let zoned: u32 = brooks.zones.values().map(|z| z.attempts).sum();
    assert_eq!(zoned, 5);

    let lee = &zones[1];
    assert_eq!(lee.zones[&Zone::RightCornerThree].attempts, 3);
    assert_eq!(lee.zones[&Zone::RightCornerThree].pct, 0.0);
}

#[tokio::test]
async fn stored_insights_match_fixture() {
    let poller = poller(FixtureFeed::game_day());
    poller.poll_once(poll_time()).await;

    let mut insights = poller
        .db()
        .load_insights(LIVE_GAME, &InsightFilter::default())
        .unwrap();
    insights.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    let kinds: Vec<InsightKind> = insights.iter().map(|i| i.kind).collect();
    assert_eq!(
        kinds,
        vec![
            InsightKind::PlayerHot,
            InsightKind::ZoneCold,
            InsightKind::MomentumRun,
        ]
    );

    let hot = &insights[0];
    assert_eq!(hot.title, "Jalen Brooks on Fire");
    assert_eq!(hot.message, "Jalen Brooks shooting 4-5 (80%) from the field");
    assert_eq!(hot.game_clock, "P1 12:05");
    assert_eq!(hot.timestamp, poll_time());

    let cold = &insights[1];
    assert_eq!(cold.message, "Marcus Lee 0-3 from the right corner");
    assert_eq!(cold.context.zone, Some(Zone::RightCornerThree));
    assert_eq!(cold.context.team_id.as_deref(), Some("153"));

    let run = &insights[2];
    assert_eq!(run.severity, Severity::High);
    assert_eq!(run.context.team_id.as_deref(), Some("150"));
    assert_eq!(
        run.context.stats,
        InsightEvidence::Run {
            points: 11,
            play_count: 15
        }
    );
}

#[tokio::test]
async fn repeated_polls_upsert_stats_and_append_insights() {
    let poller = poller(FixtureFeed::game_day());
    poller.poll_once(poll_time()).await;
    poller.poll_once(poll_time()).await;

    let db = poller.db();
    assert_eq!(db.load_player_stats(LIVE_GAME).unwrap().len(), 3);
    assert_eq!(db.load_zone_stats(LIVE_GAME).unwrap().len(), 2);
    assert_eq!(db.load_plays(LIVE_GAME).unwrap().len(), 15);

    let insights = db.load_insights(LIVE_GAME, &InsightFilter::default()).unwrap();
    assert_eq!(insights.len(), 6);
    // Same input, same timestamp: the two batches are identical.
    let mut first: Vec<String> = insights[..3]
        .iter()
        .map(|i| serde_json::to_string(i).unwrap())
        .collect();
    let mut second: Vec<String> = insights[3..]
        .iter()
        .map(|i| serde_json::to_string(i).unwrap())
        .collect();
    first.sort();
    second.sort();
    assert_eq!(first, second);
}

#[tokio::test]
async fn games_live_on_previous_day_are_not_analyzed() {
    let mut feed = FixtureFeed::game_day();
    let raw = feed.scoreboards.remove(&game_day()).unwrap();
    feed.scoreboards.insert(game_day().pred_opt().unwrap(), raw);

    let poller = poller(feed);
    let report = poller.poll_once(poll_time()).await;
    assert_eq!(report.games_seen, 3);
    assert_eq!(report.live_games, 0);
    assert!(poller_summary_requests(&poller).is_empty());
}

#[tokio::test]
async fn failures_are_isolated() {
    let mut feed = FixtureFeed::game_day();
    feed.fail_dates.push(game_day().pred_opt().unwrap());
    feed.summaries.clear();

    let poller = poller(feed);
    let report = poller.poll_once(poll_time()).await;

    // Yesterday's scoreboard and the live game's summary both fail; the
    // other games are still stored.
    assert_eq!(report.errors, 2);
    assert_eq!(report.games_seen, 3);
    assert_eq!(report.live_games, 0);
    assert!(poller.db().load_game("401720003").unwrap().is_some());
    assert!(poller
        .db()
        .load_insights(LIVE_GAME, &InsightFilter::default())
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn custom_thresholds_flow_through() {
    let db = Arc::new(Database::open(":memory:").unwrap());
    let thresholds = InsightThresholds {
        momentum_min_points: 12,
        ..InsightThresholds::default()
    };
    let poller = Poller::new(FixtureFeed::game_day(), db, thresholds, 0);
    let report = poller.poll_once(poll_time()).await;
    assert_eq!(report.insights_written, 2);

    let runs = poller
        .db()
        .load_insights(
            LIVE_GAME,
            &InsightFilter {
                kind: Some(InsightKind::MomentumRun),
                ..InsightFilter::default()
            },
        )
        .unwrap();
    assert!(runs.is_empty());
}

// ===========================================================================
// Read API over a polled game
// ===========================================================================

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    let response = app.clone().oneshot(request).await.expect("router request failed");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn api_serves_what_the_poller_stored() {
    let db = Arc::new(Database::open(":memory:").unwrap());
    let poller = Poller::new(
        FixtureFeed::game_day(),
        Arc::clone(&db),
        InsightThresholds::default(),
        1,
    );
    poller.poll_once(poll_time()).await;
    let app = create_router(ApiState { db });

    let (status, games) = get_json(&app, "/api/games?date=2025-01-18&status=in").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(games.as_array().unwrap().len(), 1);
    assert_eq!(games[0]["id"], LIVE_GAME);

    let (_, plays) = get_json(&app, &format!("/api/games/{LIVE_GAME}/plays")).await;
    assert_eq!(plays.as_array().unwrap().len(), 15);
    assert_eq!(plays[0]["type"], "JumpShot");

    let (_, stats) = get_json(&app, &format!("/api/games/{LIVE_GAME}/stats")).await;
    assert_eq!(stats[0]["player_id"], "5001");
    assert_eq!(stats[0]["points"], 11);

    let (_, zones) = get_json(&app, &format!("/api/games/{LIVE_GAME}/zones")).await;
    assert_eq!(zones[1]["zones"]["right_corner_3"]["attempts"], 3);

    let (_, insights) = get_json(&app, &format!("/api/games/{LIVE_GAME}/insights")).await;
    assert_eq!(insights.as_array().unwrap().len(), 3);

    let (_, cold) = get_json(
        &app,
        &format!("/api/games/{LIVE_GAME}/insights?kind=zone_cold&limit=5"),
    )
    .await;
    assert_eq!(cold.as_array().unwrap().len(), 1);
    assert_eq!(cold[0]["type"], "zone_cold");
    assert_eq!(cold[0]["message"], "Marcus Lee 0-3 from the right corner");

    let (_, limited) = get_json(&app, &format!("/api/games/{LIVE_GAME}/insights?limit=2")).await;
    assert_eq!(limited.as_array().unwrap().len(), 2);
}
