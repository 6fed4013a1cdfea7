// SQLite persistence for games, plays, derived stats and insights.
//
// Stats and zone rows are upserted by (game_id, player_id) so each poll
// replaces the previous aggregate. Insights are append-only.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use hoopscope_core::insights::{Insight, InsightKind, Severity};
use hoopscope_core::stats::PlayerGameStats;
use hoopscope_core::zones::PlayerZoneStats;
use hoopscope_core::Play;
use rusqlite::{params, Connection, OptionalExtension};

use crate::espn::GameRecord;

/// Optional filters for `load_insights`.
#[derive(Debug, Clone, Default)]
pub struct InsightFilter {
    pub kind: Option<InsightKind>,
    pub severity: Option<Severity>,
    pub limit: Option<usize>,
}

/// SQLite-backed store. Row payloads are JSON documents so the stored shape
/// follows the serde models.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS games (
                id           TEXT PRIMARY KEY,
                day          TEXT NOT NULL,
                start_time   TEXT NOT NULL,
                status       TEXT NOT NULL,
                last_updated TEXT NOT NULL,
                doc          TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_games_day ON games(day);

            CREATE TABLE IF NOT EXISTS plays (
                game_id         TEXT NOT NULL,
                play_id         TEXT NOT NULL,
                sequence_number INTEGER NOT NULL,
                doc             TEXT NOT NULL,
                PRIMARY KEY (game_id, play_id)
            );

            CREATE TABLE IF NOT EXISTS player_stats (
                game_id   TEXT NOT NULL,
                player_id TEXT NOT NULL,
                team_id   TEXT NOT NULL,
                doc       TEXT NOT NULL,
                PRIMARY KEY (game_id, player_id)
            );

            CREATE TABLE IF NOT EXISTS zone_stats (
                game_id   TEXT NOT NULL,
                player_id TEXT NOT NULL,
                team_id   TEXT NOT NULL,
                doc       TEXT NOT NULL,
                PRIMARY KEY (game_id, player_id)
            );

            CREATE TABLE IF NOT EXISTS insights (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                game_id   TEXT NOT NULL,
                kind      TEXT NOT NULL,
                severity  TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                doc       TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_insights_game_id ON insights(game_id);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock).
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Games and plays
    // ------------------------------------------------------------------

    pub fn upsert_game(&self, game: &GameRecord) -> Result<()> {
        let doc = serde_json::to_string(game).context("failed to serialize game")?;
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO games (id, day, start_time, status, last_updated, doc)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    game.id,
                    game.day(),
                    game.date,
                    game.status,
                    game.last_updated.to_rfc3339(),
                    doc
                ],
            )
            .with_context(|| format!("failed to upsert game {}", game.id))?;
        Ok(())
    }

    pub fn load_game(&self, game_id: &str) -> Result<Option<GameRecord>> {
        let conn = self.conn();
        let doc: Option<String> = conn
            .query_row("SELECT doc FROM games WHERE id = ?1", params![game_id], |row| {
                row.get(0)
            })
            .optional()
            .context("failed to query game")?;
        doc.map(|d| serde_json::from_str(&d).context("failed to deserialize game"))
            .transpose()
    }

    /// Games matching the optional filters, by start time then id. `day` is
    /// a `YYYY-MM-DD` date; `status` is a scoreboard state ("pre", "in",
    /// "post").
    pub fn list_games(&self, day: Option<NaiveDate>, status: Option<&str>) -> Result<Vec<GameRecord>> {
        let conn = self.conn();
        let day = day.map(|d| d.format("%Y-%m-%d").to_string());
        let mut stmt = conn
            .prepare(
                "SELECT doc FROM games
                 WHERE (?1 IS NULL OR day = ?1)
                   AND (?2 IS NULL OR status = ?2)
                 ORDER BY start_time, id",
            )
            .context("failed to prepare list_games query")?;

        let docs = stmt
            .query_map(params![day, status], |row| row.get::<_, String>(0))
            .context("failed to query games")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map game rows")?;

        docs.iter()
            .map(|d| serde_json::from_str(d).context("failed to deserialize game"))
            .collect()
    }

    /// Upsert every play of a game in a single transaction.
    pub fn upsert_plays(&self, game_id: &str, plays: &[Play]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin plays transaction")?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO plays (game_id, play_id, sequence_number, doc)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .context("failed to prepare play upsert")?;
            for play in plays {
                let doc = serde_json::to_string(play).context("failed to serialize play")?;
                stmt.execute(params![game_id, play.id, play.sequence_number as i64, doc])
                    .with_context(|| format!("failed to upsert play {}", play.id))?;
            }
        }
        tx.commit().context("failed to commit plays")?;
        Ok(())
    }

    /// Plays of a game in sequence order.
    pub fn load_plays(&self, game_id: &str) -> Result<Vec<Play>> {
        self.load_docs(
            "SELECT doc FROM plays WHERE game_id = ?1 ORDER BY sequence_number, play_id",
            game_id,
        )
    }

    // ------------------------------------------------------------------
    // Derived stats
    // ------------------------------------------------------------------

    pub fn upsert_player_stats(
        &self,
        game_id: &str,
        stats: &BTreeMap<String, PlayerGameStats>,
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin stats transaction")?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO player_stats (game_id, player_id, team_id, doc)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .context("failed to prepare player stats upsert")?;
            for (player_id, line) in stats {
                let doc = serde_json::to_string(line).context("failed to serialize player stats")?;
                stmt.execute(params![game_id, player_id, line.team_id, doc])
                    .with_context(|| format!("failed to upsert stats for player {player_id}"))?;
            }
        }
        tx.commit().context("failed to commit player stats")?;
        Ok(())
    }

    pub fn load_player_stats(&self, game_id: &str) -> Result<Vec<PlayerGameStats>> {
        self.load_docs(
            "SELECT doc FROM player_stats WHERE game_id = ?1 ORDER BY player_id",
            game_id,
        )
    }

    pub fn upsert_zone_stats(
        &self,
        game_id: &str,
        zones: &BTreeMap<String, PlayerZoneStats>,
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin zone transaction")?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO zone_stats (game_id, player_id, team_id, doc)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .context("failed to prepare zone stats upsert")?;
            for (player_id, entry) in zones {
                let doc = serde_json::to_string(entry).context("failed to serialize zone stats")?;
                stmt.execute(params![game_id, player_id, entry.team_id, doc])
                    .with_context(|| format!("failed to upsert zones for player {player_id}"))?;
            }
        }
        tx.commit().context("failed to commit zone stats")?;
        Ok(())
    }

    pub fn load_zone_stats(&self, game_id: &str) -> Result<Vec<PlayerZoneStats>> {
        self.load_docs(
            "SELECT doc FROM zone_stats WHERE game_id = ?1 ORDER BY player_id",
            game_id,
        )
    }

    // ------------------------------------------------------------------
    // Insights
    // ------------------------------------------------------------------

    /// Append insights. Existing rows are never touched.
    pub fn save_insights(&self, insights: &[Insight]) -> Result<()> {
        if insights.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin insights transaction")?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO insights (game_id, kind, severity, timestamp, doc)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .context("failed to prepare insight insert")?;
            for insight in insights {
                let doc = serde_json::to_string(insight).context("failed to serialize insight")?;
                stmt.execute(params![
                    insight.game_id,
                    insight.kind.as_str(),
                    insight.severity.as_str(),
                    insight.timestamp.to_rfc3339(),
                    doc,
                ])
                .context("failed to insert insight")?;
            }
        }
        tx.commit().context("failed to commit insights")?;
        Ok(())
    }

    /// Insights for a game, newest first.
    pub fn load_insights(&self, game_id: &str, filter: &InsightFilter) -> Result<Vec<Insight>> {
        let conn = self.conn();
        let kind = filter.kind.map(|k| k.as_str());
        let severity = filter.severity.map(|s| s.as_str());
        let limit = filter.limit.map_or(-1, |l| l as i64);

        let mut stmt = conn
            .prepare(
                "SELECT doc FROM insights
                 WHERE game_id = ?1
                   AND (?2 IS NULL OR kind = ?2)
                   AND (?3 IS NULL OR severity = ?3)
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?4",
            )
            .context("failed to prepare load_insights query")?;

        let docs = stmt
            .query_map(params![game_id, kind, severity, limit], |row| {
                row.get::<_, String>(0)
            })
            .context("failed to query insights")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map insight rows")?;

        docs.iter()
            .map(|d| serde_json::from_str(d).context("failed to deserialize insight"))
            .collect()
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn load_docs<T: serde::de::DeserializeOwned>(&self, sql: &str, game_id: &str) -> Result<Vec<T>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql).context("failed to prepare query")?;
        let docs = stmt
            .query_map(params![game_id], |row| row.get::<_, String>(0))
            .context("failed to run query")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map rows")?;

        docs.iter()
            .map(|d| serde_json::from_str(d).context("failed to deserialize row"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use hoopscope_core::insights::{generate, InsightThresholds};
    use hoopscope_core::stats::aggregate;
    use hoopscope_core::zones::{zone_stats, Zone};
    use hoopscope_core::Coordinate;

    /// Helper: create a fresh in-memory database for each test.
    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    fn sample_play(seq: u64, player: &str, made: bool) -> Play {
        Play {
            id: format!("401720001{seq:03}"),
            sequence_number: seq,
            type_label: "JumpShot".into(),
            text: format!("{player} {} two point jumper", if made { "makes" } else { "misses" }),
            period: 1,
            clock: "12:00".into(),
            home_score: 0,
            away_score: 0,
            scoring_play: made,
            score_value: if made { 2 } else { 0 },
            shooting_play: true,
            coordinate: Some(Coordinate { x: 25.0, y: 5.0 }),
            team_id: Some("150".into()),
            participants: vec![player.into()],
        }
    }

    fn sample_game(status: &str) -> GameRecord {
        game_on("401720001", "2025-01-18T21:00Z", status)
    }

    fn game_on(id: &str, date: &str, status: &str) -> GameRecord {
        GameRecord {
            id: id.into(),
            date: date.into(),
            name: "Away at Home".into(),
            home_team_id: "150".into(),
            home_team_name: "Home".into(),
            away_team_id: "153".into(),
            away_team_name: "Away".into(),
            status: status.into(),
            current_period: 2,
            current_clock: "4:12".into(),
            home_score: 55,
            away_score: 50,
            last_updated: Utc.with_ymd_and_hms(2025, 1, 18, 22, 0, 0).unwrap(),
        }
    }

    #[test]
    fn open_creates_tables() {
        let db = test_db();
        let conn = db.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for table in ["games", "plays", "player_stats", "zone_stats", "insights"] {
            assert!(tables.contains(&table.to_string()), "{table}");
        }
    }

    #[test]
    fn game_upsert_replaces() {
        let db = test_db();
        db.upsert_game(&sample_game("pre")).unwrap();
        db.upsert_game(&sample_game("in")).unwrap();

        let game = db.load_game("401720001").unwrap().unwrap();
        assert_eq!(game.status, "in");
        assert!(db.load_game("missing").unwrap().is_none());
    }

    #[test]
    fn list_games_filters_by_day_and_status() {
        let db = test_db();
        db.upsert_game(&game_on("3", "2025-01-18T23:30Z", "pre")).unwrap();
        db.upsert_game(&game_on("1", "2025-01-18T19:00Z", "post")).unwrap();
        db.upsert_game(&game_on("2", "2025-01-18T21:00Z", "in")).unwrap();
        db.upsert_game(&game_on("4", "2025-01-17T21:00Z", "post")).unwrap();

        let ids = |games: Vec<GameRecord>| games.into_iter().map(|g| g.id).collect::<Vec<_>>();
        let day = NaiveDate::from_ymd_opt(2025, 1, 18);

        assert_eq!(ids(db.list_games(None, None).unwrap()), vec!["4", "1", "2", "3"]);
        assert_eq!(ids(db.list_games(day, None).unwrap()), vec!["1", "2", "3"]);
        assert_eq!(ids(db.list_games(None, Some("post")).unwrap()), vec!["4", "1"]);
        assert_eq!(ids(db.list_games(day, Some("in")).unwrap()), vec!["2"]);
        assert!(db
            .list_games(NaiveDate::from_ymd_opt(2024, 12, 1), None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn plays_upsert_by_id_and_load_in_order() {
        let db = test_db();
        let plays = vec![sample_play(2, "p1", true), sample_play(1, "p1", false)];
        db.upsert_plays("401720001", &plays).unwrap();
        db.upsert_plays("401720001", &plays).unwrap();

        let loaded = db.load_plays("401720001").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].sequence_number, 1);
        assert_eq!(loaded[1], plays[0]);
        assert!(db.load_plays("other").unwrap().is_empty());
    }

    #[test]
    fn stats_upsert_replaces_previous_aggregate() {
        let db = test_db();
        let early = vec![sample_play(1, "p1", true)];
        db.upsert_player_stats("g1", &aggregate(&early)).unwrap();

        let later = vec![sample_play(1, "p1", true), sample_play(2, "p1", false)];
        db.upsert_player_stats("g1", &aggregate(&later)).unwrap();

        let stats = db.load_player_stats("g1").unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!((stats[0].fgm, stats[0].fga), (1, 2));
        assert_eq!(stats[0].team_id, "150");
    }

    #[test]
    fn zone_stats_round_trip() {
        let db = test_db();
        let plays = vec![sample_play(1, "p1", true), sample_play(2, "p2", false)];
        db.upsert_zone_stats("g1", &zone_stats(&plays)).unwrap();

        let zones = db.load_zone_stats("g1").unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].player_id, "p1");
        assert_eq!(zones[0].zones[&Zone::Paint].makes, 1);
        assert_eq!(zones[1].zones[&Zone::Paint].attempts, 1);
    }

    #[test]
    fn insights_are_appended_and_filtered() {
        let db = test_db();
        let mut plays: Vec<Play> = (1..=5).map(|i| sample_play(i, "p1", true)).collect();
        plays.extend((6..=10).map(|i| sample_play(i, "p2", false)));
        let stats = aggregate(&plays);
        let zones = zone_stats(&plays);
        let at = Utc.with_ymd_and_hms(2025, 1, 18, 22, 0, 0).unwrap();
        let insights = generate("g1", &plays, &stats, &zones, &InsightThresholds::default(), at);
        assert!(!insights.is_empty());

        db.save_insights(&insights).unwrap();
        db.save_insights(&insights).unwrap();

        let all = db.load_insights("g1", &InsightFilter::default()).unwrap();
        assert_eq!(all.len(), insights.len() * 2);

        let cold = db
            .load_insights(
                "g1",
                &InsightFilter {
                    kind: Some(InsightKind::ZoneCold),
                    ..InsightFilter::default()
                },
            )
            .unwrap();
        assert_eq!(cold.len(), 2);
        assert!(cold.iter().all(|i| i.kind == InsightKind::ZoneCold));

        let high = db
            .load_insights(
                "g1",
                &InsightFilter {
                    severity: Some(Severity::High),
                    limit: Some(1),
                    ..InsightFilter::default()
                },
            )
            .unwrap();
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].severity, Severity::High);

        assert!(db.load_insights("g2", &InsightFilter::default()).unwrap().is_empty());
    }
}
