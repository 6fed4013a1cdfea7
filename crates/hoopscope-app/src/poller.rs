// Polling loop: scoreboard -> live games -> plays -> analysis -> store.
//
// Games are processed one at a time, so a game is never analyzed twice
// concurrently. A failure for one date or game is logged and skipped.

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use hoopscope_core::analyze_game;
use hoopscope_core::insights::InsightThresholds;
use tracing::{error, info, warn};

use crate::db::Database;
use crate::espn::{GameFeed, GameRecord};

/// Counts from one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub games_seen: usize,
    pub live_games: usize,
    pub plays_stored: usize,
    pub insights_written: usize,
    pub errors: usize,
}

/// Everything a poll cycle needs besides the clock. The database is shared
/// with the read API.
pub struct Poller<F: GameFeed> {
    feed: F,
    db: Arc<Database>,
    thresholds: InsightThresholds,
    lookback_days: u32,
}

impl<F: GameFeed> Poller<F> {
    pub fn new(
        feed: F,
        db: Arc<Database>,
        thresholds: InsightThresholds,
        lookback_days: u32,
    ) -> Self {
        Self {
            feed,
            db,
            thresholds,
            lookback_days,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    /// Run one cycle at `now`: refresh every game on the scoreboards in the
    /// lookback window, and analyze the ones live today.
    pub async fn poll_once(&self, now: DateTime<Utc>) -> PollReport {
        let today = now.date_naive();
        let mut report = PollReport::default();

        for date in poll_dates(today, self.lookback_days) {
            let scoreboard = match self.feed.scoreboard(date).await {
                Ok(s) => s,
                Err(e) => {
                    warn!("Error fetching scoreboard for {}: {}", date, e);
                    report.errors += 1;
                    continue;
                }
            };

            let games = scoreboard.games(now);
            if date == today {
                info!("Found {} games today", games.len());
            }

            for game in games {
                report.games_seen += 1;
                if let Err(e) = self.db.upsert_game(&game) {
                    warn!("Error saving game {}: {:#}", game.id, e);
                    report.errors += 1;
                    continue;
                }

                if game.is_live() && date == today {
                    match self.analyze_live_game(&game, now).await {
                        Ok((plays, insights)) => {
                            report.live_games += 1;
                            report.plays_stored += plays;
                            report.insights_written += insights;
                        }
                        Err(e) => {
                            warn!("Error analyzing game {}: {:#}", game.id, e);
                            report.errors += 1;
                        }
                    }
                }
            }
        }

        report
    }

    /// Fetch, store and analyze one live game. Returns (plays, insights).
    async fn analyze_live_game(
        &self,
        game: &GameRecord,
        now: DateTime<Utc>,
    ) -> anyhow::Result<(usize, usize)> {
        info!("LIVE: {} (fetching plays...)", game.name);

        let summary = self.feed.summary(&game.id).await?;
        let plays = summary.plays();
        self.db.upsert_plays(&game.id, &plays)?;

        let analysis = analyze_game(&game.id, &plays, &self.thresholds, now);
        self.db.upsert_player_stats(&game.id, &analysis.player_stats)?;
        self.db.upsert_zone_stats(&game.id, &analysis.zone_stats)?;
        self.db.save_insights(&analysis.insights)?;

        info!(
            game_id = %game.id,
            "Saved {} plays, {} players, {} zone players, {} insights",
            plays.len(),
            analysis.player_stats.len(),
            analysis.zone_stats.len(),
            analysis.insights.len()
        );
        Ok((plays.len(), analysis.insights.len()))
    }

    /// Poll every `interval` until Ctrl+C. The first cycle runs immediately.
    pub async fn run(&self, interval: std::time::Duration) -> anyhow::Result<()> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.poll_once(Utc::now()).await;
                    info!(?report, "poll cycle complete");
                }
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        error!("Failed to listen for Ctrl+C: {}", e);
                    }
                    info!("Shutdown requested, stopping poller");
                    return Ok(());
                }
            }
        }
    }
}

/// Dates covered by one cycle, oldest first. Days that would fall before
/// the earliest representable date are left out.
pub fn poll_dates(today: NaiveDate, lookback_days: u32) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = (0..=lookback_days)
        .map_while(|d| today.checked_sub_days(Days::new(u64::from(d))))
        .collect();
    dates.reverse();
    dates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_dates_cover_lookback() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(
            poll_dates(today, 1),
            vec![NaiveDate::from_ymd_opt(2025, 2, 28).unwrap(), today]
        );
        assert_eq!(poll_dates(today, 0), vec![today]);
    }

    #[test]
    fn poll_dates_stop_at_calendar_floor() {
        let floor = NaiveDate::MIN;
        assert_eq!(poll_dates(floor, 3), vec![floor]);

        let today = floor.checked_add_days(Days::new(2)).unwrap();
        assert_eq!(
            poll_dates(today, u32::MAX),
            vec![floor, floor.succ_opt().unwrap(), today]
        );
    }
}
