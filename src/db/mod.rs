// Database access layer (SQLite via sqlx).
//
// Pool-level methods cover the reads and the collaborator-side seeding the
// external subsystems would normally perform. Everything a settlement
// touches goes through the store modules at the bottom, whose functions
// take `&mut SqliteConnection` so that one transaction spans match,
// profile, rating, ledger, and settlement state.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::SqliteConnection;

use crate::error::Error;

/// Attempt budget for the retry-on-conflict transaction driver.
const MAX_TX_ATTEMPTS: u32 = 5;

// ── Row types ─────────────────────────────────────────────────────────

/// Profile store row. This service reads display fields and credits
/// `gold_balance`; everything else is owned by the accounts subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub avatar: Option<String>,
    pub gold_balance: i64,
    pub created_at: String,
}

/// Match store row. A NULL seat column is the computer-opponent sentinel;
/// the settlement coordinator turns it into a typed seat at the
/// transaction boundary.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MatchRow {
    pub id: String,
    pub blue_player_id: Option<i64>,
    pub red_player_id: Option<i64>,
    pub status: String,
    pub winner: Option<String>,
    pub game_mode: String,
    pub ai_difficulty: Option<String>,
    pub ranking_processed: bool,
    pub created_at: String,
}

/// Per-player leaderboard state, created lazily on first settlement.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RatingRecord {
    pub user_id: i64,
    pub rating: f64,
    pub games_played: i64,
    pub wins: i64,
    pub losses: i64,
    pub last_match_at: Option<String>,
    pub username: String,
    pub avatar: Option<String>,
    pub tier: String,
    pub season: String,
}

impl RatingRecord {
    /// Stored `last_match_at` as a UTC timestamp. Unparseable values are
    /// treated as absent, which means no decay.
    pub fn last_match_at_utc(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.last_match_at
            .as_deref()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&chrono::Utc))
    }
}

/// Append-only gold credit tied to a settled match.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub entry_type: String,
    pub reason: String,
    pub match_id: String,
    pub balance_after: i64,
    pub created_at: String,
}

/// Immutable settlement record; its existence is the idempotency marker
/// for a match id. Participant summaries are stored as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SettlementRow {
    pub match_id: String,
    pub winner: String,
    pub game_mode: String,
    pub ai_difficulty: Option<String>,
    pub ai_rating: Option<i64>,
    pub participants: String,
    pub processed_at: String,
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        // An in-memory SQLite database exists per connection, so the whole
        // pool must share a single connection to see one schema.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL,
                avatar TEXT,
                gold_balance INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS matches (
                id TEXT PRIMARY KEY,
                blue_player_id INTEGER REFERENCES users(id),
                red_player_id INTEGER REFERENCES users(id),
                status TEXT NOT NULL DEFAULT 'waiting',
                winner TEXT,
                game_mode TEXT NOT NULL DEFAULT 'online',
                ai_difficulty TEXT,
                ranking_processed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rating_records (
                user_id INTEGER PRIMARY KEY REFERENCES users(id),
                rating REAL NOT NULL DEFAULT 1200,
                games_played INTEGER NOT NULL DEFAULT 0,
                wins INTEGER NOT NULL DEFAULT 0,
                losses INTEGER NOT NULL DEFAULT 0,
                last_match_at TEXT,
                username TEXT NOT NULL DEFAULT '',
                avatar TEXT,
                tier TEXT NOT NULL DEFAULT 'bronze',
                season TEXT NOT NULL DEFAULT ''
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settlements (
                match_id TEXT PRIMARY KEY REFERENCES matches(id),
                winner TEXT NOT NULL,
                game_mode TEXT NOT NULL,
                ai_difficulty TEXT,
                ai_rating INTEGER,
                participants TEXT NOT NULL,
                processed_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ledger_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                amount INTEGER NOT NULL,
                entry_type TEXT NOT NULL DEFAULT 'credit',
                reason TEXT NOT NULL DEFAULT 'match_reward',
                match_id TEXT NOT NULL,
                balance_after INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS app_config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ── Transactional unit of work ────────────────────────────────────

    /// Run `op` inside a write transaction, retrying the whole attempt when
    /// SQLite reports a lock conflict. Each retry re-runs `op` against a
    /// fresh transaction, so the closure must be safe to re-execute from
    /// scratch (all settlement reads, including the idempotency check,
    /// happen inside it).
    pub async fn with_write_tx<T, F>(&self, mut op: F) -> Result<T, Error>
    where
        F: for<'c> FnMut(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, Error>>,
    {
        for attempt in 1..=MAX_TX_ATTEMPTS {
            let mut tx = self.pool.begin().await.map_err(Error::Storage)?;
            match op(&mut tx).await {
                Ok(value) => match tx.commit().await {
                    Ok(()) => return Ok(value),
                    Err(e) if is_conflict(&e) && attempt < MAX_TX_ATTEMPTS => {
                        tracing::warn!("commit conflict, retrying (attempt {attempt}): {e}");
                    }
                    Err(e) => return Err(Error::Storage(e)),
                },
                Err(Error::Storage(e)) if is_conflict(&e) && attempt < MAX_TX_ATTEMPTS => {
                    drop(tx); // rolls back
                    tracing::warn!("transaction conflict, retrying (attempt {attempt}): {e}");
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(std::time::Duration::from_millis(25 * attempt as u64)).await;
        }
        Err(Error::Internal(
            "write transaction exhausted its retry budget".to_string(),
        ))
    }

    // ── Profile store (collaborator-side writes for seeding/tests) ────

    pub async fn create_user(
        &self,
        username: &str,
        avatar: Option<&str>,
        gold_balance: i64,
    ) -> Result<UserProfile, sqlx::Error> {
        sqlx::query_as::<_, UserProfile>(
            "INSERT INTO users (username, avatar, gold_balance) VALUES (?, ?, ?) RETURNING id, username, avatar, gold_balance, created_at",
        )
        .bind(username)
        .bind(avatar)
        .bind(gold_balance)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<UserProfile>, sqlx::Error> {
        sqlx::query_as::<_, UserProfile>(
            "SELECT id, username, avatar, gold_balance, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    // ── Match store (collaborator-side writes for seeding/tests) ──────

    /// Insert a match in the state the matchmaking subsystem would leave it.
    pub async fn create_match(
        &self,
        blue_player_id: Option<i64>,
        red_player_id: Option<i64>,
        status: &str,
        winner: Option<&str>,
        game_mode: &str,
        ai_difficulty: Option<&str>,
    ) -> Result<MatchRow, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query_as::<_, MatchRow>(
            "INSERT INTO matches (id, blue_player_id, red_player_id, status, winner, game_mode, ai_difficulty) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id, blue_player_id, red_player_id, status, winner, game_mode, ai_difficulty, ranking_processed, created_at",
        )
        .bind(id)
        .bind(blue_player_id)
        .bind(red_player_id)
        .bind(status)
        .bind(winner)
        .bind(game_mode)
        .bind(ai_difficulty)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get_match(&self, id: &str) -> Result<Option<MatchRow>, sqlx::Error> {
        sqlx::query_as::<_, MatchRow>(
            "SELECT id, blue_player_id, red_player_id, status, winner, game_mode, ai_difficulty, ranking_processed, created_at FROM matches WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    // ── Configuration store ───────────────────────────────────────────

    pub async fn set_reward_unit(&self, amount: i64) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR REPLACE INTO app_config (key, value) VALUES (?, ?)")
            .bind(app_config::REWARD_UNIT_KEY)
            .bind(amount.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ── Read helpers ──────────────────────────────────────────────────

    pub async fn get_rating(&self, user_id: i64) -> Result<Option<RatingRecord>, sqlx::Error> {
        sqlx::query_as::<_, RatingRecord>(
            "SELECT user_id, rating, games_played, wins, losses, last_match_at, username, avatar, tier, season FROM rating_records WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn get_settlement(&self, match_id: &str) -> Result<Option<SettlementRow>, sqlx::Error> {
        sqlx::query_as::<_, SettlementRow>(
            "SELECT match_id, winner, game_mode, ai_difficulty, ai_rating, participants, processed_at FROM settlements WHERE match_id = ?",
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn ledger_entries(&self, user_id: i64) -> Result<Vec<LedgerEntry>, sqlx::Error> {
        sqlx::query_as::<_, LedgerEntry>(
            "SELECT id, user_id, amount, entry_type, reason, match_id, balance_after, created_at FROM ledger_entries WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn leaderboard(&self, limit: i64) -> Result<Vec<RatingRecord>, sqlx::Error> {
        sqlx::query_as::<_, RatingRecord>(
            "SELECT user_id, rating, games_played, wins, losses, last_match_at, username, avatar, tier, season FROM rating_records ORDER BY rating DESC, games_played DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}

/// SQLite reports write contention as a busy/locked database error; those
/// attempts are safe to rerun from the top of the transaction.
fn is_conflict(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            let msg = db.message();
            msg.contains("database is locked") || msg.contains("database table is locked")
        }
        _ => false,
    }
}

// ── Transaction-scoped stores ─────────────────────────────────────────
//
// Everything below takes `&mut SqliteConnection` and is only called from
// inside `with_write_tx`.

pub mod matches {
    use super::MatchRow;
    use sqlx::SqliteConnection;

    pub async fn get(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> Result<Option<MatchRow>, sqlx::Error> {
        sqlx::query_as::<_, MatchRow>(
            "SELECT id, blue_player_id, red_player_id, status, winner, game_mode, ai_difficulty, ranking_processed, created_at FROM matches WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    pub async fn mark_settled(conn: &mut SqliteConnection, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE matches SET ranking_processed = 1 WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }
}

pub mod profiles {
    use super::UserProfile;
    use sqlx::SqliteConnection;

    pub async fn get(
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> Result<Option<UserProfile>, sqlx::Error> {
        sqlx::query_as::<_, UserProfile>(
            "SELECT id, username, avatar, gold_balance, created_at FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(conn)
        .await
    }

    pub async fn set_gold_balance(
        conn: &mut SqliteConnection,
        user_id: i64,
        balance: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET gold_balance = ? WHERE id = ?")
            .bind(balance)
            .bind(user_id)
            .execute(conn)
            .await?;
        Ok(())
    }
}

pub mod ratings {
    use super::RatingRecord;
    use sqlx::SqliteConnection;

    pub async fn get(
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> Result<Option<RatingRecord>, sqlx::Error> {
        sqlx::query_as::<_, RatingRecord>(
            "SELECT user_id, rating, games_played, wins, losses, last_match_at, username, avatar, tier, season FROM rating_records WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(conn)
        .await
    }

    pub async fn upsert(
        conn: &mut SqliteConnection,
        record: &RatingRecord,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO rating_records (user_id, rating, games_played, wins, losses, last_match_at, username, avatar, tier, season)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                rating = excluded.rating,
                games_played = excluded.games_played,
                wins = excluded.wins,
                losses = excluded.losses,
                last_match_at = excluded.last_match_at,
                username = excluded.username,
                avatar = excluded.avatar,
                tier = excluded.tier,
                season = excluded.season
        "#,
        )
        .bind(record.user_id)
        .bind(record.rating)
        .bind(record.games_played)
        .bind(record.wins)
        .bind(record.losses)
        .bind(&record.last_match_at)
        .bind(&record.username)
        .bind(&record.avatar)
        .bind(&record.tier)
        .bind(&record.season)
        .execute(conn)
        .await?;
        Ok(())
    }
}

pub mod ledger {
    use sqlx::SqliteConnection;

    pub async fn append(
        conn: &mut SqliteConnection,
        user_id: i64,
        amount: i64,
        match_id: &str,
        balance_after: i64,
        created_at: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO ledger_entries (user_id, amount, entry_type, reason, match_id, balance_after, created_at) VALUES (?, ?, 'credit', 'match_reward', ?, ?, ?)",
        )
        .bind(user_id)
        .bind(amount)
        .bind(match_id)
        .bind(balance_after)
        .bind(created_at)
        .execute(conn)
        .await?;
        Ok(())
    }
}

pub mod settlements {
    use super::SettlementRow;
    use sqlx::SqliteConnection;

    pub async fn get(
        conn: &mut SqliteConnection,
        match_id: &str,
    ) -> Result<Option<SettlementRow>, sqlx::Error> {
        sqlx::query_as::<_, SettlementRow>(
            "SELECT match_id, winner, game_mode, ai_difficulty, ai_rating, participants, processed_at FROM settlements WHERE match_id = ?",
        )
        .bind(match_id)
        .fetch_optional(conn)
        .await
    }

    pub async fn insert(
        conn: &mut SqliteConnection,
        row: &SettlementRow,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO settlements (match_id, winner, game_mode, ai_difficulty, ai_rating, participants, processed_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.match_id)
        .bind(&row.winner)
        .bind(&row.game_mode)
        .bind(&row.ai_difficulty)
        .bind(row.ai_rating)
        .bind(&row.participants)
        .bind(&row.processed_at)
        .execute(conn)
        .await?;
        Ok(())
    }
}

pub mod app_config {
    use sqlx::SqliteConnection;

    pub const REWARD_UNIT_KEY: &str = "match_reward_gold";

    pub async fn get(
        conn: &mut SqliteConnection,
        key: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT value FROM app_config WHERE key = ?")
            .bind(key)
            .fetch_optional(conn)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        Database::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = test_db().await;

        let user = db.create_user("ana", Some("a.png"), 50).await.unwrap();
        assert_eq!(user.username, "ana");
        assert_eq!(user.gold_balance, 50);

        let fetched = db.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.avatar.as_deref(), Some("a.png"));

        assert!(db.get_user(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_and_get_match() {
        let db = test_db().await;

        let blue = db.create_user("blue", None, 0).await.unwrap();
        let m = db
            .create_match(Some(blue.id), None, "finished", Some("blue"), "pvai", Some("hard"))
            .await
            .unwrap();
        assert_eq!(m.status, "finished");
        assert_eq!(m.winner.as_deref(), Some("blue"));
        assert!(!m.ranking_processed);

        let fetched = db.get_match(&m.id).await.unwrap().unwrap();
        assert_eq!(fetched.ai_difficulty.as_deref(), Some("hard"));

        assert!(db.get_match("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rating_upsert_roundtrip() {
        let db = test_db().await;
        let user = db.create_user("rated", None, 0).await.unwrap();

        let record = RatingRecord {
            user_id: user.id,
            rating: 1216.0,
            games_played: 1,
            wins: 1,
            losses: 0,
            last_match_at: Some("2026-08-07T00:00:00+00:00".to_string()),
            username: "rated".to_string(),
            avatar: None,
            tier: "bronze".to_string(),
            season: "2026-Q3".to_string(),
        };

        let mut conn = db.pool.acquire().await.unwrap();
        ratings::upsert(&mut conn, &record).await.unwrap();

        let fetched = ratings::get(&mut conn, user.id).await.unwrap().unwrap();
        assert_eq!(fetched.rating, 1216.0);
        assert_eq!(fetched.games_played, 1);
        assert!(fetched.last_match_at_utc().is_some());

        // Second upsert overwrites in place.
        let updated = RatingRecord {
            rating: 1200.0,
            games_played: 2,
            losses: 1,
            ..record
        };
        ratings::upsert(&mut conn, &updated).await.unwrap();
        let fetched = ratings::get(&mut conn, user.id).await.unwrap().unwrap();
        assert_eq!(fetched.rating, 1200.0);
        assert_eq!(fetched.games_played, 2);
    }

    #[test]
    fn test_invalid_last_match_at_is_ignored() {
        let record = RatingRecord {
            user_id: 1,
            rating: 1200.0,
            games_played: 0,
            wins: 0,
            losses: 0,
            last_match_at: Some("not-a-timestamp".to_string()),
            username: String::new(),
            avatar: None,
            tier: "bronze".to_string(),
            season: String::new(),
        };
        assert!(record.last_match_at_utc().is_none());
    }

    #[tokio::test]
    async fn test_ledger_append_and_list() {
        let db = test_db().await;
        let user = db.create_user("ledgered", None, 0).await.unwrap();

        let mut conn = db.pool.acquire().await.unwrap();
        ledger::append(&mut conn, user.id, 10, "m-1", 10, "2026-08-07T00:00:00+00:00")
            .await
            .unwrap();
        ledger::append(&mut conn, user.id, 5, "m-2", 15, "2026-08-07T01:00:00+00:00")
            .await
            .unwrap();
        drop(conn);

        let entries = db.ledger_entries(user.id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entry_type, "credit");
        assert_eq!(entries[0].reason, "match_reward");
        assert_eq!(entries[1].balance_after, 15);
    }

    #[tokio::test]
    async fn test_reward_unit_config() {
        let db = test_db().await;

        let mut conn = db.pool.acquire().await.unwrap();
        assert!(app_config::get(&mut conn, app_config::REWARD_UNIT_KEY)
            .await
            .unwrap()
            .is_none());
        drop(conn);

        db.set_reward_unit(10).await.unwrap();
        let mut conn = db.pool.acquire().await.unwrap();
        let value = app_config::get(&mut conn, app_config::REWARD_UNIT_KEY)
            .await
            .unwrap();
        assert_eq!(value.as_deref(), Some("10"));
    }

    #[tokio::test]
    async fn test_with_write_tx_commits() {
        let db = test_db().await;
        let user = db.create_user("tx", None, 0).await.unwrap();
        let user_id = user.id;

        db.with_write_tx(move |conn| {
            Box::pin(async move {
                profiles::set_gold_balance(conn, user_id, 42).await?;
                Ok(())
            })
        })
        .await
        .unwrap();

        let fetched = db.get_user(user_id).await.unwrap().unwrap();
        assert_eq!(fetched.gold_balance, 42);
    }

    #[tokio::test]
    async fn test_with_write_tx_rolls_back_on_error() {
        let db = test_db().await;
        let user = db.create_user("rollback", None, 7).await.unwrap();
        let user_id = user.id;

        let result: Result<(), Error> = db
            .with_write_tx(move |conn| {
                Box::pin(async move {
                    profiles::set_gold_balance(conn, user_id, 999).await?;
                    Err(Error::FailedPrecondition("abort".to_string()))
                })
            })
            .await;
        assert!(matches!(result, Err(Error::FailedPrecondition(_))));

        // The balance write inside the failed transaction must not stick.
        let fetched = db.get_user(user_id).await.unwrap().unwrap();
        assert_eq!(fetched.gold_balance, 7);
    }

    #[tokio::test]
    async fn test_leaderboard_orders_by_rating() {
        let db = test_db().await;
        let a = db.create_user("a", None, 0).await.unwrap();
        let b = db.create_user("b", None, 0).await.unwrap();

        let mut conn = db.pool.acquire().await.unwrap();
        for (user, rating) in [(&a, 1300.0), (&b, 1500.0)] {
            ratings::upsert(
                &mut conn,
                &RatingRecord {
                    user_id: user.id,
                    rating,
                    games_played: 5,
                    wins: 3,
                    losses: 2,
                    last_match_at: None,
                    username: user.username.clone(),
                    avatar: None,
                    tier: "silver".to_string(),
                    season: "2026-Q3".to_string(),
                },
            )
            .await
            .unwrap();
        }
        drop(conn);

        let board = db.leaderboard(10).await.unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].user_id, b.id);
        assert_eq!(board[1].user_id, a.id);
    }
}
