// Match settlement: turns a finished match into rating updates, gold
// rewards, and an immutable settlement record, inside one atomic write
// transaction.
//
// Flow: validate match state -> resolve seats into a typed topology ->
// permission check -> idempotency guard -> per-participant rating/reward
// update -> persist the settlement record and mark the match settled.
// A replayed call finds the settlement record and returns it verbatim
// with `alreadyProcessed = true` and no writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use crate::db::{self, Database, MatchRow, RatingRecord, SettlementRow};
use crate::error::Error;
use crate::rating::{self, Outcome};
use crate::reward;

// ── Typed match entities ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatColor {
    Blue,
    Red,
}

impl SeatColor {
    pub fn as_str(self) -> &'static str {
        match self {
            SeatColor::Blue => "blue",
            SeatColor::Red => "red",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "blue" => Some(SeatColor::Blue),
            "red" => Some(SeatColor::Red),
            _ => None,
        }
    }
}

/// Computer opponent strength tag. Unset or unrecognized tags fall back
/// to medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("easy") => Difficulty::Easy,
            Some("hard") => Difficulty::Hard,
            _ => Difficulty::Medium,
        }
    }

    /// Fixed rating used as the human's opponent reference.
    pub fn reference_rating(self) -> i64 {
        match self {
            Difficulty::Easy => 900,
            Difficulty::Medium => 1200,
            Difficulty::Hard => 1500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// One seat of a match: a human account or the computer opponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seat {
    Human(i64),
    Computer(Difficulty),
}

impl Seat {
    fn from_columns(player_id: Option<i64>, ai_difficulty: Option<&str>) -> Self {
        match player_id {
            Some(id) => Seat::Human(id),
            None => Seat::Computer(Difficulty::from_tag(ai_difficulty)),
        }
    }
}

/// Match topology after seat resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Topology {
    HumanVsHuman { blue: i64, red: i64 },
    HumanVsComputer {
        human: i64,
        human_color: SeatColor,
        difficulty: Difficulty,
    },
}

/// A finished match validated and typed at the transaction boundary.
#[derive(Debug, Clone)]
struct SettledMatch {
    winner: SeatColor,
    game_mode: String,
    topology: Topology,
}

impl SettledMatch {
    fn from_row(row: &MatchRow) -> Result<Self, Error> {
        if row.status != "finished" {
            return Err(Error::FailedPrecondition(
                "match is not finished".to_string(),
            ));
        }
        let winner = row
            .winner
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .and_then(SeatColor::parse)
            .ok_or_else(|| {
                Error::FailedPrecondition("match has no declared winner".to_string())
            })?;

        let blue = Seat::from_columns(row.blue_player_id, row.ai_difficulty.as_deref());
        let red = Seat::from_columns(row.red_player_id, row.ai_difficulty.as_deref());
        let topology = match (blue, red) {
            (Seat::Human(blue), Seat::Human(red)) => Topology::HumanVsHuman { blue, red },
            (Seat::Human(human), Seat::Computer(difficulty)) => Topology::HumanVsComputer {
                human,
                human_color: SeatColor::Blue,
                difficulty,
            },
            (Seat::Computer(difficulty), Seat::Human(human)) => Topology::HumanVsComputer {
                human,
                human_color: SeatColor::Red,
                difficulty,
            },
            (Seat::Computer(_), Seat::Computer(_)) => {
                return Err(Error::FailedPrecondition(
                    "match has no human participant".to_string(),
                ));
            }
        };

        Ok(SettledMatch {
            winner,
            game_mode: row.game_mode.clone(),
            topology,
        })
    }

    fn is_participant(&self, user_id: i64) -> bool {
        match self.topology {
            Topology::HumanVsHuman { blue, red } => user_id == blue || user_id == red,
            Topology::HumanVsComputer { human, .. } => user_id == human,
        }
    }
}

// ── Wire types (camelCase client contract) ────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecaySummary {
    pub weeks: i64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    pub user_id: i64,
    pub username: String,
    pub color: SeatColor,
    pub score: i64,
    pub expected_score: f64,
    pub previous_rating: i64,
    pub new_rating: i64,
    pub rating_delta: i64,
    pub games_played: i64,
    pub wins: i64,
    pub losses: i64,
    pub k_factor: i64,
    pub tier: rating::Tier,
    pub season: String,
    pub decay: Option<DecaySummary>,
    pub gold_reward: i64,
    pub gold_balance: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiOpponent {
    pub difficulty: String,
    pub rating: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementSummary {
    pub already_processed: bool,
    pub game_id: String,
    pub winner: SeatColor,
    pub participants: Vec<ParticipantSummary>,
    pub processed_at: String,
    pub ai_opponent: Option<AiOpponent>,
    pub game_mode: String,
}

// ── Coordinator ───────────────────────────────────────────────────────

/// Settle a finished match on behalf of `caller_id`. All reads and writes
/// run inside one retrying write transaction.
pub async fn process(
    db: &Database,
    caller_id: i64,
    game_id: &str,
    now: DateTime<Utc>,
) -> Result<SettlementSummary, Error> {
    let game_id = game_id.trim();
    if game_id.is_empty() {
        return Err(Error::InvalidArgument("gameId is required".to_string()));
    }
    let game_id = game_id.to_string();

    db.with_write_tx(move |conn| {
        let game_id = game_id.clone();
        Box::pin(async move { settle_in_tx(conn, caller_id, &game_id, now).await })
    })
    .await
}

async fn settle_in_tx(
    conn: &mut SqliteConnection,
    caller_id: i64,
    game_id: &str,
    now: DateTime<Utc>,
) -> Result<SettlementSummary, Error> {
    let row = db::matches::get(conn, game_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("match {game_id} not found")))?;
    let game = SettledMatch::from_row(&row)?;

    if !game.is_participant(caller_id) {
        return Err(Error::PermissionDenied(
            "caller is not a participant in this match".to_string(),
        ));
    }

    // Idempotency guard: the record existence check shares the transaction
    // with the eventual write, so concurrent attempts cannot both settle.
    if let Some(existing) = db::settlements::get(conn, game_id).await? {
        tracing::info!("match {game_id} already settled, returning stored record");
        return summary_from_row(&existing, true);
    }

    let reward_unit = reward::reward_unit_from_config(
        db::app_config::get(conn, db::app_config::REWARD_UNIT_KEY)
            .await?
            .as_deref(),
    );

    let mut participants = Vec::new();
    let mut ai_opponent = None;

    match game.topology {
        Topology::HumanVsHuman { blue, red } => {
            // Load both sides first: each decayed rating is the other's
            // opponent reference, so expected scores sum to 1.
            let blue_state = load_participant(conn, blue, now).await?;
            let red_state = load_participant(conn, red, now).await?;
            let blue_opponent = red_state.decayed_rating;
            let red_opponent = blue_state.decayed_rating;
            participants.push(
                settle_participant(
                    conn,
                    blue_state,
                    SeatColor::Blue,
                    game.winner,
                    blue_opponent,
                    reward_unit,
                    game_id,
                    now,
                )
                .await?,
            );
            participants.push(
                settle_participant(
                    conn,
                    red_state,
                    SeatColor::Red,
                    game.winner,
                    red_opponent,
                    reward_unit,
                    game_id,
                    now,
                )
                .await?,
            );
        }
        Topology::HumanVsComputer {
            human,
            human_color,
            difficulty,
        } => {
            let state = load_participant(conn, human, now).await?;
            participants.push(
                settle_participant(
                    conn,
                    state,
                    human_color,
                    game.winner,
                    difficulty.reference_rating() as f64,
                    reward_unit,
                    game_id,
                    now,
                )
                .await?,
            );
            ai_opponent = Some(AiOpponent {
                difficulty: difficulty.as_str().to_string(),
                rating: difficulty.reference_rating(),
            });
        }
    }

    db::matches::mark_settled(conn, game_id).await?;

    let processed_at = now.to_rfc3339();
    let record = SettlementRow {
        match_id: game_id.to_string(),
        winner: game.winner.as_str().to_string(),
        game_mode: game.game_mode.clone(),
        ai_difficulty: ai_opponent.as_ref().map(|a| a.difficulty.clone()),
        ai_rating: ai_opponent.as_ref().map(|a| a.rating),
        participants: serde_json::to_string(&participants)
            .map_err(|e| Error::Internal(format!("settlement record encoding failed: {e}")))?,
        processed_at: processed_at.clone(),
    };
    db::settlements::insert(conn, &record).await?;

    tracing::info!(
        "settled match {game_id}: winner {}, {} participant(s)",
        game.winner.as_str(),
        participants.len()
    );

    Ok(SettlementSummary {
        already_processed: false,
        game_id: game_id.to_string(),
        winner: game.winner,
        participants,
        processed_at,
        ai_opponent,
        game_mode: game.game_mode,
    })
}

/// Rebuild a response from the stored settlement record.
fn summary_from_row(row: &SettlementRow, already_processed: bool) -> Result<SettlementSummary, Error> {
    let winner = SeatColor::parse(&row.winner)
        .ok_or_else(|| Error::Internal(format!("stored winner {:?} is invalid", row.winner)))?;
    let participants: Vec<ParticipantSummary> = serde_json::from_str(&row.participants)
        .map_err(|e| Error::Internal(format!("settlement record decoding failed: {e}")))?;
    let ai_opponent = match (&row.ai_difficulty, row.ai_rating) {
        (Some(difficulty), Some(rating)) => Some(AiOpponent {
            difficulty: difficulty.clone(),
            rating,
        }),
        _ => None,
    };
    Ok(SettlementSummary {
        already_processed,
        game_id: row.match_id.clone(),
        winner,
        participants,
        processed_at: row.processed_at.clone(),
        ai_opponent,
        game_mode: row.game_mode.clone(),
    })
}

/// Stored settlement record as the public summary shape (for the read
/// endpoint; a stored record always means the match was processed).
pub fn stored_summary(row: &SettlementRow) -> Result<SettlementSummary, Error> {
    summary_from_row(row, true)
}

// ── Per-participant settlement ────────────────────────────────────────

/// One human participant's state as read inside the transaction.
struct ParticipantState {
    user_id: i64,
    username: String,
    avatar: Option<String>,
    gold_balance: i64,
    record: RatingRecord,
    decayed_rating: f64,
    decay: Option<rating::Decay>,
}

async fn load_participant(
    conn: &mut SqliteConnection,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<ParticipantState, Error> {
    // The profile store is owned by the accounts subsystem; a missing row
    // settles with explicit defaults rather than failing the match.
    let (username, avatar, gold_balance) = match db::profiles::get(conn, user_id).await? {
        Some(p) => (p.username, p.avatar, p.gold_balance),
        None => ("Player".to_string(), None, 0),
    };

    let record = db::ratings::get(conn, user_id)
        .await?
        .unwrap_or_else(|| RatingRecord {
            user_id,
            rating: rating::STARTING_RATING,
            games_played: 0,
            wins: 0,
            losses: 0,
            last_match_at: None,
            username: String::new(),
            avatar: None,
            tier: rating::tier(rating::STARTING_RATING as i64).as_str().to_string(),
            season: String::new(),
        });

    let (decayed_rating, decay) = rating::decay(record.rating, record.last_match_at_utc(), now);

    Ok(ParticipantState {
        user_id,
        username,
        avatar,
        gold_balance,
        record,
        decayed_rating,
        decay,
    })
}

#[allow(clippy::too_many_arguments)]
async fn settle_participant(
    conn: &mut SqliteConnection,
    state: ParticipantState,
    color: SeatColor,
    winner: SeatColor,
    opponent_rating: f64,
    reward_unit: i64,
    match_id: &str,
    now: DateTime<Utc>,
) -> Result<ParticipantSummary, Error> {
    let outcome = if color == winner {
        Outcome::Win
    } else {
        Outcome::Loss
    };
    let score = outcome.score();

    // Decay has already been folded into decayed_rating; it is the
    // baseline for K, expected score, and the delta.
    let k = rating::k_factor(state.decayed_rating, state.record.games_played);
    let expected = rating::expected_score(state.decayed_rating, opponent_rating);
    let new_rating = rating::apply_rating(state.decayed_rating, k, score, expected);

    let previous_rating = state.record.rating.round() as i64;
    let rating_delta = new_rating - state.decayed_rating.round() as i64;

    let games_played = state.record.games_played + 1;
    let wins = state.record.wins + i64::from(outcome == Outcome::Win);
    let losses = state.record.losses + i64::from(outcome == Outcome::Loss);
    let tier = rating::tier(new_rating);
    let season = rating::season(now);

    db::ratings::upsert(
        conn,
        &RatingRecord {
            user_id: state.user_id,
            rating: new_rating as f64,
            games_played,
            wins,
            losses,
            last_match_at: Some(now.to_rfc3339()),
            username: state.username.clone(),
            avatar: state.avatar.clone(),
            tier: tier.as_str().to_string(),
            season: season.clone(),
        },
    )
    .await?;

    let gold_reward = reward::gold_for(outcome, reward_unit);
    let gold_balance = if gold_reward > 0 {
        let new_balance = state.gold_balance + gold_reward;
        db::profiles::set_gold_balance(conn, state.user_id, new_balance).await?;
        db::ledger::append(
            conn,
            state.user_id,
            gold_reward,
            match_id,
            new_balance,
            &now.to_rfc3339(),
        )
        .await?;
        new_balance
    } else {
        state.gold_balance
    };

    Ok(ParticipantSummary {
        user_id: state.user_id,
        username: state.username,
        color,
        score: score as i64,
        expected_score: round_dp(expected, 4),
        previous_rating,
        new_rating,
        rating_delta,
        games_played,
        wins,
        losses,
        k_factor: k as i64,
        tier,
        season,
        decay: state.decay.map(|d| DecaySummary {
            weeks: d.weeks,
            amount: round_dp(d.amount, 2),
        }),
        gold_reward,
        gold_balance,
    })
}

fn round_dp(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}
