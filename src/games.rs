//! Mini-game session recording. The session row itself carries no reward;
//! it only feeds the challenge rule engine (fired by the caller) and the
//! analytics consumers.

use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::GameSessionRecord;
use crate::error::{EngineError, EngineResult};
use crate::store::StoreData;

#[derive(Clone, Debug)]
pub struct GameSessionInput {
    pub game_key: String,
    pub score: i64,
    pub correct_count: i64,
    pub duration_sec: i64,
}

#[instrument(level = "info", skip(data, input), fields(%user_id, game_key = %input.game_key))]
pub fn record_game_session(
    data: &mut StoreData,
    user_id: &str,
    input: &GameSessionInput,
    now: DateTime<Utc>,
) -> EngineResult<GameSessionRecord> {
    if input.game_key.trim().is_empty() {
        return Err(EngineError::Validation("gameKey is required".into()));
    }

    data.ensure_user(user_id, now);
    let record = GameSessionRecord {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        game_key: input.game_key.clone(),
        score: input.score.max(0),
        correct_count: input.correct_count.max(0),
        duration_sec: input.duration_sec.max(0),
        completed_at: now,
    };
    data.game_sessions.push(record.clone());

    info!(target: "rewards", %user_id, game = %input.game_key, score = record.score, "game session recorded");
    Ok(record)
}
