//! HTTP endpoint handlers. Thin wrappers that take the store write guard
//! for the duration of one engine operation (the transaction boundary) and
//! translate outcomes to DTOs.
//!
//! Challenge progress updates are dispatched fire-and-forget after the
//! primary flow commits; their failure can never fail the caller.

use std::sync::Arc;

use axum::{extract::{Query, State}, Json};
use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::challenges;
use crate::distributor;
use crate::domain::RewardEvent;
use crate::error::{EngineError, EngineResult};
use crate::games::{self, GameSessionInput};
use crate::ledger::{self, AttemptMetadata};
use crate::progression;
use crate::protocol::*;
use crate::quiz::{self, QuizAttemptInput};
use crate::store::AppState;

fn require_user_id(user_id: &str) -> EngineResult<()> {
    if user_id.trim().is_empty() {
        return Err(EngineError::Validation("userId is required".into()));
    }
    Ok(())
}

/// Normalize a client category to the canonical shop categories.
fn normalize_category(input: Option<&str>) -> String {
    match input.map(|c| c.to_lowercase()).as_deref() {
        Some("anime") => "anime-collection".into(),
        Some("star") => "star-collection".into(),
        Some("car") => "car-collection".into(),
        Some(c) if !c.is_empty() => c.into(),
        _ => "anime-collection".into(),
    }
}

/// Apply a reward event to challenge progress on an independent task.
/// Best-effort: outcomes are logged under the `challenge` target and never
/// reported back to the primary flow. Handlers drop the returned handle;
/// tests await it.
fn dispatch_event(state: Arc<AppState>, event: RewardEvent) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let now = Utc::now();
        let mut data = state.store.write().await;
        let updates = challenges::apply_event(&mut data, now, &event);
        debug!(target: "challenge", user = %event.user_id(), updates = updates.len(), "reward event applied");
    })
}

#[instrument(level = "info")]
pub async fn http_health() -> Json<HealthOut> {
    Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(state, body), fields(user = %body.user_id))]
pub async fn http_complete_activity(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CompleteIn>,
) -> EngineResult<Json<CompleteOut>> {
    require_user_id(&body.user_id)?;
    let now = Utc::now();
    let meta = AttemptMetadata {
        score: body.score,
        time_spent: body.time_spent,
        hints_used: body.hints_used,
        answers: body.answers.clone(),
    };

    let outcome = {
        let mut data = state.store.write().await;
        let activity_id = ledger::resolve_or_create_activity(
            &mut data,
            body.activity_id.as_deref(),
            body.slug.as_deref(),
        )?;
        ledger::grant_completion_reward(&mut data, &state.config, &body.user_id, &activity_id, &meta, now)?
    };

    dispatch_event(
        state,
        RewardEvent::ActivityCompleted {
            user_id: body.user_id.clone(),
            category: outcome.category.clone(),
            activity_type: Some(outcome.activity_type.clone()),
        },
    );

    info!(
        target: "rewards",
        user = %body.user_id,
        activity = %outcome.activity_id,
        rewarded = outcome.rewarded,
        "HTTP activity completion served"
    );
    Ok(Json(CompleteOut::from(&outcome)))
}

#[instrument(level = "info", skip(state, body), fields(user = %body.user_id, quiz = %body.quiz_id))]
pub async fn http_quiz_attempt(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QuizAttemptIn>,
) -> EngineResult<Json<QuizAttemptOut>> {
    require_user_id(&body.user_id)?;
    let now = Utc::now();
    let input = QuizAttemptInput {
        quiz_id: body.quiz_id.clone(),
        correct_answers: body.correct_answers,
        total_questions: body.total_questions,
        time_spent: body.time_spent,
    };

    let outcome = {
        let mut data = state.store.write().await;
        quiz::record_quiz_attempt(&mut data, &state.config, &body.user_id, &input, now)?
    };

    dispatch_event(
        state,
        RewardEvent::QuizAttempt {
            user_id: body.user_id.clone(),
            category: body.category.clone(),
            correct_answers: body.correct_answers,
        },
    );

    Ok(Json(QuizAttemptOut::from(&outcome)))
}

#[instrument(level = "info", skip(state, body), fields(user = %body.user_id, game = %body.game_key))]
pub async fn http_game_session(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GameSessionIn>,
) -> EngineResult<Json<GameSessionOut>> {
    require_user_id(&body.user_id)?;
    let now = Utc::now();
    let input = GameSessionInput {
        game_key: body.game_key.clone(),
        score: body.score,
        correct_count: body.correct_count,
        duration_sec: body.duration_sec,
    };

    let record = {
        let mut data = state.store.write().await;
        games::record_game_session(&mut data, &body.user_id, &input, now)?
    };

    dispatch_event(
        state,
        RewardEvent::GameSession { user_id: body.user_id.clone(), game_key: body.game_key.clone() },
    );

    Ok(Json(GameSessionOut { session: GameSessionView::from(&record) }))
}

#[instrument(level = "info", skip(state, body), fields(user = %body.user_id))]
pub async fn http_card_grant(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CardGrantIn>,
) -> EngineResult<Json<CardGrantOut>> {
    require_user_id(&body.user_id)?;
    let now = Utc::now();
    let day_start = distributor::local_day_start();
    let category = normalize_category(body.category.as_deref());
    let source_game = body.source_game.clone().unwrap_or_else(|| "unknown-game".into());

    let granted = {
        let mut data = state.store.write().await;
        let mut rng = state.rng.lock().await;
        distributor::grant_random_card(
            &mut data,
            &state.config.distribution,
            &mut *rng,
            &body.user_id,
            &category,
            &source_game,
            now,
            day_start,
        )?
    };

    Ok(Json(CardGrantOut { card: CardOut::from(&granted.card) }))
}

#[instrument(level = "info", skip(state, body), fields(user = %body.user_id, card = %body.card_id))]
pub async fn http_card_purchase(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CardPurchaseIn>,
) -> EngineResult<Json<CardPurchaseOut>> {
    require_user_id(&body.user_id)?;
    let now = Utc::now();
    let outcome = {
        let mut data = state.store.write().await;
        ledger::purchase_card(&mut data, &body.user_id, &body.card_id, now)?
    };
    Ok(Json(CardPurchaseOut {
        success: true,
        owned_card_id: outcome.card_id,
        current_diamonds: outcome.wallet_after.current_diamonds,
    }))
}

#[instrument(level = "info", skip(state, body), fields(user = %body.user_id, challenge = %body.challenge_id))]
pub async fn http_challenge_claim(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ClaimIn>,
) -> EngineResult<Json<ClaimOut>> {
    require_user_id(&body.user_id)?;
    let now = Utc::now();
    let outcome = {
        let mut data = state.store.write().await;
        challenges::claim_challenge_reward(&mut data, &state.config, &body.user_id, &body.challenge_id, now)?
    };
    Ok(Json(ClaimOut::from(&outcome)))
}

#[instrument(level = "info", skip(state), fields(user = %q.user_id))]
pub async fn http_challenge_progress(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserQuery>,
) -> EngineResult<Json<ChallengeListOut>> {
    require_user_id(&q.user_id)?;
    let now = Utc::now();
    let data = state.store.read().await;
    let challenges = challenges::active_with_progress(&data, &q.user_id, now)
        .iter()
        .map(|(def, progress)| challenge_row(def, progress.as_ref()))
        .collect();
    Ok(Json(ChallengeListOut { challenges }))
}

#[instrument(level = "info", skip(state), fields(user = %q.user_id))]
pub async fn http_profile_progress(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserQuery>,
) -> EngineResult<Json<ProfileOut>> {
    require_user_id(&q.user_id)?;
    let now = Utc::now();
    let wallet = {
        let mut data = state.store.write().await;
        data.wallet_snapshot(&q.user_id, now)
    };
    let progress = progression::xp_progress(&state.config.progression, wallet.experience);
    Ok(Json(ProfileOut { user: WalletOut::from(&wallet), progress }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::domain::{ChallengeCadence, ChallengeDefinition};
    use crate::store::StoreData;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;
    use tokio::sync::{Mutex, RwLock};

    fn state_with(data: StoreData) -> Arc<AppState> {
        Arc::new(AppState {
            store: RwLock::new(data),
            rng: Mutex::new(StdRng::seed_from_u64(0)),
            config: EngineConfig::default(),
        })
    }

    #[tokio::test]
    async fn dispatch_outcome_never_reaches_the_primary_flow() {
        let now = Utc::now();
        let mut data = StoreData::default();
        // The only active challenge has an undecodable requirement, so the
        // dispatched event can only fall through the rule engine.
        data.challenges.insert(
            "bad".into(),
            ChallengeDefinition {
                id: "bad".into(),
                title: "Bad Descriptor".into(),
                cadence: ChallengeCadence::Weekly,
                requirements: json!({ "type": "made_up_type" }),
                target_value: 1,
                diamond_reward: 10,
                experience_reward: 10,
                start_date: now - chrono::Duration::days(1),
                end_date: now + chrono::Duration::days(1),
                is_active: true,
            },
        );
        let state = state_with(data);

        // Primary flow commits first.
        let record = {
            let mut data = state.store.write().await;
            games::record_game_session(
                &mut data,
                "u1",
                &GameSessionInput {
                    game_key: "code-match".into(),
                    score: 100,
                    correct_count: 5,
                    duration_sec: 60,
                },
                now,
            )
            .unwrap()
        };
        assert_eq!(record.game_key, "code-match");

        let handle = dispatch_event(
            state.clone(),
            RewardEvent::GameSession { user_id: "u1".into(), game_key: "code-match".into() },
        );
        handle.await.unwrap();

        // The session stayed committed and no progress row materialized.
        let data = state.store.read().await;
        assert_eq!(data.game_sessions.len(), 1);
        assert!(data.challenge_progress.is_empty());
    }

    #[test]
    fn category_aliases_normalize_to_collections() {
        assert_eq!(normalize_category(Some("anime")), "anime-collection");
        assert_eq!(normalize_category(Some("CAR")), "car-collection");
        assert_eq!(normalize_category(Some("star-collection")), "star-collection");
        assert_eq!(normalize_category(None), "anime-collection");
    }
}
