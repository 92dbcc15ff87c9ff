//! Challenge rule engine: decodes declarative requirement descriptors,
//! matches them against domain events, and tracks per-user progress.
//!
//! Invoked fire-and-forget from the primary reward flows; reward payout is
//! a separate, explicit claim operation.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::config::EngineConfig;
use crate::domain::{
    ChallengeDefinition, ChallengeProgress, GameKeys, Requirement, RewardEvent, Scope, Wallet,
};
use crate::error::{EngineError, EngineResult};
use crate::store::StoreData;

/// Decode a requirement descriptor. Tolerates the legacy shapes still in
/// seed data: a bare type string, or a JSON string holding the object.
/// Unknown types decode to `None` and simply never match.
pub fn parse_requirements(raw: &Value) -> Option<Requirement> {
    match raw {
        Value::Null => Some(Requirement::CompleteActivities { scope: Scope::Any, category: None }),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ Value::Object(_)) => parse_object(&parsed),
            // Older seeds stored just the type name.
            _ => from_type_str(s, &Value::Null),
        },
        Value::Object(_) => parse_object(raw),
        _ => None,
    }
}

fn parse_object(obj: &Value) -> Option<Requirement> {
    let ty = obj.get("type").and_then(Value::as_str)?;
    from_type_str(ty, obj)
}

fn from_type_str(ty: &str, obj: &Value) -> Option<Requirement> {
    let category = obj
        .get("category")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .map(|c| c.to_string());
    match ty {
        "complete_activities" => Some(Requirement::CompleteActivities {
            scope: parse_scope(obj.get("scope").and_then(Value::as_str)),
            category,
        }),
        "quiz_correct" => Some(Requirement::QuizCorrect { category }),
        "games_session" | "game_session" => Some(Requirement::GamesSession {
            game_keys: parse_game_keys(obj.get("gameKeys")),
        }),
        "complete_learning_activities" => Some(Requirement::CompleteLearningActivities),
        _ => None,
    }
}

fn parse_scope(raw: Option<&str>) -> Scope {
    match raw {
        Some("lesson") => Scope::Lesson,
        Some("quiz") => Scope::Quiz,
        Some("interactive") => Scope::Interactive,
        _ => Scope::Any,
    }
}

fn parse_game_keys(raw: Option<&Value>) -> GameKeys {
    match raw {
        Some(Value::Array(keys)) => GameKeys::Listed(
            keys.iter().filter_map(Value::as_str).map(|k| k.to_string()).collect(),
        ),
        // "any", absent, or anything unrecognized counts every game.
        _ => GameKeys::Any,
    }
}

/// Event scope derived from a free-form activity type string.
fn scope_from_activity_type(activity_type: Option<&str>) -> Scope {
    let t = activity_type.unwrap_or("").to_lowercase();
    if t.contains("quiz") {
        Scope::Quiz
    } else if t.contains("interactive") {
        Scope::Interactive
    } else {
        Scope::Lesson
    }
}

fn category_matches(required: &Option<String>, event_category: &Option<String>) -> bool {
    match (required, event_category) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(req), Some(ev)) => req.eq_ignore_ascii_case(ev),
    }
}

/// How much this event advances a requirement; 0 means "does not apply".
pub fn increment_for(req: &Requirement, event: &RewardEvent) -> i64 {
    match (req, event) {
        (
            Requirement::CompleteActivities { scope, category },
            RewardEvent::ActivityCompleted { category: ev_cat, activity_type, .. },
        ) => {
            let ev_scope = scope_from_activity_type(activity_type.as_deref());
            if *scope != Scope::Any && *scope != ev_scope {
                return 0;
            }
            if !category_matches(category, ev_cat) {
                return 0;
            }
            1
        }
        (
            Requirement::CompleteActivities { scope, category },
            RewardEvent::QuizAttempt { category: ev_cat, .. },
        ) => {
            if *scope != Scope::Any && *scope != Scope::Quiz {
                return 0;
            }
            if !category_matches(category, ev_cat) {
                return 0;
            }
            1
        }
        (
            Requirement::QuizCorrect { category },
            RewardEvent::QuizAttempt { category: ev_cat, correct_answers, .. },
        ) => {
            if !category_matches(category, ev_cat) {
                return 0;
            }
            (*correct_answers).max(0)
        }
        (Requirement::GamesSession { game_keys }, RewardEvent::GameSession { game_key, .. }) => {
            match game_keys {
                GameKeys::Any => 1,
                GameKeys::Listed(keys) => i64::from(keys.iter().any(|k| k == game_key)),
            }
        }
        (Requirement::CompleteLearningActivities, RewardEvent::ActivityCompleted { .. }) => 1,
        (Requirement::CompleteLearningActivities, RewardEvent::QuizAttempt { .. }) => 1,
        _ => 0,
    }
}

#[derive(Clone, Debug)]
pub struct ProgressUpdate {
    pub challenge_id: String,
    pub current_value: i64,
    pub is_completed: bool,
    pub newly_completed: bool,
}

/// Evaluate one event against every active challenge and upsert progress.
/// Runs under the store write guard, so concurrent events for the same
/// (user, challenge) key serialize instead of racing read-modify-write.
#[instrument(level = "debug", skip(data, event), fields(user_id = %event.user_id()))]
pub fn apply_event(data: &mut StoreData, now: DateTime<Utc>, event: &RewardEvent) -> Vec<ProgressUpdate> {
    let user_id = event.user_id().to_string();
    let active: Vec<ChallengeDefinition> = data
        .challenges
        .values()
        .filter(|c| c.in_window(now))
        .cloned()
        .collect();

    let mut updates = Vec::new();
    for ch in active {
        let Some(req) = parse_requirements(&ch.requirements) else {
            debug!(target: "challenge", challenge = %ch.id, "unparseable requirements; skipping");
            continue;
        };
        let inc = increment_for(&req, event);
        if inc <= 0 {
            continue;
        }

        let key = (user_id.clone(), ch.id.clone());
        let progress = data.challenge_progress.entry(key).or_insert_with(|| ChallengeProgress {
            user_id: user_id.clone(),
            challenge_id: ch.id.clone(),
            current_value: 0,
            is_completed: false,
            completed_at: None,
            rewards_claimed: false,
            claimed_at: None,
            last_progress_at: now,
        });
        progress.current_value += inc;
        progress.last_progress_at = now;
        let newly_completed = !progress.is_completed && progress.current_value >= ch.target_value;
        if newly_completed {
            progress.is_completed = true;
            progress.completed_at = Some(now);
        }

        info!(
            target: "challenge",
            user = %user_id,
            challenge = %ch.id,
            inc,
            current = progress.current_value,
            target = ch.target_value,
            completed = progress.is_completed,
            "challenge progress updated"
        );
        updates.push(ProgressUpdate {
            challenge_id: ch.id.clone(),
            current_value: progress.current_value,
            is_completed: progress.is_completed,
            newly_completed,
        });
    }
    updates
}

#[derive(Clone, Debug)]
pub struct ClaimOutcome {
    pub progress: ChallengeProgress,
    pub wallet_after: Wallet,
    pub diamonds: i64,
    pub xp: i64,
}

/// Pay out a completed challenge exactly once. The `rewards_claimed` check
/// and flip share the caller's critical section, so a double claim is a
/// clean conflict, never a double credit.
#[instrument(level = "info", skip(data, cfg), fields(%user_id, %challenge_id))]
pub fn claim_challenge_reward(
    data: &mut StoreData,
    cfg: &EngineConfig,
    user_id: &str,
    challenge_id: &str,
    now: DateTime<Utc>,
) -> EngineResult<ClaimOutcome> {
    let challenge = data
        .challenges
        .get(challenge_id)
        .cloned()
        .ok_or(EngineError::NotFound("challenge"))?;
    let key = (user_id.to_string(), challenge_id.to_string());
    {
        let progress = data
            .challenge_progress
            .get(&key)
            .ok_or(EngineError::NotFound("challenge progress"))?;
        if !progress.is_completed {
            return Err(EngineError::ChallengeNotCompleted);
        }
        if progress.rewards_claimed {
            return Err(EngineError::AlreadyClaimed);
        }
    }

    let diamonds = challenge.diamond_reward;
    let xp = challenge.experience_reward;
    let wallet_after = data.credit_wallet(cfg, user_id, diamonds, xp, now);
    if diamonds > 0 {
        data.push_transaction(
            user_id,
            diamonds,
            "challenge_reward",
            format!("Reward for challenge: {}", challenge.title),
            Some(challenge.id.clone()),
            Some("challenge"),
            now,
        );
    }
    let progress = data
        .challenge_progress
        .get_mut(&key)
        .ok_or_else(|| EngineError::Internal("progress row vanished during claim".into()))?;
    progress.rewards_claimed = true;
    progress.claimed_at = Some(now);
    let progress = progress.clone();

    info!(target: "challenge", %user_id, %challenge_id, diamonds, xp, "challenge reward claimed");
    Ok(ClaimOutcome { progress, wallet_after, diamonds, xp })
}

/// Active challenges joined with this user's progress rows, for the
/// progress listing endpoint.
pub fn active_with_progress(
    data: &StoreData,
    user_id: &str,
    now: DateTime<Utc>,
) -> Vec<(ChallengeDefinition, Option<ChallengeProgress>)> {
    let mut rows: Vec<(ChallengeDefinition, Option<ChallengeProgress>)> = data
        .challenges
        .values()
        .filter(|c| c.in_window(now))
        .map(|c| {
            let progress = data
                .challenge_progress
                .get(&(user_id.to_string(), c.id.clone()))
                .cloned();
            (c.clone(), progress)
        })
        .collect();
    rows.sort_by(|a, b| a.0.end_date.cmp(&b.0.end_date).then(a.0.id.cmp(&b.0.id)));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChallengeCadence;
    use serde_json::json;

    fn definition(id: &str, requirements: Value, target: i64, now: DateTime<Utc>) -> ChallengeDefinition {
        ChallengeDefinition {
            id: id.into(),
            title: format!("Challenge {id}"),
            cadence: ChallengeCadence::Weekly,
            requirements,
            target_value: target,
            diamond_reward: 50,
            experience_reward: 100,
            start_date: now - chrono::Duration::days(1),
            end_date: now + chrono::Duration::days(6),
            is_active: true,
        }
    }

    fn quiz_event(category: &str, correct: i64) -> RewardEvent {
        RewardEvent::QuizAttempt {
            user_id: "u1".into(),
            category: Some(category.into()),
            correct_answers: correct,
        }
    }

    #[test]
    fn legacy_bare_string_decodes_as_any_scope() {
        let req = parse_requirements(&json!("complete_activities")).unwrap();
        assert_eq!(req, Requirement::CompleteActivities { scope: Scope::Any, category: None });

        // JSON-in-a-string also decodes.
        let req = parse_requirements(&json!("{\"type\":\"quiz_correct\",\"category\":\"loops\"}")).unwrap();
        assert_eq!(req, Requirement::QuizCorrect { category: Some("loops".into()) });

        assert!(parse_requirements(&json!({ "type": "made_up_type" })).is_none());
    }

    #[test]
    fn scoped_definition_counts_only_matching_events() {
        let now = Utc::now();
        let mut data = StoreData::default();
        data.challenges.insert(
            "ch1".into(),
            definition(
                "ch1",
                json!({ "type": "complete_activities", "scope": "quiz", "category": "loops" }),
                5,
                now,
            ),
        );

        // Wrong scope: a lesson in the right category does not count.
        let lesson = RewardEvent::ActivityCompleted {
            user_id: "u1".into(),
            category: Some("loops".into()),
            activity_type: Some("lesson".into()),
        };
        assert!(apply_event(&mut data, now, &lesson).is_empty());

        // Wrong category: quiz attempts elsewhere do not count.
        assert!(apply_event(&mut data, now, &quiz_event("strings", 3)).is_empty());

        // Five matching quiz attempts complete the challenge exactly.
        for i in 1..=5 {
            let updates = apply_event(&mut data, now, &quiz_event("LOOPS", 3));
            assert_eq!(updates.len(), 1);
            assert_eq!(updates[0].current_value, i);
            assert_eq!(updates[0].is_completed, i >= 5);
            assert_eq!(updates[0].newly_completed, i == 5);
        }
        let p = data.challenge_progress.get(&("u1".into(), "ch1".into())).unwrap();
        assert!(p.is_completed && p.completed_at.is_some());
    }

    #[test]
    fn quiz_correct_accumulates_answer_counts() {
        let now = Utc::now();
        let mut data = StoreData::default();
        data.challenges.insert(
            "ch1".into(),
            definition("ch1", json!({ "type": "quiz_correct" }), 20, now),
        );

        apply_event(&mut data, now, &quiz_event("loops", 8));
        let updates = apply_event(&mut data, now, &quiz_event("strings", 12));
        assert_eq!(updates[0].current_value, 20);
        assert!(updates[0].is_completed);

        // Negative counts clamp to zero (no progress, no row churn).
        assert!(apply_event(&mut data, now, &quiz_event("loops", -4)).is_empty());
    }

    #[test]
    fn game_session_matches_listed_keys_only() {
        let now = Utc::now();
        let mut data = StoreData::default();
        data.challenges.insert(
            "any".into(),
            definition("any", json!({ "type": "games_session", "gameKeys": "any" }), 3, now),
        );
        data.challenges.insert(
            "listed".into(),
            definition("listed", json!({ "type": "games_session", "gameKeys": ["code-match"] }), 3, now),
        );

        let other = RewardEvent::GameSession { user_id: "u1".into(), game_key: "quiz-rush".into() };
        let updates = apply_event(&mut data, now, &other);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].challenge_id, "any");

        let listed = RewardEvent::GameSession { user_id: "u1".into(), game_key: "code-match".into() };
        let mut ids: Vec<String> =
            apply_event(&mut data, now, &listed).into_iter().map(|u| u.challenge_id).collect();
        ids.sort();
        assert_eq!(ids, vec!["any".to_string(), "listed".to_string()]);
    }

    #[test]
    fn expired_and_inactive_definitions_are_ignored() {
        let now = Utc::now();
        let mut data = StoreData::default();
        let mut expired = definition("old", json!({ "type": "games_session" }), 1, now);
        expired.end_date = now - chrono::Duration::days(1);
        data.challenges.insert("old".into(), expired);
        let mut disabled = definition("off", json!({ "type": "games_session" }), 1, now);
        disabled.is_active = false;
        data.challenges.insert("off".into(), disabled);

        let ev = RewardEvent::GameSession { user_id: "u1".into(), game_key: "g".into() };
        assert!(apply_event(&mut data, now, &ev).is_empty());
    }

    #[test]
    fn claim_pays_once_then_conflicts() {
        let now = Utc::now();
        let cfg = EngineConfig::default();
        let mut data = StoreData::default();
        data.challenges.insert(
            "ch1".into(),
            definition("ch1", json!({ "type": "games_session" }), 2, now),
        );
        let ev = RewardEvent::GameSession { user_id: "u1".into(), game_key: "g".into() };

        // Not completed yet.
        apply_event(&mut data, now, &ev);
        assert!(matches!(
            claim_challenge_reward(&mut data, &cfg, "u1", "ch1", now),
            Err(EngineError::ChallengeNotCompleted)
        ));

        apply_event(&mut data, now, &ev);
        let out = claim_challenge_reward(&mut data, &cfg, "u1", "ch1", now).unwrap();
        assert_eq!(out.diamonds, 50);
        assert_eq!(out.xp, 100);
        assert_eq!(out.wallet_after.current_diamonds, 50);
        assert_eq!(out.wallet_after.total_diamonds, 50);
        assert!(out.progress.rewards_claimed);

        assert!(matches!(
            claim_challenge_reward(&mut data, &cfg, "u1", "ch1", now),
            Err(EngineError::AlreadyClaimed)
        ));
        // Still exactly one credit in the wallet and one audit row.
        assert_eq!(data.users.get("u1").unwrap().wallet.current_diamonds, 50);
        assert_eq!(data.transactions.len(), 1);
    }

    #[test]
    fn claim_for_unknown_progress_is_not_found() {
        let now = Utc::now();
        let cfg = EngineConfig::default();
        let mut data = StoreData::default();
        data.challenges.insert(
            "ch1".into(),
            definition("ch1", json!({ "type": "games_session" }), 2, now),
        );
        assert!(matches!(
            claim_challenge_reward(&mut data, &cfg, "u1", "ch1", now),
            Err(EngineError::NotFound("challenge progress"))
        ));
        assert!(matches!(
            claim_challenge_reward(&mut data, &cfg, "u1", "missing", now),
            Err(EngineError::NotFound("challenge"))
        ));
    }
}
