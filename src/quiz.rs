//! Quiz attempt recording. Persists the attempt, recomputes the lifetime
//! correct-answer aggregate and runs the milestone evaluator in the same
//! critical section; the challenge event is fired separately by the caller.

use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::{QuizAttemptRecord, Wallet};
use crate::error::{EngineError, EngineResult};
use crate::milestones::{self, MilestoneAward};
use crate::store::StoreData;

#[derive(Clone, Debug)]
pub struct QuizAttemptInput {
    pub quiz_id: String,
    pub correct_answers: i64,
    pub total_questions: i64,
    pub time_spent: i64,
}

#[derive(Clone, Debug)]
pub struct QuizAttemptOutcome {
    pub attempt_id: String,
    pub score: i64,
    pub correct_answers: i64,
    pub total_questions: i64,
    pub lifetime_correct: i64,
    pub awarded: Vec<MilestoneAward>,
    pub wallet_after: Wallet,
}

#[instrument(level = "info", skip(data, cfg, input), fields(%user_id, quiz_id = %input.quiz_id))]
pub fn record_quiz_attempt(
    data: &mut StoreData,
    cfg: &EngineConfig,
    user_id: &str,
    input: &QuizAttemptInput,
    now: DateTime<Utc>,
) -> EngineResult<QuizAttemptOutcome> {
    if input.quiz_id.trim().is_empty() {
        return Err(EngineError::Validation("quizId is required".into()));
    }
    if input.correct_answers < 0 || input.total_questions < 0 {
        return Err(EngineError::Validation("answer counts must not be negative".into()));
    }
    if input.correct_answers > input.total_questions && input.total_questions > 0 {
        return Err(EngineError::Validation(
            "correctAnswers cannot exceed totalQuestions".into(),
        ));
    }

    data.ensure_user(user_id, now);
    let score = ((input.correct_answers as f64 / input.total_questions.max(1) as f64) * 100.0)
        .round() as i64;
    let attempt_id = Uuid::new_v4().to_string();
    data.quiz_attempts.push(QuizAttemptRecord {
        id: attempt_id.clone(),
        user_id: user_id.to_string(),
        quiz_id: input.quiz_id.clone(),
        score,
        correct_answers: input.correct_answers,
        total_questions: input.total_questions,
        time_spent: input.time_spent.max(0),
        completed_at: now,
    });

    let lifetime_correct: i64 = data
        .quiz_attempts
        .iter()
        .filter(|a| a.user_id == user_id)
        .map(|a| a.correct_answers)
        .sum();

    let awarded = milestones::evaluate_milestones(data, cfg, user_id, lifetime_correct, now);
    let wallet_after = data.wallet_snapshot(user_id, now);

    info!(
        target: "rewards",
        %user_id,
        quiz = %input.quiz_id,
        score,
        lifetime_correct,
        milestones = awarded.len(),
        "quiz attempt recorded"
    );

    Ok(QuizAttemptOutcome {
        attempt_id,
        score,
        correct_answers: input.correct_answers,
        total_questions: input.total_questions,
        lifetime_correct,
        awarded,
        wallet_after,
    })
}
