//! Public request/response DTOs for the HTTP API (serde ready).
//! Keep this small and stable to evolve the engine and clients
//! independently.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::challenges::ClaimOutcome;
use crate::domain::{Card, ChallengeDefinition, ChallengeProgress, GameSessionRecord, Wallet};
use crate::ledger::CompletionOutcome;
use crate::milestones::MilestoneAward;
use crate::progression::XpProgress;
use crate::quiz::QuizAttemptOutcome;

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

/// Wallet snapshot shared by most responses.
#[derive(Serialize)]
pub struct WalletOut {
    pub level: u32,
    pub experience: i64,
    #[serde(rename = "currentDiamonds")]
    pub current_diamonds: i64,
    #[serde(rename = "totalDiamonds")]
    pub total_diamonds: i64,
}

impl From<&Wallet> for WalletOut {
    fn from(w: &Wallet) -> Self {
        Self {
            level: w.level,
            experience: w.experience,
            current_diamonds: w.current_diamonds,
            total_diamonds: w.total_diamonds,
        }
    }
}

//
// Activity completion
//

#[derive(Deserialize)]
pub struct CompleteIn {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "activityId")]
    pub activity_id: Option<String>,
    pub slug: Option<String>,
    pub score: Option<f64>,
    #[serde(rename = "timeSpent")]
    pub time_spent: Option<i64>,
    #[serde(rename = "hintsUsed")]
    pub hints_used: Option<i64>,
    pub answers: Option<Value>,
}

#[derive(Serialize)]
pub struct RewardsOut {
    pub diamonds: i64,
    pub experience: i64,
}

#[derive(Serialize)]
pub struct CompleteOut {
    pub success: bool,
    #[serde(rename = "activityId")]
    pub activity_id: String,
    #[serde(rename = "alreadyCompleted")]
    pub already_completed: bool,
    pub rewards: RewardsOut,
    pub user: WalletOut,
}

impl From<&CompletionOutcome> for CompleteOut {
    fn from(o: &CompletionOutcome) -> Self {
        Self {
            success: true,
            activity_id: o.activity_id.clone(),
            already_completed: o.already_completed,
            rewards: RewardsOut { diamonds: o.diamonds_granted, experience: o.xp_granted },
            user: WalletOut::from(&o.wallet_after),
        }
    }
}

//
// Quiz attempts & milestones
//

#[derive(Deserialize)]
pub struct QuizAttemptIn {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "quizId")]
    pub quiz_id: String,
    pub category: Option<String>,
    #[serde(rename = "correctAnswers")]
    pub correct_answers: i64,
    #[serde(rename = "totalQuestions")]
    pub total_questions: i64,
    #[serde(rename = "timeSpent", default)]
    pub time_spent: i64,
}

#[derive(Serialize)]
pub struct MilestoneOut {
    pub milestone: i64,
    pub diamonds: i64,
    pub xp: i64,
}

impl From<&MilestoneAward> for MilestoneOut {
    fn from(a: &MilestoneAward) -> Self {
        Self { milestone: a.threshold, diamonds: a.diamonds, xp: a.xp }
    }
}

#[derive(Serialize)]
pub struct QuizAttemptOut {
    pub id: String,
    pub score: i64,
    #[serde(rename = "correctAnswers")]
    pub correct_answers: i64,
    #[serde(rename = "totalQuestions")]
    pub total_questions: i64,
    #[serde(rename = "lifetimeCorrect")]
    pub lifetime_correct: i64,
    pub awarded: Vec<MilestoneOut>,
    pub wallet: WalletOut,
}

impl From<&QuizAttemptOutcome> for QuizAttemptOut {
    fn from(o: &QuizAttemptOutcome) -> Self {
        Self {
            id: o.attempt_id.clone(),
            score: o.score,
            correct_answers: o.correct_answers,
            total_questions: o.total_questions,
            lifetime_correct: o.lifetime_correct,
            awarded: o.awarded.iter().map(MilestoneOut::from).collect(),
            wallet: WalletOut::from(&o.wallet_after),
        }
    }
}

//
// Game sessions
//

#[derive(Deserialize)]
pub struct GameSessionIn {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "gameKey")]
    pub game_key: String,
    #[serde(default)]
    pub score: i64,
    #[serde(rename = "correctCount", default)]
    pub correct_count: i64,
    #[serde(rename = "durationSec", default)]
    pub duration_sec: i64,
}

#[derive(Serialize)]
pub struct GameSessionOut {
    pub session: GameSessionView,
}

#[derive(Serialize)]
pub struct GameSessionView {
    pub id: String,
    #[serde(rename = "gameKey")]
    pub game_key: String,
    pub score: i64,
    #[serde(rename = "correctCount")]
    pub correct_count: i64,
    #[serde(rename = "durationSec")]
    pub duration_sec: i64,
}

impl From<&GameSessionRecord> for GameSessionView {
    fn from(r: &GameSessionRecord) -> Self {
        Self {
            id: r.id.clone(),
            game_key: r.game_key.clone(),
            score: r.score,
            correct_count: r.correct_count,
            duration_sec: r.duration_sec,
        }
    }
}

//
// Cards
//

#[derive(Deserialize)]
pub struct CardGrantIn {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub category: Option<String>,
    #[serde(rename = "sourceGame")]
    pub source_game: Option<String>,
}

#[derive(Serialize)]
pub struct CardOut {
    pub id: String,
    pub name: String,
    pub rarity: String,
    pub category: String,
}

impl From<&Card> for CardOut {
    fn from(c: &Card) -> Self {
        Self {
            id: c.id.clone(),
            name: c.name.clone(),
            rarity: c.rarity.as_str().to_string(),
            category: c.category.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct CardGrantOut {
    pub card: CardOut,
}

#[derive(Deserialize)]
pub struct CardPurchaseIn {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "cardId")]
    pub card_id: String,
}

#[derive(Serialize)]
pub struct CardPurchaseOut {
    pub success: bool,
    #[serde(rename = "ownedCardId")]
    pub owned_card_id: String,
    #[serde(rename = "currentDiamonds")]
    pub current_diamonds: i64,
}

//
// Challenges
//

#[derive(Deserialize)]
pub struct ClaimIn {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "challengeId")]
    pub challenge_id: String,
}

#[derive(Serialize)]
pub struct ProgressOut {
    #[serde(rename = "challengeId")]
    pub challenge_id: String,
    #[serde(rename = "currentValue")]
    pub current_value: i64,
    #[serde(rename = "isCompleted")]
    pub is_completed: bool,
    #[serde(rename = "rewardsClaimed")]
    pub rewards_claimed: bool,
}

impl From<&ChallengeProgress> for ProgressOut {
    fn from(p: &ChallengeProgress) -> Self {
        Self {
            challenge_id: p.challenge_id.clone(),
            current_value: p.current_value,
            is_completed: p.is_completed,
            rewards_claimed: p.rewards_claimed,
        }
    }
}

#[derive(Serialize)]
pub struct ClaimOut {
    pub success: bool,
    pub progress: ProgressOut,
    pub user: WalletOut,
    pub reward: RewardsOut,
}

impl From<&ClaimOutcome> for ClaimOut {
    fn from(o: &ClaimOutcome) -> Self {
        Self {
            success: true,
            progress: ProgressOut::from(&o.progress),
            user: WalletOut::from(&o.wallet_after),
            reward: RewardsOut { diamonds: o.diamonds, experience: o.xp },
        }
    }
}

/// Query extractor for the GET endpoints. `Debug` is required: the handler
/// spans record the query argument.
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Serialize)]
pub struct ChallengeRowOut {
    pub id: String,
    pub title: String,
    pub cadence: crate::domain::ChallengeCadence,
    #[serde(rename = "targetValue")]
    pub target_value: i64,
    #[serde(rename = "diamondReward")]
    pub diamond_reward: i64,
    #[serde(rename = "experienceReward")]
    pub experience_reward: i64,
    #[serde(rename = "endDate")]
    pub end_date: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "currentValue")]
    pub current_value: i64,
    #[serde(rename = "isCompleted")]
    pub is_completed: bool,
    #[serde(rename = "rewardsClaimed")]
    pub rewards_claimed: bool,
}

pub fn challenge_row(def: &ChallengeDefinition, progress: Option<&ChallengeProgress>) -> ChallengeRowOut {
    ChallengeRowOut {
        id: def.id.clone(),
        title: def.title.clone(),
        cadence: def.cadence,
        target_value: def.target_value,
        diamond_reward: def.diamond_reward,
        experience_reward: def.experience_reward,
        end_date: def.end_date,
        current_value: progress.map(|p| p.current_value).unwrap_or(0),
        is_completed: progress.map(|p| p.is_completed).unwrap_or(false),
        rewards_claimed: progress.map(|p| p.rewards_claimed).unwrap_or(false),
    }
}

#[derive(Serialize)]
pub struct ChallengeListOut {
    pub challenges: Vec<ChallengeRowOut>,
}

//
// Profile
//

#[derive(Serialize)]
pub struct ProfileOut {
    pub user: WalletOut,
    pub progress: XpProgress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_query_formats_into_request_spans() {
        let q = UserQuery { user_id: "u1".into() };
        assert!(format!("{q:?}").contains("u1"));
    }
}
