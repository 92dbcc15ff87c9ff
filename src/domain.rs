//! Domain models for the reward & progression engine: wallets, completable
//! activities, collectible cards, challenges, and the audit ledgers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Card rarity, ordered from most to least common.
/// Variant order matters: it is the stable iteration order for the
/// weighted rarity draw in the distributor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    SuperRare,
    UltraRare,
    Epic,
    Legendary,
    Mythic,
}

impl Rarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rarity::Common => "Common",
            Rarity::Uncommon => "Uncommon",
            Rarity::Rare => "Rare",
            Rarity::SuperRare => "SuperRare",
            Rarity::UltraRare => "UltraRare",
            Rarity::Epic => "Epic",
            Rarity::Legendary => "Legendary",
            Rarity::Mythic => "Mythic",
        }
    }
}

/// Per-user currency and XP counters.
///
/// Invariants: `current_diamonds <= total_diamonds`; `experience` and
/// `total_diamonds` never decrease; `level` is a cached projection of
/// `experience` through the progression curve.
#[derive(Clone, Debug, Serialize)]
pub struct Wallet {
    pub current_diamonds: i64,
    pub total_diamonds: i64,
    pub experience: i64,
    pub level: u32,
}

impl Default for Wallet {
    fn default() -> Self {
        Self { current_diamonds: 0, total_diamonds: 0, experience: 0, level: 1 }
    }
}

#[derive(Clone, Debug)]
pub struct UserAccount {
    pub id: String,
    pub wallet: Wallet,
    pub created_at: DateTime<Utc>,
}

/// A completable unit of work (lesson, quiz, interactive activity).
#[derive(Clone, Debug)]
pub struct Activity {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub activity_type: String, // "lesson" | "quiz" | "interactive" (free-form)
    pub category: Option<String>,
    pub diamond_reward: i64,
    pub experience_reward: i64,
    pub is_active: bool,
}

/// One row per (user, activity); the idempotency anchor for rewards.
/// Metadata may be updated on every call, `completed` flips true at most
/// once for reward purposes.
#[derive(Clone, Debug)]
pub struct CompletionRecord {
    pub user_id: String,
    pub activity_id: String,
    pub completed: bool,
    pub score: i64,      // 0..=100
    pub time_spent: i64, // seconds
    pub hints_used: i64,
    pub answers: Option<Value>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Append-only audit entry for every wallet mutation.
/// Milestone claims are tracked through these rows as well
/// (`related_type = "quiz_milestone"`, `related_id = threshold`).
#[derive(Clone, Debug, Serialize)]
pub struct TransactionRecord {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub kind: String,
    pub description: String,
    pub related_id: Option<String>,
    pub related_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Collectible card from the shop catalog.
#[derive(Clone, Debug, Serialize)]
pub struct Card {
    pub id: String,
    pub name: String,
    pub category: String,
    pub rarity: Rarity,
    pub diamond_price: i64,
    pub max_owners: Option<u32>,
    pub current_owners: u32,
    pub is_purchasable: bool,
    pub is_public: bool,
}

impl Card {
    /// A card at its owner cap is unavailable for grants and purchase alike.
    pub fn at_owner_cap(&self) -> bool {
        matches!(self.max_owners, Some(max) if self.current_owners >= max)
    }
}

/// Unique (user, card) pair; existence implies ownership.
#[derive(Clone, Debug)]
pub struct OwnershipRecord {
    pub user_id: String,
    pub card_id: String,
    pub purchase_price: i64,
    pub acquired_at: DateTime<Utc>,
}

/// One row per successful card grant; counted for the daily quota.
#[derive(Clone, Debug)]
pub struct DistributionLogEntry {
    pub id: String,
    pub user_id: String,
    pub card_id: String,
    pub source_type: String, // "game-reward"
    pub source_id: String,
    pub rarity_received: Rarity,
    pub attempt_number: u32, // 1 = rarity match, 2 = any-rarity fallback
    pub roll_value: f64,
    pub applied_weights: String, // JSON snapshot of the weight table
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeCadence {
    Daily,
    Weekly,
    Monthly,
    Featured,
}

/// Time-boxed challenge with a declarative requirement descriptor.
/// `requirements` stays raw (JSON object or legacy bare string) and is
/// decoded per event by the rule engine.
#[derive(Clone, Debug)]
pub struct ChallengeDefinition {
    pub id: String,
    pub title: String,
    pub cadence: ChallengeCadence,
    pub requirements: Value,
    pub target_value: i64,
    pub diamond_reward: i64,
    pub experience_reward: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
}

impl ChallengeDefinition {
    pub fn in_window(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.start_date <= now && now <= self.end_date
    }
}

/// Per-user progress toward one challenge. `current_value` only grows while
/// the challenge is active; rewards pay out once, gated by `rewards_claimed`.
#[derive(Clone, Debug, Serialize)]
pub struct ChallengeProgress {
    pub user_id: String,
    pub challenge_id: String,
    pub current_value: i64,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub rewards_claimed: bool,
    pub claimed_at: Option<DateTime<Utc>>,
    pub last_progress_at: DateTime<Utc>,
}

/// Decoded challenge requirement. A closed set of variants so the matcher
/// can be exhaustive; unknown descriptor types simply never match.
#[derive(Clone, Debug, PartialEq)]
pub enum Requirement {
    CompleteActivities { scope: Scope, category: Option<String> },
    QuizCorrect { category: Option<String> },
    GamesSession { game_keys: GameKeys },
    /// Legacy seeds: any completed activity or quiz attempt counts as 1.
    CompleteLearningActivities,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    Lesson,
    Quiz,
    Interactive,
    Any,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GameKeys {
    Any,
    Listed(Vec<String>),
}

/// Domain events fed to the challenge rule engine.
#[derive(Clone, Debug)]
pub enum RewardEvent {
    ActivityCompleted {
        user_id: String,
        category: Option<String>,
        activity_type: Option<String>,
    },
    QuizAttempt {
        user_id: String,
        category: Option<String>,
        correct_answers: i64,
    },
    GameSession {
        user_id: String,
        game_key: String,
    },
}

impl RewardEvent {
    pub fn user_id(&self) -> &str {
        match self {
            RewardEvent::ActivityCompleted { user_id, .. } => user_id,
            RewardEvent::QuizAttempt { user_id, .. } => user_id,
            RewardEvent::GameSession { user_id, .. } => user_id,
        }
    }
}

/// Stored quiz attempt; `correct_answers` feeds the lifetime milestone
/// aggregate.
#[derive(Clone, Debug, Serialize)]
pub struct QuizAttemptRecord {
    pub id: String,
    pub user_id: String,
    pub quiz_id: String,
    pub score: i64,
    pub correct_answers: i64,
    pub total_questions: i64,
    pub time_spent: i64,
    pub completed_at: DateTime<Utc>,
}

/// Stored mini-game session.
#[derive(Clone, Debug, Serialize)]
pub struct GameSessionRecord {
    pub id: String,
    pub user_id: String,
    pub game_key: String,
    pub score: i64,
    pub correct_count: i64,
    pub duration_sec: i64,
    pub completed_at: DateTime<Utc>,
}
