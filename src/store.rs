//! Application state: the in-memory engine store and shared handles.
//!
//! All engine data lives under a single `RwLock<StoreData>`. Every mutating
//! operation takes one write guard for its whole critical section, which is
//! the transaction boundary: checks and writes commit together or not at
//! all, and operations on the same user/activity/card key are linearizable.
//!
//! The core operations themselves (ledger, distributor, rule engine,
//! milestones) are synchronous functions over `&mut StoreData` in their own
//! modules, so they stay unit-testable without the runtime.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::{
    Activity, Card, ChallengeDefinition, ChallengeProgress, CompletionRecord,
    DistributionLogEntry, GameSessionRecord, OwnershipRecord, QuizAttemptRecord,
    TransactionRecord, UserAccount, Wallet,
};
use crate::progression;
use crate::seeds;

#[derive(Default)]
pub struct StoreData {
    pub users: HashMap<String, UserAccount>,
    pub activities: HashMap<String, Activity>,
    /// Keyed by (user_id, activity_id); the unique constraint behind
    /// one-time reward grants.
    pub completions: HashMap<(String, String), CompletionRecord>,
    pub transactions: Vec<TransactionRecord>,
    pub cards: HashMap<String, Card>,
    /// Keyed by (user_id, card_id); existence implies ownership.
    pub ownership: HashMap<(String, String), OwnershipRecord>,
    pub distribution_log: Vec<DistributionLogEntry>,
    pub challenges: HashMap<String, ChallengeDefinition>,
    /// Keyed by (user_id, challenge_id).
    pub challenge_progress: HashMap<(String, String), ChallengeProgress>,
    pub quiz_attempts: Vec<QuizAttemptRecord>,
    pub game_sessions: Vec<GameSessionRecord>,
}

impl StoreData {
    /// The auth provider is trusted: an unseen user id gets a fresh wallet.
    pub fn ensure_user(&mut self, user_id: &str, now: DateTime<Utc>) -> &mut UserAccount {
        self.users.entry(user_id.to_string()).or_insert_with(|| UserAccount {
            id: user_id.to_string(),
            wallet: Wallet::default(),
            created_at: now,
        })
    }

    /// Resolve an activity by id first, then by slug (active only).
    pub fn find_activity(&self, id_or_slug: &str) -> Option<&Activity> {
        if let Some(a) = self.activities.get(id_or_slug).filter(|a| a.is_active) {
            return Some(a);
        }
        self.activities
            .values()
            .find(|a| a.is_active && a.slug == id_or_slug)
    }

    /// Credit diamonds and XP to a wallet with increment-style updates and
    /// refresh the cached level. Returns the post-credit snapshot.
    pub fn credit_wallet(
        &mut self,
        cfg: &EngineConfig,
        user_id: &str,
        diamonds: i64,
        xp: i64,
        now: DateTime<Utc>,
    ) -> Wallet {
        let user = self.ensure_user(user_id, now);
        user.wallet.current_diamonds += diamonds;
        user.wallet.total_diamonds += diamonds;
        user.wallet.experience += xp;
        user.wallet.level = progression::level_from_xp(&cfg.progression, user.wallet.experience);
        user.wallet.clone()
    }

    /// Spend from the spendable balance only; `total_diamonds` is lifetime
    /// earned and never decremented.
    pub fn debit_wallet(&mut self, user_id: &str, diamonds: i64, now: DateTime<Utc>) -> Wallet {
        let user = self.ensure_user(user_id, now);
        user.wallet.current_diamonds -= diamonds;
        user.wallet.clone()
    }

    pub fn wallet_snapshot(&mut self, user_id: &str, now: DateTime<Utc>) -> Wallet {
        self.ensure_user(user_id, now).wallet.clone()
    }

    /// Append to the audit log. Rows are never mutated or deleted.
    pub fn push_transaction(
        &mut self,
        user_id: &str,
        amount: i64,
        kind: &str,
        description: String,
        related_id: Option<String>,
        related_type: Option<&str>,
        now: DateTime<Utc>,
    ) {
        self.transactions.push(TransactionRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            amount,
            kind: kind.to_string(),
            description,
            related_id,
            related_type: related_type.map(|s| s.to_string()),
            created_at: now,
        });
    }
}

pub struct AppState {
    pub store: RwLock<StoreData>,
    pub rng: Mutex<StdRng>,
    pub config: EngineConfig,
}

impl AppState {
    /// Build state from config: seed content banks, then merge config banks
    /// on top, and log the startup inventory.
    #[instrument(level = "info", skip_all)]
    pub fn new(config: EngineConfig) -> Arc<Self> {
        let now = Utc::now();
        let mut data = StoreData::default();
        seeds::populate(&mut data, &config, now);

        info!(
            target: "pylearn_backend",
            activities = data.activities.len(),
            cards = data.cards.len(),
            challenges = data.challenges.len(),
            "Startup content inventory"
        );

        Arc::new(Self {
            store: RwLock::new(data),
            rng: Mutex::new(StdRng::from_entropy()),
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_total_never_decreases_and_level_tracks_xp() {
        let cfg = EngineConfig::default();
        let mut data = StoreData::default();
        let now = Utc::now();

        let w = data.credit_wallet(&cfg, "u1", 50, 120, now);
        assert_eq!(w.current_diamonds, 50);
        assert_eq!(w.total_diamonds, 50);
        // 120 XP crosses the level 1 -> 2 boundary (100 XP).
        assert_eq!(w.level, 2);

        let w = data.debit_wallet("u1", 30, now);
        assert_eq!(w.current_diamonds, 20);
        assert_eq!(w.total_diamonds, 50);
        assert!(w.current_diamonds <= w.total_diamonds);

        let w = data.credit_wallet(&cfg, "u1", 5, 0, now);
        assert_eq!(w.total_diamonds, 55);
        assert_eq!(w.level, 2);
    }

    #[test]
    fn unknown_user_gets_a_fresh_wallet() {
        let mut data = StoreData::default();
        let w = data.wallet_snapshot("new-user", Utc::now());
        assert_eq!(w.current_diamonds, 0);
        assert_eq!(w.level, 1);
        assert!(data.users.contains_key("new-user"));
    }
}
