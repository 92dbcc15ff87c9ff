//! Reward ledger: one-time completion rewards and the card purchase spend
//! path. Both run inside a single store critical section; the
//! (user, activity) completion row is the idempotency anchor.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::{self, EngineConfig};
use crate::domain::{Activity, CompletionRecord, OwnershipRecord, Wallet};
use crate::error::{EngineError, EngineResult};
use crate::store::StoreData;

/// Per-attempt metadata; missing fields keep the previous attempt's values.
#[derive(Clone, Debug, Default)]
pub struct AttemptMetadata {
    pub score: Option<f64>,
    pub time_spent: Option<i64>,
    pub hints_used: Option<i64>,
    pub answers: Option<Value>,
}

#[derive(Clone, Debug)]
pub struct CompletionOutcome {
    pub activity_id: String,
    pub already_completed: bool,
    pub rewarded: bool,
    pub diamonds_granted: i64,
    pub xp_granted: i64,
    pub wallet_after: Wallet,
    /// For the challenge event fired after the primary flow.
    pub category: Option<String>,
    pub activity_type: String,
}

/// Resolve an activity by id or slug. An unknown slug auto-creates a
/// minimal quiz activity so attempts can persist (side-channel behavior
/// kept from the web tier; an unknown *id* is still a client error).
pub fn resolve_or_create_activity(
    data: &mut StoreData,
    activity_id: Option<&str>,
    slug: Option<&str>,
) -> EngineResult<String> {
    if let Some(id) = activity_id {
        return match data.find_activity(id) {
            Some(a) => Ok(a.id.clone()),
            None => Err(EngineError::NotFound("activity")),
        };
    }
    let Some(slug) = slug.filter(|s| !s.trim().is_empty()) else {
        return Err(EngineError::Validation("activityId or slug is required".into()));
    };
    if let Some(a) = data.find_activity(slug) {
        return Ok(a.id.clone());
    }
    let id = Uuid::new_v4().to_string();
    warn!(target: "rewards", %slug, %id, "Auto-creating placeholder quiz activity for unknown slug");
    data.activities.insert(
        id.clone(),
        Activity {
            id: id.clone(),
            slug: slug.to_string(),
            title: slug.to_string(),
            activity_type: "quiz".into(),
            category: Some("general".into()),
            diamond_reward: config::default_diamond_reward(),
            experience_reward: config::default_experience_reward(),
            is_active: true,
        },
    );
    Ok(id)
}

/// Grant the completion reward for (user, activity) at most once.
///
/// Metadata is upserted unconditionally; the wallet credit, audit row and
/// `completed` flip happen only on the first completion. Repeat calls
/// return `already_completed = true` and the unchanged wallet.
#[instrument(level = "info", skip(data, cfg, meta), fields(%user_id, %activity_id))]
pub fn grant_completion_reward(
    data: &mut StoreData,
    cfg: &EngineConfig,
    user_id: &str,
    activity_id: &str,
    meta: &AttemptMetadata,
    now: DateTime<Utc>,
) -> EngineResult<CompletionOutcome> {
    let activity = data
        .activities
        .get(activity_id)
        .filter(|a| a.is_active)
        .cloned()
        .ok_or(EngineError::NotFound("activity"))?;

    if matches!(meta.score, Some(s) if s < 0.0) {
        return Err(EngineError::Validation("score must not be negative".into()));
    }

    data.ensure_user(user_id, now);
    let key = (user_id.to_string(), activity.id.clone());
    let existing = data.completions.get(&key);
    let already_completed = existing.map(|c| c.completed).unwrap_or(false);

    let score = meta
        .score
        .map(|s| s.round().clamp(0.0, 100.0) as i64)
        .or(existing.map(|c| c.score))
        .unwrap_or(0);
    let time_spent = meta
        .time_spent
        .map(|t| t.max(0))
        .or(existing.map(|c| c.time_spent))
        .unwrap_or(0);
    let hints_used = meta
        .hints_used
        .map(|h| h.max(0))
        .or(existing.map(|c| c.hints_used))
        .unwrap_or(0);
    let answers = meta
        .answers
        .clone()
        .or_else(|| existing.and_then(|c| c.answers.clone()));

    let started_at = existing.map(|c| c.started_at).unwrap_or(now);
    let completed_at = existing.and_then(|c| c.completed_at).or(Some(now));
    data.completions.insert(
        key,
        CompletionRecord {
            user_id: user_id.to_string(),
            activity_id: activity.id.clone(),
            completed: true,
            score,
            time_spent,
            hints_used,
            answers,
            started_at,
            completed_at,
        },
    );

    let (rewarded, diamonds, xp, wallet_after) = if already_completed {
        (false, 0, 0, data.wallet_snapshot(user_id, now))
    } else {
        let diamonds = activity.diamond_reward;
        let xp = activity.experience_reward;
        let wallet = data.credit_wallet(cfg, user_id, diamonds, xp, now);
        if diamonds > 0 {
            data.push_transaction(
                user_id,
                diamonds,
                "activity_complete",
                format!("{} completed - Score: {}% | +{} XP", activity.title, score, xp),
                Some(activity.id.clone()),
                Some("learning_activity"),
                now,
            );
        }
        (true, diamonds, xp, wallet)
    };

    info!(
        target: "rewards",
        %user_id,
        activity = %activity.id,
        rewarded,
        already_completed,
        diamonds,
        xp,
        "completion processed"
    );

    Ok(CompletionOutcome {
        activity_id: activity.id,
        already_completed,
        rewarded,
        diamonds_granted: diamonds,
        xp_granted: xp,
        wallet_after,
        category: activity.category,
        activity_type: activity.activity_type,
    })
}

#[derive(Clone, Debug)]
pub struct PurchaseOutcome {
    pub card_id: String,
    pub price: i64,
    pub wallet_after: Wallet,
}

/// Buy a card with diamonds. Checks purchasability, supply cap, prior
/// ownership and funds before committing ownership + debit + audit row.
#[instrument(level = "info", skip(data), fields(%user_id, %card_id))]
pub fn purchase_card(
    data: &mut StoreData,
    user_id: &str,
    card_id: &str,
    now: DateTime<Utc>,
) -> EngineResult<PurchaseOutcome> {
    let card = data.cards.get(card_id).cloned().ok_or(EngineError::NotFound("card"))?;
    if !card.is_purchasable {
        return Err(EngineError::Validation("this card is not purchasable".into()));
    }
    if card.at_owner_cap() {
        return Err(EngineError::Conflict("card is sold out".into()));
    }
    let key = (user_id.to_string(), card_id.to_string());
    if data.ownership.contains_key(&key) {
        return Err(EngineError::Conflict("card already owned".into()));
    }

    let price = card.diamond_price;
    let available = data.wallet_snapshot(user_id, now).current_diamonds;
    if available < price {
        return Err(EngineError::InsufficientDiamonds { needed: price, available });
    }

    data.ownership.insert(
        key,
        OwnershipRecord {
            user_id: user_id.to_string(),
            card_id: card_id.to_string(),
            purchase_price: price,
            acquired_at: now,
        },
    );
    let wallet_after = data.debit_wallet(user_id, price, now);
    if let Some(c) = data.cards.get_mut(card_id) {
        c.current_owners += 1;
    }
    data.push_transaction(
        user_id,
        -price,
        "purchase",
        format!("Bought {}", card.name),
        Some(card_id.to_string()),
        Some("card"),
        now,
    );

    info!(target: "rewards", %user_id, %card_id, price, "card purchased");
    Ok(PurchaseOutcome { card_id: card_id.to_string(), price, wallet_after })
}
