//! Milestone evaluator: one-time rewards for lifetime correct-answer
//! thresholds. The transaction log doubles as the claim ledger: a row with
//! `related_type = "quiz_milestone"` and `related_id = threshold` means
//! that milestone was already paid.

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::config::EngineConfig;
use crate::store::StoreData;

pub const MILESTONE_RELATED_TYPE: &str = "quiz_milestone";

#[derive(Clone, Debug)]
pub struct MilestoneAward {
    pub threshold: i64,
    pub diamonds: i64,
    pub xp: i64,
}

/// Reward for crossing a threshold: `m` diamonds and `2m` XP.
fn milestone_reward(threshold: i64) -> (i64, i64) {
    (threshold, threshold * 2)
}

/// Grant every unclaimed milestone at or below `lifetime_correct`, in
/// ascending order. Safe to call repeatedly: claimed thresholds are
/// silently skipped, never re-granted.
#[instrument(level = "info", skip(data, cfg), fields(%user_id, lifetime_correct))]
pub fn evaluate_milestones(
    data: &mut StoreData,
    cfg: &EngineConfig,
    user_id: &str,
    lifetime_correct: i64,
    now: DateTime<Utc>,
) -> Vec<MilestoneAward> {
    let mut thresholds = cfg.milestones.thresholds.clone();
    thresholds.sort_unstable();

    let mut awarded = Vec::new();
    for threshold in thresholds {
        if threshold > lifetime_correct {
            break;
        }
        let already_claimed = data.transactions.iter().any(|t| {
            t.user_id == user_id
                && t.related_type.as_deref() == Some(MILESTONE_RELATED_TYPE)
                && t.related_id.as_deref() == Some(threshold.to_string().as_str())
        });
        if already_claimed {
            continue;
        }

        let (diamonds, xp) = milestone_reward(threshold);
        // The claim marker and the credit commit in the same critical
        // section, so a repeat evaluation cannot pay twice.
        data.push_transaction(
            user_id,
            diamonds,
            "milestone",
            format!("Quiz milestone: {threshold} correct answers (lifetime)"),
            Some(threshold.to_string()),
            Some(MILESTONE_RELATED_TYPE),
            now,
        );
        data.credit_wallet(cfg, user_id, diamonds, xp, now);

        info!(target: "rewards", %user_id, threshold, diamonds, xp, "milestone granted");
        awarded.push(MilestoneAward { threshold, diamonds, xp });
    }
    awarded
}
