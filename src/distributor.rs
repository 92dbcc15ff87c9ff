//! Weighted card distributor: rarity-then-item random selection with
//! ownership exclusion, supply caps and a per-user daily quota.
//!
//! The RNG and the weight table are injected so tests can assert exact
//! draws from a seeded generator.

use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use rand::Rng;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::{DistributionConfig, RarityWeight};
use crate::domain::{Card, DistributionLogEntry, OwnershipRecord, Rarity};
use crate::error::{EngineError, EngineResult};
use crate::store::StoreData;

pub const GRANT_SOURCE_TYPE: &str = "game-reward";

#[derive(Clone, Debug)]
pub struct GrantedCard {
    pub card: Card,
    pub rarity_rolled: Rarity,
    pub attempt_number: u32,
    pub newly_owned: bool,
}

/// Start of the current calendar day in server-local time, as a UTC
/// instant. The daily quota window resets at local midnight.
pub fn local_day_start() -> DateTime<Utc> {
    let now = Local::now();
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&midnight) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
        chrono::LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        // DST gap at midnight: fall back to a 24h window.
        chrono::LocalResult::None => now.with_timezone(&Utc) - chrono::Duration::hours(24),
    }
}

/// Rejection-free weighted sampling over the table in declaration order:
/// draw `roll in [0, total)`, subtract weights until it goes non-positive.
fn pick_weighted<R: Rng + ?Sized>(weights: &[RarityWeight], rng: &mut R) -> (Rarity, f64) {
    let total: f64 = weights.iter().map(|w| w.weight.max(0.0)).sum();
    let rolled: f64 = rng.gen::<f64>() * total;
    let mut roll = rolled;
    for w in weights {
        roll -= w.weight.max(0.0);
        if roll <= 0.0 {
            return (w.rarity, rolled);
        }
    }
    // Empty or all-zero table degenerates to the first entry.
    (weights.first().map(|w| w.rarity).unwrap_or(Rarity::Common), rolled)
}

/// Candidate ids for a grant: public, purchasable, in the category, not at
/// their owner cap, and not already owned by the user. Exclusion happens
/// here, in the selection step, not as a post-filter.
fn eligible_card_ids(
    data: &StoreData,
    user_id: &str,
    category: &str,
    rarity: Option<Rarity>,
) -> Vec<String> {
    let mut ids: Vec<String> = data
        .cards
        .values()
        .filter(|c| c.is_public && c.is_purchasable)
        .filter(|c| c.category.eq_ignore_ascii_case(category))
        .filter(|c| rarity.map_or(true, |r| c.rarity == r))
        .filter(|c| !c.at_owner_cap())
        .filter(|c| !data.ownership.contains_key(&(user_id.to_string(), c.id.clone())))
        .map(|c| c.id.clone())
        .collect();
    // HashMap iteration order is arbitrary; sort so a seeded RNG picks
    // reproducibly.
    ids.sort();
    ids
}

/// Grant one random unowned card from `category` to `user_id`.
///
/// Enforces the daily quota (exact: the count and the log insert share the
/// caller's critical section), rolls a rarity bucket, picks uniformly among
/// eligible cards, and falls back to any rarity before reporting the
/// category as exhausted.
#[instrument(level = "info", skip(data, cfg, rng), fields(%user_id, %category, %source_game))]
pub fn grant_random_card<R: Rng + ?Sized>(
    data: &mut StoreData,
    cfg: &DistributionConfig,
    rng: &mut R,
    user_id: &str,
    category: &str,
    source_game: &str,
    now: DateTime<Utc>,
    day_start: DateTime<Utc>,
) -> EngineResult<GrantedCard> {
    data.ensure_user(user_id, now);

    let today = data
        .distribution_log
        .iter()
        .filter(|e| e.user_id == user_id && e.source_type == GRANT_SOURCE_TYPE)
        .filter(|e| e.created_at >= day_start)
        .count();
    if today as u32 >= cfg.daily_limit {
        return Err(EngineError::DailyLimitReached { limit: cfg.daily_limit });
    }

    let (rarity_rolled, roll_value) = pick_weighted(&cfg.weights, rng);

    let mut attempt_number = 1u32;
    let mut candidates = eligible_card_ids(data, user_id, category, Some(rarity_rolled));
    if candidates.is_empty() {
        // Fallback ladder: same category, any rarity.
        attempt_number = 2;
        candidates = eligible_card_ids(data, user_id, category, None);
    }
    let Some(card_id) = pick_uniform(&candidates, rng) else {
        return Err(EngineError::CategoryExhausted);
    };

    let card = data
        .cards
        .get(&card_id)
        .cloned()
        .ok_or_else(|| EngineError::Internal(format!("selected card {card_id} vanished")))?;

    // Idempotent ownership creation: a race with another grant path (e.g.
    // purchase) must not double-increment the owner count.
    let key = (user_id.to_string(), card_id.clone());
    let newly_owned = if data.ownership.contains_key(&key) {
        false
    } else {
        data.ownership.insert(
            key,
            OwnershipRecord {
                user_id: user_id.to_string(),
                card_id: card_id.clone(),
                purchase_price: 0,
                acquired_at: now,
            },
        );
        if let Some(c) = data.cards.get_mut(&card_id) {
            c.current_owners += 1;
        }
        true
    };

    let applied_weights = serde_json::to_string(
        &cfg.weights
            .iter()
            .map(|w| (w.rarity.as_str(), w.weight))
            .collect::<Vec<_>>(),
    )
    .unwrap_or_default();
    data.distribution_log.push(DistributionLogEntry {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        card_id: card_id.clone(),
        source_type: GRANT_SOURCE_TYPE.to_string(),
        source_id: source_game.to_string(),
        rarity_received: card.rarity,
        attempt_number,
        roll_value,
        applied_weights,
        created_at: now,
    });

    info!(
        target: "rewards",
        %user_id,
        card = %card_id,
        rolled = rarity_rolled.as_str(),
        received = card.rarity.as_str(),
        attempt_number,
        newly_owned,
        "card granted"
    );

    Ok(GrantedCard { card, rarity_rolled, attempt_number, newly_owned })
}

fn pick_uniform<R: Rng + ?Sized>(ids: &[String], rng: &mut R) -> Option<String> {
    if ids.is_empty() {
        return None;
    }
    let idx = rng.gen_range(0..ids.len());
    ids.get(idx).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn weights(table: &[(Rarity, f64)]) -> Vec<RarityWeight> {
        table.iter().map(|&(rarity, weight)| RarityWeight { rarity, weight }).collect()
    }

    fn card(id: &str, category: &str, rarity: Rarity) -> Card {
        Card {
            id: id.into(),
            name: format!("Card {id}"),
            category: category.into(),
            rarity,
            diamond_price: 100,
            max_owners: None,
            current_owners: 0,
            is_purchasable: true,
            is_public: true,
        }
    }

    fn cfg_with(daily_limit: u32) -> DistributionConfig {
        DistributionConfig { daily_limit, ..DistributionConfig::default() }
    }

    #[test]
    fn weighted_draw_converges_on_the_table_ratios() {
        let table = weights(&[(Rarity::Common, 90.0), (Rarity::Rare, 10.0)]);
        let mut rng = StdRng::seed_from_u64(7);
        let mut counts: HashMap<Rarity, u32> = HashMap::new();
        for _ in 0..10_000 {
            let (r, _) = pick_weighted(&table, &mut rng);
            *counts.entry(r).or_default() += 1;
        }
        let common = *counts.get(&Rarity::Common).unwrap_or(&0) as f64 / 10_000.0;
        assert!((common - 0.9).abs() < 0.02, "common ratio {common}");
    }

    #[test]
    fn weighted_draw_is_reproducible_for_a_fixed_seed() {
        let table = weights(&[(Rarity::Common, 65.0), (Rarity::Uncommon, 20.0), (Rarity::Rare, 15.0)]);
        let a: Vec<Rarity> = {
            let mut rng = StdRng::seed_from_u64(42);
            (0..50).map(|_| pick_weighted(&table, &mut rng).0).collect()
        };
        let b: Vec<Rarity> = {
            let mut rng = StdRng::seed_from_u64(42);
            (0..50).map(|_| pick_weighted(&table, &mut rng).0).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn zero_weight_buckets_are_never_drawn() {
        let table = weights(&[(Rarity::Common, 0.0), (Rarity::Rare, 1.0)]);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            assert_eq!(pick_weighted(&table, &mut rng).0, Rarity::Rare);
        }
    }

    #[test]
    fn exclusion_leaves_only_unowned_cards() {
        let mut data = StoreData::default();
        let now = Utc::now();
        let day_start = now - chrono::Duration::hours(1);
        for id in ["a", "b", "c"] {
            data.cards.insert(id.into(), card(id, "anime-collection", Rarity::Common));
        }
        let cfg = cfg_with(100);
        let mut rng = StdRng::seed_from_u64(1);

        // Own everything except "c".
        for id in ["a", "b"] {
            data.ownership.insert(
                ("u1".into(), id.into()),
                OwnershipRecord {
                    user_id: "u1".into(),
                    card_id: id.into(),
                    purchase_price: 0,
                    acquired_at: now,
                },
            );
        }

        let granted =
            grant_random_card(&mut data, &cfg, &mut rng, "u1", "anime-collection", "code-match", now, day_start)
                .unwrap();
        assert_eq!(granted.card.id, "c");
        assert!(granted.newly_owned);

        // Now the category is fully owned.
        let err =
            grant_random_card(&mut data, &cfg, &mut rng, "u1", "anime-collection", "code-match", now, day_start)
                .unwrap_err();
        assert!(matches!(err, EngineError::CategoryExhausted));
    }

    #[test]
    fn falls_back_to_any_rarity_before_exhaustion() {
        let mut data = StoreData::default();
        let now = Utc::now();
        let day_start = now - chrono::Duration::hours(1);
        // Only a Mythic exists, but the table can only roll Common.
        data.cards.insert("m".into(), card("m", "star-collection", Rarity::Mythic));
        let cfg = DistributionConfig {
            daily_limit: 10,
            weights: weights(&[(Rarity::Common, 1.0)]),
        };
        let mut rng = StdRng::seed_from_u64(5);

        let granted =
            grant_random_card(&mut data, &cfg, &mut rng, "u1", "star-collection", "quiz-rush", now, day_start)
                .unwrap();
        assert_eq!(granted.card.rarity, Rarity::Mythic);
        assert_eq!(granted.rarity_rolled, Rarity::Common);
        assert_eq!(granted.attempt_number, 2);
    }

    #[test]
    fn daily_quota_blocks_the_fourth_grant() {
        let mut data = StoreData::default();
        let now = Utc::now();
        let day_start = now - chrono::Duration::hours(1);
        for i in 0..10 {
            data.cards.insert(format!("c{i}"), card(&format!("c{i}"), "anime-collection", Rarity::Common));
        }
        let cfg = cfg_with(3);
        let mut rng = StdRng::seed_from_u64(9);

        for _ in 0..3 {
            grant_random_card(&mut data, &cfg, &mut rng, "u1", "anime-collection", "code-match", now, day_start)
                .unwrap();
        }
        let owned_before = data.ownership.len();
        let err =
            grant_random_card(&mut data, &cfg, &mut rng, "u1", "anime-collection", "code-match", now, day_start)
                .unwrap_err();
        assert!(matches!(err, EngineError::DailyLimitReached { limit: 3 }));
        // Rejection performs no mutation.
        assert_eq!(data.ownership.len(), owned_before);
        assert_eq!(data.distribution_log.len(), 3);

        // Entries from before the window do not count.
        let other_day = day_start - chrono::Duration::hours(2);
        for e in data.distribution_log.iter_mut() {
            e.created_at = other_day;
        }
        grant_random_card(&mut data, &cfg, &mut rng, "u1", "anime-collection", "code-match", now, day_start)
            .unwrap();
    }

    #[test]
    fn capped_cards_are_skipped_at_selection() {
        let mut data = StoreData::default();
        let now = Utc::now();
        let day_start = now - chrono::Duration::hours(1);
        let mut capped = card("full", "car-collection", Rarity::Common);
        capped.max_owners = Some(1);
        capped.current_owners = 1;
        data.cards.insert("full".into(), capped);
        data.cards.insert("open".into(), card("open", "car-collection", Rarity::Common));
        let cfg = cfg_with(10);
        let mut rng = StdRng::seed_from_u64(11);

        for i in 0..5 {
            let user = format!("u{i}");
            let granted =
                grant_random_card(&mut data, &cfg, &mut rng, &user, "car-collection", "g", now, day_start)
                    .unwrap();
            assert_eq!(granted.card.id, "open");
        }
        assert_eq!(data.cards.get("full").unwrap().current_owners, 1);
    }
}
