//! Built-in content seeds (activities, cards, challenge definitions) plus
//! merging of the optional TOML banks. Seeds never overwrite bank entries
//! with the same id.

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tracing::error;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::{Activity, Card, ChallengeCadence, ChallengeDefinition, Rarity};
use crate::store::StoreData;

pub fn populate(data: &mut StoreData, cfg: &EngineConfig, now: DateTime<Utc>) {
    // Config banks first, then built-ins without overwriting.
    for a in &cfg.activities {
        let id = a.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        data.activities.entry(id.clone()).or_insert(Activity {
            id,
            slug: a.slug.clone(),
            title: a.title.clone(),
            activity_type: a.activity_type.clone(),
            category: a.category.clone(),
            diamond_reward: a.diamond_reward,
            experience_reward: a.experience_reward,
            is_active: true,
        });
    }
    for c in &cfg.cards {
        let id = c.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        data.cards.entry(id.clone()).or_insert(Card {
            id,
            name: c.name.clone(),
            category: c.category.clone(),
            rarity: c.rarity,
            diamond_price: c.diamond_price,
            max_owners: c.max_owners,
            current_owners: 0,
            is_purchasable: true,
            is_public: true,
        });
    }
    for ch in &cfg.challenges {
        let id = ch.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        let requirements = match serde_json::to_value(&ch.requirements) {
            Ok(v) => v,
            Err(e) => {
                error!(target: "challenge", %id, error = %e, "Skipping bank challenge: bad requirements");
                continue;
            }
        };
        let cadence = match ch.cadence.as_str() {
            "daily" => ChallengeCadence::Daily,
            "monthly" => ChallengeCadence::Monthly,
            "featured" => ChallengeCadence::Featured,
            _ => ChallengeCadence::Weekly,
        };
        data.challenges.entry(id.clone()).or_insert(ChallengeDefinition {
            id,
            title: ch.title.clone(),
            cadence,
            requirements,
            target_value: ch.target_value,
            diamond_reward: ch.diamond_reward,
            experience_reward: ch.experience_reward,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(ch.duration_days.max(1)),
            is_active: true,
        });
    }

    for a in seed_activities() {
        data.activities.entry(a.id.clone()).or_insert(a);
    }
    for c in seed_cards() {
        data.cards.entry(c.id.clone()).or_insert(c);
    }
    for ch in seed_challenges(now) {
        data.challenges.entry(ch.id.clone()).or_insert(ch);
    }
}

fn activity(
    id: &str,
    slug: &str,
    title: &str,
    activity_type: &str,
    category: &str,
    diamonds: i64,
    xp: i64,
) -> Activity {
    Activity {
        id: id.into(),
        slug: slug.into(),
        title: title.into(),
        activity_type: activity_type.into(),
        category: Some(category.into()),
        diamond_reward: diamonds,
        experience_reward: xp,
        is_active: true,
    }
}

fn seed_activities() -> Vec<Activity> {
    vec![
        activity(
            "act_python_variables",
            "python-basics-variables",
            "Python Basics: Variables",
            "lesson",
            "python-basics",
            10,
            25,
        ),
        activity(
            "act_python_syntax_quiz",
            "python-basics-syntax-quiz",
            "Python Basics: Syntax Quiz",
            "quiz",
            "python-basics",
            15,
            35,
        ),
        activity(
            "act_loops_lesson",
            "python-loops",
            "Loops and Iteration",
            "lesson",
            "loops",
            10,
            25,
        ),
        activity(
            "act_loops_quiz",
            "python-loops-quiz",
            "Loops Quiz",
            "quiz",
            "loops",
            15,
            35,
        ),
        activity(
            "act_coding_lab",
            "coding-lab",
            "Coding Lab",
            "interactive",
            "general",
            20,
            50,
        ),
    ]
}

fn card(id: &str, name: &str, category: &str, rarity: Rarity, price: i64) -> Card {
    Card {
        id: id.into(),
        name: name.into(),
        category: category.into(),
        rarity,
        diamond_price: price,
        max_owners: None,
        current_owners: 0,
        is_purchasable: true,
        is_public: true,
    }
}

fn seed_cards() -> Vec<Card> {
    vec![
        card("card_anime_01", "Pixel Ronin", "anime-collection", Rarity::Common, 50),
        card("card_anime_02", "Cyber Sensei", "anime-collection", Rarity::Common, 50),
        card("card_anime_03", "Neon Kitsune", "anime-collection", Rarity::Uncommon, 120),
        card("card_anime_04", "Storm Caller", "anime-collection", Rarity::Rare, 300),
        card("card_anime_05", "Void Empress", "anime-collection", Rarity::Legendary, 2500),
        card("card_star_01", "Rising Comet", "star-collection", Rarity::Common, 50),
        card("card_star_02", "Binary Pulsar", "star-collection", Rarity::Uncommon, 120),
        card("card_star_03", "Red Supergiant", "star-collection", Rarity::SuperRare, 600),
        card("card_car_01", "City Hatchback", "car-collection", Rarity::Common, 50),
        card("card_car_02", "Retro Coupe", "car-collection", Rarity::Rare, 300),
        {
            let mut c = card("card_car_03", "Concept Hypercar", "car-collection", Rarity::Mythic, 9000);
            c.max_owners = Some(3);
            c
        },
    ]
}

fn challenge(
    id: &str,
    title: &str,
    cadence: ChallengeCadence,
    requirements: Value,
    target: i64,
    diamonds: i64,
    xp: i64,
    now: DateTime<Utc>,
    days: i64,
) -> ChallengeDefinition {
    ChallengeDefinition {
        id: id.into(),
        title: title.into(),
        cadence,
        requirements,
        target_value: target,
        diamond_reward: diamonds,
        experience_reward: xp,
        start_date: now - Duration::days(1),
        end_date: now + Duration::days(days),
        is_active: true,
    }
}

fn seed_challenges(now: DateTime<Utc>) -> Vec<ChallengeDefinition> {
    vec![
        challenge(
            "ch_daily_any",
            "Daily Learner",
            ChallengeCadence::Daily,
            json!({ "type": "complete_activities", "scope": "any" }),
            3,
            15,
            30,
            now,
            1,
        ),
        challenge(
            "ch_weekly_quiz_loops",
            "Loop Master",
            ChallengeCadence::Weekly,
            json!({ "type": "complete_activities", "scope": "quiz", "category": "loops" }),
            5,
            50,
            100,
            now,
            6,
        ),
        challenge(
            "ch_weekly_correct",
            "Sharp Shooter",
            ChallengeCadence::Weekly,
            json!({ "type": "quiz_correct", "target": 25 }),
            25,
            40,
            80,
            now,
            6,
        ),
        challenge(
            "ch_monthly_games",
            "Arcade Regular",
            ChallengeCadence::Monthly,
            json!({ "type": "games_session", "gameKeys": ["code-match", "quiz-rush"] }),
            10,
            100,
            200,
            now,
            29,
        ),
        // Legacy-format seed kept on purpose: bare type string.
        challenge(
            "ch_featured_legacy",
            "Getting Started",
            ChallengeCadence::Featured,
            json!("complete_activities"),
            1,
            10,
            20,
            now,
            13,
        ),
    ]
}
