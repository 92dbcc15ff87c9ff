//! Engine configuration (progression curve, rarity weights, quotas,
//! milestone thresholds + optional content banks) loaded from TOML.
//!
//! See `EngineConfig` for the expected schema. Everything has defaults so
//! the server runs with no config file at all.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::Rarity;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct EngineConfig {
  #[serde(default)]
  pub progression: ProgressionConfig,
  #[serde(default)]
  pub distribution: DistributionConfig,
  #[serde(default)]
  pub milestones: MilestoneConfig,
  // Optional content banks merged on top of the built-in seeds.
  #[serde(default)]
  pub activities: Vec<ActivityCfg>,
  #[serde(default)]
  pub cards: Vec<CardCfg>,
  #[serde(default)]
  pub challenges: Vec<ChallengeCfg>,
}

/// Exponential level curve constants. Raw values are clamped on load so a
/// bad config cannot produce a degenerate curve.
#[derive(Clone, Debug, Deserialize)]
pub struct ProgressionConfig {
  #[serde(default = "default_base_xp")]
  pub base_xp: i64,
  #[serde(default = "default_growth")]
  pub growth: f64,
  #[serde(default = "default_round_to")]
  pub round_to: i64,
  #[serde(default = "default_max_level")]
  pub max_level: u32,
}

fn default_base_xp() -> i64 { 100 }
fn default_growth() -> f64 { 1.15 }
fn default_round_to() -> i64 { 5 }
fn default_max_level() -> u32 { 1000 }

impl Default for ProgressionConfig {
  fn default() -> Self {
    Self {
      base_xp: default_base_xp(),
      growth: default_growth(),
      round_to: default_round_to(),
      max_level: default_max_level(),
    }
  }
}

impl ProgressionConfig {
  /// Clamp to safe ranges: base >= 10, growth in [1, 3], round_to >= 1.
  pub fn clamped(mut self) -> Self {
    self.base_xp = self.base_xp.max(10);
    self.growth = self.growth.clamp(1.0, 3.0);
    self.round_to = self.round_to.max(1);
    self.max_level = self.max_level.max(1);
    self
  }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RarityWeight {
  pub rarity: Rarity,
  pub weight: f64,
}

/// Card distributor tuning. `weights` keeps declaration order; the rarity
/// draw iterates it as-is, so a fixed RNG seed reproduces draws exactly.
#[derive(Clone, Debug, Deserialize)]
pub struct DistributionConfig {
  #[serde(default = "default_daily_limit")]
  pub daily_limit: u32,
  #[serde(default = "default_weights")]
  pub weights: Vec<RarityWeight>,
}

fn default_daily_limit() -> u32 { 3 }

fn default_weights() -> Vec<RarityWeight> {
  [
    (Rarity::Common, 65.0),
    (Rarity::Uncommon, 20.0),
    (Rarity::Rare, 10.0),
    (Rarity::SuperRare, 3.0),
    (Rarity::UltraRare, 1.0),
    (Rarity::Epic, 0.8),
    (Rarity::Legendary, 0.18),
    (Rarity::Mythic, 0.02),
  ]
  .into_iter()
  .map(|(rarity, weight)| RarityWeight { rarity, weight })
  .collect()
}

impl Default for DistributionConfig {
  fn default() -> Self {
    Self { daily_limit: default_daily_limit(), weights: default_weights() }
  }
}

/// Lifetime correct-answer thresholds; reward is `{m diamonds, 2m XP}`.
#[derive(Clone, Debug, Deserialize)]
pub struct MilestoneConfig {
  #[serde(default = "default_thresholds")]
  pub thresholds: Vec<i64>,
}

fn default_thresholds() -> Vec<i64> {
  (1..=10).map(|n| n * 10).collect()
}

impl Default for MilestoneConfig {
  fn default() -> Self {
    Self { thresholds: default_thresholds() }
  }
}

/// Activity entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ActivityCfg {
  #[serde(default)] pub id: Option<String>,
  pub slug: String,
  pub title: String,
  #[serde(default = "default_activity_type")] pub activity_type: String,
  #[serde(default)] pub category: Option<String>,
  #[serde(default = "default_diamond_reward")] pub diamond_reward: i64,
  #[serde(default = "default_experience_reward")] pub experience_reward: i64,
}

fn default_activity_type() -> String { "lesson".into() }
pub fn default_diamond_reward() -> i64 { 10 }
pub fn default_experience_reward() -> i64 { 25 }

/// Card entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct CardCfg {
  #[serde(default)] pub id: Option<String>,
  pub name: String,
  pub category: String,
  pub rarity: Rarity,
  #[serde(default)] pub diamond_price: i64,
  #[serde(default)] pub max_owners: Option<u32>,
}

/// Challenge entry accepted in TOML configuration. `requirements` may be a
/// table or a legacy bare type string; it is forwarded to the rule engine
/// untouched.
#[derive(Clone, Debug, Deserialize)]
pub struct ChallengeCfg {
  #[serde(default)] pub id: Option<String>,
  pub title: String,
  #[serde(default = "default_cadence")] pub cadence: String,
  pub requirements: toml::Value,
  pub target_value: i64,
  #[serde(default)] pub diamond_reward: i64,
  #[serde(default)] pub experience_reward: i64,
  #[serde(default = "default_duration_days")] pub duration_days: i64,
}

fn default_cadence() -> String { "weekly".into() }
fn default_duration_days() -> i64 { 7 }

/// Attempt to load `EngineConfig` from ENGINE_CONFIG_PATH. On any
/// parsing/IO error, falls back to defaults (logged, not fatal).
pub fn load_engine_config_from_env() -> EngineConfig {
  let Ok(path) = std::env::var("ENGINE_CONFIG_PATH") else {
    return EngineConfig::default();
  };
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<EngineConfig>(&s) {
      Ok(mut cfg) => {
        cfg.progression = cfg.progression.clamped();
        info!(target: "pylearn_backend", %path, "Loaded engine config (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "pylearn_backend", %path, error = %e, "Failed to parse TOML config; using defaults");
        EngineConfig::default()
      }
    },
    Err(e) => {
      error!(target: "pylearn_backend", %path, error = %e, "Failed to read TOML config file; using defaults");
      EngineConfig::default()
    }
  }
}
