//! XP progression curve: pure, deterministic functions from a cumulative XP
//! total to level / intra-level progress.
//!
//! Base requirement for level 1 -> 2, then each level grows by the
//! configured factor, rounded to nice numbers.

use serde::Serialize;

use crate::config::ProgressionConfig;

/// XP required to advance from `level` to `level + 1`.
pub fn xp_for_level(cfg: &ProgressionConfig, level: u32) -> i64 {
    if level <= 1 {
        return cfg.base_xp;
    }
    let rt = cfg.round_to as f64;
    let raw = cfg.base_xp as f64 * cfg.growth.powi(level as i32 - 1);
    // Round entirely in f64 so the cast saturates at i64::MAX for steep
    // curves instead of overflowing an integer multiply.
    let rounded = ((raw / rt).round() * rt) as i64;
    rounded.max(cfg.base_xp)
}

/// Total cumulative XP required to reach the start of `level`.
/// `total_xp_for_level(1) == 0`; `total_xp_for_level(2) == xp_for_level(1)`.
pub fn total_xp_for_level(cfg: &ProgressionConfig, level: u32) -> i64 {
    if level <= 1 {
        return 0;
    }
    // Per-level requirements saturate at i64::MAX, so the sum must too.
    (1..level).fold(0i64, |acc, l| acc.saturating_add(xp_for_level(cfg, l)))
}

/// Current level for a given total XP. Walks upward while the remaining XP
/// covers the next requirement; capped at `max_level` so malformed totals
/// cannot loop forever.
pub fn level_from_xp(cfg: &ProgressionConfig, total_xp: i64) -> u32 {
    if total_xp <= 0 {
        return 1;
    }
    let mut level = 1u32;
    let mut remaining = total_xp;
    loop {
        let need = xp_for_level(cfg, level);
        if remaining < need {
            break;
        }
        remaining -= need;
        level += 1;
        if level > cfg.max_level {
            break;
        }
    }
    level
}

#[derive(Clone, Debug, Serialize)]
pub struct XpProgress {
    pub level: u32,
    #[serde(rename = "xpIntoLevel")]
    pub xp_into_level: i64,
    #[serde(rename = "xpNeededThisLevel")]
    pub xp_needed_this_level: i64,
    #[serde(rename = "xpToNextLevel")]
    pub xp_to_next_level: i64,
    #[serde(rename = "progressPercent")]
    pub progress_percent: u32, // 0..=100
}

/// Progress within the current level for a given total XP.
pub fn xp_progress(cfg: &ProgressionConfig, total_xp: i64) -> XpProgress {
    let level = level_from_xp(cfg, total_xp);
    let into = (total_xp - total_xp_for_level(cfg, level)).max(0);
    let need = xp_for_level(cfg, level);
    let to_next = (need - into).max(0);
    let pct = if need > 0 {
        ((into as f64 / need as f64) * 100.0).round().clamp(0.0, 100.0) as u32
    } else {
        0
    };
    XpProgress {
        level,
        xp_into_level: into,
        xp_needed_this_level: need,
        xp_to_next_level: to_next,
        progress_percent: pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ProgressionConfig {
        ProgressionConfig::default().clamped()
    }

    #[test]
    fn base_requirement_for_first_level() {
        let cfg = cfg();
        assert_eq!(xp_for_level(&cfg, 0), 100);
        assert_eq!(xp_for_level(&cfg, 1), 100);
        // Level 2 -> 3: 100 * 1.15 = 115, already a multiple of 5.
        assert_eq!(xp_for_level(&cfg, 2), 115);
    }

    #[test]
    fn requirements_round_to_nice_numbers() {
        let cfg = cfg();
        for level in 1..50 {
            let need = xp_for_level(&cfg, level);
            assert_eq!(need % cfg.round_to, 0, "level {level} requirement {need}");
            assert!(need >= cfg.base_xp);
        }
    }

    #[test]
    fn level_roundtrips_through_cumulative_total() {
        let cfg = cfg();
        for level in 1..=20u32 {
            let total = total_xp_for_level(&cfg, level);
            assert_eq!(level_from_xp(&cfg, total), level, "total={total}");
            // One XP short of the next level stays on this level.
            let next_total = total + xp_for_level(&cfg, level);
            assert_eq!(level_from_xp(&cfg, next_total - 1), level);
        }
    }

    #[test]
    fn non_positive_xp_is_level_one() {
        let cfg = cfg();
        assert_eq!(level_from_xp(&cfg, 0), 1);
        assert_eq!(level_from_xp(&cfg, -500), 1);
        let p = xp_progress(&cfg, -500);
        assert_eq!(p.level, 1);
        assert_eq!(p.xp_into_level, 0);
        assert_eq!(p.progress_percent, 0);
    }

    #[test]
    fn progress_percent_is_bounded() {
        let cfg = cfg();
        let p = xp_progress(&cfg, 50);
        assert_eq!(p.level, 1);
        assert_eq!(p.xp_into_level, 50);
        assert_eq!(p.xp_needed_this_level, 100);
        assert_eq!(p.xp_to_next_level, 50);
        assert_eq!(p.progress_percent, 50);
    }

    #[test]
    fn steep_curves_saturate_instead_of_overflowing() {
        let cfg = ProgressionConfig { base_xp: 10, growth: 3.0, round_to: 5, max_level: 1000 }.clamped();
        // Requirements pass i64::MAX long before the level cap; they must
        // clamp there, not wrap.
        assert_eq!(xp_for_level(&cfg, 400), i64::MAX);
        assert!(total_xp_for_level(&cfg, 500) > 0);

        let total = 7_000_000_000_000_000_000i64;
        let level = level_from_xp(&cfg, total);
        assert!(level <= cfg.max_level + 1);
        let p = xp_progress(&cfg, total);
        assert_eq!(p.level, level);
        assert!(p.xp_into_level >= 0);
    }

    #[test]
    fn degenerate_config_is_clamped() {
        let cfg = ProgressionConfig { base_xp: 1, growth: 9.0, round_to: 0, max_level: 0 }.clamped();
        assert_eq!(cfg.base_xp, 10);
        assert_eq!(cfg.growth, 3.0);
        assert_eq!(cfg.round_to, 1);
        // Huge totals terminate at the level cap.
        assert!(level_from_xp(&cfg, i64::MAX) <= cfg.max_level + 1);
    }
}
