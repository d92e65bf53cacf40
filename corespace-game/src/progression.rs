//! XP to level mapping.
//!
//! Everything here is derived from an ascending threshold table and a total XP
//! value; there is no mutable state.

use crate::numbers::{round_f64_to_u8, u32_to_f64};
use crate::tuning::LevelTuning;

/// Ascending XP thresholds; index `i` is the XP needed for level `i + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelTable {
    thresholds: Vec<u32>,
}

/// Inclusive lower bound and exclusive upper bound of a level's XP span.
///
/// At the maximum level both bounds equal the final threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelRange {
    pub min: u32,
    pub max: u32,
}

impl LevelTable {
    /// Build a table from thresholds. An empty list degrades to a single level.
    #[must_use]
    pub fn new(thresholds: Vec<u32>) -> Self {
        let thresholds = if thresholds.is_empty() {
            vec![0]
        } else {
            thresholds
        };
        Self { thresholds }
    }

    #[must_use]
    pub fn from_tuning(levels: &LevelTuning) -> Self {
        Self::new(levels.thresholds.clone())
    }

    #[must_use]
    pub fn thresholds(&self) -> &[u32] {
        &self.thresholds
    }

    #[must_use]
    pub fn max_level(&self) -> u32 {
        u32::try_from(self.thresholds.len()).unwrap_or(u32::MAX)
    }

    /// Highest 1-based level whose threshold `total_xp` has reached; never below 1.
    #[must_use]
    pub fn compute_level(&self, total_xp: u32) -> u32 {
        self.thresholds
            .iter()
            .rposition(|&threshold| total_xp >= threshold)
            .map_or(1, |idx| u32::try_from(idx + 1).unwrap_or(u32::MAX))
    }

    /// XP still missing for the next level, 0 at the maximum level.
    #[must_use]
    pub fn xp_to_next_level(&self, total_xp: u32) -> u32 {
        let range = self.current_level_range(total_xp);
        if range.max <= range.min {
            return 0;
        }
        range.max.saturating_sub(total_xp)
    }

    #[must_use]
    pub fn current_level_range(&self, total_xp: u32) -> LevelRange {
        let level = self.compute_level(total_xp) as usize;
        let min = self.thresholds.get(level - 1).copied().unwrap_or(0);
        let max = self.thresholds.get(level).copied().unwrap_or(min);
        LevelRange { min, max }
    }

    /// Percent through the current level, rounded, in `0..=100`.
    #[must_use]
    pub fn level_progress(&self, total_xp: u32) -> u8 {
        let LevelRange { min, max } = self.current_level_range(total_xp);
        if max <= min {
            return 100;
        }
        let done = u32_to_f64(total_xp.saturating_sub(min));
        let span = u32_to_f64(max - min);
        round_f64_to_u8((done / span * 100.0).min(100.0))
    }
}

impl Default for LevelTable {
    fn default() -> Self {
        Self::from_tuning(&LevelTuning::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_follow_thresholds() {
        let table = LevelTable::default();
        assert_eq!(table.max_level(), 10);
        assert_eq!(table.compute_level(0), 1);
        assert_eq!(table.compute_level(99), 1);
        assert_eq!(table.compute_level(100), 2);
        assert_eq!(table.compute_level(6_499), 9);
        assert_eq!(table.compute_level(1_000_000), 10);
    }

    #[test]
    fn next_level_gap_and_range() {
        let table = LevelTable::default();
        assert_eq!(table.xp_to_next_level(120), 130);
        assert_eq!(
            table.current_level_range(120),
            LevelRange { min: 100, max: 250 }
        );
        assert_eq!(table.xp_to_next_level(7_000), 0);
        assert_eq!(
            table.current_level_range(7_000),
            LevelRange {
                min: 6_500,
                max: 6_500
            }
        );
    }

    #[test]
    fn progress_is_bounded_and_level_is_monotonic() {
        let table = LevelTable::default();
        let mut previous = 0;
        for xp in (0..8_000).step_by(7) {
            let level = table.compute_level(xp);
            assert!(level >= previous, "level dropped at {xp}");
            previous = level;
            assert!(table.level_progress(xp) <= 100);
        }
        assert_eq!(table.level_progress(175), 50);
        assert_eq!(table.level_progress(9_999), 100);
    }

    #[test]
    fn table_without_zero_floor_still_reports_level_one() {
        let table = LevelTable::new(vec![50, 100]);
        assert_eq!(table.compute_level(10), 1);
        assert_eq!(table.current_level_range(10), LevelRange { min: 50, max: 100 });
        assert_eq!(table.level_progress(10), 0);
    }
}
