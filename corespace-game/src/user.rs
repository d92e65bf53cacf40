//! Player stats aggregate.
use serde::{Deserialize, Serialize};

use crate::catalog::ItemEffect;
use crate::constants::{STARTING_ENERGY, STARTING_FOCUS, STAT_MAX, STAT_MIN};
use crate::progression::LevelTable;

/// Level transition produced by an XP award.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelChange {
    pub from: u32,
    pub to: u32,
}

/// Level, XP, streak, energy and focus. Energy and focus stay within `0..=100`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserStats {
    pub level: u32,
    pub xp: u32,
    pub streak: u32,
    pub energy: i32,
    pub focus: i32,
}

impl Default for UserStats {
    fn default() -> Self {
        Self {
            level: 1,
            xp: 0,
            streak: 0,
            energy: STARTING_ENERGY,
            focus: STARTING_FOCUS,
        }
    }
}

impl UserStats {
    /// Add XP and recompute the level. Returns the change when the level rose.
    pub fn add_xp(&mut self, amount: u32, levels: &LevelTable) -> Option<LevelChange> {
        self.xp = self.xp.saturating_add(amount);
        let from = self.level;
        self.level = levels.compute_level(self.xp);
        (self.level > from).then_some(LevelChange {
            from,
            to: self.level,
        })
    }

    pub fn modify_energy(&mut self, delta: i32) {
        self.energy = clamp_stat(self.energy.saturating_add(delta));
    }

    pub fn modify_focus(&mut self, delta: i32) {
        self.focus = clamp_stat(self.focus.saturating_add(delta));
    }

    /// Apply every delta the effect carries.
    pub fn apply_effect(&mut self, effect: &ItemEffect, levels: &LevelTable) -> Option<LevelChange> {
        let change = effect.xp.and_then(|xp| self.add_xp(xp, levels));
        if let Some(energy) = effect.energy {
            self.modify_energy(energy);
        }
        if let Some(focus) = effect.focus {
            self.modify_focus(focus);
        }
        change
    }

    /// Clamp stats and recompute the level, for values loaded from storage.
    pub fn normalize(&mut self, levels: &LevelTable) {
        self.energy = clamp_stat(self.energy);
        self.focus = clamp_stat(self.focus);
        self.level = levels.compute_level(self.xp);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

const fn clamp_stat(value: i32) -> i32 {
    if value < STAT_MIN {
        STAT_MIN
    } else if value > STAT_MAX {
        STAT_MAX
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_clamp_on_every_mutation() {
        let mut stats = UserStats::default();
        stats.modify_energy(25);
        assert_eq!(stats.energy, 100);
        stats.modify_focus(-150);
        assert_eq!(stats.focus, 0);
        stats.modify_energy(i32::MIN);
        assert_eq!(stats.energy, 0);
    }

    #[test]
    fn xp_award_reports_level_up_once() {
        let levels = LevelTable::default();
        let mut stats = UserStats::default();
        assert_eq!(stats.add_xp(60, &levels), None);
        assert_eq!(
            stats.add_xp(200, &levels),
            Some(LevelChange { from: 1, to: 3 })
        );
        assert_eq!(stats.level, 3);
        assert_eq!(stats.add_xp(0, &levels), None);
    }

    #[test]
    fn effects_apply_all_deltas() {
        let levels = LevelTable::default();
        let mut stats = UserStats {
            energy: 50,
            focus: 50,
            ..UserStats::default()
        };
        let effect = ItemEffect {
            energy: Some(15),
            focus: Some(-5),
            xp: Some(120),
            description: String::new(),
        };
        assert!(stats.apply_effect(&effect, &levels).is_some());
        assert_eq!((stats.energy, stats.focus, stats.xp), (65, 45, 120));
    }

    #[test]
    fn normalize_repairs_loaded_values() {
        let mut stats = UserStats {
            level: 9,
            xp: 260,
            energy: 400,
            focus: -3,
            ..UserStats::default()
        };
        stats.normalize(&LevelTable::default());
        assert_eq!((stats.level, stats.energy, stats.focus), (3, 100, 0));
    }
}
