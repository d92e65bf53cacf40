//! Data-driven gameplay tuning.
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

use crate::catalog::{ItemKind, Rarity};

const DEFAULT_THRESHOLDS: [u32; 10] = [0, 100, 250, 500, 900, 1500, 2300, 3400, 4800, 6500];

/// Errors surfaced when validating tuning data.
#[derive(Debug, Error)]
pub enum TuningError {
    #[error("tuning JSON is invalid: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("level thresholds must start at 0 and be strictly ascending")]
    Thresholds,
    #[error("{field} must be a probability in [0, 1] (got {value})")]
    Probability { field: &'static str, value: f64 },
    #[error("{field} must be a finite non-negative number (got {value})")]
    NonNegative { field: &'static str, value: f64 },
    #[error("procrastination window is inverted ({start} > {end})")]
    Window { start: f64, end: f64 },
    #[error("day start hour {start} must be inside a {length} hour day")]
    DayStart { start: f64, length: f64 },
}

/// Complete gameplay tuning document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Tuning {
    #[serde(default)]
    pub levels: LevelTuning,
    #[serde(default)]
    pub rewards: RewardTuning,
    #[serde(default)]
    pub aura: AuraTuning,
    #[serde(default)]
    pub parasites: ParasiteTuning,
    #[serde(default)]
    pub budget: BudgetTuning,
    #[serde(default)]
    pub day: DayTuning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelTuning {
    #[serde(default = "LevelTuning::default_thresholds")]
    pub thresholds: Vec<u32>,
}

impl LevelTuning {
    fn default_thresholds() -> Vec<u32> {
        DEFAULT_THRESHOLDS.to_vec()
    }
}

impl Default for LevelTuning {
    fn default() -> Self {
        Self {
            thresholds: Self::default_thresholds(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTuning {
    /// XP awarded for each successful fusion.
    #[serde(default = "RewardTuning::default_fusion_xp")]
    pub fusion_xp: u32,
}

impl RewardTuning {
    const fn default_fusion_xp() -> u32 {
        15
    }
}

impl Default for RewardTuning {
    fn default() -> Self {
        Self {
            fusion_xp: Self::default_fusion_xp(),
        }
    }
}

/// Additive multiplier bonus per adjacent buff, keyed by the buff's rarity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuraTuning {
    #[serde(default = "AuraTuning::default_rare")]
    pub rare: f64,
    #[serde(default = "AuraTuning::default_improved")]
    pub improved: f64,
    /// Bonus for every other rarity.
    #[serde(default = "AuraTuning::default_fallback")]
    pub fallback: f64,
}

impl AuraTuning {
    const fn default_rare() -> f64 {
        0.5
    }
    const fn default_improved() -> f64 {
        0.25
    }
    const fn default_fallback() -> f64 {
        0.1
    }

    #[must_use]
    pub const fn bonus(&self, rarity: Rarity) -> f64 {
        match rarity {
            Rarity::Rare => self.rare,
            Rarity::Improved => self.improved,
            Rarity::Common | Rarity::Unique => self.fallback,
        }
    }
}

impl Default for AuraTuning {
    fn default() -> Self {
        Self {
            rare: Self::default_rare(),
            improved: Self::default_improved(),
            fallback: Self::default_fallback(),
        }
    }
}

/// Parasite spawn policy and end-of-day penalties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParasiteTuning {
    pub max_active: usize,
    pub fatigue_from_hour: f64,
    pub fatigue_chance: f64,
    pub distraction_chance: f64,
    /// Inclusive `[start, end]` hours.
    pub procrastination_hours: [f64; 2],
    pub procrastination_chance: f64,
    /// Penalty for parasites that drain focus.
    pub focus_penalty: u32,
    pub default_penalty: u32,
}

impl Default for ParasiteTuning {
    fn default() -> Self {
        Self {
            max_active: 3,
            fatigue_from_hour: 22.0,
            fatigue_chance: 0.4,
            distraction_chance: 0.05,
            procrastination_hours: [10.0, 18.0],
            procrastination_chance: 0.02,
            focus_penalty: 5,
            default_penalty: 20,
        }
    }
}

/// Daily placement quotas. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetTuning {
    #[serde(default)]
    pub task: Option<u32>,
    #[serde(default = "BudgetTuning::default_resource")]
    pub resource: Option<u32>,
    #[serde(default = "BudgetTuning::default_buff")]
    pub buff: Option<u32>,
    #[serde(default)]
    pub parasite: Option<u32>,
}

impl BudgetTuning {
    #[allow(clippy::unnecessary_wraps)]
    const fn default_resource() -> Option<u32> {
        Some(5)
    }
    #[allow(clippy::unnecessary_wraps)]
    const fn default_buff() -> Option<u32> {
        Some(2)
    }

    #[must_use]
    pub const fn limit(&self, kind: ItemKind) -> Option<u32> {
        match kind {
            ItemKind::Task => self.task,
            ItemKind::Resource => self.resource,
            ItemKind::Buff => self.buff,
            ItemKind::Parasite => self.parasite,
        }
    }
}

impl Default for BudgetTuning {
    fn default() -> Self {
        Self {
            task: None,
            resource: Self::default_resource(),
            buff: Self::default_buff(),
            parasite: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DayTuning {
    pub start_hour: f64,
    pub length_hours: f64,
}

impl Default for DayTuning {
    fn default() -> Self {
        Self {
            start_hour: 8.0,
            length_hours: 24.0,
        }
    }
}

impl Tuning {
    /// Parse and validate a tuning document. Missing sections fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error when the JSON is malformed or a value is out of range.
    pub fn from_json(json: &str) -> Result<Self, TuningError> {
        let tuning: Self = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Built-in tuning shipped with the crate.
    ///
    /// # Panics
    ///
    /// Panics if the embedded tuning asset is corrupt.
    #[must_use]
    pub fn builtin() -> &'static Self {
        static TUNING: OnceLock<Tuning> = OnceLock::new();
        TUNING.get_or_init(|| {
            Self::from_json(include_str!("../data/tuning.json")).expect("valid built-in tuning")
        })
    }

    /// Validate ranges and ordering.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), TuningError> {
        let thresholds = &self.levels.thresholds;
        if thresholds.first() != Some(&0) || thresholds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(TuningError::Thresholds);
        }

        for (field, value) in [
            ("aura.rare", self.aura.rare),
            ("aura.improved", self.aura.improved),
            ("aura.fallback", self.aura.fallback),
            ("day.length_hours", self.day.length_hours),
            ("day.start_hour", self.day.start_hour),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(TuningError::NonNegative { field, value });
            }
        }

        let p = &self.parasites;
        for (field, value) in [
            ("parasites.fatigue_chance", p.fatigue_chance),
            ("parasites.distraction_chance", p.distraction_chance),
            ("parasites.procrastination_chance", p.procrastination_chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(TuningError::Probability { field, value });
            }
        }
        let [start, end] = p.procrastination_hours;
        if start.is_nan() || end.is_nan() || start > end {
            return Err(TuningError::Window { start, end });
        }

        if self.day.start_hour >= self.day.length_hours {
            return Err(TuningError::DayStart {
                start: self.day.start_hour,
                length: self.day.length_hours,
            });
        }
        Ok(())
    }
}
