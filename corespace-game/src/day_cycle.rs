//! Planning, active and resolved phases of a simulated day.
//!
//! The clock only moves through [`DayCycle::tick`]. Reaching the end of the day
//! and calling [`DayCycle::end_day`] share one settlement path.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::aura::aura_multiplier;
use crate::catalog::{Catalog, ItemKind};
use crate::error::ActionError;
use crate::inventory::{Inventory, Ledgers, PlacedItem};
use crate::numbers::{floor_f64_to_u32, sanitize_hours, u32_to_f64};
use crate::parasite::{check_parasite_spawn, spawn_parasite};
use crate::rng::RngBundle;
use crate::tuning::{AuraTuning, DayTuning, ParasiteTuning};
use crate::user::LevelChange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DayPhase {
    #[default]
    Planning,
    Active,
    Resolved,
}

impl DayPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Active => "active",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for DayPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// End-of-day XP tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settlement {
    /// Task XP after aura multipliers, before penalties.
    pub gross_xp: u32,
    /// XP actually awarded: gross minus penalty, floored at zero.
    pub xp_gained: u32,
    pub tasks_completed: u32,
    pub penalty: u32,
}

/// Compute the settlement for the placements currently on the grid.
#[must_use]
pub fn settle(placed: &[PlacedItem], aura: &AuraTuning, parasites: &ParasiteTuning) -> Settlement {
    let mut gross_xp = 0u32;
    let mut tasks_completed = 0u32;
    let mut penalty = 0u32;

    for entry in placed {
        match entry.item.kind {
            ItemKind::Task => {
                let base = u32_to_f64(entry.item.effect.xp.unwrap_or(0));
                let earned = floor_f64_to_u32(base * aura_multiplier(entry, placed, aura));
                gross_xp = gross_xp.saturating_add(earned);
                tasks_completed += 1;
            }
            ItemKind::Parasite => {
                let cost = if entry.item.effect.drains_focus() {
                    parasites.focus_penalty
                } else {
                    parasites.default_penalty
                };
                penalty = penalty.saturating_add(cost);
            }
            ItemKind::Resource | ItemKind::Buff => {}
        }
    }

    Settlement {
        gross_xp,
        xp_gained: gross_xp.saturating_sub(penalty),
        tasks_completed,
        penalty,
    }
}

/// Everything a tick or settlement reads and mutates besides the cycle itself.
#[derive(Debug)]
pub struct DayContext<'a> {
    pub inventory: &'a mut Inventory,
    pub ledgers: Ledgers<'a>,
    pub catalog: &'a Catalog,
    pub rng: &'a RngBundle,
}

/// Parasite placed by the spawner during a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnedParasite {
    pub placed: PlacedItem,
    pub message_key: &'static str,
}

/// Settlement plus the level change it caused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub settlement: Settlement,
    pub level_change: Option<LevelChange>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The day is not running; nothing changed.
    Idle,
    Advanced {
        spawned: Option<SpawnedParasite>,
    },
    /// The day ran out and was settled.
    Resolved(Resolution),
}

/// Phase machine: planning -> active -> resolved -> planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DayCycle {
    pub phase: DayPhase,
    /// Fractional hour of the simulated day.
    pub time: f64,
    pub day_count: u32,
    pub result: Option<Settlement>,
}

impl Default for DayCycle {
    fn default() -> Self {
        Self::new(&DayTuning::default())
    }
}

impl DayCycle {
    #[must_use]
    pub const fn new(day: &DayTuning) -> Self {
        Self {
            phase: DayPhase::Planning,
            time: day.start_hour,
            day_count: 1,
            result: None,
        }
    }

    /// Leave planning and start the clock.
    ///
    /// # Errors
    ///
    /// [`ActionError::WrongPhase`] outside the planning phase.
    pub fn start_day(&mut self) -> Result<(), ActionError> {
        if self.phase != DayPhase::Planning {
            return Err(ActionError::WrongPhase(self.phase));
        }
        self.phase = DayPhase::Active;
        log::info!("day {} started at {:.2}h", self.day_count, self.time);
        Ok(())
    }

    /// Advance the clock by `delta_hours`, then roll for one parasite spawn.
    ///
    /// Negative or non-finite deltas count as zero. Reaching the end of the day
    /// settles it instead; the excess time is discarded.
    pub fn tick(&mut self, delta_hours: f64, day: &DayTuning, ctx: &mut DayContext<'_>) -> TickOutcome {
        if self.phase != DayPhase::Active {
            return TickOutcome::Idle;
        }
        let next = self.time + sanitize_hours(delta_hours);
        if next >= day.length_hours {
            self.time = day.length_hours;
            return TickOutcome::Resolved(self.resolve(ctx));
        }
        self.time = next;

        let proposal = check_parasite_spawn(
            self.time,
            ctx.inventory.parasite_count(),
            &ctx.ledgers.tuning.parasites,
            &mut *ctx.rng.spawn(),
        );
        let spawned = proposal.and_then(|proposal| {
            let Some(parasite) = ctx.catalog.item(proposal.parasite_id) else {
                log::warn!("parasite {} missing from catalog", proposal.parasite_id);
                return None;
            };
            let placed = spawn_parasite(ctx.inventory, parasite, &mut *ctx.rng.ids())?;
            log::debug!(
                "{} spawned at ({},{}) at {:.2}h",
                placed.item.id,
                placed.x,
                placed.y,
                self.time
            );
            Some(SpawnedParasite {
                placed,
                message_key: proposal.message_key,
            })
        });
        TickOutcome::Advanced { spawned }
    }

    /// Settle early. The clock stays where it is.
    ///
    /// # Errors
    ///
    /// [`ActionError::WrongPhase`] unless the day is active.
    pub fn end_day(&mut self, ctx: &mut DayContext<'_>) -> Result<Resolution, ActionError> {
        if self.phase != DayPhase::Active {
            return Err(ActionError::WrongPhase(self.phase));
        }
        Ok(self.resolve(ctx))
    }

    /// Return to planning for the next day.
    ///
    /// # Errors
    ///
    /// [`ActionError::WrongPhase`] unless the day was resolved.
    pub fn start_planning(&mut self, day: &DayTuning) -> Result<(), ActionError> {
        if self.phase != DayPhase::Resolved {
            return Err(ActionError::WrongPhase(self.phase));
        }
        self.phase = DayPhase::Planning;
        self.time = day.start_hour;
        self.result = None;
        Ok(())
    }

    pub fn reset(&mut self, day: &DayTuning) {
        *self = Self::new(day);
    }

    /// Repair a cycle loaded from storage.
    pub fn normalize(&mut self, day: &DayTuning) {
        self.time = if self.time.is_finite() {
            self.time.clamp(0.0, day.length_hours)
        } else {
            day.start_hour
        };
        self.day_count = self.day_count.max(1);
        if self.phase != DayPhase::Resolved {
            self.result = None;
        }
    }

    fn resolve(&mut self, ctx: &mut DayContext<'_>) -> Resolution {
        let tuning = ctx.ledgers.tuning;
        let settlement = settle(ctx.inventory.placed(), &tuning.aura, &tuning.parasites);
        let ledgers = &mut ctx.ledgers;
        let level_change = ledgers.user.add_xp(settlement.xp_gained, ledgers.levels);
        ledgers
            .activity
            .track_tasks(ledgers.today, settlement.tasks_completed);
        ledgers.activity.track_xp(ledgers.today, settlement.xp_gained);
        ledgers.user.streak = ledgers.activity.streak(ledgers.today);

        self.phase = DayPhase::Resolved;
        self.result = Some(settlement);
        log::info!(
            "day {} resolved: +{} xp ({} tasks, penalty {})",
            self.day_count,
            settlement.xp_gained,
            settlement.tasks_completed,
            settlement.penalty
        );
        self.day_count = self.day_count.saturating_add(1);
        Resolution {
            settlement,
            level_change,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityLog;
    use crate::budget::DailyBudget;
    use crate::catalog::Item;
    use crate::grid::{GridMode, InstanceId};
    use crate::progression::LevelTable;
    use crate::tuning::Tuning;
    use crate::user::UserStats;
    use chrono::NaiveDate;

    struct World {
        inventory: Inventory,
        user: UserStats,
        budget: DailyBudget,
        activity: ActivityLog,
        levels: LevelTable,
        tuning: Tuning,
        catalog: std::sync::Arc<Catalog>,
        rng: RngBundle,
        today: NaiveDate,
    }

    impl World {
        fn new() -> Self {
            let today = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
            Self {
                inventory: Inventory::new(GridMode::Day),
                user: UserStats::default(),
                budget: DailyBudget::new(today),
                activity: ActivityLog::default(),
                levels: LevelTable::default(),
                tuning: Tuning::default(),
                catalog: Catalog::builtin(),
                rng: RngBundle::from_user_seed(11),
                today,
            }
        }

        fn ctx(&mut self) -> DayContext<'_> {
            DayContext {
                inventory: &mut self.inventory,
                ledgers: Ledgers {
                    user: &mut self.user,
                    budget: &mut self.budget,
                    activity: &mut self.activity,
                    levels: &self.levels,
                    tuning: &self.tuning,
                    today: self.today,
                },
                catalog: &self.catalog,
                rng: &self.rng,
            }
        }

        fn put(&mut self, id: &str, x: i32, y: i32) {
            let item = self.catalog.item(id).cloned().unwrap();
            self.inventory
                .force_place(&item, x, y, &mut *self.rng.ids())
                .unwrap();
        }
    }

    fn placed(id: &str, item: Item, x: i32, y: i32) -> PlacedItem {
        PlacedItem {
            instance_id: InstanceId::new(id),
            item,
            x,
            y,
        }
    }

    #[test]
    fn settlement_applies_aura_and_penalties() {
        let catalog = Catalog::builtin();
        let item = |id: &str| catalog.item(id).cloned().unwrap();
        let board = vec![
            placed("t1", item("task-code"), 0, 0),
            placed("b1", item("buff-deepwork"), 2, 0),
            placed("t2", item("task-chores"), 5, 5),
            placed("p1", item("para-fatigue"), 7, 0),
            placed("p2", item("para-distraction"), 7, 1),
        ];
        let tuning = Tuning::default();
        let settlement = settle(&board, &tuning.aura, &tuning.parasites);
        assert_eq!(settlement.gross_xp, 60 + 10);
        assert_eq!(settlement.tasks_completed, 2);
        assert_eq!(settlement.penalty, 20 + 5);
        assert_eq!(settlement.xp_gained, 45);
    }

    #[test]
    fn net_xp_never_goes_negative() {
        let catalog = Catalog::builtin();
        let board = vec![
            placed("t", catalog.item("task-chores").cloned().unwrap(), 0, 0),
            placed("p", catalog.item("para-fatigue").cloned().unwrap(), 1, 0),
        ];
        let tuning = Tuning::default();
        let settlement = settle(&board, &tuning.aura, &tuning.parasites);
        assert_eq!((settlement.gross_xp, settlement.xp_gained), (10, 0));
    }

    #[test]
    fn phase_transitions_are_guarded() {
        let mut world = World::new();
        let day = world.tuning.day;
        let mut cycle = DayCycle::new(&day);
        assert_eq!(cycle.tick(1.0, &day, &mut world.ctx()), TickOutcome::Idle);
        assert_eq!(
            cycle.end_day(&mut world.ctx()),
            Err(ActionError::WrongPhase(DayPhase::Planning))
        );
        assert_eq!(
            cycle.start_planning(&day),
            Err(ActionError::WrongPhase(DayPhase::Planning))
        );
        cycle.start_day().unwrap();
        assert_eq!(
            cycle.start_day(),
            Err(ActionError::WrongPhase(DayPhase::Active))
        );
        cycle.end_day(&mut world.ctx()).unwrap();
        assert_eq!(cycle.phase, DayPhase::Resolved);
        assert_eq!(cycle.day_count, 2);
        cycle.start_planning(&day).unwrap();
        assert_eq!(cycle.phase, DayPhase::Planning);
        assert!((cycle.time - 8.0).abs() < f64::EPSILON);
        assert!(cycle.result.is_none());
    }

    #[test]
    fn tick_past_midnight_resolves_without_overflow() {
        let mut world = World::new();
        world.put("task-code", 0, 0);
        let day = world.tuning.day;
        let mut cycle = DayCycle::new(&day);
        cycle.start_day().unwrap();
        cycle.time = 23.8;

        let outcome = cycle.tick(0.5, &day, &mut world.ctx());
        let TickOutcome::Resolved(resolution) = outcome else {
            panic!("expected resolution, got {outcome:?}");
        };
        assert_eq!(cycle.phase, DayPhase::Resolved);
        assert!(cycle.time <= 24.0);
        assert_eq!(cycle.result, Some(resolution.settlement));
        assert_eq!(resolution.settlement.tasks_completed, 1);
        assert_eq!(world.user.xp, 40);
        assert_eq!(world.activity.record(world.today).unwrap().tasks_completed, 1);
        assert_eq!(world.inventory.placed().len(), 1, "settlement keeps the grid");
    }

    #[test]
    fn negative_ticks_do_not_rewind() {
        let mut world = World::new();
        let day = world.tuning.day;
        let mut cycle = DayCycle::new(&day);
        cycle.start_day().unwrap();
        cycle.tick(-3.0, &day, &mut world.ctx());
        cycle.tick(f64::NAN, &day, &mut world.ctx());
        assert!((cycle.time - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn late_ticks_never_exceed_parasite_cap() {
        let mut world = World::new();
        world.tuning.parasites.fatigue_chance = 1.0;
        let day = world.tuning.day;
        let mut cycle = DayCycle::new(&day);
        cycle.start_day().unwrap();
        cycle.time = 22.0;
        let mut spawned = 0;
        for _ in 0..10 {
            if let TickOutcome::Advanced { spawned: Some(parasite) } =
                cycle.tick(0.1, &day, &mut world.ctx())
            {
                assert_eq!(parasite.message_key, "parasite.fatigue");
                spawned += 1;
            }
        }
        assert_eq!(spawned, 3);
        assert_eq!(world.inventory.parasite_count(), 3);
        assert!(world.inventory.is_consistent());
    }

    #[test]
    fn loaded_cycle_is_normalized() {
        let day = DayTuning::default();
        let mut cycle = DayCycle {
            phase: DayPhase::Active,
            time: f64::INFINITY,
            day_count: 0,
            result: Some(Settlement::default()),
        };
        cycle.normalize(&day);
        assert!((cycle.time - 8.0).abs() < f64::EPSILON);
        assert_eq!(cycle.day_count, 1);
        assert!(cycle.result.is_none());
    }
}
