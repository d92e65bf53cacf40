//! Owned game session: every aggregate plus the operations that tie them together.
use std::rc::Rc;
use std::sync::Arc;

use crate::activity::ActivityLog;
use crate::budget::DailyBudget;
use crate::catalog::{Catalog, ItemKind};
use crate::clock::{Clock, SystemClock};
use crate::day_cycle::{DayContext, DayCycle, Resolution, TickOutcome};
use crate::error::ActionError;
use crate::grid::{GridMode, InstanceId, occupied_cells};
use crate::inventory::{ConsumeOutcome, FusionOutcome, Inventory, Ledgers, PlacedItem, RebuildReport};
use crate::notice::{Notice, NoticeQueue};
use crate::progression::LevelTable;
use crate::rng::RngBundle;
use crate::tuning::Tuning;
use crate::user::{LevelChange, UserStats};

/// What a drag-and-drop release did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    Fused(FusionOutcome),
    Moved,
    /// Dropped back onto its own origin.
    Unchanged,
}

/// Borrowed view of a session split into disjoint parts.
struct Parts<'a> {
    ctx: DayContext<'a>,
    cycle: &'a mut DayCycle,
    notices: &'a mut NoticeQueue,
}

/// A running game.
pub struct Session {
    catalog: Arc<Catalog>,
    tuning: Tuning,
    levels: LevelTable,
    inventory: Inventory,
    user: UserStats,
    budget: DailyBudget,
    activity: ActivityLog,
    cycle: DayCycle,
    rng: RngBundle,
    clock: Rc<dyn Clock>,
    notices: NoticeQueue,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.inventory.mode())
            .field("placed", &self.inventory.placed().len())
            .field("user", &self.user)
            .field("cycle", &self.cycle)
            .field("seed", &self.rng.seed())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Fresh session in day mode.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, tuning: Tuning, seed: u64, clock: Rc<dyn Clock>) -> Self {
        let today = clock.today();
        let levels = LevelTable::from_tuning(&tuning.levels);
        let cycle = DayCycle::new(&tuning.day);
        Self {
            catalog,
            tuning,
            levels,
            inventory: Inventory::new(GridMode::Day),
            user: UserStats::default(),
            budget: DailyBudget::new(today),
            activity: ActivityLog::default(),
            cycle,
            rng: RngBundle::from_user_seed(seed),
            clock,
            notices: NoticeQueue::default(),
        }
    }

    /// Session on the built-in catalog and tuning, dated by the system clock.
    #[must_use]
    pub fn builtin(seed: u64) -> Self {
        Self::new(
            Catalog::builtin(),
            Tuning::builtin().clone(),
            seed,
            Rc::new(SystemClock),
        )
    }

    /// Reassemble a session from already-validated aggregates.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        catalog: Arc<Catalog>,
        tuning: Tuning,
        inventory: Inventory,
        user: UserStats,
        budget: DailyBudget,
        activity: ActivityLog,
        cycle: DayCycle,
        rng: RngBundle,
        clock: Rc<dyn Clock>,
    ) -> Self {
        let levels = LevelTable::from_tuning(&tuning.levels);
        Self {
            catalog,
            tuning,
            levels,
            inventory,
            user,
            budget,
            activity,
            cycle,
            rng,
            clock,
            notices: NoticeQueue::default(),
        }
    }

    fn parts(&mut self) -> Parts<'_> {
        let today = self.clock.today();
        Parts {
            ctx: DayContext {
                inventory: &mut self.inventory,
                ledgers: Ledgers {
                    user: &mut self.user,
                    budget: &mut self.budget,
                    activity: &mut self.activity,
                    levels: &self.levels,
                    tuning: &self.tuning,
                    today,
                },
                catalog: &self.catalog,
                rng: &self.rng,
            },
            cycle: &mut self.cycle,
            notices: &mut self.notices,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn catalog_handle(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub const fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    #[must_use]
    pub const fn levels(&self) -> &LevelTable {
        &self.levels
    }

    #[must_use]
    pub const fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    #[must_use]
    pub const fn user(&self) -> &UserStats {
        &self.user
    }

    #[must_use]
    pub const fn budget(&self) -> &DailyBudget {
        &self.budget
    }

    #[must_use]
    pub const fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    #[must_use]
    pub const fn day_cycle(&self) -> &DayCycle {
        &self.cycle
    }

    #[must_use]
    pub const fn rng(&self) -> &RngBundle {
        &self.rng
    }

    #[must_use]
    pub fn clock(&self) -> Rc<dyn Clock> {
        Rc::clone(&self.clock)
    }

    #[must_use]
    pub fn today(&self) -> chrono::NaiveDate {
        self.clock.today()
    }

    /// Placements of `kind` left today, `None` when unlimited.
    pub fn remaining_budget(&mut self, kind: ItemKind) -> Option<u32> {
        let today = self.clock.today();
        self.budget.remaining(kind, today, &self.tuning.budget)
    }

    /// Percent through the current level.
    #[must_use]
    pub fn level_progress(&self) -> u8 {
        self.levels.level_progress(self.user.xp)
    }

    /// Take every pending notice, oldest first.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    #[must_use]
    pub fn pending_notices(&self) -> usize {
        self.notices.len()
    }

    /// Place a catalog item through the energy and budget gates.
    ///
    /// # Errors
    ///
    /// [`ActionError::UnknownItem`] or any placement failure; a rejection notice is queued.
    pub fn place(&mut self, item_id: &str, x: i32, y: i32) -> Result<InstanceId, ActionError> {
        let Some(item) = self.catalog.item(item_id).cloned() else {
            let reason = ActionError::UnknownItem(item_id.to_string());
            self.notices.push(Notice::PlacementRejected {
                item_id: item_id.to_string(),
                reason: reason.clone(),
            });
            return Err(reason);
        };
        let Parts {
            mut ctx, notices, ..
        } = self.parts();
        let result = ctx
            .inventory
            .place(&item, x, y, &mut ctx.ledgers, &mut *ctx.rng.ids());
        match result {
            Ok(placed) => {
                notices.push(Notice::Placed {
                    instance_id: placed.instance_id.clone(),
                    item_id: placed.item.id.clone(),
                    x,
                    y,
                });
                Ok(placed.instance_id)
            }
            Err(reason) => {
                notices.push(Notice::PlacementRejected {
                    item_id: item.id,
                    reason: reason.clone(),
                });
                Err(reason)
            }
        }
    }

    /// Place a catalog item bypassing energy and budget gates.
    ///
    /// # Errors
    ///
    /// [`ActionError::UnknownItem`], [`ActionError::OutOfBounds`] or [`ActionError::Overlap`].
    pub fn force_place(&mut self, item_id: &str, x: i32, y: i32) -> Result<InstanceId, ActionError> {
        let item = self
            .catalog
            .item(item_id)
            .cloned()
            .ok_or_else(|| ActionError::UnknownItem(item_id.to_string()))?;
        let placed = self
            .inventory
            .force_place(&item, x, y, &mut *self.rng.ids())?;
        self.notices.push(Notice::Placed {
            instance_id: placed.instance_id.clone(),
            item_id: placed.item.id,
            x,
            y,
        });
        Ok(placed.instance_id)
    }

    /// # Errors
    ///
    /// [`ActionError::UnknownInstance`], [`ActionError::OutOfBounds`] or [`ActionError::Overlap`].
    pub fn move_item(&mut self, id: &InstanceId, x: i32, y: i32) -> Result<(), ActionError> {
        self.inventory.move_item(id, x, y)?;
        self.notices.push(Notice::Moved {
            instance_id: id.clone(),
            x,
            y,
        });
        Ok(())
    }

    pub fn remove(&mut self, id: &InstanceId) -> Option<PlacedItem> {
        let removed = self.inventory.remove(id)?;
        self.notices.push(Notice::Removed {
            instance_id: removed.instance_id.clone(),
            item_id: removed.item.id.clone(),
        });
        Some(removed)
    }

    /// # Errors
    ///
    /// [`ActionError::UnknownInstance`] or [`ActionError::NotConsumable`].
    pub fn consume(&mut self, id: &InstanceId) -> Result<ConsumeOutcome, ActionError> {
        let Parts {
            mut ctx, notices, ..
        } = self.parts();
        let outcome = ctx.inventory.consume(id, &mut ctx.ledgers)?;
        notices.push(Notice::Consumed {
            instance_id: outcome.consumed.instance_id.clone(),
            item_id: outcome.consumed.item.id.clone(),
        });
        push_level_up(notices, outcome.level_change);
        Ok(outcome)
    }

    /// # Errors
    ///
    /// [`ActionError::UnknownInstance`], [`ActionError::SameInstance`],
    /// [`ActionError::NoRecipe`] or [`ActionError::NoRoomForOutput`].
    pub fn fuse(
        &mut self,
        source: &InstanceId,
        target: &InstanceId,
    ) -> Result<FusionOutcome, ActionError> {
        let Parts {
            mut ctx, notices, ..
        } = self.parts();
        let outcome = ctx.inventory.fuse(
            source,
            target,
            ctx.catalog,
            &mut ctx.ledgers,
            &mut *ctx.rng.ids(),
        )?;
        notices.push(Notice::Fused {
            instance_id: outcome.created.instance_id.clone(),
            output_id: outcome.created.item.id.clone(),
            xp: outcome.xp_awarded,
        });
        push_level_up(notices, outcome.level_change);
        Ok(outcome)
    }

    /// Resolve a drag release of `id` at `(x, y)`.
    ///
    /// Every other instance under the dropped footprint is tried as a fusion
    /// partner, in row-major cell order; the first success wins. Otherwise the
    /// item moves to the new origin.
    ///
    /// # Errors
    ///
    /// [`ActionError::UnknownInstance`], or the move failure when no fusion happened.
    pub fn drop_at(&mut self, id: &InstanceId, x: i32, y: i32) -> Result<DropOutcome, ActionError> {
        let dragged = self
            .inventory
            .get(id)
            .cloned()
            .ok_or_else(|| ActionError::UnknownInstance(id.clone()))?;

        let mut partners: Vec<InstanceId> = Vec::new();
        for pos in occupied_cells(&dragged.item, x, y) {
            if let Some(other) = self.inventory.grid().occupant(pos)
                && other != id
                && !partners.contains(other)
            {
                partners.push(other.clone());
            }
        }
        for partner in &partners {
            match self.fuse(id, partner) {
                Ok(outcome) => return Ok(DropOutcome::Fused(outcome)),
                Err(err) => log::debug!("drop fusion {id} + {partner} refused: {err}"),
            }
        }

        if dragged.origin() == (x, y) {
            return Ok(DropOutcome::Unchanged);
        }
        self.move_item(id, x, y)?;
        Ok(DropOutcome::Moved)
    }

    /// Switch grid mode, clearing all placements.
    pub fn set_mode(&mut self, mode: GridMode) {
        self.inventory.set_mode(mode);
    }

    /// Replace the grid contents, keeping placements that fit in list order.
    pub fn populate(&mut self, placements: Vec<PlacedItem>) -> RebuildReport {
        self.inventory.populate(placements, &mut *self.rng.ids())
    }

    /// # Errors
    ///
    /// [`ActionError::WrongPhase`] outside planning.
    pub fn start_day(&mut self) -> Result<(), ActionError> {
        self.cycle.start_day()?;
        self.notices.push(Notice::DayStarted {
            day: self.cycle.day_count,
        });
        Ok(())
    }

    /// Advance the simulated clock.
    pub fn tick(&mut self, delta_hours: f64) -> TickOutcome {
        let day = self.tuning.day;
        let Parts {
            mut ctx,
            cycle,
            notices,
        } = self.parts();
        let resolving_day = cycle.day_count;
        let outcome = cycle.tick(delta_hours, &day, &mut ctx);
        match &outcome {
            TickOutcome::Idle | TickOutcome::Advanced { spawned: None } => {}
            TickOutcome::Advanced {
                spawned: Some(spawned),
            } => notices.push(Notice::ParasiteSpawned {
                instance_id: spawned.placed.instance_id.clone(),
                parasite_id: spawned.placed.item.id.clone(),
                message_key: spawned.message_key,
            }),
            TickOutcome::Resolved(resolution) => {
                push_resolution(notices, resolving_day, resolution);
            }
        }
        outcome
    }

    /// Settle the day before the clock runs out.
    ///
    /// # Errors
    ///
    /// [`ActionError::WrongPhase`] unless the day is active.
    pub fn end_day(&mut self) -> Result<Resolution, ActionError> {
        let Parts {
            mut ctx,
            cycle,
            notices,
        } = self.parts();
        let resolving_day = cycle.day_count;
        let resolution = cycle.end_day(&mut ctx)?;
        push_resolution(notices, resolving_day, &resolution);
        Ok(resolution)
    }

    /// # Errors
    ///
    /// [`ActionError::WrongPhase`] unless the day was resolved.
    pub fn start_planning(&mut self) -> Result<(), ActionError> {
        self.cycle.start_planning(&self.tuning.day)
    }

    /// Reset every aggregate. The RNG keeps its seed and position.
    pub fn reset(&mut self) {
        let today = self.clock.today();
        self.inventory.reset();
        self.user.reset();
        self.budget.reset(today);
        self.activity.reset();
        self.cycle.reset(&self.tuning.day);
        self.notices.clear();
        log::info!("session reset");
    }
}

fn push_level_up(notices: &mut NoticeQueue, change: Option<LevelChange>) {
    if let Some(change) = change {
        log::info!("level up {} -> {}", change.from, change.to);
        notices.push(Notice::LevelUp(change));
    }
}

fn push_resolution(notices: &mut NoticeQueue, day: u32, resolution: &Resolution) {
    notices.push(Notice::DayResolved {
        day,
        settlement: resolution.settlement,
    });
    push_level_up(notices, resolution.level_change);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::day_cycle::DayPhase;
    use chrono::NaiveDate;

    fn session() -> (Session, Rc<FixedClock>) {
        let clock = Rc::new(FixedClock::new(NaiveDate::from_ymd_opt(2025, 9, 1).unwrap()));
        let session = Session::new(Catalog::builtin(), Tuning::default(), 99, clock.clone());
        (session, clock)
    }

    #[test]
    fn placement_outcomes_are_announced() {
        let (mut session, _) = session();
        let id = session.place("task-code", 1, 1).unwrap();
        assert_eq!(
            session.place("res-coffee", 1, 1),
            Err(ActionError::Overlap)
        );
        assert!(matches!(
            session.place("nope", 0, 0),
            Err(ActionError::UnknownItem(_))
        ));
        let notices = session.drain_notices();
        assert!(matches!(&notices[0], Notice::Placed { instance_id, .. } if *instance_id == id));
        assert!(matches!(
            &notices[1],
            Notice::PlacementRejected {
                reason: ActionError::Overlap,
                ..
            }
        ));
        assert_eq!(notices.len(), 3);
    }

    #[test]
    fn drop_onto_partner_fuses_and_elsewhere_moves() {
        let (mut session, _) = session();
        let coffee = session.place("res-coffee", 0, 0).unwrap();
        let focus = session.place("res-focus", 1, 0).unwrap();
        let chores = session.place("task-chores", 5, 5).unwrap();

        assert_eq!(session.drop_at(&chores, 4, 4), Ok(DropOutcome::Moved));
        assert_eq!(session.drop_at(&chores, 4, 4), Ok(DropOutcome::Unchanged));

        let DropOutcome::Fused(outcome) = session.drop_at(&coffee, 1, 0).unwrap() else {
            panic!("expected fusion");
        };
        assert_eq!(outcome.created.item.id, "buff-deepwork");
        assert!(session.inventory().get(&focus).is_none());
        assert_eq!(session.inventory().placed().len(), 2);
    }

    #[test]
    fn drop_without_recipe_reports_the_move_failure() {
        let (mut session, _) = session();
        let chores = session.place("task-chores", 0, 0).unwrap();
        session.place("task-meeting", 1, 0).unwrap();
        let before = session.inventory().clone();
        assert_eq!(session.drop_at(&chores, 1, 0), Err(ActionError::Overlap));
        assert_eq!(session.inventory(), &before);
    }

    #[test]
    fn full_day_round_trip_emits_notices() {
        let (mut session, clock) = session();
        session.place("task-study", 0, 0).unwrap();
        session.place("res-coffee", 5, 0).unwrap();
        session.start_day().unwrap();
        let mut resolved = None;
        for _ in 0..40 {
            if let TickOutcome::Resolved(resolution) = session.tick(0.5) {
                resolved = Some(resolution);
                break;
            }
        }
        let resolution = resolved.expect("day resolves before the loop ends");
        assert_eq!(session.day_cycle().phase, DayPhase::Resolved);
        assert!(session.user().xp >= resolution.settlement.xp_gained);
        let notices = session.drain_notices();
        assert!(notices.iter().any(|n| matches!(n, Notice::DayStarted { day: 1 })));
        assert!(notices.iter().any(|n| matches!(n, Notice::DayResolved { day: 1, .. })));

        session.start_planning().unwrap();
        assert_eq!(session.remaining_budget(ItemKind::Resource), Some(4));
        clock.advance_days(1);
        assert_eq!(session.remaining_budget(ItemKind::Resource), Some(5));
        assert_eq!(session.day_cycle().day_count, 2);
    }

    #[test]
    fn reset_clears_everything() {
        let (mut session, _) = session();
        session.place("res-coffee", 0, 0).unwrap();
        session.start_day().unwrap();
        session.end_day().unwrap();
        session.reset();
        assert!(session.inventory().placed().is_empty());
        assert_eq!(session.user(), &UserStats::default());
        assert_eq!(session.day_cycle(), &DayCycle::new(&Tuning::default().day));
        assert!(session.activity().history().is_empty());
        assert_eq!(session.remaining_budget(ItemKind::Resource), Some(5));
        assert!(session.drain_notices().is_empty());
    }
}
