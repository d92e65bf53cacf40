//! Authoritative grid plus placed-item list for the active mode.
//!
//! Every mutator validates first and commits only on success; an `Err` always
//! means the grid and the placed-item list are exactly as they were.

use chrono::NaiveDate;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::activity::ActivityLog;
use crate::budget::DailyBudget;
use crate::catalog::{Catalog, Item, ItemEffect, ItemKind};
use crate::constants::{INSTANCE_ID_MAX_ATTEMPTS, INSTANCE_ID_PREFIX};
use crate::error::ActionError;
use crate::fusion::can_fuse;
use crate::grid::{
    Footprint, Grid, GridMode, GridTransaction, InstanceId, occupied_cells, place_item, remove_item,
};
use crate::progression::LevelTable;
use crate::tuning::Tuning;
use crate::user::{LevelChange, UserStats};

/// One physical placement of a catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedItem {
    pub instance_id: InstanceId,
    pub item: Item,
    pub x: i32,
    pub y: i32,
}

impl PlacedItem {
    /// Cells covered at the current origin.
    #[must_use]
    pub fn footprint(&self) -> Footprint {
        occupied_cells(&self.item, self.x, self.y)
    }

    #[must_use]
    pub const fn origin(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}

/// Resources and buffs can be consumed; tasks and parasites cannot.
#[must_use]
pub const fn can_consume(item: &Item) -> bool {
    matches!(item.kind, ItemKind::Resource | ItemKind::Buff)
}

/// Effect applied to the user when `item` is consumed.
#[must_use]
pub fn consumption_effect(item: &Item) -> Option<&ItemEffect> {
    can_consume(item).then_some(&item.effect)
}

/// Aggregates that gated inventory operations read and update.
#[derive(Debug)]
pub struct Ledgers<'a> {
    pub user: &'a mut UserStats,
    pub budget: &'a mut DailyBudget,
    pub activity: &'a mut ActivityLog,
    pub levels: &'a LevelTable,
    pub tuning: &'a Tuning,
    pub today: NaiveDate,
}

/// Result of a successful consumption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumeOutcome {
    pub consumed: PlacedItem,
    pub level_change: Option<LevelChange>,
}

/// Result of a successful fusion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusionOutcome {
    pub source: PlacedItem,
    pub target: PlacedItem,
    pub created: PlacedItem,
    pub xp_awarded: u32,
    pub level_change: Option<LevelChange>,
}

/// What a bulk rebuild kept, dropped and renamed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub kept: usize,
    pub dropped: Vec<PlacedItem>,
    pub reassigned: Vec<(InstanceId, InstanceId)>,
}

/// Grid and placements for one mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    mode: GridMode,
    grid: Grid,
    placed: Vec<PlacedItem>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new(GridMode::default())
    }
}

impl Inventory {
    #[must_use]
    pub fn new(mode: GridMode) -> Self {
        Self {
            mode,
            grid: Grid::empty(mode),
            placed: Vec::new(),
        }
    }

    #[must_use]
    pub const fn mode(&self) -> GridMode {
        self.mode
    }

    #[must_use]
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Placements in insertion order.
    #[must_use]
    pub fn placed(&self) -> &[PlacedItem] {
        &self.placed
    }

    #[must_use]
    pub fn get(&self, id: &InstanceId) -> Option<&PlacedItem> {
        self.placed.iter().find(|placed| &placed.instance_id == id)
    }

    #[must_use]
    pub fn count_of(&self, kind: ItemKind) -> usize {
        self.placed
            .iter()
            .filter(|placed| placed.item.kind == kind)
            .count()
    }

    #[must_use]
    pub fn parasite_count(&self) -> usize {
        self.count_of(ItemKind::Parasite)
    }

    /// Switch grid dimensions. Placements are cleared.
    pub fn set_mode(&mut self, mode: GridMode) {
        log::debug!("grid mode {} -> {mode}", self.mode);
        *self = Self::new(mode);
    }

    /// Empty the grid, keeping the current mode.
    pub fn reset(&mut self) {
        *self = Self::new(self.mode);
    }

    /// Fresh instance id that no live placement uses.
    pub fn next_instance_id<R>(&self, rng: &mut R) -> InstanceId
    where
        R: RngCore + ?Sized,
    {
        let taken: HashSet<&InstanceId> = self.placed.iter().map(|p| &p.instance_id).collect();
        fresh_id(&taken, rng)
    }

    /// Place a catalog item, gated by energy and the daily budget.
    ///
    /// On success the energy cost is deducted and the budget spent.
    ///
    /// # Errors
    ///
    /// [`ActionError::InsufficientEnergy`], [`ActionError::BudgetExhausted`],
    /// [`ActionError::OutOfBounds`] or [`ActionError::Overlap`].
    pub fn place<R>(
        &mut self,
        item: &Item,
        x: i32,
        y: i32,
        ledgers: &mut Ledgers<'_>,
        ids: &mut R,
    ) -> Result<PlacedItem, ActionError>
    where
        R: RngCore + ?Sized,
    {
        let cost = item.placement_cost();
        if cost > 0 && ledgers.user.energy < cost {
            return Err(ActionError::InsufficientEnergy {
                required: cost,
                available: ledgers.user.energy,
            });
        }
        if !ledgers
            .budget
            .can_spend(item.kind, ledgers.today, &ledgers.tuning.budget)
        {
            return Err(ActionError::BudgetExhausted { kind: item.kind });
        }

        let placed = self.force_place(item, x, y, ids)?;
        if cost > 0 {
            ledgers.user.modify_energy(-cost);
        }
        ledgers.budget.spend(item.kind, &item.id, ledgers.today);
        Ok(placed)
    }

    /// Place without energy or budget gates. Fit is still enforced.
    ///
    /// # Errors
    ///
    /// [`ActionError::OutOfBounds`] or [`ActionError::Overlap`].
    pub fn force_place<R>(
        &mut self,
        item: &Item,
        x: i32,
        y: i32,
        ids: &mut R,
    ) -> Result<PlacedItem, ActionError>
    where
        R: RngCore + ?Sized,
    {
        if let Some(err) = self.grid.fit_error(item, x, y) {
            log::debug!("rejected {} at ({x},{y}): {err:?}", item.id);
            return Err(err.into());
        }
        let instance_id = self.next_instance_id(ids);
        let mut txn = GridTransaction::begin(&mut self.grid);
        txn.try_place(item, x, y, &instance_id)?;
        txn.commit();

        let placed = PlacedItem {
            instance_id,
            item: item.clone(),
            x,
            y,
        };
        log::debug!("placed {} as {} at ({x},{y})", item.id, placed.instance_id);
        self.placed.push(placed.clone());
        Ok(placed)
    }

    /// Move an instance to a new origin. The item stays put when the target does not fit.
    ///
    /// # Errors
    ///
    /// [`ActionError::UnknownInstance`], [`ActionError::OutOfBounds`] or [`ActionError::Overlap`].
    pub fn move_item(&mut self, id: &InstanceId, x: i32, y: i32) -> Result<(), ActionError> {
        let pos = self.position_of(id)?;
        let item = self.placed[pos].item.clone();

        let mut txn = GridTransaction::begin(&mut self.grid);
        txn.remove(id);
        txn.try_place(&item, x, y, id)?;
        txn.commit();

        let placed = &mut self.placed[pos];
        log::debug!(
            "moved {id} from ({},{}) to ({x},{y})",
            placed.x,
            placed.y
        );
        placed.x = x;
        placed.y = y;
        Ok(())
    }

    /// Remove an instance from the grid and the list. Unknown ids are ignored.
    pub fn remove(&mut self, id: &InstanceId) -> Option<PlacedItem> {
        let pos = self.position_of(id).ok()?;
        remove_item(&mut self.grid, id);
        let removed = self.placed.remove(pos);
        log::debug!("removed {} ({})", removed.instance_id, removed.item.id);
        Some(removed)
    }

    /// Apply a resource or buff to the user, then remove it.
    ///
    /// # Errors
    ///
    /// [`ActionError::UnknownInstance`] or [`ActionError::NotConsumable`].
    pub fn consume(
        &mut self,
        id: &InstanceId,
        ledgers: &mut Ledgers<'_>,
    ) -> Result<ConsumeOutcome, ActionError> {
        let pos = self.position_of(id)?;
        let kind = self.placed[pos].item.kind;
        if !can_consume(&self.placed[pos].item) {
            return Err(ActionError::NotConsumable { kind });
        }

        let level_change = consumption_effect(&self.placed[pos].item)
            .and_then(|effect| ledgers.user.apply_effect(effect, ledgers.levels));
        let consumed = self
            .remove(id)
            .ok_or_else(|| ActionError::UnknownInstance(id.clone()))?;
        ledgers.activity.track_consume(ledgers.today);
        if let Some(xp) = consumed.item.effect.xp {
            ledgers.activity.track_xp(ledgers.today, xp);
        }
        Ok(ConsumeOutcome {
            consumed,
            level_change,
        })
    }

    /// Fuse two placed instances into the recipe output.
    ///
    /// The output lands at the target's origin, or the source's when that does
    /// not fit. Nothing changes unless one of the two origins admits it.
    ///
    /// # Errors
    ///
    /// [`ActionError::UnknownInstance`], [`ActionError::SameInstance`],
    /// [`ActionError::NoRecipe`] or [`ActionError::NoRoomForOutput`].
    pub fn fuse<R>(
        &mut self,
        source_id: &InstanceId,
        target_id: &InstanceId,
        catalog: &Catalog,
        ledgers: &mut Ledgers<'_>,
        ids: &mut R,
    ) -> Result<FusionOutcome, ActionError>
    where
        R: RngCore + ?Sized,
    {
        let source_pos = self.position_of(source_id)?;
        let target_pos = self.position_of(target_id)?;
        let output = can_fuse(catalog, &self.placed[source_pos], &self.placed[target_pos])?.clone();
        let target_origin = self.placed[target_pos].origin();
        let source_origin = self.placed[source_pos].origin();

        let mut txn = GridTransaction::begin(&mut self.grid);
        txn.remove(source_id);
        txn.remove(target_id);
        let origin = [target_origin, source_origin]
            .into_iter()
            .find(|&(x, y)| txn.fit_error(&output, x, y).is_none())
            .ok_or_else(|| ActionError::NoRoomForOutput {
                output: output.id.clone(),
            })?;
        let taken: HashSet<&InstanceId> = self.placed.iter().map(|p| &p.instance_id).collect();
        let created_id = fresh_id(&taken, ids);
        txn.try_place(&output, origin.0, origin.1, &created_id)?;
        txn.commit();

        let source = self.placed[source_pos].clone();
        let target = self.placed[target_pos].clone();
        self.placed
            .retain(|placed| &placed.instance_id != source_id && &placed.instance_id != target_id);
        let created = PlacedItem {
            instance_id: created_id,
            item: output,
            x: origin.0,
            y: origin.1,
        };
        self.placed.push(created.clone());

        let xp_awarded = ledgers.tuning.rewards.fusion_xp;
        let level_change = ledgers.user.add_xp(xp_awarded, ledgers.levels);
        ledgers.activity.track_fusion(ledgers.today);
        ledgers.activity.track_xp(ledgers.today, xp_awarded);
        log::debug!(
            "fused {} + {} into {} at ({},{})",
            source.item.id,
            target.item.id,
            created.item.id,
            created.x,
            created.y
        );
        Ok(FusionOutcome {
            source,
            target,
            created,
            xp_awarded,
            level_change,
        })
    }

    /// Replace the contents with `placements`, kept in list order while they fit.
    ///
    /// Empty or duplicate instance ids are replaced with fresh ones.
    pub fn populate<R>(&mut self, placements: Vec<PlacedItem>, ids: &mut R) -> RebuildReport
    where
        R: RngCore + ?Sized,
    {
        let (inventory, report) = Self::rebuild(self.mode, placements, ids);
        *self = inventory;
        report
    }

    /// Build an inventory from scratch, dropping placements that no longer fit.
    pub fn rebuild<R>(mode: GridMode, placements: Vec<PlacedItem>, ids: &mut R) -> (Self, RebuildReport)
    where
        R: RngCore + ?Sized,
    {
        let mut inventory = Self::new(mode);
        let mut report = RebuildReport::default();
        let mut seen: HashSet<InstanceId> = HashSet::new();

        for mut placed in placements {
            if let Some(err) = inventory.grid.fit_error(&placed.item, placed.x, placed.y) {
                log::warn!(
                    "dropping {} ({}) at ({},{}): {err:?}",
                    placed.instance_id,
                    placed.item.id,
                    placed.x,
                    placed.y
                );
                report.dropped.push(placed);
                continue;
            }
            if placed.instance_id.is_empty() || seen.contains(&placed.instance_id) {
                let taken: HashSet<&InstanceId> = seen.iter().collect();
                let fresh = fresh_id(&taken, ids);
                log::warn!("reassigning instance id {:?} -> {fresh}", placed.instance_id.as_str());
                report
                    .reassigned
                    .push((placed.instance_id.clone(), fresh.clone()));
                placed.instance_id = fresh;
            }
            place_item(
                &mut inventory.grid,
                &placed.item,
                placed.x,
                placed.y,
                &placed.instance_id,
            );
            seen.insert(placed.instance_id.clone());
            inventory.placed.push(placed);
        }
        report.kept = inventory.placed.len();
        (inventory, report)
    }

    /// Whether every grid cell agrees with the placed-item list.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let mut expected = Grid::with_size(self.grid.cols(), self.grid.rows());
        for placed in &self.placed {
            if expected.fit_error(&placed.item, placed.x, placed.y).is_some() {
                return false;
            }
            place_item(
                &mut expected,
                &placed.item,
                placed.x,
                placed.y,
                &placed.instance_id,
            );
        }
        expected == self.grid
    }

    fn position_of(&self, id: &InstanceId) -> Result<usize, ActionError> {
        self.placed
            .iter()
            .position(|placed| &placed.instance_id == id)
            .ok_or_else(|| ActionError::UnknownInstance(id.clone()))
    }
}

fn fresh_id<R>(taken: &HashSet<&InstanceId>, rng: &mut R) -> InstanceId
where
    R: RngCore + ?Sized,
{
    let mut candidate = InstanceId::new("");
    for _ in 0..INSTANCE_ID_MAX_ATTEMPTS {
        candidate = InstanceId(format!("{INSTANCE_ID_PREFIX}{:016x}", rng.next_u64()));
        if !taken.contains(&candidate) {
            return candidate;
        }
    }
    // Degenerate generator: disambiguate deterministically.
    (1u64..)
        .map(|n| InstanceId(format!("{candidate}-{n}")))
        .find(|id| !taken.contains(id))
        .unwrap_or(candidate)
}
