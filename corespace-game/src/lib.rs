//! Corespace Inventory Engine
//!
//! Platform-agnostic core logic for Corespace, a grid-inventory productivity game.
//! Tasks, resources and buffs are placed on a day or week grid, fused into new
//! items, consumed for stat effects and settled at the end of each day.
//! This crate has no UI or platform-specific dependencies.

pub mod activity;
pub mod aura;
pub mod budget;
pub mod catalog;
pub mod clock;
pub mod constants;
pub mod day_cycle;
pub mod error;
pub mod fusion;
pub mod grid;
pub mod inventory;
pub mod notice;
pub mod numbers;
pub mod parasite;
pub mod progression;
pub mod rng;
pub mod session;
pub mod snapshot;
pub mod tuning;
pub mod user;

pub use activity::{ActivityLog, DailyRecord};
pub use aura::{are_adjacent, aura_multiplier};
pub use budget::DailyBudget;
pub use catalog::{Catalog, CatalogError, Item, ItemEffect, ItemKind, Rarity};
pub use clock::{Clock, FixedClock, SystemClock};
pub use day_cycle::{DayCycle, DayPhase, Resolution, Settlement, TickOutcome, settle};
pub use error::ActionError;
pub use fusion::{can_fuse, find_recipe, fusion_key};
pub use grid::{
    CellPos, Grid, GridMode, GridShapeError, GridTransaction, InstanceId, can_place,
    create_empty_grid, find_empty_position, occupied_cells, place_item, remove_item,
};
pub use inventory::{
    ConsumeOutcome, FusionOutcome, Inventory, PlacedItem, RebuildReport, can_consume,
    consumption_effect,
};
pub use notice::{Notice, NoticeQueue, Tone};
pub use parasite::{SpawnProposal, check_parasite_spawn};
pub use progression::{LevelRange, LevelTable};
pub use rng::{RngBundle, RngState};
pub use session::{DropOutcome, Session};
pub use snapshot::{PlacementRecord, RehydrateReport, Snapshot};
pub use tuning::{Tuning, TuningError};
pub use user::{LevelChange, UserStats};

use std::convert::Infallible;
use std::rc::Rc;
use std::sync::Arc;

/// Trait for abstracting catalog and tuning loading
/// Platform-specific implementations should provide this
pub trait CatalogLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the item catalog and its recipes
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded or fails validation.
    fn load_catalog(&self) -> Result<Arc<Catalog>, Self::Error>;

    /// Load gameplay tuning
    ///
    /// # Errors
    ///
    /// Returns an error if the tuning cannot be loaded or fails validation.
    fn load_tuning(&self) -> Result<Tuning, Self::Error>;
}

/// Loader serving the catalog and tuning embedded in the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinLoader;

impl CatalogLoader for BuiltinLoader {
    type Error = Infallible;

    fn load_catalog(&self) -> Result<Arc<Catalog>, Self::Error> {
        Ok(Catalog::builtin())
    }

    fn load_tuning(&self) -> Result<Tuning, Self::Error> {
        Ok(Tuning::builtin().clone())
    }
}

/// Trait for abstracting snapshot persistence
/// Platform-specific implementations should provide this
pub trait SnapshotStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Save a snapshot under `slot`, replacing any previous one
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be saved.
    fn save_snapshot(&self, slot: &str, snapshot: &Snapshot) -> Result<(), Self::Error>;

    /// Load the snapshot stored under `slot`
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot exists but cannot be read.
    fn load_snapshot(&self, slot: &str) -> Result<Option<Snapshot>, Self::Error>;

    /// Delete the snapshot stored under `slot`
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be deleted.
    fn delete_snapshot(&self, slot: &str) -> Result<(), Self::Error>;
}

/// Main engine for creating, saving and restoring sessions
pub struct GameEngine<L, S>
where
    L: CatalogLoader,
    S: SnapshotStorage,
{
    loader: L,
    storage: S,
}

impl<L, S> GameEngine<L, S>
where
    L: CatalogLoader,
    S: SnapshotStorage,
{
    /// Create a new engine with the provided loader and storage
    pub const fn new(loader: L, storage: S) -> Self {
        Self { loader, storage }
    }

    /// Start a fresh session with the given seed.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog or tuning cannot be loaded.
    pub fn create_session(&self, seed: u64, clock: Rc<dyn Clock>) -> Result<Session, L::Error> {
        let catalog = self.loader.load_catalog()?;
        let tuning = self.loader.load_tuning()?;
        Ok(Session::new(catalog, tuning, seed, clock))
    }

    /// Save a session snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be saved.
    pub fn save(&self, slot: &str, session: &Session) -> Result<(), S::Error> {
        self.storage.save_snapshot(slot, &Snapshot::capture(session))
    }

    /// Load and repair a saved session
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot, catalog or tuning cannot be loaded.
    pub fn load(
        &self,
        slot: &str,
        clock: Rc<dyn Clock>,
    ) -> Result<Option<(Session, RehydrateReport)>, anyhow::Error>
    where
        L::Error: Into<anyhow::Error>,
        S::Error: Into<anyhow::Error>,
    {
        let Some(snapshot) = self.storage.load_snapshot(slot).map_err(Into::into)? else {
            return Ok(None);
        };
        // Rehydrate against the current catalog
        let catalog = self.loader.load_catalog().map_err(Into::into)?;
        let tuning = self.loader.load_tuning().map_err(Into::into)?;
        let (session, report) = snapshot.rehydrate(catalog, tuning, clock);
        if !report.is_clean() {
            log::info!(
                "slot {slot}: {} placements dropped, {} ids reassigned",
                report.dropped.len(),
                report.reassigned_ids.len()
            );
        }
        Ok(Some((session, report)))
    }

    /// Delete a saved session
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be deleted.
    pub fn delete(&self, slot: &str) -> Result<(), S::Error> {
        self.storage.delete_snapshot(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Clone, Default)]
    struct MemoryStorage {
        saves: Rc<RefCell<HashMap<String, Snapshot>>>,
    }

    impl SnapshotStorage for MemoryStorage {
        type Error = Infallible;

        fn save_snapshot(&self, slot: &str, snapshot: &Snapshot) -> Result<(), Self::Error> {
            self.saves
                .borrow_mut()
                .insert(slot.to_string(), snapshot.clone());
            Ok(())
        }

        fn load_snapshot(&self, slot: &str) -> Result<Option<Snapshot>, Self::Error> {
            Ok(self.saves.borrow().get(slot).cloned())
        }

        fn delete_snapshot(&self, slot: &str) -> Result<(), Self::Error> {
            self.saves.borrow_mut().remove(slot);
            Ok(())
        }
    }

    fn clock() -> Rc<dyn Clock> {
        Rc::new(FixedClock::new(
            NaiveDate::from_ymd_opt(2025, 6, 2).expect("valid date"),
        ))
    }

    #[test]
    fn engine_creates_and_roundtrips_sessions() {
        let engine = GameEngine::new(BuiltinLoader, MemoryStorage::default());
        let mut session = engine.create_session(0xABCD, clock()).unwrap();
        let code = session.place("task-code", 1, 1).unwrap();
        session.place("res-focus", 4, 0).unwrap();
        engine.save("slot-one", &session).unwrap();

        let (loaded, report) = engine
            .load("slot-one", clock())
            .unwrap()
            .expect("save exists");
        assert!(report.is_clean());
        assert_eq!(loaded.inventory().placed().len(), 2);
        assert_eq!(loaded.inventory().get(&code).map(PlacedItem::origin), Some((1, 1)));
        assert_eq!(loaded.user().energy, session.user().energy);
        assert!(engine.load("missing-slot", clock()).unwrap().is_none());
    }

    #[test]
    fn deleted_slots_are_gone() {
        let engine = GameEngine::new(BuiltinLoader, MemoryStorage::default());
        let session = engine.create_session(1, clock()).unwrap();
        engine.save("slot", &session).unwrap();
        engine.delete("slot").unwrap();
        assert!(engine.load("slot", clock()).unwrap().is_none());
    }
}
