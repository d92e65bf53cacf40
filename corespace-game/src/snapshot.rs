//! Persistable session state and the load-time repair pass.
//!
//! A snapshot is plain data. Loading never trusts the persisted grid: the grid
//! is rebuilt from the placement list against the current catalog, and anything
//! that no longer fits is dropped.

use serde::{Deserialize, Deserializer, Serialize};
use std::rc::Rc;
use std::sync::Arc;

use crate::activity::ActivityLog;
use crate::budget::DailyBudget;
use crate::catalog::Catalog;
use crate::clock::Clock;
use crate::day_cycle::DayCycle;
use crate::grid::{Grid, GridMode, InstanceId};
use crate::inventory::{Inventory, PlacedItem};
use crate::progression::LevelTable;
use crate::rng::{RngBundle, RngState};
use crate::session::Session;
use crate::tuning::Tuning;
use crate::user::UserStats;

pub const SNAPSHOT_VERSION: u32 = 1;

/// One persisted placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPlacement")]
pub struct PlacementRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<InstanceId>,
    pub item_id: Option<String>,
    pub x: i32,
    pub y: i32,
}

/// Accepts both the flat layout and the older nested `item: { id }` layout.
#[derive(Deserialize)]
struct RawPlacement {
    #[serde(default, alias = "instanceId")]
    instance_id: Option<String>,
    #[serde(default, alias = "itemId")]
    item_id: Option<String>,
    #[serde(default)]
    item: Option<LegacyItemRef>,
    #[serde(default)]
    x: i32,
    #[serde(default)]
    y: i32,
}

#[derive(Deserialize)]
struct LegacyItemRef {
    id: String,
}

impl From<RawPlacement> for PlacementRecord {
    fn from(raw: RawPlacement) -> Self {
        Self {
            instance_id: raw
                .instance_id
                .map(|id| InstanceId::new(&id))
                .filter(|id| !id.is_empty()),
            item_id: raw.item_id.or(raw.item.map(|item| item.id)),
            x: raw.x,
            y: raw.y,
        }
    }
}

impl From<&PlacedItem> for PlacementRecord {
    fn from(placed: &PlacedItem) -> Self {
        Self {
            instance_id: Some(placed.instance_id.clone()),
            item_id: Some(placed.item.id.clone()),
            x: placed.x,
            y: placed.y,
        }
    }
}

/// Structural copy of a session. Every field is optional on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Snapshot {
    pub version: u32,
    pub mode: GridMode,
    pub placements: Vec<PlacementRecord>,
    /// Written for external inspection; ignored on load.
    #[serde(deserialize_with = "lenient_grid", skip_serializing_if = "Option::is_none")]
    pub grid: Option<Grid>,
    pub user: UserStats,
    pub budget: DailyBudget,
    pub activity: ActivityLog,
    pub day: DayCycle,
    pub rng: RngState,
    pub catalog_fingerprint: Option<u64>,
}

fn lenient_grid<'de, D>(deserializer: D) -> Result<Option<Grid>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// What the repair pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RehydrateReport {
    /// Placements excluded: unknown item, missing item id, or no longer fitting.
    pub dropped: Vec<PlacementRecord>,
    /// `(persisted, assigned)` ids; persisted is empty when none was stored.
    pub reassigned_ids: Vec<(InstanceId, InstanceId)>,
    /// The snapshot was written against a different catalog.
    pub catalog_changed: bool,
    /// A persisted RNG position was implausible and its stream was reseeded.
    pub rng_reset: bool,
}

impl RehydrateReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty()
            && self.reassigned_ids.is_empty()
            && !self.catalog_changed
            && !self.rng_reset
    }
}

impl Snapshot {
    /// Capture the persistable state of a session.
    #[must_use]
    pub fn capture(session: &Session) -> Self {
        let inventory = session.inventory();
        Self {
            version: SNAPSHOT_VERSION,
            mode: inventory.mode(),
            placements: inventory.placed().iter().map(PlacementRecord::from).collect(),
            grid: Some(inventory.grid().clone()),
            user: session.user().clone(),
            budget: session.budget().clone(),
            activity: session.activity().clone(),
            day: session.day_cycle().clone(),
            rng: session.rng().state(),
            catalog_fingerprint: Some(session.catalog().fingerprint()),
        }
    }

    /// # Errors
    ///
    /// Returns an error when the document is not valid JSON for a snapshot.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Validate and repair the snapshot into a clean session.
    #[must_use]
    pub fn rehydrate(
        self,
        catalog: Arc<Catalog>,
        tuning: Tuning,
        clock: Rc<dyn Clock>,
    ) -> (Session, RehydrateReport) {
        let mut report = RehydrateReport {
            catalog_changed: self
                .catalog_fingerprint
                .is_some_and(|fingerprint| fingerprint != catalog.fingerprint()),
            ..RehydrateReport::default()
        };
        if report.catalog_changed {
            log::warn!("snapshot was saved against a different catalog");
        }

        let (rng, rng_reset) = RngBundle::restore(self.rng);
        report.rng_reset = rng_reset;
        let mut candidates = Vec::with_capacity(self.placements.len());
        for record in self.placements {
            let item = record.item_id.as_deref().and_then(|id| catalog.item(id));
            let Some(item) = item else {
                log::warn!("dropping placement with unknown item {:?}", record.item_id);
                report.dropped.push(record);
                continue;
            };
            candidates.push(PlacedItem {
                instance_id: record.instance_id.unwrap_or_else(|| InstanceId::new("")),
                item: item.clone(),
                x: record.x,
                y: record.y,
            });
        }
        let (inventory, rebuilt) = Inventory::rebuild(self.mode, candidates, &mut *rng.ids());
        report
            .dropped
            .extend(rebuilt.dropped.iter().map(PlacementRecord::from));
        report.reassigned_ids = rebuilt.reassigned;

        let levels = LevelTable::from_tuning(&tuning.levels);
        let mut user = self.user;
        user.normalize(&levels);
        let mut activity = self.activity;
        activity.normalize();
        let mut day = self.day;
        day.normalize(&tuning.day);
        let mut budget: DailyBudget = self.budget;
        budget.rollover(clock.today());

        log::debug!(
            "rehydrated {} placements ({} dropped, {} renamed)",
            inventory.placed().len(),
            report.dropped.len(),
            report.reassigned_ids.len()
        );
        let session = Session::from_parts(
            catalog, tuning, inventory, user, budget, activity, day, rng, clock,
        );
        (session, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::NaiveDate;

    fn clock() -> Rc<dyn Clock> {
        Rc::new(FixedClock::new(NaiveDate::from_ymd_opt(2025, 4, 9).unwrap()))
    }

    fn load(json: &str) -> (Session, RehydrateReport) {
        Snapshot::from_json(json)
            .unwrap()
            .rehydrate(Catalog::builtin(), Tuning::default(), clock())
    }

    #[test]
    fn empty_document_yields_a_fresh_session() {
        let (session, report) = load("{}");
        assert!(report.is_clean());
        assert!(session.inventory().placed().is_empty());
        assert_eq!(session.user(), &UserStats::default());
        assert_eq!(session.inventory().mode(), GridMode::Day);
    }

    #[test]
    fn legacy_placements_are_accepted_and_healed() {
        let json = r#"{
            "mode": "day",
            "grid": [[{"occupied": true, "itemId": "res-coffee"}]],
            "placements": [
                { "item": { "id": "task-code", "name": "Code" }, "x": 0, "y": 0 },
                { "instanceId": "inst-keep", "itemId": "res-coffee", "x": 1, "y": 1 },
                { "instance_id": "inst-gone", "item_id": "retired-item", "x": 4, "y": 4 },
                { "instance_id": "inst-edge", "item_id": "task-code", "x": 7, "y": 5 },
                { "x": 3, "y": 3 }
            ],
            "user": { "xp": 300, "level": 1, "energy": 250 }
        }"#;
        let (session, report) = load(json);
        let placed = session.inventory().placed();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].item.id, "task-code");
        assert!(placed[0].instance_id.as_str().starts_with("inst-"));
        assert_eq!(report.dropped.len(), 4);
        assert_eq!(report.reassigned_ids.len(), 1);
        assert!(session.inventory().is_consistent());
        assert_eq!(session.user().level, 3);
        assert_eq!(session.user().energy, 100);
    }

    #[test]
    fn capture_then_rehydrate_preserves_state() {
        let mut session = Session::new(Catalog::builtin(), Tuning::default(), 5, clock());
        session.place("task-study", 0, 0).unwrap();
        let coffee = session.place("res-coffee", 3, 0).unwrap();
        session.consume(&coffee).unwrap();
        session.place("buff-flow", 2, 1).unwrap();
        session.start_day().unwrap();
        session.tick(2.0);

        let json = Snapshot::capture(&session).to_json().unwrap();
        let (restored, report) = load(&json);
        assert!(report.is_clean());
        assert_eq!(restored.inventory(), session.inventory());
        assert_eq!(restored.user(), session.user());
        assert_eq!(restored.day_cycle(), session.day_cycle());
        assert_eq!(restored.rng().state(), session.rng().state());
        assert_eq!(restored.activity(), session.activity());
    }

    #[test]
    fn catalog_change_is_flagged() {
        let mut snapshot = Snapshot::capture(&Session::new(
            Catalog::builtin(),
            Tuning::default(),
            1,
            clock(),
        ));
        snapshot.catalog_fingerprint = Some(snapshot.catalog_fingerprint.unwrap_or(0) ^ 1);
        let (_, report) = snapshot.rehydrate(Catalog::builtin(), Tuning::default(), clock());
        assert!(report.catalog_changed);
    }

    #[test]
    fn malformed_grid_is_discarded_on_parse() {
        let snapshot =
            Snapshot::from_json(r#"{"grid":{"cols":8,"rows":6,"cells":[]}}"#).unwrap();
        assert!(snapshot.grid.is_none());

        let (session, report) = load(r#"{"grid":{"cols":8,"rows":6,"cells":[]}}"#);
        assert!(report.is_clean());
        assert!(session.inventory().is_consistent());
    }

    #[test]
    fn captured_grid_parses_back() {
        let session = Session::new(Catalog::builtin(), Tuning::default(), 2, clock());
        let json = Snapshot::capture(&session).to_json().unwrap();
        let parsed = Snapshot::from_json(&json).unwrap();
        assert_eq!(parsed.grid.as_ref(), Some(session.inventory().grid()));
    }
}
