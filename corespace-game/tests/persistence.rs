use chrono::NaiveDate;
use corespace_game::catalog::CatalogData;
use corespace_game::{Catalog, Clock, FixedClock, GridMode, Session, Snapshot, Tuning};
use std::rc::Rc;
use std::sync::Arc;

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

fn clock() -> Rc<dyn Clock> {
    Rc::new(FixedClock::new(
        NaiveDate::from_ymd_opt(2025, 11, 3).expect("valid date"),
    ))
}

fn catalog_with_wider(item_id: &str, width: u8) -> Arc<Catalog> {
    let mut data: CatalogData = serde_json::from_str(BUILTIN_CATALOG).unwrap();
    let item = data
        .items
        .iter_mut()
        .find(|item| item.id == item_id)
        .expect("item present");
    item.width = width;
    Arc::new(Catalog::from_data(data).unwrap())
}

#[test]
fn fingerprint_is_stable_and_tracks_footprints() {
    let a = Catalog::from_json(BUILTIN_CATALOG).unwrap();
    let b = Catalog::from_json(BUILTIN_CATALOG).unwrap();
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_eq!(a.fingerprint(), Catalog::builtin().fingerprint());
    assert_ne!(
        a.fingerprint(),
        catalog_with_wider("task-code", 3).fingerprint()
    );
}

#[test]
fn rehydrate_drops_placements_that_no_longer_fit() {
    let mut session = Session::new(Catalog::builtin(), Tuning::default(), 8, clock());
    let code = session.place("task-code", 0, 0).unwrap();
    let coffee = session.place("res-coffee", 2, 0).unwrap();
    let snapshot = Snapshot::capture(&session);

    let (restored, report) =
        snapshot.rehydrate(catalog_with_wider("task-code", 3), Tuning::default(), clock());
    assert!(report.catalog_changed);
    assert_eq!(report.dropped.len(), 1);
    assert_eq!(report.dropped[0].instance_id.as_ref(), Some(&coffee));
    assert!(restored.inventory().get(&code).is_some());
    assert!(restored.inventory().get(&coffee).is_none());
    assert!(restored.inventory().is_consistent());
    assert_eq!(restored.inventory().grid().occupied_count(), 6);
}

#[test]
fn rehydrated_rng_continues_where_it_left_off() {
    let mut original = Session::new(Catalog::builtin(), Tuning::default(), 77, clock());
    original.place("task-study", 0, 0).unwrap();
    original.start_day().unwrap();
    original.tick(3.0);

    let json = Snapshot::capture(&original).to_json().unwrap();
    let (mut restored, report) = Snapshot::from_json(&json)
        .unwrap()
        .rehydrate(Catalog::builtin(), Tuning::default(), clock());
    assert!(report.is_clean());

    let next_original = original.place("res-coffee", 6, 5).unwrap();
    let next_restored = restored.place("res-coffee", 6, 5).unwrap();
    assert_eq!(next_original, next_restored);

    for _ in 0..8 {
        original.tick(1.0);
        restored.tick(1.0);
    }
    assert_eq!(original.inventory(), restored.inventory());
    assert_eq!(original.day_cycle(), restored.day_cycle());
}

#[test]
fn corrupted_values_are_normalized() {
    let json = r#"{
        "mode": "week",
        "placements": [
            { "instance_id": "inst-a", "item_id": "task-sport", "x": 11, "y": 8 },
            { "instance_id": "inst-a", "item_id": "res-sleep", "x": 0, "y": 0 }
        ],
        "user": { "level": 9, "xp": 120, "energy": -40, "focus": 400 },
        "day": { "phase": "active", "time": 99.0, "day_count": 0, "result": { "gross_xp": 5 } },
        "activity": { "history": [
            { "date": "2025-11-02", "tasks_completed": 1 },
            { "date": "2025-10-31", "tasks_completed": 2 },
            { "date": "2025-11-02", "fusions_done": 1 }
        ] }
    }"#;
    let (session, report) = Snapshot::from_json(json)
        .unwrap()
        .rehydrate(Catalog::builtin(), Tuning::default(), clock());

    assert_eq!(session.inventory().mode(), GridMode::Week);
    assert_eq!(session.inventory().placed().len(), 2);
    assert_eq!(report.reassigned_ids.len(), 1);
    assert!(report.dropped.is_empty());
    assert!(session.inventory().is_consistent());

    let user = session.user();
    assert_eq!((user.level, user.energy, user.focus), (2, 0, 100));

    let cycle = session.day_cycle();
    assert!((cycle.time - 24.0).abs() < f64::EPSILON);
    assert_eq!(cycle.day_count, 1);
    assert!(cycle.result.is_none());

    let history = session.activity().history();
    assert!(history.windows(2).all(|pair| pair[0].date < pair[1].date));
}

#[test]
fn implausible_rng_positions_are_reseeded_not_replayed() {
    let json = r#"{"rng":{"seed":1,"spawn_draws":18446744073709551615,"id_draws":4}}"#;
    let (session, report) = Snapshot::from_json(json)
        .unwrap()
        .rehydrate(Catalog::builtin(), Tuning::default(), clock());
    assert!(report.rng_reset);
    assert!(!report.is_clean());

    let state = session.rng().state();
    assert_eq!(state.seed, 1);
    assert_eq!(state.spawn_draws, 0);
    assert_eq!(state.id_draws, 4);
}
