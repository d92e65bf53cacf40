use chrono::NaiveDate;
use corespace_game::{
    ActionError, Catalog, Clock, DayPhase, FixedClock, ItemKind, Notice, Session, TickOutcome,
    Tuning,
};
use std::rc::Rc;

fn session(seed: u64) -> (Session, Rc<FixedClock>) {
    let clock = Rc::new(FixedClock::new(
        NaiveDate::from_ymd_opt(2025, 9, 1).expect("valid date"),
    ));
    let handle: Rc<dyn Clock> = clock.clone();
    (
        Session::new(Catalog::builtin(), Tuning::default(), seed, handle),
        clock,
    )
}

#[test]
fn late_tick_settles_at_the_day_boundary() {
    let (mut session, _) = session(11);
    session.start_day().unwrap();
    let first = session.tick(15.75);
    assert!(matches!(first, TickOutcome::Advanced { .. }));
    assert!((session.day_cycle().time - 23.75).abs() < 1e-9);

    let outcome = session.tick(0.5);
    assert!(matches!(outcome, TickOutcome::Resolved(_)));
    let cycle = session.day_cycle();
    assert_eq!(cycle.phase, DayPhase::Resolved);
    assert!((cycle.time - 24.0).abs() < f64::EPSILON);
    assert_eq!(cycle.day_count, 2);
    assert!(cycle.result.is_some());

    assert!(matches!(session.tick(1.0), TickOutcome::Idle));
    assert_eq!(session.start_day(), Err(ActionError::WrongPhase(DayPhase::Resolved)));
}

#[test]
fn settlement_applies_aura_and_tracks_activity() {
    let (mut session, clock) = session(3);
    session.place("task-code", 0, 0).unwrap();
    session.force_place("buff-deepwork", 2, 0).unwrap();
    session.start_day().unwrap();

    let resolution = session.end_day().unwrap();
    assert_eq!(resolution.settlement.gross_xp, 60);
    assert_eq!(resolution.settlement.penalty, 0);
    assert_eq!(resolution.settlement.xp_gained, 60);
    assert_eq!(resolution.settlement.tasks_completed, 1);
    assert_eq!(session.user().xp, 60);
    assert_eq!(session.user().streak, 1);

    let record = session.activity().record(clock.today()).unwrap();
    assert_eq!(record.tasks_completed, 1);
    assert_eq!(record.xp_earned, 60);

    let notices = session.drain_notices();
    assert!(notices.iter().any(|n| matches!(n, Notice::DayResolved { day: 1, .. })));
}

#[test]
fn parasites_drain_settlement_but_never_below_zero() {
    let (mut session, _) = session(5);
    session.place("task-chores", 0, 0).unwrap();
    session.force_place("para-fatigue", 4, 4).unwrap();
    session.force_place("para-distraction", 6, 4).unwrap();
    session.start_day().unwrap();

    let settlement = session.end_day().unwrap().settlement;
    assert_eq!(settlement.gross_xp, 10);
    assert_eq!(settlement.penalty, 25);
    assert_eq!(settlement.xp_gained, 0);
    assert_eq!(session.user().xp, 0);
}

#[test]
fn parasite_population_never_exceeds_the_cap() {
    for seed in 0..20 {
        let (mut session, _) = session(seed);
        session.start_day().unwrap();
        while session.day_cycle().phase == DayPhase::Active {
            session.tick(0.25);
            assert!(session.inventory().parasite_count() <= 3, "seed {seed}");
        }
        assert!(session.inventory().is_consistent());
    }
}

#[test]
fn a_week_of_days_builds_a_streak() {
    let (mut session, clock) = session(9);
    for day in 1..=7 {
        session.place("task-meeting", 0, 0).unwrap();
        session.start_day().unwrap();
        session.end_day().unwrap();
        assert_eq!(session.user().streak, day);
        session.start_planning().unwrap();
        let placed: Vec<_> = session
            .inventory()
            .placed()
            .iter()
            .map(|p| p.instance_id.clone())
            .collect();
        for id in placed {
            session.remove(&id);
        }
        clock.advance_days(1);
    }
    let week = session.activity().week_history(clock.today());
    assert_eq!(week.len(), 7);
    assert!(week[..6].iter().all(|record| record.tasks_completed == 1));
    assert_eq!(week[6].tasks_completed, 0);
    assert_eq!(session.remaining_budget(ItemKind::Resource), Some(5));
    assert_eq!(session.user().xp, 105);
    assert_eq!(session.user().level, 2);
    assert_eq!(session.user().energy, 30);
}
