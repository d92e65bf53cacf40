use anyhow::Result;
use chrono::NaiveDate;
use std::rc::Rc;
use std::sync::Arc;

use corespace_game::{
    Catalog, Clock, DayPhase, FixedClock, Session, Settlement, Snapshot, TickOutcome, Tuning,
    UserStats,
};

use crate::logic::policy::{PlanStats, Planner, PlannerStrategy};

pub const DEFAULT_SIM_DAYS: u32 = 3;
const DEFAULT_TICK_HOURS: f64 = 1.0;

/// Assertion hook run after a simulation completes.
type SimulationExpectationFn = Arc<dyn Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static>;

#[derive(Clone)]
pub struct SimulationExpectation(SimulationExpectationFn);

impl std::fmt::Debug for SimulationExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationExpectation").finish()
    }
}

impl SimulationExpectation {
    /// # Errors
    ///
    /// Returns the expectation's failure message.
    pub fn evaluate(&self, summary: &SimulationSummary) -> Result<()> {
        (self.0)(summary)
    }
}

impl<F> From<F> for SimulationExpectation
where
    F: Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self(Arc::new(f))
    }
}

/// Scripted checks run against the fresh session before the first day.
pub type SetupScript = fn(&mut Session) -> Result<()>;

/// Declarative plan for running a simulation session.
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub strategy: PlannerStrategy,
    pub days: u32,
    pub tick_hours: f64,
    pub setup: Option<SetupScript>,
    pub expectations: Vec<SimulationExpectation>,
}

impl SimulationPlan {
    #[must_use]
    pub const fn new(strategy: PlannerStrategy) -> Self {
        Self {
            strategy,
            days: DEFAULT_SIM_DAYS,
            tick_hours: DEFAULT_TICK_HOURS,
            setup: None,
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_days(mut self, days: u32) -> Self {
        self.days = days;
        self
    }

    #[must_use]
    pub const fn with_tick_hours(mut self, hours: f64) -> Self {
        self.tick_hours = hours;
        self
    }

    #[must_use]
    pub fn with_setup(mut self, setup: SetupScript) -> Self {
        self.setup = Some(setup);
        self
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: impl Into<SimulationExpectation>) -> Self {
        self.expectations.push(expectation.into());
        self
    }
}

/// One simulated calendar day.
#[derive(Debug, Clone)]
pub struct DayRecord {
    pub day: u32,
    pub plan: PlanStats,
    pub parasites_spawned: u32,
    pub peak_parasites: usize,
    pub settlement: Option<Settlement>,
    pub level: u32,
    pub energy: i32,
}

/// Complete record of a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub seed: u64,
    pub strategy: PlannerStrategy,
    pub setup_error: Option<String>,
    pub days: Vec<DayRecord>,
    pub final_user: UserStats,
    pub inventory_consistent: bool,
    /// Capture -> JSON -> rehydrate reproduced the session.
    pub roundtrip_matches: bool,
    pub snapshot: Snapshot,
}

impl SimulationSummary {
    #[must_use]
    pub fn total_fusions(&self) -> u32 {
        self.days.iter().map(|day| day.plan.fusions).sum()
    }

    #[must_use]
    pub fn total_xp_gained(&self) -> u32 {
        self.days
            .iter()
            .filter_map(|day| day.settlement)
            .map(|settlement| settlement.xp_gained)
            .sum()
    }

    #[must_use]
    pub fn peak_parasites(&self) -> usize {
        self.days
            .iter()
            .map(|day| day.peak_parasites)
            .max()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn resolved_days(&self) -> usize {
        self.days
            .iter()
            .filter(|day| day.settlement.is_some())
            .count()
    }
}

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 6).unwrap_or(NaiveDate::MIN)
}

/// Drive one session through `plan.days` calendar days.
#[must_use]
pub fn run_plan(plan: &SimulationPlan, seed: u64) -> SimulationSummary {
    let clock = Rc::new(FixedClock::new(start_date()));
    let handle: Rc<dyn Clock> = clock.clone();
    let mut session = Session::new(Catalog::builtin(), Tuning::builtin().clone(), seed, handle);

    let setup_error = plan
        .setup
        .and_then(|setup| setup(&mut session).err())
        .map(|err| format!("{err:#}"));

    let mut planner = plan.strategy.create_planner(seed);
    let mut days = Vec::with_capacity(usize::try_from(plan.days).unwrap_or_default());
    for _ in 0..plan.days {
        days.push(simulate_day(&mut session, planner.as_mut(), plan.tick_hours));
        clock.advance_days(1);
    }

    let snapshot = Snapshot::capture(&session);
    SimulationSummary {
        seed,
        strategy: plan.strategy,
        setup_error,
        days,
        final_user: session.user().clone(),
        inventory_consistent: session.inventory().is_consistent(),
        roundtrip_matches: roundtrip_matches(&session, &snapshot),
        snapshot,
    }
}

fn simulate_day(session: &mut Session, planner: &mut dyn Planner, tick_hours: f64) -> DayRecord {
    if session.day_cycle().phase == DayPhase::Resolved
        && let Err(err) = session.start_planning()
    {
        log::warn!("could not return to planning: {err}");
    }
    let day = session.day_cycle().day_count;
    let plan = planner.plan_day(session);
    log::debug!("{} planned day {day}: {plan:?}", planner.name());

    let mut record = DayRecord {
        day,
        plan,
        parasites_spawned: 0,
        peak_parasites: session.inventory().parasite_count(),
        settlement: None,
        level: session.user().level,
        energy: session.user().energy,
    };
    if let Err(err) = session.start_day() {
        log::warn!("day {day} did not start: {err}");
        return record;
    }
    while session.day_cycle().phase == DayPhase::Active {
        match session.tick(tick_hours) {
            TickOutcome::Advanced { spawned } => {
                if spawned.is_some() {
                    record.parasites_spawned += 1;
                }
            }
            TickOutcome::Resolved(resolution) => record.settlement = Some(resolution.settlement),
            TickOutcome::Idle => break,
        }
        record.peak_parasites = record
            .peak_parasites
            .max(session.inventory().parasite_count());
    }
    session.drain_notices();
    record.level = session.user().level;
    record.energy = session.user().energy;
    record
}

fn roundtrip_matches(session: &Session, snapshot: &Snapshot) -> bool {
    let Ok(json) = snapshot.to_json() else {
        return false;
    };
    let Ok(parsed) = Snapshot::from_json(&json) else {
        return false;
    };
    let (restored, report) =
        parsed.rehydrate(session.catalog_handle(), session.tuning().clone(), session.clock());
    report.is_clean()
        && restored.inventory() == session.inventory()
        && restored.user() == session.user()
        && restored.day_cycle() == session.day_cycle()
        && restored.activity() == session.activity()
        && restored.rng().state() == session.rng().state()
}
