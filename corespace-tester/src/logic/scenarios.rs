use anyhow::{Context, Result, ensure};

use corespace_game::{ActionError, DropOutcome, ItemKind, Session};

use crate::logic::policy::PlannerStrategy;
use crate::logic::simulation::{SimulationPlan, SimulationSummary};

/// Named simulation plan.
#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub plan: SimulationPlan,
}

impl TestScenario {
    #[must_use]
    pub fn simulation(name: impl Into<String>, plan: SimulationPlan) -> Self {
        Self {
            name: name.into(),
            plan,
        }
    }
}

const SCENARIOS: [(&str, &str); 6] = [
    ("smoke", "Place, move and remove on a fresh grid"),
    ("fusion", "Coffee + focus chain and fusion-first planning"),
    ("budget", "Daily resource quota exhaustion under random play"),
    ("parasites", "Full active days with the parasite cap enforced"),
    ("persistence", "Snapshot to JSON and back reproduces the session"),
    ("week", "Seven planned days with level progression"),
];

#[must_use]
pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    SCENARIOS.to_vec()
}

/// Every scenario key, in listing order.
#[must_use]
pub fn all_scenario_keys() -> Vec<String> {
    SCENARIOS.iter().map(|(key, _)| (*key).to_string()).collect()
}

#[must_use]
pub fn get_scenario(name: &str) -> Option<TestScenario> {
    let plan = match name {
        "smoke" => SimulationPlan::new(PlannerStrategy::Greedy)
            .with_days(1)
            .with_setup(smoke_setup)
            .with_expectation(setup_succeeded)
            .with_expectation(board_is_consistent),
        "fusion" => SimulationPlan::new(PlannerStrategy::Fuser)
            .with_setup(fusion_setup)
            .with_expectation(setup_succeeded)
            .with_expectation(fusions_happened),
        "budget" => SimulationPlan::new(PlannerStrategy::Random)
            .with_setup(budget_setup)
            .with_expectation(setup_succeeded)
            .with_expectation(board_is_consistent),
        "parasites" => SimulationPlan::new(PlannerStrategy::Greedy)
            .with_days(5)
            .with_tick_hours(0.25)
            .with_expectation(every_day_resolved)
            .with_expectation(parasite_cap_held),
        "persistence" => SimulationPlan::new(PlannerStrategy::Random)
            .with_days(4)
            .with_expectation(snapshot_roundtrips)
            .with_expectation(board_is_consistent),
        "week" => SimulationPlan::new(PlannerStrategy::Greedy)
            .with_days(7)
            .with_expectation(every_day_resolved)
            .with_expectation(levels_progressed),
        _ => return None,
    };
    Some(TestScenario::simulation(name, plan))
}

fn smoke_setup(session: &mut Session) -> Result<()> {
    let code = session.place("task-code", 1, 1)?;
    ensure!(
        session.inventory().grid().occupied_count() == 4,
        "2x2 task should cover four cells"
    );
    ensure!(
        session.place("res-coffee", 2, 2) == Err(ActionError::Overlap),
        "overlapping placement should be refused"
    );
    session.move_item(&code, 5, 3)?;
    ensure!(
        session.inventory().get(&code).map(|p| p.origin()) == Some((5, 3)),
        "move should update the origin"
    );
    session.remove(&code).context("placed task should be removable")?;
    ensure!(
        session.inventory().grid().occupied_count() == 0,
        "removal should free every cell"
    );
    Ok(())
}

fn fusion_setup(session: &mut Session) -> Result<()> {
    let coffee = session.place("res-coffee", 0, 0)?;
    let focus = session.place("res-focus", 3, 3)?;
    let outcome = session.drop_at(&focus, 0, 0)?;
    let DropOutcome::Fused(fusion) = outcome else {
        anyhow::bail!("coffee + focus should fuse, got {outcome:?}");
    };
    ensure!(fusion.created.item.id == "buff-deepwork", "wrong fusion output");
    ensure!(session.inventory().get(&coffee).is_none(), "inputs should be gone");
    ensure!(session.user().xp == 15, "fusion should award 15 XP");
    Ok(())
}

fn budget_setup(session: &mut Session) -> Result<()> {
    for col in 0..5 {
        session.place("res-coffee", col, 5)?;
    }
    let refused = session.place("res-money", 5, 5);
    ensure!(
        refused
            == Err(ActionError::BudgetExhausted {
                kind: ItemKind::Resource
            }),
        "sixth resource should exhaust the budget, got {refused:?}"
    );
    ensure!(
        session.remaining_budget(ItemKind::Resource) == Some(0),
        "resource budget should be spent"
    );
    Ok(())
}

fn setup_succeeded(summary: &SimulationSummary) -> Result<()> {
    match &summary.setup_error {
        Some(err) => anyhow::bail!("setup failed: {err}"),
        None => Ok(()),
    }
}

fn board_is_consistent(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.inventory_consistent,
        "grid disagrees with the placement list"
    );
    Ok(())
}

fn fusions_happened(summary: &SimulationSummary) -> Result<()> {
    let days = u32::try_from(summary.days.len()).unwrap_or(u32::MAX);
    ensure!(
        summary.total_fusions() >= days,
        "expected at least one fusion per day, got {}",
        summary.total_fusions()
    );
    Ok(())
}

fn every_day_resolved(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.resolved_days() == summary.days.len(),
        "only {} of {} days resolved",
        summary.resolved_days(),
        summary.days.len()
    );
    Ok(())
}

fn parasite_cap_held(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.peak_parasites() <= 3,
        "parasite cap exceeded: {}",
        summary.peak_parasites()
    );
    Ok(())
}

fn snapshot_roundtrips(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.roundtrip_matches,
        "rehydrated snapshot differs from the live session"
    );
    Ok(())
}

fn levels_progressed(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.final_user.level >= 2,
        "expected level 2 or higher after a week, got {} ({} XP)",
        summary.final_user.level,
        summary.final_user.xp
    );
    ensure!(
        usize::try_from(summary.final_user.streak).ok() == Some(summary.days.len()),
        "streak {} should cover every simulated day",
        summary.final_user.streak
    );
    Ok(())
}
