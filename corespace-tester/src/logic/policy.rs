use std::fmt;

use corespace_game::{DropOutcome, InstanceId, Item, ItemKind, Session, find_empty_position};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// What a planner did during one planning phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanStats {
    pub placed: u32,
    pub rejected: u32,
    pub fusions: u32,
    pub consumed: u32,
}

/// Planning interface for automated days.
pub trait Planner {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    /// Arrange the board before the day starts.
    fn plan_day(&mut self, session: &mut Session) -> PlanStats;
}

/// Built-in planning strategies for automated runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlannerStrategy {
    /// Refill energy, then place the highest-XP tasks that fit.
    Greedy,
    /// Spend resources on fusions before placing tasks.
    Fuser,
    /// Random placements, drops and consumptions.
    Random,
}

impl PlannerStrategy {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Greedy => "Greedy",
            Self::Fuser => "Fuser",
            Self::Random => "Random",
        }
    }

    #[must_use]
    pub fn create_planner(self, seed: u64) -> Box<dyn Planner> {
        match self {
            Self::Greedy => Box::new(GreedyPlanner),
            Self::Fuser => Box::new(FuserPlanner),
            Self::Random => Box::new(RandomPlanner::new(seed)),
        }
    }
}

impl fmt::Display for PlannerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

const ENERGY_TARGET: i32 = 60;
const MAX_TASKS_PER_DAY: usize = 4;
const RANDOM_ACTIONS_PER_DAY: u32 = 16;

struct GreedyPlanner;
struct FuserPlanner;

struct RandomPlanner {
    rng: ChaCha20Rng,
}

impl RandomPlanner {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl Planner for GreedyPlanner {
    fn name(&self) -> &'static str {
        "Greedy"
    }

    fn plan_day(&mut self, session: &mut Session) -> PlanStats {
        let mut stats = PlanStats::default();
        clear_board(session);
        refill_energy(session, &mut stats);
        place_tasks(session, &mut stats);
        place_anywhere(session, "buff-deepwork", &mut stats);
        stats
    }
}

impl Planner for FuserPlanner {
    fn name(&self) -> &'static str {
        "Fuser"
    }

    fn plan_day(&mut self, session: &mut Session) -> PlanStats {
        let mut stats = PlanStats::default();
        clear_board(session);

        // coffee + focus -> deep work, kept on the board for its aura
        fuse_pair(session, "res-coffee", "res-focus", &mut stats);
        // coffee + coffee -> energy, drunk straight away
        if let Some(energy) = fuse_pair(session, "res-coffee", "res-coffee", &mut stats)
            && session.consume(&energy).is_ok()
        {
            stats.consumed += 1;
        }
        place_tasks(session, &mut stats);
        stats
    }
}

impl Planner for RandomPlanner {
    fn name(&self) -> &'static str {
        "Random"
    }

    fn plan_day(&mut self, session: &mut Session) -> PlanStats {
        let mut stats = PlanStats::default();
        let candidates: Vec<String> = session
            .catalog()
            .items()
            .iter()
            .filter(|item| item.kind != ItemKind::Parasite)
            .map(|item| item.id.clone())
            .collect();
        let cols = i32::try_from(session.inventory().grid().cols()).unwrap_or(i32::MAX);
        let rows = i32::try_from(session.inventory().grid().rows()).unwrap_or(i32::MAX);

        for _ in 0..RANDOM_ACTIONS_PER_DAY {
            let x = self.rng.gen_range(0..cols);
            let y = self.rng.gen_range(0..rows);
            match self.rng.gen_range(0..4u8) {
                0 | 1 => {
                    let Some(item_id) = candidates.choose(&mut self.rng) else {
                        continue;
                    };
                    match session.place(item_id, x, y) {
                        Ok(_) => stats.placed += 1,
                        Err(_) => stats.rejected += 1,
                    }
                }
                2 => {
                    let Some(id) = random_instance(session, &mut self.rng) else {
                        continue;
                    };
                    if let Ok(DropOutcome::Fused(_)) = session.drop_at(&id, x, y) {
                        stats.fusions += 1;
                    }
                }
                _ => {
                    let Some(id) = random_instance(session, &mut self.rng) else {
                        continue;
                    };
                    if session.consume(&id).is_ok() {
                        stats.consumed += 1;
                    }
                }
            }
        }
        stats
    }
}

fn random_instance(session: &Session, rng: &mut ChaCha20Rng) -> Option<InstanceId> {
    session
        .inventory()
        .placed()
        .choose(rng)
        .map(|placed| placed.instance_id.clone())
}

/// Remove everything left over from the previous day, parasites included.
fn clear_board(session: &mut Session) {
    let ids: Vec<InstanceId> = session
        .inventory()
        .placed()
        .iter()
        .map(|placed| placed.instance_id.clone())
        .collect();
    for id in &ids {
        session.remove(id);
    }
}

/// Place and drink sleep until energy reaches the target or the budget runs out.
fn refill_energy(session: &mut Session, stats: &mut PlanStats) {
    while session.user().energy < ENERGY_TARGET {
        let Some(id) = place_anywhere(session, "res-sleep", stats) else {
            break;
        };
        if session.consume(&id).is_err() {
            break;
        }
        stats.consumed += 1;
    }
}

fn place_tasks(session: &mut Session, stats: &mut PlanStats) {
    let mut tasks: Vec<Item> = session
        .catalog()
        .items_of_kind(ItemKind::Task)
        .cloned()
        .collect();
    tasks.sort_by_key(|item| std::cmp::Reverse(item.effect.xp.unwrap_or(0)));

    let mut placed = 0;
    for task in tasks {
        if placed == MAX_TASKS_PER_DAY {
            break;
        }
        if session.user().energy < task.placement_cost() {
            continue;
        }
        if place_anywhere(session, &task.id, stats).is_some() {
            placed += 1;
        }
    }
}

fn place_anywhere(session: &mut Session, item_id: &str, stats: &mut PlanStats) -> Option<InstanceId> {
    let item = session.catalog().item(item_id)?.clone();
    let (x, y) = find_empty_position(session.inventory().grid(), &item)?;
    match session.place(item_id, x, y) {
        Ok(id) => {
            stats.placed += 1;
            Some(id)
        }
        Err(err) => {
            log::debug!("planner could not place {item_id}: {err}");
            stats.rejected += 1;
            None
        }
    }
}

/// Place two items and drop the second onto the first.
fn fuse_pair(session: &mut Session, a: &str, b: &str, stats: &mut PlanStats) -> Option<InstanceId> {
    let first = place_anywhere(session, a, stats)?;
    let second = place_anywhere(session, b, stats)?;
    let (x, y) = session.inventory().get(&first)?.origin();
    match session.drop_at(&second, x, y) {
        Ok(DropOutcome::Fused(outcome)) => {
            stats.fusions += 1;
            Some(outcome.created.instance_id)
        }
        _ => None,
    }
}
