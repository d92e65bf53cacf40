use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use corespace_game::Snapshot;

use crate::logic::scenarios::TestScenario;
use crate::logic::simulation::{SimulationPlan, SimulationSummary, run_plan};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
}

/// Results of one scenario across all seeds, plus the last run's snapshot.
#[derive(Debug, Clone, Default)]
pub struct ScenarioBatch {
    pub results: Vec<ScenarioResult>,
    pub last_snapshot: Option<Snapshot>,
}

pub struct LogicTester {
    verbose: bool,
}

impl LogicTester {
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn run_scenario(
        &self,
        scenario: &TestScenario,
        seeds: &[u64],
        iterations: usize,
    ) -> ScenarioBatch {
        let mut batch = ScenarioBatch::default();

        for &seed in seeds {
            if self.verbose {
                println!(
                    "🧪 Testing scenario: {} (strategy: {} seed: {})",
                    scenario.name.bright_white(),
                    scenario.plan.strategy,
                    seed
                );
            }

            let (result, snapshot) = self.run_single_scenario(scenario, seed, iterations);
            batch.results.push(result);
            if snapshot.is_some() {
                batch.last_snapshot = snapshot;
            }
        }

        batch
    }

    fn run_single_scenario(
        &self,
        scenario: &TestScenario,
        seed: u64,
        iterations: usize,
    ) -> (ScenarioResult, Option<Snapshot>) {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut performance_data = Vec::new();
        let mut last_snapshot = None;

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));

            let summary = run_plan(&scenario.plan, iteration_seed);
            let duration = start_time.elapsed();

            if let Some(err) = evaluate_expectations(&scenario.plan, &summary) {
                let context = summarize_days(&summary);
                failures.push(format!(
                    "Iteration {} (strategy {}, seed {}, days {}): {} | {} | final level {} XP {} energy {}",
                    i + 1,
                    summary.strategy,
                    summary.seed,
                    summary.days.len(),
                    err,
                    context,
                    summary.final_user.level,
                    summary.final_user.xp,
                    summary.final_user.energy
                ));

                if self.verbose {
                    println!(
                        "  ❌ Iteration {}/{} failed: {}",
                        i + 1,
                        iterations,
                        err.clone().red()
                    );
                    println!("     ↳ Seed {} | {}", summary.seed, context);
                }
            } else {
                successes += 1;
                performance_data.push(duration);

                if self.verbose {
                    println!(
                        "  ✅ Iteration {}/{} passed ({duration:?}) days:{} xp:{} level:{}",
                        i + 1,
                        iterations,
                        summary.days.len(),
                        summary.total_xp_gained(),
                        summary.final_user.level
                    );
                }
            }
            last_snapshot = Some(summary.snapshot);
        }

        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };

        let result = ScenarioResult {
            scenario_name: scenario.name.clone(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            average_duration,
            performance_data,
        };
        (result, last_snapshot)
    }
}

fn evaluate_expectations(plan: &SimulationPlan, summary: &SimulationSummary) -> Option<String> {
    for expectation in &plan.expectations {
        if let Err(err) = expectation.evaluate(summary) {
            return Some(err.to_string());
        }
    }
    None
}

fn summarize_days(summary: &SimulationSummary) -> String {
    if summary.days.is_empty() {
        return "no days simulated".to_string();
    }

    summary
        .days
        .iter()
        .rev()
        .take(3)
        .map(|day| {
            let xp = day
                .settlement
                .map_or_else(|| "-".to_string(), |s| s.xp_gained.to_string());
            format!(
                "day {}: placed {} rejected {} fused {} parasites {} xp {} level {} energy {}",
                day.day,
                day.plan.placed,
                day.plan.rejected,
                day.plan.fusions,
                day.parasites_spawned,
                xp,
                day.level,
                day.energy
            )
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis: Vec<u128> = durations.iter().map(Duration::as_millis).collect();
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis_vec = Vec::<u128>::deserialize(deserializer)?;
        Ok(millis_vec
            .into_iter()
            .map(|m| Duration::from_millis(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}
