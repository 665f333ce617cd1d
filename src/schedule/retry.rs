//! Randomised-restart controller around the allocator.
//!
//! Each attempt starts from a clean grid with its own RNG stream derived from
//! the run seed. The controller keeps the lowest-shortfall schedule seen and,
//! once the budget is spent, asks an [`ExhaustionPolicy`] whether to extend it.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use super::allocator::{Allocation, SlotAllocator};
use super::evaluator::{evaluate, CoverageReport, Thresholds};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Attempting,
    Evaluating,
    Accepted,
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    /// Every participant reached its minimum.
    Accepted,
    /// Budget spent; the best schedule seen is returned.
    BestEffort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionDecision {
    Continue,
    Stop,
}

/// What the policy sees when the budget runs out.
#[derive(Debug, Clone)]
pub struct ExhaustionContext {
    pub attempts: usize,
    pub budget: usize,
    pub best_attempt: usize,
    pub best_report: CoverageReport,
}

pub trait ExhaustionPolicy {
    fn decide(&mut self, context: &ExhaustionContext) -> ExhaustionDecision;
}

/// Unattended default: return the best schedule as soon as the budget is spent.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopOnExhaustion;

impl ExhaustionPolicy for StopOnExhaustion {
    fn decide(&mut self, _context: &ExhaustionContext) -> ExhaustionDecision {
        ExhaustionDecision::Stop
    }
}

impl<F> ExhaustionPolicy for F
where
    F: FnMut(&ExhaustionContext) -> ExhaustionDecision,
{
    fn decide(&mut self, context: &ExhaustionContext) -> ExhaustionDecision {
        self(context)
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub allocation: Allocation,
    pub report: CoverageReport,
    pub outcome: Outcome,
    /// Attempts actually run.
    pub attempts: usize,
    /// Budget at termination, including extensions.
    pub budget: usize,
    /// 1-based attempt that produced `allocation`.
    pub chosen_attempt: usize,
    pub seed: u64,
}

struct Candidate {
    attempt: usize,
    allocation: Allocation,
    report: CoverageReport,
}

pub struct RetryController<'a> {
    allocator: SlotAllocator<'a>,
    config: &'a EngineConfig,
    seed: u64,
}

impl<'a> RetryController<'a> {
    /// Uses `config.seed`, or a fresh OS seed when unset.
    pub fn new(allocator: SlotAllocator<'a>, config: &'a EngineConfig) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        Self {
            allocator,
            config,
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn thresholds(&self) -> Thresholds {
        Thresholds {
            min_host_interviews: self.config.min_host_interviews,
            min_requester_interviews: self.config.min_requester_interviews,
        }
    }

    /// RNG for the `attempt`-th try: same seed, independent stream.
    fn attempt_rng(&self, attempt: usize) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(attempt as u64);
        rng
    }

    /// One full allocation on a clean grid, evaluated.
    fn attempt(&self, attempt: usize, thresholds: Thresholds) -> Candidate {
        let mut rng = self.attempt_rng(attempt);
        let allocation = self.allocator.allocate(&mut rng);
        let report = evaluate(&allocation.schedule, thresholds);
        debug!(
            attempt,
            shortfall = report.shortfall(),
            hosts_below = report.hosts_below_min.len(),
            requesters_below = report.requesters_below_min.len(),
            interviews = report.total_interviews,
            "attempt evaluated"
        );
        Candidate {
            attempt,
            allocation,
            report,
        }
    }

    pub fn run(&self, policy: &mut dyn ExhaustionPolicy) -> RunOutcome {
        let thresholds = self.thresholds();
        let mut budget = self.config.max_attempts.max(1);

        info!(seed = self.seed, budget, "starting allocation attempts");
        let roster = self.allocator.roster();
        let capacity = roster.host_capacity();
        let demand = roster.requesters.len() * self.config.min_requester_interviews;
        if capacity < demand {
            warn!(capacity, demand, "open host slots cannot cover every requester minimum");
        }

        let mut attempts = 1;
        let mut best = self.attempt(attempts, thresholds);
        let mut latest_shortfall = best.report.shortfall();
        let mut state = ControllerState::Evaluating;

        loop {
            match state {
                ControllerState::Attempting => {
                    attempts += 1;
                    let candidate = self.attempt(attempts, thresholds);
                    latest_shortfall = candidate.report.shortfall();
                    if latest_shortfall < best.report.shortfall() {
                        info!(attempt = attempts, shortfall = latest_shortfall, "new best schedule");
                        best = candidate;
                    }
                    state = ControllerState::Evaluating;
                }
                ControllerState::Evaluating => {
                    state = if latest_shortfall == 0 {
                        ControllerState::Accepted
                    } else if attempts < budget {
                        ControllerState::Attempting
                    } else {
                        ControllerState::Exhausted
                    };
                }
                ControllerState::Accepted => {
                    info!(attempt = best.attempt, "all minimums met");
                    return self.finish(best, Outcome::Accepted, attempts, budget);
                }
                ControllerState::Exhausted => {
                    warn!(
                        attempts,
                        best_attempt = best.attempt,
                        shortfall = best.report.shortfall(),
                        "attempt budget exhausted"
                    );
                    let context = ExhaustionContext {
                        attempts,
                        budget,
                        best_attempt: best.attempt,
                        best_report: best.report.clone(),
                    };
                    match policy.decide(&context) {
                        ExhaustionDecision::Continue => {
                            budget += self.config.attempt_increment.max(1);
                            info!(budget, "attempt budget extended");
                            state = ControllerState::Attempting;
                        }
                        ExhaustionDecision::Stop => {
                            return self.finish(best, Outcome::BestEffort, attempts, budget);
                        }
                    }
                }
            }
        }
    }

    fn finish(&self, best: Candidate, outcome: Outcome, attempts: usize, budget: usize) -> RunOutcome {
        RunOutcome {
            allocation: best.allocation,
            report: best.report,
            outcome,
            attempts,
            budget,
            chosen_attempt: best.attempt,
            seed: self.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Host, RecordStore, Requester};
    use crate::schedule::affinity::AffinityModel;
    use crate::schedule::roster::Roster;

    fn tight_store() -> RecordStore {
        // 2 host cells for 2 requesters needing 3 each
        let mut store = RecordStore::default();
        store.add_host(
            Host::new("h1", "H1", "North", 8)
                .with_interests(&["x"])
                .with_open_slots(&[0, 1]),
        );
        store.add_requester(Requester::new("r1", "R1").with_interests(&["x"]));
        store.add_requester(Requester::new("r2", "R2").with_interests(&["x"]));
        store
    }

    fn run_with(
        store: &RecordStore,
        config: &EngineConfig,
        policy: &mut dyn ExhaustionPolicy,
    ) -> RunOutcome {
        let roster = Roster::build(store, config);
        let affinity = AffinityModel::build(&roster, config.rank_weight_base);
        let allocator = SlotAllocator::new(&roster, &affinity, config);
        RetryController::new(allocator, config).run(policy)
    }

    #[test]
    fn complete_schedule_is_accepted_on_first_attempt() {
        let config = EngineConfig {
            min_host_interviews: 1,
            min_requester_interviews: 1,
            seed: Some(3),
            ..EngineConfig::default()
        };
        let mut store = RecordStore::default();
        store.add_host(Host::new("h1", "H1", "North", 8).with_interests(&["x"]));
        store.add_requester(Requester::new("r1", "R1").with_interests(&["x"]));

        let outcome = run_with(&store, &config, &mut StopOnExhaustion);
        assert_eq!(outcome.outcome, Outcome::Accepted);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.chosen_attempt, 1);
    }

    #[test]
    fn stops_at_budget_with_best_effort() {
        let config = EngineConfig {
            max_attempts: 4,
            seed: Some(10),
            ..EngineConfig::default()
        };
        let outcome = run_with(&tight_store(), &config, &mut StopOnExhaustion);
        assert_eq!(outcome.outcome, Outcome::BestEffort);
        assert_eq!(outcome.attempts, 4);
        assert_eq!(outcome.budget, 4);
        assert!(outcome.report.shortfall() > 0);
        assert!(outcome.allocation.schedule.check_invariants().is_ok());
    }

    #[test]
    fn continue_extends_budget_by_increment() {
        let config = EngineConfig {
            max_attempts: 2,
            attempt_increment: 3,
            seed: Some(10),
            ..EngineConfig::default()
        };
        let mut asked = 0;
        let mut policy = |context: &ExhaustionContext| {
            asked += 1;
            assert_eq!(context.attempts, context.budget);
            if asked == 1 {
                ExhaustionDecision::Continue
            } else {
                ExhaustionDecision::Stop
            }
        };
        let outcome = run_with(&tight_store(), &config, &mut policy);
        assert_eq!(asked, 2);
        assert_eq!(outcome.attempts, 5);
        assert_eq!(outcome.budget, 5);
    }

    #[test]
    fn best_effort_returns_the_earliest_lowest_shortfall() {
        let config = EngineConfig {
            max_attempts: 6,
            seed: Some(21),
            ..EngineConfig::default()
        };
        let store = tight_store();
        let outcome = run_with(&store, &config, &mut StopOnExhaustion);

        let thresholds = Thresholds {
            min_host_interviews: config.min_host_interviews,
            min_requester_interviews: config.min_requester_interviews,
        };
        assert_eq!(outcome.report, evaluate(&outcome.allocation.schedule, thresholds));

        // replaying every attempt: none before the chosen one ties it, none after beats it
        let roster = Roster::build(&store, &config);
        let affinity = AffinityModel::build(&roster, config.rank_weight_base);
        let controller = RetryController::new(SlotAllocator::new(&roster, &affinity, &config), &config);
        for attempt in 1..=outcome.attempts {
            let shortfall = controller.attempt(attempt, thresholds).report.shortfall();
            if attempt < outcome.chosen_attempt {
                assert!(shortfall > outcome.report.shortfall());
            } else {
                assert!(shortfall >= outcome.report.shortfall());
            }
        }
    }

    #[test]
    fn same_seed_reproduces_the_run() {
        let config = EngineConfig {
            max_attempts: 3,
            seed: Some(77),
            ..EngineConfig::default()
        };
        let a = run_with(&tight_store(), &config, &mut StopOnExhaustion);
        let b = run_with(&tight_store(), &config, &mut StopOnExhaustion);
        assert_eq!(a.allocation.schedule, b.allocation.schedule);
        assert_eq!(a.report, b.report);
    }
}
