//! Interview slot allocation between hosts and requesters.
//!
//! Records are loaded by [`parser`], scheduled by the engine in [`schedule`]
//! and written out by [`export`] and [`display`].

pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod logging;
pub mod parser;
pub mod records;
pub mod schedule;

pub use config::EngineConfig;
pub use error::{Result, SchedulerError};
pub use records::{Host, ParticipantId, RecordStore, Requester};
pub use schedule::{
    AffinityModel, ExhaustionContext, ExhaustionDecision, ExhaustionPolicy, Outcome, RetryController, Roster,
    RunOutcome, SlotAllocator, StopOnExhaustion,
};

/// Builds the roster and affinity model for `store` and runs the retry controller.
pub fn run_scheduler(
    store: &RecordStore,
    config: &EngineConfig,
    policy: &mut dyn ExhaustionPolicy,
) -> (Roster, RunOutcome) {
    let roster = Roster::build(store, config);
    let outcome = {
        let affinity = AffinityModel::build(&roster, config.rank_weight_base);
        let allocator = SlotAllocator::new(&roster, &affinity, config);
        RetryController::new(allocator, config).run(policy)
    };
    (roster, outcome)
}
