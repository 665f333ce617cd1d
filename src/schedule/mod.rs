pub mod types;
pub mod slot_utils;
pub mod roster;
pub mod affinity;
pub mod allocator;
pub mod evaluator;
pub mod retry;

pub use affinity::{AffinityModel, Bucket};
pub use allocator::{Allocation, AllocationStats, Phase, SlotAllocator};
pub use evaluator::{evaluate, CoverageReport, Thresholds};
pub use retry::{
    ControllerState, ExhaustionContext, ExhaustionDecision, ExhaustionPolicy, Outcome,
    RetryController, RunOutcome, StopOnExhaustion,
};
pub use roster::Roster;
pub use slot_utils::calculate_slot_labels;
pub use types::{Assignment, HostCell, InvariantViolation, Reason, RequesterCell, Schedule};
