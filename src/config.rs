use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};
use crate::schedule::slot_utils::{calculate_slot_labels, parse_time_of_day};

pub const DEFAULT_SLOT_COUNT: usize = 8;
pub const DEFAULT_MIN_INTERVIEWS: usize = 3;
pub const DEFAULT_MAX_ATTEMPTS: usize = 100;
pub const DEFAULT_ATTEMPT_INCREMENT: usize = 20;
pub const DEFAULT_MAX_CHOICES: usize = 5;
pub const DEFAULT_MAX_INTERESTS: usize = 3;
pub const DEFAULT_RANK_WEIGHT_BASE: u32 = 4;

/// Tunables for one scheduling run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of interview slots in the grid.
    pub slot_count: usize,
    pub min_host_interviews: usize,
    pub min_requester_interviews: usize,
    /// Attempts before the exhaustion policy is consulted.
    pub max_attempts: usize,
    /// Budget added each time the policy asks to continue.
    pub attempt_increment: usize,
    /// Ranked choices honoured per participant.
    pub max_choices: usize,
    /// Ranked interests kept per participant.
    pub max_interests: usize,
    /// `K` in the `(K + 1 - rank)` interest weight.
    pub rank_weight_base: u32,
    /// Base seed; drawn from the OS when absent.
    pub seed: Option<u64>,
    /// Explicit slot labels. Generated from `first_slot` when empty.
    pub slot_labels: Vec<String>,
    pub first_slot: String,
    pub slot_minutes: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            slot_count: DEFAULT_SLOT_COUNT,
            min_host_interviews: DEFAULT_MIN_INTERVIEWS,
            min_requester_interviews: DEFAULT_MIN_INTERVIEWS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempt_increment: DEFAULT_ATTEMPT_INCREMENT,
            max_choices: DEFAULT_MAX_CHOICES,
            max_interests: DEFAULT_MAX_INTERESTS,
            rank_weight_base: DEFAULT_RANK_WEIGHT_BASE,
            seed: None,
            slot_labels: Vec::new(),
            first_slot: "09:45".to_string(),
            slot_minutes: 15,
        }
    }
}

impl EngineConfig {
    /// Reads a JSON config file; missing fields fall back to defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&raw)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.slot_count == 0 {
            return Err(SchedulerError::config("slot_count", "must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(SchedulerError::config("max_attempts", "must be at least 1"));
        }
        if self.max_choices == 0 {
            return Err(SchedulerError::config("max_choices", "must be at least 1"));
        }
        if self.max_interests as u32 > self.rank_weight_base {
            return Err(SchedulerError::config(
                "max_interests",
                format!("ranks beyond {} would carry no weight", self.rank_weight_base),
            ));
        }
        if !self.slot_labels.is_empty() && self.slot_labels.len() != self.slot_count {
            return Err(SchedulerError::config(
                "slot_labels",
                format!("expected {} labels, got {}", self.slot_count, self.slot_labels.len()),
            ));
        }
        if self.slot_labels.is_empty() {
            parse_time_of_day(&self.first_slot)?;
        }
        Ok(())
    }

    /// Display label for every slot index.
    pub fn labels(&self) -> Result<Vec<String>> {
        if !self.slot_labels.is_empty() {
            return Ok(self.slot_labels.clone());
        }
        calculate_slot_labels(&self.first_slot, self.slot_minutes, self.slot_count)
    }
}
