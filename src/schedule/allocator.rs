//! The five-phase greedy slot allocator.
//!
//! Phases only ever add bookings. Every placement picks a slot uniformly
//! among those open for both sides; when there is none the pair is skipped.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::debug;

use crate::config::EngineConfig;
use super::affinity::{AffinityModel, Bucket};
use super::roster::Roster;
use super::slot_utils::{pick_common_slot, shuffled_sort_by_key};
use super::types::{Reason, Schedule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    HostChoice,
    RequesterChoice,
    TerritorialFill,
    HostFill,
    BackupFill,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::HostChoice,
        Phase::RequesterChoice,
        Phase::TerritorialFill,
        Phase::HostFill,
        Phase::BackupFill,
    ];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Phase::HostChoice => "host choices",
            Phase::RequesterChoice => "requester choices",
            Phase::TerritorialFill => "territorial fill",
            Phase::HostFill => "host fill",
            Phase::BackupFill => "backup fill",
        };
        f.write_str(text)
    }
}

/// Diagnostic counters for one attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllocationStats {
    pub host_choice_placed: usize,
    pub host_choice_misses: usize,
    pub hosts_with_misses: usize,
    pub requester_choice_placed: usize,
    pub requester_choice_misses: usize,
    pub requesters_with_misses: usize,
    /// Requester choices already satisfied by the host-choice pass.
    pub reciprocal_choices: usize,
    pub territorial_placed: usize,
    pub host_fill_placed: usize,
    pub backup_placed: usize,
}

/// The product of one attempt.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub schedule: Schedule,
    pub stats: AllocationStats,
}

pub struct SlotAllocator<'a> {
    roster: &'a Roster,
    affinity: &'a AffinityModel,
    config: &'a EngineConfig,
}

impl<'a> SlotAllocator<'a> {
    pub fn new(roster: &'a Roster, affinity: &'a AffinityModel, config: &'a EngineConfig) -> Self {
        Self {
            roster,
            affinity,
            config,
        }
    }

    pub fn roster(&self) -> &Roster {
        self.roster
    }

    /// Runs all phases on a clean grid.
    pub fn allocate<R: Rng + ?Sized>(&self, rng: &mut R) -> Allocation {
        self.allocate_observed(rng, |_, _| {})
    }

    /// Like [`allocate`](Self::allocate), calling `observe` after each phase.
    pub fn allocate_observed<R, F>(&self, rng: &mut R, mut observe: F) -> Allocation
    where
        R: Rng + ?Sized,
        F: FnMut(Phase, &Schedule),
    {
        let mut attempt = Attempt {
            roster: self.roster,
            affinity: self.affinity,
            config: self.config,
            schedule: Schedule::new(
                self.roster.slot_count,
                &self.roster.host_availability(),
                self.roster.requesters.len(),
            ),
            stats: AllocationStats::default(),
            rng,
        };

        for phase in Phase::ALL {
            let before = attempt.schedule.total_interviews();
            match phase {
                Phase::HostChoice => attempt.host_choice_pass(),
                Phase::RequesterChoice => attempt.requester_choice_pass(),
                Phase::TerritorialFill => {
                    attempt.stats.territorial_placed = attempt.requester_fill(Bucket::Territorial)
                }
                Phase::HostFill => attempt.stats.host_fill_placed = attempt.host_fill(),
                Phase::BackupFill => {
                    attempt.stats.backup_placed = attempt.requester_fill(Bucket::Backup)
                }
            }
            debug_assert!(attempt.schedule.check_invariants().is_ok());
            debug!(
                phase = %phase,
                added = attempt.schedule.total_interviews() - before,
                total = attempt.schedule.total_interviews(),
                "phase complete"
            );
            observe(phase, &attempt.schedule);
        }

        debug!(
            host_misses = attempt.stats.host_choice_misses,
            hosts_missing = attempt.stats.hosts_with_misses,
            requester_misses = attempt.stats.requester_choice_misses,
            requesters_missing = attempt.stats.requesters_with_misses,
            reciprocal = attempt.stats.reciprocal_choices,
            "choice passes summary"
        );

        Allocation {
            schedule: attempt.schedule,
            stats: attempt.stats,
        }
    }
}

/// Mutable state owned by a single attempt.
struct Attempt<'a, 'r, R: Rng + ?Sized> {
    roster: &'a Roster,
    affinity: &'a AffinityModel,
    config: &'a EngineConfig,
    schedule: Schedule,
    stats: AllocationStats,
    rng: &'r mut R,
}

impl<R: Rng + ?Sized> Attempt<'_, '_, R> {
    fn try_place(&mut self, host: usize, requester: usize, reason: Reason) -> bool {
        match pick_common_slot(&self.schedule, host, requester, &mut *self.rng) {
            Some(slot) => self.schedule.book(host, requester, slot, reason),
            None => false,
        }
    }

    /// Phase 1: each host's r-th choice, hosts in random order, rank by rank.
    fn host_choice_pass(&mut self) {
        let mut missed = HashSet::new();
        for rank in 0..self.config.max_choices {
            let mut order: Vec<usize> = (0..self.roster.hosts.len()).collect();
            order.shuffle(&mut *self.rng);

            for host in order {
                let Some(&requester) = self.roster.host_choices[host].get(rank) else {
                    continue;
                };
                if self.schedule.is_paired(host, requester) {
                    continue;
                }
                if self.schedule.requester_open(requester) > 0
                    && self.try_place(host, requester, Reason::HostChoice)
                {
                    self.stats.host_choice_placed += 1;
                } else {
                    self.stats.host_choice_misses += 1;
                    missed.insert(host);
                }
            }
        }
        self.stats.hosts_with_misses = missed.len();
    }

    /// Phase 2: requester choices, least-served requesters first.
    fn requester_choice_pass(&mut self) {
        let mut missed = HashSet::new();
        for rank in 0..self.config.max_choices {
            let mut order: Vec<usize> = (0..self.roster.requesters.len()).collect();
            let schedule = &self.schedule;
            shuffled_sort_by_key(&mut order, &mut *self.rng, |&r| schedule.requester_assigned(r));

            for requester in order {
                let Some(&host) = self.roster.requester_choices[requester].get(rank) else {
                    continue;
                };
                if self.schedule.is_paired(host, requester) {
                    self.stats.reciprocal_choices += 1;
                    continue;
                }
                if self.schedule.host_open(host) == 0 {
                    continue;
                }
                if self.try_place(host, requester, Reason::RequesterChoice) {
                    self.stats.requester_choice_placed += 1;
                } else {
                    self.stats.requester_choice_misses += 1;
                    missed.insert(requester);
                }
            }
        }
        self.stats.requesters_with_misses = missed.len();
    }

    /// Phases 3 and 5: in round `k` every requester holding at most `k`
    /// interviews gets one more, from its best-scoring reachable host.
    fn requester_fill(&mut self, bucket: Bucket) -> usize {
        let mut placed = 0;
        for round in 0..self.roster.slot_count {
            let mut order: Vec<usize> = (0..self.roster.requesters.len()).collect();
            let schedule = &self.schedule;
            shuffled_sort_by_key(&mut order, &mut *self.rng, |&r| schedule.requester_assigned(r));

            for requester in order {
                if self.schedule.requester_assigned(requester) > round
                    || self.schedule.requester_open(requester) == 0
                {
                    continue;
                }
                for host in self.ranked_hosts(requester, bucket) {
                    if self.schedule.is_paired(host, requester) || self.schedule.host_open(host) == 0 {
                        continue;
                    }
                    if self.try_place(host, requester, Reason::AffinityAssignment) {
                        placed += 1;
                        break;
                    }
                }
            }
        }
        placed
    }

    /// Phase 4: hosts at or below the minimum pull in their best in-territory
    /// requesters until they clear it.
    fn host_fill(&mut self) -> usize {
        let minimum = self.config.min_host_interviews;
        let mut placed = 0;

        let mut order: Vec<usize> = (0..self.roster.hosts.len()).collect();
        let schedule = &self.schedule;
        shuffled_sort_by_key(&mut order, &mut *self.rng, |&h| schedule.host_assigned(h));

        for host in order {
            if self.schedule.host_assigned(host) > minimum {
                continue;
            }
            for requester in self.ranked_requesters(host) {
                if self.schedule.host_open(host) == 0 {
                    break;
                }
                if self.schedule.is_paired(host, requester)
                    || self.schedule.requester_open(requester) == 0
                {
                    continue;
                }
                if self.try_place(host, requester, Reason::AffinityAssignment) {
                    placed += 1;
                }
                if self.schedule.host_assigned(host) > minimum {
                    break;
                }
            }
        }
        placed
    }

    /// Candidate hosts for `requester` in `bucket`, best score first, ties shuffled.
    fn ranked_hosts(&mut self, requester: usize, bucket: Bucket) -> Vec<usize> {
        let affinity = self.affinity;
        let mut hosts: Vec<usize> = (0..self.roster.hosts.len())
            .filter(|&h| affinity.is_candidate(bucket, h, requester))
            .collect();
        shuffled_sort_by_key(&mut hosts, &mut *self.rng, |&h| {
            Reverse(affinity.score(bucket, h, requester))
        });
        hosts
    }

    /// Requesters with a positive territorial score for `host`, best first.
    fn ranked_requesters(&mut self, host: usize) -> Vec<usize> {
        let affinity = self.affinity;
        let mut requesters: Vec<usize> = (0..self.roster.requesters.len())
            .filter(|&r| affinity.territorial(host, r) > 0)
            .collect();
        shuffled_sort_by_key(&mut requesters, &mut *self.rng, |&r| {
            Reverse(affinity.territorial(host, r))
        });
        requesters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Host, RecordStore, Requester};
    use crate::schedule::types::{HostCell, RequesterCell};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn allocate(store: &RecordStore, config: &EngineConfig, seed: u64) -> (Roster, Allocation) {
        let roster = Roster::build(store, config);
        let affinity = AffinityModel::build(&roster, config.rank_weight_base);
        let allocation = {
            let allocator = SlotAllocator::new(&roster, &affinity, config);
            allocator.allocate(&mut ChaCha8Rng::seed_from_u64(seed))
        };
        (roster, allocation)
    }

    #[test]
    fn host_choice_is_placed_first() {
        let mut store = RecordStore::default();
        store.add_host(Host::new("h1", "H1", "North", 8));
        store.add_requester(Requester::new("r1", "R1"));
        store.set_host_choices("h1", &["r1"]);

        let (_, allocation) = allocate(&store, &EngineConfig::default(), 1);
        let assignments = allocation.schedule.assignments();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].reason, Reason::HostChoice);
        assert_eq!(allocation.stats.host_choice_placed, 1);
    }

    #[test]
    fn full_requester_counts_as_host_miss() {
        let config = EngineConfig {
            slot_count: 1,
            ..EngineConfig::default()
        };
        let mut store = RecordStore::default();
        store.add_host(Host::new("h1", "H1", "North", 1));
        store.add_host(Host::new("h2", "H2", "North", 1));
        store.add_requester(Requester::new("r1", "R1"));
        store.set_host_choices("h1", &["r1"]);
        store.set_host_choices("h2", &["r1"]);

        let (_, allocation) = allocate(&store, &config, 9);
        assert_eq!(allocation.schedule.total_interviews(), 1);
        assert_eq!(allocation.stats.host_choice_misses, 1);
        assert_eq!(allocation.stats.hosts_with_misses, 1);
    }

    #[test]
    fn requester_choice_fills_open_host() {
        let mut store = RecordStore::default();
        store.add_host(Host::new("h1", "H1", "North", 8));
        store.add_requester(Requester::new("r1", "R1"));
        store.set_requester_choices("r1", &["h1"]);

        let (_, allocation) = allocate(&store, &EngineConfig::default(), 4);
        assert_eq!(allocation.schedule.assignments()[0].reason, Reason::RequesterChoice);
        assert_eq!(allocation.stats.reciprocal_choices, 0);
    }

    #[test]
    fn territorial_fill_only_reaches_scored_hosts() {
        let mut store = RecordStore::default();
        store.add_host(Host::new("h1", "H1", "North", 8).with_interests(&["x", "y", "z"]));
        store.add_host(Host::new("h2", "H2", "North", 8).with_interests(&["z"]));
        store.add_requester(
            Requester::new("r1", "R1").with_interests(&["x"]).with_targets(&["North"]),
        );
        let (roster, allocation) = allocate(&store, &EngineConfig::default(), 11);
        let h1 = roster.host_index("h1").unwrap();
        let row = allocation.schedule.requester_row(0);
        let booked: Vec<usize> = row
            .iter()
            .filter_map(|c| match c {
                RequesterCell::Booked { host, .. } => Some(*host),
                RequesterCell::Open => None,
            })
            .collect();
        // h2 shares no tag with r1, so only h1 is ever reachable
        assert_eq!(booked, vec![h1]);
        assert_eq!(allocation.stats.territorial_placed, 1);
    }

    #[test]
    fn host_fill_stops_just_above_minimum() {
        let mut store = RecordStore::default();
        store.add_host(Host::new("h1", "H1", "North", 8).with_interests(&["x"]));
        for i in 0..6 {
            store.add_requester(
                Requester::new(&format!("r{i}"), "R")
                    .with_interests(&["x"])
                    .with_targets(&["North"]),
            );
        }
        let config = EngineConfig {
            min_host_interviews: 3,
            ..EngineConfig::default()
        };
        // run the host-driven pass alone on an empty grid
        let roster = Roster::build(&store, &config);
        let affinity = AffinityModel::build(&roster, 4);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut attempt = Attempt {
            roster: &roster,
            affinity: &affinity,
            config: &config,
            schedule: Schedule::new(8, &roster.host_availability(), roster.requesters.len()),
            stats: AllocationStats::default(),
            rng: &mut rng,
        };
        let placed = attempt.host_fill();
        assert_eq!(placed, 4);
        assert_eq!(attempt.schedule.host_assigned(0), 4);
    }

    #[test]
    fn backup_fill_ignores_targets() {
        let mut store = RecordStore::default();
        store.add_host(Host::new("h1", "H1", "South", 8).with_interests(&["x"]));
        store.add_requester(
            Requester::new("r1", "R1").with_interests(&["x"]).with_targets(&["North"]),
        );

        let (_, allocation) = allocate(&store, &EngineConfig::default(), 2);
        assert_eq!(allocation.stats.territorial_placed, 0);
        assert_eq!(allocation.stats.host_fill_placed, 0);
        assert_eq!(allocation.stats.backup_placed, 1);
    }

    #[test]
    fn backup_fill_reaches_unscored_hosts_outside_targets() {
        let mut store = RecordStore::default();
        store.add_host(Host::new("h1", "H1", "North", 8).with_interests(&["optics"]));
        store.add_host(Host::new("h2", "H2", "North", 8).with_interests(&["logic"]));
        store.add_requester(
            Requester::new("r1", "R1").with_interests(&["botany"]).with_targets(&["South"]),
        );

        let (_, allocation) = allocate(&store, &EngineConfig::default(), 6);
        assert_eq!(allocation.stats.territorial_placed, 0);
        assert_eq!(allocation.stats.backup_placed, 2);
    }

    #[test]
    fn territorial_round_serves_requester_with_fewest_interviews() {
        let mut store = RecordStore::default();
        store.add_host(Host::new("h1", "H1", "North", 8).with_interests(&["x"]).with_open_slots(&[0]));
        store.add_host(Host::new("h2", "H2", "South", 8).with_open_slots(&[1]));
        store.add_host(Host::new("h3", "H3", "South", 8).with_open_slots(&[2]));
        for id in ["r1", "r2"] {
            store.add_requester(Requester::new(id, id).with_interests(&["x"]).with_targets(&["North"]));
        }
        store.set_host_choices("h2", &["r1"]);
        store.set_host_choices("h3", &["r1"]);

        for seed in 0..20 {
            let (roster, allocation) = allocate(&store, &EngineConfig::default(), seed);
            let h1 = roster.host_index("h1").unwrap();
            let r2 = roster.requester_index("r2").unwrap();
            assert_eq!(
                allocation.schedule.host_row(h1)[0],
                HostCell::Booked {
                    requester: r2,
                    reason: Reason::AffinityAssignment
                },
                "seed {seed}"
            );
        }
    }

    #[test]
    fn requester_choice_pass_serves_fewest_interviews_first() {
        let mut store = RecordStore::default();
        store.add_host(Host::new("h1", "H1", "North", 8).with_open_slots(&[0]));
        store.add_host(Host::new("h2", "H2", "North", 8).with_open_slots(&[1]));
        store.add_requester(Requester::new("r1", "R1"));
        store.add_requester(Requester::new("r2", "R2"));
        store.set_host_choices("h2", &["r1"]);
        store.set_requester_choices("r1", &["h1"]);
        store.set_requester_choices("r2", &["h1"]);

        for seed in 0..20 {
            let (roster, allocation) = allocate(&store, &EngineConfig::default(), seed);
            let h1 = roster.host_index("h1").unwrap();
            let r2 = roster.requester_index("r2").unwrap();
            assert_eq!(
                allocation.schedule.host_row(h1)[0],
                HostCell::Booked {
                    requester: r2,
                    reason: Reason::RequesterChoice
                },
                "seed {seed}"
            );
            assert_eq!(allocation.stats.requester_choice_placed, 1);
        }
    }

    #[test]
    fn observer_sees_every_phase_in_order() {
        let mut store = RecordStore::default();
        store.add_host(Host::new("h1", "H1", "North", 8));
        store.add_requester(Requester::new("r1", "R1"));
        let config = EngineConfig::default();
        let roster = Roster::build(&store, &config);
        let affinity = AffinityModel::build(&roster, 4);
        let allocator = SlotAllocator::new(&roster, &affinity, &config);

        let mut seen = Vec::new();
        allocator.allocate_observed(&mut ChaCha8Rng::seed_from_u64(0), |phase, _| {
            seen.push(phase)
        });
        assert_eq!(seen, Phase::ALL.to_vec());
    }
}
