//! Index-addressed view of the live participants.
//!
//! The allocator works on dense indices; the roster maps them back to the
//! records for reporting. Choice lists are resolved here once per run.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::records::{Host, ParticipantId, RecordStore, Requester};

#[derive(Debug, Clone)]
pub struct Roster {
    pub slot_count: usize,
    pub hosts: Vec<Host>,
    pub requesters: Vec<Requester>,
    /// `host_choices[h]` lists requester indices, rank 1 first.
    pub host_choices: Vec<Vec<usize>>,
    /// `requester_choices[r]` lists host indices, rank 1 first.
    pub requester_choices: Vec<Vec<usize>>,
    host_index: HashMap<ParticipantId, usize>,
    requester_index: HashMap<ParticipantId, usize>,
}

impl Roster {
    /// Keeps non-cancelled participants, drops hosts with no open slot, and
    /// resolves preferences to live indices (unknown targets are skipped).
    pub fn build(store: &RecordStore, config: &EngineConfig) -> Self {
        let slot_count = config.slot_count;

        let mut hosts = Vec::new();
        for host in store.live_hosts() {
            let mut host = host.clone();
            host.availability.resize(slot_count, true);
            host.interests.truncate(config.max_interests);
            if host.available_slot_count() == 0 {
                warn!(host = %host.id, "host has no available slot, excluding");
                continue;
            }
            hosts.push(host);
        }

        let requesters: Vec<Requester> = store
            .live_requesters()
            .map(|r| {
                let mut r = r.clone();
                r.interests.truncate(config.max_interests);
                r
            })
            .collect();

        let host_index: HashMap<ParticipantId, usize> = hosts
            .iter()
            .enumerate()
            .map(|(i, h)| (h.id.clone(), i))
            .collect();
        let requester_index: HashMap<ParticipantId, usize> = requesters
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();

        let host_choices = hosts
            .iter()
            .map(|h| {
                resolve_choices(
                    &h.id,
                    store.host_preferences.get(&h.id),
                    &requester_index,
                    config.max_choices,
                )
            })
            .collect();
        let requester_choices = requesters
            .iter()
            .map(|r| {
                resolve_choices(
                    &r.id,
                    store.requester_preferences.get(&r.id),
                    &host_index,
                    config.max_choices,
                )
            })
            .collect();

        Self {
            slot_count,
            hosts,
            requesters,
            host_choices,
            requester_choices,
            host_index,
            requester_index,
        }
    }

    pub fn host_index(&self, id: &str) -> Option<usize> {
        self.host_index.get(id).copied()
    }

    pub fn requester_index(&self, id: &str) -> Option<usize> {
        self.requester_index.get(id).copied()
    }

    pub fn host_availability(&self) -> Vec<Vec<bool>> {
        self.hosts.iter().map(|h| h.availability.clone()).collect()
    }

    /// Total open host cells across the grid.
    pub fn host_capacity(&self) -> usize {
        self.hosts.iter().map(Host::available_slot_count).sum()
    }
}

fn resolve_choices(
    chooser: &str,
    choices: Option<&Vec<ParticipantId>>,
    index: &HashMap<ParticipantId, usize>,
    max_choices: usize,
) -> Vec<usize> {
    let mut resolved = Vec::new();
    for choice in choices.into_iter().flatten() {
        match index.get(choice) {
            Some(&target) if !resolved.contains(&target) => resolved.push(target),
            Some(_) => debug!(chooser, choice = %choice, "duplicate choice dropped"),
            None => debug!(chooser, choice = %choice, "choice names no live participant, dropped"),
        }
        if resolved.len() == max_choices {
            break;
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choices_skip_unknown_and_cancelled_targets() {
        let mut store = RecordStore::default();
        store.add_host(Host::new("h1", "H1", "Org", 8));
        store.add_requester(Requester::new("r1", "R1"));
        let mut gone = Requester::new("r2", "R2");
        gone.cancelled = true;
        store.add_requester(gone);
        store.add_requester(Requester::new("r3", "R3"));
        store.set_host_choices("h1", &["ghost", "r2", "r3", "r3", "r1"]);

        let roster = Roster::build(&store, &EngineConfig::default());
        let r1 = roster.requester_index("r1").unwrap();
        let r3 = roster.requester_index("r3").unwrap();
        assert_eq!(roster.requesters.len(), 2);
        assert_eq!(roster.host_choices[0], vec![r3, r1]);
    }

    #[test]
    fn fully_blocked_host_is_excluded() {
        let mut store = RecordStore::default();
        store.add_host(Host::new("h1", "H1", "Org", 8).with_open_slots(&[]));
        store.add_host(Host::new("h2", "H2", "Org", 8).with_open_slots(&[0, 1]));
        store.add_requester(Requester::new("r1", "R1"));
        store.set_requester_choices("r1", &["h1", "h2"]);

        let roster = Roster::build(&store, &EngineConfig::default());
        assert_eq!(roster.hosts.len(), 1);
        assert_eq!(roster.host_capacity(), 2);
        assert_eq!(roster.requester_choices[0], vec![0]);
    }

    #[test]
    fn choice_lists_are_truncated() {
        let mut store = RecordStore::default();
        store.add_host(Host::new("h1", "H1", "Org", 8));
        for i in 0..7 {
            store.add_requester(Requester::new(&format!("r{i}"), "R"));
        }
        store.set_host_choices("h1", &["r0", "r1", "r2", "r3", "r4", "r5", "r6"]);

        let config = EngineConfig {
            max_choices: 5,
            ..EngineConfig::default()
        };
        let roster = Roster::build(&store, &config);
        assert_eq!(roster.host_choices[0].len(), 5);
    }
}
