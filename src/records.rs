//! Participant records as produced by ingestion.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub type ParticipantId = String;

/// A faculty participant offering interview slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: ParticipantId,
    pub name: String,
    pub organization: String,
    /// Ranked interest tags, most important first.
    pub interests: Vec<String>,
    /// `availability[slot]` is false when the host blocked that slot.
    pub availability: Vec<bool>,
    pub meeting_link: Option<String>,
    pub cancelled: bool,
}

impl Host {
    pub fn new(id: &str, name: &str, organization: &str, slot_count: usize) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            organization: organization.to_string(),
            interests: Vec::new(),
            availability: vec![true; slot_count],
            meeting_link: None,
            cancelled: false,
        }
    }

    pub fn with_interests(mut self, interests: &[&str]) -> Self {
        self.interests = interests.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Blocks every slot not listed in `open`.
    pub fn with_open_slots(mut self, open: &[usize]) -> Self {
        for (slot, available) in self.availability.iter_mut().enumerate() {
            *available = open.contains(&slot);
        }
        self
    }

    pub fn available_slot_count(&self) -> usize {
        self.availability.iter().filter(|a| **a).count()
    }
}

/// A scholar participant seeking interviews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub id: ParticipantId,
    pub name: String,
    pub interests: Vec<String>,
    /// Ranked organizations the requester wants to meet.
    pub target_organizations: Vec<String>,
    pub cancelled: bool,
}

impl Requester {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            interests: Vec::new(),
            target_organizations: Vec::new(),
            cancelled: false,
        }
    }

    pub fn with_interests(mut self, interests: &[&str]) -> Self {
        self.interests = interests.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_targets(mut self, targets: &[&str]) -> Self {
        self.target_organizations = targets.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn targets(&self, organization: &str) -> bool {
        let organization = organization.trim();
        self.target_organizations
            .iter()
            .any(|t| t.trim().eq_ignore_ascii_case(organization))
    }
}

/// Everything the engine consumes for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordStore {
    pub hosts: BTreeMap<ParticipantId, Host>,
    pub requesters: BTreeMap<ParticipantId, Requester>,
    /// Host id -> requester ids, rank 1 first.
    pub host_preferences: BTreeMap<ParticipantId, Vec<ParticipantId>>,
    /// Requester id -> host ids, rank 1 first.
    pub requester_preferences: BTreeMap<ParticipantId, Vec<ParticipantId>>,
}

impl RecordStore {
    pub fn add_host(&mut self, host: Host) {
        self.hosts.insert(host.id.clone(), host);
    }

    pub fn add_requester(&mut self, requester: Requester) {
        self.requesters.insert(requester.id.clone(), requester);
    }

    pub fn set_host_choices(&mut self, host: &str, choices: &[&str]) {
        self.host_preferences.insert(
            host.to_string(),
            choices.iter().map(|c| c.to_string()).collect(),
        );
    }

    pub fn set_requester_choices(&mut self, requester: &str, choices: &[&str]) {
        self.requester_preferences.insert(
            requester.to_string(),
            choices.iter().map(|c| c.to_string()).collect(),
        );
    }

    pub fn live_hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values().filter(|h| !h.cancelled)
    }

    pub fn live_requesters(&self) -> impl Iterator<Item = &Requester> {
        self.requesters.values().filter(|r| !r.cancelled)
    }

    /// Live hosts that no live requester listed as a choice.
    pub fn unchosen_hosts(&self) -> Vec<&Host> {
        let chosen: BTreeSet<&str> = self
            .requester_preferences
            .iter()
            .filter(|(id, _)| self.requesters.get(*id).is_some_and(|r| !r.cancelled))
            .flat_map(|(_, choices)| choices.iter().map(String::as_str))
            .collect();
        self.live_hosts()
            .filter(|h| !chosen.contains(h.id.as_str()))
            .collect()
    }

    /// Per-tag counts of live hosts and requesters listing it.
    pub fn interest_popularity(&self) -> Vec<InterestPopularity> {
        let mut table: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for host in self.live_hosts() {
            for tag in &host.interests {
                table.entry(tag.as_str()).or_default().0 += 1;
            }
        }
        for requester in self.live_requesters() {
            for tag in &requester.interests {
                table.entry(tag.as_str()).or_default().1 += 1;
            }
        }
        let host_total: usize = table.values().map(|(h, _)| h).sum();
        let requester_total: usize = table.values().map(|(_, r)| r).sum();

        let mut rows: Vec<InterestPopularity> = table
            .into_iter()
            .map(|(tag, (hosts, requesters))| InterestPopularity {
                tag: tag.to_string(),
                hosts,
                requesters,
                host_share: share(hosts, host_total),
                requester_share: share(requesters, requester_total),
            })
            .collect();
        rows.sort_by(|a, b| b.hosts.cmp(&a.hosts).then_with(|| a.tag.cmp(&b.tag)));
        rows
    }
}

fn share(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterestPopularity {
    pub tag: String,
    pub hosts: usize,
    pub requesters: usize,
    pub host_share: f64,
    pub requester_share: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_match_ignores_case_and_padding() {
        let requester = Requester::new("r1", "R One").with_targets(&[" State University "]);
        assert!(requester.targets("state university"));
        assert!(!requester.targets("Other College"));
    }

    #[test]
    fn popularity_counts_only_live_participants() {
        let mut store = RecordStore::default();
        store.add_host(Host::new("h1", "H1", "Org", 8).with_interests(&["genomics", "ecology"]));
        let mut gone = Host::new("h2", "H2", "Org", 8).with_interests(&["genomics"]);
        gone.cancelled = true;
        store.add_host(gone);
        store.add_requester(Requester::new("r1", "R1").with_interests(&["genomics"]));

        let rows = store.interest_popularity();
        let genomics = rows.iter().find(|r| r.tag == "genomics").unwrap();
        assert_eq!(genomics.hosts, 1);
        assert_eq!(genomics.requesters, 1);
        assert!((genomics.host_share - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn unchosen_hosts_ignores_cancelled_requesters() {
        let mut store = RecordStore::default();
        store.add_host(Host::new("h1", "H1", "Org", 8));
        store.add_host(Host::new("h2", "H2", "Org", 8));
        store.add_requester(Requester::new("r1", "R1"));
        let mut gone = Requester::new("r2", "R2");
        gone.cancelled = true;
        store.add_requester(gone);
        store.set_requester_choices("r1", &["h1"]);
        store.set_requester_choices("r2", &["h2"]);

        let unchosen: Vec<&str> = store.unchosen_hosts().iter().map(|h| h.id.as_str()).collect();
        assert_eq!(unchosen, vec!["h2"]);
    }
}
