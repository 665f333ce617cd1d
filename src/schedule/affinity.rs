//! Rank-weighted interest overlap between hosts and requesters.
//!
//! A shared tag ranked `a` by the host and `b` by the requester (1-based)
//! contributes `(K + 1 - a) * (K + 1 - b)`. The sum lands in the territorial
//! bucket when the requester targets the host's organization, otherwise in
//! the backup bucket. Every host outside a requester's targets is a backup
//! candidate, scored or not. Computed once per run and shared read-only by
//! every attempt.

use std::collections::HashMap;

use super::roster::Roster;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Territorial,
    Backup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffinityModel {
    requester_count: usize,
    territorial: Vec<u32>,
    backup: Vec<u32>,
    in_territory: Vec<bool>,
}

impl AffinityModel {
    pub fn build(roster: &Roster, rank_weight_base: u32) -> Self {
        let host_count = roster.hosts.len();
        let requester_count = roster.requesters.len();
        let mut model = Self {
            requester_count,
            territorial: vec![0; host_count * requester_count],
            backup: vec![0; host_count * requester_count],
            in_territory: vec![false; host_count * requester_count],
        };

        for (host, record) in roster.hosts.iter().enumerate() {
            for (requester, seeker) in roster.requesters.iter().enumerate() {
                model.in_territory[host * requester_count + requester] = seeker.targets(&record.organization);
            }
        }

        // tag -> [(participant, rank)]
        let host_tags = inverted_index(roster.hosts.iter().map(|h| h.interests.as_slice()));
        let requester_tags =
            inverted_index(roster.requesters.iter().map(|r| r.interests.as_slice()));

        for (tag, hosts) in &host_tags {
            let Some(requesters) = requester_tags.get(tag) else {
                continue;
            };
            for &(host, host_rank) in hosts {
                for &(requester, requester_rank) in requesters {
                    let weight = rank_weight(rank_weight_base, host_rank)
                        * rank_weight(rank_weight_base, requester_rank);
                    let cell = host * requester_count + requester;
                    if model.in_territory[cell] {
                        model.territorial[cell] += weight;
                    } else {
                        model.backup[cell] += weight;
                    }
                }
            }
        }
        model
    }

    pub fn score(&self, bucket: Bucket, host: usize, requester: usize) -> u32 {
        let cell = host * self.requester_count + requester;
        match bucket {
            Bucket::Territorial => self.territorial[cell],
            Bucket::Backup => self.backup[cell],
        }
    }

    pub fn territorial(&self, host: usize, requester: usize) -> u32 {
        self.score(Bucket::Territorial, host, requester)
    }

    pub fn backup(&self, host: usize, requester: usize) -> u32 {
        self.score(Bucket::Backup, host, requester)
    }

    /// True when the requester targets the host's organization.
    pub fn in_territory(&self, host: usize, requester: usize) -> bool {
        self.in_territory[host * self.requester_count + requester]
    }

    /// Territorial fills need a shared interest; backup fill takes any
    /// host outside the requester's targets.
    pub fn is_candidate(&self, bucket: Bucket, host: usize, requester: usize) -> bool {
        match bucket {
            Bucket::Territorial => self.territorial(host, requester) > 0,
            Bucket::Backup => !self.in_territory(host, requester),
        }
    }
}

/// `(K + 1 - rank)` for a 1-based rank, zero past `K`.
pub fn rank_weight(base: u32, rank: u32) -> u32 {
    (base + 1).saturating_sub(rank)
}

fn inverted_index<'a, I>(interest_lists: I) -> HashMap<&'a str, Vec<(usize, u32)>>
where
    I: Iterator<Item = &'a [String]>,
{
    let mut index: HashMap<&'a str, Vec<(usize, u32)>> = HashMap::new();
    for (participant, interests) in interest_lists.enumerate() {
        for (position, tag) in interests.iter().enumerate() {
            let entries = index.entry(tag.as_str()).or_default();
            // a repeated tag keeps its best rank
            if entries.iter().any(|(p, _)| *p == participant) {
                continue;
            }
            entries.push((participant, position as u32 + 1));
        }
    }
    index
}
