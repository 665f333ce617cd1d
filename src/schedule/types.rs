use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a slot was filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reason {
    HostChoice,
    RequesterChoice,
    AffinityAssignment,
}

impl Reason {
    /// Short code used in the reason grids.
    pub fn code(self) -> &'static str {
        match self {
            Reason::HostChoice => "HC",
            Reason::RequesterChoice => "RC",
            Reason::AffinityAssignment => "AA",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Reason::HostChoice => "host-choice",
            Reason::RequesterChoice => "requester-choice",
            Reason::AffinityAssignment => "affinity-assignment",
        };
        f.write_str(text)
    }
}

/// A placed interview. Participants are roster indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub host: usize,
    pub requester: usize,
    pub slot: usize,
    pub reason: Reason,
}

/// One cell of a host's row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCell {
    Blocked,
    Open,
    Booked { requester: usize, reason: Reason },
}

/// One cell of a requester's row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequesterCell {
    Open,
    Booked { host: usize, reason: Reason },
}

/// The grid for one allocation attempt.
///
/// Rows are only written through [`Schedule::book`], which refuses any
/// placement that would break a slot, pairing or availability rule, so the
/// counters always agree with the rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    slot_count: usize,
    host_rows: Vec<Vec<HostCell>>,
    requester_rows: Vec<Vec<RequesterCell>>,
    host_assigned: Vec<usize>,
    host_open: Vec<usize>,
    requester_assigned: Vec<usize>,
    requester_open: Vec<usize>,
    paired: HashSet<(usize, usize)>,
    assignments: Vec<Assignment>,
}

impl Schedule {
    /// Empty grid; `host_availability[h][slot]` false blocks the cell.
    pub fn new(slot_count: usize, host_availability: &[Vec<bool>], requester_count: usize) -> Self {
        let host_rows: Vec<Vec<HostCell>> = host_availability
            .iter()
            .map(|avail| {
                (0..slot_count)
                    .map(|slot| match avail.get(slot) {
                        Some(false) => HostCell::Blocked,
                        _ => HostCell::Open,
                    })
                    .collect()
            })
            .collect();
        let host_open = host_rows
            .iter()
            .map(|row| row.iter().filter(|c| **c == HostCell::Open).count())
            .collect();

        Self {
            slot_count,
            host_assigned: vec![0; host_rows.len()],
            host_open,
            host_rows,
            requester_rows: vec![vec![RequesterCell::Open; slot_count]; requester_count],
            requester_assigned: vec![0; requester_count],
            requester_open: vec![slot_count; requester_count],
            paired: HashSet::new(),
            assignments: Vec::new(),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn host_count(&self) -> usize {
        self.host_rows.len()
    }

    pub fn requester_count(&self) -> usize {
        self.requester_rows.len()
    }

    pub fn host_row(&self, host: usize) -> &[HostCell] {
        &self.host_rows[host]
    }

    pub fn requester_row(&self, requester: usize) -> &[RequesterCell] {
        &self.requester_rows[requester]
    }

    pub fn host_assigned(&self, host: usize) -> usize {
        self.host_assigned[host]
    }

    pub fn host_open(&self, host: usize) -> usize {
        self.host_open[host]
    }

    pub fn requester_assigned(&self, requester: usize) -> usize {
        self.requester_assigned[requester]
    }

    pub fn requester_open(&self, requester: usize) -> usize {
        self.requester_open[requester]
    }

    pub fn is_paired(&self, host: usize, requester: usize) -> bool {
        self.paired.contains(&(host, requester))
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn total_interviews(&self) -> usize {
        self.assignments.len()
    }

    pub fn host_slot_is_open(&self, host: usize, slot: usize) -> bool {
        self.host_rows[host][slot] == HostCell::Open
    }

    pub fn requester_slot_is_open(&self, requester: usize, slot: usize) -> bool {
        self.requester_rows[requester][slot] == RequesterCell::Open
    }

    /// Slots open on both sides, in slot order.
    pub fn common_open_slots(&self, host: usize, requester: usize) -> Vec<usize> {
        (0..self.slot_count)
            .filter(|&slot| {
                self.host_slot_is_open(host, slot) && self.requester_slot_is_open(requester, slot)
            })
            .collect()
    }

    /// Places one interview. Returns false, leaving the grid untouched,
    /// when the cell is taken or blocked or the pair already met.
    pub fn book(&mut self, host: usize, requester: usize, slot: usize, reason: Reason) -> bool {
        if slot >= self.slot_count
            || !self.host_slot_is_open(host, slot)
            || !self.requester_slot_is_open(requester, slot)
            || self.is_paired(host, requester)
        {
            return false;
        }

        self.host_rows[host][slot] = HostCell::Booked { requester, reason };
        self.requester_rows[requester][slot] = RequesterCell::Booked { host, reason };
        self.host_assigned[host] += 1;
        self.host_open[host] -= 1;
        self.requester_assigned[requester] += 1;
        self.requester_open[requester] -= 1;
        self.paired.insert((host, requester));
        self.assignments.push(Assignment {
            host,
            requester,
            slot,
            reason,
        });
        true
    }

    /// Recomputes every invariant from the raw rows.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut seen_pairs = HashSet::new();
        for (host, row) in self.host_rows.iter().enumerate() {
            let mut booked = 0;
            for (slot, cell) in row.iter().enumerate() {
                if let HostCell::Booked { requester, reason } = *cell {
                    booked += 1;
                    if self.requester_rows[requester][slot]
                        != (RequesterCell::Booked { host, reason })
                    {
                        return Err(InvariantViolation::SlotMismatch { host, requester, slot });
                    }
                    if !seen_pairs.insert((host, requester)) {
                        return Err(InvariantViolation::DuplicatePair { host, requester });
                    }
                }
            }
            if booked != self.host_assigned[host] {
                return Err(InvariantViolation::HostCount { host });
            }
            let open = row.iter().filter(|c| **c == HostCell::Open).count();
            if open != self.host_open[host] {
                return Err(InvariantViolation::HostCount { host });
            }
        }

        for (requester, row) in self.requester_rows.iter().enumerate() {
            let mut booked = 0;
            for (slot, cell) in row.iter().enumerate() {
                if let RequesterCell::Booked { host, .. } = *cell {
                    booked += 1;
                    match self.host_rows[host][slot] {
                        HostCell::Booked { requester: r, .. } if r == requester => {}
                        HostCell::Blocked => {
                            return Err(InvariantViolation::BlockedSlot { host, slot });
                        }
                        _ => {
                            return Err(InvariantViolation::SlotMismatch { host, requester, slot });
                        }
                    }
                }
            }
            if booked != self.requester_assigned[requester]
                || self.slot_count - booked != self.requester_open[requester]
            {
                return Err(InvariantViolation::RequesterCount { requester });
            }
        }

        if seen_pairs.len() != self.assignments.len() || seen_pairs != self.paired {
            return Err(InvariantViolation::PairIndex);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    BlockedSlot { host: usize, slot: usize },
    SlotMismatch { host: usize, requester: usize, slot: usize },
    DuplicatePair { host: usize, requester: usize },
    HostCount { host: usize },
    RequesterCount { requester: usize },
    PairIndex,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlockedSlot { host, slot } => write!(f, "host {host} booked in blocked slot {slot}"),
            Self::SlotMismatch { host, requester, slot } => {
                write!(f, "rows disagree for host {host}, requester {requester}, slot {slot}")
            }
            Self::DuplicatePair { host, requester } => {
                write!(f, "host {host} meets requester {requester} more than once")
            }
            Self::HostCount { host } => write!(f, "counters for host {host} disagree with its row"),
            Self::RequesterCount { requester } => {
                write!(f, "counters for requester {requester} disagree with its row")
            }
            Self::PairIndex => f.write_str("pair index disagrees with the grid"),
        }
    }
}

impl std::error::Error for InvariantViolation {}
