//! Coverage statistics for a finished schedule.

use serde::Serialize;

use super::types::{HostCell, Schedule};

/// Interview minimums a schedule is judged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub min_host_interviews: usize,
    pub min_requester_interviews: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageReport {
    /// `host_histogram[n]` = hosts with exactly `n` interviews.
    pub host_histogram: Vec<usize>,
    pub requester_histogram: Vec<usize>,
    /// `host_fill_histogram[n]` = hosts with `n` slots no longer open
    /// (booked or blocked).
    pub host_fill_histogram: Vec<usize>,
    /// Roster indices, ascending.
    pub hosts_below_min: Vec<usize>,
    pub requesters_below_min: Vec<usize>,
    pub total_interviews: usize,
    pub hosts_full: usize,
    pub requesters_full: usize,
    pub hosts_with_capacity: usize,
    pub requesters_with_capacity: usize,
    pub lowest_host_count: Option<usize>,
    pub lowest_requester_count: Option<usize>,
}

impl CoverageReport {
    /// Participants below their minimum.
    pub fn shortfall(&self) -> usize {
        self.hosts_below_min.len() + self.requesters_below_min.len()
    }

    pub fn is_complete(&self) -> bool {
        self.shortfall() == 0
    }
}

/// Pure function of the schedule.
pub fn evaluate(schedule: &Schedule, thresholds: Thresholds) -> CoverageReport {
    let slot_count = schedule.slot_count();
    let mut report = CoverageReport {
        host_histogram: vec![0; slot_count + 1],
        requester_histogram: vec![0; slot_count + 1],
        host_fill_histogram: vec![0; slot_count + 1],
        hosts_below_min: Vec::new(),
        requesters_below_min: Vec::new(),
        total_interviews: schedule.total_interviews(),
        hosts_full: 0,
        requesters_full: 0,
        hosts_with_capacity: 0,
        requesters_with_capacity: 0,
        lowest_host_count: None,
        lowest_requester_count: None,
    };

    for host in 0..schedule.host_count() {
        let assigned = schedule.host_assigned(host);
        report.host_histogram[assigned] += 1;
        let not_open = schedule
            .host_row(host)
            .iter()
            .filter(|cell| **cell != HostCell::Open)
            .count();
        report.host_fill_histogram[not_open] += 1;
        if assigned < thresholds.min_host_interviews {
            report.hosts_below_min.push(host);
        }
        if schedule.host_open(host) == 0 {
            report.hosts_full += 1;
        } else {
            report.hosts_with_capacity += 1;
        }
        report.lowest_host_count = Some(report.lowest_host_count.map_or(assigned, |m| m.min(assigned)));
    }

    for requester in 0..schedule.requester_count() {
        let assigned = schedule.requester_assigned(requester);
        report.requester_histogram[assigned] += 1;
        if assigned < thresholds.min_requester_interviews {
            report.requesters_below_min.push(requester);
        }
        if schedule.requester_open(requester) == 0 {
            report.requesters_full += 1;
        } else {
            report.requesters_with_capacity += 1;
        }
        report.lowest_requester_count =
            Some(report.lowest_requester_count.map_or(assigned, |m| m.min(assigned)));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::types::Reason;

    const THREE: Thresholds = Thresholds {
        min_host_interviews: 3,
        min_requester_interviews: 3,
    };

    fn sample() -> Schedule {
        let availability = vec![vec![true; 4], vec![true, true, false, false]];
        let mut schedule = Schedule::new(4, &availability, 3);
        for (slot, requester) in [(0, 0), (1, 1), (2, 2)] {
            assert!(schedule.book(0, requester, slot, Reason::AffinityAssignment));
        }
        assert!(schedule.book(1, 0, 1, Reason::HostChoice));
        schedule
    }

    #[test]
    fn histograms_and_shortfall() {
        let report = evaluate(&sample(), THREE);
        assert_eq!(report.host_histogram, vec![0, 1, 0, 1, 0]);
        assert_eq!(report.requester_histogram, vec![0, 2, 1, 0, 0]);
        // host 1: one booked + two blocked
        assert_eq!(report.host_fill_histogram, vec![0, 0, 0, 2, 0]);
        assert_eq!(report.hosts_below_min, vec![1]);
        assert_eq!(report.requesters_below_min, vec![0, 1, 2]);
        assert_eq!(report.shortfall(), 4);
        assert_eq!(report.total_interviews, 4);
        assert_eq!(report.lowest_host_count, Some(1));
        assert_eq!(report.lowest_requester_count, Some(1));
    }

    #[test]
    fn minimum_is_strict() {
        let thresholds = Thresholds {
            min_host_interviews: 3,
            min_requester_interviews: 1,
        };
        let report = evaluate(&sample(), thresholds);
        assert!(!report.hosts_below_min.contains(&0));
        assert!(report.requesters_below_min.is_empty());
    }

    #[test]
    fn evaluation_is_repeatable() {
        let schedule = sample();
        assert_eq!(evaluate(&schedule, THREE), evaluate(&schedule, THREE));
    }

    #[test]
    fn empty_schedule_has_no_lowest_count() {
        let schedule = Schedule::new(8, &[], 0);
        let report = evaluate(&schedule, THREE);
        assert!(report.is_complete());
        assert_eq!(report.lowest_host_count, None);
        assert_eq!(report.host_histogram.len(), 9);
    }
}
