use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::records::{Host, InterestPopularity};
use crate::schedule::{AllocationStats, CoverageReport, HostCell, RequesterCell, Roster, RunOutcome, Schedule};

/// Formats a host name with its organization
pub fn format_host_name(host: &Host) -> String {
    if host.organization.is_empty() {
        host.name.clone()
    } else {
        format!("{} ({})", host.name, host.organization)
    }
}

/// File stem for a participant's schedule: alphanumerics kept, runs of anything else become `_`
pub fn participant_file_name(name: &str) -> String {
    let mut stem = String::new();
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            stem.push(c);
        } else if !stem.ends_with('_') {
            stem.push('_');
        }
    }
    let stem = stem.trim_matches('_');
    if stem.is_empty() {
        "unnamed".to_string()
    } else {
        stem.to_string()
    }
}

/// Requesters linked to `host` by a choice in either direction but never paired with it
pub fn unscheduled_for_host(roster: &Roster, schedule: &Schedule, host: usize) -> Vec<usize> {
    let mut missed: Vec<usize> = roster.host_choices[host]
        .iter()
        .copied()
        .chain(
            roster
                .requester_choices
                .iter()
                .enumerate()
                .filter(|(_, choices)| choices.contains(&host))
                .map(|(requester, _)| requester),
        )
        .filter(|&requester| !schedule.is_paired(host, requester))
        .collect();
    missed.sort_unstable();
    missed.dedup();
    missed
}

/// Hosts linked to `requester` by a choice in either direction but never paired with it
pub fn unscheduled_for_requester(roster: &Roster, schedule: &Schedule, requester: usize) -> Vec<usize> {
    let mut missed: Vec<usize> = roster.requester_choices[requester]
        .iter()
        .copied()
        .chain(
            roster
                .host_choices
                .iter()
                .enumerate()
                .filter(|(_, choices)| choices.contains(&requester))
                .map(|(host, _)| host),
        )
        .filter(|&host| !schedule.is_paired(host, requester))
        .collect();
    missed.sort_unstable();
    missed.dedup();
    missed
}

/// Writes one host's day: `HH:MM name [code]`, then the not-scheduled list
pub fn write_host_schedule_to_file(
    roster: &Roster,
    schedule: &Schedule,
    labels: &[String],
    host: usize,
    path: &Path,
) -> Result<()> {
    let mut file = File::create(path)?;
    let record = &roster.hosts[host];

    writeln!(file, "** {} **", format_host_name(record))?;
    if let Some(link) = &record.meeting_link {
        writeln!(file, "Meeting link: {}", link)?;
    }

    for (slot, cell) in schedule.host_row(host).iter().enumerate() {
        let time = slot_label(labels, slot);
        match cell {
            HostCell::Booked { requester, reason } => {
                writeln!(file, "{} {} [{}]", time, roster.requesters[*requester].name, reason.code())?
            }
            HostCell::Open => writeln!(file, "{} [OPEN]", time)?,
            HostCell::Blocked => writeln!(file, "{} [UNAVAILABLE]", time)?,
        }
    }

    let missed = unscheduled_for_host(roster, schedule, host);
    if !missed.is_empty() {
        writeln!(file)?;
        writeln!(file, "Not scheduled:")?;
        for requester in missed {
            writeln!(file, "  - {}", roster.requesters[requester].name)?;
        }
    }
    Ok(())
}

/// Writes one requester's day, with the host's meeting link beside each interview
pub fn write_requester_schedule_to_file(
    roster: &Roster,
    schedule: &Schedule,
    labels: &[String],
    requester: usize,
    path: &Path,
) -> Result<()> {
    let mut file = File::create(path)?;

    writeln!(file, "** {} **", roster.requesters[requester].name)?;
    for (slot, cell) in schedule.requester_row(requester).iter().enumerate() {
        let time = slot_label(labels, slot);
        match cell {
            RequesterCell::Booked { host, reason } => {
                let host = &roster.hosts[*host];
                match &host.meeting_link {
                    Some(link) => writeln!(
                        file,
                        "{} {} [{}] {}",
                        time,
                        format_host_name(host),
                        reason.code(),
                        link
                    )?,
                    None => writeln!(file, "{} {} [{}]", time, format_host_name(host), reason.code())?,
                }
            }
            RequesterCell::Open => writeln!(file, "{} [OPEN]", time)?,
        }
    }

    let missed = unscheduled_for_requester(roster, schedule, requester);
    if !missed.is_empty() {
        writeln!(file)?;
        writeln!(file, "Not scheduled:")?;
        for host in missed {
            writeln!(file, "  - {}", format_host_name(&roster.hosts[host]))?;
        }
    }
    Ok(())
}

fn slot_label(labels: &[String], slot: usize) -> String {
    labels
        .get(slot)
        .cloned()
        .unwrap_or_else(|| format!("Slot {}", slot + 1))
}

fn print_histogram(title: &str, histogram: &[usize]) {
    println!("{}:", title);
    for (count, participants) in histogram.iter().enumerate() {
        if *participants > 0 {
            println!("  {:>2} interviews: {:>4} {}", count, participants, "#".repeat((*participants).min(60)));
        }
    }
}

/// Prints the outcome of a run: attempts, histograms and who fell short
pub fn print_run_summary(roster: &Roster, outcome: &RunOutcome) {
    let report = &outcome.report;
    println!("\n=== Scheduling Result ===");
    println!(
        "Outcome: {:?} after {} attempt(s) (budget {}, chosen attempt {}, seed {})",
        outcome.outcome, outcome.attempts, outcome.budget, outcome.chosen_attempt, outcome.seed
    );
    println!("Total interviews: {}", report.total_interviews);
    print_coverage(roster, report);
    print_allocation_stats(&outcome.allocation.stats);
}

pub fn print_coverage(roster: &Roster, report: &CoverageReport) {
    println!();
    print_histogram("Hosts by interview count", &report.host_histogram);
    print_histogram("Hosts by filled slots (booked or unavailable)", &report.host_fill_histogram);
    print_histogram("Requesters by interview count", &report.requester_histogram);
    println!(
        "Hosts full: {}, with capacity: {}; requesters full: {}, with capacity: {}",
        report.hosts_full, report.hosts_with_capacity, report.requesters_full, report.requesters_with_capacity
    );

    if !report.hosts_below_min.is_empty() {
        println!("⚠️  Hosts below minimum ({}):", report.hosts_below_min.len());
        for &host in &report.hosts_below_min {
            println!("  - {}", format_host_name(&roster.hosts[host]));
        }
    }
    if !report.requesters_below_min.is_empty() {
        println!("⚠️  Requesters below minimum ({}):", report.requesters_below_min.len());
        for &requester in &report.requesters_below_min {
            println!("  - {}", roster.requesters[requester].name);
        }
    }
}

pub fn print_allocation_stats(stats: &AllocationStats) {
    println!("\nPlacements by phase:");
    println!("  host choices:      {}", stats.host_choice_placed);
    println!("  requester choices: {}", stats.requester_choice_placed);
    println!("  territorial fill:  {}", stats.territorial_placed);
    println!("  host fill:         {}", stats.host_fill_placed);
    println!("  backup fill:       {}", stats.backup_placed);
    println!(
        "Host choices missed: {} across {} host(s)",
        stats.host_choice_misses, stats.hosts_with_misses
    );
    println!(
        "Requester choices missed: {} across {} requester(s); reciprocal choices: {}",
        stats.requester_choice_misses, stats.requesters_with_misses, stats.reciprocal_choices
    );
}

pub fn print_interest_popularity(rows: &[InterestPopularity]) {
    println!("\n=== Interest Popularity ===");
    println!("  {:<30} {:>6} {:>7} {:>10} {:>7}", "interest", "hosts", "share", "requesters", "share");
    for row in rows {
        println!(
            "  {:<30} {:>6} {:>6.1}% {:>10} {:>6.1}%",
            row.tag,
            row.hosts,
            row.host_share * 100.0,
            row.requesters,
            row.requester_share * 100.0
        );
    }
}

pub fn print_unchosen_hosts(hosts: &[&Host]) {
    if hosts.is_empty() {
        return;
    }
    println!("\nHosts no requester chose ({}):", hosts.len());
    for host in hosts {
        println!("  - {}", format_host_name(host));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::records::{RecordStore, Requester};
    use crate::schedule::Reason;
    use std::fs;

    fn roster() -> Roster {
        let mut store = RecordStore::default();
        let mut host = Host::new("h1", "Grace Hopper", "North", 4).with_open_slots(&[0, 1, 2]);
        host.meeting_link = Some("https://meet/gh".to_string());
        store.add_host(host);
        store.add_requester(Requester::new("r1", "Ada Lovelace"));
        store.add_requester(Requester::new("r2", "Charles Babbage"));
        store.set_host_choices("h1", &["r1"]);
        store.set_requester_choices("r2", &["h1"]);
        let config = EngineConfig {
            slot_count: 4,
            ..EngineConfig::default()
        };
        Roster::build(&store, &config)
    }

    #[test]
    fn file_names_are_sanitised() {
        assert_eq!(participant_file_name("Dr. Ada  Lovelace"), "Dr_Ada_Lovelace");
        assert_eq!(participant_file_name("../"), "unnamed");
    }

    #[test]
    fn unscheduled_lists_both_directions() {
        let roster = roster();
        let schedule = Schedule::new(4, &roster.host_availability(), 2);
        assert_eq!(unscheduled_for_host(&roster, &schedule, 0), vec![0, 1]);
        assert_eq!(unscheduled_for_requester(&roster, &schedule, 0), vec![0]);
    }

    #[test]
    fn host_file_shows_bookings_and_misses() {
        let roster = roster();
        let mut schedule = Schedule::new(4, &roster.host_availability(), 2);
        assert!(schedule.book(0, 0, 1, Reason::HostChoice));
        let labels: Vec<String> = ["09:45", "10:00", "10:15", "10:30"].iter().map(|s| s.to_string()).collect();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.txt");
        write_host_schedule_to_file(&roster, &schedule, &labels, 0, &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();

        assert!(text.starts_with("** Grace Hopper (North) **\nMeeting link: https://meet/gh\n"));
        assert!(text.contains("09:45 [OPEN]"));
        assert!(text.contains("10:00 Ada Lovelace [HC]"));
        assert!(text.contains("10:30 [UNAVAILABLE]"));
        assert!(text.ends_with("Not scheduled:\n  - Charles Babbage\n"));
    }

    #[test]
    fn requester_file_carries_meeting_link() {
        let roster = roster();
        let mut schedule = Schedule::new(4, &roster.host_availability(), 2);
        assert!(schedule.book(0, 1, 2, Reason::RequesterChoice));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requester.txt");
        write_requester_schedule_to_file(&roster, &schedule, &[], 1, &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();

        assert!(text.contains("Slot 3 Grace Hopper (North) [RC] https://meet/gh"));
        assert!(!text.contains("Not scheduled"));
    }
}
