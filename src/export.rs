//! Writes a finished run to disk: slot grids as CSV, one text schedule per
//! participant and a JSON summary of the run.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use tracing::info;

use crate::display::{participant_file_name, write_host_schedule_to_file, write_requester_schedule_to_file};
use crate::error::Result;
use crate::schedule::{AllocationStats, CoverageReport, HostCell, Outcome, RequesterCell, Roster, RunOutcome, Schedule};

pub const HOST_SCHEDULE_FILE: &str = "host_schedule.csv";
pub const HOST_REASONS_FILE: &str = "host_reasons.csv";
pub const REQUESTER_SCHEDULE_FILE: &str = "requester_schedule.csv";
pub const REQUESTER_REASONS_FILE: &str = "requester_reasons.csv";
pub const SUMMARY_FILE: &str = "summary.json";

const EMPTY_CELL: &str = "NA";

/// Serialised as `summary.json`.
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub generated_at: DateTime<Utc>,
    pub seed: u64,
    pub attempts: usize,
    pub budget: usize,
    pub chosen_attempt: usize,
    pub outcome: Outcome,
    pub shortfall: usize,
    pub hosts_below_min: Vec<&'a str>,
    pub requesters_below_min: Vec<&'a str>,
    pub coverage: &'a CoverageReport,
    pub stats: &'a AllocationStats,
}

impl<'a> RunSummary<'a> {
    pub fn new(roster: &'a Roster, outcome: &'a RunOutcome) -> Self {
        let report = &outcome.report;
        Self {
            generated_at: Utc::now(),
            seed: outcome.seed,
            attempts: outcome.attempts,
            budget: outcome.budget,
            chosen_attempt: outcome.chosen_attempt,
            outcome: outcome.outcome,
            shortfall: report.shortfall(),
            hosts_below_min: report
                .hosts_below_min
                .iter()
                .map(|&h| roster.hosts[h].id.as_str())
                .collect(),
            requesters_below_min: report
                .requesters_below_min
                .iter()
                .map(|&r| roster.requesters[r].id.as_str())
                .collect(),
            coverage: report,
            stats: &outcome.allocation.stats,
        }
    }
}

/// Host indices ordered by name, then id
fn hosts_by_name(roster: &Roster) -> Vec<usize> {
    let mut order: Vec<usize> = (0..roster.hosts.len()).collect();
    order.sort_by(|&a, &b| {
        let (a, b) = (&roster.hosts[a], &roster.hosts[b]);
        a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id))
    });
    order
}

fn requesters_by_name(roster: &Roster) -> Vec<usize> {
    let mut order: Vec<usize> = (0..roster.requesters.len()).collect();
    order.sort_by(|&a, &b| {
        let (a, b) = (&roster.requesters[a], &roster.requesters[b]);
        a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id))
    });
    order
}

fn write_grid(path: &Path, labels: &[String], rows: Vec<(String, Vec<String>)>, describe: &str) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_path(path)?;
    let mut header = vec!["name".to_string()];
    header.extend(labels.iter().cloned());
    wtr.write_record(&header)?;
    for (name, cells) in rows {
        let mut record = vec![name];
        record.extend(cells);
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    info!(path = %path.display(), "{} written", describe);
    Ok(())
}

/// Writes `host_schedule.csv` and `host_reasons.csv`
pub fn export_host_grids(roster: &Roster, schedule: &Schedule, labels: &[String], dir: &Path) -> Result<()> {
    let mut names = Vec::new();
    let mut reasons = Vec::new();
    for host in hosts_by_name(roster) {
        let row = schedule.host_row(host);
        let name_cells = row
            .iter()
            .map(|cell| match cell {
                HostCell::Booked { requester, .. } => roster.requesters[*requester].name.clone(),
                _ => EMPTY_CELL.to_string(),
            })
            .collect();
        let reason_cells = row
            .iter()
            .map(|cell| match cell {
                HostCell::Booked { reason, .. } => reason.code().to_string(),
                _ => EMPTY_CELL.to_string(),
            })
            .collect();
        let name = roster.hosts[host].name.clone();
        names.push((name.clone(), name_cells));
        reasons.push((name, reason_cells));
    }
    write_grid(&dir.join(HOST_SCHEDULE_FILE), labels, names, "host schedule")?;
    write_grid(&dir.join(HOST_REASONS_FILE), labels, reasons, "host reasons")
}

/// Writes `requester_schedule.csv` and `requester_reasons.csv`
pub fn export_requester_grids(roster: &Roster, schedule: &Schedule, labels: &[String], dir: &Path) -> Result<()> {
    let mut names = Vec::new();
    let mut reasons = Vec::new();
    for requester in requesters_by_name(roster) {
        let row = schedule.requester_row(requester);
        let name_cells = row
            .iter()
            .map(|cell| match cell {
                RequesterCell::Booked { host, .. } => roster.hosts[*host].name.clone(),
                RequesterCell::Open => EMPTY_CELL.to_string(),
            })
            .collect();
        let reason_cells = row
            .iter()
            .map(|cell| match cell {
                RequesterCell::Booked { reason, .. } => reason.code().to_string(),
                RequesterCell::Open => EMPTY_CELL.to_string(),
            })
            .collect();
        let name = roster.requesters[requester].name.clone();
        names.push((name.clone(), name_cells));
        reasons.push((name, reason_cells));
    }
    write_grid(&dir.join(REQUESTER_SCHEDULE_FILE), labels, names, "requester schedule")?;
    write_grid(&dir.join(REQUESTER_REASONS_FILE), labels, reasons, "requester reasons")
}

/// One text file per participant under `hosts/` and `requesters/`.
/// Returns the number of files written.
pub fn export_participant_schedules(
    roster: &Roster,
    schedule: &Schedule,
    labels: &[String],
    dir: &Path,
) -> Result<usize> {
    let host_dir = dir.join("hosts");
    let requester_dir = dir.join("requesters");
    fs::create_dir_all(&host_dir)?;
    fs::create_dir_all(&requester_dir)?;

    let mut taken = HashSet::new();
    for (host, record) in roster.hosts.iter().enumerate() {
        let path = unique_path(&host_dir, &record.name, &record.id, &mut taken);
        write_host_schedule_to_file(roster, schedule, labels, host, &path)?;
    }
    for (requester, record) in roster.requesters.iter().enumerate() {
        let path = unique_path(&requester_dir, &record.name, &record.id, &mut taken);
        write_requester_schedule_to_file(roster, schedule, labels, requester, &path)?;
    }
    Ok(roster.hosts.len() + roster.requesters.len())
}

/// `<name>.txt`, falling back to `<name>_<id>.txt` when two participants share a name
fn unique_path(dir: &Path, name: &str, id: &str, taken: &mut HashSet<PathBuf>) -> PathBuf {
    let path = dir.join(format!("{}.txt", participant_file_name(name)));
    let path = if taken.contains(&path) {
        dir.join(format!("{}_{}.txt", participant_file_name(name), participant_file_name(id)))
    } else {
        path
    };
    taken.insert(path.clone());
    path
}

pub fn export_summary(summary: &RunSummary<'_>, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(SUMMARY_FILE);
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(&path, json)?;
    info!(path = %path.display(), "run summary written");
    Ok(path)
}

/// Writes every report for `outcome` into `dir`, creating it if needed.
pub fn export_all(roster: &Roster, outcome: &RunOutcome, labels: &[String], dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    let schedule = &outcome.allocation.schedule;
    export_host_grids(roster, schedule, labels, dir)?;
    export_requester_grids(roster, schedule, labels, dir)?;
    let files = export_participant_schedules(roster, schedule, labels, dir)?;
    info!(files, "participant schedules written");
    export_summary(&RunSummary::new(roster, outcome), dir)?;
    Ok(())
}
