use csv::{ReaderBuilder, StringRecord};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{Result, SchedulerError};
use crate::records::{Host, ParticipantId, RecordStore, Requester};

pub const HOSTS_FILE: &str = "hosts.csv";
pub const REQUESTERS_FILE: &str = "requesters.csv";
pub const HOST_CHOICES_FILE: &str = "host_choices.csv";
pub const REQUESTER_CHOICES_FILE: &str = "requester_choices.csv";
pub const HOST_CANCELLATIONS_FILE: &str = "host_cancellations.csv";
pub const REQUESTER_CANCELLATIONS_FILE: &str = "requester_cancellations.csv";

/// One row of a choices file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceRow {
    pub id: ParticipantId,
    /// Raw choice cells, rank 1 first, empties removed.
    pub choices: Vec<String>,
    /// Per-slot availability, present when the file has slot columns.
    pub availability: Option<Vec<bool>>,
}

/// Removes non-printable characters and surrounding whitespace
pub fn clean_string(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Ids are matched case-insensitively
pub fn normalize_id(text: &str) -> String {
    clean_string(text).to_lowercase()
}

/// Lower-case name with all whitespace removed, used to resolve choices by name
pub fn compact_name(text: &str) -> String {
    clean_string(text)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// Parses an interest cell; placeholders yield None
fn parse_interest(cell: &str) -> Option<String> {
    let interest = clean_string(cell).to_lowercase();
    match interest.as_str() {
        "" | "other" | "nopreference" | "no preference" => None,
        _ => Some(interest),
    }
}

/// Reads the interest at `col`. An "Other" answer points at the free-text cell
/// that follows it.
fn read_interest(record: &StringRecord, col: usize) -> Option<String> {
    let cell = field(record, col);
    if names_other(cell) {
        return parse_interest(field(record, col + 1));
    }
    parse_interest(cell)
}

fn names_other(cell: &str) -> bool {
    cell.split(|c: char| !c.is_alphanumeric())
        .any(|word| word.eq_ignore_ascii_case("other"))
}

/// An availability cell blocks its slot when it contains the word "no"
fn is_blocked(cell: &str) -> bool {
    cell.split(|c: char| !c.is_alphanumeric())
        .any(|word| word.eq_ignore_ascii_case("no"))
}

/// Splits a list of organizations on `;` or newlines
fn split_organizations(cell: &str) -> Vec<String> {
    cell.split(|c| c == ';' || c == '\n')
        .map(clean_string)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Finds a column by exact header first, then by substring
fn find_column(headers: &StringRecord, file: &str, needles: &[&str]) -> Result<usize> {
    find_optional_column(headers, needles)
        .ok_or_else(|| SchedulerError::missing_column(file, needles.join("|")))
}

fn find_optional_column(headers: &StringRecord, needles: &[&str]) -> Option<usize> {
    let lowered: Vec<String> = headers.iter().map(|h| clean_string(h).to_lowercase()).collect();
    needles
        .iter()
        .find_map(|needle| lowered.iter().position(|h| h == needle))
        .or_else(|| {
            needles
                .iter()
                .find_map(|needle| lowered.iter().position(|h| h.contains(needle)))
        })
}

/// All columns whose header contains `needle`, in file order
fn find_numbered_columns(headers: &StringRecord, needle: &str) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .filter(|(_, h)| clean_string(h).to_lowercase().contains(needle))
        .map(|(i, _)| i)
        .collect()
}

/// Interest columns, leaving out the free-text "other" columns beside them.
fn find_interest_columns(headers: &StringRecord) -> Vec<usize> {
    find_numbered_columns(headers, "interest")
        .into_iter()
        .filter(|&c| !names_other(&headers[c]))
        .collect()
}

fn field<'r>(record: &'r StringRecord, column: usize) -> &'r str {
    record.get(column).unwrap_or("")
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    Ok(ReaderBuilder::new().flexible(true).from_path(path)?)
}

fn file_label(path: &Path) -> String {
    path.display().to_string()
}

/// Loads host registrations. A later row for the same id replaces the earlier one.
pub fn load_hosts<P: AsRef<Path>>(path: P, slot_count: usize) -> Result<Vec<Host>> {
    let path = path.as_ref();
    let label = file_label(path);
    let mut reader = open_reader(path)?;
    let headers = reader.headers()?.clone();

    let id_col = find_column(&headers, &label, &["id", "email"])?;
    let name_col = find_column(&headers, &label, &["name"])?;
    let org_col = find_column(&headers, &label, &["organization", "university"])?;
    let interest_cols = find_interest_columns(&headers);
    let link_col = find_optional_column(&headers, &["link"]);

    let mut hosts: HashMap<String, Host> = HashMap::new();
    let mut order = Vec::new();
    for result in reader.records() {
        let record = result?;
        let id = normalize_id(field(&record, id_col));
        let name = clean_string(field(&record, name_col));
        if id.is_empty() || name.is_empty() {
            continue;
        }

        let mut host = Host::new(&id, &name, &clean_string(field(&record, org_col)), slot_count);
        host.interests = interest_cols
            .iter()
            .filter_map(|&c| read_interest(&record, c))
            .collect();
        host.meeting_link = link_col
            .map(|c| clean_string(field(&record, c)))
            .filter(|l| !l.is_empty());

        if hosts.insert(id.clone(), host).is_some() {
            warn!(host = %id, file = %label, "host registered twice, keeping the later row");
        } else {
            order.push(id);
        }
    }

    Ok(order.into_iter().filter_map(|id| hosts.remove(&id)).collect())
}

/// Loads requester registrations. A later row for the same id replaces the earlier one.
pub fn load_requesters<P: AsRef<Path>>(path: P) -> Result<Vec<Requester>> {
    let path = path.as_ref();
    let label = file_label(path);
    let mut reader = open_reader(path)?;
    let headers = reader.headers()?.clone();

    let id_col = find_column(&headers, &label, &["id", "email"])?;
    let name_col = find_column(&headers, &label, &["name"])?;
    let target_col = find_column(&headers, &label, &["targets", "target", "organizations"])?;
    let interest_cols = find_interest_columns(&headers);

    let mut requesters: HashMap<String, Requester> = HashMap::new();
    let mut order = Vec::new();
    for result in reader.records() {
        let record = result?;
        let id = normalize_id(field(&record, id_col));
        let name = clean_string(field(&record, name_col));
        if id.is_empty() || name.is_empty() {
            continue;
        }

        let mut requester = Requester::new(&id, &name);
        requester.interests = interest_cols
            .iter()
            .filter_map(|&c| read_interest(&record, c))
            .collect();
        requester.target_organizations = split_organizations(field(&record, target_col));

        if requesters.insert(id.clone(), requester).is_some() {
            warn!(requester = %id, file = %label, "requester registered twice, keeping the later row");
        } else {
            order.push(id);
        }
    }

    Ok(order.into_iter().filter_map(|id| requesters.remove(&id)).collect())
}

/// Loads a choices file; slot columns are read only when `slot_count > 0`.
pub fn load_choices<P: AsRef<Path>>(path: P, slot_count: usize) -> Result<Vec<ChoiceRow>> {
    let path = path.as_ref();
    let label = file_label(path);
    let mut reader = open_reader(path)?;
    let headers = reader.headers()?.clone();

    let id_col = find_column(&headers, &label, &["id", "email"])?;
    let choice_cols = find_numbered_columns(&headers, "choice");
    let slot_cols: Vec<usize> = find_numbered_columns(&headers, "slot")
        .into_iter()
        .take(slot_count)
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let id = normalize_id(field(&record, id_col));
        if id.is_empty() {
            continue;
        }
        let choices = choice_cols
            .iter()
            .map(|&c| clean_string(field(&record, c)))
            .filter(|c| !c.is_empty())
            .collect();
        let availability = if slot_cols.is_empty() {
            None
        } else {
            let mut availability = vec![true; slot_count];
            for (slot, &col) in slot_cols.iter().enumerate() {
                availability[slot] = !is_blocked(field(&record, col));
            }
            Some(availability)
        };
        rows.push(ChoiceRow {
            id,
            choices,
            availability,
        });
    }
    Ok(rows)
}

/// Loads the set of cancelled ids
pub fn load_cancellations<P: AsRef<Path>>(path: P) -> Result<HashSet<String>> {
    let path = path.as_ref();
    let label = file_label(path);
    let mut reader = open_reader(path)?;
    let headers = reader.headers()?.clone();
    let id_col = find_column(&headers, &label, &["id", "email"])?;

    let mut cancelled = HashSet::new();
    for result in reader.records() {
        let record = result?;
        let id = normalize_id(field(&record, id_col));
        if !id.is_empty() {
            cancelled.insert(id);
        }
    }
    Ok(cancelled)
}

/// Resolves a choice cell to a participant id: by id, then by compact name.
/// `Name - Organization` cells use the part before the separator.
fn resolve_choice(
    cell: &str,
    ids: &HashSet<String>,
    names: &HashMap<String, String>,
) -> Option<String> {
    let id = normalize_id(cell);
    if ids.contains(&id) {
        return Some(id);
    }
    let name_part = cell.split(" - ").next().unwrap_or(cell);
    names.get(&compact_name(name_part)).cloned()
}

/// Reads every input file under `dir` into a record store.
///
/// Registration files are required; choice and cancellation files are
/// optional. Choices that name nobody are dropped.
pub fn load_record_store<P: AsRef<Path>>(dir: P, config: &EngineConfig) -> Result<RecordStore> {
    let dir = dir.as_ref();
    let slot_count = config.slot_count;

    let optional = |name: &str| {
        let path = dir.join(name);
        path.exists().then_some(path)
    };

    let host_cancellations = match optional(HOST_CANCELLATIONS_FILE) {
        Some(path) => load_cancellations(path)?,
        None => HashSet::new(),
    };
    let requester_cancellations = match optional(REQUESTER_CANCELLATIONS_FILE) {
        Some(path) => load_cancellations(path)?,
        None => HashSet::new(),
    };
    info!(
        hosts = host_cancellations.len(),
        requesters = requester_cancellations.len(),
        "cancellations read"
    );

    let mut store = RecordStore::default();
    for mut host in load_hosts(dir.join(HOSTS_FILE), slot_count)? {
        host.cancelled = host_cancellations.contains(&host.id);
        store.add_host(host);
    }
    for mut requester in load_requesters(dir.join(REQUESTERS_FILE))? {
        requester.cancelled = requester_cancellations.contains(&requester.id);
        store.add_requester(requester);
    }

    let host_ids: HashSet<String> = store.hosts.keys().cloned().collect();
    let requester_ids: HashSet<String> = store.requesters.keys().cloned().collect();
    let host_names: HashMap<String, String> = store
        .hosts
        .values()
        .map(|h| (compact_name(&h.name), h.id.clone()))
        .collect();
    let requester_names: HashMap<String, String> = store
        .requesters
        .values()
        .map(|r| (compact_name(&r.name), r.id.clone()))
        .collect();

    if let Some(path) = optional(HOST_CHOICES_FILE) {
        for row in load_choices(path, slot_count)? {
            let Some(host) = store.hosts.get_mut(&row.id) else {
                debug!(host = %row.id, "choices for unknown host skipped");
                continue;
            };
            if let Some(availability) = row.availability {
                host.availability = availability;
                if host.available_slot_count() == 0 && !host.cancelled {
                    warn!(host = %host.id, "host blocked every slot, treating as cancelled");
                    host.cancelled = true;
                }
            }
            let choices = resolve_all(&row.id, &row.choices, &requester_ids, &requester_names);
            if store.host_preferences.insert(row.id.clone(), choices).is_some() {
                warn!(host = %row.id, "host submitted choices twice, keeping the later row");
            }
        }
    }

    if let Some(path) = optional(REQUESTER_CHOICES_FILE) {
        for row in load_choices(path, 0)? {
            if !store.requesters.contains_key(&row.id) {
                debug!(requester = %row.id, "choices for unknown requester skipped");
                continue;
            }
            let choices = resolve_all(&row.id, &row.choices, &host_ids, &host_names);
            if store.requester_preferences.insert(row.id.clone(), choices).is_some() {
                warn!(requester = %row.id, "requester submitted choices twice, keeping the later row");
            }
        }
    }

    info!(
        hosts = store.live_hosts().count(),
        requesters = store.live_requesters().count(),
        host_choice_lists = store.host_preferences.len(),
        requester_choice_lists = store.requester_preferences.len(),
        "record store loaded"
    );
    Ok(store)
}

fn resolve_all(
    chooser: &str,
    cells: &[String],
    ids: &HashSet<String>,
    names: &HashMap<String, String>,
) -> Vec<String> {
    cells
        .iter()
        .filter_map(|cell| {
            let resolved = resolve_choice(cell, ids, names);
            if resolved.is_none() {
                debug!(chooser, choice = %cell, "choice not found, skipping");
            }
            resolved
        })
        .collect()
}
