use chrono::{Duration, NaiveTime};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{Result, SchedulerError};
use super::types::Schedule;

/// Parses a time string (HH:MM)
pub fn parse_time_of_day(time_str: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(time_str.trim(), "%H:%M")
        .map_err(|_| SchedulerError::InvalidTime(time_str.to_string()))
}

/// Builds `count` labels starting at `start_time`, `interval_minutes` apart.
/// Wraps past midnight.
pub fn calculate_slot_labels(start_time: &str, interval_minutes: u32, count: usize) -> Result<Vec<String>> {
    let start = parse_time_of_day(start_time)?;
    let step = Duration::minutes(i64::from(interval_minutes));

    let mut labels = Vec::with_capacity(count);
    let mut current = start;
    for _ in 0..count {
        labels.push(current.format("%H:%M").to_string());
        current = current.overflowing_add_signed(step).0;
    }
    Ok(labels)
}

/// Picks a slot uniformly among those open for both sides.
pub fn pick_common_slot<R: Rng + ?Sized>(
    schedule: &Schedule,
    host: usize,
    requester: usize,
    rng: &mut R,
) -> Option<usize> {
    schedule.common_open_slots(host, requester).choose(rng).copied()
}

/// Orders `items` by `key` ascending, breaking ties randomly.
pub fn shuffled_sort_by_key<T, K, R, F>(items: &mut [T], rng: &mut R, mut key: F)
where
    K: Ord,
    R: Rng + ?Sized,
    F: FnMut(&T) -> K,
{
    items.shuffle(rng);
    items.sort_by_key(|item| key(item));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn labels_step_by_interval_and_wrap() {
        let labels = calculate_slot_labels("23:30", 15, 4).unwrap();
        assert_eq!(labels, vec!["23:30", "23:45", "00:00", "00:15"]);
    }

    #[test]
    fn bad_time_is_rejected() {
        assert!(parse_time_of_day("25:99").is_err());
        assert!(calculate_slot_labels("noon", 15, 2).is_err());
    }

    #[test]
    fn picked_slot_is_open_on_both_sides() {
        let availability = vec![vec![false, true, false, true]];
        let mut schedule = Schedule::new(4, &availability, 2);
        schedule.book(0, 1, 1, super::super::types::Reason::HostChoice);

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..20 {
            assert_eq!(pick_common_slot(&schedule, 0, 0, &mut rng), Some(3));
        }
    }

    #[test]
    fn no_common_slot_yields_none() {
        let availability = vec![vec![true, false]];
        let mut schedule = Schedule::new(2, &availability, 2);
        schedule.book(0, 1, 0, super::super::types::Reason::HostChoice);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(pick_common_slot(&schedule, 0, 0, &mut rng), None);
    }

    #[test]
    fn sort_keeps_key_order() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut items = vec![(2, 'a'), (0, 'b'), (1, 'c'), (0, 'd')];
        shuffled_sort_by_key(&mut items, &mut rng, |(k, _)| *k);
        let keys: Vec<i32> = items.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![0, 0, 1, 2]);
    }
}
