use std::collections::HashSet;

use chrono::NaiveDate;

/// Remembers which alarms already fired on which calendar day.
///
/// Owned by one scheduler instance. Pruning on every tick keeps the set
/// bounded to the alarms that fired today.
#[derive(Debug, Default)]
pub struct TriggerDeduplicator {
    fired: HashSet<(String, NaiveDate)>,
}

impl TriggerDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every record whose day is not `today`.
    pub fn prune(&mut self, today: NaiveDate) {
        self.fired.retain(|(_, day)| *day == today);
    }

    pub fn contains(&self, alarm_id: &str, day: NaiveDate) -> bool {
        self.fired.contains(&(alarm_id.to_string(), day))
    }

    /// Returns false if the record already existed.
    pub fn insert(&mut self, alarm_id: &str, day: NaiveDate) -> bool {
        self.fired.insert((alarm_id.to_string(), day))
    }

    /// Forget a record so the alarm can fire again that day.
    pub fn remove(&mut self, alarm_id: &str, day: NaiveDate) -> bool {
        self.fired.remove(&(alarm_id.to_string(), day))
    }

    pub fn len(&self) -> usize {
        self.fired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fired.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn insert_is_once_per_day() {
        let mut dedup = TriggerDeduplicator::new();
        assert!(dedup.insert("a", day(1)));
        assert!(!dedup.insert("a", day(1)));
        assert!(dedup.insert("a", day(2)));
        assert!(dedup.insert("b", day(1)));
        assert_eq!(dedup.len(), 3);
    }

    #[test]
    fn prune_keeps_only_today() {
        let mut dedup = TriggerDeduplicator::new();
        dedup.insert("a", day(1));
        dedup.insert("b", day(1));
        dedup.insert("a", day(2));

        dedup.prune(day(2));

        assert_eq!(dedup.len(), 1);
        assert!(dedup.contains("a", day(2)));
        assert!(!dedup.contains("a", day(1)));

        dedup.prune(day(3));
        assert!(dedup.is_empty());
    }

    #[test]
    fn removed_record_can_be_inserted_again() {
        let mut dedup = TriggerDeduplicator::new();
        dedup.insert("a", day(1));
        assert!(dedup.remove("a", day(1)));
        assert!(!dedup.remove("a", day(1)));
        assert!(dedup.insert("a", day(1)));
    }
}
