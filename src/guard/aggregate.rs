use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PenaltyEntry {
    pub height: u64,
    pub value: i64,
}

/// Per-height penalties for one evaluation. At most one entry per height;
/// recording a height twice keeps the later value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PenaltyMap {
    entries: BTreeMap<u64, i64>,
}

impl PenaltyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, height: u64, value: i64) {
        self.entries.insert(height, value);
    }

    pub fn get(&self, height: u64) -> Option<i64> {
        self.entries.get(&height).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending height order.
    pub fn ordered(&self) -> Vec<PenaltyEntry> {
        self.entries
            .iter()
            .map(|(&height, &value)| PenaltyEntry { height, value })
            .collect()
    }
}

impl FromIterator<(u64, i64)> for PenaltyMap {
    fn from_iter<I: IntoIterator<Item = (u64, i64)>>(iter: I) -> Self {
        let mut map = PenaltyMap::new();
        for (height, value) in iter {
            map.record(height, value);
        }
        map
    }
}

/// Sum the penalties, walking heights in ascending order.
pub fn aggregate(penalties: &PenaltyMap) -> i64 {
    penalties
        .ordered()
        .iter()
        .fold(0i64, |total, entry| total.saturating_add(entry.value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_total_is_zero() {
        assert_eq!(aggregate(&PenaltyMap::new()), 0);
    }

    #[test]
    fn test_ordered_by_height() {
        let map: PenaltyMap = vec![(994, 6), (990, 10), (992, 8)].into_iter().collect();
        let heights: Vec<u64> = map.ordered().iter().map(|e| e.height).collect();
        assert_eq!(heights, vec![990, 992, 994]);
        assert_eq!(aggregate(&map), 24);
    }

    #[test]
    fn test_repeated_height_overwrites() {
        let mut map = PenaltyMap::new();
        map.record(5, 100);
        map.record(5, -1);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(5), Some(-1));
        assert_eq!(aggregate(&map), -1);
    }

    #[test]
    fn test_sum_saturates() {
        let map: PenaltyMap = vec![(1, i64::MAX), (2, i64::MAX)].into_iter().collect();
        assert_eq!(aggregate(&map), i64::MAX);
    }
}
