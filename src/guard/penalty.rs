use std::cmp::Ordering;

/// Penalty for a single candidate height against the local tip.
///
/// Heights below the tip cost the number of confirmed blocks they would
/// roll back, the tip itself is neutral, and anything past the tip earns -1.
pub fn score(tip: u64, candidate: u64) -> i64 {
    match candidate.cmp(&tip) {
        Ordering::Less => i64::try_from(tip - candidate).unwrap_or(i64::MAX),
        Ordering::Equal => 0,
        Ordering::Greater => -1,
    }
}
