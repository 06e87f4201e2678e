/// Sensitivity multiplier for the current tip difficulty.
///
/// Higher difficulty means a reorg is costlier for an attacker, so
/// penalties are scaled down. Exactly 500,000,000 falls in the first band.
pub fn multiplier(difficulty: u64) -> u64 {
    match difficulty {
        0..=500_000_000 => 5,
        500_000_001..=19_999_999_999 => 4,
        20_000_000_000..=29_999_999_999 => 3,
        30_000_000_000..=49_999_999_999 => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_edges() {
        assert_eq!(multiplier(0), 5);
        assert_eq!(multiplier(100_000_000), 5);
        assert_eq!(multiplier(500_000_000), 5);
        assert_eq!(multiplier(500_000_001), 4);
        assert_eq!(multiplier(19_999_999_999), 4);
        assert_eq!(multiplier(20_000_000_000), 3);
        assert_eq!(multiplier(25_000_000_000), 3);
        assert_eq!(multiplier(30_000_000_000), 2);
        assert_eq!(multiplier(49_999_999_999), 2);
        assert_eq!(multiplier(50_000_000_000), 1);
        assert_eq!(multiplier(100_000_000_000), 1);
        assert_eq!(multiplier(u64::MAX), 1);
    }

    #[test]
    fn test_non_increasing() {
        let samples = [
            0,
            499_999_999,
            500_000_000,
            500_000_001,
            10_000_000_000,
            20_000_000_000,
            29_999_999_999,
            30_000_000_000,
            50_000_000_000,
            u64::MAX,
        ];
        for pair in samples.windows(2) {
            assert!(multiplier(pair[0]) >= multiplier(pair[1]));
        }
    }
}
