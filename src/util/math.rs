//! Small integer helpers shared by the search structures.

/// Converts a pixel coordinate or size to the signed coordinate space used by
/// regions, saturating at `i32::MAX`.
#[inline]
pub(crate) fn to_coord(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Returns `numerator / denominator` rounded half up, for positive denominators.
#[inline]
pub(crate) fn div_round(numerator: u32, denominator: u32) -> u32 {
    (numerator + denominator / 2) / denominator
}

/// Percentage of `part` in `whole`, for log output.
pub(crate) fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 * 100.0 / whole as f64
}

#[cfg(test)]
mod tests {
    use super::{div_round, percent, to_coord};

    #[test]
    fn div_round_rounds_half_up() {
        assert_eq!(div_round(4, 3), 1);
        assert_eq!(div_round(5, 3), 2);
        assert_eq!(div_round(3, 2), 2);
        assert_eq!(div_round(200, 2), 100);
        assert_eq!(div_round(201, 2), 101);
    }

    #[test]
    fn to_coord_saturates() {
        assert_eq!(to_coord(17), 17);
        assert_eq!(to_coord(usize::MAX), i32::MAX);
    }

    #[test]
    fn percent_handles_empty_whole() {
        assert_eq!(percent(3, 0), 0.0);
        assert!((percent(1, 4) - 25.0).abs() < 1e-9);
    }
}
