//! Portable block comparison.

use crate::pixel::Pixel;

/// Sums per-sample differences, bailing out at the first sample outside
/// `tolerance`.
#[inline]
pub(crate) fn group_difference<P: Pixel>(a: &[P], b: &[P], tolerance: u32) -> Option<u32> {
    debug_assert_eq!(a.len(), b.len());
    let mut total = 0u32;
    for (x, y) in a.iter().zip(b) {
        let diff = x.difference(y);
        if diff > tolerance {
            return None;
        }
        total += diff;
    }
    Some(total)
}
