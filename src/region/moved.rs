//! Regions tagged with a motion vector.

use super::{ExtentArena, Region, SparseRegion};
use std::cmp::Ordering;

/// Displacement from a pixel in the new frame to its match in the reference
/// frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MotionVector {
    pub dx: i32,
    pub dy: i32,
}

impl MotionVector {
    pub const ZERO: MotionVector = MotionVector { dx: 0, dy: 0 };

    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }

    /// Squared Euclidean length.
    pub fn squared_length(&self) -> u32 {
        (self.dx * self.dx + self.dy * self.dy) as u32
    }
}

/// A region of the new frame whose pixels match the reference frame at a
/// common displacement.
pub struct MovedRegion<R = SparseRegion> {
    pub region: R,
    pub motion: MotionVector,
}

impl<R: Region> MovedRegion<R> {
    pub fn new(region: R, motion: MotionVector) -> Self {
        Self { region, motion }
    }

    pub fn number_of_points(&self) -> u64 {
        self.region.number_of_points()
    }

    pub fn is_empty(&self) -> bool {
        self.region.is_empty()
    }

    /// Returns the region's storage to the arena.
    pub fn clear(&mut self, arena: &mut ExtentArena) {
        self.region.clear(arena);
    }

    /// Priority order: more points first, then shorter motion vectors.
    pub fn priority_cmp(&self, other: &Self) -> Ordering {
        priority_cmp(
            self.number_of_points(),
            self.motion,
            other.number_of_points(),
            other.motion,
        )
    }
}

/// Orders candidate regions by descending point count, then ascending squared
/// motion-vector length.
pub fn priority_cmp(
    a_points: u64,
    a_motion: MotionVector,
    b_points: u64,
    b_motion: MotionVector,
) -> Ordering {
    b_points
        .cmp(&a_points)
        .then_with(|| a_motion.squared_length().cmp(&b_motion.squared_length()))
}

#[cfg(test)]
mod tests {
    use super::{priority_cmp, MotionVector};
    use std::cmp::Ordering;

    #[test]
    fn larger_regions_come_first() {
        let v = MotionVector::new(3, 0);
        assert_eq!(priority_cmp(10, v, 5, MotionVector::ZERO), Ordering::Less);
    }

    #[test]
    fn shorter_vectors_break_ties() {
        let short = MotionVector::new(1, -1);
        let long = MotionVector::new(0, 2);
        assert_eq!(short.squared_length(), 2);
        assert_eq!(priority_cmp(8, short, 8, long), Ordering::Less);
        assert_eq!(priority_cmp(8, long, 8, short), Ordering::Greater);
    }
}
