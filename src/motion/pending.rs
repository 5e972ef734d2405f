//! Completed moved regions waiting to be applied.

use crate::region::{ExtentArena, MovedRegion};
use crate::search::CompletedRegionSink;
use crate::set::{OrderedSet, SkipArena};
use crate::util::{DenoiseError, DenoiseResult};
use std::cmp::Ordering;

/// Queue order: more points first, then shorter vectors, then arrival.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PendingKey {
    points: u64,
    squared_length: u32,
    id: u32,
}

impl Ord for PendingKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .points
            .cmp(&self.points)
            .then(self.squared_length.cmp(&other.squared_length))
            .then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for PendingKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of completed regions.
///
/// Regions no larger than `min_points` are not worth a flood fill and are
/// released immediately.
pub(crate) struct PendingRegions {
    keys: SkipArena<PendingKey>,
    order: OrderedSet<PendingKey>,
    slots: Vec<Option<MovedRegion>>,
    free: Vec<u32>,
    min_points: u64,
}

impl PendingRegions {
    pub fn new(min_points: u64) -> Self {
        Self {
            keys: SkipArena::new(),
            order: OrderedSet::new(),
            slots: Vec::new(),
            free: Vec::new(),
            min_points,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Point count of the best queued region.
    pub fn peek_points(&self) -> Option<u64> {
        self.order
            .first()
            .map(|cursor| self.order.get(&self.keys, cursor).points)
    }

    /// Removes the best queued region.
    pub fn pop(&mut self) -> DenoiseResult<Option<MovedRegion>> {
        let Some(cursor) = self.order.first() else {
            return Ok(None);
        };
        let key = *self.order.get(&self.keys, cursor);
        self.order.erase(&mut self.keys, cursor)?;
        self.free.push(key.id);
        self.slots[key.id as usize]
            .take()
            .map(Some)
            .ok_or(DenoiseError::InvariantViolation("queued region slot is empty"))
    }

    /// Releases every queued region.
    pub fn clear(&mut self, arena: &mut ExtentArena) {
        for slot in &mut self.slots {
            if let Some(mut region) = slot.take() {
                region.clear(arena);
            }
        }
        self.slots.clear();
        self.free.clear();
        self.order.clear(&mut self.keys);
    }
}

impl CompletedRegionSink for PendingRegions {
    fn on_completed_region(
        &mut self,
        arena: &mut ExtentArena,
        mut region: MovedRegion,
    ) -> DenoiseResult<()> {
        let points = region.number_of_points();
        if points <= self.min_points {
            region.clear(arena);
            return Ok(());
        }
        let id = match self.free.pop() {
            Some(id) => id,
            None => {
                self.slots.push(None);
                (self.slots.len() - 1) as u32
            }
        };
        let key = PendingKey {
            points,
            squared_length: region.motion.squared_length(),
            id,
        };
        if let Err(err) = self.order.insert(&mut self.keys, key) {
            self.free.push(id);
            region.clear(arena);
            return Err(err);
        }
        self.slots[id as usize] = Some(region);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::PendingRegions;
    use crate::region::{Extent, ExtentArena, MotionVector, MovedRegion, Region, SparseRegion};
    use crate::search::CompletedRegionSink;

    fn region(arena: &mut ExtentArena, width: i32, rows: i32, motion: MotionVector) -> MovedRegion {
        let mut region = SparseRegion::new();
        for y in 0..rows {
            region.union_extent(arena, Extent::new(y, 0, width)).unwrap();
        }
        MovedRegion::new(region, motion)
    }

    #[test]
    fn pops_largest_then_shortest() {
        let mut arena = ExtentArena::new();
        let mut queue = PendingRegions::new(16);
        let far = region(&mut arena, 10, 2, MotionVector::new(3, 3));
        let near = region(&mut arena, 10, 2, MotionVector::new(1, 0));
        let big = region(&mut arena, 10, 3, MotionVector::new(4, 4));
        queue.on_completed_region(&mut arena, far).unwrap();
        queue.on_completed_region(&mut arena, near).unwrap();
        queue.on_completed_region(&mut arena, big).unwrap();
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.peek_points(), Some(30));

        let order: Vec<MotionVector> = std::iter::from_fn(|| queue.pop().unwrap())
            .map(|mut r| {
                r.clear(&mut arena);
                r.motion
            })
            .collect();
        assert_eq!(
            order,
            vec![
                MotionVector::new(4, 4),
                MotionVector::new(1, 0),
                MotionVector::new(3, 3)
            ]
        );
        assert_eq!(arena.live_nodes(), 0);
    }

    #[test]
    fn small_regions_are_released() {
        let mut arena = ExtentArena::new();
        let mut queue = PendingRegions::new(16);
        let small = region(&mut arena, 8, 2, MotionVector::ZERO);
        queue.on_completed_region(&mut arena, small).unwrap();
        assert_eq!(queue.len(), 0);
        assert_eq!(arena.live_nodes(), 0);
    }
}
