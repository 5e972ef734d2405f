//! Frontier-based flood fill shared by all region representations.

use super::{Extent, ExtentArena, Region};
use crate::util::DenoiseResult;

/// Decides which points a flood fill may absorb.
pub trait FloodFillControl {
    /// Clips or rejects a candidate extent before its points are tested.
    /// Returning `false` skips the extent entirely.
    fn should_use_extent(&mut self, extent: &mut Extent) -> bool {
        let _ = extent;
        true
    }

    /// Tests one point. Implementations may record side effects for accepted
    /// points; each point is tested at most once per flood fill.
    fn is_point_in_region(&mut self, x: i32, y: i32) -> bool;
}

/// Scratch regions reused across flood fills.
pub struct FloodFillWork<R> {
    pub(crate) to_do: R,
    pub(crate) already_done: R,
    pub(crate) next_to_do: R,
}

impl<R: Region> FloodFillWork<R> {
    /// Builds the work set from three empty regions of the same shape.
    pub fn new(to_do: R, already_done: R, next_to_do: R) -> Self {
        Self {
            to_do,
            already_done,
            next_to_do,
        }
    }

    /// Returns all scratch storage to the arena.
    pub fn clear(&mut self, arena: &mut ExtentArena) {
        self.to_do.clear(arena);
        self.already_done.clear(arena);
        self.next_to_do.clear(arena);
    }
}

pub(super) fn flood_fill<R: Region, C: FloodFillControl>(
    region: &mut R,
    arena: &mut ExtentArena,
    work: &mut FloodFillWork<R>,
    control: &mut C,
    verify: bool,
) -> DenoiseResult<()> {
    if verify {
        // Every existing point is tested again, so the region restarts empty.
        work.already_done.clear(arena);
        work.to_do.clear(arena);
        if work.to_do.can_move_from(region) {
            work.to_do.move_from(arena, region)?;
        } else {
            work.to_do.union_region(arena, &*region)?;
            region.clear(arena);
        }
    } else {
        work.already_done.assign(arena, &*region)?;
        work.to_do.make_border(arena, &*region)?;
    }
    work.next_to_do.clear(arena);

    while !work.to_do.is_empty() {
        let mut cursor = work.to_do.first_extent(arena);
        while let Some((position, extent)) = cursor {
            work.already_done.union_extent(arena, extent)?;

            let mut clipped = extent;
            if control.should_use_extent(&mut clipped) && clipped.x_start < clipped.x_end {
                let mut run_start = None;
                for x in clipped.x_start..=clipped.x_end {
                    let inside = x < clipped.x_end && control.is_point_in_region(x, clipped.y);
                    match (inside, run_start) {
                        (true, None) => run_start = Some(x),
                        (false, Some(start)) => {
                            let run = Extent::new(clipped.y, start, x);
                            region.union_extent(arena, run)?;
                            work.next_to_do.union_surrounding_extents(arena, run)?;
                            run_start = None;
                        }
                        _ => {}
                    }
                }
            }

            cursor = work.to_do.next_extent(arena, position);
        }

        work.next_to_do.subtract_region(arena, &work.already_done)?;
        work.to_do.clear(arena);
        work.to_do.move_from(arena, &mut work.next_to_do)?;
    }
    Ok(())
}
