//! Two-dimensional point sets built from horizontal runs.
//!
//! A region is a sorted set of [`Extent`]s: half-open runs of pixels on one row.
//! Extents never overlap, and two extents on the same row never touch, so every
//! point set has exactly one representation. Both implementations,
//! [`SparseRegion`] (a skip list of extents) and [`DenseRegion`] (a bitmap),
//! satisfy the [`Region`] trait and can be swapped at any call site.
//!
//! Operations that may allocate take the shared [`ExtentArena`]. The dense
//! implementation ignores it.

mod dense;
mod flood;
mod moved;
mod sparse;

pub use dense::{DenseCursor, DenseRegion};
pub use flood::{FloodFillControl, FloodFillWork};
pub use moved::{priority_cmp, MotionVector, MovedRegion};
pub use sparse::SparseRegion;

use crate::set::SkipArena;
use crate::util::{DenoiseError, DenoiseResult};

/// Node arena shared by all sparse regions of one motion searcher.
pub type ExtentArena = SkipArena<Extent>;

/// Half-open horizontal run `[x_start, x_end)` on row `y`.
///
/// Coordinates are signed so that neighborhoods of border pixels can be
/// expressed before clipping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Extent {
    pub y: i32,
    pub x_start: i32,
    pub x_end: i32,
}

impl Extent {
    pub const fn new(y: i32, x_start: i32, x_end: i32) -> Self {
        Self { y, x_start, x_end }
    }

    /// Number of pixels in the run.
    pub fn len(&self) -> u64 {
        (self.x_end - self.x_start).max(0) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.x_end <= self.x_start
    }

    /// The same run displaced by `motion`.
    pub fn shifted(&self, motion: MotionVector) -> Self {
        Self::new(
            self.y + motion.dy,
            self.x_start + motion.dx,
            self.x_end + motion.dx,
        )
    }

    pub(crate) fn check(&self) -> DenoiseResult<()> {
        if self.x_start > self.x_end {
            return Err(DenoiseError::InvariantViolation("malformed extent"));
        }
        Ok(())
    }
}

/// Capabilities shared by every region representation.
pub trait Region {
    /// Position of an extent during iteration.
    type Cursor: Copy;

    /// Removes every point.
    fn clear(&mut self, arena: &mut ExtentArena);

    /// Number of points in the region.
    fn number_of_points(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.number_of_points() == 0
    }

    /// Adds the points of `extent`.
    fn union_extent(&mut self, arena: &mut ExtentArena, extent: Extent) -> DenoiseResult<()>;

    /// Adds an extent known not to touch any existing extent.
    fn merge_extent(&mut self, arena: &mut ExtentArena, extent: Extent) -> DenoiseResult<()> {
        self.union_extent(arena, extent)
    }

    /// Removes the points of `extent`.
    fn subtract_extent(&mut self, arena: &mut ExtentArena, extent: Extent) -> DenoiseResult<()>;

    fn does_contain_point(&self, arena: &ExtentArena, x: i32, y: i32) -> bool;

    /// First extent in `(y, x_start)` order.
    fn first_extent(&self, arena: &ExtentArena) -> Option<(Self::Cursor, Extent)>;

    /// Extent following the one at `cursor`.
    fn next_extent(&self, arena: &ExtentArena, cursor: Self::Cursor)
        -> Option<(Self::Cursor, Extent)>;

    /// Whether `move_from`/`merge_from` may take `other`'s storage.
    fn can_move_from(&self, other: &Self) -> bool;

    /// Replaces the contents of `self` with those of `other`, leaving `other`
    /// empty. Does not allocate.
    fn move_from(&mut self, arena: &mut ExtentArena, other: &mut Self) -> DenoiseResult<()>;

    /// Adds the contents of `other` without allocating, leaving `other` empty.
    fn merge_from(&mut self, arena: &mut ExtentArena, other: &mut Self) -> DenoiseResult<()>;

    /// Adds the 4-neighborhood of `extent`: the runs directly above and below
    /// it, and the run itself widened by one pixel on each side.
    fn union_surrounding_extents(
        &mut self,
        arena: &mut ExtentArena,
        extent: Extent,
    ) -> DenoiseResult<()> {
        let Extent { y, x_start, x_end } = extent;
        self.union_extent(arena, Extent::new(y - 1, x_start, x_end))?;
        self.union_extent(arena, Extent::new(y, x_start - 1, x_end + 1))?;
        self.union_extent(arena, Extent::new(y + 1, x_start, x_end))
    }

    /// Iterates over the extents in order.
    fn extents<'a>(&'a self, arena: &'a ExtentArena) -> Extents<'a, Self>
    where
        Self: Sized,
    {
        Extents {
            region: self,
            arena,
            next: self.first_extent(arena),
        }
    }

    /// Adds every point of `other`.
    fn union_region<R: Region>(&mut self, arena: &mut ExtentArena, other: &R) -> DenoiseResult<()> {
        let mut cursor = other.first_extent(arena);
        while let Some((position, extent)) = cursor {
            self.union_extent(arena, extent)?;
            cursor = other.next_extent(arena, position);
        }
        Ok(())
    }

    /// Removes every point of `other`.
    fn subtract_region<R: Region>(
        &mut self,
        arena: &mut ExtentArena,
        other: &R,
    ) -> DenoiseResult<()> {
        let mut cursor = other.first_extent(arena);
        while let Some((position, extent)) = cursor {
            self.subtract_extent(arena, extent)?;
            cursor = other.next_extent(arena, position);
        }
        Ok(())
    }

    /// Keeps only the points also contained in `other`.
    fn intersect_region<R: Region>(
        &mut self,
        arena: &mut ExtentArena,
        other: &R,
    ) -> DenoiseResult<()> {
        let mut kept = Vec::new();
        let mut mine = self.first_extent(arena);
        let mut theirs = other.first_extent(arena);
        while let (Some((a_pos, a)), Some((b_pos, b))) = (mine, theirs) {
            if a.y < b.y || (a.y == b.y && a.x_end <= b.x_start) {
                mine = self.next_extent(arena, a_pos);
            } else if b.y < a.y || (b.y == a.y && b.x_end <= a.x_start) {
                theirs = other.next_extent(arena, b_pos);
            } else {
                kept.push(Extent::new(
                    a.y,
                    a.x_start.max(b.x_start),
                    a.x_end.min(b.x_end),
                ));
                if a.x_end <= b.x_end {
                    mine = self.next_extent(arena, a_pos);
                } else {
                    theirs = other.next_extent(arena, b_pos);
                }
            }
        }
        self.clear(arena);
        for extent in kept {
            self.merge_extent(arena, extent)?;
        }
        Ok(())
    }

    /// Replaces the contents of `self` with a copy of `other`.
    fn assign<R: Region>(&mut self, arena: &mut ExtentArena, other: &R) -> DenoiseResult<()> {
        self.clear(arena);
        self.union_region(arena, other)
    }

    /// Sets `self` to the points adjacent to `other` but not in it.
    fn make_border<R: Region>(&mut self, arena: &mut ExtentArena, other: &R) -> DenoiseResult<()> {
        self.clear(arena);
        let mut cursor = other.first_extent(arena);
        while let Some((position, extent)) = cursor {
            self.union_surrounding_extents(arena, extent)?;
            cursor = other.next_extent(arena, position);
        }
        self.subtract_region(arena, other)
    }

    /// Grows (or, with `verify`, re-validates and then grows) the region to
    /// the maximal 4-connected set accepted by `control`.
    fn flood_fill<C: FloodFillControl>(
        &mut self,
        arena: &mut ExtentArena,
        work: &mut FloodFillWork<Self>,
        control: &mut C,
        verify: bool,
    ) -> DenoiseResult<()>
    where
        Self: Sized,
    {
        flood::flood_fill(self, arena, work, control, verify)
    }
}

/// Iterator over the extents of a region.
pub struct Extents<'a, R: Region> {
    region: &'a R,
    arena: &'a ExtentArena,
    next: Option<(R::Cursor, Extent)>,
}

impl<'a, R: Region> Iterator for Extents<'a, R> {
    type Item = Extent;

    fn next(&mut self) -> Option<Extent> {
        let (cursor, extent) = self.next?;
        self.next = self.region.next_extent(self.arena, cursor);
        Some(extent)
    }
}
