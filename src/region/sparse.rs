//! Regions stored as a skip list of extents.

use super::{Extent, ExtentArena, Region};
use crate::set::{Cursor, OrderedSet};
use crate::util::{DenoiseError, DenoiseResult};

/// Region backed by an [`OrderedSet`] of extents.
///
/// Extent operations cost O(log n) in the number of extents. All sparse
/// regions of one searcher share one [`ExtentArena`], which lets
/// [`Region::move_from`] and [`Region::merge_from`] relink nodes instead of
/// copying them.
#[derive(Default)]
pub struct SparseRegion {
    extents: OrderedSet<Extent>,
    points: u64,
}

/// Search key that sorts before every extent starting at `(y, x)`.
#[inline]
fn row_key(y: i32, x: i32) -> Extent {
    Extent::new(y, x, i32::MIN)
}

impl SparseRegion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of extents.
    pub fn extent_count(&self) -> usize {
        self.extents.len()
    }

    /// Whether `extent` overlaps or touches an extent already present.
    fn touches(&self, arena: &ExtentArena, extent: Extent) -> bool {
        let key = row_key(extent.y, extent.x_start);
        if let Some(pred) = self.extents.predecessor(arena, &key) {
            let p = self.extents.get(arena, pred);
            if p.y == extent.y && p.x_end >= extent.x_start {
                return true;
            }
        }
        if let Some(succ) = self.extents.lower_bound(arena, &key) {
            let s = self.extents.get(arena, succ);
            if s.y == extent.y && s.x_start <= extent.x_end {
                return true;
            }
        }
        false
    }
}

impl Region for SparseRegion {
    type Cursor = Cursor;

    fn clear(&mut self, arena: &mut ExtentArena) {
        self.extents.clear(arena);
        self.points = 0;
    }

    fn number_of_points(&self) -> u64 {
        self.points
    }

    fn union_extent(&mut self, arena: &mut ExtentArena, extent: Extent) -> DenoiseResult<()> {
        extent.check()?;
        if extent.is_empty() {
            return Ok(());
        }
        let key = row_key(extent.y, extent.x_start);
        let mut start = extent.x_start;
        let mut end = extent.x_end;

        // An extent to the left that reaches `x_start` absorbs the new one.
        let mut target: Option<(Cursor, Extent)> = None;
        if let Some(pred) = self.extents.predecessor(arena, &key) {
            let p = *self.extents.get(arena, pred);
            if p.y == extent.y && p.x_end >= extent.x_start {
                if p.x_end >= extent.x_end {
                    return Ok(());
                }
                start = p.x_start;
                target = Some((pred, p));
            }
        }

        // Extents to the right that touch the new run are absorbed too. The
        // first of them is reused when nothing on the left matched.
        let mut removed = 0u64;
        let mut cursor = match target {
            Some((pred, _)) => self.extents.next(arena, pred),
            None => self.extents.lower_bound(arena, &key),
        };
        while let Some(current) = cursor {
            let s = *self.extents.get(arena, current);
            if s.y != extent.y || s.x_start > end {
                break;
            }
            end = end.max(s.x_end);
            if target.is_none() {
                target = Some((current, s));
                cursor = self.extents.next(arena, current);
            } else {
                removed += s.len();
                cursor = self.extents.erase(arena, current)?;
            }
        }

        match target {
            Some((position, old)) => {
                let merged = Extent::new(extent.y, start, end);
                self.points = self.points + merged.len() - old.len() - removed;
                self.extents.replace(arena, position, merged);
            }
            None => {
                self.extents.insert(arena, extent)?;
                self.points += extent.len();
            }
        }
        Ok(())
    }

    fn merge_extent(&mut self, arena: &mut ExtentArena, extent: Extent) -> DenoiseResult<()> {
        extent.check()?;
        if extent.is_empty() {
            return Ok(());
        }
        debug_assert!(!self.touches(arena, extent));
        let (_, inserted) = self.extents.insert(arena, extent)?;
        if !inserted {
            return Err(DenoiseError::InvariantViolation(
                "merged extent overlaps the region",
            ));
        }
        self.points += extent.len();
        Ok(())
    }

    fn subtract_extent(&mut self, arena: &mut ExtentArena, extent: Extent) -> DenoiseResult<()> {
        extent.check()?;
        if extent.is_empty() {
            return Ok(());
        }
        let Extent { y, x_start, x_end } = extent;
        let key = row_key(y, x_start);

        if let Some(pred) = self.extents.predecessor(arena, &key) {
            let p = *self.extents.get(arena, pred);
            if p.y == y && p.x_end > x_start {
                if p.x_end > x_end {
                    // Splitting needs a node; take it before touching `p`.
                    self.extents.insert(arena, Extent::new(y, x_end, p.x_end))?;
                    self.extents
                        .replace(arena, pred, Extent::new(y, p.x_start, x_start));
                    self.points -= extent.len();
                    return Ok(());
                }
                self.points -= (p.x_end - x_start) as u64;
                self.extents
                    .replace(arena, pred, Extent::new(y, p.x_start, x_start));
            }
        }

        let mut cursor = self.extents.lower_bound(arena, &key);
        while let Some(current) = cursor {
            let s = *self.extents.get(arena, current);
            if s.y != y || s.x_start >= x_end {
                break;
            }
            if s.x_end <= x_end {
                self.points -= s.len();
                cursor = self.extents.erase(arena, current)?;
            } else {
                self.points -= (x_end - s.x_start) as u64;
                self.extents
                    .replace(arena, current, Extent::new(y, x_end, s.x_end));
                break;
            }
        }
        Ok(())
    }

    fn does_contain_point(&self, arena: &ExtentArena, x: i32, y: i32) -> bool {
        let key = Extent::new(y, x, i32::MAX);
        match self.extents.predecessor(arena, &key) {
            Some(cursor) => {
                let e = self.extents.get(arena, cursor);
                e.y == y && e.x_end > x
            }
            None => false,
        }
    }

    fn first_extent(&self, arena: &ExtentArena) -> Option<(Cursor, Extent)> {
        let cursor = self.extents.first()?;
        Some((cursor, *self.extents.get(arena, cursor)))
    }

    fn next_extent(&self, arena: &ExtentArena, cursor: Cursor) -> Option<(Cursor, Extent)> {
        let next = self.extents.next(arena, cursor)?;
        Some((next, *self.extents.get(arena, next)))
    }

    fn can_move_from(&self, _other: &Self) -> bool {
        true
    }

    fn move_from(&mut self, arena: &mut ExtentArena, other: &mut Self) -> DenoiseResult<()> {
        self.clear(arena);
        self.extents.move_all(arena, &mut other.extents)?;
        self.points = std::mem::take(&mut other.points);
        Ok(())
    }

    fn merge_from(&mut self, arena: &mut ExtentArena, other: &mut Self) -> DenoiseResult<()> {
        if self.is_empty() {
            return self.move_from(arena, other);
        }
        let mut cursor = other.extents.first();
        while let Some(current) = cursor {
            let extent = *other.extents.get(arena, current);
            cursor = other.extents.next(arena, current);
            if self.touches(arena, extent) {
                // Touching extents coalesce, which never needs a new node.
                self.union_extent(arena, extent)?;
                other.extents.erase(arena, current)?;
            } else {
                self.extents.move_from(arena, &mut other.extents, current)?;
                self.points += extent.len();
            }
        }
        other.points = 0;
        Ok(())
    }
}
