//! Regions stored as a fixed-size bitmap.

use super::{Extent, ExtentArena, Region};
use crate::util::{DenoiseError, DenoiseResult};

const WORD_BITS: usize = 64;

/// Region backed by a `width x height` bitmap.
///
/// Rows start on word boundaries, so extent operations touch whole words
/// wherever possible. Points outside the bitmap are silently clipped away.
#[derive(Clone, Debug)]
pub struct DenseRegion {
    width: usize,
    height: usize,
    words_per_row: usize,
    words: Vec<u64>,
    points: u64,
}

/// Iteration position inside a [`DenseRegion`]: scanning resumes at `(x, y)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DenseCursor {
    y: usize,
    x: usize,
}

/// Bits `[lo, hi)` of one word, for `lo < hi <= 64`.
#[inline]
fn range_mask(lo: usize, hi: usize) -> u64 {
    let upper = if hi >= WORD_BITS {
        u64::MAX
    } else {
        (1u64 << hi) - 1
    };
    upper & !((1u64 << lo) - 1)
}

impl DenseRegion {
    /// Creates an empty bitmap region.
    pub fn new(width: usize, height: usize) -> DenoiseResult<Self> {
        if width == 0 || height == 0 {
            return Err(DenoiseError::InvalidDimensions { width, height });
        }
        let words_per_row = width.div_ceil(WORD_BITS);
        let total = words_per_row
            .checked_mul(height)
            .ok_or(DenoiseError::InvalidDimensions { width, height })?;
        let mut words = Vec::new();
        words.try_reserve_exact(total)?;
        words.resize(total, 0);
        Ok(Self {
            width,
            height,
            words_per_row,
            words,
            points: 0,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Membership test that needs no arena.
    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return false;
        }
        let (x, y) = (x as usize, y as usize);
        let word = self.words[y * self.words_per_row + x / WORD_BITS];
        word & (1u64 << (x % WORD_BITS)) != 0
    }

    /// Clips an extent to the bitmap, returning `(row, start, end)`.
    fn clip(&self, extent: Extent) -> Option<(usize, usize, usize)> {
        if extent.y < 0 || extent.y as usize >= self.height {
            return None;
        }
        let start = extent.x_start.max(0) as usize;
        let end = (extent.x_end.max(0) as usize).min(self.width);
        (start < end).then_some((extent.y as usize, start, end))
    }

    /// Applies `op` to every word covering `[start, end)` on `row`.
    fn for_each_word(
        &mut self,
        row: usize,
        start: usize,
        end: usize,
        mut op: impl FnMut(&mut u64, u64),
    ) {
        let base = row * self.words_per_row;
        let first = start / WORD_BITS;
        let last = (end - 1) / WORD_BITS;
        for index in first..=last {
            let lo = if index == first { start % WORD_BITS } else { 0 };
            let hi = if index == last {
                end - index * WORD_BITS
            } else {
                WORD_BITS
            };
            op(&mut self.words[base + index], range_mask(lo, hi));
        }
    }

    /// First set bit at or after `x` on `row`.
    fn next_set(&self, row: usize, x: usize) -> Option<usize> {
        if x >= self.width {
            return None;
        }
        let words = &self.words[row * self.words_per_row..(row + 1) * self.words_per_row];
        let mut index = x / WORD_BITS;
        let mut word = words[index] & !((1u64 << (x % WORD_BITS)) - 1);
        loop {
            if word != 0 {
                let found = index * WORD_BITS + word.trailing_zeros() as usize;
                return (found < self.width).then_some(found);
            }
            index += 1;
            if index == words.len() {
                return None;
            }
            word = words[index];
        }
    }

    /// First clear bit at or after `x` on `row`, or the width.
    fn next_clear(&self, row: usize, x: usize) -> usize {
        if x >= self.width {
            return self.width;
        }
        let words = &self.words[row * self.words_per_row..(row + 1) * self.words_per_row];
        let mut index = x / WORD_BITS;
        let mut word = !words[index] & !((1u64 << (x % WORD_BITS)) - 1);
        loop {
            if word != 0 {
                let found = index * WORD_BITS + word.trailing_zeros() as usize;
                return found.min(self.width);
            }
            index += 1;
            if index == words.len() {
                return self.width;
            }
            word = !words[index];
        }
    }

    fn scan_from(&self, mut row: usize, mut x: usize) -> Option<(DenseCursor, Extent)> {
        while row < self.height {
            if let Some(start) = self.next_set(row, x) {
                let end = self.next_clear(row, start);
                let extent = Extent::new(row as i32, start as i32, end as i32);
                return Some((DenseCursor { y: row, x: end }, extent));
            }
            row += 1;
            x = 0;
        }
        None
    }

    fn check_congruent(&self, other: &Self) -> DenoiseResult<()> {
        if self.width != other.width || self.height != other.height {
            return Err(DenoiseError::InvariantViolation(
                "dense regions differ in size",
            ));
        }
        Ok(())
    }
}

impl Region for DenseRegion {
    type Cursor = DenseCursor;

    fn clear(&mut self, _arena: &mut ExtentArena) {
        if self.points != 0 {
            self.words.fill(0);
            self.points = 0;
        }
    }

    fn number_of_points(&self) -> u64 {
        self.points
    }

    fn union_extent(&mut self, _arena: &mut ExtentArena, extent: Extent) -> DenoiseResult<()> {
        extent.check()?;
        if let Some((row, start, end)) = self.clip(extent) {
            let mut added = 0u64;
            self.for_each_word(row, start, end, |word, mask| {
                added += (mask & !*word).count_ones() as u64;
                *word |= mask;
            });
            self.points += added;
        }
        Ok(())
    }

    fn subtract_extent(&mut self, _arena: &mut ExtentArena, extent: Extent) -> DenoiseResult<()> {
        extent.check()?;
        if let Some((row, start, end)) = self.clip(extent) {
            let mut removed = 0u64;
            self.for_each_word(row, start, end, |word, mask| {
                removed += (mask & *word).count_ones() as u64;
                *word &= !mask;
            });
            self.points -= removed;
        }
        Ok(())
    }

    fn does_contain_point(&self, _arena: &ExtentArena, x: i32, y: i32) -> bool {
        self.contains(x, y)
    }

    fn first_extent(&self, _arena: &ExtentArena) -> Option<(DenseCursor, Extent)> {
        if self.points == 0 {
            return None;
        }
        self.scan_from(0, 0)
    }

    fn next_extent(
        &self,
        _arena: &ExtentArena,
        cursor: DenseCursor,
    ) -> Option<(DenseCursor, Extent)> {
        self.scan_from(cursor.y, cursor.x)
    }

    fn can_move_from(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height
    }

    fn move_from(&mut self, arena: &mut ExtentArena, other: &mut Self) -> DenoiseResult<()> {
        self.check_congruent(other)?;
        self.clear(arena);
        std::mem::swap(&mut self.words, &mut other.words);
        std::mem::swap(&mut self.points, &mut other.points);
        Ok(())
    }

    fn merge_from(&mut self, arena: &mut ExtentArena, other: &mut Self) -> DenoiseResult<()> {
        self.check_congruent(other)?;
        let mut added = 0u64;
        for (mine, theirs) in self.words.iter_mut().zip(other.words.iter()) {
            added += (*theirs & !*mine).count_ones() as u64;
            *mine |= *theirs;
        }
        self.points += added;
        other.clear(arena);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::DenseRegion;
    use crate::region::{Extent, ExtentArena, Region};
    use crate::util::DenoiseError;

    #[test]
    fn extents_span_word_boundaries() {
        let mut arena = ExtentArena::new();
        let mut region = DenseRegion::new(200, 3).unwrap();
        region.union_extent(&mut arena, Extent::new(1, 60, 130)).unwrap();
        region.union_extent(&mut arena, Extent::new(1, 190, 260)).unwrap();
        region.union_extent(&mut arena, Extent::new(2, 0, 64)).unwrap();
        let extents: Vec<Extent> = region.extents(&arena).collect();
        assert_eq!(
            extents,
            vec![
                Extent::new(1, 60, 130),
                Extent::new(1, 190, 200),
                Extent::new(2, 0, 64)
            ]
        );
        assert_eq!(region.number_of_points(), 70 + 10 + 64);
        assert!(region.does_contain_point(&arena, 64, 1));
        assert!(!region.does_contain_point(&arena, 130, 1));
        assert!(!region.does_contain_point(&arena, 250, 1));
    }

    #[test]
    fn union_outside_the_bitmap_is_ignored() {
        let mut arena = ExtentArena::new();
        let mut region = DenseRegion::new(8, 8).unwrap();
        region.union_extent(&mut arena, Extent::new(-1, 0, 8)).unwrap();
        region.union_extent(&mut arena, Extent::new(8, 0, 8)).unwrap();
        region.union_extent(&mut arena, Extent::new(3, -4, -1)).unwrap();
        assert!(region.is_empty());
        region.union_extent(&mut arena, Extent::new(3, -4, 2)).unwrap();
        assert_eq!(region.number_of_points(), 2);
    }

    #[test]
    fn subtract_counts_only_present_points() {
        let mut arena = ExtentArena::new();
        let mut region = DenseRegion::new(100, 1).unwrap();
        region.union_extent(&mut arena, Extent::new(0, 10, 80)).unwrap();
        region.subtract_extent(&mut arena, Extent::new(0, 0, 20)).unwrap();
        region.subtract_extent(&mut arena, Extent::new(0, 70, 100)).unwrap();
        assert_eq!(region.number_of_points(), 50);
        let extents: Vec<Extent> = region.extents(&arena).collect();
        assert_eq!(extents, vec![Extent::new(0, 20, 70)]);
    }

    #[test]
    fn congruence_is_required_for_moves() {
        let mut arena = ExtentArena::new();
        let mut a = DenseRegion::new(8, 8).unwrap();
        let mut b = DenseRegion::new(8, 9).unwrap();
        assert!(!a.can_move_from(&b));
        assert_eq!(
            a.move_from(&mut arena, &mut b),
            Err(DenoiseError::InvariantViolation("dense regions differ in size"))
        );
    }

    #[test]
    fn rejects_empty_bitmap() {
        assert_eq!(
            DenseRegion::new(0, 4).unwrap_err(),
            DenoiseError::InvalidDimensions {
                width: 0,
                height: 4
            }
        );
    }
}
