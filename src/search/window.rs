//! Candidate reference blocks around the current scan position.
//!
//! The window caches one row of block snapshots per reference-block origin row
//! within `radius_y` of the scan row. Blocks are read from the reference frame
//! the first time a search touches them and stay cached while the scan slides
//! sideways; moving down drops the top row and opens an empty one at the
//! bottom. A block that overlaps an already claimed reference pixel is never
//! offered as a match.

use crate::candidate::topk::Candidate;
use crate::pixel::{Pixel, PixelPool, ReferenceFrame};
use crate::region::{ExtentArena, MotionVector, Region};
use crate::util::{DenoiseError, DenoiseResult};
use std::collections::VecDeque;

/// What a search needs to read reference blocks.
pub struct ReferenceView<'a, P: Pixel, U: Region> {
    pub frame: &'a ReferenceFrame,
    pub pool: &'a PixelPool<P>,
    /// Reference pixels already claimed by this frame.
    pub used: &'a U,
    pub arena: &'a ExtentArena,
}

impl<'a, P: Pixel, U: Region> ReferenceView<'a, P, U> {
    /// Reads the block at `(gx, gy)` into `out`. Returns `false` when the block
    /// touches a claimed or unresolved reference pixel.
    fn read_block(&self, gx: usize, gy: usize, out: &mut [P]) -> bool {
        let mut i = 0;
        for y in gy..gy + P::GROUP_HEIGHT {
            for x in gx..gx + P::GROUP_WIDTH {
                if self.used.does_contain_point(self.arena, x as i32, y as i32) {
                    return false;
                }
                match self.frame.get(x, y) {
                    Some(handle) => out[i] = self.pool.value(handle),
                    None => return false,
                }
                i += 1;
            }
        }
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cell {
    Unread,
    Valid,
    Pruned,
}

struct WindowRow<P> {
    values: Vec<P>,
    cells: Vec<Cell>,
}

/// Cache of reference blocks within the search radius.
pub struct SearchWindow<P: Pixel> {
    radius_x: usize,
    radius_y: usize,
    width: usize,
    max_gx: usize,
    max_gy: usize,
    x: usize,
    y: usize,
    rows: VecDeque<WindowRow<P>>,
    first_row: usize,
    spare: Vec<WindowRow<P>>,
}

impl<P: Pixel> SearchWindow<P> {
    const GROUP_LEN: usize = P::GROUP_WIDTH * P::GROUP_HEIGHT;

    /// Creates a window for `width x height` frames. The frame must hold at
    /// least one block.
    pub fn new(
        width: usize,
        height: usize,
        radius_x: usize,
        radius_y: usize,
    ) -> DenoiseResult<Self> {
        if width < P::GROUP_WIDTH || height < P::GROUP_HEIGHT {
            return Err(DenoiseError::InvalidDimensions { width, height });
        }
        Ok(Self {
            radius_x,
            radius_y,
            width,
            max_gx: width - P::GROUP_WIDTH,
            max_gy: height - P::GROUP_HEIGHT,
            x: 0,
            y: 0,
            rows: VecDeque::new(),
            first_row: 0,
            spare: Vec::new(),
        })
    }

    /// Current block position.
    pub fn position(&self) -> (usize, usize) {
        (self.x, self.y)
    }

    fn take_row(&mut self) -> DenoiseResult<WindowRow<P>> {
        if let Some(mut row) = self.spare.pop() {
            row.cells.fill(Cell::Unread);
            return Ok(row);
        }
        let cells = self.max_gx + 1;
        let mut values = Vec::new();
        values.try_reserve_exact(cells * Self::GROUP_LEN)?;
        values.resize(cells * Self::GROUP_LEN, P::default());
        let mut states = Vec::new();
        states.try_reserve_exact(cells)?;
        states.resize(cells, Cell::Unread);
        Ok(WindowRow {
            values,
            cells: states,
        })
    }

    /// Brings the cached rows in line with the scan row `self.y`.
    fn sync_rows(&mut self) -> DenoiseResult<()> {
        let lo = self.y.saturating_sub(self.radius_y);
        let hi = (self.y + self.radius_y).min(self.max_gy);
        while self.first_row < lo {
            match self.rows.pop_front() {
                Some(row) => self.spare.push(row),
                None => break,
            }
            self.first_row += 1;
        }
        if self.rows.is_empty() {
            self.first_row = lo;
        }
        while self.first_row + self.rows.len() <= hi {
            let row = self.take_row()?;
            self.rows.push_back(row);
        }
        Ok(())
    }

    /// Resets the window to the top-left block of a new reference frame.
    pub fn start_frame(&mut self) -> DenoiseResult<()> {
        self.finish_frame();
        self.x = 0;
        self.y = 0;
        self.sync_rows()
    }

    /// Releases the cached rows for reuse by the next frame.
    pub fn finish_frame(&mut self) {
        self.spare.extend(self.rows.drain(..));
        self.first_row = 0;
    }

    /// Drops every cached row, keeping nothing allocated.
    pub fn purge(&mut self) {
        self.rows = VecDeque::new();
        self.spare = Vec::new();
        self.first_row = 0;
    }

    pub fn move_right(&mut self) {
        debug_assert!(self.x < self.max_gx);
        self.x += 1;
    }

    pub fn move_left(&mut self) {
        debug_assert!(self.x > 0);
        self.x -= 1;
    }

    pub fn move_down(&mut self) -> DenoiseResult<()> {
        self.y += 1;
        self.sync_rows()
    }

    /// Marks every cached block overlapping `region`, displaced by `motion`,
    /// as unusable.
    pub fn prune<R: Region>(&mut self, arena: &ExtentArena, region: &R, motion: MotionVector) {
        if self.rows.is_empty() {
            return;
        }
        let gw = P::GROUP_WIDTH as i32;
        let gh = P::GROUP_HEIGHT as i32;
        let first = self.first_row as i32;
        let last = first + self.rows.len() as i32 - 1;

        let mut cursor = region.first_extent(arena);
        while let Some((position, extent)) = cursor {
            cursor = region.next_extent(arena, position);
            let shifted = extent.shifted(motion);
            let px_start = shifted.x_start.max(0);
            let px_end = shifted.x_end.min(self.width as i32);
            if px_start >= px_end {
                continue;
            }
            let gy_lo = (shifted.y - gh + 1).max(first);
            let gy_hi = shifted.y.min(last);
            let gx_lo = (px_start - gw + 1).max(0) as usize;
            let gx_hi = ((px_end - 1) as usize).min(self.max_gx);
            if gx_lo > gx_hi {
                continue;
            }
            for gy in gy_lo..=gy_hi {
                let row = &mut self.rows[(gy - first) as usize];
                for cell in &mut row.cells[gx_lo..=gx_hi] {
                    *cell = Cell::Pruned;
                }
            }
        }
    }

    /// Reads the block at `(gx, gy)` into its row cache if not done yet.
    fn cell<U: Region>(&mut self, view: &ReferenceView<'_, P, U>, gx: usize, gy: usize) -> Option<&[P]> {
        let row = &mut self.rows[gy - self.first_row];
        let start = gx * Self::GROUP_LEN;
        let values = &mut row.values[start..start + Self::GROUP_LEN];
        if row.cells[gx] == Cell::Unread {
            row.cells[gx] = if view.read_block(gx, gy, values) {
                Cell::Valid
            } else {
                Cell::Pruned
            };
        }
        (row.cells[gx] == Cell::Valid).then_some(&*values)
    }

    /// Reports every block within the radius that matches `group`.
    ///
    /// Blocks are visited in row-major order of their displacement, and each
    /// candidate carries that visiting order.
    pub fn for_each_match<U: Region>(
        &mut self,
        view: &ReferenceView<'_, P, U>,
        group: &[P],
        tolerance: u32,
        mut on_match: impl FnMut(Candidate),
    ) {
        debug_assert_eq!(group.len(), Self::GROUP_LEN);
        let rx = self.radius_x as i32;
        let (x, y) = (self.x as i32, self.y as i32);
        let gy_lo = self.first_row as i32;
        let gy_hi = gy_lo + self.rows.len() as i32 - 1;
        let mut order = 0u32;

        for gy in gy_lo..=gy_hi {
            let gx_lo = (x - rx).max(0);
            let gx_hi = (x + rx).min(self.max_gx as i32);
            for gx in gx_lo..=gx_hi {
                order += 1;
                let Some(block) = self.cell(view, gx as usize, gy as usize) else {
                    continue;
                };
                if let Some(sad) = P::group_difference(group, block, tolerance) {
                    on_match(Candidate {
                        motion: MotionVector::new(gx - x, gy - y),
                        sad,
                        order,
                    });
                }
            }
        }
    }

    /// Tests one displacement, returning the block's total difference if it
    /// matches.
    pub fn check<U: Region>(
        &mut self,
        view: &ReferenceView<'_, P, U>,
        group: &[P],
        motion: MotionVector,
        tolerance: u32,
    ) -> Option<u32> {
        let gx = self.x as i32 + motion.dx;
        let gy = self.y as i32 + motion.dy;
        if gx < 0 || gy < 0 || gx as usize > self.max_gx || gy as usize > self.max_gy {
            return None;
        }
        let (gx, gy) = (gx as usize, gy as usize);
        if gy >= self.first_row && gy < self.first_row + self.rows.len() {
            let block = self.cell(view, gx, gy)?;
            return P::group_difference(group, block, tolerance);
        }
        let mut block = [P::default(); 64];
        let block = &mut block[..Self::GROUP_LEN];
        if !view.read_block(gx, gy, block) {
            return None;
        }
        P::group_difference(group, block, tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::{ReferenceView, SearchWindow};
    use crate::pixel::{PixelPool, PixelY, ReferenceFrame};
    use crate::region::{DenseRegion, Extent, ExtentArena, MotionVector, Region};

    fn frame_from(values: &[u8], width: usize, pool: &mut PixelPool<PixelY>) -> ReferenceFrame {
        let height = values.len() / width;
        let mut frame = ReferenceFrame::new(width, height).unwrap();
        for (i, &v) in values.iter().enumerate() {
            let handle = pool.allocate().unwrap();
            frame.set_index(pool, i, Some(handle)).unwrap();
            pool.add_sample(handle, PixelY(v)).unwrap();
        }
        frame
    }

    fn pattern(width: usize, height: usize) -> Vec<u8> {
        (0..width * height)
            .map(|i| (((i % width) * 37 + (i / width) * 101) % 251) as u8)
            .collect()
    }

    fn block_at(values: &[u8], width: usize, x: usize, y: usize) -> Vec<PixelY> {
        let mut out = Vec::new();
        for row in y..y + 2 {
            for col in x..x + 4 {
                out.push(PixelY(values[row * width + col]));
            }
        }
        out
    }

    #[test]
    fn finds_the_displaced_block() {
        let (width, height) = (16, 12);
        let values = pattern(width, height);
        let mut pool = PixelPool::new(width * height).unwrap();
        let frame = frame_from(&values, width, &mut pool);
        let used = DenseRegion::new(width, height).unwrap();
        let arena = ExtentArena::new();
        let view = ReferenceView {
            frame: &frame,
            pool: &pool,
            used: &used,
            arena: &arena,
        };

        let mut window = SearchWindow::<PixelY>::new(width, height, 4, 4).unwrap();
        window.start_frame().unwrap();
        for _ in 0..3 {
            window.move_down().unwrap();
        }
        for _ in 0..5 {
            window.move_right();
        }
        assert_eq!(window.position(), (5, 3));

        let group = block_at(&values, width, 7, 2);
        let mut found = Vec::new();
        window.for_each_match(&view, &group, 0, |c| found.push(c));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].motion, MotionVector::new(2, -1));
        assert_eq!(found[0].sad, 0);
        assert_eq!(window.check(&view, &group, MotionVector::new(2, -1), 0), Some(0));
        assert_eq!(window.check(&view, &group, MotionVector::new(1, -1), 0), None);
    }

    #[test]
    fn pruned_and_claimed_blocks_are_skipped() {
        let (width, height) = (12, 6);
        let values = vec![50u8; width * height];
        let mut pool = PixelPool::new(width * height).unwrap();
        let frame = frame_from(&values, width, &mut pool);
        let mut arena = ExtentArena::new();
        let mut used = DenseRegion::new(width, height).unwrap();
        used.union_extent(&mut arena, Extent::new(0, 0, 1)).unwrap();

        let group = vec![PixelY(50); 8];
        let mut window = SearchWindow::<PixelY>::new(width, height, 2, 2).unwrap();
        window.start_frame().unwrap();
        let count = |window: &mut SearchWindow<PixelY>, used: &DenseRegion, arena: &ExtentArena| {
            let view = ReferenceView {
                frame: &frame,
                pool: &pool,
                used,
                arena,
            };
            let mut n = 0;
            window.for_each_match(&view, &group, 0, |_| n += 1);
            n
        };

        // Origins (0..=2) x (0..=2); the claimed pixel (0, 0) rules out one.
        assert_eq!(count(&mut window, &used, &arena), 8);

        let mut claimed = DenseRegion::new(width, height).unwrap();
        claimed.union_extent(&mut arena, Extent::new(1, 4, 5)).unwrap();
        window.prune(&arena, &claimed, MotionVector::ZERO);
        // Blocks with origin x in 1..=2 and y in 0..=1 overlap (4, 1).
        assert_eq!(count(&mut window, &used, &arena), 4);

        window.purge();
        window.start_frame().unwrap();
        assert_eq!(count(&mut window, &used, &arena), 8);
    }
}
