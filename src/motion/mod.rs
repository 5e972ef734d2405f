//! Motion-compensated resolution of frames against a sliding window.
//!
//! A [`MotionSearcher`] keeps the last `frames` frames as grids of handles
//! into a shared [`PixelPool`]. Each new frame is resolved against the frame
//! before it in four passes:
//!
//! 1. runs of unmoved pixels take over the co-located reference pixels, and
//!    the claimed area is flood-filled outwards;
//! 2. a zig-zag scan searches the window around every unresolved pixel
//!    group, grows moved regions on the [`SearchBorder`], and applies the
//!    best region early whenever the match throttles trip;
//! 3. regions completed during the scan are applied best first, each
//!    re-validated by a verifying flood fill;
//! 4. anything still unresolved becomes a fresh reference pixel.
//!
//! Every pixel of a frame refers to a reference pixel that accumulates the
//! samples of all frames it appears in, so a frame leaving the window carries
//! the denoised values.

mod control;
mod pending;

use crate::candidate::topk::{Candidate, TopK};
use crate::pixel::{FrameView, Pixel, PixelPool, ReferenceFrame};
use crate::region::{
    DenseRegion, Extent, ExtentArena, FloodFillWork, MotionVector, MovedRegion, Region,
    SparseRegion,
};
use crate::search::{CompletedRegionSink, ReferenceView, SearchBorder, SearchWindow};
use crate::trace::{trace_debug, trace_event, trace_span};
use crate::util::math::{percent, to_coord};
use crate::util::{DenoiseError, DenoiseResult};
use control::{MatchControl, ZeroMotionControl};
use pending::PendingRegions;

/// Shortest run of unmoved pixels accepted by the zero-motion pass.
pub const MIN_ZERO_MOTION_RUN: usize = 3;

/// Whether equally good matches are ranked by motion-vector length.
pub const PREFER_SHORTER_VECTORS: bool = true;

/// Parameters of one [`MotionSearcher`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchConfig {
    /// Number of frames kept in the window; a frame is output once it is
    /// this many frames old.
    pub frames: usize,
    /// Horizontal search radius in pixels.
    pub radius_x: usize,
    /// Vertical search radius in pixels.
    pub radius_y: usize,
    /// Tolerance for the zero-motion pass.
    pub zero_tolerance: u32,
    /// Tolerance for block matches and moved-region flood fills.
    pub tolerance: u32,
    /// Matches kept per pixel group; reaching it applies the best region
    /// at once. Zero disables the motion search.
    pub match_count_throttle: usize,
    /// Region size, in pixel groups, that triggers early application.
    pub match_size_throttle: usize,
    /// Shortest run accepted by the zero-motion pass.
    pub min_zero_motion_run: usize,
    /// Rank equal-SAD matches by vector length.
    pub prefer_shorter_vectors: bool,
    /// Test only the vectors of nearby regions when many are active.
    pub expand_existing_regions: bool,
    /// Upper bound on live extent nodes.
    pub region_node_capacity: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            frames: 10,
            radius_x: 16,
            radius_y: 16,
            zero_tolerance: 2,
            tolerance: 3,
            match_count_throttle: 15,
            match_size_throttle: 3,
            min_zero_motion_run: MIN_ZERO_MOTION_RUN,
            prefer_shorter_vectors: PREFER_SHORTER_VECTORS,
            expand_existing_regions: false,
            region_node_capacity: crate::set::DEFAULT_NODE_CAPACITY,
        }
    }
}

impl SearchConfig {
    /// Checks the configuration against a plane of pixel type `P`.
    pub fn validate<P: Pixel>(&self, width: usize, height: usize) -> DenoiseResult<()> {
        if self.frames < 2 {
            return Err(DenoiseError::InvalidInput(
                "the frame window must hold at least two frames",
            ));
        }
        if width < P::GROUP_WIDTH || height < P::GROUP_HEIGHT {
            return Err(DenoiseError::InvalidDimensions { width, height });
        }
        if self.radius_x == 0 || self.radius_y == 0 || self.radius_x > width || self.radius_y > height
        {
            return Err(DenoiseError::InvalidRadius {
                radius_x: self.radius_x,
                radius_y: self.radius_y,
                width,
                height,
            });
        }
        if self.match_count_throttle > self.radius_x * self.radius_y {
            return Err(DenoiseError::InvalidInput(
                "match count throttle exceeds radius_x * radius_y",
            ));
        }
        if self.match_size_throttle == 0 {
            return Err(DenoiseError::InvalidInput("match size throttle must be positive"));
        }
        if self.min_zero_motion_run == 0 {
            return Err(DenoiseError::InvalidInput("zero-motion run length must be positive"));
        }
        if self.region_node_capacity == 0 {
            return Err(DenoiseError::InvalidInput("region node capacity must be positive"));
        }
        Ok(())
    }
}

/// How the pixels of one frame were resolved. The counters add up to the
/// number of pixels in the frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Unmoved runs found by the zero-motion pass.
    pub not_moved: u64,
    /// Unmoved pixels added by flood fills.
    pub not_moved_flooded: u64,
    /// Moved pixels applied early by the match throttles.
    pub moved_flooded: u64,
    /// Moved pixels applied after the scan.
    pub moved: u64,
    /// Groups without any match, kept as new pixels.
    pub no_match_new: u64,
    /// Pixels left unresolved by every pass.
    pub new: u64,
}

impl FrameStats {
    pub fn total(&self) -> u64 {
        self.not_moved
            + self.not_moved_flooded
            + self.moved_flooded
            + self.moved
            + self.no_match_new
            + self.new
    }
}

/// Lifecycle of a [`MotionSearcher`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearcherState {
    /// No frame has been output yet.
    WarmingUp,
    /// Every added frame releases the oldest one.
    Steady,
    /// Input ended; the buffered frames are being flushed.
    Draining,
}

/// Motion-compensated denoiser for one plane group.
pub struct MotionSearcher<P: Pixel> {
    config: SearchConfig,
    width: usize,
    height: usize,
    pool: PixelPool<P>,
    frames: Vec<ReferenceFrame>,
    first: usize,
    last: usize,
    steady: bool,
    draining: bool,
    arena: ExtentArena,
    used: DenseRegion,
    dense_work: FloodFillWork<DenseRegion>,
    sparse_work: FloodFillWork<SparseRegion>,
    window: SearchWindow<P>,
    border: SearchBorder,
    pending: PendingRegions,
    matches: TopK,
    motions: Vec<MotionVector>,
    group: Vec<P>,
    extents: Vec<Extent>,
    tolerance: u32,
    zero_tolerance: u32,
    frame_index: u64,
}

impl<P: Pixel> MotionSearcher<P> {
    /// Allocates every pool and frame for `width x height` planes.
    pub fn new(config: SearchConfig, width: usize, height: usize) -> DenoiseResult<Self> {
        config.validate::<P>(width, height)?;
        let pixels = width
            .checked_mul(height)
            .ok_or(DenoiseError::InvalidDimensions { width, height })?;
        let capacity = config
            .frames
            .checked_mul(pixels)
            .ok_or(DenoiseError::OutOfMemory {
                context: "reference pixel pool",
            })?;
        let pool = PixelPool::new(capacity)?;
        let frames = (0..config.frames)
            .map(|_| ReferenceFrame::new(width, height))
            .collect::<DenoiseResult<Vec<_>>>()?;
        let dense = || DenseRegion::new(width, height);

        Ok(Self {
            width,
            height,
            pool,
            frames,
            first: 0,
            last: 0,
            steady: false,
            draining: false,
            arena: ExtentArena::with_capacity_limit(config.region_node_capacity),
            used: dense()?,
            dense_work: FloodFillWork::new(dense()?, dense()?, dense()?),
            sparse_work: FloodFillWork::new(
                SparseRegion::new(),
                SparseRegion::new(),
                SparseRegion::new(),
            ),
            window: SearchWindow::new(width, height, config.radius_x, config.radius_y)?,
            border: SearchBorder::new(P::GROUP_WIDTH, P::GROUP_HEIGHT),
            pending: PendingRegions::new((2 * P::GROUP_WIDTH * P::GROUP_HEIGHT) as u64),
            matches: TopK::new(config.match_count_throttle, config.prefer_shorter_vectors),
            motions: Vec::new(),
            group: Vec::with_capacity(P::GROUP_WIDTH * P::GROUP_HEIGHT),
            extents: Vec::new(),
            tolerance: P::make_tolerance(config.tolerance),
            zero_tolerance: P::make_tolerance(config.zero_tolerance),
            frame_index: 0,
            config,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn state(&self) -> SearcherState {
        if self.draining {
            SearcherState::Draining
        } else if self.steady {
            SearcherState::Steady
        } else {
            SearcherState::WarmingUp
        }
    }

    /// Frames added but not yet handed out.
    pub fn buffered_frames(&self) -> usize {
        self.last - self.first
    }

    /// Resolves one frame of `width * height` samples in row-major order.
    ///
    /// Fails if a finished frame is waiting in
    /// [`Self::frame_ready_for_output`] or draining has begun. After an
    /// error the searcher's frames are in an unspecified state and the run
    /// should be abandoned.
    pub fn add_frame(&mut self, pixels: &[P]) -> DenoiseResult<FrameStats> {
        if self.draining {
            return Err(DenoiseError::InvalidInput(
                "frames cannot be added once draining has begun",
            ));
        }
        if self.last == self.frames.len() {
            return Err(DenoiseError::InvalidInput(
                "the finished frame must be taken before adding another",
            ));
        }
        let total = self.width * self.height;
        if pixels.len() < total {
            return Err(DenoiseError::BufferTooSmall {
                needed: total,
                got: pixels.len(),
            });
        }
        if pixels.len() > total {
            return Err(DenoiseError::InvalidInput(
                "frame holds more samples than width * height",
            ));
        }
        let _span = trace_span!("add_frame", frame = self.frame_index).entered();

        let Self {
            config,
            width,
            height,
            pool,
            frames,
            last,
            arena,
            used,
            dense_work,
            sparse_work,
            window,
            border,
            pending,
            matches,
            motions,
            group,
            extents,
            tolerance,
            zero_tolerance,
            ..
        } = self;
        let index = *last;
        frames[index].reset(pool)?;

        let mut stats = FrameStats::default();
        if index > 0 {
            let (before, after) = frames.split_at_mut(index);
            let mut pass = FramePass {
                config: &*config,
                width: *width,
                height: *height,
                tolerance: *tolerance,
                zero_tolerance: *zero_tolerance,
                pixels,
                reference: &before[index - 1],
                new: &mut after[0],
                pool: &mut *pool,
                arena,
                used,
                dense_work,
                sparse_work,
                window,
                border,
                pending,
                matches,
                motions,
                group,
                extents,
                stats: FrameStats::default(),
            };
            pass.zero_motion()?;
            let unmoved = pass.stats.not_moved + pass.stats.not_moved_flooded;
            if config.match_count_throttle > 0 && unmoved != total as u64 {
                pass.search()?;
                pass.drain()?;
            }
            pass.window.finish_frame();
            stats = pass.stats;
        }
        fill_unresolved(&mut frames[index], pool, pixels, &mut stats)?;
        debug_assert_eq!(stats.total(), total as u64);

        *last += 1;
        trace_event!(
            "frame_stats",
            frame = self.frame_index,
            not_moved = stats.not_moved,
            not_moved_flooded = stats.not_moved_flooded,
            moved_flooded = stats.moved_flooded,
            moved = stats.moved,
            no_match_new = stats.no_match_new,
            new = stats.new,
            not_moved_pct = percent(stats.not_moved + stats.not_moved_flooded, total as u64),
            moved_pct = percent(stats.moved + stats.moved_flooded, total as u64),
            new_pct = percent(stats.no_match_new + stats.new, total as u64),
        );
        self.frame_index += 1;
        Ok(stats)
    }

    /// Hands out the oldest frame once the window is full.
    ///
    /// The view must be dropped before the next [`Self::add_frame`], which
    /// reuses the frame's storage.
    pub fn frame_ready_for_output(&mut self) -> Option<FrameView<'_, P>> {
        if self.draining || self.first != 0 || self.last != self.frames.len() {
            return None;
        }
        self.frames.rotate_left(1);
        self.last -= 1;
        self.steady = true;
        Some(FrameView::new(&self.frames[self.last], &self.pool))
    }

    /// Hands out the buffered frames, oldest first, after input has ended.
    /// No further frames may be added once this has been called.
    pub fn get_remaining_frames(&mut self) -> Option<FrameView<'_, P>> {
        self.draining = true;
        if self.first == self.last {
            return None;
        }
        let index = self.first;
        self.first += 1;
        Some(FrameView::new(&self.frames[index], &self.pool))
    }

    /// Releases the search window's cache. Results are unaffected.
    pub fn purge(&mut self) {
        self.window.purge();
        trace_event!("purge", frame = self.frame_index);
    }
}

/// Every slot still empty gets a fresh pixel; provisional pixels from the
/// scan that nothing claimed are counted as unmatched.
fn fill_unresolved<P: Pixel>(
    frame: &mut ReferenceFrame,
    pool: &mut PixelPool<P>,
    pixels: &[P],
    stats: &mut FrameStats,
) -> DenoiseResult<()> {
    for (index, &sample) in pixels.iter().enumerate() {
        match frame.get_index(index) {
            None => {
                let handle = pool.allocate()?;
                frame.set_index(pool, index, Some(handle))?;
                pool.add_sample(handle, sample)?;
                stats.new += 1;
            }
            Some(handle) if pool.references(handle) == 1 => stats.no_match_new += 1,
            Some(_) => {}
        }
    }
    Ok(())
}

/// Borrowed state for resolving one frame against its predecessor.
struct FramePass<'a, P: Pixel> {
    config: &'a SearchConfig,
    width: usize,
    height: usize,
    tolerance: u32,
    zero_tolerance: u32,
    pixels: &'a [P],
    reference: &'a ReferenceFrame,
    new: &'a mut ReferenceFrame,
    pool: &'a mut PixelPool<P>,
    arena: &'a mut ExtentArena,
    used: &'a mut DenseRegion,
    dense_work: &'a mut FloodFillWork<DenseRegion>,
    sparse_work: &'a mut FloodFillWork<SparseRegion>,
    window: &'a mut SearchWindow<P>,
    border: &'a mut SearchBorder,
    pending: &'a mut PendingRegions,
    matches: &'a mut TopK,
    motions: &'a mut Vec<MotionVector>,
    group: &'a mut Vec<P>,
    extents: &'a mut Vec<Extent>,
    stats: FrameStats,
}

impl<P: Pixel> FramePass<'_, P> {
    fn zero_motion(&mut self) -> DenoiseResult<()> {
        self.used.clear(self.arena);
        let min_run = self.config.min_zero_motion_run;
        for y in 0..self.height {
            let row = y * self.width;
            let mut run_start = None;
            for x in 0..=self.width {
                let matched = x < self.width
                    && self.reference.get(x, y).is_some_and(|handle| {
                        self.pixels[row + x]
                            .is_within_tolerance(&self.pool.value(handle), self.zero_tolerance)
                    });
                match (matched, run_start) {
                    (true, None) => run_start = Some(x),
                    (false, Some(start)) => {
                        run_start = None;
                        if x - start >= min_run {
                            self.claim_unmoved_run(y, start, x)?;
                        }
                    }
                    _ => {}
                }
            }
        }

        if self.used.is_empty() {
            return Ok(());
        }
        let mut control = ZeroMotionControl {
            width: to_coord(self.width),
            height: to_coord(self.height),
            pixels: self.pixels,
            reference: self.reference,
            new: &mut *self.new,
            pool: &mut *self.pool,
            tolerance: self.zero_tolerance,
            accepted: 0,
            error: None,
        };
        self.used
            .flood_fill(self.arena, self.dense_work, &mut control, false)?;
        if let Some(err) = control.error {
            return Err(err);
        }
        self.stats.not_moved_flooded += control.accepted;
        Ok(())
    }

    fn claim_unmoved_run(&mut self, y: usize, start: usize, end: usize) -> DenoiseResult<()> {
        for x in start..end {
            let handle = self
                .reference
                .get(x, y)
                .ok_or(DenoiseError::InvariantViolation("reference frame is incomplete"))?;
            self.new.set(self.pool, x, y, Some(handle))?;
            self.pool.add_sample(handle, self.pixels[y * self.width + x])?;
        }
        self.used.union_extent(
            self.arena,
            Extent::new(to_coord(y), to_coord(start), to_coord(end)),
        )?;
        self.stats.not_moved += (end - start) as u64;
        Ok(())
    }

    /// Copies the group at `(x, y)` unless one of its pixels is resolved.
    fn load_group(&mut self, x: usize, y: usize) -> bool {
        self.group.clear();
        for row in y..y + P::GROUP_HEIGHT {
            for col in x..x + P::GROUP_WIDTH {
                if self.new.get(col, row).is_some() {
                    return false;
                }
                self.group.push(self.pixels[row * self.width + col]);
            }
        }
        true
    }

    /// Collects the best matches for the loaded group.
    fn collect_matches(&mut self) {
        self.matches.clear();
        let view = ReferenceView {
            frame: self.reference,
            pool: &*self.pool,
            used: &*self.used,
            arena: &*self.arena,
        };

        let expand_limit = (P::GROUP_HEIGHT + 1) * self.config.match_count_throttle;
        if self.config.expand_existing_regions && self.border.number_of_active_regions() > expand_limit
        {
            self.motions.clear();
            self.border.active_motions(self.motions);
            for (order, &motion) in self.motions.iter().enumerate() {
                let found = self
                    .window
                    .check(&view, self.group.as_slice(), motion, self.tolerance);
                if let Some(sad) = found {
                    self.matches.push(Candidate {
                        motion,
                        sad,
                        order: order as u32,
                    });
                }
            }
            if !self.matches.is_empty() {
                return;
            }
        }

        let matches = &mut *self.matches;
        self.window
            .for_each_match(&view, self.group.as_slice(), self.tolerance, |candidate| {
                matches.push(candidate)
            });
    }

    /// Gives the group at `(x, y)` provisional pixels of its own.
    fn keep_group_as_new(&mut self, x: usize, y: usize) -> DenoiseResult<()> {
        for row in y..y + P::GROUP_HEIGHT {
            for col in x..x + P::GROUP_WIDTH {
                let handle = self.pool.allocate()?;
                self.new.set(self.pool, col, row, Some(handle))?;
                self.pool.add_sample(handle, self.pixels[row * self.width + col])?;
            }
        }
        Ok(())
    }

    fn search(&mut self) -> DenoiseResult<()> {
        let _span = trace_span!("search_pass").entered();
        let last_x = self.width - P::GROUP_WIDTH;
        let last_y = self.height - P::GROUP_HEIGHT;
        let size_limit = (self.config.match_size_throttle * P::GROUP_WIDTH * P::GROUP_HEIGHT) as u64;

        self.window.start_frame()?;
        self.border.start_frame(self.arena);
        let (mut x, mut y) = (0usize, 0usize);
        let mut rightwards = true;
        loop {
            if self.load_group(x, y) {
                self.collect_matches();
                let mut count = 0usize;
                let mut largest = 0u64;
                for candidate in self.matches.sorted() {
                    let points = self.border.add_new_match(self.arena, candidate.motion)?;
                    largest = largest.max(points);
                    count += 1;
                }
                if count == 0 && self.border.number_of_active_regions() == 0 {
                    self.keep_group_as_new(x, y)?;
                }
                if count >= self.config.match_count_throttle || largest >= size_limit {
                    trace_debug!("match_throttle", x = x, y = y, matches = count, largest = largest);
                    self.apply_best_active()?;
                }
            }

            let row_done = if rightwards { x == last_x } else { x == 0 };
            if row_done {
                if y == last_y {
                    break;
                }
                self.window.move_down()?;
                self.border.move_down(self.arena, self.pending)?;
                y += 1;
                rightwards = !rightwards;
            } else if rightwards {
                self.window.move_right();
                self.border.move_right()?;
                x += 1;
            } else {
                self.window.move_left();
                self.border.move_left()?;
                x -= 1;
            }
        }
        self.border.finish_frame(self.arena, self.pending)
    }

    /// Applies the best region touching the scan now and gives up on the
    /// others touching it.
    fn apply_best_active(&mut self) -> DenoiseResult<()> {
        let Some(mut best) = self
            .border
            .choose_best_active_region(self.arena, self.pending)?
        else {
            return Ok(());
        };
        let result = self.refill_and_apply(&mut best);
        best.clear(self.arena);
        let points = result?;
        if best.motion == MotionVector::ZERO {
            self.stats.not_moved_flooded += points;
        } else {
            self.stats.moved_flooded += points;
        }
        Ok(())
    }

    fn refill_and_apply(&mut self, region: &mut MovedRegion) -> DenoiseResult<u64> {
        if region.is_empty() {
            return Ok(0);
        }
        self.refill(region)?;
        self.apply(region)?;
        Ok(region.number_of_points())
    }

    /// Re-tests every point of `region` and grows it as far as it matches.
    fn refill(&mut self, region: &mut MovedRegion) -> DenoiseResult<()> {
        let mut control = MatchControl {
            width: to_coord(self.width),
            height: to_coord(self.height),
            motion: region.motion,
            pixels: self.pixels,
            reference: self.reference,
            new: &*self.new,
            pool: &*self.pool,
            used: &*self.used,
            tolerance: self.tolerance,
        };
        region
            .region
            .flood_fill(self.arena, self.sparse_work, &mut control, true)
    }

    /// Points the new frame at the displaced reference pixels of `region`
    /// and claims them.
    fn apply(&mut self, region: &MovedRegion) -> DenoiseResult<()> {
        let motion = region.motion;
        self.extents.clear();
        self.extents.extend(region.region.extents(self.arena));
        for extent in self.extents.iter() {
            let y = extent.y as usize;
            let ry = (extent.y + motion.dy) as usize;
            for x in extent.x_start..extent.x_end {
                let handle = self
                    .reference
                    .get((x + motion.dx) as usize, ry)
                    .ok_or(DenoiseError::InvariantViolation(
                        "moved region points outside the resolved reference frame",
                    ))?;
                self.new.set(self.pool, x as usize, y, Some(handle))?;
                self.pool
                    .add_sample(handle, self.pixels[y * self.width + x as usize])?;
            }
            self.used.union_extent(self.arena, extent.shifted(motion))?;
        }
        self.window.prune(self.arena, &region.region, motion);
        Ok(())
    }

    /// Applies the queued regions, best first.
    fn drain(&mut self) -> DenoiseResult<()> {
        let _span = trace_span!("drain_regions", queued = self.pending.len()).entered();
        while let Some(region) = self.pending.pop()? {
            self.drain_one(region)?;
        }
        debug_assert_eq!(self.pending.len(), 0);
        Ok(())
    }

    fn drain_one(&mut self, mut region: MovedRegion) -> DenoiseResult<()> {
        if let Err(err) = self.refill(&mut region) {
            region.clear(self.arena);
            return Err(err);
        }
        let points = region.number_of_points();
        if self.pending.peek_points().is_some_and(|next| points < next) {
            // Shrunk below a competitor: retry later, unless too small.
            return self.pending.on_completed_region(self.arena, region);
        }
        let result = self.apply(&region);
        region.clear(self.arena);
        result?;
        self.stats.moved += points;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MotionSearcher, SearchConfig, SearcherState};
    use crate::pixel::PixelY;
    use crate::util::DenoiseError;

    fn small_config(frames: usize) -> SearchConfig {
        SearchConfig {
            frames,
            radius_x: 4,
            radius_y: 4,
            ..SearchConfig::default()
        }
    }

    fn flat(width: usize, height: usize, value: u8) -> Vec<PixelY> {
        vec![PixelY(value); width * height]
    }

    #[test]
    fn rejects_bad_configuration() {
        let cfg = SearchConfig {
            frames: 1,
            ..small_config(2)
        };
        assert!(matches!(
            MotionSearcher::<PixelY>::new(cfg, 8, 8),
            Err(DenoiseError::InvalidInput(_))
        ));
        assert!(matches!(
            MotionSearcher::<PixelY>::new(small_config(2), 3, 8),
            Err(DenoiseError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            MotionSearcher::<PixelY>::new(small_config(2), 8, 3),
            Err(DenoiseError::InvalidRadius { .. })
        ));
        let cfg = SearchConfig {
            match_count_throttle: 17,
            ..small_config(2)
        };
        assert!(MotionSearcher::<PixelY>::new(cfg, 8, 8).is_err());
    }

    #[test]
    fn output_appears_once_the_window_is_full() {
        let mut searcher = MotionSearcher::new(small_config(3), 8, 8).unwrap();
        for _ in 0..2 {
            searcher.add_frame(&flat(8, 8, 90)).unwrap();
            assert!(searcher.frame_ready_for_output().is_none());
        }
        assert_eq!(searcher.state(), SearcherState::WarmingUp);
        searcher.add_frame(&flat(8, 8, 90)).unwrap();
        let frame = searcher.frame_ready_for_output().unwrap();
        assert_eq!(frame.get_pixel(3, 3), Some(PixelY(90)));
        assert_eq!(searcher.state(), SearcherState::Steady);
        assert_eq!(searcher.buffered_frames(), 2);
    }

    #[test]
    fn pending_output_blocks_the_next_frame() {
        let mut searcher = MotionSearcher::new(small_config(2), 8, 8).unwrap();
        searcher.add_frame(&flat(8, 8, 10)).unwrap();
        searcher.add_frame(&flat(8, 8, 10)).unwrap();
        assert!(matches!(
            searcher.add_frame(&flat(8, 8, 10)),
            Err(DenoiseError::InvalidInput(_))
        ));
        assert!(searcher.frame_ready_for_output().is_some());
        searcher.add_frame(&flat(8, 8, 10)).unwrap();
    }

    #[test]
    fn wrong_frame_size_is_rejected() {
        let mut searcher = MotionSearcher::new(small_config(2), 8, 8).unwrap();
        assert_eq!(
            searcher.add_frame(&flat(8, 7, 0)),
            Err(DenoiseError::BufferTooSmall {
                needed: 64,
                got: 56
            })
        );
        assert!(searcher.add_frame(&flat(8, 9, 0)).is_err());
    }

    #[test]
    fn unmoved_frames_resolve_without_search() {
        let mut searcher = MotionSearcher::new(small_config(4), 8, 8).unwrap();
        let first = searcher.add_frame(&flat(8, 8, 50)).unwrap();
        assert_eq!(first.new, 64);
        let second = searcher.add_frame(&flat(8, 8, 51)).unwrap();
        assert_eq!(second.not_moved, 64);
        assert_eq!(second.total(), 64);
    }

    #[test]
    fn draining_stops_input() {
        let mut searcher = MotionSearcher::new(small_config(3), 8, 8).unwrap();
        searcher.add_frame(&flat(8, 8, 1)).unwrap();
        searcher.add_frame(&flat(8, 8, 1)).unwrap();
        let mut flushed = 0;
        while searcher.get_remaining_frames().is_some() {
            flushed += 1;
        }
        assert_eq!(flushed, 2);
        assert_eq!(searcher.state(), SearcherState::Draining);
        assert!(searcher.add_frame(&flat(8, 8, 1)).is_err());
    }
}
