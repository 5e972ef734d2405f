//! One motion searcher bound to the planes it reads and writes.

use crate::image::{ImageView, ImageViewMut, Plane};
use crate::motion::{FrameStats, MotionSearcher, SearchConfig};
use crate::pixel::{Pixel, PixelCbCr, PixelY};
use crate::util::{DenoiseError, DenoiseResult};

/// A pixel type that is stored across one or more 8-bit planes.
pub trait PlaneGroup: Pixel {
    /// Number of planes one pixel spans.
    const PLANES: usize;

    /// Appends the samples of `planes` in row-major order.
    fn load(planes: &[ImageView<'_, u8>], out: &mut Vec<Self>) -> DenoiseResult<()>;

    /// Writes row-major `samples` back into `planes`.
    fn store(samples: &[Self], planes: &mut [ImageViewMut<'_, u8>]) -> DenoiseResult<()>;
}

fn plane_mismatch() -> DenoiseError {
    DenoiseError::InvariantViolation("plane count does not match the pixel type")
}

impl PlaneGroup for PixelY {
    const PLANES: usize = 1;

    fn load(planes: &[ImageView<'_, u8>], out: &mut Vec<Self>) -> DenoiseResult<()> {
        let [luma] = planes else {
            return Err(plane_mismatch());
        };
        for row in luma.rows() {
            out.extend(row.iter().map(|&v| PixelY(v)));
        }
        Ok(())
    }

    fn store(samples: &[Self], planes: &mut [ImageViewMut<'_, u8>]) -> DenoiseResult<()> {
        let [luma] = planes else {
            return Err(plane_mismatch());
        };
        let width = luma.width();
        for (y, src) in samples.chunks_exact(width).enumerate() {
            let dst = luma.row_mut(y).ok_or(DenoiseError::BufferTooSmall {
                needed: samples.len(),
                got: y * width,
            })?;
            for (d, s) in dst.iter_mut().zip(src) {
                *d = s.0;
            }
        }
        Ok(())
    }
}

impl PlaneGroup for PixelCbCr {
    const PLANES: usize = 2;

    fn load(planes: &[ImageView<'_, u8>], out: &mut Vec<Self>) -> DenoiseResult<()> {
        let [cb, cr] = planes else {
            return Err(plane_mismatch());
        };
        for (cb_row, cr_row) in cb.rows().zip(cr.rows()) {
            out.extend(
                cb_row
                    .iter()
                    .zip(cr_row)
                    .map(|(&cb, &cr)| PixelCbCr::new(cb, cr)),
            );
        }
        Ok(())
    }

    fn store(samples: &[Self], planes: &mut [ImageViewMut<'_, u8>]) -> DenoiseResult<()> {
        let [cb, cr] = planes else {
            return Err(plane_mismatch());
        };
        let width = cb.width();
        for (y, src) in samples.chunks_exact(width).enumerate() {
            let short = DenoiseError::BufferTooSmall {
                needed: samples.len(),
                got: y * width,
            };
            let cb_row = cb.row_mut(y).ok_or(short.clone())?;
            for (d, s) in cb_row.iter_mut().zip(src) {
                *d = s.cb;
            }
            let cr_row = cr.row_mut(y).ok_or(short)?;
            for (d, s) in cr_row.iter_mut().zip(src) {
                *d = s.cr;
            }
        }
        Ok(())
    }
}

/// Drives a [`MotionSearcher`] over whole frames or over both fields of
/// interlaced frames.
///
/// Each call to [`PlaneEngine::add`] first takes the finished output for a
/// field, then adds that field, so both fields of a frame leave together.
pub struct PlaneEngine<P: PlaneGroup> {
    searcher: MotionSearcher<P>,
    input: Vec<P>,
    output: Vec<P>,
    fields: usize,
    first_parity: usize,
    purge_interval: usize,
    frames_seen: u64,
    stats: FrameStats,
}

impl<P: PlaneGroup> PlaneEngine<P> {
    /// `field_order` is `None` for progressive input, otherwise the parity
    /// of the field that comes first in time.
    pub fn new(
        mut config: SearchConfig,
        width: usize,
        height: usize,
        field_order: Option<usize>,
        purge_interval: usize,
    ) -> DenoiseResult<Self> {
        let (fields, first_parity, search_height) = match field_order {
            None => (1, 0, height),
            Some(parity) => {
                if height % 2 != 0 {
                    return Err(DenoiseError::InvalidDimensions { width, height });
                }
                config.frames *= 2;
                (2, parity & 1, height / 2)
            }
        };
        let searcher = MotionSearcher::new(config, width, search_height)?;
        Ok(Self {
            searcher,
            input: Vec::with_capacity(width * search_height),
            output: vec![P::default(); width * search_height],
            fields,
            first_parity,
            purge_interval,
            frames_seen: 0,
            stats: FrameStats::default(),
        })
    }

    pub fn searcher(&self) -> &MotionSearcher<P> {
        &self.searcher
    }

    /// Counters summed over the fields of the last added frame.
    pub fn last_stats(&self) -> FrameStats {
        self.stats
    }

    /// Adds one frame. Returns `true` if `outputs` received a finished frame.
    pub fn add(&mut self, inputs: &[&Plane], outputs: &mut [&mut Plane]) -> DenoiseResult<bool> {
        check_planes::<P>(inputs.len())?;
        check_planes::<P>(outputs.len())?;
        let mut produced = false;
        self.stats = FrameStats::default();
        for i in 0..self.fields {
            let parity = self.first_parity ^ i;
            if self.take_ready(outputs, parity)? {
                produced = true;
            }
            self.input.clear();
            let views = inputs
                .iter()
                .map(|plane| self.select_field(plane.view(), parity))
                .collect::<DenoiseResult<Vec<_>>>()?;
            P::load(&views, &mut self.input)?;
            let stats = self.searcher.add_frame(&self.input)?;
            accumulate(&mut self.stats, stats);
        }
        self.frames_seen += 1;
        if self.purge_interval > 0 && self.frames_seen % self.purge_interval as u64 == 0 {
            self.searcher.purge();
        }
        Ok(produced)
    }

    /// Writes the next buffered frame after input has ended. Returns `false`
    /// once every frame has been handed out.
    pub fn flush(&mut self, outputs: &mut [&mut Plane]) -> DenoiseResult<bool> {
        check_planes::<P>(outputs.len())?;
        let mut produced = false;
        for i in 0..self.fields {
            let parity = self.first_parity ^ i;
            let Some(view) = self.searcher.get_remaining_frames() else {
                break;
            };
            view.copy_to(&mut self.output)?;
            self.store_field(outputs, parity)?;
            produced = true;
        }
        Ok(produced)
    }

    fn take_ready(&mut self, outputs: &mut [&mut Plane], parity: usize) -> DenoiseResult<bool> {
        let Some(view) = self.searcher.frame_ready_for_output() else {
            return Ok(false);
        };
        view.copy_to(&mut self.output)?;
        self.store_field(outputs, parity)?;
        Ok(true)
    }

    fn store_field(&self, outputs: &mut [&mut Plane], parity: usize) -> DenoiseResult<()> {
        let mut views = outputs
            .iter_mut()
            .map(|plane| {
                let view = plane.view_mut();
                if self.fields == 1 {
                    Ok(view)
                } else {
                    view.into_field(parity)
                }
            })
            .collect::<DenoiseResult<Vec<_>>>()?;
        P::store(&self.output, &mut views)
    }

    fn select_field<'a>(
        &self,
        view: ImageView<'a, u8>,
        parity: usize,
    ) -> DenoiseResult<ImageView<'a, u8>> {
        if self.fields == 1 {
            Ok(view)
        } else {
            view.field(parity)
        }
    }
}

fn check_planes<P: PlaneGroup>(count: usize) -> DenoiseResult<()> {
    if count != P::PLANES {
        return Err(plane_mismatch());
    }
    Ok(())
}

fn accumulate(total: &mut FrameStats, stats: FrameStats) {
    total.not_moved += stats.not_moved;
    total.not_moved_flooded += stats.not_moved_flooded;
    total.moved_flooded += stats.moved_flooded;
    total.moved += stats.moved;
    total.no_match_new += stats.no_match_new;
    total.new += stats.new;
}
