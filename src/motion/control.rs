//! Flood-fill controls used while resolving a new frame.

use crate::pixel::{Pixel, PixelPool, ReferenceFrame};
use crate::region::{DenseRegion, Extent, FloodFillControl, MotionVector};
use crate::util::DenoiseError;

/// Clips `extent` to `[0, width) x [0, height)`.
fn clip(extent: &mut Extent, width: i32, height: i32) -> bool {
    if extent.y < 0 || extent.y >= height || extent.x_start >= width || extent.x_end <= 0 {
        return false;
    }
    extent.x_start = extent.x_start.max(0);
    extent.x_end = extent.x_end.min(width);
    true
}

/// Grows the claimed reference pixels by unmoved neighbours.
///
/// Accepted points are resolved on the spot: the new frame takes the
/// co-located reference pixel and the pixel absorbs the new sample.
pub(crate) struct ZeroMotionControl<'a, P: Pixel> {
    pub width: i32,
    pub height: i32,
    pub pixels: &'a [P],
    pub reference: &'a ReferenceFrame,
    pub new: &'a mut ReferenceFrame,
    pub pool: &'a mut PixelPool<P>,
    pub tolerance: u32,
    pub accepted: u64,
    pub error: Option<DenoiseError>,
}

impl<P: Pixel> FloodFillControl for ZeroMotionControl<'_, P> {
    fn should_use_extent(&mut self, extent: &mut Extent) -> bool {
        clip(extent, self.width, self.height)
    }

    fn is_point_in_region(&mut self, x: i32, y: i32) -> bool {
        if self.error.is_some() {
            return false;
        }
        let (x, y) = (x as usize, y as usize);
        if self.new.get(x, y).is_some() {
            return false;
        }
        let Some(handle) = self.reference.get(x, y) else {
            return false;
        };
        let sample = self.pixels[y * self.width as usize + x];
        if !sample.is_within_tolerance(&self.pool.value(handle), self.tolerance) {
            return false;
        }
        let resolved = self
            .new
            .set(self.pool, x, y, Some(handle))
            .and_then(|()| self.pool.add_sample(handle, sample));
        match resolved {
            Ok(()) => {
                self.accepted += 1;
                true
            }
            Err(err) => {
                self.error = Some(err);
                false
            }
        }
    }
}

/// Accepts new-frame points that still match the reference frame along
/// one motion vector.
///
/// A point qualifies while it is unresolved (or only provisionally
/// resolved), its displaced reference pixel is unclaimed, and the two
/// samples agree within the tolerance.
pub(crate) struct MatchControl<'a, P: Pixel> {
    pub width: i32,
    pub height: i32,
    pub motion: MotionVector,
    pub pixels: &'a [P],
    pub reference: &'a ReferenceFrame,
    pub new: &'a ReferenceFrame,
    pub pool: &'a PixelPool<P>,
    pub used: &'a DenseRegion,
    pub tolerance: u32,
}

impl<P: Pixel> FloodFillControl for MatchControl<'_, P> {
    fn should_use_extent(&mut self, extent: &mut Extent) -> bool {
        if !clip(extent, self.width, self.height) {
            return false;
        }
        let mut shifted = extent.shifted(self.motion);
        if !clip(&mut shifted, self.width, self.height) {
            return false;
        }
        extent.x_start = shifted.x_start - self.motion.dx;
        extent.x_end = shifted.x_end - self.motion.dx;
        true
    }

    fn is_point_in_region(&mut self, x: i32, y: i32) -> bool {
        if let Some(current) = self.new.get(x as usize, y as usize) {
            if self.pool.references(current) != 1 {
                return false;
            }
        }
        let (rx, ry) = (x + self.motion.dx, y + self.motion.dy);
        if self.used.contains(rx, ry) {
            return false;
        }
        let Some(handle) = self.reference.get(rx as usize, ry as usize) else {
            return false;
        };
        let sample = self.pixels[y as usize * self.width as usize + x as usize];
        sample.is_within_tolerance(&self.pool.value(handle), self.tolerance)
    }
}
