//! Frames as grids of references into a pixel pool.

use super::{Pixel, PixelHandle, PixelPool};
use crate::util::{DenoiseError, DenoiseResult};

/// A `width x height` grid of optional pixel references.
pub struct ReferenceFrame {
    width: usize,
    height: usize,
    slots: Vec<Option<PixelHandle>>,
}

impl ReferenceFrame {
    pub fn new(width: usize, height: usize) -> DenoiseResult<Self> {
        let len = width
            .checked_mul(height)
            .filter(|&len| len > 0)
            .ok_or(DenoiseError::InvalidDimensions { width, height })?;
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(len)
            .map_err(|_| DenoiseError::OutOfMemory {
                context: "reference frame slots",
            })?;
        slots.resize(len, None);
        Ok(Self {
            width,
            height,
            slots,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<PixelHandle> {
        self.slots[y * self.width + x]
    }

    #[inline]
    pub fn get_index(&self, index: usize) -> Option<PixelHandle> {
        self.slots[index]
    }

    /// Points slot `index` at `pixel`, moving one reference from the old
    /// occupant to the new one. An old occupant left without references is
    /// free for reuse.
    pub fn set_index<P: Pixel>(
        &mut self,
        pool: &mut PixelPool<P>,
        index: usize,
        pixel: Option<PixelHandle>,
    ) -> DenoiseResult<()> {
        let old = self.slots[index];
        if old == pixel {
            return Ok(());
        }
        if let Some(new) = pixel {
            pool.add_reference(new);
        }
        if let Some(old) = old {
            pool.remove_reference(old)?;
        }
        self.slots[index] = pixel;
        Ok(())
    }

    #[inline]
    pub fn set<P: Pixel>(
        &mut self,
        pool: &mut PixelPool<P>,
        x: usize,
        y: usize,
        pixel: Option<PixelHandle>,
    ) -> DenoiseResult<()> {
        self.set_index(pool, y * self.width + x, pixel)
    }

    /// Releases every slot.
    pub fn reset<P: Pixel>(&mut self, pool: &mut PixelPool<P>) -> DenoiseResult<()> {
        for slot in &mut self.slots {
            if let Some(old) = slot.take() {
                pool.remove_reference(old)?;
            }
        }
        Ok(())
    }

    /// Whether every slot refers to a pixel.
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }
}

/// Read-only view of a finished frame.
///
/// The view borrows the searcher, so it cannot outlive the next frame added.
#[derive(Clone, Copy)]
pub struct FrameView<'a, P: Pixel> {
    frame: &'a ReferenceFrame,
    pool: &'a PixelPool<P>,
}

impl<'a, P: Pixel> FrameView<'a, P> {
    pub(crate) fn new(frame: &'a ReferenceFrame, pool: &'a PixelPool<P>) -> Self {
        Self { frame, pool }
    }

    pub fn width(&self) -> usize {
        self.frame.width
    }

    pub fn height(&self) -> usize {
        self.frame.height
    }

    /// Denoised value at `(x, y)`, or `None` outside the frame.
    pub fn get_pixel(&self, x: usize, y: usize) -> Option<P> {
        if x >= self.frame.width || y >= self.frame.height {
            return None;
        }
        self.frame.get(x, y).map(|handle| self.pool.value(handle))
    }

    /// Copies the frame into `out` in row-major order.
    pub fn copy_to(&self, out: &mut [P]) -> DenoiseResult<()> {
        let needed = self.frame.slots.len();
        if out.len() < needed {
            return Err(DenoiseError::BufferTooSmall {
                needed,
                got: out.len(),
            });
        }
        for (dst, slot) in out.iter_mut().zip(&self.frame.slots) {
            let handle = slot.ok_or(DenoiseError::InvariantViolation(
                "output frame has an unresolved pixel",
            ))?;
            *dst = self.pool.value(handle);
        }
        Ok(())
    }

    /// Collects the frame into a new row-major buffer.
    pub fn to_vec(&self) -> DenoiseResult<Vec<P>> {
        let mut out = vec![P::default(); self.frame.slots.len()];
        self.copy_to(&mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::{FrameView, ReferenceFrame};
    use crate::pixel::{PixelPool, PixelY};

    #[test]
    fn overwriting_a_slot_frees_the_old_pixel() {
        let mut pool = PixelPool::<PixelY>::new(4).unwrap();
        let mut frame = ReferenceFrame::new(2, 1).unwrap();
        let a = pool.allocate().unwrap();
        frame.set(&mut pool, 0, 0, Some(a)).unwrap();
        frame.set(&mut pool, 1, 0, Some(a)).unwrap();
        assert_eq!(pool.references(a), 2);

        let b = pool.allocate().unwrap();
        frame.set(&mut pool, 0, 0, Some(b)).unwrap();
        assert_eq!(pool.references(a), 1);
        frame.set(&mut pool, 1, 0, Some(b)).unwrap();
        assert_eq!(pool.references(a), 0);
        assert_eq!(pool.references(b), 2);

        frame.reset(&mut pool).unwrap();
        assert_eq!(pool.references(b), 0);
        assert!(!frame.is_complete());
    }

    #[test]
    fn view_reads_pooled_values() {
        let mut pool = PixelPool::<PixelY>::new(2).unwrap();
        let mut frame = ReferenceFrame::new(2, 1).unwrap();
        for (x, value) in [(0, 5u8), (1, 9u8)] {
            let handle = pool.allocate().unwrap();
            frame.set(&mut pool, x, 0, Some(handle)).unwrap();
            pool.add_sample(handle, PixelY(value)).unwrap();
        }
        let view = FrameView::new(&frame, &pool);
        assert_eq!(view.get_pixel(1, 0), Some(PixelY(9)));
        assert_eq!(view.get_pixel(2, 0), None);
        assert_eq!(view.to_vec().unwrap(), vec![PixelY(5), PixelY(9)]);
    }
}
