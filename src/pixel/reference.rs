//! Reference-counted accumulating pixels and their fixed-size pool.

use super::Pixel;
use crate::util::{DenoiseError, DenoiseResult};
use std::cell::Cell;

/// Sample count at which sum and count are halved before the next sample.
///
/// Past this point the value is a decaying average rather than the exact mean;
/// it keeps the sums from overflowing on long static scenes.
pub const SAMPLE_HALVING_THRESHOLD: u32 = 10;

/// Handle of a pixel inside a [`PixelPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PixelHandle(u32);

impl PixelHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One believed-stable scene pixel, averaged over the frames it appeared in.
#[derive(Debug)]
pub struct ReferencePixel<P: Pixel> {
    sum: P::Accum,
    count: u32,
    references: u32,
    value: Cell<Option<P>>,
}

impl<P: Pixel> Default for ReferencePixel<P> {
    fn default() -> Self {
        Self {
            sum: P::Accum::default(),
            count: 0,
            references: 0,
            value: Cell::new(None),
        }
    }
}

impl<P: Pixel> ReferencePixel<P> {
    /// Number of frame slots pointing at this pixel.
    pub fn references(&self) -> u32 {
        self.references
    }

    /// Number of samples currently weighted into the value.
    pub fn sample_count(&self) -> u32 {
        self.count
    }

    fn reset(&mut self) {
        self.sum = P::Accum::default();
        self.count = 0;
        self.value.set(None);
    }

    fn add_sample(&mut self, sample: P) {
        if self.count >= SAMPLE_HALVING_THRESHOLD {
            P::halve(&mut self.sum);
            self.count >>= 1;
        }
        P::accumulate(&mut self.sum, sample);
        self.count += 1;
        self.value.set(None);
    }

    /// Rounded mean of the accumulated samples, cached until the next sample.
    pub fn value(&self) -> P {
        if let Some(value) = self.value.get() {
            return value;
        }
        let value = if self.count == 0 {
            P::default()
        } else {
            P::mean(&self.sum, self.count)
        };
        self.value.set(Some(value));
        value
    }
}

/// Fixed-capacity pool of reference pixels.
///
/// Slots are handed out round-robin; a slot is free when no frame refers to
/// it. Frames release pixels implicitly by overwriting or resetting their
/// slots.
pub struct PixelPool<P: Pixel> {
    pixels: Vec<ReferencePixel<P>>,
    next: usize,
}

impl<P: Pixel> PixelPool<P> {
    /// Allocates a pool of `capacity` pixels up front.
    pub fn new(capacity: usize) -> DenoiseResult<Self> {
        if capacity == 0 || capacity > u32::MAX as usize {
            return Err(DenoiseError::InvalidInput("pixel pool capacity out of range"));
        }
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(capacity)
            .map_err(|_| DenoiseError::OutOfMemory {
                context: "reference pixel pool",
            })?;
        pixels.resize_with(capacity, ReferencePixel::default);
        Ok(Self { pixels, next: 0 })
    }

    pub fn capacity(&self) -> usize {
        self.pixels.len()
    }

    /// Number of pixels referenced by at least one frame.
    pub fn live(&self) -> usize {
        self.pixels.iter().filter(|p| p.references > 0).count()
    }

    /// Finds an unreferenced slot and resets it.
    ///
    /// The slot stays free until a frame references it, so a handle must be
    /// stored with [`ReferenceFrame::set`](super::ReferenceFrame::set) before
    /// the next call, or that call may return it again.
    ///
    /// Running out means more pixels are alive than the pool was sized for,
    /// which the searcher's sizing rules never allow.
    pub fn allocate(&mut self) -> DenoiseResult<PixelHandle> {
        let capacity = self.pixels.len();
        for _ in 0..capacity {
            let index = self.next;
            self.next = (self.next + 1) % capacity;
            let pixel = &mut self.pixels[index];
            if pixel.references == 0 {
                pixel.reset();
                return Ok(PixelHandle(index as u32));
            }
        }
        Err(DenoiseError::InvariantViolation("reference pixel pool exhausted"))
    }

    #[inline]
    pub fn get(&self, handle: PixelHandle) -> &ReferencePixel<P> {
        &self.pixels[handle.index()]
    }

    #[inline]
    pub fn value(&self, handle: PixelHandle) -> P {
        self.pixels[handle.index()].value()
    }

    #[inline]
    pub fn references(&self, handle: PixelHandle) -> u32 {
        self.pixels[handle.index()].references
    }

    /// Folds a new sample into a live pixel.
    pub fn add_sample(&mut self, handle: PixelHandle, sample: P) -> DenoiseResult<()> {
        let pixel = &mut self.pixels[handle.index()];
        if pixel.references == 0 {
            return Err(DenoiseError::InvariantViolation(
                "sample added to an unreferenced pixel",
            ));
        }
        pixel.add_sample(sample);
        Ok(())
    }

    #[inline]
    pub(crate) fn add_reference(&mut self, handle: PixelHandle) {
        self.pixels[handle.index()].references += 1;
    }

    pub(crate) fn remove_reference(&mut self, handle: PixelHandle) -> DenoiseResult<()> {
        let pixel = &mut self.pixels[handle.index()];
        pixel.references = pixel
            .references
            .checked_sub(1)
            .ok_or(DenoiseError::InvariantViolation("pixel reference count underflow"))?;
        Ok(())
    }
}
