//! Pixel values and the pooled reference pixels that accumulate them.
//!
//! A [`Pixel`] is one sample of a plane: a single luma byte ([`PixelY`]) or an
//! interleaved chroma pair ([`PixelCbCr`]). Each pixel kind defines its own
//! tolerance metric and the block size used for matching.

mod frame;
mod reference;

pub use frame::{FrameView, ReferenceFrame};
pub use reference::{PixelHandle, PixelPool, ReferencePixel, SAMPLE_HALVING_THRESHOLD};

use crate::kernel;
use crate::util::math::div_round;
use std::fmt;

/// One sample of a plane, with its tolerance metric and accumulator.
pub trait Pixel: Copy + Default + Eq + fmt::Debug + Send + Sync + 'static {
    /// Per-channel running sums.
    type Accum: Copy + Default + fmt::Debug + Send;

    /// Width of the block used for matching.
    const GROUP_WIDTH: usize;
    /// Height of the block used for matching.
    const GROUP_HEIGHT: usize;

    /// Converts a user-facing tolerance into the units of [`Pixel::difference`].
    fn make_tolerance(tolerance: u32) -> u32;

    /// Distance between two samples.
    fn difference(&self, other: &Self) -> u32;

    #[inline]
    fn is_within_tolerance(&self, other: &Self, tolerance: u32) -> bool {
        self.difference(other) <= tolerance
    }

    /// Total difference between two equally sized blocks, or `None` if any
    /// sample pair exceeds `tolerance`.
    #[inline]
    fn group_difference(a: &[Self], b: &[Self], tolerance: u32) -> Option<u32> {
        kernel::scalar::group_difference(a, b, tolerance)
    }

    fn accumulate(sum: &mut Self::Accum, sample: Self);

    fn halve(sum: &mut Self::Accum);

    /// Rounded mean of `count` accumulated samples.
    fn mean(sum: &Self::Accum, count: u32) -> Self;
}

/// Luma sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PixelY(pub u8);

impl Pixel for PixelY {
    type Accum = u32;

    const GROUP_WIDTH: usize = 4;
    const GROUP_HEIGHT: usize = 2;

    fn make_tolerance(tolerance: u32) -> u32 {
        tolerance
    }

    #[inline]
    fn difference(&self, other: &Self) -> u32 {
        self.0.abs_diff(other.0) as u32
    }

    #[inline]
    fn group_difference(a: &[Self], b: &[Self], tolerance: u32) -> Option<u32> {
        kernel::luma_group_difference(a, b, tolerance)
    }

    #[inline]
    fn accumulate(sum: &mut u32, sample: Self) {
        *sum += sample.0 as u32;
    }

    #[inline]
    fn halve(sum: &mut u32) {
        *sum >>= 1;
    }

    #[inline]
    fn mean(sum: &u32, count: u32) -> Self {
        PixelY(div_round(*sum, count).min(255) as u8)
    }
}

/// Chroma sample: a Cb/Cr pair compared by squared Euclidean distance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PixelCbCr {
    pub cb: u8,
    pub cr: u8,
}

impl PixelCbCr {
    pub const fn new(cb: u8, cr: u8) -> Self {
        Self { cb, cr }
    }
}

impl Pixel for PixelCbCr {
    type Accum = [u32; 2];

    const GROUP_WIDTH: usize = 2;
    const GROUP_HEIGHT: usize = 2;

    fn make_tolerance(tolerance: u32) -> u32 {
        tolerance * tolerance
    }

    #[inline]
    fn difference(&self, other: &Self) -> u32 {
        let cb = self.cb.abs_diff(other.cb) as u32;
        let cr = self.cr.abs_diff(other.cr) as u32;
        cb * cb + cr * cr
    }

    #[inline]
    fn accumulate(sum: &mut [u32; 2], sample: Self) {
        sum[0] += sample.cb as u32;
        sum[1] += sample.cr as u32;
    }

    #[inline]
    fn halve(sum: &mut [u32; 2]) {
        sum[0] >>= 1;
        sum[1] >>= 1;
    }

    #[inline]
    fn mean(sum: &[u32; 2], count: u32) -> Self {
        PixelCbCr {
            cb: div_round(sum[0], count).min(255) as u8,
            cr: div_round(sum[1], count).min(255) as u8,
        }
    }
}
