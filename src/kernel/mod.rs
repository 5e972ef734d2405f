//! Block comparison kernels.
//!
//! `scalar` works for every pixel kind. With the `simd` feature, luma blocks
//! are compared eight samples at a time through `wide`.

pub(crate) mod scalar;
#[cfg(feature = "simd")]
pub(crate) mod simd;

use crate::pixel::PixelY;

/// Total absolute difference of two luma blocks, or `None` if any sample
/// differs by more than `tolerance`.
#[inline]
pub(crate) fn luma_group_difference(a: &[PixelY], b: &[PixelY], tolerance: u32) -> Option<u32> {
    #[cfg(feature = "simd")]
    {
        simd::luma_group_difference(a, b, tolerance)
    }
    #[cfg(not(feature = "simd"))]
    {
        scalar::group_difference(a, b, tolerance)
    }
}
