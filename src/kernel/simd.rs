//! Luma block comparison over `i32x8` lanes.

use crate::pixel::PixelY;
use wide::i32x8;

const LANES: usize = 8;

#[inline]
fn load(pixels: &[PixelY]) -> i32x8 {
    i32x8::from([
        pixels[0].0 as i32,
        pixels[1].0 as i32,
        pixels[2].0 as i32,
        pixels[3].0 as i32,
        pixels[4].0 as i32,
        pixels[5].0 as i32,
        pixels[6].0 as i32,
        pixels[7].0 as i32,
    ])
}

pub(crate) fn luma_group_difference(a: &[PixelY], b: &[PixelY], tolerance: u32) -> Option<u32> {
    debug_assert_eq!(a.len(), b.len());
    let simd_end = a.len() / LANES * LANES;
    let mut total = 0u32;

    let mut i = 0;
    while i < simd_end {
        let diff = (load(&a[i..]) - load(&b[i..])).abs().to_array();
        for d in diff {
            let d = d as u32;
            if d > tolerance {
                return None;
            }
            total += d;
        }
        i += LANES;
    }

    while i < a.len() {
        let d = a[i].0.abs_diff(b[i].0) as u32;
        if d > tolerance {
            return None;
        }
        total += d;
        i += 1;
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::luma_group_difference;
    use crate::kernel::scalar::group_difference;
    use crate::pixel::PixelY;

    #[test]
    fn matches_scalar_kernel() {
        let a: Vec<PixelY> = (0..11u8).map(|v| PixelY(v * 7)).collect();
        let b: Vec<PixelY> = (0..11u8).map(|v| PixelY(v * 7 + v % 3)).collect();
        for tolerance in 0..4 {
            assert_eq!(
                luma_group_difference(&a, &b, tolerance),
                group_difference(&a, &b, tolerance)
            );
        }
    }
}
