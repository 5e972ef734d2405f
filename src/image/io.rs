//! PNG luma sequences via the `image` crate.
//!
//! Available when the `image-io` feature is enabled. Color images are
//! converted to 8-bit luma on load.

use crate::image::{ImageView, Plane};
use crate::util::{DenoiseError, DenoiseResult};
use std::path::Path;

/// Creates a borrowed view from a grayscale image buffer.
pub fn view_from_gray_image(img: &image::GrayImage) -> DenoiseResult<ImageView<'_, u8>> {
    ImageView::from_slice(img.as_raw(), img.width() as usize, img.height() as usize)
}

/// Copies a grayscale image buffer into an owned plane.
pub fn plane_from_gray_image(img: &image::GrayImage) -> DenoiseResult<Plane> {
    Plane::from_vec(
        img.as_raw().clone(),
        img.width() as usize,
        img.height() as usize,
    )
}

/// Loads an image from disk as a luma plane.
pub fn load_luma_png<P: AsRef<Path>>(path: P) -> DenoiseResult<Plane> {
    let img = image::open(path).map_err(|err| DenoiseError::Io {
        reason: err.to_string(),
    })?;
    plane_from_gray_image(&img.to_luma8())
}

/// Writes a luma plane as an 8-bit grayscale PNG.
pub fn save_luma_png<P: AsRef<Path>>(path: P, plane: &Plane) -> DenoiseResult<()> {
    let too_large = || DenoiseError::InvalidDimensions {
        width: plane.width(),
        height: plane.height(),
    };
    let width = u32::try_from(plane.width()).map_err(|_| too_large())?;
    let height = u32::try_from(plane.height()).map_err(|_| too_large())?;
    let img = image::GrayImage::from_raw(width, height, plane.as_slice().to_vec())
        .ok_or_else(too_large)?;
    img.save_with_format(path, image::ImageFormat::Png)
        .map_err(|err| DenoiseError::Io {
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::{load_luma_png, plane_from_gray_image, save_luma_png, view_from_gray_image};
    use crate::image::Plane;

    #[test]
    fn gray_image_views_share_layout() {
        let img = image::GrayImage::from_fn(5, 3, |x, y| image::Luma([(x + 10 * y) as u8]));
        let view = view_from_gray_image(&img).unwrap();
        assert_eq!(view.get(4, 2), Some(&24));
        let plane = plane_from_gray_image(&img).unwrap();
        assert_eq!(plane.as_slice(), img.as_raw().as_slice());
    }

    #[test]
    fn png_round_trip_preserves_samples() {
        let path = std::env::temp_dir().join(format!("mcdenoise-io-{}.png", std::process::id()));
        let plane = Plane::from_vec((0..48).map(|v| (v * 5) as u8).collect(), 8, 6).unwrap();
        save_luma_png(&path, &plane).unwrap();
        let loaded = load_luma_png(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, plane);
    }
}
