//! Object/background mask extraction for inpainting.

use image::{GrayImage, Luma, RgbImage};

use crate::error::{Error, Result};

/// Default per-channel distance from white still treated as background.
pub const DEFAULT_TOLERANCE: i32 = 10;

/// Number of dilation passes applied to the thresholded mask.
const DILATE_ITERATIONS: usize = 2;

const OBJECT: u8 = 255;
const BACKGROUND: u8 = 0;

/// Build a mask marking the object (255) against a near-white background (0).
///
/// A pixel is background when every channel lies in `[255 - tolerance, 255]`.
/// The object region is then grown by two passes of a 2x2 dilation, which
/// closes thin light gaps inside the silhouette.
///
/// The result has the same dimensions as `image`.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `tolerance` is outside `0..=255`.
pub fn create_contour_mask(image: &RgbImage, tolerance: i32) -> Result<GrayImage> {
    let tolerance = u8::try_from(tolerance).map_err(|_| {
        Error::invalid(
            "tolerance",
            format!("must be between 0 and 255, got {tolerance}"),
        )
    })?;
    let lower = 255 - tolerance;

    let (width, height) = image.dimensions();
    let mut mask = GrayImage::from_pixel(width, height, Luma([OBJECT]));

    for (src, dst) in image.pixels().zip(mask.pixels_mut()) {
        if src.0.iter().all(|&c| c >= lower) {
            dst.0[0] = BACKGROUND;
        }
    }

    for _ in 0..DILATE_ITERATIONS {
        mask = dilate_2x2(&mask);
    }

    Ok(mask)
}

/// One pass of binary dilation with a 2x2 square element anchored at its
/// bottom-right cell: each output pixel is the maximum of itself and its
/// left, upper, and upper-left neighbours. Neighbours outside the image are
/// ignored.
fn dilate_2x2(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();

    GrayImage::from_fn(width, height, |x, y| {
        let mut value = mask.get_pixel(x, y)[0];
        if x > 0 {
            value = value.max(mask.get_pixel(x - 1, y)[0]);
        }
        if y > 0 {
            value = value.max(mask.get_pixel(x, y - 1)[0]);
            if x > 0 {
                value = value.max(mask.get_pixel(x - 1, y - 1)[0]);
            }
        }
        Luma([value])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    fn count(mask: &GrayImage, value: u8) -> usize {
        mask.pixels().filter(|p| p[0] == value).count()
    }

    #[test]
    fn test_all_white_is_all_background() {
        let img = RgbImage::from_pixel(32, 24, WHITE);
        let mask = create_contour_mask(&img, DEFAULT_TOLERANCE).unwrap();

        assert_eq!(mask.dimensions(), (32, 24));
        assert_eq!(count(&mask, 0), 32 * 24);
    }

    #[test]
    fn test_single_black_pixel_grows_down_right() {
        let mut img = RgbImage::from_pixel(10, 10, WHITE);
        img.put_pixel(4, 4, Rgb([0, 0, 0]));
        let mask = create_contour_mask(&img, DEFAULT_TOLERANCE).unwrap();

        for y in 0..10 {
            for x in 0..10 {
                let expected = if (4..=6).contains(&x) && (4..=6).contains(&y) {
                    255
                } else {
                    0
                };
                assert_eq!(mask.get_pixel(x, y)[0], expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_object_at_border_is_clipped() {
        let mut img = RgbImage::from_pixel(4, 4, WHITE);
        img.put_pixel(3, 3, Rgb([10, 200, 30]));
        let mask = create_contour_mask(&img, DEFAULT_TOLERANCE).unwrap();

        assert_eq!(count(&mask, 255), 1);
        assert_eq!(mask.get_pixel(3, 3)[0], 255);
    }

    #[test]
    fn test_tolerance_boundaries() {
        let mut img = RgbImage::from_pixel(8, 1, WHITE);
        img.put_pixel(0, 0, Rgb([245, 255, 255]));
        img.put_pixel(4, 0, Rgb([255, 244, 255]));

        let mask = create_contour_mask(&img, 10).unwrap();
        // 245 is within tolerance, 244 is not.
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
        assert_eq!(mask.get_pixel(3, 0)[0], 0);
        assert_eq!(mask.get_pixel(4, 0)[0], 255);
        assert_eq!(mask.get_pixel(5, 0)[0], 255);
        assert_eq!(mask.get_pixel(6, 0)[0], 255);
        assert_eq!(mask.get_pixel(7, 0)[0], 0);
    }

    #[test]
    fn test_zero_tolerance_only_pure_white() {
        let mut img = RgbImage::from_pixel(6, 6, WHITE);
        img.put_pixel(0, 0, Rgb([254, 255, 255]));
        let mask = create_contour_mask(&img, 0).unwrap();

        assert_eq!(mask.get_pixel(0, 0)[0], 255);
        assert_eq!(count(&mask, 255), 9);
    }

    #[test]
    fn test_full_tolerance_is_all_background() {
        let img = RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 0]));
        let mask = create_contour_mask(&img, 255).unwrap();

        assert_eq!(count(&mask, 0), 16 * 16);
    }

    #[test]
    fn test_background_count_monotonic_in_tolerance() {
        let img = RgbImage::from_fn(40, 40, |x, y| {
            Rgb([255 - (x * 3) as u8, 255 - (y * 2) as u8, 255 - ((x + y) % 30) as u8])
        });

        let mut previous = 0;
        for tolerance in 0..=255 {
            let mask = create_contour_mask(&img, tolerance).unwrap();
            let background = count(&mask, 0);
            assert!(background >= previous, "tolerance {tolerance}");
            previous = background;
        }
    }

    #[test]
    fn test_mask_is_binary() {
        let img = RgbImage::from_fn(20, 20, |x, y| Rgb([(x * 13) as u8, (y * 11) as u8, 250]));
        let mask = create_contour_mask(&img, 30).unwrap();

        assert!(mask.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn test_invalid_tolerance() {
        let img = RgbImage::from_pixel(2, 2, WHITE);
        for tolerance in [-1, 256, i32::MIN, i32::MAX] {
            let err = create_contour_mask(&img, tolerance).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument { ref name, .. } if name == "tolerance"));
        }
    }
}
