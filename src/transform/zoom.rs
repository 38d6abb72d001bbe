//! Shrink an image onto a white canvas and crop the model-sized center.

use image::{imageops, imageops::FilterType, Rgb, RgbImage};

use crate::error::{Error, Result};
use crate::image::SD_IMAGE_SIZE;

/// Largest resampled image, in pixels, that a factor below 1 may produce
/// (64 megapixels, about 200 MB of RGB).
const MAX_ZOOMED_PIXELS: u64 = 1 << 26;

/// Shrink `image` by `factor`, center it on a white canvas of the original
/// size, and return the central 512x512 region of that canvas.
///
/// The shrunk size is `floor(W / factor)` x `floor(H / factor)`, resampled
/// with Lanczos3. A factor below 1 enlarges instead, and the paste is
/// clipped to the canvas. With a factor of exactly 1 no resampling happens
/// and the result is a plain center crop.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `factor` is not a positive finite
/// number, if the image is smaller than 512 in either dimension, if the
/// factor shrinks the image to nothing, or if it enlarges the image past
/// 64 megapixels.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn zoom_out(image: &RgbImage, factor: f64) -> Result<RgbImage> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(Error::invalid(
            "zoom",
            format!("must be a positive number, got {factor}"),
        ));
    }

    let (width, height) = image.dimensions();
    if width < SD_IMAGE_SIZE || height < SD_IMAGE_SIZE {
        return Err(Error::invalid(
            "image",
            format!(
                "{width}x{height} is smaller than the {SD_IMAGE_SIZE}x{SD_IMAGE_SIZE} crop"
            ),
        ));
    }

    // Floor division, saturating for factors far below 1.
    let new_width = (f64::from(width) / factor).floor().min(f64::from(u32::MAX)) as u32;
    let new_height = (f64::from(height) / factor).floor().min(f64::from(u32::MAX)) as u32;
    if new_width == 0 || new_height == 0 {
        return Err(Error::invalid(
            "zoom",
            format!("factor {factor} shrinks {width}x{height} to nothing"),
        ));
    }
    if u64::from(new_width) * u64::from(new_height) > MAX_ZOOMED_PIXELS {
        return Err(Error::invalid(
            "zoom",
            format!(
                "factor {factor} enlarges {width}x{height} to {new_width}x{new_height}, \
                 over the {MAX_ZOOMED_PIXELS} pixel limit"
            ),
        ));
    }

    tracing::debug!("Zooming {width}x{height} by {factor} to {new_width}x{new_height}");

    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

    // Integer division on signed offsets, so an enlarged image lands at a
    // negative offset and gets clipped by the overlay.
    let x_offset = (i64::from(width) - i64::from(new_width)).div_euclid(2);
    let y_offset = (i64::from(height) - i64::from(new_height)).div_euclid(2);

    if (new_width, new_height) == (width, height) {
        imageops::overlay(&mut canvas, image, x_offset, y_offset);
    } else {
        let resized = imageops::resize(image, new_width, new_height, FilterType::Lanczos3);
        imageops::overlay(&mut canvas, &resized, x_offset, y_offset);
    }

    let left = (width - SD_IMAGE_SIZE) / 2;
    let top = (height - SD_IMAGE_SIZE) / 2;

    Ok(imageops::crop_imm(&canvas, left, top, SD_IMAGE_SIZE, SD_IMAGE_SIZE).to_image())
}
