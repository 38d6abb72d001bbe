//! Image loading utilities.

use std::path::Path;

use image::{imageops::FilterType, GrayImage, RgbImage};
use ndarray::Array4;

use crate::error::{Error, Result};

use super::{ImageTensor, MaskTensor, RGB_CHANNELS, SD_IMAGE_SIZE};

/// Load an image from disk as 8-bit RGB.
///
/// Any decodable colour type (grayscale, RGBA, 16-bit) is converted to RGB,
/// so downstream transforms always see three channels.
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let path = path.as_ref();

    let img = image::open(path).map_err(|source| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(
        "Loaded {} ({}x{}, {:?})",
        path.display(),
        img.width(),
        img.height(),
        img.color()
    );

    Ok(img.to_rgb8())
}

/// Convert an RGB image to a normalized NCHW tensor.
///
/// The image is resized to 512x512 (Lanczos3) when needed and normalized to
/// the [-1, 1] range, returning a (1, 3, 512, 512) tensor.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn image_to_tensor(img: &RgbImage) -> ImageTensor {
    let resized;
    let rgb = if img.dimensions() == (SD_IMAGE_SIZE, SD_IMAGE_SIZE) {
        img
    } else {
        resized = image::imageops::resize(img, SD_IMAGE_SIZE, SD_IMAGE_SIZE, FilterType::Lanczos3);
        &resized
    };

    let (width, height) = (SD_IMAGE_SIZE as usize, SD_IMAGE_SIZE as usize);

    let mut tensor = Array4::<f32>::zeros((1, RGB_CHANNELS, height, width));

    for y in 0..height {
        for x in 0..width {
            // Safe: x and y are bounded by SD_IMAGE_SIZE (512) which fits in u32
            let pixel = rgb.get_pixel(x as u32, y as u32);
            tensor[[0, 0, y, x]] = (f32::from(pixel[0]) / 127.5) - 1.0;
            tensor[[0, 1, y, x]] = (f32::from(pixel[1]) / 127.5) - 1.0;
            tensor[[0, 2, y, x]] = (f32::from(pixel[2]) / 127.5) - 1.0;
        }
    }

    tensor
}

/// Convert a mask to a binary NCHW tensor of shape (1, 1, 512, 512).
///
/// The mask is resized with nearest-neighbour sampling so it stays binary,
/// then thresholded at half intensity: 255 becomes 1.0, 0 becomes 0.0.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn mask_to_tensor(mask: &GrayImage) -> MaskTensor {
    let resized;
    let gray = if mask.dimensions() == (SD_IMAGE_SIZE, SD_IMAGE_SIZE) {
        mask
    } else {
        resized = image::imageops::resize(mask, SD_IMAGE_SIZE, SD_IMAGE_SIZE, FilterType::Nearest);
        &resized
    };

    let size = SD_IMAGE_SIZE as usize;
    Array4::from_shape_fn((1, 1, size, size), |(_, _, y, x)| {
        if gray.get_pixel(x as u32, y as u32)[0] >= 128 {
            1.0
        } else {
            0.0
        }
    })
}
