//! Image saving utilities.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, Rgb, RgbImage};

use crate::error::{Error, Result};

use super::{ImageTensor, SD_IMAGE_SIZE};

/// Save an RGB image to disk.
///
/// The format is inferred from the extension, falling back to PNG. JPEG
/// output is encoded with `quality` (1-100); other formats ignore it. The
/// file only appears once encoding has succeeded.
///
/// # Errors
///
/// Returns an error if the file cannot be created or encoded.
pub fn save_image<P: AsRef<Path>>(img: &RgbImage, path: P, quality: u8) -> Result<()> {
    write_dynamic(&DynamicImage::ImageRgb8(img.clone()), path.as_ref(), quality)
}

/// Save a single-channel mask to disk.
///
/// # Errors
///
/// Returns an error if the file cannot be created or encoded.
pub fn save_mask<P: AsRef<Path>>(mask: &GrayImage, path: P) -> Result<()> {
    write_dynamic(&DynamicImage::ImageLuma8(mask.clone()), path.as_ref(), 100)
}

fn write_dynamic(img: &DynamicImage, path: &Path, quality: u8) -> Result<()> {
    let format = ImageFormat::from_path(path).unwrap_or(ImageFormat::Png);

    tracing::debug!("Writing {} as {format:?}", path.display());

    let save_error = |source: image::ImageError| Error::ImageSave {
        path: path.to_path_buf(),
        source,
    };

    // Encode in memory so a failed encode never leaves a partial file behind
    let mut encoded = Cursor::new(Vec::new());
    if format == ImageFormat::Jpeg {
        let encoder = JpegEncoder::new_with_quality(&mut encoded, quality);
        img.write_with_encoder(encoder).map_err(save_error)?;
    } else {
        img.write_to(&mut encoded, format).map_err(save_error)?;
    }

    // Write to a temporary file first, then rename for atomicity
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, encoded.into_inner())?;
    fs::rename(&temp_path, path)?;

    Ok(())
}

/// Convert a normalized NCHW tensor to an RGB image of 512x512.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn tensor_to_image(tensor: &ImageTensor) -> RgbImage {
    let height = SD_IMAGE_SIZE as usize;
    let width = SD_IMAGE_SIZE as usize;

    let mut img = ImageBuffer::new(SD_IMAGE_SIZE, SD_IMAGE_SIZE);

    for y in 0..height {
        for x in 0..width {
            let r = denormalize(tensor[[0, 0, y, x]]);
            let g = denormalize(tensor[[0, 1, y, x]]);
            let b = denormalize(tensor[[0, 2, y, x]]);

            // Safe: x and y are bounded by SD_IMAGE_SIZE (512) which fits in u32
            img.put_pixel(x as u32, y as u32, Rgb([r, g, b]));
        }
    }

    img
}

/// Denormalize a value from [-1, 1] to [0, 255] with clamping.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn denormalize(value: f32) -> u8 {
    let scaled = (value + 1.0) * 127.5;
    scaled.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::image_to_tensor;

    #[test]
    fn test_denormalize() {
        assert_eq!(denormalize(-1.0), 0);
        assert_eq!(denormalize(0.0), 128);
        assert_eq!(denormalize(1.0), 255);
    }

    #[test]
    fn test_denormalize_clamp() {
        assert_eq!(denormalize(-2.0), 0);
        assert_eq!(denormalize(2.0), 255);
    }

    #[test]
    fn test_tensor_to_image_preserves_pixels() {
        let img = RgbImage::from_fn(512, 512, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 77])
        });
        let back = tensor_to_image(&image_to_tensor(&img));
        assert_eq!(back, img);
    }

    #[test]
    fn test_save_image_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbImage::from_pixel(16, 8, Rgb([10, 20, 30]));

        let png = dir.path().join("out.png");
        save_image(&img, &png, 95).unwrap();
        assert_eq!(image::open(&png).unwrap().to_rgb8(), img);

        let jpg = dir.path().join("out.jpg");
        save_image(&img, &jpg, 90).unwrap();
        assert_eq!(image::open(&jpg).unwrap().to_rgb8().dimensions(), (16, 8));
    }

    #[test]
    fn test_failed_encode_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.jpg");
        // JPEG cannot store images wider than 65535 pixels.
        let img = RgbImage::new(70_000, 1);

        let err = save_image(&img, &path, 90).unwrap_err();

        assert!(matches!(err, Error::ImageSave { .. }));
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_extension_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        let img = RgbImage::from_pixel(3, 3, Rgb([1, 2, 3]));

        save_image(&img, &path, 95).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_save_mask_is_grayscale() {
        let dir = tempfile::tempdir().unwrap();
        let mask = GrayImage::from_pixel(4, 4, image::Luma([255]));
        let path = dir.path().join("mask.png");
        save_mask(&mask, &path).unwrap();

        let loaded = image::open(&path).unwrap();
        assert_eq!(loaded.color(), image::ColorType::L8);
        assert_eq!(loaded.to_luma8(), mask);
    }
}
