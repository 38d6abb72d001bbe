//! The inpainting capability the pipeline delegates to.

use image::{GrayImage, RgbImage};

use crate::error::{Error, Result};

/// Fills the object-free region of an image from a text prompt.
///
/// `mask` has the same dimensions as `image`; 255 marks the object and 0
/// the surrounding area. Implementations return an image with the same
/// dimensions as `image`.
pub trait Inpaint {
    /// Run the model once.
    ///
    /// # Errors
    ///
    /// Returns an error if the mask does not match the image or the model
    /// fails.
    fn inpaint(&mut self, image: &RgbImage, mask: &GrayImage, prompt: &str) -> Result<RgbImage>;
}

impl<T: Inpaint + ?Sized> Inpaint for &mut T {
    fn inpaint(&mut self, image: &RgbImage, mask: &GrayImage, prompt: &str) -> Result<RgbImage> {
        (**self).inpaint(image, mask, prompt)
    }
}

impl<T: Inpaint + ?Sized> Inpaint for Box<T> {
    fn inpaint(&mut self, image: &RgbImage, mask: &GrayImage, prompt: &str) -> Result<RgbImage> {
        (**self).inpaint(image, mask, prompt)
    }
}

/// Check that a mask can be applied to an image.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if the dimensions differ.
pub fn check_mask(image: &RgbImage, mask: &GrayImage) -> Result<()> {
    if image.dimensions() == mask.dimensions() {
        return Ok(());
    }
    let (iw, ih) = image.dimensions();
    let (mw, mh) = mask.dimensions();
    Err(Error::invalid(
        "mask",
        format!("{mw}x{mh} does not match image {iw}x{ih}"),
    ))
}
