//! Zoom, mask, and inpaint one image.

use std::path::{Path, PathBuf};

use image::{GrayImage, RgbImage};

use crate::error::{Error, Result};
use crate::image::{load_image, save_image, save_mask};
use crate::transform::{create_contour_mask, zoom_out, DEFAULT_TOLERANCE};

use super::inpaint::Inpaint;

/// Configuration for the zoom-and-fill pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Zoom-out factor. 1.0 leaves the image untouched.
    pub zoom: f64,

    /// Per-channel distance from white still treated as background (0-255).
    pub tolerance: i32,

    /// Output JPEG quality (1-100).
    pub output_quality: u8,

    /// Where to also write the mask handed to the inpainter.
    pub mask_output: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            tolerance: DEFAULT_TOLERANCE,
            output_quality: 95,
            mask_output: None,
        }
    }
}

impl Config {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if !self.zoom.is_finite() || self.zoom <= 0.0 {
            return Err(Error::invalid("zoom", "must be a positive number"));
        }

        if !(0..=255).contains(&self.tolerance) {
            return Err(Error::invalid("tolerance", "must be between 0 and 255"));
        }

        if !(1..=100).contains(&self.output_quality) {
            return Err(Error::invalid("output_quality", "must be between 1 and 100"));
        }

        Ok(())
    }
}

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct Inpainted {
    /// Image returned by the inpainter.
    pub image: RgbImage,
    /// Mask that was handed to the inpainter.
    pub mask: GrayImage,
}

/// Zoom out when `zoom` is not 1, build the contour mask, and inpaint.
///
/// # Errors
///
/// Returns an error if the zoom factor or tolerance is invalid, the image is
/// too small to zoom, or the inpainter fails.
#[allow(clippy::float_cmp)]
pub fn process_image<I: Inpaint + ?Sized>(
    inpainter: &mut I,
    image: &RgbImage,
    prompt: &str,
    zoom: f64,
    tolerance: i32,
) -> Result<Inpainted> {
    let zoomed;
    let source = if zoom == 1.0 {
        image
    } else {
        tracing::info!("Zooming out by {zoom}");
        zoomed = zoom_out(image, zoom)?;
        &zoomed
    };

    tracing::info!("Extracting mask with tolerance {tolerance}");
    let mask = create_contour_mask(source, tolerance)?;

    tracing::info!("Inpainting with prompt {prompt:?}");
    let output = inpainter.inpaint(source, &mask, prompt)?;

    Ok(Inpainted {
        image: output,
        mask,
    })
}

/// Loads an image, fills around its subject, and writes the result.
///
/// The inpainter is built once by the caller and reused across calls.
pub struct Pipeline<I> {
    config: Config,
    inpainter: I,
}

impl<I: Inpaint> Pipeline<I> {
    /// Create a new pipeline with the given configuration and inpainter.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: Config, inpainter: I) -> Result<Self> {
        config.validate()?;

        tracing::debug!("Pipeline config: {config:?}");

        Ok(Self { config, inpainter })
    }

    /// The validated configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Give back the inpainter.
    pub fn into_inner(self) -> I {
        self.inpainter
    }

    /// Process one image file and save the result.
    ///
    /// # Errors
    ///
    /// Returns an error if loading, processing, or saving fails.
    pub fn process<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        input_path: P,
        output_path: Q,
        prompt: &str,
    ) -> Result<()> {
        let input_path = input_path.as_ref();
        let output_path = output_path.as_ref();

        tracing::info!("Processing image: {}", input_path.display());

        let source = load_image(input_path)?;

        let result = process_image(
            &mut self.inpainter,
            &source,
            prompt,
            self.config.zoom,
            self.config.tolerance,
        )?;

        if let Some(mask_path) = &self.config.mask_output {
            tracing::info!("Saving mask to: {}", mask_path.display());
            save_mask(&result.mask, mask_path)?;
        }

        tracing::info!("Saving output to: {}", output_path.display());
        save_image(&result.image, output_path, self.config.output_quality)?;

        tracing::info!("Processing complete");
        Ok(())
    }
}
