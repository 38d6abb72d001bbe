//! Variational Autoencoder operations for encoding/decoding images.

use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{Error, Result};
use crate::image::{ImageTensor, MaskTensor};

use super::tensor::extract_array4;

/// Latent tensor type (1, 4, 64, 64) for 512x512 images.
pub type LatentTensor = Array4<f32>;

/// VAE scaling factor (from Stable Diffusion).
const VAE_SCALE: f32 = 0.18215;

/// Encode an image to scaled latents using the VAE encoder.
///
/// # Errors
///
/// Returns an error if inference fails.
pub fn encode(encoder: &mut Session, image: &ImageTensor) -> Result<LatentTensor> {
    let input_value =
        Tensor::from_array(image.clone()).map_err(|source| Error::Inference { source })?;

    let outputs = encoder
        .run(ort::inputs![input_value])
        .map_err(|source| Error::Inference { source })?;

    let output = outputs
        .values()
        .next()
        .ok_or_else(|| Error::ShapeMismatch {
            expected: "latent_sample output".to_string(),
            actual: "no output".to_string(),
        })?;

    let latent = extract_array4(&output)?;

    Ok(latent * VAE_SCALE)
}

/// Decode scaled latents back to image space using the VAE decoder.
///
/// # Errors
///
/// Returns an error if inference fails.
pub fn decode(decoder: &mut Session, latent: &LatentTensor) -> Result<ImageTensor> {
    let unscaled = latent / VAE_SCALE;

    let input_value =
        Tensor::from_array(unscaled).map_err(|source| Error::Inference { source })?;

    let outputs = decoder
        .run(ort::inputs![input_value])
        .map_err(|source| Error::Inference { source })?;

    let output = outputs
        .values()
        .next()
        .ok_or_else(|| Error::ShapeMismatch {
            expected: "sample output".to_string(),
            actual: "no output".to_string(),
        })?;

    extract_array4(&output)
}

/// Downsample a binary image-space mask to latent resolution by taking the
/// top-left pixel of each cell.
#[must_use]
pub fn downsample_mask(mask: &MaskTensor, height: usize, width: usize) -> MaskTensor {
    let (_, _, mask_height, mask_width) = mask.dim();
    let step_y = (mask_height / height.max(1)).max(1);
    let step_x = (mask_width / width.max(1)).max(1);

    Array4::from_shape_fn((1, 1, height, width), |(_, _, y, x)| {
        mask[[0, 0, (y * step_y).min(mask_height - 1), (x * step_x).min(mask_width - 1)]]
    })
}
