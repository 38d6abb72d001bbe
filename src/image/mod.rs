//! Image loading, saving, and tensor conversion utilities.

mod load;
mod save;

pub use load::{image_to_tensor, load_image, mask_to_tensor};
pub use save::{save_image, save_mask, tensor_to_image};

use ndarray::Array4;

/// Image tensor in NCHW format (batch, channels, height, width).
/// Values are normalized to [-1, 1] range for diffusion model compatibility.
pub type ImageTensor = Array4<f32>;

/// Mask tensor in NCHW format with a single channel, values in {0, 1}.
pub type MaskTensor = Array4<f32>;

/// Native resolution of the inpainting model, and the side of the square
/// crop produced by `zoom_out`.
pub const SD_IMAGE_SIZE: u32 = 512;

/// Number of channels in RGB images.
pub const RGB_CHANNELS: usize = 3;
