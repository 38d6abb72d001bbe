//! Zoom-out inpainting pipeline and the diffusion model behind it.

mod diffusion;
mod inpaint;
mod process;
mod scheduler;
mod tensor;
mod text;
mod vae;

pub use diffusion::{InpaintConfig, StableDiffusionInpainter};
pub use inpaint::{check_mask, Inpaint};
pub use process::{process_image, Config, Inpainted, Pipeline};
