//! # zoompaint
//!
//! Shrink the subject of an image onto a white canvas and let a
//! text-conditioned inpainting model paint the new surroundings.
//!
//! The two geometric steps, [`zoom_out`] and [`create_contour_mask`], are
//! plain image transforms. The model sits behind the [`Inpaint`] trait;
//! [`StableDiffusionInpainter`] implements it with ONNX Runtime.
//!
//! ## Example
//!
//! ```no_run
//! use zoompaint::{Config, InpaintConfig, ModelCache, Pipeline, StableDiffusionInpainter};
//!
//! # fn main() -> zoompaint::Result<()> {
//! let cache = ModelCache::new()?;
//! let inpainter = StableDiffusionInpainter::new(InpaintConfig::default(), &cache)?;
//! let config = Config {
//!     zoom: 2.0,
//!     ..Config::default()
//! };
//! let mut pipeline = Pipeline::new(config, inpainter)?;
//!
//! pipeline.process("product.png", "scene.png", "a wooden table in a sunny kitchen")?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod image;
pub mod model;
pub mod pipeline;
pub mod transform;

pub use error::{Error, Result};
pub use model::ModelCache;
pub use pipeline::{
    process_image, Config, Inpaint, InpaintConfig, Inpainted, Pipeline, StableDiffusionInpainter,
};
pub use transform::{create_contour_mask, zoom_out};
