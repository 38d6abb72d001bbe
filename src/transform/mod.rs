//! Geometry and mask transforms applied before inpainting.

mod mask;
mod zoom;

pub use mask::{create_contour_mask, DEFAULT_TOLERANCE};
pub use zoom::zoom_out;
