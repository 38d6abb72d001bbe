//! Model file cache, downloads, and session loading.

mod loader;

pub use loader::{ModelCache, ModelType, DEFAULT_MODEL_URL};
