//! Model downloading and loading utilities.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use ort::session::Session;
use tokenizers::Tokenizer;

use crate::error::{Error, Result};

/// Default location of the ONNX export of Stable Diffusion inpainting.
pub const DEFAULT_MODEL_URL: &str =
    "https://huggingface.co/runwayml/stable-diffusion-inpainting/resolve/onnx";

/// CLIP tokenizer matching the inpainting model's text encoder.
const TOKENIZER_URL: &str =
    "https://huggingface.co/openai/clip-vit-large-patch14/resolve/main/tokenizer.json";

/// Files used by the inpainting pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    /// CLIP text encoder - turns prompt tokens into conditioning states.
    TextEncoder,
    /// Inpainting `UNet` - predicts noise from latents, mask and masked image.
    Unet,
    /// VAE Encoder - encodes images to latent space.
    VaeEncoder,
    /// VAE Decoder - decodes latents to images.
    VaeDecoder,
    /// CLIP byte-pair tokenizer definition.
    Tokenizer,
}

impl ModelType {
    /// All files the pipeline needs, in load order.
    pub const ALL: [Self; 5] = [
        Self::Tokenizer,
        Self::TextEncoder,
        Self::VaeEncoder,
        Self::VaeDecoder,
        Self::Unet,
    ];

    /// Get the cache filename for this model type.
    #[must_use]
    pub const fn filename(&self) -> &'static str {
        match self {
            Self::TextEncoder => "text_encoder.onnx",
            Self::Unet => "unet.onnx",
            Self::VaeEncoder => "vae_encoder.onnx",
            Self::VaeDecoder => "vae_decoder.onnx",
            Self::Tokenizer => "tokenizer.json",
        }
    }

    /// Get the download URL for this model type relative to `base_url`.
    #[must_use]
    pub fn url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        match self {
            Self::TextEncoder => format!("{base}/text_encoder/model.onnx"),
            Self::Unet => format!("{base}/unet/model.onnx"),
            Self::VaeEncoder => format!("{base}/vae_encoder/model.onnx"),
            Self::VaeDecoder => format!("{base}/vae_decoder/model.onnx"),
            Self::Tokenizer => TOKENIZER_URL.to_string(),
        }
    }

    /// Get the approximate size in bytes for progress indication.
    #[must_use]
    pub const fn approx_size(&self) -> u64 {
        match self {
            Self::TextEncoder => 492_000_000, // ~492 MB
            Self::Unet => 700_000,            // graph only, weights are external
            Self::VaeEncoder => 137_000_000,  // ~137 MB
            Self::VaeDecoder => 198_000_000,  // ~198 MB
            Self::Tokenizer => 2_200_000,     // ~2.2 MB
        }
    }

    /// Get the external data file URL if this model has one.
    #[must_use]
    pub fn data_url(&self, base_url: &str) -> Option<String> {
        match self {
            Self::Unet => Some(format!("{}/unet/weights.pb", base_url.trim_end_matches('/'))),
            _ => None,
        }
    }

    /// Get the data filename for models with external data.
    /// Note: Must match the reference in the ONNX file.
    #[must_use]
    pub const fn data_filename(&self) -> Option<&'static str> {
        match self {
            Self::Unet => Some("weights.pb"),
            _ => None,
        }
    }

    /// Get the approximate size of the data file in bytes.
    #[must_use]
    pub const fn data_approx_size(&self) -> u64 {
        match self {
            Self::Unet => 3_440_000_000, // ~3.4 GB
            _ => 0,
        }
    }
}

/// Manages the model cache directory and downloads.
#[derive(Debug, Clone)]
pub struct ModelCache {
    cache_dir: PathBuf,
    base_url: String,
    offline: bool,
}

impl ModelCache {
    /// Create a new model cache in the platform cache directory.
    ///
    /// - Windows: `%LOCALAPPDATA%\zoompaint\models`
    /// - Linux: `~/.cache/zoompaint/models`
    /// - macOS: `~/Library/Caches/zoompaint/models`
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created.
    pub fn new() -> Result<Self> {
        let base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::with_dir(base.join("zoompaint").join("models"))
    }

    /// Create a model cache rooted at an explicit directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn with_dir<P: Into<PathBuf>>(cache_dir: P) -> Result<Self> {
        let cache_dir = cache_dir.into();

        fs::create_dir_all(&cache_dir).map_err(|source| Error::CacheDir {
            path: cache_dir.clone(),
            source,
        })?;

        Ok(Self {
            cache_dir,
            base_url: DEFAULT_MODEL_URL.to_string(),
            offline: false,
        })
    }

    /// Download missing files from `base_url` instead of the default.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Never download; missing files become errors.
    #[must_use]
    pub const fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Directory holding the cached files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get the path to a model file, downloading if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be downloaded or accessed.
    pub fn get_model_path(&self, model_type: ModelType) -> Result<PathBuf> {
        let path = self.cache_dir.join(model_type.filename());

        if !path.exists() {
            self.fetch(&model_type.url(&self.base_url), &path, model_type.approx_size())?;
        }

        // Download external data file if needed
        if let (Some(data_url), Some(data_filename)) =
            (model_type.data_url(&self.base_url), model_type.data_filename())
        {
            let data_path = self.cache_dir.join(data_filename);
            if !data_path.exists() {
                self.fetch(&data_url, &data_path, model_type.data_approx_size())?;
            }
        }

        Ok(path)
    }

    /// Load an ONNX model session.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded.
    pub fn load_session(&self, model_type: ModelType) -> Result<Session> {
        let path = self.get_model_path(model_type)?;

        tracing::debug!("Loading session from {}", path.display());

        Session::builder()
            .map_err(|source| Error::ModelLoad {
                name: model_type.filename().to_string(),
                source,
            })?
            .commit_from_file(&path)
            .map_err(|source| Error::ModelLoad {
                name: model_type.filename().to_string(),
                source,
            })
    }

    /// Load the prompt tokenizer.
    ///
    /// # Errors
    ///
    /// Returns an error if the tokenizer file cannot be fetched or parsed.
    pub fn load_tokenizer(&self) -> Result<Tokenizer> {
        let path = self.get_model_path(ModelType::Tokenizer)?;

        Tokenizer::from_file(&path).map_err(|err| Error::Tokenizer {
            reason: format!("{}: {err}", path.display()),
        })
    }

    fn fetch(&self, url: &str, path: &Path, approx_size: u64) -> Result<()> {
        if self.offline {
            return Err(Error::ModelMissing {
                path: path.to_path_buf(),
            });
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("model");
        download_file(url, path, name, approx_size)
    }
}

/// Download a file from a URL to a path with progress indication.
#[allow(clippy::cast_possible_truncation)]
fn download_file(url: &str, path: &Path, name: &str, approx_size: u64) -> Result<()> {
    tracing::info!("Downloading {name} from {url}");

    let client = reqwest::blocking::Client::new();
    let response = client
        .get(url)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(|source| Error::ModelDownload {
            name: name.to_string(),
            source,
        })?;

    let total_size = response.content_length().unwrap_or(approx_size);

    let pb = ProgressBar::new(total_size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb.set_message(format!("Downloading {name}"));

    // Write to a temporary file first, then rename for atomicity
    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path)?;

    let mut downloaded = 0u64;
    let mut reader = response;

    loop {
        let mut buffer = [0u8; 8192];
        let bytes_read = std::io::Read::read(&mut reader, &mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        file.write_all(&buffer[..bytes_read])?;
        downloaded += bytes_read as u64;
        pb.set_position(downloaded);
    }

    file.flush()?;
    pb.finish_with_message(format!("Downloaded {name}"));

    fs::rename(&temp_path, path)?;

    Ok(())
}
