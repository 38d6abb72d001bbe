//! Stable Diffusion inpainting on ONNX Runtime.

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{concatenate, Array1, Array3, Array4, Axis};
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::error::{Error, Result};
use crate::image::{self as img, ImageTensor, MaskTensor};
use crate::model::{ModelCache, ModelType};

use super::inpaint::{check_mask, Inpaint};
use super::scheduler::{DdimScheduler, TRAIN_TIMESTEPS};
use super::tensor::{extract_array4, input_element_type};
use super::text::PromptEncoder;
use super::vae::{self, LatentTensor};

/// Configuration for the diffusion inpainter.
#[derive(Debug, Clone)]
pub struct InpaintConfig {
    /// Number of denoising steps.
    pub num_steps: u32,

    /// Classifier-free guidance scale. Higher values follow the prompt more
    /// closely.
    pub guidance_scale: f32,

    /// Random seed for reproducibility. None for random.
    pub seed: Option<u64>,
}

impl Default for InpaintConfig {
    fn default() -> Self {
        Self {
            num_steps: 50,
            guidance_scale: 7.5,
            seed: None,
        }
    }
}

impl InpaintConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.num_steps == 0 || self.num_steps as usize > TRAIN_TIMESTEPS {
            return Err(Error::invalid(
                "num_steps",
                format!("must be between 1 and {TRAIN_TIMESTEPS}"),
            ));
        }

        if !self.guidance_scale.is_finite() || self.guidance_scale < 1.0 {
            return Err(Error::invalid(
                "guidance_scale",
                "must be a finite number of at least 1.0",
            ));
        }

        Ok(())
    }
}

/// Text-conditioned inpainting with the 9-channel Stable Diffusion `UNet`.
///
/// The models are loaded once in [`StableDiffusionInpainter::new`] and reused
/// for every call to [`Inpaint::inpaint`].
pub struct StableDiffusionInpainter {
    config: InpaintConfig,
    prompt_encoder: PromptEncoder,
    vae_encoder: Session,
    vae_decoder: Session,
    unet: Session,
    rng: StdRng,
}

impl StableDiffusionInpainter {
    /// Load the tokenizer and all model sessions from `cache`.
    ///
    /// This will download models if they are not already cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or models cannot be
    /// loaded.
    pub fn new(config: InpaintConfig, cache: &ModelCache) -> Result<Self> {
        config.validate()?;

        tracing::info!("Initializing inpainter with config: {config:?}");

        tracing::info!("Loading tokenizer...");
        let tokenizer = cache.load_tokenizer()?;

        tracing::info!("Loading text encoder...");
        let text_encoder = cache.load_session(ModelType::TextEncoder)?;

        tracing::info!("Loading VAE encoder...");
        let vae_encoder = cache.load_session(ModelType::VaeEncoder)?;

        tracing::info!("Loading VAE decoder...");
        let vae_decoder = cache.load_session(ModelType::VaeDecoder)?;

        tracing::info!("Loading `UNet`...");
        let unet = cache.load_session(ModelType::Unet)?;

        let rng = config
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

        tracing::info!("Inpainter initialized successfully");

        Ok(Self {
            prompt_encoder: PromptEncoder::new(tokenizer, text_encoder)?,
            config,
            vae_encoder,
            vae_decoder,
            unet,
            rng,
        })
    }

    /// Run the denoising loop starting from pure noise.
    fn diffusion_loop(
        &mut self,
        mask: &MaskTensor,
        masked_latents: &LatentTensor,
        hidden_states: &Array3<f32>,
    ) -> Result<LatentTensor> {
        let scheduler = DdimScheduler::new(self.config.num_steps as usize)?;

        let (_, channels, height, width) = masked_latents.dim();
        let rng = &mut self.rng;
        let mut latents: LatentTensor =
            Array4::from_shape_fn((1, channels, height, width), |_| rng.sample(StandardNormal));

        let pb = ProgressBar::new(scheduler.timesteps().len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} Denoising [{bar:40.cyan/blue}] {pos}/{len}")
                .expect("valid template")
                .progress_chars("#>-"),
        );

        for &t in scheduler.timesteps() {
            let noise_pred = self.predict_noise(&latents, mask, masked_latents, hidden_states, t)?;
            latents = scheduler.step(&noise_pred, t, &latents);
            pb.inc(1);
        }

        pb.finish_with_message("Denoising complete");
        Ok(latents)
    }

    /// Predict guided noise for one timestep.
    ///
    /// The `UNet` sees a batch of two (unconditional, conditional) with the
    /// latents, mask and masked-image latents stacked along channels.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    fn predict_noise(
        &mut self,
        latents: &LatentTensor,
        mask: &MaskTensor,
        masked_latents: &LatentTensor,
        hidden_states: &Array3<f32>,
        timestep: usize,
    ) -> Result<LatentTensor> {
        let single = concatenate(
            Axis(1),
            &[latents.view(), mask.view(), masked_latents.view()],
        )
        .map_err(|err| shape_error("unet sample", &err))?;
        let sample = concatenate(Axis(0), &[single.view(), single.view()])
            .map_err(|err| shape_error("unet sample batch", &err))?;

        let sample_value =
            Tensor::from_array(sample).map_err(|source| Error::Inference { source })?;

        let timestep_value = match input_element_type(&self.unet, "timestep") {
            Some(TensorElementType::Int64) => Tensor::from_array(Array1::from_vec(vec![
                timestep as i64,
            ]))
            .map_err(|source| Error::Inference { source })?
            .into_dyn(),
            _ => Tensor::from_array(Array1::from_vec(vec![timestep as f32]))
                .map_err(|source| Error::Inference { source })?
                .into_dyn(),
        };

        let hidden_value = Tensor::from_array(hidden_states.clone())
            .map_err(|source| Error::Inference { source })?;

        let outputs = self
            .unet
            .run(ort::inputs![
                "sample" => sample_value,
                "timestep" => timestep_value,
                "encoder_hidden_states" => hidden_value,
            ])
            .map_err(|source| Error::Inference { source })?;

        let output = outputs
            .values()
            .next()
            .ok_or_else(|| Error::ShapeMismatch {
                expected: "noise prediction output".to_string(),
                actual: "no output".to_string(),
            })?;

        let noise = extract_array4(&output)?;
        if noise.dim().0 != 2 {
            return Err(Error::ShapeMismatch {
                expected: "batch of 2".to_string(),
                actual: format!("batch of {}", noise.dim().0),
            });
        }

        Ok(guide(&noise, self.config.guidance_scale))
    }
}

impl Inpaint for StableDiffusionInpainter {
    fn inpaint(&mut self, image: &RgbImage, mask: &GrayImage, prompt: &str) -> Result<RgbImage> {
        check_mask(image, mask)?;

        let (masked_image, repaint) = model_inputs(image, mask);

        tracing::info!("Encoding prompt...");
        let cond = self.prompt_encoder.encode(prompt)?;
        let uncond = self.prompt_encoder.encode("")?;
        let hidden_states = concatenate(Axis(0), &[uncond.view(), cond.view()])
            .map_err(|err| shape_error("encoder hidden states", &err))?;

        tracing::info!("Encoding masked image to latent space...");
        let masked_latents = vae::encode(&mut self.vae_encoder, &masked_image)?;
        let (_, _, latent_height, latent_width) = masked_latents.dim();
        let latent_mask = vae::downsample_mask(&repaint, latent_height, latent_width);

        tracing::info!("Running diffusion...");
        let latents = self.diffusion_loop(&latent_mask, &masked_latents, &hidden_states)?;

        tracing::info!("Decoding from latent space...");
        let decoded = vae::decode(&mut self.vae_decoder, &latents)?;
        let output = img::tensor_to_image(&decoded);

        if output.dimensions() == image.dimensions() {
            Ok(output)
        } else {
            let (width, height) = image.dimensions();
            Ok(imageops::resize(&output, width, height, FilterType::Lanczos3))
        }
    }
}

/// Turn an image and its contour mask into the model's masked image and
/// repaint mask.
///
/// The contour mask is 255 on the subject, but the model regenerates wherever
/// its own mask is 1. The repaint mask is therefore the inverse: 1 on the
/// background and 0 on the subject. The masked image keeps the subject and
/// blanks the background to 0.
fn model_inputs(image: &RgbImage, mask: &GrayImage) -> (ImageTensor, MaskTensor) {
    let image_tensor = img::image_to_tensor(image);
    let subject = img::mask_to_tensor(mask);

    let masked_image = &image_tensor * &subject;
    let repaint = subject.mapv(|m| 1.0 - m);

    (masked_image, repaint)
}

/// Combine a (unconditional, conditional) noise batch with classifier-free
/// guidance.
fn guide(noise: &Array4<f32>, scale: f32) -> LatentTensor {
    let uncond = noise.index_axis(Axis(0), 0);
    let cond = noise.index_axis(Axis(0), 1);
    let guided = &uncond + &((&cond - &uncond) * scale);
    guided.insert_axis(Axis(0))
}

fn shape_error(what: &str, err: &ndarray::ShapeError) -> Error {
    Error::ShapeMismatch {
        expected: format!("compatible {what}"),
        actual: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(InpaintConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let zero_steps = InpaintConfig {
            num_steps: 0,
            ..InpaintConfig::default()
        };
        assert!(zero_steps.validate().is_err());

        let weak_guidance = InpaintConfig {
            guidance_scale: 0.5,
            ..InpaintConfig::default()
        };
        assert!(weak_guidance.validate().is_err());

        let nan_guidance = InpaintConfig {
            guidance_scale: f32::NAN,
            ..InpaintConfig::default()
        };
        assert!(nan_guidance.validate().is_err());
    }

    #[test]
    fn test_model_inputs_repaint_background_and_keep_subject() {
        let subject_colour = image::Rgb([200, 40, 0]);
        let mut scene = RgbImage::from_pixel(512, 512, image::Rgb([255, 255, 255]));
        let mut mask = GrayImage::new(512, 512);
        for y in 200..300 {
            for x in 200..300 {
                scene.put_pixel(x, y, subject_colour);
                mask.put_pixel(x, y, image::Luma([255]));
            }
        }

        let expected = img::image_to_tensor(&scene);
        let (masked_image, repaint) = model_inputs(&scene, &mask);

        assert_eq!(masked_image.shape(), &[1, 3, 512, 512]);
        assert_eq!(repaint.shape(), &[1, 1, 512, 512]);

        // Subject pixels survive and are not repainted.
        for c in 0..3 {
            let kept = masked_image[[0, c, 250, 250]];
            assert!((kept - expected[[0, c, 250, 250]]).abs() < 1e-6);
        }
        assert!(masked_image[[0, 0, 250, 250]] > 0.5);
        assert!(repaint[[0, 0, 250, 250]].abs() < f32::EPSILON);

        // The white background is blanked and handed to the model.
        for c in 0..3 {
            assert!(masked_image[[0, c, 0, 0]].abs() < f32::EPSILON);
        }
        assert!((repaint[[0, 0, 0, 0]] - 1.0).abs() < f32::EPSILON);
        assert!((repaint[[0, 0, 511, 100]] - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_guidance_combines_batch() {
        let mut noise = Array4::<f32>::zeros((2, 4, 2, 2));
        noise.index_axis_mut(Axis(0), 0).fill(1.0);
        noise.index_axis_mut(Axis(0), 1).fill(3.0);

        let guided = guide(&noise, 7.5);

        assert_eq!(guided.shape(), &[1, 4, 2, 2]);
        // 1 + 7.5 * (3 - 1)
        assert!(guided.iter().all(|&v| (v - 16.0).abs() < 1e-5));
    }

    #[test]
    fn test_unit_guidance_is_conditional() {
        let noise = Array4::from_shape_fn((2, 1, 1, 3), |(b, _, _, x)| (b * 10 + x) as f32);
        let guided = guide(&noise, 1.0);

        assert_eq!(guided.iter().copied().collect::<Vec<_>>(), vec![10.0, 11.0, 12.0]);
    }
}
