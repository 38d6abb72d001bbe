//! Prompt tokenization and CLIP text encoding.

use ndarray::{Array2, Array3};
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use crate::error::{Error, Result};

use super::tensor::{extract_array3, input_element_type};

/// Context length of the CLIP text encoder.
pub const MAX_TOKENS: usize = 77;

/// CLIP end-of-text token, also used for padding.
const END_OF_TEXT: &str = "<|endoftext|>";

/// Turns prompts into encoder hidden states of shape (1, 77, hidden).
pub struct PromptEncoder {
    tokenizer: Tokenizer,
    session: Session,
    pad_id: u32,
}

impl PromptEncoder {
    /// Wrap a tokenizer and a text encoder session.
    ///
    /// # Errors
    ///
    /// Returns an error if the tokenizer has no end-of-text token.
    pub fn new(tokenizer: Tokenizer, session: Session) -> Result<Self> {
        let pad_id = tokenizer
            .token_to_id(END_OF_TEXT)
            .ok_or_else(|| Error::Tokenizer {
                reason: format!("vocabulary has no {END_OF_TEXT} token"),
            })?;

        Ok(Self {
            tokenizer,
            session,
            pad_id,
        })
    }

    /// Encode `prompt` into hidden states.
    ///
    /// # Errors
    ///
    /// Returns an error if tokenization or inference fails.
    #[allow(clippy::cast_possible_wrap)]
    pub fn encode(&mut self, prompt: &str) -> Result<Array3<f32>> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|err| Error::Tokenizer {
                reason: err.to_string(),
            })?;
        let ids = fit_to_context(encoding.get_ids(), self.pad_id);

        tracing::debug!("Prompt {prompt:?} -> {} tokens", encoding.get_ids().len());

        let input = match input_element_type(&self.session, "input_ids") {
            Some(TensorElementType::Int64) => {
                let arr = Array2::from_shape_fn((1, MAX_TOKENS), |(_, i)| i64::from(ids[i]));
                Tensor::from_array(arr)
                    .map_err(|source| Error::Inference { source })?
                    .into_dyn()
            }
            _ => {
                // Token ids are below 50k so they fit in i32
                let arr = Array2::from_shape_fn((1, MAX_TOKENS), |(_, i)| ids[i] as i32);
                Tensor::from_array(arr)
                    .map_err(|source| Error::Inference { source })?
                    .into_dyn()
            }
        };

        let outputs = self
            .session
            .run(ort::inputs!["input_ids" => input])
            .map_err(|source| Error::Inference { source })?;

        let output = outputs
            .values()
            .next()
            .ok_or_else(|| Error::ShapeMismatch {
                expected: "last_hidden_state output".to_string(),
                actual: "no output".to_string(),
            })?;

        extract_array3(&output)
    }
}

/// Pad with end-of-text to the context length, or truncate so the sequence
/// still ends with end-of-text.
fn fit_to_context(ids: &[u32], pad_id: u32) -> Vec<u32> {
    let mut fitted: Vec<u32> = ids.iter().copied().take(MAX_TOKENS).collect();
    if ids.len() > MAX_TOKENS {
        fitted[MAX_TOKENS - 1] = pad_id;
    }
    fitted.resize(MAX_TOKENS, pad_id);
    fitted
}
