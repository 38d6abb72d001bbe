//! Helpers for moving ndarray data in and out of ONNX sessions.

use ndarray::{Array3, Array4};
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::ValueType;

use crate::error::{Error, Result};

/// Element type the session declares for the named input, if it is a tensor.
pub fn input_element_type(session: &Session, name: &str) -> Option<TensorElementType> {
    session
        .inputs
        .iter()
        .find(|input| input.name == name)
        .and_then(|input| match &input.input_type {
            ValueType::Tensor { ty, .. } => Some(*ty),
            _ => None,
        })
}

/// Extract a 4D array from an ONNX value.
pub fn extract_array4(value: &ort::value::ValueRef<'_>) -> Result<Array4<f32>> {
    let dims = extract_dims(value, 4)?;
    let (_, data) = value
        .try_extract_tensor::<f32>()
        .map_err(|source| Error::Inference { source })?;

    Array4::from_shape_vec((dims[0], dims[1], dims[2], dims[3]), data.to_vec()).map_err(|_| {
        Error::ShapeMismatch {
            expected: format!("{dims:?}"),
            actual: "reshape failed".to_string(),
        }
    })
}

/// Extract a 3D array from an ONNX value.
pub fn extract_array3(value: &ort::value::ValueRef<'_>) -> Result<Array3<f32>> {
    let dims = extract_dims(value, 3)?;
    let (_, data) = value
        .try_extract_tensor::<f32>()
        .map_err(|source| Error::Inference { source })?;

    Array3::from_shape_vec((dims[0], dims[1], dims[2]), data.to_vec()).map_err(|_| {
        Error::ShapeMismatch {
            expected: format!("{dims:?}"),
            actual: "reshape failed".to_string(),
        }
    })
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn extract_dims(value: &ort::value::ValueRef<'_>, rank: usize) -> Result<Vec<usize>> {
    let (shape_info, _) = value
        .try_extract_tensor::<f32>()
        .map_err(|source| Error::Inference { source })?;

    // Safe: tensor dimensions are always non-negative and within bounds
    let dims: Vec<usize> = shape_info.iter().map(|&x| x as usize).collect();

    if dims.len() != rank {
        return Err(Error::ShapeMismatch {
            expected: format!("{rank}D tensor"),
            actual: format!("{}D tensor", dims.len()),
        });
    }

    Ok(dims)
}
