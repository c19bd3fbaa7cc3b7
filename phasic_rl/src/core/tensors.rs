//! Small tensor conversion helpers shared by the algorithm code.

use burn::tensor::{backend::Backend, Tensor, TensorData};

use crate::error::{PhasicError, Result};

/// Read a float tensor back into a flat `Vec<f32>`.
pub fn to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| PhasicError::Tensor(format!("{:?}", e)))
}

/// Extract a scalar value from a single-element tensor.
pub fn to_scalar<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<f32> {
    to_vec(tensor)?
        .first()
        .copied()
        .ok_or_else(|| PhasicError::Tensor("empty tensor".to_string()))
}

/// Build a `[rows, cols]` float tensor from row-major data.
pub fn tensor_2d<B: Backend>(data: Vec<f32>, rows: usize, cols: usize, device: &B::Device) -> Tensor<B, 2> {
    Tensor::from_data(TensorData::new(data, [rows, cols]), device)
}

/// Build a 1D float tensor.
pub fn tensor_1d<B: Backend>(data: &[f32], device: &B::Device) -> Tensor<B, 1> {
    Tensor::<B, 1>::from_floats(data, device)
}
