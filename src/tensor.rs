//! Batched f32 arrays
//!
//! Images and latents arrive from the graph as dense arrays whose first
//! axis counts items. `Tensor` keeps the data row-major so an item is a
//! contiguous run of `item_numel()` values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tensor shape/data errors
#[derive(Debug, Error, PartialEq)]
pub enum TensorError {
    #[error("tensor must have at least one axis")]
    NoItemAxis,

    #[error("shape {shape:?} needs {expected} values, got {actual}")]
    DataLength {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("item shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("shape {shape:?} is too large")]
    TooLarge { shape: Vec<usize> },

    #[error("nothing to concatenate")]
    Empty,
}

/// Dense row-major array with a leading item axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTensor")]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

#[derive(Deserialize)]
struct RawTensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl TryFrom<RawTensor> for Tensor {
    type Error = TensorError;

    fn try_from(raw: RawTensor) -> Result<Self, Self::Error> {
        Tensor::new(raw.shape, raw.data)
    }
}

impl Tensor {
    /// Build a tensor, checking that the buffer fills the shape
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, TensorError> {
        if shape.is_empty() {
            return Err(TensorError::NoItemAxis);
        }
        // Item size first, so an empty leading axis can't hide an oversized item
        let Some(expected) = numel(&shape[1..]).and_then(|item| item.checked_mul(shape[0]))
        else {
            return Err(TensorError::TooLarge { shape });
        };
        if expected != data.len() {
            return Err(TensorError::DataLength {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// All-zero tensor of the given shape
    #[cfg(test)]
    pub fn zeros(shape: Vec<usize>) -> Result<Self, TensorError> {
        let len = numel(&shape).ok_or_else(|| TensorError::TooLarge {
            shape: shape.clone(),
        })?;
        Self::new(shape, vec![0.0; len])
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Number of items along the leading axis
    pub fn len(&self) -> usize {
        self.shape[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shape of a single item
    pub fn item_shape(&self) -> &[usize] {
        &self.shape[1..]
    }

    /// Number of values in one item
    pub fn item_numel(&self) -> usize {
        self.item_shape().iter().product()
    }

    /// Items `[start, end)` as a new tensor
    ///
    /// Bounds are clamped to the item count.
    pub fn slice(&self, start: usize, end: usize) -> Tensor {
        let end = end.min(self.len());
        let start = start.min(end);
        let numel = self.item_numel();

        let mut shape = self.shape.clone();
        shape[0] = end - start;

        Tensor {
            shape,
            data: self.data[start * numel..end * numel].to_vec(),
        }
    }

    /// One single-item tensor per item, in order
    pub fn split_items(&self) -> Vec<Tensor> {
        (0..self.len()).map(|i| self.slice(i, i + 1)).collect()
    }

    /// Concatenate along the item axis
    pub fn cat<'a, I>(parts: I) -> Result<Tensor, TensorError>
    where
        I: IntoIterator<Item = &'a Tensor>,
    {
        let mut parts = parts.into_iter();
        let first = parts.next().ok_or(TensorError::Empty)?;

        let mut shape = first.shape.clone();
        let mut data = first.data.clone();

        for part in parts {
            if part.item_shape() != first.item_shape() {
                return Err(TensorError::ShapeMismatch {
                    expected: first.item_shape().to_vec(),
                    actual: part.item_shape().to_vec(),
                });
            }
            shape[0] += part.len();
            data.extend_from_slice(&part.data);
        }

        Ok(Tensor { shape, data })
    }
}

fn numel(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}
