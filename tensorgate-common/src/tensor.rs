//! Canonical tensor representation.
//!
//! Every wire protocol converges on this form: a flat, row-major value
//! buffer plus an explicit shape and element type. Constructors enforce the
//! element-count/shape invariant so downstream code never has to re-derive
//! it from wire data.

use serde::{Deserialize, Serialize};

/// Element type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
    /// Variable-length byte strings.
    Bytes,
}

impl DType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Bool => "bool",
            DType::Bytes => "bytes",
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failures raised by the canonical model constructors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("duplicate tensor name: {0}")]
    DuplicateName(String),
}

/// Number of elements a shape implies, rejecting zero and overflowing
/// dimensions. An empty shape denotes a scalar holding one value.
pub fn element_count_for(shape: &[usize]) -> Result<usize, ValidationError> {
    let mut count: usize = 1;
    for &dim in shape {
        if dim == 0 {
            return Err(ValidationError::ShapeMismatch(format!(
                "shape {shape:?} contains a zero dimension"
            )));
        }
        count = count.checked_mul(dim).ok_or_else(|| {
            ValidationError::ShapeMismatch(format!("shape {shape:?} element count overflows"))
        })?;
    }
    Ok(count)
}

/// Flat, row-major storage for each element type.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorValues {
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Bool(Vec<bool>),
    Bytes(Vec<Vec<u8>>),
}

impl TensorValues {
    pub fn dtype(&self) -> DType {
        match self {
            TensorValues::Int32(_) => DType::Int32,
            TensorValues::Int64(_) => DType::Int64,
            TensorValues::Float32(_) => DType::Float32,
            TensorValues::Float64(_) => DType::Float64,
            TensorValues::Bool(_) => DType::Bool,
            TensorValues::Bytes(_) => DType::Bytes,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorValues::Int32(v) => v.len(),
            TensorValues::Int64(v) => v.len(),
            TensorValues::Float32(v) => v.len(),
            TensorValues::Float64(v) => v.len(),
            TensorValues::Bool(v) => v.len(),
            TensorValues::Bytes(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shaped, typed, flat array. Storage is always row-major so every codec
/// agrees on element ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub values: TensorValues,
}

impl Tensor {
    /// Build a tensor, rejecting a value buffer whose length disagrees
    /// with the declared shape.
    pub fn new(shape: Vec<usize>, values: TensorValues) -> Result<Self, ValidationError> {
        let tensor = Self { shape, values };
        tensor.validate()?;
        Ok(tensor)
    }

    pub fn dtype(&self) -> DType {
        self.values.dtype()
    }

    /// Re-check the element-count/shape invariant. Useful for tensors
    /// assembled field-by-field, e.g. by a prediction component.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let expected = element_count_for(&self.shape)?;
        let actual = self.values.len();
        if expected != actual {
            return Err(ValidationError::ShapeMismatch(format!(
                "shape {:?} implies {expected} elements, value buffer holds {actual}",
                self.shape
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_tensor() {
        let t = Tensor::new(vec![2, 3], TensorValues::Int32(vec![1, 2, 3, 4, 5, 6])).unwrap();
        assert_eq!(t.dtype(), DType::Int32);
        assert_eq!(t.values.len(), 6);
    }

    #[test]
    fn test_scalar_tensor() {
        let t = Tensor::new(vec![], TensorValues::Float64(vec![1.5])).unwrap();
        assert_eq!(t.shape, Vec::<usize>::new());
        assert_eq!(t.values.len(), 1);
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let err = Tensor::new(vec![3], TensorValues::Int32(vec![1, 2])).unwrap_err();
        assert!(matches!(err, ValidationError::ShapeMismatch(_)));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let err = Tensor::new(vec![2, 0], TensorValues::Int32(vec![])).unwrap_err();
        assert!(matches!(err, ValidationError::ShapeMismatch(_)));
    }

    #[test]
    fn test_hand_built_tensor_fails_validate() {
        let t = Tensor {
            shape: vec![3],
            values: TensorValues::Int64(vec![1, 2]),
        };
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_bytes_tensor() {
        let t = Tensor::new(
            vec![2],
            TensorValues::Bytes(vec![b"abc".to_vec(), b"de".to_vec()]),
        )
        .unwrap();
        assert_eq!(t.dtype(), DType::Bytes);
    }

    #[test]
    fn test_dtype_names() {
        assert_eq!(DType::Int32.as_str(), "int32");
        assert_eq!(DType::Float64.to_string(), "float64");
        assert_eq!(DType::Bytes.as_str(), "bytes");
    }
}
