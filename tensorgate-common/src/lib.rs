//! Tensorgate Common Types
//!
//! Shared vocabulary used by every codec adapter and the component
//! invocation layer: the canonical tensor model, the request/response
//! messages and the failure taxonomy.

pub mod message;
pub mod tensor;

pub use message::{
    CanonicalRequest, CanonicalResponse, Failure, FailureKind, Metadata, NamedTensorSet, Payload,
    Status,
};
pub use tensor::{DType, Tensor, TensorValues, ValidationError};
