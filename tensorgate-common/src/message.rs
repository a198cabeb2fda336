//! Canonical request/response messages and the failure taxonomy.
//!
//! A codec adapter builds one [`CanonicalRequest`] per inbound call; the
//! invocation layer answers with one [`CanonicalResponse`]. Both are
//! immutable after construction and owned by the call that created them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::tensor::{Tensor, ValidationError};

/// Auxiliary string key/value pairs carried alongside tensors. Order is
/// irrelevant and the gateway never interprets the contents.
pub type Metadata = BTreeMap<String, String>;

/// Ordered collection of uniquely named tensors.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedTensorSet {
    pub entries: Vec<(String, Tensor)>,
}

impl NamedTensorSet {
    /// Build a set, rejecting duplicate names.
    pub fn new(entries: Vec<(String, Tensor)>) -> Result<Self, ValidationError> {
        let set = Self { entries };
        set.validate()?;
        Ok(set)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen = BTreeSet::new();
        for (name, tensor) in &self.entries {
            if !seen.insert(name.as_str()) {
                return Err(ValidationError::DuplicateName(name.clone()));
            }
            tensor.validate()?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Either a single unnamed tensor or a set of named tensors, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Tensor(Tensor),
    Named(NamedTensorSet),
}

impl Payload {
    /// Re-check every invariant of the carried tensors. Used on payloads
    /// assembled outside the validating constructors, e.g. component
    /// output.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Payload::Tensor(tensor) => tensor.validate(),
            Payload::Named(set) => set.validate(),
        }
    }
}

/// Machine-readable failure classification, stable across transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MalformedInput,
    ShapeMismatch,
    DuplicateName,
    EncodingError,
    Timeout,
    ComponentError,
    InvalidComponentOutput,
    ServiceOverloaded,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::MalformedInput => "malformed_input",
            FailureKind::ShapeMismatch => "shape_mismatch",
            FailureKind::DuplicateName => "duplicate_name",
            FailureKind::EncodingError => "encoding_error",
            FailureKind::Timeout => "timeout",
            FailureKind::ComponentError => "component_error",
            FailureKind::InvalidComponentOutput => "invalid_component_output",
            FailureKind::ServiceOverloaded => "service_overloaded",
        }
    }
}

/// A classified failure with a human-readable message.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

/// Outcome of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Ok,
    Failed(Failure),
}

/// Protocol-agnostic request produced by a codec adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRequest {
    pub payload: Payload,
    pub metadata: Metadata,
    /// Supplied by the transport, or generated once at decode time.
    pub request_id: String,
}

/// Protocol-agnostic response handed back to the codec adapter. A failed
/// response never carries a payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalResponse {
    pub payload: Option<Payload>,
    pub metadata: Metadata,
    pub status: Status,
}

impl CanonicalResponse {
    pub fn ok(payload: Payload, metadata: Metadata) -> Self {
        Self {
            payload: Some(payload),
            metadata,
            status: Status::Ok,
        }
    }

    pub fn failed(failure: Failure) -> Self {
        Self {
            payload: None,
            metadata: Metadata::new(),
            status: Status::Failed(failure),
        }
    }
}
