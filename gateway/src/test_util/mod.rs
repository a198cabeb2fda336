//! Mock predictors shared by unit and integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tensorgate_common::{Metadata, Payload, Tensor, TensorValues};
use tokio::sync::Semaphore;

use crate::component::{Prediction, Predictor, PredictorError};

fn echo(payload: &Payload, metadata: &Metadata) -> Prediction {
    Prediction {
        payload: payload.clone(),
        metadata: metadata.clone(),
    }
}

/// Doubles every numeric element; bool and bytes tensors pass through.
pub struct DoublingPredictor;

fn double(tensor: &Tensor) -> Tensor {
    let values = match &tensor.values {
        TensorValues::Int32(v) => TensorValues::Int32(v.iter().map(|x| x * 2).collect()),
        TensorValues::Int64(v) => TensorValues::Int64(v.iter().map(|x| x * 2).collect()),
        TensorValues::Float32(v) => TensorValues::Float32(v.iter().map(|x| x * 2.0).collect()),
        TensorValues::Float64(v) => TensorValues::Float64(v.iter().map(|x| x * 2.0).collect()),
        other => other.clone(),
    };
    Tensor::new(tensor.shape.clone(), values).expect("doubling preserves element count")
}

#[async_trait]
impl Predictor for DoublingPredictor {
    fn name(&self) -> &'static str {
        "doubling"
    }

    async fn predict(
        &self,
        payload: &Payload,
        metadata: &Metadata,
    ) -> Result<Prediction, PredictorError> {
        let payload = match payload {
            Payload::Tensor(tensor) => Payload::Tensor(double(tensor)),
            Payload::Named(set) => {
                let entries = set
                    .entries
                    .iter()
                    .map(|(name, tensor)| (name.clone(), double(tensor)))
                    .collect();
                Payload::Named(
                    tensorgate_common::NamedTensorSet::new(entries)
                        .expect("names are unchanged"),
                )
            }
        };
        Ok(Prediction {
            payload,
            metadata: metadata.clone(),
        })
    }
}

/// Sleeps before echoing, for timeout tests.
pub struct SleepyPredictor {
    pub delay: Duration,
}

#[async_trait]
impl Predictor for SleepyPredictor {
    fn name(&self) -> &'static str {
        "sleepy"
    }

    async fn predict(
        &self,
        payload: &Payload,
        metadata: &Metadata,
    ) -> Result<Prediction, PredictorError> {
        tokio::time::sleep(self.delay).await;
        Ok(echo(payload, metadata))
    }
}

/// Blocks every call until [`BlockingPredictor::release_all`], for
/// backpressure tests.
pub struct BlockingPredictor {
    gate: Semaphore,
}

impl BlockingPredictor {
    pub fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
        }
    }

    pub fn release_all(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }
}

impl Default for BlockingPredictor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Predictor for BlockingPredictor {
    fn name(&self) -> &'static str {
        "blocking"
    }

    async fn predict(
        &self,
        payload: &Payload,
        metadata: &Metadata,
    ) -> Result<Prediction, PredictorError> {
        let _permit = self.gate.acquire().await.expect("gate never closes");
        Ok(echo(payload, metadata))
    }
}

/// Fails every call with the given message.
pub struct FailingPredictor {
    pub message: &'static str,
}

#[async_trait]
impl Predictor for FailingPredictor {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn predict(
        &self,
        _payload: &Payload,
        _metadata: &Metadata,
    ) -> Result<Prediction, PredictorError> {
        Err(PredictorError(self.message.to_string()))
    }
}

/// Returns a tensor whose declared shape disagrees with its value count,
/// bypassing the validating constructors.
pub struct BadOutputPredictor;

#[async_trait]
impl Predictor for BadOutputPredictor {
    fn name(&self) -> &'static str {
        "bad-output"
    }

    async fn predict(
        &self,
        _payload: &Payload,
        metadata: &Metadata,
    ) -> Result<Prediction, PredictorError> {
        Ok(Prediction {
            payload: Payload::Tensor(Tensor {
                shape: vec![3],
                values: TensorValues::Int32(vec![1, 2]),
            }),
            metadata: metadata.clone(),
        })
    }
}

/// Counts calls before delegating, to assert the component was (not)
/// reached.
pub struct CountingPredictor<P> {
    inner: P,
    calls: AtomicUsize,
}

impl<P> CountingPredictor<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<P: Predictor> Predictor for CountingPredictor<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn predict(
        &self,
        payload: &Payload,
        metadata: &Metadata,
    ) -> Result<Prediction, PredictorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.predict(payload, metadata).await
    }
}
