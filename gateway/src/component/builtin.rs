//! Built-in predictors.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tensorgate_common::{Metadata, NamedTensorSet, Payload, Tensor, TensorValues};

use super::{Prediction, Predictor, PredictorError};

/// Echoes the request payload back unchanged. The default component, so
/// the binary runs end-to-end without user code; real deployments embed
/// the gateway as a library and install their own [`Predictor`].
pub struct IdentityPredictor;

#[async_trait]
impl Predictor for IdentityPredictor {
    fn name(&self) -> &'static str {
        "identity"
    }

    async fn predict(
        &self,
        payload: &Payload,
        metadata: &Metadata,
    ) -> Result<Prediction, PredictorError> {
        Ok(Prediction {
            payload: payload.clone(),
            metadata: metadata.clone(),
        })
    }
}

/// Multiplies every numeric element by a configured factor; bool and
/// bytes tensors pass through unchanged. Integer tensors round to the
/// nearest value.
pub struct ScalingPredictor {
    factor: f64,
}

impl ScalingPredictor {
    pub fn new(factor: f64) -> Self {
        Self { factor }
    }

    /// Build from the component parameter map. Reads `factor`, defaulting
    /// to 1.0 when absent.
    pub fn from_parameters(parameters: &BTreeMap<String, String>) -> Result<Self, PredictorError> {
        let factor = match parameters.get("factor") {
            Some(raw) => raw.parse::<f64>().map_err(|_| {
                PredictorError(format!("component parameter factor {raw:?} is not a number"))
            })?,
            None => 1.0,
        };
        Ok(Self::new(factor))
    }

    fn scale(&self, tensor: &Tensor) -> Result<Tensor, PredictorError> {
        let values = match &tensor.values {
            TensorValues::Int32(v) => TensorValues::Int32(
                v.iter()
                    .map(|&x| (x as f64 * self.factor).round() as i32)
                    .collect(),
            ),
            TensorValues::Int64(v) => TensorValues::Int64(
                v.iter()
                    .map(|&x| (x as f64 * self.factor).round() as i64)
                    .collect(),
            ),
            TensorValues::Float32(v) => TensorValues::Float32(
                v.iter().map(|&x| (x as f64 * self.factor) as f32).collect(),
            ),
            TensorValues::Float64(v) => {
                TensorValues::Float64(v.iter().map(|&x| x * self.factor).collect())
            }
            other => other.clone(),
        };
        Tensor::new(tensor.shape.clone(), values).map_err(|e| PredictorError(e.to_string()))
    }
}

#[async_trait]
impl Predictor for ScalingPredictor {
    fn name(&self) -> &'static str {
        "scale"
    }

    async fn predict(
        &self,
        payload: &Payload,
        metadata: &Metadata,
    ) -> Result<Prediction, PredictorError> {
        let payload = match payload {
            Payload::Tensor(tensor) => Payload::Tensor(self.scale(tensor)?),
            Payload::Named(set) => {
                let mut entries = Vec::with_capacity(set.len());
                for (name, tensor) in &set.entries {
                    entries.push((name.clone(), self.scale(tensor)?));
                }
                Payload::Named(
                    NamedTensorSet::new(entries).map_err(|e| PredictorError(e.to_string()))?,
                )
            }
        };
        Ok(Prediction {
            payload,
            metadata: metadata.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_identity_echoes_payload() {
        let payload = Payload::Tensor(
            Tensor::new(vec![2], TensorValues::Int64(vec![1, 2])).unwrap(),
        );
        let prediction = IdentityPredictor
            .predict(&payload, &Metadata::new())
            .await
            .unwrap();
        assert_eq!(prediction.payload, payload);
    }

    fn parameters(factor: &str) -> BTreeMap<String, String> {
        let mut parameters = BTreeMap::new();
        parameters.insert("factor".to_string(), factor.to_string());
        parameters
    }

    #[test]
    fn test_scale_factor_defaults_to_one() {
        let predictor = ScalingPredictor::from_parameters(&BTreeMap::new()).unwrap();
        assert_eq!(predictor.factor, 1.0);
    }

    #[test]
    fn test_scale_rejects_bad_factor() {
        let err = ScalingPredictor::from_parameters(&parameters("fast")).unwrap_err();
        assert!(err.to_string().contains("factor"));
    }

    #[tokio::test]
    async fn test_scale_multiplies_numeric_tensors() {
        let predictor = ScalingPredictor::from_parameters(&parameters("2.5")).unwrap();
        let payload = Payload::Tensor(
            Tensor::new(vec![2], TensorValues::Float64(vec![2.0, -4.0])).unwrap(),
        );
        let prediction = predictor.predict(&payload, &Metadata::new()).await.unwrap();
        assert_eq!(
            prediction.payload,
            Payload::Tensor(
                Tensor::new(vec![2], TensorValues::Float64(vec![5.0, -10.0])).unwrap()
            )
        );
    }

    #[tokio::test]
    async fn test_scale_rounds_integer_tensors() {
        let predictor = ScalingPredictor::new(0.5);
        let payload = Payload::Tensor(
            Tensor::new(vec![3], TensorValues::Int32(vec![2, 3, 5])).unwrap(),
        );
        let prediction = predictor.predict(&payload, &Metadata::new()).await.unwrap();
        assert_eq!(
            prediction.payload,
            Payload::Tensor(Tensor::new(vec![3], TensorValues::Int32(vec![1, 2, 3])).unwrap())
        );
    }

    #[tokio::test]
    async fn test_scale_passes_bytes_through() {
        let predictor = ScalingPredictor::new(3.0);
        let payload = Payload::Tensor(
            Tensor::new(vec![1], TensorValues::Bytes(vec![b"raw".to_vec()])).unwrap(),
        );
        let prediction = predictor.predict(&payload, &Metadata::new()).await.unwrap();
        assert_eq!(prediction.payload, payload);
    }
}
