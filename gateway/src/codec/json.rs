//! REST/JSON codec.
//!
//! Request bodies carry either `data` (nested arrays, row-major) with
//! optional `shape`/`dtype` hints, or a `names` + `ndarray` pair where
//! entry i of `ndarray` belongs to `names[i]`. Unknown top-level fields
//! are ignored so older gateways keep accepting newer clients.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Map, Number, Value};
use tensorgate_common::{
    CanonicalRequest, CanonicalResponse, DType, NamedTensorSet, Payload, Status, Tensor,
    TensorValues,
};
use uuid::Uuid;

use super::WireCodec;
use crate::error::{error_body, Error, Result};

/// Wire schema of a JSON predict request. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
struct JsonRequest {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    shape: Option<Vec<usize>>,
    #[serde(default)]
    dtype: Option<DType>,
    #[serde(default)]
    names: Option<Vec<String>>,
    #[serde(default)]
    ndarray: Option<Vec<Value>>,
    #[serde(default)]
    metadata: Option<BTreeMap<String, String>>,
    #[serde(default)]
    request_id: Option<String>,
}

pub struct JsonCodec;

impl WireCodec for JsonCodec {
    fn content_type(&self) -> &'static str {
        super::JSON_CONTENT_TYPE
    }

    fn decode(&self, body: &[u8]) -> Result<CanonicalRequest> {
        let request: JsonRequest = serde_json::from_slice(body)
            .map_err(|e| Error::MalformedInput(format!("invalid JSON body: {e}")))?;

        let has_named = request.names.is_some() || request.ndarray.is_some();
        let payload = match (request.data, request.names, request.ndarray) {
            (Some(_), _, _) if has_named => {
                return Err(Error::MalformedInput(
                    "request must carry either data or names/ndarray, not both".to_string(),
                ))
            }
            (Some(data), _, _) => Payload::Tensor(tensor_from_nested(
                &data,
                request.dtype,
                request.shape.as_deref(),
            )?),
            (None, Some(names), Some(ndarray)) => {
                if names.len() != ndarray.len() {
                    return Err(Error::MalformedInput(format!(
                        "names has {} entries but ndarray has {}",
                        names.len(),
                        ndarray.len()
                    )));
                }
                let mut entries = Vec::with_capacity(names.len());
                for (name, value) in names.into_iter().zip(ndarray.iter()) {
                    entries.push((name, tensor_from_nested(value, request.dtype, None)?));
                }
                Payload::Named(NamedTensorSet::new(entries)?)
            }
            _ => {
                return Err(Error::MalformedInput(
                    "request must carry a data field or a names/ndarray pair".to_string(),
                ))
            }
        };

        Ok(CanonicalRequest {
            payload,
            metadata: request.metadata.unwrap_or_default(),
            request_id: request
                .request_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
        })
    }

    fn encode(&self, response: &CanonicalResponse) -> Result<Bytes> {
        let value = match &response.status {
            Status::Failed(failure) => error_body(failure),
            Status::Ok => {
                let payload = response
                    .payload
                    .as_ref()
                    .ok_or_else(|| Error::Encoding("ok response without payload".to_string()))?;
                let mut object = match payload {
                    Payload::Tensor(tensor) => {
                        let mut object = Map::new();
                        object.insert("data".to_string(), nested_from_tensor(tensor)?);
                        object.insert("shape".to_string(), json!(tensor.shape));
                        object.insert("dtype".to_string(), json!(tensor.dtype()));
                        object
                    }
                    Payload::Named(set) => {
                        let mut names = Vec::with_capacity(set.len());
                        let mut ndarray = Vec::with_capacity(set.len());
                        for (name, tensor) in &set.entries {
                            names.push(Value::String(name.clone()));
                            ndarray.push(nested_from_tensor(tensor)?);
                        }
                        let mut object = Map::new();
                        object.insert("names".to_string(), Value::Array(names));
                        object.insert("ndarray".to_string(), Value::Array(ndarray));
                        object
                    }
                };
                if !response.metadata.is_empty() {
                    object.insert("metadata".to_string(), json!(response.metadata));
                }
                Value::Object(object)
            }
        };

        let bytes =
            serde_json::to_vec(&value).map_err(|e| Error::Encoding(e.to_string()))?;
        Ok(Bytes::from(bytes))
    }
}

/// Reconstruct a flat row-major tensor from nested JSON arrays.
///
/// The shape is taken from the nesting itself; a declared `shape` hint
/// must agree with it, there is no implicit reshape.
fn tensor_from_nested(
    value: &Value,
    dtype: Option<DType>,
    declared_shape: Option<&[usize]>,
) -> Result<Tensor> {
    let shape = infer_shape(value)?;
    let mut leaves = Vec::new();
    collect_leaves(value, &shape, &mut leaves)?;

    if let Some(declared) = declared_shape {
        if declared != shape.as_slice() {
            return Err(Error::MalformedInput(format!(
                "declared shape {declared:?} does not match nested data shape {shape:?}"
            )));
        }
    }

    let dtype = match dtype {
        Some(dtype) => dtype,
        None => infer_dtype(&leaves)?,
    };
    let values = convert_leaves(&leaves, dtype)?;
    Ok(Tensor::new(shape, values)?)
}

/// Shape implied by the nesting, read along the first branch. Element
/// counts off that branch are verified by [`collect_leaves`].
fn infer_shape(value: &Value) -> Result<Vec<usize>> {
    let mut shape = Vec::new();
    let mut cursor = value;
    while let Value::Array(items) = cursor {
        if items.is_empty() {
            return Err(Error::MalformedInput(
                "empty arrays carry no elements and no shape".to_string(),
            ));
        }
        shape.push(items.len());
        cursor = &items[0];
    }
    Ok(shape)
}

/// Flatten leaves in row-major order, rejecting ragged nesting.
fn collect_leaves<'a>(value: &'a Value, shape: &[usize], out: &mut Vec<&'a Value>) -> Result<()> {
    match shape.split_first() {
        None => {
            if value.is_array() {
                return Err(Error::MalformedInput(
                    "nested data is deeper than its inferred shape".to_string(),
                ));
            }
            out.push(value);
            Ok(())
        }
        Some((&dim, rest)) => {
            let Value::Array(items) = value else {
                return Err(Error::MalformedInput(
                    "nested data is shallower than its inferred shape".to_string(),
                ));
            };
            if items.len() != dim {
                return Err(Error::MalformedInput(format!(
                    "ragged nested data: expected {dim} entries, found {}",
                    items.len()
                )));
            }
            for item in items {
                collect_leaves(item, rest, out)?;
            }
            Ok(())
        }
    }
}

/// Dtype for an untyped request: integers widen to int64, any float makes
/// the tensor float64, and strings become byte strings.
fn infer_dtype(leaves: &[&Value]) -> Result<DType> {
    if leaves.iter().all(|v| v.is_boolean()) {
        Ok(DType::Bool)
    } else if leaves.iter().all(|v| v.is_string()) {
        Ok(DType::Bytes)
    } else if leaves.iter().all(|v| v.is_number()) {
        if leaves.iter().all(|v| v.is_i64()) {
            Ok(DType::Int64)
        } else {
            Ok(DType::Float64)
        }
    } else {
        Err(Error::MalformedInput(
            "mixed element types in nested data".to_string(),
        ))
    }
}

fn convert_leaves(leaves: &[&Value], dtype: DType) -> Result<TensorValues> {
    fn expect<T>(value: Option<T>, leaf: &Value, dtype: DType) -> Result<T> {
        value.ok_or_else(|| {
            Error::MalformedInput(format!("value {leaf} is not representable as {dtype}"))
        })
    }

    Ok(match dtype {
        DType::Int32 => TensorValues::Int32(
            leaves
                .iter()
                .map(|leaf| {
                    let wide = expect(leaf.as_i64(), leaf, dtype)?;
                    i32::try_from(wide)
                        .map_err(|_| Error::MalformedInput(format!("value {wide} overflows int32")))
                })
                .collect::<Result<_>>()?,
        ),
        DType::Int64 => TensorValues::Int64(
            leaves
                .iter()
                .map(|leaf| expect(leaf.as_i64(), leaf, dtype))
                .collect::<Result<_>>()?,
        ),
        DType::Float32 => TensorValues::Float32(
            leaves
                .iter()
                .map(|leaf| Ok(expect(leaf.as_f64(), leaf, dtype)? as f32))
                .collect::<Result<_>>()?,
        ),
        DType::Float64 => TensorValues::Float64(
            leaves
                .iter()
                .map(|leaf| expect(leaf.as_f64(), leaf, dtype))
                .collect::<Result<_>>()?,
        ),
        DType::Bool => TensorValues::Bool(
            leaves
                .iter()
                .map(|leaf| expect(leaf.as_bool(), leaf, dtype))
                .collect::<Result<_>>()?,
        ),
        DType::Bytes => TensorValues::Bytes(
            leaves
                .iter()
                .map(|leaf| Ok(expect(leaf.as_str(), leaf, dtype)?.as_bytes().to_vec()))
                .collect::<Result<_>>()?,
        ),
    })
}

/// Nest the flat values back per shape. Fails with an encoding error on
/// values JSON cannot carry: non-finite floats and non-UTF-8 byte strings.
fn nested_from_tensor(tensor: &Tensor) -> Result<Value> {
    let leaves: Vec<Value> = match &tensor.values {
        TensorValues::Int32(values) => values.iter().map(|&v| json!(v)).collect(),
        TensorValues::Int64(values) => values.iter().map(|&v| json!(v)).collect(),
        TensorValues::Float32(values) => values
            .iter()
            .map(|&v| float_value(v as f64))
            .collect::<Result<_>>()?,
        TensorValues::Float64(values) => {
            values.iter().map(|&v| float_value(v)).collect::<Result<_>>()?
        }
        TensorValues::Bool(values) => values.iter().map(|&v| json!(v)).collect(),
        TensorValues::Bytes(values) => values
            .iter()
            .map(|bytes| {
                std::str::from_utf8(bytes)
                    .map(|s| Value::String(s.to_string()))
                    .map_err(|_| {
                        Error::Encoding("byte string is not valid UTF-8".to_string())
                    })
            })
            .collect::<Result<_>>()?,
    };
    Ok(nest(&leaves, &tensor.shape))
}

fn float_value(value: f64) -> Result<Value> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| Error::Encoding(format!("non-finite float {value} cannot be carried in JSON")))
}

fn nest(leaves: &[Value], shape: &[usize]) -> Value {
    match shape.split_first() {
        None => leaves[0].clone(),
        Some((_, rest)) => {
            let stride: usize = rest.iter().product::<usize>().max(1);
            Value::Array(leaves.chunks(stride).map(|chunk| nest(chunk, rest)).collect())
        }
    }
}
