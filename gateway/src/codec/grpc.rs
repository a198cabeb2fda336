//! gRPC codec: conversions between the prost-generated messages and the
//! canonical model.
//!
//! The wire layout already matches the canonical one (explicit shape,
//! dtype enum, flat row-major values), so this is near-identity. The
//! invariants are still re-validated: a client can send a message whose
//! value count disagrees with its shape.

use tensorgate_common::{
    CanonicalRequest, CanonicalResponse, DType, NamedTensorSet, Payload, Tensor, TensorValues,
};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::grpc::proto::{DataType, NamedTensor, PredictReply, PredictRequest, TensorProto};

pub fn decode_request(message: PredictRequest) -> Result<CanonicalRequest> {
    let payload = match (message.tensor, message.named_tensors.is_empty()) {
        (Some(_), false) => {
            return Err(Error::MalformedInput(
                "request carries both tensor and named_tensors".to_string(),
            ))
        }
        (Some(tensor), true) => Payload::Tensor(tensor_from_proto(tensor)?),
        (None, false) => {
            let mut entries = Vec::with_capacity(message.named_tensors.len());
            for named in message.named_tensors {
                let tensor = named.tensor.ok_or_else(|| {
                    Error::MalformedInput(format!("named tensor {:?} has no tensor", named.name))
                })?;
                entries.push((named.name, tensor_from_proto(tensor)?));
            }
            Payload::Named(NamedTensorSet::new(entries)?)
        }
        (None, true) => {
            return Err(Error::MalformedInput(
                "request carries neither tensor nor named_tensors".to_string(),
            ))
        }
    };

    Ok(CanonicalRequest {
        payload,
        metadata: message.metadata.into_iter().collect(),
        request_id: if message.request_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            message.request_id
        },
    })
}

/// Build the reply for a successful response. Failures never reach this
/// path; they travel as a `tonic::Status`.
pub fn encode_response(response: &CanonicalResponse) -> Result<PredictReply> {
    let payload = response
        .payload
        .as_ref()
        .ok_or_else(|| Error::Encoding("ok response without payload".to_string()))?;

    let mut reply = PredictReply {
        tensor: None,
        named_tensors: Vec::new(),
        metadata: response
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    };
    match payload {
        Payload::Tensor(tensor) => reply.tensor = Some(tensor_to_proto(tensor)),
        Payload::Named(set) => {
            reply.named_tensors = set
                .entries
                .iter()
                .map(|(name, tensor)| NamedTensor {
                    name: name.clone(),
                    tensor: Some(tensor_to_proto(tensor)),
                })
                .collect();
        }
    }
    Ok(reply)
}

fn tensor_from_proto(proto: TensorProto) -> Result<Tensor> {
    let dtype = match DataType::try_from(proto.dtype) {
        Ok(DataType::Unspecified) | Err(_) => {
            return Err(Error::MalformedInput(format!(
                "unknown or unspecified dtype tag {}",
                proto.dtype
            )))
        }
        Ok(DataType::Int32) => DType::Int32,
        Ok(DataType::Int64) => DType::Int64,
        Ok(DataType::Float32) => DType::Float32,
        Ok(DataType::Float64) => DType::Float64,
        Ok(DataType::Bool) => DType::Bool,
        Ok(DataType::Bytes) => DType::Bytes,
    };

    let shape = proto
        .shape
        .iter()
        .map(|&dim| {
            usize::try_from(dim)
                .map_err(|_| Error::MalformedInput(format!("negative dimension {dim}")))
        })
        .collect::<Result<Vec<_>>>()?;

    // Only the list matching the declared dtype may hold values.
    let lists = [
        (DType::Int32, proto.int32_values.len()),
        (DType::Int64, proto.int64_values.len()),
        (DType::Float32, proto.float32_values.len()),
        (DType::Float64, proto.float64_values.len()),
        (DType::Bool, proto.bool_values.len()),
        (DType::Bytes, proto.bytes_values.len()),
    ];
    if let Some((wrong, _)) = lists
        .iter()
        .find(|(list_dtype, len)| *list_dtype != dtype && *len > 0)
    {
        return Err(Error::MalformedInput(format!(
            "{wrong} values populated on a {dtype} tensor"
        )));
    }

    let values = match dtype {
        DType::Int32 => TensorValues::Int32(proto.int32_values),
        DType::Int64 => TensorValues::Int64(proto.int64_values),
        DType::Float32 => TensorValues::Float32(proto.float32_values),
        DType::Float64 => TensorValues::Float64(proto.float64_values),
        DType::Bool => TensorValues::Bool(proto.bool_values),
        DType::Bytes => TensorValues::Bytes(proto.bytes_values),
    };

    Ok(Tensor::new(shape, values)?)
}

fn tensor_to_proto(tensor: &Tensor) -> TensorProto {
    let mut proto = TensorProto {
        shape: tensor.shape.iter().map(|&dim| dim as i64).collect(),
        dtype: 0,
        int32_values: Vec::new(),
        int64_values: Vec::new(),
        float32_values: Vec::new(),
        float64_values: Vec::new(),
        bool_values: Vec::new(),
        bytes_values: Vec::new(),
    };
    proto.set_dtype(match tensor.dtype() {
        DType::Int32 => DataType::Int32,
        DType::Int64 => DataType::Int64,
        DType::Float32 => DataType::Float32,
        DType::Float64 => DataType::Float64,
        DType::Bool => DataType::Bool,
        DType::Bytes => DataType::Bytes,
    });
    match &tensor.values {
        TensorValues::Int32(values) => proto.int32_values = values.clone(),
        TensorValues::Int64(values) => proto.int64_values = values.clone(),
        TensorValues::Float32(values) => proto.float32_values = values.clone(),
        TensorValues::Float64(values) => proto.float64_values = values.clone(),
        TensorValues::Bool(values) => proto.bool_values = values.clone(),
        TensorValues::Bytes(values) => proto.bytes_values = values.clone(),
    }
    proto
}

/// Build a request message from a canonical one. Client-side helper used
/// by the equivalence tests.
pub fn encode_request(request: &CanonicalRequest) -> PredictRequest {
    let mut message = PredictRequest {
        tensor: None,
        named_tensors: Vec::new(),
        metadata: request
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        request_id: request.request_id.clone(),
    };
    match &request.payload {
        Payload::Tensor(tensor) => message.tensor = Some(tensor_to_proto(tensor)),
        Payload::Named(set) => {
            message.named_tensors = set
                .entries
                .iter()
                .map(|(name, tensor)| NamedTensor {
                    name: name.clone(),
                    tensor: Some(tensor_to_proto(tensor)),
                })
                .collect();
        }
    }
    message
}
