//! Binary frame codec.
//!
//! Fixed, size-explicit layout, big-endian throughout:
//!
//! ```text
//! request  := magic:u32 version:u8 kind:u8 request_id:str16 metadata payload
//! response := magic:u32 version:u8 status:u8
//!             status != 0 -> message:str16
//!             status == 0 -> kind:u8 metadata payload
//! metadata := count:u16 (key:str16 value:str16)*
//! payload  := kind == 0 -> tensor
//!             kind == 1 -> count:u16 (name:str16 tensor)*
//! tensor   := dtype:u8 rank:u8 (dim:u32)* count:u32 values
//! str16    := len:u16 utf8-bytes
//! ```
//!
//! Values are packed contiguously in row-major order; `bytes` elements
//! carry an individual u32 length prefix. The nonzero response status
//! byte is the failure kind code.
//!
//! [`encode_request`] and [`decode_response`] are the client half of the
//! protocol, used by tests and by callers embedding the gateway.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tensorgate_common::{
    tensor::element_count_for, CanonicalRequest, CanonicalResponse, DType, Failure, FailureKind,
    Metadata, NamedTensorSet, Payload, Status, Tensor, TensorValues,
};
use uuid::Uuid;

use super::WireCodec;
use crate::error::{Error, Result};

const MAGIC: u32 = 0x5447_4231; // "TGB1"
const VERSION: u8 = 1;

const KIND_TENSOR: u8 = 0;
const KIND_NAMED: u8 = 1;

const STATUS_OK: u8 = 0;

pub struct FrameCodec;

impl WireCodec for FrameCodec {
    fn content_type(&self) -> &'static str {
        super::FRAME_CONTENT_TYPE
    }

    fn decode(&self, body: &[u8]) -> Result<CanonicalRequest> {
        let mut reader = Reader::new(body);
        reader.header()?;
        let kind = reader.u8()?;
        let request_id = reader.str16()?;
        let metadata = reader.metadata()?;
        let payload = reader.payload(kind)?;
        reader.finish()?;

        Ok(CanonicalRequest {
            payload,
            metadata,
            request_id: if request_id.is_empty() {
                Uuid::new_v4().to_string()
            } else {
                request_id
            },
        })
    }

    fn encode(&self, response: &CanonicalResponse) -> Result<Bytes> {
        let mut writer = Writer::new();
        writer.header();
        match &response.status {
            Status::Failed(failure) => {
                writer.u8(failure_code(failure.kind));
                writer.str16(&failure.message)?;
            }
            Status::Ok => {
                let payload = response
                    .payload
                    .as_ref()
                    .ok_or_else(|| Error::Encoding("ok response without payload".to_string()))?;
                writer.u8(STATUS_OK);
                writer.payload_kind(payload);
                writer.metadata(&response.metadata)?;
                writer.payload(payload)?;
            }
        }
        Ok(writer.freeze())
    }
}

/// Encode a canonical request into a frame. Client-side counterpart of
/// [`WireCodec::decode`].
pub fn encode_request(request: &CanonicalRequest) -> Result<Bytes> {
    let mut writer = Writer::new();
    writer.header();
    writer.payload_kind(&request.payload);
    writer.str16(&request.request_id)?;
    writer.metadata(&request.metadata)?;
    writer.payload(&request.payload)?;
    Ok(writer.freeze())
}

/// Decode a response frame. Client-side counterpart of
/// [`WireCodec::encode`].
pub fn decode_response(body: &[u8]) -> Result<CanonicalResponse> {
    let mut reader = Reader::new(body);
    reader.header()?;
    let status = reader.u8()?;
    if status != STATUS_OK {
        let kind = failure_from_code(status).ok_or_else(|| {
            Error::MalformedInput(format!("unknown failure code {status}"))
        })?;
        let message = reader.str16()?;
        reader.finish()?;
        return Ok(CanonicalResponse::failed(Failure::new(kind, message)));
    }
    let kind = reader.u8()?;
    let metadata = reader.metadata()?;
    let payload = reader.payload(kind)?;
    reader.finish()?;
    Ok(CanonicalResponse::ok(payload, metadata))
}

fn dtype_tag(dtype: DType) -> u8 {
    match dtype {
        DType::Int32 => 1,
        DType::Int64 => 2,
        DType::Float32 => 3,
        DType::Float64 => 4,
        DType::Bool => 5,
        DType::Bytes => 6,
    }
}

fn dtype_from_tag(tag: u8) -> Option<DType> {
    match tag {
        1 => Some(DType::Int32),
        2 => Some(DType::Int64),
        3 => Some(DType::Float32),
        4 => Some(DType::Float64),
        5 => Some(DType::Bool),
        6 => Some(DType::Bytes),
        _ => None,
    }
}

fn failure_code(kind: FailureKind) -> u8 {
    match kind {
        FailureKind::MalformedInput => 1,
        FailureKind::ShapeMismatch => 2,
        FailureKind::DuplicateName => 3,
        FailureKind::EncodingError => 4,
        FailureKind::Timeout => 5,
        FailureKind::ComponentError => 6,
        FailureKind::InvalidComponentOutput => 7,
        FailureKind::ServiceOverloaded => 8,
    }
}

fn failure_from_code(code: u8) -> Option<FailureKind> {
    match code {
        1 => Some(FailureKind::MalformedInput),
        2 => Some(FailureKind::ShapeMismatch),
        3 => Some(FailureKind::DuplicateName),
        4 => Some(FailureKind::EncodingError),
        5 => Some(FailureKind::Timeout),
        6 => Some(FailureKind::ComponentError),
        7 => Some(FailureKind::InvalidComponentOutput),
        8 => Some(FailureKind::ServiceOverloaded),
        _ => None,
    }
}

/// Bounds-checked cursor over a frame.
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn need(&self, len: usize) -> Result<()> {
        if self.buf.remaining() < len {
            Err(Error::MalformedInput("truncated frame".to_string()))
        } else {
            Ok(())
        }
    }

    fn header(&mut self) -> Result<()> {
        let magic = self.u32()?;
        if magic != MAGIC {
            return Err(Error::MalformedInput(format!(
                "bad frame magic {magic:#010x}"
            )));
        }
        let version = self.u8()?;
        if version != VERSION {
            return Err(Error::MalformedInput(format!(
                "unsupported frame version {version}"
            )));
        }
        Ok(())
    }

    fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    fn u16(&mut self) -> Result<u16> {
        self.need(2)?;
        Ok(self.buf.get_u16())
    }

    fn u32(&mut self) -> Result<u32> {
        self.need(4)?;
        Ok(self.buf.get_u32())
    }

    fn str16(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        self.need(len)?;
        let mut raw = vec![0u8; len];
        self.buf.copy_to_slice(&mut raw);
        String::from_utf8(raw)
            .map_err(|_| Error::MalformedInput("string field is not valid UTF-8".to_string()))
    }

    fn metadata(&mut self) -> Result<Metadata> {
        let count = self.u16()?;
        let mut metadata = Metadata::new();
        for _ in 0..count {
            let key = self.str16()?;
            let value = self.str16()?;
            metadata.insert(key, value);
        }
        Ok(metadata)
    }

    fn payload(&mut self, kind: u8) -> Result<Payload> {
        match kind {
            KIND_TENSOR => Ok(Payload::Tensor(self.tensor()?)),
            KIND_NAMED => {
                let count = self.u16()?;
                let mut entries = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let name = self.str16()?;
                    entries.push((name, self.tensor()?));
                }
                Ok(Payload::Named(NamedTensorSet::new(entries)?))
            }
            other => Err(Error::MalformedInput(format!(
                "unknown payload kind {other}"
            ))),
        }
    }

    fn tensor(&mut self) -> Result<Tensor> {
        let tag = self.u8()?;
        let dtype = dtype_from_tag(tag)
            .ok_or_else(|| Error::MalformedInput(format!("unknown dtype tag {tag}")))?;
        let rank = self.u8()? as usize;
        let mut shape = Vec::with_capacity(rank);
        for _ in 0..rank {
            shape.push(self.u32()? as usize);
        }
        let count = self.u32()? as usize;
        let expected =
            element_count_for(&shape).map_err(|e| Error::MalformedInput(e.to_string()))?;
        if count != expected {
            return Err(Error::MalformedInput(format!(
                "value count {count} disagrees with shape {shape:?}"
            )));
        }

        let values = match dtype {
            DType::Int32 => {
                self.need(count * 4)?;
                TensorValues::Int32((0..count).map(|_| self.buf.get_i32()).collect())
            }
            DType::Int64 => {
                self.need(count * 8)?;
                TensorValues::Int64((0..count).map(|_| self.buf.get_i64()).collect())
            }
            DType::Float32 => {
                self.need(count * 4)?;
                TensorValues::Float32((0..count).map(|_| self.buf.get_f32()).collect())
            }
            DType::Float64 => {
                self.need(count * 8)?;
                TensorValues::Float64((0..count).map(|_| self.buf.get_f64()).collect())
            }
            DType::Bool => {
                self.need(count)?;
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(match self.buf.get_u8() {
                        0 => false,
                        1 => true,
                        other => {
                            return Err(Error::MalformedInput(format!(
                                "invalid bool byte {other}"
                            )))
                        }
                    });
                }
                TensorValues::Bool(values)
            }
            DType::Bytes => {
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    let len = self.u32()? as usize;
                    self.need(len)?;
                    let mut raw = vec![0u8; len];
                    self.buf.copy_to_slice(&mut raw);
                    values.push(raw);
                }
                TensorValues::Bytes(values)
            }
        };

        Ok(Tensor::new(shape, values)?)
    }

    fn finish(&self) -> Result<()> {
        if self.buf.has_remaining() {
            Err(Error::MalformedInput(
                "trailing bytes after frame".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

struct Writer {
    buf: BytesMut,
}

impl Writer {
    fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
        }
    }

    fn header(&mut self) {
        self.buf.put_u32(MAGIC);
        self.buf.put_u8(VERSION);
    }

    fn u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    fn str16(&mut self, value: &str) -> Result<()> {
        let len = u16::try_from(value.len())
            .map_err(|_| Error::Encoding(format!("string of {} bytes overflows frame field", value.len())))?;
        self.buf.put_u16(len);
        self.buf.put_slice(value.as_bytes());
        Ok(())
    }

    fn metadata(&mut self, metadata: &Metadata) -> Result<()> {
        let count = u16::try_from(metadata.len())
            .map_err(|_| Error::Encoding("too many metadata entries for frame".to_string()))?;
        self.buf.put_u16(count);
        for (key, value) in metadata {
            self.str16(key)?;
            self.str16(value)?;
        }
        Ok(())
    }

    fn payload_kind(&mut self, payload: &Payload) {
        self.u8(match payload {
            Payload::Tensor(_) => KIND_TENSOR,
            Payload::Named(_) => KIND_NAMED,
        });
    }

    fn payload(&mut self, payload: &Payload) -> Result<()> {
        match payload {
            Payload::Tensor(tensor) => self.tensor(tensor),
            Payload::Named(set) => {
                let count = u16::try_from(set.len())
                    .map_err(|_| Error::Encoding("too many named tensors for frame".to_string()))?;
                self.buf.put_u16(count);
                for (name, tensor) in &set.entries {
                    self.str16(name)?;
                    self.tensor(tensor)?;
                }
                Ok(())
            }
        }
    }

    fn tensor(&mut self, tensor: &Tensor) -> Result<()> {
        self.u8(dtype_tag(tensor.dtype()));
        let rank = u8::try_from(tensor.shape.len())
            .map_err(|_| Error::Encoding(format!("rank {} overflows frame field", tensor.shape.len())))?;
        self.u8(rank);
        for &dim in &tensor.shape {
            let dim = u32::try_from(dim)
                .map_err(|_| Error::Encoding(format!("dimension {dim} overflows frame field")))?;
            self.buf.put_u32(dim);
        }
        let count = u32::try_from(tensor.values.len())
            .map_err(|_| Error::Encoding("element count overflows frame field".to_string()))?;
        self.buf.put_u32(count);

        match &tensor.values {
            TensorValues::Int32(values) => values.iter().for_each(|&v| self.buf.put_i32(v)),
            TensorValues::Int64(values) => values.iter().for_each(|&v| self.buf.put_i64(v)),
            TensorValues::Float32(values) => values.iter().for_each(|&v| self.buf.put_f32(v)),
            TensorValues::Float64(values) => values.iter().for_each(|&v| self.buf.put_f64(v)),
            TensorValues::Bool(values) => values.iter().for_each(|&v| self.buf.put_u8(v as u8)),
            TensorValues::Bytes(values) => {
                for bytes in values {
                    let len = u32::try_from(bytes.len()).map_err(|_| {
                        Error::Encoding("byte string overflows frame field".to_string())
                    })?;
                    self.buf.put_u32(len);
                    self.buf.put_slice(bytes);
                }
            }
        }
        Ok(())
    }

    fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}
