//! Codec adapters translating wire formats to/from the canonical model.
//!
//! Each transport gets exactly one codec; the gateway selects by the
//! declared content type and never inspects the payload to guess. All
//! adapters must produce identical canonical semantics for equivalent
//! logical input, which the integration tests pin down.

pub mod frame;
pub mod grpc;
pub mod json;

use bytes::Bytes;
use tensorgate_common::{CanonicalRequest, CanonicalResponse};

use crate::error::Result;

/// Content type served by the JSON codec.
pub const JSON_CONTENT_TYPE: &str = "application/json";
/// Content type served by the binary frame codec.
pub const FRAME_CONTENT_TYPE: &str = "application/x-tensorgate-frame";

/// Shared decode/encode contract for byte-oriented wire formats.
///
/// The gRPC adapter works on strongly-typed prost messages instead of raw
/// bytes; it lives in [`grpc`] with free functions of the same shape.
pub trait WireCodec: Send + Sync {
    /// Content type this codec serves.
    fn content_type(&self) -> &'static str;

    /// Translate a wire request into a canonical one. Never invokes the
    /// component; a failure here fails fast.
    fn decode(&self, body: &[u8]) -> Result<CanonicalRequest>;

    /// Serialize a canonical response, failed or not, into wire bytes.
    fn encode(&self, response: &CanonicalResponse) -> Result<Bytes>;
}

/// Select the codec for a declared content type. Parameters such as
/// `; charset=utf-8` do not change the selection.
pub fn for_content_type(content_type: &str) -> Option<&'static dyn WireCodec> {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    match mime {
        JSON_CONTENT_TYPE => Some(&json::JsonCodec),
        FRAME_CONTENT_TYPE => Some(&frame::FrameCodec),
        _ => None,
    }
}
