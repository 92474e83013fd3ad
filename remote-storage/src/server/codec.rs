//! Snappy-framed protobuf codec.
//!
//! Remote read and write payloads are protobuf messages compressed as a
//! single snappy block (not the snappy framing format).

use prost::Message;

use crate::error::{Error, Result};

/// Decompresses and decodes a request body.
pub fn decode<M: Message + Default>(compressed: &[u8]) -> Result<M> {
    let raw = snap::raw::Decoder::new()
        .decompress_vec(compressed)
        .map_err(|e| Error::Decode(format!("invalid snappy payload: {}", e)))?;
    M::decode(raw.as_slice()).map_err(|e| Error::Decode(format!("invalid protobuf: {}", e)))
}

/// Encodes and compresses a response body.
pub fn encode<M: Message>(message: &M) -> Result<Vec<u8>> {
    snap::raw::Encoder::new()
        .compress_vec(&message.encode_to_vec())
        .map_err(|e| Error::Internal(format!("failed to compress response: {}", e)))
}
