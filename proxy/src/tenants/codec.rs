use crate::tenants::protocol::WriteRequest;
use bytes::Bytes;
use prost::Message;

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("message of {size} bytes exceeds the limit of {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("request body exceeds the limit of {max} bytes")]
    BodyTooLarge { max: usize },

    #[error("snappy: {0}")]
    Snappy(#[from] snap::Error),

    #[error("protobuf: {0}")]
    Protobuf(#[from] prost::DecodeError),
}

/// Decodes a snappy block compressed write request. Both the compressed
/// and the decompressed size are bounded by `max_size`.
pub fn decode(compressed: &[u8], max_size: usize) -> Result<WriteRequest, DecodeError> {
    if compressed.len() > max_size {
        return Err(DecodeError::TooLarge {
            size: compressed.len(),
            max: max_size,
        });
    }

    let size = snap::raw::decompress_len(compressed)?;
    if size > max_size {
        return Err(DecodeError::TooLarge {
            size,
            max: max_size,
        });
    }

    let raw = snap::raw::Decoder::new().decompress_vec(compressed)?;
    Ok(WriteRequest::decode(raw.as_slice())?)
}

pub fn encode(request: &WriteRequest) -> Result<Bytes, snap::Error> {
    let raw = request.encode_to_vec();
    let compressed = snap::raw::Encoder::new().compress_vec(&raw)?;
    Ok(Bytes::from(compressed))
}
