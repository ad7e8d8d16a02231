use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::codecs::CodecError;
use crate::MaybeNdim;

mod crc32c_codec;
pub use crc32c_codec::Crc32cCodec;

#[cfg(feature = "gzip")]
mod gzip_codec;
#[cfg(feature = "gzip")]
pub use gzip_codec::GzipCodec;

/// A bytes->bytes codec: transforms a chunk's byte stream (compression,
/// checksums).
pub trait BBCodec {
    fn encode(&self, decoded: &[u8]) -> Result<Bytes, CodecError>;

    fn decode(&self, encoded: &[u8]) -> Result<Bytes, CodecError>;

    /// [None] when the encoded size is data-dependent.
    fn compute_encoded_size(&self, input_size: usize) -> Option<usize>;
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(rename_all = "lowercase", tag = "name", content = "configuration")]
pub enum BBCodecType {
    #[cfg(feature = "gzip")]
    Gzip(GzipCodec),
    Crc32c(Crc32cCodec),
}

impl BBCodec for BBCodecType {
    fn encode(&self, decoded: &[u8]) -> Result<Bytes, CodecError> {
        match self {
            #[cfg(feature = "gzip")]
            Self::Gzip(c) => c.encode(decoded),
            Self::Crc32c(c) => c.encode(decoded),
        }
    }

    fn decode(&self, encoded: &[u8]) -> Result<Bytes, CodecError> {
        match self {
            #[cfg(feature = "gzip")]
            Self::Gzip(c) => c.decode(encoded),
            Self::Crc32c(c) => c.decode(encoded),
        }
    }

    fn compute_encoded_size(&self, input_size: usize) -> Option<usize> {
        match self {
            #[cfg(feature = "gzip")]
            Self::Gzip(c) => c.compute_encoded_size(input_size),
            Self::Crc32c(c) => c.compute_encoded_size(input_size),
        }
    }
}

impl MaybeNdim for BBCodecType {
    fn maybe_ndim(&self) -> Option<usize> {
        None
    }
}

#[cfg(feature = "gzip")]
impl From<GzipCodec> for BBCodecType {
    fn from(c: GzipCodec) -> Self {
        Self::Gzip(c)
    }
}

impl From<Crc32cCodec> for BBCodecType {
    fn from(c: Crc32cCodec) -> Self {
        Self::Crc32c(c)
    }
}
