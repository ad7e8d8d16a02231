use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::codecs::{ArraySpec, CodecError};
use crate::data_type::ReflectedType;
use crate::indexing::SliceSelection;
use crate::store::StorePath;
use crate::{ArcArrayD, MaybeNdim};

mod bytes_codec;
pub use bytes_codec::{BytesCodec, Endian, ZARR_ENDIAN};

/// An array->bytes codec: serializes between a chunk and its byte
/// representation. Exactly one sits in every codec list.
pub trait ABCodec {
    fn encode<T: ReflectedType>(
        &self,
        decoded: ArcArrayD<T>,
        spec: &ArraySpec<T>,
    ) -> Result<Bytes, CodecError>;

    fn decode<T: ReflectedType>(
        &self,
        encoded: &[u8],
        spec: &ArraySpec<T>,
    ) -> Result<ArcArrayD<T>, CodecError>;

    /// How this codec transforms the spec seen by the next stage.
    fn resolve_spec<T: ReflectedType>(
        &self,
        spec: &ArraySpec<T>,
    ) -> Result<ArraySpec<T>, CodecError> {
        Ok(spec.clone())
    }

    fn compute_encoded_size(&self, input_size: usize) -> Option<usize>;
}

/// Capability of an array->bytes codec to produce the selected region of an
/// encoded chunk without round-tripping the whole chunk.
///
/// A decoder may yield [None] for a position to signal an absent chunk.
#[async_trait]
pub trait ABCodecPartialDecode {
    async fn decode_partial_batched<T: ReflectedType>(
        &self,
        batch: Vec<(StorePath, SliceSelection, ArraySpec<T>)>,
    ) -> Result<Vec<Option<ArcArrayD<T>>>, CodecError>;
}

/// Capability of an array->bytes codec to merge a sub-region into an
/// existing encoded chunk in place.
#[async_trait]
pub trait ABCodecPartialEncode {
    async fn encode_partial_batched<T: ReflectedType>(
        &self,
        batch: Vec<(StorePath, ArcArrayD<T>, SliceSelection, ArraySpec<T>)>,
    ) -> Result<(), CodecError>;
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(rename_all = "lowercase", tag = "name", content = "configuration")]
pub enum ABCodecType {
    Bytes(BytesCodec),
}

impl ABCodecType {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "bytes",
        }
    }

    /// Whether this codec implements [ABCodecPartialDecode].
    pub fn supports_partial_decode(&self) -> bool {
        match self {
            Self::Bytes(_) => false,
        }
    }

    /// Whether this codec implements [ABCodecPartialEncode].
    pub fn supports_partial_encode(&self) -> bool {
        match self {
            Self::Bytes(_) => false,
        }
    }

    pub(crate) async fn decode_partial_batched<T: ReflectedType>(
        &self,
        _batch: Vec<(StorePath, SliceSelection, ArraySpec<T>)>,
    ) -> Result<Vec<Option<ArcArrayD<T>>>, CodecError> {
        match self {
            Self::Bytes(_) => Err(CodecError::PartialUnsupported(self.name())),
        }
    }

    pub(crate) async fn encode_partial_batched<T: ReflectedType>(
        &self,
        _batch: Vec<(StorePath, ArcArrayD<T>, SliceSelection, ArraySpec<T>)>,
    ) -> Result<(), CodecError> {
        match self {
            Self::Bytes(_) => Err(CodecError::PartialUnsupported(self.name())),
        }
    }
}

impl ABCodec for ABCodecType {
    fn encode<T: ReflectedType>(
        &self,
        decoded: ArcArrayD<T>,
        spec: &ArraySpec<T>,
    ) -> Result<Bytes, CodecError> {
        match self {
            Self::Bytes(c) => c.encode(decoded, spec),
        }
    }

    fn decode<T: ReflectedType>(
        &self,
        encoded: &[u8],
        spec: &ArraySpec<T>,
    ) -> Result<ArcArrayD<T>, CodecError> {
        match self {
            Self::Bytes(c) => c.decode(encoded, spec),
        }
    }

    fn resolve_spec<T: ReflectedType>(
        &self,
        spec: &ArraySpec<T>,
    ) -> Result<ArraySpec<T>, CodecError> {
        match self {
            Self::Bytes(c) => c.resolve_spec(spec),
        }
    }

    fn compute_encoded_size(&self, input_size: usize) -> Option<usize> {
        match self {
            Self::Bytes(c) => c.compute_encoded_size(input_size),
        }
    }
}

impl From<BytesCodec> for ABCodecType {
    fn from(c: BytesCodec) -> Self {
        Self::Bytes(c)
    }
}

impl Default for ABCodecType {
    fn default() -> Self {
        Self::Bytes(BytesCodec::default())
    }
}

impl MaybeNdim for ABCodecType {
    fn maybe_ndim(&self) -> Option<usize> {
        None
    }
}
