use serde::{Deserialize, Serialize};

use crate::codecs::{ArraySpec, CodecError};
use crate::data_type::ReflectedType;
use crate::{ArcArrayD, MaybeNdim};

mod transpose;
pub use transpose::{Order, TransposeCodec};

/// An array->array codec: transforms the in-memory representation of a chunk
/// without serializing it.
pub trait AACodec {
    fn encode<T: ReflectedType>(
        &self,
        decoded: ArcArrayD<T>,
        spec: &ArraySpec<T>,
    ) -> Result<ArcArrayD<T>, CodecError>;

    fn decode<T: ReflectedType>(
        &self,
        encoded: ArcArrayD<T>,
        spec: &ArraySpec<T>,
    ) -> Result<ArcArrayD<T>, CodecError>;

    /// How this codec transforms the spec seen by the next stage.
    fn resolve_spec<T: ReflectedType>(
        &self,
        spec: &ArraySpec<T>,
    ) -> Result<ArraySpec<T>, CodecError>;

    fn compute_encoded_size(&self, input_size: usize) -> Option<usize> {
        Some(input_size)
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(rename_all = "lowercase", tag = "name", content = "configuration")]
pub enum AACodecType {
    Transpose(TransposeCodec),
}

impl AACodec for AACodecType {
    fn encode<T: ReflectedType>(
        &self,
        decoded: ArcArrayD<T>,
        spec: &ArraySpec<T>,
    ) -> Result<ArcArrayD<T>, CodecError> {
        match self {
            Self::Transpose(c) => c.encode(decoded, spec),
        }
    }

    fn decode<T: ReflectedType>(
        &self,
        encoded: ArcArrayD<T>,
        spec: &ArraySpec<T>,
    ) -> Result<ArcArrayD<T>, CodecError> {
        match self {
            Self::Transpose(c) => c.decode(encoded, spec),
        }
    }

    fn resolve_spec<T: ReflectedType>(
        &self,
        spec: &ArraySpec<T>,
    ) -> Result<ArraySpec<T>, CodecError> {
        match self {
            Self::Transpose(c) => c.resolve_spec(spec),
        }
    }

    fn compute_encoded_size(&self, input_size: usize) -> Option<usize> {
        match self {
            Self::Transpose(c) => c.compute_encoded_size(input_size),
        }
    }
}

impl From<TransposeCodec> for AACodecType {
    fn from(c: TransposeCodec) -> Self {
        Self::Transpose(c)
    }
}

impl MaybeNdim for AACodecType {
    fn maybe_ndim(&self) -> Option<usize> {
        match self {
            Self::Transpose(t) => t.maybe_ndim(),
        }
    }

    fn validate_ndim(&self) -> Result<(), &'static str> {
        match self {
            Self::Transpose(t) => t.validate_ndim(),
        }
    }
}
