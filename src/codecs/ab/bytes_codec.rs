use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::codecs::{ArraySpec, CodecError};
use crate::data_type::{NBytes, ReflectedType};
use crate::{to_usize, ArcArrayD};

use super::ABCodec;

/// Byte order of multi-byte elements on the wire.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    Big,
    Little,
}

/// Multi-byte elements are little-endian unless the codec configuration
/// says otherwise.
pub const ZARR_ENDIAN: Endian = Endian::Little;

impl Default for Endian {
    fn default() -> Self {
        ZARR_ENDIAN
    }
}

/// The default array->bytes codec: elements in lexicographical (C) order
/// with the configured endianness.
///
/// `endian` may be [None] only for single-byte data types.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BytesCodec {
    endian: Option<Endian>,
}

impl Default for BytesCodec {
    fn default() -> Self {
        Self {
            endian: Some(ZARR_ENDIAN),
        }
    }
}

impl BytesCodec {
    pub fn new(endian: Option<Endian>) -> Self {
        Self { endian }
    }

    pub fn new_big() -> Self {
        Self::new(Some(Endian::Big))
    }

    pub fn new_little() -> Self {
        Self::new(Some(Endian::Little))
    }

    pub fn new_single_byte() -> Self {
        Self::new(None)
    }

    fn valid_endian<T: ReflectedType>(&self) -> Result<Endian, CodecError> {
        T::ZARR_TYPE
            .valid_endian(self.endian)
            .map_err(|_| CodecError::MissingEndian(T::ZARR_TYPE))
    }
}

impl ABCodec for BytesCodec {
    fn encode<T: ReflectedType>(
        &self,
        decoded: ArcArrayD<T>,
        spec: &ArraySpec<T>,
    ) -> Result<Bytes, CodecError> {
        let endian = self.valid_endian::<T>()?;
        let mut buf = Vec::with_capacity(spec.byte_length());
        T::write_array_to(&decoded, &mut buf, endian)?;
        Ok(buf.into())
    }

    fn decode<T: ReflectedType>(
        &self,
        encoded: &[u8],
        spec: &ArraySpec<T>,
    ) -> Result<ArcArrayD<T>, CodecError> {
        let endian = self.valid_endian::<T>()?;
        let expected = spec.byte_length();
        if encoded.len() != expected {
            return Err(CodecError::UnexpectedLength {
                expected,
                got: encoded.len(),
            });
        }
        let shape = to_usize(&spec.shape);
        Ok(T::read_array_from(encoded, endian, &shape)?)
    }

    fn compute_encoded_size(&self, input_size: usize) -> Option<usize> {
        Some(input_size)
    }
}
