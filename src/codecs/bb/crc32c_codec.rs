use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;
use crc32c::crc32c;
use serde::{Deserialize, Serialize};

use crate::codecs::CodecError;

use super::BBCodec;

const CHECKSUM_SIZE: usize = 4;

/// Appends a little-endian CRC32C of the payload; verified and stripped on
/// decode.
#[derive(Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Debug)]
pub struct Crc32cCodec {}

impl BBCodec for Crc32cCodec {
    fn encode(&self, decoded: &[u8]) -> Result<Bytes, CodecError> {
        let mut out = Vec::with_capacity(decoded.len() + CHECKSUM_SIZE);
        out.extend_from_slice(decoded);
        let mut suffix = [0u8; CHECKSUM_SIZE];
        LittleEndian::write_u32(&mut suffix, crc32c(decoded));
        out.extend_from_slice(&suffix);
        Ok(out.into())
    }

    fn decode(&self, encoded: &[u8]) -> Result<Bytes, CodecError> {
        if encoded.len() < CHECKSUM_SIZE {
            return Err(CodecError::UnexpectedLength {
                expected: CHECKSUM_SIZE,
                got: encoded.len(),
            });
        }
        let (body, suffix) = encoded.split_at(encoded.len() - CHECKSUM_SIZE);
        let expected = LittleEndian::read_u32(suffix);
        let actual = crc32c(body);
        if expected != actual {
            return Err(CodecError::ChecksumMismatch { expected, actual });
        }
        Ok(Bytes::copy_from_slice(body))
    }

    fn compute_encoded_size(&self, input_size: usize) -> Option<usize> {
        Some(input_size + CHECKSUM_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let raw = b"some chunk bytes";
        let codec = Crc32cCodec::default();
        let encoded = codec.encode(raw).unwrap();
        assert_eq!(encoded.len(), raw.len() + CHECKSUM_SIZE);
        assert_eq!(codec.decode(&encoded).unwrap().as_ref(), raw);
    }

    #[test]
    fn corruption_detected() {
        let codec = Crc32cCodec::default();
        let mut encoded = codec.encode(b"some chunk bytes").unwrap().to_vec();
        encoded[3] ^= 0x01;
        assert!(matches!(
            codec.decode(&encoded),
            Err(CodecError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn truncated_rejected() {
        let codec = Crc32cCodec::default();
        assert!(codec.decode(&[1, 2]).is_err());
    }
}
