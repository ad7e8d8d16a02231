use std::io::{Read, Write};

use bytes::Bytes;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression as GzCompression;
use serde::{Deserialize, Serialize};

use crate::codecs::CodecError;

use super::BBCodec;

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct GzipCodec {
    pub level: u32,
}

impl Default for GzipCodec {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl BBCodec for GzipCodec {
    fn encode(&self, decoded: &[u8]) -> Result<Bytes, CodecError> {
        let mut encoder = GzEncoder::new(Vec::default(), GzCompression::new(self.level));
        encoder.write_all(decoded)?;
        Ok(encoder.finish()?.into())
    }

    fn decode(&self, encoded: &[u8]) -> Result<Bytes, CodecError> {
        let mut decoder = GzDecoder::new(encoded);
        let mut out = Vec::default();
        decoder.read_to_end(&mut out)?;
        Ok(out.into())
    }

    fn compute_encoded_size(&self, _input_size: usize) -> Option<usize> {
        None
    }
}
