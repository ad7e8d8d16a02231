use std::fmt::Display;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Maps a chunk's grid coordinates to its key relative to the array prefix.
pub trait ChunkKeyEncoder {
    fn encode_chunk_key(&self, coord: &[u64]) -> String;
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    #[serde(rename = "/")]
    Slash,
    #[serde(rename = ".")]
    Dot,
}

impl Display for Separator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Separator::Slash => write!(f, "/"),
            Separator::Dot => write!(f, "."),
        }
    }
}

fn slash() -> Separator {
    Separator::Slash
}

fn dot() -> Separator {
    Separator::Dot
}

/// `c{sep}i0{sep}i1...`; the leading `c` marks chunk data.
///
/// A zero-dimensional array's single chunk is keyed `c` alone.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DefaultChunkKeyEncoding {
    #[serde(default = "slash")]
    separator: Separator,
}

impl DefaultChunkKeyEncoding {
    pub fn new(separator: Separator) -> Self {
        Self { separator }
    }
}

impl ChunkKeyEncoder for DefaultChunkKeyEncoding {
    fn encode_chunk_key(&self, coord: &[u64]) -> String {
        let sep = self.separator.to_string();
        if coord.is_empty() {
            "c".to_owned()
        } else {
            format!("c{}{}", sep, coord.iter().join(&sep))
        }
    }
}

impl Default for DefaultChunkKeyEncoding {
    fn default() -> Self {
        Self {
            separator: Separator::Slash,
        }
    }
}

/// `i0{sep}i1...`, as the V2 format keyed chunks.
///
/// A zero-dimensional array's single chunk is keyed `0`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct V2ChunkKeyEncoding {
    #[serde(default = "dot")]
    separator: Separator,
}

impl V2ChunkKeyEncoding {
    pub fn new(separator: Separator) -> Self {
        Self { separator }
    }
}

impl ChunkKeyEncoder for V2ChunkKeyEncoding {
    fn encode_chunk_key(&self, coord: &[u64]) -> String {
        if coord.is_empty() {
            "0".to_owned()
        } else {
            coord.iter().join(&self.separator.to_string())
        }
    }
}

impl Default for V2ChunkKeyEncoding {
    fn default() -> Self {
        Self {
            separator: Separator::Dot,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "name", content = "configuration", rename_all = "lowercase")]
pub enum ChunkKeyEncoding {
    Default(DefaultChunkKeyEncoding),
    V2(V2ChunkKeyEncoding),
}

impl ChunkKeyEncoder for ChunkKeyEncoding {
    fn encode_chunk_key(&self, coord: &[u64]) -> String {
        match self {
            Self::Default(e) => e.encode_chunk_key(coord),
            Self::V2(e) => e.encode_chunk_key(coord),
        }
    }
}

impl Default for ChunkKeyEncoding {
    fn default() -> Self {
        Self::Default(DefaultChunkKeyEncoding::default())
    }
}

impl From<DefaultChunkKeyEncoding> for ChunkKeyEncoding {
    fn from(e: DefaultChunkKeyEncoding) -> Self {
        Self::Default(e)
    }
}

impl From<V2ChunkKeyEncoding> for ChunkKeyEncoding {
    fn from(e: V2ChunkKeyEncoding) -> Self {
        Self::V2(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_chunk_key_encoding() {
        let to_deser = vec![
            r#"{"name":"default","configuration":{"separator":"/"}}"#,
            r#"{"name":"default","configuration":{"separator":"."}}"#,
            r#"{"name":"v2","configuration":{"separator":"/"}}"#,
            r#"{"name":"v2","configuration":{"separator":"."}}"#,
        ];

        for s in to_deser.into_iter() {
            let c: ChunkKeyEncoding =
                serde_json::from_str(s).unwrap_or_else(|_| panic!("could not deser {s}"));
            let s2 = serde_json::to_string(&c).unwrap_or_else(|_| panic!("could not ser {c:?}"));
            assert_eq!(s, &s2);
        }
    }

    #[test]
    fn missing_separator_uses_defaults() {
        let c: ChunkKeyEncoding =
            serde_json::from_str(r#"{"name":"default","configuration":{}}"#).unwrap();
        assert_eq!(
            c,
            ChunkKeyEncoding::Default(DefaultChunkKeyEncoding {
                separator: Separator::Slash,
            })
        );

        let c: ChunkKeyEncoding =
            serde_json::from_str(r#"{"name":"v2","configuration":{}}"#).unwrap();
        assert_eq!(
            c,
            ChunkKeyEncoding::V2(V2ChunkKeyEncoding {
                separator: Separator::Dot,
            })
        );
    }

    #[test]
    fn default_encoding_keys() {
        let slash = DefaultChunkKeyEncoding::default();
        assert_eq!(slash.encode_chunk_key(&[1, 23, 4]), "c/1/23/4");
        let dot = DefaultChunkKeyEncoding::new(Separator::Dot);
        assert_eq!(dot.encode_chunk_key(&[1, 23, 4]), "c.1.23.4");
        // scalar array: single chunk keyed by the prefix alone
        assert_eq!(slash.encode_chunk_key(&[]), "c");
        assert_eq!(dot.encode_chunk_key(&[]), "c");
    }

    #[test]
    fn v2_encoding_keys() {
        let dot = V2ChunkKeyEncoding::default();
        assert_eq!(dot.encode_chunk_key(&[1, 23, 4]), "1.23.4");
        let slash = V2ChunkKeyEncoding::new(Separator::Slash);
        assert_eq!(slash.encode_chunk_key(&[1, 23, 4]), "1/23/4");
        assert_eq!(dot.encode_chunk_key(&[]), "0");
        assert_eq!(slash.encode_chunk_key(&[]), "0");
    }
}
