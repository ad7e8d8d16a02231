use serde::{Deserialize, Serialize};

use crate::{GridCoord, MaybeNdim, Ndim};

/// A grid of identically-shaped chunks tiled from the array's origin.
///
/// Chunks at the trailing edge keep the full chunk shape; partial coverage
/// is handled on the logical side by the indexer.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RegularChunkGrid {
    chunk_shape: GridCoord,
}

impl RegularChunkGrid {
    pub fn new<T: Into<GridCoord>>(chunk_shape: T) -> Self {
        let chunk_shape = chunk_shape.into();
        Self { chunk_shape }
    }

    pub fn chunk_shape(&self) -> &[u64] {
        &self.chunk_shape
    }
}

impl Ndim for RegularChunkGrid {
    fn ndim(&self) -> usize {
        self.chunk_shape.len()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "name", content = "configuration", rename_all = "lowercase")]
pub enum ChunkGridType {
    Regular(RegularChunkGrid),
}

impl ChunkGridType {
    pub fn chunk_shape(&self) -> &[u64] {
        match self {
            Self::Regular(g) => g.chunk_shape(),
        }
    }
}

impl MaybeNdim for ChunkGridType {
    fn maybe_ndim(&self) -> Option<usize> {
        match self {
            Self::Regular(g) => Some(g.ndim()),
        }
    }
}

impl From<&[u64]> for ChunkGridType {
    fn from(value: &[u64]) -> Self {
        let cs: GridCoord = value.iter().cloned().collect();
        Self::Regular(RegularChunkGrid::new(cs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_chunk_grid() {
        let s = r#"{"name":"regular","configuration":{"chunk_shape":[2,3,4]}}"#;
        let g: ChunkGridType = serde_json::from_str(s).expect("could not deser chunk grid");
        assert_eq!(g.chunk_shape(), &[2, 3, 4]);
        assert_eq!(serde_json::to_string(&g).unwrap(), s);
    }
}
