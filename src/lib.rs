//! Asynchronous chunked n-dimensional array storage in the Zarr V3 format.
//!
//! The core is an async [`AsyncArray`] engine which translates hyperslab
//! selections into chunk-aligned store I/O through a staged codec pipeline;
//! [`Array`] is a thin blocking façade over it for callers without an
//! executor.

use smallvec::SmallVec;

pub mod array;
pub mod chunk_grid;
pub mod chunk_key_encoding;
pub mod codecs;
pub mod concurrent;
pub mod config;
pub mod data_type;
pub mod indexing;
pub mod metadata;
pub mod store;

const COORD_SMALLVEC_SIZE: usize = 6;
pub const ZARR_FORMAT: usize = 3;

pub type CoordVec<T> = SmallVec<[T; COORD_SMALLVEC_SIZE]>;
pub type GridCoord = CoordVec<u64>;
pub type ArcArrayD<T> = ndarray::ArcArray<T, ndarray::IxDyn>;

pub use array::{Array, ArrayError, AsyncArray};
pub use config::{MemoryOrder, RuntimeConfig};
pub use indexing::{BasicIndexer, Selection, SelectionItem, SliceSelection};
pub use metadata::{ArrayMetadata, ArrayMetadataBuilder};
pub use store::{MemoryStore, Store, StorePath};

pub(crate) fn to_usize(coord: &[u64]) -> CoordVec<usize> {
    coord.iter().map(|n| *n as usize).collect()
}

pub trait Ndim {
    fn ndim(&self) -> usize;

    fn same_ndim<T: Ndim>(&self, other: &T) -> Result<usize, &'static str> {
        let n = self.ndim();
        if n == other.ndim() {
            Ok(n)
        } else {
            Err("Inconsistent dimensionalities")
        }
    }
}

pub trait MaybeNdim {
    fn maybe_ndim(&self) -> Option<usize>;

    fn union_ndim<T: MaybeNdim>(&self, other: &T) -> Result<Option<usize>, &'static str> {
        if let Some(n1) = self.maybe_ndim() {
            if let Some(n2) = other.maybe_ndim() {
                if n1 == n2 {
                    Ok(Some(n1))
                } else {
                    Err("Inconsistent dimensionalities")
                }
            } else {
                Ok(Some(n1))
            }
        } else {
            Ok(other.maybe_ndim())
        }
    }

    fn validate_ndim(&self) -> Result<(), &'static str> {
        Ok(())
    }
}

impl<T: Ndim> MaybeNdim for T {
    fn maybe_ndim(&self) -> Option<usize> {
        Some(self.ndim())
    }
}
