use std::collections::HashSet;
use std::fmt;
use std::future::Future;

use log::debug;
use ndarray::{ArrayD, IxDyn, ShapeBuilder};
use thiserror::Error;

use crate::chunk_key_encoding::ChunkKeyEncoder;
use crate::codecs::{ArraySpec, BatchItem, CodecError};
use crate::concurrent::concurrent_map;
use crate::config::{MemoryOrder, RuntimeConfig};
use crate::data_type::{DataType, ReflectedType};
use crate::indexing::{all_chunk_coords, BasicIndexer, IndexerError, Selection};
use crate::metadata::{ArrayMetadata, JsonObject, MetadataError};
use crate::store::{StoreError, StorePath, ZARR_JSON};
use crate::{to_usize, ArcArrayD, GridCoord, Ndim};

#[derive(Error, Debug)]
pub enum ArrayError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Indexer(#[from] IndexerError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("a node already exists at {0:?}")]
    AlreadyExists(String),
    #[error("no array metadata found at {0:?}")]
    NodeNotFound(String),
    #[error("value shape {got:?} does not match selection shape {expected:?}")]
    ValueShapeMismatch { expected: Vec<u64>, got: Vec<u64> },
    #[error("new shape has {got} dimensions, array has {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

fn allocate<T: ReflectedType>(shape: &[u64], fill: T, order: MemoryOrder) -> ArrayD<T> {
    let dims = to_usize(shape);
    match order {
        MemoryOrder::C => ArrayD::from_elem(IxDyn(&dims), fill),
        MemoryOrder::F => {
            let numel = dims.iter().product();
            ArrayD::from_shape_vec(IxDyn(&dims).f(), vec![fill; numel])
                .expect("element count matches shape")
        }
    }
}

/// The asynchronous array engine: binds immutable metadata, a store
/// location and runtime configuration, and translates selections into
/// batched chunk I/O.
///
/// Instances are cheap to clone and freely shareable for reads. Writes do
/// not lock chunks: concurrent writes to overlapping chunks are
/// last-writer-wins per chunk key.
#[derive(Clone)]
pub struct AsyncArray<T: ReflectedType> {
    metadata: ArrayMetadata,
    store_path: StorePath,
    runtime: RuntimeConfig,
    fill_value: T,
}

impl<T: ReflectedType> AsyncArray<T> {
    /// Bind metadata to a store location without touching the store.
    pub fn new(
        metadata: ArrayMetadata,
        store_path: StorePath,
        runtime: RuntimeConfig,
    ) -> Result<Self, ArrayError> {
        metadata.validate()?;
        let fill_value = metadata.fill_value::<T>()?;
        Ok(Self {
            metadata,
            store_path,
            runtime,
            fill_value,
        })
    }

    /// Persist new metadata at `store_path` and return the bound array.
    ///
    /// Fails with [ArrayError::AlreadyExists] if a metadata document is
    /// already present, unless `exists_ok`.
    pub async fn create(
        store_path: StorePath,
        metadata: ArrayMetadata,
        runtime: RuntimeConfig,
        exists_ok: bool,
    ) -> Result<Self, ArrayError> {
        if !exists_ok && store_path.join(ZARR_JSON).exists().await? {
            return Err(ArrayError::AlreadyExists(store_path.path().to_owned()));
        }
        let array = Self::new(metadata, store_path, runtime)?;
        array.save_metadata().await?;
        Ok(array)
    }

    /// Load and parse the metadata document below `store_path`.
    pub async fn open(store_path: StorePath, runtime: RuntimeConfig) -> Result<Self, ArrayError> {
        let Some(bytes) = store_path.join(ZARR_JSON).get().await? else {
            return Err(ArrayError::NodeNotFound(store_path.path().to_owned()));
        };
        let metadata = ArrayMetadata::from_json_bytes(&bytes)?;
        Self::new(metadata, store_path, runtime)
    }

    /// Open the array at whichever format version is present.
    ///
    /// Only the V3 document is currently recognized, so this is `open`;
    /// other formats are future work.
    pub async fn open_auto(
        store_path: StorePath,
        runtime: RuntimeConfig,
    ) -> Result<Self, ArrayError> {
        Self::open(store_path, runtime).await
    }

    /// Construct from an already-parsed metadata document, without any
    /// store I/O.
    pub fn from_dict(
        store_path: StorePath,
        doc: serde_json::Value,
        runtime: RuntimeConfig,
    ) -> Result<Self, ArrayError> {
        let metadata = ArrayMetadata::from_json_value(doc)?;
        Self::new(metadata, store_path, runtime)
    }

    async fn save_metadata(&self) -> Result<(), ArrayError> {
        let bytes = self.metadata.to_json_bytes()?;
        self.store_path.join(ZARR_JSON).set(bytes.into()).await?;
        Ok(())
    }

    pub fn metadata(&self) -> &ArrayMetadata {
        &self.metadata
    }

    pub fn store_path(&self) -> &StorePath {
        &self.store_path
    }

    pub fn runtime_config(&self) -> &RuntimeConfig {
        &self.runtime
    }

    pub fn shape(&self) -> &[u64] {
        self.metadata.shape()
    }

    pub fn size(&self) -> u64 {
        self.shape().iter().product()
    }

    pub fn dtype(&self) -> DataType {
        T::ZARR_TYPE
    }

    pub fn attrs(&self) -> &JsonObject {
        self.metadata.attributes()
    }

    pub fn fill_value(&self) -> T {
        self.fill_value
    }

    fn chunk_spec(&self) -> ArraySpec<T> {
        self.metadata.chunk_spec(self.fill_value, self.runtime.order)
    }

    fn indexer(&self, selection: &Selection) -> Result<BasicIndexer, IndexerError> {
        BasicIndexer::new(selection, self.shape(), self.metadata.chunk_shape())
    }

    fn chunk_key(&self, chunk_coords: &[u64]) -> String {
        self.metadata
            .chunk_key_encoding()
            .encode_chunk_key(chunk_coords)
    }

    fn chunk_batch(&self, indexer: &BasicIndexer) -> Vec<BatchItem<T>> {
        indexer
            .iter()
            .map(|projection| BatchItem {
                store_path: self.store_path.join(&self.chunk_key(&projection.chunk_coords)),
                spec: self.chunk_spec(),
                chunk_selection: projection.chunk_selection,
                out_selection: projection.out_selection,
            })
            .collect()
    }

    /// Read the selected region.
    ///
    /// The output has the indexer's shape: integer-indexed dimensions are
    /// dropped, so a selection of only integer indices yields the
    /// zero-dimensional element. Memory order follows the runtime
    /// configuration.
    pub async fn getitem(&self, selection: &Selection) -> Result<ArcArrayD<T>, ArrayError> {
        let indexer = self.indexer(selection)?;
        let mut out = allocate(indexer.shape(), self.fill_value, self.runtime.order);
        self.metadata
            .codecs()
            .read_batched(self.chunk_batch(&indexer), &mut out, &self.runtime)
            .await?;
        Ok(out.into_shared())
    }

    /// Write `value` over the selected region.
    ///
    /// `value`'s shape must equal the indexer's output shape.
    pub async fn setitem(
        &self,
        selection: &Selection,
        value: ArcArrayD<T>,
    ) -> Result<(), ArrayError> {
        let indexer = self.indexer(selection)?;
        if value.shape() != to_usize(indexer.shape()).as_slice() {
            return Err(ArrayError::ValueShapeMismatch {
                expected: indexer.shape().to_vec(),
                got: value.shape().iter().map(|s| *s as u64).collect(),
            });
        }
        self.write_indexed(&indexer, value).await
    }

    /// Write a single value over every element of the selected region.
    pub async fn setitem_scalar(&self, selection: &Selection, value: T) -> Result<(), ArrayError> {
        let indexer = self.indexer(selection)?;
        let value = ArcArrayD::from_elem(IxDyn(&to_usize(indexer.shape())), value);
        self.write_indexed(&indexer, value).await
    }

    async fn write_indexed(
        &self,
        indexer: &BasicIndexer,
        value: ArcArrayD<T>,
    ) -> Result<(), ArrayError> {
        self.metadata
            .codecs()
            .write_batched(self.chunk_batch(indexer), &value, &self.runtime)
            .await?;
        Ok(())
    }

    /// Change the array's extent, returning a new instance with replaced,
    /// re-persisted metadata.
    ///
    /// With `delete_outside_chunks`, chunk keys no longer on the grid of
    /// `new_shape` are deleted first.
    pub async fn resize(
        &self,
        new_shape: GridCoord,
        delete_outside_chunks: bool,
    ) -> Result<Self, ArrayError> {
        if new_shape.len() != self.ndim() {
            return Err(ArrayError::DimensionMismatch {
                expected: self.ndim(),
                got: new_shape.len(),
            });
        }

        if delete_outside_chunks {
            let chunk_shape = self.metadata.chunk_shape();
            let new_coords: HashSet<GridCoord> =
                all_chunk_coords(&new_shape, chunk_shape).collect();
            let stale: Vec<StorePath> = all_chunk_coords(self.shape(), chunk_shape)
                .filter(|coords| !new_coords.contains(coords))
                .map(|coords| self.store_path.join(&self.chunk_key(&coords)))
                .collect();
            debug!(
                "resizing {:?} -> {:?}: deleting {} stale chunk keys",
                self.shape(),
                new_shape.as_slice(),
                stale.len()
            );
            concurrent_map(
                stale,
                |path| async move { path.delete().await },
                self.runtime.concurrency,
            )
            .await?;
        }

        let array = Self {
            metadata: self.metadata.with_shape(new_shape),
            store_path: self.store_path.clone(),
            runtime: self.runtime.clone(),
            fill_value: self.fill_value,
        };
        array.save_metadata().await?;
        Ok(array)
    }

    /// Replace the attribute map, returning a new instance with replaced,
    /// re-persisted metadata.
    pub async fn update_attributes(&self, attributes: JsonObject) -> Result<Self, ArrayError> {
        let array = Self {
            metadata: self.metadata.with_attributes(attributes),
            store_path: self.store_path.clone(),
            runtime: self.runtime.clone(),
            fill_value: self.fill_value,
        };
        array.save_metadata().await?;
        Ok(array)
    }
}

impl<T: ReflectedType> Ndim for AsyncArray<T> {
    fn ndim(&self) -> usize {
        self.metadata.ndim()
    }
}

impl<T: ReflectedType> fmt::Debug for AsyncArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncArray")
            .field("store_path", &self.store_path.path())
            .field("shape", &self.shape())
            .field("dtype", &self.dtype())
            .finish()
    }
}

/// Drive a future to completion on the calling thread.
///
/// The engine's futures only suspend on store and codec operations, so a
/// plain thread-local executor suffices; no executor handle is carried in
/// the runtime configuration.
fn block_on<F: Future>(fut: F) -> F::Output {
    futures::executor::block_on(fut)
}

/// Blocking façade over [AsyncArray] for callers without an executor.
#[derive(Clone, Debug)]
pub struct Array<T: ReflectedType> {
    inner: AsyncArray<T>,
}

impl<T: ReflectedType> Array<T> {
    pub fn create(
        store_path: StorePath,
        metadata: ArrayMetadata,
        runtime: RuntimeConfig,
        exists_ok: bool,
    ) -> Result<Self, ArrayError> {
        block_on(AsyncArray::create(store_path, metadata, runtime, exists_ok)).map(Into::into)
    }

    pub fn open(store_path: StorePath, runtime: RuntimeConfig) -> Result<Self, ArrayError> {
        block_on(AsyncArray::open(store_path, runtime)).map(Into::into)
    }

    pub fn open_auto(store_path: StorePath, runtime: RuntimeConfig) -> Result<Self, ArrayError> {
        block_on(AsyncArray::open_auto(store_path, runtime)).map(Into::into)
    }

    pub fn from_dict(
        store_path: StorePath,
        doc: serde_json::Value,
        runtime: RuntimeConfig,
    ) -> Result<Self, ArrayError> {
        AsyncArray::from_dict(store_path, doc, runtime).map(Into::into)
    }

    pub fn getitem(&self, selection: &Selection) -> Result<ArcArrayD<T>, ArrayError> {
        block_on(self.inner.getitem(selection))
    }

    pub fn setitem(&self, selection: &Selection, value: ArcArrayD<T>) -> Result<(), ArrayError> {
        block_on(self.inner.setitem(selection, value))
    }

    pub fn setitem_scalar(&self, selection: &Selection, value: T) -> Result<(), ArrayError> {
        block_on(self.inner.setitem_scalar(selection, value))
    }

    pub fn resize(
        &self,
        new_shape: GridCoord,
        delete_outside_chunks: bool,
    ) -> Result<Self, ArrayError> {
        block_on(self.inner.resize(new_shape, delete_outside_chunks)).map(Into::into)
    }

    pub fn update_attributes(&self, attributes: JsonObject) -> Result<Self, ArrayError> {
        block_on(self.inner.update_attributes(attributes)).map(Into::into)
    }

    pub fn metadata(&self) -> &ArrayMetadata {
        self.inner.metadata()
    }

    pub fn store_path(&self) -> &StorePath {
        self.inner.store_path()
    }

    pub fn shape(&self) -> &[u64] {
        self.inner.shape()
    }

    pub fn size(&self) -> u64 {
        self.inner.size()
    }

    pub fn dtype(&self) -> DataType {
        self.inner.dtype()
    }

    pub fn attrs(&self) -> &JsonObject {
        self.inner.attrs()
    }

    pub fn as_async(&self) -> &AsyncArray<T> {
        &self.inner
    }

    pub fn into_async(self) -> AsyncArray<T> {
        self.inner
    }
}

impl<T: ReflectedType> Ndim for Array<T> {
    fn ndim(&self) -> usize {
        self.inner.ndim()
    }
}

impl<T: ReflectedType> From<AsyncArray<T>> for Array<T> {
    fn from(inner: AsyncArray<T>) -> Self {
        Self { inner }
    }
}
