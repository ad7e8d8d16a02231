use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chunk_grid::ChunkGridType;
use crate::chunk_key_encoding::ChunkKeyEncoding;
use crate::codecs::{AACodecType, ABCodecType, ArraySpec, BBCodecType, CodecChain};
use crate::config::MemoryOrder;
use crate::data_type::{DataType, ReflectedType};
use crate::{CoordVec, GridCoord, MaybeNdim, Ndim, ZARR_FORMAT};

pub type JsonObject = serde_json::Map<String, serde_json::Value>;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("malformed metadata document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported zarr_format {0}")]
    UnsupportedFormat(usize),
    #[error("inconsistent metadata: {0}")]
    Inconsistent(&'static str),
    #[error("fill value {0} is invalid for data type {1}")]
    InvalidFillValue(serde_json::Value, DataType),
    #[error("array data type is {found}, requested element type reflects {requested}")]
    DataTypeMismatch { found: DataType, requested: DataType },
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeType {
    #[serde(rename = "array")]
    Array,
}

/// The array's persisted metadata document (`zarr.json`).
///
/// Immutable per version: [ArrayMetadata::with_shape] and
/// [ArrayMetadata::with_attributes] produce replaced copies. Use
/// [crate::ArrayMetadataBuilder] for convenient construction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ArrayMetadata {
    zarr_format: usize,
    node_type: NodeType,
    shape: GridCoord,
    data_type: DataType,
    chunk_grid: ChunkGridType,
    chunk_key_encoding: ChunkKeyEncoding,
    fill_value: serde_json::Value,
    #[serde(default)]
    codecs: CodecChain,
    #[serde(default)]
    attributes: JsonObject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dimension_names: Option<CoordVec<Option<String>>>,
}

impl Ndim for ArrayMetadata {
    fn ndim(&self) -> usize {
        self.shape.len()
    }
}

impl ArrayMetadata {
    pub fn new(
        shape: GridCoord,
        data_type: DataType,
        chunk_grid: ChunkGridType,
        chunk_key_encoding: ChunkKeyEncoding,
        fill_value: serde_json::Value,
        codecs: CodecChain,
        attributes: JsonObject,
        dimension_names: Option<CoordVec<Option<String>>>,
    ) -> Result<Self, MetadataError> {
        let out = Self {
            zarr_format: ZARR_FORMAT,
            node_type: NodeType::Array,
            shape,
            data_type,
            chunk_grid,
            chunk_key_encoding,
            fill_value,
            codecs,
            attributes,
            dimension_names,
        };
        out.validate()?;
        Ok(out)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, MetadataError> {
        let meta: Self = serde_json::from_slice(bytes)?;
        meta.validate()?;
        Ok(meta)
    }

    pub fn from_json_value(doc: serde_json::Value) -> Result<Self, MetadataError> {
        let meta: Self = serde_json::from_value(doc)?;
        meta.validate()?;
        Ok(meta)
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, MetadataError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), MetadataError> {
        if self.zarr_format != ZARR_FORMAT {
            return Err(MetadataError::UnsupportedFormat(self.zarr_format));
        }
        self.validate_dimensions()?;
        self.data_type
            .validate_json_value(&self.fill_value)
            .map_err(|_| {
                MetadataError::InvalidFillValue(self.fill_value.clone(), self.data_type)
            })?;
        Ok(())
    }

    /// Ensure that all dimensioned metadata is consistent.
    fn validate_dimensions(&self) -> Result<(), MetadataError> {
        self.union_ndim(&self.chunk_grid)
            .map_err(MetadataError::Inconsistent)?;
        if self.chunk_grid.chunk_shape().iter().any(|c| *c == 0) {
            return Err(MetadataError::Inconsistent("chunk shape contains a zero"));
        }
        if let Some(d) = &self.dimension_names {
            if d.len() != self.ndim() {
                return Err(MetadataError::Inconsistent(
                    "dimension names do not match dimensionality",
                ));
            }
        }
        self.codecs
            .validate_ndim()
            .map_err(MetadataError::Inconsistent)?;
        self.union_ndim(&self.codecs)
            .map_err(MetadataError::Inconsistent)?;
        Ok(())
    }

    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn chunk_grid(&self) -> &ChunkGridType {
        &self.chunk_grid
    }

    pub fn chunk_shape(&self) -> &[u64] {
        self.chunk_grid.chunk_shape()
    }

    pub fn chunk_key_encoding(&self) -> &ChunkKeyEncoding {
        &self.chunk_key_encoding
    }

    pub fn codecs(&self) -> &CodecChain {
        &self.codecs
    }

    pub fn attributes(&self) -> &JsonObject {
        &self.attributes
    }

    pub fn dimension_names(&self) -> Option<&[Option<String>]> {
        self.dimension_names.as_deref()
    }

    pub fn fill_value_json(&self) -> &serde_json::Value {
        &self.fill_value
    }

    /// The fill value as the reflected element type.
    ///
    /// Fails if the reflected type mismatches the array's data type, or the
    /// stored fill value does not deserialize as it.
    pub fn fill_value<T: ReflectedType>(&self) -> Result<T, MetadataError> {
        if T::ZARR_TYPE != self.data_type {
            return Err(MetadataError::DataTypeMismatch {
                found: self.data_type,
                requested: T::ZARR_TYPE,
            });
        }
        serde_json::from_value(self.fill_value.clone())
            .map_err(|_| MetadataError::InvalidFillValue(self.fill_value.clone(), self.data_type))
    }

    /// The spec every chunk of this array decodes to.
    ///
    /// Chunks at the trailing edge keep the full chunk shape; the indexer
    /// handles partial coverage on the logical side.
    pub fn chunk_spec<T: ReflectedType>(&self, fill_value: T, order: MemoryOrder) -> ArraySpec<T> {
        ArraySpec::new(self.chunk_shape().iter().cloned().collect(), fill_value, order)
    }

    /// A replaced copy with a new shape, as produced by resize.
    pub fn with_shape(&self, shape: GridCoord) -> Self {
        Self {
            shape,
            ..self.clone()
        }
    }

    /// A replaced copy with new attributes.
    pub fn with_attributes(&self, attributes: JsonObject) -> Self {
        Self {
            attributes,
            ..self.clone()
        }
    }
}

/// Builder applying the engine's defaulting rules: chunk grid defaults to a
/// single whole-array chunk, codecs to `[bytes]`, the fill value to the
/// element type's zero value.
pub struct ArrayMetadataBuilder<T: ReflectedType> {
    shape: GridCoord,
    chunk_grid: Option<ChunkGridType>,
    chunk_key_encoding: Option<ChunkKeyEncoding>,
    fill_value: Option<T>,
    codecs: CodecChain,
    attributes: JsonObject,
    dimension_names: Option<CoordVec<Option<String>>>,
}

impl<T: ReflectedType> ArrayMetadataBuilder<T> {
    pub fn new(shape: GridCoord) -> Self {
        Self {
            shape,
            chunk_grid: None,
            chunk_key_encoding: None,
            fill_value: None,
            codecs: CodecChain::default(),
            attributes: JsonObject::default(),
            dimension_names: None,
        }
    }

    /// Set the chunk grid.
    ///
    /// By default, the entire array will be a single chunk.
    ///
    /// Fails if the chunk grid is incompatible with the array's
    /// dimensionality.
    pub fn chunk_grid<G: Into<ChunkGridType>>(mut self, chunk_grid: G) -> Result<Self, &'static str> {
        let cg = chunk_grid.into();
        self.union_ndim(&cg)?;
        self.chunk_grid = Some(cg);
        Ok(self)
    }

    /// Set the chunk key encoding.
    ///
    /// By default, uses the default chunk key encoding
    /// (`c/`-prefixed, `/`-separated).
    pub fn chunk_key_encoding<E: Into<ChunkKeyEncoding>>(mut self, chunk_key_encoding: E) -> Self {
        self.chunk_key_encoding = Some(chunk_key_encoding.into());
        self
    }

    /// Set the fill value.
    ///
    /// By default, uses the element type's default value, which is `false`
    /// or `0`.
    pub fn fill_value(mut self, fill_value: T) -> Self {
        self.fill_value = Some(fill_value);
        self
    }

    /// Set the array->bytes codec, replacing the existing one.
    ///
    /// By default, a little-endian [crate::codecs::BytesCodec].
    pub fn ab_codec<C: Into<ABCodecType>>(mut self, codec: C) -> Result<Self, &'static str> {
        let c = codec.into();
        self.union_ndim(&c)?;
        self.codecs.replace_ab_codec(c);
        Ok(self)
    }

    /// Append an array->array codec.
    ///
    /// This will be the last AA encoder, or first AA decoder.
    pub fn push_aa_codec<C: Into<AACodecType>>(mut self, codec: C) -> Result<Self, &'static str> {
        let c = codec.into();
        self.union_ndim(&c)?;
        self.codecs.aa_codecs_mut().push(c);
        Ok(self)
    }

    /// Append a bytes->bytes codec.
    ///
    /// This will be the last BB encoder, or first BB decoder.
    pub fn push_bb_codec<C: Into<BBCodecType>>(mut self, codec: C) -> Self {
        self.codecs.bb_codecs_mut().push(codec.into());
        self
    }

    pub fn set_attribute<S: Serialize>(
        mut self,
        key: String,
        value: S,
    ) -> Result<Self, &'static str> {
        let v = serde_json::to_value(value).map_err(|_| "Could not serialize value")?;
        self.attributes.insert(key, v);
        Ok(self)
    }

    /// Set the dimension names.
    ///
    /// Fails if the number of dimension names does not match the array's
    /// dimensionality.
    pub fn dimension_names(
        mut self,
        names: CoordVec<Option<String>>,
    ) -> Result<Self, &'static str> {
        if names.len() != self.shape.len() {
            return Err("Dimension names has wrong length");
        }
        self.dimension_names = Some(names);
        Ok(self)
    }

    pub fn build(self) -> Result<ArrayMetadata, MetadataError> {
        let chunk_grid = self
            .chunk_grid
            .unwrap_or_else(|| ChunkGridType::from(self.shape.as_slice()));
        let chunk_key_encoding = self.chunk_key_encoding.unwrap_or_default();
        let fill_value = serde_json::to_value(self.fill_value.unwrap_or_default())
            .expect("primitive fill value serializes");

        ArrayMetadata::new(
            self.shape,
            T::ZARR_TYPE,
            chunk_grid,
            chunk_key_encoding,
            fill_value,
            self.codecs,
            self.attributes,
            self.dimension_names,
        )
    }
}

impl<T: ReflectedType> Ndim for ArrayMetadataBuilder<T> {
    fn ndim(&self) -> usize {
        self.shape.len()
    }
}
