use bytes::Bytes;
use ndarray::{ArrayD, IxDyn};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub mod aa;
pub mod ab;
pub mod bb;

pub use aa::{AACodec, AACodecType, Order, TransposeCodec};
pub use ab::{ABCodec, ABCodecPartialDecode, ABCodecPartialEncode, ABCodecType, BytesCodec, Endian};
pub use bb::{BBCodec, BBCodecType, Crc32cCodec};

#[cfg(feature = "gzip")]
pub use bb::GzipCodec;

use crate::concurrent::concurrent_map;
use crate::config::{MemoryOrder, RuntimeConfig};
use crate::data_type::{DataType, NBytes, ReflectedType};
use crate::indexing::{is_total_slice, SliceSelection};
use crate::store::{StoreError, StorePath};
use crate::{to_usize, ArcArrayD, GridCoord, MaybeNdim};

/// Per-chunk view of shape, fill value and memory order; the element type is
/// the type parameter.
///
/// Codecs are defined over this value, never over full array metadata, so
/// there is no cycle between the metadata and codec layers.
#[derive(Clone, Debug, PartialEq)]
pub struct ArraySpec<T: ReflectedType> {
    pub shape: GridCoord,
    pub fill_value: T,
    pub order: MemoryOrder,
}

impl<T: ReflectedType> ArraySpec<T> {
    pub fn new(shape: GridCoord, fill_value: T, order: MemoryOrder) -> Self {
        Self {
            shape,
            fill_value,
            order,
        }
    }

    pub fn data_type(&self) -> DataType {
        T::ZARR_TYPE
    }

    pub fn num_elements(&self) -> usize {
        self.shape.iter().map(|s| *s as usize).product()
    }

    pub fn byte_length(&self) -> usize {
        self.num_elements() * T::ZARR_TYPE.nbytes()
    }

    /// A chunk-shaped array holding only the fill value.
    pub fn fill_array(&self) -> ArcArrayD<T> {
        ArcArrayD::from_elem(IxDyn(&to_usize(&self.shape)), self.fill_value)
    }
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("I/O error during encode/decode: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("checksum mismatch: stored {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("encoded chunk has {got} bytes, expected {expected}")]
    UnexpectedLength { expected: usize, got: usize },
    #[error("endianness required for data type {0} but not configured")]
    MissingEndian(DataType),
    #[error("codec {0:?} does not support partial I/O")]
    PartialUnsupported(&'static str),
    #[error("invalid codec configuration: {0}")]
    Configuration(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecChainError {
    #[error("more than one array->bytes codec in codec list")]
    MultipleAB,
    #[error("codec list has no array->bytes codec")]
    MissingAB,
    #[error("illegal codec order: {0} codec found after {1} codec")]
    IllegalOrder(&'static str, &'static str),
}

/// One codec in a metadata codec list, tagged by family.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CodecType {
    AA(AACodecType),
    AB(ABCodecType),
    BB(BBCodecType),
}

impl MaybeNdim for CodecType {
    fn maybe_ndim(&self) -> Option<usize> {
        match self {
            Self::AA(c) => c.maybe_ndim(),
            Self::AB(c) => c.maybe_ndim(),
            Self::BB(c) => c.maybe_ndim(),
        }
    }

    fn validate_ndim(&self) -> Result<(), &'static str> {
        match self {
            Self::AA(c) => c.validate_ndim(),
            Self::AB(c) => c.validate_ndim(),
            Self::BB(c) => c.validate_ndim(),
        }
    }
}

impl From<AACodecType> for CodecType {
    fn from(c: AACodecType) -> Self {
        Self::AA(c)
    }
}

impl From<ABCodecType> for CodecType {
    fn from(c: ABCodecType) -> Self {
        Self::AB(c)
    }
}

impl From<BBCodecType> for CodecType {
    fn from(c: BBCodecType) -> Self {
        Self::BB(c)
    }
}

impl From<TransposeCodec> for CodecType {
    fn from(c: TransposeCodec) -> Self {
        Self::AA(AACodecType::Transpose(c))
    }
}

impl From<BytesCodec> for CodecType {
    fn from(c: BytesCodec) -> Self {
        Self::AB(ABCodecType::Bytes(c))
    }
}

#[cfg(feature = "gzip")]
impl From<GzipCodec> for CodecType {
    fn from(c: GzipCodec) -> Self {
        Self::BB(BBCodecType::Gzip(c))
    }
}

impl From<Crc32cCodec> for CodecType {
    fn from(c: Crc32cCodec) -> Self {
        Self::BB(BBCodecType::Crc32c(c))
    }
}

/// One chunk's contribution to a batched read or write.
#[derive(Clone, Debug)]
pub struct BatchItem<T: ReflectedType> {
    pub store_path: StorePath,
    pub spec: ArraySpec<T>,
    pub chunk_selection: SliceSelection,
    pub out_selection: SliceSelection,
}

/// Per-stage specs threaded forward through the chain, shared between
/// encode and decode so the two directions cannot drift.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ResolvedSpecs<T: ReflectedType> {
    /// Specs seen by each array->array codec, in list order.
    pub aa: Vec<Vec<ArraySpec<T>>>,
    /// Specs seen by the array->bytes codec.
    pub ab: Vec<ArraySpec<T>>,
    /// Specs seen by each bytes->bytes codec, in list order.
    pub bb: Vec<Vec<ArraySpec<T>>>,
}

/// An ordered codec list partitioned into its three stages.
///
/// Encode applies the array->array prefix in order, then the array->bytes
/// codec, then the bytes->bytes suffix in order; decode reverses each stage.
/// Batch entries may be [None] (absent chunk) and pass through every stage
/// unchanged.
#[derive(Clone, Debug, PartialEq)]
pub struct CodecChain {
    aa_codecs: Vec<AACodecType>,
    ab_codec: ABCodecType,
    bb_codecs: Vec<BBCodecType>,
}

impl Default for CodecChain {
    fn default() -> Self {
        Self {
            aa_codecs: Vec::default(),
            ab_codec: ABCodecType::default(),
            bb_codecs: Vec::default(),
        }
    }
}

impl CodecChain {
    pub fn new(aa_codecs: Vec<AACodecType>, ab_codec: ABCodecType, bb_codecs: Vec<BBCodecType>) -> Self {
        Self {
            aa_codecs,
            ab_codec,
            bb_codecs,
        }
    }

    /// Partition an ordered codec list, rejecting lists without exactly one
    /// array->bytes codec or with stages out of order.
    pub fn from_types(codecs: Vec<CodecType>) -> Result<Self, CodecChainError> {
        let mut aa_codecs = Vec::default();
        let mut ab_codec = None;
        let mut bb_codecs = Vec::default();

        for ce in codecs {
            match ce {
                CodecType::AA(c) => {
                    if ab_codec.is_some() {
                        return Err(CodecChainError::IllegalOrder("AA", "AB"));
                    }
                    if !bb_codecs.is_empty() {
                        return Err(CodecChainError::IllegalOrder("AA", "BB"));
                    }
                    aa_codecs.push(c);
                }
                CodecType::AB(c) => {
                    if ab_codec.is_some() {
                        return Err(CodecChainError::MultipleAB);
                    }
                    if !bb_codecs.is_empty() {
                        return Err(CodecChainError::IllegalOrder("AB", "BB"));
                    }
                    ab_codec = Some(c);
                }
                CodecType::BB(c) => bb_codecs.push(c),
            }
        }

        let ab_codec = ab_codec.ok_or(CodecChainError::MissingAB)?;
        Ok(Self::new(aa_codecs, ab_codec, bb_codecs))
    }

    /// The flat ordered codec list this chain was partitioned from.
    pub fn to_types(&self) -> Vec<CodecType> {
        let mut out = Vec::with_capacity(self.aa_codecs.len() + 1 + self.bb_codecs.len());
        out.extend(self.aa_codecs.iter().cloned().map(CodecType::AA));
        out.push(CodecType::AB(self.ab_codec.clone()));
        out.extend(self.bb_codecs.iter().cloned().map(CodecType::BB));
        out
    }

    pub fn aa_codecs(&self) -> &[AACodecType] {
        &self.aa_codecs
    }

    pub fn aa_codecs_mut(&mut self) -> &mut Vec<AACodecType> {
        &mut self.aa_codecs
    }

    pub fn ab_codec(&self) -> &ABCodecType {
        &self.ab_codec
    }

    pub fn replace_ab_codec<C: Into<ABCodecType>>(&mut self, codec: C) -> ABCodecType {
        std::mem::replace(&mut self.ab_codec, codec.into())
    }

    pub fn bb_codecs(&self) -> &[BBCodecType] {
        &self.bb_codecs
    }

    pub fn bb_codecs_mut(&mut self) -> &mut Vec<BBCodecType> {
        &mut self.bb_codecs
    }

    /// Partial decode requires the capability on the array->bytes codec and
    /// no other codecs in the chain.
    pub fn supports_partial_decode(&self) -> bool {
        self.aa_codecs.is_empty()
            && self.bb_codecs.is_empty()
            && self.ab_codec.supports_partial_decode()
    }

    pub fn supports_partial_encode(&self) -> bool {
        self.aa_codecs.is_empty()
            && self.bb_codecs.is_empty()
            && self.ab_codec.supports_partial_encode()
    }

    pub(crate) fn resolved_specs_batched<T: ReflectedType>(
        &self,
        chunk_specs: &[ArraySpec<T>],
    ) -> Result<ResolvedSpecs<T>, CodecError> {
        let mut specs: Vec<ArraySpec<T>> = chunk_specs.to_vec();

        let mut aa = Vec::with_capacity(self.aa_codecs.len());
        for codec in &self.aa_codecs {
            aa.push(specs.clone());
            specs = specs
                .iter()
                .map(|s| codec.resolve_spec(s))
                .collect::<Result<_, _>>()?;
        }

        let ab = specs.clone();
        specs = specs
            .iter()
            .map(|s| self.ab_codec.resolve_spec(s))
            .collect::<Result<_, _>>()?;

        let mut bb = Vec::with_capacity(self.bb_codecs.len());
        for _codec in &self.bb_codecs {
            bb.push(specs.clone());
        }

        Ok(ResolvedSpecs { aa, ab, bb })
    }

    /// Size of an encoded chunk, or [None] when any codec's output is
    /// data-dependent.
    pub fn compute_encoded_size<T: ReflectedType>(
        &self,
        mut byte_length: usize,
        spec: &ArraySpec<T>,
    ) -> Result<Option<usize>, CodecError> {
        let mut spec = spec.clone();
        for codec in &self.aa_codecs {
            byte_length = match codec.compute_encoded_size(byte_length) {
                Some(n) => n,
                None => return Ok(None),
            };
            spec = codec.resolve_spec(&spec)?;
        }
        byte_length = match self.ab_codec.compute_encoded_size(byte_length) {
            Some(n) => n,
            None => return Ok(None),
        };
        for codec in &self.bb_codecs {
            byte_length = match codec.compute_encoded_size(byte_length) {
                Some(n) => n,
                None => return Ok(None),
            };
        }
        Ok(Some(byte_length))
    }

    /// Decode a batch of encoded chunks; absent entries stay [None].
    pub async fn decode_batched<T: ReflectedType>(
        &self,
        chunk_bytes_and_specs: Vec<(Option<Bytes>, ArraySpec<T>)>,
    ) -> Result<Vec<Option<ArcArrayD<T>>>, CodecError> {
        let (mut bytes_batch, chunk_specs): (Vec<_>, Vec<_>) =
            chunk_bytes_and_specs.into_iter().unzip();
        let resolved = self.resolved_specs_batched(&chunk_specs)?;

        for (codec, _specs) in self.bb_codecs.iter().zip(resolved.bb.iter()).rev() {
            bytes_batch = bytes_batch
                .into_iter()
                .map(|b| b.map(|bytes| codec.decode(&bytes)).transpose())
                .collect::<Result<_, _>>()?;
        }

        let mut array_batch: Vec<Option<ArcArrayD<T>>> = bytes_batch
            .iter()
            .zip(resolved.ab.iter())
            .map(|(b, spec)| {
                b.as_ref()
                    .map(|bytes| self.ab_codec.decode(bytes, spec))
                    .transpose()
            })
            .collect::<Result<_, _>>()?;

        for (codec, specs) in self.aa_codecs.iter().zip(resolved.aa.iter()).rev() {
            array_batch = array_batch
                .into_iter()
                .zip(specs.iter())
                .map(|(a, spec)| a.map(|arr| codec.decode(arr, spec)).transpose())
                .collect::<Result<_, _>>()?;
        }

        Ok(array_batch)
    }

    /// Encode a batch of chunks; [None] entries (elided chunks) stay [None].
    pub async fn encode_batched<T: ReflectedType>(
        &self,
        chunk_arrays_and_specs: Vec<(Option<ArcArrayD<T>>, ArraySpec<T>)>,
    ) -> Result<Vec<Option<Bytes>>, CodecError> {
        let (mut array_batch, chunk_specs): (Vec<_>, Vec<_>) =
            chunk_arrays_and_specs.into_iter().unzip();
        let resolved = self.resolved_specs_batched(&chunk_specs)?;

        for (codec, specs) in self.aa_codecs.iter().zip(resolved.aa.iter()) {
            array_batch = array_batch
                .into_iter()
                .zip(specs.iter())
                .map(|(a, spec)| a.map(|arr| codec.encode(arr, spec)).transpose())
                .collect::<Result<_, _>>()?;
        }

        let mut bytes_batch: Vec<Option<Bytes>> = array_batch
            .into_iter()
            .zip(resolved.ab.iter())
            .map(|(a, spec)| a.map(|arr| self.ab_codec.encode(arr, spec)).transpose())
            .collect::<Result<_, _>>()?;

        for codec in &self.bb_codecs {
            bytes_batch = bytes_batch
                .into_iter()
                .map(|b| b.map(|bytes| codec.encode(&bytes)).transpose())
                .collect::<Result<_, _>>()?;
        }

        Ok(bytes_batch)
    }

    pub async fn decode_partial_batched<T: ReflectedType>(
        &self,
        batch: Vec<(StorePath, SliceSelection, ArraySpec<T>)>,
    ) -> Result<Vec<Option<ArcArrayD<T>>>, CodecError> {
        if !self.supports_partial_decode() {
            return Err(CodecError::PartialUnsupported(self.ab_codec.name()));
        }
        self.ab_codec.decode_partial_batched(batch).await
    }

    pub async fn encode_partial_batched<T: ReflectedType>(
        &self,
        batch: Vec<(StorePath, ArcArrayD<T>, SliceSelection, ArraySpec<T>)>,
    ) -> Result<(), CodecError> {
        if !self.supports_partial_encode() {
            return Err(CodecError::PartialUnsupported(self.ab_codec.name()));
        }
        self.ab_codec.encode_partial_batched(batch).await
    }

    /// Read the batch's chunks into `out`: fetch (or partially decode) each
    /// chunk, slice it by its chunk-selection and write the result at its
    /// out-selection. Absent chunks fill with the fill value.
    pub async fn read_batched<T: ReflectedType>(
        &self,
        batch_info: Vec<BatchItem<T>>,
        out: &mut ArrayD<T>,
        rt: &RuntimeConfig,
    ) -> Result<(), CodecError> {
        if self.supports_partial_decode() {
            let chunk_array_batch = self
                .decode_partial_batched(
                    batch_info
                        .iter()
                        .map(|it| {
                            (
                                it.store_path.clone(),
                                it.chunk_selection.clone(),
                                it.spec.clone(),
                            )
                        })
                        .collect(),
                )
                .await?;
            for (chunk_array, item) in chunk_array_batch.into_iter().zip(batch_info.iter()) {
                let mut out_view = out.slice_mut(item.out_selection.slice_info());
                match chunk_array {
                    Some(arr) => out_view.assign(&arr),
                    None => out_view.fill(item.spec.fill_value),
                }
            }
        } else {
            let chunk_bytes_batch = concurrent_map(
                batch_info.iter().map(|it| it.store_path.clone()),
                |store_path| async move { store_path.get().await },
                rt.concurrency,
            )
            .await?;
            let chunk_array_batch = self
                .decode_batched(
                    chunk_bytes_batch
                        .into_iter()
                        .zip(batch_info.iter().map(|it| it.spec.clone()))
                        .collect(),
                )
                .await?;
            for (chunk_array, item) in chunk_array_batch.into_iter().zip(batch_info.iter()) {
                let mut out_view = out.slice_mut(item.out_selection.slice_info());
                match chunk_array {
                    Some(arr) => out_view.assign(&arr.slice(item.chunk_selection.slice_info())),
                    None => out_view.fill(item.spec.fill_value),
                }
            }
        }
        Ok(())
    }

    /// Write the batch's share of `value` to the store.
    ///
    /// Total-slice chunks are replaced outright; other chunks go through
    /// read-modify-write against the stored (or fill-valued) chunk. Chunks
    /// equal to the fill value throughout are deleted rather than written.
    pub async fn write_batched<T: ReflectedType>(
        &self,
        batch_info: Vec<BatchItem<T>>,
        value: &ArcArrayD<T>,
        rt: &RuntimeConfig,
    ) -> Result<(), CodecError> {
        if self.supports_partial_encode() {
            self.encode_partial_batched(
                batch_info
                    .iter()
                    .map(|it| {
                        (
                            it.store_path.clone(),
                            value.slice(it.out_selection.slice_info()).to_shared(),
                            it.chunk_selection.clone(),
                            it.spec.clone(),
                        )
                    })
                    .collect(),
            )
            .await?;
            return Ok(());
        }

        // fetch existing bytes only where the write does not replace the
        // whole chunk
        let chunk_bytes_batch = concurrent_map(
            batch_info.iter().map(|it| {
                if is_total_slice(&it.chunk_selection, &it.spec.shape) {
                    None
                } else {
                    Some(it.store_path.clone())
                }
            }),
            |maybe_path| async move {
                match maybe_path {
                    Some(store_path) => store_path.get().await,
                    None => Ok(None),
                }
            },
            rt.concurrency,
        )
        .await?;

        let existing_batch = self
            .decode_batched(
                chunk_bytes_batch
                    .into_iter()
                    .zip(batch_info.iter().map(|it| it.spec.clone()))
                    .collect(),
            )
            .await?;

        let merged_batch: Vec<Option<ArcArrayD<T>>> = existing_batch
            .into_iter()
            .zip(batch_info.iter())
            .map(|(existing, item)| {
                let new_slice = value.slice(item.out_selection.slice_info());
                let chunk_array = if is_total_slice(&item.chunk_selection, &item.spec.shape) {
                    new_slice.to_shared()
                } else {
                    let mut chunk_array = match existing {
                        Some(arr) => arr,
                        None => item.spec.fill_array(),
                    };
                    chunk_array
                        .slice_mut(item.chunk_selection.slice_info())
                        .assign(&new_slice);
                    chunk_array
                };
                if chunk_array.iter().all(|v| *v == item.spec.fill_value) {
                    None
                } else {
                    Some(chunk_array)
                }
            })
            .collect();

        let chunk_bytes_batch = self
            .encode_batched(
                merged_batch
                    .into_iter()
                    .zip(batch_info.iter().map(|it| it.spec.clone()))
                    .collect(),
            )
            .await?;

        concurrent_map(
            chunk_bytes_batch
                .into_iter()
                .zip(batch_info.iter().map(|it| it.store_path.clone())),
            |(chunk_bytes, store_path)| async move {
                match chunk_bytes {
                    Some(bytes) => store_path.set(bytes).await,
                    None => store_path.delete().await,
                }
            },
            rt.concurrency,
        )
        .await?;

        Ok(())
    }
}

impl MaybeNdim for CodecChain {
    fn maybe_ndim(&self) -> Option<usize> {
        self.to_types().iter().find_map(|c| c.maybe_ndim())
    }

    fn validate_ndim(&self) -> Result<(), &'static str> {
        let mut ndim = None;
        for codec in self.to_types() {
            codec.validate_ndim()?;
            if let Some(n) = codec.maybe_ndim() {
                match ndim {
                    None => ndim = Some(n),
                    Some(existing) if existing != n => {
                        return Err("Inconsistent dimensionalities")
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }
}

impl FromIterator<CodecType> for Result<CodecChain, CodecChainError> {
    fn from_iter<I: IntoIterator<Item = CodecType>>(iter: I) -> Self {
        CodecChain::from_types(iter.into_iter().collect())
    }
}

impl Serialize for CodecChain {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.to_types())
    }
}

impl<'de> Deserialize<'de> for CodecChain {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let codecs = Vec::<CodecType>::deserialize(deserializer)?;
        CodecChain::from_types(codecs).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexing::SelectionItem;
    use crate::store::MemoryStore;
    use futures::executor::block_on;
    use smallvec::smallvec;
    use std::sync::Arc;

    fn spec(shape: &[u64], fill: i32) -> ArraySpec<i32> {
        ArraySpec::new(shape.iter().cloned().collect(), fill, MemoryOrder::C)
    }

    fn full_chain() -> CodecChain {
        let mut codecs: Vec<CodecType> = vec![
            TransposeCodec::new_f().into(),
            BytesCodec::new_little().into(),
        ];
        #[cfg(feature = "gzip")]
        codecs.push(GzipCodec::default().into());
        codecs.push(Crc32cCodec::default().into());
        CodecChain::from_types(codecs).unwrap()
    }

    #[test]
    fn partition_validates_order() {
        assert_eq!(
            CodecChain::from_types(vec![
                BytesCodec::default().into(),
                BytesCodec::default().into()
            ])
            .unwrap_err(),
            CodecChainError::MultipleAB
        );
        assert_eq!(
            CodecChain::from_types(vec![
                BytesCodec::default().into(),
                TransposeCodec::new_f().into()
            ])
            .unwrap_err(),
            CodecChainError::IllegalOrder("AA", "AB")
        );
        assert_eq!(
            CodecChain::from_types(vec![
                Crc32cCodec::default().into(),
                BytesCodec::default().into()
            ])
            .unwrap_err(),
            CodecChainError::IllegalOrder("AB", "BB")
        );
        assert_eq!(
            CodecChain::from_types(vec![TransposeCodec::new_f().into()]).unwrap_err(),
            CodecChainError::MissingAB
        );
    }

    #[test]
    fn roundtrip_codec_list_serde() {
        let chain = full_chain();
        let s = serde_json::to_string(&chain).unwrap();
        let back: CodecChain = serde_json::from_str(&s).unwrap();
        assert_eq!(chain, back);

        let default_json = serde_json::to_string(&CodecChain::default()).unwrap();
        assert_eq!(
            default_json,
            r#"[{"name":"bytes","configuration":{"endian":"little"}}]"#
        );
    }

    #[test]
    fn misordered_codec_list_rejected_on_parse() {
        let s = r#"[
            {"name": "crc32c", "configuration": {}},
            {"name": "bytes", "configuration": {"endian": "little"}}
        ]"#;
        assert!(serde_json::from_str::<CodecChain>(s).is_err());
    }

    #[test]
    fn spec_propagation_is_shared() {
        let chain = full_chain();
        let specs = vec![spec(&[2, 3], 0), spec(&[2, 3], 0)];
        let resolved = chain.resolved_specs_batched(&specs).unwrap();

        // the transpose stage sees the original specs, the bytes codec the
        // transposed ones
        assert_eq!(resolved.aa.len(), 1);
        assert_eq!(resolved.aa[0], specs);
        assert_eq!(resolved.ab[0].shape.as_slice(), &[3, 2]);
        assert_eq!(resolved.bb.len(), chain.bb_codecs().len());

        // computed once: a second derivation is identical
        assert_eq!(resolved, chain.resolved_specs_batched(&specs).unwrap());
    }

    #[test]
    fn batched_roundtrip_with_absent_entries() {
        let chain = full_chain();
        let s = spec(&[2, 3], 0);
        let arr =
            ArcArrayD::from_shape_vec(vec![2, 3], vec![1i32, 2, 3, 4, 5, 6]).unwrap();

        let encoded = block_on(chain.encode_batched(vec![
            (Some(arr.clone()), s.clone()),
            (None, s.clone()),
        ]))
        .unwrap();
        assert!(encoded[0].is_some());
        assert!(encoded[1].is_none());

        let decoded = block_on(chain.decode_batched(vec![
            (encoded[0].clone(), s.clone()),
            (None, s.clone()),
        ]))
        .unwrap();
        assert_eq!(decoded[0].as_ref().unwrap(), &arr);
        assert!(decoded[1].is_none());
    }

    #[test]
    fn encoded_size_through_chain() {
        let chain = CodecChain::from_types(vec![
            BytesCodec::new_little().into(),
            Crc32cCodec::default().into(),
        ])
        .unwrap();
        let s = spec(&[2, 3], 0);
        assert_eq!(
            chain.compute_encoded_size(s.byte_length(), &s).unwrap(),
            Some(24 + 4)
        );

        #[cfg(feature = "gzip")]
        {
            let chain = CodecChain::from_types(vec![
                BytesCodec::new_little().into(),
                GzipCodec::default().into(),
            ])
            .unwrap();
            assert_eq!(chain.compute_encoded_size(s.byte_length(), &s).unwrap(), None);
        }
    }

    #[test]
    fn no_partial_io_without_capable_codec() {
        let chain = CodecChain::default();
        assert!(!chain.supports_partial_decode());
        assert!(!chain.supports_partial_encode());
        let res = block_on(
            chain.decode_partial_batched::<i32>(Vec::new()),
        );
        assert!(matches!(res, Err(CodecError::PartialUnsupported(_))));
    }

    fn total_selection(shape: &[u64]) -> SliceSelection {
        shape
            .iter()
            .map(|s| SelectionItem::Range { start: 0, stop: *s })
            .collect()
    }

    #[test]
    fn write_then_read_batched() {
        let chain = CodecChain::default();
        let rt = RuntimeConfig::default();
        let store = Arc::new(MemoryStore::new());
        let path = StorePath::root(store.clone()).join("c/0/0");
        let s = spec(&[2, 2], 0);

        let value = ArcArrayD::from_shape_vec(vec![2, 2], vec![1i32, 2, 3, 4]).unwrap();
        let item = BatchItem {
            store_path: path.clone(),
            spec: s.clone(),
            chunk_selection: total_selection(&[2, 2]),
            out_selection: total_selection(&[2, 2]),
        };
        block_on(chain.write_batched(vec![item.clone()], &value, &rt)).unwrap();
        assert_eq!(store.keys(), vec!["c/0/0".to_owned()]);

        let mut out = ArrayD::from_elem(IxDyn(&[2, 2]), 0i32);
        block_on(chain.read_batched(vec![item.clone()], &mut out, &rt)).unwrap();
        assert_eq!(out.into_shared(), value);

        // an all-fill write elides the chunk
        let zeros = ArcArrayD::from_elem(IxDyn(&[2, 2]), 0i32);
        block_on(chain.write_batched(vec![item.clone()], &zeros, &rt)).unwrap();
        assert!(store.is_empty());

        // reading the now-absent chunk yields fill values
        let mut out = ArrayD::from_elem(IxDyn(&[2, 2]), 9i32);
        block_on(chain.read_batched(vec![item], &mut out, &rt)).unwrap();
        assert_eq!(out, ArrayD::from_elem(IxDyn(&[2, 2]), 0i32));
    }

    #[test]
    fn read_modify_write_merges() {
        let chain = CodecChain::default();
        let rt = RuntimeConfig::default();
        let store = Arc::new(MemoryStore::new());
        let path = StorePath::root(store).join("c/0");
        let s = spec(&[4], 0);

        // seed the whole chunk
        let seed = ArcArrayD::from_shape_vec(vec![4], vec![1i32, 2, 3, 4]).unwrap();
        let total = BatchItem {
            store_path: path.clone(),
            spec: s.clone(),
            chunk_selection: total_selection(&[4]),
            out_selection: total_selection(&[4]),
        };
        block_on(chain.write_batched(vec![total.clone()], &seed, &rt)).unwrap();

        // overwrite the middle two elements only
        let partial = BatchItem {
            store_path: path,
            spec: s,
            chunk_selection: SliceSelection(smallvec![SelectionItem::Range {
                start: 1,
                stop: 3
            }]),
            out_selection: total_selection(&[2]),
        };
        let patch = ArcArrayD::from_shape_vec(vec![2], vec![8i32, 9]).unwrap();
        block_on(chain.write_batched(vec![partial], &patch, &rt)).unwrap();

        let mut out = ArrayD::from_elem(IxDyn(&[4]), 0i32);
        block_on(chain.read_batched(vec![total], &mut out, &rt)).unwrap();
        assert_eq!(
            out,
            ArrayD::from_shape_vec(vec![4], vec![1, 8, 9, 4]).unwrap()
        );
    }
}
