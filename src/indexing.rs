use std::ops::Range;

use ndarray::{IxDyn, SliceInfo, SliceInfoElem};
use thiserror::Error;

use crate::{CoordVec, GridCoord, Ndim};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexerError {
    #[error("selection has {got} dimensions, array has {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("index {index} is out of bounds for dimension {dim} of extent {extent}")]
    IndexOutOfBounds { dim: usize, index: u64, extent: u64 },
    #[error("range {start}..{stop} is invalid for dimension {dim} of extent {extent}")]
    RangeOutOfBounds {
        dim: usize,
        start: u64,
        stop: u64,
        extent: u64,
    },
}

/// One dimension of a selection: either a contiguous `start..stop` range with
/// unit step, or a single index, which drops the dimension from the output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionItem {
    Index(u64),
    Range { start: u64, stop: u64 },
}

impl SelectionItem {
    fn is_total(&self, extent: u64) -> bool {
        match self {
            Self::Index(_) => false,
            Self::Range { start, stop } => *start == 0 && *stop == extent,
        }
    }
}

impl From<u64> for SelectionItem {
    fn from(index: u64) -> Self {
        Self::Index(index)
    }
}

impl From<Range<u64>> for SelectionItem {
    fn from(r: Range<u64>) -> Self {
        Self::Range {
            start: r.start,
            stop: r.end,
        }
    }
}

/// A hyperslab selection on the logical array, one item per dimension.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Selection(pub CoordVec<SelectionItem>);

impl Selection {
    /// The selection covering the entirety of an array of the given shape.
    pub fn full(shape: &[u64]) -> Self {
        shape.iter().map(|s| SelectionItem::from(0..*s)).collect()
    }
}

impl Ndim for Selection {
    fn ndim(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<SelectionItem> for Selection {
    fn from_iter<I: IntoIterator<Item = SelectionItem>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<S: Into<SelectionItem>, const N: usize> From<[S; N]> for Selection {
    fn from(items: [S; N]) -> Self {
        items.into_iter().map(Into::into).collect()
    }
}

impl From<Vec<SelectionItem>> for Selection {
    fn from(items: Vec<SelectionItem>) -> Self {
        items.into_iter().collect()
    }
}

/// A selection within a single chunk or output buffer.
///
/// `Index` items drop their axis when sliced, mirroring the way integer
/// indices drop dimensions from the logical output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SliceSelection(pub CoordVec<SelectionItem>);

impl SliceSelection {
    /// Shape of the sliced region; `Index` dimensions are absent.
    pub fn shape(&self) -> GridCoord {
        self.0
            .iter()
            .filter_map(|it| match it {
                SelectionItem::Index(_) => None,
                SelectionItem::Range { start, stop } => Some(stop - start),
            })
            .collect()
    }

    pub fn slice_info(&self) -> SliceInfo<Vec<SliceInfoElem>, IxDyn, IxDyn> {
        let indices: Vec<_> = self
            .0
            .iter()
            .map(|it| match it {
                SelectionItem::Index(i) => SliceInfoElem::Index(*i as isize),
                SelectionItem::Range { start, stop } => SliceInfoElem::Slice {
                    start: *start as isize,
                    end: Some(*stop as isize),
                    step: 1,
                },
            })
            .collect();
        SliceInfo::try_from(indices).expect("selection items are valid slice specs")
    }
}

impl Ndim for SliceSelection {
    fn ndim(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<SelectionItem> for SliceSelection {
    fn from_iter<I: IntoIterator<Item = SelectionItem>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Whether the selection covers `0..extent` on every dimension of `shape`.
///
/// This is the decisive predicate for fast-path writes: a total slice
/// replaces the stored chunk outright, skipping read-modify-write.
pub fn is_total_slice(selection: &SliceSelection, shape: &[u64]) -> bool {
    selection.0.len() == shape.len()
        && selection
            .0
            .iter()
            .zip(shape.iter())
            .all(|(it, extent)| it.is_total(*extent))
}

/// One chunk's share of a selection: where it sits on the grid, the region
/// of the chunk it contributes, and the region of the output it fills.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkProjection {
    pub chunk_coords: GridCoord,
    pub chunk_selection: SliceSelection,
    pub out_selection: SliceSelection,
}

#[derive(Clone, Debug)]
struct DimIndexer {
    sel_start: u64,
    sel_stop: u64,
    drop_axis: bool,
    chunk_size: u64,
    first_chunk: u64,
    nchunks: u64,
}

impl DimIndexer {
    fn new(item: SelectionItem, extent: u64, chunk_size: u64, dim: usize) -> Result<Self, IndexerError> {
        let (sel_start, sel_stop, drop_axis) = match item {
            SelectionItem::Index(i) => {
                if i >= extent {
                    return Err(IndexerError::IndexOutOfBounds {
                        dim,
                        index: i,
                        extent,
                    });
                }
                (i, i + 1, true)
            }
            SelectionItem::Range { start, stop } => {
                if start > stop || stop > extent {
                    return Err(IndexerError::RangeOutOfBounds {
                        dim,
                        start,
                        stop,
                        extent,
                    });
                }
                (start, stop, false)
            }
        };

        let first_chunk = sel_start / chunk_size;
        let nchunks = if sel_start >= sel_stop {
            0
        } else {
            (sel_stop - 1) / chunk_size - first_chunk + 1
        };

        Ok(Self {
            sel_start,
            sel_stop,
            drop_axis,
            chunk_size,
            first_chunk,
            nchunks,
        })
    }

    /// Project the `i`th intersected chunk of this dimension.
    fn project(&self, i: u64) -> (u64, SelectionItem, Option<SelectionItem>) {
        let chunk = self.first_chunk + i;
        let chunk_offset = chunk * self.chunk_size;
        let lo = self.sel_start.max(chunk_offset);
        let hi = self.sel_stop.min(chunk_offset + self.chunk_size);

        if self.drop_axis {
            (chunk, SelectionItem::Index(lo - chunk_offset), None)
        } else {
            (
                chunk,
                SelectionItem::Range {
                    start: lo - chunk_offset,
                    stop: hi - chunk_offset,
                },
                Some(SelectionItem::Range {
                    start: lo - self.sel_start,
                    stop: hi - self.sel_start,
                }),
            )
        }
    }

    fn out_len(&self) -> Option<u64> {
        if self.drop_axis {
            None
        } else {
            Some(self.sel_stop - self.sel_start)
        }
    }
}

/// Maps a selection on an array shape to the chunks it intersects.
///
/// Yields one [ChunkProjection] per intersected chunk; the out-selections
/// are non-overlapping and collectively cover `0..n` on every output
/// dimension. Iteration is restartable via [BasicIndexer::iter].
#[derive(Clone, Debug)]
pub struct BasicIndexer {
    dims: CoordVec<DimIndexer>,
    shape: GridCoord,
}

impl BasicIndexer {
    pub fn new(
        selection: &Selection,
        shape: &[u64],
        chunk_shape: &[u64],
    ) -> Result<Self, IndexerError> {
        if selection.0.len() != shape.len() || chunk_shape.len() != shape.len() {
            return Err(IndexerError::DimensionMismatch {
                expected: shape.len(),
                got: selection.0.len(),
            });
        }
        let dims = selection
            .0
            .iter()
            .zip(shape.iter().zip(chunk_shape.iter()))
            .enumerate()
            .map(|(dim, (item, (extent, chunk_size)))| {
                DimIndexer::new(*item, *extent, *chunk_size, dim)
            })
            .collect::<Result<CoordVec<_>, _>>()?;
        let shape = dims.iter().filter_map(DimIndexer::out_len).collect();
        Ok(Self { dims, shape })
    }

    /// Shape of the output buffer the caller must allocate.
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Number of chunk projections this indexer yields.
    pub fn num_chunks(&self) -> u64 {
        self.dims.iter().map(|d| d.nchunks).product()
    }

    pub fn iter(&self) -> ChunkProjections<'_> {
        ChunkProjections {
            indexer: self,
            next_idx: 0,
            total: self.num_chunks(),
        }
    }
}

impl<'a> IntoIterator for &'a BasicIndexer {
    type Item = ChunkProjection;
    type IntoIter = ChunkProjections<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct ChunkProjections<'a> {
    indexer: &'a BasicIndexer,
    next_idx: u64,
    total: u64,
}

impl Iterator for ChunkProjections<'_> {
    type Item = ChunkProjection;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_idx >= self.total {
            return None;
        }
        // decode the flat index into a per-dimension chunk counter, last
        // dimension varying fastest
        let dims = &self.indexer.dims;
        let mut rem = self.next_idx;
        self.next_idx += 1;

        let mut counters: CoordVec<u64> = dims.iter().map(|_| 0).collect();
        for (counter, dim) in counters.iter_mut().zip(dims.iter()).rev() {
            *counter = rem % dim.nchunks;
            rem /= dim.nchunks;
        }

        let mut chunk_coords = GridCoord::with_capacity(dims.len());
        let mut chunk_selection = CoordVec::with_capacity(dims.len());
        let mut out_selection = CoordVec::with_capacity(dims.len());
        for (counter, dim) in counters.iter().zip(dims.iter()) {
            let (coord, chunk_item, out_item) = dim.project(*counter);
            chunk_coords.push(coord);
            chunk_selection.push(chunk_item);
            if let Some(it) = out_item {
                out_selection.push(it);
            }
        }

        Some(ChunkProjection {
            chunk_coords,
            chunk_selection: SliceSelection(chunk_selection),
            out_selection: SliceSelection(out_selection),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.total - self.next_idx) as usize;
        (left, Some(left))
    }
}

pub(crate) fn ceil_div(a: u64, b: u64) -> u64 {
    (a + b - 1) / b
}

/// Every chunk coordinate on the grid of `shape` chunked by `chunk_shape`.
///
/// A zero-dimensional array yields the single empty coordinate.
pub fn all_chunk_coords(shape: &[u64], chunk_shape: &[u64]) -> AllChunkCoords {
    let counts: GridCoord = shape
        .iter()
        .zip(chunk_shape.iter())
        .map(|(s, c)| ceil_div(*s, *c))
        .collect();
    let total = counts.iter().product();
    AllChunkCoords {
        counts,
        next_idx: 0,
        total,
    }
}

pub struct AllChunkCoords {
    counts: GridCoord,
    next_idx: u64,
    total: u64,
}

impl Iterator for AllChunkCoords {
    type Item = GridCoord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_idx >= self.total {
            return None;
        }
        let mut rem = self.next_idx;
        self.next_idx += 1;

        let mut coord: GridCoord = self.counts.iter().map(|_| 0).collect();
        for (c, n) in coord.iter_mut().zip(self.counts.iter()).rev() {
            *c = rem % n;
            rem /= n;
        }
        Some(coord)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.total - self.next_idx) as usize;
        (left, Some(left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn range(start: u64, stop: u64) -> SelectionItem {
        SelectionItem::Range { start, stop }
    }

    #[test]
    fn full_selection_aligned() {
        let sel = Selection::full(&[4, 4]);
        let idx = BasicIndexer::new(&sel, &[4, 4], &[2, 2]).unwrap();
        assert_eq!(idx.shape(), &[4, 4]);
        assert_eq!(idx.num_chunks(), 4);

        let projections: Vec<_> = idx.iter().collect();
        assert_eq!(projections.len(), 4);
        let coords: Vec<_> = projections.iter().map(|p| p.chunk_coords.clone()).collect();
        let expected: Vec<GridCoord> = vec![
            smallvec![0, 0],
            smallvec![0, 1],
            smallvec![1, 0],
            smallvec![1, 1],
        ];
        assert_eq!(coords, expected);
        for p in &projections {
            assert!(is_total_slice(&p.chunk_selection, &[2, 2]));
            assert_eq!(p.out_selection.shape().as_slice(), &[2, 2]);
        }
    }

    #[test]
    fn offcenter_selection() {
        // 2x2 centre of a 4x4 array with 2x2 chunks touches all four chunks
        let sel = Selection::from([1..3, 1..3]);
        let idx = BasicIndexer::new(&sel, &[4, 4], &[2, 2]).unwrap();
        assert_eq!(idx.shape(), &[2, 2]);

        let projections: Vec<_> = idx.iter().collect();
        assert_eq!(projections.len(), 4);
        for p in &projections {
            assert!(!is_total_slice(&p.chunk_selection, &[2, 2]));
            assert_eq!(p.chunk_selection.shape().as_slice(), &[1, 1]);
        }
        // projections cover the output exactly once
        let mut seen = [[false; 2]; 2];
        for p in &projections {
            let (r, c) = match (p.out_selection.0[0], p.out_selection.0[1]) {
                (SelectionItem::Range { start: r, .. }, SelectionItem::Range { start: c, .. }) => {
                    (r as usize, c as usize)
                }
                _ => panic!("out selection must be ranges"),
            };
            assert!(!seen[r][c], "out selection overlap at ({r}, {c})");
            seen[r][c] = true;
        }
        assert!(seen.iter().flatten().all(|s| *s));
    }

    #[test]
    fn selection_coverage_properties() {
        // union of out selections equals the selection extent, without overlap
        for (shape, chunk_shape, sel) in [
            (vec![5u64], vec![2u64], Selection::from([0..5])),
            (vec![5], vec![2], Selection::from([1..4])),
            (vec![10], vec![3], Selection::from([2..9])),
            (vec![6, 4], vec![4, 3], Selection::from([1..6, 0..4])),
        ] {
            let idx = BasicIndexer::new(&sel, &shape, &chunk_shape).unwrap();
            let out_len: u64 = idx.shape().iter().product();
            let mut covered = vec![false; out_len as usize];
            for p in idx.iter() {
                // every chunk selection is non-empty and in-bounds
                for (item, extent) in p.chunk_selection.0.iter().zip(chunk_shape.iter()) {
                    match item {
                        SelectionItem::Index(i) => assert!(i < extent),
                        SelectionItem::Range { start, stop } => {
                            assert!(start < stop && stop <= extent)
                        }
                    }
                }
                assert_eq!(p.chunk_selection.shape(), p.out_selection.shape());
                // mark flat output coverage
                let mut offsets = vec![0u64];
                let mut dim_stride = 1u64;
                for (item, n) in p
                    .out_selection
                    .0
                    .iter()
                    .zip(idx.shape().iter())
                    .rev()
                {
                    let (start, stop) = match item {
                        SelectionItem::Range { start, stop } => (*start, *stop),
                        SelectionItem::Index(_) => unreachable!(),
                    };
                    offsets = (start..stop)
                        .flat_map(|i| offsets.iter().map(move |o| o + i * dim_stride))
                        .collect();
                    dim_stride *= n;
                }
                for o in offsets {
                    assert!(!covered[o as usize], "overlapping out selection");
                    covered[o as usize] = true;
                }
            }
            assert!(covered.iter().all(|c| *c), "selection not covered");
        }
    }

    #[test]
    fn integer_index_drops_axis() {
        let sel = Selection::from([
            SelectionItem::Range { start: 0, stop: 5 },
            SelectionItem::Index(3),
        ]);
        let idx = BasicIndexer::new(&sel, &[5, 4], &[2, 2]).unwrap();
        assert_eq!(idx.shape(), &[5]);
        for p in idx.iter() {
            assert_eq!(p.chunk_selection.0.len(), 2);
            assert_eq!(p.out_selection.0.len(), 1);
            assert!(matches!(p.chunk_selection.0[1], SelectionItem::Index(1)));
            assert_eq!(p.chunk_coords[1], 1);
        }
    }

    #[test]
    fn scalar_array_has_one_projection() {
        let sel = Selection::default();
        let idx = BasicIndexer::new(&sel, &[], &[]).unwrap();
        assert_eq!(idx.shape(), &[] as &[u64]);
        let projections: Vec<_> = idx.iter().collect();
        assert_eq!(projections.len(), 1);
        assert!(projections[0].chunk_coords.is_empty());
    }

    #[test]
    fn empty_range_yields_nothing() {
        let sel = Selection::from([2..2]);
        let idx = BasicIndexer::new(&sel, &[4], &[2]).unwrap();
        assert_eq!(idx.shape(), &[0]);
        assert_eq!(idx.iter().count(), 0);
    }

    #[test]
    fn arity_mismatch_rejected() {
        let sel = Selection::from([0..4]);
        assert_eq!(
            BasicIndexer::new(&sel, &[4, 4], &[2, 2]).unwrap_err(),
            IndexerError::DimensionMismatch {
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn bounds_rejected() {
        let idx = BasicIndexer::new(&Selection::from([0..5]), &[4], &[2]);
        assert!(matches!(
            idx,
            Err(IndexerError::RangeOutOfBounds { stop: 5, .. })
        ));
        let idx = BasicIndexer::new(&Selection::from([4u64]), &[4], &[2]);
        assert!(matches!(
            idx,
            Err(IndexerError::IndexOutOfBounds { index: 4, .. })
        ));
    }

    #[test]
    fn total_slice_predicate() {
        let total = SliceSelection(smallvec![range(0, 2), range(0, 3)]);
        assert!(is_total_slice(&total, &[2, 3]));
        let partial = SliceSelection(smallvec![range(0, 2), range(0, 2)]);
        assert!(!is_total_slice(&partial, &[2, 3]));
        let indexed = SliceSelection(smallvec![SelectionItem::Index(0), range(0, 3)]);
        assert!(!is_total_slice(&indexed, &[1, 3]));
    }

    #[test]
    fn all_chunk_coords_counts() {
        let coords: Vec<_> = all_chunk_coords(&[5, 4], &[2, 2]).collect();
        assert_eq!(coords.len(), 6);
        assert_eq!(coords[0].as_slice(), &[0, 0]);
        assert_eq!(coords[5].as_slice(), &[2, 1]);

        let scalar: Vec<_> = all_chunk_coords(&[], &[]).collect();
        assert_eq!(scalar.len(), 1);
        assert!(scalar[0].is_empty());
    }
}
