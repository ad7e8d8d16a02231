use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::codecs::{ArraySpec, CodecError};
use crate::data_type::ReflectedType;
use crate::{ArcArrayD, CoordVec, MaybeNdim};

use super::AACodec;

/// Axis order of the encoded chunk: `"C"`, `"F"`, or an explicit
/// permutation of dimension indices.
#[derive(Debug, Clone, PartialEq)]
pub enum Order {
    C,
    F,
    Permutation(CoordVec<usize>),
}

impl Serialize for Order {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Order::C => serializer.serialize_str("C"),
            Order::F => serializer.serialize_str("F"),
            Order::Permutation(p) => p.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Order {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct OrderVisitor;

        impl<'de> serde::de::Visitor<'de> for OrderVisitor {
            type Value = Order;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("\"C\", \"F\", or a permutation of dimension indices")
            }

            fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<Self::Value, E> {
                match value {
                    "C" => Ok(Order::C),
                    "F" => Ok(Order::F),
                    other => Err(E::invalid_value(serde::de::Unexpected::Str(other), &self)),
                }
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut permutation = CoordVec::new();
                while let Some(idx) = seq.next_element()? {
                    permutation.push(idx);
                }
                Ok(Order::Permutation(permutation))
            }
        }

        deserializer.deserialize_any(OrderVisitor)
    }
}

impl Order {
    /// Checks that order is a valid permutation,
    /// and simplifies to C or F if possible.
    pub fn validate(self) -> Result<Self, &'static str> {
        let permutation = match self {
            Order::C => return Ok(self),
            Order::F => return Ok(self),
            Order::Permutation(p) => p,
        };
        check_permutation(&permutation)?;

        let is_increasing = permutation.windows(2).all(|w| w[0] < w[1]);
        let is_decreasing = permutation.windows(2).all(|w| w[0] > w[1]);

        if is_increasing {
            Ok(Self::C)
        } else if is_decreasing {
            Ok(Self::F)
        } else {
            Ok(Self::Permutation(permutation))
        }
    }

    pub fn new_permutation(permutation: CoordVec<usize>) -> Result<Self, &'static str> {
        Self::Permutation(permutation).validate()
    }
}

fn check_permutation(p: &[usize]) -> Result<(), &'static str> {
    if p.is_empty() {
        return Err("Empty permutation");
    }
    let mut visited = HashSet::with_capacity(p.len());
    for idx in p.iter() {
        if !visited.insert(*idx) {
            return Err("Repeated dimension index");
        }
        if *idx >= p.len() {
            return Err("Skipped dimension index");
        }
    }
    Ok(())
}

impl Default for Order {
    fn default() -> Self {
        Self::C
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TransposeCodec {
    pub order: Order,
}

impl TransposeCodec {
    pub fn new_c() -> Self {
        Self { order: Order::C }
    }

    pub fn new_f() -> Self {
        Self { order: Order::F }
    }

    pub fn new_permutation(perm: CoordVec<usize>) -> Result<Self, &'static str> {
        Ok(Self {
            order: Order::new_permutation(perm)?,
        })
    }

    fn checked_permutation(&self, ndim: usize) -> Result<Option<&[usize]>, CodecError> {
        match &self.order {
            Order::C | Order::F => Ok(None),
            Order::Permutation(p) => {
                if p.len() != ndim {
                    return Err(CodecError::Configuration(format!(
                        "transpose order has {} axes, array has {}",
                        p.len(),
                        ndim
                    )));
                }
                check_permutation(p)
                    .map_err(|e| CodecError::Configuration(e.to_string()))?;
                Ok(Some(p.as_slice()))
            }
        }
    }
}

impl AACodec for TransposeCodec {
    fn encode<T: ReflectedType>(
        &self,
        decoded: ArcArrayD<T>,
        _spec: &ArraySpec<T>,
    ) -> Result<ArcArrayD<T>, CodecError> {
        let perm = self.checked_permutation(decoded.ndim())?;
        Ok(match &self.order {
            Order::C => decoded,
            Order::F => decoded.reversed_axes(),
            Order::Permutation(_) => {
                decoded.permuted_axes(perm.expect("permutation order checked"))
            }
        })
    }

    fn decode<T: ReflectedType>(
        &self,
        encoded: ArcArrayD<T>,
        _spec: &ArraySpec<T>,
    ) -> Result<ArcArrayD<T>, CodecError> {
        let perm = self.checked_permutation(encoded.ndim())?;
        Ok(match &self.order {
            Order::C => encoded,
            Order::F => encoded.reversed_axes(),
            Order::Permutation(_) => encoded.permuted_axes(
                reverse_permutation(perm.expect("permutation order checked")).as_slice(),
            ),
        })
    }

    fn resolve_spec<T: ReflectedType>(
        &self,
        spec: &ArraySpec<T>,
    ) -> Result<ArraySpec<T>, CodecError> {
        let shape = match &self.order {
            Order::C => spec.shape.clone(),
            Order::F => spec.shape.iter().rev().cloned().collect(),
            Order::Permutation(_) => {
                let perm = self
                    .checked_permutation(spec.shape.len())?
                    .expect("permutation order checked");
                perm.iter().map(|idx| spec.shape[*idx]).collect()
            }
        };
        Ok(ArraySpec {
            shape,
            fill_value: spec.fill_value,
            order: spec.order,
        })
    }
}

fn reverse_permutation(p: &[usize]) -> CoordVec<usize> {
    let mut pos_idx: HashMap<_, _> = p.iter().enumerate().map(|(idx, pos)| (*pos, idx)).collect();
    (0..pos_idx.len())
        .map(|pos| pos_idx.remove(&pos).expect("valid permutation"))
        .collect()
}

impl MaybeNdim for Order {
    fn maybe_ndim(&self) -> Option<usize> {
        match self {
            Self::Permutation(p) => Some(p.len()),
            _ => None,
        }
    }

    fn validate_ndim(&self) -> Result<(), &'static str> {
        match self {
            Self::Permutation(p) => check_permutation(p),
            _ => Ok(()),
        }
    }
}

impl MaybeNdim for TransposeCodec {
    fn maybe_ndim(&self) -> Option<usize> {
        self.order.maybe_ndim()
    }

    fn validate_ndim(&self) -> Result<(), &'static str> {
        self.order.validate_ndim()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::MemoryOrder;
    use smallvec::smallvec;

    const SHAPE: [usize; 3] = [3, 4, 5];

    fn spec() -> ArraySpec<u8> {
        ArraySpec::new(smallvec![3, 4, 5], 0, MemoryOrder::C)
    }

    #[test]
    fn roundtrip_order() {
        let to_deser = vec![r#""C""#, r#""F""#, r#"[0,1,2]"#];
        for s in to_deser.into_iter() {
            let c: Order = serde_json::from_str(s).unwrap_or_else(|_| panic!("could not deser {s}"));
            let s2 = serde_json::to_string(&c).unwrap_or_else(|_| panic!("could not ser {c:?}"));
            assert_eq!(s, &s2);
        }
    }

    #[test]
    fn order_validation() {
        assert!(Order::new_permutation(smallvec![0, 0, 2]).is_err());
        assert!(Order::new_permutation(smallvec![0, 3, 1]).is_err());
        // sorted permutations simplify
        assert_eq!(Order::new_permutation(smallvec![0, 1, 2]).unwrap(), Order::C);
        assert_eq!(Order::new_permutation(smallvec![2, 1, 0]).unwrap(), Order::F);
    }

    fn make_arr() -> ArcArrayD<u8> {
        ArcArrayD::from_shape_vec(SHAPE.to_vec(), (0..60).collect()).unwrap()
    }

    #[test]
    fn transpose_c_is_noop() {
        let orig = make_arr();
        let t = TransposeCodec::new_c();
        let encoded = t.encode(orig.clone(), &spec()).unwrap();
        assert_eq!(encoded.shape(), orig.shape());
        let decoded = t.decode(encoded, &spec()).unwrap();
        assert_eq!(decoded, orig);
    }

    #[test]
    fn transpose_f() {
        let orig = make_arr();
        let t = TransposeCodec::new_f();
        let encoded = t.encode(orig.clone(), &spec()).unwrap();

        let mut rev_shape = orig.shape().to_vec();
        rev_shape.reverse();
        assert_eq!(encoded.shape(), rev_shape.as_slice());

        let decoded = t.decode(encoded, &spec()).unwrap();
        assert_eq!(decoded, orig);
    }

    #[test]
    fn transpose_permutation() {
        let orig = make_arr();
        let perm: CoordVec<usize> = smallvec![2, 0, 1];
        let t = TransposeCodec::new_permutation(perm.clone()).unwrap();

        let encoded = t.encode(orig.clone(), &spec()).unwrap();
        let expected_shape: Vec<_> = perm.iter().map(|idx| SHAPE[*idx]).collect();
        assert_eq!(encoded.shape(), expected_shape.as_slice());

        let decoded = t.decode(encoded, &spec()).unwrap();
        assert_eq!(decoded, orig);
    }

    #[test]
    fn resolve_spec_permutes_shape() {
        let t = TransposeCodec::new_permutation(smallvec![2, 0, 1]).unwrap();
        let resolved = t.resolve_spec(&spec()).unwrap();
        assert_eq!(resolved.shape.as_slice(), &[5, 3, 4]);

        let t = TransposeCodec::new_f();
        let resolved = t.resolve_spec(&spec()).unwrap();
        assert_eq!(resolved.shape.as_slice(), &[5, 4, 3]);
    }

    #[test]
    fn mismatched_permutation_rejected() {
        let t = TransposeCodec {
            order: Order::Permutation(smallvec![1, 0]),
        };
        assert!(t.encode(make_arr(), &spec()).is_err());
    }
}
