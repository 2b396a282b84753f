//! Observation batches.
use crate::error::PursuitError;
use anyhow::Result;

/// Number of elements of an item with the given shape.
pub fn numel(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// A batch of observations.
///
/// An observation is a fixed-arity tuple of numeric arrays, called channels.
/// Each channel is stored as a flat `f32` vector of shape `[len, shapes[c]..]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObsBatch {
    shapes: Vec<Vec<usize>>,
    data: Vec<Vec<f32>>,
    len: usize,
}

impl ObsBatch {
    /// Creates a zero-filled batch of `len` items.
    pub fn zeros(shapes: &[Vec<usize>], len: usize) -> Self {
        Self {
            shapes: shapes.to_vec(),
            data: shapes.iter().map(|s| vec![0f32; len * numel(s)]).collect(),
            len,
        }
    }

    /// Creates a batch from flat channel data.
    ///
    /// The batch size is inferred from the first channel. Every channel must
    /// hold the same number of items.
    pub fn from_channels(shapes: &[Vec<usize>], data: Vec<Vec<f32>>) -> Result<Self> {
        if shapes.len() != data.len() {
            return Err(PursuitError::ShapeMismatch {
                what: "number of observation channels".to_string(),
                expected: shapes.len(),
                got: data.len(),
            }
            .into());
        }

        let len = match (shapes.first(), data.first()) {
            (Some(s), Some(d)) if numel(s) > 0 => d.len() / numel(s),
            _ => 0,
        };

        for (c, (s, d)) in shapes.iter().zip(data.iter()).enumerate() {
            if d.len() != len * numel(s) {
                return Err(PursuitError::ShapeMismatch {
                    what: format!("observation channel {}", c),
                    expected: len * numel(s),
                    got: d.len(),
                }
                .into());
            }
        }

        Ok(Self {
            shapes: shapes.to_vec(),
            data,
            len,
        })
    }

    /// Number of items in the batch.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the batch has no items.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Per-item shapes of the channels.
    pub fn shapes(&self) -> &[Vec<usize>] {
        &self.shapes
    }

    /// Number of channels.
    pub fn n_channels(&self) -> usize {
        self.shapes.len()
    }

    /// Flat data of channel `c`.
    pub fn channel(&self, c: usize) -> &[f32] {
        &self.data[c]
    }

    /// Consumes the batch and returns the flat channel data.
    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.data
    }

    /// Checks that `self` has the given per-item shapes and `len` items.
    pub fn check(&self, shapes: &[Vec<usize>], len: usize) -> Result<()> {
        if self.shapes.as_slice() != shapes {
            return Err(PursuitError::ShapeMismatch {
                what: format!("observation shapes {:?} (expected {:?})", self.shapes, shapes),
                expected: shapes.iter().map(|s| numel(s)).sum(),
                got: self.shapes.iter().map(|s| numel(s)).sum(),
            }
            .into());
        }
        if self.len != len {
            return Err(PursuitError::ShapeMismatch {
                what: "observation batch size".to_string(),
                expected: len,
                got: self.len,
            }
            .into());
        }
        Ok(())
    }

    /// Copies all items of `src` into `self`, starting at item `ix`.
    pub fn write(&mut self, ix: usize, src: &ObsBatch) {
        debug_assert_eq!(self.shapes, src.shapes);
        debug_assert!(ix + src.len <= self.len);
        for (c, s) in self.shapes.iter().enumerate() {
            let n = numel(s);
            self.data[c][ix * n..(ix + src.len) * n].copy_from_slice(&src.data[c]);
        }
    }

    /// Gathers the items at `ixs` into a new batch.
    pub fn sample(&self, ixs: &[usize]) -> Self {
        let data = self
            .shapes
            .iter()
            .enumerate()
            .map(|(c, s)| {
                let n = numel(s);
                let mut v = Vec::with_capacity(ixs.len() * n);
                for &ix in ixs {
                    v.extend_from_slice(&self.data[c][ix * n..(ix + 1) * n]);
                }
                v
            })
            .collect();

        Self {
            shapes: self.shapes.clone(),
            data,
            len: ixs.len(),
        }
    }

    /// Returns the items in the range `[start, start + len)`.
    pub fn slice(&self, start: usize, len: usize) -> Self {
        let ixs = (start..start + len).collect::<Vec<_>>();
        self.sample(&ixs)
    }

    /// Pairs this batch with `other` item by item.
    ///
    /// The result has the channels of `self` followed by the channels of
    /// `other`. Both batches must have the same number of items.
    pub fn pair(&self, other: &ObsBatch) -> Result<Self> {
        if self.len != other.len {
            return Err(PursuitError::ShapeMismatch {
                what: "paired observation batch size".to_string(),
                expected: self.len,
                got: other.len,
            }
            .into());
        }

        Ok(self.concat_channels(other))
    }

    /// Like [`ObsBatch::pair`], for batches known to have the same length.
    pub(crate) fn concat_channels(&self, other: &ObsBatch) -> Self {
        debug_assert_eq!(self.len, other.len);
        let mut shapes = self.shapes.clone();
        shapes.extend(other.shapes.iter().cloned());
        let mut data = self.data.clone();
        data.extend(other.data.iter().cloned());

        Self {
            shapes,
            data,
            len: self.len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shapes() -> Vec<Vec<usize>> {
        vec![vec![2], vec![2, 2]]
    }

    #[test]
    fn test_from_channels_infers_len() -> Result<()> {
        let obs = ObsBatch::from_channels(
            &shapes(),
            vec![vec![0., 1., 2., 3., 4., 5.], vec![0.; 12]],
        )?;
        assert_eq!(obs.len(), 3);
        assert_eq!(obs.n_channels(), 2);
        Ok(())
    }

    #[test]
    fn test_from_channels_rejects_ragged() {
        let err = ObsBatch::from_channels(&shapes(), vec![vec![0.; 4], vec![0.; 12]]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PursuitError>(),
            Some(PursuitError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_write_sample_and_pair() -> Result<()> {
        let mut buf = ObsBatch::zeros(&shapes(), 4);
        let src = ObsBatch::from_channels(
            &shapes(),
            vec![vec![1., 2., 3., 4.], vec![1., 1., 1., 1., 2., 2., 2., 2.]],
        )?;
        buf.write(2, &src);
        let s = buf.sample(&[3, 0]);
        assert_eq!(s.channel(0), &[3., 4., 0., 0.]);
        assert_eq!(s.channel(1), &[2., 2., 2., 2., 0., 0., 0., 0.]);

        let p = s.pair(&buf.slice(2, 2))?;
        assert_eq!(p.n_channels(), 4);
        assert_eq!(p.shapes()[2], vec![2]);
        assert_eq!(p.channel(2), &[1., 2., 3., 4.]);
        Ok(())
    }
}
