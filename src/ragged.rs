//! Ragged batched sequences.
//!
//! Trajectories of different lengths are stored in dense arrays whose last
//! axis has a fixed capacity; each binary carries the number of leading
//! samples that are meaningful. Every consumer slices or masks through
//! [`ValidLengths`] rather than trusting the array extent.

use numr::runtime::Runtime;
use numr::tensor::Tensor;

use crate::error::{WaveformError, WaveformResult};

/// Per-binary valid-sample counts for a fixed-capacity sample axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidLengths {
    counts: Vec<usize>,
    capacity: usize,
}

impl ValidLengths {
    /// Wrap kernel counts, enforcing `count <= capacity` for every binary.
    pub fn new(counts: Vec<usize>, capacity: usize) -> WaveformResult<Self> {
        if counts.is_empty() {
            return Err(WaveformError::invalid_input("ValidLengths::new: no counts"));
        }
        if let Some((index, &count)) = counts.iter().enumerate().find(|(_, c)| **c > capacity) {
            return Err(WaveformError::RaggedInvariant {
                index,
                count,
                capacity,
            });
        }
        Ok(Self { counts, capacity })
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Allocated samples per binary.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn batch_size(&self) -> usize {
        self.counts.len()
    }

    pub fn get(&self, index: usize) -> usize {
        self.counts[index]
    }

    /// Longest valid sequence in the batch; the extent of every truncated array.
    pub fn max_len(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Whether binary `index` filled its whole allocation.
    pub fn is_saturated(&self, index: usize) -> bool {
        self.counts[index] == self.capacity
    }

    /// Indices of binaries whose count reached the capacity.
    ///
    /// A binary that reaches its stopping radius on exactly the last
    /// allocated sample is listed here too. Use the integrator's stop
    /// reasons to tell the two apart.
    pub fn saturated(&self) -> Vec<usize> {
        (0..self.counts.len())
            .filter(|&i| self.is_saturated(i))
            .collect()
    }

    /// Counts as `i32`, matching the layout expected by downstream consumers.
    pub fn to_i32(&self) -> Vec<i32> {
        self.counts.iter().map(|&c| c as i32).collect()
    }

    /// Row-major `[batch, max_len]` mask, `true` where a sample is valid.
    pub fn valid_mask(&self) -> Vec<bool> {
        let len = self.max_len();
        let mut mask = Vec::with_capacity(self.counts.len() * len);
        for &count in &self.counts {
            mask.extend((0..len).map(|j| j < count));
        }
        mask
    }

    /// Slice the last axis of a batched tensor to [`max_len`](Self::max_len).
    ///
    /// The leading axis must be the batch axis and the last axis must be at
    /// least `max_len` long. Applying it to an already truncated tensor is a
    /// no-op copy.
    pub fn truncate<R: Runtime>(&self, tensor: &Tensor<R>) -> WaveformResult<Tensor<R>> {
        let shape = tensor.shape();
        if shape.len() < 2 || shape[0] != self.counts.len() {
            return Err(WaveformError::invalid_input(format!(
                "ValidLengths::truncate: expected [{}, ..., samples], got {:?}",
                self.counts.len(),
                shape
            )));
        }

        let samples = shape[shape.len() - 1];
        let len = self.max_len();
        if samples < len {
            return Err(WaveformError::invalid_input(format!(
                "ValidLengths::truncate: sample axis {} shorter than max valid length {}",
                samples, len
            )));
        }

        Ok(tensor.narrow(-1, 0, len)?.contiguous())
    }

    /// Check that a tensor has already been truncated to the batch maximum.
    pub fn check_truncated<R: Runtime>(&self, tensor: &Tensor<R>, what: &str) -> WaveformResult<()> {
        let shape = tensor.shape();
        let samples = shape.last().copied().unwrap_or(0);
        if shape.first() != Some(&self.counts.len()) || samples != self.max_len() {
            return Err(WaveformError::invalid_input(format!(
                "{}: shape {:?} does not match batch {} with max valid length {}",
                what,
                shape,
                self.counts.len(),
                self.max_len()
            )));
        }
        Ok(())
    }
}
