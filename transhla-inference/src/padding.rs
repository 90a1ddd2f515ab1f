use candle_core::{Device, Tensor};

use crate::errors::InferenceError;

/// Right-pads every sequence shorter than `target_length` with `pad_token_id`.
///
/// Sequences already at or above `target_length` are left untouched: nothing
/// is ever truncated. An oversized row makes the batch ragged, which
/// [`PaddedBatch::try_from_rows`] then rejects.
pub fn pad_sequences(
    mut sequences: Vec<Vec<u32>>,
    target_length: usize,
    pad_token_id: u32,
) -> Vec<Vec<u32>> {
    for sequence in sequences.iter_mut() {
        if sequence.len() < target_length {
            sequence.resize(target_length, pad_token_id);
        }
    }
    sequences
}

/// A rectangular batch of token ids, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaddedBatch {
    data: Vec<u32>,
    rows: usize,
    columns: usize,
}

impl PaddedBatch {
    /// Flattens padded rows into a batch, checking every row has the same width.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::RaggedBatch`] naming the first row whose width
    /// differs from the first row's.
    pub fn try_from_rows(rows: Vec<Vec<u32>>) -> Result<Self, InferenceError> {
        let columns = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * columns);
        for (row, tokens) in rows.iter().enumerate() {
            if tokens.len() != columns {
                return Err(InferenceError::RaggedBatch {
                    row,
                    expected: columns,
                    actual: tokens.len(),
                });
            }
            data.extend_from_slice(tokens);
        }
        Ok(Self {
            data,
            rows: rows.len(),
            columns,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Builds an `i64` tensor of shape `[rows, columns]` on `device`.
    ///
    /// Exported classifiers take `int64` token ids, as the upstream models do.
    pub fn to_tensor(&self, device: &Device) -> Result<Tensor, InferenceError> {
        let ids = self.data.iter().map(|&id| i64::from(id)).collect::<Vec<_>>();
        Ok(Tensor::from_vec(ids, (self.rows, self.columns), device)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hla::PAD_TOKEN_ID;

    #[test]
    fn test_pads_short_sequences() {
        let padded = pad_sequences(vec![vec![0, 5, 2], vec![0, 5, 5, 5, 2]], 6, PAD_TOKEN_ID);
        assert_eq!(padded, vec![vec![0, 5, 2, 1, 1, 1], vec![0, 5, 5, 5, 2, 1]]);
    }

    #[test]
    fn test_padding_at_target_length_is_noop() {
        let sequences = vec![vec![0, 4, 4, 2]];
        let once = pad_sequences(sequences.clone(), 4, PAD_TOKEN_ID);
        assert_eq!(once, sequences);
        assert_eq!(pad_sequences(once.clone(), 4, PAD_TOKEN_ID), once);
    }

    #[test]
    fn test_never_truncates() {
        let long = vec![0, 7, 7, 7, 7, 7, 2];
        let padded = pad_sequences(vec![long.clone(), vec![0, 2]], 4, PAD_TOKEN_ID);
        assert_eq!(padded[0], long);
        assert_eq!(padded[1], vec![0, 2, 1, 1]);
    }

    #[test]
    fn test_batch_rejects_ragged_rows() {
        let err = PaddedBatch::try_from_rows(vec![vec![1, 2, 3], vec![1, 2, 3, 4]]).unwrap_err();
        match err {
            InferenceError::RaggedBatch {
                row,
                expected,
                actual,
            } => {
                assert_eq!((row, expected, actual), (1, 3, 4));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_batch_to_tensor() {
        let batch = PaddedBatch::try_from_rows(vec![vec![0, 5, 2], vec![0, 6, 2]]).unwrap();
        assert_eq!((batch.rows(), batch.columns()), (2, 3));

        let tensor = batch.to_tensor(&Device::Cpu).unwrap();
        assert_eq!(tensor.dims(), &[2, 3]);
        assert_eq!(
            tensor.to_vec2::<i64>().unwrap(),
            vec![vec![0, 5, 2], vec![0, 6, 2]]
        );
    }

    #[test]
    fn test_empty_batch() {
        let batch = PaddedBatch::try_from_rows(vec![]).unwrap();
        assert_eq!((batch.rows(), batch.columns()), (0, 0));
    }
}
