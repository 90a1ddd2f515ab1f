use candle_core::Tensor;

use crate::errors::InferenceError;

#[cfg(feature = "onnx")]
pub mod onnx;

/// A pretrained epitope classifier.
///
/// `forward` receives `int64` token ids of shape `[batch, target_length]` and
/// returns raw logits with one value per row (`[batch]` or `[batch, 1]`).
/// Implementations are loaded once and only read afterwards.
pub trait PeptideClassifier: Send + Sync {
    fn forward(&self, input_ids: &Tensor) -> Result<Tensor, InferenceError>;
}
