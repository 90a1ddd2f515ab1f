use candle_core::{DType, Device, Tensor};
use tracing::{debug, instrument};

use crate::{
    encoder::SequenceEncoder,
    errors::InferenceError,
    hla::{HlaClass, EPITOPE_THRESHOLD, PAD_TOKEN_ID},
    models::PeptideClassifier,
    padding::{pad_sequences, PaddedBatch},
};

/// Score of one peptide, in request order.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub peptide: String,
    pub probability: f32,
    pub is_epitope: bool,
}

impl Prediction {
    fn new(peptide: String, probability: f32) -> Self {
        Self {
            peptide,
            probability,
            is_epitope: probability >= EPITOPE_THRESHOLD,
        }
    }
}

/// Scores peptides with the classifier of their HLA class.
///
/// Built once at startup and shared read-only between requests. Calls are
/// synchronous and may take a while on CPU, so async callers should run them
/// on a blocking thread.
pub struct EpitopePredictor {
    encoder: Box<dyn SequenceEncoder>,
    class_i: Box<dyn PeptideClassifier>,
    class_ii: Box<dyn PeptideClassifier>,
    device: Device,
}

impl EpitopePredictor {
    pub fn new(
        encoder: Box<dyn SequenceEncoder>,
        class_i: Box<dyn PeptideClassifier>,
        class_ii: Box<dyn PeptideClassifier>,
        device: Device,
    ) -> Self {
        Self {
            encoder,
            class_i,
            class_ii,
            device,
        }
    }

    fn classifier(&self, class: HlaClass) -> &dyn PeptideClassifier {
        match class {
            HlaClass::I => self.class_i.as_ref(),
            HlaClass::II => self.class_ii.as_ref(),
        }
    }

    /// Encodes, pads and scores `sequences` as a single batch.
    ///
    /// Sequences are expected to have passed
    /// [`validate_lengths`](crate::validation::validate_lengths) for `class`.
    /// The result has one entry per input, in input order. Candle only records
    /// gradients for `Var`s, so the forward pass builds no backward graph.
    ///
    /// # Errors
    ///
    /// Any failure while encoding, building the batch, running the model or
    /// reading its output is returned as an [`InferenceError`]; no partial
    /// result is produced.
    #[instrument(
        level = "info",
        skip_all,
        fields(hla_class = %class, num_sequences = sequences.len())
    )]
    pub fn predict(
        &self,
        sequences: &[String],
        class: HlaClass,
    ) -> Result<Vec<Prediction>, InferenceError> {
        if sequences.is_empty() {
            return Ok(Vec::new());
        }
        let params = class.params();

        let encoded = self.encoder.encode_batch(sequences)?;
        let padded = pad_sequences(encoded, params.target_length, PAD_TOKEN_ID);
        let batch = PaddedBatch::try_from_rows(padded)?;
        debug!(rows = batch.rows(), columns = batch.columns(), "Built padded batch");

        let input_ids = batch.to_tensor(&self.device)?;
        let logits = self.classifier(class).forward(&input_ids)?;
        let probabilities = sigmoid_probabilities(&logits, batch.rows())?;

        Ok(sequences
            .iter()
            .zip(probabilities)
            .map(|(peptide, probability)| Prediction::new(peptide.clone(), probability))
            .collect())
    }
}

/// Applies a sigmoid to per-row logits and copies them back to the host.
fn sigmoid_probabilities(logits: &Tensor, rows: usize) -> Result<Vec<f32>, InferenceError> {
    let probabilities = candle_nn::ops::sigmoid(&logits.to_dtype(DType::F32)?)?
        .flatten_all()?
        .to_device(&Device::Cpu)?
        .to_vec1::<f32>()?;
    if probabilities.len() != rows {
        return Err(InferenceError::OutputShape {
            expected: rows,
            actual: probabilities.len(),
        });
    }
    Ok(probabilities)
}

#[cfg(feature = "onnx")]
mod loader {
    use hf_hub::api::sync::ApiBuilder;
    use tracing::info;

    use super::EpitopePredictor;
    use crate::{
        config::PredictorConfig, device::device, encoder::PeptideTokenizer,
        errors::InferenceError, models::onnx::OnnxClassifier,
    };

    impl EpitopePredictor {
        /// Fetches the tokenizer and both ONNX classifiers and places them on
        /// the best available device.
        pub fn load(
            config: &PredictorConfig,
            hf_token: Option<String>,
        ) -> Result<Self, InferenceError> {
            let api = ApiBuilder::new()
                .with_progress(true)
                .with_token(hf_token)
                .build()?;
            let device = device(config.device_id)?;

            let tokenizer = PeptideTokenizer::from_hub(&api, &config.tokenizer)?;
            let class_i = OnnxClassifier::load(config.class_i_model.resolve(&api)?, device.clone())?;
            let class_ii =
                OnnxClassifier::load(config.class_ii_model.resolve(&api)?, device.clone())?;
            info!(
                target = "transhla-inference",
                event = "predictor_loaded",
                tokenizer = %config.tokenizer.repo_id,
                class_i_model = %config.class_i_model.repo_id,
                class_ii_model = %config.class_ii_model.repo_id,
                "Loaded tokenizer and HLA class I/II classifiers"
            );

            Ok(Self::new(
                Box::new(tokenizer),
                Box::new(class_i),
                Box::new(class_ii),
                device,
            ))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::encoder::tests::esm2_tokenizer;

    /// Logit per row: `(number of `A` tokens - 4) * scale`, shaped `[batch, 1]`.
    ///
    /// Token 5 is `A` in the ESM-2 vocabulary, so an all-`A` peptide longer
    /// than four residues scores above the threshold.
    pub(crate) struct AlanineCounter {
        pub(crate) expected_width: usize,
        pub(crate) scale: f64,
        pub(crate) calls: Arc<AtomicUsize>,
    }

    impl PeptideClassifier for AlanineCounter {
        fn forward(&self, input_ids: &Tensor) -> Result<Tensor, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (_, width) = input_ids.dims2()?;
            if width != self.expected_width {
                return Err(InferenceError::Model(format!(
                    "expected width {}, got {width}",
                    self.expected_width
                )));
            }
            let alanines = input_ids.eq(5i64)?.to_dtype(DType::F32)?.sum_keepdim(1)?;
            Ok(((alanines - 4.0)? * self.scale)?)
        }
    }

    struct Failing;

    impl PeptideClassifier for Failing {
        fn forward(&self, _input_ids: &Tensor) -> Result<Tensor, InferenceError> {
            Err(InferenceError::Model("device lost".to_string()))
        }
    }

    struct WrongRows;

    impl PeptideClassifier for WrongRows {
        fn forward(&self, _input_ids: &Tensor) -> Result<Tensor, InferenceError> {
            Ok(Tensor::zeros(1, DType::F32, &Device::Cpu)?)
        }
    }

    pub(crate) fn predictor(calls: Arc<AtomicUsize>) -> EpitopePredictor {
        EpitopePredictor::new(
            Box::new(esm2_tokenizer()),
            Box::new(AlanineCounter {
                expected_width: HlaClass::I.params().target_length,
                scale: 1.0,
                calls: calls.clone(),
            }),
            Box::new(AlanineCounter {
                expected_width: HlaClass::II.params().target_length,
                scale: -1.0,
                calls,
            }),
            Device::Cpu,
        )
    }

    #[test]
    fn test_predict_preserves_order_and_threshold() {
        let calls = Arc::new(AtomicUsize::new(0));
        let predictor = predictor(calls.clone());
        let sequences = vec![
            "AAAAAAAAAA".to_string(),
            "GGGGGGGG".to_string(),
            "AAAAGGGGGG".to_string(),
        ];
        let predictions = predictor.predict(&sequences, HlaClass::I).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(predictions.len(), 3);
        for (prediction, sequence) in predictions.iter().zip(&sequences) {
            assert_eq!(&prediction.peptide, sequence);
            assert!((0.0..=1.0).contains(&prediction.probability));
            assert_eq!(prediction.is_epitope, prediction.probability >= 0.5);
        }
        assert!(predictions[0].is_epitope);
        assert!(!predictions[1].is_epitope);
        // sigmoid(0) sits exactly on the threshold
        assert_eq!(predictions[2].probability, 0.5);
        assert!(predictions[2].is_epitope);
    }

    #[test]
    fn test_predict_selects_class_model() {
        let calls = Arc::new(AtomicUsize::new(0));
        let predictor = predictor(calls);
        let sequences = vec!["A".repeat(21), "A".repeat(13)];
        let predictions = predictor.predict(&sequences, HlaClass::II).unwrap();
        // the class II stand-in negates its logits
        assert!(predictions.iter().all(|p| !p.is_epitope));
    }

    #[test]
    fn test_empty_request_skips_model() {
        let calls = Arc::new(AtomicUsize::new(0));
        let predictor = predictor(calls.clone());
        assert!(predictor.predict(&[], HlaClass::I).unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_oversized_sequence_is_not_truncated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let predictor = predictor(calls.clone());
        let sequences = vec!["A".repeat(10), "A".repeat(15)];
        let err = predictor.predict(&sequences, HlaClass::I).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::RaggedBatch {
                row: 1,
                expected: 16,
                actual: 17
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_model_failure_is_reported() {
        let predictor = EpitopePredictor::new(
            Box::new(esm2_tokenizer()),
            Box::new(Failing),
            Box::new(Failing),
            Device::Cpu,
        );
        let err = predictor
            .predict(&["A".repeat(9)], HlaClass::I)
            .unwrap_err();
        assert_eq!(err.to_string(), "Model error: device lost");
    }

    #[test]
    fn test_output_row_mismatch_is_reported() {
        let predictor = EpitopePredictor::new(
            Box::new(esm2_tokenizer()),
            Box::new(WrongRows),
            Box::new(WrongRows),
            Device::Cpu,
        );
        let err = predictor
            .predict(&["A".repeat(9), "A".repeat(10)], HlaClass::I)
            .unwrap_err();
        assert!(matches!(
            err,
            InferenceError::OutputShape {
                expected: 2,
                actual: 1
            }
        ));
    }
}
