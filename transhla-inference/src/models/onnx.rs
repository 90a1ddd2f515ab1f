use std::{collections::HashMap, path::Path};

use candle_core::{Device, Tensor};
use candle_onnx::onnx::ModelProto;
use tracing::{info, instrument};

use super::PeptideClassifier;
use crate::errors::InferenceError;

/// A classifier exported to ONNX and evaluated with `candle-onnx`.
///
/// The first graph input receives the token ids and the first graph output is
/// read back as the logits; any further outputs (pooled features) are ignored.
pub struct OnnxClassifier {
    model: ModelProto,
    input_name: String,
    output_name: String,
    device: Device,
}

impl OnnxClassifier {
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load<P: AsRef<Path>>(path: P, device: Device) -> Result<Self, InferenceError> {
        let model = candle_onnx::read_file(path.as_ref())?;
        let graph = model
            .graph
            .as_ref()
            .ok_or_else(|| InferenceError::Model("ONNX model has no graph".to_string()))?;
        let input_name = graph
            .input
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| InferenceError::Model("ONNX graph has no inputs".to_string()))?;
        let output_name = graph
            .output
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| InferenceError::Model("ONNX graph has no outputs".to_string()))?;
        info!(
            target = "transhla-inference",
            event = "onnx_model_loaded",
            input = %input_name,
            output = %output_name,
            "Loaded ONNX classifier"
        );
        Ok(Self {
            model,
            input_name,
            output_name,
            device,
        })
    }
}

impl PeptideClassifier for OnnxClassifier {
    fn forward(&self, input_ids: &Tensor) -> Result<Tensor, InferenceError> {
        let inputs = HashMap::from([(
            self.input_name.clone(),
            input_ids.to_device(&self.device)?,
        )]);
        let mut outputs = candle_onnx::simple_eval(&self.model, inputs)?;
        outputs.remove(&self.output_name).ok_or_else(|| {
            InferenceError::Model(format!("ONNX graph produced no `{}`", self.output_name))
        })
    }
}
