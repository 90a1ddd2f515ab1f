use serde::{Deserialize, Serialize};
use serde_json::Number;
use transhla_inference::Prediction;
use utoipa::ToSchema;

/// A batch of peptides to score against one HLA class
#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct PredictionRequest {
    /// Peptides as single-letter amino acid strings, scored in this order
    #[schema(example = json!(["AAAAAAAAAA"]))]
    pub sequences: Vec<String>,

    /// 1 for HLA class I (8 to 14 residues), 2 for HLA class II (13 to 21 residues).
    /// Any other number is rejected with `400`.
    #[schema(value_type = i64, example = 1)]
    pub hla_class: Number,
}

/// Epitope score of one peptide
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct PredictionResult {
    /// The peptide exactly as submitted
    pub peptide: String,

    /// Sigmoid of the model logit, in [0, 1]
    pub probability: f32,

    /// Whether `probability` is at least 0.5
    pub is_epitope: bool,
}

impl From<Prediction> for PredictionResult {
    fn from(prediction: Prediction) -> Self {
        let Prediction {
            peptide,
            probability,
            is_epitope,
        } = prediction;
        Self {
            peptide,
            probability,
            is_epitope,
        }
    }
}

/// Static payload served on `/`
#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct WelcomeResponse {
    pub message: String,
}

/// Body of every error response
#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human readable description of what went wrong
    pub detail: String,
}
