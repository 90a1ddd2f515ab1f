use serde_json::Number;
use thiserror::Error;

use crate::hla::HlaClass;

/// Errors raised while checking a prediction request, before any model work.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The requested HLA class is neither 1 nor 2
    #[error("HLA class must be either 1 or 2")]
    InvalidClass {
        /// The class value found in the request
        hla_class: Number,
    },

    /// A peptide is shorter or longer than its HLA class allows
    #[error(
        "HLA class {class} sequences must be between {min_length} and {max_length} amino acids"
    )]
    InvalidLength {
        /// The HLA class the bound belongs to
        class: HlaClass,
        /// Position of the offending sequence in the request
        index: usize,
        /// Character length of the offending sequence
        length: usize,
        /// Smallest accepted length, inclusive
        min_length: usize,
        /// Largest accepted length, inclusive
        max_length: usize,
    },
}

/// Errors raised while encoding, padding or scoring a batch of peptides.
///
/// These are never classified further by callers: the HTTP layer reports the
/// display message as-is.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error(transparent)]
    Candle(#[from] candle_core::Error),

    #[error("Hub error: {0}")]
    Hub(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The ONNX export of a classifier could not be found
    #[error(
        "No ONNX weights {weights_file} for {repo_id} ({reason}). Export the model to ONNX \
         and set weights_file to the exported file"
    )]
    MissingWeights {
        repo_id: String,
        weights_file: String,
        reason: String,
    },

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Expected sequence of length {expected} at row {row} (got {actual})")]
    RaggedBatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Model returned {actual} scores for a batch of {expected} sequences")]
    OutputShape { expected: usize, actual: usize },

    #[error("Model error: {0}")]
    Model(String),
}

impl From<hf_hub::api::sync::ApiError> for InferenceError {
    fn from(error: hf_hub::api::sync::ApiError) -> Self {
        Self::Hub(error.to_string())
    }
}
