use std::path::{Path, PathBuf};

use hf_hub::{api::sync::Api, Repo, RepoType};
use serde::{Deserialize, Serialize};

use crate::errors::InferenceError;

const DEFAULT_REVISION: &str = "main";
const DEFAULT_TOKENIZER_REPO: &str = "facebook/esm2_t33_650M_UR50D";
const DEFAULT_CLASS_I_REPO: &str = "SkywalkerLu/TransHLA_I";
const DEFAULT_CLASS_II_REPO: &str = "SkywalkerLu/TransHLA_II";
const DEFAULT_WEIGHTS_FILE: &str = "model.onnx";

fn default_revision() -> String {
    DEFAULT_REVISION.to_string()
}

/// Where to fetch the peptide tokenizer from.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct TokenizerSource {
    /// Hugging Face repository id of the tokenizer
    pub repo_id: String,

    /// Branch, tag or commit of the repository
    #[serde(default = "default_revision")]
    pub revision: String,
}

impl Default for TokenizerSource {
    fn default() -> Self {
        Self {
            repo_id: DEFAULT_TOKENIZER_REPO.to_string(),
            revision: default_revision(),
        }
    }
}

/// Where to fetch one pretrained classifier from.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ModelSource {
    /// Hugging Face repository id of the model
    pub repo_id: String,

    /// Branch, tag or commit of the repository
    #[serde(default = "default_revision")]
    pub revision: String,

    /// ONNX export of the classifier. An absolute path is read from disk,
    /// anything else is fetched from the repository. The published TransHLA
    /// repositories ship PyTorch weights, so this usually points at a local
    /// export.
    pub weights_file: String,
}

impl ModelSource {
    fn with_repo(repo_id: &str) -> Self {
        Self {
            repo_id: repo_id.to_string(),
            revision: default_revision(),
            weights_file: DEFAULT_WEIGHTS_FILE.to_string(),
        }
    }

    /// Resolves the weights file to a local path, downloading it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::MissingWeights`] if an absolute path is not a
    /// file, or if the repository has no file of that name.
    pub fn resolve(&self, api: &Api) -> Result<PathBuf, InferenceError> {
        let local = Path::new(&self.weights_file);
        if local.is_absolute() {
            if local.is_file() {
                return Ok(local.to_path_buf());
            }
            return Err(self.missing("not a file".to_string()));
        }
        let repo = api.repo(Repo::with_revision(
            self.repo_id.clone(),
            RepoType::Model,
            self.revision.clone(),
        ));
        repo.get(&self.weights_file)
            .map_err(|e| self.missing(e.to_string()))
    }

    fn missing(&self, reason: String) -> InferenceError {
        InferenceError::MissingWeights {
            repo_id: self.repo_id.clone(),
            weights_file: self.weights_file.clone(),
            reason,
        }
    }
}

/// Everything the predictor needs to load its tokenizer and both models.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct PredictorConfig {
    #[serde(default)]
    pub tokenizer: TokenizerSource,

    #[serde(default = "PredictorConfig::default_class_i_model")]
    pub class_i_model: ModelSource,

    #[serde(default = "PredictorConfig::default_class_ii_model")]
    pub class_ii_model: ModelSource,

    /// Ordinal of the accelerator to use when one is available
    #[serde(default)]
    pub device_id: usize,
}

impl PredictorConfig {
    fn default_class_i_model() -> ModelSource {
        ModelSource::with_repo(DEFAULT_CLASS_I_REPO)
    }

    fn default_class_ii_model() -> ModelSource {
        ModelSource::with_repo(DEFAULT_CLASS_II_REPO)
    }
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            tokenizer: TokenizerSource::default(),
            class_i_model: Self::default_class_i_model(),
            class_ii_model: Self::default_class_ii_model(),
            device_id: 0,
        }
    }
}
