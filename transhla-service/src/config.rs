use std::path::Path;

use config::{Config, ConfigError, File};
use serde::Deserialize;
use transhla_inference::PredictorConfig;

/// Origin of the frontend development server.
const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:5173";

fn default_allowed_origins() -> Vec<String> {
    vec![DEFAULT_ALLOWED_ORIGIN.to_string()]
}

/// Configuration for the TransHLA service.
///
/// This struct holds the bind address, the cross-origin policy and the
/// sources of the tokenizer and both HLA classifiers.
#[derive(Debug, Deserialize)]
pub struct TransHlaServiceConfig {
    /// The address and port where the service will listen for connections
    /// Format: "host:port" (e.g., "127.0.0.1:8000")
    pub service_bind_address: String,

    /// Origins allowed to call the API from a browser, with credentials.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Tokenizer and model sources, and the accelerator ordinal.
    #[serde(default)]
    pub predictor: PredictorConfig,
}

impl TransHlaServiceConfig {
    /// Creates a new `TransHlaServiceConfig` instance from a configuration file.
    ///
    /// # Arguments
    ///
    /// * `config_file_path` - Path to the configuration file. The file should be in a format
    ///   supported by the `config` crate (e.g., YAML, JSON, TOML) and contain a
    ///   "transhla_service" section. Any field can be overridden with environment variables
    ///   such as `TRANSHLA_SERVICE__SERVICE_BIND_ADDRESS`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, if the "transhla_service"
    /// section is missing, or if it doesn't match the expected structure.
    pub fn from_file_path<P: AsRef<Path>>(config_file_path: P) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(config_file_path.as_ref()))
            .add_source(
                config::Environment::with_prefix("TRANSHLA_SERVICE")
                    .keep_prefix(true)
                    .separator("__"),
            );
        builder.build()?.get::<Self>("transhla_service")
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let file = write_config(
            r#"
            [transhla_service]
            service_bind_address = "127.0.0.1:8000"
            "#,
        );
        let config = TransHlaServiceConfig::from_file_path(file.path()).unwrap();
        assert_eq!(config.service_bind_address, "127.0.0.1:8000");
        assert_eq!(config.allowed_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.predictor, PredictorConfig::default());
    }

    #[test]
    fn test_model_sources_are_read() {
        let file = write_config(
            r#"
            [transhla_service]
            service_bind_address = "0.0.0.0:9000"
            allowed_origins = ["https://transhla.example.org"]

            [transhla_service.predictor]
            device_id = 1

            [transhla_service.predictor.class_i_model]
            repo_id = "SkywalkerLu/TransHLA_I"
            weights_file = "/models/transhla_i.onnx"
            "#,
        );
        let config = TransHlaServiceConfig::from_file_path(file.path()).unwrap();
        assert_eq!(config.allowed_origins, vec!["https://transhla.example.org"]);
        assert_eq!(config.predictor.device_id, 1);
        assert_eq!(
            config.predictor.class_i_model.weights_file,
            "/models/transhla_i.onnx"
        );
        assert_eq!(config.predictor.class_i_model.revision, "main");
        assert_eq!(
            config.predictor.class_ii_model.repo_id,
            "SkywalkerLu/TransHLA_II"
        );
    }

    #[test]
    fn test_missing_section_is_an_error() {
        let file = write_config(
            r#"
            [other]
            service_bind_address = "127.0.0.1:8000"
            "#,
        );
        assert!(TransHlaServiceConfig::from_file_path(file.path()).is_err());
    }
}
