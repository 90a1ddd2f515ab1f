//! Peptide epitope scoring for HLA class I and class II.
//!
//! Raw peptides flow through [`validation`], [`encoder`], [`padding`] and a
//! [`models::PeptideClassifier`] under the control of
//! [`engine::EpitopePredictor`].

pub mod config;
pub mod device;
pub mod encoder;
pub mod engine;
pub mod errors;
pub mod hla;
pub mod models;
pub mod padding;
pub mod validation;

pub use crate::{
    config::PredictorConfig,
    engine::{EpitopePredictor, Prediction},
    errors::{InferenceError, ValidationError},
    hla::HlaClass,
};
