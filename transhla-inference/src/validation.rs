use serde_json::Number;
use tracing::instrument;

use crate::{errors::ValidationError, hla::HlaClass};

/// Checks a raw prediction request and resolves its HLA class.
///
/// The class is checked first, then every sequence against the class length
/// bounds. Lengths are counted in characters, not bytes. The first violation
/// found is returned; nothing is encoded or scored on failure.
///
/// # Errors
///
/// * [`ValidationError::InvalidClass`] if `hla_class` is not 1 or 2
/// * [`ValidationError::InvalidLength`] if any sequence falls outside the bound
#[instrument(
    level = "debug",
    skip_all,
    fields(hla_class = %hla_class, num_sequences = sequences.len())
)]
pub fn validate_request<S: AsRef<str>>(
    sequences: &[S],
    hla_class: &Number,
) -> Result<HlaClass, ValidationError> {
    let class = HlaClass::try_from(hla_class)?;
    validate_lengths(sequences, class)?;
    Ok(class)
}

/// Checks that every sequence length lies within the bound of `class`.
pub fn validate_lengths<S: AsRef<str>>(
    sequences: &[S],
    class: HlaClass,
) -> Result<(), ValidationError> {
    let params = class.params();
    for (index, sequence) in sequences.iter().enumerate() {
        let length = sequence.as_ref().chars().count();
        if !(params.min_length..=params.max_length).contains(&length) {
            return Err(ValidationError::InvalidLength {
                class,
                index,
                length,
                min_length: params.min_length,
                max_length: params.max_length,
            });
        }
    }
    Ok(())
}
