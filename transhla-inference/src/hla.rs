use std::fmt;

use serde_json::Number;

use crate::errors::ValidationError;

/// Token id the padder appends to short sequences (`<pad>` in the ESM-2 vocabulary).
pub const PAD_TOKEN_ID: u32 = 1;

/// Probability at or above which a peptide is labelled an epitope.
pub const EPITOPE_THRESHOLD: f32 = 0.5;

/// The two HLA classes served, each with its own model and length bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HlaClass {
    /// HLA class I, short peptides (8 to 14 residues)
    I,
    /// HLA class II, longer peptides (13 to 21 residues)
    II,
}

/// Per-class parameters, so that class I and class II share one code path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassParams {
    /// Shortest accepted peptide, inclusive
    pub min_length: usize,
    /// Longest accepted peptide, inclusive
    pub max_length: usize,
    /// Width of the padded token batch fed to the model
    pub target_length: usize,
}

impl HlaClass {
    /// Both classes, in wire order.
    pub const ALL: [Self; 2] = [Self::I, Self::II];

    /// Returns the length bounds and padded width for this class.
    ///
    /// The ESM-2 tokenizer adds `<cls>` and `<eos>` around every peptide, so
    /// `target_length` is exactly `max_length + 2`.
    pub const fn params(self) -> ClassParams {
        match self {
            Self::I => ClassParams {
                min_length: 8,
                max_length: 14,
                target_length: 16,
            },
            Self::II => ClassParams {
                min_length: 13,
                max_length: 21,
                target_length: 23,
            },
        }
    }
}

/// Resolves the class from the JSON number sent on the wire.
///
/// Integral floats such as `2.0` name their integer. Any other number, including
/// values too large for `i64`, is an invalid class rather than a malformed body.
impl TryFrom<&Number> for HlaClass {
    type Error = ValidationError;

    fn try_from(hla_class: &Number) -> Result<Self, Self::Error> {
        let integral = hla_class.as_i64().or_else(|| {
            hla_class
                .as_f64()
                .filter(|value| value.fract() == 0.0 && value.abs() <= 2.0)
                .map(|value| value as i64)
        });
        match integral {
            Some(1) => Ok(Self::I),
            Some(2) => Ok(Self::II),
            _ => Err(ValidationError::InvalidClass {
                hla_class: hla_class.clone(),
            }),
        }
    }
}

impl fmt::Display for HlaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I => write!(f, "I"),
            Self::II => write!(f, "II"),
        }
    }
}
