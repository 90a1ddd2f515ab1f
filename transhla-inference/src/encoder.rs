use std::{path::Path, str::FromStr};

use hf_hub::{api::sync::Api, Repo, RepoType};
use serde_json::{json, Map, Value};
use tokenizers::Tokenizer;
use tracing::{info, instrument};

use crate::{config::TokenizerSource, errors::InferenceError};

const TOKENIZER_FILE: &str = "tokenizer.json";
const VOCAB_FILE: &str = "vocab.txt";

const CLS_TOKEN: &str = "<cls>";
const EOS_TOKEN: &str = "<eos>";
const UNK_TOKEN: &str = "<unk>";

/// The ESM-2 vocabulary, in id order.
pub const ESM2_VOCAB: [&str; 33] = [
    "<cls>", "<pad>", "<eos>", "<unk>", "L", "A", "G", "V", "S", "E", "R", "T", "I", "D", "P", "K",
    "Q", "N", "F", "Y", "M", "H", "W", "C", "X", "B", "U", "Z", "O", ".", "-", "<null_1>",
    "<mask>",
];

/// Turns raw peptides into token id sequences, one per input, in order.
///
/// Implementations add whatever special tokens the model expects but never pad.
pub trait SequenceEncoder: Send + Sync {
    fn encode_batch(&self, sequences: &[String]) -> Result<Vec<Vec<u32>>, InferenceError>;
}

/// [`SequenceEncoder`] backed by a Hugging Face `tokenizers` instance.
#[derive(Clone, Debug)]
pub struct PeptideTokenizer {
    tokenizer: Tokenizer,
}

impl PeptideTokenizer {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self { tokenizer }
    }

    /// Loads a serialized `tokenizer.json`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, InferenceError> {
        Tokenizer::from_file(path)
            .map(Self::new)
            .map_err(|e| InferenceError::Tokenizer(e.to_string()))
    }

    /// The ESM-2 tokenizer, built from the bundled [`ESM2_VOCAB`].
    pub fn esm2() -> Result<Self, InferenceError> {
        Self::from_vocab(&ESM2_VOCAB)
    }

    /// Builds a character-level tokenizer from an ESM style `vocab.txt`.
    pub fn from_vocab_file<P: AsRef<Path>>(path: P) -> Result<Self, InferenceError> {
        let contents = std::fs::read_to_string(path)?;
        let vocab = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>();
        Self::from_vocab(&vocab)
    }

    /// Builds a character-level tokenizer from an ordered vocabulary.
    ///
    /// Token ids are vocabulary positions. Whitespace is dropped, every
    /// vocabulary token found in a peptide becomes its own word, and each run
    /// of characters between them maps to a single `<unk>`. Encodings are
    /// wrapped as `<cls> ... <eos>`, matching the ESM-2 tokenizer.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError::Tokenizer`] if `<cls>`, `<eos>` or `<unk>` is
    /// missing from `vocab`.
    pub fn from_vocab<S: AsRef<str>>(vocab: &[S]) -> Result<Self, InferenceError> {
        let position = |token: &str| {
            vocab
                .iter()
                .position(|entry| entry.as_ref() == token)
                .ok_or_else(|| {
                    InferenceError::Tokenizer(format!("Vocabulary has no {token} token"))
                })
        };
        let cls_id = position(CLS_TOKEN)?;
        let eos_id = position(EOS_TOKEN)?;
        position(UNK_TOKEN)?;

        // Longest first, so multi-character tokens win over their prefixes.
        let mut alternatives = vocab
            .iter()
            .map(AsRef::as_ref)
            .filter(|token| !token.is_empty())
            .collect::<Vec<_>>();
        alternatives.sort_by_key(|token| std::cmp::Reverse(token.len()));
        let vocab_pattern = alternatives
            .into_iter()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");

        let mut word_ids = Map::new();
        let mut added_tokens = Vec::new();
        for (id, token) in vocab.iter().enumerate() {
            let token = token.as_ref();
            word_ids.insert(token.to_string(), json!(id));
            if token.starts_with('<') && token.ends_with('>') {
                added_tokens.push(json!({
                    "id": id,
                    "content": token,
                    "single_word": false,
                    "lstrip": false,
                    "rstrip": false,
                    "normalized": false,
                    "special": true,
                }));
            }
        }

        let special = |token: &str| json!({ "SpecialToken": { "id": token, "type_id": 0 } });
        let sequence = |id: &str| json!({ "Sequence": { "id": id, "type_id": 0 } });
        let definition = json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": null,
            "pre_tokenizer": {
                "type": "Sequence",
                "pretokenizers": [
                    { "type": "WhitespaceSplit" },
                    {
                        "type": "Split",
                        "pattern": { "Regex": vocab_pattern },
                        "behavior": "Isolated",
                        "invert": false,
                    },
                ],
            },
            "post_processor": {
                "type": "TemplateProcessing",
                "single": [special(CLS_TOKEN), sequence("A"), special(EOS_TOKEN)],
                "pair": [
                    special(CLS_TOKEN),
                    sequence("A"),
                    special(EOS_TOKEN),
                    sequence("B"),
                    special(EOS_TOKEN),
                ],
                "special_tokens": {
                    CLS_TOKEN: { "id": CLS_TOKEN, "ids": [cls_id], "tokens": [CLS_TOKEN] },
                    EOS_TOKEN: { "id": EOS_TOKEN, "ids": [eos_id], "tokens": [EOS_TOKEN] },
                },
            },
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": Value::Object(word_ids),
                "unk_token": UNK_TOKEN,
            },
        });

        Tokenizer::from_str(&definition.to_string())
            .map(Self::new)
            .map_err(|e| InferenceError::Tokenizer(e.to_string()))
    }

    /// Fetches the tokenizer for `source` from the Hugging Face hub.
    ///
    /// `tokenizer.json` is preferred; repositories that only publish a
    /// `vocab.txt` (ESM-2 does) fall back to [`Self::from_vocab_file`].
    #[instrument(level = "info", skip(api), fields(repo_id = %source.repo_id))]
    pub fn from_hub(api: &Api, source: &TokenizerSource) -> Result<Self, InferenceError> {
        let repo = api.repo(Repo::with_revision(
            source.repo_id.clone(),
            RepoType::Model,
            source.revision.clone(),
        ));
        match repo.get(TOKENIZER_FILE) {
            Ok(path) => Self::from_file(path),
            Err(error) => {
                info!(
                    target = "transhla-inference",
                    event = "tokenizer_vocab_fallback",
                    repo_id = %source.repo_id,
                    %error,
                    "No {TOKENIZER_FILE} available, building tokenizer from {VOCAB_FILE}"
                );
                Self::from_vocab_file(repo.get(VOCAB_FILE)?)
            }
        }
    }
}

impl SequenceEncoder for PeptideTokenizer {
    fn encode_batch(&self, sequences: &[String]) -> Result<Vec<Vec<u32>>, InferenceError> {
        let inputs = sequences.iter().map(String::as_str).collect::<Vec<_>>();
        let encodings = self
            .tokenizer
            .encode_batch(inputs, true)
            .map_err(|e| InferenceError::Tokenizer(e.to_string()))?;
        Ok(encodings
            .iter()
            .map(|encoding| encoding.get_ids().to_vec())
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use super::*;
    use crate::hla::{HlaClass, PAD_TOKEN_ID};

    #[test]
    fn test_esm2_pad_token_matches_padder() {
        assert_eq!(ESM2_VOCAB[PAD_TOKEN_ID as usize], "<pad>");
    }

    pub(crate) fn esm2_tokenizer() -> PeptideTokenizer {
        PeptideTokenizer::esm2().unwrap()
    }

    #[test]
    fn test_encodes_one_token_per_residue() {
        let encoded = esm2_tokenizer()
            .encode_batch(&["LAGV".to_string()])
            .unwrap();
        assert_eq!(encoded, vec![vec![0, 4, 5, 6, 7, 2]]);
    }

    #[test]
    fn test_preserves_input_order() {
        let sequences = vec!["AAAA".to_string(), "KK".to_string(), "WYC".to_string()];
        let encoded = esm2_tokenizer().encode_batch(&sequences).unwrap();
        assert_eq!(
            encoded,
            vec![
                vec![0, 5, 5, 5, 5, 2],
                vec![0, 15, 15, 2],
                vec![0, 22, 19, 23, 2],
            ]
        );
    }

    #[test]
    fn test_unknown_residue_maps_to_unk() {
        let encoded = esm2_tokenizer().encode_batch(&["AJA".to_string()]).unwrap();
        assert_eq!(encoded, vec![vec![0, 5, 3, 5, 2]]);
    }

    #[test]
    fn test_whitespace_is_dropped() {
        let encoded = esm2_tokenizer()
            .encode_batch(&["AAAA AAAA".to_string(), " KK\t".to_string()])
            .unwrap();
        assert_eq!(
            encoded,
            vec![vec![0, 5, 5, 5, 5, 5, 5, 5, 5, 2], vec![0, 15, 15, 2]]
        );
    }

    #[test]
    fn test_unknown_run_maps_to_single_unk() {
        let encoded = esm2_tokenizer()
            .encode_batch(&[
                "AJJA".to_string(),
                "aaaaaaaa".to_string(),
                "LjA.-".to_string(),
            ])
            .unwrap();
        assert_eq!(
            encoded,
            vec![
                vec![0, 5, 3, 5, 2],
                vec![0, 3, 2],
                vec![0, 4, 3, 5, 29, 30, 2],
            ]
        );
    }

    #[test]
    fn test_longest_peptides_fit_target_length() {
        let tokenizer = esm2_tokenizer();
        for class in HlaClass::ALL {
            let params = class.params();
            let encoded = tokenizer
                .encode_batch(&["A".repeat(params.max_length)])
                .unwrap();
            assert_eq!(encoded[0].len(), params.target_length);
            assert!(!encoded[0].contains(&PAD_TOKEN_ID));
        }
    }

    #[test]
    fn test_missing_special_token_is_rejected() {
        let err = PeptideTokenizer::from_vocab(&["<pad>", "<eos>", "<unk>", "A"]).unwrap_err();
        assert!(err.to_string().contains("<cls>"), "{err}");
    }

    #[test]
    fn test_from_vocab_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", ESM2_VOCAB.join("\n")).unwrap();
        let tokenizer = PeptideTokenizer::from_vocab_file(file.path()).unwrap();
        let encoded = tokenizer.encode_batch(&["ML".to_string()]).unwrap();
        assert_eq!(encoded, vec![vec![0, 20, 4, 2]]);
    }
}
