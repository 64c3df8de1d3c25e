//! JSON configuration consumed by the verifier.
//!
//! Field names follow the files emitted by the prover tool-chain.

use std::{fs::File, io::BufReader, path::Path};

use p3_field::Field;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::{constant::SCALAR_BYTES, utils::field_from_le_bytes};

/// Errors raised while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid hex in {context}: {source}")]
    Hex {
        context: String,
        #[source]
        source: hex::FromHexError,
    },

    /// A public input does not fit in a 32-byte scalar.
    #[error("public input {index} has {len} bytes, at most 32 are allowed")]
    PublicInputTooLong { index: usize, len: usize },

    /// `transcript_len` disagrees with the transcript actually shipped.
    #[error("transcript_len is {declared} but the transcript has {actual} bytes")]
    TranscriptLength { declared: usize, actual: usize },

    /// A required key file is missing and no fallback exists.
    #[error("missing {0}")]
    MissingKey(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Reads a JSON document from `path`.
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

const fn default_batch_size() -> usize {
    1
}

/// Parameters of one WHIR instance, as serialized by the prover.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhirConfig {
    pub n_rounds: usize,
    /// Log2 of the inverse code rate.
    pub rate: usize,
    pub n_vars: usize,
    pub folding_factor: Vec<usize>,
    pub ood_samples: Vec<usize>,
    pub num_queries: Vec<usize>,
    pub pow_bits: Vec<usize>,
    pub final_queries: usize,
    pub final_pow_bits: usize,
    pub final_folding_pow_bits: usize,
    /// Generator of the initial evaluation domain, in decimal.
    pub domain_generator: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Everything the verifier needs besides the R1CS instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofConfig {
    pub whir_config_witness: WhirConfig,
    pub whir_config_hiding_spartan: WhirConfig,
    pub log_num_constraints: usize,
    pub log_num_variables: usize,
    pub log_a_num_terms: usize,
    pub io_pattern: String,
    pub transcript: Vec<u8>,
    pub transcript_len: usize,
    /// Number of logup challenges; non-zero switches to two witness commitments.
    #[serde(default)]
    pub num_challenges: usize,
    /// Number of witness columns held by the first commitment in dual mode.
    #[serde(default)]
    pub w1_size: usize,
    /// Hex encoded little-endian public inputs.
    #[serde(default)]
    pub public_inputs: Vec<String>,
}

impl ProofConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = load_json(path)?;
        config.check_transcript_len()?;
        Ok(config)
    }

    /// Checks that the declared transcript length matches the transcript.
    pub fn check_transcript_len(&self) -> Result<(), ConfigError> {
        if self.transcript_len == self.transcript.len() {
            Ok(())
        } else {
            Err(ConfigError::TranscriptLength {
                declared: self.transcript_len,
                actual: self.transcript.len(),
            })
        }
    }

    /// Decodes the public inputs into field elements.
    pub fn public_inputs<F: Field>(&self) -> Result<Vec<F>, ConfigError> {
        self.public_inputs
            .iter()
            .enumerate()
            .map(|(index, value)| parse_hex_scalar(index, value))
            .collect()
    }
}

/// Parses a little-endian hex scalar, with or without a `0x` prefix, reducing it modulo `p`.
fn parse_hex_scalar<F: Field>(index: usize, value: &str) -> Result<F, ConfigError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(digits).map_err(|source| ConfigError::Hex {
        context: format!("public input {index}"),
        source,
    })?;
    if bytes.len() > SCALAR_BYTES {
        return Err(ConfigError::PublicInputTooLong {
            index,
            len: bytes.len(),
        });
    }
    Ok(field_from_le_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use p3_field::PrimeCharacteristicRing;

    use super::*;
    use crate::FieldElement;

    fn whir_json() -> &'static str {
        r#"{
            "n_rounds": 1,
            "rate": 1,
            "n_vars": 8,
            "folding_factor": [4, 4],
            "ood_samples": [1],
            "num_queries": [5],
            "pow_bits": [0],
            "final_queries": 3,
            "final_pow_bits": 0,
            "final_folding_pow_bits": 0,
            "domain_generator": "5"
        }"#
    }

    #[test]
    fn test_whir_config_defaults_batch_size() {
        let config: WhirConfig = serde_json::from_str(whir_json()).unwrap();
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.folding_factor, vec![4, 4]);
        assert_eq!(config.domain_generator, "5");
    }

    #[test]
    fn test_proof_config_parses_optional_fields() {
        let json = format!(
            r#"{{
                "whir_config_witness": {w},
                "whir_config_hiding_spartan": {w},
                "log_num_constraints": 3,
                "log_num_variables": 4,
                "log_a_num_terms": 5,
                "io_pattern": "proto",
                "transcript": [1, 2, 3],
                "transcript_len": 3,
                "public_inputs": ["0x0100", "ff"]
            }}"#,
            w = whir_json()
        );
        let config: ProofConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.num_challenges, 0);
        assert_eq!(config.w1_size, 0);
        config.check_transcript_len().unwrap();

        let inputs: Vec<FieldElement> = config.public_inputs().unwrap();
        assert_eq!(
            inputs,
            vec![FieldElement::ONE, FieldElement::from_u8(0xff)]
        );
    }

    #[test]
    fn test_transcript_len_mismatch() {
        let json = format!(
            r#"{{
                "whir_config_witness": {w},
                "whir_config_hiding_spartan": {w},
                "log_num_constraints": 3,
                "log_num_variables": 4,
                "log_a_num_terms": 5,
                "io_pattern": "proto",
                "transcript": [1, 2, 3],
                "transcript_len": 4
            }}"#,
            w = whir_json()
        );
        let config: ProofConfig = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            config.check_transcript_len(),
            Err(ConfigError::TranscriptLength {
                declared: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_public_input_errors() {
        assert!(matches!(
            parse_hex_scalar::<FieldElement>(0, "zz"),
            Err(ConfigError::Hex { .. })
        ));
        let long = "00".repeat(33);
        assert!(matches!(
            parse_hex_scalar::<FieldElement>(2, &long),
            Err(ConfigError::PublicInputTooLong { index: 2, len: 33 })
        ));
    }
}
