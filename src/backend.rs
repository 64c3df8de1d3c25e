//! Constraint system backends a verification can be compiled into.
//!
//! A backend turns a [`VerificationContext`] into a circuit, derives keys for it, and proves
//! that the recursive verifier accepts the context's transcript. [`NativeBackend`] re-executes
//! the verifier natively and attests to the result with Keccak digests.

use std::path::Path;

use p3_field::PrimeField;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, info, instrument};

use crate::{
    config::{ConfigError, load_json},
    errors::Error,
    fiat_shamir::keccak::keccak256,
    merkle_tree::QueryBinding,
    spartan::{context::VerificationContext, verifier::SpartanVerifier},
    utils::field_to_le_bytes,
};

/// Digest binding keys and attestations to one circuit.
pub type CircuitDigest = [u8; 32];

/// A proving system able to attest that a verification succeeded.
pub trait ConstraintSystemBackend<F> {
    type Circuit;
    type ProvingKey: Serialize + DeserializeOwned;
    type VerifyingKey: Serialize + DeserializeOwned;
    type Proof: Serialize + DeserializeOwned;

    /// Captures the verification as a circuit.
    fn compile(&self, context: VerificationContext<F>) -> Result<Self::Circuit, Error>;

    /// Produces the keys for the prover and the verifier.
    fn setup(&self, circuit: &Self::Circuit) -> Result<(Self::ProvingKey, Self::VerifyingKey), Error>;

    fn prove(&self, pk: &Self::ProvingKey, circuit: &Self::Circuit) -> Result<Self::Proof, Error>;

    fn verify(
        &self,
        vk: &Self::VerifyingKey,
        circuit: &Self::Circuit,
        proof: &Self::Proof,
    ) -> Result<(), Error>;
}

/// A verification context together with the digest of its shape.
#[derive(Debug, Clone)]
pub struct NativeCircuit<F> {
    pub context: VerificationContext<F>,
    pub digest: CircuitDigest,
}

impl<F: PrimeField> NativeCircuit<F> {
    /// Digest of the transcript and the public inputs this circuit checks.
    #[must_use]
    pub fn public_digest(&self) -> CircuitDigest {
        let mut bytes = self.context.transcript.clone();
        for input in &self.context.public_inputs {
            bytes.extend_from_slice(&field_to_le_bytes(input));
        }
        keccak256(&bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeProvingKey {
    pub circuit_digest: CircuitDigest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeVerifyingKey {
    pub circuit_digest: CircuitDigest,
}

/// Statement that the verifier accepted the transcript with digest `public_digest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub public_digest: CircuitDigest,
    pub tag: CircuitDigest,
}

fn attestation_tag(circuit_digest: &CircuitDigest, public_digest: &CircuitDigest) -> CircuitDigest {
    let mut bytes = Vec::with_capacity(64);
    bytes.extend_from_slice(circuit_digest);
    bytes.extend_from_slice(public_digest);
    keccak256(&bytes)
}

/// Runs the recursive verifier natively.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBackend {
    pub query_binding: QueryBinding,
}

impl NativeBackend {
    #[must_use]
    pub const fn new(query_binding: QueryBinding) -> Self {
        Self { query_binding }
    }
}

impl<F: PrimeField> ConstraintSystemBackend<F> for NativeBackend {
    type Circuit = NativeCircuit<F>;
    type ProvingKey = NativeProvingKey;
    type VerifyingKey = NativeVerifyingKey;
    type Proof = Attestation;

    fn compile(&self, context: VerificationContext<F>) -> Result<Self::Circuit, Error> {
        let mut bytes = context.io_pattern.as_bytes().to_vec();
        for dimension in [
            context.log_num_constraints,
            context.log_num_variables,
            context.r1cs.num_public_inputs,
            context.r1cs.num_witnesses,
            context.r1cs.num_constraints,
        ] {
            bytes.extend_from_slice(&(dimension as u64).to_le_bytes());
        }
        let digest = keccak256(&bytes);
        debug!(digest = hex::encode(digest), "compiled circuit");
        Ok(NativeCircuit { context, digest })
    }

    fn setup(&self, circuit: &Self::Circuit) -> Result<(Self::ProvingKey, Self::VerifyingKey), Error> {
        Ok((
            NativeProvingKey {
                circuit_digest: circuit.digest,
            },
            NativeVerifyingKey {
                circuit_digest: circuit.digest,
            },
        ))
    }

    #[instrument(skip_all)]
    fn prove(&self, pk: &Self::ProvingKey, circuit: &Self::Circuit) -> Result<Self::Proof, Error> {
        if pk.circuit_digest != circuit.digest {
            return Err(ConfigError::Invalid("proving key was set up for another circuit".into()).into());
        }
        SpartanVerifier::new(&circuit.context)
            .with_query_binding(self.query_binding)
            .verify()?;
        let public_digest = circuit.public_digest();
        Ok(Attestation {
            public_digest,
            tag: attestation_tag(&pk.circuit_digest, &public_digest),
        })
    }

    #[instrument(skip_all)]
    fn verify(
        &self,
        vk: &Self::VerifyingKey,
        circuit: &Self::Circuit,
        proof: &Self::Proof,
    ) -> Result<(), Error> {
        let public_digest = circuit.public_digest();
        if vk.circuit_digest != circuit.digest
            || proof.public_digest != public_digest
            || proof.tag != attestation_tag(&vk.circuit_digest, &public_digest)
        {
            return Err(Error::VerificationFailed);
        }
        info!("attestation verified");
        Ok(())
    }
}

/// Loads a key pair from disk, or runs `setup` when neither key is given.
pub fn load_or_setup_keys<F, B: ConstraintSystemBackend<F>>(
    backend: &B,
    circuit: &B::Circuit,
    pk_path: Option<&Path>,
    vk_path: Option<&Path>,
) -> Result<(B::ProvingKey, B::VerifyingKey), Error> {
    match (pk_path, vk_path) {
        (Some(pk), Some(vk)) => Ok((load_json(pk)?, load_json(vk)?)),
        (None, None) => backend.setup(circuit),
        (Some(_), None) => Err(ConfigError::MissingKey("verifying key").into()),
        (None, Some(_)) => Err(ConfigError::MissingKey("proving key").into()),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::{
        FieldElement,
        testing::spartan::{FixtureOptions, SpartanFixture},
    };

    type F = FieldElement;

    fn circuit(options: FixtureOptions) -> NativeCircuit<F> {
        let context = SpartanFixture::new(options).context().unwrap();
        ConstraintSystemBackend::<F>::compile(&NativeBackend::default(), context).unwrap()
    }

    #[test]
    fn test_prove_then_verify() {
        let backend = NativeBackend::default();
        let circuit = circuit(FixtureOptions::default());
        let (pk, vk) = backend.setup(&circuit).unwrap();
        let proof = backend.prove(&pk, &circuit).unwrap();
        assert_eq!(proof.public_digest, circuit.public_digest());
        backend.verify(&vk, &circuit, &proof).unwrap();
    }

    #[test]
    fn test_forged_tag_is_rejected() {
        let backend = NativeBackend::default();
        let circuit = circuit(FixtureOptions::default());
        let (pk, vk) = backend.setup(&circuit).unwrap();
        let mut proof = backend.prove(&pk, &circuit).unwrap();
        proof.tag[0] ^= 1;
        assert!(matches!(
            backend.verify(&vk, &circuit, &proof),
            Err(Error::VerificationFailed)
        ));
    }

    #[test]
    fn test_keys_are_bound_to_the_circuit() {
        let backend = NativeBackend::default();
        let single = circuit(FixtureOptions::default());
        let dual = circuit(FixtureOptions {
            dual: true,
            ..FixtureOptions::default()
        });
        assert_ne!(single.digest, dual.digest);

        let (pk, vk) = backend.setup(&single).unwrap();
        assert!(matches!(
            backend.prove(&pk, &dual),
            Err(Error::Config(ConfigError::Invalid(_)))
        ));
        let proof = backend.prove(&pk, &single).unwrap();
        assert!(matches!(
            backend.verify(&vk, &dual, &proof),
            Err(Error::VerificationFailed)
        ));
    }

    #[test]
    fn test_rejected_transcript_yields_no_attestation() {
        let mut fixture = SpartanFixture::new(FixtureOptions {
            public_inputs: true,
            ..FixtureOptions::default()
        });
        fixture.config.public_inputs = vec!["05".to_string()];
        let backend = NativeBackend::default();
        let circuit = ConstraintSystemBackend::<F>::compile(&backend, fixture.context().unwrap()).unwrap();
        let (pk, _) = backend.setup(&circuit).unwrap();
        assert!(backend.prove(&pk, &circuit).is_err());
    }

    #[test]
    fn test_key_loading() {
        let backend = NativeBackend::default();
        let circuit = circuit(FixtureOptions::default());
        let (pk, vk) = backend.setup(&circuit).unwrap();

        let dir = std::env::temp_dir().join(format!("whir-backend-keys-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let pk_path = dir.join("pk.json");
        let vk_path = dir.join("vk.json");
        fs::write(&pk_path, serde_json::to_vec(&pk).unwrap()).unwrap();
        fs::write(&vk_path, serde_json::to_vec(&vk).unwrap()).unwrap();

        let loaded =
            load_or_setup_keys::<F, _>(&backend, &circuit, Some(&pk_path), Some(&vk_path)).unwrap();
        assert_eq!(loaded, (pk.clone(), vk.clone()));
        assert_eq!(
            load_or_setup_keys::<F, _>(&backend, &circuit, None, None).unwrap(),
            (pk, vk)
        );
        assert!(matches!(
            load_or_setup_keys::<F, _>(&backend, &circuit, Some(&pk_path), None),
            Err(Error::Config(ConfigError::MissingKey("verifying key")))
        ));
        assert!(matches!(
            load_or_setup_keys::<F, _>(&backend, &circuit, None, Some(&vk_path)),
            Err(Error::Config(ConfigError::MissingKey("proving key")))
        ));

        fs::remove_dir_all(dir).unwrap();
    }
}
