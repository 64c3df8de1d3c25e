//! Merkle authentication paths over field-element leaves.
//!
//! Nodes are field elements. A leaf `[v0, v1, ..., vn]` is digested by the compression chain
//! `c(...c(c(v0, v1), v2)..., vn)`, and every inner node is `c(left, right)`.

use num_bigint::BigUint;
use p3_field::PrimeField;
use p3_maybe_rayon::prelude::*;
use tracing::instrument;

use crate::{
    fiat_shamir::{
        hints::{FullMultiPath, Path},
        keccak::keccak256,
    },
    utils::{field_from_be_bytes, field_from_le_bytes, field_to_le_bytes},
    whir::verifier::errors::VerifierError,
};

/// Two-to-one compression used for Merkle nodes and proof-of-work.
pub trait TwoToOneCompression<F>: Sync {
    fn compress(&self, left: F, right: F) -> F;
}

/// Keccak-256 of the two canonical 32-byte little-endian encodings, read back little-endian
/// and reduced into the field.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeccakCompression;

impl<F: PrimeField> TwoToOneCompression<F> for KeccakCompression {
    fn compress(&self, left: F, right: F) -> F {
        let mut input = [0u8; 64];
        input[..32].copy_from_slice(&field_to_le_bytes(&left));
        input[32..].copy_from_slice(&field_to_le_bytes(&right));
        field_from_le_bytes(&keccak256(&input))
    }
}

/// Digest of a leaf holding at least two values.
pub fn hash_leaf<F: Copy, C: TwoToOneCompression<F>>(compression: &C, leaf: &[F]) -> Option<F> {
    match leaf {
        [first, second, rest @ ..] => Some(
            rest.iter()
                .fold(compression.compress(*first, *second), |acc, &value| {
                    compression.compress(acc, value)
                }),
        ),
        _ => None,
    }
}

/// An opened leaf together with its authentication path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleOpening<F> {
    pub leaf: Vec<F>,
    /// Position of the leaf; bit `l` selects the side at level `l`.
    pub index: u64,
    /// Digest of the neighbouring leaf.
    pub sibling: F,
    /// Siblings from the level above the leaves up to the level below the root.
    pub auth_path: Vec<F>,
}

impl<F: PrimeField> MerkleOpening<F> {
    /// Builds an opening from a hint path, whose authentication path is stored root-first.
    #[must_use]
    pub fn from_hint(path: &Path, leaf: Vec<F>) -> Self {
        Self {
            leaf,
            index: path.leaf_index,
            sibling: field_from_le_bytes(&path.leaf_sibling_hash),
            auth_path: path
                .auth_path
                .iter()
                .rev()
                .map(|digest| field_from_le_bytes(digest))
                .collect(),
        }
    }
}

impl<F: Copy> MerkleOpening<F> {
    /// Number of levels below the root.
    #[must_use]
    pub fn height(&self) -> usize {
        self.auth_path.len() + 1
    }

    /// Walks the path from the leaf to the root.
    ///
    /// Returns `None` when the leaf is too short to be digested or the index does not fit in
    /// the tree.
    pub fn compute_root<C: TwoToOneCompression<F>>(&self, compression: &C) -> Option<F> {
        let height = self.height();
        if height < 64 && self.index >> height != 0 {
            return None;
        }

        let leaf_hash = hash_leaf(compression, &self.leaf)?;
        let ordered = |bit: u64, node: F, sibling: F| {
            if bit == 1 {
                compression.compress(sibling, node)
            } else {
                compression.compress(node, sibling)
            }
        };

        let mut current = ordered(self.index & 1, leaf_hash, self.sibling);
        for (level, &sibling) in self.auth_path.iter().enumerate() {
            current = ordered((self.index >> (level + 1)) & 1, current, sibling);
        }
        Some(current)
    }
}

/// Pairs the opened paths of a round with their leaves.
pub fn openings_from_hints<F: PrimeField>(
    paths: &FullMultiPath,
    leaves: Vec<Vec<F>>,
) -> Result<Vec<MerkleOpening<F>>, VerifierError> {
    if paths.proofs.len() != leaves.len() {
        return Err(VerifierError::Malformed(format!(
            "{} Merkle paths for {} opened leaves",
            paths.proofs.len(),
            leaves.len()
        )));
    }
    Ok(paths
        .proofs
        .iter()
        .zip(leaves)
        .map(|(path, leaf)| MerkleOpening::from_hint(path, leaf))
        .collect())
}

/// Verifies a single opening against `root`.
pub fn verify_opening<F, C>(
    compression: &C,
    opening: &MerkleOpening<F>,
    root: F,
) -> Result<(), VerifierError>
where
    F: Copy + Eq + Send + Sync,
    C: TwoToOneCompression<F>,
{
    verify_openings(compression, std::slice::from_ref(opening), root)
}

/// Verifies every opening against `root`.
///
/// Paths are checked independently; the reported failure is always the first one in order.
#[instrument(skip_all, fields(num_openings = openings.len()))]
pub fn verify_openings<F, C>(
    compression: &C,
    openings: &[MerkleOpening<F>],
    root: F,
) -> Result<(), VerifierError>
where
    F: Copy + Eq + Send + Sync,
    C: TwoToOneCompression<F>,
{
    let roots: Vec<Option<F>> = openings
        .par_iter()
        .map(|opening| opening.compute_root(compression))
        .collect();

    for (position, computed) in roots.into_iter().enumerate() {
        match computed {
            None => {
                return Err(VerifierError::MerkleProofInvalid {
                    position,
                    reason: "leaf or index does not fit the tree".to_string(),
                });
            }
            Some(computed) if computed != root => {
                return Err(VerifierError::MerkleProofInvalid {
                    position,
                    reason: "computed root differs from the commitment".to_string(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Untrusted lookup of a query among the opened leaf indexes.
pub trait IndexOracle {
    fn index_of(&self, target: u64, indexes: &[u64]) -> Option<usize>;
}

/// Linear scan over the opened indexes.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinearIndexOracle;

impl IndexOracle for LinearIndexOracle {
    fn index_of(&self, target: u64, indexes: &[u64]) -> Option<usize> {
        indexes.iter().position(|&index| index == target)
    }
}

/// How STIR queries are tied to the opened Merkle leaves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QueryBinding {
    /// One opening per query, in query order.
    #[default]
    Positional,
    /// Every query is among the openings, which may be deduplicated.
    Membership,
}

impl QueryBinding {
    /// Checks `queries` against `opened`, re-asserting whatever `oracle` answers.
    pub fn check<O: IndexOracle>(
        self,
        oracle: &O,
        queries: &[usize],
        opened: &[u64],
    ) -> Result<(), VerifierError> {
        match self {
            Self::Positional => {
                if queries.len() != opened.len() {
                    return Err(VerifierError::QueryIndexMismatch {
                        position: queries.len().min(opened.len()),
                        reason: format!("{} queries but {} openings", queries.len(), opened.len()),
                    });
                }
                for (position, (&query, &index)) in queries.iter().zip(opened).enumerate() {
                    if query as u64 != index {
                        return Err(VerifierError::QueryIndexMismatch {
                            position,
                            reason: format!("query {query} but leaf {index} was opened"),
                        });
                    }
                }
            }
            Self::Membership => {
                for (position, &query) in queries.iter().enumerate() {
                    let found = oracle
                        .index_of(query as u64, opened)
                        .and_then(|slot| opened.get(slot))
                        .is_some_and(|&index| index == query as u64);
                    if !found {
                        return Err(VerifierError::QueryIndexMismatch {
                            position,
                            reason: format!("query {query} is not among the openings"),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Checks a proof-of-work nonce: `c(challenge, nonce) <= p >> bits`.
///
/// The challenge is read little-endian and the nonce big-endian. Zero bits always pass.
pub fn verify_pow<F, C>(
    compression: &C,
    challenge: &[u8],
    nonce: &[u8],
    bits: usize,
) -> Result<(), VerifierError>
where
    F: PrimeField,
    C: TwoToOneCompression<F>,
{
    if bits == 0 {
        return Ok(());
    }
    let hash = compression.compress(field_from_le_bytes(challenge), field_from_be_bytes(nonce));
    if hash.as_canonical_biguint() <= pow_threshold::<F>(bits) {
        Ok(())
    } else {
        Err(VerifierError::PowInvalid { bits })
    }
}

/// Largest digest accepted for `bits` bits of proof-of-work.
#[must_use]
pub fn pow_threshold<F: PrimeField>(bits: usize) -> BigUint {
    F::order() >> bits
}

/// A full Merkle tree, used to produce openings in tests and fixtures.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Clone, Debug)]
pub struct MerkleTree<F> {
    leaves: Vec<Vec<F>>,
    /// `levels[0]` holds the leaf digests, the last level holds the root.
    levels: Vec<Vec<F>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl<F: PrimeField> MerkleTree<F> {
    /// Builds the tree over a power-of-two number (at least two) of leaves.
    pub fn new<C: TwoToOneCompression<F>>(compression: &C, leaves: Vec<Vec<F>>) -> Self {
        assert!(leaves.len() >= 2 && leaves.len().is_power_of_two());
        let digests: Vec<F> = leaves
            .iter()
            .map(|leaf| hash_leaf(compression, leaf).expect("leaves hold at least two values"))
            .collect();
        let mut levels = vec![digests];
        while levels.last().map_or(0, Vec::len) > 1 {
            let next = levels
                .last()
                .unwrap()
                .chunks_exact(2)
                .map(|pair| compression.compress(pair[0], pair[1]))
                .collect();
            levels.push(next);
        }
        Self { leaves, levels }
    }

    #[must_use]
    pub fn root(&self) -> F {
        self.levels.last().unwrap()[0]
    }

    #[must_use]
    pub fn leaf(&self, index: usize) -> &[F] {
        &self.leaves[index]
    }

    #[must_use]
    pub fn open(&self, index: usize) -> MerkleOpening<F> {
        let height = self.levels.len() - 1;
        MerkleOpening {
            leaf: self.leaves[index].clone(),
            index: index as u64,
            sibling: self.levels[0][index ^ 1],
            auth_path: (1..height)
                .map(|level| self.levels[level][(index >> level) ^ 1])
                .collect(),
        }
    }

    /// Opening in the hint layout: little-endian digests, root-first authentication path.
    #[must_use]
    pub fn hint_path(&self, index: usize) -> Path {
        let opening = self.open(index);
        Path {
            leaf_sibling_hash: field_to_le_bytes(&opening.sibling),
            auth_path: opening
                .auth_path
                .iter()
                .rev()
                .map(field_to_le_bytes)
                .collect(),
            leaf_index: opening.index,
        }
    }
}
