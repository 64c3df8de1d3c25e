use p3_field::Field;

use super::committer::reader::ParsedCommitment;

/// Linear claims on the polynomials of one commitment.
///
/// `claims[b][i]` is the claimed value of the `i`-th linear statement on polynomial `b` of the
/// batch. The weight polynomials of the statements are never evaluated by the WHIR verifier:
/// their values at the folding point are deferred to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Statement<F> {
    pub claims: Vec<Vec<F>>,
}

impl<F: Field> Statement<F> {
    #[must_use]
    pub const fn new(claims: Vec<Vec<F>>) -> Self {
        Self { claims }
    }

    /// Number of linear statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.first().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends one statement given its claim on every polynomial of the batch.
    pub fn add_claim(&mut self, values: &[F]) {
        if self.claims.is_empty() {
            self.claims = vec![Vec::new(); values.len()];
        }
        assert_eq!(self.claims.len(), values.len());
        for (row, &value) in self.claims.iter_mut().zip(values) {
            row.push(value);
        }
    }

    /// Claims of the collapsed polynomial, e.g. `f + B * g` for a batch of two.
    #[must_use]
    pub fn combined(&self, commitment: &ParsedCommitment<F>) -> Vec<F> {
        commitment.combine(&self.claims)
    }

    /// Whether every statement carries one claim per polynomial of a batch of `batch_size`.
    #[must_use]
    pub fn fits_batch(&self, batch_size: usize) -> bool {
        self.claims.is_empty()
            || (self.claims.len() == batch_size
                && self.claims.iter().all(|row| row.len() == self.len()))
    }
}

#[cfg(test)]
mod tests {
    use p3_baby_bear::BabyBear;
    use p3_field::PrimeCharacteristicRing;

    use super::*;

    type F = BabyBear;

    #[test]
    fn test_combined_claims() {
        let mut statement = Statement::default();
        statement.add_claim(&[F::from_u64(1), F::from_u64(2)]);
        statement.add_claim(&[F::from_u64(3), F::from_u64(4)]);
        assert_eq!(statement.len(), 2);
        assert!(statement.fits_batch(2));
        assert!(!statement.fits_batch(1));

        let commitment = ParsedCommitment {
            root: F::ZERO,
            ood_points: vec![],
            ood_answers: vec![vec![], vec![]],
            batching_randomness: F::from_u64(10),
        };
        assert_eq!(
            statement.combined(&commitment),
            vec![F::from_u64(21), F::from_u64(43)]
        );
    }

    #[test]
    fn test_empty_statement() {
        let statement = Statement::<F>::default();
        assert!(statement.is_empty());
        assert!(statement.fits_batch(3));
    }
}
