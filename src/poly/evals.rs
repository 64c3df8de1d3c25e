use p3_field::Field;
use p3_maybe_rayon::prelude::*;
use p3_util::log2_strict_usize;

use super::multilinear::MultilinearPoint;

/// Evaluations of a multilinear polynomial over the boolean hypercube.
///
/// Index `i` holds `f(b)` where `b` is the big-endian bit decomposition of `i`: the first
/// coordinate of a [`MultilinearPoint`] is the most significant bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationsList<F> {
    evals: Vec<F>,
    num_variables: usize,
}

impl<F> EvaluationsList<F>
where
    F: Field,
{
    /// Constructs an `EvaluationsList` from a vector of evaluations.
    ///
    /// # Panics
    /// Panics if the length is not a power of two.
    #[must_use]
    pub fn new(evals: Vec<F>) -> Self {
        let num_variables = log2_strict_usize(evals.len());
        Self {
            evals,
            num_variables,
        }
    }

    /// The table `eq(point, b)` for every `b` of the hypercube.
    ///
    /// Built from the last coordinate backwards so that the first coordinate lands on the most
    /// significant bit.
    #[must_use]
    pub fn eq_table(point: &MultilinearPoint<F>) -> Self {
        let n = point.num_variables();
        let mut table = vec![F::ZERO; 1 << n];
        table[0] = F::ONE;
        let mut size = 1;
        for (depth, &r) in point.iter().rev().enumerate() {
            let stride = 1 << depth;
            debug_assert_eq!(stride, size);
            for i in 0..size {
                let v = table[i];
                table[i + stride] = v * r;
                table[i] = v - table[i + stride];
            }
            size <<= 1;
        }
        Self::new(table)
    }

    #[must_use]
    pub const fn num_variables(&self) -> usize {
        self.num_variables
    }

    #[must_use]
    pub fn num_evals(&self) -> usize {
        self.evals.len()
    }

    #[must_use]
    pub fn evals(&self) -> &[F] {
        &self.evals
    }

    #[must_use]
    pub fn into_evals(self) -> Vec<F> {
        self.evals
    }

    /// Evaluates the multilinear extension at `point`.
    ///
    /// # Panics
    /// Panics if the point does not have `num_variables` coordinates.
    #[must_use]
    pub fn evaluate(&self, point: &MultilinearPoint<F>) -> F {
        assert_eq!(self.num_variables, point.num_variables());
        let eq = Self::eq_table(point);
        self.evals
            .par_iter()
            .zip(eq.evals.par_iter())
            .map(|(&e, &w)| e * w)
            .sum()
    }

    /// Fixes the variable of the lowest index bit to `r`.
    #[must_use]
    pub fn fold_lsb(&self, r: F) -> Self {
        assert!(self.num_variables > 0);
        Self::new(
            self.evals
                .chunks_exact(2)
                .map(|pair| pair[0] + r * (pair[1] - pair[0]))
                .collect(),
        )
    }
}
