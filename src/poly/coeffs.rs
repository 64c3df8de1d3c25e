use p3_field::Field;
use p3_util::log2_strict_usize;

use super::{evals::EvaluationsList, multilinear::MultilinearPoint};

/// A multilinear polynomial in coefficient form.
///
/// Bit `j` of a coefficient index (counted from the least significant bit) is the exponent of
/// variable `X_{n-1-j}`, so the last coordinate of a [`MultilinearPoint`] drives the lowest bit.
/// Read as a univariate, `c_i` is the coefficient of `y^i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoefficientList<F> {
    coeffs: Vec<F>,
    num_variables: usize,
}

impl<F> CoefficientList<F>
where
    F: Field,
{
    /// Create a new `CoefficientList` from a vector of coefficients.
    ///
    /// # Panics
    /// Panics if the number of coefficients is not a power of two.
    #[must_use]
    pub fn new(coeffs: Vec<F>) -> Self {
        let num_variables = log2_strict_usize(coeffs.len());

        Self {
            coeffs,
            num_variables,
        }
    }

    #[must_use]
    pub const fn num_variables(&self) -> usize {
        self.num_variables
    }

    #[must_use]
    pub fn num_coeffs(&self) -> usize {
        self.coeffs.len()
    }

    #[must_use]
    pub fn coeffs(&self) -> &[F] {
        &self.coeffs
    }

    /// Evaluate the polynomial as a univariate at `point` (Horner).
    #[must_use]
    pub fn evaluate_at_univariate(&self, point: F) -> F {
        horner(&self.coeffs, point)
    }

    /// Evaluate the multilinear polynomial at `point`.
    ///
    /// # Panics
    /// Panics if the point does not have `num_variables` coordinates.
    #[must_use]
    pub fn evaluate(&self, point: &MultilinearPoint<F>) -> F {
        assert_eq!(self.num_variables, point.num_variables());
        eval_multivariate(&self.coeffs, point)
    }

    /// Fixes the variable of the lowest coefficient bit to `r`.
    #[must_use]
    pub fn fold_lsb(&self, r: F) -> Self {
        assert!(self.num_variables > 0);
        Self::new(
            self.coeffs
                .chunks_exact(2)
                .map(|pair| pair[0] + r * pair[1])
                .collect(),
        )
    }

    /// Converts to evaluations over the boolean hypercube.
    #[must_use]
    pub fn to_evaluations(&self) -> EvaluationsList<F> {
        let mut evals = self.coeffs.clone();
        wavelet_transform(&mut evals);
        EvaluationsList::new(evals)
    }
}

impl<F: Field> From<EvaluationsList<F>> for CoefficientList<F> {
    fn from(value: EvaluationsList<F>) -> Self {
        let mut coeffs = value.into_evals();
        inverse_wavelet_transform(&mut coeffs);
        Self::new(coeffs)
    }
}

/// Evaluates `c_0 + c_1 x + ... + c_{n-1} x^{n-1}`.
#[must_use]
pub fn horner<F: Field>(coeffs: &[F], x: F) -> F {
    coeffs.iter().rfold(F::ZERO, |acc, &coeff| acc * x + coeff)
}

/// Multivariate evaluation in coefficient form.
///
/// The first coordinate of `point` selects the upper half of `coeffs`.
fn eval_multivariate<F: Field>(coeffs: &[F], point: &[F]) -> F {
    debug_assert_eq!(coeffs.len(), 1 << point.len());
    match point {
        [] => coeffs[0],
        [x] => coeffs[0] + coeffs[1] * *x,
        [x, tail @ ..] => {
            let (b0t, b1t) = coeffs.split_at(coeffs.len() / 2);
            eval_multivariate(b0t, tail) + eval_multivariate(b1t, tail) * *x
        }
    }
}

fn wavelet_transform<F: Field>(values: &mut [F]) {
    let mut half = 1;
    while half < values.len() {
        for chunk in values.chunks_exact_mut(2 * half) {
            let (lo, hi) = chunk.split_at_mut(half);
            for (l, h) in lo.iter().zip(hi.iter_mut()) {
                *h += *l;
            }
        }
        half <<= 1;
    }
}

fn inverse_wavelet_transform<F: Field>(values: &mut [F]) {
    let mut half = 1;
    while half < values.len() {
        for chunk in values.chunks_exact_mut(2 * half) {
            let (lo, hi) = chunk.split_at_mut(half);
            for (l, h) in lo.iter().zip(hi.iter_mut()) {
                *h -= *l;
            }
        }
        half <<= 1;
    }
}
