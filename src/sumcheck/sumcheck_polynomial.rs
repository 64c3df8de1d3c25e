use p3_field::Field;

use crate::poly::coeffs::horner;

/// Quadratic round polynomial `h`, sent as its evaluations at `0`, `1` and `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SumcheckPolynomial<F> {
    evaluations: [F; 3],
}

impl<F: Field> SumcheckPolynomial<F> {
    #[must_use]
    pub const fn new(evaluations: [F; 3]) -> Self {
        Self { evaluations }
    }

    /// Builds the polynomial from a slice of exactly three evaluations.
    #[must_use]
    pub fn from_slice(evaluations: &[F]) -> Option<Self> {
        evaluations.try_into().ok().map(Self::new)
    }

    #[must_use]
    pub const fn evaluations(&self) -> &[F; 3] {
        &self.evaluations
    }

    /// `h(0) + h(1)`.
    #[must_use]
    pub fn sum_over_boolean_hypercube(&self) -> F {
        self.evaluations[0] + self.evaluations[1]
    }

    /// Coefficients `[b0, b1, b2]` of `h(x) = b0 + b1 x + b2 x^2`.
    ///
    /// - `b0 = e0`
    /// - `b1 = (-e2 + 4 e1 - 3 e0) / 2`
    /// - `b2 = (e2 - 2 e1 + e0) / 2`
    #[must_use]
    pub fn coefficients(&self) -> [F; 3] {
        let [e0, e1, e2] = self.evaluations;
        let inv_two = F::TWO.inverse();
        let three = F::TWO + F::ONE;
        let four = F::TWO.double();

        let b1 = (four * e1 - e2 - three * e0) * inv_two;
        let b2 = (e2 - e1.double() + e0) * inv_two;
        [e0, b1, b2]
    }

    /// Evaluates `h(r)`.
    #[must_use]
    pub fn evaluate_at(&self, r: F) -> F {
        horner(&self.coefficients(), r)
    }
}

/// Cubic round polynomial `p`, sent as its coefficients `[c0, c1, c2, c3]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CubicSumcheckPolynomial<F> {
    coefficients: [F; 4],
}

impl<F: Field> CubicSumcheckPolynomial<F> {
    #[must_use]
    pub const fn new(coefficients: [F; 4]) -> Self {
        Self { coefficients }
    }

    #[must_use]
    pub fn from_slice(coefficients: &[F]) -> Option<Self> {
        coefficients.try_into().ok().map(Self::new)
    }

    #[must_use]
    pub const fn coefficients(&self) -> &[F; 4] {
        &self.coefficients
    }

    /// `p(0) + p(1) = 2 c0 + c1 + c2 + c3`.
    #[must_use]
    pub fn sum_over_boolean_hypercube(&self) -> F {
        let [c0, c1, c2, c3] = self.coefficients;
        c0.double() + c1 + c2 + c3
    }

    #[must_use]
    pub fn evaluate_at(&self, r: F) -> F {
        horner(&self.coefficients, r)
    }
}
