use std::ops::Deref;

use p3_field::Field;

/// Point (x_1,..., x_n) in F^n for some n.
///
/// Coordinates are big-endian: `x_1` is the variable of the most significant bit of a
/// hypercube index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MultilinearPoint<F>(pub Vec<F>);

impl<F> MultilinearPoint<F>
where
    F: Field,
{
    #[must_use]
    pub fn num_variables(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[F] {
        &self.0
    }

    /// `(y^(2^(n-1)), ..., y^2, y)`.
    ///
    /// A multilinear polynomial with coefficient vector `c` evaluated here equals the
    /// univariate polynomial with the same coefficients evaluated at `y`.
    #[must_use]
    pub fn expand_from_univariate(point: F, num_variables: usize) -> Self {
        let mut coords: Vec<F> = std::iter::successors(Some(point), |y| Some(y.square()))
            .take(num_variables)
            .collect();
        coords.reverse();
        Self(coords)
    }

    /// `eq(self, point) = prod_i (a_i b_i + (1 - a_i)(1 - b_i))` for arbitrary field points.
    #[must_use]
    pub fn eq_poly_outside(&self, point: &Self) -> F {
        assert_eq!(self.num_variables(), point.num_variables());
        self.0
            .iter()
            .zip(&point.0)
            .map(|(&a, &b)| a * b + (F::ONE - a) * (F::ONE - b))
            .product()
    }

    /// Compute eq(coords, index) for a hypercube index, read big-endian over the coordinates.
    #[must_use]
    pub fn eq_poly(&self, index: usize) -> F {
        let n = self.num_variables();
        assert!(n >= usize::BITS as usize || index >> n == 0);

        self.0
            .iter()
            .rev()
            .enumerate()
            .map(|(bit, &val)| {
                if (index >> bit) & 1 == 1 {
                    val
                } else {
                    F::ONE - val
                }
            })
            .product()
    }

    /// Returns the point with its coordinates in reverse order.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self(self.0.iter().rev().copied().collect())
    }

    /// The first `n` coordinates.
    #[must_use]
    pub fn prefix(&self, n: usize) -> Self {
        Self(self.0[..n].to_vec())
    }
}

impl<F> Deref for MultilinearPoint<F> {
    type Target = [F];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<F> From<F> for MultilinearPoint<F> {
    fn from(value: F) -> Self {
        Self(vec![value])
    }
}
