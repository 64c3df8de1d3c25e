use p3_field::Field;
use tracing::instrument;

use super::{MatrixCell, R1cs, R1csError};
use crate::poly::{evals::EvaluationsList, multilinear::MultilinearPoint};

const MATRIX_NAMES: [char; 3] = ['A', 'B', 'C'];

fn lookup<F: Copy>(
    table: &[F],
    index: usize,
    matrix: char,
    axis: &'static str,
) -> Result<F, R1csError> {
    table
        .get(index)
        .copied()
        .ok_or(R1csError::IndexOutOfRange {
            matrix,
            axis,
            index,
            size: table.len(),
        })
}

/// `sum v * row[r] * col[c]` over the entries of one matrix.
fn evaluate_cells<F: Field>(
    cells: &[MatrixCell<F>],
    matrix: char,
    row_eq: &[F],
    col_eq: &[F],
) -> Result<F, R1csError> {
    cells.iter().try_fold(F::ZERO, |acc, cell| {
        let row = lookup(row_eq, cell.row, matrix, "row")?;
        let col = lookup(col_eq, cell.column, matrix, "column")?;
        Ok(acc + cell.value * row * col)
    })
}

/// Evaluates the multilinear extensions of `A`, `B` and `C` at `(row_rand, col_rand)`.
///
/// Both points are big-endian: their first coordinate selects the most significant bit of a
/// row or column index.
#[instrument(skip_all, fields(rows = row_rand.num_variables(), cols = col_rand.num_variables()))]
pub fn evaluate_matrix_extension<F: Field>(
    r1cs: &R1cs<F>,
    row_rand: &MultilinearPoint<F>,
    col_rand: &MultilinearPoint<F>,
) -> Result<[F; 3], R1csError> {
    let row_eq = EvaluationsList::eq_table(row_rand);
    let col_eq = EvaluationsList::eq_table(col_rand);

    let mut out = [F::ZERO; 3];
    for ((value, cells), name) in out.iter_mut().zip(&r1cs.matrices).zip(MATRIX_NAMES) {
        *value = evaluate_cells(cells, name, row_eq.evals(), col_eq.evals())?;
    }
    Ok(out)
}

/// Evaluates the matrix extensions split between two witness commitments.
///
/// Columns below `w1_size` belong to the first commitment and are evaluated at `col[c]`,
/// the others to the second one at `col[c - w1_size]`. The output is
/// `[Az1, Bz1, Cz1, Az2, Bz2, Cz2]`.
#[instrument(skip_all, fields(w1_size))]
pub fn evaluate_matrix_extension_batched<F: Field>(
    r1cs: &R1cs<F>,
    row_rand: &MultilinearPoint<F>,
    col_rand: &MultilinearPoint<F>,
    w1_size: usize,
) -> Result<[F; 6], R1csError> {
    let row_eq = EvaluationsList::eq_table(row_rand);
    let col_eq = EvaluationsList::eq_table(col_rand);

    let mut out = [F::ZERO; 6];
    for (i, (cells, name)) in r1cs.matrices.iter().zip(MATRIX_NAMES).enumerate() {
        for cell in cells {
            let row = lookup(row_eq.evals(), cell.row, name, "row")?;
            let (slot, column) = if cell.column < w1_size {
                (i, cell.column)
            } else {
                (i + 3, cell.column - w1_size)
            };
            let col = lookup(col_eq.evals(), column, name, "column")?;
            out[slot] += cell.value * row * col;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use p3_baby_bear::BabyBear;
    use p3_field::PrimeCharacteristicRing;

    use super::*;

    type F = BabyBear;

    fn r1cs(a: Vec<MatrixCell<F>>, b: Vec<MatrixCell<F>>, c: Vec<MatrixCell<F>>) -> R1cs<F> {
        R1cs {
            num_public_inputs: 0,
            num_witnesses: 4,
            num_constraints: 4,
            matrices: [a, b, c],
        }
    }

    fn point(values: &[u64]) -> MultilinearPoint<F> {
        MultilinearPoint(values.iter().copied().map(F::from_u64).collect())
    }

    #[test]
    fn test_zero_matrix_evaluates_to_zero() {
        let out = evaluate_matrix_extension(&r1cs(vec![], vec![], vec![]), &point(&[3, 4]), &point(&[5, 6]))
            .unwrap();
        assert_eq!(out, [F::ZERO; 3]);
    }

    #[test]
    fn test_single_entry() {
        let value = F::from_u64(9);
        let cell = MatrixCell { row: 2, column: 1, value };
        let (row_rand, col_rand) = (point(&[3, 4]), point(&[5, 6]));
        let out = evaluate_matrix_extension(&r1cs(vec![], vec![cell], vec![]), &row_rand, &col_rand)
            .unwrap();

        // Row 2 is (1, 0), column 1 is (0, 1).
        let expected = value
            * (F::from_u64(3) * (F::ONE - F::from_u64(4)))
            * ((F::ONE - F::from_u64(5)) * F::from_u64(6));
        assert_eq!(out, [F::ZERO, expected, F::ZERO]);
        assert_eq!(expected, value * row_rand.eq_poly(2) * col_rand.eq_poly(1));
    }

    #[test]
    fn test_out_of_range_entry() {
        let cell = MatrixCell { row: 4, column: 0, value: F::ONE };
        assert!(matches!(
            evaluate_matrix_extension(&r1cs(vec![cell], vec![], vec![]), &point(&[1, 2]), &point(&[3, 4])),
            Err(R1csError::IndexOutOfRange { matrix: 'A', axis: "row", index: 4, size: 4 })
        ));
    }

    #[test]
    fn test_batched_split_by_column() {
        let (row_rand, col_rand) = (point(&[3, 4]), point(&[5, 6]));
        let low = MatrixCell { row: 1, column: 1, value: F::from_u64(2) };
        let high = MatrixCell { row: 3, column: 6, value: F::from_u64(7) };
        let r1cs = r1cs(vec![low], vec![], vec![high]);

        let out = evaluate_matrix_extension_batched(&r1cs, &row_rand, &col_rand, 4).unwrap();
        assert_eq!(out[0], F::from_u64(2) * row_rand.eq_poly(1) * col_rand.eq_poly(1));
        assert_eq!(out[5], F::from_u64(7) * row_rand.eq_poly(3) * col_rand.eq_poly(2));
        assert_eq!([out[1], out[2], out[3], out[4]], [F::ZERO; 4]);

        // With every column in the first commitment the split is the plain evaluation.
        let single = evaluate_matrix_extension(&r1cs, &row_rand, &point(&[5, 6, 7])).unwrap();
        let batched = evaluate_matrix_extension_batched(&r1cs, &row_rand, &point(&[5, 6, 7]), 8).unwrap();
        assert_eq!(single, [batched[0], batched[1], batched[2]]);
    }
}
