//! R1CS instances in their interned sparse form, and the multilinear extension of their
//! matrices.

use std::path::Path;

use p3_field::Field;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::{ConfigError, load_json},
    constant::R1CS_MATRICES,
    fiat_shamir::hints::{Fp256, HintDeserialize, HintError},
};

pub mod matrix_extension;

/// Errors raised while decoding an R1CS instance.
#[derive(Debug, Error)]
pub enum R1csError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid interner hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid interner encoding: {0}")]
    Interner(#[from] HintError),

    /// Row boundaries are not increasing or point past the entries.
    #[error("matrix {matrix}: row {row} has invalid boundaries")]
    RowBoundaries { matrix: char, row: usize },

    /// The entry arrays of a matrix have different lengths.
    #[error("matrix {matrix}: {cols} column indices for {values} values")]
    EntryCount {
        matrix: char,
        cols: usize,
        values: usize,
    },

    /// An entry refers to a value that is not in the interner.
    #[error("matrix {matrix}: value index {index} exceeds the {len} interned values")]
    UnknownValue {
        matrix: char,
        index: u64,
        len: usize,
    },

    /// A row or column does not fit the hypercube it is evaluated on.
    #[error("matrix {matrix}: {axis} {index} is outside a hypercube of {size} points")]
    IndexOutOfRange {
        matrix: char,
        axis: &'static str,
        index: usize,
        size: usize,
    },
}

/// One matrix in compressed sparse row form, values referring to the interner.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseMatrix {
    pub num_rows: u64,
    pub num_cols: u64,
    /// Row `i` owns the entries from `new_row_indices[i]` up to the start of row `i + 1`.
    pub new_row_indices: Vec<u64>,
    pub col_indices: Vec<u64>,
    pub values: Vec<u64>,
}

/// Interned field values, as a hex string of a length-prefixed list of 4-limb scalars.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternerAsString {
    pub values: String,
}

impl InternerAsString {
    pub fn decode(&self) -> Result<Vec<Fp256>, R1csError> {
        let digits = self.values.strip_prefix("0x").unwrap_or(&self.values);
        let bytes = hex::decode(digits)?;
        Ok(Vec::<Fp256>::decode("interner", &bytes)?)
    }
}

/// R1CS file emitted by the circuit compiler.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct R1csFile {
    pub public_inputs: u64,
    pub witnesses: u64,
    pub constraints: u64,
    pub interner: InternerAsString,
    pub a: SparseMatrix,
    pub b: SparseMatrix,
    pub c: SparseMatrix,
}

impl R1csFile {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, R1csError> {
        Ok(load_json(path)?)
    }
}

/// A non-zero matrix entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatrixCell<F> {
    pub row: usize,
    pub column: usize,
    pub value: F,
}

/// A decoded R1CS instance: entries of `A`, `B` and `C` with their values resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct R1cs<F> {
    pub num_public_inputs: usize,
    pub num_witnesses: usize,
    pub num_constraints: usize,
    pub matrices: [Vec<MatrixCell<F>>; R1CS_MATRICES],
}

impl<F: Field> R1cs<F> {
    /// Resolves every matrix entry against the interner.
    pub fn decode(file: &R1csFile) -> Result<Self, R1csError> {
        let interner: Vec<F> = file.interner.decode()?.iter().map(Fp256::to_field).collect();
        Ok(Self {
            num_public_inputs: file.public_inputs as usize,
            num_witnesses: file.witnesses as usize,
            num_constraints: file.constraints as usize,
            matrices: [
                decode_matrix('A', &file.a, &interner)?,
                decode_matrix('B', &file.b, &interner)?,
                decode_matrix('C', &file.c, &interner)?,
            ],
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, R1csError> {
        Self::decode(&R1csFile::from_file(path)?)
    }

    #[must_use]
    pub const fn a(&self) -> &Vec<MatrixCell<F>> {
        &self.matrices[0]
    }

    #[must_use]
    pub const fn b(&self) -> &Vec<MatrixCell<F>> {
        &self.matrices[1]
    }

    #[must_use]
    pub const fn c(&self) -> &Vec<MatrixCell<F>> {
        &self.matrices[2]
    }
}

/// Expands the compressed rows of `matrix`.
///
/// The last row runs to the end of the entries; an empty row repeats its start.
fn decode_matrix<F: Field>(
    name: char,
    matrix: &SparseMatrix,
    interner: &[F],
) -> Result<Vec<MatrixCell<F>>, R1csError> {
    let num_entries = matrix.values.len();
    if matrix.col_indices.len() != num_entries {
        return Err(R1csError::EntryCount {
            matrix: name,
            cols: matrix.col_indices.len(),
            values: num_entries,
        });
    }

    let mut cells = Vec::with_capacity(num_entries);
    for (row, &start) in matrix.new_row_indices.iter().enumerate() {
        let end = matrix
            .new_row_indices
            .get(row + 1)
            .map_or(num_entries as u64, |&next| next);
        if start > end || end > num_entries as u64 {
            return Err(R1csError::RowBoundaries { matrix: name, row });
        }
        for entry in start as usize..end as usize {
            let index = matrix.values[entry];
            let value = *interner
                .get(index as usize)
                .ok_or(R1csError::UnknownValue {
                    matrix: name,
                    index,
                    len: interner.len(),
                })?;
            cells.push(MatrixCell {
                row,
                column: matrix.col_indices[entry] as usize,
                value,
            });
        }
    }
    Ok(cells)
}
