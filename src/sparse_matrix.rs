
use crate::errors::{KmerError, Result};

/// Immutable compressed sparse row (CSR) matrix with `f32` values.
/// Rows index k-mers and columns index sequences for a design matrix, but nothing here depends on that.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseMatrix {
    rows: usize,
    cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<u32>,
    values: Vec<f32>
}

impl SparseMatrix {
    /// Builds a matrix from raw CSR arrays after validating their consistency.
    /// # Arguments
    /// * `rows` - the number of rows
    /// * `cols` - the number of columns
    /// * `row_ptr` - the `rows+1` offsets of each row into `col_idx` and `values`
    /// * `col_idx` - the column of each stored value, ascending within a row
    /// * `values` - the stored values
    /// # Examples
    /// ```rust
    /// use kmers::sparse_matrix::SparseMatrix;
    /// // [[1, 0], [0, 2], [0, 0]]
    /// let m = SparseMatrix::from_csr(3, 2, vec![0, 1, 2, 2], vec![0, 1], vec![1.0, 2.0]).unwrap();
    /// assert_eq!(m.nnz(), 2);
    /// assert!(SparseMatrix::from_csr(3, 2, vec![0, 1, 2], vec![0, 1], vec![1.0, 2.0]).is_err());
    /// ```
    pub fn from_csr(rows: usize, cols: usize, row_ptr: Vec<usize>, col_idx: Vec<u32>, values: Vec<f32>) -> Result<Self> {
        if row_ptr.len() != rows + 1 {
            return Err(KmerError::DimensionMismatch { what: "row pointer length", expected: rows + 1, found: row_ptr.len() });
        }
        if col_idx.len() != values.len() {
            return Err(KmerError::DimensionMismatch { what: "column index length", expected: values.len(), found: col_idx.len() });
        }
        if row_ptr[0] != 0 || row_ptr[rows] != values.len() || row_ptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(KmerError::CorruptFile("row pointers must rise monotonically from 0 to nnz".to_string()));
        }
        if let Some(&c) = col_idx.iter().find(|&&c| c as usize >= cols) {
            return Err(KmerError::CorruptFile(format!("column index {} outside [0, {})", c, cols)));
        }
        //lookups binary search inside a row
        for r in 0..rows {
            if col_idx[row_ptr[r]..row_ptr[r + 1]].windows(2).any(|w| w[0] >= w[1]) {
                return Err(KmerError::CorruptFile(format!("column indices of row {} are not strictly ascending", r)));
            }
        }
        Ok(Self::from_csr_unchecked(rows, cols, row_ptr, col_idx, values))
    }

    /// Used by the builder, which produces consistent arrays by construction.
    pub(crate) fn from_csr_unchecked(rows: usize, cols: usize, row_ptr: Vec<usize>, col_idx: Vec<u32>, values: Vec<f32>) -> Self {
        Self { rows, cols, row_ptr, col_idx, values }
    }

    /// Builds a matrix from `(row, column, value)` triplets; duplicate coordinates are summed.
    /// # Arguments
    /// * `rows` - the number of rows
    /// * `cols` - the number of columns
    /// * `triplets` - the entries, in any order
    /// # Examples
    /// ```rust
    /// use kmers::sparse_matrix::SparseMatrix;
    /// let m = SparseMatrix::from_triplets(2, 2, &[(1, 0, 0.25), (0, 1, 1.0), (1, 0, 0.75)]).unwrap();
    /// assert_eq!(m.nnz(), 2);
    /// assert_eq!(m.get(1, 0), 1.0);
    /// ```
    pub fn from_triplets(rows: usize, cols: usize, triplets: &[(usize, usize, f32)]) -> Result<Self> {
        let mut sorted: Vec<(usize, usize, f32)> = triplets.to_vec();
        for &(r, c, _) in sorted.iter() {
            if r >= rows || c >= cols {
                return Err(KmerError::Parse(format!("triplet ({}, {}) outside a {}x{} matrix", r, c, rows, cols)));
            }
        }
        //stable so that duplicates are summed in input order
        sorted.sort_by_key(|&(r, c, _)| (r, c));

        let mut row_ptr: Vec<usize> = vec![0; rows + 1];
        let mut col_idx: Vec<u32> = Vec::with_capacity(sorted.len());
        let mut values: Vec<f32> = Vec::with_capacity(sorted.len());
        let mut last: Option<(usize, usize)> = None;
        for (r, c, v) in sorted {
            if last == Some((r, c)) {
                if let Some(tail) = values.last_mut() {
                    *tail += v;
                }
            } else {
                row_ptr[r + 1] += 1;
                col_idx.push(c as u32);
                values.push(v);
                last = Some((r, c));
            }
        }
        for r in 0..rows {
            row_ptr[r + 1] += row_ptr[r];
        }
        Ok(Self::from_csr_unchecked(rows, cols, row_ptr, col_idx, values))
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of stored (non-zero) values
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    #[inline]
    pub fn col_indices(&self) -> &[u32] {
        &self.col_idx
    }

    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Iterates the `(column, value)` pairs stored in row `row`.
    #[inline]
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f32)> + '_ {
        let (start, end) = (self.row_ptr[row], self.row_ptr[row + 1]);
        self.col_idx[start..end].iter()
            .zip(self.values[start..end].iter())
            .map(|(&c, &v)| (c as usize, v))
    }

    /// Returns the value at `(row, col)`, zero if nothing is stored there.
    pub fn get(&self, row: usize, col: usize) -> f32 {
        let (start, end) = (self.row_ptr[row], self.row_ptr[row + 1]);
        match self.col_idx[start..end].binary_search(&(col as u32)) {
            Ok(offset) => self.values[start + offset],
            Err(_) => 0.0
        }
    }

    /// Sum of each column, accumulated in `f64`.
    pub fn column_sums(&self) -> Vec<f64> {
        let mut sums: Vec<f64> = vec![0.0; self.cols];
        for (&c, &v) in self.col_idx.iter().zip(self.values.iter()) {
            sums[c as usize] += v as f64;
        }
        sums
    }

    /// Computes `X * x`, a vector with one entry per row.
    /// # Arguments
    /// * `x` - a vector with one entry per column
    /// # Examples
    /// ```rust
    /// use kmers::sparse_matrix::SparseMatrix;
    /// let m = SparseMatrix::from_triplets(3, 2, &[(0, 0, 1.0), (1, 1, 2.0), (2, 0, 0.5), (2, 1, 0.5)]).unwrap();
    /// assert_eq!(m.mul_vec(&[2.0, 4.0]), vec![2.0, 8.0, 3.0]);
    /// ```
    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        debug_assert_eq!(x.len(), self.cols);
        (0..self.rows)
            .map(|r| self.row(r).map(|(c, v)| v as f64 * x[c]).sum())
            .collect()
    }

    /// Computes `X^T * y`, a vector with one entry per column.
    /// # Arguments
    /// * `y` - a vector with one entry per row
    /// # Examples
    /// ```rust
    /// use kmers::sparse_matrix::SparseMatrix;
    /// let m = SparseMatrix::from_triplets(3, 2, &[(0, 0, 1.0), (1, 1, 2.0), (2, 0, 0.5), (2, 1, 0.5)]).unwrap();
    /// assert_eq!(m.mul_transpose_vec(&[1.0, 1.0, 2.0]), vec![2.0, 3.0]);
    /// ```
    pub fn mul_transpose_vec(&self, y: &[f64]) -> Vec<f64> {
        debug_assert_eq!(y.len(), self.rows);
        let mut ret: Vec<f64> = vec![0.0; self.cols];
        for (r, &yr) in y.iter().enumerate() {
            if yr == 0.0 {
                continue;
            }
            for (c, v) in self.row(r) {
                ret[c] += v as f64 * yr;
            }
        }
        ret
    }
}
