use nalgebra::{DMatrix, DVector};

/// Square matrix in compressed sparse row form with sorted, unique column
/// indices per row.
#[derive(Clone, Debug, Default)]
pub struct SystemMatrix {
    n: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl SystemMatrix {
    /// An `n x n` matrix with no stored entries.
    pub fn empty(n: usize) -> Self {
        Self {
            n,
            row_ptr: vec![0; n + 1],
            col_idx: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn row(&self, r: usize) -> (&[usize], &[f64]) {
        let range = self.row_ptr[r]..self.row_ptr[r + 1];
        (&self.col_idx[range.clone()], &self.values[range])
    }

    /// Stored value at `(r, c)`, zero when the entry is not stored.
    pub fn get(&self, r: usize, c: usize) -> f64 {
        let (cols, vals) = self.row(r);
        cols.binary_search(&c).map(|i| vals[i]).unwrap_or(0.0)
    }

    pub fn diagonal(&self) -> DVector<f64> {
        DVector::from_iterator(self.n, (0..self.n).map(|r| self.get(r, r)))
    }

    pub fn matvec(&self, x: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.n,
            (0..self.n).map(|r| {
                let (cols, vals) = self.row(r);
                cols.iter().zip(vals).map(|(&c, &v)| v * x[c]).sum::<f64>()
            }),
        )
    }

    /// `b - A x`
    pub fn residual(&self, x: &DVector<f64>, b: &DVector<f64>) -> DVector<f64> {
        b - self.matvec(x)
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.n, self.n);
        for r in 0..self.n {
            let (cols, vals) = self.row(r);
            for (&c, &v) in cols.iter().zip(vals) {
                dense[(r, c)] = v;
            }
        }
        dense
    }
}

/// Scatter-add accumulator for a [`SystemMatrix`].
///
/// Entries may be added in any order and any number of times; duplicates are
/// summed by [`SparseBuilder::compress`].
#[derive(Clone, Debug)]
pub struct SparseBuilder {
    n: usize,
    cols: Vec<Vec<usize>>,
    vals: Vec<Vec<f64>>,
}

impl SparseBuilder {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            cols: vec![Vec::new(); n],
            vals: vec![Vec::new(); n],
        }
    }

    /// Start from the entries of an already compressed matrix.
    pub fn from_matrix(matrix: &SystemMatrix) -> Self {
        let mut builder = Self::new(matrix.n());
        for r in 0..matrix.n() {
            let (cols, vals) = matrix.row(r);
            builder.cols[r].extend_from_slice(cols);
            builder.vals[r].extend_from_slice(vals);
        }
        builder
    }

    pub fn n(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn add(&mut self, r: usize, c: usize, value: f64) {
        debug_assert!(r < self.n && c < self.n);
        self.cols[r].push(c);
        self.vals[r].push(value);
    }

    /// Scatter a dense local block into the global rows and columns given.
    pub fn add_block(&mut self, rows: &[usize], cols: &[usize], block: &DMatrix<f64>) {
        debug_assert_eq!(block.shape(), (rows.len(), cols.len()));
        for (i, &r) in rows.iter().enumerate() {
            for (j, &c) in cols.iter().enumerate() {
                self.add(r, c, block[(i, j)]);
            }
        }
    }

    pub fn compress(self) -> SystemMatrix {
        let mut row_ptr = Vec::with_capacity(self.n + 1);
        let mut col_idx = Vec::new();
        let mut values = Vec::new();
        row_ptr.push(0);
        for (mut cols, mut vals) in self.cols.into_iter().zip(self.vals) {
            combine_duplicates(&mut cols, &mut vals);
            col_idx.extend_from_slice(&cols);
            values.extend_from_slice(&vals);
            row_ptr.push(col_idx.len());
        }
        SystemMatrix {
            n: self.n,
            row_ptr,
            col_idx,
            values,
        }
    }
}

/// Combine duplicate column indices by summing their values.
fn combine_duplicates(cols: &mut Vec<usize>, vals: &mut Vec<f64>) {
    if cols.len() <= 1 {
        return;
    }

    let mut p: Vec<usize> = (0..cols.len()).collect();
    p.sort_unstable_by_key(|&i| cols[i]);

    let sorted_cols: Vec<usize> = p.iter().map(|&i| cols[i]).collect();
    let sorted_vals: Vec<f64> = p.iter().map(|&i| vals[i]).collect();

    cols.clear();
    vals.clear();

    let mut curr_col = sorted_cols[0];
    let mut curr_sum = sorted_vals[0];
    for (&c, &v) in sorted_cols.iter().zip(&sorted_vals).skip(1) {
        if c == curr_col {
            curr_sum += v;
        } else {
            cols.push(curr_col);
            vals.push(curr_sum);
            curr_col = c;
            curr_sum = v;
        }
    }
    cols.push(curr_col);
    vals.push(curr_sum);
}
