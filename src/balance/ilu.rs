use super::Preconditioner;
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use tracing::warn;

/// Incomplete LU factorization without fill-in.
///
/// `L` (unit diagonal, not stored) and `U` share the sparsity pattern of the factorized
/// matrix, whose rows must have sorted column indices.
#[derive(Debug, Clone)]
pub struct Ilu0 {
    factors: CsrMatrix<f64>,
    diagonal: Vec<Option<usize>>,
    replaced_pivots: usize,
}

impl Ilu0 {
    /// Factorize `a`. Zero pivots are replaced by one.
    pub fn new(a: &CsrMatrix<f64>) -> Self {
        let mut factors = a.clone();
        let n = factors.nrows();
        let mut replaced_pivots = 0;
        let diagonal: Vec<Option<usize>> = {
            let (offsets, cols, _) = factors.csr_data();
            (0..n)
                .map(|i| {
                    cols[offsets[i]..offsets[i + 1]]
                        .binary_search(&i)
                        .ok()
                        .map(|k| offsets[i] + k)
                })
                .collect()
        };

        let (offsets, cols, values) = factors.csr_data_mut();
        for i in 0..n {
            let row = offsets[i]..offsets[i + 1];
            for p in row.clone() {
                let k = cols[p];
                if k >= i {
                    break;
                }
                let pivot = diagonal[k].map(|d| values[d]).unwrap_or(1.0);
                values[p] /= pivot;
                let l_ik = values[p];
                // a_ij -= l_ik * u_kj for every j > k present in both rows.
                for q in (p + 1)..row.end {
                    let j = cols[q];
                    let row_k = &cols[offsets[k]..offsets[k + 1]];
                    if let Ok(r) = row_k.binary_search(&j) {
                        let u_kj = values[offsets[k] + r];
                        values[q] -= l_ik * u_kj;
                    }
                }
            }
            if let Some(d) = diagonal[i] {
                if values[d] == 0.0 {
                    values[d] = 1.0;
                    replaced_pivots += 1;
                }
            } else {
                replaced_pivots += 1;
            }
        }
        if replaced_pivots > 0 {
            warn!(replaced_pivots, "zero pivots in incomplete LU replaced by one");
        }

        Self {
            factors,
            diagonal,
            replaced_pivots,
        }
    }

    /// Number of pivots that had to be replaced.
    pub fn replaced_pivots(&self) -> usize {
        self.replaced_pivots
    }
}

impl Preconditioner for Ilu0 {
    fn apply(&self, r: &DVector<f64>) -> DVector<f64> {
        let (offsets, cols, values) = self.factors.csr_data();
        let n = r.len();
        let mut z = r.clone();
        for i in 0..n {
            let lower: f64 = (offsets[i]..offsets[i + 1])
                .take_while(|&p| cols[p] < i)
                .map(|p| values[p] * z[cols[p]])
                .sum();
            z[i] -= lower;
        }
        for i in (0..n).rev() {
            let upper: f64 = (offsets[i]..offsets[i + 1])
                .filter(|&p| cols[p] > i)
                .map(|p| values[p] * z[cols[p]])
                .sum();
            let pivot = self.diagonal[i].map(|d| values[d]).unwrap_or(1.0);
            z[i] = (z[i] - upper) / pivot;
        }
        z
    }
}
