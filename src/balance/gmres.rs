use super::Preconditioner;
use crate::results::SolverReport;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;

/// Restarted GMRES with left preconditioning.
///
/// The residual tracked is the preconditioned one, `|M⁻¹(b - Ax)|`. The solve stops once it is
/// below both `abs_tolerance` and `rel_tolerance` times its value at the initial guess.
#[derive(Debug, Clone, Copy)]
pub struct Gmres {
    /// Krylov subspace size per restart.
    pub restart: usize,
    /// Maximum number of restarts.
    pub max_restarts: usize,
    /// Absolute residual tolerance.
    pub abs_tolerance: f64,
    /// Residual tolerance relative to the initial residual.
    pub rel_tolerance: f64,
}

impl Gmres {
    /// Solve `A x = b` starting at `x0`.
    pub fn solve<P: Preconditioner>(
        &self,
        a: &CsrMatrix<f64>,
        preconditioner: &P,
        b: &DVector<f64>,
        x0: DVector<f64>,
    ) -> (DVector<f64>, SolverReport) {
        let m = self.restart.max(1);
        let mut x = x0;
        let mut iterations = 0;
        let mut residual = f64::INFINITY;
        let mut tolerance = None;

        for _ in 0..self.max_restarts {
            let r = preconditioner.apply(&(b - spmv(a, &x)));
            let beta = r.norm();
            residual = beta;
            let tol = *tolerance.get_or_insert(self.rel_tolerance * beta);
            if self.satisfied(beta, tol) {
                return (x, self.report(true, iterations, residual));
            }

            let mut basis = Vec::with_capacity(m + 1);
            basis.push(r / beta);
            let mut h = DMatrix::<f64>::zeros(m + 1, m);
            let mut g = DVector::<f64>::zeros(m + 1);
            g[0] = beta;
            let mut cos = vec![0.0; m];
            let mut sin = vec![0.0; m];
            let mut used = 0;

            for k in 0..m {
                let mut w = preconditioner.apply(&spmv(a, &basis[k]));
                for j in 0..=k {
                    h[(j, k)] = w.dot(&basis[j]);
                    w.axpy(-h[(j, k)], &basis[j], 1.0);
                }
                let next_norm = w.norm();
                h[(k + 1, k)] = next_norm;
                let breakdown = next_norm <= f64::EPSILON * beta;
                if !breakdown {
                    basis.push(w / next_norm);
                }

                for j in 0..k {
                    let (hj, hj1) = (h[(j, k)], h[(j + 1, k)]);
                    h[(j, k)] = cos[j] * hj + sin[j] * hj1;
                    h[(j + 1, k)] = -sin[j] * hj + cos[j] * hj1;
                }
                let (hk, hk1) = (h[(k, k)], h[(k + 1, k)]);
                let rho = hk.hypot(hk1);
                if rho > 0.0 {
                    cos[k] = hk / rho;
                    sin[k] = hk1 / rho;
                } else {
                    cos[k] = 1.0;
                    sin[k] = 0.0;
                }
                h[(k, k)] = cos[k] * hk + sin[k] * hk1;
                h[(k + 1, k)] = 0.0;
                let gk = g[k];
                g[k] = cos[k] * gk;
                g[k + 1] = -sin[k] * gk;

                used = k + 1;
                iterations += 1;
                residual = g[k + 1].abs();
                if breakdown || self.satisfied(residual, tol) {
                    break;
                }
            }

            let mut y = vec![0.0; used];
            for i in (0..used).rev() {
                let sum = ((i + 1)..used).fold(g[i], |acc, j| acc - h[(i, j)] * y[j]);
                y[i] = if h[(i, i)] != 0.0 { sum / h[(i, i)] } else { 0.0 };
            }
            y.iter()
                .zip(basis.iter())
                .for_each(|(yi, v)| x.axpy(*yi, v, 1.0));

            if self.satisfied(residual, tol) {
                return (x, self.report(true, iterations, residual));
            }
        }
        (x, self.report(false, iterations, residual))
    }

    fn satisfied(&self, residual: f64, relative: f64) -> bool {
        residual <= relative && residual <= self.abs_tolerance
    }

    fn report(&self, converged: bool, iterations: usize, residual: f64) -> SolverReport {
        SolverReport {
            converged,
            iterations,
            residual,
        }
    }
}

/// `A x` for a CSR matrix.
pub fn spmv(a: &CsrMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    let (offsets, cols, values) = a.csr_data();
    DVector::from_iterator(
        a.nrows(),
        (0..a.nrows()).map(|i| {
            (offsets[i]..offsets[i + 1])
                .map(|p| values[p] * x[cols[p]])
                .sum::<f64>()
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::{Identity, Ilu0};
    use approx::assert_relative_eq;
    use nalgebra_sparse::CooMatrix;

    fn laplacian(n: usize) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(n, n);
        for i in 0..n {
            coo.push(i, i, 4.0);
            if i > 0 {
                coo.push(i, i - 1, -1.0);
            }
            if i + 1 < n {
                coo.push(i, i + 1, -1.2);
            }
        }
        CsrMatrix::from(&coo)
    }

    fn gmres(restart: usize) -> Gmres {
        Gmres {
            restart,
            max_restarts: 200,
            abs_tolerance: 1e-12,
            rel_tolerance: 1e-12,
        }
    }

    #[test]
    fn diagonal_system() {
        let mut coo = CooMatrix::new(5, 5);
        (0..5).for_each(|i| coo.push(i, i, (i + 1) as f64));
        let a = CsrMatrix::from(&coo);
        let b = DVector::from_element(5, 1.0);
        let (x, report) = gmres(5).solve(&a, &Identity, &b, DVector::zeros(5));
        assert!(report.converged);
        for i in 0..5 {
            assert_relative_eq!(x[i], 1.0 / (i + 1) as f64, epsilon = 1e-10);
        }
    }

    #[test]
    fn restarts_reach_solution() {
        let a = laplacian(40);
        let b = DVector::from_fn(40, |i, _| (i % 3) as f64 - 1.0);
        let (x, report) = gmres(5).solve(&a, &Identity, &b, DVector::zeros(40));
        assert!(report.converged);
        assert!((spmv(&a, &x) - &b).norm() < 1e-9);

        let (y, precond) = gmres(5).solve(&a, &Ilu0::new(&a), &b, DVector::zeros(40));
        assert!(precond.converged);
        assert!(precond.iterations <= report.iterations);
        assert!((&x - &y).norm() < 1e-9);
    }

    #[test]
    fn reports_non_convergence() {
        let a = laplacian(40);
        let b = DVector::from_element(40, 1.0);
        let solver = Gmres {
            restart: 2,
            max_restarts: 1,
            abs_tolerance: 1e-14,
            rel_tolerance: 1e-14,
        };
        let (_, report) = solver.solve(&a, &Identity, &b, DVector::zeros(40));
        assert!(!report.converged);
        assert_eq!(report.iterations, 2);
        assert!(report.residual > 0.0);
    }
}
