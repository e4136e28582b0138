//! Stationary occupation probabilities of a single carrier from the master equation.
//!
//! For every site `i > 0`
//! `Σ_j p_j·r(j→i) - p_i·Σ_i = 0`, and the first row is replaced by the normalization
//! `Σ_i p_i = 1`. The sparse system is solved with ILU(0)-preconditioned restarted GMRES
//! starting from the uniform distribution.

/// Restarted GMRES.
pub mod gmres;
/// Incomplete LU preconditioner.
pub mod ilu;

pub use gmres::Gmres;
pub use ilu::Ilu0;

use crate::config::SolverSettings;
use crate::graph::SiteGraph;
use crate::results::SolverReport;
use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use tracing::{debug, warn};

/// Approximate inverse applied to residuals.
pub trait Preconditioner {
    /// `M⁻¹ r`.
    fn apply(&self, r: &DVector<f64>) -> DVector<f64>;
}

/// No preconditioning.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Preconditioner for Identity {
    fn apply(&self, r: &DVector<f64>) -> DVector<f64> {
        r.clone()
    }
}

/// Build the balance matrix and right-hand side of `graph`.
///
/// Incoming rates `r(j→i)` are found by looking up the back-edge of each outgoing edge of `i`;
/// a neighbor without a back-edge contributes nothing.
pub fn assemble(graph: &SiteGraph) -> (CsrMatrix<f64>, DVector<f64>) {
    let n = graph.n_sites();
    let mut coo = CooMatrix::new(n, n);
    (0..n).for_each(|j| coo.push(0, j, 1.0));
    for i in 1..n {
        coo.push(i, i, -graph.site(i).rate_sum);
        graph.edges(i).iter().for_each(|e| {
            if let Some(back) = graph.edge_between(e.target, i) {
                coo.push(i, e.target, back.rate);
            }
        });
    }
    let mut rhs = DVector::zeros(n);
    if n > 0 {
        rhs[0] = 1.0;
    }
    (CsrMatrix::from(&coo), rhs)
}

/// Mobility along the field from stationary probabilities,
/// `(1/F) Σ_i Σ_{i→j} p_i·r(i→j)·Δz(i→j)`.
pub fn mobility(graph: &SiteGraph, probabilities: &DVector<f64>) -> f64 {
    let current: f64 = (0..graph.n_sites())
        .map(|i| {
            probabilities[i]
                * graph
                    .edges(i)
                    .iter()
                    .map(|e| e.rate * e.displacement.z)
                    .sum::<f64>()
        })
        .sum();
    current / graph.rate_model().field
}

/// Occupation probabilities with the convergence report of the solve.
#[derive(Debug, Clone)]
pub struct BalanceSolution {
    /// Stationary probability of every site.
    pub probabilities: DVector<f64>,
    /// How the solve went.
    pub report: SolverReport,
}

/// Solves the balance equations of a graph.
#[derive(Debug, Clone, Copy)]
pub struct BalanceSolver {
    settings: SolverSettings,
}

impl BalanceSolver {
    /// A solver with the given iteration caps and tolerances.
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    /// Solve for the stationary probabilities. A solve that does not converge still returns
    /// its last iterate, flagged in the report.
    pub fn solve(&self, graph: &SiteGraph) -> BalanceSolution {
        let n = graph.n_sites();
        let (a, b) = assemble(graph);
        debug!(sites = n, nonzeros = a.nnz(), "balance matrix assembled");

        let preconditioner = Ilu0::new(&a);
        let gmres = Gmres {
            restart: self.settings.restart_length(n),
            max_restarts: self.settings.outer_iterations,
            abs_tolerance: self.settings.abs_tolerance,
            rel_tolerance: self.settings.rel_tolerance,
        };
        let x0 = DVector::from_element(n, 1.0 / n.max(1) as f64);
        let (probabilities, report) = gmres.solve(&a, &preconditioner, &b, x0);

        if report.converged {
            debug!(
                iterations = report.iterations,
                residual = report.residual,
                "balance equations solved"
            );
        } else {
            warn!(
                iterations = report.iterations,
                residual = report.residual,
                "balance equation solver did not converge, result is degraded"
            );
        }
        BalanceSolution {
            probabilities,
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{PeriodicBox, RateModel, SitePoint};
    use crate::graph::GraphBuilder;
    use approx::assert_relative_eq;

    fn pair(field: f64) -> SiteGraph {
        let b = PeriodicBox::new([4.0, 4.0, 4.0]);
        let points = vec![
            SitePoint::new(0.0, 0.0, 0.0, 0.0),
            SitePoint::new(0.0, 0.0, 1.0, 0.0),
        ];
        let rates = RateModel {
            localization_length: 0.5,
            temperature: 1.0,
            field,
        };
        GraphBuilder::new(b, 1.5, rates).build(points)
    }

    #[test]
    fn assembles_balance_rows() {
        let graph = pair(1.0);
        let (a, b) = assemble(&graph);
        let dense = nalgebra::DMatrix::from(&a);
        assert_eq!(dense[(0, 0)], 1.0);
        assert_eq!(dense[(0, 1)], 1.0);
        assert_eq!(dense[(1, 0)], graph.rate_between(0, 1));
        assert_eq!(dense[(1, 1)], -graph.site(1).rate_sum);
        assert_eq!(b, DVector::from_vec(vec![1.0, 0.0]));
    }

    #[test]
    fn detailed_balance_for_pair() {
        let graph = pair(1.0);
        let solution = BalanceSolver::new(SolverSettings::default()).solve(&graph);
        assert!(solution.report.converged);
        let p = &solution.probabilities;
        assert_relative_eq!(p[0] + p[1], 1.0, epsilon = 1e-10);
        let ratio = graph.rate_between(0, 1) / graph.rate_between(1, 0);
        assert_relative_eq!(p[1] / p[0], ratio, max_relative = 1e-8);
    }

    #[test]
    fn mobility_of_known_probabilities() {
        let graph = pair(2.0);
        let p = DVector::from_vec(vec![0.25, 0.75]);
        let expected = (0.25 * graph.rate_between(0, 1) * 1.0
            + 0.75 * graph.rate_between(1, 0) * graph.edges(1)[0].displacement.z)
            / 2.0;
        assert_relative_eq!(mobility(&graph, &p), expected);
    }
}
