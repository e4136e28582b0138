//! Per-realization outputs handed to the output and averaging collaborators.

use crate::graph::SiteGraph;
use serde::{Deserialize, Serialize};

/// Transport coefficients and counters measured by the kinetic Monte Carlo engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KmcObservables {
    /// Drift mobility along the field.
    pub mobility: f64,
    /// Diffusion coefficient perpendicular to the field.
    pub diffusivity: f64,
    /// Ratio of mobility to diffusivity, `e/kT` for Einstein behavior.
    pub einstein_ratio: f64,
    /// Charge flux along z per unit time and site.
    pub current_density: f64,
    /// Time averaged energy of a carrier while measuring.
    pub equilibration_energy: f64,
    /// Mean carrier energy at the end of the last rerun.
    pub average_energy: f64,
    /// Total measured simulation time over all reruns.
    pub simulation_time: f64,
    /// Executed hops while measuring.
    pub hops: u64,
    /// Rejected hop attempts while measuring.
    pub failed_hops: u64,
}

/// Convergence report of the balance equation solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverReport {
    /// Whether the residual met the configured tolerances.
    pub converged: bool,
    /// Inner Krylov iterations over all restarts.
    pub iterations: usize,
    /// Final preconditioned residual norm.
    pub residual: f64,
}

/// Outcome of one realization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    /// Kinetic Monte Carlo measurement.
    Kmc(KmcObservables),
    /// Balance equation solution.
    BalanceEquation {
        /// Mobility from the stationary current.
        mobility: f64,
        /// Solver convergence. A result with `converged == false` is degraded.
        report: SolverReport,
    },
}

/// Scalar results of one realization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Realization index.
    pub run: usize,
    /// Sites in the realization.
    pub n_sites: usize,
    /// Carriers simulated.
    pub n_carriers: usize,
    /// Softpair correction passes applied to the graph.
    pub softpair_passes: usize,
    /// What was measured.
    pub outcome: Outcome,
}

impl ResultRecord {
    /// Mobility, regardless of the method that produced it.
    pub fn mobility(&self) -> f64 {
        match &self.outcome {
            Outcome::Kmc(obs) => obs.mobility,
            Outcome::BalanceEquation { mobility, .. } => *mobility,
        }
    }

    /// Whether the result should be trusted. Only a non-converged solve is degraded.
    pub fn is_degraded(&self) -> bool {
        matches!(
            self.outcome,
            Outcome::BalanceEquation {
                report: SolverReport {
                    converged: false,
                    ..
                },
                ..
            }
        )
    }
}

/// One line of a site dump.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    /// Position x.
    pub x: f64,
    /// Position y.
    pub y: f64,
    /// Position z.
    pub z: f64,
    /// Site energy.
    pub energy: f64,
    /// Measured arrivals from above or level.
    pub visited: u64,
    /// Measured arrivals from below.
    pub visited_upward: u64,
}

/// One line of a transition dump.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Source site.
    pub from: usize,
    /// Destination site.
    pub to: usize,
    /// Source energy.
    pub energy_from: f64,
    /// Destination energy.
    pub energy_to: f64,
    /// Measured hops along the edge.
    pub transitions: u64,
}

/// A realization's record together with its finished graph, when requested.
#[derive(Debug, Clone)]
pub struct RealizationOutput {
    /// Scalar results.
    pub record: ResultRecord,
    /// The graph with visit and transition counters, kept if `keep_graph` is set.
    pub graph: Option<SiteGraph>,
}
