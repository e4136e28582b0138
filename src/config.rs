//! Simulation configuration.
//!
//! A [`SimulationConfig`] is resolved once, validated, and then shared read-only by every
//! realization. It deserializes from TOML:
//!
//! ```toml
//! length_x = 20
//! length_y = 20
//! length_z = 20
//! cutoff_radius = 2.0
//! localization_length = 0.25
//! temperature = 0.3
//! field = 0.05
//!
//! [dos]
//! kind = "gaussian"
//!
//! [method]
//! kind = "kmc"
//! scheduling = "exact"
//! ```

use crate::error::ConfigError;
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest Krylov subspace used when no restart length is configured.
const DEFAULT_MAX_RESTART: usize = 500;

/// Shape of the density of states site energies are drawn from. Energies are in units of the
/// DOS width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DosShape {
    /// `g(E) ∝ exp(-|E|^p)`.
    ExponentialPower {
        /// Shape parameter `p`; `p = 1` is exponential, `p = 2` gaussian-like.
        exponent: f64,
    },
    /// Gaussian with unit standard deviation.
    Gaussian,
}

/// How the next event of the kinetic Monte Carlo simulation is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheduling {
    /// Every carrier keeps its own event clock in a binary heap.
    Exact,
    /// Edges of the whole graph are drawn from an alias table with a fixed mean time step.
    Alias,
}

/// Which solution method a realization uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Method {
    /// Kinetic Monte Carlo.
    Kmc {
        /// Event selection strategy.
        scheduling: Scheduling,
    },
    /// Direct solution of the stationary master equation for one carrier.
    BalanceEquation,
}

/// Softpair removal settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftPairSettings {
    /// Whether softpairs are removed at all.
    pub enabled: bool,
    /// Fraction of a site's total rate above which a single transition marks a softpair.
    pub threshold: f64,
    /// Upper bound on correction passes before the threshold is rejected.
    pub max_passes: usize,
}

impl Default for SoftPairSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 0.9,
            max_passes: 100,
        }
    }
}

/// Iterative solver settings for the balance equations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Absolute residual tolerance.
    pub abs_tolerance: f64,
    /// Residual tolerance relative to the initial residual.
    pub rel_tolerance: f64,
    /// Maximum number of restarts.
    pub outer_iterations: usize,
    /// Krylov subspace size per restart. Defaults to `min(N - 1, 500)`.
    pub inner_iterations: Option<usize>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            abs_tolerance: 1e-10,
            rel_tolerance: 1e-10,
            outer_iterations: 10,
            inner_iterations: None,
        }
    }
}

impl SolverSettings {
    /// The Krylov subspace size used for a system of `n` unknowns.
    pub fn restart_length(&self, n: usize) -> usize {
        self.inner_iterations
            .unwrap_or_else(|| n.saturating_sub(1).min(DEFAULT_MAX_RESTART))
            .clamp(1, n.max(1))
    }
}

/// All parameters of a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Box edge along x in units of the mean site distance.
    pub length_x: usize,
    /// Box edge along y.
    pub length_y: usize,
    /// Box edge along z, the field direction.
    pub length_z: usize,
    /// Put sites on a simple cubic lattice instead of random positions.
    pub lattice: bool,
    /// Density of states.
    pub dos: DosShape,
    /// Localization length `a` of the carrier wavefunctions.
    pub localization_length: f64,
    /// Transitions are only considered between sites closer than this.
    pub cutoff_radius: f64,
    /// Electric field along z, in units of DOS width per site distance.
    pub field: f64,
    /// Temperature in units of the DOS width.
    pub temperature: f64,
    /// Number of simultaneously simulated carriers.
    pub n_carriers: usize,
    /// Successful hops before measuring starts.
    pub relaxation_hops: u64,
    /// Successful hops measured per rerun.
    pub simulation_hops: u64,
    /// Optional bound on the measured simulation time per rerun.
    pub max_simulation_time: Option<f64>,
    /// Softpair removal.
    pub softpair: SoftPairSettings,
    /// Solution method.
    pub method: Method,
    /// Balance equation solver settings.
    pub solver: SolverSettings,
    /// Independent realizations (new sites per realization).
    pub n_runs: usize,
    /// Carrier placements per realization.
    pub n_reruns: usize,
    /// Realization `i` uses the random stream seeded with `base_seed + i`.
    pub base_seed: u64,
    /// Worker threads; `0` uses the rayon default.
    pub n_threads: usize,
    /// Return the finished site graph with each result for dumping.
    pub keep_graph: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            length_x: 20,
            length_y: 20,
            length_z: 20,
            lattice: false,
            dos: DosShape::ExponentialPower { exponent: 1.0 },
            localization_length: 0.25,
            cutoff_radius: 2.0,
            field: 0.05,
            temperature: 0.3,
            n_carriers: 1,
            relaxation_hops: 10_000,
            simulation_hops: 100_000,
            max_simulation_time: None,
            softpair: SoftPairSettings::default(),
            method: Method::Kmc {
                scheduling: Scheduling::Exact,
            },
            solver: SolverSettings::default(),
            n_runs: 1,
            n_reruns: 1,
            base_seed: 0,
            n_threads: 0,
            keep_graph: false,
        }
    }
}

impl SimulationConfig {
    /// Load a configuration from a file, overlaid with `HOPMC_*` environment variables,
    /// and validate it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("HOPMC").separator("__"))
            .build()?;
        let config: SimulationConfig = settings.try_deserialize()?;
        config.validated()
    }

    /// Number of sites in the box, one per unit volume.
    pub fn n_sites(&self) -> usize {
        self.length_x * self.length_y * self.length_z
    }

    /// Box edge lengths as floats.
    pub fn lengths(&self) -> [f64; 3] {
        [
            self.length_x as f64,
            self.length_y as f64,
            self.length_z as f64,
        ]
    }

    /// Number of carriers actually simulated. The balance equations describe a single carrier.
    pub fn effective_carriers(&self) -> usize {
        match self.method {
            Method::BalanceEquation => 1,
            Method::Kmc { .. } => self.n_carriers,
        }
    }

    /// Normalize counts the way the simulation interprets them and validate the result.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.n_runs = self.n_runs.max(1);
        self.n_reruns = self.n_reruns.max(1);
        if let Method::BalanceEquation = self.method {
            self.n_carriers = 1;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check every parameter against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.length_x == 0 || self.length_y == 0 || self.length_z == 0 {
            return Err(ConfigError::BoxLength(
                self.length_x,
                self.length_y,
                self.length_z,
            ));
        }
        let max_radius = self.lengths().iter().cloned().fold(f64::INFINITY, f64::min);
        if !(self.cutoff_radius > 0.0 && self.cutoff_radius <= max_radius) {
            return Err(ConfigError::CutoffRadius {
                radius: self.cutoff_radius,
                max: max_radius,
            });
        }
        if let DosShape::ExponentialPower { exponent } = self.dos {
            if !(exponent > 0.0) {
                return Err(ConfigError::DosExponent(exponent));
            }
        }
        if !(self.localization_length > 0.0) {
            return Err(ConfigError::LocalizationLength(self.localization_length));
        }
        if !(self.temperature >= 0.0) {
            return Err(ConfigError::Temperature(self.temperature));
        }
        let carriers = self.effective_carriers();
        if carriers == 0 {
            return Err(ConfigError::NoCarriers);
        }
        if carriers >= self.n_sites() {
            return Err(ConfigError::Overfilled {
                carriers,
                sites: self.n_sites(),
            });
        }
        if self.softpair.enabled {
            if !(self.softpair.threshold > 0.0) {
                return Err(ConfigError::SoftPairThresholdValue(self.softpair.threshold));
            }
            if self.softpair.max_passes == 0 {
                return Err(ConfigError::SoftPairPasses);
            }
        }
        if let Method::BalanceEquation = self.method {
            let solver = &self.solver;
            if solver.outer_iterations == 0 || solver.inner_iterations == Some(0) {
                return Err(ConfigError::Solver(
                    "iteration caps must be at least one".to_string(),
                ));
            }
            if !(solver.abs_tolerance >= 0.0 && solver.rel_tolerance >= 0.0) {
                return Err(ConfigError::Solver(
                    "tolerances must be non-negative".to_string(),
                ));
            }
        }
        Ok(())
    }
}
