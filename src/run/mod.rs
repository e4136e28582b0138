//! Independent realizations: parameters, random streams and dispatch.
//!
//! Every realization owns a [`RunContext`] with its own random stream derived from
//! `base_seed + run`, so results do not depend on scheduling or thread count.

/// Parallel dispatch of all realizations.
pub mod dispatch;
/// One realization from site generation to result record.
pub mod realization;

pub use dispatch::{run_all, run_one};
pub use realization::{build_graph, run_realization};

use crate::config::{Method, SimulationConfig, SoftPairSettings, SolverSettings};
use crate::error::ConfigError;
use crate::geometry::{DensityOfStates, PeriodicBox, RateModel};
use crate::graph::GraphBuilder;
use crate::kmc::PhaseTargets;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Parameters shared read-only by all realizations.
#[derive(Debug, Clone)]
pub struct RunParams {
    /// Box edges in sites.
    pub dims: [usize; 3],
    /// Sites on a simple cubic lattice.
    pub lattice: bool,
    /// Site energy sampler.
    pub dos: DensityOfStates,
    /// Hop rate parameters.
    pub rates: RateModel,
    /// Neighbor cut-off.
    pub cutoff_radius: f64,
    /// Softpair removal.
    pub softpair: SoftPairSettings,
    /// Carriers per realization.
    pub n_carriers: usize,
    /// Hop targets of each rerun.
    pub targets: PhaseTargets,
    /// Carrier placements per realization.
    pub n_reruns: usize,
    /// Solution method.
    pub method: Method,
    /// Balance equation solver settings.
    pub solver: SolverSettings,
    /// Keep each realization's graph for dumping.
    pub keep_graph: bool,
}

impl RunParams {
    /// Validate `config` and derive the run parameters from it.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, ConfigError> {
        let config = config.clone().validated()?;
        Ok(Self {
            dims: [config.length_x, config.length_y, config.length_z],
            lattice: config.lattice,
            dos: DensityOfStates::new(config.dos)?,
            rates: RateModel {
                localization_length: config.localization_length,
                temperature: config.temperature,
                field: config.field,
            },
            cutoff_radius: config.cutoff_radius,
            softpair: config.softpair,
            n_carriers: config.effective_carriers(),
            targets: PhaseTargets {
                relaxation_hops: config.relaxation_hops,
                simulation_hops: config.simulation_hops,
                max_simulation_time: config.max_simulation_time,
            },
            n_reruns: config.n_reruns,
            method: config.method,
            solver: config.solver,
            keep_graph: config.keep_graph,
        })
    }

    /// Number of sites.
    pub fn n_sites(&self) -> usize {
        self.dims.iter().product()
    }

    /// The simulation box.
    pub fn periodic_box(&self) -> PeriodicBox {
        PeriodicBox::new([
            self.dims[0] as f64,
            self.dims[1] as f64,
            self.dims[2] as f64,
        ])
    }

    /// A neighbor graph builder for these parameters.
    pub fn graph_builder(&self) -> GraphBuilder {
        GraphBuilder::new(self.periodic_box(), self.cutoff_radius, self.rates)
    }
}

/// Counters of one realization.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunCounters {
    /// Measured simulation time.
    pub simulation_time: f64,
    /// Measured hops.
    pub hops: u64,
    /// Measured failed attempts.
    pub failed_hops: u64,
}

/// Everything one realization owns: its index, the shared parameters, a private random
/// stream and its counters.
#[derive(Debug)]
pub struct RunContext<'a, R: Rng> {
    /// Realization index.
    pub run: usize,
    /// Shared parameters.
    pub params: &'a RunParams,
    /// This realization's random stream.
    pub rng: R,
    /// Counters filled in by the realization.
    pub counters: RunCounters,
}

impl<'a, R: Rng> RunContext<'a, R> {
    /// A fresh context.
    pub fn new(run: usize, params: &'a RunParams, rng: R) -> Self {
        Self {
            run,
            params,
            rng,
            counters: RunCounters::default(),
        }
    }
}

/// Produces the independent random stream of each realization.
pub trait StreamFactory {
    /// The stream type.
    type Stream: Rng;

    /// The stream of realization `run`.
    fn stream(&self, run: usize) -> Self::Stream;
}

/// ChaCha8 streams seeded with `base_seed + run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChaChaStreams {
    base_seed: u64,
}

impl ChaChaStreams {
    /// Streams starting at `base_seed`.
    pub fn new(base_seed: u64) -> Self {
        Self { base_seed }
    }

    /// Streams for the configured base seed.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(config.base_seed)
    }
}

impl StreamFactory for ChaChaStreams {
    type Stream = ChaCha8Rng;

    fn stream(&self, run: usize) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.base_seed.wrapping_add(run as u64))
    }
}
