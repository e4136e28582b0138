use super::{run_realization, RunContext, RunParams, StreamFactory};
use crate::config::SimulationConfig;
use crate::error::HopError;
use crate::results::RealizationOutput;
use tracing::info;

/// Run realization `run` with its own stream from `factory`.
pub fn run_one<F: StreamFactory>(
    params: &RunParams,
    factory: &F,
    run: usize,
) -> Result<RealizationOutput, HopError> {
    let mut ctx = RunContext::new(run, params, factory.stream(run));
    run_realization(&mut ctx)
}

/// Run all `n_runs` realizations of `config` and return them ordered by run index.
///
/// With the `parallel` feature realizations are spread over a rayon pool of `n_threads`
/// workers. The first failing realization aborts the whole batch.
pub fn run_all<F: StreamFactory + Sync>(
    config: &SimulationConfig,
    factory: &F,
) -> Result<Vec<RealizationOutput>, HopError> {
    let params = RunParams::from_config(config)?;
    let n_runs = config.n_runs.max(1);
    info!(
        runs = n_runs,
        sites = params.n_sites(),
        carriers = params.n_carriers,
        "starting simulation"
    );

    let mut outputs = dispatch(&params, factory, n_runs, config.n_threads)?;
    outputs.sort_by_key(|o| o.record.run);
    Ok(outputs)
}

#[cfg(feature = "parallel")]
fn dispatch<F: StreamFactory + Sync>(
    params: &RunParams,
    factory: &F,
    n_runs: usize,
    n_threads: usize,
) -> Result<Vec<RealizationOutput>, HopError> {
    use rayon::prelude::*;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build()
        .map_err(|e| HopError::ThreadPool(e.to_string()))?;
    pool.install(|| {
        (0..n_runs)
            .into_par_iter()
            .map(|run| run_one(params, factory, run))
            .collect()
    })
}

#[cfg(not(feature = "parallel"))]
fn dispatch<F: StreamFactory + Sync>(
    params: &RunParams,
    factory: &F,
    n_runs: usize,
    _n_threads: usize,
) -> Result<Vec<RealizationOutput>, HopError> {
    (0..n_runs).map(|run| run_one(params, factory, run)).collect()
}
