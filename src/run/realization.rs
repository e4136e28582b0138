use super::RunContext;
use crate::balance::{self, BalanceSolver};
use crate::config::{Method, Scheduling, SolverSettings};
use crate::error::{ConfigError, HopError};
use crate::geometry::generate_points;
use crate::graph::{SiteGraph, SoftPairCorrector};
use crate::kmc::{AliasScheduler, ExactScheduler, KmcEngine, Scheduler};
use crate::results::{Outcome, RealizationOutput, ResultRecord};
use rand::Rng;
use std::time::Instant;
use tracing::{debug, info, info_span};

/// Generate sites, connect them and remove softpairs. Returns the graph and the number of
/// softpair passes.
pub fn build_graph<R: Rng>(ctx: &mut RunContext<'_, R>) -> Result<(SiteGraph, usize), ConfigError> {
    let params = ctx.params;
    let points = generate_points(params.dims, params.lattice, &params.dos, &mut ctx.rng);
    let mut graph = params.graph_builder().build(points);

    let mut passes = 0;
    if params.softpair.enabled {
        let corrector = SoftPairCorrector::new(params.softpair.threshold, params.softpair.max_passes);
        let summary =
            corrector
                .apply(&mut graph)
                .map_err(|source| ConfigError::SoftPairThreshold {
                    threshold: params.softpair.threshold,
                    source,
                })?;
        debug!(
            passes = summary.passes,
            corrected = summary.corrected,
            "softpairs removed"
        );
        passes = summary.passes;
    }
    Ok((graph, passes))
}

/// Run one realization with the configured method.
pub fn run_realization<R: Rng>(ctx: &mut RunContext<'_, R>) -> Result<RealizationOutput, HopError> {
    let span = info_span!("realization", run = ctx.run);
    let _enter = span.enter();
    info!(sites = ctx.params.n_sites(), "starting realization");

    let (graph, softpair_passes) = build_graph(ctx)?;
    let (outcome, graph) = match ctx.params.method {
        Method::Kmc {
            scheduling: Scheduling::Exact,
        } => simulate(ctx, graph, ExactScheduler::new())?,
        Method::Kmc {
            scheduling: Scheduling::Alias,
        } => {
            let scheduler = AliasScheduler::new(&graph)?;
            simulate(ctx, graph, scheduler)?
        }
        Method::BalanceEquation => solve(graph, ctx.params.solver),
    };

    let record = ResultRecord {
        run: ctx.run,
        n_sites: graph.n_sites(),
        n_carriers: ctx.params.n_carriers,
        softpair_passes,
        outcome,
    };
    Ok(RealizationOutput {
        record,
        graph: if ctx.params.keep_graph {
            Some(graph)
        } else {
            None
        },
    })
}

fn simulate<R: Rng, S: Scheduler>(
    ctx: &mut RunContext<'_, R>,
    graph: SiteGraph,
    scheduler: S,
) -> Result<(Outcome, SiteGraph), HopError> {
    let params = ctx.params;
    let mut engine = KmcEngine::new(graph, scheduler, params.n_carriers);
    let start = Instant::now();
    for _ in 0..params.n_reruns {
        engine.rerun(&params.targets, &mut ctx.rng)?;
    }
    let elapsed = start.elapsed().as_secs_f64();

    let observables = engine.observables();
    ctx.counters.simulation_time = observables.simulation_time;
    ctx.counters.hops = observables.hops;
    ctx.counters.failed_hops = observables.failed_hops;

    let attempted = params.n_reruns as f64
        * (params.targets.relaxation_hops + params.targets.simulation_hops) as f64;
    info!(
        hops_per_second = attempted / elapsed.max(f64::MIN_POSITIVE),
        failed = observables.failed_hops,
        mobility = observables.mobility,
        "finished realization"
    );
    Ok((Outcome::Kmc(observables), engine.into_graph()))
}

fn solve(graph: SiteGraph, settings: SolverSettings) -> (Outcome, SiteGraph) {
    let start = Instant::now();
    let solution = BalanceSolver::new(settings).solve(&graph);
    let mobility = balance::mobility(&graph, &solution.probabilities);
    info!(
        seconds = start.elapsed().as_secs_f64(),
        iterations = solution.report.iterations,
        mobility,
        "finished realization"
    );
    (
        Outcome::BalanceEquation {
            mobility,
            report: solution.report,
        },
        graph,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::run::{ChaChaStreams, RunParams, StreamFactory};

    fn small_config(method: Method) -> SimulationConfig {
        SimulationConfig {
            length_x: 5,
            length_y: 5,
            length_z: 5,
            cutoff_radius: 2.0,
            localization_length: 0.5,
            temperature: 1.0,
            field: 0.1,
            n_carriers: 5,
            relaxation_hops: 200,
            simulation_hops: 1000,
            n_reruns: 2,
            keep_graph: true,
            method,
            ..Default::default()
        }
    }

    #[test]
    fn kmc_realization_fills_counters() {
        let config = small_config(Method::Kmc {
            scheduling: Scheduling::Exact,
        });
        let params = RunParams::from_config(&config).unwrap();
        let mut ctx = RunContext::new(3, &params, ChaChaStreams::new(0).stream(3));
        let output = run_realization(&mut ctx).unwrap();
        assert_eq!(output.record.run, 3);
        assert_eq!(output.record.n_sites, 125);
        assert_eq!(ctx.counters.hops, 2000);
        assert!(ctx.counters.simulation_time > 0.0);
        let graph = output.graph.unwrap();
        let transitions: u64 = graph.transition_records().iter().map(|t| t.transitions).sum();
        assert_eq!(transitions, 2000);
    }

    #[test]
    fn same_stream_same_result() {
        let config = small_config(Method::Kmc {
            scheduling: Scheduling::Alias,
        });
        let params = RunParams::from_config(&config).unwrap();
        let streams = ChaChaStreams::new(17);
        let a = run_realization(&mut RunContext::new(0, &params, streams.stream(0))).unwrap();
        let b = run_realization(&mut RunContext::new(0, &params, streams.stream(0))).unwrap();
        assert_eq!(a.record, b.record);
    }

    #[test]
    fn impossible_softpair_threshold_is_a_config_error() {
        let mut config = small_config(Method::BalanceEquation);
        config.softpair.enabled = true;
        config.softpair.threshold = 1e-6;
        config.softpair.max_passes = 3;
        let params = RunParams::from_config(&config).unwrap();
        let mut ctx = RunContext::new(0, &params, ChaChaStreams::new(0).stream(0));
        let err = run_realization(&mut ctx).unwrap_err();
        assert!(matches!(
            err,
            HopError::Config(ConfigError::SoftPairThreshold { .. })
        ));
    }
}
