use super::observables::collect_observables;
use super::{Attempt, Carrier, Phase, Scheduler};
use crate::error::EngineError;
use crate::graph::SiteGraph;
use crate::results::KmcObservables;
use rand::seq::index::sample;
use rand::Rng;
use tracing::debug;

/// Consecutive failed attempts after which the engine checks that some hop is still possible.
const BLOCKED_CHECK_INTERVAL: u64 = 256;

/// How long each phase of a rerun lasts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseTargets {
    /// Successful hops of the burn-in.
    pub relaxation_hops: u64,
    /// Successful hops measured.
    pub simulation_hops: u64,
    /// Optional limit on the measured simulation time.
    pub max_simulation_time: Option<f64>,
}

/// Kinetic Monte Carlo of non-interacting carriers with site exclusion.
///
/// The engine owns the graph for the duration of the simulation; visit and transition counters
/// are written into it and it is handed back by [`KmcEngine::into_graph`].
///
/// Simulation time is only accumulated while measuring. Entering [`Phase::Measuring`] moves
/// the clock and every pending event back by the time spent relaxing, so after `k` reruns
/// [`KmcEngine::time`] is the sum of the `k` measured intervals.
#[derive(Debug)]
pub struct KmcEngine<S: Scheduler> {
    graph: SiteGraph,
    scheduler: S,
    carriers: Vec<Carrier>,
    phase: Phase,
    time: f64,
    rerun_start: f64,
    phase_hops: u64,
    hops: u64,
    failed_hops: u64,
    reruns: usize,
    consecutive_failures: u64,
}

impl<S: Scheduler> KmcEngine<S> {
    /// An idle engine for `n_carriers` carriers on `graph`.
    pub fn new(graph: SiteGraph, scheduler: S, n_carriers: usize) -> Self {
        Self {
            graph,
            scheduler,
            carriers: (0..n_carriers).map(Carrier::new).collect(),
            phase: Phase::Idle,
            time: 0.0,
            rerun_start: 0.0,
            phase_hops: 0,
            hops: 0,
            failed_hops: 0,
            reruns: 0,
            consecutive_failures: 0,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Simulation time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// The graph with its occupancy.
    pub fn graph(&self) -> &SiteGraph {
        &self.graph
    }

    /// All carriers.
    pub fn carriers(&self) -> &[Carrier] {
        &self.carriers
    }

    /// The scheduler.
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Measured hops over all reruns.
    pub fn hops(&self) -> u64 {
        self.hops
    }

    /// Measured failed attempts over all reruns.
    pub fn failed_hops(&self) -> u64 {
        self.failed_hops
    }

    /// Finished reruns.
    pub fn reruns(&self) -> usize {
        self.reruns
    }

    /// Give the graph back, with the visit and transition counters of all measurements.
    pub fn into_graph(self) -> SiteGraph {
        self.graph
    }

    /// Perform one complete rerun: place carriers at random, relax, measure and finish.
    pub fn rerun<R: Rng>(&mut self, targets: &PhaseTargets, rng: &mut R) -> Result<(), EngineError> {
        self.place_carriers(rng)?;
        self.relax(targets.relaxation_hops, rng)?;
        self.measure(targets.simulation_hops, targets.max_simulation_time, rng)?;
        self.finish();
        Ok(())
    }

    /// Put the carriers on distinct random sites and start relaxing.
    pub fn place_carriers<R: Rng>(&mut self, rng: &mut R) -> Result<(), EngineError> {
        let sites = sample(rng, self.graph.n_sites(), self.carriers.len()).into_vec();
        self.place_carriers_at(&sites, rng)
    }

    /// Put carrier `c` on `sites[c]` and start relaxing. Sites must be distinct.
    pub fn place_carriers_at<R: Rng>(&mut self, sites: &[usize], rng: &mut R) -> Result<(), EngineError> {
        debug_assert!(matches!(self.phase, Phase::Idle | Phase::Done));
        debug_assert_eq!(sites.len(), self.carriers.len());
        self.graph.sites_mut().iter_mut().for_each(|s| s.carrier = None);
        self.carriers
            .iter_mut()
            .zip(sites.iter())
            .enumerate()
            .for_each(|(id, (c, &site))| {
                c.relocate(site);
                self.graph.site_mut(site).carrier = Some(id);
            });
        self.rerun_start = self.time;
        self.phase_hops = 0;
        self.scheduler
            .place(&self.graph, &self.carriers, self.time, rng);
        self.phase = Phase::Relaxing;
        self.consecutive_failures = 0;
        debug!(rerun = self.reruns, "carriers placed, relaxing");
        self.ensure_progress()
    }

    /// Run `hops` successful hops without statistics, then start measuring.
    pub fn relax<R: Rng>(&mut self, hops: u64, rng: &mut R) -> Result<(), EngineError> {
        debug_assert_eq!(self.phase, Phase::Relaxing);
        self.run_phase(hops, None, rng)?;
        self.begin_measuring();
        Ok(())
    }

    /// Move the clock back to the rerun start and start recording statistics.
    pub fn begin_measuring(&mut self) {
        let relaxed = self.time - self.rerun_start;
        self.scheduler.rebase(relaxed);
        self.time = self.rerun_start;
        let now = self.time;
        self.graph.sites_mut().iter_mut().for_each(|s| {
            s.occupied_since = if s.is_occupied() { Some(now) } else { None };
        });
        self.phase_hops = 0;
        self.phase = Phase::Measuring;
        debug!(rerun = self.reruns, relaxed, "relaxation done, measuring");
    }

    /// Run `hops` measured hops, or until `max_time` of measured time passed.
    pub fn measure<R: Rng>(
        &mut self,
        hops: u64,
        max_time: Option<f64>,
        rng: &mut R,
    ) -> Result<(), EngineError> {
        debug_assert_eq!(self.phase, Phase::Measuring);
        self.run_phase(hops, max_time, rng)
    }

    /// Credit occupation times of occupied sites and fold rerun displacements.
    pub fn finish(&mut self) {
        let now = self.time;
        self.graph.sites_mut().iter_mut().for_each(|s| {
            if let Some(since) = s.occupied_since.take() {
                s.total_occupation_time += now - since;
            }
        });
        let rerun_time = now - self.rerun_start;
        self.carriers
            .iter_mut()
            .for_each(|c| c.finish_rerun(rerun_time));
        self.reruns += 1;
        self.phase = Phase::Done;
        debug!(rerun = self.reruns, rerun_time, "measurement done");
    }

    /// Execute one attempt. Returns whether a carrier hopped.
    pub fn step<R: Rng>(&mut self, rng: &mut R) -> Result<bool, EngineError> {
        let attempt = self
            .scheduler
            .next_attempt(&self.graph, &self.carriers, self.time, rng)?;
        self.time = attempt.time;

        let mut arrived = None;
        if let Some(carrier) = attempt.carrier {
            let target = self.graph.edges(attempt.origin)[attempt.edge].target;
            if self.graph.site(target).is_occupied() {
                if self.phase == Phase::Measuring {
                    self.carriers[carrier].failed_hops += 1;
                }
            } else {
                self.hop(carrier, &attempt);
                arrived = Some(target);
            }
        }
        if arrived.is_none() && self.phase == Phase::Measuring {
            self.failed_hops += 1;
        }
        if arrived.is_some() {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures += 1;
        }

        self.scheduler
            .after_attempt(&self.graph, &self.carriers, &attempt, rng);
        match arrived {
            Some(site) if self.graph.site(site).rate_sum <= 0.0 => self.ensure_progress()?,
            None if self.consecutive_failures % BLOCKED_CHECK_INTERVAL == 0 => {
                self.ensure_progress()?
            }
            _ => {}
        }
        Ok(arrived.is_some())
    }

    /// Transport coefficients of everything measured so far.
    pub fn observables(&self) -> KmcObservables {
        collect_observables(
            &self.graph,
            &self.carriers,
            self.time,
            self.reruns,
            self.hops,
            self.failed_hops,
        )
    }

    /// Every occupied site holds exactly the carrier that points at it.
    pub fn verify_occupancy(&self) -> bool {
        let carriers_ok = self
            .carriers
            .iter()
            .enumerate()
            .all(|(id, c)| self.graph.site(c.site).carrier == Some(id));
        carriers_ok && self.graph.n_occupied() == self.carriers.len()
    }

    fn hop(&mut self, carrier: usize, attempt: &Attempt) {
        let origin = attempt.origin;
        let (target, displacement) = {
            let edge = &self.graph.edges(origin)[attempt.edge];
            (edge.target, edge.displacement)
        };
        self.graph.site_mut(origin).carrier = None;

        if self.phase == Phase::Measuring {
            let now = self.time;
            self.graph.edges_mut(origin)[attempt.edge].transitions += 1;
            let upward = self.graph.site(origin).energy < self.graph.site(target).energy;
            let vacated = self.graph.site_mut(origin);
            if let Some(since) = vacated.occupied_since.take() {
                vacated.total_occupation_time += now - since;
            }
            let entered = self.graph.site_mut(target);
            entered.occupied_since = Some(now);
            if upward {
                entered.visited_upward += 1;
            } else {
                entered.visited += 1;
            }
            self.carriers[carrier].record_hop(&displacement);
            self.hops += 1;
        }

        self.carriers[carrier].site = target;
        self.graph.site_mut(target).carrier = Some(carrier);
        self.phase_hops += 1;
    }

    fn run_phase<R: Rng>(
        &mut self,
        target: u64,
        max_time: Option<f64>,
        rng: &mut R,
    ) -> Result<(), EngineError> {
        self.phase_hops = 0;
        let stride = (target / 10).max(1);
        let mut next_report = stride;
        while self.phase_hops < target {
            if let Some(limit) = max_time {
                if self.time - self.rerun_start >= limit {
                    debug!(phase = ?self.phase, hops = self.phase_hops, "time limit reached");
                    break;
                }
            }
            self.step(rng)?;
            if self.phase_hops >= next_report {
                debug!(
                    phase = ?self.phase,
                    "{:.0}% of {} hops",
                    100.0 * self.phase_hops as f64 / target as f64,
                    target
                );
                next_report += stride;
            }
        }
        Ok(())
    }

    /// Fail if no carrier can ever leave its site, or if every possible hop targets an
    /// occupied site.
    fn ensure_progress(&self) -> Result<(), EngineError> {
        let mobile = self
            .carriers
            .iter()
            .any(|c| self.graph.site(c.site).rate_sum > 0.0);
        if !mobile {
            return Err(EngineError::Stalled);
        }
        let free_hop = self.carriers.iter().any(|c| {
            self.graph
                .edges(c.site)
                .iter()
                .any(|e| e.rate > 0.0 && !self.graph.site(e.target).is_occupied())
        });
        if free_hop {
            Ok(())
        } else {
            debug!(phase = ?self.phase, "every possible hop is blocked");
            Err(EngineError::Blocked)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{PeriodicBox, RateModel, SitePoint};
    use crate::graph::GraphBuilder;
    use crate::kmc::{AliasScheduler, ExactScheduler};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn ring(n: usize, field: f64) -> SiteGraph {
        let b = PeriodicBox::new([1.0, 1.0, n as f64]);
        let points = (0..n)
            .map(|z| SitePoint::new(0.0, 0.0, z as f64, 0.0))
            .collect();
        let rates = RateModel {
            localization_length: 1.0,
            temperature: 1.0,
            field,
        };
        GraphBuilder::new(b, 1.5, rates).build(points)
    }

    #[test]
    fn phases_in_order() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut engine = KmcEngine::new(ring(6, 0.5), ExactScheduler::new(), 2);
        assert_eq!(engine.phase(), Phase::Idle);
        engine.place_carriers(&mut rng).unwrap();
        assert_eq!(engine.phase(), Phase::Relaxing);
        engine.relax(50, &mut rng).unwrap();
        assert_eq!(engine.phase(), Phase::Measuring);
        assert_eq!(engine.time(), 0.0);
        engine.measure(100, None, &mut rng).unwrap();
        assert_eq!(engine.hops(), 100);
        engine.finish();
        assert_eq!(engine.phase(), Phase::Done);
        assert!(engine.verify_occupancy());
    }

    #[test]
    fn relaxation_time_is_not_measured() {
        let mut rng = SmallRng::seed_from_u64(2);
        let mut engine = KmcEngine::new(ring(6, 0.5), ExactScheduler::new(), 1);
        engine.place_carriers_at(&[0], &mut rng).unwrap();
        engine.relax(1000, &mut rng).unwrap();
        assert_eq!(engine.time(), 0.0);
        assert!(engine.scheduler().event_time(0) > 0.0);
    }

    #[test]
    fn occupation_time_adds_up() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut engine = KmcEngine::new(ring(8, 0.2), ExactScheduler::new(), 3);
        for _ in 0..2 {
            engine
                .rerun(
                    &PhaseTargets {
                        relaxation_hops: 100,
                        simulation_hops: 500,
                        max_simulation_time: None,
                    },
                    &mut rng,
                )
                .unwrap();
        }
        let occupied: f64 = engine
            .graph()
            .sites()
            .iter()
            .map(|s| s.total_occupation_time)
            .sum();
        assert!((occupied - 3.0 * engine.time()).abs() < 1e-9 * engine.time());
        assert_eq!(engine.reruns(), 2);
        assert_eq!(engine.hops(), 1000);
    }

    #[test]
    fn time_limit_stops_measurement() {
        let mut rng = SmallRng::seed_from_u64(4);
        let mut engine = KmcEngine::new(ring(5, 0.0), ExactScheduler::new(), 1);
        engine.place_carriers(&mut rng).unwrap();
        engine.relax(0, &mut rng).unwrap();
        engine.measure(u64::MAX, Some(50.0), &mut rng).unwrap();
        assert!(engine.time() >= 50.0);
        assert!(engine.hops() > 0);
    }

    #[test]
    fn alias_counts_empty_origins_as_failures() {
        let mut rng = SmallRng::seed_from_u64(5);
        let graph = ring(10, 0.1);
        let scheduler = AliasScheduler::new(&graph).unwrap();
        let mut engine = KmcEngine::new(graph, scheduler, 1);
        engine.place_carriers(&mut rng).unwrap();
        engine.relax(0, &mut rng).unwrap();
        engine.measure(200, None, &mut rng).unwrap();
        engine.finish();
        assert_eq!(engine.hops(), 200);
        assert!(engine.failed_hops() > 200);
        assert!(engine.verify_occupancy());
    }

    #[test]
    fn dead_end_stalls() {
        let mut graph = ring(4, 0.0);
        (0..4).for_each(|i| {
            graph.edges_mut(i).iter_mut().for_each(|e| e.rate = 0.0);
            graph.recompute_rate_sum(i);
        });
        let mut rng = SmallRng::seed_from_u64(6);
        let mut engine = KmcEngine::new(graph, ExactScheduler::new(), 1);
        assert_eq!(engine.place_carriers(&mut rng), Err(EngineError::Stalled));
    }

    fn frozen(points: Vec<SitePoint>) -> SiteGraph {
        let rates = RateModel {
            localization_length: 0.5,
            temperature: 0.0,
            field: 0.0,
        };
        GraphBuilder::new(PeriodicBox::new([4.0, 4.0, 8.0]), 1.2, rates).build(points)
    }

    #[test]
    fn zero_temperature_blocked_placement() {
        // Site 1 can only hop uphill, site 0 only onto site 1, site 2 is isolated.
        let graph = frozen(vec![
            SitePoint::new(0.0, 0.0, 0.0, 0.0),
            SitePoint::new(0.0, 0.0, 1.0, -1.0),
            SitePoint::new(2.0, 2.0, 2.5, 0.0),
        ]);
        let mut rng = SmallRng::seed_from_u64(7);
        let mut engine = KmcEngine::new(graph, ExactScheduler::new(), 2);
        assert_eq!(
            engine.place_carriers_at(&[0, 1], &mut rng),
            Err(EngineError::Blocked)
        );
    }

    #[test]
    fn zero_temperature_blocking_ends_relaxation() {
        // Downhill staircase: once the lower carrier sits on the bottom step, the upper one
        // keeps aiming at it and no hop is possible.
        let points = vec![
            SitePoint::new(0.0, 0.0, 0.0, 0.0),
            SitePoint::new(0.0, 0.0, 1.0, -1.0),
            SitePoint::new(0.0, 0.0, 2.0, -2.0),
        ];
        for seed in 0..4 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let graph = frozen(points.clone());
            let mut engine = KmcEngine::new(graph, ExactScheduler::new(), 2);
            engine.place_carriers_at(&[0, 1], &mut rng).unwrap();
            assert_eq!(engine.relax(5, &mut rng), Err(EngineError::Blocked));
            assert!(engine.verify_occupancy());
            assert!(engine.graph().site(2).is_occupied());
            assert!(engine.graph().site(1).is_occupied());

            let graph = frozen(points.clone());
            let scheduler = AliasScheduler::new(&graph).unwrap();
            let mut engine = KmcEngine::new(graph, scheduler, 2);
            engine.place_carriers_at(&[0, 1], &mut rng).unwrap();
            assert_eq!(engine.relax(5, &mut rng), Err(EngineError::Blocked));
        }
    }
}
