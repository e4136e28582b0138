use super::{Carrier, CarrierHeap};
use crate::error::EngineError;
use crate::graph::{Edge, SiteGraph};
use rand::distributions::Distribution;
use rand::Rng;
use rand_distr::{Exp1, WeightedAliasIndex};

/// A proposed hop along an edge of `origin`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attempt {
    /// The carrier on `origin`, if any.
    pub carrier: Option<usize>,
    /// Source site.
    pub origin: usize,
    /// Index of the edge within the origin's edge list.
    pub edge: usize,
    /// Simulation time of the attempt.
    pub time: f64,
}

/// Chooses which hop is attempted next and when.
pub trait Scheduler {
    /// Start scheduling freshly placed carriers at time `now`.
    fn place<R: Rng>(&mut self, graph: &SiteGraph, carriers: &[Carrier], now: f64, rng: &mut R);

    /// The next attempted hop.
    fn next_attempt<R: Rng>(
        &mut self,
        graph: &SiteGraph,
        carriers: &[Carrier],
        now: f64,
        rng: &mut R,
    ) -> Result<Attempt, EngineError>;

    /// Called once the engine resolved `attempt`, with `carriers` already updated.
    fn after_attempt<R: Rng>(
        &mut self,
        graph: &SiteGraph,
        carriers: &[Carrier],
        attempt: &Attempt,
        rng: &mut R,
    );

    /// Move every pending event `delta` earlier.
    fn rebase(&mut self, delta: f64);
}

/// Every carrier waits an exponentially distributed time with rate `rate_sum` of its site.
/// The earliest carrier attempts a hop along an edge drawn proportionally to its rate.
#[derive(Debug, Clone, Default)]
pub struct ExactScheduler {
    heap: CarrierHeap,
}

impl ExactScheduler {
    /// A scheduler without carriers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending event time of a carrier.
    pub fn event_time(&self, carrier: usize) -> f64 {
        self.heap.time_of(carrier)
    }

    fn next_event_time<R: Rng>(now: f64, rate_sum: f64, rng: &mut R) -> f64 {
        if rate_sum > 0.0 {
            let wait: f64 = Exp1.sample(rng);
            now + wait / rate_sum
        } else {
            f64::INFINITY
        }
    }
}

impl Scheduler for ExactScheduler {
    fn place<R: Rng>(&mut self, graph: &SiteGraph, carriers: &[Carrier], now: f64, rng: &mut R) {
        self.heap.clear();
        carriers.iter().enumerate().for_each(|(id, c)| {
            let time = Self::next_event_time(now, graph.site(c.site).rate_sum, rng);
            self.heap.push(id, time);
        });
    }

    fn next_attempt<R: Rng>(
        &mut self,
        graph: &SiteGraph,
        carriers: &[Carrier],
        _now: f64,
        rng: &mut R,
    ) -> Result<Attempt, EngineError> {
        let (carrier, time) = self.heap.peek().ok_or(EngineError::Stalled)?;
        if !time.is_finite() {
            return Err(EngineError::Stalled);
        }
        let origin = carriers[carrier].site;
        let u = rng.gen::<f64>() * graph.site(origin).rate_sum;
        let edge = select_edge(graph.edges(origin), u).ok_or(EngineError::Stalled)?;
        Ok(Attempt {
            carrier: Some(carrier),
            origin,
            edge,
            time,
        })
    }

    fn after_attempt<R: Rng>(
        &mut self,
        graph: &SiteGraph,
        carriers: &[Carrier],
        attempt: &Attempt,
        rng: &mut R,
    ) {
        if let Some(carrier) = attempt.carrier {
            let rate_sum = graph.site(carriers[carrier].site).rate_sum;
            let time = Self::next_event_time(attempt.time, rate_sum, rng);
            self.heap.update_key(carrier, time);
        }
    }

    fn rebase(&mut self, delta: f64) {
        self.heap.shift_keys(delta);
    }
}

/// First edge whose cumulative rate reaches `u`, skipping zero rates. Rounding can leave `u`
/// above the total, then the last positive edge is chosen.
pub fn select_edge(edges: &[Edge], u: f64) -> Option<usize> {
    let mut cumulative = 0.0;
    let mut last = None;
    for (k, e) in edges.iter().enumerate() {
        if e.rate <= 0.0 {
            continue;
        }
        cumulative += e.rate;
        last = Some(k);
        if cumulative >= u {
            return last;
        }
    }
    last
}

/// Draws edges of the whole graph from an alias table weighted by rate and advances the clock
/// by the mean waiting time `1 / Σ rate` per draw. A draw is a hop only if its origin is
/// occupied and its target empty.
#[derive(Debug, Clone)]
pub struct AliasScheduler {
    table: WeightedAliasIndex<f64>,
    origins: Vec<usize>,
    offsets: Vec<usize>,
    time_step: f64,
}

impl AliasScheduler {
    /// Build the alias table over all edges of `graph`.
    pub fn new(graph: &SiteGraph) -> Result<Self, EngineError> {
        let weights: Vec<f64> = graph.all_edges().iter().map(|e| e.rate).collect();
        let total: f64 = weights.iter().sum();
        let table = WeightedAliasIndex::new(weights)
            .map_err(|e| EngineError::EmptyRateTable(e.to_string()))?;
        let origins = (0..graph.n_sites())
            .flat_map(|i| std::iter::repeat(i).take(graph.edges(i).len()))
            .collect();
        let offsets = (0..graph.n_sites()).map(|i| graph.edge_offset(i)).collect();
        Ok(Self {
            table,
            origins,
            offsets,
            time_step: 1.0 / total,
        })
    }

    /// Simulation time per draw.
    pub fn time_step(&self) -> f64 {
        self.time_step
    }
}

impl Scheduler for AliasScheduler {
    fn place<R: Rng>(&mut self, _: &SiteGraph, _: &[Carrier], _: f64, _: &mut R) {}

    fn next_attempt<R: Rng>(
        &mut self,
        graph: &SiteGraph,
        _carriers: &[Carrier],
        now: f64,
        rng: &mut R,
    ) -> Result<Attempt, EngineError> {
        let index = self.table.sample(rng);
        let origin = self.origins[index];
        Ok(Attempt {
            carrier: graph.site(origin).carrier,
            origin,
            edge: index - self.offsets[origin],
            time: now + self.time_step,
        })
    }

    fn after_attempt<R: Rng>(&mut self, _: &SiteGraph, _: &[Carrier], _: &Attempt, _: &mut R) {}

    fn rebase(&mut self, _delta: f64) {}
}
