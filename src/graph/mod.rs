//! The directed neighbor graph of allowed transitions.
//!
//! Every site owns a contiguous slice of outgoing [`Edge`]s in a shared [`Arena`], sorted by
//! descending rate. The slice is built once; softpair correction only rewrites rates in place.

/// Contiguous slice storage.
pub mod arena;
/// Neighbor construction.
pub mod builder;
/// Cell-list spatial index.
pub mod cells;
/// Softpair detection and removal.
pub mod softpair;

pub use arena::{Arena, ArenaIndex};
pub use builder::GraphBuilder;
pub use cells::CellList;
pub use softpair::{SoftPairCorrector, SoftPairSummary};

use crate::geometry::{PeriodicBox, RateModel, SitePoint, Vector};
use crate::results::{SiteRecord, TransitionRecord};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A directed transition owned by its source site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Index of the destination site.
    pub target: usize,
    /// Hop rate, never negative.
    pub rate: f64,
    /// Minimum-image displacement from source to target.
    pub displacement: Vector,
    /// Executed hops along this edge while measuring.
    pub transitions: u64,
}

impl Edge {
    /// A fresh edge without recorded transitions.
    pub fn new(target: usize, rate: f64, displacement: Vector) -> Self {
        Self {
            target,
            rate,
            displacement,
            transitions: 0,
        }
    }
}

/// A localized state carriers can occupy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// Position in the box.
    pub position: Vector,
    /// Energy.
    pub energy: f64,
    /// Outgoing edges in the graph's arena.
    pub edges: ArenaIndex,
    /// Sum of the rates of all outgoing edges.
    pub rate_sum: f64,
    /// The carrier currently sitting here.
    pub carrier: Option<usize>,
    /// Simulation time this site was occupied while measuring.
    pub total_occupation_time: f64,
    /// Time the current measured occupation began.
    pub occupied_since: Option<f64>,
    /// Arrivals from a site of higher or equal energy.
    pub visited: u64,
    /// Arrivals from a site of lower energy.
    pub visited_upward: u64,
}

impl Site {
    fn new(position: Vector, energy: f64, edges: ArenaIndex, rate_sum: f64) -> Self {
        Self {
            position,
            energy,
            edges,
            rate_sum,
            carrier: None,
            total_occupation_time: 0.0,
            occupied_since: None,
            visited: 0,
            visited_upward: 0,
        }
    }

    /// Whether a carrier sits here.
    pub fn is_occupied(&self) -> bool {
        self.carrier.is_some()
    }
}

/// Sites of one realization with their outgoing transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteGraph {
    sites: Vec<Site>,
    edges: Arena<Edge>,
    periodic_box: PeriodicBox,
    cutoff_radius: f64,
    rates: RateModel,
}

impl SiteGraph {
    pub(crate) fn from_parts(
        points: Vec<SitePoint>,
        edge_lists: Vec<Vec<Edge>>,
        periodic_box: PeriodicBox,
        cutoff_radius: f64,
        rates: RateModel,
    ) -> Self {
        let total = edge_lists.iter().map(Vec::len).sum();
        let mut edges = Arena::with_capacity(total);
        let sites = points
            .into_iter()
            .zip(edge_lists.into_iter())
            .map(|(point, list)| {
                let rate_sum = list.iter().map(|e| e.rate).sum();
                let index = edges.push_slice(list);
                Site::new(point.position, point.energy, index, rate_sum)
            })
            .collect();
        Self {
            sites,
            edges,
            periodic_box,
            cutoff_radius,
            rates,
        }
    }

    /// Number of sites.
    pub fn n_sites(&self) -> usize {
        self.sites.len()
    }

    /// Number of directed edges.
    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    /// All sites.
    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    /// One site.
    pub fn site(&self, index: usize) -> &Site {
        &self.sites[index]
    }

    /// Mutable access to one site.
    pub fn site_mut(&mut self, index: usize) -> &mut Site {
        &mut self.sites[index]
    }

    /// Mutable access to all sites. Edge slices and rate sums are not meant to be changed
    /// through this.
    pub fn sites_mut(&mut self) -> &mut [Site] {
        &mut self.sites
    }

    /// Outgoing edges of a site.
    pub fn edges(&self, index: usize) -> &[Edge] {
        &self.edges[self.sites[index].edges]
    }

    /// Mutable outgoing edges of a site. Callers changing rates must call
    /// [`SiteGraph::recompute_rate_sum`].
    pub fn edges_mut(&mut self, index: usize) -> &mut [Edge] {
        let slice = self.sites[index].edges;
        &mut self.edges[slice]
    }

    /// All edges of all sites, grouped by source site.
    pub fn all_edges(&self) -> &[Edge] {
        self.edges.as_slice()
    }

    /// Index of an edge within the arena, see [`SiteGraph::all_edges`].
    pub fn edge_offset(&self, site: usize) -> usize {
        self.sites[site].edges.start()
    }

    /// The edge from `from` to `to`, if one exists.
    pub fn edge_between(&self, from: usize, to: usize) -> Option<&Edge> {
        self.edges(from).iter().find(|e| e.target == to)
    }

    /// Rate of the transition `from → to`, zero if there is none.
    pub fn rate_between(&self, from: usize, to: usize) -> f64 {
        self.edge_between(from, to).map(|e| e.rate).unwrap_or(0.0)
    }

    /// Restore `rate_sum` of a site from its edges and return it.
    pub fn recompute_rate_sum(&mut self, index: usize) -> f64 {
        let sum = self.edges(index).iter().map(|e| e.rate).sum();
        self.sites[index].rate_sum = sum;
        sum
    }

    /// Re-sort a site's edges by descending rate, keeping the order of ties.
    pub fn sort_edges(&mut self, index: usize) {
        self.edges_mut(index).sort_by(descending_rate);
    }

    /// Sum of all rates in the graph.
    pub fn total_rate(&self) -> f64 {
        self.sites.iter().map(|s| s.rate_sum).sum()
    }

    /// The box the sites live in.
    pub fn periodic_box(&self) -> &PeriodicBox {
        &self.periodic_box
    }

    /// Cut-off radius used to build the graph.
    pub fn cutoff_radius(&self) -> f64 {
        self.cutoff_radius
    }

    /// Rate parameters used to build the graph.
    pub fn rate_model(&self) -> &RateModel {
        &self.rates
    }

    /// Number of occupied sites.
    pub fn n_occupied(&self) -> usize {
        self.sites.iter().filter(|s| s.is_occupied()).count()
    }

    /// Forget all carriers and measured statistics, keeping geometry and rates.
    pub fn reset_statistics(&mut self) {
        self.sites.iter_mut().for_each(|s| {
            s.carrier = None;
            s.total_occupation_time = 0.0;
            s.occupied_since = None;
            s.visited = 0;
            s.visited_upward = 0;
        });
        for site in 0..self.sites.len() {
            self.edges_mut(site).iter_mut().for_each(|e| e.transitions = 0);
        }
    }

    /// Check structural invariants: no self edges, every edge inside `(0, rc)` with components
    /// in `[-L/2, L/2)`, non-negative rates, consistent rate sums and descending order.
    pub fn verify(&self) -> bool {
        let half = self.periodic_box.lengths() / 2.0;
        self.sites.iter().enumerate().all(|(i, site)| {
            let edges = self.edges(i);
            let sum: f64 = edges.iter().map(|e| e.rate).sum();
            let sum_ok = (sum - site.rate_sum).abs() <= 1e-9 * sum.abs().max(f64::MIN_POSITIVE);
            let sorted = edges.windows(2).all(|w| w[0].rate >= w[1].rate);
            let edges_ok = edges.iter().all(|e| {
                let d = e.displacement.norm();
                e.target != i
                    && d > 0.0
                    && d < self.cutoff_radius
                    && e.rate >= 0.0
                    && e.displacement
                        .iter()
                        .zip(half.iter())
                        .all(|(c, h)| *c >= -h && *c < *h)
            });
            sum_ok && sorted && edges_ok
        })
    }

    /// Per-site records for dumping.
    pub fn site_records(&self) -> Vec<SiteRecord> {
        self.sites
            .iter()
            .map(|s| SiteRecord {
                x: s.position.x,
                y: s.position.y,
                z: s.position.z,
                energy: s.energy,
                visited: s.visited,
                visited_upward: s.visited_upward,
            })
            .collect()
    }

    /// Records of every edge that carried at least one measured hop.
    pub fn transition_records(&self) -> Vec<TransitionRecord> {
        (0..self.sites.len())
            .flat_map(|i| {
                self.edges(i)
                    .iter()
                    .filter(|e| e.transitions > 0)
                    .map(move |e| (i, e))
            })
            .map(|(i, e)| TransitionRecord {
                from: i,
                to: e.target,
                energy_from: self.sites[i].energy,
                energy_to: self.sites[e.target].energy,
                transitions: e.transitions,
            })
            .collect()
    }
}

pub(crate) fn descending_rate(a: &Edge, b: &Edge) -> Ordering {
    b.rate.partial_cmp(&a.rate).unwrap_or(Ordering::Equal)
}
