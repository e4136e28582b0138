use super::SiteGraph;
use crate::error::SoftPairError;
use std::collections::HashSet;
use tracing::debug;

/// Outcome of a successful softpair removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoftPairSummary {
    /// Correction passes executed.
    pub passes: usize,
    /// Pairs corrected over all passes.
    pub corrected: usize,
}

/// Removes transitions that carry more than `threshold` of their source site's total rate.
///
/// Such a pair of sites behaves as one dimer: a carrier bounces between them with vanishing time
/// increments. The dominant edge `i → j` is zeroed and every other edge `i → x` for which `j`
/// also reaches `x` is blended with `j → x`,
/// `r'(i→x) = (r(i→x)·Σ_j + r(j→x)·r(i→j)) / (Σ_j + r(i→j))`.
/// Edges `j` does not share are left unchanged. Blending can create new softpairs, so passes
/// repeat until none remain or `max_passes` is exhausted.
#[derive(Debug, Clone, Copy)]
pub struct SoftPairCorrector {
    threshold: f64,
    max_passes: usize,
}

impl SoftPairCorrector {
    /// A corrector for a rate fraction `threshold`, giving up after `max_passes`.
    pub fn new(threshold: f64, max_passes: usize) -> Self {
        Self {
            threshold,
            max_passes,
        }
    }

    /// Correct `graph` in place until no softpair is left.
    pub fn apply(&self, graph: &mut SiteGraph) -> Result<SoftPairSummary, SoftPairError> {
        let mut summary = SoftPairSummary::default();
        loop {
            let pairs = find_softpairs(graph, self.threshold);
            if pairs.is_empty() {
                return Ok(summary);
            }
            if summary.passes >= self.max_passes {
                return Err(SoftPairError::DidNotConverge {
                    passes: summary.passes,
                    remaining: pairs.len(),
                });
            }
            pairs
                .iter()
                .for_each(|&(i, j)| correct_pair(graph, i, j));
            summary.passes += 1;
            summary.corrected += pairs.len();
            debug!(
                pass = summary.passes,
                pairs = pairs.len(),
                "softpair pass done"
            );
        }
    }
}

/// Number of directed edges carrying more than `threshold` of their source's rate sum.
pub fn count_softpairs(graph: &SiteGraph, threshold: f64) -> usize {
    (0..graph.n_sites())
        .map(|i| dominant_targets(graph, i, threshold).count())
        .sum()
}

/// Ordered `(i, j)` softpairs, each unordered pair reported once at its first occurrence.
fn find_softpairs(graph: &SiteGraph, threshold: f64) -> Vec<(usize, usize)> {
    let mut seen = HashSet::new();
    (0..graph.n_sites())
        .flat_map(|i| dominant_targets(graph, i, threshold).map(move |j| (i, j)))
        .filter(|&(i, j)| seen.insert((i.min(j), i.max(j))))
        .collect()
}

fn dominant_targets(graph: &SiteGraph, i: usize, threshold: f64) -> impl Iterator<Item = usize> + '_ {
    let rate_sum = graph.site(i).rate_sum;
    graph
        .edges(i)
        .iter()
        .filter(move |e| rate_sum > 0.0 && e.rate / rate_sum > threshold)
        .map(|e| e.target)
}

fn correct_pair(graph: &mut SiteGraph, i: usize, j: usize) {
    let rate_ij = graph.rate_between(i, j);
    let sum_j = graph.site(j).rate_sum;
    let norm = sum_j + rate_ij;
    let blended: Vec<f64> = graph
        .edges(i)
        .iter()
        .map(|e| {
            if e.target == j {
                return 0.0;
            }
            let rate_jx = graph.rate_between(j, e.target);
            if rate_jx > 0.0 && norm > 0.0 {
                (e.rate * sum_j + rate_jx * rate_ij) / norm
            } else {
                e.rate
            }
        })
        .collect();
    graph
        .edges_mut(i)
        .iter_mut()
        .zip(blended)
        .for_each(|(e, rate)| e.rate = rate);
    graph.recompute_rate_sum(i);
    graph.sort_edges(i);
}
