use super::{descending_rate, CellList, Edge, SiteGraph};
use crate::geometry::{PeriodicBox, RateModel, SitePoint};
use tracing::debug;

/// Builds the neighbor graph of a point cloud.
#[derive(Debug, Clone, Copy)]
pub struct GraphBuilder {
    periodic_box: PeriodicBox,
    cutoff_radius: f64,
    rates: RateModel,
}

impl GraphBuilder {
    /// A builder connecting sites closer than `cutoff_radius` with Miller-Abrahams rates.
    pub fn new(periodic_box: PeriodicBox, cutoff_radius: f64, rates: RateModel) -> Self {
        Self {
            periodic_box,
            cutoff_radius,
            rates,
        }
    }

    /// Connect every site to all others within the cut-off radius. Each site's edges are sorted
    /// by descending rate.
    pub fn build(&self, points: Vec<SitePoint>) -> SiteGraph {
        let positions: Vec<_> = points.iter().map(|p| p.position).collect();
        let cells = CellList::new(&self.periodic_box, self.cutoff_radius, &positions);

        let edge_lists: Vec<Vec<Edge>> = (0..points.len())
            .map(|i| self.neighbors_of(i, &points, &cells))
            .collect();

        let n_edges: usize = edge_lists.iter().map(Vec::len).sum();
        debug!(
            sites = points.len(),
            edges = n_edges,
            cells = cells.n_cells(),
            "built neighbor graph with {:.2} neighbors per site",
            n_edges as f64 / points.len().max(1) as f64
        );
        SiteGraph::from_parts(
            points,
            edge_lists,
            self.periodic_box,
            self.cutoff_radius,
            self.rates,
        )
    }

    fn neighbors_of(&self, i: usize, points: &[SitePoint], cells: &CellList) -> Vec<Edge> {
        let origin = &points[i];
        let mut edges: Vec<Edge> = cells
            .neighborhood(cells.cell_of(&origin.position))
            .into_iter()
            .flat_map(|cell| cells.members(cell).iter().cloned())
            .filter(|&j| j != i)
            .filter_map(|j| {
                let target = &points[j];
                let d = self
                    .periodic_box
                    .minimum_image(&origin.position, &target.position);
                let distance = d.norm();
                if distance > 0.0 && distance < self.cutoff_radius {
                    let rate = self.rates.rate(&d, origin.energy, target.energy);
                    Some(Edge::new(j, rate, d))
                } else {
                    None
                }
            })
            .collect();
        edges.sort_by(descending_rate);
        edges
    }
}
