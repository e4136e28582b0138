use crate::geometry::{PeriodicBox, Vector};
use itertools::iproduct;
use smallvec::SmallVec;

/// Flat indices of the distinct cells around one cell, at most 27.
pub type Neighborhood = SmallVec<[usize; 27]>;

/// Partition of a periodic box into a grid of cells no smaller than the cut-off radius, so
/// any pair closer than the cut-off lies in the same or in adjacent cells.
///
/// Members are stored bucket-sorted: the sites of cell `c` are
/// `members[offsets[c]..offsets[c + 1]]`, in ascending site order.
#[derive(Debug, Clone)]
pub struct CellList {
    dims: [usize; 3],
    cell_length: Vector,
    offsets: Vec<usize>,
    members: Vec<usize>,
}

impl CellList {
    /// Bucket `positions` into cells of edge at least `cutoff_radius`.
    pub fn new(periodic_box: &PeriodicBox, cutoff_radius: f64, positions: &[Vector]) -> Self {
        let lengths = periodic_box.lengths();
        let mut dims = [1usize; 3];
        let mut cell_length = *lengths;
        for axis in 0..3 {
            let n = ((lengths[axis] / cutoff_radius).floor() as usize).max(1);
            dims[axis] = n;
            cell_length[axis] = lengths[axis] / n as f64;
        }

        let mut list = Self {
            dims,
            cell_length,
            offsets: vec![0; dims[0] * dims[1] * dims[2] + 1],
            members: vec![0; positions.len()],
        };

        let cells: Vec<usize> = positions.iter().map(|p| list.flat(list.cell_of(p))).collect();
        cells.iter().for_each(|c| list.offsets[c + 1] += 1);
        for c in 0..list.n_cells() {
            list.offsets[c + 1] += list.offsets[c];
        }
        let mut fill = list.offsets.clone();
        cells.into_iter().enumerate().for_each(|(site, c)| {
            list.members[fill[c]] = site;
            fill[c] += 1;
        });
        list
    }

    /// Cells per axis.
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Total number of cells.
    pub fn n_cells(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    /// Grid coordinates of the cell containing `p`.
    pub fn cell_of(&self, p: &Vector) -> [usize; 3] {
        let mut cell = [0usize; 3];
        for axis in 0..3 {
            let c = (p[axis] / self.cell_length[axis]).floor();
            cell[axis] = if c <= 0.0 {
                0
            } else {
                (c as usize).min(self.dims[axis] - 1)
            };
        }
        cell
    }

    /// Flat index of grid coordinates.
    pub fn flat(&self, cell: [usize; 3]) -> usize {
        (cell[0] * self.dims[1] + cell[1]) * self.dims[2] + cell[2]
    }

    /// Sites in one cell.
    pub fn members(&self, flat: usize) -> &[usize] {
        &self.members[self.offsets[flat]..self.offsets[flat + 1]]
    }

    /// The 3x3x3 block of cells around `cell`, wrapped periodically. Offsets that alias onto
    /// the same cell in small grids appear once.
    pub fn neighborhood(&self, cell: [usize; 3]) -> Neighborhood {
        let mut seen = Neighborhood::new();
        let wrap = |c: usize, d: isize, n: usize| -> usize {
            ((c as isize + d).rem_euclid(n as isize)) as usize
        };
        iproduct!(-1isize..=1, -1isize..=1, -1isize..=1).for_each(|(dx, dy, dz)| {
            let flat = self.flat([
                wrap(cell[0], dx, self.dims[0]),
                wrap(cell[1], dy, self.dims[1]),
                wrap(cell[2], dz, self.dims[2]),
            ]);
            if !seen.contains(&flat) {
                seen.push(flat);
            }
        });
        seen
    }
}
