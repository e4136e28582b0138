use super::Vector;
use rand::distributions::Distribution;
use rand::Rng;

/// Position and energy of a site before the neighbor graph exists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SitePoint {
    /// Position inside the box.
    pub position: Vector,
    /// Site energy.
    pub energy: f64,
}

impl SitePoint {
    /// Make a site at `(x, y, z)` with `energy`.
    pub fn new(x: f64, y: f64, z: f64, energy: f64) -> Self {
        Self {
            position: Vector::new(x, y, z),
            energy,
        }
    }
}

/// Place one site per unit volume of an integer box, either on the simple cubic lattice or
/// uniformly at random, with energies drawn from `dos`.
///
/// Site `i` corresponds to lattice point `(x, y, z)` with `i = (x * ly + y) * lz + z`.
pub fn generate_points<R: Rng, D: Distribution<f64>>(
    dims: [usize; 3],
    lattice: bool,
    dos: &D,
    rng: &mut R,
) -> Vec<SitePoint> {
    let [lx, ly, lz] = dims;
    let lengths = Vector::new(lx as f64, ly as f64, lz as f64);
    let mut points = Vec::with_capacity(lx * ly * lz);
    for x in 0..lx {
        for y in 0..ly {
            for z in 0..lz {
                let position = if lattice {
                    Vector::new(x as f64, y as f64, z as f64)
                } else {
                    Vector::new(
                        rng.gen::<f64>() * lengths.x,
                        rng.gen::<f64>() * lengths.y,
                        rng.gen::<f64>() * lengths.z,
                    )
                };
                let energy = dos.sample(rng);
                points.push(SitePoint { position, energy });
            }
        }
    }
    points
}
