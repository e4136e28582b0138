#![allow(dead_code)]

use hopmc::config::DosShape;
use hopmc::geometry::{generate_points, DensityOfStates, PeriodicBox, RateModel, SitePoint};
use hopmc::graph::{GraphBuilder, SiteGraph};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Sites of a simple cubic lattice, all at `energy`.
pub fn lattice_points(dims: [usize; 3], energy: f64) -> Vec<SitePoint> {
    let [lx, ly, lz] = dims;
    let mut points = Vec::with_capacity(lx * ly * lz);
    for x in 0..lx {
        for y in 0..ly {
            for z in 0..lz {
                points.push(SitePoint::new(x as f64, y as f64, z as f64, energy));
            }
        }
    }
    points
}

pub fn cubic_box(dims: [usize; 3]) -> PeriodicBox {
    PeriodicBox::new([dims[0] as f64, dims[1] as f64, dims[2] as f64])
}

pub fn rates(localization_length: f64, temperature: f64, field: f64) -> RateModel {
    RateModel {
        localization_length,
        temperature,
        field,
    }
}

/// A graph of randomly placed sites with exponential DOS energies.
pub fn random_graph(seed: u64, dims: [usize; 3], cutoff_radius: f64, rates: RateModel) -> SiteGraph {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let dos = DensityOfStates::new(DosShape::ExponentialPower { exponent: 1.0 }).unwrap();
    let points = generate_points(dims, false, &dos, &mut rng);
    GraphBuilder::new(cubic_box(dims), cutoff_radius, rates).build(points)
}
