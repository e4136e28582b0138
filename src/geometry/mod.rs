//! Sites in a periodic box and the rates connecting them.

/// Site energy distributions.
pub mod dos;
/// Miller-Abrahams transition rates.
pub mod rates;
/// Site placement.
pub mod sites;

pub use dos::DensityOfStates;
pub use rates::RateModel;
pub use sites::{generate_points, SitePoint};

use serde::{Deserialize, Serialize};

/// A position or displacement in the box.
pub type Vector = nalgebra::Vector3<f64>;

/// An orthorhombic box with periodic boundaries on all faces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodicBox {
    lengths: Vector,
}

impl PeriodicBox {
    /// Make a box with edges `[lx, ly, lz]`.
    pub fn new(lengths: [f64; 3]) -> Self {
        Self {
            lengths: Vector::from(lengths),
        }
    }

    /// Edge lengths.
    pub fn lengths(&self) -> &Vector {
        &self.lengths
    }

    /// The smallest edge length.
    pub fn min_length(&self) -> f64 {
        self.lengths.iter().cloned().fold(f64::INFINITY, f64::min)
    }

    /// Displacement from `from` to `to` under the minimum-image convention. Every component
    /// lies in `[-L/2, L/2)`.
    pub fn minimum_image(&self, from: &Vector, to: &Vector) -> Vector {
        let mut d = to - from;
        d.iter_mut()
            .zip(self.lengths.iter())
            .for_each(|(c, l)| *c = wrap_component(*c, *l));
        d
    }

    /// Minimum-image distance between two points.
    pub fn distance(&self, from: &Vector, to: &Vector) -> f64 {
        self.minimum_image(from, to).norm()
    }
}

/// Fold one component of a raw difference of two in-box coordinates into `[-l/2, l/2)`.
fn wrap_component(d: f64, l: f64) -> f64 {
    let half = l / 2.0;
    if d >= half {
        d - l
    } else if d < -half {
        d + l
    } else {
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn wraps_across_boundary() {
        let b = PeriodicBox::new([10.0, 10.0, 10.0]);
        let d = b.minimum_image(&Vector::new(0.5, 0.0, 9.0), &Vector::new(9.5, 0.0, 1.0));
        assert!((d.x + 1.0).abs() < 1e-12);
        assert!((d.z - 2.0).abs() < 1e-12);
        assert!((b.distance(&Vector::new(0.5, 0.0, 0.0), &Vector::new(9.5, 0.0, 0.0)) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn half_length_maps_to_negative() {
        let b = PeriodicBox::new([2.0, 2.0, 2.0]);
        let up = b.minimum_image(&Vector::new(0.0, 0.0, 0.0), &Vector::new(0.0, 0.0, 1.0));
        let down = b.minimum_image(&Vector::new(0.0, 0.0, 1.0), &Vector::new(0.0, 0.0, 0.0));
        assert_eq!(up.z, -1.0);
        assert_eq!(down.z, -1.0);
    }

    proptest! {
        #[test]
        fn components_in_half_open_range(
            ax in 0.0f64..7.0, ay in 0.0f64..5.0, az in 0.0f64..3.0,
            bx in 0.0f64..7.0, by in 0.0f64..5.0, bz in 0.0f64..3.0,
        ) {
            let b = PeriodicBox::new([7.0, 5.0, 3.0]);
            let d = b.minimum_image(&Vector::new(ax, ay, az), &Vector::new(bx, by, bz));
            for (c, l) in d.iter().zip(b.lengths().iter()) {
                prop_assert!(*c >= -l / 2.0 && *c < l / 2.0);
            }
            let half_diagonal = (b.lengths() / 2.0).norm();
            prop_assert!(b.distance(&Vector::new(ax, ay, az), &Vector::new(bx, by, bz)) <= half_diagonal);
        }
    }
}
