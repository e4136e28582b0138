use crate::config::DosShape;
use crate::error::ConfigError;
use rand::Rng;
use rand_distr::{Distribution, Gamma, Normal};

/// A sampler for site energies.
#[derive(Debug, Clone, Copy)]
pub enum DensityOfStates {
    /// `p(E) ∝ exp(-|E|^p)`, sampled through `|E|^p ~ Gamma(1/p, 1)` with a random sign.
    ExponentialPower {
        /// Shape parameter `p`.
        exponent: f64,
        /// Distribution of `|E|^p`.
        magnitude: Gamma<f64>,
    },
    /// Unit gaussian.
    Gaussian(Normal<f64>),
}

impl DensityOfStates {
    /// Build the sampler for a configured shape.
    pub fn new(shape: DosShape) -> Result<Self, ConfigError> {
        match shape {
            DosShape::ExponentialPower { exponent } => {
                let magnitude = Gamma::new(1.0 / exponent, 1.0)
                    .map_err(|_| ConfigError::DosExponent(exponent))?;
                Ok(DensityOfStates::ExponentialPower {
                    exponent,
                    magnitude,
                })
            }
            DosShape::Gaussian => Normal::new(0.0, 1.0)
                .map(DensityOfStates::Gaussian)
                .map_err(|e| ConfigError::Load(e.to_string())),
        }
    }
}

impl Distribution<f64> for DensityOfStates {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            DensityOfStates::ExponentialPower {
                exponent,
                magnitude,
            } => {
                let e = magnitude.sample(rng).powf(1.0 / exponent);
                if rng.gen::<bool>() {
                    e
                } else {
                    -e
                }
            }
            DensityOfStates::Gaussian(normal) => normal.sample(rng),
        }
    }
}
