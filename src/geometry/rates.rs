use super::Vector;
use serde::{Deserialize, Serialize};

/// Parameters of the Miller-Abrahams hopping rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateModel {
    /// Localization length `a`.
    pub localization_length: f64,
    /// Temperature `T`; zero forbids every uphill hop.
    pub temperature: f64,
    /// Field `F` along z.
    pub field: f64,
}

impl RateModel {
    /// Rate for a hop from energy `from` to energy `to` across the minimum-image displacement `d`.
    ///
    /// `dE = E_to - E_from - F·dz`; the rate is `exp(-2|d|/a)`, times `exp(-dE/T)` for uphill
    /// hops.
    pub fn rate(&self, d: &Vector, from: f64, to: f64) -> f64 {
        let delta_e = to - from - self.field * d.z;
        miller_abrahams(d.norm(), delta_e, self.localization_length, self.temperature)
    }
}

/// Miller-Abrahams rate for a hop over `distance` with energy change `delta_e`.
pub fn miller_abrahams(distance: f64, delta_e: f64, localization_length: f64, temperature: f64) -> f64 {
    let tunneling = (-2.0 * distance / localization_length).exp();
    if delta_e <= 0.0 {
        tunneling
    } else if temperature > 0.0 {
        tunneling * (-delta_e / temperature).exp()
    } else {
        0.0
    }
}
