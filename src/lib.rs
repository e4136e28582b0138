#![deny(
    missing_docs,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_import_braces
)]

//! `hopmc` simulates hopping transport of charge carriers through a disordered solid.
//!
//! Sites with random energies are placed in a periodic box and connected to every neighbor
//! within a cut-off radius by Miller-Abrahams hop rates under an electric field along z. The
//! mobility and related transport quantities are then obtained either by kinetic Monte Carlo
//! (many interacting carriers with site exclusion) or by solving the stationary balance
//! equations of a single carrier.
//!
//! Independent realizations are dispatched on a rayon pool with the `parallel` feature
//! (enabled by default). Each realization draws from its own ChaCha8 stream seeded with
//! `base_seed + run`, so results do not depend on the number of threads.
//!
//! # Example
//! ```
//! use hopmc::config::{Method, Scheduling, SimulationConfig};
//! use hopmc::run::{run_all, ChaChaStreams};
//!
//! let config = SimulationConfig {
//!     length_x: 6,
//!     length_y: 6,
//!     length_z: 6,
//!     temperature: 1.0,
//!     field: 0.1,
//!     n_carriers: 4,
//!     relaxation_hops: 100,
//!     simulation_hops: 1000,
//!     n_runs: 2,
//!     method: Method::Kmc { scheduling: Scheduling::Exact },
//!     ..Default::default()
//! };
//! let outputs = run_all(&config, &ChaChaStreams::from_config(&config)).unwrap();
//! assert_eq!(outputs.len(), 2);
//! let mean_mobility = outputs.iter().map(|o| o.record.mobility()).sum::<f64>() / 2.0;
//! assert!(mean_mobility.is_finite());
//! ```

/// Stationary single-carrier solution of the master equation.
pub mod balance;
/// Simulation configuration and validation.
pub mod config;
/// Error types.
pub mod error;
/// Periodic box, site generation, densities of states and hop rates.
pub mod geometry;
/// Site graphs with outgoing transitions, built from cell lists.
pub mod graph;
/// Kinetic Monte Carlo of interacting carriers.
pub mod kmc;
/// Per-realization results and dump records.
pub mod results;
/// Realization dispatch.
pub mod run;
/// Logging setup.
pub mod telemetry;

pub use crate::config::SimulationConfig;
pub use error::HopError;
pub use results::{Outcome, RealizationOutput, ResultRecord};
pub use run::{run_all, ChaChaStreams};
