//! Kinetic Monte Carlo simulation of carriers hopping on a [`crate::graph::SiteGraph`].
//!
//! A [`KmcEngine`] moves through [`Phase`]s once per rerun: carriers are placed at random,
//! relax without statistics, are measured, and finally occupation times are credited. The
//! choice of the next event is delegated to a [`Scheduler`].

/// Carrier state.
pub mod carrier;
/// The state machine executing hops.
pub mod engine;
/// Indexed binary min-heap of carrier event times.
pub mod heap;
/// Transport coefficients from the engine state.
pub mod observables;
/// Event selection strategies.
pub mod scheduler;

pub use carrier::Carrier;
pub use engine::{KmcEngine, PhaseTargets};
pub use heap::CarrierHeap;
pub use scheduler::{AliasScheduler, Attempt, ExactScheduler, Scheduler};

/// Lifecycle of one rerun.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No carriers placed.
    Idle,
    /// Burn-in, no statistics are recorded.
    Relaxing,
    /// Statistics are recorded.
    Measuring,
    /// Measurement finished and occupation times credited.
    Done,
}
