//! Error types.
//!
//! Configuration problems are unrecoverable and abort a simulation before any work is done.
//! Solver non-convergence is not an error, see [`crate::results::SolverReport`].

/// A rejected simulation configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Box edges must be at least one site long.
    #[error("box lengths must be positive, got {0}x{1}x{2}")]
    BoxLength(usize, usize, usize),
    /// The cutoff radius must lie in `(0, min(Lx, Ly, Lz)]`.
    #[error("cut-off radius {radius} is outside (0, {max}]")]
    CutoffRadius {
        /// The configured radius.
        radius: f64,
        /// The smallest box edge.
        max: f64,
    },
    /// The exponential-power shape parameter must be positive.
    #[error("DOS exponent must be positive, got {0}")]
    DosExponent(f64),
    /// The localization length must be positive.
    #[error("localization length must be positive, got {0}")]
    LocalizationLength(f64),
    /// Negative temperatures are meaningless here.
    #[error("temperature must be non-negative, got {0}")]
    Temperature(f64),
    /// At least one site must stay empty.
    #[error("{carriers} carriers overfill a system of {sites} sites")]
    Overfilled {
        /// Requested carriers.
        carriers: usize,
        /// Sites in the box.
        sites: usize,
    },
    /// At least one carrier is needed.
    #[error("at least one carrier is required")]
    NoCarriers,
    /// Softpair threshold must be positive.
    #[error("softpair threshold must be positive, got {0}")]
    SoftPairThresholdValue(f64),
    /// Softpair removal needs at least one correction pass.
    #[error("softpair removal needs at least one pass")]
    SoftPairPasses,
    /// Softpair removal did not terminate within the configured number of passes.
    #[error("softpair threshold {threshold} does not terminate: {source}")]
    SoftPairThreshold {
        /// The configured threshold.
        threshold: f64,
        /// The underlying corrector failure.
        #[source]
        source: SoftPairError,
    },
    /// A solver iteration cap or tolerance is unusable.
    #[error("invalid solver settings: {0}")]
    Solver(String),
    /// Reading or deserializing a configuration source failed.
    #[error("failed to load configuration: {0}")]
    Load(String),
}

impl From<::config::ConfigError> for ConfigError {
    fn from(e: ::config::ConfigError) -> Self {
        ConfigError::Load(e.to_string())
    }
}

/// Failure of the softpair corrector to reach a fixed point.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftPairError {
    /// Softpairs remained after the maximum number of passes.
    #[error("{remaining} softpairs remain after {passes} passes")]
    DidNotConverge {
        /// Passes executed.
        passes: usize,
        /// Softpairs still above threshold.
        remaining: usize,
    },
}

/// Failures of the kinetic Monte Carlo engine. These all stem from degenerate geometry.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// No carrier can ever hop again.
    #[error("all carriers are stuck on sites without outgoing transitions")]
    Stalled,
    /// Every carrier that could hop only has transitions onto occupied sites, and those
    /// carriers cannot move either.
    #[error("no carrier has a transition onto an empty site")]
    Blocked,
    /// The alias table has no positive weight to sample from.
    #[error("cannot build an alias table: {0}")]
    EmptyRateTable(String),
}

/// Top level error of a realization.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum HopError {
    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The engine could not make progress.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// The worker pool could not be built.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}
