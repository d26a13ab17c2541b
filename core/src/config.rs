use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Lattice;

/// Every option recognised by the engine, read once when a run starts.
///
/// Defaults reproduce the reference scenario: ten thousand people on a
/// 100×100 lattice (one square kilometre, so a unit is ten metres), a six-foot
/// transmission radius and a five-foot stride.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// Number of agents in the population.
    pub population: usize,
    /// Horizontal lattice extent.
    pub lattice_width: f64,
    /// Vertical lattice extent.
    pub lattice_height: f64,
    /// Maximum separation, inclusive, at which transmission happens.
    pub infectable_distance: f64,
    /// Scale applied to each unit direction during a step.
    pub step_length: f64,
    /// Infected fraction at which the run stops.
    pub infection_upper_bound: f64,
    /// Ticks between scheduling a recovery and resolving it.
    pub recovery_duration: u64,
    /// Keeps every recovered agent immune for the rest of the run.
    pub retain_immunity: bool,
    /// Probability that an agent is created able to relapse.
    pub relapse_probability: f64,
    /// Probability that a new infection schedules its recovery.
    pub immune_onset_probability: f64,
    /// Master seed for every random stream of the run.
    pub seed: u64,
    /// Safety bound on the number of ticks processed.
    pub max_ticks: u64,
    /// Number of ticks between recorded metrics samples.
    pub sample_interval: u64,
    /// Neighbour search structure rebuilt every tick.
    pub index: IndexKind,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            population: 10_000,
            lattice_width: 100.0,
            lattice_height: 100.0,
            infectable_distance: 0.2,
            step_length: 0.15,
            infection_upper_bound: 0.95,
            recovery_duration: 5,
            retain_immunity: false,
            relapse_probability: 0.05,
            immune_onset_probability: 0.02,
            seed: 0,
            max_ticks: 100_000,
            sample_interval: 1,
            index: IndexKind::RTree,
        }
    }
}

impl SimConfig {
    /// Lattice described by the configured dimensions.
    #[must_use]
    pub const fn lattice(&self) -> Lattice {
        Lattice::new(self.lattice_width, self.lattice_height)
    }

    /// Rejects configurations the engine cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        if u32::try_from(self.population).is_err() {
            return Err(ConfigError::PopulationTooLarge(self.population));
        }

        let (width, height) = (self.lattice_width, self.lattice_height);
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(ConfigError::InvalidLattice { width, height });
        }
        let shortest_side = width.min(height);

        let radius = self.infectable_distance;
        if !radius.is_finite() || radius < 0.0 {
            return Err(ConfigError::InvalidRadius(radius));
        }
        if radius > shortest_side {
            return Err(ConfigError::RadiusExceedsLattice {
                radius,
                shortest_side,
            });
        }

        let step = self.step_length;
        if !step.is_finite() || step < 0.0 {
            return Err(ConfigError::InvalidStepLength(step));
        }
        if step * 2.0 > shortest_side {
            return Err(ConfigError::StepExceedsLattice {
                step,
                shortest_side,
            });
        }

        let bound = self.infection_upper_bound;
        if !(bound > 0.0 && bound <= 1.0) {
            return Err(ConfigError::InvalidUpperBound(bound));
        }

        check_probability("relapse_probability", self.relapse_probability)?;
        check_probability("immune_onset_probability", self.immune_onset_probability)?;

        if self.max_ticks == 0 {
            return Err(ConfigError::ZeroMaxTicks);
        }
        if self.sample_interval == 0 {
            return Err(ConfigError::ZeroSampleInterval);
        }

        Ok(())
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidProbability { name, value })
    }
}

/// Reasons a configuration is rejected before the run starts.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// The population must contain at least the index case.
    #[error("population must contain at least one agent")]
    EmptyPopulation,
    /// Agent identifiers are 32-bit.
    #[error("population of {0} exceeds the supported maximum")]
    PopulationTooLarge(usize),
    /// Lattice dimensions must be positive and finite.
    #[error("lattice dimensions must be positive, got {width}×{height}")]
    InvalidLattice {
        /// Configured width.
        width: f64,
        /// Configured height.
        height: f64,
    },
    /// The infection radius must be a non-negative number.
    #[error("infectable distance must be non-negative, got {0}")]
    InvalidRadius(f64),
    /// The infection radius cannot exceed the lattice.
    #[error("infectable distance {radius} exceeds the lattice side {shortest_side}")]
    RadiusExceedsLattice {
        /// Configured radius.
        radius: f64,
        /// Smaller of the two lattice dimensions.
        shortest_side: f64,
    },
    /// The step length must be a non-negative number.
    #[error("step length must be non-negative, got {0}")]
    InvalidStepLength(f64),
    /// A reflected step could still leave the lattice.
    #[error("step length {step} exceeds half the lattice side {shortest_side}")]
    StepExceedsLattice {
        /// Configured step length.
        step: f64,
        /// Smaller of the two lattice dimensions.
        shortest_side: f64,
    },
    /// The termination threshold must lie in `(0, 1]`.
    #[error("infection upper bound must lie in (0, 1], got {0}")]
    InvalidUpperBound(f64),
    /// A probability lies outside `[0, 1]`.
    #[error("{name} must lie in [0, 1], got {value}")]
    InvalidProbability {
        /// Name of the offending option.
        name: &'static str,
        /// Configured value.
        value: f64,
    },
    /// The run needs room for at least one tick.
    #[error("max_ticks must be positive")]
    ZeroMaxTicks,
    /// Samples need a positive cadence.
    #[error("sample_interval must be positive")]
    ZeroSampleInterval,
}

/// Neighbour search structures available to the transmission phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexKind {
    /// Bulk-loaded R*-tree.
    #[default]
    #[serde(rename = "rtree")]
    RTree,
    /// Dense uniform grid bucketed by the infection radius.
    #[serde(rename = "grid")]
    Grid,
    /// Linear scan over every agent.
    #[serde(rename = "brute-force")]
    BruteForce,
}

impl IndexKind {
    /// Name accepted in configuration files and on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RTree => "rtree",
            Self::Grid => "grid",
            Self::BruteForce => "brute-force",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IndexKind {
    type Err = ParseIndexKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        [Self::RTree, Self::Grid, Self::BruteForce]
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| ParseIndexKindError(value.to_owned()))
    }
}

/// Unknown index name.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown index `{0}`, expected one of rtree, grid, brute-force")]
pub struct ParseIndexKindError(String);
