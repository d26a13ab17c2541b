#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Radius queries over a per-tick snapshot of agent positions.
//!
//! Indices are rebuilt from scratch after every movement phase and answer
//! "which agents lie within `r` of this point" with an inclusive Euclidean
//! predicate. Results are agent indices in unspecified order; a query centred
//! on an indexed agent reports that agent too, so callers filter self-matches.

mod grid;
mod rtree;

pub use grid::UniformGridIndex;
pub use rtree::RTreeIndex;

use std::fmt;

use epiwalk_core::IndexKind;
use glam::DVec2;
use thiserror::Error;

/// Errors emitted by spatial index implementations.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum IndexError {
    /// Grid buckets need a positive edge length.
    #[error("grid cell size must be positive, got {0}")]
    InvalidCellSize(f64),
    /// Positions must be finite to be bucketed or compared.
    #[error("position of agent {index} is not finite")]
    NonFinitePosition {
        /// Offending agent index.
        index: usize,
    },
}

/// Common behaviour exposed by neighbourhood indices.
pub trait SpatialIndex: fmt::Debug {
    /// Replaces the indexed snapshot with `positions`, where slot `i` holds
    /// the position of agent `i`.
    fn build(&mut self, positions: &[DVec2]) -> Result<(), IndexError>;

    /// Clears `out` and fills it with every index whose position satisfies
    /// `distance(position, point) <= radius`. Negative radii behave like zero.
    fn query_radius(&self, point: DVec2, radius: f64, out: &mut Vec<usize>);

    /// Number of indexed positions.
    fn len(&self) -> usize;

    /// Whether the snapshot is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Inclusive distance predicate shared by every index implementation.
#[must_use]
pub fn within_radius(position: DVec2, point: DVec2, radius: f64) -> bool {
    let radius = radius.max(0.0);
    position.distance_squared(point) <= radius * radius
}

/// Half-width of the box scanned around a query point. Slightly wider than
/// the radius so rounding at the box edge never drops a boundary match; the
/// exact predicate decides membership.
pub(crate) fn search_reach(radius: f64) -> f64 {
    let radius = radius.max(0.0);
    radius + radius * 1e-9 + 1e-9
}

pub(crate) fn check_finite(positions: &[DVec2]) -> Result<(), IndexError> {
    match positions.iter().position(|position| !position.is_finite()) {
        Some(index) => Err(IndexError::NonFinitePosition { index }),
        None => Ok(()),
    }
}

/// Linear-scan index used as the correctness reference.
#[derive(Clone, Debug, Default)]
pub struct BruteForceIndex {
    positions: Vec<DVec2>,
}

impl BruteForceIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpatialIndex for BruteForceIndex {
    fn build(&mut self, positions: &[DVec2]) -> Result<(), IndexError> {
        check_finite(positions)?;
        self.positions.clear();
        self.positions.extend_from_slice(positions);
        Ok(())
    }

    fn query_radius(&self, point: DVec2, radius: f64, out: &mut Vec<usize>) {
        out.clear();
        out.extend(
            self.positions
                .iter()
                .enumerate()
                .filter(|(_, position)| within_radius(**position, point, radius))
                .map(|(index, _)| index),
        );
    }

    fn len(&self) -> usize {
        self.positions.len()
    }
}

/// Creates the index selected by configuration.
///
/// `cell_size` only affects [`IndexKind::Grid`].
pub fn build_index(kind: IndexKind, cell_size: f64) -> Result<Box<dyn SpatialIndex>, IndexError> {
    Ok(match kind {
        IndexKind::RTree => Box::new(RTreeIndex::new()),
        IndexKind::Grid => Box::new(UniformGridIndex::new(cell_size)?),
        IndexKind::BruteForce => Box::new(BruteForceIndex::new()),
    })
}
