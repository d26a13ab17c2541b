//! Bulk-loaded R*-tree index.

use std::fmt;

use glam::DVec2;
use rstar::{primitives::GeomWithData, RTree, AABB};

use crate::{check_finite, search_reach, within_radius, IndexError, SpatialIndex};

type Entry = GeomWithData<[f64; 2], usize>;

/// Balanced tree rebuilt with `bulk_load` in O(n log n) every tick.
pub struct RTreeIndex {
    tree: RTree<Entry>,
}

impl RTreeIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }
}

impl Default for RTreeIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RTreeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RTreeIndex")
            .field("size", &self.tree.size())
            .finish()
    }
}

impl SpatialIndex for RTreeIndex {
    fn build(&mut self, positions: &[DVec2]) -> Result<(), IndexError> {
        check_finite(positions)?;
        let entries = positions
            .iter()
            .enumerate()
            .map(|(index, position)| Entry::new(position.to_array(), index))
            .collect();
        self.tree = RTree::bulk_load(entries);
        Ok(())
    }

    fn query_radius(&self, point: DVec2, radius: f64, out: &mut Vec<usize>) {
        out.clear();
        let reach = search_reach(radius);
        let envelope = AABB::from_corners(
            [point.x - reach, point.y - reach],
            [point.x + reach, point.y + reach],
        );
        out.extend(
            self.tree
                .locate_in_envelope(&envelope)
                .filter(|entry| within_radius(DVec2::from_array(*entry.geom()), point, radius))
                .map(|entry| entry.data),
        );
    }

    fn len(&self) -> usize {
        self.tree.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_agents_within_radius() {
        let mut index = RTreeIndex::new();
        index
            .build(&[
                DVec2::new(5.0, 5.0),
                DVec2::new(6.0, 5.0),
                DVec2::new(50.0, 50.0),
            ])
            .expect("build");

        let mut out = Vec::new();
        index.query_radius(DVec2::new(5.0, 5.0), 2.0, &mut out);
        out.sort_unstable();
        assert_eq!(out, vec![0, 1]);
    }

    #[test]
    fn keeps_coincident_points() {
        let mut index = RTreeIndex::new();
        let point = DVec2::new(2.5, 2.5);
        index.build(&[point, point, point]).expect("build");

        let mut out = Vec::new();
        index.query_radius(point, 0.0, &mut out);
        out.sort_unstable();
        assert_eq!(out, vec![0, 1, 2]);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn rebuild_discards_previous_snapshot() {
        let mut index = RTreeIndex::new();
        index.build(&[DVec2::ZERO, DVec2::ONE]).expect("build");
        index.build(&[DVec2::new(9.0, 9.0)]).expect("rebuild");

        let mut out = Vec::new();
        index.query_radius(DVec2::ZERO, 2.0, &mut out);
        assert!(out.is_empty());
        assert_eq!(index.len(), 1);
    }
}
