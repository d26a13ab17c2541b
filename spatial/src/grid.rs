//! Dense uniform grid laid out with a counting sort.

use glam::DVec2;

use crate::{check_finite, search_reach, within_radius, IndexError, SpatialIndex};

/// Upper bound on buckets along either axis; coarser cells are used when the
/// configured size would exceed it.
const MAX_CELLS_PER_AXIS: usize = 1024;

/// Buckets positions into square cells covering their bounding box.
///
/// Bucket contents live contiguously in `entries`; bucket `c` spans
/// `entries[cell_starts[c]..cell_starts[c + 1]]` in ascending agent order.
#[derive(Clone, Debug)]
pub struct UniformGridIndex {
    cell_size: f64,
    effective_cell: f64,
    origin: DVec2,
    corner: DVec2,
    columns: usize,
    rows: usize,
    cell_starts: Vec<usize>,
    cursor: Vec<usize>,
    entries: Vec<usize>,
    positions: Vec<DVec2>,
}

impl UniformGridIndex {
    /// Creates an empty grid whose buckets are `cell_size` wide.
    pub fn new(cell_size: f64) -> Result<Self, IndexError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(IndexError::InvalidCellSize(cell_size));
        }

        Ok(Self {
            cell_size,
            effective_cell: cell_size,
            origin: DVec2::ZERO,
            corner: DVec2::ZERO,
            columns: 0,
            rows: 0,
            cell_starts: Vec::new(),
            cursor: Vec::new(),
            entries: Vec::new(),
            positions: Vec::new(),
        })
    }

    #[cfg(test)]
    pub(crate) fn dimensions(&self) -> (usize, usize) {
        (self.columns, self.rows)
    }

    fn axis_cell(&self, offset: f64, count: usize) -> usize {
        // Negative offsets saturate to zero in the cast.
        ((offset / self.effective_cell).floor() as usize).min(count - 1)
    }

    fn cell_of(&self, position: DVec2) -> usize {
        let column = self.axis_cell(position.x - self.origin.x, self.columns);
        let row = self.axis_cell(position.y - self.origin.y, self.rows);
        row * self.columns + column
    }
}

impl SpatialIndex for UniformGridIndex {
    fn build(&mut self, positions: &[DVec2]) -> Result<(), IndexError> {
        check_finite(positions)?;
        self.positions.clear();
        self.positions.extend_from_slice(positions);
        self.entries.clear();
        self.cell_starts.clear();

        let Some(&first) = positions.first() else {
            self.columns = 0;
            self.rows = 0;
            return Ok(());
        };

        let (origin, corner) = positions
            .iter()
            .fold((first, first), |(low, high), &position| {
                (low.min(position), high.max(position))
            });
        let extent = corner - origin;
        let cap = MAX_CELLS_PER_AXIS as f64;
        self.effective_cell = self
            .cell_size
            .max(extent.x / cap)
            .max(extent.y / cap);
        self.origin = origin;
        self.corner = corner;
        self.columns = (extent.x / self.effective_cell).floor() as usize + 1;
        self.rows = (extent.y / self.effective_cell).floor() as usize + 1;

        let cell_count = self.columns * self.rows;
        self.cell_starts.resize(cell_count + 1, 0);
        for &position in positions {
            let cell = self.cell_of(position);
            self.cell_starts[cell + 1] += 1;
        }
        for cell in 1..=cell_count {
            self.cell_starts[cell] += self.cell_starts[cell - 1];
        }

        self.cursor.clear();
        self.cursor.extend_from_slice(&self.cell_starts[..cell_count]);
        self.entries.resize(positions.len(), 0);
        for (index, &position) in positions.iter().enumerate() {
            let cell = self.cell_of(position);
            self.entries[self.cursor[cell]] = index;
            self.cursor[cell] += 1;
        }

        Ok(())
    }

    fn query_radius(&self, point: DVec2, radius: f64, out: &mut Vec<usize>) {
        out.clear();
        if self.positions.is_empty() {
            return;
        }

        let reach = search_reach(radius);
        let low = point - DVec2::splat(reach);
        let high = point + DVec2::splat(reach);
        if high.x < self.origin.x
            || high.y < self.origin.y
            || low.x > self.corner.x
            || low.y > self.corner.y
        {
            return;
        }

        let first_column = self.axis_cell(low.x - self.origin.x, self.columns);
        let last_column = self.axis_cell(high.x - self.origin.x, self.columns);
        let first_row = self.axis_cell(low.y - self.origin.y, self.rows);
        let last_row = self.axis_cell(high.y - self.origin.y, self.rows);

        for row in first_row..=last_row {
            for column in first_column..=last_column {
                let cell = row * self.columns + column;
                let bucket = &self.entries[self.cell_starts[cell]..self.cell_starts[cell + 1]];
                out.extend(
                    bucket
                        .iter()
                        .copied()
                        .filter(|&index| within_radius(self.positions[index], point, radius)),
                );
            }
        }
    }

    fn len(&self) -> usize {
        self.positions.len()
    }
}
