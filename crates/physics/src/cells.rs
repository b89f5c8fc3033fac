//! Uniform collision-cell index over the bounding box of the sphere cloud.
//!
//! The grid is fixed at [`CELL_COUNT`] cells per axis. Each step the
//! bounding box is recomputed and the reciprocal sphere-to-cells and
//! cell-to-spheres lists are rebuilt; cell coordinates are clamped into the
//! grid, so spheres outside the box are indexed into the border cells by
//! contract. A full cell drops further entries and bumps the saturation
//! counter, the step itself always completes.

use crate::two_dim::TwoDimArray;
use crate::types::{Scalar, Sphere, Vec3};

/// Cells per axis of the collision grid.
pub const CELL_COUNT: u16 = 3;
/// Total cell count.
pub const CELL_COUNT3: u32 = (CELL_COUNT as u32).pow(3);
/// Bounded sphere list length per cell.
pub const MAX_SPHERES_PER_CELL: u16 = 200;
/// A sphere can at most touch every cell of the grid.
pub const MAX_CELLS_PER_SPHERE: u16 = CELL_COUNT.pow(3);

/// Collision-cell index with reciprocal sphere and cell lists.
pub struct CollisionCells {
    bounds_position: Vec3,
    bounds_size: Vec3,
    spheres_in_cells: TwoDimArray<u16>,
    cells_of_spheres: TwoDimArray<u32>,
    saturation_count: u64,
}

impl Default for CollisionCells {
    fn default() -> Self {
        Self::new()
    }
}

impl CollisionCells {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bounds_position: Vec3::ZERO,
            bounds_size: Vec3::ZERO,
            spheres_in_cells: TwoDimArray::new(
                usize::from(MAX_SPHERES_PER_CELL),
                CELL_COUNT3 as usize,
            ),
            cells_of_spheres: TwoDimArray::new(usize::from(MAX_CELLS_PER_SPHERE), 0),
            saturation_count: 0,
        }
    }

    /// Adapts the per-sphere list to the current sphere count.
    pub fn resize_spheres(&mut self, count: usize) {
        self.cells_of_spheres.resize_outer(count);
    }

    /// Lower corner and edge lengths of the current sphere cloud bounds.
    #[must_use]
    pub fn bounds(&self) -> (Vec3, Vec3) {
        (self.bounds_position, self.bounds_size)
    }

    /// Cells overlapped by a sphere's bounding box.
    #[must_use]
    pub fn cells_of(&self, sphere: u16) -> &[u32] {
        self.cells_of_spheres.row(usize::from(sphere))
    }

    /// Spheres whose bounding boxes overlap a cell.
    #[must_use]
    pub fn spheres_in(&self, cell: u32) -> &[u16] {
        self.spheres_in_cells.row(cell as usize)
    }

    /// How many cell-list inserts were dropped because a cell was full.
    #[must_use]
    pub fn saturation_count(&self) -> u64 {
        self.saturation_count
    }

    /// Recomputes the cloud bounding box and rebuilds both reciprocal lists.
    ///
    /// `margin` inflates every sphere's bounding box; passing half the
    /// interaction cutoff guarantees that any pair within the cutoff shares
    /// at least one cell.
    pub fn update(&mut self, spheres: &[Sphere], margin: Scalar) {
        self.update_bounds(spheres, margin);
        self.spheres_in_cells.reset_all();
        self.cells_of_spheres.resize_outer(spheres.len());
        self.cells_of_spheres.reset_all();

        for (index, sphere) in spheres.iter().enumerate() {
            let reach = sphere.radius + margin;
            let min = self.cell_coordinates(sphere.pos, -reach);
            let raw_max = self.cell_coordinates(sphere.pos, reach);
            let max = [
                raw_max[0].max(min[0]),
                raw_max[1].max(min[1]),
                raw_max[2].max(min[2]),
            ];

            for z in min[2]..=max[2] {
                for y in min[1]..=max[1] {
                    for x in min[0]..=max[0] {
                        let cell = (u32::from(z) * u32::from(CELL_COUNT) + u32::from(y))
                            * u32::from(CELL_COUNT)
                            + u32::from(x);
                        if !self.spheres_in_cells.push(cell as usize, index as u16) {
                            self.saturation_count += 1;
                            tracing::trace!(cell, "collision cell full, sphere dropped from list");
                        }
                        self.cells_of_spheres.push(index, cell);
                    }
                }
            }
        }
    }

    fn update_bounds(&mut self, spheres: &[Sphere], margin: Scalar) {
        let Some(first) = spheres.first() else {
            self.bounds_position = Vec3::ZERO;
            self.bounds_size = Vec3::ZERO;
            return;
        };
        let mut min = first.pos;
        let mut max = first.pos;
        for sphere in spheres {
            let reach = sphere.radius + margin;
            for axis in 0..3 {
                min[axis] = min[axis].min(sphere.pos[axis] - reach);
                max[axis] = max[axis].max(sphere.pos[axis] + reach);
            }
        }
        self.bounds_position = min;
        self.bounds_size = max - min;
    }

    /// Maps a position offset by `radius_offset` into clamped cell
    /// coordinates. Degenerate bounds collapse everything into cell zero.
    fn cell_coordinates(&self, pos: Vec3, radius_offset: Scalar) -> [u16; 3] {
        let mut coords = [0u16; 3];
        for axis in 0..3 {
            let size = self.bounds_size[axis];
            if size <= 0.0 {
                continue;
            }
            let value = (pos[axis] - self.bounds_position[axis] + radius_offset) / size;
            let cell = (value * Scalar::from(CELL_COUNT)) as i64;
            coords[axis] = cell.clamp(0, i64::from(CELL_COUNT) - 1) as u16;
        }
        coords
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_sphere_lands_in_every_cell_it_touches() {
        let mut cells = CollisionCells::new();
        let spheres = [
            Sphere::new(Vec3::new(0.0, 0.0, 0.0), 1.0, 0.1),
            Sphere::new(Vec3::new(1.0, 1.0, 1.0), 1.0, 0.1),
        ];
        cells.update(&spheres, 0.0);
        assert!(!cells.cells_of(0).is_empty());
        assert!(!cells.cells_of(1).is_empty());
        // Opposite corners of the cloud never share a cell at this spacing.
        for cell in cells.cells_of(0) {
            assert!(!cells.cells_of(1).contains(cell));
        }
    }

    #[test]
    fn coordinates_clamp_into_the_grid() {
        let mut cells = CollisionCells::new();
        let spheres = [
            Sphere::new(Vec3::new(0.0, 0.0, 0.0), 1.0, 0.5),
            Sphere::new(Vec3::new(1.0, 0.0, 0.0), 1.0, 0.5),
        ];
        cells.update(&spheres, 0.0);
        for sphere in 0..2u16 {
            for &cell in cells.cells_of(sphere) {
                assert!(cell < CELL_COUNT3);
            }
        }
    }
}
