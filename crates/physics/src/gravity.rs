//! Gravity-cell grid for the Barnes-Hut style far field approximation.
//!
//! A single uniform resolution of [`GRAVITY_CELL_COUNT`] cells per axis
//! covers the simulation box. Per step, each cell accumulates sphere count,
//! mass sum and mass-weighted position sum, from which the center of mass is
//! derived. Per cell pair, a one-time classification decides whether the
//! other cell is *far* (its center of mass is used as a single body) or
//! *near* (its spheres are evaluated pairwise); the classification is only
//! rebuilt when the box or the periodic-boundary flag changes. Under
//! periodic boundaries the classification uses minimum-image center
//! distances and every far entry carries the image offset to apply to that
//! cell's center of mass.

use crate::two_dim::TwoDimArray;
use crate::types::{minimum_image, Scalar, Sphere, Vec3};

/// Cells per axis of the gravity grid.
pub const GRAVITY_CELL_COUNT: u16 = 8;
/// Total gravity cell count.
pub const GRAVITY_CELL_COUNT3: u32 = (GRAVITY_CELL_COUNT as u32).pow(3);
/// Opening criterion: a cell is far when the center distance exceeds
/// `theta` times the combined half diagonals.
pub const DEFAULT_THETA: Scalar = 2.0;

/// Gravity-cell grid with cached far/near classification.
pub struct GravityCells {
    theta: Scalar,
    cell_size: Vec3,
    half_diagonal: Scalar,
    positions: Vec<Vec3>,
    approximating: TwoDimArray<u32>,
    approximating_offsets: TwoDimArray<Vec3>,
    pairwise: TwoDimArray<u32>,
    spheres_in_cells: TwoDimArray<u16>,
    sphere_count: Vec<u16>,
    mass_sum: Vec<Scalar>,
    mass_vector_sum: Vec<Vec3>,
    mass_center: Vec<Vec3>,
    cell_of_sphere: Vec<u32>,
}

impl GravityCells {
    /// Builds the grid over the given box and precomputes the neighbor
    /// classification.
    #[must_use]
    pub fn new(box_size: Vec3, periodic: bool) -> Self {
        let cell_count = GRAVITY_CELL_COUNT3 as usize;
        let mut cells = Self {
            theta: DEFAULT_THETA,
            cell_size: Vec3::ZERO,
            half_diagonal: 0.0,
            positions: vec![Vec3::ZERO; cell_count],
            approximating: TwoDimArray::new(cell_count, cell_count),
            approximating_offsets: TwoDimArray::new(cell_count, cell_count),
            pairwise: TwoDimArray::new(cell_count, cell_count),
            spheres_in_cells: TwoDimArray::new(16, cell_count),
            sphere_count: vec![0; cell_count],
            mass_sum: vec![0.0; cell_count],
            mass_vector_sum: vec![Vec3::ZERO; cell_count],
            mass_center: vec![Vec3::ZERO; cell_count],
            cell_of_sphere: Vec::new(),
        };
        cells.rebuild_pairs(box_size, periodic);
        cells
    }

    /// Recomputes cell geometry and the far/near lists. Must be called on
    /// every box resize and on periodic-boundary toggles; per-step updates
    /// never touch the classification.
    pub fn rebuild_pairs(&mut self, box_size: Vec3, periodic: bool) {
        let count = Scalar::from(GRAVITY_CELL_COUNT);
        self.cell_size = Vec3::new(box_size.x / count, box_size.y / count, box_size.z / count);
        self.half_diagonal = self.cell_size.norm() / 2.0;
        for cell in 0..GRAVITY_CELL_COUNT3 {
            let (x, y, z) = Self::coordinates(cell);
            self.positions[cell as usize] = Vec3::new(
                (Scalar::from(x) + 0.5) * self.cell_size.x,
                (Scalar::from(y) + 0.5) * self.cell_size.y,
                (Scalar::from(z) + 0.5) * self.cell_size.z,
            );
        }

        self.approximating.reset_all();
        self.approximating_offsets.reset_all();
        self.pairwise.reset_all();
        let threshold = self.theta * 2.0 * self.half_diagonal;
        for current in 0..GRAVITY_CELL_COUNT3 {
            for other in 0..GRAVITY_CELL_COUNT3 {
                let raw = self.positions[other as usize] - self.positions[current as usize];
                let displacement = if periodic {
                    minimum_image(raw, box_size)
                } else {
                    raw
                };
                if displacement.norm() > threshold {
                    self.approximating.push(current as usize, other);
                    self.approximating_offsets
                        .push(current as usize, displacement - raw);
                } else {
                    self.pairwise.push(current as usize, other);
                }
            }
        }
    }

    /// Adapts per-sphere storage to the current sphere count.
    pub fn resize_spheres(&mut self, count: usize) {
        if self.spheres_in_cells.inner_capacity() < count {
            self.spheres_in_cells
                .resize(count, GRAVITY_CELL_COUNT3 as usize);
        }
        self.cell_of_sphere.resize(count, 0);
    }

    /// Rebuilds the per-cell statistics from the current sphere state.
    pub fn update(&mut self, spheres: &[Sphere]) {
        self.resize_spheres(spheres.len());
        self.spheres_in_cells.reset_all();
        self.sphere_count.fill(0);
        self.mass_sum.fill(0.0);
        self.mass_vector_sum.fill(Vec3::ZERO);

        for (index, sphere) in spheres.iter().enumerate() {
            let cell = self.cell_index(sphere.pos);
            self.spheres_in_cells.push(cell as usize, index as u16);
            self.cell_of_sphere[index] = cell;
            self.sphere_count[cell as usize] += 1;
            self.mass_sum[cell as usize] += sphere.mass;
            self.mass_vector_sum[cell as usize] += sphere.pos * sphere.mass;
        }

        for cell in 0..GRAVITY_CELL_COUNT3 as usize {
            let mass = self.mass_sum[cell];
            self.mass_center[cell] = if mass > 0.0 {
                self.mass_vector_sum[cell] / mass
            } else {
                self.positions[cell]
            };
        }
    }

    /// The gravity cell containing a sphere (positions outside the box
    /// clamp into the border cells).
    #[must_use]
    pub fn cell_of(&self, sphere: u16) -> u32 {
        self.cell_of_sphere[usize::from(sphere)]
    }

    /// Near cells of a cell, evaluated sphere by sphere.
    #[must_use]
    pub fn pairwise_cells(&self, cell: u32) -> &[u32] {
        self.pairwise.row(cell as usize)
    }

    /// Far cells of a cell and the image offsets of their centers of mass.
    #[must_use]
    pub fn approximating_cells(&self, cell: u32) -> (&[u32], &[Vec3]) {
        (
            self.approximating.row(cell as usize),
            self.approximating_offsets.row(cell as usize),
        )
    }

    /// Spheres currently inside a cell.
    #[must_use]
    pub fn spheres_in(&self, cell: u32) -> &[u16] {
        self.spheres_in_cells.row(cell as usize)
    }

    /// Number of spheres inside a cell.
    #[must_use]
    pub fn sphere_count(&self, cell: u32) -> u16 {
        self.sphere_count[cell as usize]
    }

    /// Total mass inside a cell.
    #[must_use]
    pub fn mass(&self, cell: u32) -> Scalar {
        self.mass_sum[cell as usize]
    }

    /// Center of mass of a cell (the geometric center while empty).
    #[must_use]
    pub fn mass_center(&self, cell: u32) -> Vec3 {
        self.mass_center[cell as usize]
    }

    fn coordinates(cell: u32) -> (u16, u16, u16) {
        let count = u32::from(GRAVITY_CELL_COUNT);
        let x = cell % count;
        let y = (cell / count) % count;
        let z = cell / (count * count);
        (x as u16, y as u16, z as u16)
    }

    fn cell_index(&self, pos: Vec3) -> u32 {
        let mut coords = [0u32; 3];
        for axis in 0..3 {
            let size = self.cell_size[axis];
            if size <= 0.0 {
                continue;
            }
            let cell = (pos[axis] / size) as i64;
            coords[axis] = cell.clamp(0, i64::from(GRAVITY_CELL_COUNT) - 1) as u32;
        }
        (coords[2] * u32::from(GRAVITY_CELL_COUNT) + coords[1]) * u32::from(GRAVITY_CELL_COUNT)
            + coords[0]
    }
}
