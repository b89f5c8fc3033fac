//! Collision-cell index properties: the reciprocal-list invariant and the
//! saturation behavior of overfull cells.

use physics::cells::{CollisionCells, CELL_COUNT, MAX_SPHERES_PER_CELL};
use physics::{Scalar, Sphere, SphereSim, Vec3};

/// After an update, a sphere is listed in a cell iff its bounding box
/// intersects the cell's sub-region, and the cell lists it back.
#[test]
fn listed_cells_intersect_the_sphere_bounding_box() {
    let mut cells = CollisionCells::new();
    // A deterministic scatter with mixed radii.
    let spheres: Vec<Sphere> = (0u16..40)
        .map(|i| {
            let f = Scalar::from(i);
            Sphere::new(
                Vec3::new(
                    (f * 0.37).sin().abs(),
                    (f * 0.71).cos().abs(),
                    (f * 0.13).sin().abs(),
                ),
                1.0,
                0.02 + 0.002 * f,
            )
        })
        .collect();
    cells.update(&spheres, 0.0);

    let (origin, size) = cells.bounds();
    let count = Scalar::from(CELL_COUNT);
    for (index, sphere) in spheres.iter().enumerate() {
        let listed = cells.cells_of(index as u16);
        assert!(!listed.is_empty());
        for &cell in listed {
            let x = cell % u32::from(CELL_COUNT);
            let y = (cell / u32::from(CELL_COUNT)) % u32::from(CELL_COUNT);
            let z = cell / (u32::from(CELL_COUNT) * u32::from(CELL_COUNT));
            for (axis, coord) in [x, y, z].into_iter().enumerate() {
                let cell_min = origin[axis] + size[axis] * Scalar::from(coord as u16) / count;
                let cell_max = origin[axis] + size[axis] * Scalar::from(coord as u16 + 1) / count;
                assert!(
                    sphere.pos[axis] + sphere.radius >= cell_min
                        && sphere.pos[axis] - sphere.radius <= cell_max,
                    "sphere {index} listed in non-overlapping cell {cell}"
                );
            }
            assert!(
                cells.spheres_in(cell).contains(&(index as u16)),
                "cell {cell} does not list sphere {index} back"
            );
        }
    }
}

/// 300 coincident spheres overfill a cell: the step completes, the cell
/// list stays bounded and the saturation counter increments.
#[test]
fn overfull_cells_saturate_without_aborting_the_step() {
    let mut sim = SphereSim::new();
    sim.add_some_spheres(300);
    sim.update_all_spheres(Sphere::new(Vec3::new(0.5, 0.5, 0.5), 1.0, 0.05));
    sim.set_time_step(1e-4);

    sim.do_step();

    assert!(sim.cell_saturation_count() > 0);
    assert_eq!(sim.sphere_count(), 300);

    let mut cells = CollisionCells::new();
    let spheres = vec![Sphere::new(Vec3::new(0.5, 0.5, 0.5), 1.0, 0.05); 300];
    cells.update(&spheres, 0.0);
    for cell in 0..u32::from(CELL_COUNT).pow(3) {
        assert!(cells.spheres_in(cell).len() <= usize::from(MAX_SPHERES_PER_CELL));
    }
}
