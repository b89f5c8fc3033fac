//! Force-free motion and force direction checks.

use physics::{Scalar, Sphere, SphereSim, Vec3};

/// With no forces and periodic boundaries, a single sphere moves linearly
/// and its kinetic energy stays constant.
#[test]
fn free_sphere_moves_linearly_under_periodic_wrap() {
    let mut sim = SphereSim::new();
    sim.update_earth_gravity(Vec3::ZERO);
    sim.update_wall_e(0.0);
    sim.update_periodic_boundary_conditions(true);
    sim.set_collision_detection(false);
    sim.set_time_step(0.01);

    sim.add_sphere();
    let mut sphere = Sphere::new(Vec3::new(0.5, 0.5, 0.5), 1.0, 0.01);
    sphere.vel = Vec3::new(0.3, 0.2, 0.1);
    sim.update_sphere(0, sphere);
    let initial_kinetic = sim.kinetic_energy();

    let steps = 1000u16;
    for _ in 0..steps {
        sim.do_step();
    }

    // 10 s at (0.3, 0.2, 0.1) is a whole number of box lengths per axis.
    let final_sphere = sim.get_full_sphere(0);
    let miss = (final_sphere.pos - Vec3::new(0.5, 0.5, 0.5)).norm();
    assert!(miss < 1e-9, "drift {miss}");
    assert!(
        (sim.kinetic_energy() - initial_kinetic).abs() < 1e-12 * Scalar::from(steps),
        "kinetic energy drifted"
    );
}

/// A sphere overlapping the floor is pushed back up.
#[test]
fn wall_contact_pushes_away_from_the_wall() {
    let mut sim = SphereSim::new();
    sim.update_earth_gravity(Vec3::ZERO);
    sim.set_time_step(1e-5);

    sim.add_sphere();
    sim.update_sphere(0, Sphere::new(Vec3::new(0.5, 0.08, 0.5), 1.0, 0.1));
    sim.do_step();

    let sphere = sim.get_full_sphere(0);
    assert!(sphere.acc.y > 0.0);
    assert!(sphere.vel.y > 0.0);
}

/// Two spheres inside the Lennard-Jones cutoff but beyond the potential
/// minimum attract each other.
#[test]
fn lennard_jones_attracts_beyond_the_minimum() {
    let mut sim = SphereSim::new();
    sim.update_earth_gravity(Vec3::ZERO);
    sim.update_wall_e(0.0);
    sim.set_collision_detection(false);
    sim.set_lennard_jones_calculation(true);
    sim.update_lennard_jones_epsilon(1.0);
    sim.update_lennard_jones_sigma(0.1);
    sim.set_time_step(1e-6);

    sim.add_some_spheres(2);
    sim.update_sphere(0, Sphere::new(Vec3::new(0.4, 0.5, 0.5), 1.0, 0.01));
    sim.update_sphere(1, Sphere::new(Vec3::new(0.6, 0.5, 0.5), 1.0, 0.01));
    sim.do_step();

    // Separation 2 sigma: attractive branch, inside the 2.5 sigma cutoff.
    assert!(sim.get_full_sphere(0).acc.x > 0.0);
    assert!(sim.get_full_sphere(1).acc.x < 0.0);
}

/// The total-energy report sums the kinetic and the earth-gravity terms.
#[test]
fn total_energy_matches_a_hand_computed_case() {
    let mut sim = SphereSim::new();
    sim.add_sphere();
    let mut sphere = Sphere::new(Vec3::new(0.5, 0.3, 0.5), 2.0, 0.05);
    sphere.vel = Vec3::new(0.1, 0.0, 0.0);
    sim.update_sphere(0, sphere);

    // -m g.r + 1/2 m v^2 with g = (0, -9.81, 0).
    let expected = 2.0 * 9.81 * 0.3 + 0.5 * 2.0 * 0.01;
    assert!((sim.total_energy() - expected).abs() < 1e-9);
    assert!((sim.kinetic_energy() - 0.01).abs() < 1e-12);
}
