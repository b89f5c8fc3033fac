//! Bouncing-sphere scenario: a single sphere dropped just above the floor
//! of the unit box, run under every embedded pair. The sphere must keep
//! bouncing at the expected rate and the energy sampled at free-flight
//! points must stay within the per-method error bound.

use physics::{IntegratorMethod, Scalar, Sphere, SphereSim, Vec3};

const TIME_STEP: Scalar = 0.01;
const SAMPLES: usize = 200;
const STEPS_PER_SAMPLE: u32 = 9;
const GRAVITY: Scalar = 9.81;

fn bouncing_sim(method: IntegratorMethod) -> SphereSim {
    let mut sim = SphereSim::new();
    sim.set_integrator_method(method.code());
    sim.set_time_step(TIME_STEP);
    sim.add_sphere();
    sim.update_sphere(
        0,
        Sphere::new(Vec3::new(0.11, 0.11, 0.11), 1.0, 0.1),
    );
    sim
}

fn energy_at(sphere: &Sphere) -> Scalar {
    0.5 * sphere.mass * sphere.vel.y * sphere.vel.y + sphere.mass * GRAVITY * sphere.pos.y
}

fn run_bouncing(method: IntegratorMethod, energy_tolerance: Scalar) {
    let mut sim = bouncing_sim(method);

    let initial = sim.get_full_sphere(0);
    let begin_energy = energy_at(&initial);
    let mut last_free_sphere = initial;

    let mut turning_points = 0u32;
    let mut pos = initial.pos.y;
    let mut gradient: Scalar = 0.0;
    for _ in 0..SAMPLES {
        for _ in 0..STEPS_PER_SAMPLE {
            sim.do_step();
        }
        let sphere = sim.get_full_sphere(0);
        let old_pos = pos;
        pos = sphere.pos.y;
        let old_gradient = gradient;
        gradient = pos - old_pos;
        if gradient * old_gradient < 0.0 || old_gradient == 0.0 {
            turning_points += 1;
        }
        if (sphere.acc.y + GRAVITY).abs() < 1e-6 {
            last_free_sphere = sphere;
        }
    }

    assert!(
        (90..=110).contains(&turning_points),
        "{method:?}: {turning_points} turning points"
    );

    let end_energy = energy_at(&last_free_sphere);
    let relative_error = (1.0 - begin_energy / end_energy).abs();
    assert!(
        relative_error < energy_tolerance,
        "{method:?}: relative energy error {relative_error}"
    );
}

#[test]
fn heun_euler_keeps_bouncing() {
    run_bouncing(IntegratorMethod::HeunEuler21, 1e-2);
}

#[test]
fn bogacki_shampine_keeps_bouncing() {
    run_bouncing(IntegratorMethod::BogackiShampine32, 1e-2);
}

#[test]
fn runge_kutta_fehlberg_keeps_bouncing() {
    run_bouncing(IntegratorMethod::RungeKuttaFehlberg54, 1e-2);
}

#[test]
fn cash_karp_keeps_bouncing() {
    run_bouncing(IntegratorMethod::CashKarp54, 1e-2);
}

#[test]
fn dormand_prince_keeps_bouncing() {
    run_bouncing(IntegratorMethod::DormandPrince54, 1e-3);
}
