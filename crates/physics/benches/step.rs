use criterion::{criterion_group, criterion_main, Criterion};
use physics::{Sphere, SphereSim, Vec3};

fn packed_sim(count: u16) -> SphereSim {
    let mut sim = SphereSim::new();
    sim.add_some_spheres(count);
    sim.update_all_spheres(Sphere::new(Vec3::new(0.5, 0.5, 0.5), 1.0, 0.02));
    sim.update_sphere_positions_in_box(0.01, 0.1);
    sim.set_time_step(1e-4);
    sim
}

fn bench_collision_step(c: &mut Criterion) {
    let mut sim = packed_sim(100);
    c.bench_function("step_100_spheres_collisions", |b| b.iter(|| sim.do_step()));
}

fn bench_gravity_step(c: &mut Criterion) {
    let mut sim = packed_sim(100);
    sim.set_collision_detection(false);
    sim.set_gravity_calculation(true);
    sim.update_gravitational_constant(1.3e-3);
    c.bench_function("step_100_spheres_gravity", |b| b.iter(|| sim.do_step()));
}

criterion_group!(benches, bench_collision_step, bench_gravity_step);
criterion_main!(benches);
