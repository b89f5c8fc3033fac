//! # Sphere simulation driver
//!
//! [`SphereSim`] is the simulation context: it owns the sphere array, the
//! physical constants store, the collision-cell index and the gravity-cell
//! grid, and advances the system with an adaptive embedded Runge-Kutta
//! integrator.
//!
//! ## Step anatomy
//!
//! `do_step` rebuilds the spatial indices, then integrates every sphere in
//! parallel: the per-sphere loop only reads the frozen sphere array and
//! writes its outcome into a scratch buffer, which a sequential commit pass
//! publishes afterwards. The force kernel and the integrator are
//! monomorphized over the four feature flags (collisions, gravity,
//! Lennard-Jones, periodic boundaries) so each variant is a tight loop
//! without per-step branching; `do_step` dispatches once per step from the
//! current flag tuple.
//!
//! ## Error control
//!
//! Every sphere step compares the primary and embedded tableau estimates.
//! When either the position or the velocity difference exceeds the step
//! error bound, the step is split in two and both halves are retried
//! recursively, up to the configured division depth. Running past the depth
//! accepts the primary estimate and bumps a saturation counter; nothing
//! inside a step ever aborts it.

use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::cells::CollisionCells;
use crate::frame::FrameBuffer;
use crate::gravity::GravityCells;
use crate::system::{ChangeListener, SimulatedSystem};
use crate::tableau::{ButcherTableau, IntegratorMethod, MAX_STAGES};
use crate::types::{minimum_image, Scalar, Sphere, Vec3};

/// Default step length in seconds.
const DEFAULT_TIME_STEP: Scalar = 0.002;
/// Default bound on the difference of the embedded estimates.
const DEFAULT_MAX_STEP_ERROR: Scalar = 1e-6;
/// Default recursion depth for step subdivision. 2^32 sub-steps are out of
/// reach in practice while the recursion stays stack-safe.
const DEFAULT_MAX_STEP_DIVISION: u16 = 32;
/// Lennard-Jones interactions are truncated and shifted at this multiple of
/// sigma.
const LENNARD_JONES_CUTOFF: Scalar = 2.5;

/// Saturation and work counters collected while integrating one sphere.
#[derive(Clone, Copy, Debug, Default)]
struct StepCounters {
    evaluations: u32,
    sub_steps: u32,
    depth_exceeded: bool,
}

/// Outcome of one sphere's outer step, staged in the scratch buffer until
/// the commit pass.
#[derive(Clone, Copy, Debug, Default)]
struct SphereUpdate {
    sphere: Sphere,
    counters: StepCounters,
}

/// The simulation context owning all mutable engine state.
pub struct SphereSim {
    spheres: Vec<Sphere>,
    scratch: Vec<SphereUpdate>,
    time_step: Scalar,
    integrator_method: IntegratorMethod,
    tableau: ButcherTableau,
    system: SimulatedSystem,
    cells: CollisionCells,
    gravity: GravityCells,
    collision_detection: bool,
    gravity_calculation: bool,
    lennard_jones_calculation: bool,
    max_step_division: u16,
    max_step_error: Scalar,
    step_counter: u32,
    calculation_counter: u32,
    sub_step_counter: u64,
    subdivision_exceeded_count: u64,
    last_step_time: Duration,
}

impl Default for SphereSim {
    fn default() -> Self {
        Self::new()
    }
}

impl SphereSim {
    /// Creates an empty simulation with the server defaults: unit box,
    /// 2 ms step, RKF54, collision detection on, gravity and Lennard-Jones
    /// off.
    #[must_use]
    pub fn new() -> Self {
        let system = SimulatedSystem::new();
        let gravity = GravityCells::new(system.box_size(), system.periodic_boundaries());
        let integrator_method = IntegratorMethod::RungeKuttaFehlberg54;
        Self {
            spheres: Vec::new(),
            scratch: Vec::new(),
            time_step: DEFAULT_TIME_STEP,
            integrator_method,
            tableau: ButcherTableau::for_method(integrator_method),
            system,
            cells: CollisionCells::new(),
            gravity,
            collision_detection: true,
            gravity_calculation: false,
            lennard_jones_calculation: false,
            max_step_division: DEFAULT_MAX_STEP_DIVISION,
            max_step_error: DEFAULT_MAX_STEP_ERROR,
            step_counter: 0,
            calculation_counter: 0,
            sub_step_counter: 0,
            subdivision_exceeded_count: 0,
            last_step_time: Duration::ZERO,
        }
    }

    // --- sphere updating -------------------------------------------------

    /// Appends a default-constructed sphere. Returns the new count.
    pub fn add_sphere(&mut self) -> u16 {
        if self.spheres.len() < usize::from(u16::MAX) {
            self.spheres.push(Sphere::default());
        }
        self.sphere_count()
    }

    /// Appends `count` default-constructed spheres. Returns the new count.
    pub fn add_some_spheres(&mut self, count: u16) -> u16 {
        for _ in 0..count {
            self.add_sphere();
        }
        self.sphere_count()
    }

    /// Removes the last sphere; a no-op on an empty array. Returns the new
    /// count.
    pub fn remove_last_sphere(&mut self) -> u16 {
        self.spheres.pop();
        self.sphere_count()
    }

    /// Removes the last `count` spheres. Returns the new count.
    pub fn remove_some_last_spheres(&mut self, count: u16) -> u16 {
        for _ in 0..count {
            self.spheres.pop();
        }
        self.sphere_count()
    }

    /// Replaces one sphere. Out-of-range indices and records with negative
    /// mass or radius are no-ops. Returns the current count.
    pub fn update_sphere(&mut self, index: u16, sphere: Sphere) -> u16 {
        if sphere.mass < 0.0 || sphere.radius < 0.0 {
            return self.sphere_count();
        }
        if let Some(slot) = self.spheres.get_mut(usize::from(index)) {
            *slot = sphere;
        }
        self.sphere_count()
    }

    /// Replaces every sphere with the given record. Returns the count.
    pub fn update_all_spheres(&mut self, sphere: Sphere) -> u16 {
        if sphere.mass >= 0.0 && sphere.radius >= 0.0 {
            self.spheres.fill(sphere);
        }
        self.sphere_count()
    }

    /// Positional subset of a sphere: position is copied, everything else
    /// is zeroed. Out-of-range indices yield a default record.
    #[must_use]
    pub fn get_sphere(&self, index: u16) -> Sphere {
        self.spheres
            .get(usize::from(index))
            .map(|sphere| Sphere {
                pos: sphere.pos,
                ..Sphere::default()
            })
            .unwrap_or_default()
    }

    /// Full copy of a sphere. Out-of-range indices yield a default record.
    #[must_use]
    pub fn get_full_sphere(&self, index: u16) -> Sphere {
        self.spheres
            .get(usize::from(index))
            .copied()
            .unwrap_or_default()
    }

    /// Current sphere count.
    #[must_use]
    pub fn sphere_count(&self) -> u16 {
        self.spheres.len() as u16
    }

    /// Read access to the sphere array, used for frame serialization and
    /// tests.
    #[must_use]
    pub fn spheres(&self) -> &[Sphere] {
        &self.spheres
    }

    /// Distributes all spheres over a cubic lattice filling the box, with a
    /// uniform random jitter on positions and velocities.
    pub fn update_sphere_positions_in_box(
        &mut self,
        random_displacement: Scalar,
        random_speed: Scalar,
    ) {
        let count = self.spheres.len();
        if count == 0 {
            return;
        }
        let box_size = self.system.box_size();
        let per_axis = (count as Scalar).cbrt().ceil().max(1.0) as usize;
        for (index, sphere) in self.spheres.iter_mut().enumerate() {
            let lattice = [
                index % per_axis,
                (index / per_axis) % per_axis,
                index / (per_axis * per_axis),
            ];
            for axis in 0..3 {
                let spacing = box_size[axis] / per_axis as Scalar;
                sphere.pos[axis] = (lattice[axis] as Scalar + 0.5) * spacing
                    + symmetric_random(random_displacement);
                sphere.vel[axis] = symmetric_random(random_speed);
            }
        }
    }

    // --- calculation control ---------------------------------------------

    /// Sets the step length. Non-positive values are ignored.
    pub fn set_time_step(&mut self, time_step: Scalar) {
        if time_step > 0.0 {
            self.time_step = time_step;
        }
    }

    #[must_use]
    pub fn time_step(&self) -> Scalar {
        self.time_step
    }

    /// Selects the integrator from its wire code; unknown codes fall back
    /// to RKF54.
    pub fn set_integrator_method(&mut self, code: u8) {
        self.integrator_method = IntegratorMethod::from_code(code);
        self.tableau = ButcherTableau::for_method(self.integrator_method);
    }

    /// Wire code of the active integrator.
    #[must_use]
    pub fn integrator_method(&self) -> u8 {
        self.integrator_method.code()
    }

    /// Number of steps since the last pop; resets the counter.
    pub fn pop_step_counter(&mut self) -> u32 {
        std::mem::take(&mut self.step_counter)
    }

    /// Average force evaluations per sphere since the last pop; resets the
    /// counter.
    pub fn pop_calculation_counter(&mut self) -> u32 {
        if self.spheres.is_empty() {
            return 0;
        }
        let counter = self.calculation_counter / u32::from(self.sphere_count());
        self.calculation_counter = 0;
        counter
    }

    pub fn set_collision_detection(&mut self, detect_collisions: bool) {
        self.collision_detection = detect_collisions;
    }

    pub fn set_gravity_calculation(&mut self, calculate_gravity: bool) {
        self.gravity_calculation = calculate_gravity;
    }

    pub fn set_lennard_jones_calculation(&mut self, calculate_lennard_jones: bool) {
        self.lennard_jones_calculation = calculate_lennard_jones;
    }

    /// Bounds the recursive step subdivision depth.
    pub fn set_max_step_division(&mut self, max_step_division: u16) {
        self.max_step_division = max_step_division;
    }

    /// Sets the embedded-estimate error bound. Non-positive values are
    /// ignored.
    pub fn set_max_step_error(&mut self, max_step_error: Scalar) {
        if max_step_error > 0.0 {
            self.max_step_error = max_step_error;
        }
    }

    /// Wall time of the last step in milliseconds.
    #[must_use]
    pub fn last_step_calculation_time(&self) -> u32 {
        self.last_step_time.as_millis() as u32
    }

    /// How many sphere steps ran past the subdivision depth and accepted
    /// the primary estimate anyway.
    #[must_use]
    pub fn subdivision_exceeded_count(&self) -> u64 {
        self.subdivision_exceeded_count
    }

    /// Total accepted sub-steps across all spheres and outer steps.
    #[must_use]
    pub fn sub_step_count(&self) -> u64 {
        self.sub_step_counter
    }

    /// How many collision-cell inserts were dropped on full cells.
    #[must_use]
    pub fn cell_saturation_count(&self) -> u64 {
        self.cells.saturation_count()
    }

    // --- simulated system ------------------------------------------------

    /// Read access to the physical constants store.
    #[must_use]
    pub fn system(&self) -> &SimulatedSystem {
        &self.system
    }

    /// Registers the listener invoked whenever a parameter actually
    /// changes, used by the transport to push variable updates.
    pub fn set_parameter_listener(&mut self, listener: ChangeListener) {
        self.system.set_listener(listener);
    }

    pub fn update_sphere_e(&mut self, e_sphere: Scalar) {
        self.system.set_sphere_e(e_sphere);
    }

    pub fn update_sphere_poisson_ratio(&mut self, poisson_sphere: Scalar) {
        self.system.set_sphere_poisson_ratio(poisson_sphere);
    }

    pub fn update_wall_e(&mut self, e_wall: Scalar) {
        self.system.set_wall_e(e_wall);
    }

    pub fn update_wall_poisson_ratio(&mut self, poisson_wall: Scalar) {
        self.system.set_wall_poisson_ratio(poisson_wall);
    }

    pub fn update_earth_gravity(&mut self, earth_gravity: Vec3) {
        self.system.set_earth_gravity(earth_gravity);
    }

    pub fn update_gravitational_constant(&mut self, gravitational_constant: Scalar) {
        self.system
            .set_gravitational_constant(gravitational_constant);
    }

    /// Resizes the box. A change rebuilds the gravity far/near lists.
    pub fn update_box_size(&mut self, box_size: Vec3) {
        if self.system.set_box_size(box_size) {
            self.gravity
                .rebuild_pairs(self.system.box_size(), self.system.periodic_boundaries());
        }
    }

    /// Scales the total kinetic energy by `factor` (velocities scale with
    /// its square root). Non-positive factors are ignored.
    pub fn update_kinetic_energy(&mut self, factor: Scalar) {
        if factor <= 0.0 {
            return;
        }
        let scale = factor.sqrt();
        for sphere in &mut self.spheres {
            sphere.vel *= scale;
        }
    }

    pub fn update_target_temperature(&mut self, target_temperature: Scalar) {
        self.system.set_target_temperature(target_temperature);
    }

    /// Toggles periodic boundaries. A change rebuilds the gravity far/near
    /// lists, their classification depends on the minimum-image metric.
    pub fn update_periodic_boundary_conditions(&mut self, periodic: bool) {
        if self.system.set_periodic_boundaries(periodic) {
            self.gravity.rebuild_pairs(self.system.box_size(), periodic);
        }
    }

    pub fn update_lennard_jones_epsilon(&mut self, epsilon: Scalar) {
        self.system.set_lennard_jones_epsilon(epsilon);
    }

    pub fn update_lennard_jones_sigma(&mut self, sigma: Scalar) {
        self.system.set_lennard_jones_sigma(sigma);
    }

    // --- energies --------------------------------------------------------

    /// Total kinetic energy.
    #[must_use]
    pub fn kinetic_energy(&self) -> Scalar {
        self.spheres
            .iter()
            .map(|sphere| 0.5 * sphere.mass * sphere.vel.squared_norm())
            .sum()
    }

    /// Total energy: kinetic, earth-gravity potential and wall elastic
    /// terms for every sphere, plus pairwise Hertz, gravitational and
    /// Lennard-Jones potentials for the interactions that are enabled.
    #[must_use]
    pub fn total_energy(&self) -> Scalar {
        let system = &self.system;
        let box_size = system.box_size();
        let e_wall = system.sphere_wall_e();
        let mut total = 0.0;
        for sphere in &self.spheres {
            let mut energy = -sphere.mass * system.earth_gravity().dot(sphere.pos);
            energy += 0.5 * sphere.mass * sphere.vel.squared_norm();
            for axis in 0..3 {
                let overlap = sphere.radius - sphere.pos[axis];
                if overlap > 0.0 {
                    energy += wall_elastic_energy(e_wall, sphere.radius, overlap);
                }
                let overlap = sphere.radius + sphere.pos[axis] - box_size[axis];
                if overlap > 0.0 {
                    energy += wall_elastic_energy(e_wall, sphere.radius, overlap);
                }
            }
            total += energy;
        }

        if !(self.collision_detection || self.gravity_calculation || self.lennard_jones_calculation)
        {
            return total;
        }

        let periodic = system.periodic_boundaries();
        let gravitational_constant = system.gravitational_constant();
        let e_sphere = system.sphere_sphere_e();
        let epsilon = system.lennard_jones_epsilon();
        let sigma = system.lennard_jones_sigma();
        let cutoff = LENNARD_JONES_CUTOFF * sigma;
        let cutoff_shift = lennard_jones_potential(epsilon, sigma, cutoff);
        for i in 0..self.spheres.len() {
            for j in (i + 1)..self.spheres.len() {
                let a = &self.spheres[i];
                let b = &self.spheres[j];
                let mut d = b.pos - a.pos;
                if periodic {
                    d = minimum_image(d, box_size);
                }
                let distance = d.norm();
                if distance <= 0.0 {
                    continue;
                }
                if self.collision_detection {
                    let overlap = a.radius + b.radius - distance;
                    if overlap > 0.0 {
                        let reduced_radius = a.radius * b.radius / (a.radius + b.radius);
                        total +=
                            8.0 / 15.0 * e_sphere * reduced_radius.sqrt() * overlap.powf(2.5);
                    }
                }
                if self.gravity_calculation {
                    total -= gravitational_constant * a.mass * b.mass / distance;
                }
                if self.lennard_jones_calculation && distance < cutoff {
                    total += lennard_jones_potential(epsilon, sigma, distance) - cutoff_shift;
                }
            }
        }
        total
    }

    // --- stepping --------------------------------------------------------

    /// Performs one outer integration step for every sphere.
    pub fn do_step(&mut self) {
        let started = Instant::now();
        match (
            self.collision_detection,
            self.gravity_calculation,
            self.lennard_jones_calculation,
            self.system.periodic_boundaries(),
        ) {
            (false, false, false, false) => self.step_with::<false, false, false, false>(),
            (false, false, false, true) => self.step_with::<false, false, false, true>(),
            (false, false, true, false) => self.step_with::<false, false, true, false>(),
            (false, false, true, true) => self.step_with::<false, false, true, true>(),
            (false, true, false, false) => self.step_with::<false, true, false, false>(),
            (false, true, false, true) => self.step_with::<false, true, false, true>(),
            (false, true, true, false) => self.step_with::<false, true, true, false>(),
            (false, true, true, true) => self.step_with::<false, true, true, true>(),
            (true, false, false, false) => self.step_with::<true, false, false, false>(),
            (true, false, false, true) => self.step_with::<true, false, false, true>(),
            (true, false, true, false) => self.step_with::<true, false, true, false>(),
            (true, false, true, true) => self.step_with::<true, false, true, true>(),
            (true, true, false, false) => self.step_with::<true, true, false, false>(),
            (true, true, false, true) => self.step_with::<true, true, false, true>(),
            (true, true, true, false) => self.step_with::<true, true, true, false>(),
            (true, true, true, true) => self.step_with::<true, true, true, true>(),
        }
        self.step_counter += 1;
        self.last_step_time = started.elapsed();
        tracing::trace!(
            step = self.step_counter,
            elapsed_us = self.last_step_time.as_micros() as u64,
            "step complete"
        );
    }

    fn step_with<const COLLIDE: bool, const GRAVITY: bool, const LJ: bool, const PERIODIC: bool>(
        &mut self,
    ) {
        let count = self.spheres.len();
        if count == 0 {
            return;
        }
        if COLLIDE || LJ {
            let margin = if LJ {
                LENNARD_JONES_CUTOFF * self.system.lennard_jones_sigma() / 2.0
            } else {
                0.0
            };
            self.cells.update(&self.spheres, margin);
        }
        if GRAVITY {
            self.gravity.update(&self.spheres);
        }

        let time_step = self.time_step;
        let mut scratch = std::mem::take(&mut self.scratch);
        {
            let frozen: &Self = self;
            (0..count)
                .into_par_iter()
                .map(|index| {
                    let mut sphere = frozen.spheres[index];
                    let mut counters = StepCounters::default();
                    if sphere.mass > 0.0 && sphere.radius > 0.0 {
                        let sub_steps = frozen.integrate_sphere::<COLLIDE, GRAVITY, LJ, PERIODIC>(
                            index as u16,
                            &mut sphere,
                            time_step,
                            0.0,
                            0,
                            &mut counters,
                        );
                        counters.sub_steps = sub_steps;
                    }
                    SphereUpdate { sphere, counters }
                })
                .collect_into_vec(&mut scratch);
        }

        let box_size = self.system.box_size();
        for (sphere, update) in self.spheres.iter_mut().zip(&scratch) {
            *sphere = update.sphere;
            if PERIODIC {
                for axis in 0..3 {
                    sphere.pos[axis] = sphere.pos[axis].rem_euclid(box_size[axis]);
                }
            }
            self.calculation_counter = self
                .calculation_counter
                .wrapping_add(update.counters.evaluations);
            self.sub_step_counter += u64::from(update.counters.sub_steps);
            if update.counters.depth_exceeded {
                self.subdivision_exceeded_count += 1;
            }
        }
        self.scratch = scratch;
    }

    /// Advances one sphere by `step`, comparing the primary and embedded
    /// estimates and recursively halving on error. Returns the number of
    /// accepted sub-steps.
    fn integrate_sphere<
        const COLLIDE: bool,
        const GRAVITY: bool,
        const LJ: bool,
        const PERIODIC: bool,
    >(
        &self,
        index: u16,
        sphere: &mut Sphere,
        step: Scalar,
        time_diff: Scalar,
        depth: u16,
        counters: &mut StepCounters,
    ) -> u32 {
        let original = *sphere;
        let order = self.tableau.order;
        let mut k_acc = [Vec3::ZERO; MAX_STAGES];
        let mut k_vel = [Vec3::ZERO; MAX_STAGES];
        k_acc[0] = self.acceleration::<COLLIDE, GRAVITY, LJ, PERIODIC>(
            index, &original, time_diff, counters,
        );
        k_vel[0] = original.vel;

        let mut probe = original;
        for n in 1..order {
            probe.pos = original.pos;
            for j in 0..n {
                probe.pos += k_vel[j] * (step * self.tableau.a[n][j]);
            }
            k_acc[n] = self
                .acceleration::<COLLIDE, GRAVITY, LJ, PERIODIC>(index, &probe, time_diff, counters);
            k_vel[n] = original.vel;
            for j in 0..n {
                k_vel[n] += k_acc[j] * (step * self.tableau.a[n][j]);
            }
        }

        let mut pos = original.pos;
        let mut pos_embedded = original.pos;
        let mut vel = original.vel;
        let mut vel_embedded = original.vel;
        for j in 0..order {
            pos += k_vel[j] * (step * self.tableau.b[j]);
            pos_embedded += k_vel[j] * (step * self.tableau.b_hat[j]);
            vel += k_acc[j] * (step * self.tableau.b[j]);
            vel_embedded += k_acc[j] * (step * self.tableau.b_hat[j]);
        }

        let position_error = (pos - pos_embedded).norm();
        let velocity_error = (vel - vel_embedded).norm();
        let accepted =
            position_error <= self.max_step_error && velocity_error <= self.max_step_error;
        if !accepted && depth < self.max_step_division {
            let half = step / 2.0;
            let mut sub_steps = self.integrate_sphere::<COLLIDE, GRAVITY, LJ, PERIODIC>(
                index,
                sphere,
                half,
                time_diff,
                depth + 1,
                counters,
            );
            sub_steps += self.integrate_sphere::<COLLIDE, GRAVITY, LJ, PERIODIC>(
                index,
                sphere,
                half,
                time_diff + half,
                depth + 1,
                counters,
            );
            return sub_steps;
        }
        if !accepted {
            counters.depth_exceeded = true;
        }
        sphere.pos = pos;
        sphere.vel = vel;
        sphere.acc = (vel - original.vel) / step;
        1
    }

    /// Sums the forces on one sphere and returns its acceleration.
    ///
    /// `time_diff` extrapolates the positions of the other spheres when a
    /// recursion level probes the middle of the outer step.
    fn acceleration<
        const COLLIDE: bool,
        const GRAVITY: bool,
        const LJ: bool,
        const PERIODIC: bool,
    >(
        &self,
        index: u16,
        sphere: &Sphere,
        time_diff: Scalar,
        counters: &mut StepCounters,
    ) -> Vec3 {
        let system = &self.system;
        let box_size = system.box_size();
        let mut force = system.earth_gravity() * sphere.mass;

        let e_wall = system.sphere_wall_e();
        for axis in 0..3 {
            let overlap = sphere.radius - sphere.pos[axis];
            if overlap > 0.0 {
                force[axis] += hertz_force(e_wall, sphere.radius, overlap);
            }
            let overlap = sphere.radius + sphere.pos[axis] - box_size[axis];
            if overlap > 0.0 {
                force[axis] -= hertz_force(e_wall, sphere.radius, overlap);
            }
        }

        if COLLIDE || LJ {
            let e_sphere = system.sphere_sphere_e();
            let epsilon = system.lennard_jones_epsilon();
            let sigma = system.lennard_jones_sigma();
            let cutoff = LENNARD_JONES_CUTOFF * sigma;
            // Shared cells list a partner more than once; first occurrence
            // wins.
            let mut seen: Vec<u16> = Vec::with_capacity(32);
            for &cell in self.cells.cells_of(index) {
                for &other_index in self.cells.spheres_in(cell) {
                    if other_index == index || seen.contains(&other_index) {
                        continue;
                    }
                    seen.push(other_index);
                    let other = &self.spheres[usize::from(other_index)];
                    let mut d = other.pos + other.vel * time_diff - sphere.pos;
                    if PERIODIC {
                        d = minimum_image(d, box_size);
                    }
                    let distance = d.norm();
                    if distance <= 0.0 {
                        continue;
                    }
                    if COLLIDE {
                        let overlap = sphere.radius + other.radius - distance;
                        if overlap > 0.0 {
                            let reduced_radius =
                                sphere.radius * other.radius / (sphere.radius + other.radius);
                            force -=
                                d * (hertz_force(e_sphere, reduced_radius, overlap) / distance);
                        }
                    }
                    if LJ && distance < cutoff {
                        let sr6 = (sigma / distance).powi(6);
                        let magnitude = 24.0 * epsilon * (2.0 * sr6 * sr6 - sr6) / distance;
                        force -= d * (magnitude / distance);
                    }
                }
            }
        }

        if GRAVITY {
            let gravitational_constant = system.gravitational_constant();
            let cell = self.gravity.cell_of(index);
            for &other_cell in self.gravity.pairwise_cells(cell) {
                for &other_index in self.gravity.spheres_in(other_cell) {
                    if other_index == index {
                        continue;
                    }
                    let other = &self.spheres[usize::from(other_index)];
                    let mut d = other.pos + other.vel * time_diff - sphere.pos;
                    if PERIODIC {
                        d = minimum_image(d, box_size);
                    }
                    let distance = d.norm();
                    if distance > 0.0 {
                        force += d
                            * (gravitational_constant * other.mass * sphere.mass
                                / (distance * distance * distance));
                    }
                }
            }
            let (far_cells, offsets) = self.gravity.approximating_cells(cell);
            for (&other_cell, &offset) in far_cells.iter().zip(offsets) {
                let mass = self.gravity.mass(other_cell);
                if mass <= 0.0 {
                    continue;
                }
                let d = self.gravity.mass_center(other_cell) + offset - sphere.pos;
                let distance = d.norm();
                if distance > 0.0 {
                    force += d
                        * (gravitational_constant * mass * sphere.mass
                            / (distance * distance * distance));
                }
            }
        }

        counters.evaluations += 1;
        force / sphere.mass
    }

    // --- frames ----------------------------------------------------------

    /// Serializes the current sphere positions into the outbound ring as
    /// `(index, px, py, pz)` words per sphere.
    pub fn write_frame(&self, ring: &mut FrameBuffer<Scalar>) {
        let width = (self.spheres.len() * 4).min(usize::from(u16::MAX)) as u16;
        ring.set_elements_per_frame(width);
        for (index, sphere) in self.spheres.iter().enumerate() {
            ring.push_element(index as Scalar);
            ring.push_element(sphere.pos.x);
            ring.push_element(sphere.pos.y);
            ring.push_element(sphere.pos.z);
        }
        ring.push_frame();
    }
}

fn hertz_force(e_star: Scalar, reduced_radius: Scalar, overlap: Scalar) -> Scalar {
    4.0 / 3.0 * e_star * (reduced_radius * overlap * overlap * overlap).sqrt()
}

fn wall_elastic_energy(e_star: Scalar, radius: Scalar, overlap: Scalar) -> Scalar {
    8.0 / 15.0 * e_star * radius.sqrt() * overlap.powf(2.5)
}

fn lennard_jones_potential(epsilon: Scalar, sigma: Scalar, distance: Scalar) -> Scalar {
    let sr6 = (sigma / distance).powi(6);
    4.0 * epsilon * (sr6 * sr6 - sr6)
}

#[cfg(not(feature = "f32"))]
fn symmetric_random(range: Scalar) -> Scalar {
    (fastrand::f64() * 2.0 - 1.0) * range
}

#[cfg(feature = "f32")]
fn symmetric_random(range: Scalar) -> Scalar {
    (fastrand::f32() * 2.0 - 1.0) * range
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_context_matches_the_server_defaults() {
        let sim = SphereSim::new();
        assert_eq!(sim.sphere_count(), 0);
        assert!((sim.time_step() - 0.002).abs() < 1e-12);
        assert_eq!(
            sim.integrator_method(),
            IntegratorMethod::RungeKuttaFehlberg54.code()
        );
    }

    #[test]
    fn invalid_updates_are_no_ops() {
        let mut sim = SphereSim::new();
        sim.add_sphere();
        sim.set_time_step(0.0);
        assert!((sim.time_step() - 0.002).abs() < 1e-12);
        sim.set_max_step_error(-1.0);

        let bad = Sphere {
            radius: -1.0,
            ..Sphere::default()
        };
        assert_eq!(sim.update_sphere(0, bad), 1);
        assert_eq!(sim.get_full_sphere(0), Sphere::default());
        // Out of range: state untouched, count returned.
        assert_eq!(sim.update_sphere(9, Sphere::new(Vec3::ZERO, 1.0, 1.0)), 1);
    }

    #[test]
    fn kinetic_energy_scales_linearly_with_the_factor() {
        let mut sim = SphereSim::new();
        sim.add_sphere();
        let mut sphere = Sphere::new(Vec3::new(0.5, 0.5, 0.5), 2.0, 0.1);
        sphere.vel = Vec3::new(1.0, 0.0, 0.0);
        sim.update_sphere(0, sphere);

        let before = sim.kinetic_energy();
        sim.update_kinetic_energy(4.0);
        assert!((sim.kinetic_energy() - 4.0 * before).abs() < 1e-9);
    }

    #[test]
    fn lattice_placement_stays_inside_the_box() {
        let mut sim = SphereSim::new();
        sim.add_some_spheres(27);
        sim.update_sphere_positions_in_box(0.0, 0.5);
        let box_size = sim.system().box_size();
        for sphere in sim.spheres() {
            for axis in 0..3 {
                assert!(sphere.pos[axis] > 0.0 && sphere.pos[axis] < box_size[axis]);
            }
        }
    }
}
