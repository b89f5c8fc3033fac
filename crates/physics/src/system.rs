//! Storage for physical constants and other parameters of the simulated
//! system.
//!
//! Writes are idempotent: storing a value equal to the current one is a
//! no-op, storing a new value bumps the update counter, refreshes any
//! derived quantity and invokes the registered change listener. The store is
//! only ever reached under the engine lock, so reads are plain field reads.

use crate::types::{Scalar, Vec3};

/// Identifies a parameter of the simulated system in change notifications.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Variable {
    SphereE,
    SpherePoissonRatio,
    WallE,
    WallPoissonRatio,
    EarthGravity,
    GravitationalConstant,
    BoxSize,
    TargetTemperature,
    PeriodicBoundaries,
    LennardJonesEpsilon,
    LennardJonesSigma,
}

/// Listener invoked after a parameter actually changed.
pub type ChangeListener = Box<dyn Fn(Variable) + Send + Sync>;

/// Physical constants, wall properties and further parameters of the
/// simulated system, with derived contact moduli kept in sync.
pub struct SimulatedSystem {
    e_sphere: Scalar,
    poisson_sphere: Scalar,
    e_wall: Scalar,
    poisson_wall: Scalar,
    e_sphere_sphere: Scalar,
    e_sphere_wall: Scalar,
    earth_gravity: Vec3,
    gravitational_constant: Scalar,
    box_size: Vec3,
    target_temperature: Scalar,
    periodic_boundaries: bool,
    lennard_jones_epsilon: Scalar,
    lennard_jones_sigma: Scalar,
    update_count: u64,
    listener: Option<ChangeListener>,
}

impl Default for SimulatedSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSystem {
    /// Creates the store with the server defaults: steel-soft moduli of
    /// 5000, Poisson ratio 0.5, earth gravity along negative Y and a unit
    /// box.
    #[must_use]
    pub fn new() -> Self {
        let mut system = Self {
            e_sphere: 5000.0,
            poisson_sphere: 0.5,
            e_wall: 5000.0,
            poisson_wall: 0.5,
            e_sphere_sphere: 0.0,
            e_sphere_wall: 0.0,
            earth_gravity: Vec3::new(0.0, -9.81, 0.0),
            gravitational_constant: 0.0,
            box_size: Vec3::new(1.0, 1.0, 1.0),
            target_temperature: 0.0,
            periodic_boundaries: false,
            lennard_jones_epsilon: 1.0,
            lennard_jones_sigma: 1.0,
            update_count: 0,
            listener: None,
        };
        system.update_sphere_sphere_e();
        system.update_sphere_wall_e();
        system
    }

    /// Registers the listener invoked on every effective change.
    pub fn set_listener(&mut self, listener: ChangeListener) {
        self.listener = Some(listener);
    }

    /// Number of effective (non-idempotent) writes so far.
    #[must_use]
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    fn notify(&mut self, variable: Variable) {
        self.update_count += 1;
        if let Some(listener) = &self.listener {
            listener(variable);
        }
    }

    fn update_sphere_sphere_e(&mut self) {
        self.e_sphere_sphere = 1.0
            / ((1.0 - self.poisson_sphere * self.poisson_sphere) / self.e_sphere
                + (1.0 - self.poisson_sphere * self.poisson_sphere) / self.e_sphere);
    }

    fn update_sphere_wall_e(&mut self) {
        self.e_sphere_wall = 1.0
            / ((1.0 - self.poisson_sphere * self.poisson_sphere) / self.e_sphere
                + (1.0 - self.poisson_wall * self.poisson_wall) / self.e_wall);
    }

    /// Sets the sphere E modulus. Returns whether the value changed.
    pub fn set_sphere_e(&mut self, e_sphere: Scalar) -> bool {
        if self.e_sphere == e_sphere {
            return false;
        }
        self.e_sphere = e_sphere;
        self.update_sphere_sphere_e();
        self.update_sphere_wall_e();
        self.notify(Variable::SphereE);
        true
    }

    /// Sets the sphere Poisson ratio. Returns whether the value changed.
    pub fn set_sphere_poisson_ratio(&mut self, poisson_sphere: Scalar) -> bool {
        if self.poisson_sphere == poisson_sphere {
            return false;
        }
        self.poisson_sphere = poisson_sphere;
        self.update_sphere_sphere_e();
        self.update_sphere_wall_e();
        self.notify(Variable::SpherePoissonRatio);
        true
    }

    /// Sets the wall E modulus. Returns whether the value changed.
    pub fn set_wall_e(&mut self, e_wall: Scalar) -> bool {
        if self.e_wall == e_wall {
            return false;
        }
        self.e_wall = e_wall;
        self.update_sphere_wall_e();
        self.notify(Variable::WallE);
        true
    }

    /// Sets the wall Poisson ratio. Returns whether the value changed.
    pub fn set_wall_poisson_ratio(&mut self, poisson_wall: Scalar) -> bool {
        if self.poisson_wall == poisson_wall {
            return false;
        }
        self.poisson_wall = poisson_wall;
        self.update_sphere_wall_e();
        self.notify(Variable::WallPoissonRatio);
        true
    }

    /// Sets the earth gravity vector. Returns whether the value changed.
    pub fn set_earth_gravity(&mut self, earth_gravity: Vec3) -> bool {
        if self.earth_gravity == earth_gravity {
            return false;
        }
        self.earth_gravity = earth_gravity;
        self.notify(Variable::EarthGravity);
        true
    }

    /// Sets the gravitational constant, used verbatim: demo scenarios run
    /// with non-SI values and the engine must not rescale them.
    pub fn set_gravitational_constant(&mut self, g: Scalar) -> bool {
        if self.gravitational_constant == g {
            return false;
        }
        self.gravitational_constant = g;
        self.notify(Variable::GravitationalConstant);
        true
    }

    /// Sets the box size. Edges must be positive, invalid updates are
    /// ignored. Returns whether the value changed.
    pub fn set_box_size(&mut self, box_size: Vec3) -> bool {
        if box_size.x <= 0.0 || box_size.y <= 0.0 || box_size.z <= 0.0 {
            return false;
        }
        if self.box_size == box_size {
            return false;
        }
        self.box_size = box_size;
        self.notify(Variable::BoxSize);
        true
    }

    /// Sets the target temperature. Returns whether the value changed.
    pub fn set_target_temperature(&mut self, target_temperature: Scalar) -> bool {
        if self.target_temperature == target_temperature {
            return false;
        }
        self.target_temperature = target_temperature;
        self.notify(Variable::TargetTemperature);
        true
    }

    /// Toggles periodic boundary conditions. Returns whether the value
    /// changed.
    pub fn set_periodic_boundaries(&mut self, periodic: bool) -> bool {
        if self.periodic_boundaries == periodic {
            return false;
        }
        self.periodic_boundaries = periodic;
        self.notify(Variable::PeriodicBoundaries);
        true
    }

    /// Sets the Lennard-Jones well depth. Returns whether the value changed.
    pub fn set_lennard_jones_epsilon(&mut self, epsilon: Scalar) -> bool {
        if self.lennard_jones_epsilon == epsilon {
            return false;
        }
        self.lennard_jones_epsilon = epsilon;
        self.notify(Variable::LennardJonesEpsilon);
        true
    }

    /// Sets the Lennard-Jones zero-crossing distance. Returns whether the
    /// value changed.
    pub fn set_lennard_jones_sigma(&mut self, sigma: Scalar) -> bool {
        if self.lennard_jones_sigma == sigma {
            return false;
        }
        self.lennard_jones_sigma = sigma;
        self.notify(Variable::LennardJonesSigma);
        true
    }

    #[must_use]
    pub fn sphere_e(&self) -> Scalar {
        self.e_sphere
    }

    #[must_use]
    pub fn sphere_poisson_ratio(&self) -> Scalar {
        self.poisson_sphere
    }

    #[must_use]
    pub fn wall_e(&self) -> Scalar {
        self.e_wall
    }

    #[must_use]
    pub fn wall_poisson_ratio(&self) -> Scalar {
        self.poisson_wall
    }

    /// Derived E* modulus for sphere-sphere contacts.
    #[must_use]
    pub fn sphere_sphere_e(&self) -> Scalar {
        self.e_sphere_sphere
    }

    /// Derived E* modulus for sphere-wall contacts.
    #[must_use]
    pub fn sphere_wall_e(&self) -> Scalar {
        self.e_sphere_wall
    }

    #[must_use]
    pub fn earth_gravity(&self) -> Vec3 {
        self.earth_gravity
    }

    #[must_use]
    pub fn gravitational_constant(&self) -> Scalar {
        self.gravitational_constant
    }

    #[must_use]
    pub fn box_size(&self) -> Vec3 {
        self.box_size
    }

    #[must_use]
    pub fn target_temperature(&self) -> Scalar {
        self.target_temperature
    }

    #[must_use]
    pub fn periodic_boundaries(&self) -> bool {
        self.periodic_boundaries
    }

    #[must_use]
    pub fn lennard_jones_epsilon(&self) -> Scalar {
        self.lennard_jones_epsilon
    }

    #[must_use]
    pub fn lennard_jones_sigma(&self) -> Scalar {
        self.lennard_jones_sigma
    }
}
