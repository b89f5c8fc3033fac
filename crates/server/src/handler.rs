//! Request dispatch onto a simulation context.
//!
//! One handler exists per connection and owns exactly one context: the
//! shared engine, its work queue and the outbound frame ring. Unknown
//! groups or actions are acknowledged with an empty reply and change no
//! state; malformed payloads behave like argument errors, the action
//! becomes a no-op and the reply reflects the unchanged state.

use std::sync::Arc;

use parking_lot::Mutex;
use physics::{
    FrameBuffer, Scalar, SharedFrameRing, SharedSim, SphereSim, WorkQueue, FLOATING_TYPE_NAME,
};

use crate::protocol::{
    basic, calculation, group, information, simulated_system, spheres_updating, PayloadReader,
    PayloadWriter,
};

/// The single simulation context a connection drives.
pub struct SimulationContext {
    pub sim: SharedSim,
    pub queue: Arc<WorkQueue>,
    pub ring: SharedFrameRing,
}

impl Default for SimulationContext {
    fn default() -> Self {
        Self::new(physics::frame::DEFAULT_FRAME_CAPACITY)
    }
}

impl SimulationContext {
    #[must_use]
    pub fn new(frame_capacity: u16) -> Self {
        Self {
            sim: Arc::new(Mutex::new(SphereSim::new())),
            queue: Arc::new(WorkQueue::new()),
            ring: Arc::new(Mutex::new(FrameBuffer::new(frame_capacity))),
        }
    }
}

/// What the connection loop should do with a handled message.
pub enum Outcome {
    /// Send this reply payload (possibly empty).
    Reply(Vec<u8>),
    /// Send an empty reply, then shut the server down.
    Terminate,
}

/// Replies to decoded client requests.
pub struct ActionHandler {
    sim: SharedSim,
    queue: Arc<WorkQueue>,
}

impl ActionHandler {
    #[must_use]
    pub fn new(context: &SimulationContext) -> Self {
        Self {
            sim: Arc::clone(&context.sim),
            queue: Arc::clone(&context.queue),
        }
    }

    /// Handles one decoded message (`group`, `action`, payload).
    pub fn handle(&self, message: &[u8]) -> Outcome {
        let Some((&group_code, rest)) = message.split_first() else {
            return Outcome::Reply(Vec::new());
        };
        let Some((&action, payload)) = rest.split_first() else {
            return Outcome::Reply(Vec::new());
        };
        match group_code {
            group::BASIC => self.handle_basic(action),
            group::SPHERES_UPDATING => Outcome::Reply(self.handle_spheres_updating(action, payload)),
            group::CALCULATION => Outcome::Reply(self.handle_calculation(action, payload)),
            group::INFORMATION => Outcome::Reply(self.handle_information(action)),
            group::SIMULATED_SYSTEM => Outcome::Reply(self.handle_simulated_system(action, payload)),
            _ => {
                tracing::debug!(group = group_code, action, "unknown action group");
                Outcome::Reply(Vec::new())
            }
        }
    }

    fn handle_basic(&self, action: u8) -> Outcome {
        match action {
            basic::GET_VERSION => {
                Outcome::Reply(env!("CARGO_PKG_VERSION").as_bytes().to_vec())
            }
            basic::GET_TRUE_STRING => Outcome::Reply(b"true".to_vec()),
            basic::GET_FLOATING_TYPE => Outcome::Reply(FLOATING_TYPE_NAME.as_bytes().to_vec()),
            basic::TERMINATE_SERVER => Outcome::Terminate,
            _ => Outcome::Reply(Vec::new()),
        }
    }

    fn handle_spheres_updating(&self, action: u8, payload: &[u8]) -> Vec<u8> {
        let mut sim = self.sim.lock();
        let mut reader = PayloadReader::new(payload);
        let mut reply = PayloadWriter::new();
        match action {
            spheres_updating::ADD_ONE => {
                reply.write_u16(sim.add_sphere());
            }
            spheres_updating::REMOVE_LAST => {
                reply.write_u16(sim.remove_last_sphere());
            }
            spheres_updating::UPDATE_ONE => {
                let count = match (reader.read_u16(), reader.read_full_sphere()) {
                    (Ok(index), Ok(sphere)) => sim.update_sphere(index, sphere),
                    _ => sim.sphere_count(),
                };
                reply.write_u16(count);
            }
            spheres_updating::GET_ONE => {
                let sphere = reader
                    .read_u16()
                    .map(|index| sim.get_sphere(index))
                    .unwrap_or_default();
                reply.write_vec3(sphere.pos);
            }
            spheres_updating::GET_ONE_FULL => {
                let sphere = reader
                    .read_u16()
                    .map(|index| sim.get_full_sphere(index))
                    .unwrap_or_default();
                reply.write_full_sphere(&sphere);
            }
            spheres_updating::GET_COUNT => {
                reply.write_u16(sim.sphere_count());
            }
            spheres_updating::ADD_SOME => {
                let count = match reader.read_u16() {
                    Ok(n) => sim.add_some_spheres(n),
                    Err(_) => sim.sphere_count(),
                };
                reply.write_u16(count);
            }
            spheres_updating::REMOVE_SOME => {
                let count = match reader.read_u16() {
                    Ok(n) => sim.remove_some_last_spheres(n),
                    Err(_) => sim.sphere_count(),
                };
                reply.write_u16(count);
            }
            spheres_updating::UPDATE_ALL => {
                let count = match reader.read_full_sphere() {
                    Ok(sphere) => sim.update_all_spheres(sphere),
                    Err(_) => sim.sphere_count(),
                };
                reply.write_u16(count);
            }
            spheres_updating::UPDATE_POSITIONS_IN_BOX => {
                if let (Ok(displacement), Ok(speed)) =
                    (reader.read_scalar(), reader.read_scalar())
                {
                    sim.update_sphere_positions_in_box(displacement, speed);
                }
                reply.write_u16(sim.sphere_count());
            }
            _ => {}
        }
        reply.into_bytes()
    }

    fn handle_calculation(&self, action: u8, payload: &[u8]) -> Vec<u8> {
        let mut reader = PayloadReader::new(payload);
        let mut reply = PayloadWriter::new();
        match action {
            calculation::DO_ONE_STEP => {
                self.queue.push_steps(1);
                reply.write_u32(self.sim.lock().last_step_calculation_time());
            }
            calculation::DO_SOME_STEPS => {
                if let Ok(steps) = reader.read_u32() {
                    self.queue.push_steps(steps);
                }
                reply.write_u32(self.sim.lock().last_step_calculation_time());
            }
            calculation::START_SIMULATION => {
                self.queue.push_steps(0);
            }
            calculation::STOP_SIMULATION => {
                self.queue.stop_simulation();
            }
            calculation::GET_IS_SIMULATING => {
                reply.write_bool(self.queue.is_simulating());
            }
            calculation::SET_TIME_STEP => {
                if let Ok(time_step) = reader.read_scalar() {
                    self.sim.lock().set_time_step(time_step);
                }
            }
            calculation::GET_TIME_STEP => {
                reply.write_scalar(self.sim.lock().time_step());
            }
            calculation::SET_INTEGRATOR_METHOD => {
                if let Ok(code) = reader.read_u8() {
                    self.sim.lock().set_integrator_method(code);
                }
            }
            calculation::GET_INTEGRATOR_METHOD => {
                reply.write_u8(self.sim.lock().integrator_method());
            }
            calculation::POP_STEP_COUNTER => {
                reply.write_u32(self.sim.lock().pop_step_counter());
            }
            calculation::POP_CALCULATION_COUNTER => {
                reply.write_u32(self.sim.lock().pop_calculation_counter());
            }
            calculation::UPDATE_COLLISION_DETECTION => {
                if let Ok(flag) = reader.read_bool() {
                    self.sim.lock().set_collision_detection(flag);
                }
            }
            calculation::UPDATE_GRAVITY_CALCULATION => {
                if let Ok(flag) = reader.read_bool() {
                    self.sim.lock().set_gravity_calculation(flag);
                }
            }
            calculation::UPDATE_LENNARD_JONES_CALCULATION => {
                if let Ok(flag) = reader.read_bool() {
                    self.sim.lock().set_lennard_jones_calculation(flag);
                }
            }
            calculation::UPDATE_MAXIMUM_STEP_DIVISION => {
                if let Ok(depth) = reader.read_u16() {
                    self.sim.lock().set_max_step_division(depth);
                }
            }
            calculation::UPDATE_MAXIMUM_STEP_ERROR => {
                if let Ok(error) = reader.read_scalar() {
                    self.sim.lock().set_max_step_error(error);
                }
            }
            calculation::UPDATE_FRAME_SENDING => {
                if let Ok(flag) = reader.read_bool() {
                    self.queue.set_frame_sending(flag);
                }
            }
            calculation::GET_LAST_STEP_CALCULATION_TIME => {
                reply.write_u32(self.sim.lock().last_step_calculation_time());
            }
            _ => {}
        }
        reply.into_bytes()
    }

    fn handle_information(&self, action: u8) -> Vec<u8> {
        let sim = self.sim.lock();
        let mut reply = PayloadWriter::new();
        match action {
            information::GET_TOTAL_ENERGY => {
                reply.write_scalar(sim.total_energy());
            }
            information::GET_KINETIC_ENERGY => {
                reply.write_scalar(sim.kinetic_energy());
            }
            _ => {}
        }
        reply.into_bytes()
    }

    fn handle_simulated_system(&self, action: u8, payload: &[u8]) -> Vec<u8> {
        let mut sim = self.sim.lock();
        let mut reader = PayloadReader::new(payload);
        match action {
            simulated_system::UPDATE_SPHERE_E => {
                if let Ok(value) = reader.read_scalar() {
                    sim.update_sphere_e(value);
                }
            }
            simulated_system::UPDATE_SPHERE_POISSON_RATIO => {
                if let Ok(value) = reader.read_scalar() {
                    sim.update_sphere_poisson_ratio(value);
                }
            }
            simulated_system::UPDATE_WALL_E => {
                if let Ok(value) = reader.read_scalar() {
                    sim.update_wall_e(value);
                }
            }
            simulated_system::UPDATE_WALL_POISSON_RATIO => {
                if let Ok(value) = reader.read_scalar() {
                    sim.update_wall_poisson_ratio(value);
                }
            }
            simulated_system::UPDATE_EARTH_GRAVITY => {
                if let Ok(value) = reader.read_vec3() {
                    sim.update_earth_gravity(value);
                }
            }
            simulated_system::UPDATE_GRAVITATIONAL_CONSTANT => {
                if let Ok(value) = reader.read_scalar() {
                    sim.update_gravitational_constant(value);
                }
            }
            simulated_system::UPDATE_BOX_SIZE => {
                if let Ok(value) = reader.read_vec3() {
                    sim.update_box_size(value);
                }
            }
            simulated_system::UPDATE_KINETIC_ENERGY => {
                if let Ok(value) = reader.read_scalar() {
                    sim.update_kinetic_energy(value);
                }
            }
            simulated_system::UPDATE_TARGET_TEMPERATURE => {
                if let Ok(value) = reader.read_scalar() {
                    sim.update_target_temperature(value);
                }
            }
            simulated_system::UPDATE_PERIODIC_BOUNDARY_CONDITIONS => {
                if let Ok(flag) = reader.read_bool() {
                    sim.update_periodic_boundary_conditions(flag);
                }
            }
            simulated_system::UPDATE_LENNARD_JONES_EPSILON => {
                if let Ok(value) = reader.read_scalar() {
                    sim.update_lennard_jones_epsilon(value);
                }
            }
            simulated_system::UPDATE_LENNARD_JONES_SIGMA => {
                if let Ok(value) = reader.read_scalar() {
                    sim.update_lennard_jones_sigma(value);
                }
            }
            _ => {}
        }
        Vec::new()
    }
}

/// Little-endian reply decoding helpers for clients and tests.
pub mod reply {
    use super::{PayloadReader, Scalar};

    #[must_use]
    pub fn as_u16(payload: &[u8]) -> Option<u16> {
        PayloadReader::new(payload).read_u16().ok()
    }

    #[must_use]
    pub fn as_u32(payload: &[u8]) -> Option<u32> {
        PayloadReader::new(payload).read_u32().ok()
    }

    #[must_use]
    pub fn as_scalar(payload: &[u8]) -> Option<Scalar> {
        PayloadReader::new(payload).read_scalar().ok()
    }
}
